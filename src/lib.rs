// ==============================================================================
// lib.rs - Genetic Risk Analyzer Library
// ==============================================================================
// Description: Library interface for VCF risk analysis modules
// Author: Matt Barham
// Created: 2025-11-03
// Modified: 2026-10-18
// Version: 2.0.0
// ==============================================================================

pub mod parsers;
pub mod audit;
pub mod validator;
pub mod models;
pub mod knowledge_base;
pub mod classifier;
pub mod risk;
pub mod recommendations;
pub mod config;
pub mod processor;
pub mod output;
pub mod store;

pub use classifier::{ClassificationResult, ClassifierConfig, VariantClassifier};
pub use config::AnalyzerConfig;
pub use knowledge_base::KnowledgeBase;
pub use models::{AnalysisResult, PatientContext, VariantRecord};
pub use output::{OutputFormat, ReportGenerator};
pub use processor::Analyzer;
pub use recommendations::{RecommendationEngine, RecommendationRules};
pub use risk::RiskAssessor;
pub use store::{MemoryResultStore, ResultStore, SqliteResultStore};
