// ==============================================================================
// processor.rs - Analysis Pipeline
// ==============================================================================
// Description: Validate → Parse → Classify → Assess → Recommend, single pass
// Author: Matt Barham
// Created: 2025-10-31
// Modified: 2026-10-18
// Version: 3.0.0
// ==============================================================================
// Every entry point returns an AnalysisResult. Fatal errors (validation,
// header format, I/O, cancellation) produce a failed result rather than an Err.
// ==============================================================================

use std::io::BufRead;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::audit::{log_event, AuditEventType, AuditSink};
use crate::classifier::{ClassificationResult, VariantClassifier};
use crate::config::AnalyzerConfig;
use crate::knowledge_base::KnowledgeBase;
use crate::models::{
    AnalysisFindings, AnalysisMetadata, AnalysisResult, ClinicalInterpretation, PatientContext,
    PharmacogeneticInterpretation, VariantRecord,
};
use crate::parsers::{CancelCheck, ParsedVcf, TextExtraction, TextIngestor, VCFParseError, VCFParser};
use crate::recommendations::RecommendationEngine;
use crate::risk::RiskAssessor;
use crate::validator::{InputValidator, ValidationError};

pub const ANALYZER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Fatal analysis errors
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Parse(#[from] VCFParseError),
}

impl AnalysisError {
    fn audit_type(&self) -> AuditEventType {
        match self {
            AnalysisError::Validation(_) => AuditEventType::FileRejected,
            AnalysisError::Parse(VCFParseError::Cancelled { .. }) => AuditEventType::AnalysisCancelled,
            AnalysisError::Parse(_) => AuditEventType::AnalysisFailed,
        }
    }
}

/// Runs the analysis pipeline against a shared knowledge base
pub struct Analyzer {
    kb: Arc<KnowledgeBase>,
    config: AnalyzerConfig,
    validator: InputValidator,
    classifier: VariantClassifier,
    assessor: RiskAssessor,
    engine: RecommendationEngine,
    cancel_check: Option<CancelCheck>,
    audit: Option<Arc<dyn AuditSink>>,
}

impl Analyzer {
    pub fn new(kb: Arc<KnowledgeBase>, config: AnalyzerConfig) -> Self {
        Self {
            validator: InputValidator::new(config.max_file_size),
            classifier: VariantClassifier::new(config.classifier),
            assessor: RiskAssessor::new(kb.clone()),
            engine: RecommendationEngine::new(config.rules.clone()),
            kb,
            config,
            cancel_check: None,
            audit: None,
        }
    }

    /// Analyzer over the built-in knowledge base with default settings
    pub fn with_defaults() -> Self {
        Self::new(KnowledgeBase::builtin(), AnalyzerConfig::default())
    }

    pub fn with_cancel_check(mut self, check: CancelCheck) -> Self {
        self.cancel_check = Some(check);
        self
    }

    pub fn with_audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(sink);
        self
    }

    pub fn knowledge_base(&self) -> &Arc<KnowledgeBase> {
        &self.kb
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Analyze a VCF file (`.vcf` or `.vcf.gz`)
    pub fn analyze_file(&self, path: &Path, patient: Option<PatientContext>) -> AnalysisResult {
        let analysis_id = Uuid::new_v4().to_string();
        let mut metadata = self.base_metadata();
        metadata.source_file = Some(path.display().to_string());

        info!("Starting analysis {} for {}", analysis_id, path.display());
        self.audit(
            AuditEventType::AnalysisStarted,
            &analysis_id,
            serde_json::json!({ "source": path.display().to_string() }),
        );

        let validated = match self.validator.validate(path) {
            Ok(v) => v,
            Err(e) => return self.fail(analysis_id, patient, e.into(), metadata),
        };
        metadata.file_size = Some(validated.size);
        metadata.sha256 = Some(validated.hash_sha256.clone());
        self.audit(
            AuditEventType::FileValidated,
            &analysis_id,
            serde_json::json!({ "size": validated.size, "sha256": validated.hash_sha256 }),
        );

        match self.parser().parse(path) {
            Ok(parsed) => self.complete(analysis_id, parsed, metadata, patient),
            Err(e) => self.fail(analysis_id, patient, e.into(), metadata),
        }
    }

    /// Analyze VCF text from a reader
    pub fn analyze_reader<R: BufRead>(&self, reader: R, patient: Option<PatientContext>) -> AnalysisResult {
        let analysis_id = Uuid::new_v4().to_string();
        let metadata = self.base_metadata();

        info!("Starting analysis {} from reader", analysis_id);
        self.audit(
            AuditEventType::AnalysisStarted,
            &analysis_id,
            serde_json::json!({ "source": "reader" }),
        );

        match self.parser().parse_reader(reader) {
            Ok(parsed) => self.complete(analysis_id, parsed, metadata, patient),
            Err(e) => self.fail(analysis_id, patient, e.into(), metadata),
        }
    }

    /// Analyze records parsed by an external collaborator.
    /// The record limit applies here as it does in the parser.
    pub fn analyze_records(
        &self,
        mut variants: Vec<VariantRecord>,
        mut metadata: AnalysisMetadata,
        patient: Option<PatientContext>,
    ) -> AnalysisResult {
        let analysis_id = Uuid::new_v4().to_string();
        info!("Starting analysis {} over {} supplied records", analysis_id, variants.len());
        self.audit(
            AuditEventType::AnalysisStarted,
            &analysis_id,
            serde_json::json!({ "source": "records", "records": variants.len() }),
        );

        metadata.record_limit = self.config.record_limit;
        metadata.analyzer_version = ANALYZER_VERSION.to_string();
        if variants.len() > self.config.record_limit {
            warn!(
                "Supplied {} records exceeds limit {}, truncating",
                variants.len(),
                self.config.record_limit
            );
            variants.truncate(self.config.record_limit);
            metadata.truncated = true;
        }
        metadata.records_parsed = variants.len();

        self.run(analysis_id, variants, metadata, patient)
    }

    /// Scan free text, then analyze whatever resolved to knowledge base keys
    pub fn analyze_text(&self, text: &str, patient: Option<PatientContext>) -> (TextExtraction, AnalysisResult) {
        let extraction = TextIngestor::new(self.kb.clone()).scan(text);
        let metadata = AnalysisMetadata {
            file_format: Some("text".to_string()),
            ..Default::default()
        };
        let result = self.analyze_records(extraction.candidate_records(), metadata, patient);
        (extraction, result)
    }

    fn parser(&self) -> VCFParser {
        let parser = VCFParser::new().with_record_limit(self.config.record_limit);
        match &self.cancel_check {
            Some(check) => parser.with_cancel_check(check.clone()),
            None => parser,
        }
    }

    fn base_metadata(&self) -> AnalysisMetadata {
        AnalysisMetadata {
            record_limit: self.config.record_limit,
            analyzer_version: ANALYZER_VERSION.to_string(),
            ..Default::default()
        }
    }

    fn complete(
        &self,
        analysis_id: String,
        parsed: ParsedVcf,
        mut metadata: AnalysisMetadata,
        patient: Option<PatientContext>,
    ) -> AnalysisResult {
        let ParsedVcf {
            metadata: vcf,
            variants,
        } = parsed;

        metadata.reference_genome = vcf.header.reference_genome();
        metadata.file_format = Some(vcf.header.file_format);
        metadata.sample_names = vcf.header.sample_names;
        metadata.contig_count = vcf.header.contigs.len();
        metadata.info_fields = vcf.header.info.into_keys().collect();
        metadata.truncated = vcf.truncated;
        metadata.record_limit = vcf.record_limit;
        metadata.records_parsed = vcf.records_parsed;
        metadata.skipped_lines = vcf.skipped_lines;

        self.run(analysis_id, variants, metadata, patient)
    }

    fn run(
        &self,
        analysis_id: String,
        variants: Vec<VariantRecord>,
        mut metadata: AnalysisMetadata,
        patient: Option<PatientContext>,
    ) -> AnalysisResult {
        let classification = self.classifier.classify(variants, &self.kb);
        let clinical = self.clinical_interpretations(&classification);
        let pharmacogenetic = self.pharmacogenetic_interpretations(&classification);

        let risk_assessment = self
            .assessor
            .assess(&classification, &clinical, &pharmacogenetic, patient.as_ref());
        let recommendations = self.engine.recommend(&classification, &clinical, &pharmacogenetic);

        metadata.dropped_low_quality = classification.dropped_low_quality;
        let total_variants = classification.total();

        let ClassificationResult {
            pathogenic,
            likely_pathogenic,
            pharmacogenetic: pharmacogenetic_variants,
            traits,
            benign,
            uncertain,
            ..
        } = classification;

        let findings = AnalysisFindings {
            total_variants,
            pathogenic_variants: pathogenic,
            likely_pathogenic_variants: likely_pathogenic,
            pharmacogenetic_variants,
            trait_variants: traits,
            benign_variants: benign,
            uncertain_variants: uncertain,
            clinical_interpretations: clinical,
            pharmacogenetic_interpretations: pharmacogenetic,
            risk_assessment,
            recommendations: recommendations.recommendations,
            urgent_flags: recommendations.urgent_flags,
            icd10_codes: recommendations.icd10_codes,
            confidence_score: recommendations.confidence,
        };

        let result = AnalysisResult::completed(analysis_id, patient, findings, metadata);

        info!(
            "Analysis {} complete: {} variants, risk level {}, {} urgent flags, confidence {:.2}",
            result.analysis_id,
            result.total_variants,
            result.risk_assessment.overall_risk_level,
            result.urgent_flags.len(),
            result.confidence_score
        );
        self.audit(
            AuditEventType::AnalysisCompleted,
            &result.analysis_id,
            serde_json::json!({
                "total_variants": result.total_variants,
                "pathogenic": result.pathogenic_variants.len(),
                "risk_level": result.risk_assessment.overall_risk_level.as_str(),
                "truncated": result.metadata.truncated,
            }),
        );

        result
    }

    fn clinical_interpretations(&self, classification: &ClassificationResult) -> Vec<ClinicalInterpretation> {
        classification
            .pathogenic
            .iter()
            .chain(classification.likely_pathogenic.iter())
            .filter_map(|variant| {
                let variant_key = variant.key();
                self.kb.pathogenic(&variant_key).map(|definition| ClinicalInterpretation {
                    rsid: variant.rsid().map(str::to_string),
                    zygosity: variant.zygosity(),
                    quality: variant.quality,
                    definition: definition.clone(),
                    variant_key,
                })
            })
            .collect()
    }

    fn pharmacogenetic_interpretations(
        &self,
        classification: &ClassificationResult,
    ) -> Vec<PharmacogeneticInterpretation> {
        classification
            .pharmacogenetic
            .iter()
            .filter_map(|variant| {
                let variant_key = variant.key();
                self.kb
                    .pharmacogenetic(&variant_key)
                    .map(|definition| PharmacogeneticInterpretation {
                        rsid: variant.rsid().map(str::to_string),
                        zygosity: variant.zygosity(),
                        definition: definition.clone(),
                        variant_key,
                    })
            })
            .collect()
    }

    fn fail(
        &self,
        analysis_id: String,
        patient: Option<PatientContext>,
        error: AnalysisError,
        metadata: AnalysisMetadata,
    ) -> AnalysisResult {
        warn!("Analysis {} failed: {}", analysis_id, error);
        self.audit(
            error.audit_type(),
            &analysis_id,
            serde_json::json!({ "error": error.to_string() }),
        );
        AnalysisResult::failed(analysis_id, patient, error.to_string(), metadata)
    }

    fn audit(&self, event_type: AuditEventType, analysis_id: &str, details: serde_json::Value) {
        log_event(self.audit.as_deref(), event_type, analysis_id, None, details);
    }
}
