// ==============================================================================
// parsers/mod.rs - Input parser modules
// ==============================================================================
// Description: Parsers for VCF files and free-text genetic reports
// Author: Matt Barham
// Created: 2026-10-18
// Modified: 2026-10-18
// Version: 1.0.0
// ==============================================================================

pub mod vcf;
pub mod text;

pub use vcf::{CancelCheck, ParsedVcf, RecordParseError, VCFParseError, VCFParser, VcfHeader, VcfMetadata};
pub use text::{TextExtraction, TextIngestor};
