// ==============================================================================
// output.rs - Multi-Format Report Generation
// ==============================================================================
// Description: Render analysis results as text, JSON, CSV and Parquet reports
// Author: Matt Barham
// Created: 2025-11-06
// Modified: 2026-10-18
// Version: 2.1.0
// ==============================================================================

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt::{self, Write as _};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

// Apache Arrow/Parquet for columnar data
use arrow::array::{ArrayRef, Float64Array, StringArray, UInt64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::file::properties::WriterProperties;

use crate::models::{AnalysisResult, VariantKey};

const RULE: &str = "================================================================================";
const SUBRULE: &str = "--------------------------------------------------------------------------------";

const DISCLAIMER: &str = "This report is generated by automated software for informational purposes \
and is not a medical diagnosis. Findings should be confirmed in a CLIA-certified laboratory and \
reviewed with a qualified healthcare provider or genetic counselor before any clinical decision.";

/// Supported report formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Sectioned plain-text report (for clinicians)
    Text,
    /// Full AnalysisResult document (for web APIs)
    Json,
    /// One row per classified variant (for spreadsheets)
    Csv,
    /// Columnar variant table (for Python, R, Spark)
    Parquet,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 4] = [
        OutputFormat::Text,
        OutputFormat::Json,
        OutputFormat::Csv,
        OutputFormat::Parquet,
    ];

    /// Get file extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Text => "txt",
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
            OutputFormat::Parquet => "parquet",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "txt" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            "parquet" => Ok(OutputFormat::Parquet),
            other => Err(format!(
                "unknown output format '{}' (expected text, json, csv or parquet)",
                other
            )),
        }
    }
}

/// One classified variant, flattened for tabular output
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariantRow {
    pub analysis_id: String,
    pub bucket: &'static str,
    pub variant_key: String,
    pub chromosome: String,
    pub position: u64,
    pub id: String,
    pub ref_allele: String,
    pub alt_allele: String,
    pub quality: f64,
    pub filter: String,
    pub zygosity: &'static str,
    pub gene: Option<String>,
}

/// Flatten the six buckets in report order
pub fn variant_rows(result: &AnalysisResult) -> Vec<VariantRow> {
    let mut genes: HashMap<VariantKey, &str> = HashMap::new();
    for c in &result.clinical_interpretations {
        genes.insert(c.variant_key.clone(), c.definition.gene.as_str());
    }
    for p in &result.pharmacogenetic_interpretations {
        genes.insert(p.variant_key.clone(), p.definition.gene.as_str());
    }

    result
        .buckets()
        .into_iter()
        .flat_map(|(bucket, variants)| variants.iter().map(move |v| (bucket, v)))
        .map(|(bucket, v)| {
            let key = v.key();
            VariantRow {
                analysis_id: result.analysis_id.clone(),
                bucket,
                variant_key: key.to_string(),
                chromosome: v.chromosome.clone(),
                position: v.position,
                id: v.id.clone(),
                ref_allele: v.ref_allele.clone(),
                alt_allele: v.alt_allele.clone(),
                quality: v.quality,
                filter: v.filter.clone(),
                zygosity: v.zygosity().as_str(),
                gene: genes.get(&key).map(|g| g.to_string()),
            }
        })
        .collect()
}

/// Sectioned plain-text report
pub fn render_text(result: &AnalysisResult) -> Result<String> {
    let mut out = String::new();
    write_report(&mut out, result).context("Failed to render text report")?;
    Ok(out)
}

fn write_report(out: &mut String, result: &AnalysisResult) -> fmt::Result {
    writeln!(out, "{}", RULE)?;
    writeln!(out, "GENETIC RISK ANALYSIS REPORT")?;
    writeln!(out, "{}", RULE)?;

    section(out, "PATIENT INFORMATION")?;
    match &result.patient {
        Some(p) => {
            writeln!(out, "Patient ID: {}", p.patient_id.as_deref().unwrap_or("not provided"))?;
            writeln!(out, "Name: {}", p.name.as_deref().unwrap_or("not provided"))?;
            writeln!(
                out,
                "Age: {}",
                p.age.map(|a| a.to_string()).unwrap_or_else(|| "not provided".to_string())
            )?;
            writeln!(out, "Sex: {}", p.sex.as_deref().unwrap_or("not provided"))?;
            if !p.lifestyle.is_empty() {
                writeln!(out, "Lifestyle notes: {}", p.lifestyle.join("; "))?;
            }
        }
        None => {
            writeln!(out, "No patient information provided")?;
        }
    }

    section(out, "ANALYSIS")?;
    writeln!(out, "Analysis ID: {}", result.analysis_id)?;
    writeln!(out, "Date: {}", result.timestamp.format("%Y-%m-%d %H:%M:%S UTC"))?;
    writeln!(
        out,
        "Status: {}",
        if result.is_success() { "completed" } else { "failed" }
    )?;
    writeln!(out, "File format: {}", result.metadata.file_format.as_deref().unwrap_or("unknown"))?;
    writeln!(
        out,
        "Reference genome: {}",
        result.metadata.reference_genome.as_deref().unwrap_or("not specified")
    )?;
    if !result.metadata.sample_names.is_empty() {
        writeln!(out, "Samples: {}", result.metadata.sample_names.join(", "))?;
    }

    if let Some(error) = &result.error {
        section(out, "ERROR")?;
        writeln!(out, "{}", error)?;
        disclaimer(out)?;
        return Ok(());
    }

    section(out, "VARIANT SUMMARY")?;
    writeln!(out, "Total variants analyzed: {}", result.total_variants)?;
    for (bucket, variants) in result.buckets() {
        writeln!(out, "  {:<20} {}", format!("{}:", bucket), variants.len())?;
    }
    writeln!(
        out,
        "  {:<20} {}",
        "low_quality_dropped:", result.metadata.dropped_low_quality
    )?;

    section(out, "URGENT FLAGS")?;
    list(out, &result.urgent_flags, "None")?;

    section(out, "CLINICAL FINDINGS")?;
    if result.clinical_interpretations.is_empty() {
        writeln!(out, "No pathogenic or likely pathogenic variants identified")?;
    }
    for c in &result.clinical_interpretations {
        let d = &c.definition;
        writeln!(out, "{} {} ({})", d.gene, d.variant, d.pathogenicity.as_str())?;
        writeln!(out, "  Variant: {}", c.variant_key)?;
        if let Some(rsid) = &c.rsid {
            writeln!(out, "  dbSNP: {}", rsid)?;
        }
        writeln!(out, "  Zygosity: {}", c.zygosity.as_str())?;
        writeln!(out, "  Disease: {}", d.disease)?;
        writeln!(out, "  Inheritance: {}", d.inheritance)?;
        writeln!(out, "  Penetrance: {}", d.penetrance)?;
        writeln!(out, "  Clinical action: {}", d.clinical_action)?;
        writeln!(out, "  Evidence: {}", d.evidence_level)?;
    }

    section(out, "PHARMACOGENETIC FINDINGS")?;
    if result.pharmacogenetic_interpretations.is_empty() {
        writeln!(out, "No pharmacogenetic variants identified")?;
    }
    for p in &result.pharmacogenetic_interpretations {
        let d = &p.definition;
        writeln!(out, "{} ({})", d.variant, d.gene)?;
        writeln!(out, "  Variant: {}", p.variant_key)?;
        writeln!(out, "  Zygosity: {}", p.zygosity.as_str())?;
        writeln!(out, "  Drugs: {}", d.drugs.join(", "))?;
        writeln!(out, "  Phenotype: {}", d.phenotype)?;
        writeln!(out, "  Recommendation: {}", d.recommendation)?;
        writeln!(out, "  Evidence: {}", d.evidence_level)?;
    }

    let risk = &result.risk_assessment;
    section(out, "RISK ASSESSMENT")?;
    writeln!(out, "Overall risk level: {}", risk.overall_risk_level.as_str().to_uppercase())?;
    if !risk.high_penetrance_diseases.is_empty() {
        writeln!(out, "\nHigh-penetrance conditions:")?;
        for d in &risk.high_penetrance_diseases {
            writeln!(out, "  - {} ({}): {}", d.disease, d.gene, d.penetrance)?;
        }
    }
    if !risk.reproductive_risks.is_empty() {
        writeln!(out, "\nReproductive risk:")?;
        for r in &risk.reproductive_risks {
            writeln!(out, "  - {}", r.risk)?;
        }
    }
    if !risk.surveillance_recommendations.is_empty() {
        writeln!(out, "\nSurveillance:")?;
        list(out, &risk.surveillance_recommendations, "")?;
    }
    if !risk.lifestyle_recommendations.is_empty() {
        writeln!(out, "\nLifestyle:")?;
        list(out, &risk.lifestyle_recommendations, "")?;
    }

    section(out, "RECOMMENDATIONS")?;
    for (i, r) in result.recommendations.iter().enumerate() {
        writeln!(out, "{}. {}", i + 1, r)?;
    }

    section(out, "ICD-10 CODES")?;
    writeln!(
        out,
        "{}",
        if result.icd10_codes.is_empty() {
            "None".to_string()
        } else {
            result.icd10_codes.join(", ")
        }
    )?;

    section(out, "TECHNICAL METADATA")?;
    let m = &result.metadata;
    writeln!(out, "Confidence score: {:.2}", result.confidence_score)?;
    writeln!(out, "Records parsed: {}", m.records_parsed)?;
    writeln!(out, "Skipped lines: {}", m.skipped_lines)?;
    writeln!(
        out,
        "Truncated: {}",
        if m.truncated {
            format!("yes (record limit {})", m.record_limit)
        } else {
            "no".to_string()
        }
    )?;
    if let Some(size) = m.file_size {
        writeln!(out, "File size: {} bytes", size)?;
    }
    if let Some(sha256) = &m.sha256 {
        writeln!(out, "SHA-256: {}", sha256)?;
    }
    writeln!(out, "Analyzer version: {}", m.analyzer_version)?;

    disclaimer(out)
}

fn section(out: &mut String, title: &str) -> fmt::Result {
    writeln!(out, "\n{}\n{}", title, SUBRULE)
}

fn list(out: &mut String, items: &[String], empty: &str) -> fmt::Result {
    if items.is_empty() && !empty.is_empty() {
        writeln!(out, "{}", empty)?;
    }
    for item in items {
        writeln!(out, "  - {}", item)?;
    }
    Ok(())
}

fn disclaimer(out: &mut String) -> fmt::Result {
    writeln!(out, "\n{}\nDISCLAIMER\n{}\n{}", RULE, DISCLAIMER, RULE)
}

/// Pretty-printed JSON document
pub fn to_json(result: &AnalysisResult) -> Result<String> {
    serde_json::to_string_pretty(result).context("Failed to serialize analysis result")
}

/// CSV variant table
pub fn write_csv<W: Write>(result: &AnalysisResult, writer: W) -> Result<usize> {
    let rows = variant_rows(result);
    let mut csv_writer = csv::Writer::from_writer(writer);
    for row in &rows {
        csv_writer.serialize(row).context("Failed to write CSV row")?;
    }
    csv_writer.flush().context("Failed to flush CSV output")?;
    Ok(rows.len())
}

/// Parquet variant table
pub fn write_parquet(result: &AnalysisResult, path: &Path) -> Result<usize> {
    let rows = variant_rows(result);

    // Create Arrow schema for variants
    let schema = Arc::new(Schema::new(vec![
        Field::new("analysis_id", DataType::Utf8, false),
        Field::new("bucket", DataType::Utf8, false),
        Field::new("variant_key", DataType::Utf8, false),
        Field::new("chromosome", DataType::Utf8, false),
        Field::new("position", DataType::UInt64, false),
        Field::new("id", DataType::Utf8, false),
        Field::new("ref_allele", DataType::Utf8, false),
        Field::new("alt_allele", DataType::Utf8, false),
        Field::new("quality", DataType::Float64, false),
        Field::new("filter", DataType::Utf8, false),
        Field::new("zygosity", DataType::Utf8, false),
        Field::new("gene", DataType::Utf8, true),
    ]));

    let columns: Vec<ArrayRef> = vec![
        string_column(&rows, |r| r.analysis_id.as_str()),
        string_column(&rows, |r| r.bucket),
        string_column(&rows, |r| r.variant_key.as_str()),
        string_column(&rows, |r| r.chromosome.as_str()),
        Arc::new(UInt64Array::from(rows.iter().map(|r| r.position).collect::<Vec<_>>())),
        string_column(&rows, |r| r.id.as_str()),
        string_column(&rows, |r| r.ref_allele.as_str()),
        string_column(&rows, |r| r.alt_allele.as_str()),
        Arc::new(Float64Array::from(rows.iter().map(|r| r.quality).collect::<Vec<_>>())),
        string_column(&rows, |r| r.filter.as_str()),
        string_column(&rows, |r| r.zygosity),
        Arc::new(StringArray::from(
            rows.iter().map(|r| r.gene.as_deref()).collect::<Vec<_>>(),
        )),
    ];

    let batch = RecordBatch::try_new(schema.clone(), columns).context("Failed to create Arrow RecordBatch")?;

    // Write to Parquet file with compression
    let file = std::fs::File::create(path).context("Failed to create Parquet file")?;
    let props = WriterProperties::builder()
        .set_compression(parquet::basic::Compression::SNAPPY)
        .build();

    let mut writer = ArrowWriter::try_new(file, schema, Some(props)).context("Failed to create Parquet writer")?;
    writer.write(&batch).context("Failed to write Parquet data")?;
    writer.close().context("Failed to close Parquet writer")?;

    Ok(rows.len())
}

fn string_column(rows: &[VariantRow], f: fn(&VariantRow) -> &str) -> ArrayRef {
    Arc::new(StringArray::from(rows.iter().map(f).collect::<Vec<_>>()))
}

/// Writes reports to `<output_dir>/<analysis_id>/report.<ext>`
pub struct ReportGenerator {
    output_dir: PathBuf,
}

impl ReportGenerator {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn report_dir(&self, result: &AnalysisResult) -> PathBuf {
        self.output_dir.join(&result.analysis_id)
    }

    /// Write every requested format; returns the path of each
    pub fn generate(
        &self,
        result: &AnalysisResult,
        formats: &[OutputFormat],
    ) -> Result<BTreeMap<OutputFormat, PathBuf>> {
        let dir = self.report_dir(result);
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create report directory {}", dir.display()))?;

        let mut written = BTreeMap::new();
        for &format in formats {
            let path = dir.join(format!("report.{}", format.extension()));
            self.generate_format(result, format, &path)?;
            written.insert(format, path);
        }

        info!(
            "Wrote {} report file(s) for analysis {} to {}",
            written.len(),
            result.analysis_id,
            dir.display()
        );

        Ok(written)
    }

    fn generate_format(&self, result: &AnalysisResult, format: OutputFormat, path: &Path) -> Result<()> {
        info!("Generating {:?} output: {:?}", format, path);

        match format {
            OutputFormat::Text => {
                std::fs::write(path, render_text(result)?).context("Failed to write text report")?;
            }
            OutputFormat::Json => {
                let file = std::fs::File::create(path).context("Failed to create JSON output file")?;
                serde_json::to_writer_pretty(file, result).context("Failed to write JSON output")?;
            }
            OutputFormat::Csv => {
                let file = std::fs::File::create(path).context("Failed to create CSV output file")?;
                let rows = write_csv(result, file)?;
                info!("CSV output complete: {} variants", rows);
            }
            OutputFormat::Parquet => {
                let rows = write_parquet(result, path)?;
                info!("Parquet output complete: {} variants", rows);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AnalysisMetadata, PatientContext};
    use crate::processor::Analyzer;
    use parquet::file::reader::{FileReader, SerializedFileReader};
    use std::io::Cursor;
    use tempfile::tempdir;

    const VCF: &str = "##fileformat=VCFv4.2\n\
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tP1\n\
17\t43094464\trs80357906\tC\tT\t100\tPASS\tDP=50;AF=0.5\tGT:DP\t0/1:30\n\
1\t97450058\t.\tC\tT\t80\tPASS\t.\tGT\t0/1\n\
3\t500\t.\tA\tC\t60\tPASS\tAF=0.05\tGT\t1/1\n";

    fn sample_result() -> AnalysisResult {
        let patient = PatientContext {
            patient_id: Some("PT-001".to_string()),
            age: Some(42),
            ..Default::default()
        };
        Analyzer::with_defaults().analyze_reader(Cursor::new(VCF), Some(patient))
    }

    #[test]
    fn test_output_format_extension() {
        assert_eq!(OutputFormat::Text.extension(), "txt");
        assert_eq!(OutputFormat::Json.extension(), "json");
        assert_eq!(OutputFormat::Csv.extension(), "csv");
        assert_eq!(OutputFormat::Parquet.extension(), "parquet");
    }

    #[test]
    fn test_output_format_parse_and_serde() {
        assert_eq!("TXT".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert!("rdata".parse::<OutputFormat>().is_err());

        let json = serde_json::to_string(&OutputFormat::Json).unwrap();
        assert_eq!(json, "\"json\"");
        let parsed: OutputFormat = serde_json::from_str("\"parquet\"").unwrap();
        assert_eq!(parsed, OutputFormat::Parquet);
    }

    #[test]
    fn test_text_report_sections() {
        let result = sample_result();
        let text = render_text(&result).unwrap();

        for heading in [
            "PATIENT INFORMATION",
            "VARIANT SUMMARY",
            "URGENT FLAGS",
            "CLINICAL FINDINGS",
            "PHARMACOGENETIC FINDINGS",
            "RISK ASSESSMENT",
            "RECOMMENDATIONS",
            "ICD-10 CODES",
            "TECHNICAL METADATA",
            "DISCLAIMER",
        ] {
            assert!(text.contains(heading), "missing section {}", heading);
        }
        assert!(text.contains("Patient ID: PT-001"));
        assert!(text.contains("Overall risk level: HIGH"));
        assert!(text.contains("Z15.01"));

        // Deterministic for the same result
        assert_eq!(text, render_text(&result).unwrap());
    }

    #[test]
    fn test_failed_report() {
        let result = AnalysisResult::failed(
            "failed-1".to_string(),
            None,
            "Invalid VCF format: File is empty",
            AnalysisMetadata::default(),
        );
        let text = render_text(&result).unwrap();

        assert!(text.contains("Status: failed"));
        assert!(text.contains("File is empty"));
        assert!(!text.contains("VARIANT SUMMARY"));
        assert!(text.contains("DISCLAIMER"));
    }

    #[test]
    fn test_json_field_names() {
        let result = sample_result();
        let value: serde_json::Value = serde_json::from_str(&to_json(&result).unwrap()).unwrap();

        for field in [
            "analysis_id",
            "timestamp",
            "total_variants",
            "pathogenic_variants",
            "likely_pathogenic_variants",
            "pharmacogenetic_variants",
            "trait_variants",
            "benign_variants",
            "uncertain_variants",
            "clinical_interpretations",
            "pharmacogenetic_interpretations",
            "risk_assessment",
            "recommendations",
            "urgent_flags",
            "icd10_codes",
            "confidence_score",
            "metadata",
        ] {
            assert!(value.get(field).is_some(), "missing field {}", field);
        }
        assert_eq!(value["risk_assessment"]["overall_risk_level"], "high");
        assert_eq!(value["clinical_interpretations"][0]["gene"], "BRCA1");
        assert_eq!(value["status"], "completed");
    }

    #[test]
    fn test_variant_rows_and_csv() {
        let result = sample_result();
        let rows = variant_rows(&result);

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].bucket, "pathogenic");
        assert_eq!(rows[0].gene.as_deref(), Some("BRCA1"));
        assert_eq!(rows[1].bucket, "pharmacogenetic");
        assert_eq!(rows[1].gene.as_deref(), Some("DPYD"));
        assert_eq!(rows[2].bucket, "benign");
        assert_eq!(rows[2].gene, None);

        let mut buffer = Vec::new();
        assert_eq!(write_csv(&result, &mut buffer).unwrap(), 3);
        let csv_text = String::from_utf8(buffer).unwrap();
        let mut lines = csv_text.lines();
        assert!(lines.next().unwrap().starts_with("analysis_id,bucket,variant_key"));
        assert_eq!(lines.count(), 3);
    }

    #[test]
    fn test_generate_all_formats() {
        let dir = tempdir().unwrap();
        let result = sample_result();
        let generator = ReportGenerator::new(dir.path());

        let written = generator.generate(&result, &OutputFormat::ALL).unwrap();
        assert_eq!(written.len(), 4);
        for (format, path) in &written {
            assert!(path.exists(), "{:?} not written", format);
            assert!(path.starts_with(dir.path().join(&result.analysis_id)));
        }

        let parquet = std::fs::File::open(&written[&OutputFormat::Parquet]).unwrap();
        let reader = SerializedFileReader::new(parquet).unwrap();
        assert_eq!(reader.metadata().file_metadata().num_rows(), 3);
    }
}
