// ==============================================================================
// models.rs - Variant and Analysis Data Models
// ==============================================================================
// Description: Data structures shared by the parser, classifier and report stages
// Author: Matt Barham
// Created: 2026-10-18
// Modified: 2026-10-18
// Version: 1.0.0
// ==============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::knowledge_base::{ClinicalVariantDefinition, PharmacogeneticVariantDefinition};

/// Typed INFO value
///
/// Coercion order when parsing raw text:
/// - value containing '.' → Float
/// - otherwise → Int
/// - either parse failing, or a non-finite float → Str
/// - bare key without '=' → Flag(true)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InfoValue {
    Int(i64),
    Float(f64),
    Flag(bool),
    Str(String),
}

impl InfoValue {
    /// Coerce a raw `key=value` value string
    pub fn coerce(raw: &str) -> Self {
        if raw.contains('.') {
            match raw.parse::<f64>() {
                Ok(v) if v.is_finite() => InfoValue::Float(v),
                _ => InfoValue::Str(raw.to_string()),
            }
        } else {
            match raw.parse::<i64>() {
                Ok(v) => InfoValue::Int(v),
                Err(_) => InfoValue::Str(raw.to_string()),
            }
        }
    }

    /// Finite numeric view of the value, if it has one
    pub fn as_f64(&self) -> Option<f64> {
        let value = match self {
            InfoValue::Int(v) => Some(*v as f64),
            InfoValue::Float(v) => Some(*v),
            InfoValue::Str(s) => s.parse::<f64>().ok(),
            InfoValue::Flag(_) => None,
        };
        value.filter(|v| v.is_finite())
    }
}

impl fmt::Display for InfoValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InfoValue::Int(v) => write!(f, "{}", v),
            InfoValue::Float(v) => write!(f, "{}", v),
            InfoValue::Flag(_) => write!(f, "true"),
            InfoValue::Str(s) => write!(f, "{}", s),
        }
    }
}

/// Knowledge base lookup identity: `chromosome:position:ref:alt`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VariantKey {
    pub chromosome: String,
    pub position: u64,
    pub ref_allele: String,
    pub alt_allele: String,
}

impl VariantKey {
    pub fn new(chromosome: &str, position: u64, ref_allele: &str, alt_allele: &str) -> Self {
        Self {
            chromosome: chromosome.to_string(),
            position,
            ref_allele: ref_allele.to_string(),
            alt_allele: alt_allele.to_string(),
        }
    }
}

impl fmt::Display for VariantKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            self.chromosome, self.position, self.ref_allele, self.alt_allele
        )
    }
}

impl FromStr for VariantKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() != 4 {
            return Err(format!("Invalid variant key '{}' (expected chrom:pos:ref:alt)", s));
        }

        let position = parts[1]
            .parse::<u64>()
            .map_err(|_| format!("Invalid position in variant key '{}'", s))?;

        Ok(VariantKey::new(parts[0], position, parts[2], parts[3]))
    }
}

impl TryFrom<String> for VariantKey {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<VariantKey> for String {
    fn from(key: VariantKey) -> Self {
        key.to_string()
    }
}

/// Per-sample FORMAT values for one record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleCall {
    /// Sample name from the #CHROM header line
    pub sample_id: String,

    /// FORMAT key → value (missing trailing values are ".")
    pub fields: BTreeMap<String, String>,
}

impl SampleCall {
    pub fn genotype(&self) -> Option<&str> {
        self.fields.get("GT").map(String::as_str)
    }
}

/// One parsed VCF data line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantRecord {
    /// Chromosome as written in the file ("17", "chr17", "X")
    pub chromosome: String,

    /// 1-based position
    pub position: u64,

    /// Variant ID (e.g., "rs80357906") or "."
    pub id: String,

    pub ref_allele: String,

    pub alt_allele: String,

    /// PHRED-scaled QUAL, 0.0 when missing or unparseable
    pub quality: f64,

    pub filter: String,

    /// INFO entries in file order
    pub info: Vec<(String, InfoValue)>,

    /// FORMAT column ("" when absent)
    pub format: String,

    /// Sample calls in header order
    pub samples: Vec<SampleCall>,
}

impl VariantRecord {
    pub fn key(&self) -> VariantKey {
        VariantKey::new(&self.chromosome, self.position, &self.ref_allele, &self.alt_allele)
    }

    /// First INFO value stored under `key`
    pub fn info_value(&self, key: &str) -> Option<&InfoValue> {
        self.info.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// FORMAT values for a named sample
    pub fn sample(&self, sample_id: &str) -> Option<&SampleCall> {
        self.samples.iter().find(|s| s.sample_id == sample_id)
    }

    /// rsID if the ID column carries one
    pub fn rsid(&self) -> Option<&str> {
        self.id
            .split(';')
            .find(|id| id.starts_with("rs"))
    }

    /// Zygosity of the first sample's GT call
    pub fn zygosity(&self) -> Zygosity {
        self.samples
            .first()
            .and_then(|s| s.genotype())
            .map(Zygosity::from_gt)
            .unwrap_or(Zygosity::Unknown)
    }
}

/// Zygosity derived from a GT field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Zygosity {
    HomozygousReference,
    Heterozygous,
    HomozygousAlternate,
    Hemizygous,
    Unknown,
}

impl Zygosity {
    /// Parse from a GT value such as "0/1", "1|1" or "1"
    pub fn from_gt(gt: &str) -> Self {
        let alleles: Vec<&str> = gt.split(['/', '|']).collect();

        if alleles.iter().any(|a| *a == "." || a.is_empty()) {
            return Zygosity::Unknown;
        }

        match alleles.as_slice() {
            [single] => {
                if *single == "0" {
                    Zygosity::HomozygousReference
                } else {
                    Zygosity::Hemizygous
                }
            }
            [a, b] => {
                if a == b {
                    if *a == "0" {
                        Zygosity::HomozygousReference
                    } else {
                        Zygosity::HomozygousAlternate
                    }
                } else {
                    Zygosity::Heterozygous
                }
            }
            _ => Zygosity::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Zygosity::HomozygousReference => "homozygous reference",
            Zygosity::Heterozygous => "heterozygous",
            Zygosity::HomozygousAlternate => "homozygous alternate",
            Zygosity::Hemizygous => "hemizygous",
            Zygosity::Unknown => "unknown",
        }
    }
}

/// Patient details supplied by the caller
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatientContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patient_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sex: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub lifestyle: Vec<String>,
}

/// A pathogenic / likely pathogenic finding resolved against the knowledge base
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClinicalInterpretation {
    pub variant_key: VariantKey,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rsid: Option<String>,
    pub zygosity: Zygosity,
    pub quality: f64,
    #[serde(flatten)]
    pub definition: ClinicalVariantDefinition,
}

/// A pharmacogenetic finding resolved against the knowledge base
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PharmacogeneticInterpretation {
    pub variant_key: VariantKey,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rsid: Option<String>,
    pub zygosity: Zygosity,
    #[serde(flatten)]
    pub definition: PharmacogeneticVariantDefinition,
}

/// Overall risk level, ordered from lowest to highest
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RiskLevel {
    #[default]
    #[serde(rename = "baseline population")]
    BaselinePopulation,
    #[serde(rename = "moderate (pharmacogenetic)")]
    ModeratePharmacogenetic,
    #[serde(rename = "moderately elevated")]
    ModeratelyElevated,
    #[serde(rename = "high")]
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::BaselinePopulation => "baseline population",
            RiskLevel::ModeratePharmacogenetic => "moderate (pharmacogenetic)",
            RiskLevel::ModeratelyElevated => "moderately elevated",
            RiskLevel::High => "high",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl PartialEq<&str> for RiskLevel {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HighPenetranceDisease {
    pub gene: String,
    pub disease: String,
    pub penetrance: String,
    pub inheritance: String,
    pub clinical_action: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PharmacogeneticConsideration {
    pub gene: String,
    pub drugs: Vec<String>,
    pub phenotype: String,
    pub recommendation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReproductiveRisk {
    pub gene: String,
    pub disease: String,
    pub inheritance: String,
    pub risk: String,
}

/// Aggregated risk profile
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub overall_risk_level: RiskLevel,
    pub high_penetrance_diseases: Vec<HighPenetranceDisease>,
    pub pharmacogenetic_considerations: Vec<PharmacogeneticConsideration>,
    pub reproductive_risks: Vec<ReproductiveRisk>,
    pub surveillance_recommendations: Vec<String>,
    pub lifestyle_recommendations: Vec<String>,
}

/// Analysis outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisStatus {
    Completed,
    Failed,
}

/// Input and technical metadata attached to every result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisMetadata {
    /// Declared format version, e.g. "VCFv4.2"
    pub file_format: Option<String>,
    pub reference_genome: Option<String>,
    pub sample_names: Vec<String>,
    pub file_size: Option<u64>,
    pub source_file: Option<String>,
    pub sha256: Option<String>,
    /// Set when the record limit stopped the parse early
    pub truncated: bool,
    pub record_limit: usize,
    pub records_parsed: usize,
    pub skipped_lines: usize,
    pub dropped_low_quality: usize,
    pub contig_count: usize,
    pub info_fields: Vec<String>,
    pub analyzer_version: String,
}

/// Top-level pipeline output
///
/// Built only through [`AnalysisResult::completed`] or [`AnalysisResult::failed`],
/// so a result is never half success and half failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub analysis_id: String,
    pub timestamp: DateTime<Utc>,
    pub status: AnalysisStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patient: Option<PatientContext>,
    pub total_variants: usize,
    pub pathogenic_variants: Vec<VariantRecord>,
    pub likely_pathogenic_variants: Vec<VariantRecord>,
    pub pharmacogenetic_variants: Vec<VariantRecord>,
    pub trait_variants: Vec<VariantRecord>,
    pub benign_variants: Vec<VariantRecord>,
    pub uncertain_variants: Vec<VariantRecord>,
    pub clinical_interpretations: Vec<ClinicalInterpretation>,
    pub pharmacogenetic_interpretations: Vec<PharmacogeneticInterpretation>,
    pub risk_assessment: RiskAssessment,
    pub recommendations: Vec<String>,
    pub urgent_flags: Vec<String>,
    pub icd10_codes: Vec<String>,
    pub confidence_score: f64,
    pub metadata: AnalysisMetadata,
}

/// Everything a completed analysis carries besides id/timestamp
#[derive(Debug, Clone)]
pub struct AnalysisFindings {
    pub total_variants: usize,
    pub pathogenic_variants: Vec<VariantRecord>,
    pub likely_pathogenic_variants: Vec<VariantRecord>,
    pub pharmacogenetic_variants: Vec<VariantRecord>,
    pub trait_variants: Vec<VariantRecord>,
    pub benign_variants: Vec<VariantRecord>,
    pub uncertain_variants: Vec<VariantRecord>,
    pub clinical_interpretations: Vec<ClinicalInterpretation>,
    pub pharmacogenetic_interpretations: Vec<PharmacogeneticInterpretation>,
    pub risk_assessment: RiskAssessment,
    pub recommendations: Vec<String>,
    pub urgent_flags: Vec<String>,
    pub icd10_codes: Vec<String>,
    pub confidence_score: f64,
}

impl AnalysisResult {
    pub fn completed(
        analysis_id: String,
        patient: Option<PatientContext>,
        findings: AnalysisFindings,
        metadata: AnalysisMetadata,
    ) -> Self {
        Self {
            analysis_id,
            timestamp: Utc::now(),
            status: AnalysisStatus::Completed,
            error: None,
            patient,
            total_variants: findings.total_variants,
            pathogenic_variants: findings.pathogenic_variants,
            likely_pathogenic_variants: findings.likely_pathogenic_variants,
            pharmacogenetic_variants: findings.pharmacogenetic_variants,
            trait_variants: findings.trait_variants,
            benign_variants: findings.benign_variants,
            uncertain_variants: findings.uncertain_variants,
            clinical_interpretations: findings.clinical_interpretations,
            pharmacogenetic_interpretations: findings.pharmacogenetic_interpretations,
            risk_assessment: findings.risk_assessment,
            recommendations: findings.recommendations,
            urgent_flags: findings.urgent_flags,
            icd10_codes: findings.icd10_codes,
            confidence_score: findings.confidence_score,
            metadata,
        }
    }

    /// Zeroed statistics plus the error message
    pub fn failed(
        analysis_id: String,
        patient: Option<PatientContext>,
        error: impl Into<String>,
        metadata: AnalysisMetadata,
    ) -> Self {
        Self {
            analysis_id,
            timestamp: Utc::now(),
            status: AnalysisStatus::Failed,
            error: Some(error.into()),
            patient,
            total_variants: 0,
            pathogenic_variants: Vec::new(),
            likely_pathogenic_variants: Vec::new(),
            pharmacogenetic_variants: Vec::new(),
            trait_variants: Vec::new(),
            benign_variants: Vec::new(),
            uncertain_variants: Vec::new(),
            clinical_interpretations: Vec::new(),
            pharmacogenetic_interpretations: Vec::new(),
            risk_assessment: RiskAssessment::default(),
            recommendations: Vec::new(),
            urgent_flags: Vec::new(),
            icd10_codes: Vec::new(),
            confidence_score: 0.0,
            metadata,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == AnalysisStatus::Completed
    }

    /// Bucket name → variants, in report order
    pub fn buckets(&self) -> [(&'static str, &[VariantRecord]); 6] {
        [
            ("pathogenic", &self.pathogenic_variants),
            ("likely_pathogenic", &self.likely_pathogenic_variants),
            ("pharmacogenetic", &self.pharmacogenetic_variants),
            ("trait", &self.trait_variants),
            ("benign", &self.benign_variants),
            ("uncertain", &self.uncertain_variants),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_info_value_coercion_order() {
        assert_eq!(InfoValue::coerce("0.5"), InfoValue::Float(0.5));
        assert_eq!(InfoValue::coerce("50"), InfoValue::Int(50));
        assert_eq!(InfoValue::coerce("abc"), InfoValue::Str("abc".to_string()));
        // Dotted but not a float stays a string
        assert_eq!(
            InfoValue::coerce("0.1,0.2"),
            InfoValue::Str("0.1,0.2".to_string())
        );
        assert_eq!(InfoValue::coerce("1e-5"), InfoValue::Str("1e-5".to_string()));
    }

    #[test]
    fn test_info_value_numeric_view() {
        assert_eq!(InfoValue::Int(3).as_f64(), Some(3.0));
        assert_eq!(InfoValue::Str("1e-5".to_string()).as_f64(), Some(1e-5));
        assert_eq!(InfoValue::Flag(true).as_f64(), None);
        assert_eq!(InfoValue::Str("n/a".to_string()).as_f64(), None);
    }

    #[test]
    fn test_non_finite_info_values() {
        assert_eq!(InfoValue::coerce("1.0e999"), InfoValue::Str("1.0e999".to_string()));
        assert_eq!(InfoValue::coerce("inf"), InfoValue::Str("inf".to_string()));
        assert_eq!(InfoValue::coerce("inf").as_f64(), None);
        assert_eq!(InfoValue::Str("NaN".to_string()).as_f64(), None);
        assert_eq!(InfoValue::Float(f64::INFINITY).as_f64(), None);
    }

    #[test]
    fn test_variant_key_round_trip() {
        let key: VariantKey = "17:43094464:C:T".parse().unwrap();
        assert_eq!(key.chromosome, "17");
        assert_eq!(key.position, 43094464);
        assert_eq!(key.to_string(), "17:43094464:C:T");

        assert!("17:abc:C:T".parse::<VariantKey>().is_err());
        assert!("17:100:C".parse::<VariantKey>().is_err());
    }

    #[test]
    fn test_zygosity_from_gt() {
        assert_eq!(Zygosity::from_gt("0/1"), Zygosity::Heterozygous);
        assert_eq!(Zygosity::from_gt("1|0"), Zygosity::Heterozygous);
        assert_eq!(Zygosity::from_gt("1/1"), Zygosity::HomozygousAlternate);
        assert_eq!(Zygosity::from_gt("0|0"), Zygosity::HomozygousReference);
        assert_eq!(Zygosity::from_gt("1"), Zygosity::Hemizygous);
        assert_eq!(Zygosity::from_gt("./."), Zygosity::Unknown);
    }

    #[test]
    fn test_risk_level_ordering_and_serde() {
        assert!(RiskLevel::High > RiskLevel::ModeratelyElevated);
        assert!(RiskLevel::ModeratelyElevated > RiskLevel::ModeratePharmacogenetic);
        assert!(RiskLevel::ModeratePharmacogenetic > RiskLevel::BaselinePopulation);

        let json = serde_json::to_string(&RiskLevel::ModeratePharmacogenetic).unwrap();
        assert_eq!(json, "\"moderate (pharmacogenetic)\"");
        assert!(RiskLevel::High == "high");
    }

    #[test]
    fn test_failed_result_is_zeroed() {
        let result = AnalysisResult::failed(
            "id-1".to_string(),
            None,
            "Invalid VCF format",
            AnalysisMetadata::default(),
        );

        assert!(!result.is_success());
        assert_eq!(result.total_variants, 0);
        assert_eq!(result.confidence_score, 0.0);
        assert!(result.buckets().iter().all(|(_, v)| v.is_empty()));
        assert_eq!(result.error.as_deref(), Some("Invalid VCF format"));
    }
}
