// ==============================================================================
// recommendations.rs - Recommendation Engine
// ==============================================================================
// Description: Recommendations, urgent flags, ICD-10 codes and confidence score
// Author: Matt Barham
// Created: 2026-10-18
// Modified: 2026-10-18
// Version: 1.1.0
// ==============================================================================
// Confidence:
//   base 0.7, +0.2 any pathogenic, +0.1 any likely pathogenic,
//   +0.05 any pharmacogenetic, then × (0.8 + 0.2 × high_quality / total),
//   clamped to [0, 1]. `total` includes quality-gate drops.
// ==============================================================================

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::{debug, info};

use crate::classifier::ClassificationResult;
use crate::knowledge_base::Pathogenicity;
use crate::models::{ClinicalInterpretation, PharmacogeneticInterpretation};

/// QUAL at or above this counts toward the data-quality factor
pub const HIGH_QUALITY_THRESHOLD: f64 = 30.0;

const BASE_CONFIDENCE: f64 = 0.7;

/// Disease-name substring → ICD-10 codes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IcdMapping {
    /// Lowercase substring matched against the disease name
    pub pattern: String,
    pub codes: Vec<String>,
}

/// Templates and allowlists driving the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommendationRules {
    /// Actionable gene → gene-specific recommendations
    pub gene_templates: BTreeMap<String, Vec<String>>,
    /// Genes whose pathogenic findings raise a cancer-risk urgent flag,
    /// one per finding
    pub oncogenes: Vec<String>,
    /// Drugs whose pharmacogenetic interactions raise an urgent flag, one per finding
    pub high_risk_drugs: Vec<String>,
    /// Checked in order; codes are deduplicated
    pub icd10: Vec<IcdMapping>,
}

impl Default for RecommendationRules {
    fn default() -> Self {
        let gene_templates = [
            (
                "BRCA1",
                &[
                    "Annual breast MRI starting at age 25 and mammography from age 30",
                    "Discuss risk-reducing salpingo-oophorectomy between ages 35 and 40",
                    "Offer cascade testing to first-degree relatives",
                ][..],
            ),
            (
                "BRCA2",
                &[
                    "Annual breast MRI starting at age 25 and mammography from age 30",
                    "Discuss risk-reducing salpingo-oophorectomy between ages 40 and 45",
                    "Offer cascade testing to first-degree relatives",
                ][..],
            ),
            (
                "TP53",
                &[
                    "Enroll in Li-Fraumeni surveillance (Toronto protocol)",
                    "Minimize exposure to ionizing radiation, including CT imaging",
                ][..],
            ),
            (
                "CFTR",
                &[
                    "Offer carrier testing to reproductive partner",
                    "Preconception genetic counseling",
                ][..],
            ),
            (
                "HFE",
                &["Check serum ferritin and transferrin saturation", "Avoid iron and vitamin C supplements"][..],
            ),
            (
                "LDLR",
                &[
                    "Obtain fasting lipid panel and start lipid-lowering therapy if indicated",
                    "Offer cascade cholesterol testing to first-degree relatives",
                ][..],
            ),
            (
                "MLH1",
                &["Colonoscopy every 1-2 years starting at age 20-25", "Consider prophylactic hysterectomy after childbearing"][..],
            ),
            (
                "MSH2",
                &["Colonoscopy every 1-2 years starting at age 20-25", "Consider prophylactic hysterectomy after childbearing"][..],
            ),
        ]
        .into_iter()
        .map(|(gene, lines)| (gene.to_string(), lines.iter().map(|l| l.to_string()).collect()))
        .collect();

        let oncogenes = [
            "BRCA1", "BRCA2", "TP53", "MLH1", "MSH2", "MSH6", "PMS2", "APC", "PTEN", "CDH1", "STK11", "PALB2",
            "ATM", "CHEK2",
        ];

        let high_risk_drugs = [
            "warfarin",
            "clopidogrel",
            "abacavir",
            "carbamazepine",
            "fluorouracil",
            "capecitabine",
            "codeine",
            "allopurinol",
            "simvastatin",
            "mercaptopurine",
            "azathioprine",
            "tamoxifen",
        ];

        let icd10 = [
            ("breast", &["Z15.01", "Z80.3"][..]),
            ("ovarian", &["Z15.02", "Z80.41"][..]),
            ("li-fraumeni", &["Z15.89", "Z80.9"][..]),
            ("lynch", &["Z15.09", "Z80.0"][..]),
            ("cystic fibrosis", &["E84.9"][..]),
            ("hemochromatosis", &["E83.110"][..]),
            ("hypercholesterolemia", &["E78.01"][..]),
            ("diabetes", &["E11.9"][..]),
        ]
        .into_iter()
        .map(|(pattern, codes)| IcdMapping {
            pattern: pattern.to_string(),
            codes: codes.iter().map(|c| c.to_string()).collect(),
        })
        .collect();

        Self {
            gene_templates,
            oncogenes: oncogenes.iter().map(|g| g.to_string()).collect(),
            high_risk_drugs: high_risk_drugs.iter().map(|d| d.to_string()).collect(),
            icd10,
        }
    }
}

impl RecommendationRules {
    /// Load rules from a JSON file; omitted sections keep their defaults
    pub fn from_json_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).with_context(|| format!("Failed to open rules file {}", path.display()))?;
        let rules: Self = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Failed to parse rules file {}", path.display()))?;

        info!(
            "Loaded recommendation rules from {} ({} gene templates, {} ICD-10 mappings)",
            path.display(),
            rules.gene_templates.len(),
            rules.icd10.len()
        );
        Ok(rules)
    }
}

/// Output of one `recommend` call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecommendationSet {
    pub recommendations: Vec<String>,
    pub urgent_flags: Vec<String>,
    pub icd10_codes: Vec<String>,
    pub confidence: f64,
}

#[derive(Debug, Clone, Default)]
pub struct RecommendationEngine {
    rules: RecommendationRules,
}

impl RecommendationEngine {
    pub fn new(rules: RecommendationRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &RecommendationRules {
        &self.rules
    }

    pub fn recommend(
        &self,
        classification: &ClassificationResult,
        clinical: &[ClinicalInterpretation],
        pharmacogenetic: &[PharmacogeneticInterpretation],
    ) -> RecommendationSet {
        let set = RecommendationSet {
            recommendations: self.recommendations(classification, clinical, pharmacogenetic),
            urgent_flags: self.urgent_flags(classification, clinical, pharmacogenetic),
            icd10_codes: self.icd10_codes(clinical),
            confidence: confidence(classification),
        };

        debug!(
            "Recommendations: {} items, {} urgent flags, {} ICD-10 codes, confidence {:.3}",
            set.recommendations.len(),
            set.urgent_flags.len(),
            set.icd10_codes.len(),
            set.confidence
        );

        set
    }

    fn recommendations(
        &self,
        classification: &ClassificationResult,
        clinical: &[ClinicalInterpretation],
        pharmacogenetic: &[PharmacogeneticInterpretation],
    ) -> Vec<String> {
        let mut items = Vec::new();

        for interpretation in clinical {
            if let Some(lines) = self.rules.gene_templates.get(&interpretation.definition.gene) {
                push_unique(&mut items, lines.iter().cloned());
            }
        }

        if !classification.pathogenic.is_empty() {
            push_unique(
                &mut items,
                [
                    "Urgent referral to clinical genetics for confirmatory testing and counseling",
                    "Genetic counseling for at-risk family members",
                    "Establish a personalized surveillance plan with the care team",
                ]
                .map(String::from),
            );
        }

        if !classification.likely_pathogenic.is_empty() {
            push_unique(
                &mut items,
                [
                    "Referral to clinical genetics to review likely pathogenic findings",
                    "Consider additional or confirmatory genetic testing",
                ]
                .map(String::from),
            );
        }

        if !classification.pharmacogenetic.is_empty() {
            push_unique(
                &mut items,
                [
                    "Share pharmacogenetic results with all prescribing clinicians",
                    "Consider a medical alert bracelet listing affected medications",
                ]
                .map(String::from),
            );

            for interpretation in pharmacogenetic {
                let definition = &interpretation.definition;
                if definition.recommendation.to_lowercase().contains("contraindicated") {
                    push_unique(
                        &mut items,
                        std::iter::once(format!("{}: {}", definition.gene, definition.recommendation)),
                    );
                }
            }
        }

        if items.is_empty() {
            push_unique(
                &mut items,
                [
                    "No actionable variants identified; continue age-appropriate preventive care",
                    "Revisit results if personal or family history changes",
                ]
                .map(String::from),
            );
        }

        items
    }

    fn urgent_flags(
        &self,
        classification: &ClassificationResult,
        clinical: &[ClinicalInterpretation],
        pharmacogenetic: &[PharmacogeneticInterpretation],
    ) -> Vec<String> {
        let mut flags = Vec::new();

        if !classification.pathogenic.is_empty() {
            flags.push(format!(
                "URGENT: {} pathogenic variant(s) detected, genetic counseling required",
                classification.pathogenic.len()
            ));
        }

        for interpretation in clinical
            .iter()
            .filter(|c| c.definition.pathogenicity == Pathogenicity::Pathogenic)
        {
            let gene = &interpretation.definition.gene;
            if self.rules.oncogenes.iter().any(|g| g.eq_ignore_ascii_case(gene)) {
                flags.push(format!(
                    "URGENT: {} {} confers hereditary cancer risk",
                    gene, interpretation.definition.variant
                ));
            }
        }

        for interpretation in pharmacogenetic {
            let affected: Vec<&str> = interpretation
                .definition
                .drugs
                .iter()
                .filter(|drug| self.rules.high_risk_drugs.iter().any(|d| d.eq_ignore_ascii_case(drug)))
                .map(String::as_str)
                .collect();

            if !affected.is_empty() {
                flags.push(format!(
                    "URGENT: {} affects high-risk medication(s): {}",
                    interpretation.definition.variant,
                    affected.join(", ")
                ));
            }
        }

        flags
    }

    fn icd10_codes(&self, clinical: &[ClinicalInterpretation]) -> Vec<String> {
        let mut codes = Vec::new();
        for interpretation in clinical {
            let disease = interpretation.definition.disease.to_lowercase();
            for mapping in &self.rules.icd10 {
                if disease.contains(&mapping.pattern.to_lowercase()) {
                    push_unique(&mut codes, mapping.codes.iter().cloned());
                }
            }
        }
        codes
    }
}

/// Confidence score in [0, 1]
pub fn confidence(classification: &ClassificationResult) -> f64 {
    let mut score = BASE_CONFIDENCE;
    if !classification.pathogenic.is_empty() {
        score += 0.2;
    }
    if !classification.likely_pathogenic.is_empty() {
        score += 0.1;
    }
    if !classification.pharmacogenetic.is_empty() {
        score += 0.05;
    }

    let total = classification.total();
    let high_quality_ratio = if total == 0 {
        0.0
    } else {
        classification.count_quality_at_least(HIGH_QUALITY_THRESHOLD) as f64 / total as f64
    };

    (score * (0.8 + 0.2 * high_quality_ratio)).clamp(0.0, 1.0)
}

fn push_unique(items: &mut Vec<String>, new: impl IntoIterator<Item = String>) {
    for item in new {
        if !items.contains(&item) {
            items.push(item);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge_base::KnowledgeBase;
    use crate::models::{VariantKey, VariantRecord, Zygosity};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn record(key: &str, quality: f64) -> VariantRecord {
        let key: VariantKey = key.parse().unwrap();
        VariantRecord {
            chromosome: key.chromosome,
            position: key.position,
            id: ".".to_string(),
            ref_allele: key.ref_allele,
            alt_allele: key.alt_allele,
            quality,
            filter: "PASS".to_string(),
            info: Vec::new(),
            format: String::new(),
            samples: Vec::new(),
        }
    }

    fn clinical(key: &str) -> ClinicalInterpretation {
        let kb = KnowledgeBase::builtin();
        let variant_key: VariantKey = key.parse().unwrap();
        ClinicalInterpretation {
            definition: kb.pathogenic(&variant_key).unwrap().clone(),
            variant_key,
            rsid: None,
            zygosity: Zygosity::Heterozygous,
            quality: 100.0,
        }
    }

    fn pgx(key: &str) -> PharmacogeneticInterpretation {
        let kb = KnowledgeBase::builtin();
        let variant_key: VariantKey = key.parse().unwrap();
        PharmacogeneticInterpretation {
            definition: kb.pharmacogenetic(&variant_key).unwrap().clone(),
            variant_key,
            rsid: None,
            zygosity: Zygosity::Heterozygous,
        }
    }

    #[test]
    fn test_pathogenic_brca1() {
        let mut classification = ClassificationResult::default();
        classification.pathogenic.push(record("17:43094464:C:T", 100.0));

        let set = RecommendationEngine::default().recommend(&classification, &[clinical("17:43094464:C:T")], &[]);

        assert_eq!(set.urgent_flags.len(), 2);
        assert!(set.urgent_flags.iter().any(|f| f.contains("BRCA1")));
        assert!(set.recommendations[0].contains("breast MRI"));
        assert!(set
            .recommendations
            .iter()
            .any(|r| r.contains("Urgent referral to clinical genetics")));
        assert_eq!(set.icd10_codes, vec!["Z15.01", "Z80.3", "Z15.02", "Z80.41"]);
        assert!((set.confidence - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_no_findings_boilerplate() {
        let mut classification = ClassificationResult::default();
        classification.benign.push(record("4:1:A:T", 50.0));

        let set = RecommendationEngine::default().recommend(&classification, &[], &[]);

        assert!(set.urgent_flags.is_empty());
        assert!(set.icd10_codes.is_empty());
        assert!(set.recommendations[0].contains("No actionable variants"));
        assert!((set.confidence - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_pharmacogenetic_contraindication_and_flags() {
        let mut classification = ClassificationResult::default();
        classification.pharmacogenetic.push(record("1:97450058:C:T", 80.0));
        classification.pharmacogenetic.push(record("6:31464003:T:G", 80.0));

        let findings = vec![pgx("1:97450058:C:T"), pgx("6:31464003:T:G")];
        let set = RecommendationEngine::default().recommend(&classification, &[], &findings);

        let contraindications: Vec<&String> = set
            .recommendations
            .iter()
            .filter(|r| r.contains("contraindicated"))
            .collect();
        assert_eq!(contraindications.len(), 2);
        assert!(set.recommendations.iter().any(|r| r.contains("prescribing clinicians")));

        assert_eq!(set.urgent_flags.len(), 2);
        assert!(set.urgent_flags[0].contains("fluorouracil, capecitabine"));
        assert!(set.urgent_flags[1].contains("abacavir"));
    }

    #[test]
    fn test_high_risk_drug_match_is_case_insensitive() {
        let rules = RecommendationRules {
            high_risk_drugs: vec!["WARFARIN".to_string()],
            ..Default::default()
        };
        let mut classification = ClassificationResult::default();
        classification.pharmacogenetic.push(record("16:31096368:C:T", 80.0));

        let set = RecommendationEngine::new(rules).recommend(&classification, &[], &[pgx("16:31096368:C:T")]);
        assert_eq!(set.urgent_flags.len(), 1);
    }

    #[test]
    fn test_urgent_flag_per_finding() {
        let mut classification = ClassificationResult::default();
        classification.pathogenic.push(record("17:43094464:C:T", 100.0));
        classification.pathogenic.push(record("17:43094464:C:T", 90.0));
        classification.pharmacogenetic.push(record("1:97450058:C:T", 80.0));
        classification.pharmacogenetic.push(record("1:97450058:C:T", 80.0));

        let clinical = vec![clinical("17:43094464:C:T"), clinical("17:43094464:C:T")];
        let findings = vec![pgx("1:97450058:C:T"), pgx("1:97450058:C:T")];
        let set = RecommendationEngine::default().recommend(&classification, &clinical, &findings);

        let cancer: Vec<&String> = set.urgent_flags.iter().filter(|f| f.contains("hereditary cancer")).collect();
        let drugs: Vec<&String> = set.urgent_flags.iter().filter(|f| f.contains("high-risk medication")).collect();
        assert_eq!(cancer.len(), 2);
        assert_eq!(drugs.len(), 2);
        assert!(set.urgent_flags[0].contains("2 pathogenic variant(s)"));
    }

    #[test]
    fn test_likely_pathogenic_not_urgent() {
        let mut classification = ClassificationResult::default();
        classification.likely_pathogenic.push(record("19:11105436:G:A", 100.0));

        let set = RecommendationEngine::default().recommend(&classification, &[clinical("19:11105436:G:A")], &[]);

        assert!(set.urgent_flags.is_empty());
        assert_eq!(set.icd10_codes, vec!["E78.01"]);
        assert!(set.recommendations.iter().any(|r| r.contains("additional")));
        assert!((set.confidence - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_confidence_bounds_and_quality_factor() {
        let empty = ClassificationResult::default();
        assert!((confidence(&empty) - 0.7 * 0.8).abs() < 1e-9);

        let mut all = ClassificationResult::default();
        all.pathogenic.push(record("17:43094464:C:T", 100.0));
        all.likely_pathogenic.push(record("19:11105436:G:A", 100.0));
        all.pharmacogenetic.push(record("22:42128945:C:T", 100.0));
        assert_eq!(confidence(&all), 1.0);

        let mut half = ClassificationResult::default();
        half.uncertain.push(record("4:1:A:T", 50.0));
        half.dropped_low_quality = 1;
        assert!((confidence(&half) - 0.7 * 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_rules_from_json_keep_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"oncogenes": ["LDLR"]}}"#).unwrap();

        let rules = RecommendationRules::from_json_path(file.path()).unwrap();
        assert_eq!(rules.oncogenes, vec!["LDLR".to_string()]);
        assert_eq!(rules.icd10, RecommendationRules::default().icd10);

        assert!(RecommendationRules::from_json_path("/nonexistent/rules.json").is_err());
    }
}
