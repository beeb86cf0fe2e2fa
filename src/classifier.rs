// ==============================================================================
// classifier.rs - Variant Classification
// ==============================================================================
// Description: Partitions parsed variants into six disjoint clinical buckets
// Author: Matt Barham
// Created: 2026-10-18
// Modified: 2026-10-18
// Version: 1.0.0
// ==============================================================================
// Rule order (first match wins):
//   1. key in pathogenic table      → pathogenic / likely_pathogenic (by tier)
//   2. key in pharmacogenetic table → pharmacogenetic
//   3. key in trait table           → trait
//   4. QUAL < min_quality           → dropped
//   5. population frequency > benign_frequency → benign
//   6. otherwise                    → uncertain
// ==============================================================================

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::knowledge_base::{KnowledgeBase, Pathogenicity};
use crate::models::VariantRecord;

/// INFO fields consulted for population frequency, highest priority first
pub const FREQUENCY_FIELDS: [&str; 5] = ["AF", "MAF", "gnomAD_AF", "ExAC_AF", "1000G_AF"];

/// Classification thresholds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Unmatched variants below this QUAL are dropped
    pub min_quality: f64,
    /// Unmatched variants above this frequency are benign
    pub benign_frequency: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            min_quality: 10.0,
            benign_frequency: 0.01,
        }
    }
}

/// Bucket a variant lands in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariantClass {
    Pathogenic,
    LikelyPathogenic,
    Pharmacogenetic,
    Trait,
    Benign,
    Uncertain,
}

impl VariantClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            VariantClass::Pathogenic => "pathogenic",
            VariantClass::LikelyPathogenic => "likely_pathogenic",
            VariantClass::Pharmacogenetic => "pharmacogenetic",
            VariantClass::Trait => "trait",
            VariantClass::Benign => "benign",
            VariantClass::Uncertain => "uncertain",
        }
    }
}

/// Six pairwise-disjoint buckets plus the quality-gate drop count
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassificationResult {
    pub pathogenic: Vec<VariantRecord>,
    pub likely_pathogenic: Vec<VariantRecord>,
    pub pharmacogenetic: Vec<VariantRecord>,
    pub traits: Vec<VariantRecord>,
    pub benign: Vec<VariantRecord>,
    pub uncertain: Vec<VariantRecord>,
    pub dropped_low_quality: usize,
}

impl ClassificationResult {
    /// Variants held across all six buckets
    pub fn classified_count(&self) -> usize {
        self.buckets().iter().map(|(_, v)| v.len()).sum()
    }

    /// Classified plus dropped; equals the classifier's input size
    pub fn total(&self) -> usize {
        self.classified_count() + self.dropped_low_quality
    }

    pub fn buckets(&self) -> [(VariantClass, &[VariantRecord]); 6] {
        [
            (VariantClass::Pathogenic, &self.pathogenic),
            (VariantClass::LikelyPathogenic, &self.likely_pathogenic),
            (VariantClass::Pharmacogenetic, &self.pharmacogenetic),
            (VariantClass::Trait, &self.traits),
            (VariantClass::Benign, &self.benign),
            (VariantClass::Uncertain, &self.uncertain),
        ]
    }

    /// Count of classified variants with QUAL ≥ `threshold`
    pub fn count_quality_at_least(&self, threshold: f64) -> usize {
        self.buckets()
            .iter()
            .flat_map(|(_, v)| v.iter())
            .filter(|v| v.quality >= threshold)
            .count()
    }

    fn push(&mut self, class: VariantClass, variant: VariantRecord) {
        match class {
            VariantClass::Pathogenic => self.pathogenic.push(variant),
            VariantClass::LikelyPathogenic => self.likely_pathogenic.push(variant),
            VariantClass::Pharmacogenetic => self.pharmacogenetic.push(variant),
            VariantClass::Trait => self.traits.push(variant),
            VariantClass::Benign => self.benign.push(variant),
            VariantClass::Uncertain => self.uncertain.push(variant),
        }
    }
}

/// Deterministic rule-based classifier
#[derive(Debug, Clone, Copy, Default)]
pub struct VariantClassifier {
    pub config: ClassifierConfig,
}

impl VariantClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    /// Classify one variant; `None` means dropped by the quality gate
    pub fn classify_variant(&self, variant: &VariantRecord, kb: &KnowledgeBase) -> Option<VariantClass> {
        let key = variant.key();

        if let Some(definition) = kb.pathogenic(&key) {
            return Some(match definition.pathogenicity {
                Pathogenicity::Pathogenic => VariantClass::Pathogenic,
                Pathogenicity::LikelyPathogenic => VariantClass::LikelyPathogenic,
            });
        }

        if kb.pharmacogenetic(&key).is_some() {
            return Some(VariantClass::Pharmacogenetic);
        }

        if kb.trait_variant(&key).is_some() {
            return Some(VariantClass::Trait);
        }

        if variant.quality < self.config.min_quality {
            return None;
        }

        if population_frequency(variant) > self.config.benign_frequency {
            Some(VariantClass::Benign)
        } else {
            Some(VariantClass::Uncertain)
        }
    }

    /// Partition all variants; consumes the records
    pub fn classify(&self, variants: Vec<VariantRecord>, kb: &KnowledgeBase) -> ClassificationResult {
        let input_count = variants.len();
        let mut result = ClassificationResult::default();

        for variant in variants {
            match self.classify_variant(&variant, kb) {
                Some(class) => result.push(class, variant),
                None => {
                    debug!(
                        "Dropping low-quality variant {} (QUAL {:.1})",
                        variant.key(),
                        variant.quality
                    );
                    result.dropped_low_quality += 1;
                }
            }
        }

        debug_assert_eq!(result.total(), input_count);

        info!(
            "Classified {} variants: {} pathogenic, {} likely pathogenic, {} pharmacogenetic, {} trait, {} benign, {} uncertain, {} dropped",
            input_count,
            result.pathogenic.len(),
            result.likely_pathogenic.len(),
            result.pharmacogenetic.len(),
            result.traits.len(),
            result.benign.len(),
            result.uncertain.len(),
            result.dropped_low_quality
        );

        result
    }
}

/// First numeric value among FREQUENCY_FIELDS, else 0.0
pub fn population_frequency(variant: &VariantRecord) -> f64 {
    FREQUENCY_FIELDS
        .iter()
        .find_map(|field| variant.info_value(field).and_then(|v| v.as_f64()))
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge_base::{ClinicalVariantDefinition, PharmacogeneticVariantDefinition};
    use crate::models::InfoValue;

    fn record(chrom: &str, pos: u64, r: &str, a: &str, quality: f64, info: Vec<(&str, InfoValue)>) -> VariantRecord {
        VariantRecord {
            chromosome: chrom.to_string(),
            position: pos,
            id: ".".to_string(),
            ref_allele: r.to_string(),
            alt_allele: a.to_string(),
            quality,
            filter: "PASS".to_string(),
            info: info.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
            format: String::new(),
            samples: Vec::new(),
        }
    }

    fn classifier() -> VariantClassifier {
        VariantClassifier::default()
    }

    #[test]
    fn test_knowledge_base_matches() {
        let kb = KnowledgeBase::builtin();
        let c = classifier();

        let brca1 = record("17", 43094464, "C", "T", 100.0, vec![]);
        assert_eq!(c.classify_variant(&brca1, &kb), Some(VariantClass::Pathogenic));

        let ldlr = record("19", 11105436, "G", "A", 100.0, vec![]);
        assert_eq!(c.classify_variant(&ldlr, &kb), Some(VariantClass::LikelyPathogenic));

        let cyp2c19 = record("10", 94781859, "G", "A", 100.0, vec![]);
        assert_eq!(c.classify_variant(&cyp2c19, &kb), Some(VariantClass::Pharmacogenetic));

        let lct = record("2", 135851076, "G", "A", 100.0, vec![]);
        assert_eq!(c.classify_variant(&lct, &kb), Some(VariantClass::Trait));
    }

    #[test]
    fn test_knowledge_base_match_ignores_quality_gate() {
        let kb = KnowledgeBase::builtin();
        let low_quality_brca1 = record("17", 43094464, "C", "T", 2.0, vec![]);
        assert_eq!(
            classifier().classify_variant(&low_quality_brca1, &kb),
            Some(VariantClass::Pathogenic)
        );
    }

    #[test]
    fn test_pathogenic_beats_pharmacogenetic() {
        let kb = KnowledgeBase::builder()
            .pathogenic(
                "1:100:A:G",
                ClinicalVariantDefinition {
                    gene: "GENE1".to_string(),
                    variant: "c.1A>G".to_string(),
                    pathogenicity: Pathogenicity::Pathogenic,
                    disease: "Test disease".to_string(),
                    inheritance: "Autosomal dominant".to_string(),
                    penetrance: "High".to_string(),
                    clinical_action: "Refer".to_string(),
                    evidence_level: "test".to_string(),
                    population_frequency: None,
                },
            )
            .pharmacogenetic(
                "1:100:A:G",
                PharmacogeneticVariantDefinition {
                    gene: "GENE1".to_string(),
                    variant: "GENE1*2".to_string(),
                    drugs: vec!["warfarin".to_string()],
                    phenotype: "Poor metabolizer".to_string(),
                    recommendation: "Reduce dose".to_string(),
                    evidence_level: "test".to_string(),
                },
            )
            .build()
            .unwrap();

        let result = classifier().classify(vec![record("1", 100, "A", "G", 50.0, vec![])], &kb);
        assert_eq!(result.pathogenic.len(), 1);
        assert!(result.pharmacogenetic.is_empty());
    }

    #[test]
    fn test_low_quality_unmatched_is_dropped() {
        let kb = KnowledgeBase::builtin();
        let result = classifier().classify(vec![record("3", 500, "A", "C", 8.0, vec![])], &kb);

        assert_eq!(result.classified_count(), 0);
        assert_eq!(result.dropped_low_quality, 1);
        assert_eq!(result.total(), 1);
    }

    #[test]
    fn test_frequency_threshold() {
        let kb = KnowledgeBase::builtin();
        let c = classifier();

        let common = record("3", 500, "A", "C", 50.0, vec![("AF", InfoValue::Float(0.05))]);
        assert_eq!(c.classify_variant(&common, &kb), Some(VariantClass::Benign));

        let exactly_threshold = record("3", 501, "A", "C", 50.0, vec![("AF", InfoValue::Float(0.01))]);
        assert_eq!(c.classify_variant(&exactly_threshold, &kb), Some(VariantClass::Uncertain));

        let no_frequency = record("3", 502, "A", "C", 50.0, vec![("DP", InfoValue::Int(40))]);
        assert_eq!(c.classify_variant(&no_frequency, &kb), Some(VariantClass::Uncertain));
    }

    #[test]
    fn test_frequency_field_priority() {
        // Unparseable AF is skipped; MAF is the first numeric field
        let variant = record(
            "3",
            500,
            "A",
            "C",
            50.0,
            vec![
                ("gnomAD_AF", InfoValue::Float(0.3)),
                ("AF", InfoValue::Str("0.1,0.2".to_string())),
                ("MAF", InfoValue::Float(0.002)),
            ],
        );
        assert_eq!(population_frequency(&variant), 0.002);

        let flag_only = record("3", 500, "A", "C", 50.0, vec![("AF", InfoValue::Flag(true))]);
        assert_eq!(population_frequency(&flag_only), 0.0);

        let integer = record("3", 500, "A", "C", 50.0, vec![("1000G_AF", InfoValue::Int(1))]);
        assert_eq!(population_frequency(&integer), 1.0);
    }

    #[test]
    fn test_partition_invariant() {
        let kb = KnowledgeBase::builtin();
        let variants = vec![
            record("17", 43094464, "C", "T", 100.0, vec![]),
            record("19", 11105436, "G", "A", 40.0, vec![]),
            record("22", 42128945, "C", "T", 60.0, vec![]),
            record("2", 135851076, "G", "A", 60.0, vec![]),
            record("4", 1, "A", "T", 5.0, vec![]),
            record("4", 2, "A", "T", 35.0, vec![("AF", InfoValue::Float(0.4))]),
            record("4", 3, "A", "T", 35.0, vec![("AF", InfoValue::Float(0.0001))]),
            record("4", 4, "A", "T", 9.99, vec![("AF", InfoValue::Float(0.4))]),
        ];
        let input_count = variants.len();

        let result = classifier().classify(variants, &kb);

        assert_eq!(result.total(), input_count);
        assert_eq!(result.dropped_low_quality, 2);
        for (class, bucket) in result.buckets() {
            assert_eq!(bucket.len(), 1, "bucket {}", class.as_str());
        }

        // Pairwise disjoint: every key appears once across buckets
        let mut keys: Vec<String> = result
            .buckets()
            .iter()
            .flat_map(|(_, v)| v.iter().map(|r| r.key().to_string()))
            .collect();
        let before = keys.len();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), before);

        assert_eq!(result.count_quality_at_least(30.0), 6);
    }

    #[test]
    fn test_deterministic() {
        let kb = KnowledgeBase::builtin();
        let variants = vec![
            record("17", 43094464, "C", "T", 100.0, vec![]),
            record("4", 2, "A", "T", 35.0, vec![("AF", InfoValue::Float(0.4))]),
        ];

        let a = classifier().classify(variants.clone(), &kb);
        let b = classifier().classify(variants, &kb);
        assert_eq!(a, b);
    }
}
