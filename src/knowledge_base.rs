// ==============================================================================
// knowledge_base.rs - Curated Variant Knowledge Base
// ==============================================================================
// Description: Read-only clinical, pharmacogenetic and trait variant reference data
// Author: Matt Barham
// Created: 2026-10-18
// Modified: 2026-10-18
// Version: 1.1.0
// ==============================================================================
// Keys are `chromosome:position:ref:alt` on GRCh38. The built-in seed is a small
// curated extract; an equivalent ClinVar/PharmGKB extract can be loaded from
// JSON with the same shape (see KnowledgeBase::from_json_path).
// ==============================================================================

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::sync::{Arc, OnceLock};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::models::VariantKey;

/// ACMG tiers carried by pathogenic definitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Pathogenicity {
    Pathogenic,
    LikelyPathogenic,
}

impl Pathogenicity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Pathogenicity::Pathogenic => "Pathogenic",
            Pathogenicity::LikelyPathogenic => "Likely pathogenic",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClinicalVariantDefinition {
    pub gene: String,
    /// HGVS or protein label (e.g., "c.5266dupC")
    pub variant: String,
    pub pathogenicity: Pathogenicity,
    pub disease: String,
    pub inheritance: String,
    pub penetrance: String,
    pub clinical_action: String,
    pub evidence_level: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub population_frequency: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PharmacogeneticVariantDefinition {
    pub gene: String,
    /// Star allele or HGVS label (e.g., "CYP2D6*4")
    pub variant: String,
    pub drugs: Vec<String>,
    pub phenotype: String,
    pub recommendation: String,
    pub evidence_level: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraitVariantDefinition {
    pub gene: String,
    pub variant: String,
    pub phenotype: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub population_frequency: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeneDiseaseAssociation {
    pub diseases: Vec<String>,
    pub surveillance: Vec<String>,
    pub prevention: Vec<String>,
}

#[derive(Error, Debug)]
pub enum KnowledgeBaseError {
    #[error("Failed to read knowledge base: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse knowledge base JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Knowledge base contains no variant definitions")]
    Empty,

    #[error("Invalid variant key(s): {}", .0.join(", "))]
    InvalidKeys(Vec<String>),
}

/// Immutable reference tables
///
/// No mutation API is exposed after construction, so a shared
/// `Arc<KnowledgeBase>` can be read from any number of threads.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KnowledgeBase {
    #[serde(default)]
    pathogenic_variants: HashMap<VariantKey, ClinicalVariantDefinition>,
    #[serde(default)]
    pharmacogenetic_variants: HashMap<VariantKey, PharmacogeneticVariantDefinition>,
    #[serde(default)]
    trait_variants: HashMap<VariantKey, TraitVariantDefinition>,
    #[serde(default)]
    gene_disease_associations: HashMap<String, GeneDiseaseAssociation>,
}

static BUILTIN: OnceLock<Arc<KnowledgeBase>> = OnceLock::new();

impl KnowledgeBase {
    /// Process-wide built-in knowledge base (seeded on first use)
    pub fn builtin() -> Arc<KnowledgeBase> {
        BUILTIN
            .get_or_init(|| {
                let kb = seed().unwrap_or_else(|e| {
                    error!("Built-in knowledge base failed to build: {}", e);
                    KnowledgeBase::default()
                });
                info!(
                    "Built-in knowledge base loaded: {} pathogenic, {} pharmacogenetic, {} trait definitions",
                    kb.pathogenic_variants.len(),
                    kb.pharmacogenetic_variants.len(),
                    kb.trait_variants.len()
                );
                Arc::new(kb)
            })
            .clone()
    }

    pub fn builder() -> KnowledgeBaseBuilder {
        KnowledgeBaseBuilder::default()
    }

    /// Load a curated knowledge base from a JSON document
    pub fn from_json_path(path: impl AsRef<Path>) -> Result<Self, KnowledgeBaseError> {
        let file = File::open(path.as_ref())?;
        let kb = Self::from_json_reader(BufReader::new(file))?;

        info!(
            "Loaded knowledge base from {:?}: {} pathogenic, {} pharmacogenetic, {} trait definitions",
            path.as_ref(),
            kb.pathogenic_variants.len(),
            kb.pharmacogenetic_variants.len(),
            kb.trait_variants.len()
        );

        Ok(kb)
    }

    pub fn from_json_reader<R: Read>(reader: R) -> Result<Self, KnowledgeBaseError> {
        let kb: KnowledgeBase = serde_json::from_reader(reader)?;

        if kb.pathogenic_variants.is_empty()
            && kb.pharmacogenetic_variants.is_empty()
            && kb.trait_variants.is_empty()
        {
            return Err(KnowledgeBaseError::Empty);
        }

        Ok(kb)
    }

    pub fn pathogenic(&self, key: &VariantKey) -> Option<&ClinicalVariantDefinition> {
        self.pathogenic_variants.get(key)
    }

    pub fn pharmacogenetic(&self, key: &VariantKey) -> Option<&PharmacogeneticVariantDefinition> {
        self.pharmacogenetic_variants.get(key)
    }

    pub fn trait_variant(&self, key: &VariantKey) -> Option<&TraitVariantDefinition> {
        self.trait_variants.get(key)
    }

    pub fn gene_association(&self, gene: &str) -> Option<&GeneDiseaseAssociation> {
        self.gene_disease_associations.get(gene)
    }

    /// Every gene symbol referenced anywhere in the tables, sorted
    pub fn genes(&self) -> Vec<String> {
        let mut genes: Vec<String> = self
            .pathogenic_variants
            .values()
            .map(|d| d.gene.clone())
            .chain(self.pharmacogenetic_variants.values().map(|d| d.gene.clone()))
            .chain(self.trait_variants.values().map(|d| d.gene.clone()))
            .chain(self.gene_disease_associations.keys().cloned())
            .collect();
        genes.sort();
        genes.dedup();
        genes
    }

    /// True when any table holds a definition for `key`
    pub fn contains(&self, key: &VariantKey) -> bool {
        self.pathogenic_variants.contains_key(key)
            || self.pharmacogenetic_variants.contains_key(key)
            || self.trait_variants.contains_key(key)
    }

    /// Resolve a gene + variant label (e.g. "CYP2C19*2", "c.5266dupC") to its key.
    /// The label matches the full definition label or its first word.
    pub fn find_by_label(&self, gene: &str, label: &str) -> Option<VariantKey> {
        let matches = |g: &str, v: &str| {
            g == gene && (v == label || v.split_whitespace().next() == Some(label))
        };

        self.pathogenic_variants
            .iter()
            .find(|(_, d)| matches(&d.gene, &d.variant))
            .map(|(k, _)| k.clone())
            .or_else(|| {
                self.pharmacogenetic_variants
                    .iter()
                    .find(|(_, d)| matches(&d.gene, &d.variant))
                    .map(|(k, _)| k.clone())
            })
    }

    pub fn len(&self) -> usize {
        self.pathogenic_variants.len() + self.pharmacogenetic_variants.len() + self.trait_variants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One-shot constructor; consumed by `build()`, which fails on any bad key
#[derive(Debug, Default)]
pub struct KnowledgeBaseBuilder {
    kb: KnowledgeBase,
    invalid_keys: Vec<String>,
}

impl KnowledgeBaseBuilder {
    fn key(&mut self, raw: &str) -> Option<VariantKey> {
        match raw.parse() {
            Ok(key) => Some(key),
            Err(e) => {
                warn!("Rejecting knowledge base entry '{}': {}", raw, e);
                self.invalid_keys.push(raw.to_string());
                None
            }
        }
    }

    pub fn pathogenic(mut self, key: &str, definition: ClinicalVariantDefinition) -> Self {
        if let Some(key) = self.key(key) {
            self.kb.pathogenic_variants.insert(key, definition);
        }
        self
    }

    pub fn pharmacogenetic(mut self, key: &str, definition: PharmacogeneticVariantDefinition) -> Self {
        if let Some(key) = self.key(key) {
            self.kb.pharmacogenetic_variants.insert(key, definition);
        }
        self
    }

    pub fn trait_variant(mut self, key: &str, definition: TraitVariantDefinition) -> Self {
        if let Some(key) = self.key(key) {
            self.kb.trait_variants.insert(key, definition);
        }
        self
    }

    pub fn gene_association(mut self, gene: &str, association: GeneDiseaseAssociation) -> Self {
        self.kb.gene_disease_associations.insert(gene.to_string(), association);
        self
    }

    pub fn build(self) -> Result<KnowledgeBase, KnowledgeBaseError> {
        if !self.invalid_keys.is_empty() {
            return Err(KnowledgeBaseError::InvalidKeys(self.invalid_keys));
        }
        Ok(self.kb)
    }
}

// Seed helpers

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[allow(clippy::too_many_arguments)]
fn clinical(
    gene: &str,
    variant: &str,
    pathogenicity: Pathogenicity,
    disease: &str,
    inheritance: &str,
    penetrance: &str,
    clinical_action: &str,
    population_frequency: Option<f64>,
) -> ClinicalVariantDefinition {
    ClinicalVariantDefinition {
        gene: gene.to_string(),
        variant: variant.to_string(),
        pathogenicity,
        disease: disease.to_string(),
        inheritance: inheritance.to_string(),
        penetrance: penetrance.to_string(),
        clinical_action: clinical_action.to_string(),
        evidence_level: "ClinVar expert panel".to_string(),
        population_frequency,
    }
}

fn pharmacogenetic(
    gene: &str,
    variant: &str,
    drugs: &[&str],
    phenotype: &str,
    recommendation: &str,
    evidence_level: &str,
) -> PharmacogeneticVariantDefinition {
    PharmacogeneticVariantDefinition {
        gene: gene.to_string(),
        variant: variant.to_string(),
        drugs: strings(drugs),
        phenotype: phenotype.to_string(),
        recommendation: recommendation.to_string(),
        evidence_level: evidence_level.to_string(),
    }
}

fn association(diseases: &[&str], surveillance: &[&str], prevention: &[&str]) -> GeneDiseaseAssociation {
    GeneDiseaseAssociation {
        diseases: strings(diseases),
        surveillance: strings(surveillance),
        prevention: strings(prevention),
    }
}

/// Built-in curated seed
fn seed() -> Result<KnowledgeBase, KnowledgeBaseError> {
    use Pathogenicity::{LikelyPathogenic, Pathogenic};

    KnowledgeBase::builder()
        // --- Hereditary cancer -------------------------------------------------
        .pathogenic(
            "17:43094464:C:T",
            clinical(
                "BRCA1",
                "c.5266dupC",
                Pathogenic,
                "Hereditary breast and ovarian cancer syndrome",
                "Autosomal dominant",
                "High (55-72% lifetime breast cancer risk, 39-44% ovarian)",
                "Enhanced breast screening from age 25; discuss risk-reducing salpingo-oophorectomy by 35-40",
                Some(0.0003),
            ),
        )
        .pathogenic(
            "17:43124027:ACT:A",
            clinical(
                "BRCA1",
                "c.68_69delAG",
                Pathogenic,
                "Hereditary breast and ovarian cancer syndrome",
                "Autosomal dominant",
                "High (55-72% lifetime breast cancer risk, 39-44% ovarian)",
                "Enhanced breast screening from age 25; discuss risk-reducing salpingo-oophorectomy by 35-40",
                Some(0.0001),
            ),
        )
        .pathogenic(
            "13:32340300:GT:G",
            clinical(
                "BRCA2",
                "c.5946delT",
                Pathogenic,
                "Hereditary breast and ovarian cancer syndrome",
                "Autosomal dominant",
                "High (45-69% lifetime breast cancer risk, 11-17% ovarian)",
                "Enhanced breast screening from age 25; consider prostate and pancreatic surveillance",
                Some(0.0002),
            ),
        )
        .pathogenic(
            "17:7675088:C:T",
            clinical(
                "TP53",
                "c.524G>A (p.Arg175His)",
                Pathogenic,
                "Li-Fraumeni syndrome (hereditary cancer predisposition)",
                "Autosomal dominant",
                "High (~90% lifetime cancer risk)",
                "Toronto protocol surveillance including annual whole-body MRI",
                None,
            ),
        )
        // --- Recessive carrier conditions --------------------------------------
        .pathogenic(
            "7:117559590:ATCT:A",
            clinical(
                "CFTR",
                "c.1521_1523delCTT (p.Phe508del)",
                Pathogenic,
                "Cystic fibrosis",
                "Autosomal recessive",
                "Complete in biallelic carriers",
                "Carrier counseling; offer partner testing before conception",
                Some(0.013),
            ),
        )
        .pathogenic(
            "6:26092913:G:A",
            clinical(
                "HFE",
                "c.845G>A (p.Cys282Tyr)",
                Pathogenic,
                "Hereditary hemochromatosis",
                "Autosomal recessive",
                "Low to moderate (clinical iron overload in ~28% of male homozygotes)",
                "Serum ferritin and transferrin saturation monitoring",
                Some(0.06),
            ),
        )
        .pathogenic(
            "6:26090951:C:G",
            clinical(
                "HFE",
                "c.187C>G (p.His63Asp)",
                LikelyPathogenic,
                "Hereditary hemochromatosis",
                "Autosomal recessive",
                "Low (mostly in compound heterozygotes with C282Y)",
                "Iron studies if compound heterozygous",
                Some(0.14),
            ),
        )
        // --- Cardiometabolic ---------------------------------------------------
        .pathogenic(
            "19:11105436:G:A",
            clinical(
                "LDLR",
                "c.1444G>A (p.Asp482Asn)",
                LikelyPathogenic,
                "Familial hypercholesterolemia",
                "Autosomal dominant",
                "High (~90% develop elevated LDL cholesterol)",
                "Lipid panel, early statin therapy, cascade testing of first-degree relatives",
                None,
            ),
        )
        .pathogenic(
            "12:120978847:C:T",
            clinical(
                "HNF1A",
                "c.608G>A (p.Arg203His)",
                LikelyPathogenic,
                "Maturity-onset diabetes of the young (MODY3)",
                "Autosomal dominant",
                "High (~95% develop diabetes by age 55)",
                "HbA1c monitoring; sulfonylurea-responsive diabetes",
                None,
            ),
        )
        // --- Pharmacogenetics --------------------------------------------------
        .pharmacogenetic(
            "22:42128945:C:T",
            pharmacogenetic(
                "CYP2D6",
                "CYP2D6*4",
                &["codeine", "tramadol", "tamoxifen", "metoprolol"],
                "Poor metabolizer (when homozygous)",
                "Avoid codeine and tramadol; use a non-CYP2D6 analgesic. Consider alternative to tamoxifen.",
                "CPIC Level A",
            ),
        )
        .pharmacogenetic(
            "10:94781859:G:A",
            pharmacogenetic(
                "CYP2C19",
                "CYP2C19*2",
                &["clopidogrel", "citalopram", "escitalopram", "omeprazole"],
                "Intermediate or poor metabolizer",
                "Use prasugrel or ticagrelor instead of clopidogrel for acute coronary syndrome",
                "CPIC Level A",
            ),
        )
        .pharmacogenetic(
            "1:97450058:C:T",
            pharmacogenetic(
                "DPYD",
                "DPYD*2A",
                &["fluorouracil", "capecitabine"],
                "Decreased DPD activity",
                "Fluoropyrimidines contraindicated in homozygotes; reduce starting dose by 50% in heterozygotes",
                "CPIC Level A",
            ),
        )
        .pharmacogenetic(
            "6:31464003:T:G",
            pharmacogenetic(
                "HLA-B",
                "HLA-B*57:01 (rs2395029 tag)",
                &["abacavir"],
                "Abacavir hypersensitivity risk",
                "Abacavir contraindicated; choose an alternative antiretroviral",
                "CPIC Level A",
            ),
        )
        .pharmacogenetic(
            "16:31096368:C:T",
            pharmacogenetic(
                "VKORC1",
                "c.-1639G>A",
                &["warfarin"],
                "Increased warfarin sensitivity",
                "Lower warfarin starting dose guided by a genotype dosing algorithm",
                "CPIC Level A",
            ),
        )
        // --- Traits ------------------------------------------------------------
        .trait_variant(
            "2:135851076:G:A",
            TraitVariantDefinition {
                gene: "MCM6/LCT".to_string(),
                variant: "c.1917+326C>T (-13910)".to_string(),
                phenotype: "Lactase persistence".to_string(),
                description: "Associated with continued lactase production into adulthood".to_string(),
                population_frequency: Some(0.5),
            },
        )
        .trait_variant(
            "11:66560624:C:T",
            TraitVariantDefinition {
                gene: "ACTN3".to_string(),
                variant: "p.Arg577Ter (R577X)".to_string(),
                phenotype: "Muscle fiber composition".to_string(),
                description: "XX genotype associated with reduced fast-twitch muscle performance".to_string(),
                population_frequency: Some(0.4),
            },
        )
        .trait_variant(
            "7:141973545:G:C",
            TraitVariantDefinition {
                gene: "TAS2R38".to_string(),
                variant: "p.Ala49Pro".to_string(),
                phenotype: "Bitter taste perception".to_string(),
                description: "Modulates perception of PTC/PROP bitterness".to_string(),
                population_frequency: Some(0.45),
            },
        )
        // --- Gene → disease associations ---------------------------------------
        .gene_association(
            "BRCA1",
            association(
                &["Breast cancer", "Ovarian cancer", "Pancreatic cancer"],
                &[
                    "Annual breast MRI from age 25",
                    "Annual mammography from age 30",
                    "Transvaginal ultrasound and CA-125 where surgery is deferred",
                ],
                &["Risk-reducing salpingo-oophorectomy by age 35-40", "Discuss risk-reducing mastectomy"],
            ),
        )
        .gene_association(
            "BRCA2",
            association(
                &["Breast cancer", "Ovarian cancer", "Prostate cancer", "Pancreatic cancer"],
                &[
                    "Annual breast MRI from age 25",
                    "Annual mammography from age 30",
                    "Prostate cancer screening from age 40",
                ],
                &["Risk-reducing salpingo-oophorectomy by age 40-45"],
            ),
        )
        .gene_association(
            "TP53",
            association(
                &["Li-Fraumeni syndrome", "Sarcoma", "Breast cancer", "Brain tumors"],
                &[
                    "Annual whole-body MRI",
                    "Annual brain MRI",
                    "Annual breast MRI from age 20",
                    "Avoid ionizing radiation where possible",
                ],
                &["Minimize radiation exposure"],
            ),
        )
        .gene_association(
            "CFTR",
            association(
                &["Cystic fibrosis", "CFTR-related disorders"],
                &["Partner carrier screening before conception"],
                &["Preconception genetic counseling"],
            ),
        )
        .gene_association(
            "HFE",
            association(
                &["Hereditary hemochromatosis"],
                &["Serum ferritin and transferrin saturation every 1-3 years"],
                &["Avoid iron supplements and limit alcohol"],
            ),
        )
        .gene_association(
            "LDLR",
            association(
                &["Familial hypercholesterolemia", "Premature coronary artery disease"],
                &["Fasting lipid panel annually", "Cardiovascular risk assessment"],
                &["Early statin therapy", "Cascade testing of relatives"],
            ),
        )
        .gene_association(
            "HNF1A",
            association(
                &["Maturity-onset diabetes of the young"],
                &["Annual HbA1c and fasting glucose"],
                &["Maintain healthy body weight"],
            ),
        )
        .build()
}
