// ==============================================================================
// risk.rs - Risk Assessment
// ==============================================================================
// Description: Aggregates classified variants into an overall risk profile
// Author: Matt Barham
// Created: 2026-10-18
// Modified: 2026-10-18
// Version: 1.0.0
// ==============================================================================

use std::sync::Arc;
use tracing::debug;

use crate::classifier::ClassificationResult;
use crate::knowledge_base::KnowledgeBase;
use crate::models::{
    ClinicalInterpretation, HighPenetranceDisease, PatientContext, PharmacogeneticConsideration,
    PharmacogeneticInterpretation, ReproductiveRisk, RiskAssessment, RiskLevel,
};

const ONCOLOGIC_KEYWORDS: &[&str] = &["cancer"];
const CARDIOVASCULAR_KEYWORDS: &[&str] = &["cardio", "heart", "cholesterol", "lipid"];
const DIABETIC_KEYWORDS: &[&str] = &["diabetes"];

const ONCOLOGIC_LIFESTYLE: &[&str] = &[
    "Maintain a healthy weight through regular physical activity",
    "Limit alcohol consumption",
    "Avoid tobacco products",
];

const CARDIOVASCULAR_LIFESTYLE: &[&str] = &[
    "Follow a heart-healthy diet low in saturated fat",
    "Aim for at least 150 minutes of moderate aerobic exercise per week",
    "Avoid tobacco products",
];

const DIABETIC_LIFESTYLE: &[&str] = &[
    "Monitor carbohydrate intake and follow a balanced diet",
    "Maintain a healthy weight through regular physical activity",
    "Check blood glucose regularly",
];

/// Builds a `RiskAssessment` from classified findings
pub struct RiskAssessor {
    kb: Arc<KnowledgeBase>,
}

impl RiskAssessor {
    pub fn new(kb: Arc<KnowledgeBase>) -> Self {
        Self { kb }
    }

    /// `patient` is accepted but does not change template selection
    pub fn assess(
        &self,
        classification: &ClassificationResult,
        clinical: &[ClinicalInterpretation],
        pharmacogenetic: &[PharmacogeneticInterpretation],
        _patient: Option<&PatientContext>,
    ) -> RiskAssessment {
        let assessment = RiskAssessment {
            overall_risk_level: overall_risk_level(classification),
            high_penetrance_diseases: high_penetrance_diseases(clinical),
            pharmacogenetic_considerations: pharmacogenetic
                .iter()
                .map(|p| PharmacogeneticConsideration {
                    gene: p.definition.gene.clone(),
                    drugs: p.definition.drugs.clone(),
                    phenotype: p.definition.phenotype.clone(),
                    recommendation: p.definition.recommendation.clone(),
                })
                .collect(),
            reproductive_risks: clinical.iter().filter_map(reproductive_risk).collect(),
            surveillance_recommendations: self.surveillance(clinical),
            lifestyle_recommendations: lifestyle(clinical),
        };

        debug!(
            "Risk assessment: level={}, {} high-penetrance, {} reproductive, {} surveillance",
            assessment.overall_risk_level,
            assessment.high_penetrance_diseases.len(),
            assessment.reproductive_risks.len(),
            assessment.surveillance_recommendations.len()
        );

        assessment
    }

    fn surveillance(&self, clinical: &[ClinicalInterpretation]) -> Vec<String> {
        let mut items = Vec::new();
        for interpretation in clinical {
            if let Some(association) = self.kb.gene_association(&interpretation.definition.gene) {
                push_unique(&mut items, association.surveillance.iter().map(String::as_str));
            }
        }
        items
    }
}

fn overall_risk_level(classification: &ClassificationResult) -> RiskLevel {
    if !classification.pathogenic.is_empty() {
        RiskLevel::High
    } else if !classification.likely_pathogenic.is_empty() {
        RiskLevel::ModeratelyElevated
    } else if !classification.pharmacogenetic.is_empty() {
        RiskLevel::ModeratePharmacogenetic
    } else {
        RiskLevel::BaselinePopulation
    }
}

fn is_high_penetrance(penetrance: &str) -> bool {
    let lower = penetrance.to_lowercase();
    lower.contains("high") || lower.contains("complete")
}

fn high_penetrance_diseases(clinical: &[ClinicalInterpretation]) -> Vec<HighPenetranceDisease> {
    clinical
        .iter()
        .filter(|c| is_high_penetrance(&c.definition.penetrance))
        .map(|c| HighPenetranceDisease {
            gene: c.definition.gene.clone(),
            disease: c.definition.disease.clone(),
            penetrance: c.definition.penetrance.clone(),
            inheritance: c.definition.inheritance.clone(),
            clinical_action: c.definition.clinical_action.clone(),
        })
        .collect()
}

fn reproductive_risk(interpretation: &ClinicalInterpretation) -> Option<ReproductiveRisk> {
    let definition = &interpretation.definition;
    let inheritance = definition.inheritance.to_lowercase();

    let risk = if inheritance.contains("recessive") {
        format!(
            "Carrier of {}: ~25% risk of an affected child if the partner is also a carrier",
            definition.disease
        )
    } else if inheritance.contains("dominant") {
        format!("~50% risk of passing the {} variant to each child", definition.gene)
    } else {
        return None;
    };

    Some(ReproductiveRisk {
        gene: definition.gene.clone(),
        disease: definition.disease.clone(),
        inheritance: definition.inheritance.clone(),
        risk,
    })
}

fn lifestyle(clinical: &[ClinicalInterpretation]) -> Vec<String> {
    let templates: [(&[&str], &[&str]); 3] = [
        (ONCOLOGIC_KEYWORDS, ONCOLOGIC_LIFESTYLE),
        (CARDIOVASCULAR_KEYWORDS, CARDIOVASCULAR_LIFESTYLE),
        (DIABETIC_KEYWORDS, DIABETIC_LIFESTYLE),
    ];

    let mut items = Vec::new();
    for interpretation in clinical {
        let disease = interpretation.definition.disease.to_lowercase();
        for (keywords, template) in templates {
            if keywords.iter().any(|k| disease.contains(k)) {
                push_unique(&mut items, template.iter().copied());
            }
        }
    }
    items
}

fn push_unique<'a>(items: &mut Vec<String>, new: impl Iterator<Item = &'a str>) {
    for item in new {
        if !items.iter().any(|existing| existing == item) {
            items.push(item.to_string());
        }
    }
}
