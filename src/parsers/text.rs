// ==============================================================================
// parsers/text.rs - Free-Text Genetic Report Scanner
// ==============================================================================
// Description: Best-effort token scan of text already extracted from PDFs/images
// Author: Matt Barham
// Created: 2026-10-18
// Modified: 2026-10-18
// Version: 1.0.0
// ==============================================================================
// This path is heuristic. It never feeds the VariantClassifier rule order; the
// significance hints below are keyword matches, not classifications.
//
// Recognized tokens:
//   BRCA1                 gene symbol known to the knowledge base
//   rs80357906            dbSNP identifier
//   c.5266dupC / p.R175H  HGVS-like notation
//   CYP2C19*2             star allele
//   17:43094464:C:T       chrom:pos:ref:alt key (optional "chr" prefix)
// ==============================================================================

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::knowledge_base::KnowledgeBase;
use crate::models::{VariantKey, VariantRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    GeneSymbol,
    RsId,
    Hgvs,
    StarAllele,
    VariantKey,
}

/// One recognized token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextFinding {
    /// 1-based line number in the scanned text
    pub line: usize,
    pub kind: TokenKind,
    pub token: String,
    /// Gene named on the same line, if any
    pub gene: Option<String>,
    /// Knowledge base key the token resolved to
    pub resolved_key: Option<VariantKey>,
}

/// Keyword hint (heuristic, not a classification)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignificanceHint {
    Pathogenic,
    LikelyPathogenic,
    UncertainSignificance,
    Benign,
    Mutation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HintMatch {
    pub line: usize,
    pub hint: SignificanceHint,
    pub gene: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextExtraction {
    pub findings: Vec<TextFinding>,
    pub hints: Vec<HintMatch>,
    /// Distinct genes mentioned, in first-seen order
    pub genes: Vec<String>,
}

impl TextExtraction {
    /// Distinct knowledge-base keys resolved from the text
    pub fn resolved_keys(&self) -> Vec<VariantKey> {
        let mut keys: Vec<VariantKey> = Vec::new();
        for key in self.findings.iter().filter_map(|f| f.resolved_key.clone()) {
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        keys
    }

    /// Synthetic records for resolved keys, suitable for `Analyzer::analyze_records`.
    /// Quality is unknown (0.0), so only knowledge-base matches survive classification.
    pub fn candidate_records(&self) -> Vec<VariantRecord> {
        self.resolved_keys()
            .into_iter()
            .map(|key| VariantRecord {
                chromosome: key.chromosome,
                position: key.position,
                id: ".".to_string(),
                ref_allele: key.ref_allele,
                alt_allele: key.alt_allele,
                quality: 0.0,
                filter: ".".to_string(),
                info: Vec::new(),
                format: String::new(),
                samples: Vec::new(),
            })
            .collect()
    }
}

/// Line scanner over free text
pub struct TextIngestor {
    kb: Arc<KnowledgeBase>,
    genes: Vec<String>,
}

impl TextIngestor {
    pub fn new(kb: Arc<KnowledgeBase>) -> Self {
        let genes = kb.genes();
        Self { kb, genes }
    }

    pub fn scan(&self, text: &str) -> TextExtraction {
        let mut extraction = TextExtraction::default();

        for (idx, line) in text.lines().enumerate() {
            let line_number = idx + 1;
            let tokens: Vec<&str> = line
                .split(|c: char| c.is_whitespace() || matches!(c, ',' | ';' | '(' | ')' | '[' | ']'))
                .map(|t| t.trim_matches(|c: char| matches!(c, '"' | '\'')).trim_end_matches('.'))
                .filter(|t| !t.is_empty())
                .collect();

            let line_gene = tokens
                .iter()
                .find(|t| self.is_gene(t))
                .map(|t| t.to_string());

            for token in &tokens {
                if let Some(finding) = self.classify_token(token, line_number, line_gene.as_deref()) {
                    if finding.kind == TokenKind::GeneSymbol && !extraction.genes.contains(&finding.token) {
                        extraction.genes.push(finding.token.clone());
                    }
                    extraction.findings.push(finding);
                }
            }

            if let Some(hint) = significance_hint(line) {
                extraction.hints.push(HintMatch {
                    line: line_number,
                    hint,
                    gene: line_gene.clone(),
                });
            }
        }

        debug!(
            "Text scan: {} findings, {} hints, {} genes",
            extraction.findings.len(),
            extraction.hints.len(),
            extraction.genes.len()
        );

        extraction
    }

    fn is_gene(&self, token: &str) -> bool {
        self.genes.iter().any(|g| g == token)
    }

    fn classify_token(&self, token: &str, line: usize, line_gene: Option<&str>) -> Option<TextFinding> {
        let finding = |kind, resolved_key| TextFinding {
            line,
            kind,
            token: token.to_string(),
            gene: line_gene.map(str::to_string),
            resolved_key,
        };

        if self.is_gene(token) {
            return Some(finding(TokenKind::GeneSymbol, None));
        }

        let lower = token.to_ascii_lowercase();
        if lower.len() > 2 && lower.starts_with("rs") && lower[2..].chars().all(|c| c.is_ascii_digit()) {
            return Some(finding(TokenKind::RsId, None));
        }

        if let Some((gene, _)) = token.split_once('*') {
            if self.is_gene(gene) {
                let key = self.kb.find_by_label(gene, token);
                return Some(finding(TokenKind::StarAllele, key));
            }
        }

        if token.len() > 2 && ["c.", "p.", "g.", "m.", "n."].iter().any(|p| token.starts_with(p)) {
            let key = line_gene.and_then(|gene| self.kb.find_by_label(gene, token));
            return Some(finding(TokenKind::Hgvs, key));
        }

        if let Ok(key) = token.trim_start_matches("chr").parse::<VariantKey>() {
            let resolved = self.kb.contains(&key).then_some(key);
            return Some(finding(TokenKind::VariantKey, resolved));
        }

        None
    }
}

fn significance_hint(line: &str) -> Option<SignificanceHint> {
    let lower = line.to_lowercase();

    if lower.contains("likely pathogenic") {
        Some(SignificanceHint::LikelyPathogenic)
    } else if lower.contains("pathogenic") {
        Some(SignificanceHint::Pathogenic)
    } else if lower.contains("uncertain significance") || lower.split_whitespace().any(|w| w == "vus") {
        Some(SignificanceHint::UncertainSignificance)
    } else if lower.contains("benign") {
        Some(SignificanceHint::Benign)
    } else if lower.contains("mutation") {
        Some(SignificanceHint::Mutation)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ingestor() -> TextIngestor {
        TextIngestor::new(KnowledgeBase::builtin())
    }

    #[test]
    fn test_scan_report_text() {
        let text = "\
Genetic Test Report
Gene: BRCA1 variant c.5266dupC (rs80357906) - Pathogenic
Pharmacogenomics: CYP2C19*2 detected, intermediate metabolizer
Raw call 17:43094464:C:T
";
        let extraction = ingestor().scan(text);

        assert_eq!(extraction.genes, vec!["BRCA1".to_string()]);

        let hgvs = extraction
            .findings
            .iter()
            .find(|f| f.kind == TokenKind::Hgvs)
            .unwrap();
        assert_eq!(hgvs.token, "c.5266dupC");
        assert_eq!(hgvs.line, 2);
        assert_eq!(
            hgvs.resolved_key.as_ref().map(|k| k.to_string()),
            Some("17:43094464:C:T".to_string())
        );

        assert!(extraction
            .findings
            .iter()
            .any(|f| f.kind == TokenKind::RsId && f.token == "rs80357906"));

        let star = extraction
            .findings
            .iter()
            .find(|f| f.kind == TokenKind::StarAllele)
            .unwrap();
        assert_eq!(
            star.resolved_key.as_ref().map(|k| k.to_string()),
            Some("10:94781859:G:A".to_string())
        );

        assert_eq!(extraction.hints.len(), 1);
        assert_eq!(extraction.hints[0].hint, SignificanceHint::Pathogenic);
        assert_eq!(extraction.hints[0].gene.as_deref(), Some("BRCA1"));

        // BRCA1 key resolved twice, CYP2C19 once
        assert_eq!(extraction.resolved_keys().len(), 2);
        assert_eq!(extraction.candidate_records().len(), 2);
    }

    #[test]
    fn test_hint_priority() {
        assert_eq!(
            significance_hint("Classified as likely pathogenic"),
            Some(SignificanceHint::LikelyPathogenic)
        );
        assert_eq!(
            significance_hint("Variant of uncertain significance"),
            Some(SignificanceHint::UncertainSignificance)
        );
        assert_eq!(significance_hint("No VUS found"), Some(SignificanceHint::UncertainSignificance));
        assert_eq!(significance_hint("likely benign"), Some(SignificanceHint::Benign));
        assert_eq!(significance_hint("No findings"), None);
    }

    #[test]
    fn test_unknown_text_yields_nothing() {
        let extraction = ingestor().scan("The quick brown fox\n\n");
        assert!(extraction.findings.is_empty());
        assert!(extraction.hints.is_empty());
    }
}
