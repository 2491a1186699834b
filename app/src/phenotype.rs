// ==============================================================================
// phenotype.rs - Metabolizer Phenotype Inference
// ==============================================================================
// Description: Diplotype-table lookup with activity-score fallback
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================
// Algorithm:
//   1. Build a canonical diplotype from detected calls (wild-type filled)
//   2. Authoritative diplotype table hit → its phenotype
//   3. Otherwise sum both alleles' activity values:
//        ≥2.5 Ultra-rapid, ≥1.5 Normal, ≥1.0 Intermediate, else Poor
// ==============================================================================

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use crate::alleles::{self, AlleleCall};
use crate::knowledge_base::KnowledgeBase;

/// Metabolizer phenotype
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum Phenotype {
    UltraRapid,
    Normal,
    Intermediate,
    Poor,
    Indeterminate,
    /// Any other table label, kept verbatim (e.g. "Likely Intermediate Metabolizer")
    Other(String),
}

impl Phenotype {
    /// Parse a phenotype label, dropping a leading gene symbol if given
    ///
    /// `"CYP2D6 Poor Metabolizer"` with gene `CYP2D6` → `Poor`.
    pub fn from_label(label: &str, gene: Option<&str>) -> Self {
        let mut text = label.trim();

        if let Some(gene) = gene.filter(|g| !g.is_empty()) {
            if let Some(head) = text.get(..gene.len()) {
                if head.eq_ignore_ascii_case(gene) {
                    if let Some(rest) = text[gene.len()..].strip_prefix(' ') {
                        text = rest.trim_start();
                    }
                }
            }
        }

        match text.to_lowercase().as_str() {
            "ultra-rapid metabolizer" | "ultrarapid metabolizer" => Phenotype::UltraRapid,
            "normal metabolizer" | "extensive metabolizer" => Phenotype::Normal,
            "intermediate metabolizer" => Phenotype::Intermediate,
            "poor metabolizer" => Phenotype::Poor,
            "indeterminate" => Phenotype::Indeterminate,
            _ => Phenotype::Other(text.to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Phenotype::UltraRapid => "Ultra-rapid Metabolizer",
            Phenotype::Normal => "Normal Metabolizer",
            Phenotype::Intermediate => "Intermediate Metabolizer",
            Phenotype::Poor => "Poor Metabolizer",
            Phenotype::Indeterminate => "Indeterminate",
            Phenotype::Other(label) => label,
        }
    }

    /// Order of the four metabolizer classes (Poor lowest)
    pub fn rank(&self) -> Option<u8> {
        match self {
            Phenotype::Poor => Some(0),
            Phenotype::Intermediate => Some(1),
            Phenotype::Normal => Some(2),
            Phenotype::UltraRapid => Some(3),
            _ => None,
        }
    }

    /// Short code used in reports
    pub fn abbreviation(&self) -> &'static str {
        match self {
            Phenotype::UltraRapid => "URM",
            Phenotype::Normal => "NM",
            Phenotype::Intermediate => "IM",
            Phenotype::Poor => "PM",
            _ => "Unknown",
        }
    }
}

impl fmt::Display for Phenotype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl From<Phenotype> for String {
    fn from(phenotype: Phenotype) -> Self {
        phenotype.label().to_string()
    }
}

impl From<String> for Phenotype {
    fn from(label: String) -> Self {
        Phenotype::from_label(&label, None)
    }
}

/// Classify a summed two-allele activity score
pub fn classify_activity_score(score: f64) -> Phenotype {
    if score >= 2.5 {
        Phenotype::UltraRapid
    } else if score >= 1.5 {
        Phenotype::Normal
    } else if score >= 1.0 {
        Phenotype::Intermediate
    } else {
        Phenotype::Poor
    }
}

/// How a phenotype was reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InferenceMethod {
    /// Exact hit in the gene's diplotype-phenotype table
    DiplotypeTable,
    /// Summed activity values
    ActivityScore,
    /// Nothing detected; wild-type assumed
    AssumedWildType,
}

/// Result of inferring one gene's phenotype
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhenotypeCall {
    pub phenotype: Phenotype,
    /// Canonical diplotype the call was made on
    pub diplotype: String,
    pub activity_score: Option<f64>,
    pub method: InferenceMethod,
}

/// Phenotype inference over a loaded knowledge base
#[derive(Debug, Clone, Copy)]
pub struct PhenotypeEngine<'a> {
    kb: &'a KnowledgeBase,
}

impl<'a> PhenotypeEngine<'a> {
    pub fn new(kb: &'a KnowledgeBase) -> Self {
        Self { kb }
    }

    /// Infer a phenotype from one sample's detected allele calls
    ///
    /// # Arguments
    /// * `gene` - Gene symbol (case-insensitive)
    /// * `calls` - Variant allele calls in detection order
    ///
    /// # Returns
    /// Phenotype plus the diplotype and method that produced it. Genes with
    /// no calls are Normal unless their diplotype table says otherwise for `*1/*1`.
    pub fn infer(&self, gene: &str, calls: &[AlleleCall]) -> PhenotypeCall {
        let (a, b) = alleles::allele_pair(calls);
        let has_variants = calls.iter().any(|c| !c.allele.is_empty());

        if let Some(hit) = self.table_lookup(gene, &a, &b) {
            return hit;
        }

        if !has_variants {
            return PhenotypeCall {
                phenotype: Phenotype::Normal,
                diplotype: alleles::canonical_diplotype(&a, &b),
                activity_score: None,
                method: InferenceMethod::AssumedWildType,
            };
        }

        self.heuristic(gene, &a, &b)
    }

    /// Classify a fixed diplotype (used for offspring combinations)
    pub fn classify_diplotype(&self, gene: &str, a: &str, b: &str) -> PhenotypeCall {
        self.table_lookup(gene, a, b)
            .unwrap_or_else(|| self.heuristic(gene, a, b))
    }

    /// Summed activity of two alleles
    pub fn activity_score(&self, gene: &str, a: &str, b: &str) -> f64 {
        self.kb.activity_value(gene, a) + self.kb.activity_value(gene, b)
    }

    fn table_lookup(&self, gene: &str, a: &str, b: &str) -> Option<PhenotypeCall> {
        let diplotype = alleles::canonical_diplotype(a, b);
        let entry = self.kb.diplotype_phenotype(gene, &diplotype)?;

        debug!("{} {}: diplotype table → {}", gene, diplotype, entry.phenotype);
        Some(PhenotypeCall {
            phenotype: entry.phenotype.clone(),
            diplotype,
            activity_score: entry.activity_score,
            method: InferenceMethod::DiplotypeTable,
        })
    }

    fn heuristic(&self, gene: &str, a: &str, b: &str) -> PhenotypeCall {
        let score = self.activity_score(gene, a, b);
        let phenotype = classify_activity_score(score);
        debug!("{} {}/{}: activity score {} → {}", gene, a, b, score, phenotype);

        PhenotypeCall {
            phenotype,
            diplotype: alleles::canonical_diplotype(a, b),
            activity_score: Some(score),
            method: InferenceMethod::ActivityScore,
        }
    }
}
