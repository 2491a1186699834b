// ==============================================================================
// interactions.rs - Drug-Gene Interaction Resolver
// ==============================================================================
// Description: Exact-match index of (drug, gene, phenotype) → guideline
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use crate::phenotype::Phenotype;

/// Clinical risk for a drug given a phenotype
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RiskLabel {
    #[serde(rename = "Safe")]
    Safe,
    #[serde(rename = "Adjust Dosage")]
    AdjustDosage,
    #[serde(rename = "Toxic")]
    Toxic,
    #[serde(rename = "Ineffective")]
    Ineffective,
    #[serde(rename = "Unknown")]
    Unknown,
}

impl RiskLabel {
    pub fn label(&self) -> &'static str {
        match self {
            RiskLabel::Safe => "Safe",
            RiskLabel::AdjustDosage => "Adjust Dosage",
            RiskLabel::Toxic => "Toxic",
            RiskLabel::Ineffective => "Ineffective",
            RiskLabel::Unknown => "Unknown",
        }
    }

    /// Case-insensitive parse; unrecognized labels are `Unknown`
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "safe" => RiskLabel::Safe,
            "adjust dosage" | "adjust" | "adjust_dosage" => RiskLabel::AdjustDosage,
            "toxic" => RiskLabel::Toxic,
            "ineffective" => RiskLabel::Ineffective,
            _ => RiskLabel::Unknown,
        }
    }

    /// Toxic and Ineffective results are highlighted as critical
    pub fn is_critical(&self) -> bool {
        matches!(self, RiskLabel::Toxic | RiskLabel::Ineffective)
    }
}

impl fmt::Display for RiskLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One guideline row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrugGeneInteraction {
    pub drug: String,
    pub gene: String,
    pub phenotype: Phenotype,
    pub risk: RiskLabel,
    pub recommendation: String,
    pub mechanism: String,
    /// CPIC evidence level ("A", "B", ...)
    pub evidence_level: String,
    pub guideline_url: Option<String>,
}

/// Outcome of resolving a (drug, gene, phenotype) triple
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Resolution<'a> {
    Found(&'a DrugGeneInteraction),
    /// The drug/gene pair is known but has no row for this phenotype
    NoGuideline,
}

impl<'a> Resolution<'a> {
    pub fn interaction(&self) -> Option<&'a DrugGeneInteraction> {
        match self {
            Resolution::Found(ix) => Some(ix),
            Resolution::NoGuideline => None,
        }
    }
}

type InteractionKey = (String, String, String);

fn key(drug: &str, gene: &str, phenotype: &Phenotype) -> InteractionKey {
    (
        drug.trim().to_lowercase(),
        gene.trim().to_uppercase(),
        phenotype.label().to_string(),
    )
}

/// Interaction table indexed by exact (lowercase drug, uppercase gene, phenotype label)
#[derive(Debug, Clone, Default)]
pub struct InteractionIndex {
    by_key: HashMap<InteractionKey, DrugGeneInteraction>,
    /// Drug → relevant genes in first-seen order
    drug_genes: BTreeMap<String, Vec<String>>,
}

impl InteractionIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a row, replacing any existing row for the same triple
    pub fn insert(&mut self, mut interaction: DrugGeneInteraction) -> Option<DrugGeneInteraction> {
        interaction.drug = interaction.drug.trim().to_lowercase();
        interaction.gene = interaction.gene.trim().to_uppercase();

        let genes = self.drug_genes.entry(interaction.drug.clone()).or_default();
        if !genes.contains(&interaction.gene) {
            genes.push(interaction.gene.clone());
        }

        let k = key(&interaction.drug, &interaction.gene, &interaction.phenotype);
        self.by_key.insert(k, interaction)
    }

    /// Exact lookup; no fuzzy or partial phenotype matching
    pub fn resolve(&self, drug: &str, gene: &str, phenotype: &Phenotype) -> Resolution<'_> {
        match self.by_key.get(&key(drug, gene, phenotype)) {
            Some(ix) => Resolution::Found(ix),
            None => Resolution::NoGuideline,
        }
    }

    /// Genes with guidelines for a drug (empty for unknown drugs)
    pub fn genes_for_drug(&self, drug: &str) -> &[String] {
        self.drug_genes
            .get(&drug.trim().to_lowercase())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Sorted drug names
    pub fn drugs(&self) -> impl Iterator<Item = &str> {
        self.drug_genes.keys().map(String::as_str)
    }

    /// Sorted genes referenced by any interaction
    pub fn genes(&self) -> BTreeSet<&str> {
        self.drug_genes
            .values()
            .flat_map(|genes| genes.iter().map(String::as_str))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }
}
