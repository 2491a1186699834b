// ==============================================================================
// inheritance.rs - Offspring Phenotype Calculator
// ==============================================================================
// Description: Punnett-square expansion of two parents' diplotypes per gene
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================
// For each known gene:
//   1. Each parent → exactly two alleles (first two copies, wild-type filled)
//   2. Pair p1[i] with p2[j] for i, j in {0, 1}, in that order, 25% each
//   3. Classify each pairing like any fixed diplotype (table, then heuristic)
//   4. Group identical (diplotype, phenotype), sort by probability descending
// ==============================================================================

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, warn};

use crate::alleles::{self, AlleleCall, WILD_TYPE};
use crate::knowledge_base::KnowledgeBase;
use crate::models::AnalysisResult;
use crate::phenotype::{Phenotype, PhenotypeEngine};

const COMBINATION_PROBABILITY: f64 = 0.25;

#[derive(Error, Debug, PartialEq)]
pub enum InheritanceError {
    #[error("Invalid diplotype '{value}' for {gene}: expected 'allele/allele'")]
    InvalidDiplotype { gene: String, value: String },
}

/// Clinical concern attached to an offspring phenotype
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskTier {
    Normal,
    Caution,
    Danger,
    Warning,
    Unknown,
}

impl RiskTier {
    pub fn for_phenotype(phenotype: &Phenotype) -> Self {
        match phenotype {
            Phenotype::Normal => RiskTier::Normal,
            Phenotype::Intermediate => RiskTier::Caution,
            Phenotype::Poor => RiskTier::Danger,
            Phenotype::UltraRapid => RiskTier::Warning,
            _ => RiskTier::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskTier::Normal => "normal",
            RiskTier::Caution => "caution",
            RiskTier::Danger => "danger",
            RiskTier::Warning => "warning",
            RiskTier::Unknown => "unknown",
        }
    }
}

/// One parent's two alleles per gene
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParentProfile {
    genes: BTreeMap<String, (String, String)>,
}

impl ParentProfile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Profile from a completed analysis, using each gene's carried calls
    pub fn from_result(result: &AnalysisResult) -> Self {
        result
            .genes
            .iter()
            .fold(Self::new(), |profile, gene| profile.with_calls(&gene.gene, &gene.calls()))
    }

    /// Profile from explicit `gene → "A/B"` diplotype strings
    pub fn from_diplotypes<I, K, V>(entries: I) -> Result<Self, InheritanceError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        entries
            .into_iter()
            .try_fold(Self::new(), |profile, (gene, diplotype)| {
                profile.with_diplotype(gene.as_ref(), diplotype.as_ref())
            })
    }

    pub fn with_calls(mut self, gene: &str, calls: &[AlleleCall]) -> Self {
        self.genes
            .insert(gene.trim().to_uppercase(), alleles::allele_pair(calls));
        self
    }

    pub fn with_diplotype(mut self, gene: &str, diplotype: &str) -> Result<Self, InheritanceError> {
        let (a, b) = alleles::split_diplotype(diplotype)
            .ok_or_else(|| InheritanceError::InvalidDiplotype {
                gene: gene.to_string(),
                value: diplotype.to_string(),
            })?;

        let pair = if alleles::compare(a, b).is_le() {
            (a.to_string(), b.to_string())
        } else {
            (b.to_string(), a.to_string())
        };
        self.genes.insert(gene.trim().to_uppercase(), pair);
        Ok(self)
    }

    /// Two alleles for a gene; wild-type when the gene was never seen
    pub fn alleles(&self, gene: &str) -> (String, String) {
        self.genes
            .get(&gene.trim().to_uppercase())
            .cloned()
            .unwrap_or_else(|| (WILD_TYPE.to_string(), WILD_TYPE.to_string()))
    }

    pub fn genes(&self) -> impl Iterator<Item = &str> {
        self.genes.keys().map(String::as_str)
    }
}

/// One grouped offspring outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildOutcome {
    pub diplotype: String,
    pub phenotype: Phenotype,
    pub risk: RiskTier,
    pub probability: f64,
}

/// Offspring distribution for one gene
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InheritanceOutcome {
    pub gene: String,
    pub parent1_diplotype: String,
    pub parent2_diplotype: String,
    /// At most four groups, probabilities sum to 1.0
    pub outcomes: Vec<ChildOutcome>,
}

/// Gene → offspring distribution
pub type InheritanceReport = BTreeMap<String, InheritanceOutcome>;

/// Cross two parents over every known gene
pub fn cross_genes(kb: &KnowledgeBase, parent1: &ParentProfile, parent2: &ParentProfile) -> InheritanceReport {
    for gene in parent1.genes().chain(parent2.genes()) {
        if !kb.is_known_gene(gene) {
            warn!("Ignoring {} in parent profile: not a screened gene", gene);
        }
    }

    let engine = PhenotypeEngine::new(kb);
    kb.genes()
        .iter()
        .map(|gene| {
            let outcome = cross_gene(&engine, gene, parent1.alleles(gene), parent2.alleles(gene));
            (gene.clone(), outcome)
        })
        .collect()
}

/// Punnett square for a single gene
pub fn cross_gene(
    engine: &PhenotypeEngine<'_>,
    gene: &str,
    parent1: (String, String),
    parent2: (String, String),
) -> InheritanceOutcome {
    let p1 = [parent1.0.as_str(), parent1.1.as_str()];
    let p2 = [parent2.0.as_str(), parent2.1.as_str()];

    let mut outcomes: Vec<ChildOutcome> = Vec::with_capacity(4);
    for a in p1 {
        for b in p2 {
            let call = engine.classify_diplotype(gene, a, b);
            let diplotype = alleles::canonical_diplotype(a, b);

            match outcomes
                .iter_mut()
                .find(|o| o.diplotype == diplotype && o.phenotype == call.phenotype)
            {
                Some(existing) => existing.probability += COMBINATION_PROBABILITY,
                None => outcomes.push(ChildOutcome {
                    diplotype,
                    risk: RiskTier::for_phenotype(&call.phenotype),
                    phenotype: call.phenotype,
                    probability: COMBINATION_PROBABILITY,
                }),
            }
        }
    }

    // Stable sort keeps enumeration order among equal probabilities
    outcomes.sort_by(|x, y| y.probability.total_cmp(&x.probability));

    debug!("{}: {} offspring groups", gene, outcomes.len());

    InheritanceOutcome {
        gene: gene.to_string(),
        parent1_diplotype: format!("{}/{}", parent1.0, parent1.1),
        parent2_diplotype: format!("{}/{}", parent2.0, parent2.1),
        outcomes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alleles::FunctionalClass;
    use crate::knowledge_base::DiplotypePhenotype;
    use crate::parsers::vcf::VcfParser;
    use crate::processor;

    fn summary(outcome: &InheritanceOutcome) -> Vec<(&str, f64)> {
        outcome
            .outcomes
            .iter()
            .map(|o| (o.diplotype.as_str(), o.probability))
            .collect()
    }

    #[test]
    fn test_het_by_hom() {
        let kb = KnowledgeBase::curated();
        let p1 = ParentProfile::new().with_calls("CYP2D6", &[AlleleCall::het("*4")]);
        let p2 = ParentProfile::new().with_calls("CYP2D6", &[AlleleCall::hom("*4")]);

        let report = cross_genes(&kb, &p1, &p2);
        let cyp2d6 = &report["CYP2D6"];

        assert_eq!(cyp2d6.parent1_diplotype, "*1/*4");
        assert_eq!(cyp2d6.parent2_diplotype, "*4/*4");
        assert_eq!(summary(cyp2d6), vec![("*1/*4", 0.5), ("*4/*4", 0.5)]);
        assert_eq!(cyp2d6.outcomes[0].phenotype, Phenotype::Intermediate);
        assert_eq!(cyp2d6.outcomes[0].risk, RiskTier::Caution);
        assert_eq!(cyp2d6.outcomes[1].phenotype, Phenotype::Poor);
        assert_eq!(cyp2d6.outcomes[1].risk, RiskTier::Danger);
    }

    #[test]
    fn test_het_by_het_tie_order() {
        let kb = KnowledgeBase::curated();
        let p = ParentProfile::from_diplotypes([("CYP2D6", "*4/*1")]).unwrap();

        let report = cross_genes(&kb, &p, &p);
        assert_eq!(
            summary(&report["CYP2D6"]),
            vec![("*1/*4", 0.5), ("*1/*1", 0.25), ("*4/*4", 0.25)]
        );
    }

    #[test]
    fn test_every_known_gene_is_reported() {
        let kb = KnowledgeBase::curated();
        let report = cross_genes(&kb, &ParentProfile::new(), &ParentProfile::new());

        assert_eq!(report.len(), kb.genes().len());
        for outcome in report.values() {
            assert_eq!(summary(outcome), vec![("*1/*1", 1.0)]);
            assert_eq!(outcome.outcomes[0].risk, RiskTier::Normal);
        }
    }

    #[test]
    fn test_probabilities_sum_to_one() {
        let kb = KnowledgeBase::curated();
        let p1 = ParentProfile::from_diplotypes([
            ("CYP2C19", "*2/*17"),
            ("CYP2D6", "*4/*10"),
            ("TPMT", "*3A/*3C"),
        ])
        .unwrap();
        let p2 = ParentProfile::from_diplotypes([
            ("CYP2C19", "*17/*3"),
            ("CYP2D6", "*1/*41"),
            ("DPYD", "*2A/*13"),
        ])
        .unwrap();

        for outcome in cross_genes(&kb, &p1, &p2).values() {
            let total: f64 = outcome.outcomes.iter().map(|o| o.probability).sum();
            assert!((total - 1.0).abs() < 1e-9, "{} sums to {}", outcome.gene, total);
            assert!(outcome.outcomes.len() <= 4);
            assert!(outcome
                .outcomes
                .windows(2)
                .all(|w| w[0].probability >= w[1].probability));
        }
    }

    #[test]
    fn test_ultrarapid_offspring_is_warning() {
        let kb = KnowledgeBase::curated();
        let p = ParentProfile::new().with_calls("CYP2C19", &[AlleleCall::hom("*17")]);

        let report = cross_genes(&kb, &p, &p);
        let child = &report["CYP2C19"].outcomes[0];
        assert_eq!(child.phenotype, Phenotype::UltraRapid);
        assert_eq!(child.risk, RiskTier::Warning);
    }

    #[test]
    fn test_offspring_use_diplotype_table() {
        let kb = KnowledgeBase::builder()
            .fallback_function("GENEX", "*2", FunctionalClass::Decreased)
            .authoritative_diplotype(
                "GENEX",
                DiplotypePhenotype::new("*2/*2", Some(1.0), Phenotype::Poor, ""),
            )
            .build();
        let engine = PhenotypeEngine::new(&kb);

        let outcome = cross_gene(
            &engine,
            "GENEX",
            ("*2".to_string(), "*2".to_string()),
            ("*2".to_string(), "*2".to_string()),
        );
        assert_eq!(outcome.outcomes.len(), 1);
        assert_eq!(outcome.outcomes[0].phenotype, Phenotype::Poor);
    }

    #[test]
    fn test_profile_from_analysis_result() {
        let text = "\
##fileformat=VCFv4.2
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tMOTHER
22\t42524947\trs3892097\tC\tT\t.\tPASS\tGENE=CYP2D6;STAR=*4\tGT\t0/1
10\t94781859\trs4244285\tG\tA\t.\tPASS\tGENE=CYP2C19;STAR=*2\tGT\t1/1
";
        let kb = KnowledgeBase::curated();
        let doc = VcfParser::new().parse_bytes(text.as_bytes(), None).unwrap();
        let result = processor::analyze(&kb, &doc, &["codeine"], None).unwrap();

        let profile = ParentProfile::from_result(&result);
        assert_eq!(profile.alleles("CYP2D6"), ("*1".to_string(), "*4".to_string()));
        assert_eq!(profile.alleles("cyp2c19"), ("*2".to_string(), "*2".to_string()));
        assert_eq!(profile.alleles("TPMT"), ("*1".to_string(), "*1".to_string()));
    }

    #[test]
    fn test_invalid_diplotype() {
        let err = ParentProfile::from_diplotypes([("CYP2D6", "*4")]).unwrap_err();
        assert_eq!(
            err,
            InheritanceError::InvalidDiplotype {
                gene: "CYP2D6".to_string(),
                value: "*4".to_string()
            }
        );
    }
}
