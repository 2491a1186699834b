// ==============================================================================
// models.rs - Analysis Result Models
// ==============================================================================
// Description: Per-run data structures produced by the orchestrator
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::alleles::{AlleleCall, FunctionalClass, Zygosity};
use crate::input::SourceInfo;
use crate::interactions::RiskLabel;
use crate::parsers::vcf::ParseWarning;
use crate::phenotype::{InferenceMethod, Phenotype};

/// How a record was tied to a gene and star allele
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationSource {
    /// GENE/STAR tags in the INFO column
    Info,
    /// rsID looked up in the knowledge base
    RsidRegistry,
}

/// A variant record narrowed to one pharmacogene, star allele and sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedVariant {
    /// Gene symbol (uppercase)
    pub gene: String,

    /// Star allele (e.g., "*4")
    pub star_allele: String,

    /// rsID or record identifier, empty if the ID column was "."
    pub rsid: String,

    pub chromosome: String,

    /// 1-based position
    pub position: u64,

    pub reference: String,
    pub alternates: Vec<String>,

    /// Sample the genotype belongs to (`None` for sites-only files)
    pub sample: Option<String>,

    /// Raw genotype token (e.g., "0/1", "1|1")
    pub genotype: String,

    /// True when the sample carries the annotated alternate (ALT 1)
    pub is_variant: bool,

    pub zygosity: Option<Zygosity>,

    pub function: FunctionalClass,

    pub annotation: AnnotationSource,
}

impl DetectedVariant {
    /// Allele call for phenotype inference; `None` when not carried
    pub fn call(&self) -> Option<AlleleCall> {
        if !self.is_variant || self.star_allele.is_empty() {
            return None;
        }
        self.zygosity
            .map(|z| AlleleCall::new(self.star_allele.clone(), z))
    }

    /// `CYP2D6 *4 (rs3892097, 22:42524947 C>T, genotype 1/1)`
    pub fn citation(&self) -> String {
        format!(
            "{} {} ({}, {}:{} {}>{}, genotype {})",
            self.gene,
            self.star_allele,
            self.rsid,
            self.chromosome,
            self.position,
            self.reference,
            self.alternates.join(","),
            self.genotype
        )
    }
}

/// Allele calls carried by a sample, in detection order
pub fn allele_calls(variants: &[DetectedVariant]) -> Vec<AlleleCall> {
    variants.iter().filter_map(DetectedVariant::call).collect()
}

/// Phenotype call for one gene in one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenePhenotype {
    pub gene: String,
    pub phenotype: Phenotype,

    /// Canonical diplotype the phenotype was inferred from
    pub diplotype: String,

    pub activity_score: Option<f64>,
    pub method: InferenceMethod,

    /// Every tagged record for the gene, carried or not
    pub detected_variants: Vec<DetectedVariant>,

    /// "Detected: *4 (1/1)" or the wild-type note
    pub activity_description: String,
}

impl GenePhenotype {
    pub fn calls(&self) -> Vec<AlleleCall> {
        allele_calls(&self.detected_variants)
    }

    /// Records the sample actually carries
    pub fn carried_variants(&self) -> impl Iterator<Item = &DetectedVariant> {
        self.detected_variants
            .iter()
            .filter(|v| v.is_variant && !v.star_allele.is_empty())
    }
}

/// Risk assessment for one (drug, gene) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrugResult {
    /// Lowercased drug name
    pub drug: String,

    /// Gene the guideline is keyed on; `None` for drugs with no data
    pub gene: Option<String>,

    pub phenotype: Option<Phenotype>,
    pub risk: RiskLabel,

    /// Reported diplotype, `*1/*1` when nothing is carried
    pub diplotype: String,

    pub recommendation: String,
    pub mechanism: String,

    /// Deterministic explanation citing each carried variant
    pub explanation: String,

    pub evidence_level: Option<String>,
    pub guideline_url: Option<String>,

    pub variants_cited: Vec<DetectedVariant>,
}

/// Drug flagged Toxic or Ineffective
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriticalAlert {
    pub drug: String,
    pub risk: RiskLabel,
    pub gene: Option<String>,
}

/// Run-level summary
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSummary {
    pub patient_id: String,

    /// Non-empty drug names requested
    pub drugs_analyzed: usize,

    /// Number of drug results (one per drug-gene pair)
    pub total_interactions: usize,

    pub risk_distribution: BTreeMap<RiskLabel, usize>,
    pub critical_alerts: usize,
    pub critical_drugs: Vec<CriticalAlert>,
    pub genes_screened: usize,
}

impl AnalysisSummary {
    /// Tally results into a summary
    pub fn from_results(
        patient_id: &str,
        drugs_analyzed: usize,
        genes_screened: usize,
        results: &[DrugResult],
    ) -> Self {
        let mut risk_distribution = BTreeMap::new();
        for result in results {
            *risk_distribution.entry(result.risk).or_insert(0) += 1;
        }

        let critical_drugs: Vec<CriticalAlert> = results
            .iter()
            .filter(|r| r.risk.is_critical())
            .map(|r| CriticalAlert {
                drug: r.drug.clone(),
                risk: r.risk,
                gene: r.gene.clone(),
            })
            .collect();

        Self {
            patient_id: patient_id.to_string(),
            drugs_analyzed,
            total_interactions: results.len(),
            risk_distribution,
            critical_alerts: critical_drugs.len(),
            critical_drugs,
            genes_screened,
        }
    }
}

/// Complete result of one analysis run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub run_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub patient_id: String,

    /// Sample whose genotypes were analyzed
    pub sample: Option<String>,

    /// File format token (e.g., "VCFv4.2")
    pub file_format: String,

    /// Data records retained by the parser
    pub total_records: usize,

    /// Encoding, size and fingerprint when parsed from bytes or a path
    pub source: Option<SourceInfo>,

    pub genes: Vec<GenePhenotype>,
    pub drug_results: Vec<DrugResult>,
    pub summary: AnalysisSummary,

    /// Parser warnings plus any raised during extraction
    pub warnings: Vec<ParseWarning>,

    pub parse_ms: f64,
    pub analysis_ms: f64,
}

impl AnalysisResult {
    pub fn gene(&self, gene: &str) -> Option<&GenePhenotype> {
        self.genes.iter().find(|g| g.gene.eq_ignore_ascii_case(gene))
    }

    pub fn results_for_drug(&self, drug: &str) -> Vec<&DrugResult> {
        let drug = drug.trim().to_lowercase();
        self.drug_results.iter().filter(|r| r.drug == drug).collect()
    }

    /// Tagged records across all genes
    pub fn pgx_variant_count(&self) -> usize {
        self.genes.iter().map(|g| g.detected_variants.len()).sum()
    }
}
