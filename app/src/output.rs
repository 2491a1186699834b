// ==============================================================================
// output.rs - Structured Report Generation
// ==============================================================================
// Description: Per-drug clinical report with severity, confidence and quality
//              metrics, written as pretty JSON
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;
use uuid::Uuid;

use crate::alleles::FunctionalClass;
use crate::inheritance::InheritanceReport;
use crate::interactions::RiskLabel;
use crate::models::{AnalysisResult, AnalysisSummary, DetectedVariant, DrugResult, GenePhenotype};
use crate::parsers::vcf::ParseWarning;

/// Explanations are built from fixed templates
const EXPLANATION_MODEL: &str = "template-based";

/// Clinical severity derived from a risk label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    None,
    Low,
    Moderate,
    High,
    Critical,
}

impl Severity {
    pub fn from_risk(risk: RiskLabel) -> Self {
        match risk {
            RiskLabel::Safe => Severity::None,
            RiskLabel::AdjustDosage => Severity::Moderate,
            RiskLabel::Toxic => Severity::Critical,
            RiskLabel::Ineffective => Severity::High,
            RiskLabel::Unknown => Severity::Low,
        }
    }
}

/// Confidence from CPIC evidence level, halved when no guideline applied
pub fn confidence_score(evidence_level: Option<&str>, risk: RiskLabel) -> f64 {
    let base = match evidence_level.map(str::trim) {
        Some("A") => 0.95,
        Some("B") => 0.80,
        Some("C") => 0.60,
        Some("D") => 0.40,
        _ => 0.50,
    };
    if risk == RiskLabel::Unknown {
        round_to(base * 0.5, 2)
    } else {
        base
    }
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub risk_label: RiskLabel,
    pub confidence_score: f64,
    pub severity: Severity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantOutput {
    pub rsid: String,
    pub gene: String,
    pub star_allele: String,
    pub chrom: String,
    pub pos: u64,
    #[serde(rename = "ref")]
    pub ref_allele: String,
    pub alt: Vec<String>,
    pub genotype: String,
    pub is_variant: bool,
    pub functional_impact: FunctionalClass,
}

impl From<&DetectedVariant> for VariantOutput {
    fn from(v: &DetectedVariant) -> Self {
        Self {
            rsid: v.rsid.clone(),
            gene: v.gene.clone(),
            star_allele: v.star_allele.clone(),
            chrom: v.chromosome.clone(),
            pos: v.position,
            ref_allele: v.reference.clone(),
            alt: v.alternates.clone(),
            genotype: v.genotype.clone(),
            is_variant: v.is_variant,
            functional_impact: v.function,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PharmacogenomicProfile {
    pub primary_gene: Option<String>,
    pub diplotype: String,
    /// URM / NM / IM / PM / Unknown
    pub phenotype: String,
    pub detected_variants: Vec<VariantOutput>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClinicalRecommendation {
    pub action: String,
    pub cpic_guideline_level: String,
    pub guidelines_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Explanation {
    pub summary: String,
    pub mechanism: String,
    pub variant_citations: Vec<String>,
    pub model_used: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityMetrics {
    pub vcf_parsing_success: bool,
    pub vcf_format_version: String,
    pub total_variants_in_file: usize,
    pub pharmacogenomic_variants_detected: usize,
    pub genes_screened: usize,
    pub parse_time_ms: f64,
    pub analysis_time_ms: f64,
    pub warnings: usize,
}

impl QualityMetrics {
    pub fn from_result(result: &AnalysisResult) -> Self {
        Self {
            vcf_parsing_success: true,
            vcf_format_version: result.file_format.clone(),
            total_variants_in_file: result.total_records,
            pharmacogenomic_variants_detected: result.pgx_variant_count(),
            genes_screened: result.genes.len(),
            parse_time_ms: round_to(result.parse_ms, 1),
            analysis_time_ms: round_to(result.analysis_ms, 1),
            warnings: result.warnings.len(),
        }
    }
}

/// Report entry for one drug-gene result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrugReport {
    pub patient_id: String,
    pub drug: String,
    pub timestamp: DateTime<Utc>,
    pub risk_assessment: RiskAssessment,
    pub pharmacogenomic_profile: PharmacogenomicProfile,
    pub clinical_recommendation: ClinicalRecommendation,
    pub explanation: Explanation,
    pub quality_metrics: QualityMetrics,
}

impl DrugReport {
    fn build(result: &AnalysisResult, drug: &DrugResult, quality: &QualityMetrics) -> Self {
        let phenotype = drug
            .phenotype
            .as_ref()
            .map(|p| p.abbreviation())
            .unwrap_or("Unknown");

        Self {
            patient_id: result.patient_id.clone(),
            drug: drug.drug.clone(),
            timestamp: result.timestamp,
            risk_assessment: RiskAssessment {
                risk_label: drug.risk,
                confidence_score: confidence_score(drug.evidence_level.as_deref(), drug.risk),
                severity: Severity::from_risk(drug.risk),
            },
            pharmacogenomic_profile: PharmacogenomicProfile {
                primary_gene: drug.gene.clone(),
                diplotype: drug.diplotype.clone(),
                phenotype: phenotype.to_string(),
                detected_variants: drug.variants_cited.iter().map(VariantOutput::from).collect(),
            },
            clinical_recommendation: ClinicalRecommendation {
                action: drug.recommendation.clone(),
                cpic_guideline_level: drug
                    .evidence_level
                    .clone()
                    .unwrap_or_else(|| "N/A".to_string()),
                guidelines_url: drug.guideline_url.clone().unwrap_or_default(),
            },
            explanation: Explanation {
                summary: drug.explanation.clone(),
                mechanism: drug.mechanism.clone(),
                variant_citations: drug
                    .variants_cited
                    .iter()
                    .filter(|v| v.is_variant)
                    .map(DetectedVariant::citation)
                    .collect(),
                model_used: EXPLANATION_MODEL.to_string(),
            },
            quality_metrics: quality.clone(),
        }
    }
}

/// Complete report for one analysis run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub run_id: Uuid,
    pub patient_id: String,
    pub timestamp: DateTime<Utc>,
    /// SHA-256 of the raw input, when known
    pub input_sha256: Option<String>,
    pub results: Vec<DrugReport>,
    pub genes: Vec<GenePhenotype>,
    pub summary: AnalysisSummary,
    pub warnings: Vec<ParseWarning>,
}

impl AnalysisReport {
    pub fn from_result(result: &AnalysisResult) -> Self {
        let quality = QualityMetrics::from_result(result);

        Self {
            run_id: result.run_id,
            patient_id: result.patient_id.clone(),
            timestamp: result.timestamp,
            input_sha256: result.source.as_ref().map(|s| s.sha256.clone()),
            results: result
                .drug_results
                .iter()
                .map(|drug| DrugReport::build(result, drug, &quality))
                .collect(),
            genes: result.genes.clone(),
            summary: result.summary.clone(),
            warnings: result.warnings.clone(),
        }
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize analysis report")
    }
}

/// Writes reports to an output directory
pub struct OutputGenerator {
    output_dir: PathBuf,
}

impl OutputGenerator {
    pub fn new(output_dir: PathBuf) -> Self {
        Self { output_dir }
    }

    /// Write `{patient_id}_{run_id}.json`
    ///
    /// # Returns
    /// * Path of the written report
    pub fn write_report(&self, report: &AnalysisReport) -> Result<PathBuf> {
        let path = self
            .output_dir
            .join(format!("{}_{}.json", report.patient_id, report.run_id));
        self.write_json(&path, report)?;

        info!(
            "Report written: {:?} ({} drug results, {} critical)",
            path, report.results.len(), report.summary.critical_alerts
        );
        Ok(path)
    }

    /// Write an inheritance report under the given file stem
    pub fn write_inheritance(&self, stem: &str, report: &InheritanceReport) -> Result<PathBuf> {
        let path = self.output_dir.join(format!("{}.json", stem));
        self.write_json(&path, report)?;

        info!("Inheritance report written: {:?} ({} genes)", path, report.len());
        Ok(path)
    }

    fn write_json<T: Serialize>(&self, path: &Path, value: &T) -> Result<()> {
        std::fs::create_dir_all(&self.output_dir)
            .with_context(|| format!("Failed to create output directory {:?}", self.output_dir))?;

        let file = std::fs::File::create(path)
            .with_context(|| format!("Failed to create JSON output file {:?}", path))?;

        serde_json::to_writer_pretty(file, value).context("Failed to write JSON output")?;
        Ok(())
    }
}
