// ==============================================================================
// processor.rs - Pharmacogenomic Analysis Orchestrator
// ==============================================================================
// Description: Extracts pharmacogenomic variants, infers per-gene phenotypes
//              and resolves drug risks against a shared knowledge base
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================
// Pipeline (per run, sequential):
//   1. Parse (optional, when given bytes or a path)
//   2. Tag records by INFO GENE/STAR, else rsID registry; known genes only
//   3. Infer a phenotype for every known gene
//   4. Resolve each requested drug against each of its genes
//   5. Summarize risk distribution and critical alerts
// ==============================================================================

use chrono::Utc;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::alleles::{self, Zygosity};
use crate::config::ProcessorConfig;
use crate::input;
use crate::interactions::{DrugGeneInteraction, Resolution, RiskLabel};
use crate::knowledge_base::KnowledgeBase;
use crate::models::{
    allele_calls, AnalysisResult, AnalysisSummary, AnnotationSource, DetectedVariant, DrugResult,
    GenePhenotype,
};
use crate::parsers::vcf::{ParseError, ParseWarning, ParsedDocument, VariantRecord, WarningKind};
use crate::phenotype::{Phenotype, PhenotypeEngine};

const UNKNOWN_PATIENT: &str = "UNKNOWN";

/// Errors that abort an analysis run
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("Sample '{sample}' not found in document")]
    SampleNotFound { sample: String },

    #[error("Analysis task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Outcome of one input in a batch
#[derive(Debug)]
pub struct BatchOutcome {
    pub path: PathBuf,
    pub result: Result<AnalysisResult, AnalysisError>,
}

/// Analysis entry point sharing one knowledge base across runs
#[derive(Debug, Clone)]
pub struct PgxProcessor {
    kb: Arc<KnowledgeBase>,
    config: ProcessorConfig,
}

impl PgxProcessor {
    pub fn new(kb: Arc<KnowledgeBase>, config: ProcessorConfig) -> Self {
        Self { kb, config }
    }

    /// Load the knowledge base from `config.tables_dir` and wrap it
    pub fn from_config(config: ProcessorConfig) -> Self {
        let kb = KnowledgeBase::load(&config.tables_dir);
        Self::new(Arc::new(kb), config)
    }

    pub fn knowledge_base(&self) -> &KnowledgeBase {
        &self.kb
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    /// Analyze an already-parsed document
    pub fn analyze<S: AsRef<str>>(
        &self,
        doc: &ParsedDocument,
        drugs: &[S],
        sample: Option<&str>,
    ) -> Result<AnalysisResult, AnalysisError> {
        analyze(&self.kb, doc, drugs, sample)
    }

    /// Parse and analyze an in-memory upload
    pub fn analyze_bytes<S: AsRef<str>>(
        &self,
        bytes: &[u8],
        filename: Option<&str>,
        drugs: &[S],
        sample: Option<&str>,
    ) -> Result<AnalysisResult, AnalysisError> {
        let started = Instant::now();
        let doc = self.config.parser().parse_bytes(bytes, filename)?;
        let parse_ms = elapsed_ms(started);

        let mut result = run(&self.kb, &doc, drugs, sample, filename)?;
        result.parse_ms = parse_ms;
        Ok(result)
    }

    /// Parse and analyze a file on disk
    pub fn analyze_path<S: AsRef<str>>(
        &self,
        path: &Path,
        drugs: &[S],
        sample: Option<&str>,
    ) -> Result<AnalysisResult, AnalysisError> {
        let started = Instant::now();
        let doc = self.config.parser().parse_path(path)?;
        let parse_ms = elapsed_ms(started);

        let filename = path.file_name().map(|n| n.to_string_lossy().to_string());
        let mut result = run(&self.kb, &doc, drugs, sample, filename.as_deref())?;
        result.parse_ms = parse_ms;
        Ok(result)
    }

    /// Analyze independent inputs concurrently on blocking worker threads
    ///
    /// # Arguments
    /// * `paths` - Input files; each becomes its own run
    /// * `drugs` - Drugs assessed for every input
    /// * `sample` - Sample to analyze in each input (first sample if `None`)
    ///
    /// # Returns
    /// One outcome per input, in input order. A failed input never affects
    /// the others.
    pub async fn analyze_paths(
        &self,
        paths: Vec<PathBuf>,
        drugs: Vec<String>,
        sample: Option<String>,
    ) -> Vec<BatchOutcome> {
        info!("Starting batch analysis of {} inputs", paths.len());
        let drugs = Arc::new(drugs);

        let mut handles = Vec::with_capacity(paths.len());
        for path in paths {
            let processor = self.clone();
            let drugs = Arc::clone(&drugs);
            let sample = sample.clone();
            let task_path = path.clone();

            let handle = tokio::task::spawn_blocking(move || {
                processor.analyze_path(&task_path, drugs.as_slice(), sample.as_deref())
            });
            handles.push((path, handle));
        }

        let mut outcomes = Vec::with_capacity(handles.len());
        for (path, handle) in handles {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => Err(AnalysisError::Join(e)),
            };
            if let Err(e) = &result {
                warn!("Analysis of {:?} failed: {}", path, e);
            }
            outcomes.push(BatchOutcome { path, result });
        }

        info!(
            "Batch complete: {}/{} succeeded",
            outcomes.iter().filter(|o| o.result.is_ok()).count(),
            outcomes.len()
        );
        outcomes
    }
}

/// Analyze a parsed document against a knowledge base
///
/// Pure function of its inputs: no I/O, no shared mutable state.
///
/// # Arguments
/// * `kb` - Loaded knowledge base
/// * `doc` - Parsed VCF
/// * `drugs` - Drug names (trimmed and lowercased; blanks skipped)
/// * `sample` - Sample to analyze; the first sample when `None`
///
/// # Returns
/// * `Ok(AnalysisResult)` - One phenotype per known gene, one result per
///   drug-gene pair (or one `Unknown` result for an unmapped drug)
/// * `Err(AnalysisError::SampleNotFound)` - `sample` is not in the document
pub fn analyze<S: AsRef<str>>(
    kb: &KnowledgeBase,
    doc: &ParsedDocument,
    drugs: &[S],
    sample: Option<&str>,
) -> Result<AnalysisResult, AnalysisError> {
    run(kb, doc, drugs, sample, None)
}

fn run<S: AsRef<str>>(
    kb: &KnowledgeBase,
    doc: &ParsedDocument,
    drugs: &[S],
    sample: Option<&str>,
    filename: Option<&str>,
) -> Result<AnalysisResult, AnalysisError> {
    let started = Instant::now();

    if let Some(requested) = sample {
        if !doc.has_sample(requested) {
            return Err(AnalysisError::SampleNotFound {
                sample: requested.to_string(),
            });
        }
    }

    let target = sample.or_else(|| doc.samples.first().map(String::as_str));
    let patient_id = target
        .map(str::to_string)
        .or_else(|| filename.and_then(input::patient_id_from_filename))
        .unwrap_or_else(|| UNKNOWN_PATIENT.to_string());

    info!(
        "Analyzing {} records for {} ({} drugs requested)",
        doc.records.len(),
        patient_id,
        drugs.len()
    );

    let mut warnings = doc.warnings.clone();
    let mut by_gene = extract_variants(kb, doc, target, &mut warnings);

    let genes = infer_phenotypes(kb, &mut by_gene);

    let mut drug_results = Vec::new();
    let mut drugs_analyzed = 0;
    for drug in drugs {
        let name = drug.as_ref().trim().to_lowercase();
        if name.is_empty() {
            continue;
        }
        drugs_analyzed += 1;
        drug_results.extend(assess_drug(kb, &name, &genes));
    }

    let summary = AnalysisSummary::from_results(&patient_id, drugs_analyzed, genes.len(), &drug_results);
    if summary.critical_alerts > 0 {
        warn!(
            "{}: {} critical drug alerts",
            patient_id, summary.critical_alerts
        );
    }

    let result = AnalysisResult {
        run_id: Uuid::new_v4(),
        timestamp: Utc::now(),
        patient_id,
        sample: target.map(str::to_string),
        file_format: doc.file_format.clone(),
        total_records: doc.records.len(),
        source: doc.source.clone(),
        genes,
        drug_results,
        summary,
        warnings,
        parse_ms: 0.0,
        analysis_ms: elapsed_ms(started),
    };

    info!(
        "Analysis {} complete: {} genes, {} drug results, {} warnings",
        result.run_id,
        result.genes.len(),
        result.drug_results.len(),
        result.warnings.len()
    );

    Ok(result)
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}

/// Tag a record with (gene, star allele), INFO tags first
fn tag_record(
    kb: &KnowledgeBase,
    record: &VariantRecord,
    warnings: &mut Vec<ParseWarning>,
) -> Option<(String, String, AnnotationSource)> {
    let info_gene = record
        .info
        .get("GENE")
        .map(|g| g.trim().to_uppercase())
        .filter(|g| !g.is_empty());
    let info_star = record
        .info
        .get("STAR")
        .map(|s| alleles::normalize_star(s.trim()))
        .filter(|s| !s.is_empty());

    if let (Some(gene), Some(star)) = (&info_gene, &info_star) {
        return Some((gene.clone(), star.clone(), AnnotationSource::Info));
    }

    let rs_tags = record
        .info
        .get("RS")
        .into_iter()
        .flat_map(|rs| rs.split(';'))
        .map(str::trim);

    // A GENE tag restricts registry hits to that gene
    for id in rs_tags.chain(record.identifiers()) {
        let Some(hit) = kb.lookup_rsid(id) else {
            continue;
        };
        if let Some(tagged) = info_gene.as_deref().filter(|g| *g != hit.gene) {
            debug!(
                "{}:{} {} is {} in the registry but tagged GENE={}, ignored",
                record.chromosome, record.position, id, hit.gene, tagged
            );
            continue;
        }
        debug!("{}:{} {} → {} {}", record.chromosome, record.position, id, hit.gene, hit.allele);
        return Some((hit.gene.clone(), hit.allele.clone(), AnnotationSource::RsidRegistry));
    }

    if let Some(gene) = info_gene.filter(|g| kb.is_known_gene(g)) {
        warnings.push(ParseWarning {
            line: record.line,
            kind: WarningKind::MissingAnnotation,
            message: format!(
                "Variant at {}:{} has GENE={} but no STAR tag, skipped",
                record.chromosome, record.position, gene
            ),
        });
    }

    None
}

/// Collect tagged records for known genes, grouped by gene in file order
fn extract_variants(
    kb: &KnowledgeBase,
    doc: &ParsedDocument,
    sample: Option<&str>,
    warnings: &mut Vec<ParseWarning>,
) -> BTreeMap<String, Vec<DetectedVariant>> {
    let mut by_gene: BTreeMap<String, Vec<DetectedVariant>> = BTreeMap::new();

    for record in &doc.records {
        let Some((gene, star, annotation)) = tag_record(kb, record, warnings) else {
            continue;
        };
        if !kb.is_known_gene(&gene) {
            debug!("Skipping {} at {}:{}: not a screened gene", gene, record.chromosome, record.position);
            continue;
        }

        let genotype = match sample {
            Some(s) => record.genotype_for(s),
            None => record.genotypes.first(),
        };

        // The allele annotation describes ALT 1 only
        let (raw, is_variant, zygosity) = match genotype {
            Some(gt) if !gt.raw.is_empty() => {
                if gt.has_secondary_alternate() {
                    warnings.push(ParseWarning {
                        line: record.line,
                        kind: WarningKind::MultiAllelic,
                        message: format!(
                            "Genotype {} at {}:{} calls another alternate; only ALT 1 counts as {} {}",
                            gt.raw, record.chromosome, record.position, gene, star
                        ),
                    });
                }
                let copies = gt.allele_copies(1);
                (gt.raw.clone(), copies > 0, Zygosity::from_variant_copies(copies))
            }
            Some(_) => ("./.".to_string(), false, None),
            None => ("0/0".to_string(), false, None),
        };

        let rsid = record
            .info
            .get("RS")
            .map(str::to_string)
            .or_else(|| record.id.clone())
            .unwrap_or_default();

        let variant = DetectedVariant {
            function: kb.functional_class(&gene, &star),
            gene: gene.clone(),
            star_allele: star,
            rsid,
            chromosome: record.chromosome.clone(),
            position: record.position,
            reference: record.reference.clone(),
            alternates: record.alternates.clone(),
            sample: genotype.map(|g| g.sample.clone()),
            genotype: raw,
            is_variant,
            zygosity,
            annotation,
        };

        by_gene.entry(gene).or_default().push(variant);
    }

    debug!(
        "Extracted {} pharmacogenomic records across {} genes",
        by_gene.values().map(Vec::len).sum::<usize>(),
        by_gene.len()
    );

    by_gene
}

/// Phenotype every known gene, including genes with no tagged records
fn infer_phenotypes(
    kb: &KnowledgeBase,
    by_gene: &mut BTreeMap<String, Vec<DetectedVariant>>,
) -> Vec<GenePhenotype> {
    let engine = PhenotypeEngine::new(kb);

    kb.genes()
        .iter()
        .map(|gene| {
            let variants = by_gene.remove(gene).unwrap_or_default();
            let calls = allele_calls(&variants);
            let call = engine.infer(gene, &calls);

            let carried: Vec<String> = variants
                .iter()
                .filter(|v| v.is_variant && !v.star_allele.is_empty())
                .map(|v| format!("{} ({})", v.star_allele, v.genotype))
                .collect();
            let activity_description = if carried.is_empty() {
                "No actionable variants detected, assumed wild-type (*1/*1)".to_string()
            } else {
                format!("Detected: {}", carried.join(", "))
            };

            debug!("{}: {} via {:?}", gene, call.phenotype, call.method);

            GenePhenotype {
                gene: gene.clone(),
                phenotype: call.phenotype,
                diplotype: call.diplotype,
                activity_score: call.activity_score,
                method: call.method,
                detected_variants: variants,
                activity_description,
            }
        })
        .collect()
}

/// One result per relevant gene, or a single `Unknown` result
fn assess_drug(kb: &KnowledgeBase, drug: &str, genes: &[GenePhenotype]) -> Vec<DrugResult> {
    let relevant = kb.genes_for_drug(drug);

    if relevant.is_empty() {
        debug!("No interactions for {}", drug);
        return vec![DrugResult {
            drug: drug.to_string(),
            gene: None,
            phenotype: None,
            risk: RiskLabel::Unknown,
            diplotype: format!("{}/{}", alleles::WILD_TYPE, alleles::WILD_TYPE),
            recommendation: format!(
                "No pharmacogenomic data available for {} in our knowledge base.",
                drug
            ),
            mechanism: String::new(),
            explanation: format!(
                "The drug '{}' is not currently in our pharmacogenomic database. \
                 This does not mean it is safe; consult standard prescribing guidelines.",
                drug
            ),
            evidence_level: None,
            guideline_url: None,
            variants_cited: Vec::new(),
        }];
    }

    relevant
        .iter()
        .map(|gene| {
            let profile = genes.iter().find(|g| g.gene == *gene);
            let phenotype = profile
                .map(|g| g.phenotype.clone())
                .unwrap_or(Phenotype::Normal);
            let cited: Vec<DetectedVariant> = profile
                .map(|g| g.carried_variants().cloned().collect())
                .unwrap_or_default();
            let diplotype = alleles::reported_diplotype(&allele_calls(&cited));

            match kb.resolve(drug, gene, &phenotype) {
                Resolution::Found(ix) => DrugResult {
                    drug: drug.to_string(),
                    gene: Some(gene.clone()),
                    risk: ix.risk,
                    diplotype,
                    recommendation: ix.recommendation.clone(),
                    mechanism: ix.mechanism.clone(),
                    explanation: clinical_explanation(ix, &phenotype, &cited),
                    evidence_level: Some(ix.evidence_level.clone()).filter(|l| !l.is_empty()),
                    guideline_url: ix.guideline_url.clone(),
                    phenotype: Some(phenotype),
                    variants_cited: cited,
                },
                Resolution::NoGuideline => DrugResult {
                    drug: drug.to_string(),
                    gene: Some(gene.clone()),
                    risk: RiskLabel::Unknown,
                    diplotype,
                    recommendation: format!(
                        "No specific CPIC guideline found for {} with {} {}.",
                        drug, phenotype, gene
                    ),
                    mechanism: String::new(),
                    explanation: format!(
                        "The patient is classified as a {} for {}, but no specific \
                         interaction data is available for {} with this phenotype.",
                        phenotype, gene, drug
                    ),
                    evidence_level: None,
                    guideline_url: None,
                    phenotype: Some(phenotype),
                    variants_cited: Vec::new(),
                },
            }
        })
        .collect()
}

/// Deterministic explanation citing every carried variant
fn clinical_explanation(
    ix: &DrugGeneInteraction,
    phenotype: &Phenotype,
    cited: &[DetectedVariant],
) -> String {
    let citations: Vec<String> = cited.iter().map(DetectedVariant::citation).collect();

    let mut text = String::new();
    if !citations.is_empty() {
        text.push_str("Detected variant(s): ");
        text.push_str(&citations.join("; "));
        text.push_str(". ");
    }
    text.push_str(&format!(
        "The patient is classified as a {} for {}. {} Based on CPIC guidelines (evidence level {}): {}",
        phenotype, ix.gene, ix.mechanism, ix.evidence_level, ix.recommendation
    ));
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alleles::FunctionalClass;
    use crate::input::test_support::gzip_bytes;
    use crate::interactions::DrugGeneInteraction;
    use crate::parsers::vcf::VcfParser;
    use crate::phenotype::InferenceMethod;
    use std::io::Write;

    const HEADER: &str = "\
##fileformat=VCFv4.2
##INFO=<ID=GENE,Number=1,Type=String,Description=\"Gene\">
##INFO=<ID=STAR,Number=1,Type=String,Description=\"Star allele\">
##INFO=<ID=RS,Number=1,Type=String,Description=\"rsID\">
";

    fn vcf(samples: &[&str], rows: &[&str]) -> String {
        let mut text = HEADER.to_string();
        text.push_str("#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO");
        if !samples.is_empty() {
            text.push_str("\tFORMAT");
            for s in samples {
                text.push('\t');
                text.push_str(s);
            }
        }
        text.push('\n');
        for row in rows {
            text.push_str(row);
            text.push('\n');
        }
        text
    }

    fn processor() -> PgxProcessor {
        PgxProcessor::new(Arc::new(KnowledgeBase::curated()), ProcessorConfig::default())
    }

    fn parse(text: &str) -> ParsedDocument {
        VcfParser::new().parse_bytes(text.as_bytes(), None).unwrap()
    }

    #[test]
    fn test_homozygous_no_function_codeine() {
        let text = vcf(
            &["PATIENT_A"],
            &["22\t42524947\trs3892097\tC\tT\t50\tPASS\tGENE=CYP2D6;STAR=*4;RS=rs3892097\tGT\t1/1"],
        );
        let result = processor()
            .analyze(&parse(&text), &["Codeine"], None)
            .unwrap();

        let gene = result.gene("CYP2D6").unwrap();
        assert_eq!(gene.phenotype, Phenotype::Poor);
        assert_eq!(gene.diplotype, "*4/*4");
        assert_eq!(gene.activity_description, "Detected: *4 (1/1)");

        let codeine = &result.results_for_drug("codeine")[0];
        assert_eq!(codeine.risk, RiskLabel::Ineffective);
        assert_eq!(codeine.diplotype, "*4/*4");
        assert_eq!(codeine.evidence_level.as_deref(), Some("A"));
        assert!(codeine.explanation.starts_with(
            "Detected variant(s): CYP2D6 *4 (rs3892097, 22:42524947 C>T, genotype 1/1). \
             The patient is classified as a Poor Metabolizer for CYP2D6."
        ));
        assert_eq!(codeine.variants_cited.len(), 1);

        assert_eq!(result.patient_id, "PATIENT_A");
        assert_eq!(result.summary.critical_alerts, 1);
        assert_eq!(result.summary.critical_drugs[0].drug, "codeine");
    }

    #[test]
    fn test_reference_genotype_defaults_to_normal() {
        let text = vcf(
            &["S1"],
            &["22\t42524947\trs3892097\tC\tT\t50\tPASS\tGENE=CYP2D6;STAR=*1\tGT\t0/0"],
        );
        let result = processor().analyze(&parse(&text), &["codeine"], None).unwrap();

        let gene = result.gene("CYP2D6").unwrap();
        assert_eq!(gene.phenotype, Phenotype::Normal);
        assert_eq!(gene.method, InferenceMethod::AssumedWildType);
        assert_eq!(gene.detected_variants.len(), 1);
        assert!(!gene.detected_variants[0].is_variant);
        assert_eq!(
            gene.activity_description,
            "No actionable variants detected, assumed wild-type (*1/*1)"
        );

        let codeine = &result.drug_results[0];
        assert_eq!(codeine.risk, RiskLabel::Safe);
        assert_eq!(codeine.diplotype, "*1/*1");
        assert!(codeine.variants_cited.is_empty());
    }

    #[test]
    fn test_every_known_gene_is_screened() {
        let text = vcf(&["S1"], &[]);
        let result = processor().analyze(&parse(&text), &[] as &[&str], None).unwrap();

        let kb = KnowledgeBase::curated();
        assert_eq!(result.genes.len(), kb.genes().len());
        assert!(result.genes.iter().all(|g| g.phenotype == Phenotype::Normal));
        assert_eq!(result.summary.genes_screened, kb.genes().len());
        assert!(result.drug_results.is_empty());
    }

    #[test]
    fn test_unknown_drug_yields_unknown_result() {
        let text = vcf(&["S1"], &[]);
        let result = processor()
            .analyze(&parse(&text), &["  Aspirin ", "", "warfarin"], None)
            .unwrap();

        assert_eq!(result.summary.drugs_analyzed, 2);
        let aspirin = &result.results_for_drug("aspirin");
        assert_eq!(aspirin.len(), 1);
        assert_eq!(aspirin[0].risk, RiskLabel::Unknown);
        assert!(aspirin[0].gene.is_none());
        assert_eq!(
            aspirin[0].recommendation,
            "No pharmacogenomic data available for aspirin in our knowledge base."
        );
        assert!(!aspirin[0].explanation.is_empty());
        assert_eq!(result.summary.risk_distribution[&RiskLabel::Unknown], 1);
        assert_eq!(result.summary.risk_distribution[&RiskLabel::Safe], 1);
    }

    #[test]
    fn test_missing_guideline_is_explicit() {
        let kb = KnowledgeBase::builder()
            .fallback_function("CYP2D6", "*4", FunctionalClass::NoFunction)
            .interaction(DrugGeneInteraction {
                drug: "codeine".to_string(),
                gene: "CYP2D6".to_string(),
                phenotype: Phenotype::Poor,
                risk: RiskLabel::Ineffective,
                recommendation: "Avoid.".to_string(),
                mechanism: "No activation.".to_string(),
                evidence_level: "A".to_string(),
                guideline_url: None,
            })
            .build();

        let text = vcf(&["S1"], &[]);
        let result = analyze(&kb, &parse(&text), &["codeine"], None).unwrap();

        let codeine = &result.drug_results[0];
        assert_eq!(codeine.risk, RiskLabel::Unknown);
        assert_eq!(codeine.phenotype, Some(Phenotype::Normal));
        assert_eq!(
            codeine.recommendation,
            "No specific CPIC guideline found for codeine with Normal Metabolizer CYP2D6."
        );
    }

    #[test]
    fn test_rsid_registry_fallback() {
        let text = vcf(
            &["S1"],
            &[
                // No INFO tags; compound ID resolved by its second part
                "10\t94781859\trs999;rs4244285\tG\tA\t.\tPASS\t.\tGT\t0/1",
                // RS tag overrides an unhelpful ID column
                "10\t94842866\t.\tC\tT\t.\tPASS\tRS=rs12248560\tGT\t0|1",
            ],
        );
        let result = processor().analyze(&parse(&text), &["clopidogrel"], None).unwrap();

        let gene = result.gene("CYP2C19").unwrap();
        assert_eq!(gene.detected_variants.len(), 2);
        assert_eq!(gene.detected_variants[0].star_allele, "*2");
        assert_eq!(gene.detected_variants[0].annotation, AnnotationSource::RsidRegistry);
        assert_eq!(gene.detected_variants[1].star_allele, "*17");
        assert_eq!(gene.detected_variants[1].rsid, "rs12248560");
        // *2 (no function, 0.0) + *17 (increased, 1.5) = 1.5
        assert_eq!(gene.phenotype, Phenotype::Normal);

        assert_eq!(result.drug_results[0].diplotype, "*2/*17");
    }

    #[test]
    fn test_missing_star_tag_is_warned_and_skipped() {
        let text = vcf(
            &["S1"],
            &[
                "1\t100\t.\tA\tG\t.\tPASS\tGENE=TPMT\tGT\t1/1",
                "1\t200\t.\tA\tG\t.\tPASS\tGENE=BRCA1;STAR=*2\tGT\t1/1",
                "2\t300\t.\tA\tG\t.\tPASS\tGENE=dpyd;STAR=2A\tGT\t0/1",
            ],
        );
        let result = processor().analyze(&parse(&text), &["fluorouracil"], None).unwrap();

        let missing: Vec<_> = result
            .warnings
            .iter()
            .filter(|w| w.kind == WarningKind::MissingAnnotation)
            .collect();
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].line, 6);

        assert!(result.gene("TPMT").unwrap().detected_variants.is_empty());
        assert!(result.gene("BRCA1").is_none());

        let dpyd = result.gene("DPYD").unwrap();
        assert_eq!(dpyd.detected_variants[0].star_allele, "*2A");
        assert_eq!(dpyd.phenotype, Phenotype::Intermediate);
        assert_eq!(result.drug_results[0].risk, RiskLabel::AdjustDosage);
    }

    #[test]
    fn test_registry_hit_must_match_gene_tag() {
        let text = vcf(
            &["S1"],
            &[
                // rs3892097 is CYP2D6 *4, but the row is tagged TPMT
                "22\t42524947\trs3892097\tC\tT\t.\tPASS\tGENE=TPMT\tGT\t1/1",
                // Registry agrees with the tag
                "6\t18130918\trs1142345\tT\tC\t.\tPASS\tGENE=TPMT\tGT\t0/1",
            ],
        );
        let result = processor().analyze(&parse(&text), &["codeine"], None).unwrap();

        assert!(result.gene("CYP2D6").unwrap().detected_variants.is_empty());
        assert_eq!(result.gene("CYP2D6").unwrap().phenotype, Phenotype::Normal);

        let tpmt = result.gene("TPMT").unwrap();
        assert_eq!(tpmt.detected_variants.len(), 1);
        assert_eq!(tpmt.detected_variants[0].star_allele, "*3C");

        let missing: Vec<_> = result
            .warnings
            .iter()
            .filter(|w| w.kind == WarningKind::MissingAnnotation)
            .collect();
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].line, 6);
    }

    #[test]
    fn test_multi_allelic_genotype_counts_annotated_alternate_only() {
        let text = vcf(
            &["S1", "S2"],
            &["22\t42524947\trs3892097\tC\tT,A\t.\tPASS\tGENE=CYP2D6;STAR=*4\tGT\t1/2\t2/2"],
        );
        let doc = parse(&text);
        let processor = processor();

        // One copy of ALT 1: heterozygous, not *4/*4
        let compound = processor.analyze(&doc, &["codeine"], Some("S1")).unwrap();
        let gene = compound.gene("CYP2D6").unwrap();
        assert_eq!(gene.detected_variants[0].zygosity, Some(Zygosity::Heterozygous));
        assert_eq!(gene.diplotype, "*1/*4");
        assert_eq!(gene.phenotype, Phenotype::Intermediate);

        let multi: Vec<_> = compound
            .warnings
            .iter()
            .filter(|w| w.kind == WarningKind::MultiAllelic)
            .collect();
        assert_eq!(multi.len(), 1);
        assert_eq!(multi[0].line, 6);

        // No copy of ALT 1 at all
        let other = processor.analyze(&doc, &["codeine"], Some("S2")).unwrap();
        let gene = other.gene("CYP2D6").unwrap();
        assert!(!gene.detected_variants[0].is_variant);
        assert_eq!(gene.detected_variants[0].zygosity, None);
        assert_eq!(gene.diplotype, "*1/*1");
        assert_eq!(gene.phenotype, Phenotype::Normal);
    }

    #[test]
    fn test_sample_selection() {
        let text = vcf(
            &["MOTHER", "CHILD"],
            &["22\t42524947\trs3892097\tC\tT\t.\tPASS\tGENE=CYP2D6;STAR=*4\tGT\t0/0\t1/1"],
        );
        let doc = parse(&text);
        let processor = processor();

        let first = processor.analyze(&doc, &["codeine"], None).unwrap();
        assert_eq!(first.patient_id, "MOTHER");
        assert_eq!(first.gene("CYP2D6").unwrap().phenotype, Phenotype::Normal);

        let child = processor.analyze(&doc, &["codeine"], Some("CHILD")).unwrap();
        assert_eq!(child.sample.as_deref(), Some("CHILD"));
        assert_eq!(child.gene("CYP2D6").unwrap().phenotype, Phenotype::Poor);

        let err = processor.analyze(&doc, &["codeine"], Some("FATHER")).unwrap_err();
        assert!(matches!(err, AnalysisError::SampleNotFound { ref sample } if sample == "FATHER"));
    }

    #[test]
    fn test_patient_id_from_filename_without_samples() {
        let text = vcf(&[], &["22\t42524947\trs3892097\tC\tT\t.\tPASS\tGENE=CYP2D6;STAR=*4"]);
        let processor = processor();

        let result = processor
            .analyze_bytes(text.as_bytes(), Some("jane doe.vcf"), &["codeine"], None)
            .unwrap();
        assert_eq!(result.patient_id, "PATIENT_JANE_DOE");
        // Sites-only record: tagged but never carried
        let gene = result.gene("CYP2D6").unwrap();
        assert_eq!(gene.detected_variants[0].genotype, "0/0");
        assert_eq!(gene.phenotype, Phenotype::Normal);

        let anonymous = processor.analyze(&parse(&text), &["codeine"], None).unwrap();
        assert_eq!(anonymous.patient_id, "UNKNOWN");
    }

    #[test]
    fn test_gzip_input_matches_plain_text() {
        let text = vcf(
            &["S1"],
            &[
                "22\t42524947\trs3892097\tC\tT\t.\tPASS\tGENE=CYP2D6;STAR=*4\tGT\t0/1",
                "10\t94781859\trs4244285\tG\tA\t.\tPASS\t.\tGT\t1/1",
            ],
        );
        let processor = processor();
        let drugs = ["codeine", "clopidogrel"];

        let plain = processor.analyze_bytes(text.as_bytes(), Some("s.vcf"), &drugs, None).unwrap();
        let gz = processor
            .analyze_bytes(&gzip_bytes(text.as_bytes()), Some("s.vcf.gz"), &drugs, None)
            .unwrap();

        assert_eq!(plain.genes, gz.genes);
        assert_eq!(plain.drug_results, gz.drug_results);
        assert_eq!(plain.summary, gz.summary);
        assert_ne!(
            plain.source.as_ref().unwrap().sha256,
            gz.source.as_ref().unwrap().sha256
        );
    }

    #[test]
    fn test_fatal_input_errors() {
        let processor = processor();
        let err = processor
            .analyze_bytes(b"#CHROM\tPOS\n", None, &["codeine"], None)
            .unwrap_err();
        assert!(matches!(err, AnalysisError::Parse(ParseError::InvalidHeader(_))));

        let err = processor.analyze_bytes(b"", None, &["codeine"], None).unwrap_err();
        assert!(matches!(err, AnalysisError::Parse(ParseError::Empty)));
    }

    #[tokio::test]
    async fn test_batch_analysis() {
        let text = vcf(
            &["S1"],
            &["22\t42524947\trs3892097\tC\tT\t.\tPASS\tGENE=CYP2D6;STAR=*4\tGT\t1/1"],
        );
        let mut file = tempfile::Builder::new().suffix(".vcf").tempfile().unwrap();
        file.write_all(text.as_bytes()).unwrap();
        file.flush().unwrap();

        let paths = vec![
            file.path().to_path_buf(),
            PathBuf::from("/nonexistent/input.vcf"),
        ];
        let outcomes = processor()
            .analyze_paths(paths, vec!["codeine".to_string()], None)
            .await;

        assert_eq!(outcomes.len(), 2);
        let ok = outcomes[0].result.as_ref().unwrap();
        assert_eq!(ok.drug_results[0].risk, RiskLabel::Ineffective);
        assert!(ok.parse_ms >= 0.0);
        assert!(matches!(
            outcomes[1].result,
            Err(AnalysisError::Parse(ParseError::Io(_)))
        ));
    }
}
