// ==============================================================================
// knowledge_base.rs - Pharmacogenomic Knowledge Base
// ==============================================================================
// Description: Immutable registry of allele functions, diplotype phenotypes,
//              rsID mappings and drug-gene interactions
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================
// Merge rule (per gene, resolved once at build time):
//   - Any CPIC table for a gene → CPIC allele functions and diplotypes only
//   - No CPIC table → curated allele functions
//   - rsIDs: CPIC definitions first, curated mappings fill the gaps
//   - Interactions: curated rows, then drug_gene_interactions.csv overrides
// ==============================================================================

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use tracing::{debug, info, warn};

use crate::alleles::FunctionalClass;
use crate::curated;
use crate::interactions::{DrugGeneInteraction, InteractionIndex, Resolution};
use crate::parsers::cpic_tables::{self, AlleleDefinitions};
use crate::phenotype::Phenotype;

/// Where a piece of gene data came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    /// CPIC table
    Authoritative,
    /// Hand-curated table
    Fallback,
}

/// Function of one star allele
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlleleFunction {
    pub allele: String,
    pub activity_value: Option<f64>,
    pub class: FunctionalClass,
    /// Clinical function as written in the source table
    pub clinical_function: String,
    pub evidence_level: String,
}

impl AlleleFunction {
    /// Curated entry with no measured activity value
    pub fn curated(allele: impl Into<String>, class: FunctionalClass) -> Self {
        Self {
            allele: allele.into(),
            activity_value: None,
            class,
            clinical_function: class.as_str().to_string(),
            evidence_level: "Curated".to_string(),
        }
    }

    /// Activity value, or the class default when the table has none
    pub fn activity(&self) -> f64 {
        self.activity_value
            .unwrap_or_else(|| self.class.default_activity())
    }
}

/// One diplotype-phenotype table row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiplotypePhenotype {
    pub diplotype: String,
    pub activity_score: Option<f64>,
    pub phenotype: Phenotype,
    /// EHR priority notation
    pub priority: String,
}

impl DiplotypePhenotype {
    pub fn new(
        diplotype: impl Into<String>,
        activity_score: Option<f64>,
        phenotype: Phenotype,
        priority: impl Into<String>,
    ) -> Self {
        Self {
            diplotype: diplotype.into(),
            activity_score,
            phenotype,
            priority: priority.into(),
        }
    }

    pub fn is_high_risk(&self) -> bool {
        self.priority.contains("High Risk")
    }
}

/// Gene and allele an rsID identifies
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RsidHit {
    pub gene: String,
    pub allele: String,
    pub source: Source,
}

/// Which CPIC tables were loaded for a gene
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableCoverage {
    pub allele_definition: bool,
    pub allele_functionality: bool,
    pub diplotype_phenotype: bool,
}

impl TableCoverage {
    pub fn any(&self) -> bool {
        self.allele_definition || self.allele_functionality || self.diplotype_phenotype
    }
}

/// Merged data for one gene
#[derive(Debug, Clone, Default)]
pub struct GeneRecord {
    pub gene: String,
    pub coverage: TableCoverage,
    /// Source of `functions`; `None` when the gene has no allele functions
    pub function_source: Option<Source>,
    pub functions: BTreeMap<String, AlleleFunction>,
    /// Keyed by both `A/B` and `B/A`
    pub diplotypes: HashMap<String, DiplotypePhenotype>,
    /// Star allele → defining rsIDs (CPIC definitions only)
    pub allele_rsids: BTreeMap<String, Vec<String>>,
}

/// Catalog line for one gene
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneSummary {
    pub gene: String,
    pub function_source: Option<Source>,
    pub coverage: TableCoverage,
    pub alleles: usize,
    pub diplotypes: usize,
    pub drugs: Vec<String>,
}

#[derive(Debug, Clone, Default)]
struct AuthoritativeTables {
    definitions: Option<AlleleDefinitions>,
    functions: Option<Vec<AlleleFunction>>,
    diplotypes: Option<Vec<DiplotypePhenotype>>,
}

impl AuthoritativeTables {
    fn coverage(&self) -> TableCoverage {
        TableCoverage {
            allele_definition: self.definitions.is_some(),
            allele_functionality: self.functions.is_some(),
            diplotype_phenotype: self.diplotypes.is_some(),
        }
    }
}

/// Collects sources before the knowledge base is frozen
#[derive(Debug, Clone, Default)]
pub struct KnowledgeBaseBuilder {
    authoritative: BTreeMap<String, AuthoritativeTables>,
    fallback_functions: BTreeMap<String, BTreeMap<String, AlleleFunction>>,
    fallback_rsids: Vec<(String, String, String)>,
    interactions: Vec<DrugGeneInteraction>,
}

impl KnowledgeBaseBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the hand-curated allele functions, rsIDs and interactions
    pub fn with_curated(mut self) -> Self {
        for (gene, alleles) in curated::ALLELE_FUNCTIONS {
            for (allele, class) in alleles.iter() {
                self = self.fallback_function(gene, allele, *class);
            }
        }
        for (rsid, gene, allele) in curated::RSID_ALLELES {
            self = self.fallback_rsid(rsid, gene, allele);
        }
        self.interactions.extend(curated::interactions());
        self
    }

    pub fn fallback_function(mut self, gene: &str, allele: &str, class: FunctionalClass) -> Self {
        self.fallback_functions
            .entry(gene.trim().to_uppercase())
            .or_default()
            .insert(allele.to_string(), AlleleFunction::curated(allele, class));
        self
    }

    pub fn fallback_rsid(mut self, rsid: &str, gene: &str, allele: &str) -> Self {
        self.fallback_rsids.push((
            rsid.to_string(),
            gene.trim().to_uppercase(),
            allele.to_string(),
        ));
        self
    }

    /// Add an interaction; later rows replace earlier rows for the same triple
    pub fn interaction(mut self, interaction: DrugGeneInteraction) -> Self {
        self.interactions.push(interaction);
        self
    }

    fn tables(&mut self, gene: &str) -> &mut AuthoritativeTables {
        self.authoritative
            .entry(gene.trim().to_uppercase())
            .or_default()
    }

    pub fn authoritative_definitions(mut self, gene: &str, definitions: AlleleDefinitions) -> Self {
        self.tables(gene).definitions = Some(definitions);
        self
    }

    pub fn authoritative_functions(mut self, gene: &str, functions: Vec<AlleleFunction>) -> Self {
        self.tables(gene).functions = Some(functions);
        self
    }

    pub fn authoritative_diplotypes(mut self, gene: &str, rows: Vec<DiplotypePhenotype>) -> Self {
        self.tables(gene).diplotypes = Some(rows);
        self
    }

    /// Append one diplotype row to a gene's table
    pub fn authoritative_diplotype(mut self, gene: &str, row: DiplotypePhenotype) -> Self {
        self.tables(gene).diplotypes.get_or_insert_with(Vec::new).push(row);
        self
    }

    /// Discover and parse CPIC tables under `dir`
    ///
    /// Nothing here is fatal: a missing directory, a missing table or an
    /// unreadable file is logged and the gene falls back to curated data.
    pub fn load_tables(mut self, dir: &Path) -> Self {
        if !dir.is_dir() {
            warn!("CPIC tables directory {:?} not found, using curated data only", dir);
            return self;
        }

        let found = cpic_tables::discover(dir);
        if found.genes.is_empty() {
            info!("No CPIC tables found in {:?}", dir);
        }

        for (gene, files) in &found.genes {
            let missing = files.missing();
            if !missing.is_empty() {
                warn!("{}: missing CPIC tables {:?}", gene, missing);
            }

            let mut tables = AuthoritativeTables::default();

            if let Some(path) = &files.allele_definition {
                match cpic_tables::load_allele_definitions(path, gene) {
                    Ok(defs) => {
                        info!(
                            "{}: allele definitions, {} rsID mappings, {} alleles",
                            gene,
                            defs.rsid_alleles.len(),
                            defs.allele_rsids.len()
                        );
                        tables.definitions = Some(defs);
                    }
                    Err(e) => warn!("{}: failed to read {:?}: {}", gene, path, e),
                }
            }

            if let Some(path) = &files.allele_functionality {
                match cpic_tables::load_allele_functionality(path) {
                    Ok(rows) => {
                        info!("{}: allele functionality, {} entries", gene, rows.len());
                        tables.functions = Some(rows);
                    }
                    Err(e) => warn!("{}: failed to read {:?}: {}", gene, path, e),
                }
            }

            if let Some(path) = &files.diplotype_phenotype {
                match cpic_tables::load_diplotype_phenotypes(path, gene) {
                    Ok(rows) => {
                        info!("{}: diplotype-phenotype, {} diplotypes", gene, rows.len());
                        tables.diplotypes = Some(rows);
                    }
                    Err(e) => warn!("{}: failed to read {:?}: {}", gene, path, e),
                }
            }

            if tables.coverage().any() {
                self.authoritative.insert(gene.clone(), tables);
            } else {
                warn!("{}: no CPIC table could be read, using curated data", gene);
            }
        }

        if let Some(path) = &found.interactions {
            match cpic_tables::load_interactions(path) {
                Ok(rows) => {
                    info!("Loaded {} interaction rows from {:?}", rows.len(), path);
                    self.interactions.extend(rows);
                }
                Err(e) => warn!("Failed to read {:?}: {}", path, e),
            }
        }

        self
    }

    /// Freeze the collected sources into a knowledge base
    pub fn build(self) -> KnowledgeBase {
        let mut genes = BTreeMap::new();
        let mut rsids: HashMap<String, RsidHit> = HashMap::new();

        let names: BTreeSet<String> = self
            .authoritative
            .keys()
            .chain(self.fallback_functions.keys())
            .cloned()
            .collect();

        let mut authoritative = self.authoritative;
        let mut fallback_functions = self.fallback_functions;

        for name in names {
            let mut record = GeneRecord {
                gene: name.clone(),
                ..GeneRecord::default()
            };

            match authoritative.remove(&name) {
                Some(tables) => {
                    record.coverage = tables.coverage();

                    if let Some(functions) = tables.functions {
                        record.function_source = Some(Source::Authoritative);
                        record.functions = functions
                            .into_iter()
                            .map(|f| (f.allele.clone(), f))
                            .collect();
                    }

                    for row in tables.diplotypes.unwrap_or_default() {
                        if let Some((a, b)) = crate::alleles::split_diplotype(&row.diplotype) {
                            let reverse = format!("{}/{}", b, a);
                            record
                                .diplotypes
                                .entry(reverse)
                                .or_insert_with(|| row.clone());
                        }
                        record.diplotypes.insert(row.diplotype.clone(), row);
                    }

                    if let Some(defs) = tables.definitions {
                        for (rsid, allele) in defs.rsid_alleles {
                            rsids.entry(rsid).or_insert_with(|| RsidHit {
                                gene: name.clone(),
                                allele,
                                source: Source::Authoritative,
                            });
                        }
                        record.allele_rsids = defs.allele_rsids;
                    }
                }
                None => {
                    if let Some(functions) = fallback_functions.remove(&name) {
                        record.function_source = Some(Source::Fallback);
                        record.functions = functions;
                    }
                }
            }

            genes.insert(name, record);
        }

        for (rsid, gene, allele) in self.fallback_rsids {
            rsids.entry(rsid).or_insert(RsidHit {
                gene,
                allele,
                source: Source::Fallback,
            });
        }

        let mut interactions = InteractionIndex::new();
        for row in self.interactions {
            if let Some(old) = interactions.insert(row) {
                debug!(
                    "Replaced interaction {} / {} / {}",
                    old.drug, old.gene, old.phenotype
                );
            }
        }

        let mut known: BTreeSet<String> = interactions.genes().into_iter().map(String::from).collect();
        known.extend(
            genes
                .values()
                .filter(|g: &&GeneRecord| !g.functions.is_empty())
                .map(|g| g.gene.clone()),
        );

        let kb = KnowledgeBase {
            genes,
            rsids,
            interactions,
            known_genes: known.into_iter().collect(),
        };

        if kb.interactions.is_empty() {
            warn!("Knowledge base has no drug-gene interactions; every drug will resolve as unknown");
        }

        info!(
            "Knowledge base ready: {} genes ({} with CPIC tables), {} drugs, {} interactions, {} rsIDs",
            kb.known_genes.len(),
            kb.authoritative_genes().len(),
            kb.interactions.drugs().count(),
            kb.interactions.len(),
            kb.rsids.len()
        );

        kb
    }
}

/// Read-only pharmacogenomic registry, shared across analyses
#[derive(Debug, Clone, Default)]
pub struct KnowledgeBase {
    genes: BTreeMap<String, GeneRecord>,
    rsids: HashMap<String, RsidHit>,
    interactions: InteractionIndex,
    known_genes: Vec<String>,
}

impl KnowledgeBase {
    pub fn builder() -> KnowledgeBaseBuilder {
        KnowledgeBaseBuilder::new()
    }

    /// Curated data only
    pub fn curated() -> Self {
        Self::builder().with_curated().build()
    }

    /// Curated data merged with any CPIC tables found under `tables_dir`
    pub fn load(tables_dir: &Path) -> Self {
        info!("Loading knowledge base from {:?}", tables_dir);
        Self::builder().with_curated().load_tables(tables_dir).build()
    }

    pub fn gene(&self, gene: &str) -> Option<&GeneRecord> {
        self.genes.get(&gene.trim().to_uppercase())
    }

    pub fn allele_function(&self, gene: &str, allele: &str) -> Option<&AlleleFunction> {
        self.gene(gene)?.functions.get(allele)
    }

    /// Functional class; unlisted alleles count as normal
    pub fn functional_class(&self, gene: &str, allele: &str) -> FunctionalClass {
        self.allele_function(gene, allele)
            .map(|f| f.class)
            .unwrap_or(FunctionalClass::Normal)
    }

    /// Activity value; unlisted alleles count as one normal copy
    pub fn activity_value(&self, gene: &str, allele: &str) -> f64 {
        self.allele_function(gene, allele)
            .map(AlleleFunction::activity)
            .unwrap_or(1.0)
    }

    /// Exact diplotype table lookup, either allele order
    pub fn diplotype_phenotype(&self, gene: &str, diplotype: &str) -> Option<&DiplotypePhenotype> {
        self.gene(gene)?.diplotypes.get(diplotype.trim())
    }

    pub fn has_diplotype_table(&self, gene: &str) -> bool {
        self.gene(gene)
            .map(|g| !g.diplotypes.is_empty())
            .unwrap_or(false)
    }

    pub fn lookup_rsid(&self, rsid: &str) -> Option<&RsidHit> {
        self.rsids.get(rsid.trim())
    }

    pub fn interactions(&self) -> &InteractionIndex {
        &self.interactions
    }

    pub fn resolve(&self, drug: &str, gene: &str, phenotype: &Phenotype) -> Resolution<'_> {
        self.interactions.resolve(drug, gene, phenotype)
    }

    pub fn genes_for_drug(&self, drug: &str) -> &[String] {
        self.interactions.genes_for_drug(drug)
    }

    /// Sorted drug names with at least one guideline
    pub fn drugs(&self) -> Vec<&str> {
        self.interactions.drugs().collect()
    }

    /// Genes screened in every analysis, sorted
    pub fn genes(&self) -> &[String] {
        &self.known_genes
    }

    pub fn is_known_gene(&self, gene: &str) -> bool {
        let gene = gene.trim().to_uppercase();
        self.known_genes.iter().any(|g| *g == gene)
    }

    /// Genes with at least one CPIC table loaded
    pub fn authoritative_genes(&self) -> Vec<&str> {
        self.genes
            .values()
            .filter(|g| g.coverage.any())
            .map(|g| g.gene.as_str())
            .collect()
    }

    /// Catalog of known genes with their data sources
    pub fn gene_summaries(&self) -> Vec<GeneSummary> {
        let mut drugs_by_gene: BTreeMap<&str, Vec<String>> = BTreeMap::new();
        for drug in self.interactions.drugs() {
            for gene in self.interactions.genes_for_drug(drug) {
                drugs_by_gene
                    .entry(gene.as_str())
                    .or_default()
                    .push(drug.to_string());
            }
        }

        self.known_genes
            .iter()
            .map(|gene| {
                let record = self.genes.get(gene);
                GeneSummary {
                    gene: gene.clone(),
                    function_source: record.and_then(|r| r.function_source),
                    coverage: record.map(|r| r.coverage).unwrap_or_default(),
                    alleles: record.map(|r| r.functions.len()).unwrap_or(0),
                    diplotypes: record
                        .map(|r| {
                            r.diplotypes
                                .iter()
                                .filter(|(k, v)| **k == v.diplotype)
                                .count()
                        })
                        .unwrap_or(0),
                    drugs: drugs_by_gene.remove(gene.as_str()).unwrap_or_default(),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interactions::RiskLabel;
    use crate::parsers::cpic_tables::{fixtures, INTERACTIONS_FILE};
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_curated_only() {
        let kb = KnowledgeBase::curated();

        assert_eq!(
            kb.genes(),
            &["CYP2C19", "CYP2C9", "CYP2D6", "DPYD", "SLCO1B1", "TPMT"]
        );
        assert!(kb.authoritative_genes().is_empty());
        assert_eq!(kb.functional_class("cyp2c19", "*17"), FunctionalClass::Increased);
        assert_eq!(kb.activity_value("CYP2D6", "*4"), 0.0);
        assert_eq!(kb.activity_value("CYP2D6", "*999"), 1.0);
        assert!(!kb.has_diplotype_table("CYP2D6"));

        let hit = kb.lookup_rsid("rs4244285").unwrap();
        assert_eq!((hit.gene.as_str(), hit.allele.as_str()), ("CYP2C19", "*2"));
        assert_eq!(hit.source, Source::Fallback);

        assert_eq!(kb.genes_for_drug("Codeine"), &["CYP2D6".to_string()]);
        assert!(kb.genes_for_drug("aspirin").is_empty());
        assert_eq!(kb.drugs().len(), 16);
    }

    #[test]
    fn test_authoritative_tables_take_precedence() {
        let dir = TempDir::new().unwrap();
        fixtures::write_cyp2d6(dir.path());
        let kb = KnowledgeBase::load(dir.path());

        assert_eq!(kb.authoritative_genes(), vec!["CYP2D6"]);
        let gene = kb.gene("CYP2D6").unwrap();
        assert_eq!(gene.function_source, Some(Source::Authoritative));

        // Table value, not the curated decreased default of 0.5
        assert_eq!(kb.activity_value("CYP2D6", "*10"), 0.25);
        // Curated-only alleles are not mixed into an authoritative gene
        assert!(kb.allele_function("CYP2D6", "*41").is_none());

        // Other genes still use curated data
        assert_eq!(
            kb.gene("CYP2C19").unwrap().function_source,
            Some(Source::Fallback)
        );

        // Shared rsID resolved by the table, curated fills the gaps
        let hit = kb.lookup_rsid("rs1065852").unwrap();
        assert_eq!(hit.allele, "*4");
        assert_eq!(hit.source, Source::Authoritative);
        let fill = kb.lookup_rsid("rs35742686").unwrap();
        assert_eq!(fill.allele, "*3");
        assert_eq!(fill.source, Source::Fallback);
    }

    #[test]
    fn test_diplotype_lookup_is_order_independent() {
        let dir = TempDir::new().unwrap();
        fixtures::write_cyp2d6(dir.path());
        let kb = KnowledgeBase::load(dir.path());

        let forward = kb.diplotype_phenotype("CYP2D6", "*4/*10").unwrap();
        let reverse = kb.diplotype_phenotype("cyp2d6", "*10/*4").unwrap();
        assert_eq!(forward.phenotype, Phenotype::Poor);
        assert_eq!(forward.phenotype, reverse.phenotype);

        let summary = kb
            .gene_summaries()
            .into_iter()
            .find(|g| g.gene == "CYP2D6")
            .unwrap();
        assert_eq!(summary.diplotypes, 5);
        assert_eq!(summary.drugs, vec!["codeine", "tamoxifen", "tramadol"]);
    }

    #[test]
    fn test_missing_directory_falls_back() {
        let kb = KnowledgeBase::load(Path::new("/nonexistent/pgx/tables"));
        assert!(kb.authoritative_genes().is_empty());
        assert_eq!(kb.genes().len(), 6);
    }

    #[test]
    fn test_unreadable_table_falls_back_to_curated() {
        let dir = TempDir::new().unwrap();
        // Invalid UTF-8 makes the CSV reader fail
        fs::write(
            dir.path().join("TPMT_allele_functionality_reference.csv"),
            [0xff, 0xfe, b',', b'\n', 0xff, b'\n'],
        )
        .unwrap();

        let kb = KnowledgeBase::load(dir.path());
        assert_eq!(kb.gene("TPMT").unwrap().function_source, Some(Source::Fallback));
    }

    #[test]
    fn test_interaction_table_overrides_curated() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join(INTERACTIONS_FILE),
            "\
drug,gene,phenotype,risk,recommendation,mechanism,evidence_level,guideline_url
codeine,CYP2D6,Intermediate Metabolizer,Safe,Override.,Local policy.,B,
ondansetron,CYP3A5,Normal Metabolizer,Safe,Standard dosing.,Normal.,A,
",
        )
        .unwrap();

        let kb = KnowledgeBase::load(dir.path());
        let ix = kb
            .resolve("codeine", "CYP2D6", &Phenotype::Intermediate)
            .interaction()
            .unwrap();
        assert_eq!(ix.risk, RiskLabel::Safe);
        assert_eq!(ix.evidence_level, "B");

        // New interaction genes become known genes
        assert!(kb.is_known_gene("cyp3a5"));
        assert_eq!(kb.genes_for_drug("ondansetron"), &["CYP3A5".to_string()]);
    }
}
