// ==============================================================================
// cpic_tables.rs - CPIC Table Parsers
// ==============================================================================
// Description: Discovery and parsing of per-gene CPIC tables (CSV exports)
//              and the optional drug-gene interaction table
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================
// Files (case-insensitive, .csv or .tsv):
//   {GENE}_allele_definition_table      row 5 = rsIDs, rows 6+ = alleles
//   {GENE}_allele_functionality_reference  rows 2+ = allele, activity, ..., function, ..., evidence
//   {GENE}_Diplotype_Phenotype_Table    rows 1+ = diplotype, score, phenotype, priority
//   drug_gene_interactions.csv          header row, one guideline per row
// ==============================================================================

use csv::{ReaderBuilder, StringRecord};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::alleles::{self, FunctionalClass};
use crate::interactions::{DrugGeneInteraction, RiskLabel};
use crate::knowledge_base::{AlleleFunction, DiplotypePhenotype};
use crate::phenotype::Phenotype;

/// File name of the optional interaction table
pub const INTERACTIONS_FILE: &str = "drug_gene_interactions.csv";

/// Errors that can occur while reading a table
#[derive(Error, Debug)]
pub enum TableLoadError {
    /// Also covers I/O failures while opening or reading the file
    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),
}

/// Kinds of per-gene table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableKind {
    AlleleDefinition,
    AlleleFunctionality,
    DiplotypePhenotype,
}

impl TableKind {
    const ALL: [TableKind; 3] = [
        TableKind::AlleleDefinition,
        TableKind::AlleleFunctionality,
        TableKind::DiplotypePhenotype,
    ];

    /// Lowercase filename suffix identifying the table kind
    fn marker(&self) -> &'static str {
        match self {
            TableKind::AlleleDefinition => "_allele_definition_table",
            TableKind::AlleleFunctionality => "_allele_functionality_reference",
            TableKind::DiplotypePhenotype => "_diplotype_phenotype_table",
        }
    }

    /// Match a file name against the naming convention
    ///
    /// `"cyp2d6_Diplotype_Phenotype_Table.csv"` → `("CYP2D6", DiplotypePhenotype)`
    pub fn classify(file_name: &str) -> Option<(String, TableKind)> {
        let lower = file_name.to_lowercase();
        let stem = lower
            .strip_suffix(".csv")
            .or_else(|| lower.strip_suffix(".tsv"))?;

        Self::ALL.iter().find_map(|kind| {
            stem.strip_suffix(kind.marker())
                .filter(|gene| !gene.is_empty())
                .map(|gene| (gene.to_uppercase(), *kind))
        })
    }
}

/// Table files found for one gene
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeneTableFiles {
    pub allele_definition: Option<PathBuf>,
    pub allele_functionality: Option<PathBuf>,
    pub diplotype_phenotype: Option<PathBuf>,
}

impl GeneTableFiles {
    fn slot(&mut self, kind: TableKind) -> &mut Option<PathBuf> {
        match kind {
            TableKind::AlleleDefinition => &mut self.allele_definition,
            TableKind::AlleleFunctionality => &mut self.allele_functionality,
            TableKind::DiplotypePhenotype => &mut self.diplotype_phenotype,
        }
    }

    /// Table kinds with no file
    pub fn missing(&self) -> Vec<TableKind> {
        let mut missing = Vec::new();
        if self.allele_definition.is_none() {
            missing.push(TableKind::AlleleDefinition);
        }
        if self.allele_functionality.is_none() {
            missing.push(TableKind::AlleleFunctionality);
        }
        if self.diplotype_phenotype.is_none() {
            missing.push(TableKind::DiplotypePhenotype);
        }
        missing
    }
}

/// Everything discovered under a tables directory
#[derive(Debug, Clone, Default)]
pub struct DiscoveredTables {
    pub genes: BTreeMap<String, GeneTableFiles>,
    pub interactions: Option<PathBuf>,
}

/// Scan a directory tree for CPIC tables
///
/// A missing directory yields an empty result; the caller decides how loudly
/// to report it.
pub fn discover(dir: &Path) -> DiscoveredTables {
    let mut found = DiscoveredTables::default();

    if !dir.is_dir() {
        return found;
    }

    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable table path: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let name = entry.file_name().to_string_lossy();
        if name.eq_ignore_ascii_case(INTERACTIONS_FILE) {
            if found.interactions.is_none() {
                found.interactions = Some(entry.path().to_path_buf());
            }
            continue;
        }

        if let Some((gene, kind)) = TableKind::classify(&name) {
            let slot = found.genes.entry(gene.clone()).or_default().slot(kind);
            if slot.is_some() {
                warn!("Duplicate {:?} table for {}: ignoring {:?}", kind, gene, entry.path());
            } else {
                debug!("Found {:?} table for {}: {:?}", kind, gene, entry.path());
                *slot = Some(entry.path().to_path_buf());
            }
        }
    }

    found
}

/// Read every row of a headerless table
fn read_rows(path: &Path) -> Result<Vec<StringRecord>, TableLoadError> {
    let delimiter = match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => b'\t',
        _ => b',',
    };

    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_path(path)?;

    let mut rows = Vec::new();
    for record in reader.records() {
        rows.push(record?);
    }
    Ok(rows)
}

fn cell(row: &StringRecord, index: usize) -> Option<&str> {
    row.get(index)
        .map(str::trim)
        .filter(|v| !v.is_empty() && *v != "None")
}

/// Parse an activity cell, tolerating `≥` / `>=` prefixes
fn parse_activity(raw: Option<&str>) -> Option<f64> {
    let text = raw?.replace('≥', "").replace(">=", "");
    text.trim().parse::<f64>().ok()
}

/// Parsed allele-definition table
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlleleDefinitions {
    /// Star allele → defining rsIDs
    pub allele_rsids: BTreeMap<String, Vec<String>>,
    /// rsID → star allele, lowest-sorting allele wins a shared rsID
    pub rsid_alleles: BTreeMap<String, String>,
}

/// Parse an allele definition table
///
/// # Arguments
/// * `path` - Table file
/// * `gene` - Gene symbol, used to skip the `{GENE} Allele` label row
///
/// # Format
/// Row 5 carries rsIDs from column 1 on; rows 6+ are alleles with a non-empty
/// cell under each defining rsID. `*1` and non-star rows are skipped.
pub fn load_allele_definitions(path: &Path, gene: &str) -> Result<AlleleDefinitions, TableLoadError> {
    let rows = read_rows(path)?;
    let mut defs = AlleleDefinitions::default();

    if rows.len() < 7 {
        warn!("{}: allele definition table {:?} has too few rows", gene, path);
        return Ok(defs);
    }

    let mut columns: Vec<(usize, String)> = Vec::new();
    for (ci, value) in rows[5].iter().enumerate().skip(1) {
        let last_rsid = value
            .split(';')
            .map(str::trim)
            .filter(|rs| rs.starts_with("rs"))
            .last();
        if let Some(rsid) = last_rsid {
            columns.push((ci, rsid.to_string()));
        }
    }

    let label_row = format!("{} Allele", gene);
    for row in &rows[6..] {
        let Some(name) = cell(row, 0) else { continue };
        if name == alleles::WILD_TYPE || name.eq_ignore_ascii_case(&label_row) || !name.starts_with('*') {
            continue;
        }

        let rsids: Vec<String> = columns
            .iter()
            .filter(|(ci, _)| cell(row, *ci).is_some())
            .map(|(_, rsid)| rsid.clone())
            .collect();

        if !rsids.is_empty() {
            defs.allele_rsids.insert(name.to_string(), rsids);
        }
    }

    let mut ordered: Vec<&String> = defs.allele_rsids.keys().collect();
    ordered.sort_by(|a, b| alleles::compare(a, b));
    for allele in ordered {
        for rsid in &defs.allele_rsids[allele] {
            defs.rsid_alleles
                .entry(rsid.clone())
                .or_insert_with(|| allele.clone());
        }
    }

    Ok(defs)
}

/// Parse an allele functionality table (rows 2+)
pub fn load_allele_functionality(path: &Path) -> Result<Vec<AlleleFunction>, TableLoadError> {
    let rows = read_rows(path)?;

    Ok(rows
        .iter()
        .skip(2)
        .filter_map(|row| {
            let allele = cell(row, 0)?;
            let clinical = cell(row, 3).unwrap_or("Unknown function");
            Some(AlleleFunction {
                allele: allele.to_string(),
                activity_value: parse_activity(cell(row, 1)),
                class: FunctionalClass::from_clinical(clinical),
                clinical_function: clinical.to_string(),
                evidence_level: cell(row, 6).unwrap_or("Unknown").to_string(),
            })
        })
        .collect())
}

/// Parse a diplotype-phenotype table (rows 1+), gene prefix stripped from labels
pub fn load_diplotype_phenotypes(path: &Path, gene: &str) -> Result<Vec<DiplotypePhenotype>, TableLoadError> {
    let rows = read_rows(path)?;
    let indeterminate = format!("{} Indeterminate", gene);

    Ok(rows
        .iter()
        .skip(1)
        .filter_map(|row| {
            let diplotype = cell(row, 0)?;
            let label = cell(row, 2).unwrap_or(indeterminate.as_str());
            Some(DiplotypePhenotype::new(
                diplotype,
                parse_activity(cell(row, 1)),
                Phenotype::from_label(label, Some(gene)),
                cell(row, 3).unwrap_or(""),
            ))
        })
        .collect())
}

#[derive(Debug, Deserialize)]
struct InteractionRow {
    drug: String,
    gene: String,
    phenotype: String,
    risk: String,
    #[serde(default)]
    recommendation: String,
    #[serde(default)]
    mechanism: String,
    #[serde(default)]
    evidence_level: String,
    #[serde(default)]
    guideline_url: String,
}

/// Parse the optional interaction table (header row required)
pub fn load_interactions(path: &Path) -> Result<Vec<DrugGeneInteraction>, TableLoadError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)?;

    let mut interactions = Vec::new();
    for (idx, result) in reader.deserialize::<InteractionRow>().enumerate() {
        let row = match result {
            Ok(row) => row,
            Err(e) => {
                warn!("Skipping interaction row {} in {:?}: {}", idx + 1, path, e);
                continue;
            }
        };

        let risk = RiskLabel::from_label(&row.risk);
        if risk == RiskLabel::Unknown && !row.risk.eq_ignore_ascii_case("unknown") {
            warn!("Interaction row {} has unrecognized risk '{}'", idx + 1, row.risk);
        }

        interactions.push(DrugGeneInteraction {
            phenotype: Phenotype::from_label(&row.phenotype, Some(&row.gene)),
            drug: row.drug,
            gene: row.gene,
            risk,
            recommendation: row.recommendation,
            mechanism: row.mechanism,
            evidence_level: row.evidence_level,
            guideline_url: Some(row.guideline_url).filter(|u| !u.is_empty()),
        });
    }

    Ok(interactions)
}

#[cfg(test)]
pub(crate) mod fixtures {
    use std::fs;
    use std::path::Path;

    pub const CYP2D6_DEFINITIONS: &str = "\
GENE: CYP2D6,,,
,,,
,,,
,,,
,,,
rsID,rs1065852,rs3892097,rs5030655
CYP2D6 Allele,,,
*1,,,
*4,T,T,
*10,T,,
*6,,,del
";

    pub const CYP2D6_FUNCTIONS: &str = "\
GENE: CYP2D6,,,,,,
Allele,Activity Value,x,Allele Clinical Functional Status,x,x,Strength of Evidence
*1,1,,Normal function,,,Definitive
*4,0,,No function,,,Definitive
*10,0.25,,Decreased function,,,Definitive
*6,0,,No function,,,Definitive
*2x2,≥2,,Increased function,,,Moderate
*99,,,,,,
";

    pub const CYP2D6_DIPLOTYPES: &str = "\
CYP2D6 Diplotype,Activity Score,Coded Diplotype/Phenotype Summary,EHR Priority Notation
*1/*1,2,CYP2D6 Normal Metabolizer,Normal/Routine/Low Risk
*1/*4,1,CYP2D6 Intermediate Metabolizer,Abnormal/Priority/High Risk
*4/*4,0,CYP2D6 Poor Metabolizer,Abnormal/Priority/High Risk
*4/*10,0.25,CYP2D6 Poor Metabolizer,Abnormal/Priority/High Risk
*1/*10,1.25,CYP2D6 Normal Metabolizer,Normal/Routine/Low Risk
";

    /// Write the CYP2D6 fixture tables into `dir`
    pub fn write_cyp2d6(dir: &Path) {
        fs::write(dir.join("CYP2D6_allele_definition_table.csv"), CYP2D6_DEFINITIONS).unwrap();
        fs::write(dir.join("CYP2D6_allele_functionality_reference.csv"), CYP2D6_FUNCTIONS).unwrap();
        fs::write(dir.join("CYP2D6_Diplotype_Phenotype_Table.csv"), CYP2D6_DIPLOTYPES).unwrap();
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_classify_file_names() {
        assert_eq!(
            TableKind::classify("CYP2D6_allele_definition_table.csv"),
            Some(("CYP2D6".to_string(), TableKind::AlleleDefinition))
        );
        assert_eq!(
            TableKind::classify("cyp2c19_Allele_Functionality_Reference.TSV"),
            Some(("CYP2C19".to_string(), TableKind::AlleleFunctionality))
        );
        assert_eq!(
            TableKind::classify("TPMT_Diplotype_Phenotype_Table.csv"),
            Some(("TPMT".to_string(), TableKind::DiplotypePhenotype))
        );
        assert_eq!(TableKind::classify("CYP2D6_Diplotype_Phenotype_Table.xlsx"), None);
        assert_eq!(TableKind::classify("_allele_definition_table.csv"), None);
        assert_eq!(TableKind::classify("notes.csv"), None);
    }

    #[test]
    fn test_discover() {
        let dir = TempDir::new().unwrap();
        write_cyp2d6(dir.path());
        fs::write(dir.path().join("TPMT_Diplotype_Phenotype_Table.csv"), "x\n").unwrap();
        fs::write(dir.path().join(INTERACTIONS_FILE), "drug\n").unwrap();
        fs::write(dir.path().join("README.txt"), "ignored").unwrap();

        let found = discover(dir.path());
        assert_eq!(found.genes.len(), 2);
        assert!(found.genes["CYP2D6"].missing().is_empty());
        assert_eq!(
            found.genes["TPMT"].missing(),
            vec![TableKind::AlleleDefinition, TableKind::AlleleFunctionality]
        );
        assert!(found.interactions.is_some());
    }

    #[test]
    fn test_discover_missing_dir() {
        let found = discover(Path::new("/nonexistent/pgx/tables"));
        assert!(found.genes.is_empty());
        assert!(found.interactions.is_none());
    }

    #[test]
    fn test_allele_definitions_prefer_lowest_allele() {
        let dir = TempDir::new().unwrap();
        write_cyp2d6(dir.path());

        let defs = load_allele_definitions(
            &dir.path().join("CYP2D6_allele_definition_table.csv"),
            "CYP2D6",
        )
        .unwrap();

        assert_eq!(defs.allele_rsids.len(), 3);
        assert!(!defs.allele_rsids.contains_key("*1"));
        assert_eq!(defs.allele_rsids["*4"], vec!["rs1065852", "rs3892097"]);

        // rs1065852 defines both *4 and *10; *4 sorts first
        assert_eq!(defs.rsid_alleles["rs1065852"], "*4");
        assert_eq!(defs.rsid_alleles["rs3892097"], "*4");
        assert_eq!(defs.rsid_alleles["rs5030655"], "*6");
    }

    #[test]
    fn test_allele_functionality() {
        let dir = TempDir::new().unwrap();
        write_cyp2d6(dir.path());

        let rows = load_allele_functionality(
            &dir.path().join("CYP2D6_allele_functionality_reference.csv"),
        )
        .unwrap();

        assert_eq!(rows.len(), 6);
        assert_eq!(rows[1].allele, "*4");
        assert_eq!(rows[1].class, FunctionalClass::NoFunction);
        assert_eq!(rows[2].activity_value, Some(0.25));
        assert_eq!(rows[4].activity_value, Some(2.0));
        assert_eq!(rows[4].class, FunctionalClass::Increased);
        assert_eq!(rows[5].clinical_function, "Unknown function");
        assert_eq!(rows[5].class, FunctionalClass::Unknown);
        assert_eq!(rows[5].evidence_level, "Unknown");
    }

    #[test]
    fn test_diplotype_phenotypes() {
        let dir = TempDir::new().unwrap();
        write_cyp2d6(dir.path());

        let rows = load_diplotype_phenotypes(
            &dir.path().join("CYP2D6_Diplotype_Phenotype_Table.csv"),
            "CYP2D6",
        )
        .unwrap();

        assert_eq!(rows.len(), 5);
        assert_eq!(rows[2].diplotype, "*4/*4");
        assert_eq!(rows[2].phenotype, Phenotype::Poor);
        assert!(rows[2].is_high_risk());
        assert_eq!(rows[0].activity_score, Some(2.0));
    }

    #[test]
    fn test_load_interactions() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(INTERACTIONS_FILE);
        fs::write(
            &path,
            "\
drug,gene,phenotype,risk,recommendation,mechanism,evidence_level,guideline_url
Ondansetron,CYP2D6,Ultrarapid Metabolizer,Ineffective,Use alternative antiemetic.,Rapid clearance.,A,https://cpicpgx.org/
ondansetron,CYP2D6,Normal Metabolizer,Safe,Standard dosing.,Normal clearance.,A,
",
        )
        .unwrap();

        let rows = load_interactions(&path).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].phenotype, Phenotype::UltraRapid);
        assert_eq!(rows[0].risk, RiskLabel::Ineffective);
        assert_eq!(rows[0].guideline_url.as_deref(), Some("https://cpicpgx.org/"));
        assert_eq!(rows[1].guideline_url, None);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = load_allele_functionality(Path::new("/nonexistent/table.csv"));
        match result {
            Err(TableLoadError::Csv(e)) => assert!(e.is_io_error()),
            other => panic!("expected an I/O error, got {:?}", other),
        }
    }
}
