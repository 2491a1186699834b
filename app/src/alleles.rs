// ==============================================================================
// alleles.rs - Star Allele Utilities
// ==============================================================================
// Description: Star-allele ordering, functional classes, and diplotype
//              construction from detected allele calls
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Reference (wild-type) allele used to fill missing copies
pub const WILD_TYPE: &str = "*1";

/// Weight given to allele names that do not parse as numbers
const UNSORTABLE: f64 = 999.0;

/// Functional class of a star allele
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FunctionalClass {
    Normal,
    Decreased,
    NoFunction,
    Increased,
    Unknown,
}

impl FunctionalClass {
    /// Normalize free-text clinical function ("No function", "Decreased function", ...)
    pub fn from_clinical(text: &str) -> Self {
        let lower = text.to_lowercase();
        if lower.contains("no function") || lower.contains("no_function") {
            FunctionalClass::NoFunction
        } else if lower.contains("decreased") {
            FunctionalClass::Decreased
        } else if lower.contains("increased") {
            FunctionalClass::Increased
        } else if lower.contains("uncertain") || lower.contains("unknown") {
            FunctionalClass::Unknown
        } else {
            FunctionalClass::Normal
        }
    }

    /// Activity contribution used when no measured activity value exists
    pub fn default_activity(&self) -> f64 {
        match self {
            FunctionalClass::Normal => 1.0,
            FunctionalClass::Decreased => 0.5,
            FunctionalClass::NoFunction => 0.0,
            FunctionalClass::Increased => 1.5,
            FunctionalClass::Unknown => 1.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FunctionalClass::Normal => "normal",
            FunctionalClass::Decreased => "decreased",
            FunctionalClass::NoFunction => "no_function",
            FunctionalClass::Increased => "increased",
            FunctionalClass::Unknown => "unknown",
        }
    }
}

impl fmt::Display for FunctionalClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Numeric sort key for a star-allele name
///
/// `*3A` → 3.1, `*3B` → 3.2, `*10` → 10, `*1x2` → 1. Names that are not
/// numeric after that rewriting (`c.2846A>T`) sort last.
pub fn sort_key(allele: &str) -> f64 {
    let base = allele.trim().trim_start_matches('*');
    let base = base.split('x').next().unwrap_or(base);
    let base = base.split('+').next().unwrap_or(base);
    let base = base
        .replace('A', ".1")
        .replace('B', ".2")
        .replace('C', ".3");

    base.parse::<f64>().unwrap_or(UNSORTABLE)
}

/// Canonical allele ordering: sort key first, then name for a stable tie-break
pub fn compare(a: &str, b: &str) -> Ordering {
    sort_key(a).total_cmp(&sort_key(b)).then_with(|| a.cmp(b))
}

/// Join two alleles as `lower/higher`
pub fn canonical_diplotype(a: &str, b: &str) -> String {
    if compare(a, b) == Ordering::Greater {
        format!("{}/{}", b, a)
    } else {
        format!("{}/{}", a, b)
    }
}

/// Split a diplotype string into its two alleles
pub fn split_diplotype(diplotype: &str) -> Option<(&str, &str)> {
    let (a, b) = diplotype.split_once('/')?;
    let (a, b) = (a.trim(), b.trim());
    if a.is_empty() || b.is_empty() || b.contains('/') {
        return None;
    }
    Some((a, b))
}

/// Prefix bare numeric allele names with `*` (`"4"` → `"*4"`)
pub fn normalize_star(value: &str) -> String {
    let value = value.trim();
    if value.starts_with(|c: char| c.is_ascii_digit()) {
        format!("*{}", value)
    } else {
        value.to_string()
    }
}

/// Copy number of a detected call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Zygosity {
    Heterozygous,
    Homozygous,
}

impl Zygosity {
    /// Map copies of the annotated alternate allele to zygosity
    pub fn from_variant_copies(copies: usize) -> Option<Self> {
        match copies {
            0 => None,
            1 => Some(Zygosity::Heterozygous),
            _ => Some(Zygosity::Homozygous),
        }
    }

    pub fn copies(&self) -> usize {
        match self {
            Zygosity::Heterozygous => 1,
            Zygosity::Homozygous => 2,
        }
    }
}

/// A star allele observed in one sample
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlleleCall {
    pub allele: String,
    pub zygosity: Zygosity,
}

impl AlleleCall {
    pub fn new(allele: impl Into<String>, zygosity: Zygosity) -> Self {
        Self {
            allele: allele.into(),
            zygosity,
        }
    }

    pub fn het(allele: impl Into<String>) -> Self {
        Self::new(allele, Zygosity::Heterozygous)
    }

    pub fn hom(allele: impl Into<String>) -> Self {
        Self::new(allele, Zygosity::Homozygous)
    }
}

/// Expand calls into allele copies in detection order
fn expand_copies(calls: &[AlleleCall]) -> Vec<&str> {
    calls
        .iter()
        .filter(|c| !c.allele.is_empty())
        .flat_map(|c| std::iter::repeat(c.allele.as_str()).take(c.zygosity.copies()))
        .collect()
}

/// Exactly two alleles for a sample: the first two copies in detection
/// order, wild-type filled, in canonical order
pub fn allele_pair(calls: &[AlleleCall]) -> (String, String) {
    let mut copies = expand_copies(calls);
    copies.truncate(2);
    while copies.len() < 2 {
        copies.push(WILD_TYPE);
    }
    copies.sort_by(|a, b| compare(a, b));
    (copies[0].to_string(), copies[1].to_string())
}

/// Canonical diplotype string for a set of calls (`*1/*1` when empty)
pub fn diplotype_for(calls: &[AlleleCall]) -> String {
    let (a, b) = allele_pair(calls);
    format!("{}/{}", a, b)
}

/// Diplotype shown next to a drug result.
///
/// Takes the first two detected copies as found, without phasing: one copy
/// reads `*1/X`, none reads `*1/*1`.
pub fn reported_diplotype(calls: &[AlleleCall]) -> String {
    let copies = expand_copies(calls);
    match copies.as_slice() {
        [] => format!("{}/{}", WILD_TYPE, WILD_TYPE),
        [only] => format!("{}/{}", WILD_TYPE, only),
        [first, second, ..] => format!("{}/{}", first, second),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_key() {
        assert_eq!(sort_key("*1"), 1.0);
        assert_eq!(sort_key("*10"), 10.0);
        assert_eq!(sort_key("*3A"), 3.1);
        assert_eq!(sort_key("*3B"), 3.2);
        assert_eq!(sort_key("*2x2"), 2.0);
        assert_eq!(sort_key("*36+*10"), 36.0);
        assert_eq!(sort_key("c.2846A>T"), 999.0);
        assert!(sort_key("*3A") < sort_key("*3B"));
        assert!(sort_key("*4") < sort_key("*10"));
    }

    #[test]
    fn test_canonical_diplotype_is_order_independent() {
        assert_eq!(canonical_diplotype("*4", "*1"), "*1/*4");
        assert_eq!(canonical_diplotype("*1", "*4"), "*1/*4");
        assert_eq!(canonical_diplotype("*10", "*2"), "*2/*10");
        // Ties on the numeric key fall back to the name
        assert_eq!(canonical_diplotype("c.2846A>T", "*HapB3"), "*HapB3/c.2846A>T");
        assert_eq!(canonical_diplotype("*HapB3", "c.2846A>T"), "*HapB3/c.2846A>T");
    }

    #[test]
    fn test_functional_class_normalization() {
        assert_eq!(FunctionalClass::from_clinical("No function"), FunctionalClass::NoFunction);
        assert_eq!(FunctionalClass::from_clinical("Decreased function"), FunctionalClass::Decreased);
        assert_eq!(FunctionalClass::from_clinical("Increased function"), FunctionalClass::Increased);
        assert_eq!(FunctionalClass::from_clinical("Uncertain function"), FunctionalClass::Unknown);
        assert_eq!(FunctionalClass::from_clinical("Unknown function"), FunctionalClass::Unknown);
        assert_eq!(FunctionalClass::from_clinical("Normal function"), FunctionalClass::Normal);
        assert_eq!(FunctionalClass::from_clinical("something else"), FunctionalClass::Normal);
    }

    #[test]
    fn test_allele_pair() {
        assert_eq!(allele_pair(&[]), ("*1".to_string(), "*1".to_string()));
        assert_eq!(
            allele_pair(&[AlleleCall::het("*4")]),
            ("*1".to_string(), "*4".to_string())
        );
        assert_eq!(
            allele_pair(&[AlleleCall::hom("*4")]),
            ("*4".to_string(), "*4".to_string())
        );
        // Only the first two copies count
        assert_eq!(
            diplotype_for(&[AlleleCall::het("*10"), AlleleCall::het("*4"), AlleleCall::hom("*2")]),
            "*4/*10"
        );
    }

    #[test]
    fn test_reported_diplotype_keeps_detection_order() {
        assert_eq!(reported_diplotype(&[]), "*1/*1");
        assert_eq!(reported_diplotype(&[AlleleCall::het("*17")]), "*1/*17");
        assert_eq!(reported_diplotype(&[AlleleCall::hom("*4")]), "*4/*4");
        assert_eq!(
            reported_diplotype(&[AlleleCall::het("*17"), AlleleCall::het("*2")]),
            "*17/*2"
        );
    }

    #[test]
    fn test_split_and_normalize() {
        assert_eq!(split_diplotype("*1/*4"), Some(("*1", "*4")));
        assert_eq!(split_diplotype(" *1 / *4 "), Some(("*1", "*4")));
        assert_eq!(split_diplotype("*1"), None);
        assert_eq!(split_diplotype("*1/*2/*3"), None);

        assert_eq!(normalize_star("4"), "*4");
        assert_eq!(normalize_star(" *17 "), "*17");
        assert_eq!(normalize_star("c.2846A>T"), "c.2846A>T");
    }

    #[test]
    fn test_zygosity_from_copies() {
        assert_eq!(Zygosity::from_variant_copies(0), None);
        assert_eq!(Zygosity::from_variant_copies(1), Some(Zygosity::Heterozygous));
        assert_eq!(Zygosity::from_variant_copies(2), Some(Zygosity::Homozygous));
    }
}
