// ==============================================================================
// vcf.rs - VCF Variant File Parser
// ==============================================================================
// Description: Streaming line parser for plain/gzip/BGZF VCF files with
//              multi-sample genotypes and recoverable row warnings
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================
// Format: Tab-delimited text with '##' metadata and one '#' column header
// Example:
//   ##fileformat=VCFv4.2
//   ##INFO=<ID=GENE,Number=1,Type=String,Description="Gene symbol">
//   #CHROM  POS       ID         REF  ALT  QUAL  FILTER  INFO              FORMAT  NA12878
//   22      42128945  rs3892097  C    T    50    PASS    GENE=CYP2D6;STAR=*4  GT    1/1
// ==============================================================================

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::io::{BufRead, Read};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::input::{self, SourceInfo, DEFAULT_MAX_INPUT_BYTES};

/// Decoded bytes allowed per raw input byte
pub const DEFAULT_MAX_EXPANSION_RATIO: u64 = 20;

/// Longest accepted line, newline excluded
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Errors that abort a parse
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Input is empty or contains no VCF header")]
    Empty,

    #[error("Invalid VCF header: {0}")]
    InvalidHeader(String),

    #[error("Input too large: {size} bytes (max: {max} bytes)")]
    InputTooLarge { size: u64, max: u64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Category of a recoverable problem found while parsing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// Data row dropped
    MalformedRow,
    /// Header line that could not be fully interpreted
    Header,
    /// Genotype cells disagree with the sample header
    SampleMismatch,
    /// Invalid UTF-8 replaced
    Encoding,
    /// Stream stopped early: read error or decoded size limit
    Truncated,
    /// Gene-tagged row missing its allele annotation
    MissingAnnotation,
    /// Genotype calls an alternate other than the annotated one
    MultiAllelic,
}

/// A recoverable problem, tied to the 1-based line it came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseWarning {
    pub line: usize,
    pub kind: WarningKind,
    pub message: String,
}

/// Ordered INFO annotations; keys are kept exactly as written
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Annotations {
    entries: Vec<(String, Option<String>)>,
}

impl Annotations {
    /// Parse a semicolon-delimited INFO column (`.` means empty)
    pub fn parse(field: &str) -> Self {
        let field = field.trim();
        if field.is_empty() || field == "." {
            return Self::default();
        }

        let entries = field
            .split(';')
            .filter(|token| !token.is_empty())
            .map(|token| match token.split_once('=') {
                Some((key, value)) => (key.to_string(), Some(value.to_string())),
                None => (token.to_string(), None),
            })
            .collect();

        Self { entries }
    }

    /// Value of the first `KEY=VALUE` entry with this key
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, v)| k == key && v.is_some())
            .and_then(|(_, v)| v.as_deref())
    }
}

/// One sample's genotype call on one record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleGenotype {
    pub sample: String,
    /// GT token as written ("" when the FORMAT column has no GT)
    pub raw: String,
    /// Allele indices; `None` is a missing call
    pub alleles: Vec<Option<u32>>,
    pub phased: bool,
    /// True iff any allele index is a positive integer
    pub is_variant: bool,
    /// Remaining FORMAT fields in column order
    pub fields: Vec<(String, String)>,
}

impl SampleGenotype {
    /// Parse one sample cell against the FORMAT schema
    pub fn parse(sample: &str, format: &[&str], cell: &str) -> Self {
        let mut raw = String::new();
        let mut fields = Vec::new();

        for (key, value) in format.iter().zip(cell.split(':')) {
            if *key == "GT" {
                raw = value.trim().to_string();
            } else {
                fields.push((key.to_string(), value.to_string()));
            }
        }

        let (alleles, phased) = parse_gt(&raw);
        let is_variant = alleles.iter().any(|a| matches!(a, Some(n) if *n > 0));

        Self {
            sample: sample.to_string(),
            raw,
            alleles,
            phased,
            is_variant,
            fields,
        }
    }

    /// Copies of one allele index (`1/1` has two copies of index 1)
    pub fn allele_copies(&self, index: u32) -> usize {
        self.alleles.iter().filter(|a| **a == Some(index)).count()
    }

    /// True if any call points past the first alternate (`1/2`, `0/3`)
    pub fn has_secondary_alternate(&self) -> bool {
        self.alleles.iter().any(|a| matches!(a, Some(n) if *n > 1))
    }

    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Split a GT token into allele indices.
///
/// `.` and negative indices are missing; anything unparseable is treated the
/// same way so a garbled call can never count as a variant.
fn parse_gt(token: &str) -> (Vec<Option<u32>>, bool) {
    if token.is_empty() {
        return (Vec::new(), false);
    }

    let phased = token.contains('|');
    let alleles = token
        .split(['/', '|'])
        .map(|side| match side.trim().parse::<i64>() {
            Ok(n) if n >= 0 => u32::try_from(n).ok(),
            _ => None,
        })
        .collect();

    (alleles, phased)
}

/// One VCF data line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantRecord {
    /// 1-based line number in the decoded stream
    pub line: usize,
    pub chromosome: String,
    /// 1-based, always positive
    pub position: u64,
    /// ID column; `None` for `.`
    pub id: Option<String>,
    pub reference: String,
    /// Empty for a reference-only record
    pub alternates: Vec<String>,
    pub quality: Option<f64>,
    pub filters: Vec<String>,
    pub info: Annotations,
    pub genotypes: Vec<SampleGenotype>,
}

impl VariantRecord {
    pub fn is_reference_only(&self) -> bool {
        self.alternates.is_empty()
    }

    pub fn genotype_for(&self, sample: &str) -> Option<&SampleGenotype> {
        self.genotypes.iter().find(|g| g.sample == sample)
    }

    /// Variant identifiers from the ID column (`rs1;rs2` yields both)
    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.id
            .as_deref()
            .into_iter()
            .flat_map(|id| id.split(';'))
            .map(str::trim)
            .filter(|id| !id.is_empty() && *id != ".")
    }

    /// First alternate allele, or `.` for reference-only records
    pub fn first_alternate(&self) -> &str {
        self.alternates.first().map(String::as_str).unwrap_or(".")
    }
}

/// Structured `##KEY=<ID=...,...>` metadata: key → ID → field map
pub type MetaRegistry = BTreeMap<String, BTreeMap<String, BTreeMap<String, String>>>;

/// Everything parsed out of one VCF
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParsedDocument {
    /// Value of the `##fileformat=` line (e.g. "VCFv4.2")
    pub file_format: String,
    /// Unstructured `##KEY=VALUE` lines in file order
    pub meta: Vec<(String, String)>,
    pub structured_meta: MetaRegistry,
    pub samples: Vec<String>,
    /// Retained records in file order
    pub records: Vec<VariantRecord>,
    pub warnings: Vec<ParseWarning>,
    /// Data lines seen, retained or dropped
    pub data_lines: usize,
    /// Stopped before end of input (row limit, size limit or stream error)
    pub truncated: bool,
    /// Raw input details when parsed from a file or byte buffer
    pub source: Option<SourceInfo>,
}

impl ParsedDocument {
    /// Number of data lines dropped as malformed
    pub fn dropped_rows(&self) -> usize {
        self.warnings
            .iter()
            .filter(|w| w.kind == WarningKind::MalformedRow)
            .count()
    }

    pub fn has_sample(&self, sample: &str) -> bool {
        self.samples.iter().any(|s| s == sample)
    }
}

/// VCF parser
#[derive(Debug, Clone)]
pub struct VcfParser {
    /// Stop after this many retained records (preview mode)
    pub max_records: Option<usize>,
    /// Raw input size ceiling
    pub max_input_bytes: u64,
    /// Decoded stream ceiling, as a multiple of `max_input_bytes`
    pub max_expansion_ratio: u64,
}

impl Default for VcfParser {
    fn default() -> Self {
        Self::new()
    }
}

impl VcfParser {
    /// Create a parser with no row limit and the default size ceiling
    pub fn new() -> Self {
        Self {
            max_records: None,
            max_input_bytes: DEFAULT_MAX_INPUT_BYTES,
            max_expansion_ratio: DEFAULT_MAX_EXPANSION_RATIO,
        }
    }

    /// Stop after `n` retained records
    pub fn with_max_records(mut self, n: usize) -> Self {
        self.max_records = Some(n);
        self
    }

    pub fn with_max_input_bytes(mut self, max: u64) -> Self {
        self.max_input_bytes = max;
        self
    }

    pub fn with_max_expansion_ratio(mut self, ratio: u64) -> Self {
        self.max_expansion_ratio = ratio.max(1);
        self
    }

    /// Most decoded bytes read from one input
    pub fn max_decoded_bytes(&self) -> u64 {
        self.max_input_bytes.saturating_mul(self.max_expansion_ratio)
    }

    /// Parse a VCF file from disk
    ///
    /// # Arguments
    /// * `path` - Path to a `.vcf`, `.vcf.gz` or `.vcf.bgz` file
    ///
    /// # Returns
    /// * `Ok(ParsedDocument)` - Parsed document, possibly with warnings
    /// * `Err(ParseError)` - Missing header, empty or oversized input
    pub fn parse_path(&self, path: impl AsRef<Path>) -> Result<ParsedDocument, ParseError> {
        let path = path.as_ref();
        info!("Parsing VCF file: {:?}", path);

        let source = input::open_path(path, self.max_input_bytes)?;
        let mut doc = self.parse_reader(source.reader)?;
        doc.source = Some(source.info);
        Ok(doc)
    }

    /// Parse an in-memory upload; the filename only serves as an encoding hint
    pub fn parse_bytes(
        &self,
        bytes: &[u8],
        filename: Option<&str>,
    ) -> Result<ParsedDocument, ParseError> {
        let source = input::open_bytes(bytes, filename, self.max_input_bytes)?;
        let mut doc = self.parse_reader(source.reader)?;
        doc.source = Some(source.info);
        Ok(doc)
    }

    /// Parse already-decoded VCF text line by line
    ///
    /// Reading stops once `max_decoded_bytes` have been consumed; the
    /// document is then marked truncated. Lines longer than
    /// `MAX_LINE_BYTES` are skipped without being buffered.
    pub fn parse_reader<R: BufRead>(&self, reader: R) -> Result<ParsedDocument, ParseError> {
        let limit = self.max_decoded_bytes();
        let mut reader = reader.take(limit.saturating_add(1));

        let mut doc = ParsedDocument::default();
        let mut buf = Vec::new();
        let mut consumed = 0u64;
        let mut line_number = 0usize;
        let mut header_seen = false;
        let mut mismatch_reported = false;

        loop {
            buf.clear();
            let read = (&mut reader)
                .take(MAX_LINE_BYTES as u64 + 1)
                .read_until(b'\n', &mut buf);

            let mut overlong = false;
            let read = match read {
                Ok(n) if buf.len() > MAX_LINE_BYTES && buf.last() != Some(&b'\n') => {
                    overlong = true;
                    discard_line(&mut reader).map(|skipped| n + skipped)
                }
                other => other,
            };

            let n = match read {
                Ok(n) => n,
                Err(e) if !header_seen => return Err(ParseError::Io(e)),
                Err(e) => {
                    warn!("VCF stream ended early after line {}: {}", line_number, e);
                    doc.warnings.push(ParseWarning {
                        line: line_number,
                        kind: WarningKind::Truncated,
                        message: format!("Stream ended early: {}", e),
                    });
                    doc.truncated = true;
                    break;
                }
            };
            if n == 0 {
                break;
            }

            consumed += n as u64;
            if consumed > limit {
                if !header_seen {
                    return Err(ParseError::InputTooLarge {
                        size: consumed,
                        max: limit,
                    });
                }
                warn!("Decoded input exceeds {} bytes, stopping after line {}", limit, line_number);
                doc.warnings.push(ParseWarning {
                    line: line_number,
                    kind: WarningKind::Truncated,
                    message: format!("Decoded input exceeds {} bytes; remaining lines ignored", limit),
                });
                doc.truncated = true;
                break;
            }
            line_number += 1;

            if overlong {
                if !header_seen {
                    return Err(ParseError::InvalidHeader(format!(
                        "line {} exceeds {} bytes",
                        line_number, MAX_LINE_BYTES
                    )));
                }
                if buf.first() != Some(&b'#') {
                    doc.data_lines += 1;
                }
                debug!("Dropping VCF line {}: longer than {} bytes", line_number, MAX_LINE_BYTES);
                doc.warnings.push(ParseWarning {
                    line: line_number,
                    kind: WarningKind::MalformedRow,
                    message: format!("Line exceeds {} bytes", MAX_LINE_BYTES),
                });
                continue;
            }

            let text = match std::str::from_utf8(&buf) {
                Ok(s) => Cow::Borrowed(s),
                Err(_) => {
                    doc.warnings.push(ParseWarning {
                        line: line_number,
                        kind: WarningKind::Encoding,
                        message: "Invalid UTF-8 replaced".to_string(),
                    });
                    String::from_utf8_lossy(&buf)
                }
            };
            let line = text.trim_end_matches(['\n', '\r']);

            if line.trim().is_empty() {
                continue;
            }

            // First non-empty line must be the format declaration
            if !header_seen {
                let version = line
                    .strip_prefix("##fileformat=")
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .ok_or_else(|| {
                        let preview: String = line.chars().take(40).collect();
                        ParseError::InvalidHeader(format!(
                            "expected '##fileformat=' on line {}, found '{}'",
                            line_number, preview
                        ))
                    })?;
                doc.file_format = version.to_string();
                header_seen = true;
                continue;
            }

            if let Some(meta) = line.strip_prefix("##") {
                parse_meta_line(meta, line_number, &mut doc);
                continue;
            }

            if let Some(header) = line.strip_prefix('#') {
                parse_column_header(header, line_number, &mut doc);
                continue;
            }

            doc.data_lines += 1;
            match parse_data_line(line, line_number, &doc.samples) {
                Ok((record, mismatch)) => {
                    if mismatch && !mismatch_reported {
                        mismatch_reported = true;
                        doc.warnings.push(ParseWarning {
                            line: line_number,
                            kind: WarningKind::SampleMismatch,
                            message: format!(
                                "Found {} genotype columns for {} declared samples",
                                record.genotypes.len(),
                                doc.samples.len()
                            ),
                        });
                    }
                    doc.records.push(record);

                    if let Some(max) = self.max_records {
                        if doc.records.len() >= max {
                            debug!("Row limit {} reached at line {}", max, line_number);
                            doc.truncated = true;
                            break;
                        }
                    }
                }
                Err(reason) => {
                    debug!("Dropping VCF line {}: {}", line_number, reason);
                    doc.warnings.push(ParseWarning {
                        line: line_number,
                        kind: WarningKind::MalformedRow,
                        message: reason,
                    });
                }
            }
        }

        if !header_seen {
            return Err(ParseError::Empty);
        }

        info!(
            "Parsed {} variants from {} data lines ({} samples, {} warnings)",
            doc.records.len(),
            doc.data_lines,
            doc.samples.len(),
            doc.warnings.len()
        );

        Ok(doc)
    }
}

/// Consume the rest of the current line without buffering it
fn discard_line<R: BufRead>(reader: &mut R) -> std::io::Result<usize> {
    let mut skipped = 0;
    loop {
        let (found, used) = {
            let available = reader.fill_buf()?;
            if available.is_empty() {
                return Ok(skipped);
            }
            match available.iter().position(|&b| b == b'\n') {
                Some(i) => (true, i + 1),
                None => (false, available.len()),
            }
        };
        reader.consume(used);
        skipped += used;
        if found {
            return Ok(skipped);
        }
    }
}

/// Handle a `##KEY=VALUE` or `##KEY=<...>` line (prefix already stripped)
fn parse_meta_line(meta: &str, line_number: usize, doc: &mut ParsedDocument) {
    let Some((key, value)) = meta.split_once('=') else {
        doc.meta.push((meta.to_string(), String::new()));
        return;
    };

    let structured = value
        .strip_prefix('<')
        .and_then(|v| v.strip_suffix('>'));

    match structured {
        Some(inner) => {
            let fields = split_structured_fields(inner);
            let entries = doc.structured_meta.entry(key.to_string()).or_default();
            let id = fields
                .get("ID")
                .cloned()
                .unwrap_or_else(|| format!("#{}", entries.len() + 1));
            if id.is_empty() {
                doc.warnings.push(ParseWarning {
                    line: line_number,
                    kind: WarningKind::Header,
                    message: format!("##{} entry has an empty ID", key),
                });
            }
            entries.insert(id, fields);
        }
        None => doc.meta.push((key.to_string(), value.to_string())),
    }
}

/// Split `ID=X,Number=1,Description="a, b"` honoring double quotes
fn split_structured_fields(inner: &str) -> BTreeMap<String, String> {
    let mut fields = BTreeMap::new();
    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for c in inner.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            ',' if !in_quotes => pieces.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    pieces.push(current);

    for piece in pieces {
        if let Some((k, v)) = piece.split_once('=') {
            let v = v.trim();
            let v = v
                .strip_prefix('"')
                .and_then(|s| s.strip_suffix('"'))
                .unwrap_or(v);
            fields.insert(k.trim().to_string(), v.to_string());
        }
    }

    fields
}

/// Handle the `#CHROM ...` line (prefix already stripped)
fn parse_column_header(header: &str, line_number: usize, doc: &mut ParsedDocument) {
    let columns: Vec<&str> = header.split('\t').collect();

    if columns.len() < 8 {
        doc.warnings.push(ParseWarning {
            line: line_number,
            kind: WarningKind::Header,
            message: format!(
                "Column header has {} fields, expected at least 8",
                columns.len()
            ),
        });
    }
    if !doc.samples.is_empty() {
        doc.warnings.push(ParseWarning {
            line: line_number,
            kind: WarningKind::Header,
            message: "Repeated column header replaces earlier sample list".to_string(),
        });
    }

    doc.samples = columns
        .iter()
        .skip(9)
        .map(|s| s.trim().to_string())
        .collect();
}

/// Parse one data line.
///
/// Returns the record plus whether its genotype cells disagreed with the
/// declared sample count, or the reason the line was dropped.
fn parse_data_line(
    line: &str,
    line_number: usize,
    samples: &[String],
) -> Result<(VariantRecord, bool), String> {
    let cols: Vec<&str> = line.split('\t').collect();

    if cols.len() < 8 {
        return Err(format!(
            "Expected at least 8 tab-delimited fields, found {}",
            cols.len()
        ));
    }

    let position = cols[1]
        .trim()
        .parse::<u64>()
        .ok()
        .filter(|p| *p > 0)
        .ok_or_else(|| format!("Invalid position value: {}", cols[1]))?;

    let id = match cols[2].trim() {
        "" | "." => None,
        id => Some(id.to_string()),
    };

    let alternates = match cols[4].trim() {
        "" | "." => Vec::new(),
        alts => alts
            .split(',')
            .map(str::trim)
            .filter(|a| !a.is_empty() && *a != ".")
            .map(String::from)
            .collect(),
    };

    let quality = match cols[5].trim() {
        "" | "." => None,
        q => Some(
            q.parse::<f64>()
                .map_err(|_| format!("Invalid quality value: {}", q))?,
        ),
    };

    let filters = match cols[6].trim() {
        "" | "." => Vec::new(),
        f => f.split(';').map(String::from).collect(),
    };

    let mut genotypes = Vec::new();
    let mut mismatch = false;
    if cols.len() > 9 {
        let format: Vec<&str> = cols[8].trim().split(':').collect();
        let cells = &cols[9..];
        mismatch = cells.len() != samples.len();

        for (i, cell) in cells.iter().enumerate() {
            let name = samples
                .get(i)
                .cloned()
                .unwrap_or_else(|| format!("SAMPLE_{}", i + 1));
            genotypes.push(SampleGenotype::parse(&name, &format, cell.trim()));
        }
    }

    Ok((
        VariantRecord {
            line: line_number,
            chromosome: cols[0].trim().to_string(),
            position,
            id,
            reference: cols[3].trim().to_string(),
            alternates,
            quality,
            filters,
            info: Annotations::parse(cols[7]),
            genotypes,
        },
        mismatch,
    ))
}
