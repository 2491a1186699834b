// ==============================================================================
// input.rs - Input Decoding and Fingerprinting
// ==============================================================================
// Description: Detects plain/gzip/BGZF variant files, enforces the size limit,
//              and fingerprints raw bytes before line-based parsing
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// Security: Size allowlist, magic number verification
// ==============================================================================

use flate2::read::MultiGzDecoder;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::Path;
use tracing::debug;

use crate::parsers::vcf::ParseError;

/// Upload ceiling inherited from the web tier (50 MB)
pub const DEFAULT_MAX_INPUT_BYTES: u64 = 50 * 1024 * 1024;

const GZIP_MAGIC: [u8; 3] = [0x1f, 0x8b, 0x08];

/// Bytes needed to see a gzip header plus one BGZF extra subfield
const SNIFF_LEN: u64 = 18;

/// Physical encoding of a variant file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputEncoding {
    /// Uncompressed text
    Plain,
    /// Plain gzip (one or more members)
    Gzip,
    /// Blocked gzip with `BC` extra subfields
    Bgzf,
}

impl InputEncoding {
    /// Pick an encoding from the leading bytes, using the filename as a hint.
    ///
    /// Magic bytes win over the suffix: a `.vcf.gz` upload that was re-packaged
    /// as plain text is read as plain text.
    pub fn detect(filename: Option<&str>, head: &[u8]) -> Self {
        if head.len() < 2 || head[..2] != GZIP_MAGIC[..2] {
            return InputEncoding::Plain;
        }

        let suffix_says_bgzf = filename
            .map(|name| {
                let lower = name.to_lowercase();
                lower.ends_with(".bgz") || lower.ends_with(".bgzf")
            })
            .unwrap_or(false);

        if suffix_says_bgzf || is_bgzf_header(head) {
            InputEncoding::Bgzf
        } else {
            InputEncoding::Gzip
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InputEncoding::Plain => "plain",
            InputEncoding::Gzip => "gzip",
            InputEncoding::Bgzf => "bgzf",
        }
    }
}

/// Check a gzip header for the BGZF `BC` extra subfield
fn is_bgzf_header(head: &[u8]) -> bool {
    if head.len() < 12 || head[..3] != GZIP_MAGIC {
        return false;
    }

    // FLG.FEXTRA
    if head[3] & 0x04 == 0 {
        return false;
    }

    let xlen = u16::from_le_bytes([head[10], head[11]]) as usize;
    let extra = &head[12..head.len().min(12 + xlen)];

    let mut i = 0usize;
    while i + 4 <= extra.len() {
        let slen = u16::from_le_bytes([extra[i + 2], extra[i + 3]]) as usize;
        if extra[i] == b'B' && extra[i + 1] == b'C' && slen == 2 {
            return true;
        }
        i = i.saturating_add(4 + slen);
    }

    false
}

/// Summary of where a parsed document came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceInfo {
    pub encoding: InputEncoding,
    /// Size of the raw (possibly compressed) input
    pub size_bytes: u64,
    /// SHA-256 of the raw input, lowercase hex
    pub sha256: String,
}

/// Decoded line source plus metadata about the raw input
pub struct InputSource<'a> {
    pub info: SourceInfo,
    pub reader: Box<dyn BufRead + Send + 'a>,
}

/// Open a file on disk, verifying size and sniffing its encoding
pub fn open_path(path: &Path, max_bytes: u64) -> Result<InputSource<'static>, ParseError> {
    let size = std::fs::metadata(path)?.len();
    check_size(size, max_bytes)?;

    let sha256 = compute_sha256(File::open(path)?)?;

    let mut file = File::open(path)?;
    let mut head = Vec::with_capacity(SNIFF_LEN as usize);
    (&mut file).take(SNIFF_LEN).read_to_end(&mut head)?;
    file.seek(SeekFrom::Start(0))?;

    let filename = path.file_name().map(|n| n.to_string_lossy().to_string());
    let encoding = InputEncoding::detect(filename.as_deref(), &head);
    debug!("Opened {:?}: {} bytes, encoding {}", path, size, encoding.as_str());

    Ok(InputSource {
        info: SourceInfo {
            encoding,
            size_bytes: size,
            sha256,
        },
        reader: decoder(encoding, file),
    })
}

/// Wrap an in-memory upload, verifying size and sniffing its encoding
pub fn open_bytes<'a>(
    bytes: &'a [u8],
    filename: Option<&str>,
    max_bytes: u64,
) -> Result<InputSource<'a>, ParseError> {
    let size = bytes.len() as u64;
    check_size(size, max_bytes)?;

    let encoding = InputEncoding::detect(filename, bytes);
    let mut hasher = Sha256::new();
    hasher.update(bytes);

    Ok(InputSource {
        info: SourceInfo {
            encoding,
            size_bytes: size,
            sha256: format!("{:x}", hasher.finalize()),
        },
        reader: decoder(encoding, bytes),
    })
}

fn check_size(size: u64, max_bytes: u64) -> Result<(), ParseError> {
    if size == 0 {
        return Err(ParseError::Empty);
    }
    if size > max_bytes {
        return Err(ParseError::InputTooLarge {
            size,
            max: max_bytes,
        });
    }
    Ok(())
}

fn decoder<'a, R>(encoding: InputEncoding, raw: R) -> Box<dyn BufRead + Send + 'a>
where
    R: Read + Send + 'a,
{
    match encoding {
        InputEncoding::Plain => Box::new(BufReader::new(raw)),
        InputEncoding::Gzip => Box::new(BufReader::new(MultiGzDecoder::new(raw))),
        InputEncoding::Bgzf => Box::new(BufReader::new(noodles_bgzf::io::Reader::new(raw))),
    }
}

fn compute_sha256<R: Read>(mut reader: R) -> Result<String, ParseError> {
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; 8192];

    loop {
        let n = reader.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// Derive a patient identifier from an upload filename
///
/// `"john_doe.vcf.gz"` → `"PATIENT_JOHN_DOE"`. Only alphanumerics and
/// underscores survive, and the suffix is capped at 20 characters.
pub fn patient_id_from_filename(filename: &str) -> Option<String> {
    let base = Path::new(filename)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| filename.to_string());

    let mut stem = base.as_str();
    for suffix in [".gz", ".bgz", ".bgzf", ".vcf", ".VCF", ".txt"] {
        if let Some(stripped) = stem.strip_suffix(suffix) {
            stem = stripped;
        }
    }

    let clean: String = stem
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect::<String>()
        .to_uppercase()
        .chars()
        .take(20)
        .collect();

    if clean.is_empty() {
        None
    } else {
        Some(format!("PATIENT_{}", clean))
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use flate2::write::GzEncoder;
    use flate2::{Compression, GzBuilder};
    use std::io::Write;

    const BGZF_EOF: [u8; 28] = [
        0x1f, 0x8b, 0x08, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0xff, 0x06, 0x00, 0x42, 0x43,
        0x02, 0x00, 0x1b, 0x00, 0x03, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    ];

    pub fn gzip_bytes(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn bgzf_member(data: &[u8], bsize: u16) -> Vec<u8> {
        let extra = vec![b'B', b'C', 2, 0, (bsize & 0xff) as u8, (bsize >> 8) as u8];
        let mut encoder = GzBuilder::new()
            .extra(extra)
            .write(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    /// Single-block BGZF stream followed by the standard EOF marker
    pub fn bgzf_bytes(data: &[u8]) -> Vec<u8> {
        // BSIZE is total block size minus one; the placeholder pass measures it
        let probe = bgzf_member(data, 0);
        let mut out = bgzf_member(data, (probe.len() - 1) as u16);
        out.extend_from_slice(&BGZF_EOF);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::{bgzf_bytes, gzip_bytes};
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_detect_encoding() {
        assert_eq!(InputEncoding::detect(Some("a.vcf"), b"##fileformat=VCFv4.2"), InputEncoding::Plain);
        assert_eq!(InputEncoding::detect(None, &gzip_bytes(b"hello")), InputEncoding::Gzip);
        assert_eq!(InputEncoding::detect(None, &bgzf_bytes(b"hello")), InputEncoding::Bgzf);

        // Plain content under a compressed name stays plain
        assert_eq!(InputEncoding::detect(Some("a.vcf.gz"), b"##fileformat"), InputEncoding::Plain);

        // Suffix hint upgrades a gzip stream to BGZF
        assert_eq!(InputEncoding::detect(Some("a.vcf.bgz"), &gzip_bytes(b"x")), InputEncoding::Bgzf);
    }

    #[test]
    fn test_open_bytes_roundtrip() {
        let text = b"##fileformat=VCFv4.2\n";
        for raw in [text.to_vec(), gzip_bytes(text), bgzf_bytes(text)] {
            let mut source = open_bytes(&raw, None, DEFAULT_MAX_INPUT_BYTES).unwrap();
            let mut decoded = String::new();
            source.reader.read_to_string(&mut decoded).unwrap();
            assert_eq!(decoded.as_bytes(), text);
            assert_eq!(source.info.size_bytes, raw.len() as u64);
            assert_eq!(source.info.sha256.len(), 64);
        }
    }

    #[test]
    fn test_size_limits() {
        assert!(matches!(open_bytes(b"", None, 10), Err(ParseError::Empty)));
        assert!(matches!(
            open_bytes(b"0123456789ab", None, 10),
            Err(ParseError::InputTooLarge { size: 12, max: 10 })
        ));
    }

    #[test]
    fn test_open_path_fingerprint_matches_bytes() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"##fileformat=VCFv4.2\n").unwrap();
        file.flush().unwrap();

        let from_path = open_path(file.path(), DEFAULT_MAX_INPUT_BYTES).unwrap();
        let from_bytes = open_bytes(b"##fileformat=VCFv4.2\n", None, DEFAULT_MAX_INPUT_BYTES).unwrap();
        assert_eq!(from_path.info.sha256, from_bytes.info.sha256);
        assert_eq!(from_path.info.encoding, InputEncoding::Plain);
    }

    #[test]
    fn test_patient_id_from_filename() {
        assert_eq!(
            patient_id_from_filename("john-doe.vcf.gz").as_deref(),
            Some("PATIENT_JOHN_DOE")
        );
        assert_eq!(
            patient_id_from_filename("/uploads/a_really_long_patient_name_here.vcf").as_deref(),
            Some("PATIENT_A_REALLY_LONG_PATIEN")
        );
        assert_eq!(patient_id_from_filename(".vcf"), None);
    }
}
