// ==============================================================================
// parsers/vcf.rs - VCF file parser
// ==============================================================================
// Description: Streaming VCF 4.0-4.3 parser with strict header validation
// Author: Matt Barham
// Created: 2026-10-18
// Modified: 2026-10-18
// Version: 1.1.0
// ==============================================================================
// References:
// - VCF 4.2 Spec: https://samtools.github.io/hts-specs/VCFv4.2.pdf
// - VCF 4.3 Spec: https://samtools.github.io/hts-specs/VCFv4.3.pdf
// ==============================================================================
// Header problems are collected and reported together as one Format error.
// Record problems only skip the offending line.
// ==============================================================================

use flate2::read::MultiGzDecoder;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::models::{InfoValue, SampleCall, VariantRecord};

/// Versions accepted in `##fileformat=VCFv<version>`
pub const SUPPORTED_VERSIONS: [&str; 4] = ["4.0", "4.1", "4.2", "4.3"];

/// Mandatory columns of the `#CHROM` header line
pub const REQUIRED_COLUMNS: [&str; 8] = ["#CHROM", "POS", "ID", "REF", "ALT", "QUAL", "FILTER", "INFO"];

/// Records kept before the parse is truncated
pub const DEFAULT_RECORD_LIMIT: usize = 500_000;

/// Cooperative cancellation hook, polled between records
pub type CancelCheck = Arc<dyn Fn() -> bool + Send + Sync>;

/// Fatal VCF parsing errors
#[derive(Error, Debug)]
pub enum VCFParseError {
    #[error("Invalid VCF format: {}", .reasons.join("; "))]
    Format { reasons: Vec<String> },

    #[error("Failed to open VCF file: {path}: {source}")]
    FileOpen {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parsing cancelled after {records} records")]
    Cancelled { records: usize },
}

/// A single malformed data line (logged and skipped, never fatal)
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecordParseError {
    #[error("expected at least 8 tab-separated fields, found {0}")]
    TooFewFields(usize),

    #[error("invalid position '{0}'")]
    InvalidPosition(String),

    #[error("invalid UTF-8 after byte {0}")]
    InvalidUtf8(usize),
}

/// Whether a path names gzip/BGZF input (`.gz` or `.bgz` suffix)
pub fn is_compressed_path(path: &Path) -> bool {
    let name = path.to_string_lossy().to_ascii_lowercase();
    name.ends_with(".gz") || name.ends_with(".bgz")
}

/// Read one line into `buf` without its line terminator.
/// Returns false at end of input.
fn read_raw_line<R: BufRead>(reader: &mut R, buf: &mut Vec<u8>) -> std::io::Result<bool> {
    buf.clear();
    if reader.read_until(b'\n', buf)? == 0 {
        return Ok(false);
    }
    while matches!(buf.last(), Some(b'\n' | b'\r')) {
        buf.pop();
    }
    Ok(true)
}

/// Parsed header block
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VcfHeader {
    /// Declared format, e.g. "VCFv4.2"
    pub file_format: String,
    /// Version part of the declaration, e.g. "4.2"
    pub version: String,
    /// ##INFO declarations keyed by ID
    pub info: BTreeMap<String, BTreeMap<String, String>>,
    /// ##FORMAT declarations keyed by ID
    pub format: BTreeMap<String, BTreeMap<String, String>>,
    /// ##contig declarations keyed by ID
    pub contigs: BTreeMap<String, BTreeMap<String, String>>,
    /// ##FILTER declarations keyed by ID
    pub filters: BTreeMap<String, BTreeMap<String, String>>,
    /// Any other `##key=value` line, in file order
    pub other: Vec<(String, String)>,
    /// Columns of the #CHROM line
    pub columns: Vec<String>,
    /// Sample names (columns after FORMAT)
    pub sample_names: Vec<String>,
}

impl VcfHeader {
    /// Reference genome from ##reference, ##assembly or a contig assembly tag
    pub fn reference_genome(&self) -> Option<String> {
        let lookup = |key: &str| {
            self.other
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
        };

        lookup("reference")
            .or_else(|| lookup("assembly"))
            .or_else(|| {
                self.contigs
                    .values()
                    .find_map(|attrs| attrs.get("assembly").cloned())
            })
    }
}

/// Header plus parse statistics
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VcfMetadata {
    pub header: VcfHeader,
    pub records_parsed: usize,
    pub skipped_lines: usize,
    pub truncated: bool,
    pub record_limit: usize,
}

/// Output of a successful parse
#[derive(Debug, Clone)]
pub struct ParsedVcf {
    pub metadata: VcfMetadata,
    pub variants: Vec<VariantRecord>,
}

/// VCF parser with configuration options
#[derive(Clone)]
pub struct VCFParser {
    /// Maximum number of records kept before truncating
    pub record_limit: usize,

    cancel_check: Option<CancelCheck>,
}

impl Default for VCFParser {
    fn default() -> Self {
        Self {
            record_limit: DEFAULT_RECORD_LIMIT,
            cancel_check: None,
        }
    }
}

impl std::fmt::Debug for VCFParser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VCFParser")
            .field("record_limit", &self.record_limit)
            .field("cancellable", &self.cancel_check.is_some())
            .finish()
    }
}

impl VCFParser {
    /// Create new VCF parser with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set maximum number of records to keep
    pub fn with_record_limit(mut self, limit: usize) -> Self {
        self.record_limit = limit;
        self
    }

    /// Install a cancellation check
    pub fn with_cancel_check(mut self, check: CancelCheck) -> Self {
        self.cancel_check = Some(check);
        self
    }

    /// Parse a VCF file
    ///
    /// # Arguments
    /// * `path` - Path to VCF file (`.vcf`, or gzip/BGZF compressed when ending in `.gz`/`.bgz`)
    ///
    /// # Example
    /// ```no_run
    /// use genetic_risk_analyzer::parsers::VCFParser;
    ///
    /// let parsed = VCFParser::new().parse("patient.vcf.gz")?;
    /// println!("Parsed {} variants", parsed.variants.len());
    /// # Ok::<(), genetic_risk_analyzer::parsers::VCFParseError>(())
    /// ```
    pub fn parse(&self, path: impl AsRef<Path>) -> Result<ParsedVcf, VCFParseError> {
        let path = path.as_ref();

        let file = File::open(path).map_err(|e| VCFParseError::FileOpen {
            path: path.display().to_string(),
            source: e,
        })?;

        let is_gzip = is_compressed_path(path);

        info!("Parsing VCF file {:?} (gzip: {})", path, is_gzip);

        if is_gzip {
            self.parse_reader(BufReader::new(MultiGzDecoder::new(file)))
        } else {
            self.parse_reader(BufReader::new(file))
        }
    }

    /// Parse VCF text from any buffered reader, line by line
    pub fn parse_reader<R: BufRead>(&self, mut reader: R) -> Result<ParsedVcf, VCFParseError> {
        let mut buf = Vec::new();
        let mut line_number = 0usize;

        // ---- Header phase ------------------------------------------------------
        let mut header = VcfHeader::default();
        let mut reasons: Vec<String> = Vec::new();
        let mut saw_first_line = false;
        let mut saw_chrom_line = false;

        while read_raw_line(&mut reader, &mut buf)? {
            line_number += 1;
            let line = std::str::from_utf8(&buf).map_err(|e| {
                std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("header line {} is not valid UTF-8: {}", line_number, e),
                )
            })?;

            if line.trim().is_empty() {
                continue;
            }

            if !saw_first_line {
                saw_first_line = true;
                if let Err(reason) = check_fileformat(line, &mut header) {
                    reasons.push(reason);
                }
            }

            if line.starts_with("##") {
                parse_meta_line(line, &mut header);
                continue;
            }

            if line.starts_with('#') {
                saw_chrom_line = true;
                header.columns = line.split('\t').map(|c| c.trim().to_string()).collect();

                let missing: Vec<&str> = REQUIRED_COLUMNS
                    .iter()
                    .copied()
                    .filter(|required| !header.columns.iter().any(|c| c == required))
                    .collect();

                if !missing.is_empty() {
                    reasons.push(format!(
                        "Header line is missing required columns: {}",
                        missing.join(", ")
                    ));
                }

                if header.columns.len() > 9 {
                    header.sample_names = header.columns[9..].to_vec();
                }
                break;
            }

            // Data before the #CHROM line ends the header block
            reasons.push(format!(
                "Missing #CHROM header line before first data record (line {})",
                line_number
            ));
            saw_chrom_line = true;
            break;
        }

        if !saw_first_line {
            reasons.push("File is empty".to_string());
        } else if !saw_chrom_line {
            reasons.push("Missing #CHROM header line".to_string());
        }

        if !reasons.is_empty() {
            warn!("VCF header validation failed: {}", reasons.join("; "));
            return Err(VCFParseError::Format { reasons });
        }

        debug!(
            "Header parsed: {} ({} INFO, {} FORMAT, {} contigs, {} samples)",
            header.file_format,
            header.info.len(),
            header.format.len(),
            header.contigs.len(),
            header.sample_names.len()
        );

        // ---- Record phase ------------------------------------------------------
        let mut variants = Vec::new();
        let mut skipped_lines = 0usize;
        let mut truncated = false;

        while read_raw_line(&mut reader, &mut buf)? {
            line_number += 1;
            let line = match std::str::from_utf8(&buf) {
                Ok(line) => line,
                Err(e) => {
                    warn!(
                        "Line {}: skipping malformed record: {}",
                        line_number,
                        RecordParseError::InvalidUtf8(e.valid_up_to())
                    );
                    skipped_lines += 1;
                    continue;
                }
            };

            if line.trim().is_empty() {
                continue;
            }

            if line.starts_with('#') {
                debug!("Line {}: ignoring header line after #CHROM", line_number);
                continue;
            }

            if let Some(check) = &self.cancel_check {
                if check() {
                    info!("VCF parse cancelled at line {}", line_number);
                    return Err(VCFParseError::Cancelled {
                        records: variants.len(),
                    });
                }
            }

            if variants.len() >= self.record_limit {
                warn!(
                    "Record limit of {} reached at line {}; truncating input",
                    self.record_limit, line_number
                );
                truncated = true;
                break;
            }

            match parse_record(line, &header.sample_names) {
                Ok(record) => variants.push(record),
                Err(e) => {
                    warn!("Line {}: skipping malformed record: {}", line_number, e);
                    skipped_lines += 1;
                }
            }
        }

        info!(
            "Parsed {} VCF records ({} skipped, truncated: {})",
            variants.len(),
            skipped_lines,
            truncated
        );

        Ok(ParsedVcf {
            metadata: VcfMetadata {
                header,
                records_parsed: variants.len(),
                skipped_lines,
                truncated,
                record_limit: self.record_limit,
            },
            variants,
        })
    }
}

/// Validate the `##fileformat` declaration on the first non-blank line
fn check_fileformat(line: &str, header: &mut VcfHeader) -> Result<(), String> {
    let Some(value) = line.strip_prefix("##fileformat=") else {
        return Err(format!(
            "First line must declare ##fileformat=VCFv<version>, found '{}'",
            line.chars().take(60).collect::<String>()
        ));
    };

    let value = value.trim();
    header.file_format = value.to_string();

    let Some(version) = value.strip_prefix("VCFv") else {
        return Err(format!("Unrecognized fileformat declaration '{}'", value));
    };

    header.version = version.to_string();

    if SUPPORTED_VERSIONS.contains(&version) {
        Ok(())
    } else {
        Err(format!(
            "Unsupported VCF version '{}' (supported: {})",
            value,
            SUPPORTED_VERSIONS.join(", ")
        ))
    }
}

/// Parse a `##key=value` or `##key=<...>` meta line into the header
fn parse_meta_line(line: &str, header: &mut VcfHeader) {
    let body = &line[2..];
    let Some((key, value)) = body.split_once('=') else {
        header.other.push((body.to_string(), String::new()));
        return;
    };

    if key == "fileformat" {
        return;
    }

    let structured = value
        .strip_prefix('<')
        .and_then(|v| v.strip_suffix('>'))
        .map(parse_structured);

    match (key, structured) {
        ("INFO", Some(attrs)) => insert_declaration(&mut header.info, attrs),
        ("FORMAT", Some(attrs)) => insert_declaration(&mut header.format, attrs),
        ("FILTER", Some(attrs)) => insert_declaration(&mut header.filters, attrs),
        ("contig", Some(attrs)) => insert_declaration(&mut header.contigs, attrs),
        _ => header.other.push((key.to_string(), value.to_string())),
    }
}

fn insert_declaration(
    target: &mut BTreeMap<String, BTreeMap<String, String>>,
    attrs: BTreeMap<String, String>,
) {
    let id = attrs
        .get("ID")
        .cloned()
        .unwrap_or_else(|| format!("_{}", target.len()));
    target.insert(id, attrs);
}

/// Split `ID=DP,Number=1,Description="Depth, total"` into key/value pairs.
/// Commas separate fields only outside double quotes.
pub fn parse_structured(inner: &str) -> BTreeMap<String, String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut escaped = false;

    for ch in inner.chars() {
        if escaped {
            current.push(ch);
            escaped = false;
            continue;
        }

        match ch {
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut current)),
            _ => current.push(ch),
        }
    }
    if !current.is_empty() {
        fields.push(current);
    }

    fields
        .into_iter()
        .filter_map(|field| {
            field
                .split_once('=')
                .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        })
        .collect()
}

/// Parse the INFO column into ordered typed entries
pub fn parse_info(raw: &str) -> Vec<(String, InfoValue)> {
    if raw == "." || raw.is_empty() {
        return Vec::new();
    }

    raw.split(';')
        .filter(|entry| !entry.is_empty())
        .map(|entry| match entry.split_once('=') {
            Some((key, value)) => (key.to_string(), InfoValue::coerce(value)),
            None => (entry.to_string(), InfoValue::Flag(true)),
        })
        .collect()
}

/// Parse one tab-separated data line
fn parse_record(line: &str, sample_names: &[String]) -> Result<VariantRecord, RecordParseError> {
    let fields: Vec<&str> = line.split('\t').collect();

    if fields.len() < 8 {
        return Err(RecordParseError::TooFewFields(fields.len()));
    }

    let position = fields[1]
        .trim()
        .parse::<u64>()
        .map_err(|_| RecordParseError::InvalidPosition(fields[1].to_string()))?;

    let id = if fields[2].is_empty() { "." } else { fields[2] };

    // ".", garbage and non-finite values ("nan", "inf") all mean "no quality"
    let quality = fields[5]
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|q| q.is_finite())
        .unwrap_or(0.0);

    let format = fields.get(8).copied().unwrap_or("");

    let samples = if !format.is_empty() && fields.len() > 9 {
        let keys: Vec<&str> = format.split(':').collect();

        fields[9..]
            .iter()
            .enumerate()
            .map(|(idx, raw)| {
                let values: Vec<&str> = raw.split(':').collect();
                let sample_id = sample_names
                    .get(idx)
                    .cloned()
                    .unwrap_or_else(|| format!("SAMPLE{}", idx + 1));

                let fields = keys
                    .iter()
                    .enumerate()
                    .map(|(i, key)| {
                        (key.to_string(), values.get(i).copied().unwrap_or(".").to_string())
                    })
                    .collect();

                SampleCall { sample_id, fields }
            })
            .collect()
    } else {
        Vec::new()
    };

    Ok(VariantRecord {
        chromosome: fields[0].to_string(),
        position,
        id: id.to_string(),
        ref_allele: fields[3].to_string(),
        alt_allele: fields[4].to_string(),
        quality,
        filter: fields[6].to_string(),
        info: parse_info(fields[7]),
        format: format.to_string(),
        samples,
    })
}
