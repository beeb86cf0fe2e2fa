// ==============================================================================
// validator.rs - Input File Validation
// ==============================================================================
// Description: Pre-flight checks on VCF inputs (existence, size, type, digest)
// Author: Matt Barham
// Created: 2025-10-31
// Modified: 2026-10-18
// Version: 1.2.0
// Security: Allowlist-only file types, magic number verification
// ==============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use crate::parsers::vcf::is_compressed_path;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Accepted suffixes, longest first
const ACCEPTED_EXTENSIONS: [&str; 5] = ["vcf.gz", "vcf.bgz", "vcf", "gz", "bgz"];

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Input file not found: {0}")]
    NotFound(PathBuf),

    #[error("Input path is not a regular file: {0}")]
    NotAFile(PathBuf),

    #[error("File too large: {size} bytes (max: {max} bytes)")]
    TooLarge { size: u64, max: u64 },

    #[error("Invalid file type: {0} (expected .vcf, or gzip/BGZF .gz/.bgz)")]
    UnsupportedExtension(String),

    #[error("Magic number mismatch for .{0} file")]
    MagicMismatch(String),

    #[error("I/O error during validation: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatedFile {
    pub path: PathBuf,
    pub file_name: String,
    pub extension: String,
    pub size: u64,
    pub hash_sha256: String,
    pub validated_at: DateTime<Utc>,
}

impl ValidatedFile {
    pub fn is_gzipped(&self) -> bool {
        is_compressed_path(&self.path)
    }
}

#[derive(Debug, Clone, Default)]
pub struct InputValidator {
    max_file_size: Option<u64>,
}

impl InputValidator {
    /// `None` accepts any size
    pub fn new(max_file_size: Option<u64>) -> Self {
        Self { max_file_size }
    }

    pub fn validate(&self, path: &Path) -> Result<ValidatedFile, ValidationError> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        info!("Validating file: {}", path.display());

        // 1. Existence
        let metadata = match std::fs::metadata(path) {
            Ok(m) => m,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(ValidationError::NotFound(path.to_path_buf()))
            }
            Err(e) => return Err(e.into()),
        };
        if !metadata.is_file() {
            return Err(ValidationError::NotAFile(path.to_path_buf()));
        }

        // 2. Size check (opt-in)
        let size = metadata.len();
        if let Some(max) = self.max_file_size {
            if size > max {
                return Err(ValidationError::TooLarge { size, max });
            }
            debug!("Size check passed: {} bytes", size);
        }

        // 3. Extension check (allowlist)
        let extension = get_extension(&file_name)?;
        debug!("Extension check passed: {}", extension);

        // 4. Magic number verification
        if is_compressed_path(path) {
            let magic = read_magic_number(path)?;
            if magic != GZIP_MAGIC {
                return Err(ValidationError::MagicMismatch(extension));
            }
            debug!("Magic number check passed");
        }

        // 5. SHA-256
        let hash_sha256 = compute_sha256(path)?;
        debug!("SHA-256: {}", hash_sha256);

        Ok(ValidatedFile {
            path: path.to_path_buf(),
            file_name,
            extension,
            size,
            hash_sha256,
            validated_at: Utc::now(),
        })
    }
}

/// Whether a path has an extension the validator accepts
pub fn is_supported(path: &Path) -> bool {
    path.file_name()
        .map(|n| get_extension(&n.to_string_lossy()).is_ok())
        .unwrap_or(false)
}

fn get_extension(file_name: &str) -> Result<String, ValidationError> {
    let lower = file_name.to_lowercase();

    if let Some(ext) = ACCEPTED_EXTENSIONS
        .iter()
        .find(|ext| lower.strip_suffix(**ext).is_some_and(|stem| stem.ends_with('.')))
    {
        return Ok(ext.to_string());
    }

    let ext = lower.rsplit_once('.').map(|(_, e)| e.to_string()).unwrap_or_default();
    Err(ValidationError::UnsupportedExtension(ext))
}

fn read_magic_number(path: &Path) -> Result<[u8; 2], ValidationError> {
    let mut file = File::open(path)?;
    let mut buffer = [0u8; 2];
    match file.read_exact(&mut buffer) {
        Ok(()) => Ok(buffer),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok([0, 0]),
        Err(e) => Err(e.into()),
    }
}

fn compute_sha256(path: &Path) -> Result<String, ValidationError> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; 8192];

    loop {
        let n = file.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;
    use tempfile::{tempdir, Builder};

    #[test]
    fn test_get_extension() {
        assert_eq!(get_extension("sample.vcf").unwrap(), "vcf");
        assert_eq!(get_extension("chr1.dose.VCF.GZ").unwrap(), "vcf.gz");
        assert!(matches!(
            get_extension("genome.txt"),
            Err(ValidationError::UnsupportedExtension(ext)) if ext == "txt"
        ));
        assert_eq!(get_extension("cohort.vcf.bgz").unwrap(), "vcf.bgz");
        assert_eq!(get_extension("patient_42.gz").unwrap(), "gz");
        assert!(is_supported(Path::new("/data/a.vcf.gz")));
        assert!(!is_supported(Path::new("/data/a.vcf.gz.tbi")));
        assert!(!is_supported(Path::new("/data/gz")));
    }

    #[test]
    fn test_validate_plain_vcf() {
        let mut file = Builder::new().suffix(".vcf").tempfile().unwrap();
        write!(file, "abc").unwrap();
        file.flush().unwrap();

        let validated = InputValidator::default().validate(file.path()).unwrap();
        assert_eq!(validated.extension, "vcf");
        assert_eq!(validated.size, 3);
        assert_eq!(
            validated.hash_sha256,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert!(!validated.is_gzipped());
    }

    #[test]
    fn test_validate_gzip_magic() {
        let mut good = Builder::new().suffix(".vcf.gz").tempfile().unwrap();
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"##fileformat=VCFv4.2\n").unwrap();
        good.write_all(&encoder.finish().unwrap()).unwrap();
        good.flush().unwrap();
        assert!(InputValidator::default().validate(good.path()).unwrap().is_gzipped());

        let mut bad = Builder::new().suffix(".vcf.gz").tempfile().unwrap();
        writeln!(bad, "##fileformat=VCFv4.2").unwrap();
        bad.flush().unwrap();
        assert!(matches!(
            InputValidator::default().validate(bad.path()),
            Err(ValidationError::MagicMismatch(_))
        ));
    }

    #[test]
    fn test_validate_rejections() {
        let dir = tempdir().unwrap();

        let missing = dir.path().join("missing.vcf");
        assert!(matches!(
            InputValidator::default().validate(&missing),
            Err(ValidationError::NotFound(_))
        ));

        assert!(matches!(
            InputValidator::default().validate(dir.path()),
            Err(ValidationError::NotAFile(_))
        ));

        let big = dir.path().join("big.vcf");
        std::fs::write(&big, vec![b'#'; 64]).unwrap();
        assert!(matches!(
            InputValidator::new(Some(16)).validate(&big),
            Err(ValidationError::TooLarge { size: 64, max: 16 })
        ));
        assert_eq!(InputValidator::default().validate(&big).unwrap().size, 64);

        let txt = dir.path().join("report.txt");
        std::fs::write(&txt, "BRCA1").unwrap();
        assert!(matches!(
            InputValidator::default().validate(&txt),
            Err(ValidationError::UnsupportedExtension(_))
        ));
    }
}
