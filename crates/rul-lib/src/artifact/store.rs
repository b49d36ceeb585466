//! Artifact persistence
//!
//! Artifacts are JSON documents, optionally zstd-compressed. Writes go to a
//! temp file that is renamed into place, so a reader never sees a partial
//! artifact. Reads accept either form.

use super::ModelArtifact;
use crate::error::{Result, RulError};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info};

/// zstd frame magic number
const ZSTD_MAGIC: [u8; 4] = [0x28, 0xB5, 0x2F, 0xFD];

/// zstd level used for compressed artifacts
const ZSTD_LEVEL: i32 = 3;

/// How artifact bytes are encoded on disk
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactEncoding {
    /// Detect from content when reading, from the file extension when writing
    #[default]
    Auto,
    Plain,
    Zstd,
}

impl ArtifactEncoding {
    /// Encoding used when writing to `path`
    pub fn for_write(self, path: &Path) -> Self {
        match self {
            Self::Auto if path.extension().is_some_and(|e| e == "zst") => Self::Zstd,
            Self::Auto => Self::Plain,
            other => other,
        }
    }

    /// Encoding of already-read bytes
    fn for_read(self, bytes: &[u8]) -> Self {
        match self {
            Self::Auto if bytes.starts_with(&ZSTD_MAGIC) => Self::Zstd,
            Self::Auto => Self::Plain,
            other => other,
        }
    }
}

impl FromStr for ArtifactEncoding {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "plain" => Ok(Self::Plain),
            "zstd" => Ok(Self::Zstd),
            other => Err(format!("unknown artifact encoding '{}' (expected auto, plain or zstd)", other)),
        }
    }
}

/// Result of persisting an artifact
#[derive(Debug, Clone)]
pub struct SavedArtifact {
    pub path: PathBuf,
    pub checksum: String,
    pub size_bytes: usize,
    pub compressed: bool,
}

/// A validated artifact together with facts about its stored form
#[derive(Debug, Clone)]
pub struct LoadedArtifact {
    pub artifact: ModelArtifact,
    pub path: PathBuf,
    pub checksum: String,
    pub size_bytes: usize,
    pub compressed: bool,
}

impl ModelArtifact {
    /// Serialize to bytes in the given encoding (`Auto` means plain)
    pub fn to_bytes(&self, encoding: ArtifactEncoding) -> Result<Vec<u8>> {
        let json = serde_json::to_vec(self)
            .map_err(|e| RulError::incompatible(None, format!("failed to serialize: {}", e)))?;
        match encoding {
            ArtifactEncoding::Zstd => zstd::encode_all(json.as_slice(), ZSTD_LEVEL)
                .map_err(|e| RulError::incompatible(None, format!("zstd compression failed: {}", e))),
            ArtifactEncoding::Plain | ArtifactEncoding::Auto => Ok(json),
        }
    }

    /// Decode and validate artifact bytes
    pub fn from_bytes(bytes: &[u8], encoding: ArtifactEncoding, location: Option<&Path>) -> Result<Self> {
        let location = location.map(Path::to_path_buf);
        let json = match encoding.for_read(bytes) {
            ArtifactEncoding::Zstd => zstd::decode_all(bytes).map_err(|e| {
                RulError::incompatible(location.clone(), format!("zstd decompression failed: {}", e))
            })?,
            _ => bytes.to_vec(),
        };
        let artifact: ModelArtifact = serde_json::from_slice(&json)
            .map_err(|e| RulError::incompatible(location.clone(), e.to_string()))?;
        artifact.validate(location)?;
        Ok(artifact)
    }

    /// Write to `path`, compressing when the encoding (or a `.zst` extension) asks for it
    pub fn save(&self, path: &Path, encoding: ArtifactEncoding) -> Result<SavedArtifact> {
        let encoding = encoding.for_write(path);
        let bytes = self.to_bytes(encoding)?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| RulError::io(parent, e))?;
        }
        write_atomic(path, &bytes)?;

        let saved = SavedArtifact {
            path: path.to_path_buf(),
            checksum: compute_checksum(&bytes),
            size_bytes: bytes.len(),
            compressed: encoding == ArtifactEncoding::Zstd,
        };
        info!(
            path = %saved.path.display(),
            size = saved.size_bytes,
            compressed = saved.compressed,
            checksum = %saved.checksum,
            "Saved model artifact"
        );
        Ok(saved)
    }

    /// Read, decode and validate the artifact at `path`
    pub fn load(path: &Path, encoding: ArtifactEncoding) -> Result<LoadedArtifact> {
        let bytes = read_all(path)?;
        let compressed = encoding.for_read(&bytes) == ArtifactEncoding::Zstd;
        let artifact = Self::from_bytes(&bytes, encoding, Some(path))?;

        let loaded = LoadedArtifact {
            artifact,
            path: path.to_path_buf(),
            checksum: compute_checksum(&bytes),
            size_bytes: bytes.len(),
            compressed,
        };
        info!(
            path = %path.display(),
            features = loaded.artifact.feature_order().len(),
            compressed = loaded.compressed,
            checksum = %loaded.checksum,
            "Loaded model artifact"
        );
        Ok(loaded)
    }
}

/// The file handle is closed when this returns, on success or failure
fn read_all(path: &Path) -> Result<Vec<u8>> {
    let mut file = File::open(path).map_err(|e| RulError::InputUnreadable {
        path: path.to_path_buf(),
        source: e,
    })?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)
        .map_err(|e| RulError::InputUnreadable {
            path: path.to_path_buf(),
            source: e,
        })?;
    Ok(bytes)
}

/// Write to a temp file next to `path`, then rename into place
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let temp_path = path.with_extension("tmp");
    let mut file = File::create(&temp_path).map_err(|e| RulError::io(&temp_path, e))?;
    file.write_all(bytes).map_err(|e| RulError::io(&temp_path, e))?;
    file.sync_all().map_err(|e| RulError::io(&temp_path, e))?;
    drop(file);

    fs::rename(&temp_path, path).map_err(|e| RulError::io(path, e))?;
    debug!(path = %path.display(), bytes = bytes.len(), "Wrote file atomically");
    Ok(())
}

/// Compute SHA256 checksum of data
pub fn compute_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
