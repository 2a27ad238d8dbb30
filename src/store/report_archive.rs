use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::ArchiveError;
use crate::model::WizardSnapshot;

const EXTENSION: &str = "json.gz";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SavedReport {
    pub hash: String,
    pub path: PathBuf,
}

/// Directory of saved wizard snapshots, each stored gzip-compressed under
/// the SHA-256 of its JSON form
#[derive(Debug, Clone)]
pub struct ReportArchive {
    root: PathBuf,
}

impl ReportArchive {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn save(&self, snapshot: &WizardSnapshot) -> Result<SavedReport, ArchiveError> {
        let json = serde_json::to_vec(snapshot)?;
        let hash = hex::encode(Sha256::digest(&json));
        let compressed = compress(&json)?;

        tokio::fs::create_dir_all(&self.root).await?;
        let path = self.path_for(&hash);
        tokio::fs::write(&path, compressed).await?;

        log::info!("Saved assessment report {} to {}", hash, path.display());
        Ok(SavedReport { hash, path })
    }

    pub async fn load(&self, hash: &str) -> Result<WizardSnapshot, ArchiveError> {
        let not_found = || ArchiveError::NotFound {
            hash: hash.to_string(),
        };
        // Hashes double as file names
        if hash.is_empty() || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(not_found());
        }

        let bytes = match tokio::fs::read(self.path_for(hash)).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(not_found()),
            Err(e) => return Err(e.into()),
        };
        let json = decompress(&bytes)?;
        Ok(serde_json::from_slice(&json)?)
    }

    fn path_for(&self, hash: &str) -> PathBuf {
        self.root
            .join(format!("{}.{}", hash.to_ascii_lowercase(), EXTENSION))
    }
}

fn compress(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}

/// Plain JSON files dropped into the archive are accepted as-is
fn decompress(data: &[u8]) -> std::io::Result<Vec<u8>> {
    if data.starts_with(&[0x1f, 0x8b]) {
        let mut decoder = GzDecoder::new(data);
        let mut decompressed = Vec::new();
        decoder.read_to_end(&mut decompressed)?;
        Ok(decompressed)
    } else {
        Ok(data.to_vec())
    }
}
