use super::AssociationPersistence;
use anyhow::{Context, Result};
use async_trait::async_trait;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// Write a JSON document to disk.
///
/// Gzip-compressed when the path ends in `.gz`. Uses atomic write: writes to
/// a .tmp file, fsyncs, then renames, so readers never see a partial file.
pub fn write_document(path: &Path, json: &str) -> Result<()> {
    let tmp_path = path.with_extension("tmp");

    {
        let tmp_file = File::create(&tmp_path).context("Failed to create temporary file")?;

        let file = if is_compressed(path) {
            let mut encoder = GzEncoder::new(tmp_file, Compression::default());
            encoder
                .write_all(json.as_bytes())
                .context("Failed to write compressed data")?;
            encoder.finish().context("Failed to finish compression")?
        } else {
            let mut file = tmp_file;
            file.write_all(json.as_bytes())
                .context("Failed to write data")?;
            file
        };

        file.sync_all().context("Failed to sync file to disk")?;
    }

    fs::rename(&tmp_path, path).context("Failed to rename temporary file")?;

    Ok(())
}

/// Read a document written by [`write_document`]
pub fn read_document(path: &Path) -> Result<String> {
    let file = File::open(path).context("Failed to open document")?;

    let mut json = String::new();
    if is_compressed(path) {
        GzDecoder::new(file)
            .read_to_string(&mut json)
            .context("Failed to decompress document")?;
    } else {
        let mut file = file;
        file.read_to_string(&mut json)
            .context("Failed to read document")?;
    }

    Ok(json)
}

fn is_compressed(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext == "gz")
        .unwrap_or(false)
}

/// Association store backed by a single file
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl AssociationPersistence for FileStore {
    async fn get_associations(&self) -> Result<Option<String>> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || {
            if !path.exists() {
                return Ok(None);
            }
            read_document(&path).map(Some)
        })
        .await
        .context("Association read task failed")?
    }

    async fn save_associations(&self, json: &str) -> Result<()> {
        let path = self.path.clone();
        let json = json.to_string();
        tokio::task::spawn_blocking(move || write_document(&path, &json))
            .await
            .context("Association write task failed")?
    }
}
