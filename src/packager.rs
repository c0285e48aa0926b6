// ==============================================================================
// packager.rs - Result Archive Packaging
// ==============================================================================
// Description: Writes per-category CSV/PNG artifacts into a single ZIP archive
// Author: Matt Barham
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================
// Entries per category:
//   {category}_counts{suffix}.csv
//   {category}_density{suffix}.png   (zero-byte when nothing was plotted)
// ==============================================================================

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::io::Write;
use std::path::PathBuf;
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, info};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::models::LabCategory;

/// Mode of the persisted archive and of each entry
const ARCHIVE_MODE: u32 = 0o644;

/// Errors that can occur while writing the archive
#[derive(Error, Debug)]
pub enum PackageError {
    #[error("Cannot write archive to {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Duplicate archive entry: {0}")]
    DuplicateEntry(String),
}

/// Rendered outputs for one lab category
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryArtifacts {
    pub category: LabCategory,
    pub csv: Vec<u8>,
    pub png: Vec<u8>,
}

/// Manifest line for one written entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveEntry {
    pub name: String,
    pub size: u64,
    pub sha256: String,
}

/// Writes category artifacts into a deflate-compressed ZIP
#[derive(Debug, Clone)]
pub struct ArchivePackager {
    output_path: PathBuf,
    entry_suffix: String,
}

impl ArchivePackager {
    pub fn new(output_path: impl Into<PathBuf>, entry_suffix: impl Into<String>) -> Self {
        Self {
            output_path: output_path.into(),
            entry_suffix: entry_suffix.into(),
        }
    }

    /// Archive entry names (CSV, PNG) for a category
    pub fn entry_names(&self, category: LabCategory) -> (String, String) {
        (
            format!("{}_counts{}.csv", category.as_str(), self.entry_suffix),
            format!("{}_density{}.png", category.as_str(), self.entry_suffix),
        )
    }

    /// Write all artifacts, replacing any existing archive at the output path
    ///
    /// The archive is staged next to the destination and renamed into place,
    /// so a failure leaves no partial archive behind. Entry timestamps are
    /// fixed, so identical artifacts give a byte-identical archive.
    pub fn write(&self, artifacts: &[CategoryArtifacts]) -> Result<Vec<ArchiveEntry>, PackageError> {
        info!("Creating ZIP archive: {:?}", self.output_path);

        let dir = match self.output_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let staged = NamedTempFile::new_in(&dir).map_err(|source| self.write_error(source))?;

        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .last_modified_time(zip::DateTime::default())
            .unix_permissions(ARCHIVE_MODE);

        let mut zip = ZipWriter::new(staged);
        let mut manifest: Vec<ArchiveEntry> = Vec::with_capacity(artifacts.len() * 2);

        for artifact in artifacts {
            let (csv_name, png_name) = self.entry_names(artifact.category);
            for (name, bytes) in [(csv_name, &artifact.csv), (png_name, &artifact.png)] {
                if manifest.iter().any(|e| e.name == name) {
                    return Err(PackageError::DuplicateEntry(name));
                }
                zip.start_file(name.as_str(), options)?;
                zip.write_all(bytes).map_err(|source| self.write_error(source))?;

                debug!("Added {} ({} bytes)", name, bytes.len());
                manifest.push(ArchiveEntry {
                    name,
                    size: bytes.len() as u64,
                    sha256: sha256_hex(bytes),
                });
            }
        }

        let staged = zip.finish()?;
        // Staging files are created 0600; the archive is an ordinary output file
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            staged
                .as_file()
                .set_permissions(std::fs::Permissions::from_mode(ARCHIVE_MODE))
                .map_err(|source| self.write_error(source))?;
        }
        staged
            .as_file()
            .sync_all()
            .map_err(|source| self.write_error(source))?;
        staged
            .persist(&self.output_path)
            .map_err(|e| self.write_error(e.error))?;

        info!(
            "ZIP archive created successfully with {} entries",
            manifest.len()
        );
        Ok(manifest)
    }

    fn write_error(&self, source: std::io::Error) -> PackageError {
        PackageError::Write {
            path: self.output_path.clone(),
            source,
        }
    }
}

/// Lowercase hex SHA-256 of `bytes`
pub fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}
