//! Extension packaging
//!
//! Produces `extension.zip` with two entries:
//! - `metadata.json`: the extension metadata with namespaced component names
//! - `extension.sql`: the install script, destination placeholder left in place

use extpack_core::{Extension, ExtensionLayout};
use extpack_sql::{build_script, AssembleError};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

pub const METADATA_ENTRY: &str = "metadata.json";
pub const SCRIPT_ENTRY: &str = "extension.sql";

#[derive(Debug, thiserror::Error)]
pub enum PackageError {
    #[error(transparent)]
    Assemble(#[from] AssembleError),

    #[error("Failed to serialize metadata: {0}")]
    Metadata(#[from] serde_json::Error),

    #[error("Failed to write package {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write package: {0}")]
    Zip(#[from] zip::result::ZipError),
}

/// Build `extension.zip` in the extension root and return its path
pub fn package(extension: &Extension, layout: &ExtensionLayout) -> Result<PathBuf, PackageError> {
    let script = build_script(extension, layout)?;
    let output_path = layout.package_file();

    write_package(extension, &script, &output_path)?;

    tracing::info!(package = %output_path.display(), "Extension packaged");
    Ok(output_path)
}

/// Write a package archive for `extension` with the given install script
pub fn write_package(extension: &Extension, script: &str, output_path: &Path) -> Result<(), PackageError> {
    let metadata = serde_json::to_string_pretty(&extension.namespaced())?;

    let file = File::create(output_path).map_err(|e| PackageError::Io {
        path: output_path.to_path_buf(),
        source: e,
    })?;

    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    zip.start_file(METADATA_ENTRY, options)?;
    zip.write_all(metadata.as_bytes()).map_err(|e| PackageError::Io {
        path: output_path.to_path_buf(),
        source: e,
    })?;

    zip.start_file(SCRIPT_ENTRY, options)?;
    zip.write_all(script.as_bytes()).map_err(|e| PackageError::Io {
        path: output_path.to_path_buf(),
        source: e,
    })?;

    zip.finish()?;
    Ok(())
}
