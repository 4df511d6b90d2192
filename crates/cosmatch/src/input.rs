//! Embedding container loading
//!
//! A container is a JSON object with an `embeddings` array of equal-length
//! vectors and an optional parallel `idxs` array of identifiers. Ids may be
//! integers or strings; floats and integers beyond `i64` are read as text.

use cosmatch_common::{CosMatchError, Result};
use cosmatch_matcher::{default_ids, EmbeddingSet, Identifier};
use serde::Deserialize;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Deserialize)]
struct EmbeddingContainer {
    embeddings: Vec<Vec<f32>>,

    #[serde(default)]
    idxs: Option<Vec<Identifier>>,
}

/// Embedding collection loaded from disk
#[derive(Debug)]
pub struct LoadedEmbeddings {
    pub set: EmbeddingSet,
    pub path: PathBuf,
    pub size_bytes: u64,
}

/// Load an embedding container file
pub fn load_embeddings(path: &Path) -> Result<LoadedEmbeddings> {
    let file = File::open(path).map_err(|e| {
        CosMatchError::file_system(format!("Failed to open {}: {}", path.display(), e))
    })?;
    let size_bytes = file.metadata()?.len();

    let container: EmbeddingContainer = serde_json::from_reader(BufReader::new(file))
        .map_err(|e| {
            CosMatchError::serialization(format!("Failed to parse {}: {}", path.display(), e))
        })?;

    let count = container.embeddings.len();
    let ids = container.idxs.unwrap_or_else(|| default_ids(count));
    let set = EmbeddingSet::from_rows(container.embeddings, ids).map_err(|e| match e {
        CosMatchError::InvalidInput(msg) => {
            CosMatchError::invalid_input(format!("{}: {}", path.display(), msg))
        }
        other => other,
    })?;

    info!(
        "Loaded {} embeddings (dim={}) from {} ({:.2} KB)",
        set.len(),
        set.dim(),
        path.display(),
        size_bytes as f64 / 1024.0
    );

    Ok(LoadedEmbeddings {
        set,
        path: path.to_path_buf(),
        size_bytes,
    })
}
