//! The single `catalog.json` document and its atomic swap (§4.13, §4.8).

use std::path::PathBuf;

use gigsignal_common::types::Catalog;
use gigsignal_common::{Error, Result};

use crate::file::write_atomic;

pub struct CatalogStore {
    path: PathBuf,
}

impl CatalogStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub async fn save(&self, catalog: &Catalog) -> Result<()> {
        let json = serde_json::to_string_pretty(catalog)
            .map_err(|e| Error::CorruptCatalog(e.to_string()))?;
        write_atomic(&self.path, json.as_bytes())
            .await
            .map_err(Error::Anyhow)
    }

    pub async fn load(&self) -> Result<Option<Catalog>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::Anyhow(e.into())),
        };
        let catalog: Catalog = serde_json::from_slice(&bytes)
            .map_err(|e| Error::CorruptCatalog(e.to_string()))?;
        Ok(Some(catalog))
    }
}
