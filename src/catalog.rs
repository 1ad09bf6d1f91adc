//! Bootstrapping the property catalog from a JSON file.

use std::path::Path;

use thiserror::Error;
use tracing::{debug, info};

use crate::model::Property;
use crate::repository::StoreError;
use crate::store::Store;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("reading catalog {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("parsing catalog {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Read a JSON array of properties.
pub fn load_catalog(path: &Path) -> Result<Vec<Property>, CatalogError> {
    let raw = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
        path: path.display().to_string(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| CatalogError::Parse {
        path: path.display().to_string(),
        source,
    })
}

/// Register every property not already in the store. Returns how many were added.
pub async fn seed(store: &Store, properties: Vec<Property>) -> Result<usize, CatalogError> {
    let total = properties.len();
    let mut added = 0;
    for property in properties {
        let id = property.id;
        match store.register_property(property).await {
            Ok(()) => added += 1,
            Err(StoreError::AlreadyExists(_)) => debug!("catalog: property {id} already present"),
            Err(e) => return Err(e.into()),
        }
    }
    info!("catalog: {added} of {total} properties added");
    Ok(added)
}
