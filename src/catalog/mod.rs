mod seeds;

use std::collections::BTreeMap;

use anyhow::{Context, Result};

use crate::models::SwitchModel;

/// SwitchModelCatalog is the read-only lookup of physical switch templates.
/// Shared behind an `Arc` once loaded; generation never mutates it.
#[derive(Debug, Clone, Default)]
pub struct SwitchModelCatalog {
    models: BTreeMap<String, SwitchModel>,
}

impl SwitchModelCatalog {
    pub fn new(models: impl IntoIterator<Item = SwitchModel>) -> Self {
        let mut catalog = Self::default();
        catalog.extend(models);
        catalog
    }

    /// Catalog holding only the built-in seed models
    pub fn with_seed_models() -> Self {
        Self::new(seeds::seed_switch_models())
    }

    /// Load the seed models, then overlay entries from a JSON file if one is given.
    /// File entries replace seed models with the same name.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut catalog = Self::with_seed_models();
        if let Some(path) = path {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read switch model catalog {}", path))?;
            let models: Vec<SwitchModel> = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse switch model catalog {}", path))?;
            tracing::info!("Loaded {} switch models from {}", models.len(), path);
            catalog.extend(models);
        }
        Ok(catalog)
    }

    pub fn extend(&mut self, models: impl IntoIterator<Item = SwitchModel>) {
        for model in models {
            self.models.insert(model.name.clone(), model);
        }
    }

    pub fn get(&self, name: &str) -> Option<&SwitchModel> {
        self.models.get(name)
    }

    /// All models, sorted by name
    pub fn list(&self) -> Vec<SwitchModel> {
        self.models.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}
