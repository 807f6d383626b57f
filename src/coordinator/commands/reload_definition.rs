use crate::prelude::*;

use esy::{ProtocolDefinition, RegisterCatalog};
use std::sync::Arc;

pub struct ReloadDefinition {
    config: ConfigWrapper,
    catalog: Arc<RegisterCatalog>,
}

impl ReloadDefinition {
    pub fn new(config: ConfigWrapper, catalog: Arc<RegisterCatalog>) -> Self {
        Self { config, catalog }
    }

    /// Re-reads `protocol.definition_file` and swaps it in. On any error
    /// the current table stays active.
    pub async fn run(&self) -> Result<usize> {
        let file = match self.config.protocol().definition_file() {
            Some(file) => file.clone(),
            None => bail!("no protocol.definition_file configured"),
        };

        info!("[reload_definition] loading {}", file);

        let definition = ProtocolDefinition::from_file(&file)?;

        self.catalog.replace(&definition)
    }
}
