//! Embedded default tables, parsed once per process.

use crate::ArchConfig;
use crate::catalog::{Catalog, CatalogData};
use std::sync::{Arc, OnceLock};

static BUILTIN_CATALOG: OnceLock<Arc<Catalog>> = OnceLock::new();
static DEFAULT_CONFIG: OnceLock<ArchConfig> = OnceLock::new();

pub const SERVICES_JSON: &str = include_str!("services.json");
pub const ALIASES_JSON: &str = include_str!("aliases.json");
pub const RELATIONSHIPS_JSON: &str = include_str!("relationships.json");
pub const DEFAULT_CONFIG_JSON: &str = include_str!("default_config.json");

pub(crate) fn builtin_catalog() -> &'static Arc<Catalog> {
    BUILTIN_CATALOG.get_or_init(|| {
        let mut data = CatalogData::from_json_str(SERVICES_JSON)
            .expect("embedded services JSON is valid");
        let aliases =
            CatalogData::from_json_str(ALIASES_JSON).expect("embedded aliases JSON is valid");
        let relationships = CatalogData::from_json_str(RELATIONSHIPS_JSON)
            .expect("embedded relationships JSON is valid");
        data.aliases = aliases.aliases;
        data.relationships = relationships.relationships;
        let catalog =
            Catalog::from_data(data, "builtin").expect("embedded catalog tables are consistent");
        Arc::new(catalog)
    })
}

pub fn default_config() -> ArchConfig {
    DEFAULT_CONFIG
        .get_or_init(|| {
            ArchConfig::from_json_str(DEFAULT_CONFIG_JSON)
                .expect("embedded default config is valid")
        })
        .clone()
}
