pub type Result<T> = std::result::Result<T, Error>;

/// Failures while loading configuration or catalog data.
///
/// Parsing untrusted architecture input never produces one of these: malformed diagrams, dangling
/// references and cycles are repaired in place.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid catalog JSON: {message}")]
    InvalidCatalogJson { message: String },

    #[error("Invalid catalog YAML: {message}")]
    InvalidCatalogYaml { message: String },

    #[error("Invalid catalog ({source_name}): {message}")]
    InvalidCatalog {
        source_name: String,
        message: String,
    },

    #[error("Invalid config JSON: {message}")]
    InvalidConfigJson { message: String },

    #[error("Invalid config YAML: {message}")]
    InvalidConfigYaml { message: String },

    #[error("Config must be a JSON object, got {found}")]
    ConfigNotAnObject { found: String },
}
