#![forbid(unsafe_code)]

//! Cloud architecture parsing and graph normalization (headless).
//!
//! Design goals:
//! - total on untrusted input: malformed payloads, dangling references and cyclic groups are
//!   repaired, never reported as errors
//! - deterministic output for identical input (no clocks, no randomness, no I/O)
//! - data-driven catalog: service definitions, aliases and relationship templates are embedded
//!   JSON that callers can replace or extend

pub mod catalog;
pub mod config;
pub mod data;
pub mod error;
pub mod hierarchy;
pub mod iac;
pub mod message;
pub mod model;
pub mod nodes;
pub mod structured;
pub mod text;
pub mod utils;

pub use catalog::{Catalog, CatalogData, MatchKind, Resolution, ServiceDefinition};
pub use config::{ArchConfig, LayoutSettings, Limits};
pub use error::{Error, Result};
pub use hierarchy::Hierarchy;
pub use iac::{IacDialect, IacResource};
pub use message::{ParseSource, extract_diagram_payload};
pub use model::{
    Connection, GroupType, Layout, ParsedArchitecture, ParsedGroup, ResolvedService,
};
pub use nodes::{Graph, GraphEdge, GraphNode, NodeData, NodeKind, Position};
pub use text::{RelationshipTemplate, TextExtraction};

use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

/// Result of [`Engine::parse_message`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedMessage {
    pub source: ParseSource,
    pub architecture: ParsedArchitecture,
}

/// Entry point bundling a catalog with a configuration.
///
/// Cloning is cheap (the catalog is shared). Every method takes `&self` and is free of side
/// effects, so one engine can serve any number of concurrent callers.
#[derive(Debug, Clone)]
pub struct Engine {
    catalog: Arc<Catalog>,
    config: ArchConfig,
    limits: Limits,
    layout: LayoutSettings,
}

impl Default for Engine {
    fn default() -> Self {
        let config = data::default_config();
        Self {
            catalog: Catalog::builtin_shared(),
            limits: config.limits(),
            layout: config.layout(),
            config,
        }
    }
}

impl Engine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_catalog(mut self, catalog: Arc<Catalog>) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn with_config(mut self, config: ArchConfig) -> Self {
        // Overrides are merged onto the embedded defaults.
        self.config.deep_merge(config.as_value());
        self.limits = self.config.limits();
        self.layout = self.config.layout();
        self
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn config(&self) -> &ArchConfig {
        &self.config
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    pub fn layout_settings(&self) -> &LayoutSettings {
        &self.layout
    }

    pub fn resolve(&self, query: &str) -> Option<&ServiceDefinition> {
        self.catalog.resolve(query)
    }

    pub fn extract_text(&self, text: &str) -> TextExtraction {
        text::extract(text, &self.catalog, &self.limits)
    }

    pub fn parse_text(&self, text: &str) -> ParsedArchitecture {
        text::architecture_from_text(text, &self.catalog, &self.limits, self.layout.default_layout)
    }

    /// `None` when `payload` is not an object with a `services` array.
    pub fn parse_structured(&self, payload: &Value) -> Option<ParsedArchitecture> {
        structured::validate_diagram_with_layout(payload, &self.catalog, self.layout.default_layout)
    }

    /// Routes an assistant reply: an embedded diagram payload goes through the structured
    /// validator, anything else through the text extractor.
    pub fn parse_message(&self, text: &str) -> ParsedMessage {
        if let Some(payload) = extract_diagram_payload(text) {
            if let Some(architecture) = self.parse_structured(&payload) {
                return ParsedMessage {
                    source: ParseSource::Structured,
                    architecture,
                };
            }
            tracing::debug!("embedded JSON is not a diagram payload; falling back to text");
        }
        ParsedMessage {
            source: ParseSource::Text,
            architecture: self.parse_text(text),
        }
    }

    pub fn normalize(&self, arch: &ParsedArchitecture) -> ParsedArchitecture {
        structured::normalize_architecture(arch, &self.catalog)
    }

    /// Combines two partial descriptions. Entities from `previous` come first, so their scalar
    /// fields win; group memberships are unioned.
    pub fn merge(
        &self,
        previous: &ParsedArchitecture,
        incoming: &ParsedArchitecture,
    ) -> ParsedArchitecture {
        let mut bicep_resources = previous.bicep_resources.clone();
        for resource in &incoming.bicep_resources {
            if !bicep_resources.contains(resource) {
                bicep_resources.push(resource.clone());
            }
        }
        let combined = ParsedArchitecture {
            services: [previous.services.as_slice(), incoming.services.as_slice()].concat(),
            connections: [previous.connections.as_slice(), incoming.connections.as_slice()]
                .concat(),
            layout: previous.layout,
            groups: [previous.groups.as_slice(), incoming.groups.as_slice()].concat(),
            bicep_resources,
        };
        self.normalize(&combined)
    }

    pub fn generate_nodes(&self, arch: &ParsedArchitecture) -> Vec<GraphNode> {
        nodes::generate_nodes(arch, &self.layout)
    }

    pub fn build_graph(&self, arch: &ParsedArchitecture) -> Graph {
        nodes::build_graph(arch, &self.layout)
    }

    pub fn extract_iac(&self, text: &str) -> Vec<IacResource> {
        iac::extract_resources(text, &self.catalog, &self.limits)
    }
}

#[cfg(test)]
mod tests;
