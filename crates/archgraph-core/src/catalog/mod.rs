//! Service catalog: canonical definitions, the alias table and the relationship templates.
//!
//! A [`Catalog`] is built once from [`CatalogData`] and never mutated afterwards. Extending it
//! produces a new catalog.

mod resolver;

pub use resolver::{MatchKind, Resolution};

use crate::model::GroupType;
use crate::text::RelationshipTemplate;
use crate::utils::normalize_phrase;
use crate::{Error, Result};
use indexmap::IndexMap;
use regex::Regex;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, OnceLock};

/// Immutable catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceDefinition {
    pub id: String,
    pub category: String,
    pub category_id: String,
    pub title: String,
    /// Short canonical name (`"App Service"` for the `"App Services"` icon).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_name: Option<String>,
    #[serde(default)]
    pub icon_path: String,
    #[serde(default)]
    pub description: String,
    /// Set for definitions that model a container (subscriptions, virtual networks, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container: Option<GroupType>,
}

impl ServiceDefinition {
    pub fn canonical_name(&self) -> &str {
        self.service_name.as_deref().unwrap_or(&self.title)
    }
}

/// Serialized catalog tables. Every field may be omitted, which makes partial overlay files easy
/// to write.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogData {
    #[serde(default)]
    pub services: Vec<ServiceDefinition>,
    /// Phrase or provider resource type -> canonical catalog title.
    #[serde(default)]
    pub aliases: IndexMap<String, String>,
    #[serde(default)]
    pub relationships: Vec<RelationshipTemplate>,
}

impl CatalogData {
    pub fn from_json_str(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| Error::InvalidCatalogJson {
            message: e.to_string(),
        })
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        serde_yaml::from_str(text).map_err(|e| Error::InvalidCatalogYaml {
            message: e.to_string(),
        })
    }
}

#[derive(Debug)]
pub struct Catalog {
    definitions: Vec<ServiceDefinition>,
    by_id: FxHashMap<String, usize>,
    by_title: FxHashMap<String, usize>,
    aliases: IndexMap<String, usize>,
    // Normalized needles for the containment fallback, longest first.
    containment: Vec<(String, usize)>,
    relationships: Vec<RelationshipTemplate>,
    mention_re: OnceLock<Option<Regex>>,
}

impl Catalog {
    /// The embedded default catalog.
    pub fn builtin() -> &'static Catalog {
        crate::data::builtin_catalog()
    }

    /// Shared handle to the embedded catalog; cheap to clone into each engine.
    pub fn builtin_shared() -> Arc<Catalog> {
        Arc::clone(crate::data::builtin_catalog())
    }

    /// Builds a catalog, rejecting duplicate ids and aliases that point at unknown titles.
    pub fn from_data(data: CatalogData, source_name: &str) -> Result<Self> {
        let invalid = |message: String| Error::InvalidCatalog {
            source_name: source_name.to_string(),
            message,
        };

        let mut by_id: FxHashMap<String, usize> = FxHashMap::default();
        let mut by_title: FxHashMap<String, usize> = FxHashMap::default();
        for (idx, def) in data.services.iter().enumerate() {
            if def.id.trim().is_empty() || def.title.trim().is_empty() {
                return Err(invalid(format!("service #{idx} has an empty id or title")));
            }
            if by_id.insert(def.id.clone(), idx).is_some() {
                return Err(invalid(format!("duplicate service id [{}]", def.id)));
            }
            by_title.entry(lookup_key(&def.title)).or_insert(idx);
        }

        let mut aliases: IndexMap<String, usize> = IndexMap::new();
        for (alias, title) in &data.aliases {
            let key = lookup_key(alias);
            if key.is_empty() {
                continue;
            }
            let Some(&idx) = by_title.get(&lookup_key(title)) else {
                return Err(invalid(format!(
                    "alias [{alias}] points at unknown catalog title [{title}]"
                )));
            };
            aliases.insert(key, idx);
        }

        let mut containment: Vec<(String, usize)> = Vec::new();
        for (key, &idx) in &aliases {
            containment.push((normalize_phrase(key), idx));
        }
        for (idx, def) in data.services.iter().enumerate() {
            containment.push((normalize_phrase(&def.title), idx));
            if let Some(name) = &def.service_name {
                containment.push((normalize_phrase(name), idx));
            }
        }
        containment.retain(|(needle, _)| needle.len() >= 2);
        // Stable: equal lengths keep alias-table order ahead of titles.
        containment.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        let mut seen = rustc_hash::FxHashSet::default();
        containment.retain(|(needle, _)| seen.insert(needle.clone()));

        for template in &data.relationships {
            for title in template.from.iter().chain(template.to.iter()) {
                if !by_title.contains_key(&lookup_key(title)) {
                    return Err(invalid(format!(
                        "relationship template [{}] references unknown title [{title}]",
                        template.label
                    )));
                }
            }
        }

        Ok(Self {
            definitions: data.services,
            by_id,
            by_title,
            aliases,
            containment,
            relationships: data.relationships,
            mention_re: OnceLock::new(),
        })
    }

    /// Returns a new catalog with `overlay` applied: definitions with a known id replace the old
    /// entry, aliases are added or re-pointed, relationship templates are appended.
    pub fn extend(&self, overlay: CatalogData, source_name: &str) -> Result<Catalog> {
        let mut data = self.to_data();
        for def in overlay.services {
            match data.services.iter_mut().find(|d| d.id == def.id) {
                Some(slot) => *slot = def,
                None => data.services.push(def),
            }
        }
        for (alias, title) in overlay.aliases {
            data.aliases.insert(alias, title);
        }
        data.relationships.extend(overlay.relationships);
        Catalog::from_data(data, source_name)
    }

    /// Round-trips the catalog back into its serialized tables.
    pub fn to_data(&self) -> CatalogData {
        CatalogData {
            services: self.definitions.clone(),
            aliases: self
                .aliases
                .iter()
                .map(|(alias, &idx)| (alias.clone(), self.definitions[idx].title.clone()))
                .collect(),
            relationships: self.relationships.clone(),
        }
    }

    pub fn definitions(&self) -> &[ServiceDefinition] {
        &self.definitions
    }

    pub fn relationships(&self) -> &[RelationshipTemplate] {
        &self.relationships
    }

    pub fn get(&self, id: &str) -> Option<&ServiceDefinition> {
        self.by_id.get(id).map(|&idx| &self.definitions[idx])
    }

    pub fn by_title(&self, title: &str) -> Option<&ServiceDefinition> {
        self.by_title
            .get(&lookup_key(title))
            .map(|&idx| &self.definitions[idx])
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

/// Exact-match key: trimmed and lowercased.
fn lookup_key(raw: &str) -> String {
    raw.trim().to_lowercase()
}
