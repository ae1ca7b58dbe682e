use crate::model::Layout;
use crate::{Error, Result};
use serde_json::{Map, Value};

/// Engine configuration: a JSON object addressed with dotted paths (`extract.maxMatches`).
#[derive(Debug, Clone, PartialEq)]
pub struct ArchConfig(Value);

impl Default for ArchConfig {
    fn default() -> Self {
        Self::empty_object()
    }
}

impl ArchConfig {
    pub fn empty_object() -> Self {
        Self(Value::Object(Map::new()))
    }

    pub fn from_value(value: Value) -> Self {
        Self(value)
    }

    /// Parses a JSON config document. The root must be an object.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text).map_err(|e| Error::InvalidConfigJson {
            message: e.to_string(),
        })?;
        Self::from_object(value)
    }

    /// Parses a YAML config document. The root must be a mapping.
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let raw: serde_yaml::Value =
            serde_yaml::from_str(text).map_err(|e| Error::InvalidConfigYaml {
                message: e.to_string(),
            })?;
        let value = serde_json::to_value(raw).map_err(|e| Error::InvalidConfigYaml {
            message: e.to_string(),
        })?;
        Self::from_object(value)
    }

    fn from_object(value: Value) -> Result<Self> {
        if !value.is_object() {
            return Err(Error::ConfigNotAnObject {
                found: json_kind(&value).to_string(),
            });
        }
        Ok(Self(value))
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    fn get(&self, dotted_path: &str) -> Option<&Value> {
        let mut cur = &self.0;
        for segment in dotted_path.split('.') {
            cur = cur.as_object()?.get(segment)?;
        }
        Some(cur)
    }

    pub fn get_str(&self, dotted_path: &str) -> Option<&str> {
        self.get(dotted_path)?.as_str()
    }

    pub fn get_bool(&self, dotted_path: &str) -> Option<bool> {
        self.get(dotted_path)?.as_bool()
    }

    pub fn get_u64(&self, dotted_path: &str) -> Option<u64> {
        self.get(dotted_path)?.as_u64()
    }

    pub fn get_f64(&self, dotted_path: &str) -> Option<f64> {
        self.get(dotted_path)?.as_f64()
    }

    pub fn set_value(&mut self, dotted_path: &str, value: Value) {
        // `from_value` accepts any JSON value; coerce to an object so this never panics.
        if !self.0.is_object() {
            self.0 = Value::Object(Map::new());
        }

        let Value::Object(ref mut root) = self.0 else {
            return;
        };
        let mut cur: &mut Map<String, Value> = root;
        let mut segments = dotted_path.split('.').peekable();
        while let Some(seg) = segments.next() {
            if segments.peek().is_none() {
                cur.insert(seg.to_string(), value);
                return;
            }
            let slot = cur.entry(seg).or_insert_with(|| Value::Object(Map::new()));
            if !slot.is_object() {
                *slot = Value::Object(Map::new());
            }
            let Some(next) = slot.as_object_mut() else {
                return;
            };
            cur = next;
        }
    }

    pub fn deep_merge(&mut self, other: &Value) {
        deep_merge_value(&mut self.0, other);
    }

    /// Typed view of the `extract.*` keys.
    pub fn limits(&self) -> Limits {
        let defaults = Limits::default();
        Limits {
            max_matches: self
                .get_u64("extract.maxMatches")
                .map(clamp_usize)
                .unwrap_or(defaults.max_matches),
            max_phrase_words: self
                .get_u64("extract.maxPhraseWords")
                .map(clamp_usize)
                .filter(|n| *n > 0)
                .unwrap_or(defaults.max_phrase_words),
            max_dependency_list_bytes: self
                .get_u64("extract.maxDependencyListBytes")
                .map(clamp_usize)
                .unwrap_or(defaults.max_dependency_list_bytes),
            max_resources: self
                .get_u64("extract.maxResources")
                .map(clamp_usize)
                .unwrap_or(defaults.max_resources),
            relationship_templates: self
                .get_bool("extract.relationshipTemplates")
                .unwrap_or(defaults.relationship_templates),
            stub_arrow_endpoints: self
                .get_bool("extract.stubArrowEndpoints")
                .unwrap_or(defaults.stub_arrow_endpoints),
        }
    }

    /// Typed view of the `layout.*` keys.
    pub fn layout(&self) -> LayoutSettings {
        let defaults = LayoutSettings::default();
        let positive = |v: f64| v.is_finite() && v > 0.0;
        LayoutSettings {
            spacing_x: self
                .get_f64("layout.spacingX")
                .filter(|v| positive(*v))
                .unwrap_or(defaults.spacing_x),
            spacing_y: self
                .get_f64("layout.spacingY")
                .filter(|v| positive(*v))
                .unwrap_or(defaults.spacing_y),
            group_padding: self
                .get_f64("layout.groupPadding")
                .filter(|v| v.is_finite() && *v >= 0.0)
                .unwrap_or(defaults.group_padding),
            default_layout: self
                .get_str("layout.default")
                .and_then(Layout::parse_loose)
                .unwrap_or(defaults.default_layout),
        }
    }
}

/// Bounds applied by the text extractor. Every pattern family stops after `max_matches`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub max_matches: usize,
    pub max_phrase_words: usize,
    pub max_dependency_list_bytes: usize,
    /// Cap on IaC resource declarations read from one input.
    pub max_resources: usize,
    pub relationship_templates: bool,
    pub stub_arrow_endpoints: bool,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_matches: 256,
            max_phrase_words: 6,
            max_dependency_list_bytes: 2048,
            max_resources: 4096,
            relationship_templates: true,
            stub_arrow_endpoints: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutSettings {
    pub spacing_x: f64,
    pub spacing_y: f64,
    pub group_padding: f64,
    pub default_layout: Layout,
}

impl Default for LayoutSettings {
    fn default() -> Self {
        Self {
            spacing_x: 240.0,
            spacing_y: 160.0,
            group_padding: 40.0,
            default_layout: Layout::Horizontal,
        }
    }
}

fn clamp_usize(v: u64) -> usize {
    usize::try_from(v).unwrap_or(usize::MAX)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn deep_merge_value(base: &mut Value, incoming: &Value) {
    match (base, incoming) {
        (Value::Object(base_map), Value::Object(in_map)) => {
            for (key, in_value) in in_map {
                match base_map.get_mut(key) {
                    Some(base_value) => deep_merge_value(base_value, in_value),
                    None => {
                        base_map.insert(key.clone(), in_value.clone());
                    }
                }
            }
        }
        (base_slot, in_value) => {
            *base_slot = in_value.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn limits_fall_back_to_defaults_for_missing_or_invalid_keys() {
        let cfg = ArchConfig::from_value(json!({
            "extract": { "maxMatches": 12, "maxPhraseWords": 0 }
        }));
        let limits = cfg.limits();
        assert_eq!(limits.max_matches, 12);
        assert_eq!(limits.max_phrase_words, Limits::default().max_phrase_words);
        assert_eq!(limits.max_resources, 4096);
        assert!(limits.relationship_templates);
    }

    #[test]
    fn deep_merge_overrides_nested_keys_only() {
        let mut cfg = ArchConfig::from_value(json!({
            "layout": { "spacingX": 100, "spacingY": 50 }
        }));
        cfg.deep_merge(&json!({ "layout": { "spacingX": 300 } }));
        let layout = cfg.layout();
        assert_eq!(layout.spacing_x, 300.0);
        assert_eq!(layout.spacing_y, 50.0);
    }

    #[test]
    fn set_value_coerces_non_object_roots() {
        let mut cfg = ArchConfig::from_value(json!(42));
        cfg.set_value("layout.default", json!("grid"));
        assert_eq!(cfg.layout().default_layout, Layout::Grid);
    }

    #[test]
    fn yaml_config_must_be_a_mapping() {
        let err = ArchConfig::from_yaml_str("- a\n- b\n").unwrap_err();
        assert!(matches!(err, Error::ConfigNotAnObject { .. }));

        let cfg = ArchConfig::from_yaml_str("extract:\n  maxMatches: 7\n").unwrap();
        assert_eq!(cfg.limits().max_matches, 7);
    }
}
