//! Semantic model shared by every pipeline stage.
//!
//! All relations between entities are plain id strings resolved through lookup tables, so a
//! cyclic `members`/`parentId` relation is just data, never a cyclic object graph.

use crate::catalog::ServiceDefinition;
use crate::iac::IacResource;
use crate::utils::{normalize_singular, slugify};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Category stamped on services that were not found in the catalog.
pub const STUB_CATEGORY: &str = "AI Detected";
pub const STUB_CATEGORY_ID: &str = "ai-detected";
pub const STUB_ICON_PATH: &str = "icons/general/ai-detected.svg";
const STUB_ID_PREFIX: &str = "ai-";

/// A service instance in a diagram. `id` is the graph-node key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedService {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub category_id: String,
    #[serde(default)]
    pub icon_path: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub group_ids: Vec<String>,
}

impl ResolvedService {
    pub fn from_definition(def: &ServiceDefinition, id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: def.title.clone(),
            category: def.category.clone(),
            category_id: def.category_id.clone(),
            icon_path: def.icon_path.clone(),
            description: def.description.clone(),
            group_ids: Vec::new(),
        }
    }

    /// Placeholder for a name the catalog does not know. The id is derived from the title, so the
    /// same name always yields the same stub.
    pub fn stub(title: &str) -> Self {
        let title = title.trim();
        Self {
            id: stub_id(title),
            title: title.to_string(),
            category: STUB_CATEGORY.to_string(),
            category_id: STUB_CATEGORY_ID.to_string(),
            icon_path: STUB_ICON_PATH.to_string(),
            description: "Detected in assistant output; not found in the service catalog."
                .to_string(),
            group_ids: Vec::new(),
        }
    }

    pub fn is_stub(&self) -> bool {
        self.category_id == STUB_CATEGORY_ID
    }
}

pub fn stub_id(title: &str) -> String {
    format!("{STUB_ID_PREFIX}{}", slugify(title))
}

/// Closed set of container kinds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GroupType {
    Region,
    LandingZone,
    VirtualNetwork,
    Subnet,
    Cluster,
    ResourceGroup,
    NetworkSecurityGroup,
    SecurityBoundary,
    ManagementGroup,
    Subscription,
    PolicyAssignment,
    RoleAssignment,
    #[default]
    Default,
}

// Checked in order: more specific phrases come before the phrases they contain.
const GROUP_TYPE_PHRASES: &[(&str, GroupType)] = &[
    ("network security group", GroupType::NetworkSecurityGroup),
    ("nsg", GroupType::NetworkSecurityGroup),
    ("management group", GroupType::ManagementGroup),
    ("mgmt group", GroupType::ManagementGroup),
    ("landing zone", GroupType::LandingZone),
    ("policy assignment", GroupType::PolicyAssignment),
    ("role assignment", GroupType::RoleAssignment),
    ("resource group", GroupType::ResourceGroup),
    ("rg", GroupType::ResourceGroup),
    ("subnet", GroupType::Subnet),
    ("snet", GroupType::Subnet),
    ("virtual network", GroupType::VirtualNetwork),
    ("vnet", GroupType::VirtualNetwork),
    ("subscription", GroupType::Subscription),
    ("region", GroupType::Region),
    ("cluster", GroupType::Cluster),
    ("security boundary", GroupType::SecurityBoundary),
    ("trust boundary", GroupType::SecurityBoundary),
];

impl GroupType {
    pub const ALL: [GroupType; 13] = [
        GroupType::Region,
        GroupType::LandingZone,
        GroupType::VirtualNetwork,
        GroupType::Subnet,
        GroupType::Cluster,
        GroupType::ResourceGroup,
        GroupType::NetworkSecurityGroup,
        GroupType::SecurityBoundary,
        GroupType::ManagementGroup,
        GroupType::Subscription,
        GroupType::PolicyAssignment,
        GroupType::RoleAssignment,
        GroupType::Default,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            GroupType::Region => "region",
            GroupType::LandingZone => "landingZone",
            GroupType::VirtualNetwork => "virtualNetwork",
            GroupType::Subnet => "subnet",
            GroupType::Cluster => "cluster",
            GroupType::ResourceGroup => "resourceGroup",
            GroupType::NetworkSecurityGroup => "networkSecurityGroup",
            GroupType::SecurityBoundary => "securityBoundary",
            GroupType::ManagementGroup => "managementGroup",
            GroupType::Subscription => "subscription",
            GroupType::PolicyAssignment => "policyAssignment",
            GroupType::RoleAssignment => "roleAssignment",
            GroupType::Default => "default",
        }
    }

    /// Accepts the canonical camelCase names case-insensitively, ignoring separators
    /// (`"virtual_network"`, `"Resource Group"`).
    pub fn parse_loose(raw: &str) -> Option<GroupType> {
        let key: String = raw
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        if key.is_empty() {
            return None;
        }
        GroupType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(&key))
    }

    /// Guesses a kind from a label or id (`"Hub VNet"`, `"Subscriptions"`,
    /// `"general/10011-icon-service-Management-Groups"`).
    pub fn infer(label: &str) -> Option<GroupType> {
        let normalized = normalize_singular(label);
        if normalized.is_empty() {
            return None;
        }
        let padded = format!(" {normalized} ");
        GROUP_TYPE_PHRASES
            .iter()
            .find(|(phrase, _)| padded.contains(&format!(" {phrase} ")))
            .map(|(_, t)| *t)
    }

    /// Kinds that structurally contain workloads. Only these trigger promotion of a service to a
    /// group by naming alone; assignments are usually listed as items.
    pub fn is_structural(self) -> bool {
        !matches!(
            self,
            GroupType::PolicyAssignment | GroupType::RoleAssignment | GroupType::Default
        )
    }
}

impl std::fmt::Display for GroupType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A containment entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedGroup {
    pub id: String,
    pub label: String,
    #[serde(rename = "type", default)]
    pub group_type: GroupType,
    #[serde(default)]
    pub members: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_service_id: Option<String>,
}

impl ParsedGroup {
    pub fn new(id: impl Into<String>, label: impl Into<String>, group_type: GroupType) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            group_type,
            members: Vec::new(),
            parent_id: None,
            metadata: None,
            source_service_id: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Connection {
    pub from: String,
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl Connection {
    pub fn new(from: impl Into<String>, to: impl Into<String>, label: Option<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            label,
        }
    }
}

/// Rendering hint only; nothing in the engine depends on it for correctness.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    #[default]
    Horizontal,
    Vertical,
    Grid,
}

impl Layout {
    pub fn parse_loose(raw: &str) -> Option<Layout> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "horizontal" | "lr" | "row" => Some(Layout::Horizontal),
            "vertical" | "tb" | "td" | "column" => Some(Layout::Vertical),
            "grid" => Some(Layout::Grid),
            _ => None,
        }
    }
}

/// Result of every parse path. Values are rebuilt, never patched in place.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedArchitecture {
    pub services: Vec<ResolvedService>,
    #[serde(default)]
    pub connections: Vec<Connection>,
    #[serde(default)]
    pub layout: Layout,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<ParsedGroup>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bicep_resources: Vec<IacResource>,
}

impl ParsedArchitecture {
    pub fn service(&self, id: &str) -> Option<&ResolvedService> {
        self.services.iter().find(|s| s.id == id)
    }

    pub fn group(&self, id: &str) -> Option<&ParsedGroup> {
        self.groups.iter().find(|g| g.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty() && self.groups.is_empty()
    }

    /// The payload shape accepted by [`crate::structured::validate_diagram`].
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
