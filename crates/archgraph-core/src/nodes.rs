//! Flat node/edge output for the rendering side.

use crate::config::LayoutSettings;
use crate::hierarchy::Hierarchy;
use crate::model::{GroupType, Layout, ParsedArchitecture};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Service,
    Group,
}

/// Position relative to the parent group (or the canvas for top-level nodes).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeData {
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_type: Option<GroupType>,
    pub is_stub: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_service_id: Option<String>,
    pub depth: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphNode {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    pub position: Position,
    pub data: NodeData,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Graph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}

/// One node per group (in hierarchy order) followed by one node per service.
///
/// Every id is emitted exactly once: a service that shares its id with a group is represented by
/// the group, and repeated service ids keep their first entry.
pub fn generate_nodes(arch: &ParsedArchitecture, layout: &LayoutSettings) -> Vec<GraphNode> {
    let hierarchy = Hierarchy::resolve(arch);
    let mut groups_by_id = FxHashMap::default();
    for g in &arch.groups {
        groups_by_id.entry(g.id.as_str()).or_insert(g);
    }

    let mut nodes: Vec<GraphNode> = Vec::with_capacity(hierarchy.len() + arch.services.len());
    let mut emitted: FxHashSet<&str> = FxHashSet::default();

    for gid in hierarchy.order() {
        let Some(group) = groups_by_id.get(gid) else {
            continue;
        };
        emitted.insert(gid);
        nodes.push(GraphNode {
            id: gid.to_string(),
            kind: NodeKind::Group,
            parent_id: hierarchy.parent_of(gid).map(str::to_string),
            position: Position::default(),
            data: NodeData {
                label: group.label.clone(),
                category: None,
                category_id: None,
                icon_path: None,
                description: None,
                group_type: Some(group.group_type),
                is_stub: false,
                source_service_id: group.source_service_id.clone(),
                depth: hierarchy.depth_of(gid).unwrap_or(0),
            },
        });
    }

    for service in &arch.services {
        if !emitted.insert(service.id.as_str()) {
            continue;
        }
        let parent = hierarchy.service_parent(&service.id);
        nodes.push(GraphNode {
            id: service.id.clone(),
            kind: NodeKind::Service,
            parent_id: parent.map(str::to_string),
            position: Position::default(),
            data: NodeData {
                label: service.title.clone(),
                category: non_empty(&service.category),
                category_id: non_empty(&service.category_id),
                icon_path: non_empty(&service.icon_path),
                description: non_empty(&service.description),
                group_type: None,
                is_stub: service.is_stub(),
                source_service_id: None,
                depth: parent
                    .and_then(|p| hierarchy.depth_of(p))
                    .map_or(0, |d| d + 1),
            },
        });
    }

    assign_positions(&mut nodes, arch.layout, layout);
    nodes
}

/// Lays siblings out in a row, a column or a square-ish grid inside their parent.
fn assign_positions(nodes: &mut [GraphNode], hint: Layout, settings: &LayoutSettings) {
    let mut counts: FxHashMap<Option<String>, usize> = FxHashMap::default();
    for node in nodes.iter() {
        *counts.entry(node.parent_id.clone()).or_default() += 1;
    }

    let mut next: FxHashMap<Option<String>, usize> = FxHashMap::default();
    for node in nodes.iter_mut() {
        let slot = next.entry(node.parent_id.clone()).or_default();
        let i = *slot;
        *slot += 1;
        let siblings = counts.get(&node.parent_id).copied().unwrap_or(1);

        let (col, row) = match hint {
            Layout::Horizontal => (i, 0),
            Layout::Vertical => (0, i),
            Layout::Grid => {
                let cols = (siblings as f64).sqrt().ceil().max(1.0) as usize;
                (i % cols, i / cols)
            }
        };
        let padding = if node.parent_id.is_some() {
            settings.group_padding
        } else {
            0.0
        };
        node.position = Position {
            x: padding + col as f64 * settings.spacing_x,
            y: padding + row as f64 * settings.spacing_y,
        };
    }
}

/// Nodes plus the connections whose endpoints both exist as nodes.
pub fn build_graph(arch: &ParsedArchitecture, layout: &LayoutSettings) -> Graph {
    let nodes = generate_nodes(arch, layout);
    let ids: FxHashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();

    let mut edge_ids: FxHashSet<String> = FxHashSet::default();
    let mut edges: Vec<GraphEdge> = Vec::new();
    for c in &arch.connections {
        if c.from == c.to || !ids.contains(c.from.as_str()) || !ids.contains(c.to.as_str()) {
            continue;
        }
        let base = format!("edge-{}-{}", c.from, c.to);
        let mut id = base.clone();
        let mut n = 1usize;
        while edge_ids.contains(&id) {
            n += 1;
            id = format!("{base}-{n}");
        }
        edge_ids.insert(id.clone());
        edges.push(GraphEdge {
            id,
            source: c.from.clone(),
            target: c.to.clone(),
            label: c.label.clone(),
        });
    }

    Graph { nodes, edges }
}
