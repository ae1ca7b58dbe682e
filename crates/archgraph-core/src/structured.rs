//! Validation and normalization of structured `{services, groups, connections}` payloads.
//!
//! Both entry points funnel into the same normalizer, so feeding a normalized architecture back
//! through [`validate_diagram`] (via [`ParsedArchitecture::to_value`]) or
//! [`normalize_architecture`] is a fixed point.

use crate::catalog::Catalog;
use crate::iac::IacResource;
use crate::model::{
    Connection, GroupType, Layout, ParsedArchitecture, ParsedGroup, ResolvedService,
};
use crate::utils::{slugify, title_from_icon_id};
use indexmap::{IndexMap, IndexSet};
use rustc_hash::{FxHashMap, FxHashSet};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Default)]
struct RawService {
    id: Option<String>,
    title: Option<String>,
    category: Option<String>,
    category_id: Option<String>,
    icon_path: Option<String>,
    description: Option<String>,
    group_ids: Vec<String>,
}

#[derive(Debug, Clone, Default)]
struct RawGroup {
    id: String,
    label: Option<String>,
    group_type: Option<GroupType>,
    members: IndexSet<String>,
    parent_id: Option<String>,
    metadata: Option<Map<String, Value>>,
    source_service_id: Option<String>,
}

#[derive(Debug, Clone)]
struct RawConnection {
    from: String,
    to: String,
    label: Option<String>,
}

#[derive(Debug, Clone, Default)]
struct RawDiagram {
    services: Vec<RawService>,
    groups: Vec<RawGroup>,
    connections: Vec<RawConnection>,
    layout: Layout,
    bicep_resources: Vec<IacResource>,
}

/// Validates a loosely-typed payload. Returns `None` unless `value` is an object with a
/// `services` array; everything inside that shape is repaired rather than rejected.
pub fn validate_diagram(value: &Value, catalog: &Catalog) -> Option<ParsedArchitecture> {
    validate_diagram_with_layout(value, catalog, Layout::default())
}

/// Like [`validate_diagram`], using `fallback` when the payload has no usable `layout`.
pub fn validate_diagram_with_layout(
    value: &Value,
    catalog: &Catalog,
    fallback: Layout,
) -> Option<ParsedArchitecture> {
    let raw = read_diagram(value, fallback)?;
    Some(normalize(raw, catalog))
}

/// Re-applies the normalization rules to a typed architecture.
pub fn normalize_architecture(arch: &ParsedArchitecture, catalog: &Catalog) -> ParsedArchitecture {
    let raw = RawDiagram {
        services: arch
            .services
            .iter()
            .map(|s| RawService {
                id: non_empty(&s.id),
                title: non_empty(&s.title),
                category: non_empty(&s.category),
                category_id: non_empty(&s.category_id),
                icon_path: non_empty(&s.icon_path),
                description: non_empty(&s.description),
                group_ids: s.group_ids.clone(),
            })
            .collect(),
        groups: arch
            .groups
            .iter()
            .map(|g| RawGroup {
                id: g.id.clone(),
                label: non_empty(&g.label),
                group_type: Some(g.group_type),
                members: g.members.iter().cloned().collect(),
                parent_id: g.parent_id.as_deref().and_then(non_empty),
                metadata: g.metadata.clone(),
                source_service_id: g.source_service_id.clone(),
            })
            .collect(),
        connections: arch
            .connections
            .iter()
            .map(|c| RawConnection {
                from: c.from.clone(),
                to: c.to.clone(),
                label: c.label.clone(),
            })
            .collect(),
        layout: arch.layout,
        bicep_resources: arch.bicep_resources.clone(),
    };
    normalize(raw, catalog)
}

fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

fn id_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => non_empty(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn str_field(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|k| obj.get(*k).and_then(Value::as_str).and_then(non_empty))
}

fn id_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items.iter().filter_map(id_value).collect(),
        Some(other) => id_value(other).into_iter().collect(),
        None => Vec::new(),
    }
}

fn read_diagram(value: &Value, fallback: Layout) -> Option<RawDiagram> {
    let obj = value.as_object()?;
    let services = obj.get("services")?.as_array()?;

    let services = services
        .iter()
        .filter_map(|entry| match entry {
            Value::String(title) => Some(RawService {
                title: non_empty(title),
                ..RawService::default()
            }),
            Value::Object(s) => Some(RawService {
                id: s.get("id").and_then(id_value),
                title: str_field(s, &["title", "name", "label"]),
                category: str_field(s, &["category"]),
                category_id: str_field(s, &["categoryId"]),
                icon_path: str_field(s, &["iconPath"]),
                description: str_field(s, &["description"]),
                group_ids: id_list(s.get("groupIds").or_else(|| s.get("groupId"))),
            }),
            _ => None,
        })
        .collect();

    let groups = obj
        .get("groups")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_object)
                .filter_map(|g| {
                    Some(RawGroup {
                        id: g.get("id").and_then(id_value)?,
                        label: str_field(g, &["label", "name", "title"]),
                        group_type: str_field(g, &["type", "groupType"])
                            .and_then(|t| GroupType::parse_loose(&t)),
                        members: id_list(g.get("members")).into_iter().collect(),
                        parent_id: g.get("parentId").and_then(id_value),
                        metadata: g.get("metadata").and_then(Value::as_object).cloned(),
                        source_service_id: g.get("sourceServiceId").and_then(id_value),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    let connections = obj
        .get("connections")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_object)
                .filter_map(|c| {
                    let from = c.get("from").or_else(|| c.get("source")).and_then(id_value)?;
                    let to = c.get("to").or_else(|| c.get("target")).and_then(id_value)?;
                    Some(RawConnection {
                        from,
                        to,
                        label: str_field(c, &["label"]),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    let layout = obj
        .get("layout")
        .and_then(Value::as_str)
        .and_then(Layout::parse_loose)
        .unwrap_or(fallback);

    let bicep_resources = obj
        .get("bicepResources")
        .and_then(|v| serde_json::from_value::<Vec<IacResource>>(v.clone()).ok())
        .unwrap_or_default();

    Some(RawDiagram {
        services,
        groups,
        connections,
        layout,
        bicep_resources,
    })
}

/// A service after resolution and id dedup, before promotion.
struct Candidate {
    service: ResolvedService,
    group_ids: IndexSet<String>,
    container: Option<GroupType>,
}

fn resolve_services(raw: Vec<RawService>, catalog: &Catalog) -> IndexMap<String, Candidate> {
    let mut out: IndexMap<String, Candidate> = IndexMap::new();
    for entry in raw {
        // Untitled entries are resolved (and later titled) by their id, so a second pass over the
        // output sees the same title.
        let title = entry.title.clone().or_else(|| {
            entry
                .id
                .as_deref()
                .map(|id| title_from_icon_id(id).unwrap_or_else(|| id.to_string()))
        });
        let def = catalog.resolve_reference(title.as_deref(), entry.id.as_deref());
        let id = match (&entry.id, def, &title) {
            (Some(id), _, _) => id.clone(),
            (None, Some(def), _) => def.id.clone(),
            (None, None, Some(title)) => slugify(title),
            (None, None, None) => {
                tracing::debug!("service without id or title dropped");
                continue;
            }
        };
        let group_ids = entry.group_ids.iter().filter_map(|g| non_empty(g));

        if let Some(existing) = out.get_mut(&id) {
            existing.group_ids.extend(group_ids);
            continue;
        }

        let mut service = match def {
            Some(def) => ResolvedService::from_definition(def, id.clone()),
            None => {
                let title = title.unwrap_or_else(|| id.clone());
                let mut stub = ResolvedService::stub(&title);
                stub.id = id.clone();
                if entry.category.is_some() {
                    stub.category_id.clear();
                    stub.icon_path.clear();
                    stub.description.clear();
                }
                stub
            }
        };
        if let Some(v) = entry.category {
            service.category = v;
        }
        if let Some(v) = entry.category_id {
            service.category_id = v;
        }
        if let Some(v) = entry.icon_path {
            service.icon_path = v;
        }
        if let Some(v) = entry.description {
            service.description = v;
        }
        if service.category_id.is_empty() {
            service.category_id = slugify(&service.category);
        }

        out.insert(
            id,
            Candidate {
                service,
                group_ids: group_ids.collect(),
                container: def.and_then(|d| d.container),
            },
        );
    }
    out
}

fn merge_groups(raw: Vec<RawGroup>) -> IndexMap<String, RawGroup> {
    let mut out: IndexMap<String, RawGroup> = IndexMap::new();
    for group in raw {
        let id = group.id.trim().to_string();
        if id.is_empty() {
            continue;
        }
        let members = group.members.iter().filter_map(|m| non_empty(m));
        match out.get_mut(&id) {
            Some(existing) => {
                existing.members.extend(members);
                existing.label = existing.label.take().or(group.label);
                existing.group_type = existing
                    .group_type
                    .filter(|t| *t != GroupType::Default)
                    .or(group.group_type);
                existing.parent_id = existing.parent_id.take().or(group.parent_id);
                existing.metadata = existing.metadata.take().or(group.metadata);
                existing.source_service_id =
                    existing.source_service_id.take().or(group.source_service_id);
            }
            None => {
                let members: IndexSet<String> = members.collect();
                out.insert(
                    id.clone(),
                    RawGroup {
                        id,
                        members,
                        ..group
                    },
                );
            }
        }
    }
    out
}

/// Container naming: the catalog's container kind, else a kind inferred from title or id.
fn container_kind(candidate: &Candidate) -> Option<GroupType> {
    candidate
        .container
        .or_else(|| GroupType::infer(&candidate.service.title))
        .or_else(|| GroupType::infer(&candidate.service.id))
}

/// Ids of services that are really containers.
///
/// A service is promoted when another entity uses it as a group (a group's `parentId`, another
/// service's `groupIds`, an explicit group with the same id), or when it sits inside a group and
/// its naming says it is a structural container (subscription, virtual network, subnet, ...).
fn promoted_ids(
    services: &IndexMap<String, Candidate>,
    groups: &IndexMap<String, RawGroup>,
) -> FxHashSet<String> {
    let mut referenced: FxHashSet<&str> = FxHashSet::default();
    for g in groups.values() {
        if let Some(parent) = g.parent_id.as_deref() {
            referenced.insert(parent);
        }
    }
    for (id, c) in services {
        for gid in &c.group_ids {
            if gid != id {
                referenced.insert(gid.as_str());
            }
        }
    }
    let mut listed_as_member: FxHashSet<&str> = FxHashSet::default();
    for g in groups.values() {
        for m in &g.members {
            if *m != g.id {
                listed_as_member.insert(m.as_str());
            }
        }
    }

    let mut out = FxHashSet::default();
    for (id, candidate) in services {
        let is_referenced = groups.contains_key(id) || referenced.contains(id.as_str());
        let belongs = candidate.group_ids.iter().any(|g| g != id)
            || listed_as_member.contains(id.as_str());
        let looks_like_container = container_kind(candidate).is_some_and(GroupType::is_structural);
        if is_referenced || (belongs && looks_like_container) {
            tracing::debug!(service = %id, "service promoted to group");
            out.insert(id.clone());
        }
    }
    out
}

fn normalize(raw: RawDiagram, catalog: &Catalog) -> ParsedArchitecture {
    let candidates = resolve_services(raw.services, catalog);
    let mut table = merge_groups(raw.groups);
    let promoted = promoted_ids(&candidates, &table);

    // Promoted services become (or merge into) groups; every referenced group id gets a group.
    for (id, candidate) in &candidates {
        let own = promoted.contains(id).then_some(id);
        for gid in own.into_iter().chain(candidate.group_ids.iter()) {
            if gid == id && own.is_none() {
                continue;
            }
            if let Some(target) = candidates.get(gid).filter(|_| promoted.contains(gid)) {
                promote_into(&mut table, gid, target);
            } else if !table.contains_key(gid) {
                let label = title_from_icon_id(gid).unwrap_or_else(|| gid.clone());
                tracing::debug!(group = %gid, "group synthesized from service reference");
                table.insert(
                    gid.clone(),
                    RawGroup {
                        id: gid.clone(),
                        label: Some(label),
                        ..RawGroup::default()
                    },
                );
            }
        }
    }

    let service_ids: FxHashSet<&str> = candidates
        .keys()
        .filter(|id| !promoted.contains(*id))
        .map(String::as_str)
        .collect();

    // Dangling and self parents are cleared.
    let known_groups: FxHashSet<String> = table.keys().cloned().collect();
    for (gid, group) in table.iter_mut() {
        let valid = group
            .parent_id
            .as_deref()
            .is_some_and(|p| p != gid && known_groups.contains(p));
        if !valid && group.parent_id.is_some() {
            tracing::debug!(
                group = %gid,
                parent = ?group.parent_id,
                "invalid parent reference cleared"
            );
            group.parent_id = None;
        }
    }

    // Memberships carried by the members themselves: group ids on services (promoted or not) and
    // parent ids on groups.
    let mut appended: FxHashMap<String, Vec<String>> = FxHashMap::default();
    for (id, c) in &candidates {
        for gid in &c.group_ids {
            if gid != id {
                appended.entry(gid.clone()).or_default().push(id.clone());
            }
        }
    }
    for (gid, group) in &table {
        if let Some(parent) = &group.parent_id {
            appended.entry(parent.clone()).or_default().push(gid.clone());
        }
    }

    let exists = |id: &str| service_ids.contains(id) || table.contains_key(id);
    let mut groups: Vec<ParsedGroup> = Vec::with_capacity(table.len());
    for (gid, raw_group) in &table {
        let mut members: IndexSet<&str> = IndexSet::new();
        let extra = appended.get(gid).map(Vec::as_slice).unwrap_or(&[]);
        for m in raw_group.members.iter().chain(extra.iter()) {
            if m == gid {
                continue;
            }
            if !exists(m) {
                tracing::debug!(group = %gid, member = %m, "dangling member dropped");
                continue;
            }
            members.insert(m.as_str());
        }
        let label = raw_group.label.clone().unwrap_or_else(|| gid.clone());
        let group_type = raw_group
            .group_type
            .filter(|t| *t != GroupType::Default)
            .or_else(|| GroupType::infer(&label))
            .or_else(|| GroupType::infer(gid))
            .unwrap_or_default();
        groups.push(ParsedGroup {
            id: gid.clone(),
            label,
            group_type,
            members: members.into_iter().map(str::to_string).collect(),
            parent_id: raw_group.parent_id.clone(),
            metadata: raw_group.metadata.clone(),
            source_service_id: raw_group.source_service_id.clone(),
        });
    }

    // A service's groups: its own valid references, then every group that lists it.
    let mut member_of: FxHashMap<&str, Vec<&str>> = FxHashMap::default();
    for g in &groups {
        for m in &g.members {
            member_of.entry(m.as_str()).or_default().push(g.id.as_str());
        }
    }
    let services: Vec<ResolvedService> = candidates
        .iter()
        .filter(|(id, _)| !promoted.contains(*id))
        .map(|(id, c)| {
            let mut group_ids: IndexSet<&str> = c
                .group_ids
                .iter()
                .map(String::as_str)
                .filter(|g| table.contains_key(*g))
                .collect();
            group_ids.extend(member_of.get(id.as_str()).into_iter().flatten().copied());
            ResolvedService {
                group_ids: group_ids.into_iter().map(str::to_string).collect(),
                ..c.service.clone()
            }
        })
        .collect();

    let mut seen_pairs: FxHashSet<(String, String)> = FxHashSet::default();
    let mut connections: Vec<Connection> = Vec::new();
    for c in raw.connections {
        let (from, to) = (c.from.trim().to_string(), c.to.trim().to_string());
        if from == to {
            tracing::debug!(id = %from, "self-loop connection dropped");
            continue;
        }
        if !exists(&from) || !exists(&to) {
            tracing::debug!(from = %from, to = %to, "connection with a missing endpoint dropped");
            continue;
        }
        if !seen_pairs.insert((from.clone(), to.clone())) {
            continue;
        }
        let label = c.label.as_deref().and_then(non_empty);
        connections.push(Connection::new(from, to, label));
    }

    ParsedArchitecture {
        services,
        connections,
        layout: raw.layout,
        groups,
        bicep_resources: raw.bicep_resources,
    }
}

/// Creates the group for a promoted service, or marks the explicit group of the same id.
fn promote_into(table: &mut IndexMap<String, RawGroup>, id: &str, candidate: &Candidate) {
    let service = &candidate.service;
    let parent = candidate.group_ids.iter().find(|g| *g != id).cloned();
    match table.get_mut(id) {
        Some(group) => {
            if group.source_service_id.is_none() {
                group.source_service_id = Some(service.id.clone());
            }
            if group.label.is_none() {
                group.label = Some(service.title.clone());
            }
            if group.group_type.is_none_or(|t| t == GroupType::Default) {
                group.group_type = container_kind(candidate);
            }
            if group.parent_id.is_none() {
                group.parent_id = parent;
            }
        }
        None => {
            table.insert(
                id.to_string(),
                RawGroup {
                    id: id.to_string(),
                    label: Some(service.title.clone()),
                    group_type: container_kind(candidate),
                    members: IndexSet::new(),
                    parent_id: parent,
                    metadata: None,
                    source_service_id: Some(service.id.clone()),
                },
            );
        }
    }
}
