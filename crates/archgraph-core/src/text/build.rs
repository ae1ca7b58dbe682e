use super::{EntityRef, TextExtraction, extract, synthesize_connections};
use crate::catalog::Catalog;
use crate::config::Limits;
use crate::iac;
use crate::model::{Connection, Layout, ParsedArchitecture, ResolvedService};
use crate::structured;
use indexmap::IndexMap;
use rustc_hash::FxHashSet;

/// Builds an architecture from a free-text reply.
///
/// Services are ordered by where they first appear in the text. Unresolved arrow endpoints become
/// stub services; template connections are added only between services found in the text.
pub fn architecture_from_text(
    text: &str,
    catalog: &Catalog,
    limits: &Limits,
    layout: Layout,
) -> ParsedArchitecture {
    let extraction = extract(text, catalog, limits);
    let mut arch = from_extraction(&extraction, catalog, limits);
    arch.layout = layout;
    arch.bicep_resources = iac::extract_resources(text, catalog, limits);
    structured::normalize_architecture(&arch, catalog)
}

fn service_for(entity: &EntityRef, catalog: &Catalog) -> ResolvedService {
    match entity.definition_id.as_deref().and_then(|id| catalog.get(id)) {
        Some(def) => ResolvedService::from_definition(def, def.id.clone()),
        None => ResolvedService::stub(&entity.title),
    }
}

fn from_extraction(
    extraction: &TextExtraction,
    catalog: &Catalog,
    limits: &Limits,
) -> ParsedArchitecture {
    let mut found: Vec<(usize, ResolvedService)> = Vec::new();
    for m in &extraction.mentions {
        if let Some(def) = catalog.get(&m.definition_id) {
            found.push((m.offset, ResolvedService::from_definition(def, def.id.clone())));
        }
    }
    for token in &extraction.resource_types {
        if let Some(def) = token.definition_id.as_deref().and_then(|id| catalog.get(id)) {
            found.push((token.offset, ResolvedService::from_definition(def, def.id.clone())));
        }
    }

    let mut connections: Vec<Connection> = Vec::new();
    let mut seen_pairs: FxHashSet<(String, String)> = FxHashSet::default();
    for candidate in &extraction.connections {
        let from = service_for(&candidate.from, catalog);
        let to = service_for(&candidate.to, catalog);
        if from.id != to.id && seen_pairs.insert((from.id.clone(), to.id.clone())) {
            connections.push(Connection::new(
                from.id.clone(),
                to.id.clone(),
                candidate.label.clone(),
            ));
        }
        found.push((candidate.offset, from));
        found.push((candidate.offset, to));
    }

    found.sort_by_key(|(offset, _)| *offset);
    let mut by_id: IndexMap<String, ResolvedService> = IndexMap::new();
    for (_, service) in found {
        by_id.entry(service.id.clone()).or_insert(service);
    }
    let services: Vec<ResolvedService> = by_id.into_values().collect();

    if limits.relationship_templates {
        let extra = synthesize_connections(
            &services,
            &connections,
            catalog.relationships(),
            limits.max_matches,
        );
        connections.extend(extra);
    }

    ParsedArchitecture {
        services,
        connections,
        ..ParsedArchitecture::default()
    }
}
