use crate::model::{Connection, ResolvedService};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

/// A heuristic "X usually talks to Y" rule over catalog titles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipTemplate {
    #[serde(default)]
    pub description: String,
    pub label: String,
    pub from: Vec<String>,
    pub to: Vec<String>,
}

impl RelationshipTemplate {
    fn matches_from(&self, service: &ResolvedService) -> bool {
        !service.is_stub() && self.from.iter().any(|t| t.eq_ignore_ascii_case(&service.title))
    }

    fn matches_to(&self, service: &ResolvedService) -> bool {
        !service.is_stub() && self.to.iter().any(|t| t.eq_ignore_ascii_case(&service.title))
    }
}

/// Connections implied by `templates` between services that are all present in `services` and
/// not yet connected in either direction. At most `max` connections are returned.
pub fn synthesize_connections(
    services: &[ResolvedService],
    existing: &[Connection],
    templates: &[RelationshipTemplate],
    max: usize,
) -> Vec<Connection> {
    let mut linked: FxHashSet<(&str, &str)> = FxHashSet::default();
    for c in existing {
        linked.insert((c.from.as_str(), c.to.as_str()));
        linked.insert((c.to.as_str(), c.from.as_str()));
    }

    let mut out: Vec<Connection> = Vec::new();
    for template in templates {
        for source in services.iter().filter(|s| template.matches_from(s)) {
            for target in services.iter().filter(|s| template.matches_to(s)) {
                if source.id == target.id
                    || linked.contains(&(source.id.as_str(), target.id.as_str()))
                {
                    continue;
                }
                if out.len() >= max {
                    tracing::warn!(max, "relationship template enrichment truncated");
                    return out;
                }
                linked.insert((source.id.as_str(), target.id.as_str()));
                linked.insert((target.id.as_str(), source.id.as_str()));
                tracing::trace!(
                    from = %source.id,
                    to = %target.id,
                    label = %template.label,
                    "template connection"
                );
                out.push(Connection::new(
                    source.id.clone(),
                    target.id.clone(),
                    Some(template.label.clone()),
                ));
            }
        }
    }
    out
}
