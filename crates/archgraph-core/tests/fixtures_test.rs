use archgraph_core::{Engine, Hierarchy, ParseSource, ParsedArchitecture};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

fn fixtures_dir() -> PathBuf {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    manifest_dir
        .parent()
        .and_then(|p| p.parent())
        .expect("expected crates/<name> layout")
        .join("fixtures")
}

fn fixtures_with_ext(ext: &str) -> Vec<PathBuf> {
    let mut out: Vec<PathBuf> = fs::read_dir(fixtures_dir())
        .expect("fixtures dir")
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|e| e == ext))
        .collect();
    out.sort();
    out
}

fn read(name: &str) -> String {
    fs::read_to_string(fixtures_dir().join(name)).expect("read fixture")
}

/// Structural guarantees every normalized architecture must hold.
fn assert_well_formed(arch: &ParsedArchitecture, context: &str) {
    let engine = Engine::new();

    let service_ids: HashSet<&str> = arch.services.iter().map(|s| s.id.as_str()).collect();
    let group_ids: HashSet<&str> = arch.groups.iter().map(|g| g.id.as_str()).collect();
    assert_eq!(service_ids.len(), arch.services.len(), "{context}: duplicate service id");
    assert_eq!(group_ids.len(), arch.groups.len(), "{context}: duplicate group id");
    assert!(service_ids.is_disjoint(&group_ids), "{context}: id is both service and group");

    for s in &arch.services {
        for g in &s.group_ids {
            assert!(group_ids.contains(g.as_str()), "{context}: {} -> unknown group {g}", s.id);
        }
    }
    for g in &arch.groups {
        for m in &g.members {
            assert_ne!(m, &g.id, "{context}: group {} contains itself", g.id);
            assert!(
                service_ids.contains(m.as_str()) || group_ids.contains(m.as_str()),
                "{context}: group {} has dangling member {m}",
                g.id
            );
        }
        if let Some(p) = &g.parent_id {
            assert!(group_ids.contains(p.as_str()) && p != &g.id, "{context}: bad parent {p}");
        }
    }

    let mut pairs = HashSet::new();
    for c in &arch.connections {
        assert_ne!(c.from, c.to, "{context}: self-loop");
        let exists = |id: &str| service_ids.contains(id) || group_ids.contains(id);
        assert!(exists(&c.from) && exists(&c.to), "{context}: dangling connection");
        assert!(pairs.insert((&c.from, &c.to)), "{context}: duplicate connection");
    }

    let hierarchy = Hierarchy::resolve(arch);
    assert_eq!(hierarchy.order().count(), arch.groups.len(), "{context}: hierarchy order");

    let nodes = engine.generate_nodes(arch);
    let node_ids: HashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(node_ids.len(), nodes.len(), "{context}: node emitted twice");
    assert_eq!(nodes.len(), arch.services.len() + arch.groups.len(), "{context}: node count");

    assert_eq!(&engine.normalize(arch), arch, "{context}: normalize is not a fixed point");
    assert_eq!(
        engine.parse_structured(&arch.to_value()).as_ref(),
        Some(arch),
        "{context}: structured round trip is not a fixed point"
    );
}

#[test]
fn structured_fixtures_normalize_to_well_formed_fixed_points() {
    let engine = Engine::new();
    let files = fixtures_with_ext("json");
    assert!(!files.is_empty());
    for path in files {
        let text = fs::read_to_string(&path).expect("read fixture");
        let payload: serde_json::Value = serde_json::from_str(&text).expect("fixture JSON");
        let arch = engine
            .parse_structured(&payload)
            .unwrap_or_else(|| panic!("{} is not a diagram", path.display()));
        assert_well_formed(&arch, &path.display().to_string());
    }
}

#[test]
fn message_fixtures_are_well_formed() {
    let engine = Engine::new();
    for path in fixtures_with_ext("md") {
        let text = fs::read_to_string(&path).expect("read fixture");
        let parsed = engine.parse_message(&text);
        assert!(!parsed.architecture.is_empty(), "{}", path.display());
        assert_well_formed(&parsed.architecture, &path.display().to_string());
    }
}

#[test]
fn diagram_section_with_trailing_commas_is_structured() {
    let parsed = Engine::new().parse_message(&read("message_with_diagram.md"));
    assert_eq!(parsed.source, ParseSource::Structured);
    let arch = parsed.architecture;
    let ids: Vec<&str> = arch.services.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["afd", "web", "db", "kv"]);
    assert_eq!(arch.services[0].title, "Front Door and CDN Profiles");
    assert_eq!(arch.group("rg-web").unwrap().members, vec!["web", "db", "kv"]);
    assert_eq!(arch.connections.len(), 3);
}

#[test]
fn free_text_fixture_finds_arrows_verbs_and_stubs() {
    let parsed = Engine::new().parse_message(&read("free_text.md"));
    assert_eq!(parsed.source, ParseSource::Text);
    let arch = parsed.architecture;

    let ids: HashSet<&str> = arch.services.iter().map(|s| s.id.as_str()).collect();
    for expected in [
        "front-door",
        "app-services",
        "service-bus",
        "function-apps",
        "ai-legacy-crm",
        "sql-database",
        "cache-redis",
        "key-vaults",
        "application-insights",
    ] {
        assert!(ids.contains(expected), "missing {expected}");
    }

    let has = |from: &str, to: &str, label: Option<&str>| {
        arch.connections
            .iter()
            .any(|c| c.from == from && c.to == to && c.label.as_deref() == label)
    };
    assert!(has("front-door", "app-services", None));
    assert!(has("app-services", "service-bus", Some("enqueue")));
    assert!(has("service-bus", "function-apps", None));
    assert!(has("ai-legacy-crm", "function-apps", None));
    assert!(has("function-apps", "sql-database", Some("stores data in")));
    assert!(has("app-services", "cache-redis", Some("connects to")));
    assert!(has("app-services", "key-vaults", Some("uses")));
    assert!(has("app-services", "application-insights", Some("telemetry")));
}

#[test]
fn bicep_fixture_extracts_every_resource() {
    let engine = Engine::new();
    let text = read("bicep_braces.bicep");

    let resources = engine.extract_iac(&text);
    let names: Vec<&str> = resources.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["plan", "web", "kv"]);
    for r in &resources {
        assert!(r.body.starts_with('{') && r.body.ends_with('}'), "{}", r.name);
        assert!(!r.body.contains("resource "), "{} swallowed the next block", r.name);
    }
    assert_eq!(resources[1].properties, vec!["name", "location", "properties", "dependsOn"]);

    let arch = engine.parse_text(&text);
    assert_eq!(arch.bicep_resources.len(), 3);
    assert!(
        arch.connections
            .iter()
            .any(|c| c.from == "app-services"
                && c.to == "app-service-plans"
                && c.label.as_deref() == Some("depends on"))
    );
    assert_well_formed(&arch, "bicep_braces.bicep");
}
