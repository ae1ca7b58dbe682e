use crate::*;
use serde_json::json;
use std::sync::Arc;

#[test]
fn messages_with_a_diagram_payload_use_the_structured_path() {
    let reply = "Here is the design.\n\n## Diagram JSON\n```json\n{\n  \"services\": [\n    { \"id\": \"web\", \"title\": \"App Service\" },\n    { \"id\": \"db\", \"title\": \"Cosmos DB\" }\n  ],\n  \"connections\": [{ \"from\": \"web\", \"to\": \"db\", \"label\": \"reads\" }]\n}\n```\n";
    let parsed = Engine::new().parse_message(reply);
    assert_eq!(parsed.source, ParseSource::Structured);
    let ids: Vec<&str> = parsed
        .architecture
        .services
        .iter()
        .map(|s| s.id.as_str())
        .collect();
    assert_eq!(ids, vec!["web", "db"]);
    assert_eq!(
        parsed.architecture.connections,
        vec![Connection::new("web", "db", Some("reads".to_string()))]
    );
}

#[test]
fn messages_without_a_diagram_fall_back_to_text() {
    let engine = Engine::new();

    let parsed = engine.parse_message("App Service talks to Cosmos DB");
    assert_eq!(parsed.source, ParseSource::Text);
    assert_eq!(parsed.architecture.services.len(), 2);

    // JSON that is not a diagram does not short-circuit the text path.
    let parsed = engine.parse_message("Set `{\"sku\": \"P1v3\"}` on the App Service plan.");
    assert_eq!(parsed.source, ParseSource::Text);
    assert_eq!(parsed.architecture.services[0].id, "app-service-plans");
}

#[test]
fn parsed_message_serializes_its_source() {
    let parsed = Engine::new().parse_message("Deploy a Key Vault.");
    let value = serde_json::to_value(&parsed).unwrap();
    assert_eq!(value["source"], json!("text"));
    assert_eq!(value["architecture"]["services"][0]["id"], json!("key-vaults"));
    assert_eq!(ParseSource::Structured.as_str(), "structured");
}

#[test]
fn merge_unions_two_partial_descriptions() {
    let engine = Engine::new();
    let previous = engine
        .parse_structured(&json!({
            "services": [{ "id": "web", "title": "App Service", "groupIds": ["rg"] }],
            "groups": [{ "id": "rg", "label": "Workload RG" }]
        }))
        .unwrap();
    let incoming = engine
        .parse_structured(&json!({
            "services": [
                { "id": "web", "title": "Function App", "groupIds": ["rg-shared"] },
                { "id": "kv", "title": "Key Vault", "groupIds": ["rg"] }
            ],
            "groups": [{ "id": "rg", "label": "Renamed" }],
            "connections": [{ "from": "web", "to": "kv" }]
        }))
        .unwrap();

    let merged = engine.merge(&previous, &incoming);
    let ids: Vec<&str> = merged.services.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["web", "kv"]);
    let web = merged.service("web").unwrap();
    assert_eq!(web.title, "App Services");
    assert_eq!(web.group_ids, vec!["rg", "rg-shared"]);

    let rg = merged.group("rg").unwrap();
    assert_eq!(rg.label, "Workload RG");
    assert_eq!(rg.members, vec!["web", "kv"]);
    assert_eq!(merged.connections, vec![Connection::new("web", "kv", None)]);
    assert_eq!(engine.normalize(&merged), merged);
}

#[test]
fn config_overrides_merge_onto_defaults() {
    let engine = Engine::new().with_config(ArchConfig::from_value(json!({
        "extract": { "maxMatches": 3 },
        "layout": { "default": "vertical" }
    })));
    assert_eq!(engine.limits().max_matches, 3);
    assert_eq!(engine.limits().max_phrase_words, Limits::default().max_phrase_words);
    assert_eq!(engine.layout_settings().default_layout, Layout::Vertical);
    assert_eq!(engine.layout_settings().spacing_x, 240.0);
    assert_eq!(engine.config().get_bool("extract.relationshipTemplates"), Some(true));
    assert_eq!(engine.parse_text("Deploy a Key Vault.").layout, Layout::Vertical);
}

#[test]
fn engines_can_share_a_custom_catalog() {
    let overlay = CatalogData::from_json_str(
        r#"{
            "services": [{
                "id": "legacy-crm",
                "category": "On-Premises",
                "categoryId": "on-premises",
                "title": "Legacy CRM"
            }]
        }"#,
    )
    .unwrap();
    let catalog = Arc::new(Catalog::builtin().extend(overlay, "overlay").unwrap());
    let engine = Engine::new().with_catalog(Arc::clone(&catalog));

    let arch = engine.parse_text("Legacy CRM → Service Bus");
    assert_eq!(arch.services[0].id, "legacy-crm");
    assert!(!arch.services[0].is_stub());
    assert_eq!(engine.resolve("legacy crm").map(|d| d.id.as_str()), Some("legacy-crm"));
    assert_eq!(engine.catalog().len(), catalog.len());
}

#[test]
fn engine_is_shareable_across_threads() {
    let engine = Arc::new(Engine::new());
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let engine = Arc::clone(&engine);
            std::thread::spawn(move || engine.parse_text("App Service talks to Cosmos DB"))
        })
        .collect();
    let results: Vec<ParsedArchitecture> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(results.windows(2).all(|w| w[0] == w[1]));
}
