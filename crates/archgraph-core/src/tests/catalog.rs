use crate::*;

fn title(query: &str) -> Option<String> {
    Catalog::builtin().resolve(query).map(|d| d.title.clone())
}

#[test]
fn alias_table_maps_phrases_and_resource_types() {
    assert_eq!(title("cosmos db").as_deref(), Some("Azure Cosmos DB"));
    assert_eq!(
        title("  Microsoft.DocumentDB/databaseAccounts ").as_deref(),
        Some("Azure Cosmos DB")
    );
    assert_eq!(title("azurerm_cosmosdb_account").as_deref(), Some("Azure Cosmos DB"));

    let r = Catalog::builtin().resolve_with_kind("AKS").unwrap();
    assert_eq!(r.definition.title, "Kubernetes Services");
    assert_eq!(r.kind, MatchKind::Alias);
}

#[test]
fn exact_title_match_is_case_insensitive() {
    let r = Catalog::builtin().resolve_with_kind("key VAULTS").unwrap();
    assert_eq!(r.definition.id, "key-vaults");
    assert_eq!(r.kind, MatchKind::Title);
}

#[test]
fn containment_prefers_the_longest_alias() {
    let r = Catalog::builtin()
        .resolve_with_kind("our azure sql managed instance backups")
        .unwrap();
    assert_eq!(r.definition.title, "SQL Managed Instance");
    assert_eq!(r.kind, MatchKind::Contains);

    assert_eq!(
        title("the primary azure sql database replica").as_deref(),
        Some("SQL Database")
    );
}

#[test]
fn containment_is_word_aligned() {
    assert_eq!(title("nosqlish thing"), None);
}

#[test]
fn no_match_is_not_an_error() {
    assert_eq!(title("quantum flux capacitor"), None);
    assert_eq!(title(""), None);
    assert_eq!(title("   "), None);
}

#[test]
fn references_resolve_by_title_then_id_then_icon_id() {
    let catalog = Catalog::builtin();
    let by_title = catalog.resolve_reference(Some("Cosmos DB"), Some("whatever")).unwrap();
    assert_eq!(by_title.id, "azure-cosmos-db");

    let by_id = catalog.resolve_reference(None, Some("key-vaults")).unwrap();
    assert_eq!(by_id.title, "Key Vaults");

    let by_icon = catalog
        .resolve_reference(
            Some("Our ingestion hub"),
            Some("analytics/00039-icon-service-Event-Hubs"),
        )
        .unwrap();
    assert_eq!(by_icon.title, "Event Hubs");

    assert!(catalog.resolve_reference(None, Some("svc-1")).is_none());
}

#[test]
fn mention_regex_finds_catalog_phrases() {
    let catalog = Catalog::builtin();
    let re = catalog.mention_regex().unwrap();
    let found: Vec<&str> = re
        .find_iter("We use AKS with Cosmos DB and a VM.")
        .map(|m| m.as_str())
        .collect();
    // Two-letter aliases are too noisy for prose scanning.
    assert_eq!(found, vec!["AKS", "Cosmos DB"]);
}

#[test]
fn extend_adds_services_and_aliases() {
    let overlay = CatalogData::from_json_str(
        r#"{
            "services": [{
                "id": "legacy-crm",
                "category": "On-Premises",
                "categoryId": "on-premises",
                "title": "Legacy CRM"
            }],
            "aliases": { "crm": "Legacy CRM", "nosql store": "Azure Cosmos DB" }
        }"#,
    )
    .unwrap();
    let extended = Catalog::builtin().extend(overlay, "overlay.json").unwrap();

    assert_eq!(extended.len(), Catalog::builtin().len() + 1);
    assert_eq!(extended.resolve("CRM").unwrap().id, "legacy-crm");
    assert_eq!(extended.resolve("nosql store").unwrap().id, "azure-cosmos-db");
    assert!(Catalog::builtin().resolve("crm").is_none());
}

#[test]
fn extend_replaces_definitions_by_id() {
    let overlay = CatalogData::from_yaml_str(
        "services:\n  - id: key-vaults\n    category: Security\n    categoryId: security\n    title: Key Vaults\n    description: Secrets store\n",
    )
    .unwrap();
    let extended = Catalog::builtin().extend(overlay, "overlay.yaml").unwrap();
    assert_eq!(extended.len(), Catalog::builtin().len());
    assert_eq!(extended.get("key-vaults").unwrap().description, "Secrets store");
    // Aliases still point at the replaced entry.
    assert_eq!(extended.resolve("azure key vault").unwrap().description, "Secrets store");
}

#[test]
fn invalid_catalog_data_is_rejected() {
    let data =
        CatalogData::from_json_str(r#"{ "aliases": { "thing": "Missing Title" } }"#).unwrap();
    let err = Catalog::from_data(data, "bad.json").unwrap_err();
    assert!(matches!(err, Error::InvalidCatalog { .. }));
    assert!(err.to_string().contains("Missing Title"));

    let dup = CatalogData::from_json_str(
        r#"{ "services": [
            { "id": "a", "category": "c", "categoryId": "c", "title": "A" },
            { "id": "a", "category": "c", "categoryId": "c", "title": "B" }
        ] }"#,
    )
    .unwrap();
    assert!(matches!(
        Catalog::from_data(dup, "dup.json"),
        Err(Error::InvalidCatalog { .. })
    ));

    assert!(matches!(
        CatalogData::from_json_str("{"),
        Err(Error::InvalidCatalogJson { .. })
    ));
}

#[test]
fn catalog_tables_round_trip() {
    let builtin = Catalog::builtin();
    let copy = Catalog::from_data(builtin.to_data(), "copy").unwrap();
    assert_eq!(copy.len(), builtin.len());
    assert_eq!(copy.relationships(), builtin.relationships());
    assert_eq!(
        copy.resolve("Microsoft.Web/sites").map(|d| &d.id),
        builtin.resolve("Microsoft.Web/sites").map(|d| &d.id)
    );
}

#[test]
fn container_definitions_carry_their_group_kind() {
    let catalog = Catalog::builtin();
    assert_eq!(
        catalog.get("management-groups").unwrap().container,
        Some(GroupType::ManagementGroup)
    );
    assert_eq!(catalog.get("app-services").unwrap().container, None);
    assert_eq!(catalog.get("app-services").unwrap().canonical_name(), "App Service");
}
