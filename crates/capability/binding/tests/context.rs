use std::sync::Arc;

use domain::Protocol;
use scenelink_binding::ContextResolver;
use scenelink_scene::{EntityRecord, InMemoryScene};
use serde_json::json;

fn layered_scene() -> Arc<InMemoryScene> {
    let scene = InMemoryScene::new();
    scene
        .insert_entity(
            EntityRecord::new("/World")
                .with_metadata("binding:context", json!({"site": "plant-a", "host": "root-host"}))
                .with_metadata(
                    "binding:authDefaults:rest",
                    json!({"authMethod": "apikey", "authProfile": "root-key"}),
                )
                .with_metadata("binding:authDefaults:mqtt", json!({"authProfile": "broker"})),
        )
        .expect("insert");
    scene
        .insert_entity(
            EntityRecord::new("/World/Line1")
                .with_metadata("binding:context", json!({"host": "line-host"}))
                .with_metadata("binding:authDefaults:rest", json!({"authProfile": "line-key"})),
        )
        .expect("insert");
    scene
        .insert_entity(EntityRecord::new("/World/Line1/Pump"))
        .expect("insert");
    Arc::new(scene)
}

#[test]
fn nearest_context_wins_per_variable() {
    let resolver = ContextResolver::new(layered_scene());
    let context = resolver.resolve_context("/World/Line1/Pump");

    assert_eq!(context.get("host"), Some(&json!("line-host")));
    assert_eq!(context.get("site"), Some(&json!("plant-a")));
}

#[test]
fn auth_defaults_take_whole_nearest_dictionary() {
    let resolver = ContextResolver::new(layered_scene());
    let defaults = resolver.resolve_auth_defaults("/World/Line1/Pump");

    let rest = defaults.get(&Protocol::Rest).expect("rest defaults");
    assert_eq!(rest.get("authProfile"), Some(&json!("line-key")));
    assert!(rest.get("authMethod").is_none());

    let mqtt = defaults.get(&Protocol::Mqtt).expect("mqtt defaults");
    assert_eq!(mqtt.get("authProfile"), Some(&json!("broker")));
    assert!(!defaults.contains_key(&Protocol::Sql));
}

#[test]
fn unknown_entity_resolves_through_existing_ancestors() {
    let resolver = ContextResolver::new(layered_scene());
    let context = resolver.resolve_context("/World/Ghost");
    assert_eq!(context.get("host"), Some(&json!("root-host")));
}

#[test]
fn malformed_layer_is_skipped() {
    let scene = InMemoryScene::new();
    scene
        .insert_entity(
            EntityRecord::new("/World")
                .with_metadata("binding:context", json!({"host": "root-host", "site": "plant-a"}))
                .with_metadata("binding:authDefaults:sql", json!({"authProfile": "warehouse"})),
        )
        .expect("insert");
    scene
        .insert_entity(
            EntityRecord::new("/World/Line2")
                .with_metadata("binding:context", json!("host=line-host"))
                .with_metadata("binding:authDefaults:sql", json!(["broken"])),
        )
        .expect("insert");
    scene
        .insert_entity(EntityRecord::new("/World/Line2/Valve"))
        .expect("insert");
    let resolver = ContextResolver::new(Arc::new(scene));

    let context = resolver.resolve_context("/World/Line2/Valve");
    assert_eq!(context.get("host"), Some(&json!("root-host")));
    assert_eq!(context.len(), 2);

    let defaults = resolver.resolve_auth_defaults("/World/Line2/Valve");
    let sql = defaults.get(&Protocol::Sql).expect("sql defaults");
    assert_eq!(sql.get("authProfile"), Some(&json!("warehouse")));
}
