use api_contract::{BindingDto, BindingTarget, ProfileValidationDto, WriteBindingRequest};
use serde_json::{Value, json};

#[test]
fn binding_dto_is_camel_case() {
    let dto = BindingDto {
        entity_path: "/World/Pump".to_string(),
        attribute_name: "temperature".to_string(),
        protocol: "mqtt".to_string(),
        operation: "stream".to_string(),
        uri: Some("mqtt://broker:1883".to_string()),
        topic: Some("plant/pump/temperature".to_string()),
        auth_profile: None,
        state: "connected".to_string(),
        streaming: true,
        last_value: Some(json!(21.5)),
        last_error: None,
    };
    let value = serde_json::to_value(dto).expect("serialize");
    assert_eq!(value["entityPath"], "/World/Pump");
    assert_eq!(value["lastValue"], json!(21.5));
    assert!(value.get("authProfile").is_some());
    assert!(value.get("entity_path").is_none());
    assert!(value.get("last_error").is_none());
}

#[test]
fn binding_target_accepts_short_names() {
    let payload = r#"{"entity":"/World/Pump","attribute":"rpm"}"#;
    let target: BindingTarget = serde_json::from_str(payload).expect("parse");
    assert_eq!(target.entity, "/World/Pump");
    assert_eq!(target.attribute, "rpm");
}

#[test]
fn binding_target_accepts_full_names() {
    let payload = r#"{"entityPath":"/World/Tank","attributeName":"level"}"#;
    let target: BindingTarget = serde_json::from_str(payload).expect("parse");
    assert_eq!(target.entity, "/World/Tank");
    assert_eq!(target.attribute, "level");
}

#[test]
fn write_request_keeps_arbitrary_json_value() {
    let payload = r#"{"entity":"/World/Pump","attribute":"setpoint","value":{"rpm":1500}}"#;
    let req: WriteBindingRequest = serde_json::from_str(payload).expect("parse");
    assert_eq!(req.value, json!({"rpm": 1500}));
}

#[test]
fn validation_valid_is_bool() {
    let dto = ProfileValidationDto {
        profile: "plant".to_string(),
        valid: false,
        message: "Profile not found: plant".to_string(),
    };
    let value = serde_json::to_value(dto).expect("serialize");
    assert!(matches!(value.get("valid"), Some(Value::Bool(false))));
}
