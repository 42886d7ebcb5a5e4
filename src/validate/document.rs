use serde_json::{Map, Value};

use super::{expected_shape, pattern_error, Finding, FindingKind};
use crate::decompile::json_kind;
use crate::error::{Error, Result};
use crate::node::{keyword_applies, Constraint, ConstraintField, SchemaType};

/// Report every problem in a document without importing it. Fails only when
/// the document root is not a JSON object.
pub fn check_document(document: &Value) -> Result<Vec<Finding>> {
    let Value::Object(schema) = document else {
        return Err(Error::MalformedDocument {
            path: "/".into(),
            reason: format!("expected a JSON object, found {}", json_kind(document)),
        });
    };
    let mut findings = Vec::new();
    check_schema(schema, String::new(), &mut findings);
    Ok(findings)
}

fn check_schema(schema: &Map<String, Value>, path: String, findings: &mut Vec<Finding>) {
    let mut report = |path: &str, kind| findings.push(Finding { path: path.to_string(), node: None, kind });

    let ty = match schema.get("type") {
        None => None,
        Some(Value::String(s)) if SchemaType::parse(s).is_some() => SchemaType::parse(s),
        Some(other) => {
            report(&path, FindingKind::MalformedType { found: other.clone() });
            None
        }
    };

    // ---- scalar keywords ----
    for (key, value) in schema {
        let Some(expected) = expected_shape(key) else { continue };
        let well_formed = match ConstraintField::from_key(key) {
            Some(field) => Constraint::from_document(field, value).is_some(),
            None => value.is_string(),
        };
        if !well_formed {
            report(&path, FindingKind::InvalidValue { field: key.clone(), expected });
            continue;
        }
        if let Some(ty) = ty {
            if !keyword_applies(key, ty) {
                report(&path, FindingKind::InapplicableField { field: key.clone(), ty });
            }
        }
    }
    if let Some(message) = schema.get("pattern").and_then(Value::as_str).and_then(pattern_error) {
        report(&path, FindingKind::InvalidPattern { message });
    }
    for (lower, upper) in [("minLength", "maxLength"), ("minimum", "maximum")] {
        let lo = schema.get(lower).and_then(Value::as_f64);
        let hi = schema.get(upper).and_then(Value::as_f64);
        if let (Some(lo), Some(hi)) = (lo, hi) {
            if lo > hi {
                report(&path, FindingKind::InvertedRange { lower: lower.into(), upper: upper.into() });
            }
        }
    }

    // ---- containers ----
    for key in ["properties", "required", "items"] {
        if let Some(ty) = ty {
            if schema.contains_key(key) && !keyword_applies(key, ty) {
                report(&path, FindingKind::InapplicableField { field: key.into(), ty });
            }
        }
    }

    let mut declared: Option<&Map<String, Value>> = None;
    let mut nested = Vec::new();
    match schema.get("properties") {
        None => {}
        Some(Value::Object(props)) => {
            declared = Some(props);
            for (name, sub) in props {
                let sub_path = format!("{path}/properties/{}", name.replace('~', "~0").replace('/', "~1"));
                match sub {
                    Value::Object(sub) => nested.push((sub, sub_path)),
                    _ => report(&sub_path, FindingKind::SubSchemaNotObject),
                }
            }
        }
        Some(_) => report(&format!("{path}/properties"), FindingKind::PropertiesNotMapping),
    }

    match schema.get("required") {
        None => {}
        Some(Value::Array(names)) => {
            for (index, entry) in names.iter().enumerate() {
                match entry.as_str() {
                    None => report(&format!("{path}/required/{index}"), FindingKind::RequiredEntryNotString { index }),
                    Some(name) if declared.is_some_and(|props| !props.contains_key(name)) => {
                        report(&format!("{path}/required/{index}"), FindingKind::UnknownRequiredName { name: name.into() })
                    }
                    Some(_) => {}
                }
            }
        }
        Some(_) => report(&format!("{path}/required"), FindingKind::RequiredNotArray),
    }

    match schema.get("items") {
        None => {}
        Some(Value::Object(sub)) => nested.push((sub, format!("{path}/items"))),
        Some(_) => report(&format!("{path}/items"), FindingKind::SubSchemaNotObject),
    }

    for (sub, sub_path) in nested {
        check_schema(sub, sub_path, findings);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn kinds_at(document: Value) -> Vec<(String, FindingKind)> {
        check_document(&document)
            .unwrap()
            .into_iter()
            .map(|f| (f.path, f.kind))
            .collect()
    }

    #[test]
    fn supported_documents_are_clean() {
        let doc = json!({
            "type": "object",
            "description": "user",
            "properties": {
                "email": {"type": "string", "format": "email", "maxLength": 255},
                "roles": {"type": "array", "items": {"type": "string", "enum": ["admin", "user"]}},
                "age": {"type": "number", "minimum": 0, "maximum": 150}
            },
            "required": ["email"]
        });
        assert!(kinds_at(doc).is_empty());
    }

    #[test]
    fn root_must_be_an_object() {
        assert!(matches!(check_document(&json!([1, 2])), Err(Error::MalformedDocument { .. })));
    }

    #[test]
    fn malformed_type_values() {
        let found = kinds_at(json!({
            "type": "object",
            "properties": {
                "a": {"type": "integer"},
                "b": {"type": ["string", "null"]},
                "c": {"description": "untyped is fine"}
            }
        }));
        assert_eq!(
            found,
            [
                ("/properties/a".to_string(), FindingKind::MalformedType { found: json!("integer") }),
                ("/properties/b".to_string(), FindingKind::MalformedType { found: json!(["string", "null"]) }),
            ]
        );
    }

    #[test]
    fn required_and_properties_shapes() {
        let found = kinds_at(json!({
            "type": "object",
            "properties": {"x": {"type": "string"}, "y": true},
            "required": ["x", 7, "z"]
        }));
        assert_eq!(
            found,
            [
                ("/properties/y".to_string(), FindingKind::SubSchemaNotObject),
                ("/required/1".to_string(), FindingKind::RequiredEntryNotString { index: 1 }),
                ("/required/2".to_string(), FindingKind::UnknownRequiredName { name: "z".into() }),
            ]
        );

        let found = kinds_at(json!({"type": "object", "properties": [], "required": "x"}));
        assert_eq!(
            found,
            [
                ("/properties".to_string(), FindingKind::PropertiesNotMapping),
                ("/required".to_string(), FindingKind::RequiredNotArray),
            ]
        );
    }

    #[test]
    fn constraint_values_and_applicability() {
        let found = kinds_at(json!({
            "type": "array",
            "items": {"type": "number", "minLength": 2, "minimum": "0", "maximum": 1}
        }));
        assert_eq!(
            found,
            [
                ("/items".to_string(), FindingKind::InapplicableField { field: "minLength".into(), ty: SchemaType::Number }),
                ("/items".to_string(), FindingKind::InvalidValue { field: "minimum".into(), expected: "a number" }),
            ]
        );
    }

    #[test]
    fn ranges_and_patterns() {
        let found = kinds_at(json!({"type": "string", "minLength": 9, "maxLength": 3, "pattern": "[a-"}));
        assert_eq!(found.len(), 2);
        assert!(matches!(found[0].1, FindingKind::InvalidPattern { .. }));
        assert_eq!(
            found[1].1,
            FindingKind::InvertedRange { lower: "minLength".into(), upper: "maxLength".into() }
        );
    }
}
