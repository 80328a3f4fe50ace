//! Schema validation helpers.
//!
//! Validates `serde_json::Value` configurations against a [`Schema`] and
//! function arguments against a [`FunctionDefinition`].
//!
//! # Example
//!
//! ```
//! use openhue_provider::schema::{Schema, Attribute};
//! use openhue_provider::validation::validate;
//! use serde_json::json;
//!
//! let schema = Schema::v0()
//!     .with_attribute("name", Attribute::required_string())
//!     .with_attribute("on", Attribute::optional_bool());
//!
//! let diagnostics = validate(&schema, &json!({"name": "Desk", "on": true}));
//! assert!(diagnostics.is_empty());
//!
//! let diagnostics = validate(&schema, &json!({"name": "Desk", "on": "yes"}));
//! assert_eq!(diagnostics.len(), 1);
//! assert_eq!(diagnostics[0].attribute, Some("on".to_string()));
//! ```

use crate::schema::{AttributeType, Diagnostic, FunctionDefinition, Schema};
use serde_json::Value;
use std::collections::HashMap;

/// Validate a JSON configuration against a schema.
///
/// # Validation Rules
///
/// - The configuration must be an object (null counts as empty)
/// - Required attributes must be present and non-null
/// - Computed-only attributes are skipped (provider sets these)
/// - Attribute types must match the schema
/// - Attributes not declared in the schema are rejected
pub fn validate(schema: &Schema, value: &Value) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    let empty = serde_json::Map::new();
    let obj = match value {
        Value::Object(map) => map,
        Value::Null => &empty,
        other => {
            diagnostics.push(
                Diagnostic::error("Expected object").with_detail(format!("Got {}", value_type_name(other))),
            );
            return diagnostics;
        }
    };

    let mut names: Vec<&String> = schema.attributes.keys().collect();
    names.sort();

    for name in names {
        let attr = &schema.attributes[name];
        if attr.flags.is_computed_only() {
            continue;
        }
        match obj.get(name) {
            None | Some(Value::Null) => {
                if attr.flags.required {
                    diagnostics.push(
                        Diagnostic::error(format!("Missing required attribute '{}'", name))
                            .with_detail("This attribute is required and must be provided")
                            .with_attribute(name.as_str()),
                    );
                }
            }
            Some(v) => validate_attribute_type(&attr.attr_type, v, name, &mut diagnostics),
        }
    }

    for key in obj.keys() {
        if !schema.attributes.contains_key(key) {
            diagnostics.push(
                Diagnostic::error(format!("Unsupported argument '{}'", key))
                    .with_detail("An argument with this name is not expected here")
                    .with_attribute(key.as_str()),
            );
        }
    }

    diagnostics
}

/// Validate a JSON value against a schema, returning Ok if valid or Err with diagnostics.
pub fn validate_result(schema: &Schema, value: &Value) -> Result<(), Vec<Diagnostic>> {
    let diagnostics = validate(schema, value);
    if diagnostics.is_empty() {
        Ok(())
    } else {
        Err(diagnostics)
    }
}

/// Check if a JSON value is valid against a schema.
pub fn is_valid(schema: &Schema, value: &Value) -> bool {
    validate(schema, value).is_empty()
}

/// Validate positional function arguments against a definition.
pub fn validate_arguments(definition: &FunctionDefinition, args: &[Value]) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    if args.len() != definition.parameters.len() {
        diagnostics.push(Diagnostic::error(format!(
            "Expected {} argument(s), got {}",
            definition.parameters.len(),
            args.len()
        )));
        return diagnostics;
    }

    for (param, arg) in definition.parameters.iter().zip(args) {
        validate_attribute_type(&param.param_type, arg, &param.name, &mut diagnostics);
    }

    diagnostics
}

fn validate_attribute_type(
    attr_type: &AttributeType,
    value: &Value,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    match attr_type {
        AttributeType::String => {
            if !value.is_string() {
                diagnostics.push(type_error(path, "string", value));
            }
        }
        AttributeType::Int64 => {
            if !is_int64(value) {
                diagnostics.push(type_error(path, "int64", value));
            }
        }
        AttributeType::Float64 => {
            if !value.is_number() {
                diagnostics.push(type_error(path, "number", value));
            }
        }
        AttributeType::Bool => {
            if !value.is_boolean() {
                diagnostics.push(type_error(path, "bool", value));
            }
        }
        AttributeType::List(element_type) => {
            if let Some(arr) = value.as_array() {
                for (i, elem) in arr.iter().enumerate() {
                    let elem_path = format!("{}.{}", path, i);
                    validate_attribute_type(element_type, elem, &elem_path, diagnostics);
                }
            } else {
                diagnostics.push(type_error(path, "list", value));
            }
        }
        AttributeType::Object(attrs) => {
            if let Some(obj) = value.as_object() {
                validate_object_type(attrs, obj, path, diagnostics);
            } else {
                diagnostics.push(type_error(path, "object", value));
            }
        }
    }
}

fn validate_object_type(
    attrs: &HashMap<String, AttributeType>,
    obj: &serde_json::Map<String, Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    for (name, attr_type) in attrs {
        let attr_path = format!("{}.{}", path, name);
        match obj.get(name) {
            Some(Value::Null) | None => {}
            Some(value) => validate_attribute_type(attr_type, value, &attr_path, diagnostics),
        }
    }
    for key in obj.keys() {
        if !attrs.contains_key(key) {
            diagnostics.push(
                Diagnostic::error(format!("Unsupported attribute '{}.{}'", path, key))
                    .with_attribute(format!("{}.{}", path, key)),
            );
        }
    }
}

fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn is_int64(value: &Value) -> bool {
    match value {
        Value::Number(n) => {
            n.is_i64()
                || n.as_f64().is_some_and(|f| {
                    f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64
                })
        }
        _ => false,
    }
}

fn type_error(path: &str, expected: &str, got: &Value) -> Diagnostic {
    Diagnostic::error(format!("Invalid type for attribute '{}'", path))
        .with_detail(format!("Expected {}, got {}", expected, value_type_name(got)))
        .with_attribute(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Attribute, Parameter};
    use serde_json::json;

    fn light_schema() -> Schema {
        Schema::v0()
            .with_attribute("id", Attribute::computed_string())
            .with_attribute("name", Attribute::required_string())
            .with_attribute("on", Attribute::optional_bool().with_default(json!(false)))
            .with_attribute("brightness", Attribute::optional_float64())
            .with_attribute(
                "color",
                Attribute::new(
                    AttributeType::object([
                        ("x", AttributeType::Float64),
                        ("y", AttributeType::Float64),
                        ("z", AttributeType::Float64),
                    ]),
                    crate::schema::AttributeFlags::optional_computed(),
                ),
            )
    }

    #[test]
    fn test_valid_config() {
        let config = json!({
            "name": "Desk lamp",
            "on": true,
            "brightness": 55.5,
            "color": {"x": 0.3, "y": 0.3, "z": 1.0}
        });
        assert!(is_valid(&light_schema(), &config));
    }

    #[test]
    fn test_missing_required() {
        let diagnostics = validate(&light_schema(), &json!({"on": true}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("name"));
        assert!(diagnostics[0].summary.contains("Missing required"));
    }

    #[test]
    fn test_null_config_reports_required() {
        let diagnostics = validate(&light_schema(), &Value::Null);
        assert_eq!(diagnostics.len(), 1);
    }

    #[test]
    fn test_wrong_types() {
        let diagnostics = validate(
            &light_schema(),
            &json!({"name": 42, "brightness": "bright"}),
        );
        assert_eq!(diagnostics.len(), 2);
        let attrs: Vec<_> = diagnostics
            .iter()
            .filter_map(|d| d.attribute.as_deref())
            .collect();
        assert!(attrs.contains(&"name"));
        assert!(attrs.contains(&"brightness"));
    }

    #[test]
    fn test_nested_object_type() {
        let diagnostics = validate(
            &light_schema(),
            &json!({"name": "Desk", "color": {"x": "left", "y": 0.1}}),
        );
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("color.x"));
    }

    #[test]
    fn test_unknown_attribute() {
        let result = validate_result(&light_schema(), &json!({"name": "Desk", "hue": 3}));
        let diagnostics = result.unwrap_err();
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("Unsupported argument 'hue'"));
    }

    #[test]
    fn test_list_elements() {
        let schema =
            Schema::v0().with_attribute("lights", Attribute::new(
                AttributeType::list(AttributeType::String),
                crate::schema::AttributeFlags::optional(),
            ));
        let diagnostics = validate(&schema, &json!({"lights": ["a", 2]}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("lights.1"));
    }

    #[test]
    fn test_not_an_object() {
        let diagnostics = validate(&light_schema(), &json!(["name"]));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].summary, "Expected object");
    }

    #[test]
    fn test_int64() {
        assert!(is_int64(&json!(3)));
        assert!(is_int64(&json!(3.0)));
        assert!(!is_int64(&json!(3.5)));
        assert!(!is_int64(&json!("3")));
    }

    #[test]
    fn test_function_arguments() {
        let definition = FunctionDefinition::new("convert", AttributeType::String)
            .with_parameter(Parameter::string("hex_color"));

        assert!(validate_arguments(&definition, &[json!("#ffffff")]).is_empty());

        let wrong_count = validate_arguments(&definition, &[]);
        assert_eq!(wrong_count[0].summary, "Expected 1 argument(s), got 0");

        let wrong_type = validate_arguments(&definition, &[json!(12)]);
        assert_eq!(wrong_type[0].attribute.as_deref(), Some("hex_color"));
    }
}
