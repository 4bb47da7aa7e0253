//! Field mapping between entities and node property sets.
//!
//! Fields are discovered through serde: whatever an entity serializes to is
//! what gets written, and loading starts from `T::default()` and overlays
//! the stored properties before deserializing.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use graphmap_core::Properties;

use crate::error::{OgmError, Result};

/// Anything the store can persist as a node.
///
/// Blanket-implemented: a type qualifies if serde can take it apart into a
/// map of scalar fields and put it back together from one, and it has a
/// no-argument constructor.
pub trait Entity: Serialize + DeserializeOwned + Default + Send + Sync + 'static {}

impl<T> Entity for T where T: Serialize + DeserializeOwned + Default + Send + Sync + 'static {}

/// Extract the property set for an entity.
///
/// `null` fields are left out, since the graph store has no null
/// properties. Nested maps, and arrays holding anything but scalars, are
/// rejected.
pub fn to_properties<T: Serialize>(entity: &T) -> Result<Properties> {
    let fields = match serde_json::to_value(entity) {
        Ok(Value::Object(fields)) => fields,
        Ok(other) => {
            return Err(OgmError::Mapping {
                field: std::any::type_name::<T>().to_string(),
                reason: format!("expected a struct of fields, got {}", kind(&other)),
            })
        }
        Err(e) => {
            return Err(OgmError::Mapping {
                field: std::any::type_name::<T>().to_string(),
                reason: e.to_string(),
            })
        }
    };

    let mut properties = Properties::new();
    for (field, value) in fields {
        match &value {
            Value::Null => continue,
            Value::Object(_) => {
                return Err(OgmError::Mapping {
                    field,
                    reason: "nested maps cannot be stored as properties".to_string(),
                })
            }
            Value::Array(items) if !items.iter().all(is_scalar) => {
                return Err(OgmError::Mapping {
                    field,
                    reason: "arrays may only hold strings, numbers or booleans".to_string(),
                })
            }
            _ => {}
        }
        properties.insert(field, value);
    }
    Ok(properties)
}

/// Build an entity from a stored property set.
///
/// Fields with no stored property keep their `Default` value; stored
/// properties with no matching field are ignored.
pub fn from_properties<T: Entity>(properties: &Properties) -> Result<T> {
    let mut fields = match serde_json::to_value(T::default()) {
        Ok(Value::Object(fields)) => fields,
        Ok(other) => {
            return Err(OgmError::Mapping {
                field: std::any::type_name::<T>().to_string(),
                reason: format!("expected a struct of fields, got {}", kind(&other)),
            })
        }
        Err(e) => {
            return Err(OgmError::Mapping {
                field: std::any::type_name::<T>().to_string(),
                reason: e.to_string(),
            })
        }
    };

    for (key, value) in properties {
        fields.insert(key.clone(), value.clone());
    }

    serde_json::from_value(Value::Object(fields)).map_err(|e| OgmError::Mapping {
        field: std::any::type_name::<T>().to_string(),
        reason: e.to_string(),
    })
}

fn is_scalar(value: &Value) -> bool {
    matches!(value, Value::String(_) | Value::Number(_) | Value::Bool(_))
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "a map",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Person {
        email: Option<String>,
        name: Option<String>,
        age: Option<u32>,
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    struct Tagged {
        tags: Vec<String>,
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    struct Nested {
        name: String,
        address: Address,
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    struct Address {
        city: String,
    }

    #[test]
    fn to_properties_drops_null_fields() {
        let person = Person {
            email: Some("alice@example.com".to_string()),
            name: None,
            age: Some(34),
        };

        let props = to_properties(&person).unwrap();
        assert_eq!(props.len(), 2);
        assert_eq!(props.get("email"), Some(&json!("alice@example.com")));
        assert_eq!(props.get("age"), Some(&json!(34)));
        assert!(!props.contains_key("name"));
    }

    #[test]
    fn scalar_arrays_are_properties() {
        let tagged = Tagged {
            tags: vec!["a".to_string(), "b".to_string()],
        };
        let props = to_properties(&tagged).unwrap();
        assert_eq!(props.get("tags"), Some(&json!(["a", "b"])));
    }

    #[test]
    fn nested_map_is_a_mapping_error() {
        let nested = Nested {
            name: "Alice".to_string(),
            address: Address {
                city: "Leeds".to_string(),
            },
        };

        match to_properties(&nested) {
            Err(OgmError::Mapping { field, .. }) => assert_eq!(field, "address"),
            other => panic!("expected mapping error, got {other:?}"),
        }
    }

    #[test]
    fn non_struct_is_a_mapping_error() {
        assert!(matches!(
            to_properties(&42),
            Err(OgmError::Mapping { .. })
        ));
    }

    #[test]
    fn from_properties_copies_matching_fields() {
        let props = json!({"email": "alice@example.com", "name": "Alice Allison", "age": 34});
        let person: Person = from_properties(props.as_object().unwrap()).unwrap();
        assert_eq!(
            person,
            Person {
                email: Some("alice@example.com".to_string()),
                name: Some("Alice Allison".to_string()),
                age: Some(34),
            }
        );
    }

    #[test]
    fn from_properties_defaults_missing_and_ignores_unknown() {
        let props = json!({"name": "Bob Robertson", "nickname": "Bobby"});
        let person: Person = from_properties(props.as_object().unwrap()).unwrap();
        assert_eq!(person.name.as_deref(), Some("Bob Robertson"));
        assert_eq!(person.email, None);
        assert_eq!(person.age, None);
    }

    #[test]
    fn from_properties_rejects_mistyped_values() {
        let props = json!({"age": "thirty-four"});
        assert!(matches!(
            from_properties::<Person>(props.as_object().unwrap()),
            Err(OgmError::Mapping { .. })
        ));
    }
}
