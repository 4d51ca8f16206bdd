//! Serialization lifecycle
//!
//! Encodes value graphs as JSON and rebuilds them against a
//! [`ClassRegistry`]. Objects pass the serialization guard on both sides
//! (sleep on encode, wakeup on decode); decoding never runs a constructor.
//!
//! Encoding:
//!
//! ```text
//! null / bool / int / float / string  ->  JSON scalar
//! array                               ->  [v0, v1, ...]
//! dict                                ->  {"$dict": [[key, value], ...]}
//! object                              ->  {"$class": "Name",
//!                                          "fields": [{"owner": "Base", "name": "x", "value": v}],
//!                                          "dynamic": [["extra", v], ...]}
//! ```

use serde_json::{json, Map, Number};

use crate::defaults::{CLASS_KEY, DEFAULT_MAX_DEPTH, DICT_KEY};
use crate::duplicate::CopyOptions;
use crate::error::{FacsimileError, FacsimileResult};
use crate::object::ObjectRef;
use crate::registry::ClassRegistry;
use crate::shim;
use crate::value::{ArrayRef, DictKey, DictRef, Value};

type Json = serde_json::Value;

const FIELDS_KEY: &str = "fields";
const DYNAMIC_KEY: &str = "dynamic";

/// Encode a value graph as JSON
pub fn serialize(value: &Value, options: &CopyOptions) -> FacsimileResult<Json> {
    Encoder {
        max_depth: options.max_depth,
        depth: 0,
    }
    .encode(value)
}

/// Rebuild a value graph from its JSON encoding
pub fn unserialize(registry: &ClassRegistry, encoded: &Json) -> FacsimileResult<Value> {
    Decoder {
        registry,
        depth: 0,
    }
    .decode(encoded)
}

fn check_depth(depth: usize, limit: usize) -> FacsimileResult<()> {
    if depth >= limit {
        return Err(FacsimileError::DepthLimitExceeded { limit });
    }
    Ok(())
}

fn invalid(message: impl Into<String>) -> FacsimileError {
    FacsimileError::InvalidEncoding(message.into())
}

// ============================================================================
// Encoding
// ============================================================================

struct Encoder {
    max_depth: usize,
    depth: usize,
}

impl Encoder {
    fn encode(&mut self, value: &Value) -> FacsimileResult<Json> {
        match value {
            Value::Null => Ok(Json::Null),
            Value::Bool(b) => Ok(Json::Bool(*b)),
            Value::Int(i) => Ok(json!(i)),
            Value::Float(f) => Number::from_f64(*f)
                .map(Json::Number)
                .ok_or_else(|| invalid(format!("non-finite float {}", f))),
            Value::Str(s) => Ok(Json::String(s.to_string())),
            Value::Array(array) => self.nested(|this| {
                array
                    .to_vec()
                    .iter()
                    .map(|item| this.encode(item))
                    .collect::<FacsimileResult<Vec<_>>>()
                    .map(Json::Array)
            }),
            Value::Dict(dict) => self.nested(|this| {
                let mut pairs = Vec::with_capacity(dict.len());
                for (key, item) in dict.entries() {
                    let key = match key {
                        DictKey::Int(i) => json!(i),
                        DictKey::Str(s) => Json::String(s.to_string()),
                    };
                    pairs.push(Json::Array(vec![key, this.encode(&item)?]));
                }
                Ok(json!({ DICT_KEY: pairs }))
            }),
            Value::Object(object) => self.nested(|this| this.encode_object(object)),
            Value::Resource(resource) => {
                tracing::debug!(kind = resource.kind(), "resource reached during serialization");
                Err(FacsimileError::ResourceNotSerializable {
                    kind: resource.kind().to_string(),
                })
            }
        }
    }

    fn nested(&mut self, f: impl FnOnce(&mut Self) -> FacsimileResult<Json>) -> FacsimileResult<Json> {
        check_depth(self.depth, self.max_depth)?;
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    fn encode_object(&mut self, object: &ObjectRef) -> FacsimileResult<Json> {
        let class = object.class();
        shim::guard_serialize(&class)?;

        let mut fields = Vec::new();
        for field in class.instance_layout() {
            let value = object.read_field(field).unwrap_or_default();
            fields.push(json!({
                "owner": &*field.declaring_class_name,
                "name": &field.name,
                "value": self.encode(&value)?,
            }));
        }

        // Pairs rather than a JSON map, which would sort the names
        let mut dynamic = Vec::new();
        for (name, value) in object.dynamic_properties() {
            dynamic.push(Json::Array(vec![Json::String(name), self.encode(&value)?]));
        }

        tracing::trace!(class = class.name(), "object serialized");
        Ok(json!({
            CLASS_KEY: class.name(),
            FIELDS_KEY: fields,
            DYNAMIC_KEY: dynamic,
        }))
    }
}

// ============================================================================
// Decoding
// ============================================================================

struct Decoder<'r> {
    registry: &'r ClassRegistry,
    depth: usize,
}

impl Decoder<'_> {
    fn decode(&mut self, encoded: &Json) -> FacsimileResult<Value> {
        match encoded {
            Json::Null => Ok(Value::Null),
            Json::Bool(b) => Ok(Value::Bool(*b)),
            Json::Number(n) => match n.as_i64() {
                Some(i) => Ok(Value::Int(i)),
                None => n
                    .as_f64()
                    .map(Value::Float)
                    .ok_or_else(|| invalid(format!("number out of range: {}", n))),
            },
            Json::String(s) => Ok(Value::str(s)),
            Json::Array(items) => self.nested(|this| {
                let values = items
                    .iter()
                    .map(|item| this.decode(item))
                    .collect::<FacsimileResult<Vec<_>>>()?;
                Ok(Value::Array(ArrayRef::new(values)))
            }),
            Json::Object(map) => {
                if let Some(class) = map.get(CLASS_KEY) {
                    self.nested(|this| this.decode_object(class, map))
                } else if let Some(pairs) = map.get(DICT_KEY) {
                    self.nested(|this| this.decode_dict(pairs))
                } else {
                    Err(invalid(format!(
                        "object without {} or {} marker",
                        CLASS_KEY, DICT_KEY
                    )))
                }
            }
        }
    }

    fn nested(&mut self, f: impl FnOnce(&mut Self) -> FacsimileResult<Value>) -> FacsimileResult<Value> {
        check_depth(self.depth, DEFAULT_MAX_DEPTH)?;
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    fn decode_dict(&mut self, pairs: &Json) -> FacsimileResult<Value> {
        let pairs = pairs
            .as_array()
            .ok_or_else(|| invalid("dict entries must be an array"))?;
        let dict = DictRef::new();
        for pair in pairs {
            let (key, value) = match pair.as_array().map(Vec::as_slice) {
                Some([key, value]) => (key, value),
                _ => return Err(invalid("dict entry must be a [key, value] pair")),
            };
            let key = match key {
                Json::String(s) => DictKey::from(s.as_str()),
                Json::Number(n) => DictKey::Int(
                    n.as_i64()
                        .ok_or_else(|| invalid(format!("dict key is not an integer: {}", n)))?,
                ),
                other => return Err(invalid(format!("invalid dict key: {}", other))),
            };
            dict.insert(key, self.decode(value)?);
        }
        Ok(Value::Dict(dict))
    }

    fn decode_object(&mut self, class: &Json, map: &Map<String, Json>) -> FacsimileResult<Value> {
        let name = class
            .as_str()
            .ok_or_else(|| invalid(format!("{} must be a string", CLASS_KEY)))?;
        let class = self
            .registry
            .get_by_name(name)
            .ok_or_else(|| FacsimileError::UnknownClass(name.to_string()))?
            .clone();
        shim::guard_serialize(&class)?;

        let object = ObjectRef::instantiate(&class);

        if let Some(fields) = map.get(FIELDS_KEY) {
            let fields = fields
                .as_array()
                .ok_or_else(|| invalid("fields must be an array"))?;
            for entry in fields {
                let owner = entry.get("owner").and_then(Json::as_str);
                let field = entry.get("name").and_then(Json::as_str);
                let (owner, field) = match (owner, field) {
                    (Some(owner), Some(field)) => (owner, field),
                    _ => return Err(invalid("field entry needs owner and name")),
                };
                let value = match entry.get("value") {
                    Some(value) => self.decode(value)?,
                    None => Value::Null,
                };
                if !object.set_declared(owner, field, value.clone()) {
                    // The declaration moved or disappeared since encoding
                    object.set(field, value)?;
                }
            }
        }

        if let Some(dynamic) = map.get(DYNAMIC_KEY) {
            let dynamic = dynamic
                .as_array()
                .ok_or_else(|| invalid("dynamic must be an array"))?;
            for pair in dynamic {
                let (field, value) = match pair.as_array().map(Vec::as_slice) {
                    Some([Json::String(field), value]) => (field, value),
                    _ => return Err(invalid("dynamic entry must be a [name, value] pair")),
                };
                let value = self.decode(value)?;
                object.set(field, value)?;
            }
        }

        tracing::trace!(class = class.name(), "object unserialized");
        Ok(Value::Object(object))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::ClassBuilder;
    use crate::shim::Shims;
    use crate::value::ResourceRef;

    #[test]
    fn test_scalars_and_containers() {
        let dict = DictRef::from_entries(vec![
            (DictKey::Int(1), Value::str("one")),
            (DictKey::from("two"), Value::Float(2.5)),
        ]);
        let value = Value::array(vec![Value::Null, Value::Bool(true), Value::Dict(dict)]);

        let encoded = serialize(&value, &CopyOptions::default()).unwrap();
        assert_eq!(
            encoded,
            json!([null, true, {"$dict": [[1, "one"], ["two", 2.5]]}])
        );

        let decoded = unserialize(&ClassRegistry::new(), &encoded).unwrap();
        assert!(decoded.deep_eq(&value));
    }

    #[test]
    fn test_object_layout() {
        let base = ClassBuilder::new("Base").field("v").build().unwrap();
        let child = ClassBuilder::new("Child").extends(&base).field("v").build().unwrap();
        let obj = ObjectRef::instantiate(&child);
        obj.set_declared("Base", "v", Value::Int(1));
        obj.set_declared("Child", "v", Value::Int(2));
        obj.set("extra", Value::str("x")).unwrap();

        let encoded = serialize(&Value::Object(obj), &CopyOptions::default()).unwrap();
        assert_eq!(
            encoded,
            json!({
                "$class": "Child",
                "fields": [
                    {"owner": "Base", "name": "v", "value": 1},
                    {"owner": "Child", "name": "v", "value": 2},
                ],
                "dynamic": [["extra", "x"]],
            })
        );
    }

    #[test]
    fn test_unknown_class() {
        let err = unserialize(&ClassRegistry::new(), &json!({"$class": "Ghost"})).unwrap_err();
        assert_eq!(err, FacsimileError::UnknownClass("Ghost".to_string()));
    }

    #[test]
    fn test_sleep_guard() {
        let class = ClassBuilder::new("Connection")
            .install_capability_shim(Shims::SERIALIZE)
            .build()
            .unwrap();
        let value = Value::Object(ObjectRef::instantiate(&class));
        let err = serialize(&value, &CopyOptions::default()).unwrap_err();
        assert_eq!(err.to_string(), "Serialization of class Connection is not supported");
    }

    #[test]
    fn test_wakeup_guard() {
        let class = ClassBuilder::new("Connection")
            .install_capability_shim(Shims::SERIALIZE)
            .build()
            .unwrap();
        let mut registry = ClassRegistry::new();
        registry.register(class).unwrap();
        let err = unserialize(&registry, &json!({"$class": "Connection"})).unwrap_err();
        assert!(matches!(err, FacsimileError::SerializeNotSupported { .. }));
    }

    #[test]
    fn test_resource_not_serializable() {
        let value = Value::Resource(ResourceRef::new("socket", 0u32));
        let err = serialize(&value, &CopyOptions::default()).unwrap_err();
        assert_eq!(
            err,
            FacsimileError::ResourceNotSerializable { kind: "socket".to_string() }
        );
    }

    #[test]
    fn test_invalid_encoding() {
        let mut registry = ClassRegistry::new();
        registry
            .register(ClassBuilder::new("Open").build().unwrap())
            .unwrap();
        for bad in [
            json!({"plain": 1}),
            json!({"$dict": [[1]]}),
            json!({"$dict": [[null, 1]]}),
            json!({"$class": 3}),
            json!({"$class": "Open", "dynamic": {"a": 1}}),
            json!({"$class": "Open", "dynamic": [[1, 2]]}),
        ] {
            assert!(matches!(
                unserialize(&registry, &bad),
                Err(FacsimileError::InvalidEncoding(_))
            ));
        }
    }

    #[test]
    fn test_depth_limit() {
        let arr = ArrayRef::new(vec![]);
        arr.push(Value::Array(arr.clone()));
        let options = CopyOptions { max_depth: 8, ..CopyOptions::default() };
        let err = serialize(&Value::Array(arr.clone()), &options).unwrap_err();
        assert_eq!(err, FacsimileError::DepthLimitExceeded { limit: 8 });
        arr.borrow_mut().clear();
    }
}
