use schemars::{schema_for, JsonSchema};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// Types usable as OpenAI strict structured output.
///
/// Strict mode wants every object closed (`additionalProperties: false`),
/// every property listed in `required`, and no `$ref` indirection, so the
/// generated `schemars` schema is rewritten into that shape.
pub trait StructuredOutput: JsonSchema + DeserializeOwned {
    fn openai_schema() -> Value {
        let root = serde_json::to_value(schema_for!(Self)).unwrap_or_default();
        let definitions = root
            .get("definitions")
            .cloned()
            .unwrap_or(Value::Object(Map::new()));
        let mut schema = strict(root, &definitions);
        if let Value::Object(map) = &mut schema {
            map.remove("definitions");
            map.remove("$schema");
        }
        schema
    }
}

impl<T: JsonSchema + DeserializeOwned> StructuredOutput for T {}

fn strict(value: Value, definitions: &Value) -> Value {
    match value {
        Value::Object(map) => {
            if let Some(Value::String(path)) = map.get("$ref") {
                let name = path.trim_start_matches("#/definitions/");
                if let Some(def) = definitions.get(name) {
                    return strict(def.clone(), definitions);
                }
            }
            if let Some(Value::Array(all_of)) = map.get("allOf") {
                if all_of.len() == 1 {
                    return strict(all_of[0].clone(), definitions);
                }
            }

            let is_object = map.get("type").and_then(Value::as_str) == Some("object");
            let mut out: Map<String, Value> = map
                .into_iter()
                .map(|(k, v)| (k, strict(v, definitions)))
                .collect();

            if is_object {
                out.insert("additionalProperties".into(), Value::Bool(false));
                let required: Vec<Value> = out
                    .get("properties")
                    .and_then(Value::as_object)
                    .map(|props| props.keys().cloned().map(Value::String).collect())
                    .unwrap_or_default();
                out.insert("required".into(), Value::Array(required));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|item| strict(item, definitions))
                .collect(),
        ),
        other => other,
    }
}
