//! Tool input schemas and argument validation.
//!
//! A tool declares its arguments as an [`InputSchema`]. The schema renders to
//! the JSON Schema advertised in `tools/list` and validates the arguments of
//! every call before the handler runs.

use serde_json::{Map, Value, json};
use std::fmt;

/// Primitive argument types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgType {
    String,
    Integer,
    Number,
    Boolean,
    Object,
    Array,
}

impl ArgType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Object => "object",
            Self::Array => "array",
        }
    }

    /// Whether a JSON value has this type.
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Object => value.is_object(),
            Self::Array => value.is_array(),
        }
    }
}

impl fmt::Display for ArgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One declared argument.
#[derive(Debug, Clone)]
pub struct Property {
    pub name: String,
    pub arg_type: ArgType,
    pub description: Option<String>,
    pub required: bool,
}

/// Declared arguments of a tool, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct InputSchema {
    properties: Vec<Property>,
}

impl InputSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a required argument.
    pub fn required(self, name: impl Into<String>, arg_type: ArgType, description: impl Into<String>) -> Self {
        self.property(name, arg_type, Some(description.into()), true)
    }

    /// Declare an optional argument.
    pub fn optional(self, name: impl Into<String>, arg_type: ArgType, description: impl Into<String>) -> Self {
        self.property(name, arg_type, Some(description.into()), false)
    }

    fn property(
        mut self,
        name: impl Into<String>,
        arg_type: ArgType,
        description: Option<String>,
        required: bool,
    ) -> Self {
        let name = name.into();
        // Redeclaring a name replaces the earlier declaration.
        self.properties.retain(|p| p.name != name);
        self.properties.push(Property {
            name,
            arg_type,
            description,
            required,
        });
        self
    }

    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    /// Render as JSON Schema. Undeclared arguments are disallowed.
    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::new();
        for p in &self.properties {
            let mut prop = json!({ "type": p.arg_type.as_str() });
            if let Some(ref description) = p.description {
                prop["description"] = json!(description);
            }
            properties.insert(p.name.clone(), prop);
        }
        let required: Vec<&str> = self
            .properties
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
            "additionalProperties": false
        })
    }

    /// Validate call arguments, returning them as an object.
    ///
    /// A missing or `null` arguments value counts as an empty object.
    pub fn validate(&self, arguments: &Value) -> Result<Map<String, Value>, String> {
        let args = match arguments {
            Value::Null => Map::new(),
            Value::Object(map) => map.clone(),
            other => return Err(format!("arguments must be an object, got {}", json_type(other))),
        };

        if let Some(unknown) = args.keys().find(|k| !self.properties.iter().any(|p| &p.name == *k)) {
            return Err(format!("unknown argument '{unknown}'"));
        }

        for p in &self.properties {
            match args.get(&p.name) {
                None if p.required => {
                    return Err(format!("missing required argument '{}'", p.name));
                }
                None => {}
                Some(value) if !p.arg_type.matches(value) => {
                    return Err(format!(
                        "argument '{}' must be {}, got {}",
                        p.name,
                        p.arg_type,
                        json_type(value)
                    ));
                }
                Some(_) => {}
            }
        }

        Ok(args)
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> InputSchema {
        InputSchema::new()
            .required("input", ArgType::String, "Text to echo")
            .optional("count", ArgType::Integer, "Repetitions")
            .optional("ratio", ArgType::Number, "Scale")
    }

    #[test]
    fn test_valid_arguments() {
        let args = schema()
            .validate(&json!({"input": "hello", "count": 2, "ratio": 0.5}))
            .unwrap();
        assert_eq!(args["input"], "hello");

        // Integers are numbers too.
        assert!(schema().validate(&json!({"input": "x", "ratio": 3})).is_ok());
    }

    #[test]
    fn test_rejections() {
        let s = schema();
        assert_eq!(
            s.validate(&json!({})).unwrap_err(),
            "missing required argument 'input'"
        );
        assert_eq!(
            s.validate(&json!({"input": "x", "extra": 1})).unwrap_err(),
            "unknown argument 'extra'"
        );
        assert_eq!(
            s.validate(&json!({"input": "x", "count": 1.5})).unwrap_err(),
            "argument 'count' must be integer, got number"
        );
        assert!(s.validate(&json!(["input"])).is_err());
    }

    #[test]
    fn test_null_arguments_are_empty() {
        let empty = InputSchema::new();
        assert!(empty.validate(&Value::Null).unwrap().is_empty());
        assert!(schema().validate(&Value::Null).is_err());
    }

    #[test]
    fn test_rendered_schema_agrees_with_validation() {
        let s = schema();
        let rendered = s.to_json_schema();
        assert_eq!(rendered["additionalProperties"], false);
        assert_eq!(rendered["required"], json!(["input"]));

        let validator = jsonschema::validator_for(&rendered).unwrap();
        for sample in [
            json!({"input": "hello"}),
            json!({"input": "hello", "count": 3}),
            json!({}),
            json!({"input": 5}),
            json!({"input": "x", "unexpected": true}),
        ] {
            assert_eq!(
                validator.is_valid(&sample),
                s.validate(&sample).is_ok(),
                "disagreement on {sample}"
            );
        }
    }
}
