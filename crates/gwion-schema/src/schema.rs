//! Explicit JSON Schema descriptions.
//!
//! Schemas are built with an explicit description tree rather than derived
//! from type reflection, so the orchestrator can compose them dynamically
//! (tool inputs, thought fields, result envelopes) and render them
//! deterministically for providers.

use serde_json::{Map, Value, json};

// ─────────────────────────────────────────────────────────────────────────────
// Schema
// ─────────────────────────────────────────────────────────────────────────────

/// A JSON Schema description.
///
/// Covers the shapes this system sends to providers: objects (always with
/// `additionalProperties: false`), arrays, strings, numbers, integers,
/// booleans, string enums, and tagged unions rendered as an object whose
/// permitted top-level keys are the case names.
#[derive(Debug, Clone, PartialEq)]
pub enum Schema {
    /// An object with a fixed field set.
    Object(ObjectSchema),
    /// A homogeneous array.
    Array(ArraySchema),
    /// A string, optionally constrained.
    Str(StringSchema),
    /// A floating-point number, optionally range-constrained.
    Number(NumberSchema),
    /// An integer, optionally range-constrained.
    Integer(NumberSchema),
    /// A boolean.
    Boolean { description: Option<String> },
    /// A string restricted to a fixed value set.
    Enum {
        values: Vec<String>,
        description: Option<String>,
    },
    /// A tagged union: an object whose permitted keys are the case names,
    /// each mapping to that case's schema.
    Union(UnionSchema),
}

/// Object schema: ordered fields, required list, closed to extra keys.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectSchema {
    pub description: Option<String>,
    /// Field name → schema, in declaration order.
    pub fields: Vec<(String, Schema)>,
    /// Names of required fields.
    pub required: Vec<String>,
}

/// Array schema with optional length bounds.
#[derive(Debug, Clone, PartialEq)]
pub struct ArraySchema {
    pub description: Option<String>,
    pub items: Box<Schema>,
    pub min_items: Option<usize>,
    pub max_items: Option<usize>,
}

/// String schema with optional length and pattern constraints.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StringSchema {
    pub description: Option<String>,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub pattern: Option<String>,
}

/// Numeric schema with optional range constraints.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NumberSchema {
    pub description: Option<String>,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
}

/// Union schema: case name → case schema.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnionSchema {
    pub description: Option<String>,
    pub cases: Vec<(String, Schema)>,
}

impl Schema {
    /// An empty object schema; add fields with [`Schema::field`].
    pub fn object() -> Self {
        Schema::Object(ObjectSchema::default())
    }

    /// An unconstrained string schema.
    pub fn string() -> Self {
        Schema::Str(StringSchema::default())
    }

    /// An unconstrained number schema.
    pub fn number() -> Self {
        Schema::Number(NumberSchema::default())
    }

    /// An unconstrained integer schema.
    pub fn integer() -> Self {
        Schema::Integer(NumberSchema::default())
    }

    /// A boolean schema.
    pub fn boolean() -> Self {
        Schema::Boolean { description: None }
    }

    /// A string enum schema over the given values.
    pub fn enumeration<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Schema::Enum {
            values: values.into_iter().map(Into::into).collect(),
            description: None,
        }
    }

    /// An array schema over the given item schema.
    pub fn array(items: Schema) -> Self {
        Schema::Array(ArraySchema {
            description: None,
            items: Box::new(items),
            min_items: None,
            max_items: None,
        })
    }

    /// An empty union schema; add cases with [`Schema::case`].
    pub fn union() -> Self {
        Schema::Union(UnionSchema::default())
    }

    /// Attach a description to any schema node.
    pub fn describe(mut self, text: impl Into<String>) -> Self {
        let text = text.into();
        match &mut self {
            Schema::Object(o) => o.description = Some(text),
            Schema::Array(a) => a.description = Some(text),
            Schema::Str(s) => s.description = Some(text),
            Schema::Number(n) | Schema::Integer(n) => n.description = Some(text),
            Schema::Boolean { description } => *description = Some(text),
            Schema::Enum { description, .. } => *description = Some(text),
            Schema::Union(u) => u.description = Some(text),
        }
        self
    }

    /// Add a required field to an object schema.
    ///
    /// Panics if `self` is not an object; field composition is a
    /// construction-time concern, not a runtime one.
    pub fn field(mut self, name: impl Into<String>, schema: Schema) -> Self {
        let name = name.into();
        match &mut self {
            Schema::Object(o) => {
                o.required.push(name.clone());
                o.fields.push((name, schema));
            }
            _ => panic!("Schema::field is only valid on object schemas"),
        }
        self
    }

    /// Add an optional field to an object schema.
    pub fn optional_field(mut self, name: impl Into<String>, schema: Schema) -> Self {
        match &mut self {
            Schema::Object(o) => o.fields.push((name.into(), schema)),
            _ => panic!("Schema::optional_field is only valid on object schemas"),
        }
        self
    }

    /// Add a case to a union schema.
    pub fn case(mut self, name: impl Into<String>, schema: Schema) -> Self {
        match &mut self {
            Schema::Union(u) => u.cases.push((name.into(), schema)),
            _ => panic!("Schema::case is only valid on union schemas"),
        }
        self
    }

    /// Constrain a string schema's length.
    pub fn length(mut self, min: Option<usize>, max: Option<usize>) -> Self {
        match &mut self {
            Schema::Str(s) => {
                s.min_length = min;
                s.max_length = max;
            }
            _ => panic!("Schema::length is only valid on string schemas"),
        }
        self
    }

    /// Constrain a string schema to a regex pattern.
    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        match &mut self {
            Schema::Str(s) => s.pattern = Some(pattern.into()),
            _ => panic!("Schema::pattern is only valid on string schemas"),
        }
        self
    }

    /// Constrain a numeric schema's range.
    pub fn range(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        match &mut self {
            Schema::Number(n) | Schema::Integer(n) => {
                n.minimum = min;
                n.maximum = max;
            }
            _ => panic!("Schema::range is only valid on numeric schemas"),
        }
        self
    }

    /// Constrain an array schema's item count.
    pub fn items(mut self, min: Option<usize>, max: Option<usize>) -> Self {
        match &mut self {
            Schema::Array(a) => {
                a.min_items = min;
                a.max_items = max;
            }
            _ => panic!("Schema::items is only valid on array schemas"),
        }
        self
    }

    /// Render this schema to a JSON Schema value.
    ///
    /// Field sets are exact; objects are always closed with
    /// `additionalProperties: false`.
    pub fn to_value(&self) -> Value {
        match self {
            Schema::Object(o) => render_object(&o.description, &o.fields, &o.required),
            Schema::Array(a) => {
                let mut map = Map::new();
                map.insert("type".into(), json!("array"));
                if let Some(ref d) = a.description {
                    map.insert("description".into(), json!(d));
                }
                map.insert("items".into(), a.items.to_value());
                if let Some(n) = a.min_items {
                    map.insert("minItems".into(), json!(n));
                }
                if let Some(n) = a.max_items {
                    map.insert("maxItems".into(), json!(n));
                }
                Value::Object(map)
            }
            Schema::Str(s) => {
                let mut map = Map::new();
                map.insert("type".into(), json!("string"));
                if let Some(ref d) = s.description {
                    map.insert("description".into(), json!(d));
                }
                if let Some(n) = s.min_length {
                    map.insert("minLength".into(), json!(n));
                }
                if let Some(n) = s.max_length {
                    map.insert("maxLength".into(), json!(n));
                }
                if let Some(ref p) = s.pattern {
                    map.insert("pattern".into(), json!(p));
                }
                Value::Object(map)
            }
            Schema::Number(n) => render_numeric("number", n),
            Schema::Integer(n) => render_numeric("integer", n),
            Schema::Boolean { description } => {
                let mut map = Map::new();
                map.insert("type".into(), json!("boolean"));
                if let Some(ref d) = description {
                    map.insert("description".into(), json!(d));
                }
                Value::Object(map)
            }
            Schema::Enum {
                values,
                description,
            } => {
                let mut map = Map::new();
                map.insert("type".into(), json!("string"));
                if let Some(ref d) = description {
                    map.insert("description".into(), json!(d));
                }
                map.insert("enum".into(), json!(values));
                Value::Object(map)
            }
            Schema::Union(u) => {
                // One case key populated at a time; which one is the tag.
                let mut value = render_object(&u.description, &u.cases, &[]);
                if let Value::Object(ref mut map) = value {
                    map.insert("minProperties".into(), json!(1));
                    map.insert("maxProperties".into(), json!(1));
                }
                value
            }
        }
    }
}

fn render_object(
    description: &Option<String>,
    fields: &[(String, Schema)],
    required: &[String],
) -> Value {
    let mut map = Map::new();
    map.insert("type".into(), json!("object"));
    if let Some(ref d) = description {
        map.insert("description".into(), json!(d));
    }
    let mut properties = Map::new();
    for (name, schema) in fields {
        properties.insert(name.clone(), schema.to_value());
    }
    map.insert("properties".into(), Value::Object(properties));
    if !required.is_empty() {
        map.insert("required".into(), json!(required));
    }
    map.insert("additionalProperties".into(), json!(false));
    Value::Object(map)
}

fn render_numeric(type_name: &str, n: &NumberSchema) -> Value {
    let mut map = Map::new();
    map.insert("type".into(), json!(type_name));
    if let Some(ref d) = n.description {
        map.insert("description".into(), json!(d));
    }
    if let Some(min) = n.minimum {
        map.insert("minimum".into(), json!(min));
    }
    if let Some(max) = n.maximum {
        map.insert("maximum".into(), json!(max));
    }
    Value::Object(map)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
