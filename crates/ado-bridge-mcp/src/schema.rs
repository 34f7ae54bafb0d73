// crates/ado-bridge-mcp/src/schema.rs
// ============================================================================
// Module: Tool Input Schemas
// Description: Declarative tool input shapes and their JSON Schema form.
// Purpose: Validate tool arguments before any network call is made.
// Dependencies: jsonschema, serde_json, thiserror
// ============================================================================

//! ## Overview
//! Tools describe their inputs as an [`InputSchema`] of typed fields. The
//! same description is published to clients through `tools/list` and
//! compiled into a Draft 2020-12 validator. Unknown fields are rejected.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use jsonschema::Draft;
use jsonschema::Validator;
use serde_json::Map;
use serde_json::Value;
use serde_json::json;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// JSON Schema dialect published with tool schemas.
const SCHEMA_DIALECT: &str = "https://json-schema.org/draft/2020-12/schema";

/// Pattern requiring at least one non-whitespace character.
const NON_BLANK_PATTERN: &str = "\\S";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Schema construction and validation failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// The schema itself could not be compiled.
    #[error("invalid schema: {0}")]
    Invalid(String),
    /// The input did not conform to the schema.
    #[error("{0}")]
    Violations(String),
}

// ============================================================================
// SECTION: Field Model
// ============================================================================

/// Value type of a tool input field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// UTF-8 string.
    String {
        /// Minimum length in characters.
        min_length: Option<u64>,
        /// Requires at least one non-whitespace character.
        non_blank: bool,
    },
    /// Signed integer.
    Integer {
        /// Inclusive lower bound.
        minimum: Option<i64>,
        /// Inclusive upper bound.
        maximum: Option<i64>,
    },
    /// Boolean flag.
    Boolean,
}

impl FieldKind {
    /// Non-blank string field.
    #[must_use]
    pub const fn text() -> Self {
        Self::String { min_length: Some(1), non_blank: true }
    }

    /// Renders the field type as a JSON Schema fragment.
    fn to_json_schema(self, description: &str) -> Value {
        let mut schema = Map::new();
        match self {
            Self::String { min_length, non_blank } => {
                schema.insert("type".to_string(), json!("string"));
                if let Some(min_length) = min_length {
                    schema.insert("minLength".to_string(), json!(min_length));
                }
                if non_blank {
                    schema.insert("pattern".to_string(), json!(NON_BLANK_PATTERN));
                }
            }
            Self::Integer { minimum, maximum } => {
                schema.insert("type".to_string(), json!("integer"));
                if let Some(minimum) = minimum {
                    schema.insert("minimum".to_string(), json!(minimum));
                }
                if let Some(maximum) = maximum {
                    schema.insert("maximum".to_string(), json!(maximum));
                }
            }
            Self::Boolean => {
                schema.insert("type".to_string(), json!("boolean"));
            }
        }
        if !description.is_empty() {
            schema.insert("description".to_string(), json!(description));
        }
        Value::Object(schema)
    }
}

/// One named tool input field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    /// Field name.
    pub name: &'static str,
    /// Human-readable description.
    pub description: &'static str,
    /// Value type and constraints.
    pub kind: FieldKind,
    /// Whether the field must be present.
    pub required: bool,
}

impl FieldSpec {
    /// Builds a required field.
    #[must_use]
    pub const fn required(name: &'static str, description: &'static str, kind: FieldKind) -> Self {
        Self { name, description, kind, required: true }
    }

    /// Builds an optional field.
    #[must_use]
    pub const fn optional(name: &'static str, description: &'static str, kind: FieldKind) -> Self {
        Self { name, description, kind, required: false }
    }
}

// ============================================================================
// SECTION: Input Schema
// ============================================================================

/// Declarative object schema for tool arguments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputSchema {
    /// Declared fields, in declaration order.
    fields: Vec<FieldSpec>,
    /// Groups of fields where at least one member must be present.
    one_of_required: Vec<Vec<&'static str>>,
}

impl InputSchema {
    /// Schema accepting only the empty object.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Adds a field.
    #[must_use]
    pub fn field(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }

    /// Requires at least one of `names` to be present.
    #[must_use]
    pub fn require_any(mut self, names: &[&'static str]) -> Self {
        self.one_of_required.push(names.to_vec());
        self
    }

    /// Returns declared fields.
    #[must_use]
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Renders the schema as a JSON Schema object.
    #[must_use]
    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::new();
        for field in &self.fields {
            properties.insert(field.name.to_string(), field.kind.to_json_schema(field.description));
        }
        let required: Vec<&str> =
            self.fields.iter().filter(|field| field.required).map(|field| field.name).collect();
        let mut schema = Map::new();
        schema.insert("$schema".to_string(), json!(SCHEMA_DIALECT));
        schema.insert("type".to_string(), json!("object"));
        schema.insert("properties".to_string(), Value::Object(properties));
        schema.insert("required".to_string(), json!(required));
        schema.insert("additionalProperties".to_string(), json!(false));
        match self.one_of_required.as_slice() {
            [] => {}
            [group] => {
                schema.insert("anyOf".to_string(), any_of_required(group));
            }
            groups => {
                let all: Vec<Value> =
                    groups.iter().map(|group| json!({ "anyOf": any_of_required(group) })).collect();
                schema.insert("allOf".to_string(), Value::Array(all));
            }
        }
        Value::Object(schema)
    }

    /// Compiles the schema into a validator.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Invalid`] when the rendered schema does not compile.
    pub fn compile(&self) -> Result<CompiledSchema, SchemaError> {
        let document = self.to_json_schema();
        let validator = jsonschema::options()
            .with_draft(Draft::Draft202012)
            .build(&document)
            .map_err(|err| SchemaError::Invalid(err.to_string()))?;
        Ok(CompiledSchema { document, validator })
    }
}

/// Builds an `anyOf` array requiring one member of `group`.
fn any_of_required(group: &[&'static str]) -> Value {
    Value::Array(group.iter().map(|name| json!({ "required": [name] })).collect())
}

// ============================================================================
// SECTION: Compiled Schema
// ============================================================================

/// Compiled validator together with its published document.
pub struct CompiledSchema {
    /// Published JSON Schema document.
    document: Value,
    /// Compiled validator.
    validator: Validator,
}

impl CompiledSchema {
    /// Returns the published JSON Schema document.
    #[must_use]
    pub const fn document(&self) -> &Value {
        &self.document
    }

    /// Validates `input`, reporting every violation in one message.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Violations`] when the input does not conform.
    pub fn validate(&self, input: &Value) -> Result<(), SchemaError> {
        let messages: Vec<String> =
            self.validator.iter_errors(input).map(|err| err.to_string()).collect();
        if messages.is_empty() {
            Ok(())
        } else {
            Err(SchemaError::Violations(messages.join("; ")))
        }
    }
}

impl fmt::Debug for CompiledSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledSchema").field("document", &self.document).finish_non_exhaustive()
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
