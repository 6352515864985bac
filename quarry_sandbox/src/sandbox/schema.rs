use serde_json::Value;

use super::error::{FileSystemError, FsErrorKind};

/// Upper bound on messages collected from a failed validation.
const MAX_ERRORS: usize = 10;

/// Structural validation hook for [`crate::sandbox::Sandbox::read_json`].
///
/// Returns the list of violations on failure.
pub trait SchemaValidator {
    fn validate(&self, value: &Value) -> Result<(), Vec<String>>;
}

impl<F> SchemaValidator for F
where
    F: Fn(&Value) -> Result<(), Vec<String>>,
{
    fn validate(&self, value: &Value) -> Result<(), Vec<String>> {
        self(value)
    }
}

/// A compiled JSON Schema document.
pub struct JsonSchema {
    validator: jsonschema::Validator,
}

impl std::fmt::Debug for JsonSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonSchema").finish_non_exhaustive()
    }
}

impl JsonSchema {
    pub fn compile(schema: &Value) -> Result<Self, FileSystemError> {
        Self::compile_from(schema, "<inline schema>")
    }

    pub(super) fn compile_from(schema: &Value, origin: &str) -> Result<Self, FileSystemError> {
        let validator = jsonschema::validator_for(schema).map_err(|e| {
            FileSystemError::new(
                FsErrorKind::SchemaValidationError,
                origin,
                format!("invalid JSON schema: {e}"),
            )
        })?;
        Ok(Self { validator })
    }
}

impl SchemaValidator for JsonSchema {
    fn validate(&self, value: &Value) -> Result<(), Vec<String>> {
        if self.validator.is_valid(value) {
            return Ok(());
        }
        Err(self
            .validator
            .iter_errors(value)
            .take(MAX_ERRORS)
            .map(|e| e.to_string())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn compiled_schema_accepts_and_rejects() {
        let schema = JsonSchema::compile(&json!({
            "type": "object",
            "required": ["query"],
            "properties": { "query": { "type": "string" } }
        }))
        .unwrap();

        assert!(schema.validate(&json!({ "query": "rust sandboxing" })).is_ok());
        let errors = schema.validate(&json!({ "query": 42 })).unwrap_err();
        assert!(!errors.is_empty());
        assert!(schema.validate(&json!({})).is_err());
    }

    #[test]
    fn invalid_schema_fails_to_compile() {
        let err = JsonSchema::compile(&json!({ "type": 12 })).unwrap_err();
        assert_eq!(err.kind(), FsErrorKind::SchemaValidationError);
    }

    #[test]
    fn closures_are_validators() {
        let has_id = |v: &Value| {
            if v.get("id").is_some() {
                Ok(())
            } else {
                Err(vec!["missing id".to_string()])
            }
        };
        assert!(has_id.validate(&json!({ "id": 1 })).is_ok());
        assert_eq!(
            has_id.validate(&json!({})).unwrap_err(),
            vec!["missing id".to_string()]
        );
    }
}
