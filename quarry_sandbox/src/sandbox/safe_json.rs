//! JSON read/write through the sandbox, hardened against prototype-pollution
//! payloads.
//!
//! Two independent layers reject the keys `__proto__`, `constructor` and
//! `prototype`:
//!
//! - a string-level scan of the raw text for the quoted tokens, run before
//!   any parsing (it also rejects documents where a quoted *value* spells one
//!   of the tokens);
//! - a key-level hook in the parser that sees keys after unescaping, so
//!   `"\u005f_proto__"` is caught too.
//!
//! A schema, when given, runs only on a document that passed both layers.

use std::cell::Cell;
use std::fmt;

use serde::de::{self, DeserializeOwned, DeserializeSeed, MapAccess, SeqAccess, Visitor};
use serde::{Deserializer, Serialize};
use serde_json::{Map, Number, Value};

use super::core::Sandbox;
use super::error::{FileSystemError, FsErrorKind};
use super::schema::{JsonSchema, SchemaValidator};
use super::types::WriteOptions;

const FORBIDDEN_KEYS: [&str; 3] = ["__proto__", "constructor", "prototype"];
const QUOTED_FORBIDDEN_KEYS: [&str; 3] = ["\"__proto__\"", "\"constructor\"", "\"prototype\""];

impl Sandbox {
    /// Read and parse a JSON document, optionally validating it against a
    /// schema.
    pub fn read_json(
        &self,
        path: &str,
        schema: Option<&dyn SchemaValidator>,
    ) -> Result<Value, FileSystemError> {
        let bytes = self.read(path)?;
        let text = std::str::from_utf8(&bytes).map_err(|_| {
            FileSystemError::new(FsErrorKind::JsonParseError, path, "document is not valid UTF-8")
        })?;

        let value = parse_json(text, path)?;

        if let Some(schema) = schema
            && let Err(violations) = schema.validate(&value)
        {
            return Err(FileSystemError::new(
                FsErrorKind::SchemaValidationError,
                path,
                format!("document does not match schema: {}", violations.join("; ")),
            ));
        }

        Ok(value)
    }

    /// Read a JSON document and convert it into `T`. A document that does
    /// not have `T`'s shape fails with `SchemaValidationError`.
    pub fn read_json_as<T: DeserializeOwned>(&self, path: &str) -> Result<T, FileSystemError> {
        let value = self.read_json(path, None)?;
        serde_json::from_value(value).map_err(|e| {
            FileSystemError::new(
                FsErrorKind::SchemaValidationError,
                path,
                format!("document has the wrong shape: {e}"),
            )
        })
    }

    /// Serialize `value` as pretty-printed JSON and write it.
    pub fn write_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        value: &T,
        options: WriteOptions,
    ) -> Result<(), FileSystemError> {
        self.validate(path)?;

        let mut bytes = serde_json::to_vec_pretty(value).map_err(|e| {
            FileSystemError::new(
                FsErrorKind::JsonSerializeError,
                path,
                format!("failed to serialize JSON: {e}"),
            )
        })?;
        bytes.push(b'\n');

        self.write(path, &bytes, options)
    }

    /// Load and compile a JSON Schema document from inside the sandbox.
    pub fn load_schema(&self, path: &str) -> Result<JsonSchema, FileSystemError> {
        let document = self.read_json(path, None)?;
        JsonSchema::compile_from(&document, path)
    }
}

/// Parse JSON text that did not come from a sandboxed file (stdin, a network
/// body) with the same pollution checks as [`Sandbox::read_json`]. `origin`
/// stands in for the path in the returned error.
pub fn parse_json(text: &str, origin: &str) -> Result<Value, FileSystemError> {
    parse_hardened(text).map_err(|rejection| rejection.into_error(origin))
}

#[derive(Debug)]
pub(super) enum JsonRejection {
    Pollution(String),
    Syntax(serde_json::Error),
}

impl JsonRejection {
    fn into_error(self, path: &str) -> FileSystemError {
        match self {
            JsonRejection::Pollution(key) => FileSystemError::new(
                FsErrorKind::PrototypePollutionDetected,
                path,
                format!("document contains forbidden key \"{key}\""),
            ),
            JsonRejection::Syntax(e) => FileSystemError::new(
                FsErrorKind::JsonParseError,
                path,
                format!("invalid JSON: {e}"),
            ),
        }
    }
}

/// Scan, then parse with the key hook. No value is built for a document that
/// fails the scan.
pub(super) fn parse_hardened(text: &str) -> Result<Value, JsonRejection> {
    if let Some(token) = QUOTED_FORBIDDEN_KEYS.iter().find(|t| text.contains(*t)) {
        return Err(JsonRejection::Pollution(token.trim_matches('"').to_string()));
    }

    let tripped = Cell::new(None);
    let mut deserializer = serde_json::Deserializer::from_str(text);
    let parsed = GuardedValue { tripped: &tripped }
        .deserialize(&mut deserializer)
        .and_then(|value| deserializer.end().map(|()| value));

    match (parsed, tripped.take()) {
        (_, Some(key)) => Err(JsonRejection::Pollution(key)),
        (Ok(value), None) => Ok(value),
        (Err(e), None) => Err(JsonRejection::Syntax(e)),
    }
}

/// Builds a `serde_json::Value`, refusing forbidden object keys as they are
/// read.
#[derive(Clone, Copy)]
struct GuardedValue<'a> {
    tripped: &'a Cell<Option<String>>,
}

impl<'de> DeserializeSeed<'de> for GuardedValue<'_> {
    type Value = Value;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<Value, D::Error> {
        deserializer.deserialize_any(self)
    }
}

impl<'de> Visitor<'de> for GuardedValue<'_> {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("any JSON value")
    }

    fn visit_bool<E>(self, v: bool) -> Result<Value, E> {
        Ok(Value::Bool(v))
    }

    fn visit_i64<E>(self, v: i64) -> Result<Value, E> {
        Ok(Value::Number(v.into()))
    }

    fn visit_u64<E>(self, v: u64) -> Result<Value, E> {
        Ok(Value::Number(v.into()))
    }

    fn visit_f64<E>(self, v: f64) -> Result<Value, E> {
        Ok(Number::from_f64(v).map_or(Value::Null, Value::Number))
    }

    fn visit_str<E>(self, v: &str) -> Result<Value, E> {
        Ok(Value::String(v.to_owned()))
    }

    fn visit_string<E>(self, v: String) -> Result<Value, E> {
        Ok(Value::String(v))
    }

    fn visit_unit<E>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_none<E>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Value, D::Error> {
        self.deserialize(deserializer)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Value, A::Error> {
        let mut items = Vec::new();
        while let Some(item) = seq.next_element_seed(self)? {
            items.push(item);
        }
        Ok(Value::Array(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Value, A::Error> {
        let mut object = Map::new();
        while let Some(key) = map.next_key::<String>()? {
            if FORBIDDEN_KEYS.contains(&key.as_str()) {
                let message = format!("forbidden object key \"{key}\"");
                self.tripped.set(Some(key));
                return Err(de::Error::custom(message));
            }
            let value = map.next_value_seed(self)?;
            object.insert(key, value);
        }
        Ok(Value::Object(object))
    }
}
