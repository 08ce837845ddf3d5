//! Declarative per-field input rules.
//!
//! A [`FieldSchemaMap`] is compiled once into a [`CompiledSchema`]. The
//! compiled form reports violations as a flat list of `field||message`
//! tokens, which [`CompiledSchema::check`] splits back into field/message
//! pairs while filtering the input down to the declared fields.

use anyhow::{Context, Result, bail};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;

use crate::Record;
use crate::consts::{MESSAGE_SEPARATOR, default_message};

/// JSON type a field value must have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    #[default]
    Any,
    String,
    Number,
    Integer,
    Boolean,
    Object,
    Array,
}

impl FieldType {
    fn matches(self, value: &Value) -> bool {
        match self {
            FieldType::Any => true,
            FieldType::String => value.is_string(),
            FieldType::Number => value.is_number(),
            FieldType::Integer => value.is_i64() || value.is_u64(),
            FieldType::Boolean => value.is_boolean(),
            FieldType::Object => value.is_object(),
            FieldType::Array => value.is_array(),
        }
    }
}

/// Rule for a single field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldRule {
    #[serde(rename = "type", default)]
    pub kind: FieldType,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl FieldRule {
    pub fn new(kind: FieldType) -> Self {
        Self {
            kind,
            ..Self::default()
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Field name to rule. Ordered so reports are deterministic.
pub type FieldSchemaMap = BTreeMap<String, FieldRule>;

/// Read a schema from a JSON file.
pub fn load(path: impl AsRef<Path>) -> Result<FieldSchemaMap> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read schema file {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse schema file {}", path.display()))
}

#[derive(Debug, Clone)]
struct CompiledRule {
    field: String,
    kind: FieldType,
    required: bool,
    pattern: Option<Regex>,
    /// `field||message`, composed once at compile time.
    token: String,
}

impl CompiledRule {
    fn accepts(&self, value: Option<&Value>) -> bool {
        match value {
            None | Some(Value::Null) => !self.required,
            Some(value) => {
                if !self.kind.matches(value) {
                    return false;
                }
                match (&self.pattern, value) {
                    (Some(re), Value::String(s)) => re.is_match(s),
                    (Some(_), _) => false,
                    (None, _) => true,
                }
            }
        }
    }
}

/// A schema ready to run against input records.
#[derive(Debug, Clone)]
pub struct CompiledSchema {
    rules: Vec<CompiledRule>,
}

impl CompiledSchema {
    /// Compile patterns and pre-compose each field's violation token.
    pub fn compile(schema: &FieldSchemaMap) -> Result<Self> {
        let mut rules = Vec::with_capacity(schema.len());
        for (field, rule) in schema {
            if field.contains(MESSAGE_SEPARATOR) {
                bail!("field name {field:?} must not contain {MESSAGE_SEPARATOR:?}");
            }
            let pattern = rule
                .pattern
                .as_deref()
                .map(Regex::new)
                .transpose()
                .with_context(|| format!("invalid pattern for field {field:?}"))?;
            let message = rule
                .message
                .clone()
                .unwrap_or_else(|| default_message(field));
            rules.push(CompiledRule {
                field: field.clone(),
                kind: rule.kind,
                required: rule.required,
                pattern,
                token: format!("{field}{MESSAGE_SEPARATOR}{message}"),
            });
        }
        Ok(Self { rules })
    }

    /// Names of the declared fields.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|r| r.field.as_str())
    }

    /// Flat violation report, one `field||message` token per failing field.
    pub fn violations(&self, data: &Record) -> Vec<String> {
        self.rules
            .iter()
            .filter(|rule| !rule.accepts(data.get(&rule.field)))
            .map(|rule| rule.token.clone())
            .collect()
    }

    /// Violations as `(field, message)` pairs, plus `data` filtered to the
    /// declared fields whether or not they passed.
    pub fn check(&self, data: &Record) -> (Vec<(String, String)>, Record) {
        let violations = self
            .violations(data)
            .iter()
            .map(|token| split_token(token))
            .collect();

        let filtered: Map<String, Value> = self
            .rules
            .iter()
            .filter_map(|rule| {
                data.get(&rule.field)
                    .map(|value| (rule.field.clone(), value.clone()))
            })
            .collect();

        (violations, filtered)
    }
}

/// Split on the first separator. Field names never contain it, messages may.
fn split_token(token: &str) -> (String, String) {
    match token.split_once(MESSAGE_SEPARATOR) {
        Some((field, message)) => (field.to_string(), message.to_string()),
        None => (String::new(), token.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    fn user_schema() -> FieldSchemaMap {
        FieldSchemaMap::from([
            (
                "name".to_string(),
                FieldRule::new(FieldType::String).required(),
            ),
            (
                "email".to_string(),
                FieldRule::new(FieldType::String)
                    .pattern(r"^[^@\s]+@[^@\s]+\.[^@\s]+$")
                    .message("Not an email address."),
            ),
        ])
    }

    #[test]
    fn tokens_are_composed_at_compile_time() {
        let schema = CompiledSchema::compile(&user_schema()).unwrap();
        let tokens = schema.violations(&Record::new());
        assert_eq!(tokens, vec!["name||name is invalid.".to_string()]);
    }

    #[test]
    fn split_keeps_separator_inside_message() {
        assert_eq!(
            split_token("age||must be 1||2"),
            ("age".to_string(), "must be 1||2".to_string())
        );
    }

    #[test]
    fn check_filters_undeclared_fields() {
        let schema = CompiledSchema::compile(&user_schema()).unwrap();
        let (violations, filtered) =
            schema.check(&record(json!({"name": "Bob", "email": "a@b.cd", "foo": "bar"})));
        assert!(violations.is_empty());
        assert_eq!(Value::Object(filtered), json!({"name": "Bob", "email": "a@b.cd"}));
    }

    #[test]
    fn pattern_mismatch_uses_declared_message() {
        let schema = CompiledSchema::compile(&user_schema()).unwrap();
        let (violations, filtered) = schema.check(&record(json!({"name": "Bob", "email": "a@b"})));
        assert_eq!(
            violations,
            vec![("email".to_string(), "Not an email address.".to_string())]
        );
        assert_eq!(filtered.len(), 2);
    }

    #[test]
    fn null_counts_as_missing() {
        let schema = CompiledSchema::compile(&user_schema()).unwrap();
        let (violations, _) = schema.check(&record(json!({"name": null})));
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].0, "name");
    }

    #[test]
    fn wrong_type_is_a_violation() {
        let schema = CompiledSchema::compile(&FieldSchemaMap::from([(
            "age".to_string(),
            FieldRule::new(FieldType::Integer),
        )]))
        .unwrap();
        assert_eq!(schema.violations(&record(json!({"age": 1.5}))).len(), 1);
        assert!(schema.violations(&record(json!({"age": 30}))).is_empty());
        assert!(schema.violations(&Record::new()).is_empty());
    }

    #[test]
    fn pattern_on_non_string_fails() {
        let schema = CompiledSchema::compile(&FieldSchemaMap::from([(
            "code".to_string(),
            FieldRule::new(FieldType::Any).pattern("^[0-9]+$"),
        )]))
        .unwrap();
        assert_eq!(schema.violations(&record(json!({"code": 12}))).len(), 1);
        assert!(schema.violations(&record(json!({"code": "12"}))).is_empty());
    }

    #[test]
    fn bad_pattern_fails_compile() {
        let schema = FieldSchemaMap::from([(
            "x".to_string(),
            FieldRule::new(FieldType::String).pattern("("),
        )]);
        let err = CompiledSchema::compile(&schema).unwrap_err();
        assert!(err.to_string().contains("invalid pattern"));
    }

    #[test]
    fn separator_in_field_name_is_rejected() {
        let schema = FieldSchemaMap::from([("a||b".to_string(), FieldRule::default())]);
        assert!(CompiledSchema::compile(&schema).is_err());
    }

    #[test]
    fn rule_deserializes_from_json() {
        let schema: FieldSchemaMap = serde_json::from_value(json!({
            "name": {"type": "string", "required": true},
            "email": {"type": "string", "pattern": "@", "message": "bad email"}
        }))
        .unwrap();
        assert_eq!(schema["name"], FieldRule::new(FieldType::String).required());
        assert_eq!(schema["email"].message.as_deref(), Some("bad email"));
        assert!(!schema["email"].required);
    }
}
