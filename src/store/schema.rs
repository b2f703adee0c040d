//! Resource schema
//!
//! Explicit record rules applied by the collection before it stores anything:
//! defaults, required fields, unique fields and timestamps. Derived fields are
//! rendered on read and never persisted.

use chrono::{SecondsFormat, Utc};
use serde_json::Value;

use super::Record;
use crate::config::{DerivedField, FieldDefault, IdPolicy, ResourceConfig};
use crate::error::ApiError;

pub const CREATED_AT: &str = "createdAt";
pub const UPDATED_AT: &str = "updatedAt";

/// Parsed form of a derived field template
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Field(String),
}

#[derive(Debug, Clone)]
struct Derived {
    name: String,
    segments: Vec<Segment>,
}

/// Validation and shaping rules for one resource
#[derive(Debug, Clone)]
pub struct Schema {
    pub name: String,
    pub label: String,
    pub id_field: String,
    pub id_policy: IdPolicy,
    required: Vec<String>,
    unique: Vec<String>,
    defaults: Vec<FieldDefault>,
    timestamps: bool,
    derived: Vec<Derived>,
}

impl Schema {
    pub fn from_config(resource: &ResourceConfig) -> Self {
        let name = resource.name.trim_matches('/').to_string();
        let label = resource
            .label
            .clone()
            .unwrap_or_else(|| default_label(&name));

        Self {
            label,
            name,
            id_field: resource.id_field.clone(),
            id_policy: resource.id_policy,
            required: resource.required.clone(),
            unique: resource.unique.clone(),
            defaults: resource.defaults.clone(),
            timestamps: resource.timestamps,
            derived: resource.derived.iter().map(parse_derived).collect(),
        }
    }

    /// JSON key used for a single record in responses, e.g. "user"
    pub fn item_key(&self) -> String {
        self.label.to_lowercase()
    }

    /// Plural display name, e.g. "Users"
    pub fn plural_label(&self) -> String {
        capitalize(&self.name)
    }

    /// Fill absent (or null) fields from the configured defaults
    pub fn apply_defaults(&self, record: &mut Record) {
        for default in &self.defaults {
            let missing = record.get(&default.field).is_none_or(Value::is_null);
            if missing {
                record.insert(default.field.clone(), default.value.clone());
            }
        }
    }

    /// Presence check: absent, null and empty strings all count as missing
    pub fn check_required(&self, record: &Record) -> Result<(), ApiError> {
        let missing: Vec<&str> = self
            .required
            .iter()
            .filter(|field| !is_present(record.get(field.as_str())))
            .map(String::as_str)
            .collect();

        match missing.as_slice() {
            [] => Ok(()),
            [one] => Err(ApiError::Validation(format!("{one} is required"))),
            [init @ .., last] => Err(ApiError::Validation(format!(
                "{} and {last} are required",
                init.join(", ")
            ))),
        }
    }

    /// Reject a record whose unique field values already occur in `existing`.
    /// `skip` is the index of the record being replaced, if any.
    pub fn check_unique(
        &self,
        record: &Record,
        existing: &[Record],
        skip: Option<usize>,
    ) -> Result<(), ApiError> {
        for field in &self.unique {
            let Some(value) = record.get(field).filter(|v| !v.is_null()) else {
                continue;
            };
            let taken = existing
                .iter()
                .enumerate()
                .any(|(i, other)| Some(i) != skip && other.get(field) == Some(value));
            if taken {
                return Err(ApiError::Validation(format!("{field} already exists")));
            }
        }
        Ok(())
    }

    /// Set `createdAt`/`updatedAt` on a new record
    pub fn stamp_created(&self, record: &mut Record) {
        if self.timestamps {
            let now = Value::from(now_rfc3339());
            record.insert(CREATED_AT.to_string(), now.clone());
            record.insert(UPDATED_AT.to_string(), now);
        }
    }

    /// Set `updatedAt` on a replacement, carrying `createdAt` over from the old record
    pub fn stamp_updated(&self, record: &mut Record, previous: &Record) {
        if self.timestamps {
            if let Some(created) = previous.get(CREATED_AT) {
                record.insert(CREATED_AT.to_string(), created.clone());
            }
            record.insert(UPDATED_AT.to_string(), Value::from(now_rfc3339()));
        }
    }

    /// Drop client-supplied values for derived names
    pub fn strip_derived(&self, record: &mut Record) {
        for derived in &self.derived {
            record.remove(&derived.name);
        }
    }

    /// Copy of `record` with derived fields rendered
    pub fn present(&self, record: &Record) -> Record {
        let mut out = record.clone();
        for derived in &self.derived {
            out.insert(
                derived.name.clone(),
                Value::from(render(&derived.segments, record)),
            );
        }
        out
    }
}

fn is_present(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(_) => true,
    }
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

/// "users" -> "User"
fn default_label(name: &str) -> String {
    capitalize(name.strip_suffix('s').filter(|s| !s.is_empty()).unwrap_or(name))
}

fn parse_derived(field: &DerivedField) -> Derived {
    Derived {
        name: field.name.clone(),
        segments: parse_template(&field.template),
    }
}

/// Split "{first} {last}" into literal and field segments.
/// An unclosed brace is kept as literal text.
fn parse_template(template: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        let Some(close) = rest[open..].find('}') else {
            break;
        };
        if open > 0 {
            segments.push(Segment::Literal(rest[..open].to_string()));
        }
        segments.push(Segment::Field(rest[open + 1..open + close].to_string()));
        rest = &rest[open + close + 1..];
    }
    if !rest.is_empty() {
        segments.push(Segment::Literal(rest.to_string()));
    }
    segments
}

fn render(segments: &[Segment], record: &Record) -> String {
    segments
        .iter()
        .map(|segment| match segment {
            Segment::Literal(text) => text.clone(),
            Segment::Field(name) => match record.get(name) {
                None | Some(Value::Null) => String::new(),
                Some(Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
            },
        })
        .collect()
}
