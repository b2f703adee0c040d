// Record identifier module
// One comparison policy per resource: numeric ids or text ids, never mixed

use serde_json::Value;
use std::fmt;

use crate::config::IdPolicy;
use crate::error::ApiError;

/// Identifier of a stored record
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RecordId {
    Number(i64),
    Text(String),
}

impl RecordId {
    /// Read an id from a record field, enforcing the resource's policy
    pub fn from_value(value: &Value, policy: IdPolicy) -> Result<Self, ApiError> {
        match (policy, value) {
            (IdPolicy::Numeric, Value::Number(n)) => n
                .as_i64()
                .map(Self::Number)
                .ok_or_else(|| ApiError::Validation(format!("Invalid id: {n}"))),
            (IdPolicy::Text, Value::String(s)) if !s.is_empty() => Ok(Self::Text(s.clone())),
            (_, other) => Err(ApiError::Validation(format!("Invalid id: {other}"))),
        }
    }

    /// Lenient read used when scanning stored data: integers and strings only
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64().map(Self::Number),
            Value::String(s) if !s.is_empty() => Some(Self::Text(s.clone())),
            _ => None,
        }
    }

    /// Parse the `<id>` path segment
    pub fn parse_segment(segment: &str, policy: IdPolicy) -> Result<Self, ApiError> {
        match policy {
            IdPolicy::Numeric => segment
                .parse::<i64>()
                .map(Self::Number)
                .map_err(|_| ApiError::Validation(format!("Invalid id: {segment}"))),
            IdPolicy::Text if segment.is_empty() => {
                Err(ApiError::Validation("Invalid id: empty".to_string()))
            }
            IdPolicy::Text => Ok(Self::Text(segment.to_string())),
        }
    }

    /// True when the id survives as an undecoded path segment: numbers
    /// always, text only if it uses unreserved URI characters
    pub fn is_path_safe(&self) -> bool {
        match self {
            Self::Number(_) => true,
            Self::Text(s) => s
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~')),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Self::Number(n) => Value::from(*n),
            Self::Text(s) => Value::from(s.as_str()),
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_numeric_segment() {
        assert_eq!(
            RecordId::parse_segment("42", IdPolicy::Numeric).unwrap(),
            RecordId::Number(42)
        );
        assert!(matches!(
            RecordId::parse_segment("abc", IdPolicy::Numeric),
            Err(ApiError::Validation(_))
        ));
        assert!(RecordId::parse_segment("4.2", IdPolicy::Numeric).is_err());
    }

    #[test]
    fn test_text_segment_is_verbatim() {
        assert_eq!(
            RecordId::parse_segment("42", IdPolicy::Text).unwrap(),
            RecordId::Text("42".to_string())
        );
    }

    #[test]
    fn test_path_safe_text() {
        assert!(RecordId::Text("3f2a-b_c.d~e".into()).is_path_safe());
        assert!(!RecordId::Text("a b".into()).is_path_safe());
        assert!(!RecordId::Text("a%20b".into()).is_path_safe());
        assert!(RecordId::Number(-3).is_path_safe());
    }

    #[test]
    fn test_policy_does_not_mix_types() {
        assert!(RecordId::from_value(&json!("7"), IdPolicy::Numeric).is_err());
        assert!(RecordId::from_value(&json!(7), IdPolicy::Text).is_err());
        assert!(RecordId::from_value(&json!(7.5), IdPolicy::Numeric).is_err());
        assert_eq!(
            RecordId::from_value(&json!(7), IdPolicy::Numeric).unwrap(),
            RecordId::Number(7)
        );
        assert_ne!(RecordId::Number(7), RecordId::Text("7".to_string()));
    }
}
