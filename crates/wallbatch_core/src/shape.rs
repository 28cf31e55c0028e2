//! Structural decoding of raw service replies.
//!
//! The service has shipped several reply layouts over time. They are told
//! apart by structure only, once, here; everything downstream works on
//! [`ResultShape`].

use serde_json::{Map, Value};

use crate::request::CounterFields;

pub(crate) type Object = Map<String, Value>;

/// Top-level fields shared by every layout.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub(crate) struct Envelope {
    pub success: Option<bool>,
    pub message: Option<String>,
    pub error: Option<String>,
}

impl Envelope {
    fn from_object(obj: &Object) -> Self {
        let error = match (text(obj, "error"), text(obj, "details")) {
            (Some(error), Some(details)) => Some(format!("{error}: {details}")),
            (error, _) => error,
        };
        Self {
            success: flag(obj, "success"),
            message: text(obj, "message"),
            error,
        }
    }
}

/// One element of a multi-item reply.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RawItem<'a> {
    pub target: Option<String>,
    pub success: Option<bool>,
    pub message: Option<String>,
    pub error: Option<String>,
    pub summary: Option<&'a Object>,
}

impl<'a> RawItem<'a> {
    fn decode(value: &'a Value) -> Self {
        let Some(obj) = value.as_object() else {
            return Self {
                target: None,
                success: None,
                message: None,
                error: Some("malformed item".to_string()),
                summary: None,
            };
        };
        let summary = summary_of(obj);
        Self {
            target: first_text(obj, &["postUrl", "url", "publicUrl"])
                .or_else(|| summary.and_then(|s| first_text(s, &["postUrl", "publicUrl"]))),
            success: flag(obj, "success"),
            message: text(obj, "message"),
            error: text(obj, "error"),
            summary,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ResultShape<'a> {
    /// `posts` or `items` array, one entry per target.
    Multi {
        envelope: Envelope,
        items: Vec<RawItem<'a>>,
    },
    /// A single sub-summary under `summary` or, in older replies, `data`.
    Single {
        envelope: Envelope,
        summary: &'a Object,
    },
    /// Legacy share reply with counters and `details` at the top level.
    Flat { envelope: Envelope, body: &'a Object },
    /// Nothing to summarize.
    Missing { envelope: Envelope },
}

impl<'a> ResultShape<'a> {
    pub(crate) fn decode(raw: &'a Value, fields: CounterFields) -> Self {
        let Some(obj) = raw.as_object() else {
            return ResultShape::Missing {
                envelope: Envelope::default(),
            };
        };
        let envelope = Envelope::from_object(obj);

        let list = ["posts", "items"]
            .iter()
            .find_map(|key| obj.get(*key).and_then(Value::as_array));
        if let Some(list) = list {
            return ResultShape::Multi {
                envelope,
                items: list.iter().map(RawItem::decode).collect(),
            };
        }

        if let Some(summary) = summary_of(obj) {
            return ResultShape::Single { envelope, summary };
        }

        let has_counters = [fields.total, fields.succeeded, fields.failed]
            .iter()
            .any(|key| obj.contains_key(*key));
        let has_details = obj.get("details").is_some_and(Value::is_array);
        if has_counters || has_details {
            return ResultShape::Flat {
                envelope,
                body: obj,
            };
        }

        ResultShape::Missing { envelope }
    }
}

/// `summary` wins over `data`; either must be an object.
pub(crate) fn summary_of(obj: &Object) -> Option<&Object> {
    obj.get("summary")
        .and_then(Value::as_object)
        .or_else(|| obj.get("data").and_then(Value::as_object))
}

/// Non-negative integer from a number or numeric string.
pub(crate) fn number(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && *f >= 0.0)
                .map(|f| f as u64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Counter field with a zero default for absent or malformed values.
pub(crate) fn count(obj: &Object, key: &str) -> u32 {
    obj.get(key)
        .and_then(number)
        .map(|n| u32::try_from(n).unwrap_or(u32::MAX))
        .unwrap_or(0)
}

pub(crate) fn flag(obj: &Object, key: &str) -> Option<bool> {
    obj.get(key).and_then(Value::as_bool)
}

pub(crate) fn text(obj: &Object, key: &str) -> Option<String> {
    obj.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned)
}

/// First non-empty string among `keys`, in order.
pub(crate) fn first_text(obj: &Object, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| text(obj, key))
}
