//! Typed parameter values and the string conversions that produce them.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;

use crate::error::ConversionError;

/// Parameter type a binding converts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetType {
    Text,
    Int,
    Long,
    Bool,
    Decimal,
    /// Calendar date, `YYYY-MM-DD`.
    Date,
    /// RFC 3339 timestamp, normalized to UTC.
    DateTime,
}

impl TargetType {
    /// Short name used in error messages.
    pub fn name(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Int => "int",
            Self::Long => "long",
            Self::Bool => "bool",
            Self::Decimal => "decimal",
            Self::Date => "date",
            Self::DateTime => "datetime",
        }
    }

    /// Value bound when there is nothing to convert: zero for the
    /// primitive numeric and boolean types, `Null` for the rest.
    pub fn null_value(self) -> Value {
        match self {
            Self::Int => Value::Int(0),
            Self::Long => Value::Long(0),
            Self::Bool => Value::Bool(false),
            Self::Text | Self::Decimal | Self::Date | Self::DateTime => Value::Null,
        }
    }
}

/// A converted parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Text(String),
    Int(i32),
    Long(i64),
    Bool(bool),
    Decimal(Decimal),
    Date(NaiveDate),
    DateTime(DateTime<Utc>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Self::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Long(n) => Some(*n),
            Self::Int(n) => Some(i64::from(*n)),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Self::Decimal(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Self::Date(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::DateTime(d) => Some(*d),
            _ => None,
        }
    }
}

/// Convert a raw captured string to `target`.
///
/// `None` yields the target's null value. Numeric, date and boolean
/// input is trimmed before parsing; text passes through untouched.
pub fn convert(raw: Option<&str>, target: TargetType) -> Result<Value, ConversionError> {
    let Some(raw) = raw else {
        return Ok(target.null_value());
    };

    let fail = |reason: String| ConversionError {
        value: raw.to_string(),
        target: target.name(),
        reason,
    };
    let trimmed = raw.trim();

    match target {
        TargetType::Text => Ok(Value::Text(raw.to_string())),
        TargetType::Int => trimmed
            .parse::<i32>()
            .map(Value::Int)
            .map_err(|e| fail(e.to_string())),
        TargetType::Long => trimmed
            .parse::<i64>()
            .map(Value::Long)
            .map_err(|e| fail(e.to_string())),
        TargetType::Bool => parse_bool(trimmed)
            .map(Value::Bool)
            .ok_or_else(|| fail("expected true/false, yes/no or 1/0".into())),
        TargetType::Decimal => Decimal::from_str(trimmed)
            .or_else(|_| Decimal::from_scientific(trimmed))
            .map(Value::Decimal)
            .map_err(|e| fail(e.to_string())),
        TargetType::Date => NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
            .map(Value::Date)
            .map_err(|e| fail(e.to_string())),
        TargetType::DateTime => DateTime::parse_from_rfc3339(trimmed)
            .map(|dt| Value::DateTime(dt.with_timezone(&Utc)))
            .map_err(|e| fail(e.to_string())),
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Some(true),
        "false" | "no" | "0" => Some(false),
        _ => None,
    }
}

// ── Bound arguments ─────────────────────────────────────────────────

/// Arguments bound for one handler invocation, in binding order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args {
    values: Vec<Value>,
}

impl Args {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn as_slice(&self) -> &[Value] {
        &self.values
    }

    /// Text argument at `index`; `Null` reads as the empty string.
    pub fn text(&self, index: usize) -> anyhow::Result<&str> {
        match self.values.get(index) {
            Some(Value::Text(s)) => Ok(s),
            Some(Value::Null) => Ok(""),
            other => anyhow::bail!("argument {index} is not text: {other:?}"),
        }
    }

    /// Integer argument at `index`.
    pub fn int(&self, index: usize) -> anyhow::Result<i32> {
        self.values
            .get(index)
            .and_then(Value::as_i32)
            .ok_or_else(|| anyhow::anyhow!("argument {index} is not an int"))
    }

    /// Decimal argument at `index`.
    pub fn decimal(&self, index: usize) -> anyhow::Result<Decimal> {
        self.values
            .get(index)
            .and_then(Value::as_decimal)
            .ok_or_else(|| anyhow::anyhow!("argument {index} is not a decimal"))
    }
}

impl From<Vec<Value>> for Args {
    fn from(values: Vec<Value>) -> Self {
        Self::new(values)
    }
}
