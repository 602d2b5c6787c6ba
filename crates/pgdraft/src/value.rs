//! Dynamically typed SQL values.
//!
//! [`Value`] is what the builders bind and what rows decode into. Encoding adapts
//! to the parameter type the server infers for each placeholder, so a `Text`
//! coming from a browser request can be compared against an `int4` column and an
//! `Int` can be inserted into a `numeric` one.

use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Deserializer, Serialize};
use std::error::Error as StdError;
use std::str::FromStr;
use tokio_postgres::types::{FromSql, IsNull, Kind, ToSql, Type, to_sql_checked};
use uuid::Uuid;

type BoxError = Box<dyn StdError + Sync + Send>;

/// A single SQL value.
///
/// Serializes untagged, so a row of values renders as plain JSON
/// (`null`, `true`, `42`, `"text"`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Decimal(Decimal),
    Text(String),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
    TimestampTz(DateTime<Utc>),
    Uuid(Uuid),
    Json(serde_json::Value),
    Bytes(Vec<u8>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::Decimal(d) => d.to_i64(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Whether the value can take part in an `=` comparison on every column type.
    ///
    /// `json` has no equality operator in Postgres.
    pub(crate) fn is_comparable(&self) -> bool {
        !matches!(self, Value::Json(_))
    }
}

// ==================== Conversions ====================

macro_rules! impl_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v.into())
                }
            }
        )*
    };
}

impl_from! {
    bool => Bool,
    i16 => Int,
    i32 => Int,
    i64 => Int,
    u32 => Int,
    f32 => Float,
    f64 => Float,
    Decimal => Decimal,
    String => Text,
    &str => Text,
    &String => Text,
    NaiveDate => Date,
    NaiveDateTime => Timestamp,
    DateTime<Utc> => TimestampTz,
    Uuid => Uuid,
    Vec<u8> => Bytes,
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// Scalars map onto their natural variant; arrays and objects stay JSON.
impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::Text(s),
            other => Value::Json(other),
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(Value::from)
    }
}

// ==================== Postgres encoding ====================

fn is_text(ty: &Type) -> bool {
    <&str as ToSql>::accepts(ty)
}

fn is_integer(ty: &Type) -> bool {
    *ty == Type::INT2 || *ty == Type::INT4 || *ty == Type::INT8 || *ty == Type::OID
}

fn is_float(ty: &Type) -> bool {
    *ty == Type::FLOAT4 || *ty == Type::FLOAT8
}

fn is_json(ty: &Type) -> bool {
    *ty == Type::JSON || *ty == Type::JSONB
}

fn mismatch(kind: &str, ty: &Type) -> BoxError {
    format!("cannot encode {kind} value as {ty}").into()
}

fn encode_text_repr(repr: &str, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
    repr.to_sql(ty, out)
}

fn encode_int(v: i64, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
    if *ty == Type::INT8 {
        v.to_sql(ty, out)
    } else if *ty == Type::INT4 {
        i32::try_from(v)?.to_sql(ty, out)
    } else if *ty == Type::INT2 {
        i16::try_from(v)?.to_sql(ty, out)
    } else if *ty == Type::OID {
        u32::try_from(v)?.to_sql(ty, out)
    } else if *ty == Type::FLOAT8 {
        (v as f64).to_sql(ty, out)
    } else if *ty == Type::FLOAT4 {
        (v as f32).to_sql(ty, out)
    } else if *ty == Type::NUMERIC {
        Decimal::from(v).to_sql(ty, out)
    } else if is_text(ty) {
        encode_text_repr(&v.to_string(), ty, out)
    } else if is_json(ty) {
        serde_json::Value::from(v).to_sql(ty, out)
    } else {
        Err(mismatch("integer", ty))
    }
}

fn encode_float(v: f64, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
    if *ty == Type::FLOAT8 {
        v.to_sql(ty, out)
    } else if *ty == Type::FLOAT4 {
        (v as f32).to_sql(ty, out)
    } else if *ty == Type::NUMERIC {
        Decimal::try_from(v)?.to_sql(ty, out)
    } else if is_text(ty) {
        encode_text_repr(&v.to_string(), ty, out)
    } else if is_json(ty) {
        serde_json::Value::from(v).to_sql(ty, out)
    } else {
        Err(mismatch("float", ty))
    }
}

fn encode_decimal(v: &Decimal, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
    if *ty == Type::NUMERIC {
        v.to_sql(ty, out)
    } else if is_float(ty) {
        let f = v.to_f64().ok_or_else(|| mismatch("decimal", ty))?;
        encode_float(f, ty, out)
    } else if is_integer(ty) {
        let i = v.to_i64().ok_or_else(|| mismatch("decimal", ty))?;
        encode_int(i, ty, out)
    } else if is_text(ty) {
        encode_text_repr(&v.to_string(), ty, out)
    } else {
        Err(mismatch("decimal", ty))
    }
}

fn parse_bool(s: &str) -> Result<bool, BoxError> {
    match s.trim().to_ascii_lowercase().as_str() {
        "t" | "true" | "y" | "yes" | "on" | "1" => Ok(true),
        "f" | "false" | "n" | "no" | "off" | "0" => Ok(false),
        other => Err(format!("invalid boolean literal '{other}'").into()),
    }
}

pub(crate) fn parse_timestamp(s: &str) -> Result<NaiveDateTime, BoxError> {
    let s = s.trim();
    for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(ts);
        }
    }
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d")?;
    Ok(date.and_time(NaiveTime::MIN))
}

fn encode_text(v: &str, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
    if is_text(ty) {
        return v.to_sql(ty, out);
    }
    if let Kind::Enum(_) = ty.kind() {
        out.extend_from_slice(v.as_bytes());
        return Ok(IsNull::No);
    }
    if is_integer(ty) {
        encode_int(v.trim().parse::<i64>()?, ty, out)
    } else if is_float(ty) {
        encode_float(v.trim().parse::<f64>()?, ty, out)
    } else if *ty == Type::NUMERIC {
        Decimal::from_str(v.trim())?.to_sql(ty, out)
    } else if *ty == Type::BOOL {
        parse_bool(v)?.to_sql(ty, out)
    } else if *ty == Type::DATE {
        NaiveDate::parse_from_str(v.trim(), "%Y-%m-%d")?.to_sql(ty, out)
    } else if *ty == Type::TIMESTAMP {
        parse_timestamp(v)?.to_sql(ty, out)
    } else if *ty == Type::TIMESTAMPTZ {
        let ts = match DateTime::parse_from_rfc3339(v.trim()) {
            Ok(ts) => ts.with_timezone(&Utc),
            Err(_) => parse_timestamp(v)?.and_utc(),
        };
        ts.to_sql(ty, out)
    } else if *ty == Type::UUID {
        Uuid::parse_str(v.trim())?.to_sql(ty, out)
    } else if is_json(ty) {
        let json = serde_json::from_str::<serde_json::Value>(v)
            .unwrap_or_else(|_| serde_json::Value::String(v.to_string()));
        json.to_sql(ty, out)
    } else if *ty == Type::BYTEA {
        v.as_bytes().to_sql(ty, out)
    } else {
        Err(mismatch("text", ty))
    }
}

impl ToSql for Value {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
        match self {
            Value::Null => Ok(IsNull::Yes),
            Value::Bool(v) => {
                if *ty == Type::BOOL {
                    v.to_sql(ty, out)
                } else if is_text(ty) {
                    encode_text_repr(if *v { "true" } else { "false" }, ty, out)
                } else if is_json(ty) {
                    serde_json::Value::Bool(*v).to_sql(ty, out)
                } else {
                    Err(mismatch("boolean", ty))
                }
            }
            Value::Int(v) => encode_int(*v, ty, out),
            Value::Float(v) => encode_float(*v, ty, out),
            Value::Decimal(v) => encode_decimal(v, ty, out),
            Value::Text(v) => encode_text(v, ty, out),
            Value::Date(v) => {
                if *ty == Type::DATE {
                    v.to_sql(ty, out)
                } else if *ty == Type::TIMESTAMP {
                    v.and_time(NaiveTime::MIN).to_sql(ty, out)
                } else if *ty == Type::TIMESTAMPTZ {
                    v.and_time(NaiveTime::MIN).and_utc().to_sql(ty, out)
                } else if is_text(ty) {
                    encode_text_repr(&v.format("%Y-%m-%d").to_string(), ty, out)
                } else {
                    Err(mismatch("date", ty))
                }
            }
            Value::Timestamp(v) => {
                if *ty == Type::TIMESTAMP {
                    v.to_sql(ty, out)
                } else if *ty == Type::TIMESTAMPTZ {
                    v.and_utc().to_sql(ty, out)
                } else if *ty == Type::DATE {
                    v.date().to_sql(ty, out)
                } else if is_text(ty) {
                    encode_text_repr(&v.format("%Y-%m-%d %H:%M:%S%.f").to_string(), ty, out)
                } else {
                    Err(mismatch("timestamp", ty))
                }
            }
            Value::TimestampTz(v) => {
                if *ty == Type::TIMESTAMPTZ {
                    v.to_sql(ty, out)
                } else if *ty == Type::TIMESTAMP {
                    v.naive_utc().to_sql(ty, out)
                } else if *ty == Type::DATE {
                    v.date_naive().to_sql(ty, out)
                } else if is_text(ty) {
                    encode_text_repr(&v.to_rfc3339(), ty, out)
                } else {
                    Err(mismatch("timestamptz", ty))
                }
            }
            Value::Uuid(v) => {
                if *ty == Type::UUID {
                    v.to_sql(ty, out)
                } else if is_text(ty) {
                    encode_text_repr(&v.to_string(), ty, out)
                } else {
                    Err(mismatch("uuid", ty))
                }
            }
            Value::Json(v) => {
                if is_json(ty) {
                    v.to_sql(ty, out)
                } else if is_text(ty) {
                    encode_text_repr(&v.to_string(), ty, out)
                } else {
                    Err(mismatch("json", ty))
                }
            }
            Value::Bytes(v) => {
                if *ty == Type::BYTEA {
                    v.as_slice().to_sql(ty, out)
                } else {
                    Err(mismatch("bytea", ty))
                }
            }
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

// ==================== Postgres decoding ====================

impl<'a> FromSql<'a> for Value {
    fn from_sql(ty: &Type, raw: &'a [u8]) -> Result<Self, BoxError> {
        let value = if *ty == Type::BOOL {
            Value::Bool(bool::from_sql(ty, raw)?)
        } else if *ty == Type::INT2 {
            Value::Int(i16::from_sql(ty, raw)?.into())
        } else if *ty == Type::INT4 {
            Value::Int(i32::from_sql(ty, raw)?.into())
        } else if *ty == Type::INT8 {
            Value::Int(i64::from_sql(ty, raw)?)
        } else if *ty == Type::OID {
            Value::Int(u32::from_sql(ty, raw)?.into())
        } else if *ty == Type::FLOAT4 {
            Value::Float(f32::from_sql(ty, raw)?.into())
        } else if *ty == Type::FLOAT8 {
            Value::Float(f64::from_sql(ty, raw)?)
        } else if *ty == Type::NUMERIC {
            Value::Decimal(Decimal::from_sql(ty, raw)?)
        } else if *ty == Type::DATE {
            Value::Date(NaiveDate::from_sql(ty, raw)?)
        } else if *ty == Type::TIMESTAMP {
            Value::Timestamp(NaiveDateTime::from_sql(ty, raw)?)
        } else if *ty == Type::TIMESTAMPTZ {
            Value::TimestampTz(DateTime::<Utc>::from_sql(ty, raw)?)
        } else if *ty == Type::TIME {
            Value::Text(NaiveTime::from_sql(ty, raw)?.to_string())
        } else if *ty == Type::UUID {
            Value::Uuid(Uuid::from_sql(ty, raw)?)
        } else if is_json(ty) {
            Value::Json(serde_json::Value::from_sql(ty, raw)?)
        } else if *ty == Type::BYTEA {
            Value::Bytes(Vec::<u8>::from_sql(ty, raw)?)
        } else if <&str as FromSql>::accepts(ty) {
            Value::Text(String::from_sql(ty, raw)?)
        } else if let Kind::Enum(_) = ty.kind() {
            Value::Text(std::str::from_utf8(raw)?.to_string())
        } else {
            return Err(format!("unsupported column type {ty}").into());
        };
        Ok(value)
    }

    fn from_sql_null(_ty: &Type) -> Result<Self, BoxError> {
        Ok(Value::Null)
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }
}
