//! Concept Values
//!
//! 속성(attribute)과 값 변수(value variable)가 담는 원시 값 정의

use std::fmt;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::driver::{DriverError, DriverResult};

// ============================================================================
// ValueType - 값 타입
// ============================================================================

/// 값 타입
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    /// boolean
    Boolean,
    /// long (i64)
    Integer,
    /// double (f64)
    Double,
    /// decimal (고정 소수점)
    Decimal,
    /// string
    String,
    /// date
    Date,
    /// datetime (타임존 없음)
    Datetime,
    /// datetime-tz
    DatetimeTz,
    /// duration
    Duration,
}

impl ValueType {
    /// 쿼리 언어에서 쓰는 이름
    pub fn name(&self) -> &'static str {
        match self {
            ValueType::Boolean => "boolean",
            ValueType::Integer => "long",
            ValueType::Double => "double",
            ValueType::Decimal => "decimal",
            ValueType::String => "string",
            ValueType::Date => "date",
            ValueType::Datetime => "datetime",
            ValueType::DatetimeTz => "datetime-tz",
            ValueType::Duration => "duration",
        }
    }

    /// 이름에서 값 타입 파싱
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "boolean" => Some(ValueType::Boolean),
            "long" | "integer" => Some(ValueType::Integer),
            "double" => Some(ValueType::Double),
            "decimal" => Some(ValueType::Decimal),
            "string" => Some(ValueType::String),
            "date" => Some(ValueType::Date),
            "datetime" => Some(ValueType::Datetime),
            "datetime-tz" => Some(ValueType::DatetimeTz),
            "duration" => Some(ValueType::Duration),
            _ => None,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Value - 값
// ============================================================================

/// 속성 값
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "value_type", content = "value", rename_all = "snake_case")]
pub enum Value {
    /// Boolean
    Boolean(bool),
    /// Integer (i64)
    Integer(i64),
    /// Double (f64)
    Double(f64),
    /// Decimal
    Decimal(Decimal),
    /// String
    String(String),
    /// Date
    Date(NaiveDate),
    /// Datetime
    Datetime(NaiveDateTime),
    /// Datetime with offset
    DatetimeTz(DateTime<FixedOffset>),
    /// Duration
    Duration(Duration),
}

impl Value {
    /// 값 타입
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Boolean(_) => ValueType::Boolean,
            Value::Integer(_) => ValueType::Integer,
            Value::Double(_) => ValueType::Double,
            Value::Decimal(_) => ValueType::Decimal,
            Value::String(_) => ValueType::String,
            Value::Date(_) => ValueType::Date,
            Value::Datetime(_) => ValueType::Datetime,
            Value::DatetimeTz(_) => ValueType::DatetimeTz,
            Value::Duration(_) => ValueType::Duration,
        }
    }

    /// Boolean 값
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Integer 값
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Double 값 (Integer도 변환)
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Double(d) => Some(*d),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// String 값
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// JSON 값으로 변환
    ///
    /// 정밀도를 잃지 않도록 decimal, 날짜, duration은 문자열로 표현합니다.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Boolean(b) => serde_json::Value::Bool(*b),
            Value::Integer(i) => serde_json::Value::from(*i),
            Value::Double(d) => serde_json::Number::from_f64(*d)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s.clone()),
            other => serde_json::Value::String(other.to_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Double(d) => write!(f, "{}", d),
            Value::Decimal(d) => write!(f, "{}", d),
            Value::String(s) => write!(f, "\"{}\"", s),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Value::Datetime(dt) => write!(f, "{}", dt.format("%Y-%m-%dT%H:%M:%S%.f")),
            Value::DatetimeTz(dt) => write!(f, "{}", dt.to_rfc3339()),
            Value::Duration(d) => write!(f, "{}", d),
        }
    }
}

// From implementations
impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<Decimal> for Value {
    fn from(v: Decimal) -> Self {
        Value::Decimal(v)
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Date(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::Datetime(v)
    }
}

impl From<DateTime<FixedOffset>> for Value {
    fn from(v: DateTime<FixedOffset>) -> Self {
        Value::DatetimeTz(v)
    }
}

impl From<Duration> for Value {
    fn from(v: Duration) -> Self {
        Value::Duration(v)
    }
}

// ============================================================================
// TryFrom implementations
// ============================================================================

fn conversion_error(value: &Value, target: &str) -> DriverError {
    DriverError::type_conversion(format!(
        "Cannot convert {} value to {}",
        value.value_type(),
        target
    ))
}

impl TryFrom<Value> for bool {
    type Error = DriverError;

    fn try_from(value: Value) -> DriverResult<Self> {
        match value {
            Value::Boolean(b) => Ok(b),
            _ => Err(conversion_error(&value, "bool")),
        }
    }
}

impl TryFrom<Value> for i64 {
    type Error = DriverError;

    fn try_from(value: Value) -> DriverResult<Self> {
        match value {
            Value::Integer(i) => Ok(i),
            _ => Err(conversion_error(&value, "i64")),
        }
    }
}

impl TryFrom<Value> for f64 {
    type Error = DriverError;

    fn try_from(value: Value) -> DriverResult<Self> {
        match value {
            Value::Double(d) => Ok(d),
            Value::Integer(i) => Ok(i as f64),
            _ => Err(conversion_error(&value, "f64")),
        }
    }
}

impl TryFrom<Value> for String {
    type Error = DriverError;

    fn try_from(value: Value) -> DriverResult<Self> {
        match value {
            Value::String(s) => Ok(s),
            _ => Err(conversion_error(&value, "String")),
        }
    }
}

impl TryFrom<Value> for Decimal {
    type Error = DriverError;

    fn try_from(value: Value) -> DriverResult<Self> {
        match value {
            Value::Decimal(d) => Ok(d),
            Value::Integer(i) => Ok(Decimal::from_integer(i)),
            _ => Err(conversion_error(&value, "Decimal")),
        }
    }
}

impl TryFrom<Value> for NaiveDate {
    type Error = DriverError;

    fn try_from(value: Value) -> DriverResult<Self> {
        match value {
            Value::Date(d) => Ok(d),
            _ => Err(conversion_error(&value, "NaiveDate")),
        }
    }
}

impl TryFrom<Value> for NaiveDateTime {
    type Error = DriverError;

    fn try_from(value: Value) -> DriverResult<Self> {
        match value {
            Value::Datetime(dt) => Ok(dt),
            _ => Err(conversion_error(&value, "NaiveDateTime")),
        }
    }
}

impl TryFrom<Value> for DateTime<FixedOffset> {
    type Error = DriverError;

    fn try_from(value: Value) -> DriverResult<Self> {
        match value {
            Value::DatetimeTz(dt) => Ok(dt),
            _ => Err(conversion_error(&value, "DateTime<FixedOffset>")),
        }
    }
}

impl TryFrom<Value> for Duration {
    type Error = DriverError;

    fn try_from(value: Value) -> DriverResult<Self> {
        match value {
            Value::Duration(d) => Ok(d),
            _ => Err(conversion_error(&value, "Duration")),
        }
    }
}

// ============================================================================
// Decimal - 고정 소수점
// ============================================================================

/// 고정 소수점 decimal
///
/// 값은 `integer + fractional / 10^19` 이며 `fractional`은 항상 `0..10^19` 범위입니다.
/// 역직렬화도 [`Decimal::new`]를 거치므로 와이어 값이 이 범위를 깨지 못합니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "RawDecimal")]
pub struct Decimal {
    integer: i64,
    fractional: u64,
}

/// 검증 전 와이어 표현
#[derive(Deserialize)]
struct RawDecimal {
    integer: i64,
    fractional: u64,
}

impl TryFrom<RawDecimal> for Decimal {
    type Error = DriverError;

    fn try_from(raw: RawDecimal) -> DriverResult<Self> {
        Decimal::new(raw.integer, raw.fractional)
    }
}

impl Decimal {
    /// 소수부 자릿수
    pub const FRACTIONAL_DIGITS: u32 = 19;

    /// 소수부 분모 (10^19)
    pub const FRACTIONAL_DENOMINATOR: u64 = 10_000_000_000_000_000_000;

    /// 새 Decimal 생성
    ///
    /// `fractional`이 분모를 넘으면 정수부로 올립니다. 올림으로 정수부가
    /// 넘치면 타입 변환 에러입니다.
    pub fn new(integer: i64, fractional: u64) -> DriverResult<Self> {
        // u64::MAX / 10^19 == 1
        let carry = (fractional / Self::FRACTIONAL_DENOMINATOR) as i64;
        let integer = integer.checked_add(carry).ok_or_else(|| {
            DriverError::type_conversion(format!("decimal {} + {}e-19 overflows", integer, fractional))
        })?;
        Ok(Self {
            integer,
            fractional: fractional % Self::FRACTIONAL_DENOMINATOR,
        })
    }

    /// 정수에서 생성
    pub fn from_integer(integer: i64) -> Self {
        Self { integer, fractional: 0 }
    }

    /// 정수부
    pub fn integer_part(&self) -> i64 {
        self.integer
    }

    /// 소수부 (10^-19 단위)
    pub fn fractional_part(&self) -> u64 {
        self.fractional
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (sign, whole, fraction) = if self.integer < 0 && self.fractional != 0 {
            (
                "-",
                (-(self.integer + 1)) as u64,
                Self::FRACTIONAL_DENOMINATOR - self.fractional,
            )
        } else if self.integer < 0 {
            ("-", self.integer.unsigned_abs(), 0)
        } else {
            ("", self.integer as u64, self.fractional)
        };

        if fraction == 0 {
            return write!(f, "{}{}.0", sign, whole);
        }
        let digits = format!("{:019}", fraction);
        write!(f, "{}{}.{}", sign, whole, digits.trim_end_matches('0'))
    }
}

// ============================================================================
// Duration - 기간
// ============================================================================

/// 기간 (월/일/나노초)
///
/// 월과 일은 달력에 따라 길이가 달라지므로 나노초와 따로 보관합니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Duration {
    /// 개월
    pub months: u32,
    /// 일
    pub days: u32,
    /// 나노초
    pub nanos: u64,
}

impl Duration {
    const NANOS_PER_SECOND: u64 = 1_000_000_000;
    const NANOS_PER_MINUTE: u64 = 60 * Self::NANOS_PER_SECOND;
    const NANOS_PER_HOUR: u64 = 60 * Self::NANOS_PER_MINUTE;

    /// 새 Duration 생성
    pub fn new(months: u32, days: u32, nanos: u64) -> Self {
        Self { months, days, nanos }
    }

    /// 개월에서 생성
    pub fn from_months(months: u32) -> Self {
        Self::new(months, 0, 0)
    }

    /// 일에서 생성
    pub fn from_days(days: u32) -> Self {
        Self::new(0, days, 0)
    }

    /// 초에서 생성
    pub fn from_seconds(seconds: u64) -> Self {
        Self::new(0, 0, seconds * Self::NANOS_PER_SECOND)
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.months == 0 && self.days == 0 && self.nanos == 0 {
            return write!(f, "PT0S");
        }

        write!(f, "P")?;
        let years = self.months / 12;
        let months = self.months % 12;
        if years > 0 {
            write!(f, "{}Y", years)?;
        }
        if months > 0 {
            write!(f, "{}M", months)?;
        }
        if self.days > 0 {
            write!(f, "{}D", self.days)?;
        }

        if self.nanos > 0 {
            write!(f, "T")?;
            let hours = self.nanos / Self::NANOS_PER_HOUR;
            let minutes = (self.nanos % Self::NANOS_PER_HOUR) / Self::NANOS_PER_MINUTE;
            let seconds = (self.nanos % Self::NANOS_PER_MINUTE) / Self::NANOS_PER_SECOND;
            let nanos = self.nanos % Self::NANOS_PER_SECOND;
            if hours > 0 {
                write!(f, "{}H", hours)?;
            }
            if minutes > 0 {
                write!(f, "{}M", minutes)?;
            }
            if seconds > 0 || nanos > 0 {
                if nanos > 0 {
                    write!(f, "{}.{:09}S", seconds, nanos)?;
                } else {
                    write!(f, "{}S", seconds)?;
                }
            }
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
