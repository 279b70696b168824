//! Dynamic SQL values.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::time::{SystemTime, UNIX_EPOCH};

/// A dynamically-typed SQL value.
///
/// Used for parameter binding, result fetching, and as the wire format
/// between beans and the compiler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// NULL value
    Null,

    /// Boolean value
    Bool(bool),

    /// 8-bit signed integer
    TinyInt(i8),

    /// 16-bit signed integer
    SmallInt(i16),

    /// 32-bit signed integer
    Int(i32),

    /// 64-bit signed integer
    BigInt(i64),

    /// 32-bit floating point
    Float(f32),

    /// 64-bit floating point
    Double(f64),

    /// Arbitrary precision decimal (stored as string)
    Decimal(String),

    /// Text string
    Text(String),

    /// Binary data
    Bytes(Vec<u8>),

    /// Timestamp (microseconds since epoch, UTC)
    Timestamp(i64),

    /// JSON value
    Json(serde_json::Value),
}

impl Value {
    /// Check if this value is NULL.
    pub const fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Whether this is the zero value of its type.
    ///
    /// Zero values are skipped when beans are turned into implicit
    /// conditions or update SET lists.
    pub fn is_zero(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Bool(b) => !*b,
            Value::TinyInt(v) => *v == 0,
            Value::SmallInt(v) => *v == 0,
            Value::Int(v) => *v == 0,
            Value::BigInt(v) => *v == 0,
            Value::Float(v) => *v == 0.0,
            Value::Double(v) => *v == 0.0,
            Value::Decimal(s) => s.is_empty() || s.parse::<f64>().is_ok_and(|d| d == 0.0),
            Value::Text(s) => s.is_empty(),
            Value::Bytes(b) => b.is_empty(),
            Value::Timestamp(t) => *t == 0,
            Value::Json(j) => j.is_null(),
        }
    }

    /// Whether this value carries an integer (bools excluded).
    pub const fn is_integer(&self) -> bool {
        matches!(
            self,
            Value::TinyInt(_) | Value::SmallInt(_) | Value::Int(_) | Value::BigInt(_)
        )
    }

    /// Get the type name of this value.
    pub const fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            Value::Bool(_) => "BOOLEAN",
            Value::TinyInt(_) => "TINYINT",
            Value::SmallInt(_) => "SMALLINT",
            Value::Int(_) => "INTEGER",
            Value::BigInt(_) => "BIGINT",
            Value::Float(_) => "REAL",
            Value::Double(_) => "DOUBLE",
            Value::Decimal(_) => "DECIMAL",
            Value::Text(_) => "TEXT",
            Value::Bytes(_) => "BLOB",
            Value::Timestamp(_) => "TIMESTAMP",
            Value::Json(_) => "JSON",
        }
    }

    /// Try to convert this value to a bool.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            other => other.as_i64().map(|v| v != 0),
        }
    }

    /// Try to convert this value to an i64 without loss.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::TinyInt(v) => Some(i64::from(*v)),
            Value::SmallInt(v) => Some(i64::from(*v)),
            Value::Int(v) => Some(i64::from(*v)),
            Value::BigInt(v) | Value::Timestamp(v) => Some(*v),
            Value::Bool(v) => Some(i64::from(*v)),
            _ => None,
        }
    }

    /// Try to convert this value to an f64.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(f64::from(*v)),
            Value::Double(v) => Some(*v),
            Value::TinyInt(v) => Some(f64::from(*v)),
            Value::SmallInt(v) => Some(f64::from(*v)),
            Value::Int(v) => Some(f64::from(*v)),
            Value::BigInt(v) => Some(*v as f64),
            Value::Decimal(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Try to get this value as a string reference.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) | Value::Decimal(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get this value as a byte slice.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            Value::Text(s) => Some(s.as_bytes()),
            _ => None,
        }
    }

    /// Render the value the way raw string queries report it.
    pub fn to_plain_string(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => if *b { "1" } else { "0" }.to_string(),
            Value::TinyInt(v) => v.to_string(),
            Value::SmallInt(v) => v.to_string(),
            Value::Int(v) => v.to_string(),
            Value::BigInt(v) => v.to_string(),
            Value::Float(v) => v.to_string(),
            Value::Double(v) => v.to_string(),
            Value::Decimal(s) | Value::Text(s) => s.clone(),
            Value::Bytes(b) => String::from_utf8_lossy(b).into_owned(),
            Value::Timestamp(t) => Timestamp(*t).to_string(),
            Value::Json(j) => j.to_string(),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i8> for Value {
    fn from(v: i8) -> Self {
        Value::TinyInt(v)
    }
}

impl From<i16> for Value {
    fn from(v: i16) -> Self {
        Value::SmallInt(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::BigInt(v)
    }
}

impl From<u8> for Value {
    fn from(v: u8) -> Self {
        Value::SmallInt(i16::from(v))
    }
}

impl From<u16> for Value {
    fn from(v: u16) -> Self {
        Value::Int(i32::from(v))
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::BigInt(i64::from(v))
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Bytes(v.to_vec())
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Value::Json(v)
    }
}

impl From<Timestamp> for Value {
    fn from(v: Timestamp) -> Self {
        Value::Timestamp(v.0)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

impl From<&Value> for Value {
    fn from(v: &Value) -> Self {
        v.clone()
    }
}

/// Microseconds since the Unix epoch, UTC.
///
/// Used for `created`/`updated`/`deleted` lifecycle columns. Text columns
/// holding `YYYY-MM-DD HH:MM:SS[.ffffff]` convert into it on read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    pub const MICROS_PER_SECOND: i64 = 1_000_000;

    /// Current wall-clock time.
    pub fn now() -> Self {
        let micros = match SystemTime::now().duration_since(UNIX_EPOCH) {
            Ok(d) => i64::try_from(d.as_micros()).unwrap_or(i64::MAX),
            Err(e) => -i64::try_from(e.duration().as_micros()).unwrap_or(i64::MAX),
        };
        Timestamp(micros)
    }

    pub const fn from_micros(micros: i64) -> Self {
        Timestamp(micros)
    }

    pub const fn as_micros(self) -> i64 {
        self.0
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Parse `YYYY-MM-DD`, `YYYY-MM-DD HH:MM:SS` or the `T`-separated form,
    /// with optional fractional seconds and a trailing `Z`.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim().trim_end_matches('Z');
        let (date, time) = match text.find(['T', ' ']) {
            Some(pos) => (&text[..pos], Some(&text[pos + 1..])),
            None => (text, None),
        };

        let mut parts = date.splitn(3, '-');
        let year: i64 = parts.next()?.parse().ok()?;
        let month: u32 = parts.next()?.parse().ok()?;
        let day: u32 = parts.next()?.parse().ok()?;
        if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
            return None;
        }

        let mut micros_of_day = 0i64;
        if let Some(time) = time {
            let (hms, frac) = match time.split_once('.') {
                Some((hms, frac)) => (hms, Some(frac)),
                None => (time, None),
            };
            let mut hms = hms.splitn(3, ':');
            let h: i64 = hms.next()?.parse().ok()?;
            let m: i64 = hms.next()?.parse().ok()?;
            let s: i64 = hms.next().unwrap_or("0").parse().ok()?;
            if h > 23 || m > 59 || s > 60 {
                return None;
            }
            micros_of_day = ((h * 60 + m) * 60 + s) * Self::MICROS_PER_SECOND;
            if let Some(frac) = frac {
                let digits: String = frac.chars().take(6).collect();
                if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
                    return None;
                }
                let scale = 10i64.pow(6 - digits.len() as u32);
                micros_of_day += digits.parse::<i64>().ok()? * scale;
            }
        }

        let days = days_from_civil(year, month, day);
        Some(Timestamp(days * 86_400 * Self::MICROS_PER_SECOND + micros_of_day))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let micros_per_day = 86_400 * Self::MICROS_PER_SECOND;
        let days = self.0.div_euclid(micros_per_day);
        let rem = self.0.rem_euclid(micros_per_day);
        let (year, month, day) = civil_from_days(days);
        let secs = rem / Self::MICROS_PER_SECOND;
        let frac = rem % Self::MICROS_PER_SECOND;
        write!(
            f,
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
            year,
            month,
            day,
            secs / 3600,
            (secs / 60) % 60,
            secs % 60
        )?;
        if frac != 0 {
            write!(f, ".{:06}", frac)?;
        }
        Ok(())
    }
}

/// Days since 1970-01-01 for a proleptic Gregorian date.
fn days_from_civil(year: i64, month: u32, day: u32) -> i64 {
    let y = if month <= 2 { year - 1 } else { year };
    let era = y.div_euclid(400);
    let yoe = y - era * 400;
    let m = i64::from(month);
    let doy = (153 * (if m > 2 { m - 3 } else { m + 9 }) + 2) / 5 + i64::from(day) - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146_097 + doe - 719_468
}

fn civil_from_days(days: i64) -> (i64, i64, i64) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z - era * 146_097;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = doy - (153 * mp + 2) / 5 + 1;
    let month = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = yoe + era * 400 + i64::from(month <= 2);
    (year, month, day)
}

/// Primary key values of one row, in key-column order.
///
/// Integers compare and hash by numeric value so a key read back as
/// `Int(1)` matches one built from `BigInt(1)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrimaryKey(pub Vec<Value>);

impl PrimaryKey {
    pub fn new(values: Vec<Value>) -> Self {
        PrimaryKey(values)
    }

    pub fn single(value: impl Into<Value>) -> Self {
        PrimaryKey(vec![value.into()])
    }

    pub fn values(&self) -> &[Value] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// A key with any zero component cannot address a stored row.
    pub fn is_zero(&self) -> bool {
        self.0.is_empty() || self.0.iter().any(Value::is_zero)
    }

    fn canonical(&self) -> Vec<CanonicalKeyPart<'_>> {
        self.0
            .iter()
            .map(|v| match v.as_i64() {
                Some(i) if v.is_integer() || matches!(v, Value::Bool(_)) => {
                    CanonicalKeyPart::Int(i)
                }
                _ => CanonicalKeyPart::Other(v),
            })
            .collect()
    }
}

#[derive(PartialEq)]
enum CanonicalKeyPart<'a> {
    Int(i64),
    Other(&'a Value),
}

impl PartialEq for PrimaryKey {
    fn eq(&self, other: &Self) -> bool {
        self.canonical() == other.canonical()
    }
}

impl Eq for PrimaryKey {}

impl Hash for PrimaryKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.len().hash(state);
        for part in self.canonical() {
            match part {
                CanonicalKeyPart::Int(i) => {
                    0u8.hash(state);
                    i.hash(state);
                }
                CanonicalKeyPart::Other(v) => {
                    1u8.hash(state);
                    v.type_name().hash(state);
                    v.to_plain_string().hash(state);
                }
            }
        }
    }
}

impl fmt::Display for PrimaryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(Value::to_plain_string).collect();
        write!(f, "{}", parts.join("-"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_from_integers() {
        assert_eq!(Value::from(42i8), Value::TinyInt(42));
        assert_eq!(Value::from(42i16), Value::SmallInt(42));
        assert_eq!(Value::from(42i32), Value::Int(42));
        assert_eq!(Value::from(42i64), Value::BigInt(42));
        assert_eq!(Value::from(42u32), Value::BigInt(42));
    }

    #[test]
    fn test_from_option() {
        let some: Value = Some(42i32).into();
        assert_eq!(some, Value::Int(42));

        let none: Value = Option::<i32>::None.into();
        assert_eq!(none, Value::Null);
    }

    #[test]
    fn test_zero_values() {
        assert!(Value::Null.is_zero());
        assert!(Value::Int(0).is_zero());
        assert!(Value::Text(String::new()).is_zero());
        assert!(Value::Bool(false).is_zero());
        assert!(Value::Timestamp(0).is_zero());
        assert!(!Value::Int(-1).is_zero());
        assert!(!Value::Text("x".into()).is_zero());
        assert!(!Value::Bool(true).is_zero());
    }

    #[test]
    fn test_timestamp_format_and_parse() {
        assert_eq!(Timestamp(0).to_string(), "1970-01-01 00:00:00");
        let ts = Timestamp::parse("2024-02-29 13:45:07.250").unwrap();
        assert_eq!(ts.to_string(), "2024-02-29 13:45:07.250000");
        assert_eq!(Timestamp::parse("2024-02-29T13:45:07.25Z"), Some(ts));
        assert_eq!(
            Timestamp::parse("1969-12-31").unwrap().as_micros(),
            -86_400 * Timestamp::MICROS_PER_SECOND
        );
        assert_eq!(Timestamp::parse("1969-12-31").unwrap().to_string(), "1969-12-31 00:00:00");
        assert!(Timestamp::parse("not a date").is_none());
        assert!(Timestamp::parse("2024-13-01").is_none());
    }

    #[test]
    fn test_now_is_after_2020() {
        let ts = Timestamp::now();
        assert!(ts > Timestamp::parse("2020-01-01").unwrap());
    }

    #[test]
    fn test_primary_key_canonical_integers() {
        let a = PrimaryKey::new(vec![Value::Int(7)]);
        let b = PrimaryKey::new(vec![Value::BigInt(7)]);
        assert_eq!(a, b);

        let mut map = HashMap::new();
        map.insert(a, "seven");
        assert_eq!(map.get(&b), Some(&"seven"));

        let text = PrimaryKey::new(vec![Value::Text("7".into())]);
        assert_ne!(b, text);
    }

    #[test]
    fn test_primary_key_zero() {
        assert!(PrimaryKey::new(vec![]).is_zero());
        assert!(PrimaryKey::new(vec![Value::Int(1), Value::Int(0)]).is_zero());
        assert!(!PrimaryKey::new(vec![Value::Int(1), Value::Text("a".into())]).is_zero());
        assert_eq!(PrimaryKey::new(vec![Value::Int(1), Value::Text("a".into())]).to_string(), "1-a");
    }
}
