use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;
use time::macros::format_description;
use time::OffsetDateTime;

/// A single field value as produced by a record source.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Timestamp(OffsetDateTime),
    Null,
}

impl FieldValue {
    /// String form the engine indexes. Null is the empty string.
    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            FieldValue::Text(s) => Cow::Borrowed(s),
            FieldValue::Null => Cow::Borrowed(""),
            other => Cow::Owned(other.to_string()),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            FieldValue::Text(s) => serde_json::Value::String(s.clone()),
            FieldValue::Integer(i) => serde_json::Value::from(*i),
            FieldValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            FieldValue::Bool(b) => serde_json::Value::Bool(*b),
            FieldValue::Timestamp(_) => serde_json::Value::String(self.to_string()),
            FieldValue::Null => serde_json::Value::Null,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::Integer(i) => write!(f, "{i}"),
            FieldValue::Float(x) => write!(f, "{x}"),
            FieldValue::Bool(b) => write!(f, "{b}"),
            FieldValue::Timestamp(ts) => {
                let fmt_desc = format_description!(
                    "[year]-[month]-[day] [hour]:[minute]:[second][offset_hour sign:mandatory]:[offset_minute]"
                );
                let s = ts.format(&fmt_desc).map_err(|_| fmt::Error)?;
                f.write_str(&s)
            }
            FieldValue::Null => Ok(()),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self { FieldValue::Text(s.to_string()) }
}
impl From<String> for FieldValue {
    fn from(s: String) -> Self { FieldValue::Text(s) }
}
impl From<i64> for FieldValue {
    fn from(i: i64) -> Self { FieldValue::Integer(i) }
}
impl From<f64> for FieldValue {
    fn from(x: f64) -> Self { FieldValue::Float(x) }
}
impl From<bool> for FieldValue {
    fn from(b: bool) -> Self { FieldValue::Bool(b) }
}
impl From<OffsetDateTime> for FieldValue {
    fn from(ts: OffsetDateTime) -> Self { FieldValue::Timestamp(ts) }
}

/// An ordered set of named field values. A record's id is its position in
/// the sequence it was loaded from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: Vec<(String, FieldValue)>,
}

impl Record {
    pub fn new() -> Self { Self::default() }

    /// Builder-style insert; replaces an existing field of the same name in place.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize { self.fields.len() }
    pub fn is_empty(&self) -> bool { self.fields.is_empty() }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn to_json(&self) -> serde_json::Value {
        let map: serde_json::Map<String, serde_json::Value> =
            self.fields.iter().map(|(n, v)| (n.clone(), v.to_json())).collect();
        serde_json::Value::Object(map)
    }
}

/// Fields carried by a parsed access-log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LogField {
    IpAddress,
    Timestamp,
    Method,
    Url,
    HttpProtocol,
    Status,
    Size,
    Referer,
    UserAgent,
}

impl LogField {
    pub const ALL: [LogField; 9] = [
        LogField::IpAddress,
        LogField::Timestamp,
        LogField::Method,
        LogField::Url,
        LogField::HttpProtocol,
        LogField::Status,
        LogField::Size,
        LogField::Referer,
        LogField::UserAgent,
    ];

    /// Fields indexed when the caller does not choose any.
    pub const DEFAULT_INDEXED: [LogField; 5] = [
        LogField::Url,
        LogField::Timestamp,
        LogField::Status,
        LogField::UserAgent,
        LogField::IpAddress,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            LogField::IpAddress => "ip_address",
            LogField::Timestamp => "timestamp",
            LogField::Method => "method",
            LogField::Url => "url",
            LogField::HttpProtocol => "http_protocol",
            LogField::Status => "status",
            LogField::Size => "size",
            LogField::Referer => "referer",
            LogField::UserAgent => "user_agent",
        }
    }
}

impl fmt::Display for LogField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for LogField {
    type Err = crate::IndexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LogField::ALL
            .iter()
            .copied()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| crate::IndexError::UnknownField(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn string_forms() {
        assert_eq!(FieldValue::Integer(404).as_text(), "404");
        assert_eq!(FieldValue::Null.as_text(), "");
        assert_eq!(FieldValue::Bool(true).as_text(), "true");
        let ts = FieldValue::Timestamp(datetime!(2023-10-10 13:55:36 -7));
        assert_eq!(ts.as_text(), "2023-10-10 13:55:36-07:00");
    }

    #[test]
    fn insert_replaces_in_place() {
        let mut r = Record::new().with("url", "/a").with("status", 200i64);
        r.insert("url", "/b");
        let names: Vec<&str> = r.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["url", "status"]);
        assert_eq!(r.get("url"), Some(&FieldValue::Text("/b".into())));
    }

    #[test]
    fn log_field_names_round_trip() {
        for f in LogField::ALL {
            assert_eq!(f.as_str().parse::<LogField>().unwrap(), f);
        }
        assert!(matches!("nope".parse::<LogField>(), Err(crate::IndexError::UnknownField(_))));
    }
}
