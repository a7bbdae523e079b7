use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone};
use std::fmt;

/// Structured value accepted by the query encoder.
///
/// Built either from plain Rust values via `From`, or from any `Serialize`
/// type through [`crate::query::to_query_value`].
#[derive(Debug, Clone, PartialEq)]
pub enum QueryValue {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Char(char),
    Float(f32),
    Double(f64),
    /// ISO 8601 round-trip text, written without form encoding
    DateTime(String),
    Str(String),
    Array(Vec<QueryValue>),
    /// Named fields in emission order
    Object(Vec<(String, QueryValue)>),
}

impl QueryValue {
    /// Build an object value from `(name, value)` pairs.
    #[must_use]
    pub fn object<I, K, V>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<QueryValue>,
    {
        QueryValue::Object(
            fields
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, QueryValue::Null)
    }

    /// Scalar text used when a value appears as a map key.
    pub(crate) fn into_key(self) -> Option<String> {
        match self {
            QueryValue::Bool(v) => Some(v.to_string()),
            QueryValue::Int(v) => Some(v.to_string()),
            QueryValue::UInt(v) => Some(v.to_string()),
            QueryValue::Char(v) => Some(v.to_string()),
            QueryValue::Float(v) => Some(v.to_string()),
            QueryValue::Double(v) => Some(v.to_string()),
            QueryValue::DateTime(v) | QueryValue::Str(v) => Some(v),
            QueryValue::Null | QueryValue::Array(_) | QueryValue::Object(_) => None,
        }
    }

    pub(crate) fn kind(&self) -> &'static str {
        match self {
            QueryValue::Null => "null",
            QueryValue::Array(_) => "array",
            QueryValue::Object(_) => "object",
            _ => "scalar",
        }
    }
}

macro_rules! impl_from_signed {
    ($($t:ty),*) => {
        $(impl From<$t> for QueryValue {
            fn from(v: $t) -> Self {
                QueryValue::Int(i64::from(v))
            }
        })*
    };
}

macro_rules! impl_from_unsigned {
    ($($t:ty),*) => {
        $(impl From<$t> for QueryValue {
            fn from(v: $t) -> Self {
                QueryValue::UInt(u64::from(v))
            }
        })*
    };
}

impl_from_signed!(i8, i16, i32, i64);
impl_from_unsigned!(u8, u16, u32, u64);

impl From<isize> for QueryValue {
    fn from(v: isize) -> Self {
        i64::try_from(v).map_or(QueryValue::Null, QueryValue::Int)
    }
}

impl From<usize> for QueryValue {
    fn from(v: usize) -> Self {
        u64::try_from(v).map_or(QueryValue::Null, QueryValue::UInt)
    }
}

impl From<bool> for QueryValue {
    fn from(v: bool) -> Self {
        QueryValue::Bool(v)
    }
}

impl From<char> for QueryValue {
    fn from(v: char) -> Self {
        QueryValue::Char(v)
    }
}

impl From<f32> for QueryValue {
    fn from(v: f32) -> Self {
        QueryValue::Float(v)
    }
}

impl From<f64> for QueryValue {
    fn from(v: f64) -> Self {
        QueryValue::Double(v)
    }
}

impl From<&str> for QueryValue {
    fn from(v: &str) -> Self {
        QueryValue::Str(v.to_owned())
    }
}

impl From<String> for QueryValue {
    fn from(v: String) -> Self {
        QueryValue::Str(v)
    }
}

impl From<&String> for QueryValue {
    fn from(v: &String) -> Self {
        QueryValue::Str(v.clone())
    }
}

impl<Tz> From<DateTime<Tz>> for QueryValue
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    fn from(v: DateTime<Tz>) -> Self {
        QueryValue::DateTime(v.to_rfc3339_opts(SecondsFormat::AutoSi, true))
    }
}

impl From<NaiveDateTime> for QueryValue {
    fn from(v: NaiveDateTime) -> Self {
        QueryValue::DateTime(v.format("%Y-%m-%dT%H:%M:%S%.f").to_string())
    }
}

impl From<NaiveDate> for QueryValue {
    fn from(v: NaiveDate) -> Self {
        QueryValue::DateTime(v.format("%Y-%m-%d").to_string())
    }
}

impl<T: Into<QueryValue>> From<Option<T>> for QueryValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(QueryValue::Null, Into::into)
    }
}

impl<T: Into<QueryValue>> From<Vec<T>> for QueryValue {
    fn from(v: Vec<T>) -> Self {
        QueryValue::Array(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<QueryValue> + Clone> From<&[T]> for QueryValue {
    fn from(v: &[T]) -> Self {
        QueryValue::Array(v.iter().cloned().map(Into::into).collect())
    }
}

impl<T: Into<QueryValue>, const N: usize> From<[T; N]> for QueryValue {
    fn from(v: [T; N]) -> Self {
        QueryValue::Array(v.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};

    #[test]
    fn primitives_map_to_matching_variants() {
        assert_eq!(QueryValue::from(7_u8), QueryValue::UInt(7));
        assert_eq!(QueryValue::from(-7_i16), QueryValue::Int(-7));
        assert_eq!(QueryValue::from(1.5_f32), QueryValue::Float(1.5));
        assert_eq!(QueryValue::from("x"), QueryValue::Str("x".to_owned()));
        assert!(QueryValue::from(Option::<u8>::None).is_null());
    }

    #[test]
    fn naive_date_times_have_no_offset() {
        let at = NaiveDate::from_ymd_opt(2024, 1, 2)
            .and_then(|d| d.and_hms_milli_opt(3, 4, 5, 600))
            .unwrap();
        assert_eq!(
            QueryValue::from(at),
            QueryValue::DateTime("2024-01-02T03:04:05.600".to_owned())
        );
    }

    #[test]
    fn utc_date_times_use_z_suffix() {
        let at = Utc.with_ymd_and_hms(2020, 6, 1, 0, 0, 0).unwrap();
        assert_eq!(
            QueryValue::from(at),
            QueryValue::DateTime("2020-06-01T00:00:00Z".to_owned())
        );
    }

    #[test]
    fn object_builder_keeps_order() {
        let value = QueryValue::object([("b", 1), ("a", 2)]);
        let QueryValue::Object(fields) = value else {
            panic!("expected object");
        };
        let names: Vec<_> = fields.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(names, ["b", "a"]);
    }

    #[test]
    fn keys_require_scalars() {
        assert_eq!(QueryValue::from(3).into_key().as_deref(), Some("3"));
        assert_eq!(QueryValue::from(vec![1]).into_key(), None);
    }
}
