//! Query predicate language and sort-key model.
//!
//! A [`Predicate`] is an expression tree evaluated against one JSON
//! document at a time. The language is deliberately small: equality,
//! typed comparisons, substring matching, and an `ElemMatch` combinator
//! that descends into an array and asks whether *some* element satisfies
//! an inner predicate. That last piece is what makes heterogeneous
//! name/value field arrays queryable without fixed columns.
//!
//! Casting is strict on the matching path: if a stored value cannot be
//! cast to the type a comparison requires, evaluation fails with
//! [`StoreError::Cast`] and the whole request fails; rows are never
//! silently skipped. Sort-key extraction is lenient instead: an
//! uncastable value sorts after all castable ones.

use crate::{StoreError, StoreResult};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;
use std::cmp::Ordering;

/// A typed literal a stored value is compared against.
#[derive(Debug, Clone, PartialEq)]
pub enum Comparand {
    Int(i64),
    Float(f64),
    Date(DateTime<Utc>),
    Str(String),
}

/// Comparison operators for [`Predicate::Cmp`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

/// Substring match modes for [`Predicate::Text`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextMode {
    Contains,
    StartsWith,
    EndsWith,
}

/// A predicate over a single JSON document.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Matches every document.
    All,
    /// Exact JSON equality at a dotted path.
    Eq { path: String, value: Value },
    /// JSON inequality at a dotted path (also matches absent values).
    Ne { path: String, value: Value },
    /// Typed comparison; the stored value is cast to the comparand's type.
    Cmp {
        path: String,
        op: CmpOp,
        value: Comparand,
    },
    /// Case-sensitive substring match on a string value.
    Text {
        path: String,
        mode: TextMode,
        needle: String,
    },
    /// The value at the path exists, is not null, and is not an empty string.
    NotEmpty { path: String },
    /// Some element of the array at `path` satisfies the inner predicate.
    ElemMatch {
        path: String,
        predicate: Box<Predicate>,
    },
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
}

/// Sort direction for one sort key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

/// The type a sort key casts its extracted value to before comparing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastKind {
    String,
    Int,
    Float,
    Date,
}

/// Where a sort key's value comes from within a document.
#[derive(Debug, Clone, PartialEq)]
pub enum SortTarget {
    /// A plain dotted path.
    Path(String),
    /// The element of the array at `array_path` whose `match_key` equals
    /// `match_value`; the sort value is read from that element's `value_key`.
    ArrayElem {
        array_path: String,
        match_key: String,
        match_value: String,
        value_key: String,
    },
}

/// One computed, type-cast sort key.
#[derive(Debug, Clone, PartialEq)]
pub struct SortKey {
    pub target: SortTarget,
    pub cast: CastKind,
    pub direction: SortDirection,
}

/// A complete query: predicate, composite sort, and a result window.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub predicate: Predicate,
    pub sort: Vec<SortKey>,
    pub skip: u64,
    pub limit: Option<u64>,
}

impl Query {
    /// A query matching everything, unsorted and unwindowed.
    pub fn all() -> Self {
        Self {
            predicate: Predicate::All,
            sort: Vec::new(),
            skip: 0,
            limit: None,
        }
    }

    /// A query with the given predicate and no sort or window.
    pub fn filtered(predicate: Predicate) -> Self {
        Self {
            predicate,
            sort: Vec::new(),
            skip: 0,
            limit: None,
        }
    }
}

/// Resolves a dotted path against a JSON document.
///
/// Only object traversal is supported; array elements are reached through
/// [`Predicate::ElemMatch`], never through numeric path segments.
pub fn lookup<'a>(document: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = document;
    for segment in path.split('.') {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

fn cast_int(value: &Value, path: &str) -> StoreResult<i64> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                return Ok(i);
            }
            // Stored floats with a zero fraction count as integers, if they
            // fit. The cast saturates out of range, and `i64::MAX as f64`
            // rounds up to 2^63, so the upper bound must be strict.
            if let Some(f) = n.as_f64() {
                if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
                    return Ok(f as i64);
                }
            }
            Err(StoreError::Cast {
                path: path.to_owned(),
                expected: "integer",
            })
        }
        Value::String(s) => s.trim().parse::<i64>().map_err(|_| StoreError::Cast {
            path: path.to_owned(),
            expected: "integer",
        }),
        _ => Err(StoreError::Cast {
            path: path.to_owned(),
            expected: "integer",
        }),
    }
}

fn cast_float(value: &Value, path: &str) -> StoreResult<f64> {
    match value {
        Value::Number(n) => n.as_f64().ok_or(StoreError::Cast {
            path: path.to_owned(),
            expected: "float",
        }),
        Value::String(s) => s.trim().parse::<f64>().map_err(|_| StoreError::Cast {
            path: path.to_owned(),
            expected: "float",
        }),
        _ => Err(StoreError::Cast {
            path: path.to_owned(),
            expected: "float",
        }),
    }
}

/// Parses an ISO-8601 date or date-time string into a UTC timestamp.
///
/// Accepts RFC 3339 date-times, bare `YYYY-MM-DD` dates (midnight UTC) and
/// `YYYY-MM-DDTHH:MM:SS` without an offset (treated as UTC).
pub fn parse_iso_date(input: &str) -> Option<DateTime<Utc>> {
    let trimmed = input.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S") {
        return Some(naive.and_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Some(date.and_hms_opt(0, 0, 0)?.and_utc());
    }
    None
}

fn cast_date(value: &Value, path: &str) -> StoreResult<DateTime<Utc>> {
    match value {
        Value::String(s) => parse_iso_date(s).ok_or(StoreError::Cast {
            path: path.to_owned(),
            expected: "date",
        }),
        _ => Err(StoreError::Cast {
            path: path.to_owned(),
            expected: "date",
        }),
    }
}

fn cast_str<'a>(value: &'a Value, path: &str) -> StoreResult<&'a str> {
    value.as_str().ok_or(StoreError::Cast {
        path: path.to_owned(),
        expected: "string",
    })
}

fn compare_cast(stored: &Value, comparand: &Comparand, path: &str) -> StoreResult<Ordering> {
    let ordering = match comparand {
        Comparand::Int(rhs) => cast_int(stored, path)?.cmp(rhs),
        Comparand::Float(rhs) => cast_float(stored, path)?.total_cmp(rhs),
        Comparand::Date(rhs) => cast_date(stored, path)?.cmp(rhs),
        Comparand::Str(rhs) => cast_str(stored, path)?.cmp(rhs.as_str()),
    };
    Ok(ordering)
}

impl Predicate {
    /// Evaluates this predicate against one document.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Cast`] when a matched value cannot be cast to
    /// the type a comparison requires. The caller treats that as a
    /// request-level failure, not a per-row exclusion.
    pub fn matches(&self, document: &Value) -> StoreResult<bool> {
        match self {
            Predicate::All => Ok(true),
            Predicate::Eq { path, value } => {
                Ok(lookup(document, path).is_some_and(|v| v == value))
            }
            Predicate::Ne { path, value } => {
                Ok(!lookup(document, path).is_some_and(|v| v == value))
            }
            Predicate::Cmp { path, op, value } => match lookup(document, path) {
                Some(stored) => {
                    let ordering = compare_cast(stored, value, path)?;
                    Ok(match op {
                        CmpOp::Lt => ordering == Ordering::Less,
                        CmpOp::Le => ordering != Ordering::Greater,
                        CmpOp::Gt => ordering == Ordering::Greater,
                        CmpOp::Ge => ordering != Ordering::Less,
                        CmpOp::Eq => ordering == Ordering::Equal,
                        CmpOp::Ne => ordering != Ordering::Equal,
                    })
                }
                None => Ok(false),
            },
            Predicate::Text { path, mode, needle } => match lookup(document, path) {
                Some(stored) => {
                    let haystack = cast_str(stored, path)?;
                    Ok(match mode {
                        TextMode::Contains => haystack.contains(needle.as_str()),
                        TextMode::StartsWith => haystack.starts_with(needle.as_str()),
                        TextMode::EndsWith => haystack.ends_with(needle.as_str()),
                    })
                }
                None => Ok(false),
            },
            Predicate::NotEmpty { path } => Ok(match lookup(document, path) {
                None | Some(Value::Null) => false,
                Some(Value::String(s)) => !s.is_empty(),
                Some(_) => true,
            }),
            Predicate::ElemMatch { path, predicate } => match lookup(document, path) {
                Some(Value::Array(elements)) => {
                    for element in elements {
                        if predicate.matches(element)? {
                            return Ok(true);
                        }
                    }
                    Ok(false)
                }
                _ => Ok(false),
            },
            Predicate::And(parts) => {
                for part in parts {
                    if !part.matches(document)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Predicate::Or(parts) => {
                for part in parts {
                    if part.matches(document)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Predicate::Not(inner) => Ok(!inner.matches(document)?),
        }
    }
}

impl SortKey {
    /// Extracts this key's comparand from a document.
    ///
    /// Missing or uncastable values yield `None` and sort after everything
    /// else, regardless of direction.
    pub fn extract(&self, document: &Value) -> Option<Comparand> {
        let raw = match &self.target {
            SortTarget::Path(path) => lookup(document, path)?,
            SortTarget::ArrayElem {
                array_path,
                match_key,
                match_value,
                value_key,
            } => {
                let elements = lookup(document, array_path)?.as_array()?;
                let element = elements.iter().find(|e| {
                    e.get(match_key).and_then(Value::as_str) == Some(match_value.as_str())
                })?;
                element.get(value_key)?
            }
        };

        match self.cast {
            CastKind::String => raw.as_str().map(|s| Comparand::Str(s.to_owned())),
            CastKind::Int => cast_int(raw, "").ok().map(Comparand::Int),
            CastKind::Float => cast_float(raw, "").ok().map(Comparand::Float),
            CastKind::Date => raw.as_str().and_then(parse_iso_date).map(Comparand::Date),
        }
    }
}

/// Total ordering over comparands of the same cast kind.
///
/// Int and Float interoperate (compared as floats); other mixed kinds never
/// occur because every key in one sort position shares a cast.
pub fn compare_comparands(a: &Comparand, b: &Comparand) -> Ordering {
    match (a, b) {
        (Comparand::Int(x), Comparand::Int(y)) => x.cmp(y),
        (Comparand::Float(x), Comparand::Float(y)) => x.total_cmp(y),
        (Comparand::Int(x), Comparand::Float(y)) => (*x as f64).total_cmp(y),
        (Comparand::Float(x), Comparand::Int(y)) => x.total_cmp(&(*y as f64)),
        (Comparand::Date(x), Comparand::Date(y)) => x.cmp(y),
        (Comparand::Str(x), Comparand::Str(y)) => x.cmp(y),
        // Mixed kinds have no meaningful order; keep them stable.
        _ => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record() -> Value {
        json!({
            "id": "r1",
            "names": "Ana",
            "fields": [
                { "name": "Edad", "value": 34 },
                { "name": "Estado Civil", "value": "Casado", "options": ["Soltero", "Casado"] },
                { "name": "Ingreso", "value": "2024-03-01" }
            ]
        })
    }

    #[test]
    fn test_integer_cast_rejects_floats_beyond_i64_range() {
        let doc = json!({ "n": 1e300 });
        let predicate = Predicate::Cmp {
            path: "n".into(),
            op: CmpOp::Gt,
            value: Comparand::Int(0),
        };
        let err = predicate
            .matches(&doc)
            .expect_err("out-of-range float must not cast to integer");
        assert!(matches!(err, StoreError::Cast { .. }));

        // The largest float below 2^63 still casts.
        let in_range = (i64::MAX - 1024) as f64;
        assert!(Predicate::Cmp {
            path: "n".into(),
            op: CmpOp::Gt,
            value: Comparand::Int(0),
        }
        .matches(&json!({ "n": in_range }))
        .expect("in-range float should cast"));
    }

    #[test]
    fn test_lookup_resolves_dotted_paths() {
        let doc = json!({ "a": { "b": { "c": 7 } } });
        assert_eq!(lookup(&doc, "a.b.c"), Some(&json!(7)));
        assert_eq!(lookup(&doc, "a.b.missing"), None);
    }

    #[test]
    fn test_elem_match_finds_matching_array_element() {
        let predicate = Predicate::ElemMatch {
            path: "fields".into(),
            predicate: Box::new(Predicate::And(vec![
                Predicate::Eq {
                    path: "name".into(),
                    value: json!("Edad"),
                },
                Predicate::Cmp {
                    path: "value".into(),
                    op: CmpOp::Gt,
                    value: Comparand::Int(30),
                },
            ])),
        };
        assert!(predicate.matches(&record()).expect("should evaluate"));
    }

    #[test]
    fn test_elem_match_rejects_when_comparison_fails() {
        let predicate = Predicate::ElemMatch {
            path: "fields".into(),
            predicate: Box::new(Predicate::And(vec![
                Predicate::Eq {
                    path: "name".into(),
                    value: json!("Edad"),
                },
                Predicate::Cmp {
                    path: "value".into(),
                    op: CmpOp::Gt,
                    value: Comparand::Int(40),
                },
            ])),
        };
        assert!(!predicate.matches(&record()).expect("should evaluate"));
    }

    #[test]
    fn test_cmp_surfaces_cast_error_for_non_numeric_value() {
        let predicate = Predicate::ElemMatch {
            path: "fields".into(),
            predicate: Box::new(Predicate::And(vec![
                Predicate::Eq {
                    path: "name".into(),
                    value: json!("Estado Civil"),
                },
                Predicate::Cmp {
                    path: "value".into(),
                    op: CmpOp::Gt,
                    value: Comparand::Int(1),
                },
            ])),
        };
        let err = predicate
            .matches(&record())
            .expect_err("casting 'Casado' to integer should fail");
        assert!(matches!(err, StoreError::Cast { .. }));
    }

    #[test]
    fn test_date_comparison_parses_stored_iso_strings() {
        let after_feb = Predicate::ElemMatch {
            path: "fields".into(),
            predicate: Box::new(Predicate::And(vec![
                Predicate::Eq {
                    path: "name".into(),
                    value: json!("Ingreso"),
                },
                Predicate::Cmp {
                    path: "value".into(),
                    op: CmpOp::Gt,
                    value: Comparand::Date(parse_iso_date("2024-02-01").unwrap()),
                },
            ])),
        };
        assert!(after_feb.matches(&record()).expect("should evaluate"));
    }

    #[test]
    fn test_text_modes() {
        let doc = json!({ "name": "Plantilla General" });
        let starts = Predicate::Text {
            path: "name".into(),
            mode: TextMode::StartsWith,
            needle: "Plantilla".into(),
        };
        let ends = Predicate::Text {
            path: "name".into(),
            mode: TextMode::EndsWith,
            needle: "General".into(),
        };
        let contains = Predicate::Text {
            path: "name".into(),
            mode: TextMode::Contains,
            needle: "lla Gen".into(),
        };
        assert!(starts.matches(&doc).unwrap());
        assert!(ends.matches(&doc).unwrap());
        assert!(contains.matches(&doc).unwrap());
    }

    #[test]
    fn test_not_empty_semantics() {
        let doc = json!({ "a": "", "b": "x", "c": null });
        let empty = |path: &str| Predicate::NotEmpty { path: path.into() };
        assert!(!empty("a").matches(&doc).unwrap());
        assert!(empty("b").matches(&doc).unwrap());
        assert!(!empty("c").matches(&doc).unwrap());
        assert!(!empty("missing").matches(&doc).unwrap());
    }

    #[test]
    fn test_sort_key_extracts_cast_value_from_field_array() {
        let key = SortKey {
            target: SortTarget::ArrayElem {
                array_path: "fields".into(),
                match_key: "name".into(),
                match_value: "Edad".into(),
                value_key: "value".into(),
            },
            cast: CastKind::Int,
            direction: SortDirection::Asc,
        };
        assert_eq!(key.extract(&record()), Some(Comparand::Int(34)));
    }

    #[test]
    fn test_sort_key_missing_field_yields_none() {
        let key = SortKey {
            target: SortTarget::ArrayElem {
                array_path: "fields".into(),
                match_key: "name".into(),
                match_value: "Peso".into(),
                value_key: "value".into(),
            },
            cast: CastKind::Int,
            direction: SortDirection::Asc,
        };
        assert_eq!(key.extract(&record()), None);
    }

    #[test]
    fn test_parse_iso_date_accepts_rfc3339_and_plain_dates() {
        assert!(parse_iso_date("2024-03-01").is_some());
        assert!(parse_iso_date("2024-03-01T10:30:00Z").is_some());
        assert!(parse_iso_date("2024-03-01T10:30:00").is_some());
        assert!(parse_iso_date("01/03/2024").is_none());
        assert!(parse_iso_date("not a date").is_none());
    }
}
