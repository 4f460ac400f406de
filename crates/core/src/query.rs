//! Query/filter builder.
//!
//! Translates a declarative filter request (field name, operator,
//! value(s), logic gate) into a predicate expression over the
//! record's name/value field array. Filter literals are parsed eagerly, so
//! a malformed number or date fails the whole request up front rather than
//! silently excluding rows.
//!
//! Clause combination preserves the source system's left-fold behaviour:
//! the default combinator is AND, and a clause whose gate is `or` ORs
//! itself with the *single preceding combined expression*, giving
//! `((c1 AND c2) OR c3) AND c4` rather than grouped-by-gate semantics.
//! The quirk is covered by a dedicated test so any future change to
//! grouped semantics is a conscious one.

use crate::constants::DEFAULT_PAGE_SIZE;
use crate::error::{RecordError, RecordResult};
use crate::fields::FieldType;
use expediente_store::predicate::parse_iso_date;
use expediente_store::{
    CastKind, CmpOp, Comparand, Predicate, SortDirection, SortKey, SortTarget, TextMode,
};
use serde::{Deserialize, Serialize};

/// The AND/OR combinator joining a filter clause to the clauses before it.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogicGate {
    #[default]
    And,
    Or,
}

/// One declarative filter clause.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FilterClause {
    /// Name of the field inside the record's field array.
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub operation: String,
    #[serde(default)]
    pub value: Option<String>,
    /// Two values, used only by the `between` operation.
    #[serde(default)]
    pub values: Option<Vec<String>>,
    #[serde(default)]
    pub logic_gate: LogicGate,
}

/// Sort direction as submitted by clients.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SortMode {
    Asc,
    Desc,
}

/// One declarative sort clause.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SortClause {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub mode: SortMode,
}

/// Result window for a search: page size and zero-based page index.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PageRequest {
    #[serde(default = "default_limit")]
    pub limit: u64,
    #[serde(default)]
    pub page: u64,
}

fn default_limit() -> u64 {
    DEFAULT_PAGE_SIZE
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            limit: DEFAULT_PAGE_SIZE,
            page: 0,
        }
    }
}

impl PageRequest {
    pub fn skip(&self) -> u64 {
        self.page.saturating_mul(self.limit)
    }
}

fn required_value(clause: &FilterClause) -> RecordResult<&str> {
    clause
        .value
        .as_deref()
        .filter(|v| !v.is_empty())
        .ok_or(RecordError::MissingFields)
}

fn required_pair(clause: &FilterClause) -> RecordResult<(&str, &str)> {
    match clause.values.as_deref() {
        Some([low, high]) => Ok((low.as_str(), high.as_str())),
        _ => Err(RecordError::MissingFields),
    }
}

fn parse_int(raw: &str) -> RecordResult<Comparand> {
    raw.trim()
        .parse::<i64>()
        .map(Comparand::Int)
        .map_err(|_| RecordError::InvalidNumberFormat)
}

fn parse_float(raw: &str) -> RecordResult<Comparand> {
    raw.trim()
        .parse::<f64>()
        .map(Comparand::Float)
        .map_err(|_| RecordError::InvalidNumberFormat)
}

fn parse_date(raw: &str) -> RecordResult<Comparand> {
    parse_iso_date(raw)
        .map(Comparand::Date)
        .ok_or(RecordError::InvalidDateFormat)
}

fn unsupported(clause: &FilterClause) -> RecordError {
    RecordError::UnsupportedOperation {
        operation: clause.operation.clone(),
        field_type: clause.field_type,
    }
}

fn cmp(op: CmpOp, value: Comparand) -> Predicate {
    Predicate::Cmp {
        path: "value".into(),
        op,
        value,
    }
}

/// Builds the value-side predicate for one clause, per the operator table:
/// text supports contains/starts_with/ends_with, dates after/before/between,
/// numerics less_than/greater_than/equal_than, choices is/is_not/is_not_empty.
fn value_predicate(clause: &FilterClause) -> RecordResult<Predicate> {
    let operation = clause.operation.as_str();
    match clause.field_type {
        FieldType::ShortText | FieldType::Text => {
            let mode = match operation {
                "contains" => TextMode::Contains,
                "starts_with" => TextMode::StartsWith,
                "ends_with" => TextMode::EndsWith,
                _ => return Err(unsupported(clause)),
            };
            Ok(Predicate::Text {
                path: "value".into(),
                mode,
                needle: required_value(clause)?.to_owned(),
            })
        }
        FieldType::Date => match operation {
            "after" => Ok(cmp(CmpOp::Gt, parse_date(required_value(clause)?)?)),
            "before" => Ok(cmp(CmpOp::Lt, parse_date(required_value(clause)?)?)),
            "between" => {
                let (low, high) = required_pair(clause)?;
                Ok(Predicate::And(vec![
                    cmp(CmpOp::Ge, parse_date(low)?),
                    cmp(CmpOp::Le, parse_date(high)?),
                ]))
            }
            _ => Err(unsupported(clause)),
        },
        FieldType::Number | FieldType::Float => {
            let parse: fn(&str) -> RecordResult<Comparand> = match clause.field_type {
                FieldType::Number => parse_int,
                _ => parse_float,
            };
            let literal = parse(required_value(clause)?)?;
            match operation {
                "less_than" => Ok(cmp(CmpOp::Lt, literal)),
                "greater_than" => Ok(cmp(CmpOp::Gt, literal)),
                "equal_than" => Ok(cmp(CmpOp::Eq, literal)),
                _ => Err(unsupported(clause)),
            }
        }
        FieldType::Choice => match operation {
            "is" => Ok(Predicate::Eq {
                path: "value".into(),
                value: required_value(clause)?.into(),
            }),
            "is_not" => Ok(Predicate::Ne {
                path: "value".into(),
                value: required_value(clause)?.into(),
            }),
            "is_not_empty" => Ok(Predicate::NotEmpty {
                path: "value".into(),
            }),
            _ => Err(unsupported(clause)),
        },
    }
}

/// Builds the element-match predicate for one clause: some element of the
/// field array has this clause's name and satisfies its value predicate.
fn clause_predicate(clause: &FilterClause, array_path: &str) -> RecordResult<Predicate> {
    Ok(Predicate::ElemMatch {
        path: array_path.to_owned(),
        predicate: Box::new(Predicate::And(vec![
            Predicate::Eq {
                path: "name".into(),
                value: clause.name.as_str().into(),
            },
            value_predicate(clause)?,
        ])),
    })
}

/// Translates an ordered clause list into one combined predicate over the
/// field array at `array_path`.
pub fn build_filter(clauses: &[FilterClause], array_path: &str) -> RecordResult<Predicate> {
    let mut iter = clauses.iter();
    let Some(first) = iter.next() else {
        return Ok(Predicate::All);
    };

    let mut combined = clause_predicate(first, array_path)?;
    for clause in iter {
        let next = clause_predicate(clause, array_path)?;
        combined = match clause.logic_gate {
            LogicGate::And => Predicate::And(vec![combined, next]),
            LogicGate::Or => Predicate::Or(vec![combined, next]),
        };
    }
    Ok(combined)
}

fn cast_for(field_type: FieldType) -> CastKind {
    match field_type {
        FieldType::ShortText | FieldType::Text | FieldType::Choice => CastKind::String,
        FieldType::Number => CastKind::Int,
        FieldType::Float => CastKind::Float,
        FieldType::Date => CastKind::Date,
    }
}

/// Translates sort clauses into computed, type-cast sort keys in clause order.
pub fn build_sort(clauses: &[SortClause], array_path: &str) -> Vec<SortKey> {
    clauses
        .iter()
        .map(|clause| SortKey {
            target: SortTarget::ArrayElem {
                array_path: array_path.to_owned(),
                match_key: "name".into(),
                match_value: clause.name.clone(),
                value_key: "value".into(),
            },
            cast: cast_for(clause.field_type),
            direction: match clause.mode {
                SortMode::Asc => SortDirection::Asc,
                SortMode::Desc => SortDirection::Desc,
            },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn clause(
        name: &str,
        field_type: FieldType,
        operation: &str,
        value: &str,
        gate: LogicGate,
    ) -> FilterClause {
        FilterClause {
            name: name.into(),
            field_type,
            operation: operation.into(),
            value: Some(value.into()),
            values: None,
            logic_gate: gate,
        }
    }

    #[test]
    fn test_empty_clause_list_matches_everything() {
        assert_eq!(build_filter(&[], "fields").unwrap(), Predicate::All);
    }

    #[test]
    fn test_single_clause_becomes_elem_match() {
        let built = build_filter(
            &[clause("Edad", FieldType::Number, "greater_than", "30", LogicGate::And)],
            "fields",
        )
        .unwrap();

        let record = json!({ "fields": [ { "name": "Edad", "value": 45 } ] });
        let other = json!({ "fields": [ { "name": "Edad", "value": 20 } ] });
        assert!(built.matches(&record).unwrap());
        assert!(!built.matches(&other).unwrap());
    }

    #[test]
    fn test_malformed_number_literal_fails_request() {
        let err = build_filter(
            &[clause("Age", FieldType::Number, "greater_than", "abc", LogicGate::And)],
            "fields",
        )
        .expect_err("non-numeric literal should fail eagerly");
        assert!(matches!(err, RecordError::InvalidNumberFormat));
    }

    #[test]
    fn test_malformed_date_literal_fails_request() {
        let err = build_filter(
            &[clause("Ingreso", FieldType::Date, "after", "31/12/2020", LogicGate::And)],
            "fields",
        )
        .expect_err("non-ISO date should fail eagerly");
        assert!(matches!(err, RecordError::InvalidDateFormat));
    }

    #[test]
    fn test_between_requires_two_values() {
        let mut between = clause("Ingreso", FieldType::Date, "between", "", LogicGate::And);
        between.value = None;
        between.values = Some(vec!["2020-01-01".into()]);
        let err = build_filter(&[between.clone()], "fields")
            .expect_err("one value should not satisfy between");
        assert!(matches!(err, RecordError::MissingFields));

        between.values = Some(vec!["2020-01-01".into(), "2020-12-31".into()]);
        build_filter(&[between], "fields").expect("two values should build");
    }

    #[test]
    fn test_unknown_operation_for_type_is_rejected() {
        let err = build_filter(
            &[clause("Edad", FieldType::Number, "contains", "3", LogicGate::And)],
            "fields",
        )
        .expect_err("'contains' is not a numeric operation");
        assert!(matches!(err, RecordError::UnsupportedOperation { .. }));
    }

    #[test]
    fn test_or_clause_folds_with_preceding_combined_expression() {
        // c1 AND c2 OR c3 AND c4 must build ((c1 AND c2) OR c3) AND c4.
        let c1 = clause("A", FieldType::Number, "greater_than", "1", LogicGate::And);
        let c2 = clause("B", FieldType::Number, "greater_than", "2", LogicGate::And);
        let c3 = clause("C", FieldType::Number, "greater_than", "3", LogicGate::Or);
        let c4 = clause("D", FieldType::Number, "greater_than", "4", LogicGate::And);

        let built = build_filter(&[c1, c2, c3, c4], "fields").unwrap();

        let doc = |a: i64, b: i64, c: i64, d: i64| {
            json!({ "fields": [
                { "name": "A", "value": a },
                { "name": "B", "value": b },
                { "name": "C", "value": c },
                { "name": "D", "value": d }
            ]})
        };

        // OR arm rescues a failed (c1 AND c2).
        assert!(built.matches(&doc(0, 0, 9, 9)).unwrap());
        // Trailing AND still binds: c4 false sinks everything.
        assert!(!built.matches(&doc(9, 9, 9, 0)).unwrap());
        // All true passes.
        assert!(built.matches(&doc(9, 9, 9, 9)).unwrap());
        // Everything false fails.
        assert!(!built.matches(&doc(0, 0, 0, 9)).unwrap());
        // Distinguishes the left fold from grouped-by-gate semantics:
        // (c1 AND c2) OR (c3 AND c4) would accept this document.
        assert!(!built.matches(&doc(9, 9, 0, 0)).unwrap());
    }

    #[test]
    fn test_choice_is_not_empty_needs_no_value() {
        let mut c = clause("Estado", FieldType::Choice, "is_not_empty", "", LogicGate::And);
        c.value = None;
        let built = build_filter(&[c], "fields").expect("is_not_empty needs no literal");

        let present = json!({ "fields": [ { "name": "Estado", "value": "Soltero" } ] });
        let empty = json!({ "fields": [ { "name": "Estado", "value": "" } ] });
        assert!(built.matches(&present).unwrap());
        assert!(!built.matches(&empty).unwrap());
    }

    #[test]
    fn test_build_sort_casts_per_field_type() {
        let keys = build_sort(
            &[
                SortClause {
                    name: "Edad".into(),
                    field_type: FieldType::Number,
                    mode: SortMode::Desc,
                },
                SortClause {
                    name: "Ingreso".into(),
                    field_type: FieldType::Date,
                    mode: SortMode::Asc,
                },
            ],
            "fields",
        );
        assert_eq!(keys.len(), 2);
        assert_eq!(keys[0].cast, CastKind::Int);
        assert_eq!(keys[0].direction, SortDirection::Desc);
        assert_eq!(keys[1].cast, CastKind::Date);
    }

    #[test]
    fn test_page_request_skip() {
        let page = PageRequest { limit: 10, page: 3 };
        assert_eq!(page.skip(), 30);
        assert_eq!(PageRequest::default().skip(), 0);
    }

    #[test]
    fn test_filter_clause_deserializes_camel_case_gate() {
        let parsed: FilterClause = serde_json::from_value(json!({
            "name": "Edad",
            "type": "NUMBER",
            "operation": "less_than",
            "value": "40",
            "logicGate": "or"
        }))
        .unwrap();
        assert_eq!(parsed.logic_gate, LogicGate::Or);
    }
}
