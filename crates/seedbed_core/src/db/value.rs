//! Mapping between row values (`serde_json::Value`) and SQLite values.
//!
//! # Invariants
//! - JSON null/bool/integer/float/string map to NULL/INTEGER/INTEGER/REAL/TEXT.
//! - Arrays and objects have no column representation and are rejected.

use super::{DbError, DbResult};
use rusqlite::types::{Value as SqlValue, ValueRef};
use serde_json::{Map, Number, Value};

/// Converts one row value into a bindable SQLite value.
pub fn to_sql_value(column: &str, value: &Value) -> DbResult<SqlValue> {
    match value {
        Value::Null => Ok(SqlValue::Null),
        Value::Bool(flag) => Ok(SqlValue::Integer(i64::from(*flag))),
        Value::Number(number) => {
            if let Some(int) = number.as_i64() {
                Ok(SqlValue::Integer(int))
            } else if number.is_u64() {
                // Above i64::MAX; SQLite integers are signed 64-bit.
                Err(DbError::UnsupportedValue {
                    column: column.to_string(),
                })
            } else {
                number
                    .as_f64()
                    .map(SqlValue::Real)
                    .ok_or_else(|| DbError::UnsupportedValue {
                        column: column.to_string(),
                    })
            }
        }
        Value::String(text) => Ok(SqlValue::Text(text.clone())),
        Value::Array(_) | Value::Object(_) => Err(DbError::UnsupportedValue {
            column: column.to_string(),
        }),
    }
}

/// Converts one stored SQLite value back into a row value.
pub fn from_sql_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(int) => Value::Number(Number::from(int)),
        ValueRef::Real(real) => Number::from_f64(real).map_or(Value::Null, Value::Number),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::Array(
            bytes
                .iter()
                .map(|byte| Value::Number(Number::from(*byte)))
                .collect(),
        ),
    }
}

/// Reads every column of a result row into a name → value map.
pub(crate) fn read_row(row: &rusqlite::Row<'_>, column_names: &[String]) -> DbResult<Map<String, Value>> {
    let mut values = Map::new();
    for (index, name) in column_names.iter().enumerate() {
        values.insert(name.clone(), from_sql_value(row.get_ref(index)?));
    }
    Ok(values)
}

/// Whether a candidate value counts as "not supplied".
///
/// Absent, null and empty-string values are empty; `0` and `false` are not.
pub fn is_empty_value(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(text)) => text.is_empty(),
        Some(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::{from_sql_value, is_empty_value, to_sql_value};
    use crate::db::DbError;
    use rusqlite::types::{Value as SqlValue, ValueRef};
    use serde_json::json;

    #[test]
    fn scalar_values_map_to_sql() {
        assert_eq!(to_sql_value("c", &json!(null)).unwrap(), SqlValue::Null);
        assert_eq!(to_sql_value("c", &json!(true)).unwrap(), SqlValue::Integer(1));
        assert_eq!(to_sql_value("c", &json!(-7)).unwrap(), SqlValue::Integer(-7));
        assert_eq!(to_sql_value("c", &json!(0.25)).unwrap(), SqlValue::Real(0.25));
        assert_eq!(
            to_sql_value("c", &json!("vat")).unwrap(),
            SqlValue::Text("vat".to_string())
        );
    }

    #[test]
    fn nested_and_oversized_values_are_rejected() {
        assert!(matches!(
            to_sql_value("tags", &json!(["a"])),
            Err(DbError::UnsupportedValue { column }) if column == "tags"
        ));
        assert!(to_sql_value("meta", &json!({"a": 1})).is_err());
        assert!(to_sql_value("big", &json!(u64::MAX)).is_err());
    }

    #[test]
    fn stored_values_map_back_to_json() {
        assert_eq!(from_sql_value(ValueRef::Integer(3)), json!(3));
        assert_eq!(from_sql_value(ValueRef::Text(b"x")), json!("x"));
        assert_eq!(from_sql_value(ValueRef::Null), json!(null));
    }

    #[test]
    fn empty_means_absent_null_or_blank_string() {
        assert!(is_empty_value(None));
        assert!(is_empty_value(Some(&json!(null))));
        assert!(is_empty_value(Some(&json!(""))));
        assert!(!is_empty_value(Some(&json!(0))));
        assert!(!is_empty_value(Some(&json!(false))));
        assert!(!is_empty_value(Some(&json!(" "))));
    }
}
