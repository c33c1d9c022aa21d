use crate::spreadsheet::CellValue;
use serde_json::Map;
use serde_json::Number;
use serde_json::Value;

/// One normalized row: sanitized column name to JSON value, in column order.
pub type Record = Map<String, Value>;

/// Converts a cell to its JSON form. Null, NaN and infinities become `null`;
/// timestamps become `YYYY-MM-DDTHH:MM:SS`.
pub fn to_json_value(value: &CellValue) -> Value {
    match value {
        CellValue::Null => Value::Null,
        CellValue::Boolean(value) => Value::Bool(*value),
        CellValue::Integer(value) => Value::Number((*value).into()),
        CellValue::Float(value) => Number::from_f64(*value).map(Value::Number).unwrap_or(Value::Null),
        CellValue::DateTime(value) => Value::String(value.format("%Y-%m-%dT%H:%M:%S").to_string()),
        CellValue::Text(value) => Value::String(value.to_owned()),
    }
}

/// Builds one record per row, keyed positionally by `column_names`.
/// Short rows are padded with `null`; cells past the last name are dropped.
pub fn normalize_rows(rows: &[Vec<CellValue>], column_names: &[String]) -> Vec<Record> {
    rows.iter()
        .map(|row| {
            column_names
                .iter()
                .enumerate()
                .map(|(index, name)| {
                    let value = row.get(index).map(to_json_value).unwrap_or(Value::Null);
                    (name.to_owned(), value)
                })
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    #[test]
    fn normalizes_values() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap().and_hms_opt(8, 0, 0).unwrap();
        let rows = vec![
            vec![CellValue::DateTime(date), CellValue::Float(f64::NAN), CellValue::Integer(3), CellValue::Boolean(true)],
            vec![CellValue::from("x"), CellValue::Float(1.5)],
        ];
        let names: Vec<String> = ["fecha", "monto", "cantidad", "activo"].iter().map(|s| s.to_string()).collect();
        let records = normalize_rows(&rows, &names);
        assert_eq!(records.len(), 2);
        assert_eq!(
            Value::Object(records[0].clone()),
            json!({"fecha": "2024-01-15T08:00:00", "monto": null, "cantidad": 3, "activo": true})
        );
        assert_eq!(
            Value::Object(records[1].clone()),
            json!({"fecha": "x", "monto": 1.5, "cantidad": null, "activo": null})
        );
        let keys: Vec<&String> = records[0].keys().collect();
        assert_eq!(keys, vec!["fecha", "monto", "cantidad", "activo"]);
    }

    #[test]
    fn infinities_are_null() {
        assert_eq!(to_json_value(&CellValue::Float(f64::INFINITY)), Value::Null);
        assert_eq!(to_json_value(&CellValue::Null), Value::Null);
    }

    #[test]
    fn no_rows_no_records() {
        assert!(normalize_rows(&[], &["a".to_owned()]).is_empty());
    }
}
