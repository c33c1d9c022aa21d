mod common;

use bento_excel::processor::Processor;
use bento_excel::schema::SemanticType;
use bento_excel::{process_all_sheets, process_workbook, BentoError, Settings};
use chrono::NaiveDate;
use chrono::NaiveDateTime;
use common::{empleados, ods, row, sales_workbook, text, ventas, xls, xlsx, Fx};
use serde_json::json;

fn timestamp() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 6, 1).unwrap().and_hms_opt(12, 30, 0).unwrap()
}

#[test]
fn test_two_sheet_workbook() {
    let result = Processor::default().process_workbook_at(&sales_workbook(), timestamp()).unwrap();

    assert_eq!(result.sheets_processed, 2);
    assert_eq!(result.table_names, vec!["ventas_20240601_123000", "empleados_20240601_123000"]);
    assert_eq!(result.total_widgets, 7);
    assert_eq!(result.message, "2 hoja(s) procesada(s) exitosamente. 7 widget(s) sugerido(s).");

    let ventas = &result.sheets[0];
    assert_eq!(ventas.sheet_name, "Ventas");
    assert_eq!(ventas.row_count, 7);
    assert_eq!(ventas.column_count, 4);
    assert_eq!(
        ventas.column_types.iter().collect::<Vec<_>>(),
        vec![
            ("fecha", SemanticType::Date),
            ("producto", SemanticType::String),
            ("monto_", SemanticType::Number),
            ("cantidad", SemanticType::Integer),
        ]
    );
    let types: Vec<&str> = ventas.widget_suggestions.iter().map(|widget| widget.widget_type()).collect();
    assert_eq!(types, vec!["table", "kpi", "kpi", "bar_chart", "line_chart", "pie_chart"]);
    assert!(!ventas.suggests_user_import);
    assert_eq!(ventas.sample_rows.len(), 5);
    assert_eq!(
        serde_json::Value::Object(ventas.sample_rows[0].clone()),
        json!({"fecha": "2024-01-15T00:00:00", "producto": "Café", "monto_": 100.5, "cantidad": 1})
    );
    assert_eq!(ventas.full_row_data.len(), 7);

    let empleados = &result.sheets[1];
    assert_eq!(empleados.widget_count(), 1);
    assert!(empleados.suggests_user_import);
    let mapping = empleados.user_columns.as_ref().unwrap();
    assert_eq!((mapping.email.as_str(), mapping.name.as_str()), ("email", "nombre"));
    assert_eq!(mapping.role.as_deref(), Some("cargo"));
    assert_eq!(empleados.full_row_data[1][&mapping.email], "luis@empresa.com");
}

#[test]
fn test_process_response_shape() {
    let response = process_all_sheets(&sales_workbook());
    assert!(response.success);
    let value = serde_json::to_value(&response).unwrap();
    assert_eq!(value["success"], true);
    assert!(value.get("error").is_none());
    assert_eq!(value["sheets_processed"], 2);
    assert_eq!(value["widgets_created"], 7);
    assert_eq!(value["tables"].as_array().unwrap().len(), 2);
    assert_eq!(value["sheets"][0]["widget_suggestions"][0]["widget_type"], "table");
    assert_eq!(value["sheets"][0]["widget_suggestions"][0]["config"]["pageSize"], 20);
    assert_eq!(value["sheets"][1]["user_columns"]["email"], "email");
}

#[test]
fn test_not_an_excel() {
    let response = process_all_sheets(b"not-an-excel");
    assert!(!response.success);
    assert!(!response.error.unwrap().is_empty());
    assert!(process_workbook(b"not-an-excel").is_err());
}

#[test]
fn test_degenerate_sheets() {
    let bytes = xlsx(&[
        ("Vacía", Vec::new()),
        ("Solo encabezados", vec![row(&["a", "b"])]),
        ("Nulos", vec![row(&["x"]), vec![Fx::Blank], vec![Fx::Blank]]),
    ]);
    let result = Processor::default().process_workbook_at(&bytes, timestamp()).unwrap();
    assert_eq!(result.sheets_processed, 3);

    let empty = &result.sheets[0];
    assert_eq!(empty.table_name, "vaca_20240601_123000");
    assert_eq!((empty.row_count, empty.column_count), (0, 0));
    assert_eq!(empty.widget_count(), 1);

    let headers_only = &result.sheets[1];
    assert_eq!(headers_only.row_count, 0);
    assert_eq!(headers_only.column_types.get("b"), Some(SemanticType::String));
    assert_eq!(headers_only.widget_count(), 1);

    let nulls = &result.sheets[2];
    assert_eq!(nulls.column_types.get("x"), Some(SemanticType::String));
    // trailing rows without cells are outside the used range
    assert_eq!(nulls.row_count, 0);
    assert!(nulls.full_row_data.is_empty());
}

#[test]
fn test_interior_blank_rows_are_kept() {
    let bytes = xlsx(&[(
        "Hoja1",
        vec![row(&["nombre", "valor"]), vec![text("a"), Fx::Number(1.0)], Vec::new(), vec![text("b"), Fx::Number(2.0)]],
    )]);
    let result = process_workbook(&bytes).unwrap();
    let sheet = &result.sheets[0];
    assert_eq!(sheet.row_count, 3);
    assert_eq!(sheet.full_row_data.len(), 3);
    assert_eq!(serde_json::Value::Object(sheet.full_row_data[1].clone()), json!({"nombre": null, "valor": null}));
    assert_eq!(sheet.full_row_data[2]["nombre"], "b");
    assert_eq!(sheet.column_types.get("valor"), Some(SemanticType::Integer));
}

#[test]
fn test_same_second_tables_collide() {
    let bytes = xlsx(&[("Datos", ventas()), ("datos", ventas())]);
    let result = Processor::default().process_workbook_at(&bytes, timestamp()).unwrap();
    assert_eq!(result.table_names[0], result.table_names[1]);
}

#[test]
fn test_ods_workbook() {
    let bytes = ods(&[
        ("Equipo", empleados()),
        ("Stock", vec![row(&["Item", "Unidades"]), vec![text("Tornillo"), Fx::Number(40.0)], vec![text("Tuerca"), Fx::Bool(true)]]),
    ]);
    let result = process_workbook(&bytes).unwrap();
    assert_eq!(result.sheets_processed, 2);
    assert!(result.sheets[0].suggests_user_import);
    // a boolean among integers keeps the column out of the numeric types
    assert_eq!(result.sheets[1].column_types.get("unidades"), Some(SemanticType::String));
}

#[test]
fn test_xls_workbook_matches_xlsx() {
    let legacy = xls(&[("Ventas", ventas()), ("Empleados", empleados())]);
    let processor = Processor::default();
    let from_xls = processor.process_workbook_at(&legacy, timestamp()).unwrap();
    let from_xlsx = processor.process_workbook_at(&sales_workbook(), timestamp()).unwrap();
    assert_eq!(from_xls.sheets, from_xlsx.sheets);
    assert_eq!(from_xls.table_names, from_xlsx.table_names);
    assert_eq!(from_xls.message, from_xlsx.message);
    assert_eq!(from_xls.sheets[0].column_types.get("fecha"), Some(SemanticType::Date));

    let validation = processor.validate_file(&legacy, "ventas.xls");
    assert!(validation.valid, "{:?}", validation.errors);
    assert_eq!(processor.get_data_preview(&legacy, 2).unwrap().rows.len(), 2);
}

#[test]
fn test_preview_stops_at_limit() {
    let processor = Processor::default();
    let preview = processor.get_data_preview(&sales_workbook(), 3).unwrap();
    assert_eq!(preview.headers, vec!["Fecha", "Producto", "Monto ($)", "Cantidad"]);
    assert_eq!(preview.rows.len(), 3);
    assert_eq!((preview.total_rows, preview.sample_size), (3, 3));
    assert_eq!(preview.rows[0][0], json!("2024-01-15T00:00:00"));
    assert_eq!(preview.rows[2][3], json!(3));

    let preview = processor.get_data_preview(&sales_workbook(), 50).unwrap();
    assert_eq!((preview.total_rows, preview.sample_size), (7, 7));

    let preview = processor.get_default_preview(&sales_workbook()).unwrap();
    assert_eq!(preview.total_rows, 7);

    assert!(processor.get_data_preview(b"not-an-excel", 3).is_err());
}

#[test]
fn test_validation() {
    let processor = Processor::default();
    let validation = processor.validate_file(&sales_workbook(), "Ventas.XLSX");
    assert!(validation.valid, "{:?}", validation.errors);
    assert!(validation.errors.is_empty());

    let validation = processor.validate_file(&sales_workbook(), "ventas.csv");
    assert!(!validation.valid);
    assert_eq!(validation.errors, vec!["Extensión no soportada. Use: .xlsx, .xlsm, .xls, .ods"]);

    let validation = processor.validate_file(b"", "ventas.xlsx");
    assert_eq!(validation.errors, vec!["El archivo está vacío"]);

    let small = Processor::new(Settings {
        max_file_size: 100,
        ..Settings::default()
    });
    let validation = small.validate_file(&sales_workbook(), "ventas.xlsx");
    assert_eq!(validation.errors.len(), 1);
    assert!(validation.errors[0].starts_with("Archivo demasiado grande"));
}

#[test]
fn test_analysis() {
    let mut rows = ventas();
    rows.push(vec![Fx::Date(common::JAN_15_2024), text("Café"), Fx::Blank, Fx::Number(1.0)]);
    let bytes = xlsx(&[("Ventas", rows), ("Empleados", empleados())]);

    let analysis = Processor::default().analyze_file(&bytes);
    assert!(analysis.valid);
    assert_eq!(analysis.sheets, vec!["Ventas", "Empleados"]);
    assert_eq!((analysis.rows, analysis.columns), (8, 4));
    assert_eq!(analysis.file_size, bytes.len());

    let info: Vec<(&str, SemanticType, bool, usize)> = analysis
        .column_info
        .iter()
        .map(|column| (column.name.as_str(), column.kind, column.nullable, column.unique_values))
        .collect();
    assert_eq!(
        info,
        vec![
            ("Fecha", SemanticType::Date, false, 7),
            ("Producto", SemanticType::String, false, 3),
            ("Monto ($)", SemanticType::Number, true, 7),
            ("Cantidad", SemanticType::Integer, false, 7),
        ]
    );
    assert_eq!(serde_json::to_value(&analysis.column_info[0]).unwrap()["type"], "date");
}

#[test]
fn test_single_sheet_processing() {
    let processor = Processor::default();
    let result = processor.process_excel(&sales_workbook(), Some("Mis Ventas")).unwrap();
    assert!(result.table_name.starts_with("mis_ventas_"));
    assert_eq!(result.rows_processed, 7);
    assert_eq!(result.columns, 4);
    assert_eq!(result.column_names, vec!["fecha", "producto", "monto_", "cantidad"]);
    assert_eq!(result.column_types.get("cantidad"), Some(SemanticType::Integer));
    assert_eq!(result.data.len(), 7);

    let unnamed = processor.process_excel(&sales_workbook(), None).unwrap();
    assert!(unnamed.table_name.starts_with("excel_data_"));

    assert!(matches!(processor.process_excel(b"", None), Err(BentoError::SpreadsheetError(_))));
}
