//! In-memory workbook fixtures.

#![allow(dead_code)]

use std::io::Cursor;
use std::io::Write;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// One fixture cell
#[derive(Clone, Debug)]
pub enum Fx {
    Text(String),
    Number(f64),
    /// Excel serial day number, styled as a date
    Date(u32),
    Bool(bool),
    Blank,
}

pub fn text(value: &str) -> Fx {
    Fx::Text(value.to_owned())
}

pub fn row(headers: &[&str]) -> Vec<Fx> {
    headers.iter().map(|header| text(header)).collect()
}

fn column_name(index: usize) -> String {
    let mut index = index + 1;
    let mut name = String::new();
    while index > 0 {
        let rem = (index - 1) % 26;
        name.insert(0, (b'A' + rem as u8) as char);
        index = (index - 1) / 26;
    }
    name
}

fn escape(value: &str) -> String {
    value.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn zip_bytes(parts: &[(String, String)]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in parts {
        writer.start_file(name.as_str(), SimpleFileOptions::default()).unwrap();
        writer.write_all(content.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

fn worksheet_xml(rows: &[Vec<Fx>]) -> String {
    let mut xml = String::from("<worksheet><sheetData>");
    for (row_index, cells) in rows.iter().enumerate() {
        xml.push_str(&format!(r#"<row r="{}">"#, row_index + 1));
        for (col_index, cell) in cells.iter().enumerate() {
            let reference = format!("{}{}", column_name(col_index), row_index + 1);
            match cell {
                Fx::Text(value) => xml.push_str(&format!(
                    r#"<c r="{reference}" t="inlineStr"><is><t>{}</t></is></c>"#,
                    escape(value)
                )),
                Fx::Number(value) => xml.push_str(&format!(r#"<c r="{reference}"><v>{value}</v></c>"#)),
                Fx::Date(serial) => xml.push_str(&format!(r#"<c r="{reference}" s="1"><v>{serial}</v></c>"#)),
                Fx::Bool(value) => xml.push_str(&format!(r#"<c r="{reference}" t="b"><v>{}</v></c>"#, u8::from(*value))),
                Fx::Blank => {}
            }
        }
        xml.push_str("</row>");
    }
    xml.push_str("</sheetData></worksheet>");
    xml
}

/// Builds an .xlsx package with one worksheet per `(name, rows)` entry, in order.
pub fn xlsx(sheets: &[(&str, Vec<Vec<Fx>>)]) -> Vec<u8> {
    let mut workbook = String::from(
        r#"<workbook xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets>"#,
    );
    let mut rels = String::from(
        r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    );
    let mut parts = Vec::<(String, String)>::new();
    for (index, (name, rows)) in sheets.iter().enumerate() {
        let number = index + 1;
        workbook.push_str(&format!(
            r#"<sheet name="{}" sheetId="{number}" r:id="rId{number}"/>"#,
            escape(name)
        ));
        rels.push_str(&format!(
            r#"<Relationship Id="rId{number}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet{number}.xml"/>"#
        ));
        parts.push((format!("xl/worksheets/sheet{number}.xml"), worksheet_xml(rows)));
    }
    workbook.push_str("</sheets></workbook>");
    rels.push_str("</Relationships>");
    parts.push(("xl/workbook.xml".to_owned(), workbook));
    parts.push(("xl/_rels/workbook.xml.rels".to_owned(), rels));
    parts.push((
        "xl/styles.xml".to_owned(),
        r#"<styleSheet><cellXfs count="2"><xf numFmtId="0"/><xf numFmtId="14"/></cellXfs></styleSheet>"#.to_owned(),
    ));
    zip_bytes(&parts)
}

/// Builds an .ods package with one table per `(name, rows)` entry. Dates are not supported.
pub fn ods(sheets: &[(&str, Vec<Vec<Fx>>)]) -> Vec<u8> {
    let mut content = String::from(
        r#"<office:document-content xmlns:office="urn:oasis:names:tc:opendocument:xmlns:office:1.0" xmlns:table="urn:oasis:names:tc:opendocument:xmlns:table:1.0" xmlns:text="urn:oasis:names:tc:opendocument:xmlns:text:1.0"><office:body><office:spreadsheet>"#,
    );
    for (name, rows) in sheets {
        content.push_str(&format!(r#"<table:table table:name="{}">"#, escape(name)));
        for cells in rows {
            content.push_str("<table:table-row>");
            for cell in cells {
                match cell {
                    Fx::Text(value) => content.push_str(&format!(
                        r#"<table:table-cell office:value-type="string"><text:p>{}</text:p></table:table-cell>"#,
                        escape(value)
                    )),
                    Fx::Number(value) => content.push_str(&format!(
                        r#"<table:table-cell office:value-type="float" office:value="{value}"/>"#
                    )),
                    Fx::Bool(value) => content.push_str(&format!(
                        r#"<table:table-cell office:value-type="boolean" office:boolean-value="{value}"/>"#
                    )),
                    Fx::Date(_) | Fx::Blank => content.push_str("<table:table-cell/>"),
                }
            }
            content.push_str("</table:table-row>");
        }
        content.push_str("</table:table>");
    }
    content.push_str("</office:spreadsheet></office:body></office:document-content>");
    zip_bytes(&[
        ("mimetype".to_owned(), "application/vnd.oasis.opendocument.spreadsheet".to_owned()),
        ("content.xml".to_owned(), content),
    ])
}

fn biff_record(kind: u16, payload: &[u8]) -> Vec<u8> {
    let mut bytes = kind.to_le_bytes().to_vec();
    bytes.extend_from_slice(&(payload.len() as u16).to_le_bytes());
    bytes.extend_from_slice(payload);
    bytes
}

/// XLUnicodeString with UTF-16 characters
fn biff_string(value: &str) -> Vec<u8> {
    let units: Vec<u16> = value.encode_utf16().collect();
    let mut bytes = (units.len() as u16).to_le_bytes().to_vec();
    bytes.push(1);
    bytes.extend(units.iter().flat_map(|unit| unit.to_le_bytes()));
    bytes
}

fn biff_bof(substream: u16) -> Vec<u8> {
    let mut payload = [0x0600u16.to_le_bytes(), substream.to_le_bytes()].concat();
    payload.resize(16, 0);
    biff_record(2057, &payload)
}

/// Wraps one stream in a version 3 compound file; the stream fills whole 512-byte sectors
/// and is padded past the 4096-byte mini stream cutoff.
fn compound_file(name: &str, stream: &[u8]) -> Vec<u8> {
    const END_OF_CHAIN: u32 = 0xFFFF_FFFE;
    const FREE: u32 = 0xFFFF_FFFF;
    let mut data = stream.to_vec();
    data.resize(data.len().max(4096).div_ceil(512) * 512, 0);
    let count = data.len() / 512;
    assert!(count <= 126, "fixture stream too large");

    let mut header = vec![0u8; 512];
    header[0..8].copy_from_slice(&[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1]);
    header[24..26].copy_from_slice(&0x3Eu16.to_le_bytes());
    header[26..28].copy_from_slice(&3u16.to_le_bytes());
    header[28..30].copy_from_slice(&0xFFFEu16.to_le_bytes());
    header[30..32].copy_from_slice(&9u16.to_le_bytes());
    header[32..34].copy_from_slice(&6u16.to_le_bytes());
    header[44..48].copy_from_slice(&1u32.to_le_bytes());
    header[48..52].copy_from_slice(&1u32.to_le_bytes());
    header[56..60].copy_from_slice(&4096u32.to_le_bytes());
    header[60..64].copy_from_slice(&END_OF_CHAIN.to_le_bytes());
    header[68..72].copy_from_slice(&END_OF_CHAIN.to_le_bytes());
    for slot in header[80..].chunks_exact_mut(4) {
        slot.copy_from_slice(&FREE.to_le_bytes());
    }

    let mut fat = vec![FREE; 128];
    fat[0] = 0xFFFF_FFFD;
    fat[1] = END_OF_CHAIN;
    for index in 0..count {
        fat[2 + index] = if index + 1 == count { END_OF_CHAIN } else { (3 + index) as u32 };
    }

    let mut directory = vec![0u8; 512];
    for (slot, (entry, kind, start, size)) in [("Root Entry", 5u8, END_OF_CHAIN, 0u64), (name, 2, 2, data.len() as u64)]
        .into_iter()
        .enumerate()
    {
        let bytes = &mut directory[slot * 128..(slot + 1) * 128];
        let units: Vec<u16> = entry.encode_utf16().chain([0]).collect();
        for (position, unit) in units.iter().enumerate() {
            bytes[position * 2..position * 2 + 2].copy_from_slice(&unit.to_le_bytes());
        }
        bytes[64..66].copy_from_slice(&((units.len() * 2) as u16).to_le_bytes());
        bytes[66] = kind;
        bytes[116..120].copy_from_slice(&start.to_le_bytes());
        bytes[120..128].copy_from_slice(&size.to_le_bytes());
    }

    let mut bytes = header;
    bytes.extend(fat.iter().flat_map(|value| value.to_le_bytes()));
    bytes.extend(directory);
    bytes.extend(data);
    bytes
}

/// Builds an Excel 97-2003 .xls workbook. Style 1 carries the built-in date format 14.
pub fn xls(sheets: &[(&str, Vec<Vec<Fx>>)]) -> Vec<u8> {
    let mut stream = biff_bof(0x0005);
    stream.extend(biff_record(66, &1200u16.to_le_bytes()));
    for format in [0u16, 14] {
        let mut payload = vec![0, 0];
        payload.extend_from_slice(&format.to_le_bytes());
        payload.resize(20, 0);
        stream.extend(biff_record(224, &payload));
    }
    let mut pointers = Vec::new();
    for (name, _) in sheets {
        pointers.push(stream.len() + 4);
        let units: Vec<u16> = name.encode_utf16().collect();
        let mut payload = vec![0, 0, 0, 0, 0, 0, units.len() as u8, 1];
        payload.extend(units.iter().flat_map(|unit| unit.to_le_bytes()));
        stream.extend(biff_record(133, &payload));
    }
    stream.extend(biff_record(10, &[]));

    for ((_, rows), pointer) in sheets.iter().zip(pointers) {
        let offset = (stream.len() as u32).to_le_bytes();
        stream[pointer..pointer + 4].copy_from_slice(&offset);
        stream.extend(biff_bof(0x0010));
        for (row_index, cells) in rows.iter().enumerate() {
            for (col_index, cell) in cells.iter().enumerate() {
                let mut payload = [(row_index as u16).to_le_bytes(), (col_index as u16).to_le_bytes()].concat();
                let (kind, xf, body) = match cell {
                    Fx::Text(value) => (516, 0u16, biff_string(value)),
                    Fx::Number(value) => (515, 0, value.to_le_bytes().to_vec()),
                    Fx::Date(serial) => (515, 1, f64::from(*serial).to_le_bytes().to_vec()),
                    Fx::Bool(value) => (517, 0, vec![u8::from(*value), 0]),
                    Fx::Blank => continue,
                };
                payload.extend_from_slice(&xf.to_le_bytes());
                payload.extend(body);
                stream.extend(biff_record(kind, &payload));
            }
        }
        stream.extend(biff_record(10, &[]));
    }
    compound_file("Workbook", &stream)
}

/// Serial day number of 2024-01-15 in the 1900 date system
pub const JAN_15_2024: u32 = 45306;

/// Seven sales rows: Fecha, Producto (three distinct), Monto ($), Cantidad.
pub fn ventas() -> Vec<Vec<Fx>> {
    let mut rows = vec![row(&["Fecha", "Producto", "Monto ($)", "Cantidad"])];
    for day in 0..7u32 {
        rows.push(vec![
            Fx::Date(JAN_15_2024 + day),
            text(["Café", "Té", "Pan"][day as usize % 3]),
            Fx::Number(100.5 + f64::from(day)),
            Fx::Number(f64::from(day + 1)),
        ]);
    }
    rows
}

pub fn empleados() -> Vec<Vec<Fx>> {
    vec![
        row(&["Nombre", "Email", "Cargo"]),
        row(&["Ana Ruiz", "ana@empresa.com", "Gerente"]),
        row(&["Luis Paz", "luis@empresa.com", "Analista"]),
    ]
}

/// The two-sheet sales workbook used across the integration tests.
pub fn sales_workbook() -> Vec<u8> {
    xlsx(&[("Ventas", ventas()), ("Empleados", empleados())])
}
