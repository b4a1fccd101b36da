//! dBASE III table reader.
//!
//! Reads the fixed header, the 32-byte field descriptors and the fixed-width
//! records. Text is Latin-1. Deleted records (`*` flag) are skipped. Values
//! are rendered to text the way the downstream CSV expects them:
//! dates as `YYYY-MM-DD`, logicals as `True`/`False`, everything else trimmed.

use super::{ConvertError, Table};
use chrono::NaiveDate;
use std::fs;
use std::path::Path;

const FILE_HEADER_LEN: usize = 32;
const DESCRIPTOR_LEN: usize = 32;
const DESCRIPTOR_TERMINATOR: u8 = 0x0D;
const DELETED_FLAG: u8 = b'*';

/// One column descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: String,
    pub kind: char,
    pub length: usize,
    pub decimals: u8,
}

/// Read and render the DBF at `path`.
pub fn read_file(path: &Path) -> Result<Table, ConvertError> {
    let data = fs::read(path).map_err(|e| ConvertError::io(path, e))?;
    read(&data)
}

/// Parse DBF bytes.
pub fn read(data: &[u8]) -> Result<Table, ConvertError> {
    if data.len() < FILE_HEADER_LEN {
        return Err(ConvertError::Malformed(format!(
            "header truncated ({} bytes)",
            data.len()
        )));
    }

    let record_count = u32::from_le_bytes([data[4], data[5], data[6], data[7]]) as usize;
    let header_len = u16::from_le_bytes([data[8], data[9]]) as usize;
    let record_len = u16::from_le_bytes([data[10], data[11]]) as usize;

    if header_len < FILE_HEADER_LEN || header_len > data.len() {
        return Err(ConvertError::Malformed(format!(
            "header length {header_len} out of range"
        )));
    }

    let fields = read_descriptors(&data[FILE_HEADER_LEN..header_len])?;
    let width: usize = 1 + fields.iter().map(|f| f.length).sum::<usize>();
    if record_len != 0 && width > record_len {
        return Err(ConvertError::Malformed(format!(
            "fields span {width} bytes but records are {record_len}"
        )));
    }
    let stride = if record_len == 0 { width } else { record_len };

    let mut table = Table::new(fields.iter().map(|f| f.name.clone()).collect());
    let body = &data[header_len..];

    for index in 0..record_count {
        let start = index * stride;
        let Some(record) = body.get(start..start + stride) else {
            return Err(ConvertError::Malformed(format!(
                "record {index} truncated (expected {record_count} records)"
            )));
        };
        if record[0] == DELETED_FLAG {
            continue;
        }

        let mut offset = 1;
        let mut row = Vec::with_capacity(fields.len());
        for field in &fields {
            row.push(render_value(field, &record[offset..offset + field.length]));
            offset += field.length;
        }
        table.rows.push(row);
    }

    Ok(table)
}

fn read_descriptors(area: &[u8]) -> Result<Vec<FieldDescriptor>, ConvertError> {
    let mut fields = Vec::new();
    for chunk in area.chunks(DESCRIPTOR_LEN) {
        if chunk[0] == DESCRIPTOR_TERMINATOR {
            break;
        }
        if chunk.len() < DESCRIPTOR_LEN {
            return Err(ConvertError::Malformed("truncated field descriptor".into()));
        }
        let name_end = chunk[..11].iter().position(|&b| b == 0).unwrap_or(11);
        let name = latin1(&chunk[..name_end]).trim().to_string();
        if name.is_empty() {
            return Err(ConvertError::Malformed(format!(
                "field {} has no name",
                fields.len() + 1
            )));
        }
        fields.push(FieldDescriptor {
            name,
            kind: chunk[11] as char,
            length: chunk[16] as usize,
            decimals: chunk[17],
        });
    }
    if fields.is_empty() {
        return Err(ConvertError::Malformed("no field descriptors".into()));
    }
    Ok(fields)
}

fn render_value(field: &FieldDescriptor, raw: &[u8]) -> String {
    let text = latin1(raw);
    match field.kind.to_ascii_uppercase() {
        'C' => text.trim_end_matches([' ', '\0']).to_string(),
        'D' => {
            let text = text.trim();
            NaiveDate::parse_from_str(text, "%Y%m%d")
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default()
        }
        'L' => match text.trim() {
            "T" | "t" | "Y" | "y" => "True".to_string(),
            "F" | "f" | "N" | "n" => "False".to_string(),
            _ => String::new(),
        },
        _ => text.trim_matches([' ', '\0']).to_string(),
    }
}

/// ISO-8859-1: every byte is the code point of the same value.
fn latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}
