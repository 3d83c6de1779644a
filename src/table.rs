use std::io::{self, Write};

use serde_json::Value;

use crate::error::SeqRemoteError;

/// Flatten an analysis table (a JSON array of flat records) into rows.
///
/// The header comes from the first record's keys in document order.
pub fn convert_json_to_table(records: &[Value]) -> Result<Vec<Vec<String>>, SeqRemoteError> {
    let Some(first) = records.first() else {
        return Ok(Vec::new());
    };
    let header: Vec<String> = as_object(first)?.keys().cloned().collect();

    let mut rows = Vec::with_capacity(records.len() + 1);
    rows.push(header.clone());
    for record in records {
        let record = as_object(record)?;
        rows.push(
            header
                .iter()
                .map(|key| record.get(key).map(cell).unwrap_or_default())
                .collect(),
        );
    }
    Ok(rows)
}

pub fn parse_table_document(content: &str) -> Result<Vec<Value>, SeqRemoteError> {
    serde_json::from_str(content)
        .map_err(|err| SeqRemoteError::MalformedResponse(format!("analysis table: {err}")))
}

pub fn write_tsv<W: Write>(rows: &[Vec<String>], mut out: W) -> io::Result<()> {
    for row in rows {
        out.write_all(row.join("\t").as_bytes())?;
        out.write_all(b"\n")?;
    }
    out.flush()
}

fn as_object(value: &Value) -> Result<&serde_json::Map<String, Value>, SeqRemoteError> {
    value.as_object().ok_or_else(|| {
        SeqRemoteError::MalformedResponse(format!("table record is not an object: {value}"))
    })
}

fn cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
