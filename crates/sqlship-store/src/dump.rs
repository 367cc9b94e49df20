//! SQL text export of the `people` table

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use rusqlite::Connection;
use rusqlite::types::ValueRef;

use sqlship_core::log::LogSink;

use crate::error::{StoreError, StoreResult};

const SELECT_PEOPLE: &str =
    "SELECT id, first_name, last_name, email, created_at FROM people ORDER BY id";

/// Write every `people` row to `path` as one `INSERT` statement per line.
///
/// Returns the number of rows written.
pub fn dump_to_file(conn: &Connection, path: &Path, log: &dyn LogSink) -> StoreResult<usize> {
    log.info(&format!("Dumping database to SQL file: {}", path.display()));

    let io_error = |source: std::io::Error| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };

    let file = File::create(path).map_err(|e| {
        log.error(&format!("Can't open dump file: {}", path.display()));
        io_error(e)
    })?;
    let mut out = BufWriter::new(file);

    let mut stmt = conn.prepare(SELECT_PEOPLE)?;
    let mut rows = stmt.query([])?;
    let mut written = 0usize;

    while let Some(row) = rows.next()? {
        let id: i64 = row.get(0)?;
        let values = (1..5usize)
            .map(|idx| row.get_ref(idx).map(sql_literal))
            .collect::<Result<Vec<_>, _>>()?;

        writeln!(
            out,
            "INSERT INTO people (id, first_name, last_name, email, created_at) VALUES ({}, {});",
            id,
            values.join(", ")
        )
        .map_err(io_error)?;
        written += 1;
    }

    out.flush().map_err(io_error)?;
    log.info(&format!("Dumped {} rows to file successfully.", written));
    Ok(written)
}

/// Render a column value as a SQL literal
fn sql_literal(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null => "NULL".to_string(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => f.to_string(),
        ValueRef::Text(bytes) => quote(&String::from_utf8_lossy(bytes)),
        ValueRef::Blob(bytes) => {
            let hex: String = bytes.iter().map(|b| format!("{:02X}", b)).collect();
            format!("X'{}'", hex)
        }
    }
}

fn quote(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}
