//! Populate `drug_side_effect_table` from the comma-separated dataset.
//!
//! Expected layout (header row first):
//! `num_row,stitch_id_1,stitch_id_2,side_effect_id,side_effect_name,drug_name_1,drug_name_2`
//!
//! Columns are read by position; quoted fields may contain commas. The import
//! runs in one transaction: a malformed record aborts it and leaves the table
//! untouched.

use std::io::Read;

use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use super::repository::{clear_side_effects, insert_side_effect, SideEffectRow};
use super::DatabaseError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub rows_inserted: usize,
    pub rows_removed: usize,
}

/// One dataset record, in column order.
#[derive(Debug, Deserialize)]
struct CsvRow {
    num_row: Option<i64>,
    stitch_id_1: String,
    stitch_id_2: String,
    side_effect_id: String,
    side_effect_name: String,
    drug_name_1: String,
    drug_name_2: String,
}

pub fn import_side_effects_csv<R: Read>(
    conn: &mut Connection,
    reader: R,
    replace_existing: bool,
) -> Result<ImportReport, DatabaseError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let tx = conn.transaction()?;
    let mut report = ImportReport::default();

    if replace_existing {
        report.rows_removed = clear_side_effects(&tx)?;
    }

    let mut record = csv::StringRecord::new();
    while csv_reader.read_record(&mut record).map_err(malformed)? {
        let line = record.position().map_or(0, |pos| pos.line() as usize);
        let row: CsvRow = record.deserialize(None).map_err(malformed)?;
        insert_side_effect(&tx, &validate(row, line)?)?;
        report.rows_inserted += 1;
    }

    tx.commit()?;
    tracing::info!(
        inserted = report.rows_inserted,
        removed = report.rows_removed,
        "Side-effect dataset imported"
    );
    Ok(report)
}

fn malformed(err: csv::Error) -> DatabaseError {
    let line = err.position().map_or(0, |pos| pos.line() as usize);
    let reason = err.to_string();
    match err.into_kind() {
        csv::ErrorKind::Io(io) => DatabaseError::Io(io),
        _ => DatabaseError::MalformedRow { line, reason },
    }
}

fn validate(row: CsvRow, line: usize) -> Result<SideEffectRow, DatabaseError> {
    for (name, value) in [
        ("side_effect_name", &row.side_effect_name),
        ("drug_name_1", &row.drug_name_1),
        ("drug_name_2", &row.drug_name_2),
    ] {
        if value.is_empty() {
            return Err(DatabaseError::MalformedRow {
                line,
                reason: format!("{name} is empty"),
            });
        }
    }

    Ok(SideEffectRow {
        num_row: row.num_row,
        stitch_id_1: row.stitch_id_1,
        stitch_id_2: row.stitch_id_2,
        side_effect_id: row.side_effect_id,
        side_effect_name: row.side_effect_name,
        drug_name_1: row.drug_name_1,
        drug_name_2: row.drug_name_2,
    })
}
