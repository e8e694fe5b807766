use rusqlite::{params, Connection, Row};

use crate::db::DatabaseError;
use crate::models::{MatchMode, SideEffectRecord};

/// Full row of `drug_side_effect_table`, as loaded from the dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SideEffectRow {
    pub num_row: Option<i64>,
    pub stitch_id_1: String,
    pub stitch_id_2: String,
    pub side_effect_id: String,
    pub side_effect_name: String,
    pub drug_name_1: String,
    pub drug_name_2: String,
}

pub fn insert_side_effect(conn: &Connection, row: &SideEffectRow) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO drug_side_effect_table (num_row, stitch_id_1, stitch_id_2, side_effect_id,
         side_effect_name, drug_name_1, drug_name_2, drug_key_1, drug_key_2)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            row.num_row,
            row.stitch_id_1,
            row.stitch_id_2,
            row.side_effect_id,
            row.side_effect_name,
            row.drug_name_1,
            row.drug_name_2,
            drug_key(&row.drug_name_1),
            drug_key(&row.drug_name_2),
        ],
    )?;
    Ok(())
}

/// Comparison key for a drug name. SQLite's `lower()` folds ASCII only, so
/// keys are folded here with full Unicode case mapping.
pub fn drug_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Side effects recorded for two drugs, in either stored order.
///
/// `Exact` compares whole names case-insensitively. `Contains` treats each
/// name as a case-insensitive substring, which also matches compound names
/// ("aspirin" hits "acetylsalicylic-aspirin-compound").
pub fn find_side_effects(
    conn: &Connection,
    drug_a: &str,
    drug_b: &str,
    mode: MatchMode,
) -> Result<Vec<SideEffectRecord>, DatabaseError> {
    let drug_a = drug_key(drug_a);
    let drug_b = drug_key(drug_b);
    if drug_a.is_empty() || drug_b.is_empty() {
        return Ok(Vec::new());
    }

    let sql = match mode {
        MatchMode::Exact => {
            "SELECT drug_name_1, drug_name_2, side_effect_name
             FROM drug_side_effect_table
             WHERE (drug_key_1 = ?1 AND drug_key_2 = ?2)
                OR (drug_key_1 = ?2 AND drug_key_2 = ?1)
             ORDER BY id"
        }
        MatchMode::Contains => {
            "SELECT drug_name_1, drug_name_2, side_effect_name
             FROM drug_side_effect_table
             WHERE (instr(drug_key_1, ?1) > 0 AND instr(drug_key_2, ?2) > 0)
                OR (instr(drug_key_1, ?2) > 0 AND instr(drug_key_2, ?1) > 0)
             ORDER BY id"
        }
    };

    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params![drug_a, drug_b], record_from_row)?;

    let mut records = Vec::new();
    for row in rows {
        records.push(row?);
    }
    Ok(records)
}

pub fn count_side_effects(conn: &Connection) -> Result<i64, DatabaseError> {
    let count = conn.query_row("SELECT COUNT(*) FROM drug_side_effect_table", [], |row| {
        row.get(0)
    })?;
    Ok(count)
}

pub fn clear_side_effects(conn: &Connection) -> Result<usize, DatabaseError> {
    Ok(conn.execute("DELETE FROM drug_side_effect_table", [])?)
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<SideEffectRecord> {
    Ok(SideEffectRecord {
        drug_name_1: row.get(0)?,
        drug_name_2: row.get(1)?,
        side_effect_name: row.get(2)?,
    })
}
