//! Row mapping trait and helpers for reducing boilerplate in queries.

use rusqlite::{Connection, OptionalExtension, Row, ToSql};

use crate::models::License;

/// Parse a string column into an enum type, converting parse errors to rusqlite errors.
fn parse_enum<T: std::str::FromStr>(row: &Row, col: usize, col_name: &str) -> rusqlite::Result<T> {
    row.get::<_, String>(col)?.parse::<T>().map_err(|_| {
        rusqlite::Error::InvalidColumnType(col, col_name.to_string(), rusqlite::types::Type::Text)
    })
}

/// Trait for constructing a type from a database row.
pub trait FromRow: Sized {
    fn from_row(row: &Row) -> rusqlite::Result<Self>;
}

/// Query for a single optional result.
pub fn query_one<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Option<T>> {
    conn.query_row(sql, params, T::from_row)
        .optional()
        .map_err(Into::into)
}

/// Query for multiple results.
pub fn query_all<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, T::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub const LICENSE_COLS: &str = "id, license_key, email, plugin, plan, issued_at, expires_at, validated_at, revoked, revoke_reason, revoked_at";

impl FromRow for License {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(License {
            id: row.get(0)?,
            license_key: row.get(1)?,
            email: row.get(2)?,
            plugin: row.get(3)?,
            plan: parse_enum(row, 4, "plan")?,
            issued_at: row.get(5)?,
            expires_at: row.get(6)?,
            validated_at: row.get(7)?,
            revoked: row.get::<_, i32>(8)? != 0,
            revoke_reason: row.get(9)?,
            revoked_at: row.get(10)?,
        })
    }
}
