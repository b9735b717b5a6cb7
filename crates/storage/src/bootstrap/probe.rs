#![forbid(unsafe_code)]

//! Read-only schema introspection. Every function answers
//! "does-not-exist" for missing objects instead of erroring, so the
//! appliers can probe a database in any prior state.

use rusqlite::{Connection, OptionalExtension, params};

pub(crate) fn table_exists(conn: &Connection, table: &str) -> Result<bool, rusqlite::Error> {
    conn.query_row(
        "SELECT 1 FROM sqlite_master WHERE type='table' AND name=?1",
        [table],
        |row| row.get::<_, i64>(0),
    )
    .optional()
    .map(|row| row.is_some())
}

pub(crate) fn column_exists(
    conn: &Connection,
    table: &str,
    column: &str,
) -> Result<bool, rusqlite::Error> {
    if !table_exists(conn, table)? {
        return Ok(false);
    }
    conn.query_row(
        "SELECT 1 FROM pragma_table_info(?1) WHERE name=?2",
        params![table, column],
        |row| row.get::<_, i64>(0),
    )
    .optional()
    .map(|row| row.is_some())
}

pub(crate) fn foreign_key_exists(
    conn: &Connection,
    table: &str,
    column: &str,
    references_table: &str,
) -> Result<bool, rusqlite::Error> {
    if !table_exists(conn, table)? {
        return Ok(false);
    }
    conn.query_row(
        "SELECT 1 FROM pragma_foreign_key_list(?1) WHERE \"from\"=?2 AND \"table\"=?3",
        params![table, column, references_table],
        |row| row.get::<_, i64>(0),
    )
    .optional()
    .map(|row| row.is_some())
}

pub(crate) fn index_exists(conn: &Connection, index: &str) -> Result<bool, rusqlite::Error> {
    conn.query_row(
        "SELECT 1 FROM sqlite_master WHERE type='index' AND name=?1",
        [index],
        |row| row.get::<_, i64>(0),
    )
    .optional()
    .map(|row| row.is_some())
}

/// Whether the stored table definition already admits every value in
/// `allowed` for `column`. SQLite keeps the original `CREATE TABLE`
/// text in `sqlite_master`, so the check-constraint value list is
/// recovered from there.
pub(crate) fn enum_allows(
    conn: &Connection,
    table: &str,
    column: &str,
    allowed: &[&str],
) -> Result<bool, rusqlite::Error> {
    let stored: Option<String> = conn
        .query_row(
            "SELECT sql FROM sqlite_master WHERE type='table' AND name=?1",
            [table],
            |row| row.get(0),
        )
        .optional()?;

    let Some(sql) = stored else {
        return Ok(false);
    };
    Ok(check_admits(&sql, column, allowed))
}

fn check_admits(sql: &str, column: &str, allowed: &[&str]) -> bool {
    let lower = sql.to_ascii_lowercase();
    let needle = format!("{} in (", column.to_ascii_lowercase());
    let Some(pos) = lower.find(&needle) else {
        return false;
    };
    let start = pos + needle.len();
    let Some(len) = lower[start..].find(')') else {
        return false;
    };
    let list = &sql[start..start + len];
    allowed
        .iter()
        .all(|value| list.contains(&format!("'{value}'")))
}

/// Reads a settings value without assuming the settings table exists
/// yet (it does not on a fresh database until the table phase runs).
pub(crate) fn settings_value(
    conn: &Connection,
    key: &str,
) -> Result<Option<String>, rusqlite::Error> {
    if !table_exists(conn, "settings")? {
        return Ok(None);
    }
    conn.query_row(
        "SELECT value FROM settings WHERE key=?1",
        [key],
        |row| row.get(0),
    )
    .optional()
}

#[cfg(test)]
mod tests {
    use super::check_admits;

    #[test]
    fn check_list_extraction() {
        let sql = "CREATE TABLE banners (\n  status TEXT NOT NULL DEFAULT 'pending',\n  CONSTRAINT ck_banners_status CHECK (status IN ('pending','approved','paused'))\n)";
        assert!(check_admits(sql, "status", &["pending", "approved"]));
        assert!(!check_admits(sql, "status", &["pending", "archived"]));
        assert!(!check_admits(sql, "value_type", &["string"]));
    }

    #[test]
    fn check_is_case_insensitive_on_keywords() {
        let sql = "CREATE TABLE t (kind TEXT, CHECK (kind in ('a','b')))";
        assert!(check_admits(sql, "kind", &["a", "b"]));
        assert!(!check_admits(sql, "kind", &["a", "b", "c"]));
    }
}
