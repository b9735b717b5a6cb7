#![forbid(unsafe_code)]

//! Structural mutations. Every mutating call is preceded by its own
//! probe; the check-then-act pair is not atomic, so a benign race with
//! a concurrent instance degrades to a duplicate-object error that is
//! swallowed and logged, never propagated.

use rm_core::schema::{ColumnSpec, EnumSpec, ForeignKeySpec, IndexSpec, TableSpec};
use rusqlite::Connection;
use tracing::{debug, info};

use super::error::BootstrapError;
use super::probe;

/// Creates the table with its full target definition when missing.
/// Returns whether a table was created.
pub(crate) fn ensure_table(
    conn: &Connection,
    spec: &TableSpec,
) -> Result<bool, BootstrapError> {
    if probe::table_exists(conn, spec.name).map_err(BootstrapError::Probe)? {
        return Ok(false);
    }

    let sql = render_create_table(spec, spec.name);
    match conn.execute(&sql, []) {
        Ok(_) => {
            info!(table = spec.name, "created table");
            Ok(true)
        }
        Err(err) if is_benign_duplicate(&err, &format!("table {} already exists", spec.name)) => {
            info!(table = spec.name, "table appeared concurrently, skipping");
            Ok(false)
        }
        Err(err) => Err(BootstrapError::Structural {
            object: format!("table {}", spec.name),
            source: err,
        }),
    }
}

/// Adds one missing column. Returns whether a column was added.
pub(crate) fn ensure_column(
    conn: &Connection,
    table: &TableSpec,
    column: &ColumnSpec,
) -> Result<bool, BootstrapError> {
    if probe::column_exists(conn, table.name, column.name).map_err(BootstrapError::Probe)? {
        return Ok(false);
    }

    let sql = format!(
        "ALTER TABLE {} ADD COLUMN {} {}",
        table.name, column.name, column.decl
    );
    match conn.execute(&sql, []) {
        Ok(_) => {
            info!(table = table.name, column = column.name, "added column");
            Ok(true)
        }
        Err(err) if is_benign_duplicate(&err, "duplicate column name") => {
            info!(
                table = table.name,
                column = column.name,
                "column appeared concurrently, skipping"
            );
            Ok(false)
        }
        Err(err) => Err(BootstrapError::Structural {
            object: format!("column {}.{}", table.name, column.name),
            source: err,
        }),
    }
}

/// Ensures a foreign-key constraint is present on `fk.column`. SQLite
/// cannot attach a constraint to an existing table, so a miss triggers
/// a full table redefinition that preserves all rows.
pub(crate) fn ensure_foreign_key(
    conn: &mut Connection,
    table: &TableSpec,
    fk: &ForeignKeySpec,
) -> Result<bool, BootstrapError> {
    if probe::foreign_key_exists(conn, table.name, fk.column, fk.references_table)
        .map_err(BootstrapError::Probe)?
    {
        return Ok(false);
    }

    info!(
        table = table.name,
        column = fk.column,
        references = fk.references_table,
        "adding foreign key via table redefinition"
    );
    rebuild_table(conn, table)?;
    Ok(true)
}

/// Widens a value-list check constraint to the target superset. A
/// table whose stored definition already admits every value is left
/// untouched.
pub(crate) fn widen_enum(
    conn: &mut Connection,
    table: &TableSpec,
    spec: &EnumSpec,
) -> Result<bool, BootstrapError> {
    if probe::enum_allows(conn, table.name, spec.column, spec.allowed)
        .map_err(BootstrapError::Probe)?
    {
        return Ok(false);
    }

    info!(
        table = table.name,
        column = spec.column,
        "widening value list via table redefinition"
    );
    rebuild_table(conn, table)?;
    Ok(true)
}

/// Creates a missing index. Returns whether an index was created.
pub(crate) fn ensure_index(
    conn: &Connection,
    index: &IndexSpec,
) -> Result<bool, BootstrapError> {
    if probe::index_exists(conn, index.name).map_err(BootstrapError::Probe)? {
        return Ok(false);
    }

    let unique = if index.unique { "UNIQUE " } else { "" };
    let sql = format!(
        "CREATE {}INDEX {} ON {}({})",
        unique,
        index.name,
        index.table,
        index.columns.join(", ")
    );
    match conn.execute(&sql, []) {
        Ok(_) => {
            info!(index = index.name, table = index.table, "created index");
            Ok(true)
        }
        Err(err)
            if is_benign_duplicate(&err, &format!("index {} already exists", index.name)) =>
        {
            info!(index = index.name, "index appeared concurrently, skipping");
            Ok(false)
        }
        Err(err) => Err(BootstrapError::Structural {
            object: format!("index {}", index.name),
            source: err,
        }),
    }
}

/// The documented SQLite redefinition sequence: build a shadow table
/// from the target spec, copy every live row, drop the original,
/// rename. Live columns outside the target (operator additions) are
/// carried over with reconstructed declarations so no data is lost.
/// Runs as one transaction with foreign-key enforcement suspended
/// (the pragma is a no-op inside a transaction, so it is toggled
/// outside and restored afterward).
fn rebuild_table(conn: &mut Connection, spec: &TableSpec) -> Result<(), BootstrapError> {
    let shadow = format!("{}__rebuild", spec.name);

    let live = live_columns(conn, spec.name).map_err(BootstrapError::Probe)?;
    let extras: Vec<&LiveColumn> = live
        .iter()
        .filter(|column| spec.column(&column.name).is_none())
        .collect();
    let copy_list: Vec<&str> = live.iter().map(|column| column.name.as_str()).collect();

    let structural = |object: &str| {
        let object = object.to_string();
        move |source: rusqlite::Error| BootstrapError::Structural { object, source }
    };

    let enforce_fks = conn
        .query_row("PRAGMA foreign_keys", [], |row| row.get::<_, i64>(0))
        .map_err(BootstrapError::Probe)?
        == 1;
    if enforce_fks {
        conn.execute_batch("PRAGMA foreign_keys=OFF;")
            .map_err(structural(&format!("table {} (pragma)", spec.name)))?;
    }

    let result = (|| -> Result<(), BootstrapError> {
        let tx = conn
            .transaction()
            .map_err(structural(&format!("table {} (transaction)", spec.name)))?;

        // A shadow table left behind by a crashed run is discarded.
        tx.execute(&format!("DROP TABLE IF EXISTS {shadow}"), [])
            .map_err(structural(&shadow))?;

        let mut create = render_create_table(spec, &shadow);
        if !extras.is_empty() {
            let carried: Vec<String> = extras
                .iter()
                .map(|column| format!("  {}", column.decl()))
                .collect();
            create = create.replacen(
                "(\n",
                &format!("(\n{},\n", carried.join(",\n")),
                1,
            );
        }
        tx.execute(&create, []).map_err(structural(&shadow))?;

        if !copy_list.is_empty() {
            let columns = copy_list.join(", ");
            tx.execute(
                &format!(
                    "INSERT INTO {shadow} ({columns}) SELECT {columns} FROM {}",
                    spec.name
                ),
                [],
            )
            .map_err(structural(&format!("table {} (copy)", spec.name)))?;
        }

        tx.execute(&format!("DROP TABLE {}", spec.name), [])
            .map_err(structural(&format!("table {} (drop)", spec.name)))?;
        tx.execute(
            &format!("ALTER TABLE {shadow} RENAME TO {}", spec.name),
            [],
        )
        .map_err(structural(&format!("table {} (rename)", spec.name)))?;

        tx.commit()
            .map_err(structural(&format!("table {} (commit)", spec.name)))?;
        Ok(())
    })();

    if enforce_fks {
        conn.execute_batch("PRAGMA foreign_keys=ON;")
            .map_err(structural(&format!("table {} (pragma)", spec.name)))?;
    }

    if result.is_ok() {
        debug!(table = spec.name, "table redefined");
    }
    result
}

struct LiveColumn {
    name: String,
    type_name: String,
    not_null: bool,
    default: Option<String>,
}

impl LiveColumn {
    /// Reconstructs a column declaration from `pragma_table_info`.
    /// Collation and generated-column details are not recoverable this
    /// way; managed columns never use them.
    fn decl(&self) -> String {
        let mut decl = self.name.clone();
        if !self.type_name.is_empty() {
            decl.push(' ');
            decl.push_str(&self.type_name);
        }
        if self.not_null {
            decl.push_str(" NOT NULL");
        }
        if let Some(default) = &self.default {
            decl.push_str(" DEFAULT ");
            decl.push_str(default);
        }
        decl
    }
}

fn live_columns(conn: &Connection, table: &str) -> Result<Vec<LiveColumn>, rusqlite::Error> {
    let mut stmt = conn
        .prepare("SELECT name, type, \"notnull\", dflt_value FROM pragma_table_info(?1)")?;
    let mut rows = stmt.query([table])?;
    let mut columns = Vec::new();
    while let Some(row) = rows.next()? {
        columns.push(LiveColumn {
            name: row.get(0)?,
            type_name: row.get(1)?,
            not_null: row.get::<_, i64>(2)? != 0,
            default: row.get(3)?,
        });
    }
    Ok(columns)
}

pub(crate) fn render_create_table(spec: &TableSpec, name: &str) -> String {
    let mut parts: Vec<String> = spec
        .columns
        .iter()
        .map(|column| format!("{} {}", column.name, column.decl))
        .collect();

    for value_list in spec.enums {
        let quoted: Vec<String> = value_list
            .allowed
            .iter()
            .map(|value| format!("'{value}'"))
            .collect();
        parts.push(format!(
            "CONSTRAINT ck_{}_{} CHECK ({} IN ({}))",
            spec.name,
            value_list.column,
            value_list.column,
            quoted.join(",")
        ));
    }

    for fk in spec.foreign_keys {
        parts.push(format!(
            "FOREIGN KEY ({}) REFERENCES {}({}) ON DELETE {}",
            fk.column,
            fk.references_table,
            fk.references_column,
            fk.on_delete.as_sql()
        ));
    }

    format!("CREATE TABLE {name} (\n  {}\n)", parts.join(",\n  "))
}

/// The named benign-duplicate branch: a check-then-act pair raced a
/// concurrent instance and SQLite reports the exact object we were
/// about to create. Anything else (including a view squatting on a
/// managed table name) stays a structural error.
fn is_benign_duplicate(err: &rusqlite::Error, expected: &str) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(_, Some(message)) => message.contains(expected),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::{is_benign_duplicate, render_create_table};
    use rm_core::schema::{ColumnSpec, EnumSpec, ForeignKeySpec, OnDelete, TableSpec};
    use rusqlite::ffi;

    const SPEC: TableSpec = TableSpec {
        name: "widgets",
        columns: &[
            ColumnSpec {
                name: "id",
                decl: "INTEGER PRIMARY KEY AUTOINCREMENT",
            },
            ColumnSpec {
                name: "owner_id",
                decl: "INTEGER NOT NULL DEFAULT 0",
            },
            ColumnSpec {
                name: "state",
                decl: "TEXT NOT NULL DEFAULT 'new'",
            },
        ],
        foreign_keys: &[ForeignKeySpec {
            column: "owner_id",
            references_table: "users",
            references_column: "id",
            on_delete: OnDelete::Cascade,
        }],
        enums: &[EnumSpec {
            column: "state",
            allowed: &["new", "done"],
        }],
    };

    #[test]
    fn rendered_definition_carries_constraints() {
        let sql = render_create_table(&SPEC, "widgets");
        assert!(sql.starts_with("CREATE TABLE widgets"));
        assert!(sql.contains("CONSTRAINT ck_widgets_state CHECK (state IN ('new','done'))"));
        assert!(sql.contains("FOREIGN KEY (owner_id) REFERENCES users(id) ON DELETE CASCADE"));
    }

    #[test]
    fn rendered_shadow_keeps_constraint_names() {
        let sql = render_create_table(&SPEC, "widgets__rebuild");
        assert!(sql.starts_with("CREATE TABLE widgets__rebuild"));
        // Constraint names derive from the logical table, not the
        // shadow, so probes match after the rename.
        assert!(sql.contains("ck_widgets_state"));
    }

    fn sqlite_failure(message: &str) -> rusqlite::Error {
        rusqlite::Error::SqliteFailure(ffi::Error::new(ffi::SQLITE_ERROR), Some(message.into()))
    }

    #[test]
    fn duplicate_object_races_are_benign() {
        let err = sqlite_failure("table users already exists");
        assert!(is_benign_duplicate(&err, "table users already exists"));

        let err = sqlite_failure("duplicate column name: wallet_balance_cents");
        assert!(is_benign_duplicate(&err, "duplicate column name"));

        let err = sqlite_failure("index idx_users_email already exists");
        assert!(is_benign_duplicate(&err, "index idx_users_email already exists"));
    }

    #[test]
    fn near_miss_duplicates_stay_structural() {
        // The wrong object: some other table raced, not ours.
        let err = sqlite_failure("table payouts already exists");
        assert!(!is_benign_duplicate(&err, "table users already exists"));

        // A view squatting on the managed name.
        let err = sqlite_failure("there is already a view named users");
        assert!(!is_benign_duplicate(&err, "table users already exists"));

        // Non-SQLite failures never qualify.
        let err = rusqlite::Error::QueryReturnedNoRows;
        assert!(!is_benign_duplicate(&err, "table users already exists"));

        let err = rusqlite::Error::SqliteFailure(ffi::Error::new(ffi::SQLITE_ERROR), None);
        assert!(!is_benign_duplicate(&err, "table users already exists"));
    }
}
