#![forbid(unsafe_code)]

use rm_storage::bootstrap;
use rusqlite::Connection;

fn open_conn() -> Connection {
    Connection::open_in_memory().expect("in-memory database should open")
}

fn table_names(conn: &Connection) -> Vec<String> {
    let mut stmt = conn
        .prepare("SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' ORDER BY name")
        .expect("prepare table listing");
    let rows = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .expect("query table listing");
    rows.collect::<Result<Vec<_>, _>>().expect("collect tables")
}

fn schema_dump(conn: &Connection) -> Vec<(String, Option<String>)> {
    let mut stmt = conn
        .prepare(
            "SELECT name, sql FROM sqlite_master WHERE name NOT LIKE 'sqlite_%' ORDER BY type, name",
        )
        .expect("prepare schema dump");
    let rows = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
        .expect("query schema dump");
    rows.collect::<Result<Vec<_>, _>>().expect("collect schema")
}

#[test]
fn convergence_from_empty() {
    let mut conn = open_conn();

    let report = bootstrap(&mut conn).expect("bootstrap against empty database");

    assert_eq!(report.tables_created, 6);
    assert_eq!(report.columns_added, 0, "fresh tables need no column adds");
    assert_eq!(report.foreign_keys_added, 0, "fresh tables carry their keys");
    assert_eq!(report.enums_widened, 0);
    assert_eq!(report.indexes_created, 7);
    assert!(report.settings_seeded > 0);
    assert_eq!(report.migrations_applied, 1);
    assert!(report.step_failures.is_empty(), "{:?}", report.step_failures);

    assert_eq!(
        table_names(&conn),
        vec!["banners", "clicks", "payouts", "settings", "users", "zones"]
    );

    // Every managed column must be present; spot-check the latest.
    let wallet: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM pragma_table_info('users') WHERE name='wallet_balance_cents'",
            [],
            |row| row.get(0),
        )
        .expect("probe wallet column");
    assert_eq!(wallet, 1);

    let fk_count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM pragma_foreign_key_list('clicks')",
            [],
            |row| row.get(0),
        )
        .expect("probe clicks foreign keys");
    assert_eq!(fk_count, 2);
}

#[test]
fn second_run_is_a_fixed_point() {
    let mut conn = open_conn();

    bootstrap(&mut conn).expect("first bootstrap");
    let before = schema_dump(&conn);
    let settings_before: i64 = conn
        .query_row("SELECT COUNT(*) FROM settings", [], |row| row.get(0))
        .expect("count settings");

    let report = bootstrap(&mut conn).expect("second bootstrap");

    assert!(!report.mutated(), "second run must not mutate: {report:?}");
    assert_eq!(schema_dump(&conn), before);
    let settings_after: i64 = conn
        .query_row("SELECT COUNT(*) FROM settings", [], |row| row.get(0))
        .expect("count settings again");
    assert_eq!(settings_after, settings_before);
}

#[test]
fn convergence_from_partial_adds_only_the_missing_column() {
    let mut conn = open_conn();

    // Users table from a deploy that predates wallet balances; every
    // other managed aspect (key, check, foreign key) is in place.
    conn.execute_batch(
        "CREATE TABLE users (
           id INTEGER PRIMARY KEY AUTOINCREMENT,
           email TEXT NOT NULL DEFAULT '',
           password_hash TEXT NOT NULL DEFAULT '',
           status TEXT NOT NULL DEFAULT 'pending',
           activation_paid INTEGER NOT NULL DEFAULT 0,
           referred_by INTEGER,
           referral_code TEXT,
           created_at_ms INTEGER NOT NULL DEFAULT 0,
           updated_at_ms INTEGER NOT NULL DEFAULT 0,
           CONSTRAINT ck_users_status CHECK (status IN ('pending','active','suspended','banned')),
           FOREIGN KEY (referred_by) REFERENCES users(id) ON DELETE SET NULL
         );
         INSERT INTO users (email, password_hash, status, activation_paid, referral_code)
           VALUES ('a@example.com', 'x', 'active', 1, 'AAAA1111');",
    )
    .expect("seed partial schema");

    let report = bootstrap(&mut conn).expect("bootstrap against partial schema");

    assert_eq!(report.columns_added, 1, "exactly the wallet column");
    assert_eq!(report.tables_created, 5, "users already existed");
    assert_eq!(report.foreign_keys_added, 0, "no redefinition expected");
    assert_eq!(report.enums_widened, 0, "no redefinition expected");

    let (email, wallet): (String, i64) = conn
        .query_row(
            "SELECT email, wallet_balance_cents FROM users WHERE referral_code='AAAA1111'",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .expect("existing row survives with defaulted wallet");
    assert_eq!(email, "a@example.com");
    assert_eq!(wallet, 0);
}
