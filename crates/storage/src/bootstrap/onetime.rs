#![forbid(unsafe_code)]

//! One-time data migrations. Each runs exactly once per database: the
//! body and its completion flag commit in the same transaction, and the
//! body is itself idempotent (row predicates) as the second line of
//! defense should the flag ever be lost after the body applied.

use rusqlite::{Connection, Transaction, params};
use tracing::{error, info};

use super::error::StepFailure;
use super::probe;

pub(crate) struct OneTimeMigration {
    pub name: &'static str,
    pub description: &'static str,
    pub run: fn(&Transaction<'_>) -> Result<usize, rusqlite::Error>,
}

pub(crate) const MIGRATIONS: &[OneTimeMigration] = &[OneTimeMigration {
    name: "existing_users_activated",
    description: "Completion marker: pre-activation-fee accounts marked active and paid",
    run: activate_existing_users,
}];

/// Accounts created before the activation-payment feature shipped are
/// grandfathered in. The predicate keeps a replay harmless.
fn activate_existing_users(tx: &Transaction<'_>) -> Result<usize, rusqlite::Error> {
    tx.execute(
        "UPDATE users SET status = 'active', activation_paid = 1 \
         WHERE status = 'pending' AND activation_paid = 0",
        [],
    )
}

#[derive(Debug, Default)]
pub(crate) struct OneTimeOutcome {
    pub applied: usize,
    pub failures: Vec<StepFailure>,
}

pub(crate) fn run_pending(conn: &mut Connection) -> OneTimeOutcome {
    let mut outcome = OneTimeOutcome::default();

    for migration in MIGRATIONS {
        match run_one(conn, migration) {
            Ok(Some(affected)) => {
                info!(
                    name = migration.name,
                    affected, "applied one-time migration"
                );
                outcome.applied += 1;
            }
            Ok(None) => {
                info!(name = migration.name, "one-time migration already applied");
            }
            Err(err) => {
                error!(name = migration.name, error = %err, "one-time migration failed");
                outcome
                    .failures
                    .push(StepFailure::new(migration.name, err));
            }
        }
    }

    outcome
}

/// `Ok(None)` when the flag says done; `Ok(Some(affected))` after a
/// fresh application.
fn run_one(
    conn: &mut Connection,
    migration: &OneTimeMigration,
) -> Result<Option<usize>, rusqlite::Error> {
    if probe::settings_value(conn, migration.name)?.is_some() {
        return Ok(None);
    }

    let tx = conn.transaction()?;
    let affected = (migration.run)(&tx)?;
    let flag_write = tx.execute(
        "INSERT INTO settings(key, value, value_type, description) \
         VALUES (?1, 'true', 'boolean', ?2)",
        params![migration.name, migration.description],
    );
    match flag_write {
        Ok(_) => {}
        // A concurrent instance wrote the flag between our probe and
        // the insert; its transaction already carried the same body.
        Err(ref err) if is_flag_collision(err) => {}
        Err(err) => return Err(err),
    }
    tx.commit()?;

    Ok(Some(affected))
}

fn is_flag_collision(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(_, Some(message)) => {
            message.contains("UNIQUE constraint failed: settings.key")
        }
        _ => false,
    }
}
