#![forbid(unsafe_code)]

//! Startup schema reconciliation. Runs once per process start, before
//! the host opens its listener, and converges the live database to the
//! compiled-in target: structural phases are fatal on failure, the
//! best-effort phases (seeding, backfill, one-time migrations) are
//! logged and recorded but never abort boot.

mod backfill;
mod ddl;
mod error;
mod onetime;
mod probe;
mod seed;
mod target;

pub use error::{BootstrapError, StepFailure};

use rusqlite::Connection;
use tracing::{error, info};

/// Mutation counts for one bootstrap pass. A run against an
/// already-converged database reports zero everywhere, which is how
/// idempotence is asserted.
#[derive(Debug, Default)]
pub struct BootstrapReport {
    pub tables_created: usize,
    pub columns_added: usize,
    pub foreign_keys_added: usize,
    pub enums_widened: usize,
    pub indexes_created: usize,
    pub settings_seeded: usize,
    pub codes_backfilled: usize,
    pub codes_failed: usize,
    pub migrations_applied: usize,
    pub step_failures: Vec<StepFailure>,
}

impl BootstrapReport {
    /// Whether this pass changed anything at all.
    pub fn mutated(&self) -> bool {
        self.tables_created
            + self.columns_added
            + self.foreign_keys_added
            + self.enums_widened
            + self.indexes_created
            + self.settings_seeded
            + self.codes_backfilled
            + self.migrations_applied
            > 0
    }
}

/// Converges the borrowed connection's database to the target schema.
///
/// Phase order is load-bearing: tables must exist before columns are
/// probed, and before any redefinition pass re-attaches foreign keys;
/// indexes come after redefinitions because dropping a table drops its
/// indexes; data phases run last against the converged shape.
pub fn bootstrap(conn: &mut Connection) -> Result<BootstrapReport, BootstrapError> {
    let mut report = BootstrapReport::default();

    info!("bootstrap: ensuring tables");
    for spec in target::TABLES {
        if ddl::ensure_table(conn, spec)? {
            report.tables_created += 1;
        }
    }

    info!("bootstrap: ensuring columns");
    for spec in target::TABLES {
        for column in spec.columns {
            if ddl::ensure_column(conn, spec, column)? {
                report.columns_added += 1;
            }
        }
    }

    info!("bootstrap: ensuring foreign keys");
    for spec in target::TABLES {
        for fk in spec.foreign_keys {
            if ddl::ensure_foreign_key(conn, spec, fk)? {
                report.foreign_keys_added += 1;
            }
        }
    }

    info!("bootstrap: widening value lists");
    for spec in target::TABLES {
        for value_list in spec.enums {
            if ddl::widen_enum(conn, spec, value_list)? {
                report.enums_widened += 1;
            }
        }
    }

    info!("bootstrap: ensuring indexes");
    for index in target::INDEXES {
        if ddl::ensure_index(conn, index)? {
            report.indexes_created += 1;
        }
    }

    info!("bootstrap: seeding settings");
    match seed::seed_settings(conn) {
        Ok(inserted) => report.settings_seeded = inserted,
        Err(err) => {
            error!(error = %err, "settings seeding failed, continuing");
            report
                .step_failures
                .push(StepFailure::new("seed_settings", err));
        }
    }

    info!("bootstrap: backfilling referral codes");
    match backfill::backfill_referral_codes(conn) {
        Ok(outcome) => {
            report.codes_backfilled = outcome.repaired;
            report.codes_failed = outcome.failed;
        }
        Err(err) => {
            error!(error = %err, "referral code backfill failed, continuing");
            report
                .step_failures
                .push(StepFailure::new("backfill_referral_codes", err));
        }
    }

    info!("bootstrap: running one-time migrations");
    let outcome = onetime::run_pending(conn);
    report.migrations_applied = outcome.applied;
    report.step_failures.extend(outcome.failures);

    info!(
        tables = report.tables_created,
        columns = report.columns_added,
        foreign_keys = report.foreign_keys_added,
        enums = report.enums_widened,
        indexes = report.indexes_created,
        settings = report.settings_seeded,
        codes = report.codes_backfilled,
        migrations = report.migrations_applied,
        failures = report.step_failures.len(),
        "bootstrap complete"
    );
    Ok(report)
}

pub(crate) fn now_ms() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};

    let now = match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(duration) => duration,
        Err(_) => return 0,
    };

    i64::try_from(now.as_millis()).unwrap_or(i64::MAX)
}
