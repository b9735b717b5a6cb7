#![forbid(unsafe_code)]

//! Per-row repair of users missing a referral code. The selection
//! predicate excludes rows that already carry one, so repeated runs
//! converge to zero writes.

use rand::Rng;
use rm_core::referral::{ALPHABET, CODE_LEN};
use rusqlite::{Connection, ErrorCode, params};
use tracing::{info, warn};

use super::error::StepError;
use super::now_ms;

/// The unique index on `users.referral_code` is the authority on
/// collisions; a generated duplicate is retried with a fresh code
/// this many times before the row is given up on for this run.
const MAX_CODE_ATTEMPTS: usize = 5;

#[derive(Clone, Copy, Debug, Default)]
pub struct BackfillOutcome {
    pub repaired: usize,
    pub failed: usize,
}

pub(crate) fn backfill_referral_codes(conn: &Connection) -> Result<BackfillOutcome, StepError> {
    let backlog: Vec<i64> = {
        let mut stmt = conn.prepare(
            "SELECT id FROM users WHERE referral_code IS NULL OR referral_code = ''",
        )?;
        let mut rows = stmt.query([])?;
        let mut ids = Vec::new();
        while let Some(row) = rows.next()? {
            ids.push(row.get::<_, i64>(0)?);
        }
        ids
    };

    if backlog.is_empty() {
        return Ok(BackfillOutcome::default());
    }

    // The write keeps the emptiness predicate so a code assigned by a
    // concurrent instance between select and update is never clobbered.
    let mut update = conn.prepare(
        "UPDATE users SET referral_code = ?1, updated_at_ms = ?2 \
         WHERE id = ?3 AND (referral_code IS NULL OR referral_code = '')",
    )?;

    let mut rng = rand::thread_rng();
    let mut outcome = BackfillOutcome::default();

    'rows: for user_id in backlog {
        for _ in 0..MAX_CODE_ATTEMPTS {
            let code = generate_code(&mut rng);
            match update.execute(params![code, now_ms(), user_id]) {
                Ok(0) => continue 'rows,
                Ok(_) => {
                    outcome.repaired += 1;
                    continue 'rows;
                }
                Err(err) if is_unique_collision(&err) => continue,
                Err(err) => return Err(StepError::Sql(err)),
            }
        }
        warn!(user_id, "exhausted referral code attempts, leaving row for next run");
        outcome.failed += 1;
    }

    if outcome.repaired > 0 {
        info!(repaired = outcome.repaired, "backfilled referral codes");
    }
    Ok(outcome)
}

fn generate_code(rng: &mut impl Rng) -> String {
    (0..CODE_LEN)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

fn is_unique_collision(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(code, message) => {
            code.code == ErrorCode::ConstraintViolation
                || message
                    .as_deref()
                    .is_some_and(|value| value.contains("UNIQUE constraint failed"))
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::generate_code;
    use rm_core::referral;

    #[test]
    fn generated_codes_are_well_formed() {
        let mut rng = rand::thread_rng();
        for _ in 0..256 {
            let code = generate_code(&mut rng);
            assert!(referral::is_valid_code(&code), "bad code: {code}");
        }
    }
}
