#![forbid(unsafe_code)]

//! Default settings. Inserted with skip-if-exists semantics so an
//! operator-customized value is never overwritten by a redeploy.

use rm_core::settings::{SettingSpec, SettingType};
use rusqlite::{Connection, OptionalExtension, params};
use tracing::debug;

use super::error::StepError;

pub(crate) const DEFAULT_SETTINGS: &[SettingSpec] = &[
    SettingSpec {
        key: "site_name",
        value: "Refmint",
        value_type: SettingType::String,
        description: "Public name shown in page titles and emails",
    },
    SettingSpec {
        key: "maintenance_mode",
        value: "false",
        value_type: SettingType::Boolean,
        description: "When true the web layer serves a maintenance page",
    },
    SettingSpec {
        key: "signup_bonus_cents",
        value: "100",
        value_type: SettingType::Number,
        description: "Wallet credit granted on account activation",
    },
    SettingSpec {
        key: "referral_commission_pct",
        value: "10",
        value_type: SettingType::Number,
        description: "Share of referee earnings credited to the referrer",
    },
    SettingSpec {
        key: "click_rate_cents",
        value: "2",
        value_type: SettingType::Number,
        description: "Credit per valid banner click",
    },
    SettingSpec {
        key: "impression_rate_millicents",
        value: "5",
        value_type: SettingType::Number,
        description: "Credit per thousand banner impressions, in millicents",
    },
    SettingSpec {
        key: "min_payout_cents",
        value: "5000",
        value_type: SettingType::Number,
        description: "Smallest wallet balance eligible for a payout request",
    },
    SettingSpec {
        key: "payout_schedule",
        value: r#"{"day_of_month":1,"methods":["paypal","bank"]}"#,
        value_type: SettingType::Json,
        description: "Payout run schedule and enabled methods",
    },
];

/// Inserts each default only if its key is absent. Returns the number
/// of newly inserted rows; a duplicate-key collision (a concurrent
/// instance got there first) is "already seeded", not an error.
pub(crate) fn seed_settings(conn: &Connection) -> Result<usize, StepError> {
    let mut probe = conn.prepare("SELECT 1 FROM settings WHERE key = ?1")?;
    let mut insert = conn.prepare(
        "INSERT INTO settings(key, value, value_type, description) VALUES (?1, ?2, ?3, ?4)",
    )?;

    let mut inserted = 0usize;
    for spec in DEFAULT_SETTINGS {
        if spec.value_type == SettingType::Json {
            serde_json::from_str::<serde_json::Value>(spec.value).map_err(|err| {
                StepError::InvalidDefault {
                    key: spec.key,
                    detail: err.to_string(),
                }
            })?;
        }

        let present = probe
            .query_row([spec.key], |row| row.get::<_, i64>(0))
            .optional()?
            .is_some();
        if present {
            continue;
        }

        match insert.execute(params![
            spec.key,
            spec.value,
            spec.value_type.as_str(),
            spec.description,
        ]) {
            Ok(_) => {
                debug!(key = spec.key, "seeded default setting");
                inserted += 1;
            }
            Err(err) if is_duplicate_key(&err) => {
                debug!(key = spec.key, "setting appeared concurrently, skipping");
            }
            Err(err) => return Err(err.into()),
        }
    }

    Ok(inserted)
}

fn is_duplicate_key(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(_, Some(message)) => {
            message.contains("UNIQUE constraint failed: settings.key")
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::is_duplicate_key;
    use rusqlite::ffi;

    #[test]
    fn only_key_collisions_count_as_already_seeded() {
        let dup = rusqlite::Error::SqliteFailure(
            ffi::Error::new(ffi::SQLITE_CONSTRAINT_PRIMARYKEY),
            Some("UNIQUE constraint failed: settings.key".into()),
        );
        assert!(is_duplicate_key(&dup));

        // Other constraint failures on the same table must surface.
        let not_null = rusqlite::Error::SqliteFailure(
            ffi::Error::new(ffi::SQLITE_CONSTRAINT_NOTNULL),
            Some("NOT NULL constraint failed: settings.tenant".into()),
        );
        assert!(!is_duplicate_key(&not_null));

        assert!(!is_duplicate_key(&rusqlite::Error::QueryReturnedNoRows));
    }
}
