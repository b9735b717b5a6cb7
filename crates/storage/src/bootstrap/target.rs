#![forbid(unsafe_code)]

//! The managed schema. This is the single source of truth the engine
//! converges the live database toward; the ordering of `TABLES` is the
//! creation order (referenced tables first).

use rm_core::schema::{ColumnSpec, EnumSpec, ForeignKeySpec, IndexSpec, OnDelete, TableSpec};

pub(crate) const USER_STATUSES: &[&str] = &["pending", "active", "suspended", "banned"];
pub(crate) const BANNER_STATUSES: &[&str] =
    &["pending", "approved", "paused", "rejected", "archived"];
pub(crate) const PAYOUT_STATUSES: &[&str] = &["requested", "approved", "paid", "rejected"];
pub(crate) const SETTING_TYPES: &[&str] = &["string", "number", "boolean", "json"];

pub(crate) const TABLES: &[TableSpec] = &[
    TableSpec {
        name: "users",
        columns: &[
            ColumnSpec {
                name: "id",
                decl: "INTEGER PRIMARY KEY AUTOINCREMENT",
            },
            ColumnSpec {
                name: "email",
                decl: "TEXT NOT NULL DEFAULT ''",
            },
            ColumnSpec {
                name: "password_hash",
                decl: "TEXT NOT NULL DEFAULT ''",
            },
            ColumnSpec {
                name: "status",
                decl: "TEXT NOT NULL DEFAULT 'pending'",
            },
            ColumnSpec {
                name: "activation_paid",
                decl: "INTEGER NOT NULL DEFAULT 0",
            },
            ColumnSpec {
                name: "referred_by",
                decl: "INTEGER",
            },
            ColumnSpec {
                name: "referral_code",
                decl: "TEXT",
            },
            ColumnSpec {
                name: "wallet_balance_cents",
                decl: "INTEGER NOT NULL DEFAULT 0",
            },
            ColumnSpec {
                name: "created_at_ms",
                decl: "INTEGER NOT NULL DEFAULT 0",
            },
            ColumnSpec {
                name: "updated_at_ms",
                decl: "INTEGER NOT NULL DEFAULT 0",
            },
        ],
        foreign_keys: &[ForeignKeySpec {
            column: "referred_by",
            references_table: "users",
            references_column: "id",
            on_delete: OnDelete::SetNull,
        }],
        enums: &[EnumSpec {
            column: "status",
            allowed: USER_STATUSES,
        }],
    },
    TableSpec {
        name: "zones",
        columns: &[
            ColumnSpec {
                name: "id",
                decl: "INTEGER PRIMARY KEY AUTOINCREMENT",
            },
            ColumnSpec {
                name: "site_name",
                decl: "TEXT NOT NULL DEFAULT ''",
            },
            ColumnSpec {
                name: "slot",
                decl: "TEXT NOT NULL DEFAULT ''",
            },
            ColumnSpec {
                name: "width",
                decl: "INTEGER NOT NULL DEFAULT 0",
            },
            ColumnSpec {
                name: "height",
                decl: "INTEGER NOT NULL DEFAULT 0",
            },
            ColumnSpec {
                name: "created_at_ms",
                decl: "INTEGER NOT NULL DEFAULT 0",
            },
        ],
        foreign_keys: &[],
        enums: &[],
    },
    TableSpec {
        name: "banners",
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
                name: "title",
                decl: "TEXT NOT NULL DEFAULT ''",
            },
            ColumnSpec {
                name: "target_url",
                decl: "TEXT NOT NULL DEFAULT ''",
            },
            ColumnSpec {
                name: "image_url",
                decl: "TEXT NOT NULL DEFAULT ''",
            },
            ColumnSpec {
                name: "status",
                decl: "TEXT NOT NULL DEFAULT 'pending'",
            },
            ColumnSpec {
                name: "daily_budget_cents",
                decl: "INTEGER NOT NULL DEFAULT 0",
            },
            ColumnSpec {
                name: "created_at_ms",
                decl: "INTEGER NOT NULL DEFAULT 0",
            },
        ],
        foreign_keys: &[ForeignKeySpec {
            column: "owner_id",
            references_table: "users",
            references_column: "id",
            on_delete: OnDelete::Cascade,
        }],
        enums: &[EnumSpec {
            column: "status",
            allowed: BANNER_STATUSES,
        }],
    },
    TableSpec {
        name: "clicks",
        columns: &[
            ColumnSpec {
                name: "id",
                decl: "INTEGER PRIMARY KEY AUTOINCREMENT",
            },
            ColumnSpec {
                name: "banner_id",
                decl: "INTEGER NOT NULL DEFAULT 0",
            },
            ColumnSpec {
                name: "zone_id",
                decl: "INTEGER",
            },
            ColumnSpec {
                name: "visitor_hash",
                decl: "TEXT NOT NULL DEFAULT ''",
            },
            ColumnSpec {
                name: "credited",
                decl: "INTEGER NOT NULL DEFAULT 0",
            },
            ColumnSpec {
                name: "clicked_at_ms",
                decl: "INTEGER NOT NULL DEFAULT 0",
            },
        ],
        foreign_keys: &[
            ForeignKeySpec {
                column: "banner_id",
                references_table: "banners",
                references_column: "id",
                on_delete: OnDelete::Cascade,
            },
            ForeignKeySpec {
                column: "zone_id",
                references_table: "zones",
                references_column: "id",
                on_delete: OnDelete::SetNull,
            },
        ],
        enums: &[],
    },
    TableSpec {
        name: "payouts",
        columns: &[
            ColumnSpec {
                name: "id",
                decl: "INTEGER PRIMARY KEY AUTOINCREMENT",
            },
            ColumnSpec {
                name: "user_id",
                decl: "INTEGER NOT NULL DEFAULT 0",
            },
            ColumnSpec {
                name: "amount_cents",
                decl: "INTEGER NOT NULL DEFAULT 0",
            },
            ColumnSpec {
                name: "status",
                decl: "TEXT NOT NULL DEFAULT 'requested'",
            },
            ColumnSpec {
                name: "requested_at_ms",
                decl: "INTEGER NOT NULL DEFAULT 0",
            },
            ColumnSpec {
                name: "paid_at_ms",
                decl: "INTEGER",
            },
        ],
        foreign_keys: &[ForeignKeySpec {
            column: "user_id",
            references_table: "users",
            references_column: "id",
            on_delete: OnDelete::Cascade,
        }],
        enums: &[EnumSpec {
            column: "status",
            allowed: PAYOUT_STATUSES,
        }],
    },
    TableSpec {
        name: "settings",
        columns: &[
            ColumnSpec {
                name: "key",
                decl: "TEXT PRIMARY KEY",
            },
            ColumnSpec {
                name: "value",
                decl: "TEXT NOT NULL DEFAULT ''",
            },
            ColumnSpec {
                name: "value_type",
                decl: "TEXT NOT NULL DEFAULT 'string'",
            },
            ColumnSpec {
                name: "description",
                decl: "TEXT NOT NULL DEFAULT ''",
            },
        ],
        foreign_keys: &[],
        enums: &[EnumSpec {
            column: "value_type",
            allowed: SETTING_TYPES,
        }],
    },
];

pub(crate) const INDEXES: &[IndexSpec] = &[
    IndexSpec {
        name: "idx_users_email",
        table: "users",
        unique: true,
        columns: &["email"],
    },
    IndexSpec {
        name: "idx_users_referral_code",
        table: "users",
        unique: true,
        columns: &["referral_code"],
    },
    IndexSpec {
        name: "idx_users_referred_by",
        table: "users",
        unique: false,
        columns: &["referred_by"],
    },
    IndexSpec {
        name: "idx_zones_site_slot",
        table: "zones",
        unique: true,
        columns: &["site_name", "slot"],
    },
    IndexSpec {
        name: "idx_banners_owner",
        table: "banners",
        unique: false,
        columns: &["owner_id"],
    },
    IndexSpec {
        name: "idx_clicks_banner_time",
        table: "clicks",
        unique: false,
        columns: &["banner_id", "clicked_at_ms"],
    },
    IndexSpec {
        name: "idx_payouts_user",
        table: "payouts",
        unique: false,
        columns: &["user_id"],
    },
];
