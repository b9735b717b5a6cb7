#![forbid(unsafe_code)]

pub mod schema {
    //! Compile-time description of a desired database shape.
    //!
    //! The bootstrap engine converges the live database toward these
    //! specs; nothing here touches a connection.

    #[derive(Clone, Copy, Debug)]
    pub struct TableSpec {
        pub name: &'static str,
        pub columns: &'static [ColumnSpec],
        pub foreign_keys: &'static [ForeignKeySpec],
        pub enums: &'static [EnumSpec],
    }

    /// One column: its name plus the raw SQLite declaration tail
    /// (type, nullability, default). Uniqueness is expressed through
    /// [`IndexSpec`] so that columns added by `ALTER TABLE` stay legal.
    #[derive(Clone, Copy, Debug)]
    pub struct ColumnSpec {
        pub name: &'static str,
        pub decl: &'static str,
    }

    #[derive(Clone, Copy, Debug)]
    pub struct ForeignKeySpec {
        pub column: &'static str,
        pub references_table: &'static str,
        pub references_column: &'static str,
        pub on_delete: OnDelete,
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub enum OnDelete {
        Cascade,
        SetNull,
        Restrict,
    }

    impl OnDelete {
        pub fn as_sql(self) -> &'static str {
            match self {
                Self::Cascade => "CASCADE",
                Self::SetNull => "SET NULL",
                Self::Restrict => "RESTRICT",
            }
        }
    }

    /// Closed value list for a text column, rendered as a named
    /// `CHECK (column IN (...))` constraint. Widening a list means
    /// redefining the owning table with the superset.
    #[derive(Clone, Copy, Debug)]
    pub struct EnumSpec {
        pub column: &'static str,
        pub allowed: &'static [&'static str],
    }

    #[derive(Clone, Copy, Debug)]
    pub struct IndexSpec {
        pub name: &'static str,
        pub table: &'static str,
        pub unique: bool,
        pub columns: &'static [&'static str],
    }

    impl TableSpec {
        pub fn column(&self, name: &str) -> Option<&'static ColumnSpec> {
            self.columns.iter().find(|column| column.name == name)
        }
    }
}

pub mod referral {
    //! Referral-code format shared by the backfill engine and the web
    //! layer's validators.

    pub const CODE_LEN: usize = 8;
    pub const ALPHABET: &[u8; 36] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

    pub fn is_valid_code(value: &str) -> bool {
        value.len() == CODE_LEN && value.bytes().all(|byte| ALPHABET.contains(&byte))
    }
}

pub mod settings {
    //! Typed key/value configuration rows seeded at bootstrap and
    //! edited later by operators.

    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub enum SettingType {
        String,
        Number,
        Boolean,
        Json,
    }

    impl SettingType {
        pub fn as_str(self) -> &'static str {
            match self {
                Self::String => "string",
                Self::Number => "number",
                Self::Boolean => "boolean",
                Self::Json => "json",
            }
        }
    }

    #[derive(Clone, Copy, Debug)]
    pub struct SettingSpec {
        pub key: &'static str,
        pub value: &'static str,
        pub value_type: SettingType,
        pub description: &'static str,
    }
}
