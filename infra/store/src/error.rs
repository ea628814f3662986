use std::borrow::Cow;

/// A specialized [`KvError`] enum of this crate.
///
/// Domain conditions ([`KvError::KeyNotFound`], [`KvError::KeyExists`]) are kept apart from
/// engine faults, which always arrive unchanged inside [`KvError::Engine`].
#[nestkv_derive::nestkv_error]
pub enum KvError {
    #[error("Key not found{}: {key}", format_context(.context))]
    KeyNotFound { key: String, context: Option<Cow<'static, str>> },

    #[error("Key already exists{}: {key}", format_context(.context))]
    KeyExists { key: String, context: Option<Cow<'static, str>> },

    #[error("Operation cancelled{}", format_context(.context))]
    Cancelled { context: Option<Cow<'static, str>> },

    #[error("Deadline exceeded{}", format_context(.context))]
    DeadlineExceeded { context: Option<Cow<'static, str>> },

    #[error("Storage engine is closed{}", format_context(.context))]
    Closed { context: Option<Cow<'static, str>> },

    #[error("Invalid key{}: {message}", format_context(.context))]
    InvalidKey { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Invalid store configuration{}: {message}", format_context(.context))]
    InvalidConfiguration { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Storage engine failure{}: {source}", format_context(.context))]
    Engine {
        #[also_from(
            redb::DatabaseError,
            redb::TransactionError,
            redb::TableError,
            redb::StorageError,
            redb::CommitError,
            redb::CompactionError
        )]
        source: redb::Error,
        context: Option<Cow<'static, str>>,
    },

    #[error("Hardware I/O failure{}: {source}", format_context(.context))]
    Io { source: std::io::Error, context: Option<Cow<'static, str>> },

    #[error("Config error{}: {source}", format_context(.context))]
    Config { source: config::ConfigError, context: Option<Cow<'static, str>> },
}

impl KvError {
    pub(crate) fn not_found(key: impl Into<String>) -> Self {
        Self::KeyNotFound { key: key.into(), context: None }
    }

    pub(crate) fn exists(key: impl Into<String>) -> Self {
        Self::KeyExists { key: key.into(), context: None }
    }

    pub(crate) const fn closed() -> Self {
        Self::Closed { context: None }
    }

    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::KeyNotFound { .. })
    }

    #[must_use]
    pub const fn is_exists(&self) -> bool {
        matches!(self, Self::KeyExists { .. })
    }

    #[must_use]
    pub const fn is_closed(&self) -> bool {
        matches!(self, Self::Closed { .. })
    }

    /// True for both explicit cancellation and an expired deadline.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. } | Self::DeadlineExceeded { .. })
    }
}
