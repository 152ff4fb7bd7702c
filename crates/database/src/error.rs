//! Storage error classification.
//!
//! Raw driver failures are turned into a [`ClassifiedError`] exactly once, at
//! the point where they leave a repository method. From there on the error is
//! only inspected, never re-classified.

use crate::query::SqlValue;
use core_types::Table;
use std::error::Error as StdError;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Postgres SQLSTATE codes the classifier knows about.
pub mod sqlstate {
    pub const UNIQUE_VIOLATION: &str = "23505";
    pub const FOREIGN_KEY_VIOLATION: &str = "23503";
    pub const CHECK_VIOLATION: &str = "23514";
    pub const NOT_NULL_VIOLATION: &str = "23502";
    pub const UNDEFINED_TABLE: &str = "42P01";
}

/// Why a storage operation failed, independent of any transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reason {
    NotFound,
    ParentNotFound,
    AlreadyExists,
    NoRowsChanged,
    FailsCheckConstraint,
    Unhandled,
}

impl Reason {
    pub const ALL: [Reason; 6] = [
        Reason::NotFound,
        Reason::ParentNotFound,
        Reason::AlreadyExists,
        Reason::NoRowsChanged,
        Reason::FailsCheckConstraint,
        Reason::Unhandled,
    ];

    /// Maps a SQLSTATE code. Codes without a dedicated reason are `Unhandled`.
    pub fn from_sqlstate(code: &str) -> Self {
        match code {
            sqlstate::UNIQUE_VIOLATION => Reason::AlreadyExists,
            sqlstate::FOREIGN_KEY_VIOLATION => Reason::ParentNotFound,
            sqlstate::CHECK_VIOLATION => Reason::FailsCheckConstraint,
            sqlstate::UNDEFINED_TABLE => Reason::NotFound,
            _ => Reason::Unhandled,
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Reason::NotFound => "entry not found in db",
            Reason::ParentNotFound => "entry parent not found in db (foreign key violation)",
            Reason::AlreadyExists => "entry already exists in db",
            Reason::NoRowsChanged => "no rows changed in db",
            Reason::FailsCheckConstraint => "fails check constraint in db",
            Reason::Unhandled => "unhandled error from db",
        };
        f.write_str(text)
    }
}

/// A storage failure tagged with its [`Reason`], the statement that raised it
/// and the arguments it was bound with.
///
/// `debug` decides whether the driver cause is part of the `Display` output.
#[derive(Debug)]
pub struct ClassifiedError {
    reason: Reason,
    statement: String,
    arguments: Vec<SqlValue>,
    cause: Option<sqlx::Error>,
    debug: bool,
}

impl ClassifiedError {
    pub fn new(reason: Reason, statement: &str, arguments: &[SqlValue]) -> Self {
        Self {
            reason,
            statement: statement.to_string(),
            arguments: arguments.to_vec(),
            cause: None,
            debug: false,
        }
    }

    pub fn not_found(statement: &str, arguments: &[SqlValue]) -> Self {
        Self::new(Reason::NotFound, statement, arguments)
    }

    pub fn no_rows_changed(statement: &str, arguments: &[SqlValue]) -> Self {
        Self::new(Reason::NoRowsChanged, statement, arguments)
    }

    /// Wraps a driver error under `reason`. `Unhandled` errors carry their cause
    /// into `Display`, the others keep it as `source()` only.
    pub fn from_driver(
        reason: Reason,
        statement: &str,
        arguments: &[SqlValue],
        cause: sqlx::Error,
    ) -> Self {
        Self {
            cause: Some(cause),
            debug: reason == Reason::Unhandled,
            ..Self::new(reason, statement, arguments)
        }
    }

    pub fn reason(&self) -> Reason {
        self.reason
    }

    pub fn statement(&self) -> &str {
        &self.statement
    }

    pub fn arguments(&self) -> &[SqlValue] {
        &self.arguments
    }

    pub fn cause(&self) -> Option<&sqlx::Error> {
        self.cause.as_ref()
    }

    pub fn debug(&self) -> bool {
        self.debug
    }
}

impl fmt::Display for ClassifiedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, stmt: {{{}}}, args: [", self.reason, self.statement)?;
        for (i, argument) in self.arguments.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{argument}")?;
        }
        f.write_str("]")?;
        match (&self.cause, self.debug) {
            (Some(cause), true) => write!(f, ", err: {{{cause}}}"),
            _ => Ok(()),
        }
    }
}

impl StdError for ClassifiedError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.cause.as_ref().map(|e| e as &(dyn StdError + 'static))
    }
}

#[derive(Error, Debug)]
pub enum DbError {
    #[error(transparent)]
    Classified(#[from] ClassifiedError),

    #[error("Database driver error: {0}")]
    Driver(#[from] sqlx::Error),

    #[error("Couldn't commit transaction: {0}")]
    Commit(#[source] sqlx::Error),

    #[error("Couldn't find junction table for {left} and {right}")]
    JunctionNotFound { left: Table, right: Table },

    #[error("Unit of work exceeded its deadline of {0:?}")]
    DeadlineExceeded(Duration),

    #[error("Failed to load environment variables for database connection: {0}")]
    ConnectionConfigError(String),

    #[error("Database migration failed: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),
}

impl DbError {
    /// The classification reason, if this error has been classified.
    pub fn reason(&self) -> Option<Reason> {
        match self {
            DbError::Classified(classified) => Some(classified.reason()),
            _ => None,
        }
    }
}

/// Classifies a raw storage error raised by `statement`.
///
/// Already classified errors are returned unchanged, as is anything that is
/// not a driver error (validation, deadline, configuration, ...).
pub fn classify(err: impl Into<DbError>, statement: &str, arguments: &[SqlValue]) -> DbError {
    match err.into() {
        DbError::Driver(sqlx::Error::RowNotFound) => {
            ClassifiedError::not_found(statement, arguments).into()
        }
        DbError::Driver(sqlx::Error::Database(db_err)) => {
            let reason = db_err
                .code()
                .map_or(Reason::Unhandled, |code| Reason::from_sqlstate(&code));
            if reason == Reason::NotFound {
                ClassifiedError::not_found(statement, arguments).into()
            } else {
                ClassifiedError::from_driver(
                    reason,
                    statement,
                    arguments,
                    sqlx::Error::Database(db_err),
                )
                .into()
            }
        }
        other => other,
    }
}

/// Classification at the call site: `query.fetch_one(conn).await.classify(&stmt, &args)?`.
pub trait ClassifyExt<T> {
    fn classify(self, statement: &str, arguments: &[SqlValue]) -> Result<T, DbError>;
}

impl<T, E> ClassifyExt<T> for Result<T, E>
where
    E: Into<DbError>,
{
    fn classify(self, statement: &str, arguments: &[SqlValue]) -> Result<T, DbError> {
        self.map_err(|err| {
            let classified = classify(err, statement, arguments);
            tracing::debug!(reason = ?classified.reason(), error = %classified, "storage operation failed");
            classified
        })
    }
}
