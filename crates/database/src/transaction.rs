//! Unit-of-work execution inside a single transaction.
//!
//! [`TransactionRunner::run`] opens one transaction, hands it to the caller's
//! closure and then commits if the closure succeeded or rolls back if it
//! failed. The closure's error is returned untouched. If the surrounding
//! future is dropped mid-work, the open transaction is dropped with it and
//! rolled back by the driver.

use crate::error::DbError;
use futures::future::BoxFuture;
use sqlx::{PgPool, Postgres, Transaction};
use std::fmt;
use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationLevel {
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::RepeatableRead => "REPEATABLE READ",
            IsolationLevel::Serializable => "SERIALIZABLE",
        })
    }
}

/// Explicit transaction characteristics. The default is the server's.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TxOptions {
    pub isolation: Option<IsolationLevel>,
    pub read_only: bool,
}

impl TxOptions {
    pub fn read_only() -> Self {
        Self {
            read_only: true,
            ..Self::default()
        }
    }

    pub fn with_isolation(mut self, isolation: IsolationLevel) -> Self {
        self.isolation = Some(isolation);
        self
    }

    /// The `SET TRANSACTION` statement for these options, if any differ from the default.
    pub fn set_transaction_statement(&self) -> Option<String> {
        let mut modes = Vec::new();
        if let Some(isolation) = self.isolation {
            modes.push(format!("ISOLATION LEVEL {isolation}"));
        }
        if self.read_only {
            modes.push("READ ONLY".to_string());
        }
        (!modes.is_empty()).then(|| format!("SET TRANSACTION {}", modes.join(", ")))
    }
}

/// An open transaction. Dropping it without finishing it must roll it back.
pub trait TxHandle: Send {
    fn commit(self) -> impl Future<Output = Result<(), sqlx::Error>> + Send;
    fn rollback(self) -> impl Future<Output = Result<(), sqlx::Error>> + Send;
}

/// Something that can open transactions, normally the connection pool.
pub trait TxSource: Send + Sync {
    type Tx: TxHandle;

    fn begin(&self, options: TxOptions) -> impl Future<Output = Result<Self::Tx, sqlx::Error>> + Send;
}

impl TxHandle for Transaction<'static, Postgres> {
    fn commit(self) -> impl Future<Output = Result<(), sqlx::Error>> + Send {
        Transaction::commit(self)
    }

    fn rollback(self) -> impl Future<Output = Result<(), sqlx::Error>> + Send {
        Transaction::rollback(self)
    }
}

impl TxSource for PgPool {
    type Tx = Transaction<'static, Postgres>;

    fn begin(&self, options: TxOptions) -> impl Future<Output = Result<Self::Tx, sqlx::Error>> + Send {
        let pool = self.clone();
        async move {
            let mut tx = pool.begin().await?;
            if let Some(statement) = options.set_transaction_statement() {
                sqlx::query(&statement).execute(&mut *tx).await?;
            }
            Ok(tx)
        }
    }
}

/// Runs units of work, each inside exactly one transaction.
#[derive(Debug, Clone)]
pub struct TransactionRunner<S = PgPool> {
    source: S,
    deadline: Option<Duration>,
}

impl<S: TxSource> TransactionRunner<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            deadline: None,
        }
    }

    /// Bounds how long a unit of work may run before it is aborted and rolled back.
    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Runs `work` in a transaction with default options.
    pub async fn run<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: for<'t> FnOnce(&'t mut S::Tx) -> BoxFuture<'t, Result<T, E>> + Send,
        E: From<DbError>,
    {
        self.run_with(TxOptions::default(), work).await
    }

    /// Runs `work` in a transaction opened with `options`.
    ///
    /// Exactly one of commit or rollback happens once the transaction is open.
    /// A failure to open it is returned as is. A commit failure is returned as
    /// [`DbError::Commit`]. A failed rollback is logged and the work's error
    /// is returned instead.
    pub async fn run_with<T, E, F>(&self, options: TxOptions, work: F) -> Result<T, E>
    where
        F: for<'t> FnOnce(&'t mut S::Tx) -> BoxFuture<'t, Result<T, E>> + Send,
        E: From<DbError>,
    {
        let mut tx = self.source.begin(options).await.map_err(DbError::Driver)?;

        let outcome = match self.deadline {
            Some(deadline) => match tokio::time::timeout(deadline, work(&mut tx)).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    tracing::warn!(?deadline, "unit of work exceeded its deadline, rolling back");
                    Err(E::from(DbError::DeadlineExceeded(deadline)))
                }
            },
            None => work(&mut tx).await,
        };

        match outcome {
            Ok(value) => {
                tx.commit().await.map_err(DbError::Commit)?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::error!(error = %rollback_err, "couldn't roll back transaction");
                }
                Err(err)
            }
        }
    }
}
