use async_trait::async_trait;
use tracing::warn;

use crate::error::DbError;
use crate::models::{Connection, QueryOutput};

pub mod document;
pub mod keyvalue;
pub mod mongo;
pub mod mysql;
pub mod postgres;
pub mod redis;
pub mod sql;

/// One database engine: how to open a short-lived session, run a raw query
/// on it and release it again.
///
/// Implementors only describe the three steps; [`DatabaseDriver`] stitches
/// them together so the session is closed exactly once on every path.
#[async_trait]
pub trait Engine: Send + Sync {
    type Session: Send;

    /// Human readable engine name, e.g. `PostgreSQL`.
    const NAME: &'static str;

    async fn open(&self, connection: &Connection) -> Result<Self::Session, DbError>;

    /// Round trip proving the session is usable. Engines that connect eagerly
    /// can rely on the default.
    async fn probe(&self, _session: &mut Self::Session) -> Result<(), DbError> {
        Ok(())
    }

    async fn run(&self, session: &mut Self::Session, query: &str) -> Result<QueryOutput, DbError>;

    async fn close(&self, session: Self::Session) -> Result<(), DbError>;
}

/// Object-safe face of an [`Engine`], stored by the dispatcher.
#[async_trait]
pub trait DatabaseDriver: Send + Sync {
    fn name(&self) -> &'static str;

    /// Opens, probes and closes a session.
    async fn ping(&self, connection: &Connection) -> Result<(), DbError>;

    /// Opens a session, runs `query` and closes the session, even on failure.
    async fn execute(&self, connection: &Connection, query: &str) -> Result<QueryOutput, DbError>;
}

#[async_trait]
impl<E: Engine> DatabaseDriver for E {
    fn name(&self) -> &'static str {
        E::NAME
    }

    async fn ping(&self, connection: &Connection) -> Result<(), DbError> {
        let mut session = self.open(connection).await?;
        let outcome = self.probe(&mut session).await;
        release(self, session).await;
        outcome
    }

    async fn execute(&self, connection: &Connection, query: &str) -> Result<QueryOutput, DbError> {
        let mut session = self.open(connection).await?;
        let outcome = self.run(&mut session, query).await;
        release(self, session).await;
        outcome
    }
}

/// A failed close never replaces the outcome of the query itself.
async fn release<E: Engine>(engine: &E, session: E::Session) {
    if let Err(e) = engine.close(session).await {
        warn!(engine = E::NAME, error = %e, "failed to release connection");
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Engine double that counts session opens and closes.
    #[derive(Clone, Default)]
    pub struct RecordingEngine {
        pub opened: Arc<AtomicUsize>,
        pub closed: Arc<AtomicUsize>,
        pub fail_open: Option<String>,
        pub fail_run: Option<String>,
        pub fail_close: bool,
        pub output: QueryOutput,
    }

    impl RecordingEngine {
        pub fn returning(output: QueryOutput) -> Self {
            Self {
                output,
                ..Self::default()
            }
        }

        pub fn failing(message: &str) -> Self {
            Self {
                fail_run: Some(message.to_string()),
                ..Self::default()
            }
        }

        pub fn opened(&self) -> usize {
            self.opened.load(Ordering::SeqCst)
        }

        pub fn closed(&self) -> usize {
            self.closed.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Engine for RecordingEngine {
        type Session = ();
        const NAME: &'static str = "Recording";

        async fn open(&self, _connection: &Connection) -> Result<(), DbError> {
            if let Some(message) = &self.fail_open {
                return Err(DbError::Message(message.clone()));
            }
            self.opened.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn run(&self, _session: &mut (), _query: &str) -> Result<QueryOutput, DbError> {
            match &self.fail_run {
                Some(message) => Err(DbError::Message(message.clone())),
                None => Ok(self.output.clone()),
            }
        }

        async fn close(&self, _session: ()) -> Result<(), DbError> {
            self.closed.fetch_add(1, Ordering::SeqCst);
            if self.fail_close {
                return Err(DbError::Message("close failed".into()));
            }
            Ok(())
        }
    }
}
