//! Driver trait definitions

use crate::error::DriverResult;
use crate::types::{AccessMode, Row, Statement, Summary};
use async_trait::async_trait;
use trellis_core::Params;

/// Anything that can run Cypher: a bare connection or an open transaction
#[async_trait]
pub trait Runner: Send {
    /// Run a statement and collect its rows
    async fn run_query(&mut self, text: &str, params: &Params) -> DriverResult<Vec<Row>>;

    /// Run a statement for its side effects
    async fn run_write(&mut self, text: &str, params: &Params) -> DriverResult<Summary>;

    /// Run several statements in order, stopping at the first failure
    async fn run_batch(&mut self, statements: &[Statement]) -> DriverResult<Vec<Summary>> {
        let mut summaries = Vec::with_capacity(statements.len());
        for statement in statements {
            summaries.push(self.run_write(&statement.text, &statement.params).await?);
        }
        Ok(summaries)
    }
}

/// A checked-out database connection
#[async_trait]
pub trait Connection: Runner {
    fn mode(&self) -> AccessMode;

    fn as_runner(&mut self) -> &mut dyn Runner;

    /// Open an explicit transaction. The connection must not be used
    /// directly until the transaction is committed or rolled back.
    async fn begin(&mut self) -> DriverResult<Box<dyn Transaction>>;

    /// Check the connection is still usable
    async fn verify(&mut self) -> DriverResult<()>;
}

/// An explicit transaction
#[async_trait]
pub trait Transaction: Runner {
    fn as_runner(&mut self) -> &mut dyn Runner;

    async fn commit(self: Box<Self>) -> DriverResult<()>;

    async fn rollback(self: Box<Self>) -> DriverResult<()>;
}

/// Source of connections
#[async_trait]
pub trait Pool: Send + Sync {
    /// Check out a connection in the given mode
    async fn open(&self, mode: AccessMode) -> DriverResult<Box<dyn Connection>>;

    /// Return a connection to the pool
    async fn reclaim(&self, conn: Box<dyn Connection>) -> DriverResult<()>;

    /// Verify the database is reachable
    async fn verify(&self) -> DriverResult<()>;

    /// Close the pool; later opens fail
    async fn close(&self) -> DriverResult<()>;
}
