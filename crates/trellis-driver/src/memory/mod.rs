//! In-memory driver for testing
//!
//! Holds a single property graph behind a mutex and interprets the Cypher
//! shapes the mapper emits. Transactions read and write a private copy of
//! the graph and log their writes; commit replays the log onto the shared
//! graph as it is at commit time, so writes committed meanwhile by other
//! connections survive.

mod interpreter;
mod store;

use crate::error::{DriverError, DriverResult};
use crate::traits::{Connection, Pool, Runner, Transaction};
use crate::types::{AccessMode, Row, Summary};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use store::{Outcome, Store};
use trellis_core::Params;

/// Default number of connections a pool hands out at once
pub const DEFAULT_POOL_SIZE: usize = 50;

struct Shared {
    store: Mutex<Store>,
    capacity: usize,
    in_use: AtomicUsize,
    closed: AtomicBool,
}

impl Shared {
    fn with_store<T>(&self, f: impl FnOnce(&mut Store) -> T) -> DriverResult<T> {
        let mut store = self
            .store
            .lock()
            .map_err(|e| DriverError::Connection(format!("Lock error: {}", e)))?;
        Ok(f(&mut store))
    }
}

/// In-memory connection pool
#[derive(Clone)]
pub struct MemoryPool {
    shared: Arc<Shared>,
}

impl MemoryPool {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_POOL_SIZE)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            shared: Arc::new(Shared {
                store: Mutex::new(Store::default()),
                capacity,
                in_use: AtomicUsize::new(0),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Connections currently checked out
    pub fn in_use(&self) -> usize {
        self.shared.in_use.load(Ordering::SeqCst)
    }

    pub fn node_count(&self) -> DriverResult<usize> {
        self.shared.with_store(|s| s.node_count())
    }

    pub fn relationship_count(&self) -> DriverResult<usize> {
        self.shared.with_store(|s| s.relationship_count())
    }
}

impl Default for MemoryPool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Pool for MemoryPool {
    async fn open(&self, mode: AccessMode) -> DriverResult<Box<dyn Connection>> {
        if self.shared.closed.load(Ordering::SeqCst) {
            return Err(DriverError::Connection("pool is closed".to_string()));
        }
        let capacity = self.shared.capacity;
        self.shared
            .in_use
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n < capacity).then_some(n + 1)
            })
            .map_err(|_| DriverError::PoolExhausted(capacity))?;

        tracing::debug!("Opened {} memory connection", mode);
        Ok(Box::new(MemoryConnection {
            shared: Arc::clone(&self.shared),
            mode,
            in_transaction: Arc::new(AtomicBool::new(false)),
        }))
    }

    async fn reclaim(&self, conn: Box<dyn Connection>) -> DriverResult<()> {
        tracing::debug!("Reclaimed {} memory connection", conn.mode());
        drop(conn);
        Ok(())
    }

    async fn verify(&self) -> DriverResult<()> {
        if self.shared.closed.load(Ordering::SeqCst) {
            return Err(DriverError::Connection("pool is closed".to_string()));
        }
        Ok(())
    }

    async fn close(&self) -> DriverResult<()> {
        self.shared.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Parse, check the access mode, then run against `store`. Also reports
/// whether the statement wrote.
fn execute(store: &mut Store, mode: AccessMode, text: &str, params: &Params) -> DriverResult<(Outcome, bool)> {
    let op = interpreter::parse(text)?;
    if op.is_write() && !mode.can_write() {
        return Err(DriverError::AccessMode(format!(
            "writing in {} access mode is not allowed: {}",
            mode, text
        )));
    }
    tracing::debug!("memory driver: {}", text);
    Ok((store.execute(&op, params)?, op.is_write()))
}

/// Connection checked out of a [`MemoryPool`]
pub struct MemoryConnection {
    shared: Arc<Shared>,
    mode: AccessMode,
    in_transaction: Arc<AtomicBool>,
}

impl MemoryConnection {
    fn run(&mut self, text: &str, params: &Params) -> DriverResult<Outcome> {
        if self.in_transaction.load(Ordering::SeqCst) {
            return Err(DriverError::Transaction(
                "connection has an open transaction".to_string(),
            ));
        }
        let mode = self.mode;
        let (outcome, _) = self
            .shared
            .with_store(|store| execute(store, mode, text, params))??;
        Ok(outcome)
    }
}

impl Drop for MemoryConnection {
    fn drop(&mut self) {
        self.shared.in_use.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Runner for MemoryConnection {
    async fn run_query(&mut self, text: &str, params: &Params) -> DriverResult<Vec<Row>> {
        Ok(self.run(text, params)?.rows)
    }

    async fn run_write(&mut self, text: &str, params: &Params) -> DriverResult<Summary> {
        Ok(self.run(text, params)?.summary)
    }
}

#[async_trait]
impl Connection for MemoryConnection {
    fn mode(&self) -> AccessMode {
        self.mode
    }

    fn as_runner(&mut self) -> &mut dyn Runner {
        self
    }

    async fn begin(&mut self) -> DriverResult<Box<dyn Transaction>> {
        if self.in_transaction.swap(true, Ordering::SeqCst) {
            return Err(DriverError::Transaction(
                "connection already has an open transaction".to_string(),
            ));
        }
        let working = match self.shared.with_store(|s| s.clone()) {
            Ok(working) => working,
            Err(e) => {
                self.in_transaction.store(false, Ordering::SeqCst);
                return Err(e);
            }
        };
        Ok(Box::new(MemoryTransaction {
            shared: Arc::clone(&self.shared),
            mode: self.mode,
            working: Some(working),
            writes: Vec::new(),
            open: Arc::clone(&self.in_transaction),
        }))
    }

    async fn verify(&mut self) -> DriverResult<()> {
        if self.shared.closed.load(Ordering::SeqCst) {
            return Err(DriverError::Connection("pool is closed".to_string()));
        }
        Ok(())
    }
}

/// Transaction over a private copy of the graph
pub struct MemoryTransaction {
    shared: Arc<Shared>,
    mode: AccessMode,
    working: Option<Store>,
    /// Successful writes, in order, replayed on commit
    writes: Vec<(String, Params)>,
    open: Arc<AtomicBool>,
}

impl MemoryTransaction {
    fn run(&mut self, text: &str, params: &Params) -> DriverResult<Outcome> {
        let store = self
            .working
            .as_mut()
            .ok_or_else(|| DriverError::Transaction("transaction is closed".to_string()))?;
        let (outcome, wrote) = execute(store, self.mode, text, params)?;
        if wrote {
            self.writes.push((text.to_string(), params.clone()));
        }
        Ok(outcome)
    }
}

impl Drop for MemoryTransaction {
    fn drop(&mut self) {
        if self.working.take().is_some() {
            tracing::warn!("memory transaction dropped without commit; rolling back");
        }
        self.open.store(false, Ordering::SeqCst);
    }
}

#[async_trait]
impl Runner for MemoryTransaction {
    async fn run_query(&mut self, text: &str, params: &Params) -> DriverResult<Vec<Row>> {
        Ok(self.run(text, params)?.rows)
    }

    async fn run_write(&mut self, text: &str, params: &Params) -> DriverResult<Summary> {
        Ok(self.run(text, params)?.summary)
    }
}

#[async_trait]
impl Transaction for MemoryTransaction {
    fn as_runner(&mut self) -> &mut dyn Runner {
        self
    }

    async fn commit(mut self: Box<Self>) -> DriverResult<()> {
        self.working
            .take()
            .ok_or_else(|| DriverError::Transaction("transaction is closed".to_string()))?;
        let writes = std::mem::take(&mut self.writes);
        let mode = self.mode;
        // all or nothing: replay onto a copy of the current graph, then swap
        self.shared.with_store(|store| {
            let mut next = store.clone();
            for (text, params) in &writes {
                execute(&mut next, mode, text, params).map_err(|e| {
                    DriverError::Transaction(format!("commit failed, nothing applied: {}", e))
                })?;
            }
            *store = next;
            Ok::<_, DriverError>(())
        })??;
        tracing::debug!("memory transaction committed {} writes", writes.len());
        Ok(())
    }

    async fn rollback(mut self: Box<Self>) -> DriverResult<()> {
        self.working.take();
        self.writes.clear();
        tracing::debug!("memory transaction rolled back");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Statement;
    use trellis_core::Value;

    fn teacher(key: &str, name: &str) -> Statement {
        let mut props = trellis_core::PropertyMap::new();
        props.insert("name".to_string(), Value::from(name));
        Statement::new("MERGE (n:Teacher {uuid: $key}) SET n += $props")
            .with_param("key", key)
            .with_param("props", Value::Map(props))
    }

    #[tokio::test]
    async fn test_pool_capacity() {
        let pool = MemoryPool::with_capacity(1);
        let first = pool.open(AccessMode::ReadWrite).await.unwrap();
        let err = pool.open(AccessMode::ReadWrite).await.err().unwrap();
        assert_eq!(err, DriverError::PoolExhausted(1));

        pool.reclaim(first).await.unwrap();
        assert_eq!(pool.in_use(), 0);
        assert!(pool.open(AccessMode::ReadOnly).await.is_ok());
    }

    #[tokio::test]
    async fn test_read_only_rejects_writes() {
        let pool = MemoryPool::new();
        let mut conn = pool.open(AccessMode::ReadOnly).await.unwrap();
        let s = teacher("t1", "Ada");
        let err = conn.run_write(&s.text, &s.params).await.unwrap_err();
        assert!(matches!(err, DriverError::AccessMode(_)));
        assert_eq!(pool.node_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_rollback_discards_writes() {
        let pool = MemoryPool::new();
        let mut conn = pool.open(AccessMode::ReadWrite).await.unwrap();

        let mut tx = conn.begin().await.unwrap();
        tx.run_batch(&[teacher("t1", "Ada"), teacher("t2", "Grace")])
            .await
            .unwrap();
        assert_eq!(pool.node_count().unwrap(), 0);
        tx.rollback().await.unwrap();
        assert_eq!(pool.node_count().unwrap(), 0);

        let mut tx = conn.begin().await.unwrap();
        let s = teacher("t1", "Ada");
        tx.run_write(&s.text, &s.params).await.unwrap();
        tx.commit().await.unwrap();
        assert_eq!(pool.node_count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_connection_blocked_during_transaction() {
        let pool = MemoryPool::new();
        let mut conn = pool.open(AccessMode::ReadWrite).await.unwrap();
        let tx = conn.begin().await.unwrap();

        let err = conn
            .run_query("MATCH (n:Teacher) RETURN n", &Params::new())
            .await
            .unwrap_err();
        assert!(matches!(err, DriverError::Transaction(_)));

        drop(tx);
        assert!(conn
            .run_query("MATCH (n:Teacher) RETURN n", &Params::new())
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_commit_keeps_concurrent_writes() {
        let pool = MemoryPool::new();
        let mut first = pool.open(AccessMode::ReadWrite).await.unwrap();
        let mut second = pool.open(AccessMode::ReadWrite).await.unwrap();

        let mut tx = first.begin().await.unwrap();
        let s = teacher("t1", "Ada");
        tx.run_write(&s.text, &s.params).await.unwrap();

        let s = teacher("t2", "Grace");
        second.run_write(&s.text, &s.params).await.unwrap();
        assert_eq!(pool.node_count().unwrap(), 1);

        tx.commit().await.unwrap();
        assert_eq!(pool.node_count().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_conflicting_commit_applies_nothing() {
        let pool = MemoryPool::new();
        let mut first = pool.open(AccessMode::ReadWrite).await.unwrap();
        let mut second = pool.open(AccessMode::ReadWrite).await.unwrap();
        second
            .run_write(
                "CREATE CONSTRAINT IF NOT EXISTS FOR (n:Teacher) REQUIRE n.name IS UNIQUE",
                &Params::new(),
            )
            .await
            .unwrap();

        let mut tx = first.begin().await.unwrap();
        let s = teacher("t1", "Ada");
        tx.run_write(&s.text, &s.params).await.unwrap();
        let s = teacher("t3", "Hopper");
        tx.run_write(&s.text, &s.params).await.unwrap();

        // claims the name the transaction also wrote
        let s = teacher("t2", "Hopper");
        second.run_write(&s.text, &s.params).await.unwrap();

        let err = tx.commit().await.unwrap_err();
        assert!(matches!(err, DriverError::Transaction(_)));
        assert_eq!(pool.node_count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_closed_pool() {
        let pool = MemoryPool::new();
        pool.close().await.unwrap();
        assert!(pool.open(AccessMode::ReadWrite).await.is_err());
        assert!(pool.verify().await.is_err());
    }
}
