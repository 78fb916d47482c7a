//! Session: one connection, an optional explicit transaction, and the load,
//! save and delete operations that run through them.
//!
//! Statements run inside the open transaction when there is one and
//! directly on the connection otherwise.

use crate::error::{Error, Result};
use crate::save;
use std::sync::Arc;
use trellis_core::limits::{validate_load_depth, validate_save_depth};
use trellis_core::{
    decode, Catalog, Decoded, Entity, EntityConfig, Key, Loaded, ObjectGraph, Params, Ref,
    SavePlan, Value,
};
use trellis_cypher::{
    load_all, load_edge_constraint, load_one, Condition, EdgeConstraint, NodePattern,
    Pagination, Pattern, QueryBuilder,
};
use trellis_driver::{AccessMode, Connection, Pool, Row, Runner, Summary, Transaction};

/// Variable the load strategies bind the root node to
const ROOT_VAR: &str = "n";

/// Per-call load settings
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Path depth; the session default when unset
    pub depth: Option<u32>,
    /// Extra WHERE condition on the root variable `n`
    pub filter: Option<Condition>,
    /// Parameters referenced by `filter`
    pub params: Params,
    pub pagination: Option<Pagination>,
}

impl LoadOptions {
    pub fn depth(depth: u32) -> Self {
        Self {
            depth: Some(depth),
            ..Self::default()
        }
    }

    pub fn with_filter(mut self, filter: Condition) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn with_pagination(mut self, pagination: Pagination) -> Self {
        self.pagination = Some(pagination);
        self
    }
}

pub struct Session {
    catalog: Arc<Catalog>,
    pool: Arc<dyn Pool>,
    conn: Option<Box<dyn Connection>>,
    tx: Option<Box<dyn Transaction>>,
    default_depth: u32,
}

impl Session {
    pub(crate) fn new(
        catalog: Arc<Catalog>,
        pool: Arc<dyn Pool>,
        conn: Box<dyn Connection>,
        default_depth: u32,
    ) -> Self {
        tracing::debug!("Opened {} session", conn.mode());
        Self {
            catalog,
            pool,
            conn: Some(conn),
            tx: None,
            default_depth,
        }
    }

    pub fn mode(&self) -> Result<AccessMode> {
        self.conn
            .as_ref()
            .map(|c| c.mode())
            .ok_or(Error::SessionClosed)
    }

    pub fn is_closed(&self) -> bool {
        self.conn.is_none()
    }

    pub fn in_transaction(&self) -> bool {
        self.tx.is_some()
    }

    pub fn default_depth(&self) -> u32 {
        self.default_depth
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    /// Empty object graph over this session's catalog
    pub fn graph(&self) -> ObjectGraph {
        ObjectGraph::new(Arc::clone(&self.catalog))
    }

    fn runner(&mut self) -> Result<&mut dyn Runner> {
        let conn = self.conn.as_mut().ok_or(Error::SessionClosed)?;
        match self.tx.as_mut() {
            Some(tx) => Ok(tx.as_runner()),
            None => Ok(conn.as_runner()),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Transactions
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn begin(&mut self) -> Result<()> {
        let conn = self.conn.as_mut().ok_or(Error::SessionClosed)?;
        if self.tx.is_some() {
            return Err(Error::TransactionState(
                "transaction already started".to_string(),
            ));
        }
        let tx = conn.begin().await?;
        self.tx = Some(tx);
        tracing::debug!("Transaction started");
        Ok(())
    }

    pub async fn commit(&mut self) -> Result<()> {
        if self.conn.is_none() {
            return Err(Error::SessionClosed);
        }
        let tx = self.tx.take().ok_or_else(|| {
            Error::TransactionState("transaction not started".to_string())
        })?;
        tx.commit().await?;
        tracing::debug!("Transaction committed");
        Ok(())
    }

    pub async fn rollback(&mut self) -> Result<()> {
        if self.conn.is_none() {
            return Err(Error::SessionClosed);
        }
        let tx = self.tx.take().ok_or_else(|| {
            Error::TransactionState("transaction not started".to_string())
        })?;
        tx.rollback().await?;
        tracing::debug!("Transaction rolled back");
        Ok(())
    }

    /// Roll back after `original` failed; returns `original`, or both errors
    /// when the rollback fails too
    pub async fn rollback_with_error(&mut self, original: Error) -> Error {
        match self.rollback().await {
            Ok(()) => original,
            Err(rollback) => Error::Rollback {
                original: Box::new(original),
                rollback: Box::new(rollback),
            },
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Loads
    // ─────────────────────────────────────────────────────────────────────────

    fn node_config<T: Entity>(&self) -> Result<&EntityConfig> {
        let config = self.catalog.config_of::<T>()?;
        if config.is_edge() {
            return Err(trellis_core::Error::InvalidOperation(format!(
                "[{}] is an edge entity and can not be loaded as a node",
                config.label
            ))
            .into());
        }
        Ok(config)
    }

    fn load_depth(&self, options: &LoadOptions) -> Result<u32> {
        let depth = options.depth.unwrap_or(self.default_depth);
        validate_load_depth(depth)?;
        Ok(depth)
    }

    /// Load the entity with primary key `key` and its surroundings
    pub async fn load<T: Entity>(
        &mut self,
        key: impl Into<Key>,
        options: LoadOptions,
    ) -> Result<Loaded<T>> {
        let key: Key = key.into();
        let depth = self.load_depth(&options)?;
        let config = self.node_config::<T>()?;
        let key_field = config.primary_key().stored_name.clone();
        let builder = load_one(
            ROOT_VAR,
            &config.label,
            &key_field,
            depth,
            options.filter.as_ref(),
        )
        .param(key_field.as_str(), key.to_value());
        self.fetch(builder, options).await
    }

    /// Load every entity of type `T`
    pub async fn load_all<T: Entity>(&mut self, options: LoadOptions) -> Result<Loaded<T>> {
        let depth = self.load_depth(&options)?;
        let config = self.node_config::<T>()?;
        let builder = load_all(ROOT_VAR, &config.label, depth, options.filter.as_ref());
        self.fetch(builder, options).await
    }

    /// Load every `T` reachable from a node of `constraint.end_label` whose
    /// `constraint.end_field` equals `value`
    pub async fn load_edge_constraint<T: Entity>(
        &mut self,
        constraint: &EdgeConstraint,
        value: impl Into<Value>,
        options: LoadOptions,
    ) -> Result<Loaded<T>> {
        let depth = self.load_depth(&options)?;
        self.catalog.config(&constraint.end_label)?;
        let config = self.node_config::<T>()?;
        let builder = load_edge_constraint(
            ROOT_VAR,
            &config.label,
            constraint,
            depth,
            options.filter.as_ref(),
        )
        .param(constraint.end_field.as_str(), value);
        self.fetch(builder, options).await
    }

    async fn fetch<T: Entity>(
        &mut self,
        builder: QueryBuilder,
        options: LoadOptions,
    ) -> Result<Loaded<T>> {
        let builder = match &options.pagination {
            Some(pagination) => pagination.apply(builder)?,
            None => builder,
        };
        let rows = builder
            .params(options.params)
            .on(self.runner()?)
            .query()
            .await?;
        let decoded = self.decode_rows(&rows)?;
        let loaded = decoded.typed::<T>();
        tracing::debug!("Loaded {} [{}] roots", loaded.len(), T::label());
        Ok(loaded)
    }

    fn decode_rows(&self, rows: &[Row]) -> Result<Decoded> {
        let values = rows.iter().flat_map(|row| row.values());
        Ok(decode(Arc::clone(&self.catalog), values)?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Saves
    // ─────────────────────────────────────────────────────────────────────────

    /// Persist `root` and everything reachable from it within `depth`
    /// relationships, then refresh the snapshots of what was written.
    pub async fn save<T: Entity>(
        &mut self,
        graph: &mut ObjectGraph,
        root: &Ref<T>,
        depth: u32,
    ) -> Result<()> {
        validate_save_depth(depth)?;
        let plan = SavePlan::build(graph, root.key(), depth)?;
        let mut batch = save::render(&plan)?;
        if !batch.is_empty() {
            let summaries = batch.execute(self.runner()?).await?;
            let total: Summary = summaries.iter().sum();
            tracing::debug!(
                "Saved [{}] {}: {} nodes created, {} relationships created, {} deleted",
                T::label(),
                root.key(),
                total.nodes_created,
                total.relationships_created,
                total.relationships_deleted
            );
        }
        plan.commit(graph)?;
        Ok(())
    }

    /// Save at the session's default depth
    pub async fn save_default<T: Entity>(
        &mut self,
        graph: &mut ObjectGraph,
        root: &Ref<T>,
    ) -> Result<()> {
        let depth = self.default_depth;
        self.save(graph, root, depth).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Deletes
    // ─────────────────────────────────────────────────────────────────────────

    /// Delete the node for `target` with all of its relationships
    pub async fn delete<T: Entity>(&mut self, target: &Ref<T>) -> Result<()> {
        let config = self.node_config::<T>()?;
        let node = NodePattern::new(ROOT_VAR)
            .label(&config.label)
            .prop(&config.primary_key().stored_name, "key");
        self.detach_delete(node, target.key()).await
    }

    /// Delete whichever node carries `key`, regardless of label
    pub async fn delete_by_key(&mut self, key: impl Into<Key>) -> Result<()> {
        let key = key.into();
        let node = NodePattern::new(ROOT_VAR).prop(key.kind().stored_name(), "key");
        self.detach_delete(node, &key).await
    }

    async fn detach_delete(&mut self, node: NodePattern, key: &Key) -> Result<()> {
        let summary = QueryBuilder::new()
            .match_(&Pattern::node(node))
            .delete(true, &[ROOT_VAR])
            .param("key", key.to_value())
            .on(self.runner()?)
            .execute()
            .await?;
        tracing::debug!("Deleted {} ({} nodes)", key, summary.nodes_deleted);
        Ok(())
    }

    /// Delete every node and relationship in the database
    pub async fn purge_all(&mut self) -> Result<()> {
        let summary = QueryBuilder::new()
            .match_(&Pattern::node(NodePattern::new(ROOT_VAR)))
            .delete(true, &[ROOT_VAR])
            .on(self.runner()?)
            .execute()
            .await?;
        tracing::info!("Purged database ({} nodes deleted)", summary.nodes_deleted);
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Raw statements
    // ─────────────────────────────────────────────────────────────────────────

    /// Run caller-written Cypher and return its rows
    pub async fn query_raw(&mut self, text: &str, params: Params) -> Result<Vec<Row>> {
        Ok(QueryBuilder::new()
            .cypher(text)
            .params(params)
            .on(self.runner()?)
            .query()
            .await?)
    }

    /// Run caller-written Cypher and decode every node and path it returns
    pub async fn query_graph(&mut self, text: &str, params: Params) -> Result<Decoded> {
        let rows = self.query_raw(text, params).await?;
        self.decode_rows(&rows)
    }

    /// Run caller-written Cypher for its side effects
    pub async fn execute(&mut self, text: &str, params: Params) -> Result<Summary> {
        Ok(QueryBuilder::new()
            .cypher(text)
            .params(params)
            .on(self.runner()?)
            .execute()
            .await?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────────

    /// Return the connection to the pool. Fails while a transaction is open.
    pub async fn close(&mut self) -> Result<()> {
        if self.tx.is_some() {
            tracing::warn!("Attempted to close session with an open transaction");
            return Err(Error::TransactionState(
                "can not close session with an open transaction".to_string(),
            ));
        }
        let conn = self.conn.take().ok_or(Error::SessionClosed)?;
        self.pool.reclaim(conn).await?;
        tracing::debug!("Session closed");
        Ok(())
    }
}

/// Dropping can not await, so no rollback is sent: an open transaction is
/// dropped uncommitted, and the connection is dropped instead of reclaimed.
/// Call [`Session::rollback`] and [`Session::close`] to end cleanly.
impl Drop for Session {
    fn drop(&mut self) {
        if self.tx.take().is_some() {
            tracing::warn!("Session dropped with an open transaction; its writes are discarded uncommitted");
        }
        if self.conn.take().is_some() {
            tracing::debug!("Session dropped without close; connection not reclaimed");
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("mode", &self.conn.as_ref().map(|c| c.mode()))
            .field("in_transaction", &self.tx.is_some())
            .field("default_depth", &self.default_depth)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use trellis_core::{BaseNode, FieldDescriptor, FieldType};
    use trellis_cypher::CypherError;
    use trellis_driver::{DriverError, MemoryPool};

    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    struct Tag {
        #[serde(flatten)]
        base: BaseNode,
        name: String,
    }

    impl Entity for Tag {
        fn fields() -> Vec<FieldDescriptor> {
            vec![
                FieldDescriptor::embed(BaseNode::fields),
                FieldDescriptor::new("name", FieldType::STRING, ""),
            ]
        }
    }

    fn tag(name: &str) -> Tag {
        Tag {
            name: name.to_string(),
            ..Tag::default()
        }
    }

    async fn session(pool: &MemoryPool, mode: AccessMode) -> Session {
        let catalog = Arc::new(Catalog::builder().register::<Tag>().build().unwrap());
        let conn = pool.open(mode).await.unwrap();
        Session::new(catalog, Arc::new(pool.clone()), conn, 1)
    }

    #[tokio::test]
    async fn test_transaction_state_errors() {
        let pool = MemoryPool::new();
        let mut session = session(&pool, AccessMode::ReadWrite).await;

        assert!(matches!(
            session.commit().await.unwrap_err(),
            Error::TransactionState(_)
        ));
        assert!(matches!(
            session.rollback().await.unwrap_err(),
            Error::TransactionState(_)
        ));

        session.begin().await.unwrap();
        assert!(session.in_transaction());
        assert!(matches!(
            session.begin().await.unwrap_err(),
            Error::TransactionState(_)
        ));
        assert!(matches!(
            session.close().await.unwrap_err(),
            Error::TransactionState(_)
        ));

        session.commit().await.unwrap();
        session.close().await.unwrap();
        assert_eq!(pool.in_use(), 0);
    }

    #[tokio::test]
    async fn test_rollback_discards_save() {
        let pool = MemoryPool::new();
        let mut session = session(&pool, AccessMode::ReadWrite).await;
        let mut graph = session.graph();
        let root = graph.insert(tag("rust")).unwrap();

        session.begin().await.unwrap();
        session.save(&mut graph, &root, 0).await.unwrap();
        assert_eq!(pool.node_count().unwrap(), 0);
        session.rollback().await.unwrap();
        assert_eq!(pool.node_count().unwrap(), 0);

        session.begin().await.unwrap();
        session.save(&mut graph, &root, 0).await.unwrap();
        session.commit().await.unwrap();
        assert_eq!(pool.node_count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_rollback_with_error() {
        let pool = MemoryPool::new();
        let mut session = session(&pool, AccessMode::ReadWrite).await;

        session.begin().await.unwrap();
        let err = session
            .rollback_with_error(Error::Config("boom".to_string()))
            .await;
        assert!(matches!(err, Error::Config(_)));

        let err = session
            .rollback_with_error(Error::Config("boom".to_string()))
            .await;
        assert!(matches!(err, Error::Rollback { .. }));
    }

    #[tokio::test]
    async fn test_drop_discards_open_transaction() {
        let pool = MemoryPool::new();
        let mut session = session(&pool, AccessMode::ReadWrite).await;
        let mut graph = session.graph();
        let root = graph.insert(tag("rust")).unwrap();

        session.begin().await.unwrap();
        session.save(&mut graph, &root, 0).await.unwrap();
        drop(session);

        assert_eq!(pool.node_count().unwrap(), 0);
        assert_eq!(pool.in_use(), 0);
    }

    #[tokio::test]
    async fn test_closed_session() {
        let pool = MemoryPool::new();
        let mut session = session(&pool, AccessMode::ReadWrite).await;
        session.close().await.unwrap();

        assert!(session.is_closed());
        assert!(matches!(session.close().await.unwrap_err(), Error::SessionClosed));
        assert!(matches!(session.begin().await.unwrap_err(), Error::SessionClosed));
        assert!(matches!(
            session.load_all::<Tag>(LoadOptions::default()).await.unwrap_err(),
            Error::SessionClosed
        ));
    }

    #[tokio::test]
    async fn test_read_only_session_rejects_save() {
        let pool = MemoryPool::new();
        let mut session = session(&pool, AccessMode::ReadOnly).await;
        let mut graph = session.graph();
        let root = graph.insert(tag("rust")).unwrap();

        let err = session.save(&mut graph, &root, 0).await.unwrap_err();
        assert!(matches!(err, Error::Driver(DriverError::AccessMode(_))));
        assert_eq!(session.load_all::<Tag>(LoadOptions::default()).await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_depth_limits() {
        let pool = MemoryPool::new();
        let mut session = session(&pool, AccessMode::ReadWrite).await;
        let mut graph = session.graph();
        let root = graph.insert(tag("rust")).unwrap();

        let err = session.save(&mut graph, &root, 51).await.unwrap_err();
        assert!(matches!(err, Error::DepthTooLarge(_)));
        let err = session
            .load_all::<Tag>(LoadOptions::depth(51))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DepthTooLarge(_)));
    }

    #[tokio::test]
    async fn test_invalid_pagination_runs_nothing() {
        let pool = MemoryPool::new();
        let mut session = session(&pool, AccessMode::ReadWrite).await;
        let options =
            LoadOptions::default().with_pagination(Pagination::new(0, 1, ROOT_VAR, "name"));
        let err = session.load_all::<Tag>(options).await.unwrap_err();
        assert!(matches!(err, Error::Query(CypherError::Pagination(_))));
    }

    #[tokio::test]
    async fn test_delete_and_purge() {
        let pool = MemoryPool::new();
        let mut session = session(&pool, AccessMode::ReadWrite).await;
        let mut graph = session.graph();
        let rust = graph.insert(tag("rust")).unwrap();
        let go = graph.insert(tag("go")).unwrap();
        let zig = graph.insert(tag("zig")).unwrap();
        for root in [&rust, &go, &zig] {
            session.save(&mut graph, root, 0).await.unwrap();
        }
        assert_eq!(pool.node_count().unwrap(), 3);

        session.delete(&rust).await.unwrap();
        session.delete_by_key(go.key().clone()).await.unwrap();
        let left = session.load_all::<Tag>(LoadOptions::depth(0)).await.unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left.first().unwrap().name, "zig");

        session.purge_all().await.unwrap();
        assert_eq!(pool.node_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_raw_queries() {
        let pool = MemoryPool::new();
        let mut session = session(&pool, AccessMode::ReadWrite).await;
        let mut graph = session.graph();
        let root = graph.insert(tag("rust")).unwrap();
        session.save(&mut graph, &root, 0).await.unwrap();

        let rows = session
            .query_raw("MATCH (n:Tag) RETURN count(n) AS total", Params::new())
            .await
            .unwrap();
        assert_eq!(rows[0].get("total"), Some(&Value::Int(1)));

        let decoded = session
            .query_graph("MATCH (n:Tag) RETURN n", Params::new())
            .await
            .unwrap();
        let tags = decoded.typed::<Tag>();
        assert_eq!(tags.first().unwrap().name, "rust");

        let summary = session
            .execute("MATCH (n) DETACH DELETE n", Params::new())
            .await
            .unwrap();
        assert_eq!(summary.nodes_deleted, 1);

        let err = session
            .query_raw("CALL db.labels()", Params::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Driver(DriverError::Unsupported(_))));
    }
}
