//! Startup handling of constraints and indexes

use crate::config::IndexStrategy;
use crate::error::{Error, Result};
use std::collections::BTreeSet;
use std::sync::Arc;
use trellis_core::{Catalog, Value};
use trellis_cypher::{Batch, QueryBuilder};
use trellis_driver::{AccessMode, Pool, Row};

/// Schema items the catalog asks for, as `(label, property)` pairs
#[derive(Debug, Default, PartialEq)]
pub(crate) struct Schema {
    pub constraints: BTreeSet<(String, String)>,
    pub indexes: BTreeSet<(String, String)>,
}

impl Schema {
    /// Unique constraints for primary keys and unique fields, indexes for
    /// indexed fields. Only node labels take part.
    pub fn declared(catalog: &Catalog) -> Self {
        let mut schema = Self::default();
        for config in catalog.configs().into_iter().filter(|c| !c.is_edge()) {
            for field in config.fields.iter().filter(|f| !f.ignore && !f.is_relationship()) {
                let item = (config.label.clone(), field.stored_name.clone());
                if field.primary_key || field.unique {
                    schema.constraints.insert(item);
                } else if field.index {
                    schema.indexes.insert(item);
                }
            }
        }
        schema
    }

    fn statements(&self) -> Result<Batch> {
        let mut batch = Batch::new();
        for (label, property) in &self.constraints {
            batch.stage(&QueryBuilder::new().cypher(&format!(
                "CREATE CONSTRAINT IF NOT EXISTS FOR (n:{}) REQUIRE n.{} IS UNIQUE",
                label, property
            )))?;
        }
        for (label, property) in &self.indexes {
            batch.stage(&QueryBuilder::new().cypher(&format!(
                "CREATE INDEX IF NOT EXISTS FOR (n:{}) ON (n.{})",
                label, property
            )))?;
        }
        Ok(batch)
    }
}

/// Apply `strategy` for every entity in `catalog`
pub(crate) async fn apply(strategy: IndexStrategy, catalog: &Catalog, pool: &Arc<dyn Pool>) -> Result<()> {
    match strategy {
        IndexStrategy::Ignore => Ok(()),
        IndexStrategy::Assert => assert_schema(catalog, pool).await,
        IndexStrategy::Validate => validate_schema(catalog, pool).await,
    }
}

async fn assert_schema(catalog: &Catalog, pool: &Arc<dyn Pool>) -> Result<()> {
    let schema = Schema::declared(catalog);
    let mut batch = schema.statements()?;
    if batch.is_empty() {
        return Ok(());
    }

    let mut conn = pool.open(AccessMode::ReadWrite).await?;
    let outcome = batch.execute(conn.as_runner()).await;
    pool.reclaim(conn).await?;
    outcome?;

    tracing::info!(
        "Asserted {} constraints and {} indexes",
        schema.constraints.len(),
        schema.indexes.len()
    );
    Ok(())
}

async fn validate_schema(catalog: &Catalog, pool: &Arc<dyn Pool>) -> Result<()> {
    let declared = Schema::declared(catalog);

    let mut conn = pool.open(AccessMode::ReadOnly).await?;
    let listed = async {
        let constraints = QueryBuilder::new()
            .cypher("SHOW CONSTRAINTS")
            .on(conn.as_runner())
            .query()
            .await?;
        let indexes = QueryBuilder::new()
            .cypher("SHOW INDEXES")
            .on(conn.as_runner())
            .query()
            .await?;
        Ok::<_, Error>((constraints, indexes))
    }
    .await;
    pool.reclaim(conn).await?;
    let (constraints, indexes) = listed?;

    let found = Schema {
        constraints: pairs(&constraints),
        indexes: pairs(&indexes),
    };

    let mut missing: Vec<String> = declared
        .constraints
        .difference(&found.constraints)
        .map(|(l, p)| format!("unique constraint on :{}({})", l, p))
        .collect();
    missing.extend(
        declared
            .indexes
            .difference(&found.indexes)
            .map(|(l, p)| format!("index on :{}({})", l, p)),
    );

    if !missing.is_empty() {
        return Err(Error::IndexValidation(format!("missing {}", missing.join(", "))));
    }
    tracing::info!("Validated constraints and indexes for {} entities", catalog.len());
    Ok(())
}

/// `(label, property)` pairs of single-property schema rows
fn pairs(rows: &[Row]) -> BTreeSet<(String, String)> {
    let first = |row: &Row, column: &str| match row.get(column) {
        Some(Value::List(items)) if items.len() == 1 => items[0].as_str().map(str::to_string),
        _ => None,
    };
    rows.iter()
        .filter_map(|row| Some((first(row, "labelsOrTypes")?, first(row, "properties")?)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_core::{BaseNode, Entity, FieldDescriptor, FieldType};
    use trellis_driver::MemoryPool;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    struct Teacher {
        #[serde(flatten)]
        base: BaseNode,
        name: String,
        office: String,
    }

    impl Entity for Teacher {
        fn fields() -> Vec<FieldDescriptor> {
            vec![
                FieldDescriptor::embed(BaseNode::fields),
                FieldDescriptor::new("name", FieldType::STRING, "unique"),
                FieldDescriptor::new("office", FieldType::STRING, "index"),
            ]
        }
    }

    fn catalog() -> Catalog {
        Catalog::builder().register::<Teacher>().build().unwrap()
    }

    #[test]
    fn test_declared_schema() {
        let schema = Schema::declared(&catalog());
        let pair = |p: &str| ("Teacher".to_string(), p.to_string());
        assert!(schema.constraints.contains(&pair("uuid")));
        assert!(schema.constraints.contains(&pair("name")));
        assert_eq!(schema.indexes.len(), 1);
        assert!(schema.indexes.contains(&pair("office")));
    }

    #[tokio::test]
    async fn test_validate_then_assert() {
        let catalog = catalog();
        let pool: Arc<dyn Pool> = Arc::new(MemoryPool::new());

        let err = apply(IndexStrategy::Validate, &catalog, &pool)
            .await
            .unwrap_err();
        match err {
            Error::IndexValidation(message) => {
                assert!(message.contains("unique constraint on :Teacher(name)"));
                assert!(message.contains("index on :Teacher(office)"));
            }
            other => panic!("unexpected error: {}", other),
        }

        apply(IndexStrategy::Assert, &catalog, &pool).await.unwrap();
        apply(IndexStrategy::Assert, &catalog, &pool).await.unwrap();
        apply(IndexStrategy::Validate, &catalog, &pool).await.unwrap();
    }

    #[tokio::test]
    async fn test_ignore_touches_nothing() {
        let pool: Arc<dyn Pool> = Arc::new(MemoryPool::new());
        apply(IndexStrategy::Ignore, &catalog(), &pool).await.unwrap();
    }
}
