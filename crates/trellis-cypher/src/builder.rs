//! Deferred-error fluent query builder.
//!
//! Each chained call appends one clause. A call that cannot render its
//! clause records the error and the chain carries on, so `build()` can
//! report every problem at once.

use crate::clause::{render_list, OrderBy, RemoveItem, ReturnItem, SetItem, Unwind};
use crate::condition::Condition;
use crate::error::{CypherError, CypherResult};
use crate::ident::check;
use crate::pattern::Pattern;
use trellis_core::{Params, Value};
use trellis_driver::{Row, Runner, Statement, Summary};

#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    clauses: Vec<String>,
    errors: Vec<String>,
    params: Params,
}

impl QueryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(mut self, clause: String) -> Self {
        self.clauses.push(clause);
        self
    }

    /// Record an error without appending a clause
    pub fn fail(mut self, error: impl Into<String>) -> Self {
        self.errors.push(error.into());
        self
    }

    fn clause(self, keyword: &str, rendered: Result<String, String>) -> Self {
        match rendered {
            Ok(body) => self.push(format!("{} {}", keyword, body)),
            Err(e) => self.fail(e),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Clauses
    // ─────────────────────────────────────────────────────────────────────────

    pub fn match_(self, pattern: &Pattern) -> Self {
        self.clause("MATCH", pattern.render())
    }

    pub fn optional_match(self, pattern: &Pattern) -> Self {
        self.clause("OPTIONAL MATCH", pattern.render())
    }

    pub fn create(self, pattern: &Pattern) -> Self {
        self.clause("CREATE", pattern.render())
    }

    pub fn merge(self, pattern: &Pattern) -> Self {
        self.clause("MERGE", pattern.render())
    }

    pub fn where_(self, condition: &Condition) -> Self {
        self.clause("WHERE", condition.render())
    }

    pub fn return_(self, distinct: bool, items: &[ReturnItem]) -> Self {
        let keyword = if distinct { "RETURN DISTINCT" } else { "RETURN" };
        self.clause(keyword, render_list(items, "return items", ReturnItem::render))
    }

    pub fn delete(self, detach: bool, vars: &[&str]) -> Self {
        let keyword = if detach { "DETACH DELETE" } else { "DELETE" };
        let rendered = render_list(vars, "delete variables", |v| {
            check("variable", v).map(|_| v.to_string())
        });
        self.clause(keyword, rendered)
    }

    pub fn set(self, items: &[SetItem]) -> Self {
        self.clause("SET", render_list(items, "sets", SetItem::render))
    }

    pub fn remove(self, items: &[RemoveItem]) -> Self {
        self.clause("REMOVE", render_list(items, "removes", RemoveItem::render))
    }

    pub fn order_by(self, items: &[OrderBy]) -> Self {
        self.clause("ORDER BY", render_list(items, "order by", OrderBy::render))
    }

    pub fn skip(self, count: u64) -> Self {
        self.push(format!("SKIP {}", count))
    }

    pub fn limit(self, count: u64) -> Self {
        self.push(format!("LIMIT {}", count))
    }

    pub fn with(self, items: &[ReturnItem]) -> Self {
        self.clause("WITH", render_list(items, "with items", ReturnItem::render))
    }

    pub fn unwind(self, unwind: &Unwind) -> Self {
        self.clause("UNWIND", unwind.render())
    }

    pub fn union(self, all: bool) -> Self {
        self.push(if all { "UNION ALL" } else { "UNION" }.to_string())
    }

    /// Append a raw fragment
    pub fn cypher(self, fragment: &str) -> Self {
        let fragment = fragment.trim();
        if fragment.is_empty() {
            return self.fail("cypher fragment can not be empty");
        }
        self.push(fragment.to_string())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Parameters
    // ─────────────────────────────────────────────────────────────────────────

    pub fn param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        let name = name.into();
        if let Err(e) = check("parameter", &name) {
            return self.fail(e);
        }
        self.params.insert(name, value.into());
        self
    }

    pub fn params(mut self, params: Params) -> Self {
        for (name, value) in params {
            self = self.param(name, value);
        }
        self
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Completion
    // ─────────────────────────────────────────────────────────────────────────

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn to_cypher(&self) -> CypherResult<String> {
        if !self.errors.is_empty() {
            return Err(CypherError::Build {
                details: self.errors.clone(),
            });
        }
        if self.clauses.is_empty() {
            return Err(CypherError::Empty);
        }
        Ok(self.clauses.join(" "))
    }

    pub fn build(&self) -> CypherResult<Statement> {
        let text = self.to_cypher()?;
        tracing::debug!("Built statement: {} ({} params)", text, self.params.len());
        Ok(Statement::with_params(text, self.params.clone()))
    }

    /// Bind to a connection or transaction for execution
    pub fn on(self, runner: &mut dyn Runner) -> Bound<'_> {
        Bound {
            builder: self,
            runner,
        }
    }
}

/// A builder bound to something that can run it
pub struct Bound<'r> {
    builder: QueryBuilder,
    runner: &'r mut dyn Runner,
}

impl Bound<'_> {
    /// Run as a read and collect rows
    pub async fn query(self) -> CypherResult<Vec<Row>> {
        let statement = self.builder.build()?;
        Ok(self
            .runner
            .run_query(&statement.text, &statement.params)
            .await?)
    }

    /// Run as a write and return the summary
    pub async fn execute(self) -> CypherResult<Summary> {
        let statement = self.builder.build()?;
        Ok(self
            .runner
            .run_write(&statement.text, &statement.params)
            .await?)
    }
}

/// Statements staged for pipelined execution
#[derive(Debug, Clone, Default)]
pub struct Batch {
    statements: Vec<Statement>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build and stage a statement
    pub fn stage(&mut self, builder: &QueryBuilder) -> CypherResult<()> {
        self.statements.push(builder.build()?);
        Ok(())
    }

    pub fn push(&mut self, statement: Statement) {
        self.statements.push(statement);
    }

    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// Send every staged statement; the batch is drained either way
    pub async fn execute(&mut self, runner: &mut dyn Runner) -> CypherResult<Vec<Summary>> {
        if self.statements.is_empty() {
            return Err(CypherError::EmptyBatch);
        }
        let statements = std::mem::take(&mut self.statements);
        tracing::debug!("Executing batch of {} statements", statements.len());
        Ok(runner.run_batch(&statements).await?)
    }
}
