//! Scripted engine used by the gateway test suites.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::engine::{EngineError, EngineResult, LakeEngine, PreparedQuery, QueryResult};
use crate::value::{EngineColumn, EngineValue};

#[derive(Clone)]
enum Outcome {
    Rows(QueryResult),
    Error(String),
}

struct Rule {
    pattern: String,
    outcome: Outcome,
}

/// Engine double that answers by substring-matching the incoming SQL
/// against scripted rules, in registration order. Unmatched queries return
/// an empty result; every statement is recorded for assertions.
#[derive(Default)]
pub struct MockEngine {
    rules: Mutex<Vec<Rule>>,
    executed: Mutex<Vec<String>>,
}

impl MockEngine {
    pub fn new() -> Self {
        MockEngine::default()
    }

    pub fn with_result(self, pattern: impl Into<String>, result: QueryResult) -> Self {
        self.rules.lock().unwrap().push(Rule {
            pattern: pattern.into(),
            outcome: Outcome::Rows(result),
        });
        self
    }

    pub fn with_error(self, pattern: impl Into<String>, message: impl Into<String>) -> Self {
        self.rules.lock().unwrap().push(Rule {
            pattern: pattern.into(),
            outcome: Outcome::Error(message.into()),
        });
        self
    }

    /// One-column, one-row convenience result.
    pub fn single(name: &str, type_text: &str, value: EngineValue) -> QueryResult {
        QueryResult::new(vec![EngineColumn::new(name, type_text)], vec![vec![value]])
    }

    /// Every statement seen by the engine, in arrival order.
    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }

    pub fn executed_matching(&self, pattern: &str) -> Vec<String> {
        self.executed()
            .into_iter()
            .filter(|sql| sql.contains(pattern))
            .collect()
    }

    fn lookup(&self, sql: &str) -> Option<Outcome> {
        self.rules
            .lock()
            .unwrap()
            .iter()
            .find(|rule| sql.contains(&rule.pattern))
            .map(|rule| rule.outcome.clone())
    }

    fn record(&self, sql: &str) {
        self.executed.lock().unwrap().push(sql.to_string());
    }
}

#[async_trait]
impl LakeEngine for MockEngine {
    async fn query(&self, sql: &str) -> EngineResult<QueryResult> {
        self.record(sql);
        match self.lookup(sql) {
            Some(Outcome::Rows(result)) => Ok(result),
            Some(Outcome::Error(message)) => Err(EngineError::Sql(message)),
            None => Ok(QueryResult::empty()),
        }
    }

    async fn execute(&self, sql: &str) -> EngineResult<u64> {
        self.record(sql);
        match self.lookup(sql) {
            Some(Outcome::Error(message)) => Err(EngineError::Sql(message)),
            _ => Ok(0),
        }
    }

    async fn execute_transaction(&self, statements: &[String]) -> EngineResult<()> {
        for sql in statements {
            self.execute(sql).await?;
        }
        Ok(())
    }

    async fn prepare(&self, sql: &str) -> EngineResult<Arc<dyn PreparedQuery>> {
        self.record(sql);
        match self.lookup(sql) {
            Some(Outcome::Rows(result)) => Ok(Arc::new(MockPrepared { result })),
            Some(Outcome::Error(message)) => Err(EngineError::Sql(message)),
            None => Ok(Arc::new(MockPrepared {
                result: QueryResult::empty(),
            })),
        }
    }
}

struct MockPrepared {
    result: QueryResult,
}

#[async_trait]
impl PreparedQuery for MockPrepared {
    fn columns(&self) -> &[EngineColumn] {
        &self.result.columns
    }

    async fn query(&self, _params: &[EngineValue]) -> EngineResult<QueryResult> {
        Ok(self.result.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rules_match_in_order_and_record() {
        let engine = MockEngine::new()
            .with_error("boom", "Binder Error: boom")
            .with_result("SELECT 1", MockEngine::single("one", "INTEGER", EngineValue::Int32(1)));

        let res = engine.query("SELECT 1").await.unwrap();
        assert_eq!(res.rows, vec![vec![EngineValue::Int32(1)]]);
        assert!(engine.query("SELECT boom").await.is_err());
        assert_eq!(engine.executed().len(), 2);
    }
}
