//! Log-streaming connection bookkeeping.

use crate::entities::Connection;
use async_trait::async_trait;
use std::collections::HashMap;
use tf_error::Result;
use tokio::sync::RwLock;

/// Durable storage for open log-streaming connections.
#[async_trait]
pub trait ConnectionRepo: Send + Sync {
    /// Register a new connection.
    async fn create_connection(&self, connection: Connection) -> Result<()>;

    /// Remove a batch of connections by id. Missing ids are ignored.
    async fn delete_batch(&self, connection_ids: &[String]) -> Result<()>;

    /// Every open connection for an execution.
    async fn get_by_execution_id(&self, execution_id: &str) -> Result<Vec<Connection>>;
}

/// In-memory [`ConnectionRepo`] reference implementation.
#[derive(Default)]
pub struct InMemoryConnectionRepo {
    connections: RwLock<HashMap<String, Connection>>,
}

impl InMemoryConnectionRepo {
    /// Construct an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConnectionRepo for InMemoryConnectionRepo {
    async fn create_connection(&self, connection: Connection) -> Result<()> {
        self.connections
            .write()
            .await
            .insert(connection.connection_id.clone(), connection);
        Ok(())
    }

    async fn delete_batch(&self, connection_ids: &[String]) -> Result<()> {
        let mut table = self.connections.write().await;
        for id in connection_ids {
            table.remove(id);
        }
        Ok(())
    }

    async fn get_by_execution_id(&self, execution_id: &str) -> Result<Vec<Connection>> {
        let table = self.connections.read().await;
        Ok(table
            .values()
            .filter(|c| c.execution_id == execution_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample(connection_id: &str, execution_id: &str) -> Connection {
        Connection {
            connection_id: connection_id.to_string(),
            execution_id: execution_id.to_string(),
            user_email: Some("viewer@x.com".to_string()),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn create_then_query_by_execution() {
        let repo = InMemoryConnectionRepo::new();
        repo.create_connection(sample("c-1", "e-1")).await.unwrap();
        repo.create_connection(sample("c-2", "e-1")).await.unwrap();
        repo.create_connection(sample("c-3", "e-2")).await.unwrap();
        let for_e1 = repo.get_by_execution_id("e-1").await.unwrap();
        assert_eq!(for_e1.len(), 2);
    }

    #[tokio::test]
    async fn delete_batch_removes_only_named() {
        let repo = InMemoryConnectionRepo::new();
        repo.create_connection(sample("c-1", "e-1")).await.unwrap();
        repo.create_connection(sample("c-2", "e-1")).await.unwrap();
        repo.delete_batch(&["c-1".to_string(), "missing".to_string()])
            .await
            .unwrap();
        let remaining = repo.get_by_execution_id("e-1").await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].connection_id, "c-2");
    }
}
