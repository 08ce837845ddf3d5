use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::Record;
use crate::interaction::Interaction;

/// Something callable by name with a JSON result.
#[async_trait]
pub trait Operation: Send + Sync {
    fn name(&self) -> &str;
    fn fields(&self) -> Vec<String>;
    async fn invoke(&self, data: Record) -> Result<Value>;
}

#[async_trait]
impl<T> Operation for Interaction<T>
where
    T: Serialize + Send + 'static,
{
    fn name(&self) -> &str {
        Interaction::name(self)
    }

    fn fields(&self) -> Vec<String> {
        Interaction::fields(self)
    }

    async fn invoke(&self, data: Record) -> Result<Value> {
        let output = self.call(data).await?;
        serde_json::to_value(output)
            .with_context(|| format!("failed to serialize result of {}", Interaction::name(self)))
    }
}

/// Name plus declared input fields, for listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationDescription {
    pub name: String,
    pub fields: Vec<String>,
}

/// Holds all registered operations. RwLock allows runtime registration + parallel reads.
pub struct InteractionRegistry {
    operations: RwLock<HashMap<String, Arc<dyn Operation>>>,
}

impl Default for InteractionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl InteractionRegistry {
    pub fn new() -> Self {
        Self {
            operations: RwLock::new(HashMap::new()),
        }
    }

    /// Register under the operation's own name, replacing any previous one.
    pub async fn register(&self, operation: Arc<dyn Operation>) {
        let name = operation.name().to_string();
        self.operations.write().await.insert(name, operation);
    }

    pub async fn unregister(&self, name: &str) {
        self.operations.write().await.remove(name);
    }

    /// Invoke by name. The lock is released before the operation runs.
    pub async fn call(&self, name: &str, data: Record) -> Result<Value> {
        let operation = self.operations.read().await.get(name).cloned();
        match operation {
            Some(operation) => operation.invoke(data).await,
            None => bail!("unknown interaction: {}", name),
        }
    }

    /// Invoke several operations concurrently. Results keep the input order.
    pub async fn call_all(&self, calls: Vec<(String, Record)>) -> Vec<Result<Value>> {
        let futures: Vec<_> = calls
            .into_iter()
            .map(|(name, data)| async move { self.call(&name, data).await })
            .collect();
        futures::future::join_all(futures).await
    }

    pub async fn descriptions(&self) -> Vec<OperationDescription> {
        let mut descriptions: Vec<_> = self
            .operations
            .read()
            .await
            .values()
            .map(|op| OperationDescription {
                name: op.name().to_string(),
                fields: op.fields(),
            })
            .collect();
        descriptions.sort_by(|a, b| a.name.cmp(&b.name));
        descriptions
    }
}
