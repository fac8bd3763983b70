use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::Mutex;

use loomflow_core::error::{FlowError, Result};
use loomflow_core::execution::Execution;
use loomflow_core::traits::ExecutionStore;

/// Per-execution serialization queue.
///
/// Sibling branches complete concurrently and each wants to patch the same
/// execution's node list; every mutation here is a full read-modify-write
/// under a per-execution-id lock, so updates apply atomically and in
/// arrival order (tokio mutexes queue waiters FIFO). Mutations for
/// different executions proceed independently.
pub struct MutationQueue {
    store: Arc<dyn ExecutionStore>,
    locks: StdMutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl MutationQueue {
    pub fn new(store: Arc<dyn ExecutionStore>) -> Self {
        Self {
            store,
            locks: StdMutex::new(HashMap::new()),
        }
    }

    fn lock_for(&self, execution_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self
            .locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        locks
            .entry(execution_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Apply one mutation to an execution: load the latest persisted
    /// record, run `mutate`, write back. An `Err` from the closure leaves
    /// the stored record untouched.
    pub async fn apply<R, F>(&self, execution_id: &str, mutate: F) -> Result<R>
    where
        F: FnOnce(&mut Execution) -> Result<R> + Send,
        R: Send,
    {
        let lock = self.lock_for(execution_id);
        let _guard = lock.lock().await;

        let mut execution = self
            .store
            .get_execution(execution_id)
            .await?
            .ok_or_else(|| FlowError::ExecutionNotFound(execution_id.to_string()))?;
        let out = mutate(&mut execution)?;
        self.store.put_execution(&execution).await?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use futures::future::BoxFuture;
    use loomflow_core::workflow::{TriggerStrategy, Workflow};

    /// In-memory store that sleeps inside writes, widening the race window.
    struct SlowStore {
        executions: StdMutex<HashMap<String, Execution>>,
        write_delay_ms: u64,
    }

    impl SlowStore {
        fn new(write_delay_ms: u64) -> Self {
            Self {
                executions: StdMutex::new(HashMap::new()),
                write_delay_ms,
            }
        }
    }

    impl ExecutionStore for SlowStore {
        fn get_execution(&self, id: &str) -> BoxFuture<'_, Result<Option<Execution>>> {
            let id = id.to_string();
            Box::pin(async move { Ok(self.executions.lock().unwrap().get(&id).cloned()) })
        }

        fn put_execution(&self, execution: &Execution) -> BoxFuture<'_, Result<()>> {
            let execution = execution.clone();
            Box::pin(async move {
                tokio::time::sleep(std::time::Duration::from_millis(self.write_delay_ms)).await;
                self.executions
                    .lock()
                    .unwrap()
                    .insert(execution.id.clone(), execution);
                Ok(())
            })
        }

        fn list_due_scheduled(
            &self,
            _now: DateTime<Utc>,
        ) -> BoxFuture<'_, Result<Vec<Execution>>> {
            Box::pin(async { Ok(vec![]) })
        }
    }

    fn execution() -> Execution {
        Execution::new(&Workflow {
            id: "wf".into(),
            project_id: "p".into(),
            workspace_id: "ws".into(),
            nodes: vec![],
            edges: vec![],
            strategy: TriggerStrategy::Manual,
            is_active: true,
        })
    }

    #[tokio::test]
    async fn test_concurrent_mutations_are_not_lost() {
        let store = Arc::new(SlowStore::new(10));
        let exec = execution();
        let id = exec.id.clone();
        store
            .executions
            .lock()
            .unwrap()
            .insert(id.clone(), exec);

        let queue = Arc::new(MutationQueue::new(store.clone()));

        let mut tasks = Vec::new();
        for i in 0..8 {
            let queue = queue.clone();
            let id = id.clone();
            tasks.push(tokio::spawn(async move {
                queue
                    .apply(&id, move |exec| {
                        exec.edges.push(loomflow_core::workflow::Edge::new(
                            format!("e{}", i),
                            "a",
                            "b",
                        ));
                        Ok(())
                    })
                    .await
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let stored = store.executions.lock().unwrap().get(&id).cloned().unwrap();
        assert_eq!(stored.edges.len(), 8);
    }

    #[tokio::test]
    async fn test_failed_mutation_writes_nothing() {
        let store = Arc::new(SlowStore::new(0));
        let exec = execution();
        let id = exec.id.clone();
        store
            .executions
            .lock()
            .unwrap()
            .insert(id.clone(), exec);

        let queue = MutationQueue::new(store.clone());
        let result: Result<()> = queue
            .apply(&id, |exec| {
                exec.edges
                    .push(loomflow_core::workflow::Edge::new("e1", "a", "b"));
                Err(FlowError::Handler("abort".into()))
            })
            .await;
        assert!(result.is_err());

        let stored = store.executions.lock().unwrap().get(&id).cloned().unwrap();
        assert!(stored.edges.is_empty());
    }

    #[tokio::test]
    async fn test_missing_execution_is_an_error() {
        let store = Arc::new(SlowStore::new(0));
        let queue = MutationQueue::new(store);
        let result: Result<()> = queue.apply("ghost", |_| Ok(())).await;
        assert!(matches!(result, Err(FlowError::ExecutionNotFound(_))));
    }
}
