//! Bounded worker pool for conversations.
//!
//! Each conversation runs as its own task; a semaphore caps how many run at
//! once. Callers await the result without holding a worker of their own.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tokio::sync::Semaphore;

use super::agent::ChatTurn;
use super::builtin;
use super::params::WorkflowRequest;
use crate::error::ServerError;
use crate::llm::ChatModel;

#[derive(Debug, Clone, Serialize)]
pub struct WorkflowOutput {
    pub workflow: String,
    pub summary: String,
    pub turns: u32,
    pub chat_history: Vec<ChatTurn>,
}

pub struct WorkflowRunner {
    model: Arc<dyn ChatModel>,
    permits: Arc<Semaphore>,
    workers: usize,
}

impl WorkflowRunner {
    pub fn new(model: Arc<dyn ChatModel>, workers: usize) -> Self {
        let workers = workers.max(1);
        Self {
            model,
            permits: Arc::new(Semaphore::new(workers)),
            workers,
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn model_name(&self) -> &str {
        self.model.model()
    }

    pub async fn invoke(&self, request: WorkflowRequest) -> Result<WorkflowOutput, ServerError> {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| ServerError::Internal(format!("Workflow pool closed: {}", e)))?;

        let name = request.name();
        let model = self.model.clone();
        let started = Instant::now();
        tracing::info!("[Workflow] Starting {}", name);

        let handle = tokio::spawn(async move {
            let _permit = permit;
            builtin::run(request, model).await
        });

        let result = handle
            .await
            .map_err(|e| ServerError::Internal(format!("Workflow task failed: {}", e)))?;

        match &result {
            Ok(chat) => tracing::info!(
                "[Workflow] {} finished in {:.1}s ({} turns)",
                name,
                started.elapsed().as_secs_f64(),
                chat.turns
            ),
            Err(e) => tracing::error!("[Workflow] {} failed: {}", name, e),
        }

        result.map(|chat| WorkflowOutput {
            workflow: name.to_string(),
            summary: chat.summary,
            turns: chat.turns,
            chat_history: chat.chat_history,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ChatMessage, Completion, ScriptedChatModel};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_invoke_returns_summary() {
        let runner = WorkflowRunner::new(Arc::new(ScriptedChatModel::new(["hi", "ok", "bye", "short summary"])), 2);
        let request = WorkflowRequest::parse("chat_assistant", serde_json::json!({ "message": "Hello" })).unwrap();
        let output = runner.invoke(request).await.unwrap();
        assert_eq!(output.workflow, "chat_assistant");
        assert_eq!(output.summary, "short summary");
        assert_eq!(output.turns, 2);
    }

    struct SlowModel {
        active: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl ChatModel for SlowModel {
        async fn complete(&self, _messages: &[ChatMessage]) -> Result<Completion, ServerError> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.active.fetch_sub(1, Ordering::SeqCst);
            Ok(Completion {
                content: "ok".to_string(),
                model: "slow".to_string(),
                usage: None,
            })
        }

        fn model(&self) -> &str {
            "slow"
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_pool_bounds_concurrency() {
        let model = Arc::new(SlowModel {
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let runner = Arc::new(WorkflowRunner::new(model.clone(), 1));

        let mut handles = Vec::new();
        for _ in 0..3 {
            let runner = runner.clone();
            handles.push(tokio::spawn(async move {
                let request = WorkflowRequest::parse("chat_assistant", serde_json::Value::Null).unwrap();
                runner.invoke(request).await
            }));
        }
        for handle in handles {
            assert!(handle.await.unwrap().is_ok());
        }
        assert_eq!(model.peak.load(Ordering::SeqCst), 1);
    }
}
