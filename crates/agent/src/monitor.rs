use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use concierge_core::config::AssistantConfig;
use concierge_core::domain::run::{Run, RunId};
use concierge_core::domain::thread::ThreadId;
use concierge_core::errors::ConversationError;
use tokio::time::Instant;
use tracing::debug;

use crate::assistant::AssistantClient;

/// Waits until a run needs this side's attention: tool outputs or a terminal state.
///
/// Polling is the only implementation today; a push-driven monitor can replace
/// it without touching the run controller.
#[async_trait]
pub trait RunMonitor: Send + Sync {
    async fn await_actionable(
        &self,
        thread_id: &ThreadId,
        run_id: &RunId,
    ) -> Result<Run, ConversationError>;
}

pub struct PollingMonitor {
    client: Arc<dyn AssistantClient>,
    interval: Duration,
    max_wait: Option<Duration>,
}

impl PollingMonitor {
    pub fn new(
        client: Arc<dyn AssistantClient>,
        interval: Duration,
        max_wait: Option<Duration>,
    ) -> Self {
        Self { client, interval, max_wait }
    }

    pub fn from_config(client: Arc<dyn AssistantClient>, config: &AssistantConfig) -> Self {
        Self::new(client, config.poll_interval(), config.max_wait())
    }
}

#[async_trait]
impl RunMonitor for PollingMonitor {
    async fn await_actionable(
        &self,
        thread_id: &ThreadId,
        run_id: &RunId,
    ) -> Result<Run, ConversationError> {
        let started = Instant::now();
        loop {
            let run = self
                .client
                .get_run(thread_id, run_id)
                .await?;

            if run.status.is_actionable() {
                return Ok(run);
            }

            let waited = started.elapsed();
            if let Some(max_wait) = self.max_wait {
                if waited >= max_wait {
                    return Err(ConversationError::RunTimedOut {
                        run_id: run_id.clone(),
                        waited_secs: waited.as_secs(),
                    });
                }
            }

            debug!(
                event_name = "agent.run.waiting",
                thread_id = %thread_id,
                run_id = %run_id,
                status = %run.status,
                "run not actionable yet"
            );
            tokio::time::sleep(self.interval).await;
        }
    }
}
