//! Failure notifier - bounded, best-effort webhook alerts
//!
//! Submitting never blocks the job. One worker drains the queue in order.
//! On shutdown the delivery in progress completes, and whatever is still
//! queued is dropped and counted.

use crate::common::errors::JobFailure;
use crate::models::record::now_rfc3339;
use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use log::{error, warn};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureNotice {
    pub level: String,
    pub message: String,
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub source: String,
}

impl FailureNotice {
    pub fn from_failure(failure: &JobFailure) -> Self {
        Self {
            level: "ERROR".to_string(),
            message: failure.error.to_string(),
            timestamp: now_rfc3339(),
            job_id: Some(failure.job_id.clone()).filter(|id| !id.is_empty()),
            image_url: Some(failure.image_url.clone()).filter(|url| !url.is_empty()),
            source: failure.error.source_tag().to_string(),
        }
    }
}

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, notice: &FailureNotice) -> Result<()>;
}

pub struct WebhookSink {
    client: Client,
    url: String,
}

impl WebhookSink {
    pub fn new(url: String, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client for webhook")?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl NotificationSink for WebhookSink {
    async fn deliver(&self, notice: &FailureNotice) -> Result<()> {
        let response = self
            .client
            .post(&self.url)
            .json(notice)
            .send()
            .await
            .context("failed to POST failure notice")?;
        if !response.status().is_success() {
            bail!("webhook returned {}", response.status());
        }
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────
// Queue and Worker
// ────────────────────────────────────────────────────────────────

/// Cheap to clone; every clone feeds the same worker.
#[derive(Clone)]
pub struct NotifierHandle {
    sender: mpsc::Sender<FailureNotice>,
}

impl NotifierHandle {
    /// A handle whose queue is read directly instead of by a worker.
    #[cfg(test)]
    pub(crate) fn channel(capacity: usize) -> (Self, mpsc::Receiver<FailureNotice>) {
        let (sender, receiver) = mpsc::channel(capacity);
        (Self { sender }, receiver)
    }

    /// Queue `notice` for delivery. Returns `false` when it was dropped.
    pub fn submit(&self, notice: FailureNotice) -> bool {
        match self.sender.try_send(notice) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(notice)) => {
                warn!(job_id = notice.job_id.as_deref().unwrap_or_default(); "Notification queue full, dropping {} notice", notice.source);
                false
            }
            Err(mpsc::error::TrySendError::Closed(notice)) => {
                warn!(job_id = notice.job_id.as_deref().unwrap_or_default(); "Notifier stopped, dropping {} notice", notice.source);
                false
            }
        }
    }
}

pub struct NotifierWorker {
    shutdown_tx: broadcast::Sender<()>,
    task: JoinHandle<usize>,
}

impl NotifierWorker {
    /// Signal the worker to stop, then wait for it.
    ///
    /// The signal is sent before the returned future is first polled. The
    /// future resolves to the number of queued notices that were dropped.
    pub fn shutdown(self) -> impl Future<Output = usize> {
        let _ = self.shutdown_tx.send(());
        async move {
            match self.task.await {
                Ok(dropped) => dropped,
                Err(err) => {
                    error!("Notifier worker panicked: {}", err);
                    0
                }
            }
        }
    }
}

/// Start the delivery worker on the current runtime.
pub fn spawn_notifier(
    sink: Arc<dyn NotificationSink>,
    capacity: usize,
) -> (NotifierHandle, NotifierWorker) {
    let (sender, receiver) = mpsc::channel(capacity.max(1));
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let task = tokio::spawn(run_worker(sink, receiver, shutdown_rx));
    (NotifierHandle { sender }, NotifierWorker { shutdown_tx, task })
}

async fn run_worker(
    sink: Arc<dyn NotificationSink>,
    mut receiver: mpsc::Receiver<FailureNotice>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> usize {
    loop {
        tokio::select! {
            biased;
            _ = shutdown_rx.recv() => break,
            next = receiver.recv() => match next {
                Some(notice) => {
                    if let Err(err) = sink.deliver(&notice).await {
                        warn!(job_id = notice.job_id.as_deref().unwrap_or_default(); "Failed to deliver failure notice: {:#}", err);
                    }
                }
                // every handle is gone and the queue is empty
                None => return 0,
            },
        }
    }

    receiver.close();
    let mut dropped = 0;
    while receiver.try_recv().is_ok() {
        dropped += 1;
    }
    dropped
}
