//! Detached delivery of run requests to the flow execution API.
//!
//! The webhook handler only enqueues.  A worker task owned by [`Dispatcher`]
//! drains the queue and spawns one task per request, so a slow or failing
//! downstream call never holds up the webhook response or another call.
//! Outcomes are logged and nothing is retried.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use common::http_client::HttpClient;
use common::{ServiceError, ServiceResult};
use models::RunRequest;
use reqwest::header::HeaderMap;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

/// Longest slice of a downstream response body that makes it into the logs.
const LOGGED_BODY_CHARS: usize = 500;

/// Everything needed to perform one downstream call.
pub struct DispatchRequest {
    pub url: String,
    /// Sensitive values are flagged so their `Debug` output is redacted.
    pub headers: HeaderMap,
    pub payload: RunRequest,
}

/// Hand-off point between request handling and downstream delivery.
pub trait DispatchQueue: Send + Sync {
    /// Schedules `request` without waiting for it to be sent.
    fn submit(&self, request: DispatchRequest) -> ServiceResult<()>;
}

#[derive(Clone)]
pub struct Dispatcher {
    sender: mpsc::UnboundedSender<DispatchRequest>,
    pending: Arc<AtomicUsize>,
}

/// Handle on the worker task; used to drain it at shutdown.
pub struct DispatchWorker {
    handle: JoinHandle<()>,
    pending: Arc<AtomicUsize>,
}

impl Dispatcher {
    /// Starts the worker on the current tokio runtime.  The worker exits once
    /// every `Dispatcher` clone is dropped and its in-flight calls finish.
    pub fn spawn(client: HttpClient) -> (Self, DispatchWorker) {
        let (sender, mut receiver) = mpsc::unbounded_channel::<DispatchRequest>();
        let pending = Arc::new(AtomicUsize::new(0));

        let counter = pending.clone();
        let handle = tokio::spawn(async move {
            let mut in_flight = JoinSet::new();
            loop {
                tokio::select! {
                    next = receiver.recv() => match next {
                        Some(request) => {
                            let client = client.clone();
                            let counter = counter.clone();
                            in_flight.spawn(async move {
                                dispatch(&client, request).await;
                                counter.fetch_sub(1, Ordering::SeqCst);
                            });
                        }
                        None => break,
                    },
                    Some(_) = in_flight.join_next(), if !in_flight.is_empty() => {}
                }
            }
            info!("Dispatch queue closed, finishing {} in-flight call(s)", in_flight.len());
            while in_flight.join_next().await.is_some() {}
            info!("Dispatch worker exiting");
        });

        (
            Self {
                sender,
                pending: pending.clone(),
            },
            DispatchWorker { handle, pending },
        )
    }
}

impl DispatchQueue for Dispatcher {
    fn submit(&self, request: DispatchRequest) -> ServiceResult<()> {
        self.pending.fetch_add(1, Ordering::SeqCst);
        self.sender.send(request).map_err(|_| {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            ServiceError::Internal(anyhow!("dispatch worker is not running"))
        })
    }
}

impl DispatchWorker {
    /// Requests queued or in flight.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Waits up to `grace` for queued and in-flight calls, once all
    /// dispatchers are dropped.  Returns how many were abandoned.
    pub async fn shutdown(self, grace: Duration) -> usize {
        let pending = self.pending();
        if pending > 0 {
            info!("Waiting up to {:?} for {} pending dispatch(es)", grace, pending);
        }
        match tokio::time::timeout(grace, self.handle).await {
            Ok(_) => 0,
            Err(_) => {
                let abandoned = self.pending.load(Ordering::SeqCst);
                warn!("Abandoning {} dispatch(es) still pending after {:?}", abandoned, grace);
                abandoned
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Delivered { status: u16 },
    Rejected { status: u16, body: String },
    TimedOut,
    Failed(String),
}

/// Performs one POST and logs how it went.
pub async fn dispatch(client: &HttpClient, request: DispatchRequest) -> DispatchOutcome {
    match serde_json::to_string_pretty(&request.payload) {
        Ok(payload) => debug!("Sending run payload to Langflow: {}", payload),
        Err(e) => warn!("Could not render run payload for logging: {}", e),
    }

    let response = match client
        .post_json(&request.url, request.headers, &request.payload)
        .await
    {
        Ok(response) => response,
        Err(e) if e.is_timeout() => {
            error!("Timed out sending to Langflow at {}: {}", request.url, e);
            return DispatchOutcome::TimedOut;
        }
        Err(e) => {
            error!("HTTP Client Error sending to Langflow: {}", e);
            return DispatchOutcome::Failed(e.to_string());
        }
    };

    let status = response.status();
    let body = match response.text().await {
        Ok(body) => body,
        Err(e) => {
            warn!("Could not read Langflow response body: {}", e);
            String::new()
        }
    };
    let logged_body = truncate_for_log(&body);

    if status.is_success() {
        info!(
            "Forwarded to Langflow, status: {}, response: {}",
            status.as_u16(),
            logged_body
        );
        DispatchOutcome::Delivered {
            status: status.as_u16(),
        }
    } else {
        error!(
            "Langflow rejected run request, status: {}, response: {}",
            status.as_u16(),
            logged_body
        );
        DispatchOutcome::Rejected {
            status: status.as_u16(),
            body: logged_body,
        }
    }
}

fn truncate_for_log(body: &str) -> String {
    match body.char_indices().nth(LOGGED_BODY_CHARS) {
        Some((cut, _)) => format!("{}...", &body[..cut]),
        None => body.to_string(),
    }
}
