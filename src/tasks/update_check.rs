//! Update check: fetch the version file from the first mirror that answers.
//!
//! The network wait runs on a single-threaded runtime local to the thread
//! executing the task and races every request against the cancellation token.

use std::fmt;

use tokio_util::sync::CancellationToken;

use super::events::EventSink;
use super::task::TaskContext;
use crate::config::DEFAULT_UPDATE_MIRRORS;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateCheckParameters {
    /// The user asked for this check; such checks run ahead of queued work.
    pub checked_by_user: bool,
    /// Mirrors tried in order.
    pub mirrors: Vec<String>,
}

impl UpdateCheckParameters {
    pub fn new(checked_by_user: bool, mirrors: Vec<String>) -> Self {
        Self {
            checked_by_user,
            mirrors,
        }
    }

    pub fn with_default_mirrors(checked_by_user: bool) -> Self {
        Self::new(
            checked_by_user,
            DEFAULT_UPDATE_MIRRORS.iter().map(|m| m.to_string()).collect(),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateFailure {
    Canceled,
    /// Every mirror failed.
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    Fetched { mirror: String, data: Vec<u8> },
    Failed(UpdateFailure),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateCheckReport {
    pub checked_by_user: bool,
    pub outcome: UpdateOutcome,
}

impl UpdateCheckReport {
    pub fn is_error(&self) -> bool {
        matches!(self.outcome, UpdateOutcome::Failed(_))
    }

    /// Raw version file, empty on failure.
    pub fn data(&self) -> &[u8] {
        match &self.outcome {
            UpdateOutcome::Fetched { data, .. } => data,
            UpdateOutcome::Failed(_) => &[],
        }
    }
}

impl fmt::Display for UpdateCheckReport {
    /// `ERROR=..|CHECK_BY_USER=..|DATA=..`, the form downstream formatting reads.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flag = |value: bool| if value { "TRUE" } else { "FALSE" };
        write!(
            f,
            "ERROR={}|CHECK_BY_USER={}|DATA={}",
            flag(self.is_error()),
            flag(self.checked_by_user),
            String::from_utf8_lossy(self.data())
        )
    }
}

pub(crate) fn run(
    params: &UpdateCheckParameters,
    cancel: &CancellationToken,
    sink: &EventSink,
    context: &TaskContext,
) -> UpdateCheckReport {
    let outcome = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime.block_on(poll_mirrors(&params.mirrors, cancel, context)),
        Err(err) => {
            tracing::error!(error = %err, "could not start the update-check event loop");
            UpdateOutcome::Failed(UpdateFailure::Error)
        }
    };
    let outcome = settle(outcome, cancel);

    if let UpdateOutcome::Failed(cause) = &outcome {
        sink.status(match cause {
            UpdateFailure::Canceled => "Update: canceled by user",
            UpdateFailure::Error => "Update: error occurred",
        });
    }

    UpdateCheckReport {
        checked_by_user: params.checked_by_user,
        outcome,
    }
}

/// A cancellation observed after the last mirror answered still wins.
fn settle(outcome: UpdateOutcome, cancel: &CancellationToken) -> UpdateOutcome {
    match outcome {
        UpdateOutcome::Fetched { mirror, .. } if cancel.is_cancelled() => {
            tracing::debug!(%mirror, "update information dropped after cancellation");
            UpdateOutcome::Failed(UpdateFailure::Canceled)
        }
        outcome => outcome,
    }
}

async fn poll_mirrors(
    mirrors: &[String],
    cancel: &CancellationToken,
    context: &TaskContext,
) -> UpdateOutcome {
    let mut builder = reqwest::Client::builder().timeout(context.network_timeout);
    if !context.use_system_proxy {
        builder = builder.no_proxy();
    }
    let client = match builder.build() {
        Ok(client) => client,
        Err(err) => {
            tracing::error!(error = %err, "could not build HTTP client");
            return UpdateOutcome::Failed(UpdateFailure::Error);
        }
    };

    for mirror in mirrors {
        if cancel.is_cancelled() {
            break;
        }

        let fetched = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            fetched = fetch(&client, mirror) => fetched,
        };

        match fetched {
            Ok(data) => {
                tracing::info!(%mirror, bytes = data.len(), "update information fetched");
                return UpdateOutcome::Fetched {
                    mirror: mirror.clone(),
                    data,
                };
            }
            Err(err) => tracing::warn!(%mirror, error = %err, "update mirror failed"),
        }
    }

    if cancel.is_cancelled() {
        UpdateOutcome::Failed(UpdateFailure::Canceled)
    } else {
        UpdateOutcome::Failed(UpdateFailure::Error)
    }
}

async fn fetch(client: &reqwest::Client, url: &str) -> reqwest::Result<Vec<u8>> {
    let response = client.get(url).send().await?.error_for_status()?;
    Ok(response.bytes().await?.to_vec())
}
