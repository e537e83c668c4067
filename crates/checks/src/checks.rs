//! Maps a desired check state onto exactly one Healthchecks.io API call.
use config::{CheckOpts, State};
use eyre::{Result, bail};
use reqwest::StatusCode;
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{error, info, warn};

use crate::{
    check::{Check, uuid_from_response},
    client::Client,
};

/// Structured result of one invocation, as reported to the runner.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Outcome {
    /// Whether the remote state was modified
    pub changed: bool,
    /// Whether the invocation failed
    pub failed: bool,
    /// Human readable summary
    pub msg: String,
    /// Raw response body, when the call returns one worth reporting
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl Outcome {
    /// A successful call that modified the remote state.
    pub fn changed(msg: impl Into<String>) -> Self {
        Self { changed: true, failed: false, msg: msg.into(), data: None }
    }

    /// A successful call that left the remote state as it was.
    pub fn unchanged(msg: impl Into<String>) -> Self {
        Self { changed: false, failed: false, msg: msg.into(), data: None }
    }

    /// A failed invocation.
    pub fn failure(msg: impl Into<String>) -> Self {
        Self { changed: false, failed: true, msg: msg.into(), data: None }
    }

    /// Attach a response body.
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Fold an invocation result into an outcome. Errors become failures whose
    /// message carries the full cause chain.
    pub fn from_result(result: Result<Self>) -> Self {
        result.unwrap_or_else(|e| {
            error!(error = ?e, "Invocation failed");
            Self::failure(format!("{e:#}"))
        })
    }

    fn skipped(msg: impl Into<String>) -> Self {
        Self::unchanged(msg).with_data(json!({}))
    }
}

/// Operations that address an existing check by UUID.
#[derive(Debug, Clone, Copy)]
enum UuidAction {
    Delete,
    Pause,
}

impl UuidAction {
    const fn verb(self) -> &'static str {
        match self {
            Self::Delete => "delete",
            Self::Pause => "pause",
        }
    }

    const fn past(self) -> &'static str {
        match self {
            Self::Delete => "deleted",
            Self::Pause => "paused",
        }
    }

    /// 200 means done, 404 means there was nothing to act on.
    fn interpret(self, uuid: &str, status: StatusCode) -> Outcome {
        match status {
            StatusCode::OK => {
                info!(%uuid, action = self.verb(), "Check action applied");
                Outcome::changed(format!("Check {uuid} successfully {}", self.past()))
            }
            StatusCode::NOT_FOUND => {
                info!(%uuid, action = self.verb(), "Check not found, nothing to do");
                Outcome::unchanged(format!("Check {uuid} not found"))
            }
            other => {
                warn!(%uuid, action = self.verb(), status = %other, "Unexpected API status");
                Outcome::failure(format!(
                    "Failed to {} check {uuid} [HTTP {}]",
                    self.verb(),
                    other.as_u16()
                ))
            }
        }
    }
}

/// Dispatches a desired state to the create, delete or pause call.
#[derive(Debug, Clone)]
pub struct Checks {
    client: Client,
    check_mode: bool,
}

impl Checks {
    /// Create a dispatcher. In `check_mode` no request is ever sent.
    pub const fn new(client: Client, check_mode: bool) -> Self {
        Self { client, check_mode }
    }

    /// Bring the check to `state`.
    ///
    /// Preconditions are verified before anything else, check mode included:
    /// `present` validates the attributes, `absent` and `pause` require a UUID.
    pub async fn run(
        &self,
        state: State,
        check: &CheckOpts,
        uuid: Option<&str>,
    ) -> Result<Outcome> {
        match state {
            State::Present => {
                check.validate()?;
                self.create(&Check::from(check)).await
            }
            State::Absent => self.delete(require_uuid(state, uuid)?).await,
            State::Pause => self.pause(require_uuid(state, uuid)?).await,
        }
    }

    /// Create a check, or update the one matching its `unique` fields.
    pub async fn create(&self, check: &Check) -> Result<Outcome> {
        if self.check_mode {
            info!(name = %check.name, "Check mode, skipping create or update");
            return Ok(Outcome::skipped("Check mode: no changes made"));
        }

        let resp = self.client.post_json(&["checks", ""], check).await?;
        match resp.status {
            StatusCode::OK => {
                let uuid = uuid_from_response(&resp.body)?;
                info!(%uuid, name = %check.name, "Updated existing check");
                Ok(Outcome::changed(format!("Existing check {uuid} found and updated"))
                    .with_data(resp.body))
            }
            StatusCode::CREATED => {
                let uuid = uuid_from_response(&resp.body)?;
                info!(%uuid, name = %check.name, "Created check");
                Ok(Outcome::changed(format!("New check {uuid} created")).with_data(resp.body))
            }
            other => {
                warn!(name = %check.name, status = %other, "Unexpected API status");
                Ok(Outcome::failure(format!(
                    "Failed to create or update check [HTTP {}]",
                    other.as_u16()
                )))
            }
        }
    }

    /// Delete the check with `uuid`.
    pub async fn delete(&self, uuid: &str) -> Result<Outcome> {
        if self.check_mode {
            info!(%uuid, "Check mode, skipping delete");
            return Ok(Outcome::skipped("Check mode: no changes made"));
        }

        let resp = self.client.delete(&["checks", uuid]).await?;
        Ok(UuidAction::Delete.interpret(uuid, resp.status))
    }

    /// Pause the check with `uuid`.
    pub async fn pause(&self, uuid: &str) -> Result<Outcome> {
        if self.check_mode {
            info!(%uuid, "Check mode, skipping pause");
            return Ok(Outcome::skipped("Check mode: no changes made"));
        }

        let resp = self.client.post(&["checks", uuid, "pause"]).await?;
        Ok(UuidAction::Pause.interpret(uuid, resp.status))
    }
}

/// Check identifiers are UUIDs: ASCII letters, digits and dashes only.
fn require_uuid(state: State, uuid: Option<&str>) -> Result<&str> {
    match uuid {
        Some(uuid) if !uuid.is_empty() => {
            if !uuid.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
                bail!("invalid check uuid {uuid:?}: expected letters, digits and dashes");
            }
            Ok(uuid)
        }
        _ => bail!("state is {state} but all of the following are missing: uuid"),
    }
}
