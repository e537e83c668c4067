use config::{CheckOpts, UniqueField};
use eyre::{Result, WrapErr, eyre};
use serde::{Serialize, Serializer};
use serde_json::Value;
use url::Url;

/// Payload for creating or updating a check.
///
/// Never carries the check UUID: the server picks between create and update by
/// matching on the `unique` fields.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Check {
    /// Check name
    pub name: String,
    /// Check description
    pub desc: String,
    /// Tags, sent as one space separated string
    #[serde(serialize_with = "join_tags")]
    pub tags: Vec<String>,
    /// Expected period in seconds
    pub timeout: u32,
    /// Grace period in seconds
    pub grace: u32,
    /// Cron expression
    pub schedule: String,
    /// Timezone of the cron expression
    pub tz: String,
    /// Whether pings leave a paused check paused
    pub manual_resume: bool,
    /// Allowed ping methods
    pub methods: String,
    /// Integrations to assign
    pub channels: String,
    /// Fields used for upsert matching
    pub unique: Vec<UniqueField>,
}

fn join_tags<S: Serializer>(tags: &[String], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&tags.join(" "))
}

impl From<&CheckOpts> for Check {
    fn from(opts: &CheckOpts) -> Self {
        Self {
            name: opts.name.clone(),
            desc: opts.desc.clone(),
            tags: opts.tags.clone(),
            timeout: opts.timeout,
            grace: opts.grace,
            schedule: opts.schedule.clone(),
            tz: opts.tz.clone(),
            manual_resume: opts.manual_resume,
            methods: opts.methods.clone(),
            channels: opts.channels.clone(),
            unique: opts.unique.clone(),
        }
    }
}

/// Extract the check UUID from a ping URL.
///
/// The UUID is the last non-empty path segment, so both
/// `https://hc-ping.com/<uuid>` and `https://host/ping/<uuid>/` resolve.
pub fn uuid_from_ping_url(ping_url: &str) -> Result<String> {
    let url = Url::parse(ping_url).wrap_err_with(|| format!("invalid ping_url {ping_url:?}"))?;
    url.path_segments()
        .and_then(|mut segments| segments.rfind(|s| !s.is_empty()))
        .map(str::to_owned)
        .ok_or_else(|| eyre!("ping_url {ping_url:?} does not contain a check uuid"))
}

/// Extract the check UUID from a create or update response body.
pub fn uuid_from_response(body: &Value) -> Result<String> {
    let ping_url = body
        .get("ping_url")
        .and_then(Value::as_str)
        .ok_or_else(|| eyre!("response has no ping_url"))?;
    uuid_from_ping_url(ping_url)
}
