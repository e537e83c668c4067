//! Healthchecks checks configuration
use std::{fmt, fs, ops::RangeInclusive, path::PathBuf};

use clap::{Parser, ValueEnum};
use eyre::{Result, WrapErr, bail, eyre};
use serde::{Deserialize, Serialize};
use url::Url;

/// Default Healthchecks.io management API base URL.
pub const DEFAULT_API_URL: &str = "https://healthchecks.io/api/v1/";

/// Environment variables searched, in order, for the API token.
pub const TOKEN_ENV_VARS: [&str; 4] =
    ["HEALTHCHECKSIO_API_TOKEN", "HEALTHCHECKSIO_API_KEY", "HC_API_TOKEN", "HC_API_KEY"];

/// Accepted range, in seconds, for a check's timeout and grace period.
pub const PERIOD_RANGE: RangeInclusive<u32> = 60..=2_592_000;

/// Default expected period of a check: one day.
pub const DEFAULT_TIMEOUT_SECS: u32 = 86_400;
/// Default grace period of a check: one hour.
pub const DEFAULT_GRACE_SECS: u32 = 3_600;
/// Default cron expression.
pub const DEFAULT_SCHEDULE: &str = "* * * * *";
/// Default timezone for cron schedules.
pub const DEFAULT_TZ: &str = "UTC";

/// Desired lifecycle state of a check.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum State {
    /// Create the check, or update it when the `unique` fields match an existing one.
    #[default]
    Present,
    /// Delete the check.
    Absent,
    /// Pause the check.
    Pause,
}

impl State {
    /// Lowercase name as accepted on the command line.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Present => "present",
            Self::Absent => "absent",
            Self::Pause => "pause",
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fields the server may match on to turn a create into an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UniqueField {
    /// Match on the check name
    Name,
    /// Match on the tag string
    Tags,
    /// Match on the timeout
    Timeout,
    /// Match on the grace period
    Grace,
}

/// Healthchecks.io API connection options
#[derive(Debug, Clone, Parser)]
pub struct ApiOpts {
    /// Healthchecks.io API token
    #[clap(long, env = "HEALTHCHECKSIO_API_TOKEN", hide_env_values = true)]
    pub api_token: Option<String>,
    /// Management API base URL, override for self-hosted instances
    #[clap(long, env = "HEALTHCHECKSIO_API_URL", default_value = DEFAULT_API_URL)]
    pub api_url: Url,
    /// Request timeout in seconds
    #[clap(long, env = "HEALTHCHECKSIO_TIMEOUT_SECS", default_value = "30")]
    pub timeout_secs: u64,
}

/// Attributes of a check sent on create or update.
#[derive(Debug, Clone, PartialEq, Eq, Parser, Deserialize)]
#[serde(default)]
pub struct CheckOpts {
    /// Name for the check
    #[clap(long, default_value_t)]
    pub name: String,
    /// Description of the check
    #[clap(long, default_value_t)]
    pub desc: String,
    /// Tags for the check, comma separated
    #[clap(long, value_delimiter = ',')]
    pub tags: Vec<String>,
    /// Expected period of the check in seconds (60 to 2592000)
    #[clap(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout: u32,
    /// Grace period of the check in seconds (60 to 2592000)
    #[clap(long, default_value_t = DEFAULT_GRACE_SECS)]
    pub grace: u32,
    /// Cron expression for the check's schedule; the server ignores `timeout` when both are set
    #[clap(long, default_value = DEFAULT_SCHEDULE)]
    pub schedule: String,
    /// Timezone for the cron schedule
    #[clap(long, default_value = DEFAULT_TZ)]
    pub tz: String,
    /// Keep a paused check paused when pinged, until resumed from the dashboard
    #[clap(long)]
    pub manual_resume: bool,
    /// Allowed ping methods: empty for HEAD, GET and POST, or "POST" for POST only
    #[clap(long, default_value_t)]
    pub methods: String,
    /// Integrations to assign: empty for none, "*" for all, or comma separated UUIDs
    #[clap(long, default_value_t)]
    pub channels: String,
    /// Fields used to find an existing check to update instead of creating one
    #[clap(long, value_enum, value_delimiter = ',')]
    pub unique: Vec<UniqueField>,
}

impl Default for CheckOpts {
    fn default() -> Self {
        Self {
            name: String::new(),
            desc: String::new(),
            tags: Vec::new(),
            timeout: DEFAULT_TIMEOUT_SECS,
            grace: DEFAULT_GRACE_SECS,
            schedule: DEFAULT_SCHEDULE.to_owned(),
            tz: DEFAULT_TZ.to_owned(),
            manual_resume: false,
            methods: String::new(),
            channels: String::new(),
            unique: Vec::new(),
        }
    }
}

impl CheckOpts {
    /// Reject values the API would refuse, before any request is made.
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [("timeout", self.timeout), ("grace", self.grace)] {
            if !PERIOD_RANGE.contains(&value) {
                bail!(
                    "{field} must be between {} and {} seconds, got {value}",
                    PERIOD_RANGE.start(),
                    PERIOD_RANGE.end()
                );
            }
        }
        if !matches!(self.methods.as_str(), "" | "POST") {
            bail!("methods must be \"\" or \"POST\", got {:?}", self.methods);
        }
        Ok(())
    }
}

/// The parameter bag of a single invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Parser, Deserialize)]
#[serde(default)]
pub struct ModuleArgs {
    /// Desired state of the check
    #[clap(long, value_enum, default_value_t = State::Present)]
    pub state: State,
    /// Check UUID, required when state is absent or pause
    #[clap(long)]
    pub uuid: Option<String>,
    /// Report what would happen without calling the API
    #[clap(long = "check")]
    pub check_mode: bool,
    /// Check attributes
    #[clap(flatten)]
    #[serde(flatten)]
    pub check: CheckOpts,
}

impl ModuleArgs {
    /// The check UUID, treating an empty string as absent.
    pub fn uuid(&self) -> Option<&str> {
        self.uuid.as_deref().filter(|uuid| !uuid.is_empty())
    }
}

/// JSON form of the parameter bag, as written by a runner.
#[derive(Debug, Deserialize)]
struct ArgsFile {
    #[serde(default, alias = "api_key")]
    api_token: Option<String>,
    #[serde(flatten)]
    args: ModuleArgs,
}

fn parse_args_file(raw: &str) -> Result<ArgsFile> {
    Ok(serde_json::from_str(raw)?)
}

/// A fully resolved invocation: parameters plus the token to authenticate with.
#[derive(Clone)]
pub struct Invocation {
    /// Healthchecks.io API token
    pub api_token: String,
    /// Parameters of the invocation
    pub args: ModuleArgs,
}

impl fmt::Debug for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invocation")
            .field("api_token", &"<redacted>")
            .field("args", &self.args)
            .finish()
    }
}

/// CLI options for hc-checks
#[derive(Debug, Clone, Parser)]
#[clap(version, about = "Create, update, delete or pause Healthchecks.io checks")]
pub struct Opts {
    /// API connection configuration
    #[clap(flatten)]
    pub api: ApiOpts,

    /// Parameters given as flags
    #[clap(flatten)]
    pub args: ModuleArgs,

    /// Read the parameters from a JSON file instead of flags
    #[clap(long, env = "HC_ARGS_FILE")]
    pub args_file: Option<PathBuf>,
}

impl Opts {
    /// Resolve the parameter bag and API token.
    ///
    /// With `--args-file` the file replaces every check flag, and a token in
    /// the file wins over the flag and environment.
    pub fn resolve(&self) -> Result<Invocation> {
        let (file_token, args) = match &self.args_file {
            Some(path) => {
                let raw = fs::read_to_string(path)
                    .wrap_err_with(|| format!("failed to read {}", path.display()))?;
                let file = parse_args_file(&raw)
                    .wrap_err_with(|| format!("invalid parameters in {}", path.display()))?;
                (file.api_token, file.args)
            }
            None => (None, self.args.clone()),
        };

        let api_token = non_empty(file_token)
            .or_else(|| non_empty(self.api.api_token.clone()))
            .or_else(token_from_env)
            .ok_or_else(|| {
                eyre!(
                    "missing API token: pass --api-token or set one of {}",
                    TOKEN_ENV_VARS.join(", ")
                )
            })?;

        Ok(Invocation { api_token, args })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn token_from_env() -> Option<String> {
    TOKEN_ENV_VARS.iter().find_map(|var| non_empty(std::env::var(var).ok()))
}
