use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppErr>;

#[derive(Debug, Error)]
pub enum AppErr {
    /// The request never produced a usable HTTP response.
    #[error("transport error: {0}")]
    Transport(String),

    /// The provider answered, but not with a success status.
    #[error("provider returned status {status}: {msg}")]
    ProviderStatus { status: u16, msg: String },

    #[error("hosted zone not found: {0}")]
    ZoneNotFound(String),

    #[error("could not find an A record for {0} in any configured zone")]
    RecordNotFound(String),

    #[error("record value mismatch for {domain}: {resolved} not in {values:?}")]
    ValueMismatch {
        domain: String,
        resolved: String,
        values: Vec<String>,
    },

    #[error("change {id} failed: {reason}")]
    ChangeFailed { id: String, reason: String },

    #[error("change {id} not in sync after {secs}s")]
    ChangeTimeout { id: String, secs: u64 },

    #[error("cannot resolve {domain}: {msg}")]
    Resolve { domain: String, msg: String },

    #[error("invalid ip address {0:?}")]
    InvalidIp(String),

    #[error("config: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for AppErr {
    fn from(value: reqwest::Error) -> Self {
        match value.status() {
            Some(status) => Self::ProviderStatus {
                status: status.as_u16(),
                msg: value.to_string(),
            },
            None => Self::Transport(value.to_string()),
        }
    }
}

impl From<std::net::AddrParseError> for AppErr {
    fn from(value: std::net::AddrParseError) -> Self {
        Self::InvalidIp(value.to_string())
    }
}

impl From<serde_json::Error> for AppErr {
    fn from(value: serde_json::Error) -> Self {
        Self::Config(format!("[serde json]: {}", value))
    }
}

impl From<serde_yaml::Error> for AppErr {
    fn from(value: serde_yaml::Error) -> Self {
        Self::Config(format!("[serde yaml]: {}", value))
    }
}

impl From<aws_sdk_route53::error::BuildError> for AppErr {
    fn from(value: aws_sdk_route53::error::BuildError) -> Self {
        Self::Config(format!("[route53 request]: {}", value))
    }
}
