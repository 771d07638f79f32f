use crate::err::*;
use crate::get_ip::CHECK_IP_URL;
use crate::options::{FailurePolicy, Options};

use serde::Deserialize;
use tracing::Level;

use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::Duration;

const DEFAULT_INTERVAL: u64 = 180;
const DEFAULT_WAIT_TIMEOUT: u64 = 600;

#[derive(Debug, Deserialize)]
struct ConfigFile {
    log_level: Option<String>,
    interval: Option<u64>,
    on_failure: Option<FailurePolicy>,
    wait_timeout: Option<u64>,
    check_ip_url: Option<String>,
    accounts: Vec<Account>,
}

/// One set of AWS credentials and the zones and domains it manages.
#[derive(Clone, Deserialize)]
pub struct Account {
    #[serde(default)]
    pub aws_access_key_id: Option<String>,
    #[serde(default)]
    pub aws_secret_access_key: Option<String>,
    pub zone_ids: Vec<String>,
    pub domain_urls: Vec<String>,
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("aws_access_key_id", &self.aws_access_key_id)
            .field(
                "aws_secret_access_key",
                &self.aws_secret_access_key.as_ref().map(|_| "******"),
            )
            .field("zone_ids", &self.zone_ids)
            .field("domain_urls", &self.domain_urls)
            .finish()
    }
}

impl Account {
    /// Static credentials, if the account carries them.
    pub fn static_keys(&self) -> Option<(&str, &str)> {
        match (&self.aws_access_key_id, &self.aws_secret_access_key) {
            (Some(id), Some(key)) => Some((id, key)),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct Config {
    pub log_level: Level,
    pub check_interval: u64,
    pub on_failure: FailurePolicy,
    pub wait_timeout: Duration,
    pub check_ip_url: String,
    pub accounts: Vec<Account>,
}

/// Maps the recognized level names onto tracing levels. Anything else is
/// treated as `info`.
pub fn parse_log_level(level: &str) -> Level {
    match level.trim().to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warning" | "warn" => Level::WARN,
        "error" | "critical" => Level::ERROR,
        _ => Level::INFO,
    }
}

impl ConfigFile {
    fn from_file<P>(file: P) -> Result<ConfigFile>
    where
        P: AsRef<Path>,
    {
        let file = File::open(file.as_ref()).map_err(|e| {
            AppErr::Config(format!("open {} failed: {}", file.as_ref().display(), e))
        })?;
        let file_reader = BufReader::new(file);

        // YAML is a superset of JSON, so options.json files load as-is.
        let rval = serde_yaml::from_reader(file_reader)?;
        Ok(rval)
    }
}

impl Config {
    pub fn from_options(opts: Options) -> Result<Config> {
        let config = match opts.config_file.clone() {
            Some(path) => {
                let file = ConfigFile::from_file(&path)?;
                let log_level = opts.log_level.as_ref().or(file.log_level.as_ref());

                Config {
                    log_level: log_level.map_or(Level::INFO, |l| parse_log_level(l)),
                    check_interval: opts.interval.or(file.interval).unwrap_or(DEFAULT_INTERVAL),
                    on_failure: opts
                        .on_failure
                        .or(file.on_failure)
                        .unwrap_or(FailurePolicy::Continue),
                    wait_timeout: Duration::from_secs(
                        opts.wait_timeout
                            .or(file.wait_timeout)
                            .unwrap_or(DEFAULT_WAIT_TIMEOUT),
                    ),
                    check_ip_url: file.check_ip_url.unwrap_or_else(|| CHECK_IP_URL.to_string()),
                    accounts: file.accounts,
                }
            }
            None => Self::single_target(opts)?,
        };

        config.validate()?;
        Ok(config)
    }

    fn single_target(opts: Options) -> Result<Config> {
        let missing = |name: &str| AppErr::Config(format!("missing argument <{}>", name));

        let account = Account {
            aws_access_key_id: Some(opts.id.ok_or_else(|| missing("ID"))?),
            aws_secret_access_key: Some(opts.key.ok_or_else(|| missing("KEY"))?),
            zone_ids: vec![opts.zone_id.ok_or_else(|| missing("ZONE_ID"))?],
            domain_urls: vec![opts.domain_url.ok_or_else(|| missing("DOMAIN_URL"))?],
        };

        Ok(Config {
            log_level: opts
                .log_level
                .as_deref()
                .map_or(Level::INFO, parse_log_level),
            check_interval: opts.interval.unwrap_or(DEFAULT_INTERVAL),
            on_failure: opts.on_failure.unwrap_or(FailurePolicy::Exit),
            wait_timeout: Duration::from_secs(opts.wait_timeout.unwrap_or(DEFAULT_WAIT_TIMEOUT)),
            check_ip_url: CHECK_IP_URL.to_string(),
            accounts: vec![account],
        })
    }

    fn validate(&self) -> Result<()> {
        if self.accounts.is_empty() {
            return Err(AppErr::Config("no accounts configured".to_string()));
        }

        for (i, account) in self.accounts.iter().enumerate() {
            if account.zone_ids.is_empty() {
                return Err(AppErr::Config(format!("account[{}] has no zone_ids", i)));
            }
            if account.domain_urls.is_empty() {
                return Err(AppErr::Config(format!("account[{}] has no domain_urls", i)));
            }
            if account.aws_access_key_id.is_some() != account.aws_secret_access_key.is_some() {
                return Err(AppErr::Config(format!(
                    "account[{}] must set aws_access_key_id and aws_secret_access_key together",
                    i
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use clap::Parser;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    fn file_options(file: &NamedTempFile, extra: &[&str]) -> Options {
        let path = file.path().to_str().unwrap();
        let mut args = vec!["r53-syncer", "-c", path];
        args.extend_from_slice(extra);
        Options::try_parse_from(args).unwrap()
    }

    #[test]
    fn log_levels() {
        assert_eq!(parse_log_level("debug"), Level::DEBUG);
        assert_eq!(parse_log_level("WARNING"), Level::WARN);
        assert_eq!(parse_log_level("critical"), Level::ERROR);
        assert_eq!(parse_log_level("verbose"), Level::INFO);
    }

    #[test]
    fn loads_multi_account_json() {
        let file = write_config(
            r#"{
                "log_level": "debug",
                "interval": 60,
                "accounts": [
                    {
                        "aws_access_key_id": "AKID",
                        "aws_secret_access_key": "SECRET",
                        "zone_ids": ["Z1", "Z2"],
                        "domain_urls": ["a.example.com", "b.example.com"]
                    }
                ]
            }"#,
        );

        let config = Config::from_options(file_options(&file, &[])).unwrap();

        assert_eq!(config.log_level, Level::DEBUG);
        assert_eq!(config.check_interval, 60);
        assert_eq!(config.on_failure, FailurePolicy::Continue);
        assert_eq!(config.wait_timeout, Duration::from_secs(DEFAULT_WAIT_TIMEOUT));
        assert_eq!(config.check_ip_url, CHECK_IP_URL);
        assert_eq!(config.accounts[0].zone_ids, vec!["Z1", "Z2"]);
        assert_eq!(config.accounts[0].static_keys(), Some(("AKID", "SECRET")));
    }

    #[test]
    fn loads_yaml_and_applies_cli_overrides() {
        let file = write_config(
            "log_level: error\n\
             on_failure: continue\n\
             accounts:\n  \
               - zone_ids: [Z1]\n    \
                 domain_urls: [a.example.com]\n",
        );

        let config = Config::from_options(file_options(
            &file,
            &["--log-level", "info", "--on-failure", "exit", "--interval", "0"],
        ))
        .unwrap();

        assert_eq!(config.log_level, Level::INFO);
        assert_eq!(config.on_failure, FailurePolicy::Exit);
        assert_eq!(config.check_interval, 0);
        assert!(config.accounts[0].static_keys().is_none());
    }

    #[test]
    fn single_target_defaults() {
        let opts =
            Options::try_parse_from(["r53-syncer", "AKID", "SECRET", "Z1", "a.example.com"])
                .unwrap();
        let config = Config::from_options(opts).unwrap();

        assert_eq!(config.check_interval, DEFAULT_INTERVAL);
        assert_eq!(config.log_level, Level::INFO);
        assert_eq!(config.on_failure, FailurePolicy::Exit);
        assert_eq!(config.accounts.len(), 1);
        assert_eq!(config.accounts[0].domain_urls, vec!["a.example.com"]);
    }

    #[test]
    fn rejects_half_credentials() {
        let file = write_config(
            r#"{"accounts": [{"aws_access_key_id": "AKID", "zone_ids": ["Z1"], "domain_urls": ["a.example.com"]}]}"#,
        );

        let err = Config::from_options(file_options(&file, &[])).unwrap_err();
        assert!(matches!(err, AppErr::Config(_)));
    }

    #[test]
    fn rejects_empty_accounts() {
        let file = write_config(r#"{"accounts": []}"#);
        assert!(Config::from_options(file_options(&file, &[])).is_err());
    }

    #[test]
    fn missing_file_is_config_error() {
        let opts = Options::try_parse_from(["r53-syncer", "-c", "/nonexistent/options.json"])
            .unwrap();
        assert!(matches!(
            Config::from_options(opts).unwrap_err(),
            AppErr::Config(_)
        ));
    }

    #[test]
    fn secret_is_not_printed() {
        let account = Account {
            aws_access_key_id: Some("AKID".to_string()),
            aws_secret_access_key: Some("SECRET".to_string()),
            zone_ids: vec![],
            domain_urls: vec![],
        };
        assert!(!format!("{:?}", account).contains("SECRET"));
    }
}
