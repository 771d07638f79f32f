use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use serde::Deserialize;

/// What to do when locating or updating a record fails.
#[derive(ValueEnum, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Log the failure and retry on the next tick.
    Continue,
    /// Log the failure and terminate the process.
    Exit,
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Keep Route 53 A records pointed at this host's public IP", long_about = None)]
pub struct Options {
    /// JSON or YAML file describing one or more accounts
    #[arg(short, long, conflicts_with_all = ["id", "key", "zone_id", "domain_url"])]
    pub config_file: Option<PathBuf>,

    /// AWS access key id
    #[arg(required_unless_present = "config_file")]
    pub id: Option<String>,

    /// AWS secret access key
    #[arg(required_unless_present = "config_file")]
    pub key: Option<String>,

    /// Hosted zone holding the record
    #[arg(required_unless_present = "config_file")]
    pub zone_id: Option<String>,

    /// Domain whose A record is kept up to date
    #[arg(required_unless_present = "config_file")]
    pub domain_url: Option<String>,

    /// Seconds between checks, 0 checks once and exits
    #[arg(short, long)]
    pub interval: Option<u64>,

    /// debug, info, warning, error or critical
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// continue or exit when an update fails
    #[arg(long, value_enum)]
    pub on_failure: Option<FailurePolicy>,

    /// Seconds to wait for a change to reach INSYNC
    #[arg(long)]
    pub wait_timeout: Option<u64>,
}
