mod route53;
pub use route53::*;

use crate::err::*;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, warn};

use std::time::Duration;

pub const CHANGE_POLL_DELAY: Duration = Duration::from_secs(10);

/// A provider-side record set, reduced to what the syncer looks at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordSet {
    pub name: String,
    #[serde(rename = "type")]
    pub record_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl: Option<i64>,
    pub values: Vec<String>,
}

/// A submitted change that has not been confirmed yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeHandle {
    pub id: String,
    pub zone_id: String,
    pub domain: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeStatus {
    Pending,
    InSync,
    Other(String),
}

fn same_name(a: &str, b: &str) -> bool {
    a.trim_end_matches('.') == b.trim_end_matches('.')
}

/// First A record named `domain`, with or without the root dot.
///
/// Relies on the order the provider returned the records in. Route 53 sorts
/// its listings, but makes no promise about it.
pub fn find_a_record<'a>(records: &'a [RecordSet], domain: &str) -> Option<&'a RecordSet> {
    records
        .iter()
        .find(|r| r.record_type == "A" && same_name(&r.name, domain))
}

#[async_trait]
pub trait DnsControlPlane: Send + Sync {
    async fn list_records(&self, zone_id: &str) -> Result<Vec<RecordSet>>;

    async fn upsert_a_record(
        &self,
        zone_id: &str,
        domain: &str,
        ttl: Option<i64>,
        new_value: &str,
    ) -> Result<ChangeHandle>;

    async fn change_status(&self, change_id: &str) -> Result<ChangeStatus>;

    fn poll_delay(&self) -> Duration {
        CHANGE_POLL_DELAY
    }

    /// Polls the change until the provider reports it in sync, giving up
    /// after `timeout`.
    async fn await_change(&self, handle: &ChangeHandle, timeout: Duration) -> Result<()> {
        let poll = async {
            loop {
                match self.change_status(&handle.id).await {
                    Ok(ChangeStatus::InSync) => return Ok(()),
                    Ok(ChangeStatus::Pending) => {
                        debug!("change {} for {} still pending", handle.id, handle.domain);
                        tokio::time::sleep(self.poll_delay()).await;
                    }
                    // The change may still propagate; ask again until the timeout.
                    Err(e @ (AppErr::Transport(_) | AppErr::ProviderStatus { .. })) => {
                        warn!("polling change {} for {} failed: {}", handle.id, handle.domain, e);
                        tokio::time::sleep(self.poll_delay()).await;
                    }
                    Err(e) => return Err(e),
                    Ok(ChangeStatus::Other(status)) => {
                        return Err(AppErr::ChangeFailed {
                            id: handle.id.clone(),
                            reason: format!("unexpected status {}", status),
                        })
                    }
                }
            }
        };

        match tokio::time::timeout(timeout, poll).await {
            Ok(rval) => rval,
            Err(_) => Err(AppErr::ChangeTimeout {
                id: handle.id.clone(),
                secs: timeout.as_secs(),
            }),
        }
    }
}

#[derive(Debug)]
pub enum Backend {
    Route53(Route53),
}

#[async_trait]
impl DnsControlPlane for Backend {
    async fn list_records(&self, zone_id: &str) -> Result<Vec<RecordSet>> {
        match self {
            Backend::Route53(r53) => r53.list_records(zone_id).await,
        }
    }

    async fn upsert_a_record(
        &self,
        zone_id: &str,
        domain: &str,
        ttl: Option<i64>,
        new_value: &str,
    ) -> Result<ChangeHandle> {
        match self {
            Backend::Route53(r53) => r53.upsert_a_record(zone_id, domain, ttl, new_value).await,
        }
    }

    async fn change_status(&self, change_id: &str) -> Result<ChangeStatus> {
        match self {
            Backend::Route53(r53) => r53.change_status(change_id).await,
        }
    }
}
