mod sdk_err;

use super::{ChangeHandle, ChangeStatus, DnsControlPlane, RecordSet};
use crate::config::Account;
use crate::err::*;
use sdk_err::*;

use async_trait::async_trait;
use aws_sdk_route53::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_route53::types::{
    Change, ChangeAction, ChangeBatch, ChangeInfo, ChangeStatus as SdkChangeStatus,
    ResourceRecord, ResourceRecordSet, RrType,
};
use aws_sdk_route53::Client;
use tracing::{debug, info};

use std::fmt;

// Route 53 is a global service served out of us-east-1.
const ROUTE53_REGION: &str = "us-east-1";

pub struct Route53 {
    client: Client,
    key_id: String,
}

impl fmt::Debug for Route53 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route53")
            .field("key_id", &self.key_id)
            .finish()
    }
}

fn record_from_sdk(rrs: &ResourceRecordSet) -> RecordSet {
    RecordSet {
        name: rrs.name().to_owned(),
        record_type: rrs.r#type().as_str().to_owned(),
        ttl: rrs.ttl(),
        values: rrs
            .resource_records()
            .iter()
            .map(|rr| rr.value().to_owned())
            .collect(),
    }
}

fn status_from_sdk(info: &ChangeInfo) -> ChangeStatus {
    match info.status() {
        SdkChangeStatus::Insync => ChangeStatus::InSync,
        SdkChangeStatus::Pending => ChangeStatus::Pending,
        other => ChangeStatus::Other(other.as_str().to_owned()),
    }
}

impl Route53 {
    /// Builds the client for one account. Accounts without static keys use
    /// the default AWS credential chain (environment, profile, instance role).
    pub async fn from_account(account: &Account) -> Self {
        let region = Region::from_static(ROUTE53_REGION);

        match account.static_keys() {
            Some((id, secret)) => {
                let creds = Credentials::new(id, secret, None, None, "r53-syncer");
                let conf = aws_sdk_route53::Config::builder()
                    .behavior_version(BehaviorVersion::latest())
                    .region(region)
                    .credentials_provider(creds)
                    .build();

                Self {
                    client: Client::from_conf(conf),
                    key_id: id.to_owned(),
                }
            }
            None => {
                let shared = aws_config::defaults(BehaviorVersion::latest())
                    .region(region)
                    .load()
                    .await;

                Self {
                    client: Client::new(&shared),
                    key_id: "<default chain>".to_owned(),
                }
            }
        }
    }
}

#[async_trait]
impl DnsControlPlane for Route53 {
    async fn list_records(&self, zone_id: &str) -> Result<Vec<RecordSet>> {
        let mut records = Vec::new();
        let mut start: Option<(String, RrType, Option<String>)> = None;

        loop {
            let mut req = self
                .client
                .list_resource_record_sets()
                .hosted_zone_id(zone_id);
            if let Some((name, rr_type, identifier)) = start.take() {
                req = req
                    .start_record_name(name)
                    .start_record_type(rr_type)
                    .set_start_record_identifier(identifier);
            }

            let resp = req.send().await.map_err(|e| {
                if e
                    .as_service_error()
                    .map_or(false, |se| se.is_no_such_hosted_zone())
                {
                    AppErr::ZoneNotFound(zone_id.to_owned())
                } else {
                    from_sdk_err(e, "ListResourceRecordSets")
                }
            })?;
            debug!("ListResourceRecordSets({}): {:?}", zone_id, resp);

            records.extend(resp.resource_record_sets().iter().map(record_from_sdk));

            if !resp.is_truncated() {
                break;
            }
            match (resp.next_record_name(), resp.next_record_type()) {
                (Some(name), Some(rr_type)) => {
                    start = Some((
                        name.to_owned(),
                        rr_type.clone(),
                        resp.next_record_identifier().map(str::to_owned),
                    ))
                }
                _ => break,
            }
        }

        Ok(records)
    }

    async fn upsert_a_record(
        &self,
        zone_id: &str,
        domain: &str,
        ttl: Option<i64>,
        new_value: &str,
    ) -> Result<ChangeHandle> {
        let record_set = ResourceRecordSet::builder()
            .name(domain)
            .r#type(RrType::A)
            .set_ttl(ttl)
            .resource_records(ResourceRecord::builder().value(new_value).build()?)
            .build()?;

        let batch = ChangeBatch::builder()
            .changes(
                Change::builder()
                    .action(ChangeAction::Upsert)
                    .resource_record_set(record_set)
                    .build()?,
            )
            .build()?;

        let resp = self
            .client
            .change_resource_record_sets()
            .hosted_zone_id(zone_id)
            .change_batch(batch)
            .send()
            .await
            .map_err(|e| from_sdk_err(e, "ChangeResourceRecordSets"))?;
        debug!("ChangeResourceRecordSets({}): {:?}", zone_id, resp);

        let change = resp.change_info().ok_or_else(|| {
            missing_change_info("ChangeResourceRecordSets")
        })?;
        info!(
            "Changed A record: Name={}, Values=[{}], Change={}",
            domain,
            new_value,
            change.id()
        );

        Ok(ChangeHandle {
            id: change.id().to_owned(),
            zone_id: zone_id.to_owned(),
            domain: domain.to_owned(),
        })
    }

    async fn change_status(&self, change_id: &str) -> Result<ChangeStatus> {
        let resp = self
            .client
            .get_change()
            .id(change_id)
            .send()
            .await
            .map_err(|e| from_sdk_err(e, "GetChange"))?;

        let change = resp
            .change_info()
            .ok_or_else(|| missing_change_info("GetChange"))?;
        Ok(status_from_sdk(change))
    }
}
