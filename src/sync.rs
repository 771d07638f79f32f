use crate::backends::{find_a_record, ChangeHandle, DnsControlPlane, RecordSet};
use crate::config::Account;
use crate::err::*;
use crate::get_ip::IpOracle;
use crate::options::FailurePolicy;
use crate::resolve::Resolve;

use std::fmt;
use std::future::Future;
use std::net::IpAddr;
use std::time::Duration;

use tracing::{debug, error, info, warn};

/// An account together with the control-plane client built for it.
pub struct Managed<B> {
    pub account: Account,
    pub backend: B,
}

/// The (account, domain) pair a single check works on.
#[derive(Debug, Clone, Copy)]
pub struct Target<'a> {
    pub account: &'a Account,
    pub domain: &'a str,
}

#[derive(Debug)]
enum Outcome {
    UpToDate,
    Skipped,
    Submitted(ChangeHandle),
}

/// Counters for one pass over every configured domain.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    pub up_to_date: usize,
    pub skipped: usize,
    pub failed: usize,
    pub submitted: usize,
    pub confirmed: usize,
    pub timed_out: usize,
}

impl fmt::Display for TickReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} up to date, {} skipped, {} submitted, {} confirmed, {} timed out, {} failed",
            self.up_to_date,
            self.skipped,
            self.submitted,
            self.confirmed,
            self.timed_out,
            self.failed
        )
    }
}

pub struct Syncer<B, O, R> {
    accounts: Vec<Managed<B>>,
    oracle: O,
    resolver: R,
    on_failure: FailurePolicy,
    wait_timeout: Duration,
}

fn change_table(current: &RecordSet, proposed: &RecordSet) -> Result<String> {
    use tabled::{
        builder::Builder,
        settings::{object::Rows, Alignment, Modify},
    };

    let current_json = serde_json::to_string_pretty(current)?;
    let proposed_json = serde_json::to_string_pretty(proposed)?;

    let mut builder = Builder::default();
    builder.push_record(vec!["Current A Record", "Upsert"]);
    builder.push_record(vec![&current_json, &proposed_json]);
    let mut table = builder.build();
    table.with(Modify::new(Rows::first()).with(Alignment::center()));

    Ok(table.to_string())
}

impl<B, O, R> Syncer<B, O, R>
where
    B: DnsControlPlane,
    O: IpOracle,
    R: Resolve,
{
    pub fn new(
        accounts: Vec<Managed<B>>,
        oracle: O,
        resolver: R,
        on_failure: FailurePolicy,
        wait_timeout: Duration,
    ) -> Self {
        Self {
            accounts,
            oracle,
            resolver,
            on_failure,
            wait_timeout,
        }
    }

    /// Runs a check every `pause` until `shutdown` resolves. Shutdown is
    /// honoured in the middle of a check as well as between checks.
    pub async fn run_until<F>(&self, pause: Duration, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            let report = tokio::select! {
                report = self.run_once() => report?,
                _ = &mut shutdown => {
                    info!("Shutting down in the middle of a check");
                    return Ok(());
                }
            };
            info!("Tick done: {}", report);

            tokio::select! {
                _ = &mut shutdown => return Ok(()),
                _ = tokio::time::sleep(pause) => {},
            };
        }
    }

    /// Checks every domain of every account once, then waits for the
    /// changes submitted along the way.
    ///
    /// Under the exit policy the first update failure stops further
    /// submissions, but changes already submitted are still awaited before
    /// the failure is returned.
    pub async fn run_once(&self) -> Result<TickReport> {
        let mut report = TickReport::default();
        let mut pending: Vec<(&B, ChangeHandle)> = Vec::new();
        let mut fatal: Option<AppErr> = None;

        'accounts: for managed in self.accounts.iter() {
            for domain in managed.account.domain_urls.iter() {
                let target = Target {
                    account: &managed.account,
                    domain,
                };

                match self.check_target(&managed.backend, target).await {
                    Ok(Outcome::UpToDate) => report.up_to_date += 1,
                    Ok(Outcome::Skipped) => report.skipped += 1,
                    Ok(Outcome::Submitted(handle)) => {
                        report.submitted += 1;
                        pending.push((&managed.backend, handle));
                    }
                    Err(e) => {
                        report.failed += 1;
                        self.on_update_failure(domain, e, &mut fatal);
                        if fatal.is_some() {
                            break 'accounts;
                        }
                    }
                }
            }
        }

        self.wait_for_results(pending, &mut report, &mut fatal).await;

        match fatal {
            Some(e) => Err(e),
            None => Ok(report),
        }
    }

    fn on_update_failure(&self, domain: &str, e: AppErr, fatal: &mut Option<AppErr>) {
        error!("Record update failed for {}: {}", domain, e);
        if self.on_failure == FailurePolicy::Exit && fatal.is_none() {
            *fatal = Some(e);
        }
    }

    async fn wait_for_results(
        &self,
        pending: Vec<(&B, ChangeHandle)>,
        report: &mut TickReport,
        fatal: &mut Option<AppErr>,
    ) {
        for (backend, handle) in pending.into_iter() {
            info!(
                "Waiting on status update for {} in zone {} ...",
                handle.domain, handle.zone_id
            );
            match backend.await_change(&handle, self.wait_timeout).await {
                Ok(()) => {
                    report.confirmed += 1;
                    info!("Record update successful for {}", handle.domain);
                }
                // Outcome unknown; the next tick compares again.
                Err(e @ AppErr::ChangeTimeout { .. }) => {
                    report.timed_out += 1;
                    warn!("Giving up waiting on {}: {}", handle.domain, e);
                }
                Err(e) => {
                    report.failed += 1;
                    self.on_update_failure(&handle.domain, e, fatal);
                }
            }
        }
    }

    async fn check_target(&self, backend: &B, target: Target<'_>) -> Result<Outcome> {
        debug!("Validating DNS record for {}", target.domain);

        let resolved = match self.resolver.resolve(target.domain).await {
            Ok(ip) => ip,
            Err(e) => {
                error!("Error resolving hostname: {}", e);
                return Ok(Outcome::Skipped);
            }
        };

        let public = match self.oracle.fetch_public_ip().await {
            Ok(ip) if ip.is_ipv4() => ip,
            Ok(ip) => {
                warn!(
                    "Public ip {} is not IPv4, cannot go in an A record, skipping {}",
                    ip, target.domain
                );
                return Ok(Outcome::Skipped);
            }
            Err(e) => {
                warn!("Cannot get public ip, skipping {}: {}", target.domain, e);
                return Ok(Outcome::Skipped);
            }
        };

        debug!("IP Address={}; A-Record={}", public, resolved);
        if public == resolved {
            debug!("DNS record for {} is up to date", target.domain);
            return Ok(Outcome::UpToDate);
        }

        info!("External IP address has changed to: {}", public);
        let handle = self.change_record(backend, target, resolved, public).await?;
        Ok(Outcome::Submitted(handle))
    }

    /// Probes the account's zones in order and stops at the first one
    /// holding an A record for the domain.
    async fn locate_record(
        &self,
        backend: &B,
        target: Target<'_>,
    ) -> Result<(String, RecordSet)> {
        for zone_id in target.account.zone_ids.iter() {
            let records = match backend.list_records(zone_id).await {
                Ok(records) => records,
                Err(e) => {
                    error!("Listing zone {} failed: {}", zone_id, e);
                    continue;
                }
            };

            match find_a_record(&records, target.domain) {
                Some(record) => return Ok((zone_id.clone(), record.clone())),
                None => info!(
                    "No A record for {} in zone {}",
                    target.domain, zone_id
                ),
            }
        }

        Err(AppErr::RecordNotFound(target.domain.to_owned()))
    }

    async fn change_record(
        &self,
        backend: &B,
        target: Target<'_>,
        resolved: IpAddr,
        public: IpAddr,
    ) -> Result<ChangeHandle> {
        info!("Updating DNS record for: {}", target.domain);

        let (zone_id, record) = self.locate_record(backend, target).await?;
        info!("Current A record values: {:?}", record.values);

        let resolved = resolved.to_string();
        if !record.values.contains(&resolved) {
            return Err(AppErr::ValueMismatch {
                domain: target.domain.to_owned(),
                resolved,
                values: record.values,
            });
        }

        let new_value = public.to_string();
        let proposed = RecordSet {
            name: target.domain.to_owned(),
            record_type: "A".to_owned(),
            ttl: record.ttl,
            values: vec![new_value.clone()],
        };
        info!("\n{}", change_table(&record, &proposed)?);

        backend
            .upsert_a_record(&zone_id, target.domain, record.ttl, &new_value)
            .await
    }
}
