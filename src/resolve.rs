use std::net::IpAddr;

use crate::err::*;

use async_trait::async_trait;

/// Looks up the address currently published for a name.
#[async_trait]
pub trait Resolve: Send + Sync {
    async fn resolve(&self, domain: &str) -> Result<IpAddr>;
}

/// The operating system's resolver. IPv4 answers win over IPv6 ones, which
/// is what a plain `gethostbyname` would hand back.
pub struct SystemResolver;

#[async_trait]
impl Resolve for SystemResolver {
    async fn resolve(&self, domain: &str) -> Result<IpAddr> {
        let host = domain.trim_end_matches('.');
        let err = |msg: String| AppErr::Resolve {
            domain: domain.to_owned(),
            msg,
        };

        let addrs: Vec<IpAddr> = tokio::net::lookup_host((host, 0))
            .await
            .map_err(|e| err(e.to_string()))?
            .map(|sa| sa.ip())
            .collect();

        addrs
            .iter()
            .find(|ip| ip.is_ipv4())
            .or_else(|| addrs.first())
            .copied()
            .ok_or_else(|| err("no addresses".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolves_localhost() {
        let ip = SystemResolver.resolve("localhost").await.unwrap();
        assert!(ip.is_loopback());
    }

    #[tokio::test]
    async fn ip_literal_resolves_to_itself() {
        let ip = SystemResolver.resolve("127.0.0.1").await.unwrap();
        assert_eq!(ip, "127.0.0.1".parse::<IpAddr>().unwrap());
    }

    #[tokio::test]
    async fn unknown_name_is_resolve_error() {
        let err = SystemResolver
            .resolve("does-not-exist.invalid")
            .await
            .unwrap_err();
        assert!(matches!(err, AppErr::Resolve { .. }));
    }
}
