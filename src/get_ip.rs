use std::net::IpAddr;
use std::time::Duration;

use crate::err::*;

use async_trait::async_trait;
use tracing::debug;

pub const CHECK_IP_URL: &str = "https://checkip.amazonaws.com";

/// Reports the public address this host is seen from.
#[async_trait]
pub trait IpOracle: Send + Sync {
    async fn fetch_public_ip(&self) -> Result<IpAddr>;
}

/// Asks a "what is my IP" endpoint that answers with a bare address.
pub struct HttpOracle {
    client: reqwest::Client,
    url: String,
}

impl HttpOracle {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl IpOracle for HttpOracle {
    async fn fetch_public_ip(&self) -> Result<IpAddr> {
        let resp = self.client.get(&self.url).send().await?;

        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            return Err(AppErr::Transport(format!(
                "Request ip address failed ({}): {}",
                status,
                body.trim()
            )));
        }

        let ip = body.trim();
        debug!("{} answered {:?}", self.url, ip);

        ip.parse::<IpAddr>()
            .map_err(|_| AppErr::InvalidIp(ip.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn oracle_answering(template: ResponseTemplate) -> (MockServer, HttpOracle) {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(template)
            .mount(&server)
            .await;

        let oracle = HttpOracle::new(server.uri()).unwrap();
        (server, oracle)
    }

    #[tokio::test]
    async fn trims_body() {
        let (_server, oracle) =
            oracle_answering(ResponseTemplate::new(200).set_body_string("5.6.7.8\n")).await;

        let ip = oracle.fetch_public_ip().await.unwrap();
        assert_eq!(ip, "5.6.7.8".parse::<IpAddr>().unwrap());
    }

    #[tokio::test]
    async fn accepts_ipv6() {
        let (_server, oracle) =
            oracle_answering(ResponseTemplate::new(200).set_body_string("2001:db8::1\n")).await;

        assert!(oracle.fetch_public_ip().await.unwrap().is_ipv6());
    }

    #[tokio::test]
    async fn non_2xx_is_transport_error() {
        let (_server, oracle) =
            oracle_answering(ResponseTemplate::new(503).set_body_string("busy")).await;

        let err = oracle.fetch_public_ip().await.unwrap_err();
        assert!(matches!(err, AppErr::Transport(_)), "{:?}", err);
    }

    #[tokio::test]
    async fn garbage_body_is_rejected() {
        let (_server, oracle) =
            oracle_answering(ResponseTemplate::new(200).set_body_string("<html>")).await;

        let err = oracle.fetch_public_ip().await.unwrap_err();
        assert!(matches!(err, AppErr::InvalidIp(_)), "{:?}", err);
    }
}
