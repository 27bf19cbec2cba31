use std::{net::IpAddr, time::Duration};

use async_trait::async_trait;
use chrono::Utc;
use nettray_types::{config::ProbeConfig, probe::ProbeResult, Result};
use reqwest::redirect::Policy;
use surge_ping::{Client as PingClient, Config as PingConfig, PingIdentifier, PingSequence, ICMP};
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::{probe_error, Probe};

const PING_PAYLOAD: [u8; 56] = [0; 56];

/// ICMP echo first for latency, HTTP HEAD as the fallback reachability signal.
pub struct NetworkProbe {
    icmp_v4: Option<PingClient>,
    icmp_v6: Option<PingClient>,
    http: reqwest::Client,
    // fixed HEAD url; otherwise `https://<target>` per check
    http_url: Option<String>,
    icmp_timeout: Duration,
    http_timeout: Duration,
}

impl NetworkProbe {
    /// Builds the probe. Must be called inside a tokio runtime because the
    /// ICMP sockets register with the reactor.
    ///
    /// Missing raw-socket privileges only disable the ICMP sub-check.
    pub fn new(config: &ProbeConfig) -> Result<Self> {
        let http_timeout = Duration::from_millis(config.http_timeout_ms);
        let http = reqwest::Client::builder()
            .timeout(http_timeout)
            .user_agent(config.user_agent.clone())
            .redirect(Policy::none())
            .build()
            .map_err(|err| probe_error(format!("failed to build HTTP client: {err}")))?;

        let icmp_v4 = open_icmp(PingConfig::default(), "ICMPv4");
        let icmp_v6 = open_icmp(PingConfig::builder().kind(ICMP::V6).build(), "ICMPv6");

        Ok(Self {
            icmp_v4,
            icmp_v6,
            http,
            http_url: config.http_url.clone(),
            icmp_timeout: Duration::from_millis(config.icmp_timeout_ms),
            http_timeout,
        })
    }

    pub fn icmp_enabled(&self) -> bool {
        self.icmp_v4.is_some() || self.icmp_v6.is_some()
    }

    async fn echo(&self, target: &str) -> Option<Duration> {
        match timeout(self.icmp_timeout, self.echo_inner(target)).await {
            Ok(rtt) => rtt,
            Err(_) => {
                debug!("ICMP echo to {} timed out", target);
                None
            }
        }
    }

    async fn echo_inner(&self, target: &str) -> Option<Duration> {
        let ip = match resolve(target).await {
            Ok(ip) => ip,
            Err(err) => {
                debug!("Resolution of {} failed: {}", target, err);
                return None;
            }
        };
        let client = match ip {
            IpAddr::V4(_) => self.icmp_v4.as_ref(),
            IpAddr::V6(_) => self.icmp_v6.as_ref(),
        }?;

        let mut pinger = client.pinger(ip, PingIdentifier(rand::random())).await;
        pinger.timeout(self.icmp_timeout);
        match pinger.ping(PingSequence(0), &PING_PAYLOAD).await {
            Ok((_, rtt)) => Some(rtt),
            Err(err) => {
                debug!("ICMP echo to {} ({}) failed: {}", target, ip, err);
                None
            }
        }
    }

    fn http_url_for(&self, target: &str) -> String {
        self.http_url
            .clone()
            .unwrap_or_else(|| format!("https://{target}"))
    }

    async fn head(&self, target: &str) -> bool {
        let url = self.http_url_for(target);
        let request = self.http.head(&url).send();
        match timeout(self.http_timeout, request).await {
            Ok(Ok(response)) => {
                let status = response.status();
                debug!("HEAD {} answered {}", url, status);
                status.is_success() || status.is_redirection()
            }
            Ok(Err(err)) => {
                debug!("HEAD {} failed: {}", url, err);
                false
            }
            Err(_) => {
                debug!("HEAD {} timed out", url);
                false
            }
        }
    }
}

#[async_trait]
impl Probe for NetworkProbe {
    async fn check(&self, target: &str) -> ProbeResult {
        if self.icmp_enabled() {
            if let Some(rtt) = self.echo(target).await {
                return ProbeResult::reachable(Utc::now(), Some(rtt));
            }
        }

        if self.head(target).await {
            ProbeResult::reachable(Utc::now(), None)
        } else {
            ProbeResult::unreachable(Utc::now())
        }
    }
}

fn open_icmp(config: PingConfig, label: &str) -> Option<PingClient> {
    match PingClient::new(&config) {
        Ok(client) => Some(client),
        Err(err) => {
            warn!(
                "{} socket unavailable ({}); latency will not be measured",
                label, err
            );
            None
        }
    }
}

async fn resolve(host: &str) -> std::io::Result<IpAddr> {
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(ip);
    }
    tokio::net::lookup_host((host, 0))
        .await?
        .next()
        .map(|addr| addr.ip())
        .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, "no address found"))
}
