use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::{NetTrayError, Result};

pub const DEFAULT_TARGET_HOST: &str = "www.youtube.com";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    pub target_host: String,
    pub icmp_timeout_ms: u64,
    pub http_timeout_ms: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Overrides the HEAD target, which is otherwise `https://<probed host>`.
    #[serde(default)]
    pub http_url: Option<String>,
}

fn default_user_agent() -> String {
    "Mozilla/5.0".into()
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            target_host: DEFAULT_TARGET_HOST.into(),
            icmp_timeout_ms: 2_000,
            http_timeout_ms: 4_000,
            user_agent: default_user_agent(),
            http_url: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    pub poll_interval_ms: u64,
    pub shutdown_grace_ms: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 2_000,
            shutdown_grace_ms: 1_000,
        }
    }
}

/// Canvas the chart pipeline maps latencies into.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChartConfig {
    pub width: f64,
    pub height: f64,
    pub margin_top: f64,
    pub margin_bottom: f64,
    pub padding: f64,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            width: 300.0,
            height: 150.0,
            margin_top: 10.0,
            margin_bottom: 20.0,
            padding: 10.0,
        }
    }
}

impl ChartConfig {
    pub fn validate(&self) -> Result<()> {
        let all = [
            self.width,
            self.height,
            self.margin_top,
            self.margin_bottom,
            self.padding,
        ];
        if all.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(NetTrayError::Configuration(
                "chart dimensions must be finite and non-negative".into(),
            ));
        }
        if self.width <= 2.0 * self.padding {
            return Err(NetTrayError::Configuration(
                "chart.width must exceed twice chart.padding".into(),
            ));
        }
        if self.height <= self.margin_top + self.margin_bottom {
            return Err(NetTrayError::Configuration(
                "chart.height must exceed chart.margin_top + chart.margin_bottom".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpsConfig {
    pub log_level: String,
    #[serde(default)]
    pub log_dir: Option<String>,
}

impl Default for OpsConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
            log_dir: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetTrayConfig {
    #[serde(default)]
    pub probe: ProbeConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub chart: ChartConfig,
    #[serde(default)]
    pub ops: OpsConfig,
}

impl NetTrayConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref).map_err(|err| {
            NetTrayError::Configuration(format!(
                "unable to read config file {}: {err}",
                path_ref.display()
            ))
        })?;
        toml::from_str(&contents).map_err(|err| {
            NetTrayError::Configuration(format!(
                "failed to parse config file {}: {err}",
                path_ref.display()
            ))
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.probe.target_host.trim().is_empty() {
            return Err(NetTrayError::Configuration(
                "probe.target_host must not be empty".into(),
            ));
        }
        if self.probe.icmp_timeout_ms == 0 {
            return Err(NetTrayError::Configuration(
                "probe.icmp_timeout_ms must be greater than zero".into(),
            ));
        }
        if self.probe.http_timeout_ms == 0 {
            return Err(NetTrayError::Configuration(
                "probe.http_timeout_ms must be greater than zero".into(),
            ));
        }
        if self.monitor.poll_interval_ms == 0 {
            return Err(NetTrayError::Configuration(
                "monitor.poll_interval_ms must be greater than zero".into(),
            ));
        }
        if self.monitor.shutdown_grace_ms == 0 {
            return Err(NetTrayError::Configuration(
                "monitor.shutdown_grace_ms must be greater than zero".into(),
            ));
        }
        self.chart.validate()
    }
}
