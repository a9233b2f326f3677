use crate::attendance::Passenger;
use crate::haptics::HapticsKind;
use anyhow::Context;
use camino::Utf8PathBuf;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub session: Session,
    #[serde(default)]
    pub reporter: Reporter,
    #[serde(default)]
    pub haptics: HapticsKind,
}

impl Config {
    pub fn read() -> anyhow::Result<Config> {
        let config_path = std::env::var("CONFIG")
            .map(Utf8PathBuf::from)
            .unwrap_or_else(|_| Utf8PathBuf::from("config.yaml"));

        let config = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Reading config file {}", config_path))?;
        Self::parse(&config)
    }

    pub fn parse(config: &str) -> anyhow::Result<Config> {
        serde_yaml::from_str(config).context("Parsing config file")
    }
}

#[derive(Debug, Deserialize)]
pub struct Session {
    pub ride: String,
    #[serde(default)]
    pub passengers: Vec<Passenger>,
}

#[derive(Debug, Deserialize)]
pub struct Reporter {
    #[serde(with = "humantime_serde", default = "default_report_delay")]
    pub delay: Duration,
}

fn default_report_delay() -> Duration {
    Duration::from_millis(1500)
}

impl Default for Reporter {
    fn default() -> Self {
        Reporter {
            delay: default_report_delay(),
        }
    }
}
