use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::LifecycleError;

fn env_override<T: std::str::FromStr>(env: &str, current: T) -> T {
	std::env::var(env)
		.ok()
		.and_then(|v| v.parse().ok())
		.unwrap_or(current)
}

fn env_duration_override(env: &str, current: Duration) -> Duration {
	std::env::var(env)
		.ok()
		.and_then(|v| duration_str::parse(&v).ok())
		.unwrap_or(current)
}

const fn default_max_packet_size() -> usize {
	65_000
}
const fn default_queue_size() -> usize {
	1_000
}
const fn default_workers() -> usize {
	10
}
const fn default_discovery_min_peers() -> usize {
	1
}
fn default_shutdown_grace_period() -> Duration {
	Duration::from_secs(5)
}

/// One configured UDP listener: its own buffer size, queue depth, worker
/// count, bind address, and decoder model. `Processors[]` in spec.md §6.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessorConfig {
	#[serde(default = "default_max_packet_size")]
	pub max_packet_size: usize,
	#[serde(default = "default_queue_size")]
	pub queue_size: usize,
	#[serde(default = "default_workers")]
	pub workers: usize,
	pub host_port: SocketAddr,
	#[serde(default)]
	pub model: String,
}

impl ProcessorConfig {
	pub fn validate(&self) -> Result<(), LifecycleError> {
		if self.workers == 0 {
			return Err(LifecycleError::InvalidArgument(
				"Processors[].Workers must be >= 1".to_string(),
			));
		}
		Ok(())
	}
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SamplingServerConfig {
	pub host_port: SocketAddr,
}

/// Ambient admin endpoints. Not part of spec.md's enumerated configuration
/// surface (§6) — the metrics *backend* is explicitly out of scope — but the
/// `/metrics` and `/healthz` HTTP listeners themselves are ambient
/// observability infra the teacher always exposes, so their bind addresses
/// need a place to live.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminConfig {
	#[serde(default = "default_metrics_host_port")]
	pub metrics_host_port: SocketAddr,
	#[serde(default = "default_readiness_host_port")]
	pub readiness_host_port: SocketAddr,
}

fn default_metrics_host_port() -> SocketAddr {
	"127.0.0.1:15020".parse().unwrap()
}
fn default_readiness_host_port() -> SocketAddr {
	"127.0.0.1:15021".parse().unwrap()
}

impl Default for AdminConfig {
	fn default() -> Self {
		AdminConfig {
			metrics_host_port: default_metrics_host_port(),
			readiness_host_port: default_readiness_host_port(),
		}
	}
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
	pub collector_endpoint: String,
	#[serde(default)]
	pub agent_tags: HashMap<String, String>,
	pub processors: Vec<ProcessorConfig>,
	pub sampling_server: SamplingServerConfig,
	#[serde(default = "default_discovery_min_peers")]
	pub discovery_min_peers: usize,
	#[serde(default)]
	pub admin: AdminConfig,
	#[serde(
		default = "default_shutdown_grace_period",
		with = "duration_seconds"
	)]
	pub shutdown_grace_period: Duration,
}

mod duration_seconds {
	use std::time::Duration;

	use serde::{Deserialize, Deserializer, Serializer};

	pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
		s.serialize_f64(d.as_secs_f64())
	}

	pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
		let secs = f64::deserialize(d)?;
		Ok(Duration::from_secs_f64(secs))
	}
}

impl Config {
	pub fn from_yaml_str(s: &str) -> anyhow::Result<Self> {
		let mut cfg: Config = serde_yaml::from_str(s)?;
		cfg.apply_env_overrides();
		cfg.validate()?;
		Ok(cfg)
	}

	/// Environment overrides follow the `TRACE_AGENT_<FIELD>` convention,
	/// applied after file parsing so an operator can tweak a single value
	/// without editing the mounted config document.
	fn apply_env_overrides(&mut self) {
		self.collector_endpoint = env_override("TRACE_AGENT_COLLECTOR_ENDPOINT", self.collector_endpoint.clone());
		self.discovery_min_peers = env_override("TRACE_AGENT_DISCOVERY_MIN_PEERS", self.discovery_min_peers);
		self.shutdown_grace_period =
			env_duration_override("TRACE_AGENT_SHUTDOWN_GRACE_PERIOD", self.shutdown_grace_period);
	}

	pub fn validate(&self) -> anyhow::Result<()> {
		if self.processors.is_empty() {
			anyhow::bail!("at least one entry in Processors[] is required");
		}
		for p in &self.processors {
			p.validate()?;
		}
		Ok(())
	}

	pub fn agent_tags(&self) -> crate::agent_tags::AgentTags {
		crate::agent_tags::AgentTags::new(self.agent_tags.clone())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn rejects_zero_workers() {
		let cfg = ProcessorConfig {
			max_packet_size: 1024,
			queue_size: 10,
			workers: 0,
			host_port: "127.0.0.1:0".parse().unwrap(),
			model: "jaeger".to_string(),
		};
		assert!(cfg.validate().is_err());
	}

	#[test]
	fn parses_minimal_yaml() {
		let yaml = r#"
collectorEndpoint: "http://127.0.0.1:14250"
processors:
  - hostPort: "127.0.0.1:6831"
samplingServer:
  hostPort: "127.0.0.1:5778"
"#;
		let cfg = Config::from_yaml_str(yaml).expect("valid config");
		assert_eq!(cfg.processors.len(), 1);
		assert_eq!(cfg.processors[0].max_packet_size, 65_000);
		assert_eq!(cfg.discovery_min_peers, 1);
	}
}
