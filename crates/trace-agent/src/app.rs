use std::sync::Arc;

use agent_core::drain::{self, DrainWatcher};
use agent_core::readiness;
use agent_core::signal::Shutdown;
use prometheus_client::registry::Registry;
use tonic::transport::Channel;

use crate::Address;
use crate::config::Config;
use crate::decoder::Decoder;
use crate::management::{metrics_server, readiness_server};
use crate::metrics::Metrics;
use crate::processor::Processor;
use crate::reporter::Reporter;
use crate::sampling::proxy::SamplingProxy;
use crate::sampling::server as sampling_server;

/// Resolves the collector endpoint's host to however many peers DNS hands
/// back, as a stand-in for `DiscoveryMinPeers` (spec.md §6): the spec
/// describes a transport that tracks resolved peer count, but this agent's
/// configuration surface carries a single `CollectorEndpoint` URL rather
/// than a peer list, so the DNS answer set is what's actually observable.
async fn resolve_peer_count(endpoint: &str) -> anyhow::Result<usize> {
	let uri: http::Uri = endpoint.parse()?;
	let host = uri
		.host()
		.ok_or_else(|| anyhow::anyhow!("collector endpoint has no host"))?;
	let port = uri.port_u16().unwrap_or(443);
	let addrs = tokio::net::lookup_host((host, port)).await?;
	Ok(addrs.count())
}

/// The Lifecycle Supervisor (C10) at process scope: everything `Processor`
/// does per-listener, plus the admin HTTP surfaces and the RPC clients they
/// share. Bound but not yet serving until [`Bound::run`] is called.
pub struct Bound {
	config: Config,
	metrics: Arc<Metrics>,
	registry: Registry,
	processors: Vec<Processor>,
	reporter: Arc<Reporter>,
	sampling_proxy: SamplingProxy,
	ready: readiness::Ready,
}

impl Bound {
	pub async fn new(config: Config) -> anyhow::Result<Self> {
		config.validate()?;

		let peers = resolve_peer_count(&config.collector_endpoint).await?;
		if peers < config.discovery_min_peers {
			anyhow::bail!(
				"resolved {peers} collector peers, need at least {}",
				config.discovery_min_peers
			);
		}

		let mut registry = Registry::default();
		let metrics = Arc::new(Metrics::new(&mut registry));
		let tags = config.agent_tags();

		let reporter = Arc::new(Reporter::new(
			config.collector_endpoint.clone(),
			tags.clone(),
			metrics.clone(),
		)?);

		let channel = Channel::builder(config.collector_endpoint.parse()?).connect_lazy();
		let sampling_proxy = SamplingProxy::new(channel, tags);

		let ready = readiness::Ready::new();
		let mut processors = Vec::with_capacity(config.processors.len());
		for processor_config in &config.processors {
			processors.push(Processor::bind(processor_config.clone(), metrics.clone()).await?);
		}

		Ok(Bound {
			config,
			metrics,
			registry,
			processors,
			reporter,
			sampling_proxy,
			ready,
		})
	}

	/// Starts every processor, serves the admin (metrics/readiness) and
	/// sampling HTTP surfaces, then waits for a shutdown signal before
	/// draining — mirroring spec.md §4.9's `start` / `stop` sequencing at
	/// process scope.
	pub async fn run(self, decoder: Arc<dyn Decoder>) -> anyhow::Result<()> {
		let Bound {
			processors,
			reporter,
			sampling_proxy,
			metrics,
			registry,
			ready,
			config,
		} = self;

		let (drain_trigger, drain_watcher) = drain::new();
		let shutdown = Shutdown::new();

		let udp_block = ready.register_task("udp processors");
		for processor in &processors {
			processor.start(decoder.clone(), reporter.clone()).await?;
		}
		drop(udp_block);

		spawn_admin_servers(
			config.admin.metrics_host_port.into(),
			config.admin.readiness_host_port.into(),
			config.sampling_server.host_port.into(),
			drain_watcher.clone(),
			registry,
			ready.clone(),
			sampling_proxy,
			metrics,
		)
		.await?;

		shutdown.wait().await;
		tracing::info!("shutdown signal received, draining");

		stop_all(&processors).await;
		tokio::time::timeout(
			config.shutdown_grace_period,
			drain_trigger.start_drain_and_wait(agent_core::drain::DrainMode::Graceful),
		)
		.await
		.ok();
		Ok(())
	}
}

#[allow(clippy::too_many_arguments)]
async fn spawn_admin_servers(
	metrics_addr: Address,
	readiness_addr: Address,
	sampling_addr: Address,
	drain_watcher: DrainWatcher,
	registry: Registry,
	ready: readiness::Ready,
	sampling_proxy: SamplingProxy,
	metrics: Arc<Metrics>,
) -> anyhow::Result<()> {
	metrics_server::Server::new(metrics_addr, drain_watcher.clone(), registry)
		.await?
		.spawn();
	readiness_server::Server::new(readiness_addr, drain_watcher.clone(), ready)
		.await?
		.spawn();
	sampling_server::Server::new(sampling_addr, drain_watcher, sampling_proxy, metrics)
		.await?
		.spawn();
	Ok(())
}

async fn stop_all(processors: &[Processor]) {
	for processor in processors {
		if let Err(err) = processor.stop().await {
			tracing::warn!(%err, "processor failed to stop cleanly");
		}
	}
}

/// Convenience entry point used by `trace-agent-app`'s `main`.
pub async fn run(config: Config, decoder: Arc<dyn Decoder>) -> anyhow::Result<()> {
	let bound = Bound::new(config).await?;
	bound.run(decoder).await
}
