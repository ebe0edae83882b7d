use std::sync::Arc;

use agent_core::drain;
use agent_proto::collector_service_server::{CollectorService, CollectorServiceServer};
use agent_proto::sampling_manager_server::{SamplingManager, SamplingManagerServer};
use agent_proto::{
	BaggageRestrictionsRequest, BaggageRestrictionsResponse, ProbabilisticSamplingStrategy,
	SamplingStrategyParameters, SamplingStrategyResponse, SamplingStrategyType,
	SubmitBatchesRequest, SubmitBatchesResponse,
};
use bytes::Bytes;
use http_body_util::{BodyExt, Empty};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use prometheus_client::registry::Registry;
use tonic::{Request, Response, Status};
use trace_agent::agent_tags::AgentTags;
use trace_agent::metrics::Metrics;
use trace_agent::sampling::proxy::SamplingProxy;
use trace_agent::sampling::server as sampling_server;

struct FakeCollector {
	strategy: SamplingStrategyResponse,
}

#[tonic::async_trait]
impl CollectorService for FakeCollector {
	async fn submit_batches(
		&self,
		_request: Request<SubmitBatchesRequest>,
	) -> Result<Response<SubmitBatchesResponse>, Status> {
		Ok(Response::new(SubmitBatchesResponse { ok: 1 }))
	}
}

#[tonic::async_trait]
impl SamplingManager for FakeCollector {
	async fn get_sampling_strategy(
		&self,
		_request: Request<SamplingStrategyParameters>,
	) -> Result<Response<SamplingStrategyResponse>, Status> {
		Ok(Response::new(self.strategy.clone()))
	}

	async fn get_baggage_restrictions(
		&self,
		_request: Request<BaggageRestrictionsRequest>,
	) -> Result<Response<BaggageRestrictionsResponse>, Status> {
		Err(Status::unimplemented("baggage restrictions not supported"))
	}
}

async fn spawn_fake_collector() -> tonic::transport::Channel {
	let strategy = SamplingStrategyResponse {
		strategy_type: SamplingStrategyType::Probabilistic as i32,
		probabilistic_sampling: Some(ProbabilisticSamplingStrategy { sampling_rate: 0.01 }),
		rate_limiting_sampling: None,
		operation_sampling: None,
	};
	let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
	let addr = listener.local_addr().unwrap();
	tokio::spawn(async move {
		tonic::transport::Server::builder()
			.add_service(CollectorServiceServer::new(FakeCollector {
				strategy: strategy.clone(),
			}))
			.add_service(SamplingManagerServer::new(FakeCollector { strategy }))
			.serve_with_incoming(tokio_stream::wrappers::TcpListenerStream::new(listener))
			.await
			.unwrap();
	});
	tonic::transport::Channel::builder(format!("http://{addr}").parse().unwrap())
		.connect()
		.await
		.unwrap()
}

async fn get(client: &Client<HttpConnector, Empty<Bytes>>, uri: &str) -> (hyper::StatusCode, String) {
	let resp = client
		.get(uri.parse().unwrap())
		.await
		.expect("request should reach the sampling server");
	let status = resp.status();
	let body = resp.into_body().collect().await.unwrap().to_bytes();
	(status, String::from_utf8(body.to_vec()).unwrap())
}

// The returned `DrainTrigger` must stay alive for the caller's duration:
// dropping it is itself a (non-graceful) drain signal, which stops the
// server's accept loop immediately.
async fn spawn_sampling_server()
-> (std::net::SocketAddr, Client<HttpConnector, Empty<Bytes>>, drain::DrainTrigger) {
	let channel = spawn_fake_collector().await;
	let mut registry = Registry::default();
	let metrics = Arc::new(Metrics::new(&mut registry));
	let proxy = SamplingProxy::new(channel, AgentTags::default());
	let (trigger, watcher) = drain::new();

	let server = sampling_server::Server::new("127.0.0.1:0".parse().unwrap(), watcher, proxy, metrics)
		.await
		.unwrap();
	let addr = server.address();
	server.spawn();
	(addr, Client::builder(TokioExecutor::new()).build_http(), trigger)
}

/// Scenario 4: `GET /sampling?service=<name>` against a collector returning
/// `Probabilistic{0.01}` yields the canonical JSON shape and counts
/// `sampling-server.requests`.
#[tokio::test]
async fn sampling_happy_path_canonical() {
	let (addr, client, _trigger) = spawn_sampling_server().await;
	let (status, body) = get(&client, &format!("http://{addr}/sampling?service=default-service")).await;

	assert_eq!(status, hyper::StatusCode::OK);
	assert_eq!(
		body,
		r#"{"strategyType":"PROBABILISTIC","probabilisticSampling":{"samplingRate":0.01}}"#
	);
}

/// Scenario 5: the legacy `/` route rewrites `strategyType` to its ordinal
/// form while leaving the rest of the payload untouched.
#[tokio::test]
async fn sampling_legacy_enum_rewrite() {
	let (addr, client, _trigger) = spawn_sampling_server().await;
	let (status, body) = get(&client, &format!("http://{addr}/?service=default-service")).await;

	assert_eq!(status, hyper::StatusCode::OK);
	assert!(body.contains(r#""strategyType":0"#));
	assert!(!body.contains(r#""strategyType":"PROBABILISTIC""#));
}

/// Scenario 6: a missing `service` query parameter is rejected with 400 and
/// the exact message spec.md §4.8 specifies.
#[tokio::test]
async fn sampling_bad_input_missing_service() {
	let (addr, client, _trigger) = spawn_sampling_server().await;
	let (status, body) = get(&client, &format!("http://{addr}/sampling")).await;

	assert_eq!(status, hyper::StatusCode::BAD_REQUEST);
	assert_eq!(body, "'service' parameter is empty\n");
}

/// A repeated `service` parameter is rejected distinctly from a missing one.
#[tokio::test]
async fn sampling_bad_input_repeated_service() {
	let (addr, client, _trigger) = spawn_sampling_server().await;
	let (status, body) = get(&client, &format!("http://{addr}/sampling?service=a&service=b")).await;

	assert_eq!(status, hyper::StatusCode::BAD_REQUEST);
	assert_eq!(body, "'service' parameter must occur only once\n");
}
