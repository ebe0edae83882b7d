use agent_proto::sampling_manager_client::SamplingManagerClient;
use agent_proto::{BaggageRestrictionsRequest, SamplingStrategyParameters};
use tonic::Request;
use tonic::transport::Channel;

use crate::agent_tags::AgentTags;
use crate::errors::SamplingError;
use crate::sampling::strategy::{BaggageRestriction, SamplingStrategy};

/// Sampling Proxy (C7): wraps the collector's `SamplingManager` RPCs.
/// One-shot requests, no caching at this layer — callers (typically the
/// client libraries polling through C8) are responsible for caching
/// (spec.md §4.7).
pub struct SamplingProxy {
	client: SamplingManagerClient<Channel>,
	tags: AgentTags,
}

impl SamplingProxy {
	pub fn new(channel: Channel, tags: AgentTags) -> Self {
		SamplingProxy {
			client: SamplingManagerClient::new(channel),
			tags,
		}
	}

	pub async fn get_sampling_strategy(
		&self,
		service_name: &str,
	) -> Result<SamplingStrategy, SamplingError> {
		let mut request = Request::new(SamplingStrategyParameters {
			service_name: service_name.to_string(),
		});
		self.tags.apply(request.metadata_mut());

		let mut client = self.client.clone();
		let response = client
			.get_sampling_strategy(request)
			.await
			.map_err(SamplingError::Rpc)?;
		Ok(SamplingStrategy::from(&response.into_inner()))
	}

	/// The collector surface this agent targets doesn't implement baggage
	/// restrictions; the core deliberately returns `NotImplemented` so
	/// callers can distinguish "feature absent" from "transport failed"
	/// (spec.md §7).
	pub async fn get_baggage_restrictions(
		&self,
		service_name: &str,
	) -> Result<Vec<BaggageRestriction>, SamplingError> {
		let mut request = Request::new(BaggageRestrictionsRequest {
			service_name: service_name.to_string(),
		});
		self.tags.apply(request.metadata_mut());

		let mut client = self.client.clone();
		match client.get_baggage_restrictions(request).await {
			Ok(response) => Ok(
				response
					.into_inner()
					.baggage_restrictions
					.into_iter()
					.map(BaggageRestriction::from)
					.collect(),
			),
			Err(status) if status.code() == tonic::Code::Unimplemented => {
				Err(SamplingError::NotImplemented)
			},
			Err(status) => Err(SamplingError::Rpc(status)),
		}
	}
}

#[cfg(test)]
mod tests {
	use agent_proto::sampling_manager_server::{SamplingManager, SamplingManagerServer};
	use agent_proto::{
		BaggageRestrictionsResponse, ProbabilisticSamplingStrategy, SamplingStrategyResponse,
		SamplingStrategyType,
	};
	use tonic::{Response, Status};

	use super::*;

	struct FakeCollector;

	#[tonic::async_trait]
	impl SamplingManager for FakeCollector {
		async fn get_sampling_strategy(
			&self,
			_request: Request<SamplingStrategyParameters>,
		) -> Result<Response<SamplingStrategyResponse>, Status> {
			Ok(Response::new(SamplingStrategyResponse {
				strategy_type: SamplingStrategyType::Probabilistic as i32,
				probabilistic_sampling: Some(ProbabilisticSamplingStrategy { sampling_rate: 0.01 }),
				rate_limiting_sampling: None,
				operation_sampling: None,
			}))
		}

		async fn get_baggage_restrictions(
			&self,
			_request: Request<BaggageRestrictionsRequest>,
		) -> Result<Response<BaggageRestrictionsResponse>, Status> {
			Err(Status::unimplemented("baggage restrictions not supported"))
		}
	}

	async fn spawn_fake_collector() -> Channel {
		let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
		let addr = listener.local_addr().unwrap();
		tokio::spawn(async move {
			tonic::transport::Server::builder()
				.add_service(SamplingManagerServer::new(FakeCollector))
				.serve_with_incoming(tokio_stream::wrappers::TcpListenerStream::new(listener))
				.await
				.unwrap();
		});
		Channel::builder(format!("http://{addr}").parse().unwrap())
			.connect()
			.await
			.unwrap()
	}

	#[tokio::test]
	async fn resolves_probabilistic_strategy() {
		let channel = spawn_fake_collector().await;
		let proxy = SamplingProxy::new(channel, AgentTags::default());
		let strategy = proxy.get_sampling_strategy("default-service").await.unwrap();
		assert_eq!(strategy, SamplingStrategy::Probabilistic { rate: 0.01 });
	}

	#[tokio::test]
	async fn baggage_restrictions_not_implemented() {
		let channel = spawn_fake_collector().await;
		let proxy = SamplingProxy::new(channel, AgentTags::default());
		let err = proxy.get_baggage_restrictions("default-service").await.unwrap_err();
		assert!(matches!(err, SamplingError::NotImplemented));
	}
}
