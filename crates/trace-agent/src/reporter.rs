use agent_core::metrics::Recorder;
use agent_proto::collector_service_client::CollectorServiceClient;
use agent_proto::{SubmitBatchesRequest, Span as WireSpan};
use tonic::Request;
use tonic::transport::Channel;

use crate::agent_tags::AgentTags;
use crate::decoder::Batch;
use crate::errors::ReportError;
use crate::metrics::{Metrics, ReporterEvent, ReporterOutcome};

/// Reporter (C6): forwards decoded batches to the collector over a
/// persistent, lazily-connecting gRPC channel. Each call is independent —
/// batches are never coalesced here — and no retry is attempted at this
/// layer; the channel itself reconnects, and span loss on failure is
/// accepted (spec.md §4.6).
pub struct Reporter {
	client: CollectorServiceClient<Channel>,
	tags: AgentTags,
	metrics: std::sync::Arc<Metrics>,
}

impl Reporter {
	pub fn new(
		endpoint: impl Into<String>,
		tags: AgentTags,
		metrics: std::sync::Arc<Metrics>,
	) -> Result<Self, ReportError> {
		let endpoint = endpoint.into();
		let uri: http::Uri = endpoint
			.parse()
			.map_err(|e: http::uri::InvalidUri| ReportError::InvalidEndpoint(e.to_string()))?;
		let channel = Channel::builder(uri).connect_lazy();
		Ok(Reporter {
			client: CollectorServiceClient::new(channel),
			tags,
			metrics,
		})
	}

	/// Submits one batch. On success, increments
	/// `reporter.batches.submitted{format}` / `reporter.spans.submitted{format}`;
	/// on failure, `reporter.batches.failures{format}`. The error is returned
	/// untouched to the caller (the Worker), which logs and counts it.
	pub async fn emit_batch(&self, batch: &Batch) -> Result<(), ReportError> {
		let mut request = Request::new(SubmitBatchesRequest {
			format: batch.format.as_str().to_string(),
			spans: batch
				.spans
				.iter()
				.map(|s| WireSpan {
					name: s.name.clone(),
					payload: s.payload.clone(),
				})
				.collect(),
		});
		self.tags.apply(request.metadata_mut());

		let span_count = batch.spans.len() as u64;
		let mut client = self.client.clone();
		match client.submit_batches(request).await {
			Ok(_) => {
				self.metrics.record(
					&ReporterEvent {
						format: batch.format.label(),
						outcome: ReporterOutcome::BatchSubmitted { spans: span_count },
					},
					(),
				);
				Ok(())
			},
			Err(status) => {
				self.metrics.record(
					&ReporterEvent {
						format: batch.format.label(),
						outcome: ReporterOutcome::BatchFailed,
					},
					(),
				);
				Err(ReportError::Rpc(status))
			},
		}
	}
}

#[cfg(test)]
mod tests {
	use std::net::SocketAddr;

	use agent_proto::collector_service_server::{CollectorService, CollectorServiceServer};
	use agent_proto::SubmitBatchesResponse;
	use prometheus_client::registry::Registry;
	use tokio::sync::mpsc;
	use tonic::{Response, Status};

	use super::*;
	use crate::decoder::{Format, Span};

	struct RecordingCollector {
		tx: mpsc::UnboundedSender<SubmitBatchesRequest>,
	}

	#[tonic::async_trait]
	impl CollectorService for RecordingCollector {
		async fn submit_batches(
			&self,
			request: Request<SubmitBatchesRequest>,
		) -> Result<Response<SubmitBatchesResponse>, Status> {
			let _ = self.tx.send(request.into_inner());
			Ok(Response::new(SubmitBatchesResponse { ok: 1 }))
		}
	}

	async fn spawn_collector() -> (SocketAddr, mpsc::UnboundedReceiver<SubmitBatchesRequest>) {
		let (tx, rx) = mpsc::unbounded_channel();
		let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
		let addr = listener.local_addr().unwrap();
		tokio::spawn(async move {
			tonic::transport::Server::builder()
				.add_service(CollectorServiceServer::new(RecordingCollector { tx }))
				.serve_with_incoming(tokio_stream::wrappers::TcpListenerStream::new(listener))
				.await
				.unwrap();
		});
		(addr, rx)
	}

	#[tokio::test]
	async fn emit_batch_forwards_to_collector() {
		let (addr, mut rx) = spawn_collector().await;
		let mut registry = Registry::default();
		let metrics = std::sync::Arc::new(Metrics::new(&mut registry));
		let reporter = Reporter::new(format!("http://{addr}"), AgentTags::default(), metrics).unwrap();

		let batch = Batch {
			format: Format::new("jaeger"),
			spans: vec![Span {
				name: "span1".to_string(),
				payload: vec![],
			}],
		};
		reporter.emit_batch(&batch).await.unwrap();

		let got = rx.recv().await.unwrap();
		assert_eq!(got.format, "jaeger");
		assert_eq!(got.spans[0].name, "span1");
	}
}
