use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use agent_core::metrics::Recorder;
use agent_core::strng::Strng;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::ProcessorConfig;
use crate::decoder::Decoder;
use crate::errors::LifecycleError;
use crate::metrics::{Metrics, ProcessorEvent, ProcessorLabel};
use crate::pool::BufferPool;
use crate::reporter::Reporter;
use crate::transport::Transport;

const STATE_INIT: u8 = 0;
const STATE_SERVING: u8 = 1;
const STATE_STOPPED: u8 = 2;

/// One configured UDP listener, bundling the Datagram Transport (C1), Frame
/// Buffer Pool (C2), Receiver Loop (C3), and Worker Pool (C4) behind the
/// per-processor slice of the Lifecycle Supervisor (C10): `start`,
/// `is_serving`, `stop`.
pub struct Processor {
	label: Strng,
	config: ProcessorConfig,
	transport: Arc<Transport>,
	pool: Arc<BufferPool>,
	queue_tx: Mutex<Option<mpsc::Sender<crate::pool::PooledBuffer>>>,
	queue_rx: Arc<Mutex<mpsc::Receiver<crate::pool::PooledBuffer>>>,
	state: Arc<AtomicU8>,
	stop_token: CancellationToken,
	tasks: Mutex<Vec<JoinHandle<()>>>,
	metrics: Arc<Metrics>,
}

impl Processor {
	pub async fn bind(
		config: ProcessorConfig,
		metrics: Arc<Metrics>,
	) -> Result<Self, crate::errors::TransportError> {
		let transport = Transport::open(config.host_port).await?;
		transport.set_receive_buffer_size(config.max_packet_size * 4);
		let pool = BufferPool::new(config.max_packet_size);
		let (queue_tx, queue_rx) = mpsc::channel(config.queue_size);
		let label = Strng::from(config.host_port.to_string());
		Ok(Processor {
			label,
			config,
			transport: Arc::new(transport),
			pool: Arc::new(pool),
			queue_tx: Mutex::new(Some(queue_tx)),
			queue_rx: Arc::new(Mutex::new(queue_rx)),
			state: Arc::new(AtomicU8::new(STATE_INIT)),
			stop_token: CancellationToken::new(),
			tasks: Mutex::new(Vec::new()),
			metrics,
		})
	}

	pub fn local_addr(&self) -> std::net::SocketAddr {
		self.transport.local_addr()
	}

	pub fn is_serving(&self) -> bool {
		self.state.load(Ordering::Acquire) == STATE_SERVING
	}

	fn processor_label(&self) -> ProcessorLabel {
		ProcessorLabel {
			processor: self.label.clone(),
		}
	}

	/// Opens the transport for business: transitions `Init -> Serving` via
	/// CAS, then spawns one receiver task and `config.workers` worker tasks.
	/// `NumWorkers >= 1` is enforced by [`ProcessorConfig::validate`] before
	/// a processor is ever constructed, but checked again here since
	/// `start` is the operation spec.md §4.4 ties the invariant to.
	pub async fn start(
		&self,
		decoder: Arc<dyn Decoder>,
		reporter: Arc<Reporter>,
	) -> Result<(), LifecycleError> {
		if self.config.workers == 0 {
			return Err(LifecycleError::InvalidArgument(
				"Processors[].Workers must be >= 1".to_string(),
			));
		}
		if self
			.state
			.compare_exchange(STATE_INIT, STATE_SERVING, Ordering::AcqRel, Ordering::Acquire)
			.is_err()
		{
			return Err(LifecycleError::AlreadyStarted);
		}

		// The receiver task takes sole ownership of the sender: it's the only
		// producer, so dropping it when the receiver exits is what lets the
		// workers' `recv()` observe channel closure and return during `stop`.
		let queue_tx = self
			.queue_tx
			.lock()
			.await
			.take()
			.expect("start is only reachable once, guarded by the Init -> Serving CAS above");

		let mut tasks = self.tasks.lock().await;
		tasks.push(tokio::spawn(receiver_loop(
			self.transport.clone(),
			self.pool.clone(),
			queue_tx,
			self.state.clone(),
			self.stop_token.clone(),
			self.metrics.clone(),
			self.processor_label(),
			self.config.max_packet_size,
		)));
		for _ in 0..self.config.workers {
			tasks.push(tokio::spawn(worker_loop(
				self.queue_rx.clone(),
				decoder.clone(),
				reporter.clone(),
				self.metrics.clone(),
				self.processor_label(),
			)));
		}
		Ok(())
	}

	/// Idempotent: a second `stop()` (or a `stop()` on a processor that was
	/// never started) is a no-op rather than an error, per spec.md §4.9 and
	/// testable property 4. Records `ProcessorCloseTimer` on the call that
	/// actually performed the transition.
	pub async fn stop(&self) -> Result<(), LifecycleError> {
		if self
			.state
			.compare_exchange(STATE_SERVING, STATE_STOPPED, Ordering::AcqRel, Ordering::Acquire)
			.is_err()
		{
			return Ok(());
		}
		let start = std::time::Instant::now();
		self.stop_token.cancel();
		let _ = self.transport.close();

		let mut tasks = self.tasks.lock().await;
		for task in tasks.drain(..) {
			let _ = task.await;
		}
		self
			.metrics
			.processor_close_seconds
			.get_or_create(&self.processor_label())
			.observe(start.elapsed().as_secs_f64());
		Ok(())
	}
}

#[allow(clippy::too_many_arguments)]
async fn receiver_loop(
	transport: Arc<Transport>,
	pool: Arc<BufferPool>,
	queue_tx: mpsc::Sender<crate::pool::PooledBuffer>,
	state: Arc<AtomicU8>,
	stop_token: CancellationToken,
	metrics: Arc<Metrics>,
	label: ProcessorLabel,
	max_packet_size: usize,
) {
	while state.load(Ordering::Acquire) == STATE_SERVING {
		let mut buf = pool.acquire();
		buf.buf_mut().resize(max_packet_size, 0);

		tokio::select! {
			biased;
			_ = stop_token.cancelled() => break,
			res = transport.read(buf.buf_mut()) => {
				match res {
					Ok((n, _addr)) => {
						buf.buf_mut().truncate(n);
						metrics.packet_size.get_or_create(&label).set(n as i64);
						match queue_tx.try_send(buf) {
							Ok(()) => {
								metrics.record(&ProcessorEvent::PacketProcessed, &label);
								metrics.queue_size.get_or_create(&label).inc();
							}
							Err(_dropped) => {
								metrics.record(&ProcessorEvent::PacketDropped, &label);
							}
						}
					}
					Err(_err) => {
						metrics.record(&ProcessorEvent::ReadError, &label);
					}
				}
			}
		}
	}
	drop(queue_tx);
}

async fn worker_loop(
	queue_rx: Arc<Mutex<mpsc::Receiver<crate::pool::PooledBuffer>>>,
	decoder: Arc<dyn Decoder>,
	reporter: Arc<Reporter>,
	metrics: Arc<Metrics>,
	label: ProcessorLabel,
) {
	loop {
		let buf = {
			let mut guard = queue_rx.lock().await;
			guard.recv().await
		};
		let Some(buf) = buf else { break };
		metrics.queue_size.get_or_create(&label).dec();

		match decoder.decode(buf.as_slice()).await {
			Ok(batch) => {
				if let Err(err) = reporter.emit_batch(&batch).await {
					tracing::warn!(%err, processor = %label.processor, "failed to forward batch to collector");
				}
			},
			Err(err) => {
				metrics.record(&ProcessorEvent::HandlerProcessError, &label);
				tracing::warn!(%err, processor = %label.processor, "decoder failed");
			},
		}
		// `buf` drops here, returning it to the pool.
	}
}

#[cfg(test)]
mod tests {
	use prometheus_client::registry::Registry;
	use tokio::net::UdpSocket;

	use super::*;
	use crate::agent_tags::AgentTags;
	use crate::testing::{AlwaysFailDecoder, LengthPrefixedJsonDecoder};

	async fn spawn_collector() -> (std::net::SocketAddr, tokio::sync::mpsc::UnboundedReceiver<agent_proto::SubmitBatchesRequest>) {
		use agent_proto::collector_service_server::{CollectorService, CollectorServiceServer};
		use agent_proto::{SubmitBatchesRequest, SubmitBatchesResponse};
		use tonic::{Request, Response, Status};

		struct Recording {
			tx: tokio::sync::mpsc::UnboundedSender<SubmitBatchesRequest>,
		}
		#[tonic::async_trait]
		impl CollectorService for Recording {
			async fn submit_batches(
				&self,
				request: Request<SubmitBatchesRequest>,
			) -> Result<Response<SubmitBatchesResponse>, Status> {
				let _ = self.tx.send(request.into_inner());
				Ok(Response::new(SubmitBatchesResponse { ok: 1 }))
			}
		}

		let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
		let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
		let addr = listener.local_addr().unwrap();
		tokio::spawn(async move {
			tonic::transport::Server::builder()
				.add_service(CollectorServiceServer::new(Recording { tx }))
				.serve_with_incoming(tokio_stream::wrappers::TcpListenerStream::new(listener))
				.await
				.unwrap();
		});
		(addr, rx)
	}

	#[tokio::test]
	async fn happy_path_delivers_one_batch() {
		let (collector_addr, mut rx) = spawn_collector().await;
		let mut registry = Registry::default();
		let metrics = Arc::new(Metrics::new(&mut registry));
		let reporter = Arc::new(
			Reporter::new(
				format!("http://{collector_addr}"),
				AgentTags::default(),
				metrics.clone(),
			)
			.unwrap(),
		);

		let config = ProcessorConfig {
			max_packet_size: 1024,
			queue_size: 10,
			workers: 2,
			host_port: "127.0.0.1:0".parse().unwrap(),
			model: "jaeger".to_string(),
		};
		let processor = Processor::bind(config, metrics).await.unwrap();
		let addr = processor.local_addr();
		processor
			.start(Arc::new(LengthPrefixedJsonDecoder), reporter)
			.await
			.unwrap();

		let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
		client
			.send_to(br#"{"format":"jaeger","spans":[{"name":"span1"}]}"#, addr)
			.await
			.unwrap();

		let got = tokio::time::timeout(std::time::Duration::from_secs(1), rx.recv())
			.await
			.expect("batch delivered within 1s")
			.unwrap();
		assert_eq!(got.spans[0].name, "span1");

		processor.stop().await.unwrap();
	}

	#[tokio::test]
	async fn drop_under_pressure_when_queue_is_full() {
		// Queue capacity 1, nobody draining it: the receiver loop runs on its
		// own with no worker pool attached, exactly scenario 2 of spec.md §8.
		let mut registry = Registry::default();
		let metrics = Arc::new(Metrics::new(&mut registry));
		let label = ProcessorLabel {
			processor: Strng::from("test"),
		};

		let transport = Arc::new(Transport::open("127.0.0.1:0".parse().unwrap()).await.unwrap());
		let addr = transport.local_addr();
		let pool = Arc::new(BufferPool::new(1024));
		let (queue_tx, _queue_rx) = mpsc::channel(1);
		let state = Arc::new(AtomicU8::new(STATE_SERVING));
		let stop_token = CancellationToken::new();

		let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
		client.send_to(b"one", addr).await.unwrap();
		client.send_to(b"two", addr).await.unwrap();

		let receiver = tokio::spawn(receiver_loop(
			transport,
			pool,
			queue_tx,
			state.clone(),
			stop_token.clone(),
			metrics.clone(),
			label.clone(),
			1024,
		));
		tokio::time::sleep(std::time::Duration::from_millis(100)).await;
		state.store(STATE_STOPPED, Ordering::Release);
		stop_token.cancel();
		receiver.await.unwrap();

		assert_eq!(metrics.packets_processed(&label), 1);
		assert_eq!(metrics.packets_dropped(&label), 1);
	}

	#[tokio::test]
	async fn decoder_failure_still_releases_buffer_and_counts() {
		let (collector_addr, mut rx) = spawn_collector().await;
		let mut registry = Registry::default();
		let metrics = Arc::new(Metrics::new(&mut registry));
		let reporter = Arc::new(
			Reporter::new(format!("http://{collector_addr}"), AgentTags::default(), metrics.clone()).unwrap(),
		);

		let config = ProcessorConfig {
			max_packet_size: 1024,
			queue_size: 10,
			workers: 1,
			host_port: "127.0.0.1:0".parse().unwrap(),
			model: "jaeger".to_string(),
		};
		let processor = Processor::bind(config, metrics.clone()).await.unwrap();
		let addr = processor.local_addr();
		let label = processor.processor_label();
		processor
			.start(Arc::new(AlwaysFailDecoder), reporter)
			.await
			.unwrap();

		let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
		client.send_to(b"not valid jaeger", addr).await.unwrap();

		tokio::time::timeout(std::time::Duration::from_secs(1), async {
			loop {
				if metrics.handler_process_errors(&label) == 1 {
					break;
				}
				tokio::time::sleep(std::time::Duration::from_millis(10)).await;
			}
		})
		.await
		.expect("handler process error recorded within 1s");

		assert_eq!(metrics.packets_processed(&label), 1);
		assert!(rx.try_recv().is_err());
		processor.stop().await.unwrap();
	}
}
