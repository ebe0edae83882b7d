use agent_core::metrics::Recorder;
use agent_core::strng::Strng;
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::metrics::histogram::Histogram;
use prometheus_client::registry::Registry;

/// Per-processor label: a processor is one configured UDP listener (C1-C4,
/// C10 bound together), identified by its configured `HostPort`.
#[derive(Clone, Hash, Debug, PartialEq, Eq, EncodeLabelSet)]
pub struct ProcessorLabel {
	pub processor: Strng,
}

/// Per-format label, used by the Reporter (C6) exactly as spec.md §4.6
/// requires: submitted/failed counts are broken out by the batch's format.
#[derive(Clone, Hash, Debug, PartialEq, Eq, EncodeLabelSet)]
pub struct FormatLabel {
	pub format: Strng,
}

/// Events the UDP receiver loop / worker pool (C3/C4) record. One per
/// datagram, on the agent's hot path — never surfaced as an `Err`, only
/// counted, per spec.md §7's propagation policy.
#[derive(Clone, Debug)]
pub enum ProcessorEvent {
	PacketProcessed,
	PacketDropped,
	ReadError,
	HandlerProcessError,
}

#[derive(Clone, Debug)]
pub struct ReporterEvent {
	pub format: Strng,
	pub outcome: ReporterOutcome,
}

#[derive(Copy, Clone, Debug)]
pub enum ReporterOutcome {
	BatchSubmitted { spans: u64 },
	BatchFailed,
}

#[derive(Copy, Clone, Debug)]
pub enum SamplingServerEvent {
	Requests,
	RequestsLegacy,
	BadRequests,
	BadServerResponses,
	BadThrift,
	WriteErrors,
}

pub struct Metrics {
	packets_processed: Family<ProcessorLabel, Counter>,
	packets_dropped: Family<ProcessorLabel, Counter>,
	read_errors: Family<ProcessorLabel, Counter>,
	handler_process_errors: Family<ProcessorLabel, Counter>,
	pub packet_size: Family<ProcessorLabel, Gauge>,
	pub queue_size: Family<ProcessorLabel, Gauge>,
	pub processor_close_seconds: Family<ProcessorLabel, Histogram>,

	reporter_batches_submitted: Family<FormatLabel, Counter>,
	reporter_spans_submitted: Family<FormatLabel, Counter>,
	reporter_batches_failures: Family<FormatLabel, Counter>,

	sampling_requests: Counter,
	sampling_requests_legacy: Counter,
	sampling_bad_requests: Counter,
	sampling_bad_server_responses: Counter,
	sampling_bad_thrift: Counter,
	sampling_write_errors: Counter,
}

impl Metrics {
	pub fn new(registry: &mut Registry) -> Self {
		let packets_processed = Family::default();
		registry.register(
			"thrift_udp_server_packets_processed",
			"Datagrams successfully read and enqueued by a processor",
			packets_processed.clone(),
		);
		let packets_dropped = Family::default();
		registry.register(
			"thrift_udp_server_packets_dropped",
			"Datagrams dropped because the bounded queue was full",
			packets_dropped.clone(),
		);
		let read_errors = Family::default();
		registry.register(
			"thrift_udp_server_read_errors",
			"Datagram read failures",
			read_errors.clone(),
		);
		let handler_process_errors = Family::default();
		registry.register(
			"thrift_udp_server_handler_process_errors",
			"Decoder invocations that returned a processing failure",
			handler_process_errors.clone(),
		);
		let packet_size = Family::default();
		registry.register(
			"thrift_udp_server_packet_size_bytes",
			"Size of the most recently received datagram",
			packet_size.clone(),
		);
		let queue_size = Family::default();
		registry.register(
			"thrift_udp_server_queue_size",
			"Current depth of a processor's bounded ingestion queue",
			queue_size.clone(),
		);
		fn processor_close_seconds_histogram() -> Histogram {
			Histogram::new(prometheus_client::metrics::histogram::exponential_buckets(
				0.001, 2.0, 12,
			))
		}
		let processor_close_seconds: Family<ProcessorLabel, Histogram> =
			Family::new_with_constructor(processor_close_seconds_histogram);
		registry.register(
			"processor_close_seconds",
			"Time spent draining a processor during shutdown",
			processor_close_seconds.clone(),
		);

		let reporter_batches_submitted = Family::default();
		registry.register(
			"reporter_batches_submitted",
			"Batches successfully forwarded to the collector",
			reporter_batches_submitted.clone(),
		);
		let reporter_spans_submitted = Family::default();
		registry.register(
			"reporter_spans_submitted",
			"Spans successfully forwarded to the collector",
			reporter_spans_submitted.clone(),
		);
		let reporter_batches_failures = Family::default();
		registry.register(
			"reporter_batches_failures",
			"Batches that failed to forward to the collector",
			reporter_batches_failures.clone(),
		);

		let sampling_requests = Counter::default();
		registry.register(
			"sampling_server_requests",
			"Successful canonical /sampling requests",
			sampling_requests.clone(),
		);
		let sampling_requests_legacy = Counter::default();
		registry.register(
			"sampling_server_requests_thrift_092",
			"Successful legacy / requests",
			sampling_requests_legacy.clone(),
		);
		let sampling_bad_requests = Counter::default();
		registry.register(
			"sampling_server_bad_requests",
			"Requests rejected for invalid input",
			sampling_bad_requests.clone(),
		);
		let sampling_bad_server_responses = Counter::default();
		registry.register(
			"sampling_server_bad_server_responses",
			"Requests that failed because the collector proxy errored",
			sampling_bad_server_responses.clone(),
		);
		let sampling_bad_thrift = Counter::default();
		registry.register(
			"sampling_server_bad_thrift",
			"Requests that failed to marshal to JSON",
			sampling_bad_thrift.clone(),
		);
		let sampling_write_errors = Counter::default();
		registry.register(
			"sampling_server_write_errors",
			"Responses that failed to write to the client after being committed",
			sampling_write_errors.clone(),
		);

		Self {
			packets_processed,
			packets_dropped,
			read_errors,
			handler_process_errors,
			packet_size,
			queue_size,
			processor_close_seconds,
			reporter_batches_submitted,
			reporter_spans_submitted,
			reporter_batches_failures,
			sampling_requests,
			sampling_requests_legacy,
			sampling_bad_requests,
			sampling_bad_server_responses,
			sampling_bad_thrift,
			sampling_write_errors,
		}
	}
}

impl Recorder<ProcessorEvent, &ProcessorLabel> for Metrics {
	fn record(&self, event: &ProcessorEvent, label: &ProcessorLabel) {
		let family = match event {
			ProcessorEvent::PacketProcessed => &self.packets_processed,
			ProcessorEvent::PacketDropped => &self.packets_dropped,
			ProcessorEvent::ReadError => &self.read_errors,
			ProcessorEvent::HandlerProcessError => &self.handler_process_errors,
		};
		family.get_or_create(label).inc();
	}
}

impl Recorder<ReporterEvent, ()> for Metrics {
	fn record(&self, event: &ReporterEvent, _context: ()) {
		let label = FormatLabel {
			format: event.format.clone(),
		};
		match event.outcome {
			ReporterOutcome::BatchSubmitted { spans } => {
				self.reporter_batches_submitted.get_or_create(&label).inc();
				self
					.reporter_spans_submitted
					.get_or_create(&label)
					.inc_by(spans);
			},
			ReporterOutcome::BatchFailed => {
				self.reporter_batches_failures.get_or_create(&label).inc();
			},
		}
	}
}

impl Recorder<SamplingServerEvent, ()> for Metrics {
	fn record(&self, event: &SamplingServerEvent, _context: ()) {
		let counter = match event {
			SamplingServerEvent::Requests => &self.sampling_requests,
			SamplingServerEvent::RequestsLegacy => &self.sampling_requests_legacy,
			SamplingServerEvent::BadRequests => &self.sampling_bad_requests,
			SamplingServerEvent::BadServerResponses => &self.sampling_bad_server_responses,
			SamplingServerEvent::BadThrift => &self.sampling_bad_thrift,
			SamplingServerEvent::WriteErrors => &self.sampling_write_errors,
		};
		counter.inc();
	}
}

#[cfg(test)]
impl Metrics {
	pub(crate) fn packets_processed(&self, label: &ProcessorLabel) -> u64 {
		self.packets_processed.get_or_create(label).get()
	}

	pub(crate) fn packets_dropped(&self, label: &ProcessorLabel) -> u64 {
		self.packets_dropped.get_or_create(label).get()
	}

	pub(crate) fn handler_process_errors(&self, label: &ProcessorLabel) -> u64 {
		self.handler_process_errors.get_or_create(label).get()
	}
}
