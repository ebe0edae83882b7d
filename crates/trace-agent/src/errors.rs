use thiserror::Error;

/// Failures opening or tearing down a [`crate::transport::Transport`].
#[derive(Debug, Error)]
pub enum TransportError {
	#[error("address already in use: {0}")]
	AddressInUse(std::net::SocketAddr),
	#[error("failed to resolve bind address: {0}")]
	ResolveFailed(#[source] std::io::Error),
	#[error("transport already closed")]
	AlreadyClosed,
	#[error("transport not open")]
	NotOpen,
	#[error(transparent)]
	Io(#[from] std::io::Error),
}

/// Opaque decode failure surfaced by a [`crate::decoder::Decoder`].
///
/// The core never inspects the cause beyond logging and counting it — the
/// decoder is an external collaborator, so its error detail is carried as a
/// string rather than a structured variant set the core would need to know
/// about.
#[derive(Debug, Error)]
#[error("decode failed: {0}")]
pub struct DecodeError(pub String);

impl DecodeError {
	pub fn new(msg: impl Into<String>) -> Self {
		DecodeError(msg.into())
	}
}

/// Failures forwarding a decoded batch to the collector (C6).
#[derive(Debug, Error)]
pub enum ReportError {
	#[error(transparent)]
	Rpc(#[from] tonic::Status),
	#[error(transparent)]
	Transport(#[from] tonic::transport::Error),
	#[error("invalid collector endpoint: {0}")]
	InvalidEndpoint(String),
}

/// Failures resolving a sampling strategy or baggage restriction (C7).
#[derive(Debug, Error)]
pub enum SamplingError {
	#[error("failed to get sampling strategy: {0}")]
	Rpc(tonic::Status),
	#[error("not implemented")]
	NotImplemented,
}

impl From<tonic::Status> for SamplingError {
	fn from(status: tonic::Status) -> Self {
		SamplingError::Rpc(status)
	}
}

/// Failures surfaced to an HTTP client of the sampling server (C8).
#[derive(Debug, Error)]
pub enum SamplingHttpError {
	#[error("{0}")]
	BadRequest(String),
	#[error("{0}")]
	Internal(String),
}

/// Lifecycle misuse (C10): double-close, start-after-stop.
#[derive(Debug, Error)]
pub enum LifecycleError {
	#[error("already closed")]
	AlreadyClosed,
	#[error("already started")]
	AlreadyStarted,
	#[error("invalid argument: {0}")]
	InvalidArgument(String),
}
