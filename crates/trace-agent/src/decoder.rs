use agent_core::strng::Strng;
use async_trait::async_trait;

use crate::errors::DecodeError;

/// A label identifying the wire encoding of a [`Batch`] (e.g. `jaeger`,
/// `zipkin`). A `String` newtype rather than a closed enum — per spec.md §3 /
/// SPEC_FULL.md §5 — so a new decoder can register a format without a core
/// code change; the core only ever uses it as a metric label.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct Format(Strng);

impl Format {
	pub fn new(s: impl Into<Strng>) -> Self {
		Format(s.into())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}

	pub(crate) fn label(&self) -> Strng {
		self.0.clone()
	}
}

impl std::fmt::Display for Format {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.0)
	}
}

/// One span record inside a decoded [`Batch`]. The core never inspects a
/// span's contents beyond its name (used only in tests and logging); the
/// payload is opaque bytes the decoder produced and the Reporter forwards
/// untouched.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Span {
	pub name: String,
	pub payload: Vec<u8>,
}

/// The decoder's output: a tagged value carrying a format label and a
/// vector of span records. Immutable after decoding (spec.md §3).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Batch {
	pub format: Format,
	pub spans: Vec<Span>,
}

/// Frame Decoder (C5): the sole collaborator interface between the worker
/// pool and span deserialization. Turns raw datagram bytes into a
/// structured batch; opaque to the core, which only ever invokes `decode`
/// and counts the outcome — no wire codec is implemented here.
#[async_trait]
pub trait Decoder: Send + Sync {
	async fn decode(&self, buf: &[u8]) -> Result<Batch, DecodeError>;
}
