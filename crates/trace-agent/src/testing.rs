//! Fixtures for exercising the ingestion pipeline end-to-end. Nothing here
//! is a production span-format implementation — `LengthPrefixedJsonDecoder`
//! exists solely so the pipeline (C1-C6) can be driven by a test without a
//! real collector-grade decoder.

use async_trait::async_trait;

use crate::decoder::{Batch, Decoder, Format, Span};
use crate::errors::DecodeError;

/// Decodes a datagram as a single length-prefix-free JSON document:
/// `{"format": "...", "spans": [{"name": "...", "payload": "base64..."}]}`.
/// Good enough to prove bytes flow from socket to reporter; not a stand-in
/// for a real framing protocol.
#[derive(Debug, Default)]
pub struct LengthPrefixedJsonDecoder;

#[derive(serde::Deserialize)]
struct WireBatch {
	format: String,
	spans: Vec<WireSpan>,
}

#[derive(serde::Deserialize)]
struct WireSpan {
	name: String,
	#[serde(default)]
	payload: Vec<u8>,
}

#[async_trait]
impl Decoder for LengthPrefixedJsonDecoder {
	async fn decode(&self, buf: &[u8]) -> Result<Batch, DecodeError> {
		let wire: WireBatch =
			serde_json::from_slice(buf).map_err(|e| DecodeError::new(e.to_string()))?;
		Ok(Batch {
			format: Format::new(wire.format),
			spans: wire
				.spans
				.into_iter()
				.map(|s| Span {
					name: s.name,
					payload: s.payload,
				})
				.collect(),
		})
	}
}

/// A decoder that always fails, used to exercise `HandlerProcessError`
/// accounting without a malformed payload.
#[derive(Debug, Default)]
pub struct AlwaysFailDecoder;

#[async_trait]
impl Decoder for AlwaysFailDecoder {
	async fn decode(&self, _buf: &[u8]) -> Result<Batch, DecodeError> {
		Err(DecodeError::new("doh"))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn decodes_single_span_batch() {
		let decoder = LengthPrefixedJsonDecoder;
		let payload = br#"{"format":"jaeger","spans":[{"name":"span1"}]}"#;
		let batch = decoder.decode(payload).await.unwrap();
		assert_eq!(batch.format.as_str(), "jaeger");
		assert_eq!(batch.spans.len(), 1);
		assert_eq!(batch.spans[0].name, "span1");
	}
}
