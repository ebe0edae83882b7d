use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use http_body_util::Full;

/// The response body type used by the agent's internal HTTP surfaces
/// (metrics, readiness, sampling proxy). A thin wrapper over `Full<Bytes>`
/// rather than a bare type alias so call sites can construct it from the
/// string and byte types those handlers actually produce.
#[derive(Debug, Default)]
pub struct Body(Full<Bytes>);

pub type Response = http::Response<Body>;
pub type Request = http::Request<hyper::body::Incoming>;

impl Body {
	pub fn empty() -> Self {
		Body(Full::new(Bytes::new()))
	}

	pub fn new(data: impl Into<Bytes>) -> Self {
		Body(Full::new(data.into()))
	}
}

impl From<String> for Body {
	fn from(s: String) -> Self {
		Body::new(s)
	}
}

impl From<&'static str> for Body {
	fn from(s: &'static str) -> Self {
		Body::new(s)
	}
}

impl From<Bytes> for Body {
	fn from(b: Bytes) -> Self {
		Body::new(b)
	}
}

impl From<Vec<u8>> for Body {
	fn from(v: Vec<u8>) -> Self {
		Body::new(v)
	}
}

impl http_body::Body for Body {
	type Data = Bytes;
	type Error = std::convert::Infallible;

	fn poll_frame(
		mut self: Pin<&mut Self>,
		cx: &mut Context<'_>,
	) -> Poll<Option<Result<http_body::Frame<Self::Data>, Self::Error>>> {
		Pin::new(&mut self.0).poll_frame(cx)
	}

	fn is_end_stream(&self) -> bool {
		self.0.is_end_stream()
	}

	fn size_hint(&self) -> http_body::SizeHint {
		self.0.size_hint()
	}
}
