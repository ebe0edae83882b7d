use std::net::SocketAddr;
use std::sync::Arc;

use agent_core::drain::DrainWatcher;

use crate::Address;
use crate::http::{Body, Response};
use crate::management::hyper_helpers;
use crate::metrics::{Metrics, SamplingServerEvent};
use crate::sampling::proxy::SamplingProxy;
use crate::sampling::strategy::rewrite_legacy_enum;
use agent_core::metrics::Recorder;

struct State {
	proxy: SamplingProxy,
	metrics: Arc<Metrics>,
}

/// Sampling HTTP Server (C8): `GET /sampling` (canonical) and `GET /`
/// (legacy, enum-rewritten). Built on the same generic `hyper`-based
/// `Server<State>` the metrics/readiness admin endpoints use, rather than a
/// full web framework — the surface is two routes with hand-rolled query
/// parsing, matching spec.md §4.8's description exactly.
pub struct Server {
	s: hyper_helpers::Server<State>,
}

impl Server {
	pub async fn new(
		address: Address,
		drain_rx: DrainWatcher,
		proxy: SamplingProxy,
		metrics: Arc<Metrics>,
	) -> anyhow::Result<Self> {
		hyper_helpers::Server::<State>::bind("sampling", address, drain_rx, State { proxy, metrics })
			.await
			.map(|s| Server { s })
	}

	pub fn address(&self) -> SocketAddr {
		self.s.address()
	}

	pub fn spawn(self) {
		self.s.spawn_with_on_write_error(
			|state, req| async move {
				match req.uri().path() {
					"/sampling" => Ok(handle(&state, req.uri().query(), false).await),
					"/" => Ok(handle(&state, req.uri().query(), true).await),
					_ => Ok(hyper_helpers::empty_response(hyper::StatusCode::NOT_FOUND)),
				}
			},
			|state: &State| {
				state.metrics.record(&SamplingServerEvent::WriteErrors, ());
			},
		)
	}
}

fn query_params<'a>(query: Option<&'a str>, key: &str) -> Vec<&'a str> {
	let Some(query) = query else { return vec![] };
	query
		.split('&')
		.filter_map(|pair| pair.split_once('='))
		.filter(|(k, _)| *k == key)
		.map(|(_, v)| v)
		.collect()
}

async fn handle(state: &State, query: Option<&str>, legacy: bool) -> Response {
	let services = query_params(query, "service");
	if services.is_empty() {
		state.metrics.record(&SamplingServerEvent::BadRequests, ());
		return bad_request("'service' parameter is empty");
	}
	if services.len() > 1 {
		state.metrics.record(&SamplingServerEvent::BadRequests, ());
		return bad_request("'service' parameter must occur only once");
	}
	let service = services[0];

	let strategy = match state.proxy.get_sampling_strategy(service).await {
		Ok(s) => s,
		Err(err) => {
			state
				.metrics
				.record(&SamplingServerEvent::BadServerResponses, ());
			return internal_error(format!("collector error: {err}"));
		},
	};

	let json = match strategy.to_json() {
		Ok(j) => j,
		Err(_) => {
			state.metrics.record(&SamplingServerEvent::BadThrift, ());
			return internal_error("Cannot marshal strategy to JSON");
		},
	};

	let body = if legacy { rewrite_legacy_enum(&json) } else { json };

	state.metrics.record(
		&if legacy {
			SamplingServerEvent::RequestsLegacy
		} else {
			SamplingServerEvent::Requests
		},
		(),
	);

	::http::Response::builder()
		.status(hyper::StatusCode::OK)
		.header(hyper::header::CONTENT_TYPE, "application/json")
		.body(Body::new(body))
		.expect("builder with known status code should not fail")
}

fn bad_request(msg: &str) -> Response {
	::http::Response::builder()
		.status(hyper::StatusCode::BAD_REQUEST)
		.header(hyper::header::CONTENT_TYPE, "text/plain")
		.body(Body::new(format!("{msg}\n")))
		.expect("builder with known status code should not fail")
}

fn internal_error(msg: impl Into<String>) -> Response {
	::http::Response::builder()
		.status(hyper::StatusCode::INTERNAL_SERVER_ERROR)
		.header(hyper::header::CONTENT_TYPE, "text/plain")
		.body(Body::new(format!("{}\n", msg.into())))
		.expect("builder with known status code should not fail")
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn query_params_parses_single_value() {
		assert_eq!(query_params(Some("service=foo"), "service"), vec!["foo"]);
	}

	#[test]
	fn query_params_detects_repeats() {
		assert_eq!(
			query_params(Some("service=foo&service=bar"), "service"),
			vec!["foo", "bar"]
		);
	}

	#[test]
	fn query_params_empty_when_absent() {
		assert!(query_params(Some("other=1"), "service").is_empty());
		assert!(query_params(None, "service").is_empty());
	}
}
