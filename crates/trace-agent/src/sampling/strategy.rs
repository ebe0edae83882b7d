use serde::Serialize;

/// One service's resolved sampling directive. A tagged union — exactly one
/// variant is ever populated per spec.md §3 — modeled as a Rust enum rather
/// than the protobuf message's three-optional-fields-plus-discriminant
/// shape, which the proxy (C7) and HTTP server (C8) convert to at the edges.
#[derive(Clone, Debug, PartialEq)]
pub enum SamplingStrategy {
	Probabilistic {
		rate: f64,
	},
	RateLimiting {
		max_per_second: i32,
	},
	PerOperation {
		default_rate: f64,
		per_operation: Vec<OperationStrategy>,
	},
}

#[derive(Clone, Debug, PartialEq)]
pub struct OperationStrategy {
	pub name: String,
	pub rate: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct BaggageRestriction {
	pub baggage_key: String,
	pub max_value_length: i32,
}

impl From<&agent_proto::SamplingStrategyResponse> for SamplingStrategy {
	fn from(resp: &agent_proto::SamplingStrategyResponse) -> Self {
		if let Some(per_op) = &resp.operation_sampling {
			return SamplingStrategy::PerOperation {
				default_rate: per_op.default_sampling_probability,
				per_operation: per_op
					.per_operation_strategies
					.iter()
					.map(|s| OperationStrategy {
						name: s.operation.clone(),
						rate: s
							.probabilistic_sampling
							.as_ref()
							.map(|p| p.sampling_rate)
							.unwrap_or_default(),
					})
					.collect(),
			};
		}
		if resp.strategy_type == agent_proto::SamplingStrategyType::RateLimiting as i32 {
			return SamplingStrategy::RateLimiting {
				max_per_second: resp
					.rate_limiting_sampling
					.as_ref()
					.map(|r| r.max_traces_per_second)
					.unwrap_or_default(),
			};
		}
		SamplingStrategy::Probabilistic {
			rate: resp
				.probabilistic_sampling
				.as_ref()
				.map(|p| p.sampling_rate)
				.unwrap_or_default(),
		}
	}
}

impl From<agent_proto::BaggageRestriction> for BaggageRestriction {
	fn from(r: agent_proto::BaggageRestriction) -> Self {
		BaggageRestriction {
			baggage_key: r.baggage_key,
			max_value_length: r.max_value_length,
		}
	}
}

/// The legacy-shaped JSON wire object (Open Question #1: the HTTP server
/// emits this converted shape, not the raw protobuf-shaped message — see
/// DESIGN.md). Field names and the `strategyType` string values mirror what
/// client libraries generated against the older thrift-derived schema
/// expect.
#[derive(Serialize)]
struct WireProbabilistic {
	#[serde(rename = "samplingRate")]
	sampling_rate: f64,
}

#[derive(Serialize)]
struct WireRateLimiting {
	#[serde(rename = "maxTracesPerSecond")]
	max_traces_per_second: i32,
}

#[derive(Serialize)]
struct WireOperationStrategy {
	operation: String,
	#[serde(rename = "probabilisticSampling")]
	probabilistic_sampling: WireProbabilistic,
}

#[derive(Serialize)]
struct WirePerOperation {
	#[serde(rename = "defaultSamplingProbability")]
	default_sampling_probability: f64,
	#[serde(rename = "perOperationStrategies")]
	per_operation_strategies: Vec<WireOperationStrategy>,
}

#[derive(Serialize)]
struct WireStrategy {
	#[serde(rename = "strategyType")]
	strategy_type: &'static str,
	#[serde(skip_serializing_if = "Option::is_none", rename = "probabilisticSampling")]
	probabilistic_sampling: Option<WireProbabilistic>,
	#[serde(skip_serializing_if = "Option::is_none", rename = "rateLimitingSampling")]
	rate_limiting_sampling: Option<WireRateLimiting>,
	#[serde(skip_serializing_if = "Option::is_none", rename = "operationSampling")]
	operation_sampling: Option<WirePerOperation>,
}

impl SamplingStrategy {
	/// Serializes to the canonical JSON shape. `serde_json` failures here
	/// (e.g. a NaN rate, which JSON cannot represent) become the HTTP
	/// server's `Cannot marshal strategy to JSON` 500, per spec.md §4.8.
	pub fn to_json(&self) -> Result<String, serde_json::Error> {
		let wire = match self {
			SamplingStrategy::Probabilistic { rate } => WireStrategy {
				strategy_type: "PROBABILISTIC",
				probabilistic_sampling: Some(WireProbabilistic { sampling_rate: *rate }),
				rate_limiting_sampling: None,
				operation_sampling: None,
			},
			SamplingStrategy::RateLimiting { max_per_second } => WireStrategy {
				strategy_type: "RATE_LIMITING",
				probabilistic_sampling: None,
				rate_limiting_sampling: Some(WireRateLimiting {
					max_traces_per_second: *max_per_second,
				}),
				operation_sampling: None,
			},
			SamplingStrategy::PerOperation {
				default_rate,
				per_operation,
			} => WireStrategy {
				strategy_type: "PROBABILISTIC",
				probabilistic_sampling: None,
				rate_limiting_sampling: None,
				operation_sampling: Some(WirePerOperation {
					default_sampling_probability: *default_rate,
					per_operation_strategies: per_operation
						.iter()
						.map(|op| WireOperationStrategy {
							operation: op.name.clone(),
							probabilistic_sampling: WireProbabilistic { sampling_rate: op.rate },
						})
						.collect(),
				}),
			},
		};
		serde_json::to_string(&wire)
	}
}

/// Rewrites `strategyType`'s string encoding to its ordinal integer, for
/// clients generated against the pre-protobuf schema (spec.md §4.8). A pure
/// narrow string substitution, replacing at most one occurrence per enum
/// value — not a structured re-encoding — so a value embedded inside an
/// unrelated string literal with the same text is unaffected (testable
/// property 5, spec.md §8).
pub fn rewrite_legacy_enum(json: &str) -> String {
	let json = replace_at_most_once(json, "\"strategyType\":\"PROBABILISTIC\"", "\"strategyType\":0");
	replace_at_most_once(&json, "\"strategyType\":\"RATE_LIMITING\"", "\"strategyType\":1")
}

fn replace_at_most_once(haystack: &str, needle: &str, replacement: &str) -> String {
	match haystack.find(needle) {
		Some(idx) => {
			let mut out = String::with_capacity(haystack.len());
			out.push_str(&haystack[..idx]);
			out.push_str(replacement);
			out.push_str(&haystack[idx + needle.len()..]);
			out
		},
		None => haystack.to_string(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn probabilistic_serializes_to_canonical_shape() {
		let s = SamplingStrategy::Probabilistic { rate: 0.01 };
		let json = s.to_json().unwrap();
		assert_eq!(
			json,
			r#"{"strategyType":"PROBABILISTIC","probabilisticSampling":{"samplingRate":0.01}}"#
		);
	}

	#[test]
	fn legacy_rewrite_replaces_exactly_one_occurrence() {
		let json = r#"{"strategyType":"PROBABILISTIC","probabilisticSampling":{"samplingRate":0.01}}"#;
		let rewritten = rewrite_legacy_enum(json);
		assert_eq!(
			rewritten,
			r#"{"strategyType":0,"probabilisticSampling":{"samplingRate":0.01}}"#
		);
	}

	#[test]
	fn legacy_rewrite_does_not_touch_unrelated_occurrences() {
		let json = r#"{"strategyType":"RATE_LIMITING","note":"strategyType:\"PROBABILISTIC\" mentioned here"}"#;
		let rewritten = rewrite_legacy_enum(json);
		assert!(rewritten.starts_with(r#"{"strategyType":1,"#));
		assert!(rewritten.contains("PROBABILISTIC"));
	}

	#[test]
	fn round_trips_through_legacy_rewrite() {
		let s = SamplingStrategy::Probabilistic { rate: 0.5 };
		let json = s.to_json().unwrap();
		let rewritten = rewrite_legacy_enum(&json);
		let value: serde_json::Value = serde_json::from_str(&rewritten).unwrap();
		assert_eq!(value["strategyType"], 0);
		assert_eq!(value["probabilisticSampling"]["samplingRate"], 0.5);
	}
}
