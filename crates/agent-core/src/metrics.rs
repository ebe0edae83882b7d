//! A small, injectable metrics facade. Components depend on `Recorder<Event,
//! Context>` rather than a concrete metrics backend or a process-global
//! singleton; the supervisor constructs the concrete `prometheus_client`
//! implementation once and hands clones of it to whoever needs to record.

use std::fmt;

use prometheus_client::encoding::{EncodeLabelValue, LabelValueEncoder};

/// Record one occurrence of `event`, with `context` carrying whatever
/// additional label data the caller has on hand (often `()`).
pub trait Recorder<E, C> {
	fn record(&self, event: &E, context: C);
}

/// Wraps a label value that may be unset; encodes as `"unknown"` so a
/// `Family` label set doesn't need an `Option` special case at every
/// call site.
#[derive(Clone, Hash, Default, Debug, PartialEq, Eq)]
pub struct DefaultedUnknown<T>(pub Option<T>);

impl<T> From<Option<T>> for DefaultedUnknown<T> {
	fn from(value: Option<T>) -> Self {
		DefaultedUnknown(value)
	}
}

impl<T> From<T> for DefaultedUnknown<T> {
	fn from(value: T) -> Self {
		DefaultedUnknown(Some(value))
	}
}

impl<T: EncodeLabelValue> EncodeLabelValue for DefaultedUnknown<T> {
	fn encode(&self, encoder: &mut LabelValueEncoder) -> Result<(), fmt::Error> {
		match &self.0 {
			Some(v) => v.encode(encoder),
			None => "unknown".encode(encoder),
		}
	}
}

/// Encodes any `Display` value as a label via its `Display` impl, for types
/// (like `http::Method`) that don't implement `EncodeLabelValue` themselves.
#[derive(Clone, Hash, Default, Debug, PartialEq, Eq)]
pub struct EncodeDisplay<T>(pub T);

impl<T> From<T> for EncodeDisplay<T> {
	fn from(value: T) -> Self {
		EncodeDisplay(value)
	}
}

impl<T: fmt::Display> EncodeLabelValue for EncodeDisplay<T> {
	fn encode(&self, encoder: &mut LabelValueEncoder) -> Result<(), fmt::Error> {
		use std::fmt::Write;
		write!(encoder, "{}", self.0)
	}
}
