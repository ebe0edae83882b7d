// Generated from proto/collector.proto
#[allow(warnings)]
#[allow(clippy::derive_partial_eq_without_eq)]
pub mod agent {
	pub mod collector {
		pub mod v1 {
			tonic::include_proto!("agent.collector.v1");
		}
	}
}

pub use agent::collector::v1::*;
