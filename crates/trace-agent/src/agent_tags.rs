use std::collections::HashMap;

use tonic::metadata::{Ascii, MetadataKey, MetadataMap, MetadataValue};

/// Static labels established at startup and attached as out-of-band
/// transport metadata on every outbound control-plane (and reporting) RPC,
/// so collectors can observe agent identity. Read-only after construction
/// (spec.md §5).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AgentTags(HashMap<String, String>);

impl AgentTags {
	pub fn new(tags: HashMap<String, String>) -> Self {
		AgentTags(tags)
	}

	pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
		self.0.iter()
	}

	/// Attaches every tag to `req`'s metadata. Tags whose key or value is not
	/// valid ASCII metadata are skipped rather than failing the call — an
	/// agent identity label should never block a batch from shipping.
	pub fn apply(&self, metadata: &mut MetadataMap) {
		for (k, v) in &self.0 {
			let Ok(key) = k.parse::<MetadataKey<Ascii>>() else {
				continue;
			};
			let Ok(value) = MetadataValue::try_from(v.as_str()) else {
				continue;
			};
			metadata.insert(key, value);
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn applies_valid_tags_to_metadata() {
		let mut tags = HashMap::new();
		tags.insert("agent-host".to_string(), "host-1".to_string());
		let tags = AgentTags::new(tags);
		let mut metadata = MetadataMap::new();
		tags.apply(&mut metadata);
		assert_eq!(metadata.get("agent-host").unwrap(), "host-1");
	}

	#[test]
	fn skips_invalid_metadata_values() {
		let mut tags = HashMap::new();
		tags.insert("agent-host".to_string(), "not\nascii".to_string());
		let tags = AgentTags::new(tags);
		let mut metadata = MetadataMap::new();
		tags.apply(&mut metadata);
		assert!(metadata.get("agent-host").is_none());
	}
}
