//! A cheaply-clonable interned string, used anywhere a label or tag is
//! attached to many spans/requests and cloned across task boundaries.

use std::borrow::Borrow;
use std::fmt;
use std::ops::Deref;

use prometheus_client::encoding::{EncodeLabelValue, LabelValueEncoder};

#[derive(Clone, Default, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct Strng(arcstr::ArcStr);

pub fn new(s: impl AsRef<str>) -> Strng {
	Strng(arcstr::ArcStr::from(s.as_ref()))
}

impl Strng {
	pub fn as_str(&self) -> &str {
		self.0.as_str()
	}
}

impl Deref for Strng {
	type Target = str;
	fn deref(&self) -> &str {
		self.0.as_str()
	}
}

impl Borrow<str> for Strng {
	fn borrow(&self) -> &str {
		self.0.as_str()
	}
}

impl From<&str> for Strng {
	fn from(s: &str) -> Self {
		new(s)
	}
}

impl From<String> for Strng {
	fn from(s: String) -> Self {
		Strng(arcstr::ArcStr::from(s))
	}
}

impl fmt::Display for Strng {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		fmt::Display::fmt(&self.0, f)
	}
}

impl fmt::Debug for Strng {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		fmt::Debug::fmt(&self.0, f)
	}
}

impl serde::Serialize for Strng {
	fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
		s.serialize_str(self.as_str())
	}
}

impl<'de> serde::Deserialize<'de> for Strng {
	fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
		String::deserialize(d).map(Strng::from)
	}
}

impl EncodeLabelValue for Strng {
	fn encode(&self, encoder: &mut LabelValueEncoder) -> Result<(), fmt::Error> {
		EncodeLabelValue::encode(&self.as_str(), encoder)
	}
}
