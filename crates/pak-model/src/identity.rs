//! Object identity types.
//!
//! Every addressable piece of content is identified by the source asset file
//! that contains it (a 128-bit GUID) plus a local identifier and type tag
//! within that file. Identifiers are plain values: cheap to copy, totally
//! ordered, and usable as set/map keys so that build output is deterministic.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Stable 128-bit identifier of a source asset file.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct Guid(pub Uuid);

impl Guid {
    /// Parse from the canonical hyphenated form.
    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Uuid::parse_str(s).map(Guid)
    }

    /// Raw 16-byte representation, used when hashing identifiers.
    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }

    /// A random GUID. Fixture helper; real GUIDs come from the asset store.
    pub fn random() -> Self {
        Guid(Uuid::new_v4())
    }
}

impl From<Uuid> for Guid {
    fn from(value: Uuid) -> Self {
        Guid(value)
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifies one object inside one source asset.
///
/// A single asset file may contain many objects, several of the same type;
/// `local_id` makes each unique within the file. Ordering is by GUID, then
/// local id, then type tag.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct ObjectIdentifier {
    /// Source asset file that contains this object.
    pub guid: Guid,

    /// Unique identifier of the object within its file.
    pub local_id: i64,

    /// Type tag of the object within the file.
    pub type_tag: i32,
}

impl ObjectIdentifier {
    pub fn new(guid: Guid, local_id: i64, type_tag: i32) -> Self {
        Self {
            guid,
            local_id,
            type_tag,
        }
    }
}

impl fmt::Display for ObjectIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}:{}", self.guid, self.local_id, self.type_tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guid(byte: u8) -> Guid {
        Guid(Uuid::from_bytes([byte; 16]))
    }

    #[test]
    fn test_ordering_is_guid_then_local_id_then_type() {
        let a = ObjectIdentifier::new(guid(1), 5, 9);
        let b = ObjectIdentifier::new(guid(2), 1, 1);
        let c = ObjectIdentifier::new(guid(1), 6, 1);
        let d = ObjectIdentifier::new(guid(1), 5, 10);

        assert!(a < b);
        assert!(a < c);
        assert!(a < d);
        assert!(d < c);
    }

    #[test]
    fn test_value_equality() {
        let a = ObjectIdentifier::new(guid(3), 42, 7);
        let b = ObjectIdentifier::new(guid(3), 42, 7);
        assert_eq!(a, b);
    }

    #[test]
    fn test_guid_parse_roundtrip() {
        let g = guid(0xab);
        let parsed = Guid::parse(&g.to_string()).unwrap();
        assert_eq!(g, parsed);
    }

    #[test]
    fn test_display_contains_all_fields() {
        let id = ObjectIdentifier::new(guid(1), 42, 7);
        let s = id.to_string();
        assert!(s.contains("42"));
        assert!(s.contains('7'));
    }
}
