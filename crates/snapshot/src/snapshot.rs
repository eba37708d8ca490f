use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Errors from snapshot encoding, decoding and verification.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("CBOR serialization error: {0}")]
    Encode(String),
    #[error("CBOR deserialization error: {0}")]
    Decode(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("integrity check failed: expected {expected}, got {actual}")]
    IntegrityMismatch { expected: String, actual: String },
    #[error("schema version mismatch: data has v{found}, expected v{expected}")]
    SchemaMismatch { found: u32, expected: u32 },
}

/// Serialized, self-contained representation of a state value.
///
/// CBOR bytes owned by the payload. Nothing in a payload refers back to the
/// value it was produced from.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Payload(Vec<u8>);

impl Payload {
    /// Encode any serializable value.
    pub fn encode<S: Serialize + ?Sized>(value: &S) -> Result<Self, SnapshotError> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf)
            .map_err(|e| SnapshotError::Encode(e.to_string()))?;
        Ok(Self(buf))
    }

    /// Decode into a freshly allocated value.
    pub fn decode<S: DeserializeOwned>(&self) -> Result<S, SnapshotError> {
        ciborium::from_reader(self.0.as_slice()).map_err(|e| SnapshotError::Decode(e.to_string()))
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// SHA-256 of the payload bytes, lowercase hex.
    pub fn digest(&self) -> String {
        sha256_hex(&self.0)
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Payload({} bytes)", self.0.len())
    }
}

/// A point-in-time copy of a state value.
///
/// Only plain data round-trips: types holding closures do not implement
/// `Serialize`, and shared reference graphs (`Rc`/`Arc` cycles) are not
/// serializable without serde's `rc` feature, which is not enabled.
#[derive(Debug, Clone, PartialEq)]
pub struct StateSnapshot<S> {
    state: S,
}

impl<S> StateSnapshot<S> {
    /// Wrap an owned state value.
    pub fn new(state: S) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &S {
        &self.state
    }

    pub fn into_state(self) -> S {
        self.state
    }
}

impl<S: Serialize> StateSnapshot<S> {
    /// Produce a detached payload of the wrapped state.
    pub fn serialize(&self) -> Result<Payload, SnapshotError> {
        Payload::encode(&self.state)
    }
}

impl<S: DeserializeOwned> StateSnapshot<S> {
    /// Rebuild a snapshot from a payload.
    ///
    /// The result is a new value, never an alias of whatever produced the
    /// payload. Malformed or shape-incompatible payloads fail with
    /// [`SnapshotError::Decode`].
    pub fn deserialize(payload: &Payload) -> Result<Self, SnapshotError> {
        payload.decode().map(Self::new)
    }
}

impl<S: Serialize + DeserializeOwned> StateSnapshot<S> {
    /// Capture a borrowed live state as a structurally separate copy.
    pub fn capture(state: &S) -> Result<Self, SnapshotError> {
        Self::deserialize(&Payload::encode(state)?)
    }
}

pub(crate) fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Counter {
        value: i64,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Nested {
        label: String,
        scores: Vec<u32>,
        children: BTreeMap<String, Counter>,
        note: Option<String>,
    }

    #[test]
    fn serialize_deserialize_roundtrip() {
        let snapshot = StateSnapshot::new(Counter { value: 42 });
        let serialized = snapshot.serialize().unwrap();
        let restored = StateSnapshot::<Counter>::deserialize(&serialized).unwrap();
        assert_eq!(restored.state().value, 42);
    }

    #[test]
    fn nested_state_roundtrip() {
        let mut children = BTreeMap::new();
        children.insert("a".to_string(), Counter { value: 1 });
        children.insert("b".to_string(), Counter { value: -9 });
        let state = Nested {
            label: "encounter".into(),
            scores: vec![3, 1, 4],
            children,
            note: None,
        };

        let payload = StateSnapshot::new(state.clone()).serialize().unwrap();
        let restored = StateSnapshot::<Nested>::deserialize(&payload).unwrap();
        assert_eq!(restored.state(), &state);
    }

    #[test]
    fn payload_is_isolated_from_live_state() {
        let mut live = Counter { value: 1 };
        let payload = Payload::encode(&live).unwrap();
        live.value = 99;

        let restored: Counter = payload.decode().unwrap();
        assert_eq!(restored.value, 1);
    }

    #[test]
    fn deserialized_state_is_a_distinct_allocation() {
        let live = Nested {
            label: "x".into(),
            scores: vec![1, 2, 3],
            children: BTreeMap::new(),
            note: Some("n".into()),
        };
        let captured = StateSnapshot::capture(&live).unwrap();
        assert_eq!(captured.state(), &live);
        assert!(!std::ptr::eq(captured.state(), &live));
        assert_ne!(captured.state().scores.as_ptr(), live.scores.as_ptr());
        assert_ne!(captured.state().label.as_ptr(), live.label.as_ptr());
    }

    #[test]
    fn malformed_payload_is_decode_error() {
        let payload = Payload::from_bytes(vec![0xff, 0x00, 0x13]);
        let err = StateSnapshot::<Counter>::deserialize(&payload).unwrap_err();
        assert!(matches!(err, SnapshotError::Decode(_)));
    }

    #[test]
    fn incompatible_shape_is_decode_error() {
        let payload = Payload::encode(&vec!["not", "a", "counter"]).unwrap();
        let err = StateSnapshot::<Counter>::deserialize(&payload).unwrap_err();
        assert!(matches!(err, SnapshotError::Decode(_)));
    }

    #[test]
    fn digest_tracks_content() {
        let a = Payload::encode(&Counter { value: 1 }).unwrap();
        let b = Payload::encode(&Counter { value: 1 }).unwrap();
        let c = Payload::encode(&Counter { value: 2 }).unwrap();
        assert_eq!(a.digest(), b.digest());
        assert_ne!(a.digest(), c.digest());
        assert_eq!(a.digest().len(), 64);
    }
}
