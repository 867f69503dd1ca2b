use std::str::FromStr;

use derive_more::Display;
use serde::{Deserialize, Serialize};

use crate::{error::Malformed, object_id::ObjectId};

/// The three kinds of object the store knows how to hold.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    #[display(fmt = "blob")]
    Blob,
    #[display(fmt = "tree")]
    Tree,
    #[display(fmt = "commit")]
    Commit,
}

impl FromStr for ObjectKind {
    type Err = Malformed;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "blob" => Ok(ObjectKind::Blob),
            "tree" => Ok(ObjectKind::Tree),
            "commit" => Ok(ObjectKind::Commit),
            other => Err(Malformed::UnknownKind(other.to_owned())),
        }
    }
}

/// A decoded object: its kind and the payload without the header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Object {
    pub kind: ObjectKind,
    pub payload: Vec<u8>,
}

impl Object {
    pub fn new(kind: ObjectKind, payload: Vec<u8>) -> Self {
        Self { kind, payload }
    }

    /// The exact bytes that are hashed and stored: `<kind> <len>\0<payload>`.
    pub fn canonical(&self) -> Vec<u8> {
        canonical(self.kind, &self.payload)
    }

    pub fn id(&self) -> ObjectId {
        ObjectId::digest(&self.canonical())
    }

    /// Splits canonical bytes back into kind and payload, checking the header.
    pub fn parse(bytes: &[u8]) -> Result<Self, Malformed> {
        let nul = bytes
            .iter()
            .position(|&b| b == 0)
            .ok_or(Malformed::MissingHeader)?;
        let header = std::str::from_utf8(&bytes[..nul]).map_err(|_| Malformed::MissingHeader)?;
        let (kind, len) = header.split_once(' ').ok_or(Malformed::MissingHeader)?;
        let kind: ObjectKind = kind.parse()?;
        if len.is_empty() || !len.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Malformed::BadLength(len.to_owned()));
        }
        let declared: usize = len
            .parse()
            .map_err(|_| Malformed::BadLength(len.to_owned()))?;
        let payload = &bytes[nul + 1..];
        if declared != payload.len() {
            return Err(Malformed::LengthMismatch {
                declared,
                actual: payload.len(),
            });
        }
        Ok(Object::new(kind, payload.to_vec()))
    }
}

/// Builds the canonical serialized form for `kind` and `payload`.
pub fn canonical(kind: ObjectKind, payload: &[u8]) -> Vec<u8> {
    let header = format!("{} {}\0", kind, payload.len());
    let mut bytes = Vec::with_capacity(header.len() + payload.len());
    bytes.extend_from_slice(header.as_bytes());
    bytes.extend_from_slice(payload);
    bytes
}

#[test]
fn test_canonical_header() {
    assert_eq!(canonical(ObjectKind::Blob, b"hi"), b"blob 2\0hi");
    assert_eq!(canonical(ObjectKind::Tree, b""), b"tree 0\0");
    assert_eq!(
        Object::new(ObjectKind::Blob, Vec::new()).id().to_string(),
        "e69de29bb2d1d6434b8b29ae775ad8c2e48c5391"
    );
}

#[test]
fn test_parse_keeps_embedded_nuls() {
    let object = Object::parse(b"blob 5\0a\0b\0c").unwrap();
    assert_eq!(object.kind, ObjectKind::Blob);
    assert_eq!(object.payload, b"a\0b\0c");
}

#[test]
fn test_parse_rejects_bad_headers() {
    assert_eq!(Object::parse(b"blob 2hi"), Err(Malformed::MissingHeader));
    assert_eq!(Object::parse(b"blob2\0hi"), Err(Malformed::MissingHeader));
    assert_eq!(
        Object::parse(b"tag 2\0hi"),
        Err(Malformed::UnknownKind("tag".into()))
    );
    assert_eq!(
        Object::parse(b"blob +2\0hi"),
        Err(Malformed::BadLength("+2".into()))
    );
    assert_eq!(
        Object::parse(b"blob \0"),
        Err(Malformed::BadLength("".into()))
    );
    assert_eq!(
        Object::parse(b"blob 3\0hi"),
        Err(Malformed::LengthMismatch {
            declared: 3,
            actual: 2
        })
    );
}

#[test]
fn test_kind_round_trip() {
    for kind in [ObjectKind::Blob, ObjectKind::Tree, ObjectKind::Commit] {
        assert_eq!(kind.to_string().parse::<ObjectKind>(), Ok(kind));
    }
}
