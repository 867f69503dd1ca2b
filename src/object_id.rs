use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};

use crate::error::Error;

/// Length in bytes of a binary [`ObjectId`].
pub const OBJECT_ID_LEN: usize = 20;

/// An identifier for a particular piece of binary content.
/// Under the hood, this is a SHA-1 digest of the object's canonical form.
///
/// It is displayed in lowercase hexadecimal format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId([u8; OBJECT_ID_LEN]);

impl ObjectId {
    /// Hashes an arbitrary byte sequence. Any input, including an empty one, is valid.
    pub fn digest(bytes: &[u8]) -> Self {
        let mut hasher = Sha1::new();
        hasher.update(bytes);
        ObjectId(hasher.finalize().into())
    }

    pub fn from_bytes(bytes: [u8; OBJECT_ID_LEN]) -> Self {
        ObjectId(bytes)
    }

    /// Reads an id from the first 20 bytes of `bytes`, if there are that many.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let raw: [u8; OBJECT_ID_LEN] = bytes.get(..OBJECT_ID_LEN)?.try_into().ok()?;
        Some(ObjectId(raw))
    }

    pub fn as_bytes(&self) -> &[u8; OBJECT_ID_LEN] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for ObjectId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != OBJECT_ID_LEN * 2 {
            return Err(Error::InvalidObjectId(s.to_owned()));
        }
        let mut raw = [0u8; OBJECT_ID_LEN];
        hex::decode_to_slice(s, &mut raw).map_err(|_| Error::InvalidObjectId(s.to_owned()))?;
        Ok(ObjectId(raw))
    }
}

impl From<&[u8]> for ObjectId {
    fn from(bytes: &[u8]) -> Self {
        ObjectId::digest(bytes)
    }
}

impl Serialize for ObjectId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.to_hex().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ObjectId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s: String = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[test]
fn test_digest_matches_known_value() {
    let id = ObjectId::digest(b"blob 12\0hello world\n");
    assert_eq!(id.to_string(), "3b18e512dba79e4c8300dd08aeb37f8e728b8dad");
}

#[test]
fn test_hex_round_trip() {
    let id = ObjectId::digest(b"tree 0\0");
    let parsed: ObjectId = id.to_string().parse().unwrap();
    assert_eq!(id, parsed);
    assert_eq!(id.to_string(), "4b825dc642cb6eb9a060e54bf8d69288fbee4904");
}

#[test]
fn test_rejects_bad_hex() {
    assert!("4b825dc6".parse::<ObjectId>().is_err());
    assert!("zz825dc642cb6eb9a060e54bf8d69288fbee4904"
        .parse::<ObjectId>()
        .is_err());
}

#[test]
fn test_one_byte_changes_id() {
    assert_ne!(ObjectId::digest(b"blob 2\0hi"), ObjectId::digest(b"blob 2\0ho"));
}

#[test]
fn test_serde_as_hex() {
    let id = ObjectId::digest(b"blob 0\0");
    let json = serde_json::to_string(&id).unwrap();
    assert_eq!(json, "\"e69de29bb2d1d6434b8b29ae775ad8c2e48c5391\"");
    let id_: ObjectId = serde_json::from_str(&json).unwrap();
    assert_eq!(id, id_);
}
