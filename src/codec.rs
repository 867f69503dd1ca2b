use crate::{
    error::{Error, Malformed},
    object::{canonical, Object, ObjectKind},
    object_id::ObjectId,
    object_store::ObjectStore,
};

/// Reading and writing typed objects through any [`ObjectStore`].
pub trait ObjectCodec {
    /// Hashes `<kind> <len>\0<payload>`, stores it under that hash and returns the hash.
    fn encode(&mut self, kind: ObjectKind, payload: &[u8]) -> Result<ObjectId, Error>;

    /// Reads the object stored under `id` and splits off its header.
    fn decode(&self, id: ObjectId) -> Result<Object, Error>;

    /// Like [`ObjectCodec::decode`], but fails unless the object is of `kind`.
    /// Returns the bare payload.
    fn decode_as(&self, id: ObjectId, kind: ObjectKind) -> Result<Vec<u8>, Error> {
        let object = self.decode(id)?;
        if object.kind != kind {
            return Err(Malformed::UnexpectedKind {
                expected: kind.to_string(),
                found: object.kind.to_string(),
            }
            .into());
        }
        Ok(object.payload)
    }
}

impl<S> ObjectCodec for S
where
    S: ObjectStore,
    Error: From<S::Error>,
{
    fn encode(&mut self, kind: ObjectKind, payload: &[u8]) -> Result<ObjectId, Error> {
        let bytes = canonical(kind, payload);
        let id = ObjectId::digest(&bytes);
        log::debug!("encoded {} {} ({} bytes)", kind, id, payload.len());
        self.write(id, &bytes)?;
        Ok(id)
    }

    fn decode(&self, id: ObjectId) -> Result<Object, Error> {
        match self.read(id)? {
            None => Err(Error::NotFound(id)),
            Some(bytes) => Ok(Object::parse(&bytes)?),
        }
    }
}

#[cfg(test)]
mod test_support {
    use crate::object_store::directory::DirectoryObjectStore;

    pub fn store() -> (tempfile::TempDir, DirectoryObjectStore) {
        let tempdir = tempfile::tempdir().unwrap();
        let store = DirectoryObjectStore::new(tempdir.path().join("objects")).unwrap();
        (tempdir, store)
    }
}

#[test]
fn test_blob_round_trip() {
    let (_tempdir, mut store) = test_support::store();
    let large = vec![0xffu8; 70_000];
    let payloads: [&[u8]; 4] = [b"", b"hi", b"a\0b\0\0c", &large];
    for payload in payloads {
        let id = store.encode(ObjectKind::Blob, payload).unwrap();
        let object = store.decode(id).unwrap();
        assert_eq!(object.kind, ObjectKind::Blob);
        assert_eq!(object.payload, payload);
    }
}

#[test]
fn test_encode_is_deterministic() {
    let (_tempdir, mut store) = test_support::store();
    let first = store.encode(ObjectKind::Blob, b"hello world\n").unwrap();
    let second = store.encode(ObjectKind::Blob, b"hello world\n").unwrap();
    assert_eq!(first, second);
    assert_eq!(first.to_string(), "3b18e512dba79e4c8300dd08aeb37f8e728b8dad");
}

#[test]
fn test_id_covers_header() {
    let mut store = crate::object_store::in_memory::InMemoryObjectStore::new();
    let blob = store.encode(ObjectKind::Blob, b"").unwrap();
    let tree = store.encode(ObjectKind::Tree, b"").unwrap();
    assert_ne!(blob, tree);
    assert_eq!(blob, ObjectId::digest(b"blob 0\0"));
    assert_eq!(tree, ObjectId::digest(b"tree 0\0"));
}

#[test]
fn test_missing_object() {
    let (_tempdir, store) = test_support::store();
    let id = ObjectId::digest(b"blob 7\0nothing");
    assert!(matches!(store.decode(id), Err(Error::NotFound(missing)) if missing == id));
}

#[test]
fn test_truncated_object_is_corrupt_stream() {
    let (_tempdir, mut store) = test_support::store();
    let id = store.encode(ObjectKind::Blob, b"some content").unwrap();
    let path = store.locate(id);
    let bytes = std::fs::read(&path).unwrap();
    std::fs::remove_file(&path).unwrap();
    std::fs::write(&path, &bytes[..bytes.len() - 1]).unwrap();
    assert!(matches!(store.decode(id), Err(Error::CorruptStream(_))));
}

#[test]
fn test_foreign_file_is_malformed() {
    use crate::compression::compress;

    let (_tempdir, store) = test_support::store();
    let id = ObjectId::digest(b"blob 3\0abc");
    let path = store.locate(id);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, compress(b"blob 4\0abc").unwrap()).unwrap();
    assert!(matches!(
        store.decode(id),
        Err(Error::MalformedObject(Malformed::LengthMismatch {
            declared: 4,
            actual: 3
        }))
    ));
}

#[test]
fn test_decode_as_checks_kind() {
    let mut store = crate::object_store::in_memory::InMemoryObjectStore::new();
    let id = store.encode(ObjectKind::Blob, b"x").unwrap();
    assert_eq!(store.decode_as(id, ObjectKind::Blob).unwrap(), b"x");
    assert!(matches!(
        store.decode_as(id, ObjectKind::Tree),
        Err(Error::MalformedObject(Malformed::UnexpectedKind { .. }))
    ));
}
