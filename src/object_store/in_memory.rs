use std::{collections::BTreeMap, convert::Infallible};

use crate::object_id::ObjectId;

use super::ObjectStore;

/// Keeps canonical object bytes in memory, uncompressed.
#[derive(Debug, Default)]
pub struct InMemoryObjectStore {
    objects: BTreeMap<ObjectId, Vec<u8>>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self {
            objects: BTreeMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

impl ObjectStore for InMemoryObjectStore {
    type Error = Infallible;

    fn has(&self, id: ObjectId) -> Result<bool, Self::Error> {
        Ok(self.objects.contains_key(&id))
    }

    fn read(&self, id: ObjectId) -> Result<Option<Vec<u8>>, Self::Error> {
        Ok(self.objects.get(&id).cloned())
    }

    fn write(&mut self, id: ObjectId, canonical: &[u8]) -> Result<(), Self::Error> {
        self.objects
            .entry(id)
            .or_insert_with(|| Vec::from(canonical));
        Ok(())
    }
}

#[test]
fn test_in_memory_object_store() {
    let mut store = InMemoryObjectStore::new();
    let b: &[u8] = b"blob 12\0hello world\n";
    store.write(b.into(), b).unwrap();
    store.write(b.into(), b).unwrap();
    assert!(store.has(b.into()).unwrap());
    assert_eq!(store.len(), 1);
    assert_eq!(store.read(b.into()).unwrap(), Some(Vec::from(b)));
}
