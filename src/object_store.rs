use crate::object_id::ObjectId;

pub mod directory;
pub mod in_memory;

/// A content addressed store of canonical object bytes.
///
/// Implementations only move bytes around; hashing and header parsing live in
/// [`crate::codec::ObjectCodec`].
pub trait ObjectStore {
    type Error;

    fn has(&self, id: ObjectId) -> Result<bool, Self::Error>;

    fn read(&self, id: ObjectId) -> Result<Option<Vec<u8>>, Self::Error>;

    /// Stores `canonical` under `id`. Writing an id that is already present is a no-op.
    fn write(&mut self, id: ObjectId, canonical: &[u8]) -> Result<(), Self::Error>;
}
