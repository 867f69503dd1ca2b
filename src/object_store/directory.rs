use std::{
    fs::{create_dir_all, read},
    io::ErrorKind,
    path::{Path, PathBuf},
};

use tempfile::NamedTempFile;

use crate::{
    compression::{compress_to, decompress},
    error::{AtPath, Error},
    object_id::ObjectId,
};

use super::ObjectStore;

/// Permission bits of every stored object file.
#[cfg(unix)]
const OBJECT_MODE: u32 = 0o444;

/// A persistent [`ObjectStore`] stored in a directory,
/// using the first two hexadecimal characters of the [`ObjectId`]
/// to determine which directory to place the zlib compressed object in
/// and creating a file with the rest of the hexadecimal characters
/// as the file name.
#[derive(Debug, Clone)]
pub struct DirectoryObjectStore {
    root: PathBuf,
}

impl DirectoryObjectStore {
    pub fn new(root: PathBuf) -> Result<Self, Error> {
        if !root.try_exists().at(&root)? {
            log::info!("creating directory store root: {:?}", root);
            create_dir_all(&root).at(&root)?;
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The fan-out path of `id`: `<root>/<first 2 hex>/<remaining 38 hex>`.
    pub fn locate(&self, id: ObjectId) -> PathBuf {
        let s = id.to_hex();
        let (subdir, filename) = s.split_at(2);
        self.root.join(subdir).join(filename)
    }
}

impl ObjectStore for DirectoryObjectStore {
    type Error = Error;

    fn has(&self, id: ObjectId) -> Result<bool, Self::Error> {
        log::debug!("checking whether {} is contained in {:?}", id, self.root);
        let path = self.locate(id);
        path.try_exists().at(&path)
    }

    fn read(&self, id: ObjectId) -> Result<Option<Vec<u8>>, Self::Error> {
        log::info!("reading {} from {:?}", id, self.root);
        let path = self.locate(id);
        let compressed = match read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(Error::Filesystem { path, source: err }),
        };
        let canonical = decompress(&compressed).map_err(|err| {
            log::warn!("{:?} does not hold a complete zlib stream: {}", path, err);
            err
        })?;
        Ok(Some(canonical))
    }

    fn write(&mut self, id: ObjectId, canonical: &[u8]) -> Result<(), Self::Error> {
        log::info!("inserting {} into {:?}", id, self.root);
        let path = self.locate(id);
        if self.has(id)? {
            log::debug!("{:?} already exists", path);
            return Ok(());
        }
        let subdir_path = self.root.join(&id.to_hex()[..2]);
        if !subdir_path.try_exists().at(&subdir_path)? {
            log::debug!("creating subdir path {:?} in {:?}", subdir_path, self.root);
            create_dir_all(&subdir_path).at(&subdir_path)?;
        }

        // Compress into a sibling temporary file, then rename it into place so a
        // reader never observes a partially written object.
        let tmp = NamedTempFile::new_in(&subdir_path).at(&subdir_path)?;
        let tmp = compress_to(tmp, canonical).at(&path)?;
        // Stored objects are read-only for everyone.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tmp.as_file()
                .set_permissions(std::fs::Permissions::from_mode(OBJECT_MODE))
                .at(tmp.path())?;
        }
        tmp.persist(&path).map_err(|err| Error::Filesystem {
            path: path.clone(),
            source: err.error,
        })?;
        Ok(())
    }
}

#[test]
fn test_directory_object_store() {
    let tempdir = tempfile::tempdir().unwrap();
    let mut store = DirectoryObjectStore::new(tempdir.path().join("objects")).unwrap();
    let canonical: &[u8] = b"blob 12\0hello world\n";
    let id: ObjectId = canonical.into();
    assert!(!store.has(id).unwrap());
    assert_eq!(store.read(id).unwrap(), None);
    store.write(id, canonical).unwrap();
    assert!(store.has(id).unwrap());
    assert_eq!(store.read(id).unwrap(), Some(Vec::from(canonical)));
}

#[test]
fn test_fan_out_layout() {
    let tempdir = tempfile::tempdir().unwrap();
    let mut store = DirectoryObjectStore::new(tempdir.path().into()).unwrap();
    let canonical: &[u8] = b"blob 12\0hello world\n";
    let id: ObjectId = canonical.into();
    store.write(id, canonical).unwrap();
    let expected = tempdir
        .path()
        .join("3b")
        .join("18e512dba79e4c8300dd08aeb37f8e728b8dad");
    assert_eq!(store.locate(id), expected);
    let on_disk = std::fs::read(&expected).unwrap();
    assert_eq!(decompress(&on_disk).unwrap(), canonical);
    // Only the object itself is left behind, no temporary files.
    assert_eq!(std::fs::read_dir(tempdir.path().join("3b")).unwrap().count(), 1);
}

#[test]
fn test_write_is_idempotent() {
    let tempdir = tempfile::tempdir().unwrap();
    let mut store = DirectoryObjectStore::new(tempdir.path().into()).unwrap();
    let canonical: &[u8] = b"tree 0\0";
    let id: ObjectId = canonical.into();
    store.write(id, canonical).unwrap();
    store.write(id, canonical).unwrap();
    assert_eq!(store.read(id).unwrap(), Some(Vec::from(canonical)));
}

#[test]
fn test_truncated_file_is_corrupt() {
    use crate::error::CorruptStream;

    let tempdir = tempfile::tempdir().unwrap();
    let mut store = DirectoryObjectStore::new(tempdir.path().into()).unwrap();
    let canonical: &[u8] = b"blob 2\0hi";
    let id: ObjectId = canonical.into();
    store.write(id, canonical).unwrap();
    let path = store.locate(id);
    let bytes = std::fs::read(&path).unwrap();
    // Object files are read-only, so replace rather than overwrite.
    std::fs::remove_file(&path).unwrap();
    std::fs::write(&path, &bytes[..bytes.len() - 1]).unwrap();
    assert!(matches!(
        store.read(id),
        Err(Error::CorruptStream(CorruptStream::Truncated))
    ));
}

#[cfg(unix)]
#[test]
fn test_objects_are_world_readable() {
    use std::os::unix::fs::PermissionsExt;

    let tempdir = tempfile::tempdir().unwrap();
    let mut store = DirectoryObjectStore::new(tempdir.path().into()).unwrap();
    let canonical: &[u8] = b"blob 2\0hi";
    let id: ObjectId = canonical.into();
    store.write(id, canonical).unwrap();
    let mode = std::fs::metadata(store.locate(id)).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, OBJECT_MODE);
}
