use std::{
    collections::BTreeSet,
    ffi::OsStr,
    fs::{read, read_dir, symlink_metadata, DirEntry},
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::{
    codec::ObjectCodec,
    error::{AtPath, Error},
    object::ObjectKind,
    object_id::ObjectId,
    repository::CONTROL_DIR,
    tree::{FileMode, Tree, TreeEntry},
};

/// Base names left out of every tree. The control directory is always among them.
#[derive(PartialEq, Eq, Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ignores {
    set: BTreeSet<String>,
}

impl Ignores {
    pub fn new<I, N>(names: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<String>,
    {
        let mut set: BTreeSet<String> = names.into_iter().map(Into::into).collect();
        set.insert(String::from(CONTROL_DIR));
        Self { set }
    }

    pub fn contains(&self, name: &OsStr) -> bool {
        name == OsStr::new(CONTROL_DIR)
            || name.to_str().map_or(false, |name| self.set.contains(name))
    }
}

impl Default for Ignores {
    fn default() -> Self {
        Ignores::new(std::iter::empty::<String>())
    }
}

/// A directory child that will become a tree entry.
#[derive(Debug, Clone)]
struct Child {
    name: Vec<u8>,
    path: PathBuf,
    mode: FileMode,
}

/// Stores every file under `dir` as a blob and every directory as a tree,
/// returning the id of the tree for `dir` itself.
///
/// Anything that is neither a regular file nor a directory (symlinks, sockets,
/// pipes, devices) is left out of the tree.
pub fn build_tree<S: ObjectCodec>(
    store: &mut S,
    dir: &Path,
    ignores: &Ignores,
) -> Result<ObjectId, Error> {
    let children = enumerate(dir, ignores)?;
    resolve(store, children, ignores)
}

fn enumerate(dir: &Path, ignores: &Ignores) -> Result<Vec<Child>, Error> {
    let mut children = Vec::new();
    for f in read_dir(dir).at(dir)? {
        let dir_entry = f.at(dir)?;
        let file_name = dir_entry.file_name();
        if ignores.contains(&file_name) {
            log::debug!("ignoring {:?}", dir_entry.path());
            continue;
        }
        match classify(&dir_entry)? {
            Some(mode) => children.push(Child {
                name: name_bytes(&file_name),
                path: dir_entry.path(),
                mode,
            }),
            None => log::debug!("skipping special file {:?}", dir_entry.path()),
        }
    }
    Ok(children)
}

/// Classifies without following symlinks, falling back to an explicit
/// `lstat` when the listing carries no usable type.
fn classify(dir_entry: &DirEntry) -> Result<Option<FileMode>, Error> {
    let file_type = match dir_entry.file_type() {
        Ok(file_type) => file_type,
        Err(_) => {
            let path = dir_entry.path();
            symlink_metadata(&path).at(&path)?.file_type()
        }
    };
    Ok(if file_type.is_dir() {
        Some(FileMode::Directory)
    } else if file_type.is_file() {
        Some(FileMode::Regular)
    } else {
        None
    })
}

/// Resolves children post-order, then sorts and stores the tree. Entry order
/// is fixed by [`Tree::new`], so the order of `children` does not matter.
fn resolve<S: ObjectCodec>(
    store: &mut S,
    children: Vec<Child>,
    ignores: &Ignores,
) -> Result<ObjectId, Error> {
    let mut entries = Vec::with_capacity(children.len());
    for child in children {
        let id = match child.mode {
            FileMode::Regular => {
                let contents = read(&child.path).at(&child.path)?;
                store.encode(ObjectKind::Blob, &contents)?
            }
            FileMode::Directory => build_tree(store, &child.path, ignores)?,
        };
        entries.push(TreeEntry::new(child.mode, child.name, id));
    }
    let tree = Tree::new(entries);
    let id = store.encode(ObjectKind::Tree, &tree.serialize())?;
    if tree.is_empty() {
        log::debug!("stored empty tree {}", id);
    } else {
        log::debug!("stored tree {} with {} entries", id, tree.len());
    }
    Ok(id)
}

#[cfg(unix)]
fn name_bytes(name: &OsStr) -> Vec<u8> {
    use std::os::unix::ffi::OsStrExt;
    name.as_bytes().to_vec()
}

#[cfg(not(unix))]
fn name_bytes(name: &OsStr) -> Vec<u8> {
    name.to_string_lossy().into_owned().into_bytes()
}

#[cfg(test)]
fn temp_store() -> (tempfile::TempDir, crate::object_store::directory::DirectoryObjectStore) {
    let tempdir = tempfile::tempdir().unwrap();
    let store = crate::object_store::directory::DirectoryObjectStore::new(
        tempdir.path().join("objects"),
    )
    .unwrap();
    (tempdir, store)
}

#[test]
fn test_empty_directory() {
    let (_store_dir, mut store) = temp_store();
    let worktree = tempfile::tempdir().unwrap();
    let id = build_tree(&mut store, worktree.path(), &Ignores::default()).unwrap();
    assert_eq!(id.to_string(), "4b825dc642cb6eb9a060e54bf8d69288fbee4904");
    assert_eq!(id, ObjectId::digest(b"tree 0\0"));
    assert!(store.decode(id).unwrap().payload.is_empty());
}

#[test]
fn test_nested_directories() {
    let (_store_dir, mut store) = temp_store();
    let worktree = tempfile::tempdir().unwrap();
    let a = worktree.path().join("A");
    std::fs::create_dir_all(a.join("B")).unwrap();
    std::fs::write(a.join("B").join("f"), b"hi").unwrap();

    let blob = ObjectId::digest(b"blob 2\0hi");
    let mut b_payload = b"100644 f\0".to_vec();
    b_payload.extend_from_slice(blob.as_bytes());
    let mut b_canonical = format!("tree {}\0", b_payload.len()).into_bytes();
    b_canonical.extend_from_slice(&b_payload);
    let b_tree = ObjectId::digest(&b_canonical);
    let mut a_payload = b"40000 B\0".to_vec();
    a_payload.extend_from_slice(b_tree.as_bytes());
    let mut a_canonical = format!("tree {}\0", a_payload.len()).into_bytes();
    a_canonical.extend_from_slice(&a_payload);
    let a_tree = ObjectId::digest(&a_canonical);

    let id = build_tree(&mut store, &a, &Ignores::default()).unwrap();
    assert_eq!(id, a_tree);
    // Children were stored before their parents.
    assert_eq!(store.decode(b_tree).unwrap().payload, b_payload);
    assert_eq!(store.decode(blob).unwrap().payload, b"hi");
}

#[test]
fn test_listing_order_does_not_matter() {
    let (_store_dir, mut store) = temp_store();
    let worktree = tempfile::tempdir().unwrap();
    for name in ["zeta", "alpha", "Mid", "beta.rs", "beta"] {
        std::fs::write(worktree.path().join(name), name.as_bytes()).unwrap();
    }
    std::fs::create_dir(worktree.path().join("sub")).unwrap();
    std::fs::write(worktree.path().join("sub").join("x"), b"x").unwrap();

    let ignores = Ignores::default();
    let listing = enumerate(worktree.path(), &ignores).unwrap();
    let mut reversed = listing.clone();
    reversed.reverse();
    let mut rotated = listing.clone();
    rotated.rotate_left(2);

    let first = resolve(&mut store, listing, &ignores).unwrap();
    let second = resolve(&mut store, reversed, &ignores).unwrap();
    let third = resolve(&mut store, rotated, &ignores).unwrap();
    assert_eq!(first, second);
    assert_eq!(first, third);

    let tree = Tree::parse(&store.decode(first).unwrap().payload).unwrap();
    let names: Vec<_> = tree.entries().iter().map(|e| e.name_lossy()).collect();
    assert_eq!(names, ["Mid", "alpha", "beta", "beta.rs", "sub", "zeta"]);
}

#[test]
fn test_control_directory_and_ignores_are_excluded() {
    let (_store_dir, mut store) = temp_store();
    let worktree = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(worktree.path().join(CONTROL_DIR).join("objects")).unwrap();
    std::fs::create_dir(worktree.path().join("target")).unwrap();
    std::fs::write(worktree.path().join("target").join("out"), b"build").unwrap();
    std::fs::write(worktree.path().join("kept"), b"kept").unwrap();

    let id = build_tree(&mut store, worktree.path(), &Ignores::new(["target"])).unwrap();
    let tree = Tree::parse(&store.decode(id).unwrap().payload).unwrap();
    assert_eq!(tree.len(), 1);
    assert_eq!(tree.entries()[0].name, b"kept");
}

#[cfg(unix)]
#[test]
fn test_special_files_are_skipped() {
    let (_store_dir, mut store) = temp_store();
    let worktree = tempfile::tempdir().unwrap();
    std::fs::write(worktree.path().join("regular"), b"data").unwrap();
    let _listener = std::os::unix::net::UnixListener::bind(worktree.path().join("socket")).unwrap();
    std::os::unix::fs::symlink("regular", worktree.path().join("link")).unwrap();

    let id = build_tree(&mut store, worktree.path(), &Ignores::default()).unwrap();
    let tree = Tree::parse(&store.decode(id).unwrap().payload).unwrap();
    assert_eq!(tree.len(), 1);
    assert_eq!(tree.entries()[0].name, b"regular");
    assert_eq!(tree.entries()[0].mode, FileMode::Regular);
}

#[cfg(unix)]
#[test]
fn test_named_pipe_is_skipped() {
    let (_store_dir, mut store) = temp_store();
    let worktree = tempfile::tempdir().unwrap();
    std::fs::write(worktree.path().join("regular"), b"data").unwrap();
    let status = std::process::Command::new("mkfifo")
        .arg(worktree.path().join("pipe"))
        .status()
        .expect("mkfifo must be installed for this test");
    assert!(status.success(), "mkfifo failed");

    let id = build_tree(&mut store, worktree.path(), &Ignores::default()).unwrap();
    let tree = Tree::parse(&store.decode(id).unwrap().payload).unwrap();
    assert_eq!(tree.len(), 1);
    assert_eq!(tree.entries()[0].name, b"regular");
}

#[cfg(unix)]
#[test]
fn test_only_special_files_is_empty_tree() {
    let (_store_dir, mut store) = temp_store();
    let worktree = tempfile::tempdir().unwrap();
    std::os::unix::fs::symlink("/nonexistent", worktree.path().join("dangling")).unwrap();
    let id = build_tree(&mut store, worktree.path(), &Ignores::default()).unwrap();
    assert_eq!(id, ObjectId::digest(b"tree 0\0"));
}

#[test]
fn test_missing_directory_is_filesystem_error() {
    let (_store_dir, mut store) = temp_store();
    let worktree = tempfile::tempdir().unwrap();
    let missing = worktree.path().join("nope");
    assert!(matches!(
        build_tree(&mut store, &missing, &Ignores::default()),
        Err(Error::Filesystem { path, .. }) if path == missing
    ));
}
