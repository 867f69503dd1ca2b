use std::{
    fs::{create_dir_all, File},
    io::Write,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::{
    codec::ObjectCodec,
    commit::{Commit, Identity, Signature},
    directory::{build_tree, Ignores},
    error::{AtPath, Error},
    object::ObjectKind,
    object_id::ObjectId,
    object_store::directory::DirectoryObjectStore,
};

/// Name of the control directory at the top of a worktree.
pub const CONTROL_DIR: &str = ".git";
/// Configuration file inside the control directory.
pub const CONFIG_FILE: &str = "plumbing.json";

/// Settings persisted in [`CONFIG_FILE`].
#[derive(PartialEq, Eq, Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub ignores: Ignores,
    pub identity: Identity,
}

/// A worktree together with its control directory, which holds the object store.
#[derive(Debug, Clone)]
pub struct Repository {
    worktree: PathBuf,
    control: PathBuf,
}

impl Repository {
    pub fn control(&self) -> &Path {
        &self.control
    }

    /// Scaffolds the control directory under `worktree`. Initializing an
    /// existing repository leaves it untouched.
    pub fn init(worktree: PathBuf) -> Result<Self, Error> {
        let control = worktree.join(CONTROL_DIR);
        let repository = Repository { worktree, control };
        let objects = repository.objects_dir();
        if objects.try_exists().at(&objects)? {
            log::info!("{:?} is already a repository", repository.worktree);
            return Ok(repository);
        }
        create_dir_all(&objects).at(&objects)?;
        let heads = repository.control.join("refs").join("heads");
        create_dir_all(&heads).at(&heads)?;

        // Start out on the main branch
        let head = repository.control.join("HEAD");
        let mut file = File::create(&head).at(&head)?;
        file.write_all(b"ref: refs/heads/main\n").at(&head)?;

        write_json(&Config::default(), &repository.control.join(CONFIG_FILE))?;
        log::info!("initialized repository in {:?}", repository.control);
        Ok(repository)
    }

    /// Opens the repository whose worktree is `worktree`.
    pub fn open(worktree: PathBuf) -> Result<Self, Error> {
        let control = worktree.join(CONTROL_DIR);
        let repository = Repository { worktree, control };
        let objects = repository.objects_dir();
        if !objects.is_dir() {
            return Err(Error::NotARepository(repository.worktree));
        }
        Ok(repository)
    }

    fn objects_dir(&self) -> PathBuf {
        self.control.join("objects")
    }

    pub fn store(&self) -> Result<DirectoryObjectStore, Error> {
        DirectoryObjectStore::new(self.objects_dir())
    }

    /// Reads the configuration, falling back to defaults when the file is absent.
    pub fn config(&self) -> Result<Config, Error> {
        let path = self.control.join(CONFIG_FILE);
        if !path.try_exists().at(&path)? {
            return Ok(Config::default());
        }
        read_json(&path)
    }

    /// The configured identity, overridden by `GIT_AUTHOR_NAME` and `GIT_AUTHOR_EMAIL`.
    pub fn identity(&self) -> Result<Identity, Error> {
        let mut identity = self.config()?.identity;
        if let Ok(name) = std::env::var("GIT_AUTHOR_NAME") {
            identity.name = name;
        }
        if let Ok(email) = std::env::var("GIT_AUTHOR_EMAIL") {
            identity.email = email;
        }
        Ok(identity)
    }

    /// Stores the whole worktree and returns the root tree's id.
    pub fn write_tree(&self) -> Result<ObjectId, Error> {
        let ignores = self.config()?.ignores;
        let mut store = self.store()?;
        build_tree(&mut store, &self.worktree, &ignores)
    }

    /// Stores a commit of `tree` on top of `parent`, signed now by the configured identity.
    pub fn commit_tree(
        &self,
        tree: ObjectId,
        parent: Option<ObjectId>,
        message: String,
    ) -> Result<ObjectId, Error> {
        let mut store = self.store()?;
        store.decode_as(tree, ObjectKind::Tree)?;
        if let Some(parent) = parent {
            store.decode_as(parent, ObjectKind::Commit)?;
        }
        let signature = Signature::now(self.identity()?);
        let commit = Commit {
            tree,
            parent,
            author: signature.clone(),
            committer: signature,
            message,
        };
        store.encode(ObjectKind::Commit, &commit.serialize())
    }
}

fn read_json<A: for<'de> Deserialize<'de>>(path: &Path) -> Result<A, Error> {
    let file = File::open(path).at(path)?;
    Ok(serde_json::from_reader(file)?)
}

fn write_json<A: Serialize>(thing: &A, path: &Path) -> Result<(), Error> {
    let file = File::create(path).at(path)?;
    Ok(serde_json::to_writer_pretty(file, thing)?)
}

#[test]
fn test_init_scaffolding() {
    let tempdir = tempfile::tempdir().unwrap();
    let repository = Repository::init(tempdir.path().into()).unwrap();
    let control = tempdir.path().join(CONTROL_DIR);
    assert_eq!(repository.control(), control);
    assert!(control.join("objects").is_dir());
    assert!(control.join("refs").join("heads").is_dir());
    assert_eq!(
        std::fs::read_to_string(control.join("HEAD")).unwrap(),
        "ref: refs/heads/main\n"
    );
    assert_eq!(repository.config().unwrap(), Config::default());

    // A second init keeps what is there.
    std::fs::write(control.join("HEAD"), "ref: refs/heads/other\n").unwrap();
    Repository::init(tempdir.path().into()).unwrap();
    assert_eq!(
        std::fs::read_to_string(control.join("HEAD")).unwrap(),
        "ref: refs/heads/other\n"
    );
}

#[test]
fn test_open_requires_objects() {
    let tempdir = tempfile::tempdir().unwrap();
    assert!(matches!(
        Repository::open(tempdir.path().into()),
        Err(Error::NotARepository(_))
    ));
    Repository::init(tempdir.path().into()).unwrap();
    assert!(Repository::open(tempdir.path().into()).is_ok());
}

#[test]
fn test_write_tree_skips_control_directory() {
    let tempdir = tempfile::tempdir().unwrap();
    let repository = Repository::init(tempdir.path().into()).unwrap();
    std::fs::write(tempdir.path().join("hello.txt"), b"hello world\n").unwrap();
    let tree = repository.write_tree().unwrap();

    let store = repository.store().unwrap();
    let payload = store.decode_as(tree, ObjectKind::Tree).unwrap();
    let mut expected = b"100644 hello.txt\0".to_vec();
    expected.extend_from_slice(ObjectId::digest(b"blob 12\0hello world\n").as_bytes());
    assert_eq!(payload, expected);
}

#[test]
fn test_config_ignores_apply() {
    let tempdir = tempfile::tempdir().unwrap();
    let repository = Repository::init(tempdir.path().into()).unwrap();
    let config = Config {
        ignores: Ignores::new(["target"]),
        identity: Identity::default(),
    };
    write_json(&config, &repository.control().join(CONFIG_FILE)).unwrap();
    std::fs::create_dir(tempdir.path().join("target")).unwrap();
    std::fs::write(tempdir.path().join("target").join("junk"), b"junk").unwrap();
    assert_eq!(repository.config().unwrap(), config);
    assert_eq!(
        repository.write_tree().unwrap(),
        ObjectId::digest(b"tree 0\0")
    );
}

#[test]
fn test_commit_tree() {
    let tempdir = tempfile::tempdir().unwrap();
    let repository = Repository::init(tempdir.path().into()).unwrap();
    let tree = repository.write_tree().unwrap();
    let first = repository
        .commit_tree(tree, None, String::from("first"))
        .unwrap();
    let second = repository
        .commit_tree(tree, Some(first), String::from("second"))
        .unwrap();

    let store = repository.store().unwrap();
    let text = String::from_utf8(store.decode_as(second, ObjectKind::Commit).unwrap()).unwrap();
    assert!(text.starts_with(&format!("tree {}\nparent {}\nauthor ", tree, first)));
    assert!(text.ends_with("\n\nsecond\n"));

    // A blob is not a valid parent.
    let mut store = repository.store().unwrap();
    let blob = store.encode(ObjectKind::Blob, b"not a commit").unwrap();
    assert!(matches!(
        repository.commit_tree(tree, Some(blob), String::from("bad")),
        Err(Error::MalformedObject(_))
    ));
}
