use derive_more::Display;

use crate::{
    error::Malformed,
    object::ObjectKind,
    object_id::{ObjectId, OBJECT_ID_LEN},
};

/// The two kinds of entry a tree can point at.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileMode {
    #[display(fmt = "100644")]
    Regular,
    #[display(fmt = "40000")]
    Directory,
}

impl FileMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileMode::Regular => "100644",
            FileMode::Directory => "40000",
        }
    }

    /// The kind of object an entry with this mode refers to.
    pub fn object_kind(&self) -> ObjectKind {
        match self {
            FileMode::Regular => ObjectKind::Blob,
            FileMode::Directory => ObjectKind::Tree,
        }
    }

    fn parse(mode: &[u8]) -> Result<Self, Malformed> {
        match mode {
            b"100644" => Ok(FileMode::Regular),
            b"40000" => Ok(FileMode::Directory),
            other => Err(Malformed::UnknownMode(
                String::from_utf8_lossy(other).into_owned(),
            )),
        }
    }
}

/// One named child of a tree. `name` is raw bytes and never holds NUL or `/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    pub mode: FileMode,
    pub name: Vec<u8>,
    pub id: ObjectId,
}

impl TreeEntry {
    pub fn new(mode: FileMode, name: impl Into<Vec<u8>>, id: ObjectId) -> Self {
        Self {
            mode,
            name: name.into(),
            id,
        }
    }

    pub fn name_lossy(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.name)
    }
}

/// A directory listing, always kept in ascending byte order of entry name.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Tree {
    entries: Vec<TreeEntry>,
}

impl Tree {
    /// Builds a tree from entries in any order.
    pub fn new(mut entries: Vec<TreeEntry>) -> Self {
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Self { entries }
    }

    pub fn entries(&self) -> &[TreeEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Concatenates `<mode> <name>\0<20 raw id bytes>` for every entry.
    pub fn serialize(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        for entry in &self.entries {
            bytes.extend_from_slice(entry.mode.as_str().as_bytes());
            bytes.push(b' ');
            bytes.extend_from_slice(&entry.name);
            bytes.push(0);
            bytes.extend_from_slice(entry.id.as_bytes());
        }
        bytes
    }

    /// Parses a tree payload. Ids are fixed-width binary, so the NUL after each
    /// name is the only delimiter that can be searched for.
    pub fn parse(payload: &[u8]) -> Result<Self, Malformed> {
        let mut entries = Vec::new();
        let mut offset = 0;
        while offset < payload.len() {
            let rest = &payload[offset..];
            let space = rest
                .iter()
                .position(|&b| b == b' ')
                .ok_or(Malformed::BadTreeEntry {
                    offset,
                    reason: "no space after mode",
                })?;
            let mode = FileMode::parse(&rest[..space])?;
            let nul = rest[space + 1..]
                .iter()
                .position(|&b| b == 0)
                .map(|i| space + 1 + i)
                .ok_or(Malformed::BadTreeEntry {
                    offset,
                    reason: "no NUL after name",
                })?;
            let name = &rest[space + 1..nul];
            if name.is_empty() || name.contains(&b'/') {
                return Err(Malformed::BadTreeEntry {
                    offset,
                    reason: "invalid entry name",
                });
            }
            let id = ObjectId::from_slice(&rest[nul + 1..]).ok_or(Malformed::BadTreeEntry {
                offset,
                reason: "id shorter than 20 bytes",
            })?;
            if let Some(previous) = entries.last().map(|e: &TreeEntry| e.name.as_slice()) {
                if previous >= name {
                    return Err(Malformed::BadTreeEntry {
                        offset,
                        reason: "entries out of order",
                    });
                }
            }
            entries.push(TreeEntry::new(mode, name, id));
            offset += nul + 1 + OBJECT_ID_LEN;
        }
        Ok(Self { entries })
    }
}

#[test]
fn test_empty_tree() {
    let tree = Tree::new(Vec::new());
    assert!(tree.serialize().is_empty());
    assert_eq!(Tree::parse(b"").unwrap(), tree);
}

#[test]
fn test_serialize_layout() {
    let id = ObjectId::digest(b"blob 2\0hi");
    let tree = Tree::new(vec![TreeEntry::new(FileMode::Regular, "f", id)]);
    let mut expected = b"100644 f\0".to_vec();
    expected.extend_from_slice(id.as_bytes());
    assert_eq!(tree.serialize(), expected);
}

#[test]
fn test_order_is_independent_of_input() {
    let a = ObjectId::digest(b"a");
    let b = ObjectId::digest(b"b");
    let c = ObjectId::digest(b"c");
    let entries = vec![
        TreeEntry::new(FileMode::Regular, "b.txt", b),
        TreeEntry::new(FileMode::Directory, "B", c),
        TreeEntry::new(FileMode::Regular, "a", a),
        TreeEntry::new(FileMode::Regular, "a.b", c),
    ];
    let mut reversed = entries.clone();
    reversed.reverse();
    let forward = Tree::new(entries);
    let backward = Tree::new(reversed);
    assert_eq!(forward.serialize(), backward.serialize());
    let names: Vec<_> = forward.entries().iter().map(|e| e.name_lossy()).collect();
    // Byte order: uppercase sorts before lowercase.
    assert_eq!(names, ["B", "a", "a.b", "b.txt"]);
}

#[test]
fn test_parse_round_trip_with_binary_ids() {
    // Ids whose raw bytes contain NUL and space must not confuse the parser.
    let mut raw = [0u8; OBJECT_ID_LEN];
    raw[1] = b' ';
    raw[4] = b'/';
    let tricky = ObjectId::from_bytes(raw);
    let tree = Tree::new(vec![
        TreeEntry::new(FileMode::Directory, "dir", tricky),
        TreeEntry::new(FileMode::Regular, "file", ObjectId::digest(b"x")),
    ]);
    assert_eq!(Tree::parse(&tree.serialize()).unwrap(), tree);
}

#[test]
fn test_parse_rejects_garbage() {
    assert!(matches!(
        Tree::parse(b"100644 f"),
        Err(Malformed::BadTreeEntry { .. })
    ));
    assert!(matches!(
        Tree::parse(b"100644 f\0short"),
        Err(Malformed::BadTreeEntry { .. })
    ));
    assert_eq!(
        Tree::parse(b"120000 link\0aaaaaaaaaaaaaaaaaaaa"),
        Err(Malformed::UnknownMode("120000".into()))
    );
}
