use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::object_id::ObjectId;

/// Who made a commit, as configured for the repository.
#[derive(PartialEq, Eq, Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    pub name: String,
    pub email: String,
}

impl Default for Identity {
    fn default() -> Self {
        Self {
            name: String::from("plumb"),
            email: String::from("plumb@localhost"),
        }
    }
}

/// An identity stamped with a moment in time.
#[derive(PartialEq, Eq, Debug, Clone)]
pub struct Signature {
    pub identity: Identity,
    /// Seconds since the unix epoch.
    pub timestamp: i64,
    /// Offset from UTC in minutes.
    pub offset_minutes: i32,
}

impl Signature {
    /// Signs with the current system time in UTC.
    pub fn now(identity: Identity) -> Self {
        let timestamp = match SystemTime::now().duration_since(UNIX_EPOCH) {
            Ok(elapsed) => elapsed.as_secs() as i64,
            Err(before) => -(before.duration().as_secs() as i64),
        };
        Self {
            identity,
            timestamp,
            offset_minutes: 0,
        }
    }

    fn line(&self, role: &str) -> String {
        let sign = if self.offset_minutes < 0 { '-' } else { '+' };
        let offset = self.offset_minutes.unsigned_abs();
        format!(
            "{} {} <{}> {} {}{:02}{:02}\n",
            role,
            self.identity.name,
            self.identity.email,
            self.timestamp,
            sign,
            offset / 60,
            offset % 60
        )
    }
}

/// A particular snapshot of a worktree.
#[derive(PartialEq, Eq, Debug, Clone)]
pub struct Commit {
    /// The [`ObjectId`] of the root tree.
    pub tree: ObjectId,
    /// The previous commit, if there was one.
    pub parent: Option<ObjectId>,
    pub author: Signature,
    pub committer: Signature,
    /// The message added with the commit.
    pub message: String,
}

impl Commit {
    /// The commit payload: header lines, a blank line, then the message ending in a newline.
    pub fn serialize(&self) -> Vec<u8> {
        let mut text = format!("tree {}\n", self.tree);
        if let Some(parent) = self.parent {
            text.push_str(&format!("parent {}\n", parent));
        }
        text.push_str(&self.author.line("author"));
        text.push_str(&self.committer.line("committer"));
        text.push('\n');
        text.push_str(&self.message);
        if !self.message.ends_with('\n') {
            text.push('\n');
        }
        text.into_bytes()
    }
}

#[test]
fn test_commit_layout() {
    let signature = Signature {
        identity: Identity {
            name: String::from("A U Thor"),
            email: String::from("author@example.com"),
        },
        timestamp: 1_700_000_000,
        offset_minutes: -330,
    };
    let tree = ObjectId::digest(b"tree 0\0");
    let parent = ObjectId::digest(b"commit 0\0");
    let commit = Commit {
        tree,
        parent: Some(parent),
        author: signature.clone(),
        committer: signature,
        message: String::from("first"),
    };
    let expected = format!(
        "tree {}\nparent {}\nauthor A U Thor <author@example.com> 1700000000 -0530\n\
         committer A U Thor <author@example.com> 1700000000 -0530\n\nfirst\n",
        tree, parent
    );
    assert_eq!(String::from_utf8(commit.serialize()).unwrap(), expected);
}

#[test]
fn test_root_commit_has_no_parent_line() {
    let commit = Commit {
        tree: ObjectId::digest(b"tree 0\0"),
        parent: None,
        author: Signature::now(Identity::default()),
        committer: Signature::now(Identity::default()),
        message: String::from("init\n"),
    };
    let text = String::from_utf8(commit.serialize()).unwrap();
    assert!(text.starts_with("tree 4b825dc642cb6eb9a060e54bf8d69288fbee4904\nauthor plumb"));
    assert!(!text.contains("parent"));
    assert!(text.ends_with("\n\ninit\n"));
}
