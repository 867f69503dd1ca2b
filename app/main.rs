use std::{
    fs::read,
    io::{stdout, Write},
    path::PathBuf,
    process::ExitCode,
};

use clap::{ArgGroup, Parser, Subcommand};
use plumbing::{
    codec::ObjectCodec,
    error::{AtPath, Error},
    object::{Object, ObjectKind},
    object_id::ObjectId,
    repository::Repository,
    tree::Tree,
};

#[derive(Parser, Debug)]
struct Arguments {
    #[arg(
        long,
        global = true,
        default_value = ".",
        help = "worktree holding the repository"
    )]
    repo: PathBuf,
    #[clap(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[clap(about = "create an empty repository")]
    Init,
    #[clap(about = "compute the blob id of a file")]
    HashObject {
        #[arg(short, help = "also write the blob into the store")]
        write: bool,
        file: PathBuf,
    },
    #[clap(about = "show the contents, kind or size of an object")]
    #[command(group(
        ArgGroup::new("mode")
            .required(true)
            .args(["pretty", "kind", "size"])
    ))]
    CatFile {
        #[arg(short = 'p', help = "pretty-print the payload")]
        pretty: bool,
        #[arg(short = 't', help = "show the object kind")]
        kind: bool,
        #[arg(short = 's', help = "show the payload size")]
        size: bool,
        object: String,
    },
    #[clap(about = "list the entries of a tree")]
    LsTree {
        #[arg(long, help = "list only the entry names")]
        name_only: bool,
        tree: String,
    },
    #[clap(about = "store the worktree as a tree")]
    WriteTree,
    #[clap(about = "create a commit of a tree")]
    CommitTree {
        tree: String,
        #[arg(short, long, help = "the parent commit")]
        parent: Option<String>,
        #[arg(short, long, help = "message to leave with this commit")]
        message: String,
    },
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Arguments::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Arguments) -> Result<(), Error> {
    use Command::*;
    let mut out = stdout().lock();
    match args.cmd {
        Init => {
            let repository = Repository::init(args.repo)?;
            let message = format!(
                "Initialized empty repository in {}\n",
                repository.control().display()
            );
            print(&mut out, message)
        }
        HashObject { write, file } => {
            let contents = read(&file).at(&file)?;
            let id = if write {
                Repository::open(args.repo)?
                    .store()?
                    .encode(ObjectKind::Blob, &contents)?
            } else {
                Object::new(ObjectKind::Blob, contents).id()
            };
            print(&mut out, format!("{}\n", id))
        }
        CatFile {
            pretty,
            kind,
            size: _,
            object,
        } => {
            let store = Repository::open(args.repo)?.store()?;
            let object = store.decode(object.parse()?)?;
            if pretty {
                match object.kind {
                    ObjectKind::Tree => {
                        let tree = Tree::parse(&object.payload)?;
                        print(&mut out, render_tree(&tree, false))
                    }
                    ObjectKind::Blob | ObjectKind::Commit => Ok(out.write_all(&object.payload)?),
                }
            } else if kind {
                print(&mut out, format!("{}\n", object.kind))
            } else {
                print(&mut out, format!("{}\n", object.payload.len()))
            }
        }
        LsTree { name_only, tree } => {
            let store = Repository::open(args.repo)?.store()?;
            let payload = store.decode_as(tree.parse()?, ObjectKind::Tree)?;
            print(&mut out, render_tree(&Tree::parse(&payload)?, name_only))
        }
        WriteTree => {
            let id = Repository::open(args.repo)?.write_tree()?;
            print(&mut out, format!("{}\n", id))
        }
        CommitTree {
            tree,
            parent,
            message,
        } => {
            let repository = Repository::open(args.repo)?;
            let parent: Option<ObjectId> = parent.map(|p| p.parse()).transpose()?;
            let id = repository.commit_tree(tree.parse()?, parent, message)?;
            print(&mut out, format!("{}\n", id))
        }
    }
}

fn render_tree(tree: &Tree, name_only: bool) -> String {
    let mut s = String::new();
    for entry in tree.entries() {
        if name_only {
            s.push_str(&format!("{}\n", entry.name_lossy()));
        } else {
            s.push_str(&format!(
                "{:0>6} {} {}\t{}\n",
                entry.mode.as_str(),
                entry.mode.object_kind(),
                entry.id,
                entry.name_lossy()
            ));
        }
    }
    s
}

fn print<W: Write>(out: &mut W, text: String) -> Result<(), Error> {
    Ok(out.write_all(text.as_bytes())?)
}

#[test]
fn test_render_tree() {
    use plumbing::tree::{FileMode, TreeEntry};

    let blob = ObjectId::digest(b"blob 2\0hi");
    let subtree = ObjectId::digest(b"tree 0\0");
    let tree = Tree::new(vec![
        TreeEntry::new(FileMode::Regular, "f", blob),
        TreeEntry::new(FileMode::Directory, "B", subtree),
    ]);
    assert_eq!(
        render_tree(&tree, false),
        format!("040000 tree {}\tB\n100644 blob {}\tf\n", subtree, blob)
    );
    assert_eq!(render_tree(&tree, true), "B\nf\n");
}

#[test]
fn test_cat_file_requires_a_mode() {
    let id = "4b825dc642cb6eb9a060e54bf8d69288fbee4904";
    assert!(Arguments::try_parse_from(["plumb", "cat-file", id]).is_err());
    assert!(Arguments::try_parse_from(["plumb", "cat-file", "-p", "-t", id]).is_err());
    let args = Arguments::try_parse_from(["plumb", "cat-file", "-s", id]).unwrap();
    assert!(matches!(
        args.cmd,
        Command::CatFile {
            pretty: false,
            kind: false,
            size: true,
            ..
        }
    ));
}
