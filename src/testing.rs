use std::{
    fs::{create_dir_all, File},
    os::unix::fs::MetadataExt,
    path::Path,
};

use crate::Tagname;

/// Run `f` in a fresh temporary directory.
///
/// The directory is canonicalized
/// so paths built from it match resolved symlink targets.
pub fn with_temp_dir<F, R>(f: F) -> R
where
    F: FnOnce(&Path) -> R,
{
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().canonicalize().unwrap();
    f(&path)
}

pub fn tags<const N: usize>(tags: [&str; N]) -> Vec<Tagname> {
    tags.into_iter().map(|tag| Tagname::new(tag).unwrap()).collect()
}

/// Create empty files, and their parent directories, relative to `dir`.
pub fn create_files_relative_to<P, Q>(dir: P, paths: impl IntoIterator<Item = Q>)
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    for path in paths {
        let path = dir.as_ref().join(path);
        create_dir_all(path.parent().unwrap()).unwrap();
        File::create(path).unwrap();
    }
}

pub fn create_dirs_relative_to<P, Q>(dir: P, paths: impl IntoIterator<Item = Q>)
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    for path in paths {
        create_dir_all(dir.as_ref().join(path)).unwrap();
    }
}

/// Hard link `dir/from` to `dir/to`.
pub fn hard_link_relative_to<P>(dir: P, from: &str, to: &str)
where
    P: AsRef<Path>,
{
    let to = dir.as_ref().join(to);
    create_dir_all(to.parent().unwrap()).unwrap();
    std::fs::hard_link(dir.as_ref().join(from), to).unwrap();
}

pub fn same_file<P, Q>(a: P, b: Q) -> bool
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let a = std::fs::metadata(a).unwrap();
    let b = std::fs::metadata(b).unwrap();
    a.dev() == b.dev() && a.ino() == b.ino()
}

pub fn is_symlink<P>(path: P) -> bool
where
    P: AsRef<Path>,
{
    std::fs::symlink_metadata(path).is_ok_and(|metadata| metadata.is_symlink())
}
