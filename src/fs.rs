//! Filesystem primitives shared by the link algebra.

use std::{
    fs::{self, Metadata, ReadDir},
    io,
    os::unix::fs::MetadataExt,
    path::{Path, PathBuf},
};

use derive_more::Display;
use rustc_hash::FxHashSet;
use tracing::{debug, warn};

use crate::{
    error::IoResultExt, pathname::normalize_lexically, split_ext, Error, Result, METADATA_DIR,
};

/// Identity of a filesystem object,
/// shared by every hard link to it.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[display(fmt = "{}:{}", dev, ino)]
pub struct FileId {
    dev: u64,
    ino: u64,
}

impl FileId {
    /// Identity of the object `path` refers to,
    /// following symlinks.
    pub fn of<P>(path: P) -> io::Result<FileId>
    where
        P: AsRef<Path>,
    {
        fs::metadata(path).map(|metadata| FileId::from(&metadata))
    }
}

impl From<&Metadata> for FileId {
    fn from(metadata: &Metadata) -> Self {
        FileId {
            dev: metadata.dev(),
            ino: metadata.ino(),
        }
    }
}

pub fn symlink<P, Q>(original: P, link: Q) -> io::Result<()>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    debug!(
        original = %original.as_ref().display(),
        link = %link.as_ref().display(),
        "Creating symlink"
    );
    std::os::unix::fs::symlink(original, link)
}

/// Whether anything, even a dangling symlink, exists at `path`.
pub fn lexists<P>(path: P) -> io::Result<bool>
where
    P: AsRef<Path>,
{
    match fs::symlink_metadata(path) {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Whether `path` is a symlink.
pub fn is_symlink<P>(path: P) -> io::Result<bool>
where
    P: AsRef<Path>,
{
    match fs::symlink_metadata(path) {
        Ok(metadata) => Ok(metadata.is_symlink()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Absolute path of the directory `path` refers to,
/// reading at most one level of symlink.
///
/// `path` should be absolute.
pub fn resolve_dir<P>(path: P) -> io::Result<PathBuf>
where
    P: AsRef<Path>,
{
    let path = path.as_ref();
    if fs::symlink_metadata(path)?.is_symlink() {
        let target = fs::read_link(path)?;
        Ok(normalize_lexically(match path.parent() {
            Some(parent) => parent.join(target),
            None => target,
        }))
    } else {
        Ok(normalize_lexically(path))
    }
}

/// An entry found by [`Walk`].
#[derive(Debug)]
pub struct Entry {
    path: PathBuf,
    symlink: bool,
    /// Metadata after following symlinks,
    /// `None` if the entry is a dangling symlink.
    metadata: Option<Metadata>,
}

impl Entry {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn into_path(self) -> PathBuf {
        self.path
    }

    pub fn is_symlink(&self) -> bool {
        self.symlink
    }

    pub fn is_dangling(&self) -> bool {
        self.metadata.is_none()
    }

    pub fn is_dir(&self) -> bool {
        self.metadata.as_ref().is_some_and(|metadata| metadata.is_dir())
    }

    pub fn is_file(&self) -> bool {
        self.metadata.as_ref().is_some_and(|metadata| metadata.is_file())
    }

    pub fn id(&self) -> Option<FileId> {
        self.metadata.as_ref().map(FileId::from)
    }
}

/// Depth-first walk of every entry under a directory.
///
/// Symlinks to directories are descended into,
/// but only after every directory reached by its real path,
/// so entries are yielded under their real path when they have one.
/// No directory is descended into twice,
/// so cycles terminate.
/// The library metadata directory is not descended into.
/// Subdirectories that cannot be read are skipped with a warning.
/// Entries are yielded in filesystem order.
#[derive(Debug)]
pub struct Walk {
    top: PathBuf,
    stack: Vec<PathBuf>,
    /// Directories reached through a symlink.
    aliased: Vec<PathBuf>,
    current: Option<ReadDir>,
    current_aliased: bool,
    visited: FxHashSet<FileId>,
}

impl Walk {
    pub fn new<P>(top: P) -> Self
    where
        P: Into<PathBuf>,
    {
        let top = top.into();
        Self {
            stack: vec![top.clone()],
            top,
            aliased: Vec::new(),
            current: None,
            current_aliased: false,
            visited: FxHashSet::default(),
        }
    }

    fn entry(&mut self, dir_entry: fs::DirEntry) -> io::Result<Entry> {
        let path = dir_entry.path();
        let symlink = dir_entry.file_type()?.is_symlink();
        let metadata = if symlink {
            match fs::metadata(&path) {
                Ok(metadata) => Some(metadata),
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::NotFound | io::ErrorKind::NotADirectory
                    ) =>
                {
                    None
                }
                Err(e) => return Err(e),
            }
        } else {
            Some(dir_entry.metadata()?)
        };

        if let Some(metadata) = &metadata {
            if metadata.is_dir() && path.file_name() != Some(METADATA_DIR.as_ref()) {
                if symlink || self.current_aliased {
                    self.aliased.push(path.clone());
                } else {
                    self.stack.push(path.clone());
                }
            }
        }

        Ok(Entry {
            path,
            symlink,
            metadata,
        })
    }

    /// Next directory to descend into,
    /// every real one before any reached through a symlink.
    fn next_dir(&mut self) -> Option<io::Result<(PathBuf, bool)>> {
        loop {
            let (dir, aliased) = match self.stack.pop() {
                Some(dir) => (dir, false),
                None => (self.aliased.pop()?, true),
            };
            match FileId::of(&dir) {
                Ok(id) if self.visited.insert(id) => return Some(Ok((dir, aliased))),
                Ok(_) => {}
                Err(e) if dir == self.top => return Some(Err(e)),
                Err(e) => warn!(path = %dir.display(), error = %e, "Skipping directory"),
            }
        }
    }
}

impl Iterator for Walk {
    type Item = io::Result<Entry>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(read_dir) = self.current.as_mut() {
                match read_dir.next() {
                    Some(Ok(dir_entry)) => return Some(self.entry(dir_entry)),
                    Some(Err(e)) => return Some(Err(e)),
                    None => self.current = None,
                }
            }
            let (dir, aliased) = match self.next_dir()? {
                Ok(next) => next,
                Err(e) => return Some(Err(e)),
            };
            match fs::read_dir(&dir) {
                Ok(read_dir) => {
                    self.current = Some(read_dir);
                    self.current_aliased = aliased;
                }
                Err(e) if dir == self.top => return Some(Err(e)),
                Err(e) => warn!(path = %dir.display(), error = %e, "Skipping unreadable directory"),
            }
        }
    }
}

/// Every path under `top` referring to the same object as `target`.
pub fn list_links<P, Q>(top: P, target: Q) -> io::Result<Vec<PathBuf>>
where
    P: Into<PathBuf>,
    Q: AsRef<Path>,
{
    let target = FileId::of(target)?;
    let mut links = Vec::new();
    for entry in Walk::new(top) {
        let entry = entry?;
        if entry.id() == Some(target) {
            links.push(entry.into_path());
        }
    }
    Ok(links)
}

/// Remove every dangling symlink under `top`,
/// returning the paths removed.
pub fn clean_symlinks<P>(top: P) -> io::Result<Vec<PathBuf>>
where
    P: Into<PathBuf>,
{
    let mut dangling = Vec::new();
    for entry in Walk::new(top) {
        let entry = entry?;
        if entry.is_symlink() && entry.is_dangling() {
            dangling.push(entry.into_path());
        }
    }
    for path in &dangling {
        debug!(path = %path.display(), "Removing dangling symlink");
        fs::remove_file(path)?;
    }
    Ok(dangling)
}

/// A path in `dir` named `name` if nothing exists there,
/// otherwise named `base.N.ext` for the smallest free `N`.
///
/// Another process may take the name before it is used.
pub fn free_name<P>(dir: P, name: &str) -> io::Result<PathBuf>
where
    P: AsRef<Path>,
{
    let dir = dir.as_ref();
    let path = dir.join(name);
    if !lexists(&path)? {
        return Ok(path);
    }
    let (base, ext) = split_ext(name);
    let mut i = 1usize;
    loop {
        let path = dir.join(format!("{base}.{i}{ext}"));
        if !lexists(&path)? {
            return Ok(path);
        }
        i += 1;
    }
}

/// Call `action` with a free path in `dir` based on `name`,
/// retrying with a new path while it fails because the path exists.
///
/// Returns the path used.
pub fn free_name_do<P, F>(dir: P, name: &str, mut action: F) -> Result<PathBuf>
where
    P: AsRef<Path>,
    F: FnMut(&Path) -> Result<()>,
{
    loop {
        let path = free_name(dir.as_ref(), name).during("find a free name in", dir.as_ref())?;
        match action(&path) {
            Ok(()) => return Ok(path),
            Err(e) if e.is_exists() => {
                debug!(path = %path.display(), "Free name was taken, retrying");
            }
            Err(e) => return Err(e),
        }
    }
}

/// Rename `src` to `dst` unless something exists at `dst`.
///
/// The check and the rename are not atomic.
pub fn rename_safe<P, Q>(src: P, dst: Q) -> Result<()>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let (src, dst) = (src.as_ref(), dst.as_ref());
    if lexists(dst).during("stat", dst)? {
        return Err(Error::Exists(dst.to_owned()));
    }
    debug!(from = %src.display(), to = %dst.display(), "Renaming");
    fs::rename(src, dst).during("rename", src)
}

#[cfg(test)]
mod tests {
    use std::{
        fs::{create_dir, File},
        os::unix::fs::PermissionsExt,
    };

    use crate::testing::{
        create_dirs_relative_to, create_files_relative_to, hard_link_relative_to, with_temp_dir,
    };

    use super::*;

    #[test]
    fn file_id_is_shared_by_hard_links() {
        with_temp_dir(|dir| {
            create_files_relative_to(dir, ["a", "b"]);
            hard_link_relative_to(dir, "a", "c");
            assert_eq!(FileId::of(dir.join("a")).unwrap(), FileId::of(dir.join("c")).unwrap());
            assert_ne!(FileId::of(dir.join("a")).unwrap(), FileId::of(dir.join("b")).unwrap());
        })
    }

    #[test]
    fn resolve_dir_reads_one_symlink() {
        with_temp_dir(|dir| {
            create_dirs_relative_to(dir, ["real"]);
            symlink("real", dir.join("rel")).unwrap();
            symlink(dir.join("real"), dir.join("abs")).unwrap();
            assert_eq!(resolve_dir(dir.join("rel")).unwrap(), dir.join("real"));
            assert_eq!(resolve_dir(dir.join("abs")).unwrap(), dir.join("real"));
            assert_eq!(resolve_dir(dir.join("real")).unwrap(), dir.join("real"));
        })
    }

    #[test]
    fn list_links_finds_hard_links_and_symlinks() {
        with_temp_dir(|dir| {
            create_files_relative_to(dir, ["A/a", "B/b"]);
            hard_link_relative_to(dir, "A/a", "B/a");
            create_dirs_relative_to(dir, ["D"]);
            symlink(dir.join("D"), dir.join("B/d")).unwrap();

            let mut links = list_links(dir, dir.join("A/a")).unwrap();
            links.sort();
            assert_eq!(links, [dir.join("A/a"), dir.join("B/a")]);

            let mut links = list_links(dir, dir.join("D")).unwrap();
            links.sort();
            assert_eq!(links, [dir.join("B/d"), dir.join("D")]);
        })
    }

    #[test]
    fn walk_terminates_on_symlink_cycles() {
        with_temp_dir(|dir| {
            create_files_relative_to(dir, ["a/file"]);
            symlink(dir.join("a"), dir.join("a/loop")).unwrap();
            symlink(dir, dir.join("a/up")).unwrap();

            let mut paths = Walk::new(dir)
                .map(|entry| entry.unwrap().into_path())
                .collect::<Vec<_>>();
            paths.sort();
            assert_eq!(
                paths,
                [dir.join("a"), dir.join("a/file"), dir.join("a/loop"), dir.join("a/up")]
            );
        })
    }

    #[test]
    fn walk_yields_real_paths_before_symlinked_ancestors() {
        with_temp_dir(|dir| {
            create_files_relative_to(dir, ["x/p/sub/file"]);
            create_dirs_relative_to(dir, ["t"]);
            symlink(dir.join("x/p"), dir.join("a")).unwrap();
            symlink(dir.join("x/p"), dir.join("z")).unwrap();
            symlink(dir.join("x/p/sub"), dir.join("t/sub")).unwrap();

            let mut paths = Walk::new(dir)
                .map(|entry| entry.unwrap().into_path())
                .collect::<Vec<_>>();
            paths.sort();
            assert_eq!(
                paths,
                [
                    dir.join("a"),
                    dir.join("t"),
                    dir.join("t/sub"),
                    dir.join("x"),
                    dir.join("x/p"),
                    dir.join("x/p/sub"),
                    dir.join("x/p/sub/file"),
                    dir.join("z"),
                ]
            );

            let mut links = list_links(dir, dir.join("x/p/sub")).unwrap();
            links.sort();
            assert_eq!(links, [dir.join("t/sub"), dir.join("x/p/sub")]);
        })
    }

    #[test]
    fn walk_descends_into_symlinks_leaving_top() {
        with_temp_dir(|dir| {
            create_files_relative_to(dir, ["out/sub/file"]);
            create_dirs_relative_to(dir, ["lib"]);
            symlink(dir.join("out"), dir.join("lib/out")).unwrap();

            let mut paths = Walk::new(dir.join("lib"))
                .map(|entry| entry.unwrap().into_path())
                .collect::<Vec<_>>();
            paths.sort();
            assert_eq!(
                paths,
                [dir.join("lib/out"), dir.join("lib/out/sub"), dir.join("lib/out/sub/file")]
            );
        })
    }

    #[test]
    fn walk_skips_unreadable_subdirectories() {
        with_temp_dir(|dir| {
            create_files_relative_to(dir, ["locked/file", "open/file"]);
            let locked = dir.join("locked");
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
            // Permissions are not enforced for root.
            let enforced = fs::read_dir(&locked).is_err();
            let entries = Walk::new(dir).collect::<io::Result<Vec<_>>>();
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

            let mut paths = entries
                .unwrap()
                .into_iter()
                .map(Entry::into_path)
                .collect::<Vec<_>>();
            paths.sort();
            let mut expected = vec![locked.clone(), dir.join("open"), dir.join("open/file")];
            if !enforced {
                expected.push(locked.join("file"));
            }
            expected.sort();
            assert_eq!(paths, expected);
        })
    }

    #[test]
    fn walk_errors_if_top_is_missing() {
        with_temp_dir(|dir| {
            let mut walk = Walk::new(dir.join("missing"));
            assert!(walk.next().unwrap().is_err());
            assert!(walk.next().is_none());
        })
    }

    #[test]
    fn walk_skips_metadata_dir() {
        with_temp_dir(|dir| {
            create_files_relative_to(dir, [".dantalian/file", "a"]);
            let mut paths = Walk::new(dir)
                .map(|entry| entry.unwrap().into_path())
                .collect::<Vec<_>>();
            paths.sort();
            assert_eq!(paths, [dir.join(".dantalian"), dir.join("a")]);
        })
    }

    #[test]
    fn clean_symlinks_removes_only_dangling_symlinks() {
        with_temp_dir(|dir| {
            create_files_relative_to(dir, ["a", "sub/b"]);
            symlink(dir.join("a"), dir.join("good")).unwrap();
            symlink(dir.join("missing"), dir.join("sub/bad")).unwrap();
            symlink("missing", dir.join("relative-bad")).unwrap();

            let mut removed = clean_symlinks(dir).unwrap();
            removed.sort();
            assert_eq!(removed, [dir.join("relative-bad"), dir.join("sub/bad")]);
            assert!(dir.join("good").exists());
            assert!(dir.join("a").exists());
            assert!(dir.join("sub/b").exists());

            assert!(clean_symlinks(dir).unwrap().is_empty());
        })
    }

    #[test]
    fn free_name_returns_name_if_free() {
        with_temp_dir(|dir| {
            assert_eq!(free_name(dir, "foo.txt").unwrap(), dir.join("foo.txt"));
        })
    }

    #[test]
    fn free_name_numbers_taken_names() {
        with_temp_dir(|dir| {
            create_files_relative_to(dir, ["foo.txt", "foo.1.txt", "bar"]);
            symlink(dir.join("missing"), dir.join("bar.1")).unwrap();
            assert_eq!(free_name(dir, "foo.txt").unwrap(), dir.join("foo.2.txt"));
            assert_eq!(free_name(dir, "bar").unwrap(), dir.join("bar.2"));
        })
    }

    #[test]
    fn free_name_do_retries_on_exists() {
        with_temp_dir(|dir| {
            let mut attempts = 0;
            let path = free_name_do(dir, "foo", |path| {
                attempts += 1;
                if attempts == 1 {
                    // Another process takes the name first.
                    File::create(path).unwrap();
                    Err(Error::Exists(path.to_owned()))
                } else {
                    File::create(path).unwrap();
                    Ok(())
                }
            })
            .unwrap();
            assert_eq!(attempts, 2);
            assert_eq!(path, dir.join("foo.1"));
        })
    }

    #[test]
    fn free_name_do_propagates_other_errors() {
        with_temp_dir(|dir| {
            assert!(free_name_do(dir, "foo", |path| Err(Error::NotFound(path.to_owned())))
                .unwrap_err()
                .is_not_found());
        })
    }

    #[test]
    fn rename_safe_refuses_to_overwrite() {
        with_temp_dir(|dir| {
            create_files_relative_to(dir, ["a", "b"]);
            assert!(rename_safe(dir.join("a"), dir.join("b")).unwrap_err().is_exists());
            assert!(dir.join("a").exists());

            create_dir(dir.join("c")).unwrap();
            rename_safe(dir.join("a"), dir.join("c/a")).unwrap();
            assert!(!dir.join("a").exists());
            assert!(dir.join("c/a").exists());
        })
    }
}
