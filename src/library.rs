mod bulk;
mod link;
mod swap;
mod sync;
mod transfer;

#[cfg(test)]
pub(crate) mod testing;

use std::{
    fs::create_dir,
    io,
    path::{Path, PathBuf},
};

use tracing::debug;

use crate::{
    error::IoResultExt,
    pathname::{absolutize, normalize_lexically},
    tagname, Error, Result, Tagname, TagnameRef, METADATA_DIR,
};

pub use self::transfer::TagMap;

/// A directory tree whose paths can be named with tagnames.
///
/// Relative pathnames given to a library
/// are resolved against the working directory captured when it was opened.
#[derive(Debug, Clone)]
pub struct Library {
    root: PathBuf,
    cwd: PathBuf,
}

/// Find the closest library containing `start`.
pub fn find_library<P>(start: P) -> io::Result<Option<PathBuf>>
where
    P: AsRef<Path>,
{
    let start = std::path::absolute(start)?;
    for path in start.ancestors() {
        if path.join(METADATA_DIR).is_dir() {
            return Ok(Some(path.to_owned()));
        }
    }
    Ok(None)
}

/// Mark `path` as the root of a library.
pub fn init_library<P>(path: P) -> Result<()>
where
    P: AsRef<Path>,
{
    let metadata = path.as_ref().join(METADATA_DIR);
    debug!(path = %metadata.display(), "Creating library metadata directory");
    create_dir(&metadata).during("create", &metadata)
}

impl Library {
    /// Open the library rooted at `root`,
    /// or `None` if `root` is not a library.
    pub fn open<P>(root: P) -> io::Result<Option<Self>>
    where
        P: AsRef<Path>,
    {
        let cwd = std::env::current_dir()?;
        let root = absolutize(root, &cwd);
        if root.join(METADATA_DIR).is_dir() {
            Ok(Some(Self { root, cwd }))
        } else {
            Ok(None)
        }
    }

    /// Open the closest library containing `start`.
    pub fn find<P>(start: P) -> io::Result<Option<Self>>
    where
        P: AsRef<Path>,
    {
        match find_library(start)? {
            Some(root) => Self::open(root),
            None => Ok(None),
        }
    }

    /// Initialize and open a library rooted at `root`.
    pub fn init<P>(root: P) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        init_library(&root)?;
        Self::open(&root)
            .during("open", root.as_ref())?
            .ok_or_else(|| Error::NotFound(root.as_ref().join(METADATA_DIR)))
    }

    /// Resolve relative pathnames against `cwd` instead of the process working directory.
    pub fn with_cwd<P>(self, cwd: P) -> Self
    where
        P: AsRef<Path>,
    {
        Self {
            cwd: absolutize(cwd, &self.cwd),
            ..self
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Absolute pathname for a user-given tagname or pathname.
    pub fn resolve(&self, s: &str) -> PathBuf {
        absolutize(tagname::normalize(&self.root, s), &self.cwd)
    }

    /// Absolute pathname for `path`,
    /// relative to the working directory.
    pub fn absolute<P>(&self, path: P) -> PathBuf
    where
        P: AsRef<Path>,
    {
        absolutize(path, &self.cwd)
    }

    pub fn tag_to_path<T>(&self, tag: T) -> PathBuf
    where
        T: AsRef<TagnameRef>,
    {
        normalize_lexically(tagname::tag_to_path(&self.root, tag))
    }

    pub fn path_to_tag<P>(&self, path: P) -> Tagname
    where
        P: AsRef<Path>,
    {
        tagname::path_to_tag(&self.root, self.absolute(path))
    }

    /// Tagname for a user-given tagname or pathname.
    pub fn to_tag(&self, s: &str) -> Tagname {
        if tagname::is_tag(s) {
            tagname::to_tag(&self.root, s)
        } else {
            self.path_to_tag(s)
        }
    }
}
