use std::{
    fs::{self, hard_link, remove_file},
    path::{Path, PathBuf},
};

use tracing::{debug, warn};

use crate::{
    dtags,
    error::IoResultExt,
    fs::{is_symlink, rename_safe, resolve_dir, symlink},
    Error, Result,
};

use super::*;

impl Library {
    /// Create a new reference to `src` at `dst`.
    ///
    /// Files are hard linked.
    /// Directories are symlinked by their absolute real path,
    /// and the new tag is recorded in their dtags.
    /// A failure to record the tag is logged, not returned,
    /// because the symlink already exists;
    /// [`Library::save_dtags`] reconciles the two.
    pub fn link<P, Q>(&self, src: P, dst: Q) -> Result<()>
    where
        P: AsRef<Path>,
        Q: AsRef<Path>,
    {
        let src = self.absolute(src);
        let dst = self.absolute(dst);
        if fs::metadata(&src).during("stat", &src)?.is_dir() {
            let real = resolve_dir(&src).during("read link", &src)?;
            symlink(&real, &dst).during("symlink", &dst)?;
            let tag = self.path_to_tag(&dst);
            if let Err(e) = dtags::add_tag(&real, &tag) {
                warn!(
                    dir = %real.display(),
                    %tag,
                    error = %e,
                    "Failed to add tag to dtags"
                );
            }
            Ok(())
        } else {
            // `link(2)` links a symlink itself, not its target.
            let src = if is_symlink(&src).during("stat", &src)? {
                fs::canonicalize(&src).during("resolve", &src)?
            } else {
                src
            };
            debug!(src = %src.display(), dst = %dst.display(), "Creating hard link");
            hard_link(&src, &dst).during("link", &dst)
        }
    }

    /// Remove one reference to an object.
    ///
    /// Unlinking the real location of a tagged directory
    /// first swaps it with one of its symlinks.
    /// The only reference to a directory is never removed.
    pub fn unlink<P>(&self, path: P) -> Result<()>
    where
        P: AsRef<Path>,
    {
        let path = self.absolute(path);
        let metadata = fs::symlink_metadata(&path).during("stat", &path)?;
        if metadata.is_symlink() {
            if path.is_dir() {
                let real = resolve_dir(&path).during("read link", &path)?;
                let tag = self.path_to_tag(&path);
                if let Err(e) = dtags::remove_tag(&real, &tag) {
                    warn!(
                        dir = %real.display(),
                        %tag,
                        error = %e,
                        "Failed to remove tag from dtags"
                    );
                }
            }
            remove(&path)
        } else if metadata.is_dir() {
            self.unlink_dir(&path)
        } else {
            remove(&path)
        }
    }

    fn unlink_dir(&self, path: &Path) -> Result<()> {
        let mut other = None;
        for tag in dtags::list_tags(path).during("read dtags of", path)? {
            let candidate = self.tag_to_path(&tag);
            if is_symlink(&candidate).during("stat", &candidate)?
                && resolve_dir(&candidate).during("read link", &candidate)? == path
            {
                other = Some(candidate);
                break;
            }
            warn!(dir = %path.display(), %tag, "Tag does not link to its directory");
        }
        let Some(other) = other else {
            return Err(Error::IsADirectory(path.to_owned()));
        };

        self.swap_dir(&other)?;
        dtags::remove_tag(&other, self.path_to_tag(path)).during("update dtags of", &other)?;
        remove(path)
    }

    /// Move `src` to `dst`, keeping tags consistent.
    ///
    /// Files and symlinks are linked at `dst` before being unlinked from `src`.
    /// A tagged directory is renamed
    /// and its symlinks are pointed at its new location.
    /// Nothing existing at `dst` is overwritten.
    pub fn rename<P, Q>(&self, src: P, dst: Q) -> Result<()>
    where
        P: AsRef<Path>,
        Q: AsRef<Path>,
    {
        let src = self.absolute(src);
        let dst = self.absolute(dst);
        if fs::symlink_metadata(&src).during("stat", &src)?.is_dir() {
            rename_safe(&src, &dst)?;
            let self_tag = self.path_to_tag(&dst);
            dtags::remove_tag(&dst, &self_tag).during("update dtags of", &dst)?;
            self.repoint_symlinks(&dst, &src)?;
            Ok(())
        } else {
            self.link(&src, &dst)?;
            self.unlink(&src)
        }
    }

    /// Point every symlink named by the dtags of `dir`
    /// that targets `old` at `dir` instead.
    pub(super) fn repoint_symlinks(&self, dir: &Path, old: &Path) -> Result<Vec<PathBuf>> {
        let mut repointed = Vec::new();
        for tag in dtags::list_tags(dir).during("read dtags of", dir)? {
            let path = self.tag_to_path(&tag);
            if is_symlink(&path).during("stat", &path)?
                && resolve_dir(&path).during("read link", &path)? == old
            {
                remove(&path)?;
                symlink(dir, &path).during("symlink", &path)?;
                repointed.push(path);
            }
        }
        Ok(repointed)
    }
}

pub(super) fn remove(path: &Path) -> Result<()> {
    debug!(path = %path.display(), "Removing");
    remove_file(path).during("remove", path)
}
