use std::{
    fs::{self, create_dir_all},
    path::{Path, PathBuf},
};

use itertools::Itertools;
use tracing::warn;

use crate::{
    dtags,
    error::IoResultExt,
    fs::{is_symlink, list_links, lexists, resolve_dir, symlink, FileId},
    Result, Tagname,
};

use super::{link::remove, *};

impl Library {
    /// Rebuild the dtags of `dir`
    /// from the symlinks under `top` pointing to it.
    ///
    /// Returns the new tags.
    pub fn save_dtags<P, Q>(&self, top: P, dir: Q) -> Result<Vec<Tagname>>
    where
        P: AsRef<Path>,
        Q: AsRef<Path>,
    {
        let top = self.absolute(top);
        let dir = self.absolute(dir);
        let real = resolve_dir(&dir).during("read link", &dir)?;
        let self_tag = self.path_to_tag(&real);

        let mut tags = Vec::new();
        for path in list_links(&top, &real).during("walk", &top)? {
            if is_symlink(&path).during("stat", &path)? {
                tags.push(self.path_to_tag(&path));
            }
        }
        let tags = tags
            .into_iter()
            .filter(|tag| tag != &self_tag)
            .unique()
            .collect_vec();

        dtags::set_tags(&real, &tags).during("write dtags of", &real)?;
        Ok(tags)
    }

    /// Create the symlinks named by the dtags of `dir`.
    ///
    /// Existing symlinks to `dir` are left alone,
    /// and paths holding anything else are skipped.
    /// Returns the symlinks created.
    pub fn load_dtags<P>(&self, dir: P) -> Result<Vec<PathBuf>>
    where
        P: AsRef<Path>,
    {
        let dir = self.absolute(dir);
        let real = resolve_dir(&dir).during("read link", &dir)?;
        let id = FileId::of(&real).during("stat", &real)?;

        let mut created = Vec::new();
        for tag in dtags::list_tags(&real).during("read dtags of", &real)? {
            let path = self.tag_to_path(&tag);
            if path == real {
                continue;
            }
            if lexists(&path).during("stat", &path)? {
                if FileId::of(&path).ok() != Some(id) {
                    warn!(path = %path.display(), %tag, "Skipping tag occupied by another file");
                }
                continue;
            }
            if let Some(parent) = path.parent() {
                create_dir_all(parent).during("create", parent)?;
            }
            symlink(&real, &path).during("symlink", &path)?;
            created.push(path);
        }
        Ok(created)
    }

    /// Remove the symlinks named by the dtags of `dir`
    /// that point to it.
    ///
    /// The dtags are kept.
    /// Returns the symlinks removed.
    pub fn unload_dtags<P>(&self, dir: P) -> Result<Vec<PathBuf>>
    where
        P: AsRef<Path>,
    {
        let dir = self.absolute(dir);
        let real = resolve_dir(&dir).during("read link", &dir)?;
        let id = FileId::of(&real).during("stat", &real)?;

        let mut removed = Vec::new();
        for tag in dtags::list_tags(&real).during("read dtags of", &real)? {
            let path = self.tag_to_path(&tag);
            if is_symlink(&path).during("stat", &path)?
                && fs::metadata(&path).is_ok_and(|metadata| FileId::from(&metadata) == id)
            {
                remove(&path)?;
                removed.push(path);
            }
        }
        Ok(removed)
    }
}
