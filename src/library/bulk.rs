use std::{
    ffi::OsStr,
    fs::{self, remove_dir_all},
    path::{Path, PathBuf},
};

use itertools::Itertools;
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::{
    dtags,
    error::IoResultExt,
    fs::{clean_symlinks, free_name_do, is_symlink, list_links, resolve_dir, FileId},
    Error, Result, Tagname, DIR_SEPARATOR,
};

use super::*;

impl Library {
    /// Tag `target` with `name_or_tag`.
    ///
    /// If the destination is a directory,
    /// `target` is linked into it under a free name.
    /// A destination ending with a separator must be a directory.
    /// Returns the new link.
    pub fn tag(&self, target: &str, name_or_tag: &str) -> Result<PathBuf> {
        let target = self.resolve(target);
        let dst = self.resolve(name_or_tag);
        if dst.is_dir() {
            let name = file_name(&target)?;
            free_name_do(&dst, name, |path| self.link(&target, path))
        } else if name_or_tag.ends_with(DIR_SEPARATOR) {
            Err(Error::NotADirectory(dst))
        } else {
            self.link(&target, &dst)?;
            Ok(dst)
        }
    }

    /// Remove the tag `name_or_tag` from `target`.
    ///
    /// The destination is either a link to `target`
    /// or a directory containing links to it.
    /// Returns the links removed.
    pub fn untag(&self, target: &str, name_or_tag: &str) -> Result<Vec<PathBuf>> {
        let target = self.resolve(target);
        let dst = self.resolve(name_or_tag);
        let id = FileId::of(&target).during("stat", &target)?;
        if FileId::of(&dst).during("stat", &dst)? == id {
            self.unlink(&dst)?;
            Ok(vec![dst])
        } else if dst.is_dir() {
            let mut links = Vec::new();
            for entry in fs::read_dir(&dst).during("read", &dst)? {
                let path = entry.during("read", &dst)?.path();
                if FileId::of(&path).ok() == Some(id) {
                    links.push(path);
                }
            }
            for path in &links {
                self.unlink(path)?;
            }
            Ok(links)
        } else {
            Err(Error::invalid(format!(
                "`{}` is neither `{}` nor a directory containing it",
                dst.display(),
                target.display()
            )))
        }
    }

    /// Rename every link to `target` in the library to `name`.
    ///
    /// Each directory keeps one link,
    /// under `name` or a free variant of it.
    /// Returns the links kept.
    pub fn rename_all(&self, target: &str, name: &str) -> Result<Vec<PathBuf>> {
        if name.is_empty() || name.contains(DIR_SEPARATOR) {
            return Err(Error::invalid(format!("`{name}` is not a valid file name")));
        }
        let target = self.resolve(target);
        let links = list_links(&self.root, &target).during("walk", &self.root)?;

        let mut groups: Vec<(PathBuf, Vec<PathBuf>)> = Vec::new();
        let mut index = FxHashMap::default();
        for link in links {
            let Some(dir) = link.parent().map(Path::to_path_buf) else {
                continue;
            };
            let i = *index.entry(dir.clone()).or_insert_with(|| {
                groups.push((dir, Vec::new()));
                groups.len() - 1
            });
            groups[i].1.push(link);
        }

        let mut kept = Vec::new();
        for (dir, mut links) in groups {
            let named = links
                .iter()
                .position(|link| link.file_name() == Some(OsStr::new(name)));
            let link = links.remove(named.unwrap_or(0));
            for other in &links {
                self.unlink(other)?;
            }
            if named.is_some() {
                kept.push(link);
            } else {
                kept.push(free_name_do(&dir, name, |path| self.rename(&link, path))?);
            }
        }
        Ok(kept)
    }

    /// Remove every link to `target` in the library.
    ///
    /// A directory is deleted with everything in it.
    pub fn unlink_all(&self, target: &str) -> Result<()> {
        let target = self.resolve(target);
        if target.is_dir() {
            let real = resolve_dir(&target).during("read link", &target)?;
            self.unload_dtags(&real)?;
            for path in list_links(&self.root, &real).during("walk", &self.root)? {
                if is_symlink(&path).during("stat", &path)? {
                    self.unlink(&path)?;
                }
            }
            debug!(path = %real.display(), "Removing directory tree");
            remove_dir_all(&real).during("remove", &real)
        } else {
            for path in list_links(&self.root, &target).during("walk", &self.root)? {
                self.unlink(&path)?;
            }
            Ok(())
        }
    }

    /// Remove dangling symlinks under `top`.
    pub fn clean(&self, top: &str) -> Result<Vec<PathBuf>> {
        let top = self.resolve(top);
        clean_symlinks(&top).during("clean", &top)
    }

    /// Tagnames of the directories linking to `target`.
    pub fn tags(&self, target: &str) -> Result<Vec<Tagname>> {
        let target = self.resolve(target);
        let tags = if target.is_dir() {
            let real = resolve_dir(&target).during("read link", &target)?;
            dtags::list_tags(&real)
                .during("read dtags of", &real)?
                .iter()
                .map(|tag| tag.dirname())
                .chain([self.path_to_tag(&real).dirname()])
                .collect_vec()
        } else {
            list_links(&self.root, &target)
                .during("walk", &self.root)?
                .into_iter()
                .filter_map(|path| path.parent().map(|parent| self.path_to_tag(parent)))
                .collect_vec()
        };
        Ok(tags.into_iter().sorted().dedup().collect())
    }
}

fn file_name(path: &Path) -> Result<&str> {
    path.file_name()
        .ok_or_else(|| Error::invalid(format!("`{}` has no file name", path.display())))?
        .to_str()
        .ok_or_else(|| Error::invalid(format!("`{}` is not valid Unicode", path.display())))
}
