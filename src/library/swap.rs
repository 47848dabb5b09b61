use std::{
    fs::{self, remove_file},
    path::Path,
};

use tracing::debug;

use crate::{
    dtags::DtagsFile,
    error::IoResultExt,
    fs::{is_symlink, resolve_dir, symlink},
    Error, Result, TagnameRef,
};

use super::*;

impl Library {
    /// Exchange the roles of a symlink and the directory it targets.
    ///
    /// Afterwards the directory lives at `path`
    /// and a symlink to it is left at its old location.
    /// Its dtags name the old location instead of `path`,
    /// and its other symlinks are pointed at `path`.
    ///
    /// The steps are not atomic;
    /// a failure partway leaves the directory at one of the two locations.
    pub fn swap_dir<P>(&self, path: P) -> Result<()>
    where
        P: AsRef<Path>,
    {
        let here = self.absolute(path);
        if !is_symlink(&here).during("stat", &here)? {
            return Err(Error::invalid(format!(
                "`{}` is not a symlink",
                here.display()
            )));
        }
        let there = resolve_dir(&here).during("read link", &here)?;
        let metadata = fs::symlink_metadata(&there).during("stat", &there)?;
        if !metadata.is_dir() {
            return Err(Error::NotADirectory(there));
        }

        let here_tag = self.path_to_tag(&here);
        let there_tag = self.path_to_tag(&there);
        replace_tag(&there, &here_tag, &there_tag).during("update dtags of", &there)?;

        debug!(here = %here.display(), there = %there.display(), "Swapping directory");
        remove_file(&here).during("remove", &here)?;
        fs::rename(&there, &here).during("rename", &there)?;
        symlink(&here, &there).during("symlink", &there)?;

        self.repoint_symlinks(&here, &there)?;
        Ok(())
    }
}

/// Replace `old` with `new` in the dtags of `dir`,
/// keeping its position.
fn replace_tag(dir: &Path, old: &TagnameRef, new: &TagnameRef) -> std::io::Result<()> {
    let mut file = DtagsFile::open_for_update(dir)?;
    let mut tags = file.read_tags()?;
    tags.retain(|tag| tag != &new);
    match tags.iter().position(|tag| tag == &old) {
        Some(i) => tags[i] = new.to_owned(),
        None => tags.push(new.to_owned()),
    }
    file.write_tags(&tags)
}
