//! The sidecar file listing the tags of a directory.
//!
//! Each tagged directory holds a `.dtags` file
//! with one tagname per line.
//! The sidecar travels with the directory when it is renamed,
//! so it is authoritative over the symlinks pointing at the directory.
//!
//! Updates rewrite the file in place
//! and are not crash-safe.

use std::{
    fs::{File, OpenOptions},
    io::{self, Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
};

use tracing::debug;

use crate::{Tagname, TagnameRef, DTAGS_FILE};

/// Path of the sidecar of `dir`.
pub fn dtags_path<P>(dir: P) -> PathBuf
where
    P: AsRef<Path>,
{
    dir.as_ref().join(DTAGS_FILE)
}

/// An open sidecar.
#[derive(Debug)]
pub struct DtagsFile {
    path: PathBuf,
    /// `None` if the sidecar was missing when opened for reading.
    file: Option<File>,
    /// Whether content read so far ends with a newline,
    /// or is empty.
    terminated: bool,
}

impl DtagsFile {
    /// Open the sidecar of `dir` for reading.
    ///
    /// A missing sidecar reads as empty.
    pub fn open_for_read<P>(dir: P) -> io::Result<Self>
    where
        P: AsRef<Path>,
    {
        let path = dtags_path(dir);
        let file = match File::open(&path) {
            Ok(file) => Some(file),
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => return Err(e),
        };
        Ok(Self {
            path,
            file,
            terminated: true,
        })
    }

    /// Open the sidecar of `dir` for reading and writing,
    /// creating it empty if it does not exist.
    pub fn open_for_update<P>(dir: P) -> io::Result<Self>
    where
        P: AsRef<Path>,
    {
        let path = dtags_path(dir);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;
        Ok(Self {
            path,
            file: Some(file),
            terminated: true,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every tagname from the start of the sidecar.
    ///
    /// Empty lines are ignored.
    /// The position is left at the end of the file.
    pub fn read_tags(&mut self) -> io::Result<Vec<Tagname>> {
        let Some(file) = self.file.as_mut() else {
            return Ok(Vec::new());
        };
        file.seek(SeekFrom::Start(0))?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;
        self.terminated = contents.is_empty() || contents.ends_with('\n');
        contents
            .lines()
            .filter(|line| !line.is_empty())
            .map(|line| {
                Tagname::new(line).map_err(|e| {
                    io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("{e} Found in `{}`.", self.path.display()),
                    )
                })
            })
            .collect()
    }

    /// Replace the contents of the sidecar with `tags`.
    pub fn write_tags<T>(&mut self, tags: impl IntoIterator<Item = T>) -> io::Result<()>
    where
        T: AsRef<TagnameRef>,
    {
        let file = self.writable()?;
        file.seek(SeekFrom::Start(0))?;
        let mut contents = String::new();
        for tag in tags {
            contents.push_str(tag.as_ref().as_str());
            contents.push('\n');
        }
        file.write_all(contents.as_bytes())?;
        let len = file.stream_position()?;
        file.set_len(len)?;
        self.terminated = true;
        debug!(path = %self.path.display(), "Wrote dtags");
        Ok(())
    }

    /// Write `tag` at the current position.
    pub fn append_tag<T>(&mut self, tag: T) -> io::Result<()>
    where
        T: AsRef<TagnameRef>,
    {
        let terminated = self.terminated;
        let file = self.writable()?;
        if !terminated {
            file.write_all(b"\n")?;
        }
        writeln!(file, "{}", tag.as_ref())?;
        self.terminated = true;
        debug!(path = %self.path.display(), tag = %tag.as_ref(), "Appended to dtags");
        Ok(())
    }

    fn writable(&mut self) -> io::Result<&mut File> {
        self.file.as_mut().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::Unsupported,
                format!("`{}` was opened for reading", self.path.display()),
            )
        })
    }
}

/// Add `tag` to the sidecar of `dir`.
///
/// Returns whether the sidecar changed.
pub fn add_tag<P, T>(dir: P, tag: T) -> io::Result<bool>
where
    P: AsRef<Path>,
    T: AsRef<TagnameRef>,
{
    let mut file = DtagsFile::open_for_update(dir)?;
    let tags = file.read_tags()?;
    if tags.iter().any(|x| x == &tag.as_ref()) {
        Ok(false)
    } else {
        file.append_tag(tag)?;
        Ok(true)
    }
}

/// Remove `tag` from the sidecar of `dir`.
///
/// Returns whether the sidecar changed.
/// A missing sidecar is not created.
pub fn remove_tag<P, T>(dir: P, tag: T) -> io::Result<bool>
where
    P: AsRef<Path>,
    T: AsRef<TagnameRef>,
{
    let tag = tag.as_ref();
    Ok(!filter_tags(dir, |x| &**x != tag)?.is_empty())
}

/// Keep only tags matching `predicate`,
/// returning the tags removed.
///
/// The sidecar is only written if a tag was removed.
pub fn filter_tags<P, F>(dir: P, mut predicate: F) -> io::Result<Vec<Tagname>>
where
    P: AsRef<Path>,
    F: FnMut(&Tagname) -> bool,
{
    if !dtags_path(&dir).try_exists()? {
        return Ok(Vec::new());
    }
    let mut file = DtagsFile::open_for_update(dir)?;
    let (keep, discard): (Vec<_>, Vec<_>) =
        file.read_tags()?.into_iter().partition(|x| predicate(x));
    if !discard.is_empty() {
        file.write_tags(&keep)?;
    }
    Ok(discard)
}

/// Tags in the sidecar of `dir`,
/// empty if it has no sidecar.
pub fn list_tags<P>(dir: P) -> io::Result<Vec<Tagname>>
where
    P: AsRef<Path>,
{
    DtagsFile::open_for_read(dir)?.read_tags()
}

/// Overwrite the sidecar of `dir` with `tags`.
pub fn set_tags<P, T>(dir: P, tags: impl IntoIterator<Item = T>) -> io::Result<()>
where
    P: AsRef<Path>,
    T: AsRef<TagnameRef>,
{
    DtagsFile::open_for_update(dir)?.write_tags(tags)
}

/// Replace the last component of every tag of `dir` with `name`.
pub fn rename_all<P>(dir: P, name: &str) -> io::Result<()>
where
    P: AsRef<Path>,
{
    let mut file = DtagsFile::open_for_update(dir)?;
    let tags = file
        .read_tags()?
        .iter()
        .map(|tag| tag.with_basename(name))
        .collect::<Vec<_>>();
    file.write_tags(&tags)
}
