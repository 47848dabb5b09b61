use std::{
    borrow::Borrow,
    ops::Deref,
    path::{Path, PathBuf},
    str::FromStr,
};

use derive_more::Display;
use ref_cast::{ref_cast_custom, RefCastCustom};
use serde::{Deserialize, Serialize};

use crate::{
    pathname::{normalize_lexically, relative_path},
    DIR_SEPARATOR, TAG_PREFIX,
};

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("Invalid tagname: `{0}`. Tagnames must start with `{TAG_PREFIX}`.")]
pub struct TagnameError(String);

/// A pathname relative to a library root,
/// written with a leading `//`.
#[derive(
    Clone, Debug, Display, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct Tagname(String);

#[derive(Debug, Display, PartialEq, Eq, PartialOrd, Ord, Hash, RefCastCustom)]
#[repr(transparent)]
pub struct TagnameRef(str);

impl Tagname {
    pub fn new<S>(s: S) -> Result<Tagname, TagnameError>
    where
        S: Into<String>,
    {
        let s = s.into();
        if is_tag(&s) {
            Ok(Tagname(s))
        } else {
            Err(TagnameError(s))
        }
    }

    /// Tagname of `path` relative to the library root,
    /// where `path` is already root-relative.
    pub(crate) fn from_relative(path: &Path) -> Tagname {
        if path == Path::new(".") {
            Tagname(TAG_PREFIX.to_owned())
        } else {
            Tagname(format!("{TAG_PREFIX}{}", path.to_string_lossy()))
        }
    }
}

impl TagnameRef {
    #[ref_cast_custom]
    pub(crate) const fn new_unchecked(s: &str) -> &Self;

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The root-relative part of the tagname,
    /// without leading separators.
    pub fn relative(&self) -> &str {
        self.0.trim_start_matches(DIR_SEPARATOR)
    }

    /// Whether the tagname ends with a separator,
    /// marking a directory to link into.
    pub fn is_dir_hint(&self) -> bool {
        self.0.len() > TAG_PREFIX.len() && self.0.ends_with(DIR_SEPARATOR)
    }

    /// The last component of the tagname.
    pub fn basename(&self) -> &str {
        let trimmed = self.0.trim_end_matches(DIR_SEPARATOR);
        match trimmed.rfind(DIR_SEPARATOR) {
            Some(i) => &trimmed[i + 1..],
            None => trimmed,
        }
    }

    /// The tagname of the directory containing this tagname.
    pub fn dirname(&self) -> Tagname {
        let trimmed = self.0.trim_end_matches(DIR_SEPARATOR);
        match trimmed.rfind(DIR_SEPARATOR) {
            Some(i) if i >= TAG_PREFIX.len() => Tagname(trimmed[..i].to_owned()),
            _ => Tagname(TAG_PREFIX.to_owned()),
        }
    }

    /// This tagname with its last component replaced by `name`.
    pub fn with_basename(&self, name: &str) -> Tagname {
        let dirname = self.dirname();
        if dirname.as_str() == TAG_PREFIX {
            Tagname(format!("{TAG_PREFIX}{name}"))
        } else {
            Tagname(format!("{dirname}{DIR_SEPARATOR}{name}"))
        }
    }
}

impl FromStr for Tagname {
    type Err = TagnameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Tagname {
    type Error = TagnameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Tagname> for String {
    fn from(value: Tagname) -> Self {
        value.0
    }
}

impl Deref for Tagname {
    type Target = TagnameRef;

    fn deref(&self) -> &Self::Target {
        self.borrow()
    }
}

impl AsRef<TagnameRef> for Tagname {
    fn as_ref(&self) -> &TagnameRef {
        self.borrow()
    }
}

impl AsRef<TagnameRef> for TagnameRef {
    fn as_ref(&self) -> &TagnameRef {
        self
    }
}

impl Borrow<TagnameRef> for Tagname {
    fn borrow(&self) -> &TagnameRef {
        TagnameRef::new_unchecked(self.0.as_str())
    }
}

impl ToOwned for TagnameRef {
    type Owned = Tagname;

    fn to_owned(&self) -> Self::Owned {
        Tagname(self.0.to_owned())
    }
}

impl PartialEq<&TagnameRef> for Tagname {
    fn eq(&self, other: &&TagnameRef) -> bool {
        self.as_ref().eq(*other)
    }
}

impl PartialEq<str> for Tagname {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for Tagname {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

pub fn is_tag(s: &str) -> bool {
    s.starts_with(TAG_PREFIX)
}

/// Translate a tagname into a pathname under `root`.
///
/// A trailing separator is kept.
pub fn tag_to_path<R, T>(root: R, tag: T) -> PathBuf
where
    R: AsRef<Path>,
    T: AsRef<TagnameRef>,
{
    root.as_ref().join(tag.as_ref().relative())
}

/// Translate `path` into a tagname relative to `root`.
///
/// Both paths are compared lexically;
/// symlinks are not resolved.
pub fn path_to_tag<R, P>(root: R, path: P) -> Tagname
where
    R: AsRef<Path>,
    P: AsRef<Path>,
{
    Tagname::from_relative(&relative_path(
        normalize_lexically(path),
        normalize_lexically(root),
    ))
}

/// Translate `s` into a pathname if it is a tagname,
/// otherwise return it as a pathname unchanged.
pub fn normalize<R>(root: R, s: &str) -> PathBuf
where
    R: AsRef<Path>,
{
    if is_tag(s) {
        tag_to_path(root, TagnameRef::new_unchecked(s))
    } else {
        PathBuf::from(s)
    }
}

/// Translate `s` into a tagname if it is a pathname,
/// otherwise return it as a tagname unchanged.
pub fn to_tag<R>(root: R, s: &str) -> Tagname
where
    R: AsRef<Path>,
{
    if is_tag(s) {
        Tagname(s.to_owned())
    } else {
        path_to_tag(root, s)
    }
}
