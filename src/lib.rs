pub mod dtags;
mod error;
pub mod fs;
mod library;
mod pathname;
pub mod query;
mod tagname;

#[cfg(test)]
mod testing;

pub use crate::{
    error::{Error, Result},
    library::{find_library, init_library, Library, TagMap},
    pathname::{normalize_lexically, relative_path, split_ext},
    query::{search, Query},
    tagname::{is_tag, normalize, path_to_tag, tag_to_path, to_tag, Tagname, TagnameRef},
};

/// Reserved directory marking the root of a library.
pub const METADATA_DIR: &str = ".dantalian";
/// Reserved file listing the tags of the directory containing it.
pub const DTAGS_FILE: &str = ".dtags";
/// Prefix distinguishing tagnames from pathnames.
pub const TAG_PREFIX: &str = "//";

pub const DIR_SEPARATOR: char = '/';
pub const EXT_SEPARATOR: char = '.';
