use std::{fs::read_link, path::Path};

use crate::{dtags, Tagname};

use super::*;

pub fn library<P>(dir: P) -> Library
where
    P: AsRef<Path>,
{
    Library::init(dir).unwrap()
}

/// A library with a tagged directory `dir/d` linked at each of `tags`.
pub fn library_with_tagged_dir<const N: usize>(dir: &Path, tags: [&str; N]) -> Library {
    let library = library(dir);
    std::fs::create_dir(dir.join("d")).unwrap();
    for tag in tags {
        let path = library.tag_to_path(Tagname::new(tag).unwrap());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        library.link(dir.join("d"), path).unwrap();
    }
    library
}

pub fn dtags_of<P>(dir: P) -> Vec<String>
where
    P: AsRef<Path>,
{
    dtags::list_tags(dir)
        .unwrap()
        .into_iter()
        .map(String::from)
        .collect()
}

pub fn target_of<P>(link: P) -> PathBuf
where
    P: AsRef<Path>,
{
    read_link(link).unwrap()
}
