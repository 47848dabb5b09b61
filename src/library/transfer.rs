use std::{
    collections::BTreeMap,
    ffi::OsStr,
    fs::{self, create_dir_all},
    path::{Path, PathBuf},
};

use itertools::Itertools;
use rustc_hash::FxHashMap;

use crate::{
    dtags,
    error::IoResultExt,
    fs::{free_name_do, lexists, Entry, FileId, Walk},
    Result, Tagname, DTAGS_FILE,
};

use super::*;

/// Tagnames of objects mapped to the tagnames they are tagged with.
pub type TagMap = BTreeMap<Tagname, Vec<Tagname>>;

impl Library {
    /// Map every file and tagged directory under `top`
    /// to the directories linking to it,
    /// or to every link if `full`.
    ///
    /// Objects are named by their least pathname,
    /// preferring the real location of a directory over its symlinks.
    pub fn export_tags<P>(&self, top: P, full: bool) -> Result<TagMap>
    where
        P: AsRef<Path>,
    {
        let top = self.absolute(top);
        let mut objects: FxHashMap<FileId, Vec<Entry>> = FxHashMap::default();
        for entry in Walk::new(&top) {
            let entry = entry.during("walk", &top)?;
            let Some(id) = entry.id() else {
                continue;
            };
            if entry.path().file_name() == Some(OsStr::new(DTAGS_FILE))
                || (entry.is_symlink() && !entry.is_dir())
                || !(entry.is_file() || entry.is_dir())
            {
                continue;
            }
            objects.entry(id).or_default().push(entry);
        }

        let mut map = TagMap::new();
        for entries in objects.into_values() {
            let key = entries
                .iter()
                .filter(|entry| !entry.is_symlink())
                .map(Entry::path)
                .min()
                .or_else(|| entries.iter().map(Entry::path).min());
            let Some(key) = key else {
                continue;
            };
            if entries[0].is_dir() && dtags::list_tags(key).during("read dtags of", key)?.is_empty()
            {
                continue;
            }
            let tags = entries
                .iter()
                .map(|entry| {
                    let tag = self.path_to_tag(entry.path());
                    if full {
                        tag
                    } else {
                        tag.dirname()
                    }
                })
                .sorted()
                .dedup()
                .collect();
            map.insert(self.path_to_tag(key), tags);
        }
        Ok(map)
    }

    /// Tag objects as described by `map`.
    ///
    /// A tag naming an existing directory links the object into it;
    /// any other tag is linked at exactly,
    /// creating missing parent directories.
    /// Tags the object already has are skipped.
    /// Returns the links created.
    pub fn import_tags(&self, map: &TagMap) -> Result<Vec<PathBuf>> {
        let mut created = Vec::new();
        for (object, tags) in map {
            let src = self.tag_to_path(object);
            let id = FileId::of(&src).during("stat", &src)?;
            for tag in tags {
                let dst = self.tag_to_path(tag);
                if lexists(&dst).during("stat", &dst)?
                    && FileId::of(&dst).ok() == Some(id)
                {
                    continue;
                }
                if dst.is_dir() {
                    if contains(&dst, id)? {
                        continue;
                    }
                    let name = object.basename();
                    created.push(free_name_do(&dst, name, |path| self.link(&src, path))?);
                } else {
                    if let Some(parent) = dst.parent() {
                        create_dir_all(parent).during("create", parent)?;
                    }
                    self.link(&src, &dst)?;
                    created.push(dst);
                }
            }
        }
        Ok(created)
    }
}

/// Whether `dir` directly contains a link to the object `id`.
fn contains(dir: &Path, id: FileId) -> Result<bool> {
    for entry in fs::read_dir(dir).during("read", dir)? {
        let path = entry.during("read", dir)?.path();
        if FileId::of(&path).ok() == Some(id) {
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use std::fs::create_dir;

    use crate::{
        library::testing::{dtags_of, library, library_with_tagged_dir, target_of},
        testing::{create_files_relative_to, hard_link_relative_to, same_file, with_temp_dir},
    };

    use super::*;

    fn tag_map<const N: usize>(entries: [(&str, Vec<&str>); N]) -> TagMap {
        entries
            .into_iter()
            .map(|(object, values)| {
                (
                    Tagname::new(object).unwrap(),
                    values.into_iter().map(|x| Tagname::new(x).unwrap()).collect(),
                )
            })
            .collect()
    }

    #[test]
    fn export_tags_groups_hard_links() {
        with_temp_dir(|dir| {
            let library = library(dir);
            create_files_relative_to(dir, ["A/a", "C/c"]);
            hard_link_relative_to(dir, "A/a", "B/z");
            hard_link_relative_to(dir, "A/a", "B/a");

            assert_eq!(
                library.export_tags(dir, false).unwrap(),
                tag_map([("//A/a", vec!["//A", "//B"]), ("//C/c", vec!["//C"])])
            );
            assert_eq!(
                library.export_tags(dir, true).unwrap(),
                tag_map([
                    ("//A/a", vec!["//A/a", "//B/a", "//B/z"]),
                    ("//C/c", vec!["//C/c"])
                ])
            );
        })
    }

    #[test]
    fn export_tags_includes_only_tagged_directories() {
        with_temp_dir(|dir| {
            let library = library_with_tagged_dir(dir, ["//t/d", "//u/v/d"]);
            create_dir(dir.join("plain")).unwrap();
            assert_eq!(
                library.export_tags(dir, false).unwrap(),
                tag_map([("//d", vec!["//", "//t", "//u/v"])])
            );
        })
    }

    #[test]
    fn export_tags_is_limited_to_top() {
        with_temp_dir(|dir| {
            let library = library(dir);
            create_files_relative_to(dir, ["A/a"]);
            hard_link_relative_to(dir, "A/a", "B/a");
            assert_eq!(
                library.export_tags(dir.join("B"), false).unwrap(),
                tag_map([("//B/a", vec!["//B"])])
            );
        })
    }

    #[test]
    fn import_tags_links_into_directories_and_at_exact_tags() {
        with_temp_dir(|dir| {
            let library = library(dir);
            create_files_relative_to(dir, ["A/a"]);
            create_dir(dir.join("B")).unwrap();

            let map = tag_map([("//A/a", vec!["//A", "//B", "//C/x"])]);
            let mut created = library.import_tags(&map).unwrap();
            created.sort();

            assert_eq!(created, [dir.join("B/a"), dir.join("C/x")]);
            assert!(same_file(dir.join("A/a"), dir.join("B/a")));
            assert!(same_file(dir.join("A/a"), dir.join("C/x")));
            assert!(library.import_tags(&map).unwrap().is_empty());
        })
    }

    #[test]
    fn import_tags_restores_exported_tags() {
        with_temp_dir(|dir| {
            let library = library_with_tagged_dir(dir, ["//t/d"]);
            create_files_relative_to(dir, ["A/a"]);
            hard_link_relative_to(dir, "A/a", "B/a");
            let exported = library.export_tags(dir, false).unwrap();

            library.unlink(dir.join("B/a")).unwrap();
            library.unlink(dir.join("t/d")).unwrap();
            library.import_tags(&exported).unwrap();

            assert!(same_file(dir.join("A/a"), dir.join("B/a")));
            assert_eq!(target_of(dir.join("t/d")), dir.join("d"));
            assert_eq!(dtags_of(dir.join("d")), ["//t/d"]);
            assert_eq!(library.export_tags(dir, false).unwrap(), exported);
        })
    }

    #[test]
    fn tag_map_serializes_as_json_object() {
        let map = tag_map([("//A/a", vec!["//A", "//B"])]);
        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"//A/a":["//A","//B"]}"#);
        assert_eq!(serde_json::from_str::<TagMap>(&json).unwrap(), map);
        assert!(serde_json::from_str::<TagMap>(r#"{"A":[]}"#).is_err());
    }
}
