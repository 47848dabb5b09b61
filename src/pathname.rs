use std::path::{Component, Path, PathBuf};

use crate::EXT_SEPARATOR;

/// Normalize `path` without touching the filesystem.
///
/// Empty and `.` components are removed
/// and `..` removes the preceding component,
/// as with POSIX `normpath`.
/// Symlinks are not resolved,
/// so the result may not name the same file as `path`
/// if a component before a `..` is a symlink.
pub fn normalize_lexically<P>(path: P) -> PathBuf
where
    P: AsRef<Path>,
{
    let mut normal = PathBuf::new();
    let mut depth = 0usize;
    for component in path.as_ref().components() {
        match component {
            Component::Prefix(_) | Component::RootDir => normal.push(component),
            Component::CurDir => {}
            Component::ParentDir => {
                if depth > 0 {
                    normal.pop();
                    depth -= 1;
                } else if !normal.has_root() {
                    normal.push("..");
                }
            }
            Component::Normal(name) => {
                normal.push(name);
                depth += 1;
            }
        }
    }
    if normal.as_os_str().is_empty() {
        normal.push(".");
    }
    normal
}

/// Return `path` relative to `base`, lexically.
///
/// Both paths should be absolute.
/// The result is `.` if they are the same path
/// and contains `..` components if `path` is outside `base`.
pub fn relative_path<P, B>(path: P, base: B) -> PathBuf
where
    P: AsRef<Path>,
    B: AsRef<Path>,
{
    let path = normalize_lexically(path);
    let base = normalize_lexically(base);
    let path_components = path.components().collect::<Vec<_>>();
    let base_components = base.components().collect::<Vec<_>>();
    let common = path_components
        .iter()
        .zip(&base_components)
        .take_while(|(a, b)| a == b)
        .count();

    let mut relative = PathBuf::new();
    for _ in common..base_components.len() {
        relative.push("..");
    }
    for component in &path_components[common..] {
        relative.push(component);
    }
    if relative.as_os_str().is_empty() {
        relative.push(".");
    }
    relative
}

/// Split a file name into its base and extension,
/// with the extension keeping its leading separator.
///
/// Leading separators do not start an extension,
/// so `.bashrc` has no extension.
pub fn split_ext(name: &str) -> (&str, &str) {
    let leading = name.len() - name.trim_start_matches(EXT_SEPARATOR).len();
    match name[leading..].rfind(EXT_SEPARATOR) {
        Some(i) => name.split_at(leading + i),
        None => (name, ""),
    }
}

/// Make `path` absolute against `cwd` and normalize it.
pub(crate) fn absolutize<P, C>(path: P, cwd: C) -> PathBuf
where
    P: AsRef<Path>,
    C: AsRef<Path>,
{
    normalize_lexically(cwd.as_ref().join(path))
}
