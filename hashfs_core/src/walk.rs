//! Source tree enumeration.

use crate::error::{Error, Result};
use crate::hash::PathHash;
use std::path::{Component, Path, PathBuf};

/// A regular file found under the source directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    /// Location on disk.
    pub source: PathBuf,
    /// Path inside the archive, `/`-prefixed with `/` separators.
    pub archive_path: String,
    /// Hash of `archive_path`.
    pub hash: PathHash,
}

impl FileRecord {
    /// Build a record for `source`, which must live under `root`.
    pub fn new(root: &Path, source: &Path) -> Result<Self> {
        let archive_path = archive_path(root, source)?;
        let hash = PathHash::of_path(&archive_path);
        Ok(Self {
            source: source.to_path_buf(),
            archive_path,
            hash,
        })
    }
}

/// Compute the archive path of `file` relative to `root`.
///
/// `root/def/world.sii` becomes `/def/world.sii`.
pub fn archive_path(root: &Path, file: &Path) -> Result<String> {
    let rel = file
        .strip_prefix(root)
        .map_err(|_| Error::walk(file, "path is outside the source directory"))?;

    let mut out = String::new();
    for comp in rel.components() {
        let Component::Normal(name) = comp else {
            return Err(Error::walk(file, "unexpected path component"));
        };
        let name = name
            .to_str()
            .ok_or_else(|| Error::walk(file, "file name is not valid UTF-8"))?;
        out.push('/');
        out.push_str(name);
    }

    if out.is_empty() {
        return Err(Error::walk(file, "empty relative path"));
    }

    Ok(out)
}

/// Collect every regular file under `root`, recursively.
///
/// Hidden files and files matched by ignore rules are included; every file in
/// the tree ends up in the archive. Entries are visited in file name order so
/// the result is deterministic.
pub fn collect_files(root: &Path, follow_links: bool) -> Result<Vec<FileRecord>> {
    collect_files_skipping(root, follow_links, &[])
}

/// Like [`collect_files`], but leaves out the files at the `skip` paths.
///
/// Paths are compared after resolving them, so `skip` may be relative or name
/// a file that does not exist yet.
pub fn collect_files_skipping(
    root: &Path,
    follow_links: bool,
    skip: &[&Path],
) -> Result<Vec<FileRecord>> {
    let metadata = std::fs::metadata(root)
        .map_err(|e| Error::invalid_source(root, e.to_string()))?;
    if !metadata.is_dir() {
        return Err(Error::invalid_source(root, "not a directory"));
    }

    let skip: Vec<PathBuf> = skip.iter().filter_map(|p| resolve_path(p)).collect();

    let mut builder = ignore::WalkBuilder::new(root);
    builder
        .standard_filters(false) // Pack everything
        .follow_links(follow_links)
        .sort_by_file_name(|a, b| a.cmp(b));
    if !skip.is_empty() {
        builder.filter_entry(move |entry| !is_skipped(entry.path(), &skip));
    }

    let mut files = Vec::new();
    for entry in builder.build() {
        let entry = entry.map_err(|e| Error::from_walk(root, e))?;

        let is_file = entry.file_type().is_some_and(|t| t.is_file());
        if !is_file {
            if entry.depth() > 0 && !entry.file_type().is_some_and(|t| t.is_dir()) {
                log::debug!("skipping non-regular file {}", entry.path().display());
            }
            continue;
        }

        files.push(FileRecord::new(root, entry.path())?);
    }

    Ok(files)
}

/// Absolute, symlink-free form of `path`. A missing file is resolved through
/// its parent directory.
fn resolve_path(path: &Path) -> Option<PathBuf> {
    if let Ok(resolved) = std::fs::canonicalize(path) {
        return Some(resolved);
    }
    let name = path.file_name()?;
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::canonicalize(parent).ok().map(|p| p.join(name))
}

fn is_skipped(path: &Path, skip: &[PathBuf]) -> bool {
    skip.iter().any(|s| {
        s.file_name() == path.file_name() && resolve_path(path).is_some_and(|p| p == *s)
    })
}

/// Sort records by hash, keeping enumeration order among equal hashes.
pub fn sort_by_hash(files: &mut [FileRecord]) {
    files.sort_by_key(|f| f.hash);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn paths(files: &[FileRecord]) -> Vec<&str> {
        files.iter().map(|f| f.archive_path.as_str()).collect()
    }

    #[test]
    fn test_archive_path() {
        let root = Path::new("/src/mod");
        let path = archive_path(root, Path::new("/src/mod/def/world.sii")).unwrap();
        assert_eq!(path, "/def/world.sii");
    }

    #[test]
    fn test_archive_path_outside_root() {
        let root = Path::new("/src/mod");
        assert!(archive_path(root, Path::new("/other/file")).is_err());
        assert!(archive_path(root, root).is_err());
    }

    #[test]
    fn test_collect_empty_directory() {
        let temp_dir = TempDir::new().unwrap();
        let files = collect_files(temp_dir.path(), false).unwrap();
        assert!(files.is_empty());
    }

    #[test]
    fn test_collect_nested_and_hidden() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("def/sub")).unwrap();
        fs::create_dir(root.join("empty")).unwrap();
        fs::write(root.join("manifest.sii"), b"m").unwrap();
        fs::write(root.join(".hidden"), b"h").unwrap();
        fs::write(root.join(".gitignore"), b"*.sii\n").unwrap();
        fs::write(root.join("def/sub/x.sii"), b"x").unwrap();

        let files = collect_files(root, false).unwrap();
        assert_eq!(
            paths(&files),
            vec!["/.gitignore", "/.hidden", "/def/sub/x.sii", "/manifest.sii"]
        );

        let x = files.iter().find(|f| f.archive_path == "/def/sub/x.sii").unwrap();
        assert_eq!(x.hash, PathHash::of_path("def/sub/x.sii"));
        assert_eq!(x.source, root.join("def/sub/x.sii"));
    }

    #[test]
    fn test_collect_missing_source() {
        let temp_dir = TempDir::new().unwrap();
        let result = collect_files(&temp_dir.path().join("missing"), false);
        assert!(matches!(result, Err(Error::InvalidSource { .. })));
    }

    #[test]
    fn test_collect_file_as_source() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("file.txt");
        fs::write(&file, b"x").unwrap();
        assert!(matches!(
            collect_files(&file, false),
            Err(Error::InvalidSource { .. })
        ));
    }

    #[test]
    #[cfg(unix)]
    fn test_symlinks_skipped_by_default() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("src");
        fs::create_dir(&root).unwrap();
        fs::write(temp_dir.path().join("target.txt"), b"t").unwrap();
        std::os::unix::fs::symlink(temp_dir.path().join("target.txt"), root.join("link.txt"))
            .unwrap();

        assert!(collect_files(&root, false).unwrap().is_empty());
        assert_eq!(paths(&collect_files(&root, true).unwrap()), vec!["/link.txt"]);
    }

    #[test]
    fn test_collect_skipping() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir(root.join("sub")).unwrap();
        fs::write(root.join("keep.txt"), b"k").unwrap();
        fs::write(root.join("out.scs"), b"old").unwrap();
        fs::write(root.join("sub/out.scs"), b"nested").unwrap();

        let out = root.join("out.scs");
        let pending = root.join("sub/next.scs");
        let files = collect_files_skipping(root, false, &[&out, &pending]).unwrap();
        assert_eq!(paths(&files), vec!["/keep.txt", "/sub/out.scs"]);
    }

    #[test]
    fn test_collect_skipping_relative_path() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("mod");
        fs::create_dir(&root).unwrap();
        fs::write(root.join("a.txt"), b"a").unwrap();
        fs::write(root.join("mod.scs"), b"old").unwrap();

        // Same file reached through a `..` detour.
        let out = root.join("../mod/mod.scs");
        let files = collect_files_skipping(&root, false, &[&out]).unwrap();
        assert_eq!(paths(&files), vec!["/a.txt"]);
    }

    #[test]
    #[cfg(unix)]
    fn test_collect_unreadable_directory() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("mod");
        let locked = root.join("locked");
        fs::create_dir_all(&locked).unwrap();
        fs::write(locked.join("x.txt"), b"x").unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        let result = collect_files(&root, false);
        let readable = fs::read_dir(&locked).is_ok();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
        if readable {
            // Running with permission checks bypassed.
            return;
        }

        match result {
            Err(Error::Walk { path, .. }) => assert_eq!(path, locked),
            other => panic!("expected walk error, got {:?}", other),
        }
    }

    #[test]
    fn test_sort_by_hash_is_stable() {
        let root = Path::new("/r");
        let mut files = vec![
            FileRecord::new(root, Path::new("/r/b/long_name.txt")).unwrap(),
            FileRecord::new(root, Path::new("/r/A.txt")).unwrap(),
            FileRecord::new(root, Path::new("/r/a.txt")).unwrap(),
        ];
        sort_by_hash(&mut files);

        assert!(files.windows(2).all(|w| w[0].hash <= w[1].hash));
        let upper = files.iter().position(|f| f.archive_path == "/A.txt").unwrap();
        let lower = files.iter().position(|f| f.archive_path == "/a.txt").unwrap();
        assert_eq!(lower, upper + 1);
    }
}
