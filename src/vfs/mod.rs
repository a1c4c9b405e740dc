//! Read-only virtual filesystem backing the site.
//!
//! The packaged site is loaded once at setup into a [`MapFs`]; handlers
//! never touch the disk afterwards. It ships either as a directory or as a
//! zip archive. Archives are parsed through [`SharedReader`], so the loader
//! only relies on positioned reads of the underlying file.

mod reader;

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Read, Seek};
use std::path::Path;

use bytes::Bytes;
use tracing::{debug, warn};
use walkdir::WalkDir;
use zip::ZipArchive;
use zip::result::ZipError;

use crate::config::ConfigError;
use crate::error::Error;

pub use reader::{ReadAt, ReadAtCursor, SharedReader, read_all_at};

/// Normalizes a slash-separated path to the form used as a key: no leading
/// or trailing slash, no empty or `.` segments. Returns `None` if the path
/// tries to climb out with `..`.
pub fn clean_path(path: &str) -> Option<String> {
    let mut segments = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => return None,
            s => segments.push(s),
        }
    }
    Some(segments.join("/"))
}

/// A directory entry as returned by [`MapFs::list`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entry {
    pub name: String,
    pub is_dir: bool,
}

/// An in-memory tree of files keyed by cleaned path.
///
/// Directories are implicit: a path is a directory when some file lives
/// beneath it. The root always exists.
#[derive(Clone, Debug, Default)]
pub struct MapFs {
    files: BTreeMap<String, Bytes>,
}

impl MapFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a file. Paths that escape the root or name the root are skipped.
    pub fn insert(&mut self, path: &str, data: impl Into<Bytes>) -> &mut Self {
        match clean_path(path) {
            Some(key) if !key.is_empty() => {
                self.files.insert(key, data.into());
            }
            _ => warn!(path, "refusing to add file outside the tree"),
        }
        self
    }

    pub fn get(&self, path: &str) -> Option<&Bytes> {
        self.files.get(&clean_path(path)?)
    }

    pub fn is_dir(&self, path: &str) -> bool {
        let Some(key) = clean_path(path) else { return false };
        if key.is_empty() {
            return true;
        }
        let prefix = format!("{key}/");
        self.files
            .range(prefix.clone()..)
            .next()
            .is_some_and(|(k, _)| k.starts_with(&prefix))
    }

    /// Immediate children of `dir`, sorted by name.
    pub fn list(&self, dir: &str) -> Vec<Entry> {
        let Some(key) = clean_path(dir) else { return Vec::new() };
        let prefix = if key.is_empty() { key } else { format!("{key}/") };

        let mut children = BTreeMap::new();
        for (path, _) in self.files.range(prefix.clone()..) {
            let Some(rest) = path.strip_prefix(&prefix) else { break };
            match rest.split_once('/') {
                Some((sub, _)) => children.insert(sub.to_owned(), true),
                None => children.insert(rest.to_owned(), false),
            };
        }
        children
            .into_iter()
            .map(|(name, is_dir)| Entry { name, is_dir })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Loads every regular file under `root`.
    pub fn load_dir(root: &Path) -> Result<Self, Error> {
        if !root.is_dir() {
            return Err(ConfigError::MissingDirectory(root.to_path_buf()).into());
        }

        let mut fs = Self::new();
        for entry in WalkDir::new(root).follow_links(true) {
            let entry = entry.map_err(|e| Error::Setup {
                path: e.path().unwrap_or(root).to_path_buf(),
                source: e.into(),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let Some(key) = relative_key(root, path) else {
                warn!(path = %path.display(), "skipping file with non UTF-8 name");
                continue;
            };
            let data = std::fs::read(path).map_err(|source| Error::Setup {
                path: path.to_path_buf(),
                source,
            })?;
            fs.insert(&key, data);
        }

        debug!(root = %root.display(), files = fs.len(), "asset tree loaded");
        Ok(fs)
    }

    /// Loads the files under `root` inside the zip archive at `path`.
    ///
    /// `root` becomes `/` of the tree; entries outside it are skipped. An
    /// empty `root` takes the whole archive.
    pub fn load_zip(path: &Path, root: &str) -> Result<Self, Error> {
        if !path.is_file() {
            return Err(ConfigError::MissingArchive(path.to_path_buf()).into());
        }
        let setup = |source| Error::Setup { path: path.to_path_buf(), source };

        let reader = SharedReader::new(File::open(path).map_err(setup)?);
        let len = reader.len().map_err(setup)?;
        let fs = Self::from_zip(ReadAtCursor::new(&reader, len), root)
            .map_err(|source| Error::Archive { path: path.to_path_buf(), source })?;

        debug!(archive = %path.display(), root, files = fs.len(), "asset archive loaded");
        Ok(fs)
    }

    /// Reads every file under `root` from a zip archive.
    pub fn from_zip(archive: impl Read + Seek, root: &str) -> Result<Self, ZipError> {
        let root = clean_path(root).unwrap_or_default();
        let prefix = if root.is_empty() { root } else { format!("{root}/") };

        let mut archive = ZipArchive::new(archive)?;
        let mut fs = Self::new();
        for i in 0..archive.len() {
            let mut file = archive.by_index(i)?;
            if file.is_dir() {
                continue;
            }
            let Some(key) = file.name().strip_prefix(prefix.as_str()).map(str::to_owned) else {
                continue;
            };
            let mut data = Vec::with_capacity(usize::try_from(file.size()).unwrap_or(0));
            file.read_to_end(&mut data)?;
            fs.insert(&key, data);
        }
        Ok(fs)
    }
}

fn relative_key(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Option<Vec<&str>> = rel.components().map(|c| c.as_os_str().to_str()).collect();
    Some(parts?.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> MapFs {
        let mut fs = MapFs::new();
        fs.insert("/doc/index.html", "<h1>doc</h1>")
            .insert("doc/play/play.js", "play()")
            .insert("doc.txt", "flat")
            .insert("robots.txt", "User-agent: *");
        fs
    }

    #[test]
    fn clean_path_normalizes_and_rejects_escapes() {
        assert_eq!(clean_path("/a//b/./c/").as_deref(), Some("a/b/c"));
        assert_eq!(clean_path("/").as_deref(), Some(""));
        assert_eq!(clean_path("/a/../b"), None);
    }

    #[test]
    fn lookup_and_directories() {
        let fs = sample();
        assert_eq!(fs.get("/doc/index.html").unwrap(), "<h1>doc</h1>");
        assert!(fs.get("/doc").is_none());
        assert!(fs.is_dir("/doc/"));
        assert!(fs.is_dir("/"));
        assert!(!fs.is_dir("/doc.txt"));
        assert!(!fs.is_dir("/nope"));
    }

    #[test]
    fn list_reports_direct_children() {
        let fs = sample();
        let root: Vec<_> = fs.list("/").into_iter().map(|e| (e.name, e.is_dir)).collect();
        assert_eq!(
            root,
            [("doc".to_owned(), true), ("doc.txt".to_owned(), false), ("robots.txt".to_owned(), false)]
        );
        let doc: Vec<_> = fs.list("doc").into_iter().map(|e| e.name).collect();
        assert_eq!(doc, ["index.html", "play"]);
    }

    #[test]
    fn escaping_inserts_are_dropped() {
        let mut fs = MapFs::new();
        fs.insert("../etc/passwd", "x").insert("/", "root");
        assert!(fs.is_empty());
    }

    #[test]
    fn load_dir_reads_nested_files() {
        let root = std::env::temp_dir().join(format!("localserve-vfs-{}", std::process::id()));
        std::fs::create_dir_all(root.join("pkg/fmt")).unwrap();
        std::fs::write(root.join("index.html"), "home").unwrap();
        std::fs::write(root.join("pkg/fmt/doc.html"), "fmt docs").unwrap();

        let fs = MapFs::load_dir(&root).unwrap();
        std::fs::remove_dir_all(&root).unwrap();

        assert_eq!(fs.len(), 2);
        assert_eq!(fs.get("index.html").unwrap(), "home");
        assert_eq!(fs.get("/pkg/fmt/doc.html").unwrap(), "fmt docs");
    }

    fn zip_bytes(entries: &[(&str, &str)]) -> Vec<u8> {
        use std::io::Write;
        use zip::write::SimpleFileOptions;

        let mut w = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
        w.add_directory("go/", SimpleFileOptions::default()).unwrap();
        for (name, body) in entries {
            w.start_file(*name, SimpleFileOptions::default()).unwrap();
            w.write_all(body.as_bytes()).unwrap();
        }
        w.finish().unwrap().into_inner()
    }

    #[test]
    fn zip_archive_under_a_root() {
        let bytes = zip_bytes(&[
            ("go/doc/index.html", "<h1>doc</h1>"),
            ("go/pkg/fmt/doc.html", "fmt"),
            ("other/readme.txt", "outside"),
        ]);
        let fs = MapFs::from_zip(std::io::Cursor::new(bytes), "/go").unwrap();
        assert_eq!(fs.len(), 2);
        assert_eq!(fs.get("/doc/index.html").unwrap(), "<h1>doc</h1>");
        assert!(fs.is_dir("/pkg/fmt"));
        assert!(fs.get("other/readme.txt").is_none());
    }

    #[test]
    fn load_zip_reads_through_shared_reader() {
        let path = std::env::temp_dir().join(format!("localserve-vfs-{}.zip", std::process::id()));
        std::fs::write(&path, zip_bytes(&[("index.html", "home"), ("go/x.txt", "x")])).unwrap();

        let fs = MapFs::load_zip(&path, "").unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(fs.len(), 2);
        assert_eq!(fs.get("index.html").unwrap(), "home");
        assert_eq!(fs.get("go/x.txt").unwrap(), "x");
    }

    #[test]
    fn load_zip_rejects_missing_and_corrupt_archives() {
        let err = MapFs::load_zip(Path::new("/definitely/not/here.zip"), "").unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::MissingArchive(_))));

        let path = std::env::temp_dir().join(format!("localserve-bad-{}.zip", std::process::id()));
        std::fs::write(&path, "not a zip").unwrap();
        let err = MapFs::load_zip(&path, "").unwrap_err();
        std::fs::remove_file(&path).unwrap();
        assert!(matches!(err, Error::Archive { .. }), "{err}");
    }

    #[test]
    fn load_dir_requires_a_directory() {
        let err = MapFs::load_dir(Path::new("/definitely/not/here")).unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::MissingDirectory(_))));
    }
}
