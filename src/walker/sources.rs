//! Lazy recursive iterator over Python source files
//!
//! Walks each search root in order, yielding every regular file whose name
//! ends in `.py`. Traversal state is a stack of open directory handles, so
//! enormous trees never materialize in memory. `sys.path` commonly contains
//! stale entries, so missing roots are skipped without noise; any other
//! open failure is logged and skipped.

use std::fs::{self, ReadDir};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{trace, warn};

/// One discovered source file: the search root it came from plus the path
/// relative to that root.
#[derive(Debug, Clone)]
pub struct PySource {
    pub root: Arc<PathBuf>,
    pub rel_path: PathBuf,
}

impl PySource {
    /// The full filesystem path.
    pub fn absolute(&self) -> PathBuf {
        self.root.join(&self.rel_path)
    }
}

/// Single-consumer iterator over every `.py` file under the given roots.
pub struct SourceWalker {
    roots: std::vec::IntoIter<PathBuf>,
    current_root: Option<Arc<PathBuf>>,
    stack: Vec<ReadDir>,
}

impl SourceWalker {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self {
            roots: roots.into_iter(),
            current_root: None,
            stack: Vec::new(),
        }
    }

    /// Open the next root, skipping the ones that cannot be read.
    fn advance_root(&mut self) -> Option<()> {
        loop {
            let root = self.roots.next()?;
            match fs::read_dir(&root) {
                Ok(read_dir) => {
                    trace!("walking search root {:?}", root);
                    self.current_root = Some(Arc::new(root));
                    self.stack.push(read_dir);
                    return Some(());
                }
                Err(err) if err.kind() == io::ErrorKind::NotFound => {
                    trace!("skipping missing search root {:?}", root);
                }
                Err(err) => {
                    warn!("failed to open search root {:?}: {}", root, err);
                }
            }
        }
    }
}

fn is_py_file(name: &std::ffi::OsStr) -> bool {
    name.as_encoded_bytes().ends_with(b".py")
}

impl Iterator for SourceWalker {
    type Item = PySource;

    fn next(&mut self) -> Option<PySource> {
        loop {
            let read_dir = match self.stack.last_mut() {
                Some(read_dir) => read_dir,
                None => {
                    self.advance_root()?;
                    continue;
                }
            };

            let entry = match read_dir.next() {
                Some(Ok(entry)) => entry,
                Some(Err(err)) => {
                    warn!("directory read error: {}", err);
                    continue;
                }
                None => {
                    self.stack.pop();
                    continue;
                }
            };

            let file_type = match entry.file_type() {
                Ok(file_type) => file_type,
                Err(err) => {
                    warn!("failed to stat {:?}: {}", entry.path(), err);
                    continue;
                }
            };

            if file_type.is_dir() {
                match fs::read_dir(entry.path()) {
                    Ok(read_dir) => self.stack.push(read_dir),
                    Err(err) => warn!("failed to open {:?}: {}", entry.path(), err),
                }
                continue;
            }

            // Symlinks and special files are not regular files; skip them.
            if !file_type.is_file() || !is_py_file(&entry.file_name()) {
                continue;
            }

            let root = self.current_root.as_ref().expect("open stack implies a root");
            let rel_path = match entry.path().strip_prefix(root.as_path()) {
                Ok(rel) => rel.to_path_buf(),
                Err(_) => continue,
            };
            return Some(PySource {
                root: Arc::clone(root),
                rel_path,
            });
        }
    }
}

/// Convenience constructor from discovered search path strings.
pub fn walk_search_paths<I, S>(roots: I) -> SourceWalker
where
    I: IntoIterator<Item = S>,
    S: AsRef<Path>,
{
    SourceWalker::new(roots.into_iter().map(|r| r.as_ref().to_path_buf()).collect())
}
