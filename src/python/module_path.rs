//! Module path resolution
//!
//! Maps a `.py` source file to the dotted module name an `import` statement
//! would use, by probing ancestor directories for `__init__.py` package
//! markers. The result depends only on the path and the marker set, so a
//! file can be resolved at any point during a scan.

use crate::error::ResolveError;
use std::path::Path;

/// Resolve the dotted module name for a `.py` file.
///
/// The filename contributes its stem unless it is `__init__.py` (a package's
/// own module is the package). Ancestor directories contribute their names
/// for as long as the `__init__.py` chain is unbroken, innermost first.
pub fn module_path(path: &Path) -> Result<String, ResolveError> {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| ResolveError::NotPyFile(path.to_path_buf()))?;
    if !file_name.ends_with(".py") {
        return Err(ResolveError::NotPyFile(path.to_path_buf()));
    }

    // Components collected innermost-first, reversed at the end.
    let mut components: Vec<&str> = Vec::new();
    if file_name != "__init__.py" {
        components.push(&file_name[..file_name.len() - ".py".len()]);
    }

    let mut dir = path.parent();
    while let Some(ancestor) = dir {
        if !ancestor.join("__init__.py").is_file() {
            break;
        }
        match ancestor.file_name().and_then(|name| name.to_str()) {
            Some(name) => components.push(name),
            None => break,
        }
        dir = ancestor.parent();
    }

    components.reverse();
    Ok(components.join("."))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    /// Build a directory tree where every listed package dir gets an
    /// `__init__.py` marker, then return the tempdir root.
    fn package_tree(packages: &[&str], files: &[&str]) -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        for package in packages {
            let path = dir.path().join(package);
            fs::create_dir_all(&path).unwrap();
            fs::write(path.join("__init__.py"), b"").unwrap();
        }
        for file in files {
            let path = dir.path().join(file);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, b"").unwrap();
        }
        dir
    }

    #[test]
    fn test_plain_module_in_package() {
        let dir = package_tree(&["html2text"], &["html2text/config.py"]);
        let resolved = module_path(&dir.path().join("html2text/config.py")).unwrap();
        assert_eq!(resolved, "html2text.config");
    }

    #[test]
    fn test_package_init_resolves_to_package() {
        let dir = package_tree(
            &[
                "django",
                "django/conf",
                "django/conf/locale",
                "django/conf/locale/cs",
            ],
            &[],
        );
        let resolved =
            module_path(&dir.path().join("django/conf/locale/cs/__init__.py")).unwrap();
        assert_eq!(resolved, "django.conf.locale.cs");
    }

    #[test]
    fn test_top_level_module_has_no_prefix() {
        let dir = package_tree(&[], &["site-packages/split.py"]);
        let resolved = module_path(&dir.path().join("site-packages/split.py")).unwrap();
        assert_eq!(resolved, "split");
    }

    #[test]
    fn test_marker_gap_stops_the_climb() {
        // vendored/pkg has a marker but vendored does not, so only the
        // innermost directory prefixes the name.
        let dir = package_tree(&["vendored/pkg"], &["vendored/pkg/util.py"]);
        let resolved = module_path(&dir.path().join("vendored/pkg/util.py")).unwrap();
        assert_eq!(resolved, "pkg.util");
    }

    #[test]
    fn test_non_py_file_rejected() {
        let err = module_path(&PathBuf::from("/tmp/readme.txt")).unwrap_err();
        assert_eq!(err, ResolveError::NotPyFile(PathBuf::from("/tmp/readme.txt")));
    }

    #[test]
    fn test_deterministic() {
        let dir = package_tree(&["pkg"], &["pkg/mod.py"]);
        let path = dir.path().join("pkg/mod.py");
        assert_eq!(module_path(&path).unwrap(), module_path(&path).unwrap());
    }
}
