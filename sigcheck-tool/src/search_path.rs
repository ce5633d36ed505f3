// Copyright 2023 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Directories searched for files named on the command line.

use std::env;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

/// Ordered list of directories to look for a file in.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SearchPath {
    dirs: Vec<PathBuf>,
}

fn same_dir(a: &Path, b: &Path) -> bool {
    if cfg!(windows) {
        a.as_os_str().eq_ignore_ascii_case(b.as_os_str())
    } else {
        a == b
    }
}

impl SearchPath {
    /// Search path with the system directories (on Windows), then every
    /// `PATH` entry, then `extra`.
    pub fn from_env(extra: &[PathBuf]) -> Self {
        let mut path = Self::default();
        if cfg!(windows) {
            if let Some(root) = env::var_os("SystemRoot") {
                let root = PathBuf::from(root);
                path.append(root.join("System32"));
                path.append(root);
            }
        }
        if let Some(var) = env::var_os("PATH") {
            for dir in env::split_paths(&var) {
                path.append(dir);
            }
        }
        for dir in extra {
            path.append(dir.clone());
        }
        path
    }

    /// Add a directory to the end. Empty entries are ignored.
    pub fn append(&mut self, dir: PathBuf) {
        if !dir.as_os_str().is_empty() {
            self.dirs.push(dir);
        }
    }

    /// Put the directory of `file` first, unless already present.
    pub fn register(&mut self, file: &Path) {
        let Some(dir) = file
            .canonicalize()
            .ok()
            .and_then(|full| full.parent().map(Path::to_path_buf))
        else {
            tracing::debug!(file = %file.display(), "cannot locate directory");
            return;
        };
        if !self.dirs.iter().any(|known| same_dir(known, &dir)) {
            self.dirs.insert(0, dir);
        }
    }

    /// Resolve a file name.
    ///
    /// An existing or absolute path is returned as is. Otherwise the
    /// first directory holding a file with the same name wins.
    pub fn find(&self, name: &Path) -> Option<PathBuf> {
        if name.is_absolute() || name.exists() {
            return Some(name.to_path_buf());
        }
        let base: &OsStr = name.file_name()?;
        self.dirs.iter().find_map(|dir| {
            tracing::debug!(
                file = ?base,
                dir = %dir.display(),
                "searching"
            );
            let candidate = dir.join(base);
            candidate.is_file().then_some(candidate)
        })
    }

    /// The directories in search order.
    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fs_err as fs;

    #[test]
    fn test_find_in_order() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        fs::write(second.path().join("app.exe"), b"MZ").unwrap();

        let mut path = SearchPath::default();
        path.append(first.path().to_path_buf());
        path.append(second.path().to_path_buf());
        assert_eq!(
            path.find(Path::new("app.exe")),
            Some(second.path().join("app.exe"))
        );

        fs::write(first.path().join("app.exe"), b"MZ").unwrap();
        assert_eq!(
            path.find(Path::new("app.exe")),
            Some(first.path().join("app.exe"))
        );
        assert_eq!(path.find(Path::new("missing.dll")), None);
    }

    #[test]
    fn test_absolute_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.exe");
        assert_eq!(SearchPath::default().find(&missing), Some(missing));
    }

    #[test]
    fn test_register_prepends_once() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("lib.dll");
        fs::write(&file, b"MZ").unwrap();

        let mut path = SearchPath::default();
        path.append(PathBuf::from("/nonexistent"));
        path.register(&file);
        path.register(&file);
        assert_eq!(path.dirs().len(), 2);
        assert_eq!(path.dirs()[0], dir.path().canonicalize().unwrap());
    }

    #[test]
    fn test_empty_entries_ignored() {
        let mut path = SearchPath::default();
        path.append(PathBuf::new());
        assert!(path.dirs().is_empty());
    }

    #[test]
    fn test_from_env_includes_extra() {
        let extra = PathBuf::from("/opt/sigcheck-extra");
        let path = SearchPath::from_env(&[extra.clone()]);
        assert_eq!(path.dirs().last(), Some(&extra));
    }
}
