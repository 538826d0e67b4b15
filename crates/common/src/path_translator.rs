//! Rewrites container-visible paths into their host equivalents.
//!
//! The container mounts the primary checkout at `/workspace/main` and
//! sibling worktrees at `/workspace/worktrees/<name>`. On the host, the
//! checkout is the project root and worktrees live next to it in
//! `<parent>/worktrees/<name>`. Matching is per path component, so
//! `/workspace/mainline` is not treated as `/workspace/main`.

use std::path::{Path, PathBuf};

pub const DEFAULT_CONTAINER_ROOT: &str = "/workspace";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTranslator {
    project_root: PathBuf,
    container_root: PathBuf,
}

impl PathTranslator {
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
            container_root: PathBuf::from(DEFAULT_CONTAINER_ROOT),
        }
    }

    pub fn with_container_root(mut self, container_root: impl Into<PathBuf>) -> Self {
        self.container_root = container_root.into();
        self
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Pure string rewriting; never touches the filesystem.
    pub fn translate(&self, container_path: &str) -> PathBuf {
        let path = Path::new(container_path);

        if let Ok(rest) = path.strip_prefix(self.container_root.join("main")) {
            return join_rest(&self.project_root, rest);
        }

        if let Ok(rest) = path.strip_prefix(self.container_root.join("worktrees")) {
            if !rest.as_os_str().is_empty() {
                let host_parent = self.project_root.parent().unwrap_or(Path::new("/"));
                return host_parent.join("worktrees").join(rest);
            }
        }

        if let Ok(rest) = path.strip_prefix(&self.container_root) {
            return join_rest(&self.project_root, rest);
        }

        path.to_path_buf()
    }
}

fn join_rest(base: &Path, rest: &Path) -> PathBuf {
    if rest.as_os_str().is_empty() {
        base.to_path_buf()
    } else {
        base.join(rest)
    }
}
