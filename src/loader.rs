//! Source file discovery.
//!
//! [`load_code_files`] walks a project directory and reads every file the
//! analysis should see. A file is loaded when:
//!
//! 1. its extension (case-insensitive) is in `loader.extensions`;
//! 2. no directory between the project root and the file is named in
//!    `loader.ignored_dirs` (case-insensitive);
//! 3. with `loader.skip_tests`, neither the file name nor any directory
//!    below the root contains `test`;
//! 4. its root-relative path matches none of `loader.exclude_globs`.
//!
//! Files that cannot be read as UTF-8 are skipped with a warning.
//!
//! [`folder_tree`] renders a directory as nested JSON nodes for the
//! `/fetch` endpoint. It walks iteratively and stops at [`MAX_TREE_DEPTH`].

use anyhow::Result;
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::Serialize;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

use codelens_core::models::SourceFile;

use crate::config::LoaderConfig;
use crate::error::InputError;

/// Deepest directory level rendered by [`folder_tree`].
pub const MAX_TREE_DEPTH: usize = 32;

pub fn load_code_files(root: &Path, config: &LoaderConfig) -> Result<Vec<SourceFile>> {
    if !root.is_dir() {
        return Err(InputError::PathNotFound(root.to_path_buf()).into());
    }

    let extensions: Vec<String> = config
        .extensions
        .iter()
        .map(|e| normalize_extension(e))
        .collect();
    let ignored: Vec<String> = config
        .ignored_dirs
        .iter()
        .map(|d| d.to_lowercase())
        .collect();
    let exclude_set = build_globset(&config.exclude_globs)?;

    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !skip_dir(entry, &ignored, config.skip_tests));

    let mut files = Vec::new();

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(error = %e, "skipping unreadable directory entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let filename = entry.file_name().to_string_lossy().to_string();
        let relative = path.strip_prefix(root).unwrap_or(path);

        if !has_supported_extension(path, &extensions) {
            continue;
        }
        if config.skip_tests && filename.to_lowercase().contains("test") {
            continue;
        }
        if exclude_set.is_match(relative) {
            continue;
        }

        match std::fs::read_to_string(path) {
            Ok(content) => files.push(SourceFile {
                filename,
                path: path.to_path_buf(),
                content,
            }),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipped unreadable file");
            }
        }
    }

    tracing::info!(root = %root.display(), files = files.len(), "loaded source files");
    Ok(files)
}

fn skip_dir(entry: &DirEntry, ignored: &[String], skip_tests: bool) -> bool {
    if !entry.file_type().is_dir() {
        return false;
    }
    let name = entry.file_name().to_string_lossy().to_lowercase();
    ignored.contains(&name) || (skip_tests && name.contains("test"))
}

fn normalize_extension(ext: &str) -> String {
    ext.trim_start_matches('.').to_lowercase()
}

fn has_supported_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .map(|ext| extensions.contains(&ext.to_string_lossy().to_lowercase()))
        .unwrap_or(false)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

// ============ Folder tree ============

/// One node of a rendered directory tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FolderNode {
    Folder {
        name: String,
        children: Vec<FolderNode>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    File {
        name: String,
    },
}

impl FolderNode {
    fn folder(name: String) -> Self {
        FolderNode::Folder {
            name,
            children: Vec::new(),
            error: None,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            FolderNode::Folder { name, .. } | FolderNode::File { name } => name,
        }
    }

    fn push_child(&mut self, child: FolderNode) {
        if let FolderNode::Folder { children, .. } = self {
            children.push(child);
        }
    }

    fn set_error(&mut self, message: String) {
        if let FolderNode::Folder { error, .. } = self {
            *error = Some(message);
        }
    }
}

/// Render `root` as a tree of folders and files, sorted by name.
///
/// Unreadable directories keep their node and carry an `error` message.
pub fn folder_tree(root: &Path) -> Result<FolderNode> {
    if !root.is_dir() {
        return Err(InputError::PathNotFound(root.to_path_buf()).into());
    }

    // Open folders from the root down to the current walk position.
    let mut stack: Vec<(PathBuf, FolderNode)> = Vec::new();

    for entry in WalkDir::new(root).max_depth(MAX_TREE_DEPTH).sort_by_file_name() {
        match entry {
            Ok(entry) => {
                close_folders(&mut stack, entry.depth());
                let name = if entry.depth() == 0 {
                    display_name(root)
                } else {
                    entry.file_name().to_string_lossy().to_string()
                };

                if entry.file_type().is_dir() {
                    stack.push((entry.path().to_path_buf(), FolderNode::folder(name)));
                } else if let Some((_, parent)) = stack.last_mut() {
                    parent.push_child(FolderNode::File { name });
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "error reading folder structure");
                close_folders(&mut stack, e.depth() + 1);
                if let Some((_, folder)) = stack.last_mut() {
                    folder.set_error(e.to_string());
                }
            }
        }
    }

    close_folders(&mut stack, 1);
    stack
        .pop()
        .map(|(_, node)| node)
        .ok_or_else(|| anyhow::anyhow!("failed to read folder structure: {}", root.display()))
}

/// Pop folders until `depth` remain, attaching each to its parent.
fn close_folders(stack: &mut Vec<(PathBuf, FolderNode)>, depth: usize) {
    while stack.len() > depth.max(1) {
        if let Some((_, done)) = stack.pop() {
            if let Some((_, parent)) = stack.last_mut() {
                parent.push_child(done);
            }
        }
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, body: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, body).unwrap();
    }

    fn project() -> TempDir {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        write(root, "app/main.py", "import os\n");
        write(root, "app/Service.JAVA", "class Service {}\n");
        write(root, "app/readme.md", "# docs\n");
        write(root, "app/test_main.py", "def test(): pass\n");
        write(root, "tests/helpers.py", "x = 1\n");
        write(root, "node_modules/lib/index.js", "module.exports = 1;\n");
        write(root, "Build/gen.c", "int x;\n");
        write(root, "web/app.ts", "export const a = 1;\n");
        write(root, "web/generated/api.ts", "export const b = 2;\n");
        tmp
    }

    fn names(files: &[SourceFile]) -> Vec<&str> {
        files.iter().map(|f| f.filename.as_str()).collect()
    }

    #[test]
    fn test_default_filters() {
        let tmp = project();
        let files = load_code_files(tmp.path(), &LoaderConfig::default()).unwrap();
        assert_eq!(
            names(&files),
            vec!["Service.JAVA", "main.py", "app.ts", "api.ts"]
        );
        let main = files.iter().find(|f| f.filename == "main.py").unwrap();
        assert_eq!(main.content, "import os\n");
        assert!(main.path.ends_with("app/main.py"));
    }

    #[test]
    fn test_tests_included_when_not_skipped() {
        let tmp = project();
        let config = LoaderConfig {
            skip_tests: false,
            ..LoaderConfig::default()
        };
        let files = load_code_files(tmp.path(), &config).unwrap();
        let found = names(&files);
        assert!(found.contains(&"test_main.py"));
        assert!(found.contains(&"helpers.py"));
    }

    #[test]
    fn test_exclude_globs() {
        let tmp = project();
        let config = LoaderConfig {
            exclude_globs: vec!["**/generated/**".to_string()],
            ..LoaderConfig::default()
        };
        let files = load_code_files(tmp.path(), &config).unwrap();
        assert!(!names(&files).contains(&"api.ts"));
        assert!(names(&files).contains(&"app.ts"));
    }

    #[test]
    fn test_missing_root_is_input_error() {
        let err = load_code_files(Path::new("/definitely/not/here"), &LoaderConfig::default())
            .unwrap_err();
        assert!(crate::error::is_input_error(&err));
    }

    #[test]
    fn test_folder_tree_shape() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        write(root, "a.py", "");
        write(root, "pkg/b.py", "");
        write(root, "pkg/deep/c.py", "");
        write(root, "z.txt", "");

        let tree = folder_tree(root).unwrap();
        assert_eq!(tree.name(), display_name(root));
        let json = serde_json::to_value(&tree).unwrap();
        assert_eq!(json["type"], "folder");
        assert_eq!(json["name"], display_name(root));

        let children = json["children"].as_array().unwrap();
        let child_names: Vec<&str> = children.iter().map(|c| c["name"].as_str().unwrap()).collect();
        assert_eq!(child_names, vec!["a.py", "pkg", "z.txt"]);
        assert_eq!(children[0]["type"], "file");
        assert!(children[0].get("children").is_none());

        let pkg = &children[1];
        assert_eq!(pkg["type"], "folder");
        assert_eq!(pkg["children"][0]["name"], "b.py");
        assert_eq!(pkg["children"][1]["name"], "deep");
        assert_eq!(pkg["children"][1]["children"][0]["name"], "c.py");
        assert!(pkg.get("error").is_none());
    }

    #[test]
    fn test_folder_tree_empty_dir() {
        let tmp = TempDir::new().unwrap();
        let tree = folder_tree(tmp.path()).unwrap();
        match tree {
            FolderNode::Folder { children, error, .. } => {
                assert!(children.is_empty());
                assert!(error.is_none());
            }
            FolderNode::File { .. } => panic!("root must be a folder"),
        }
    }

    #[test]
    fn test_folder_tree_depth_bounded() {
        let tmp = TempDir::new().unwrap();
        let mut rel = String::new();
        for i in 0..(MAX_TREE_DEPTH + 5) {
            rel.push_str(&format!("d{}/", i));
        }
        rel.push_str("leaf.py");
        write(tmp.path(), &rel, "");

        let mut node = folder_tree(tmp.path()).unwrap();
        let mut depth = 0;
        while let FolderNode::Folder { mut children, .. } = node {
            if children.is_empty() {
                break;
            }
            node = children.remove(0);
            depth += 1;
        }
        assert_eq!(depth, MAX_TREE_DEPTH);
    }
}
