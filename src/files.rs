//! Filesystem scans and copies between the main repository and a new worktree.

use anyhow::{Context, Result, anyhow};
use fs_extra::dir as fs_dir;
use fs_extra::file as fs_file;
use ignore::WalkBuilder;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::git;

const SKIPPED_DIRS: &[&str] = &["node_modules", ".git"];
const PROJECT_SCAN_DEPTH: usize = 3;

/// Lockfiles in priority order.
const LOCKFILES: &[(&str, PackageManager)] = &[
    ("bun.lockb", PackageManager::Bun),
    ("bun.lock", PackageManager::Bun),
    ("pnpm-lock.yaml", PackageManager::Pnpm),
    ("yarn.lock", PackageManager::Yarn),
    ("package-lock.json", PackageManager::Npm),
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PackageManager {
    Bun,
    Pnpm,
    Yarn,
    #[default]
    Npm,
}

impl PackageManager {
    pub fn program(self) -> &'static str {
        match self {
            PackageManager::Bun => "bun",
            PackageManager::Pnpm => "pnpm",
            PackageManager::Yarn => "yarn",
            PackageManager::Npm => "npm",
        }
    }
}

impl std::fmt::Display for PackageManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.program())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepoKind {
    Monorepo,
    MultiProject,
    SingleProject,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    /// Relative to the repository root; `"."` for the root itself.
    pub relative_path: String,
    pub package_manager: PackageManager,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoStructure {
    pub kind: RepoKind,
    pub projects: Vec<Project>,
}

impl RepoStructure {
    pub fn has_projects(&self) -> bool {
        !self.projects.is_empty()
    }
}

// ── Scans ────────────────────────────────────────────────────────

fn relative(root: &Path, path: &Path) -> Result<String> {
    let rel = path
        .strip_prefix(root)
        .with_context(|| format!("{} is outside {}", path.display(), root.display()))?;
    Ok(rel.to_string_lossy().replace('\\', "/"))
}

fn is_skipped(name: &str) -> bool {
    SKIPPED_DIRS.contains(&name)
}

/// Depth-first walk below `root` that never descends into directories
/// for which `prune` returns true. Symlinks are not followed and no
/// ignore files are consulted.
fn walker(root: &Path, max_depth: Option<usize>, prune: fn(&str) -> bool) -> ignore::Walk {
    WalkBuilder::new(root)
        .standard_filters(false)
        .follow_links(false)
        .max_depth(max_depth)
        .filter_entry(move |entry| {
            entry.depth() == 0
                || !entry.file_type().is_some_and(|t| t.is_dir())
                || !prune(&entry.file_name().to_string_lossy())
        })
        .build()
}

/// Untracked `.env*` files anywhere below `root`, as sorted relative paths.
pub fn find_env_files(root: &Path) -> Result<Vec<String>> {
    let tracked = git::tracked_files(root, "*.env*")?;
    let mut found = Vec::new();
    for entry in walker(root, None, is_skipped) {
        let entry = entry.with_context(|| format!("Failed to scan {}", root.display()))?;
        if entry.file_type().is_some_and(|t| t.is_dir())
            || !entry.file_name().to_string_lossy().starts_with(".env")
        {
            continue;
        }
        let rel = relative(root, entry.path())?;
        if !tracked.contains(&rel) {
            found.push(rel);
        }
    }
    found.sort();
    debug!(count = found.len(), tracked = tracked.len(), "files:env scan");
    Ok(found)
}

/// Gitignored files and directories whose name contains "generated"
/// (case-insensitive). A matched directory is reported as a whole and
/// nothing beneath it is listed separately.
pub fn find_generated_files(root: &Path) -> Result<Vec<String>> {
    let ignored = git::ignored_entries(root)?;
    let mut found: Vec<String> = Vec::new();
    if ignored.is_empty() {
        debug!("files:generated scan, nothing ignored");
        return Ok(found);
    }
    for entry in walker(root, None, is_skipped) {
        let entry = entry.with_context(|| format!("Failed to scan {}", root.display()))?;
        if entry.depth() == 0
            || !entry
                .file_name()
                .to_string_lossy()
                .to_lowercase()
                .contains("generated")
        {
            continue;
        }
        let rel = relative(root, entry.path())?;
        // Parents are yielded before their children.
        let under_found = found
            .iter()
            .any(|dir| rel.strip_prefix(dir.as_str()).is_some_and(|r| r.starts_with('/')));
        if !under_found && git::is_covered_by(&ignored, &rel) {
            found.push(rel);
        }
    }
    found.sort();
    debug!(count = found.len(), "files:generated scan");
    Ok(found)
}

#[derive(Deserialize)]
struct PackageJson {
    workspaces: Option<serde_json::Value>,
}

fn is_monorepo(root: &Path) -> bool {
    if root.join("pnpm-workspace.yaml").exists() || root.join("lerna.json").exists() {
        return true;
    }
    fs::read_to_string(root.join("package.json"))
        .ok()
        .and_then(|s| serde_json::from_str::<PackageJson>(&s).ok())
        .and_then(|p| p.workspaces)
        .is_some_and(|w| w.is_array() || w.is_object())
}

pub fn detect_package_manager(dir: &Path) -> PackageManager {
    LOCKFILES
        .iter()
        .find(|(file, _)| dir.join(file).exists())
        .map(|(_, pm)| *pm)
        .unwrap_or_default()
}

fn is_pruned_for_projects(name: &str) -> bool {
    name.starts_with('.') || matches!(name, "node_modules" | "dist" | "build")
}

/// Directories holding a `package.json`, at most `PROJECT_SCAN_DEPTH`
/// levels below `root`.
fn find_project_dirs(root: &Path) -> Vec<PathBuf> {
    walker(root, Some(PROJECT_SCAN_DEPTH), is_pruned_for_projects)
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                debug!(error = %err, "files:project scan skipped entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_some_and(|t| t.is_dir()))
        .filter(|entry| entry.path().join("package.json").is_file())
        .map(|entry| entry.into_path())
        .collect()
}

/// Classify the repository by its JavaScript project layout.
pub fn detect_repo_structure(root: &Path) -> Result<RepoStructure> {
    if is_monorepo(root) {
        return Ok(RepoStructure {
            kind: RepoKind::Monorepo,
            projects: vec![Project {
                relative_path: ".".to_string(),
                package_manager: detect_package_manager(root),
            }],
        });
    }

    let dirs = find_project_dirs(root);
    let mut projects = dirs
        .iter()
        .map(|d| {
            let rel = relative(root, d)?;
            Ok(Project {
                relative_path: if rel.is_empty() { ".".to_string() } else { rel },
                package_manager: detect_package_manager(d),
            })
        })
        .collect::<Result<Vec<_>>>()?;
    projects.sort_by(|a, b| match (a.relative_path == ".", b.relative_path == ".") {
        (true, false) => std::cmp::Ordering::Less,
        (false, true) => std::cmp::Ordering::Greater,
        _ => a.relative_path.cmp(&b.relative_path),
    });

    let kind = if projects.len() > 1 {
        RepoKind::MultiProject
    } else {
        RepoKind::SingleProject
    };
    Ok(RepoStructure { kind, projects })
}

// ── Copies ───────────────────────────────────────────────────────

fn ensure_parent(dest: &Path) -> Result<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create parent directory for {:?}", dest))?;
    }
    Ok(())
}

fn remove_existing(dest: &Path) -> Result<()> {
    // symlink_metadata so an existing link is replaced, not followed
    if let Ok(metadata) = dest.symlink_metadata() {
        if metadata.is_dir() {
            fs::remove_dir_all(dest)
                .with_context(|| format!("Failed to remove existing directory at {:?}", dest))?;
        } else {
            fs::remove_file(dest)
                .with_context(|| format!("Failed to remove existing file at {:?}", dest))?;
        }
    }
    Ok(())
}

/// Link each file in `dest_root` back to its source with a relative symlink.
pub fn symlink_env_files(src_root: &Path, dest_root: &Path, files: &[String]) -> Result<()> {
    for rel in files {
        let source = src_root.join(rel);
        let dest = dest_root.join(rel);
        ensure_parent(&dest)?;
        let dest_parent = dest
            .parent()
            .ok_or_else(|| anyhow!("No parent directory for {:?}", dest))?;
        let target = pathdiff::diff_paths(&source, dest_parent).unwrap_or_else(|| source.clone());
        remove_existing(&dest)?;

        #[cfg(unix)]
        std::os::unix::fs::symlink(&target, &dest)
            .with_context(|| format!("Failed to symlink {:?} to {:?}", target, dest))?;

        #[cfg(windows)]
        std::os::windows::fs::symlink_file(&target, &dest)
            .with_context(|| format!("Failed to symlink {:?} to {:?}", target, dest))?;
    }
    debug!(count = files.len(), "files:env symlinked");
    Ok(())
}

fn copy_file(source: &Path, dest: &Path) -> Result<()> {
    ensure_parent(dest)?;
    remove_existing(dest)?;
    let mut options = fs_file::CopyOptions::new();
    options.overwrite = true;
    fs_file::copy(source, dest, &options)
        .with_context(|| format!("Failed to copy file {:?} to {:?}", source, dest))?;
    Ok(())
}

pub fn copy_env_files(src_root: &Path, dest_root: &Path, files: &[String]) -> Result<()> {
    for rel in files {
        copy_file(&src_root.join(rel), &dest_root.join(rel))?;
    }
    debug!(count = files.len(), "files:env copied");
    Ok(())
}

/// Copy generated files and whole generated directories.
pub fn copy_generated_files(src_root: &Path, dest_root: &Path, items: &[String]) -> Result<()> {
    for rel in items {
        let source = src_root.join(rel);
        let dest = dest_root.join(rel);
        if source.is_dir() {
            fs::create_dir_all(&dest)?;
            let mut options = fs_dir::CopyOptions::new();
            options.overwrite = true;
            options.content_only = true;
            fs_dir::copy(&source, &dest, &options)
                .with_context(|| format!("Failed to copy directory {:?} to {:?}", source, dest))?;
        } else {
            copy_file(&source, &dest)?;
        }
    }
    debug!(count = items.len(), "files:generated copied");
    Ok(())
}
