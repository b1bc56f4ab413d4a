//! Discovery and interactive selection of bundle archives.
//!
//! When `upload` is run without a bundle path, the current directory tree is
//! searched for `.zip` files and the user picks one, or types a path.

use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{Context, Result};
use console::style;
use dialoguer::{Input, Select, theme::ColorfulTheme};

use crate::{CliError, use_fancy_output};

/// Maximum directory depth when searching for bundles.
const MAX_SEARCH_DEPTH: usize = 3;

/// Directories to skip during search.
const SKIP_DIRS: &[&str] = &["target", "node_modules"];

/// Bundle file extension.
const BUNDLE_EXTENSION: &str = "zip";

/// A discovered bundle file.
#[derive(Debug, Clone)]
pub struct BundleCandidate {
    /// Full path to the archive.
    pub path: PathBuf,
    /// File size in bytes.
    pub size: u64,
    /// Last modification time.
    pub modified: Option<SystemTime>,
}

impl BundleCandidate {
    /// Size with a binary unit, e.g. `2.0 KiB`.
    pub fn human_size(&self) -> String {
        const UNITS: [&str; 3] = ["KiB", "MiB", "GiB"];
        if self.size < 1024 {
            return format!("{} bytes", self.size);
        }
        #[allow(clippy::cast_precision_loss)]
        let mut value = self.size as f64 / 1024.0;
        let mut unit = 0;
        while value >= 1024.0 && unit + 1 < UNITS.len() {
            value /= 1024.0;
            unit += 1;
        }
        format!("{value:.1} {}", UNITS[unit])
    }

    /// Selection list label: path relative to `base`, then the size.
    pub fn display_label(&self, base: &Path) -> String {
        let rel = self.path.strip_prefix(base).unwrap_or(&self.path);
        format!("{}  [{}]", rel.display(), self.human_size())
    }
}

/// Search for `.zip` files under `base_dir`, newest first.
pub fn find_bundle_files(base_dir: &Path) -> Vec<BundleCandidate> {
    let mut candidates = Vec::new();
    walk_dir(base_dir, 0, &mut candidates);

    candidates.sort_by(|a, b| {
        b.modified
            .cmp(&a.modified)
            .then_with(|| a.path.cmp(&b.path))
    });
    candidates
}

fn walk_dir(dir: &Path, depth: usize, out: &mut Vec<BundleCandidate>) {
    if depth > MAX_SEARCH_DEPTH {
        return;
    }

    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with('.') || SKIP_DIRS.contains(&name.as_ref()) {
                continue;
            }
            walk_dir(&path, depth + 1, out);
        } else if path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case(BUNDLE_EXTENSION))
        {
            let meta = entry.metadata().ok();
            out.push(BundleCandidate {
                path,
                size: meta.as_ref().map_or(0, std::fs::Metadata::len),
                modified: meta.and_then(|m| m.modified().ok()),
            });
        }
    }
}

/// Resolve the bundle path: use it if given, otherwise search `base` and ask.
///
/// In non-interactive mode a single discovered bundle is used as is; zero or
/// several candidates are a usage error.
pub fn resolve_bundle(
    bundle: Option<PathBuf>,
    base: &Path,
    non_interactive: bool,
    quiet: bool,
) -> Result<PathBuf> {
    if let Some(path) = bundle {
        return Ok(path);
    }

    let candidates = find_bundle_files(base);

    if non_interactive {
        return match candidates.as_slice() {
            [only] => {
                if !quiet {
                    eprintln!(
                        "{} Using bundle {}",
                        style("📦").cyan(),
                        only.display_label(base)
                    );
                }
                Ok(only.path.clone())
            },
            [] => Err(CliError::Usage("No bundle given and no .zip file found".into()).into()),
            _ => {
                for c in &candidates {
                    eprintln!("  {}", c.display_label(base));
                }
                Err(CliError::Usage(
                    "Found multiple bundles; pass the bundle path explicitly".into(),
                )
                .into())
            },
        };
    }

    if !std::io::stdin().is_terminal() {
        return Err(CliError::Usage("Bundle path required (no terminal to prompt on)".into()).into());
    }

    if candidates.is_empty() {
        return prompt_for_path();
    }

    let mut labels: Vec<String> = candidates.iter().map(|c| c.display_label(base)).collect();
    labels.push("Enter a path...".to_string());

    let theme = ColorfulTheme::default();
    let select = if use_fancy_output() {
        Select::with_theme(&theme)
    } else {
        Select::new()
    };
    let selection = select
        .with_prompt("Select the bundle to upload")
        .items(&labels)
        .default(0)
        .interact_opt()
        .context("bundle selection failed")?;

    match selection {
        Some(idx) if idx < candidates.len() => Ok(candidates[idx].path.clone()),
        Some(_) => prompt_for_path(),
        None => Err(CliError::Cancelled("Bundle selection cancelled".into()).into()),
    }
}

fn prompt_for_path() -> Result<PathBuf> {
    let input: String = Input::with_theme(&ColorfulTheme::default())
        .with_prompt("Path to the bundle (.zip)")
        .validate_with(|value: &String| -> std::result::Result<(), &str> {
            if Path::new(value.trim()).is_file() {
                Ok(())
            } else {
                Err("no such file")
            }
        })
        .interact_text()
        .context("bundle path prompt failed")?;
    Ok(PathBuf::from(input.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn create_test_tree(dir: &Path, files: &[&str]) {
        for file in files {
            let path = dir.join(file);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            fs::write(&path, vec![0u8; 1024]).unwrap();
        }
    }

    #[test]
    fn test_find_no_bundle() {
        let tmp = tempfile::tempdir().unwrap();
        create_test_tree(tmp.path(), &["readme.txt"]);
        assert!(find_bundle_files(tmp.path()).is_empty());
    }

    #[test]
    fn test_find_bundles_skips_hidden_and_target() {
        let tmp = tempfile::tempdir().unwrap();
        create_test_tree(
            tmp.path(),
            &["fw.zip", "out/other.ZIP", ".git/x.zip", "target/debug/y.zip"],
        );
        let found = find_bundle_files(tmp.path());
        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|c| !c.path.to_string_lossy().contains("target")));
    }

    #[test]
    fn test_max_depth_exceeded() {
        let tmp = tempfile::tempdir().unwrap();
        create_test_tree(tmp.path(), &["a/b/c/d/e/deep.zip"]);
        assert!(find_bundle_files(tmp.path()).is_empty());
    }

    #[test]
    fn test_human_size() {
        let mut c = BundleCandidate {
            path: PathBuf::from("fw.zip"),
            size: 512,
            modified: None,
        };
        assert_eq!(c.human_size(), "512 bytes");
        c.size = 2048;
        assert_eq!(c.human_size(), "2.0 KiB");
        c.size = 3 * 1024 * 1024;
        assert_eq!(c.human_size(), "3.0 MiB");
        c.size = 5 * 1024 * 1024 * 1024;
        assert_eq!(c.human_size(), "5.0 GiB");
    }

    #[test]
    fn test_display_label_is_relative() {
        let c = BundleCandidate {
            path: PathBuf::from("/work/out/fw.zip"),
            size: 100,
            modified: None,
        };
        assert_eq!(c.display_label(Path::new("/work")), "out/fw.zip  [100 bytes]");
    }

    #[test]
    fn test_resolve_explicit_path() {
        let p = PathBuf::from("/some/bundle.zip");
        let result = resolve_bundle(Some(p.clone()), Path::new("."), true, true).unwrap();
        assert_eq!(result, p);
    }

    #[test]
    fn test_resolve_single_non_interactive() {
        let tmp = tempfile::tempdir().unwrap();
        create_test_tree(tmp.path(), &["only.zip"]);
        let result = resolve_bundle(None, tmp.path(), true, true).unwrap();
        assert!(result.ends_with("only.zip"));
    }

    #[test]
    fn test_resolve_none_non_interactive_is_usage_error() {
        let tmp = tempfile::tempdir().unwrap();
        let err = resolve_bundle(None, tmp.path(), true, true).unwrap_err();
        assert!(matches!(err.downcast_ref::<CliError>(), Some(CliError::Usage(_))));
    }

    #[test]
    fn test_resolve_multiple_non_interactive_is_usage_error() {
        let tmp = tempfile::tempdir().unwrap();
        create_test_tree(tmp.path(), &["a.zip", "b.zip"]);
        let err = resolve_bundle(None, tmp.path(), true, true).unwrap_err();
        assert!(matches!(err.downcast_ref::<CliError>(), Some(CliError::Usage(_))));
    }
}
