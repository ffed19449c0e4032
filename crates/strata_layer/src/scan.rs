//! Source directory scanning for started layers.

use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::error::LayerError;
use crate::layer::{Layer, SourceEntry};

/// What counts as a source file when scanning.
#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    /// Accepted file extensions (without the dot). Empty accepts every file.
    pub extensions: Vec<String>,
    /// Generated-output directories never scanned as sources.
    pub output_dirs: Vec<PathBuf>,
}

impl ScanOptions {
    fn accepts(&self, path: &Path) -> bool {
        if self.extensions.is_empty() {
            return true;
        }
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|x| x == ext))
    }

    fn is_output(&self, path: &Path) -> bool {
        self.output_dirs.iter().any(|dir| path.starts_with(dir))
    }
}

/// Scans every source directory of a layer in declaration order.
///
/// Directory entries are visited in sorted order so repeated scans of an
/// unchanged tree yield identical sequences. Dot-files, excluded paths, the
/// layer's own build directory and every configured output directory are
/// skipped; a missing source directory contributes nothing.
pub fn scan_layer(layer: &Layer, options: &ScanOptions) -> Result<Vec<SourceEntry>, LayerError> {
    let excludes = build_excludes(layer)?;
    let mut entries = Vec::new();
    for dir in &layer.paths.source_dirs {
        if !dir.is_dir() {
            continue;
        }
        let mut ctx = Walk {
            layer,
            root: dir,
            options,
            excludes: &excludes,
            out: &mut entries,
        };
        ctx.walk(dir)?;
    }
    Ok(entries)
}

fn build_excludes(layer: &Layer) -> Result<GlobSet, LayerError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in &layer.excludes {
        let glob = Glob::new(pattern).map_err(|e| LayerError::BadExclude {
            layer: layer.name.clone(),
            pattern: pattern.clone(),
            reason: e.to_string(),
        })?;
        builder.add(glob);
    }
    builder.build().map_err(|e| LayerError::BadExclude {
        layer: layer.name.clone(),
        pattern: layer.excludes.join(", "),
        reason: e.to_string(),
    })
}

struct Walk<'a> {
    layer: &'a Layer,
    root: &'a Path,
    options: &'a ScanOptions,
    excludes: &'a GlobSet,
    out: &'a mut Vec<SourceEntry>,
}

impl Walk<'_> {
    fn walk(&mut self, dir: &Path) -> Result<(), LayerError> {
        let io_err = |path: &Path, source| LayerError::Scan {
            layer: self.layer.name.clone(),
            path: path.to_path_buf(),
            source,
        };
        let mut children: Vec<PathBuf> = std::fs::read_dir(dir)
            .map_err(|e| io_err(dir, e))?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<Result<_, _>>()
            .map_err(|e| io_err(dir, e))?;
        children.sort();

        for path in children {
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
            if name.is_empty() || name.starts_with('.') {
                continue;
            }
            if path == self.layer.paths.build_dir || self.options.is_output(&path) {
                continue;
            }
            let Some(relative) = relative_string(self.root, &path) else {
                continue;
            };
            if self.excludes.is_match(&relative) {
                continue;
            }
            if path.is_dir() {
                self.walk(&path)?;
            } else if self.options.accepts(&path) {
                let base_name = path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or(name)
                    .to_string();
                self.out.push(SourceEntry {
                    layer: self.layer.id,
                    absolute_path: path.clone(),
                    relative_path: relative,
                    base_name,
                    prepend_package: !self.layer.package.is_empty(),
                });
            }
        }
        Ok(())
    }
}

/// `path` relative to `root`, joined with `/` regardless of platform.
fn relative_string(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Option<Vec<&str>> = rel.components().map(|c| c.as_os_str().to_str()).collect();
    Some(parts?.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_common::LayerId;
    use strata_config::{LayerDef, ResolvedLayerPaths};

    fn make_layer(root: &Path, def: LayerDef) -> Layer {
        let paths = ResolvedLayerPaths {
            root: root.to_path_buf(),
            source_dirs: vec![root.to_path_buf()],
            build_dir: root.join("build"),
        };
        Layer::new(LayerId::from_raw(0), &def, Vec::new(), paths)
    }

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, rel).unwrap();
    }

    #[test]
    fn scans_sorted_and_relative() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "ui/Label.sc");
        touch(dir.path(), "Main.sc");
        touch(dir.path(), "ui/Button.sc");
        let layer = make_layer(dir.path(), LayerDef::new("app").with_package("app"));

        let entries = scan_layer(&layer, &ScanOptions::default()).unwrap();
        let rels: Vec<&str> = entries.iter().map(|e| e.relative_path.as_str()).collect();
        assert_eq!(rels, vec!["Main.sc", "ui/Button.sc", "ui/Label.sc"]);
        assert_eq!(entries[1].base_name, "Button");
        assert!(entries[1].prepend_package);
    }

    #[test]
    fn skips_excluded_hidden_and_build_dir() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "Main.sc");
        touch(dir.path(), "Old.bak");
        touch(dir.path(), ".strata/state");
        touch(dir.path(), "build/Main.gen");
        let mut def = LayerDef::new("app");
        def.exclude = vec!["**/*.bak".to_string(), "*.bak".to_string()];
        let layer = make_layer(dir.path(), def);

        let entries = scan_layer(&layer, &ScanOptions::default()).unwrap();
        let rels: Vec<&str> = entries.iter().map(|e| e.relative_path.as_str()).collect();
        assert_eq!(rels, vec!["Main.sc"]);
    }

    #[test]
    fn extension_filter() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "Main.sc");
        touch(dir.path(), "notes.txt");
        let layer = make_layer(dir.path(), LayerDef::new("app"));
        let opts = ScanOptions {
            extensions: vec!["sc".to_string()],
            ..ScanOptions::default()
        };
        let entries = scan_layer(&layer, &opts).unwrap();
        assert_eq!(entries.len(), 1);
        assert!(!entries[0].prepend_package);
    }

    #[test]
    fn missing_source_dir_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let layer = make_layer(&dir.path().join("absent"), LayerDef::new("app"));
        assert!(scan_layer(&layer, &ScanOptions::default()).unwrap().is_empty());
    }

    #[test]
    fn bad_glob_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let mut def = LayerDef::new("app");
        def.exclude = vec!["[".to_string()];
        let layer = make_layer(dir.path(), def);
        let err = scan_layer(&layer, &ScanOptions::default()).unwrap_err();
        assert!(matches!(err, LayerError::BadExclude { .. }));
    }

    #[test]
    fn skips_output_dirs_of_other_layers() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "Main.sc");
        touch(dir.path(), "out/core/sys/Core.sc");
        touch(dir.path(), "gen/Extra.sc");
        let layer = make_layer(dir.path(), LayerDef::new("app"));
        let opts = ScanOptions {
            output_dirs: vec![dir.path().join("out"), dir.path().join("gen")],
            ..ScanOptions::default()
        };

        let entries = scan_layer(&layer, &opts).unwrap();
        let rels: Vec<&str> = entries.iter().map(|e| e.relative_path.as_str()).collect();
        assert_eq!(rels, vec!["Main.sc"]);
    }
}
