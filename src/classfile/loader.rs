// Class pool loading
//
// Pools are JSON documents produced by an external class-file reader: either
// one file holding a list of classes, or a directory tree of `.json` files
// holding one class or a list of classes each.

use super::{ClassPool, Clazz};
use miette::{IntoDiagnostic, Result, WrapErr};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, trace};
use walkdir::WalkDir;

#[derive(Deserialize)]
#[serde(untagged)]
enum ClassDocument {
    Many(Vec<Clazz>),
    One(Box<Clazz>),
}

impl ClassDocument {
    fn into_classes(self) -> Vec<Clazz> {
        match self {
            ClassDocument::Many(classes) => classes,
            ClassDocument::One(class) => vec![*class],
        }
    }
}

/// Load and link a pool from a JSON file or a directory of JSON files
pub fn load_pool(path: &Path) -> Result<ClassPool> {
    let classes = load_classes(path)?;
    info!("Loaded {} classes from {}", classes.len(), path.display());
    Ok(ClassPool::new(classes))
}

/// Load classes without linking them
pub fn load_classes(path: &Path) -> Result<Vec<Clazz>> {
    if path.is_dir() {
        let mut classes = Vec::new();
        for file in find_json_files(path) {
            classes.extend(read_document(&file)?);
        }
        Ok(classes)
    } else {
        read_document(path)
    }
}

fn read_document(path: &Path) -> Result<Vec<Clazz>> {
    trace!("Reading {}", path.display());
    let content = std::fs::read_to_string(path)
        .into_diagnostic()
        .wrap_err_with(|| format!("Failed to read class pool file: {}", path.display()))?;

    let document: ClassDocument = serde_json::from_str(&content)
        .into_diagnostic()
        .wrap_err_with(|| format!("Failed to parse class pool file: {}", path.display()))?;

    Ok(document.into_classes())
}

/// JSON files under `root`, sorted so pools load in a stable order
fn find_json_files(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry.file_name().to_str()))
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| path.extension().and_then(|e| e.to_str()) == Some("json"))
        .collect();

    files.sort();
    debug!("Found {} class files under {}", files.len(), root.display());
    files
}

fn is_hidden(name: Option<&str>) -> bool {
    name.map(|n| n.starts_with('.')).unwrap_or(false)
}
