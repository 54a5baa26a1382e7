//! Input file discovery
//!
//! Paths given explicitly are taken as they are. Directories are walked and
//! every file whose name matches one of the configured glob patterns is
//! collected. The result is sorted and free of duplicates.

use crate::error::{Result, TagError};
use glob::Pattern;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Expand input paths into the list of tag files to convert
pub fn discover_input_files(inputs: &[PathBuf], patterns: &[String]) -> Result<Vec<PathBuf>> {
    let patterns = compile_patterns(patterns)?;
    let mut files = Vec::new();

    for input in inputs {
        if input.is_file() {
            files.push(input.clone());
        } else if input.is_dir() {
            debug!("Searching for tag files in: {}", input.display());
            for entry in WalkDir::new(input).follow_links(true) {
                let entry = entry.map_err(|e| TagError::Io(e.into()))?;
                if entry.file_type().is_file() && matches_any(entry.path(), &patterns) {
                    files.push(entry.into_path());
                }
            }
        } else {
            return Err(TagError::InputNotFound {
                path: input.clone(),
            });
        }
    }

    files.sort();
    files.dedup();
    debug!("Found {} input files", files.len());
    Ok(files)
}

fn compile_patterns(patterns: &[String]) -> Result<Vec<Pattern>> {
    patterns
        .iter()
        .map(|p| {
            Pattern::new(p).map_err(|e| {
                TagError::configuration(format!("invalid file pattern '{}': {}", p, e))
            })
        })
        .collect()
}

fn matches_any(path: &Path, patterns: &[Pattern]) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|name| patterns.iter().any(|p| p.matches(name)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn patterns() -> Vec<String> {
        vec!["*.txt".to_string(), "*.gz".to_string()]
    }

    /// Two deployments, one nested, plus files that must be ignored
    fn create_test_tree(temp_dir: &TempDir) -> PathBuf {
        let root = temp_dir.path().join("tags");
        let nested = root.join("2005").join("july");
        fs::create_dir_all(&nested).unwrap();

        fs::write(root.join("05A0001.txt"), "data").unwrap();
        fs::write(nested.join("05A0002.txt.gz"), "data").unwrap();
        fs::write(nested.join("notes.md"), "ignored").unwrap();
        fs::write(root.join("05A0001.parquet"), "ignored").unwrap();

        root
    }

    #[test]
    fn test_directory_walk_matches_patterns() {
        let temp_dir = TempDir::new().unwrap();
        let root = create_test_tree(&temp_dir);

        let files = discover_input_files(&[root.clone()], &patterns()).unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();

        assert_eq!(names, vec!["05A0001.txt", "05A0002.txt.gz"]);
    }

    #[test]
    fn test_explicit_files_bypass_patterns() {
        let temp_dir = TempDir::new().unwrap();
        let root = create_test_tree(&temp_dir);
        let explicit = root.join("2005").join("july").join("notes.md");

        let files = discover_input_files(&[explicit.clone(), explicit.clone()], &patterns()).unwrap();
        assert_eq!(files, vec![explicit]);
    }

    #[test]
    fn test_missing_input_path() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("missing");

        match discover_input_files(&[missing.clone()], &patterns()) {
            Err(TagError::InputNotFound { path }) => assert_eq!(path, missing),
            other => panic!("Expected InputNotFound error, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_pattern() {
        let temp_dir = TempDir::new().unwrap();
        let result = discover_input_files(&[temp_dir.path().to_path_buf()], &["[".to_string()]);
        assert!(matches!(result, Err(TagError::Configuration { .. })));
    }
}
