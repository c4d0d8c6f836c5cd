//! Model directory listing logged when `init()` fails.

use std::path::{MAIN_SEPARATOR, Path};
use walkdir::{DirEntry, WalkDir};

/// Maximum number of tree lines written to the log.
pub const FILE_TREE_LINE_LIMIT: usize = 200;

const INDENT: usize = 4;

/// Depth-first listing of `root`, children sorted by name. Directories end
/// with a path separator; each level is indented four spaces.
///
/// Capped at `limit` lines; when entries remain, a final
/// `Output Truncated. First N lines shown.` line is added. Unreadable
/// entries are skipped.
pub fn model_dir_listing(root: &Path, limit: usize) -> Vec<String> {
    let mut entries = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .peekable();

    let mut lines: Vec<String> = entries.by_ref().take(limit).map(|e| tree_line(&e)).collect();
    if entries.peek().is_some() {
        lines.push(format!("Output Truncated. First {} lines shown.", limit));
    }
    lines
}

fn tree_line(entry: &DirEntry) -> String {
    let name = entry.file_name().to_string_lossy();
    let indent = " ".repeat(entry.depth() * INDENT);
    if entry.file_type().is_dir() {
        format!("{}{}{}", indent, name, MAIN_SEPARATOR)
    } else {
        format!("{}{}", indent, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_tree_is_sorted_and_indented() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("model")).unwrap();
        fs::write(dir.path().join("model").join("weights.bin"), b"x").unwrap();
        fs::write(dir.path().join("b.txt"), b"x").unwrap();
        fs::write(dir.path().join("a.txt"), b"x").unwrap();

        let lines = model_dir_listing(dir.path(), FILE_TREE_LINE_LIMIT);
        let root = dir.path().file_name().unwrap().to_string_lossy().into_owned();

        assert_eq!(
            lines,
            vec![
                format!("{}{}", root, MAIN_SEPARATOR),
                "    a.txt".to_string(),
                "    b.txt".to_string(),
                format!("    model{}", MAIN_SEPARATOR),
                "        weights.bin".to_string(),
            ]
        );
    }

    #[test]
    fn test_truncation_notice() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..10 {
            fs::write(dir.path().join(format!("f{:02}", i)), b"x").unwrap();
        }

        let lines = model_dir_listing(dir.path(), 5);
        assert_eq!(lines.len(), 6);
        assert_eq!(lines[4], "    f03");
        assert_eq!(lines[5], "Output Truncated. First 5 lines shown.");
    }

    #[test]
    fn test_exact_fit_is_not_truncated() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("only"), b"x").unwrap();

        let lines = model_dir_listing(dir.path(), 2);
        assert_eq!(lines.len(), 2);
        assert!(!lines.iter().any(|l| l.starts_with("Output Truncated")));
    }

    #[test]
    fn test_truncation_inside_nested_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("model");
        fs::create_dir(&nested).unwrap();
        for i in 0..3 {
            fs::write(nested.join(format!("w{}", i)), b"x").unwrap();
        }
        fs::write(dir.path().join("z.txt"), b"x").unwrap();

        let lines = model_dir_listing(dir.path(), 3);
        assert_eq!(lines[1], format!("    model{}", MAIN_SEPARATOR));
        assert_eq!(lines[2], "        w0");
        assert_eq!(lines[3], "Output Truncated. First 3 lines shown.");
    }
}
