// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use std::path::Path;

/// Normalize a name to lowercase alphanumeric.
pub fn normalize_name(name: &str) -> String {
    name.to_ascii_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect()
}

/// Read a file as a list of trimmed, non-empty lines.
pub fn read_lines(path: &Path) -> std::io::Result<Vec<String>> {
    let content = std::fs::read_to_string(path)?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("EasyComm"), "easycomm");
        assert_eq!(normalize_name("simulator-equ"), "simulatorequ");
        assert_eq!(normalize_name("foo_bar-baz"), "foobarbaz");
    }

    #[test]
    fn test_read_lines_skips_blanks() {
        let path = std::env::temp_dir().join(format!("rot-app-lines-{}", std::process::id()));
        std::fs::write(&path, "alpha\n\n  beta  \r\n\n").expect("write");
        let lines = read_lines(&path).expect("read");
        let _ = std::fs::remove_file(&path);
        assert_eq!(lines, vec!["alpha".to_string(), "beta".to_string()]);
    }
}
