/// Segment separator used by storage keys.
pub const DELIMITER: &str = "/";

/// Join two key segments with exactly one delimiter between them.
pub fn join_path(parent: &str, child: &str) -> String {
    let parent = parent.trim_end_matches(DELIMITER);
    let child = child.trim_start_matches(DELIMITER);
    if parent.is_empty() {
        return child.to_string();
    }
    format!("{parent}{DELIMITER}{child}")
}

/// Normalize a prefix so it ends with the delimiter.
pub fn dir_prefix(prefix: &str) -> String {
    if prefix.ends_with(DELIMITER) {
        prefix.to_string()
    } else {
        format!("{prefix}{DELIMITER}")
    }
}
