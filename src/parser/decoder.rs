//! Tabular decoder: separator detection and row splitting.

/// Split raw tabular text into rows of trimmed fields.
///
/// The separator is detected once from the first non-empty line (tab if
/// present, else comma, else tab) and applied to the entire document.
/// Blank lines produce no row; empty input yields an empty vec.
pub fn decode(text: &str) -> Vec<Vec<String>> {
    let separator = detect_separator(text);
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            line.split(separator)
                .map(|field| field.trim().to_string())
                .collect()
        })
        .collect()
}

fn detect_separator(text: &str) -> char {
    for line in text.lines() {
        if line.trim().is_empty() {
            continue;
        }
        if line.contains('\t') {
            return '\t';
        }
        if line.contains(',') {
            return ',';
        }
        break;
    }
    '\t'
}
