/// Remove every `strip` fragment from `text`, then collapse whitespace runs
/// into single spaces and trim the ends.
pub fn clean_text(text: &str, strip: &[String]) -> String {
    let mut cleaned = text.to_string();
    for fragment in strip.iter().filter(|f| !f.is_empty()) {
        if cleaned.contains(fragment.as_str()) {
            cleaned = cleaned.replace(fragment.as_str(), "");
        }
    }
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Clean a verse and pad it with one space on each side so that terms written
/// with surrounding spaces match whole words at the start or end of a line.
pub fn normalize_verse(text: &str, strip: &[String]) -> String {
    format!(" {} ", clean_text(text, strip))
}
