use url::form_urlencoded;

/// Collapse runs of whitespace (including newlines) into single spaces and trim.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Truncate to at most `max` characters without splitting a code point.
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].trim_end().to_string(),
        None => text.to_string(),
    }
}

/// Lowercase, whitespace-collapsed prefix used for loose identity comparisons.
pub fn normalized_prefix(text: &str, max: usize) -> String {
    truncate_chars(&collapse_whitespace(&text.to_lowercase()), max)
}

/// "Python Developer" -> "python-developer"
pub fn slugify(text: &str) -> String {
    collapse_whitespace(text)
        .to_lowercase()
        .split(' ')
        .map(|part| {
            part.chars()
                .filter(|c| c.is_alphanumeric() || *c == '+' || *c == '#')
                .collect::<String>()
        })
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// Query-string encode a value (spaces become `+`).
pub fn encode_query(text: &str) -> String {
    form_urlencoded::byte_serialize(text.trim().as_bytes()).collect()
}

/// "python developer" -> "Python Developer"
pub fn title_case(text: &str) -> String {
    collapse_whitespace(text)
        .split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
