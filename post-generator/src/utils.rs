/// Text processing utilities
pub mod text {
    /// Keep at most `max_chars` characters. Never splits a code point.
    pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
        match text.char_indices().nth(max_chars) {
            Some((idx, _)) => &text[..idx],
            None => text,
        }
    }
}

/// URL utilities
pub mod url {
    use url::Url;

    /// Host name (with a non-default port) of a URL, e.g. `feeds.example.com`.
    pub fn host_name(url_str: &str) -> Option<String> {
        let url = Url::parse(url_str).ok()?;
        let host = url.host_str()?;
        Some(match url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        })
    }
}
