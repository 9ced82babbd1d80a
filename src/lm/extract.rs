//! Best-effort extraction of a JSON object from free-form LM output.

/// Extract JSON text from a response that may carry markdown fences or prose.
///
/// Fenced blocks win (with or without a language tag). Otherwise the span
/// from the first `{` to the last `}` is returned, falling back to the
/// trimmed input.
pub fn extract_json(text: &str) -> &str {
    let text = text.trim();

    if let Some(start) = text.find("```") {
        let body = &text[start + 3..];
        let body = match body.find("```") {
            Some(end) => &body[..end],
            None => body,
        };
        let body = strip_language_tag(body.trim());
        if body.starts_with('{') || body.starts_with('[') {
            return body;
        }
        return object_span(body).unwrap_or(body);
    }

    object_span(text).unwrap_or(text)
}

/// Drop a leading fence tag such as `json`, on its own line or not.
fn strip_language_tag(body: &str) -> &str {
    let tag_len = body
        .find(|ch: char| !(ch.is_ascii_alphanumeric() || ch == '-' || ch == '_'))
        .unwrap_or(body.len());
    if tag_len == 0 {
        return body;
    }
    let rest = body[tag_len..].trim_start();
    if rest.starts_with('{') || rest.starts_with('[') || rest.is_empty() {
        rest
    } else {
        body
    }
}

/// Span from the first `{` to the last `}`.
fn object_span(text: &str) -> Option<&str> {
    let (start, end) = (text.find('{')?, text.rfind('}')?);
    if start < end {
        Some(&text[start..=end])
    } else {
        None
    }
}

/// Shorten text for log previews without splitting a UTF-8 character.
pub fn preview(text: &str, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text.to_string();
    }
    let mut truncated = String::new();
    for ch in text.chars() {
        if truncated.len() + ch.len_utf8() > max_bytes {
            break;
        }
        truncated.push(ch);
    }
    truncated
}
