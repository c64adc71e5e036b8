//! HTML-to-text reduction for prompt building.

/// Strip HTML tags from content (basic).
///
/// Drops `<script>`/`<style>` bodies, decodes the handful of entities that
/// show up in mail clients' output, and collapses whitespace.
pub fn strip_html(html: &str) -> String {
    let mut result = String::new();
    let mut in_tag = false;
    let mut tag = String::new();
    let mut skip_until: Option<&str> = None;

    for ch in html.chars() {
        match ch {
            '<' => {
                in_tag = true;
                tag.clear();
            }
            '>' if in_tag => {
                in_tag = false;
                let name = tag
                    .split(|c: char| c.is_whitespace() || c == '/')
                    .find(|s| !s.is_empty())
                    .unwrap_or("")
                    .to_ascii_lowercase();
                let closing = tag.starts_with('/');
                match (skip_until, closing, name.as_str()) {
                    (None, false, "script") => skip_until = Some("script"),
                    (None, false, "style") => skip_until = Some("style"),
                    (Some(open), true, n) if n == open => skip_until = None,
                    // Block-level boundaries become whitespace so words don't fuse.
                    (None, _, "br" | "p" | "div" | "li" | "tr" | "td" | "h1" | "h2" | "h3") => {
                        result.push(' ')
                    }
                    _ => {}
                }
            }
            _ if in_tag => tag.push(ch),
            _ if skip_until.is_none() => result.push(ch),
            _ => {}
        }
    }

    let decoded = decode_entities(&result);
    // Normalize whitespace
    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}
