//! Mustache-style insertion into the loader document.
//!
//! Supported tags:
//!
//! - `{{{name}}}` and `{{& name}}` insert verbatim.
//! - `{{name}}` inserts HTML-escaped text.
//! - `{{! comment }}` renders nothing.
//! - `\{{` renders a literal `{{`; `\\{{` renders one backslash followed by
//!   the tag's value.
//!
//! Unknown names render as nothing. Block, partial and inverse tags are
//! rejected.

use std::collections::HashMap;

use tracing::debug;

use crate::error::RenderError;

/// Insertion point of the observer payload in the loader template.
pub const OBSERVER_SCRIPT_SLOT: &str = "observer-script";

pub fn render(template: &str, insertions: &HashMap<String, String>) -> Result<String, RenderError> {
    let mut rendered = String::with_capacity(template.len());
    let mut cursor = 0;

    while let Some(found) = template[cursor..].find("{{") {
        let open = cursor + found;
        let preceding = &template[cursor..open];

        if preceding.ends_with("\\\\") {
            rendered.push_str(&preceding[..preceding.len() - 1]);
        } else if let Some(text) = preceding.strip_suffix('\\') {
            rendered.push_str(text);
            rendered.push_str("{{");
            cursor = open + 2;
            continue;
        } else {
            rendered.push_str(preceding);
        }

        let (tag, end) = read_tag(template, open)?;
        match tag {
            Tag::Comment => {}
            Tag::Insert { name, raw } => match insertions.get(name) {
                Some(value) if raw => rendered.push_str(value),
                Some(value) => rendered.push_str(&escape_html(value)),
                None => debug!(name, "no insertion for tag, rendering empty"),
            },
        }
        cursor = end;
    }

    rendered.push_str(&template[cursor..]);
    Ok(rendered)
}

enum Tag<'a> {
    Comment,
    Insert { name: &'a str, raw: bool },
}

/// Parse the tag opening at `open`. Returns it with the offset just past it.
fn read_tag(template: &str, open: usize) -> Result<(Tag<'_>, usize), RenderError> {
    let after = &template[open + 2..];
    let (triple, body_start, close) = if after.starts_with('{') {
        (true, open + 3, "}}}")
    } else {
        (false, open + 2, "}}")
    };

    let body = &template[body_start..];
    let length = body
        .find(close)
        .ok_or(RenderError::Unterminated { offset: open })?;
    let end = body_start + length + close.len();
    let content = body[..length].trim();

    if triple {
        return insertion(content, true, open).map(|tag| (tag, end));
    }
    let tag = match content.chars().next() {
        Some('!') => Tag::Comment,
        Some('&') => insertion(content[1..].trim_start(), true, open)?,
        Some('#' | '/' | '^' | '>' | '{') => {
            return Err(RenderError::UnsupportedTag {
                tag: content.to_string(),
                offset: open,
            })
        }
        _ => insertion(content, false, open)?,
    };
    Ok((tag, end))
}

fn insertion(name: &str, raw: bool, offset: usize) -> Result<Tag<'_>, RenderError> {
    if name.is_empty() {
        return Err(RenderError::EmptyTag { offset });
    }
    Ok(Tag::Insert { name, raw })
}

/// Escape the characters HTML-safe mustache output escapes.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            '`' => escaped.push_str("&#x60;"),
            '=' => escaped.push_str("&#x3D;"),
            other => escaped.push(other),
        }
    }
    escaped
}
