//! Serialized tag lists
//!
//! Category cells hold either a JSON array or a Python list literal such as
//! `['Meme', "Dog-Themed Coins"]`.

/// Parse a serialized list of strings. An empty cell is an empty list.
pub fn parse_tag_list(cell: &str) -> Result<Vec<String>, String> {
    let trimmed = cell.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    if let Ok(tags) = serde_json::from_str::<Vec<String>>(trimmed) {
        return Ok(tags);
    }
    parse_literal_list(trimmed)
}

fn parse_literal_list(s: &str) -> Result<Vec<String>, String> {
    let inner = s
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .ok_or_else(|| format!("expected a list, got '{}'", s))?;

    let mut tags = Vec::new();
    let mut chars = inner.chars().peekable();

    loop {
        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }
        let quote = match chars.next() {
            None => break,
            Some(q @ ('\'' | '"')) => q,
            Some(c) => return Err(format!("unexpected '{}' in list", c)),
        };

        let mut tag = String::new();
        loop {
            match chars.next() {
                None => return Err("unterminated string".to_string()),
                Some('\\') => match chars.next() {
                    Some('n') => tag.push('\n'),
                    Some('t') => tag.push('\t'),
                    Some(c) => tag.push(c),
                    None => return Err("unterminated escape".to_string()),
                },
                Some(c) if c == quote => break,
                Some(c) => tag.push(c),
            }
        }
        tags.push(tag);

        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }
        match chars.next() {
            None => break,
            Some(',') => {}
            Some(c) => return Err(format!("expected ',' but found '{}'", c)),
        }
    }

    Ok(tags)
}
