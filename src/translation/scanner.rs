use super::parsers::{
    is_block_comment_end, is_block_comment_start, is_line_comment_start, matches_tag,
    scan_identifier, try_start_dollar_quote,
};

#[derive(Clone)]
pub(super) enum State {
    Normal,
    SingleQuoted,
    DoubleQuoted,
    LineComment,
    BlockComment(u32),
    DollarQuoted(String),
}

/// What a placeholder token refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum Placeholder {
    /// `@name`, `:name`, `$name`
    Named(String),
    /// `?N` or `$N` (1-based)
    Numbered(usize),
    /// Bare `?`
    Anonymous,
}

/// A placeholder occurrence; `start..end` is its byte span in the SQL text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct Token {
    pub start: usize,
    pub end: usize,
    pub placeholder: Placeholder,
}

pub(super) fn scan_digits(bytes: &[u8], start: usize) -> Option<(usize, &str)> {
    let mut idx = start;
    while idx < bytes.len() && bytes[idx].is_ascii_digit() {
        idx += 1;
    }
    if idx == start {
        None
    } else {
        std::str::from_utf8(&bytes[start..idx])
            .ok()
            .map(|digits| (idx, digits))
    }
}

/// Collect placeholder tokens outside of literals, comments and dollar-quoted bodies.
///
/// Bare `?` is reported only when `anonymous` is set; `PostgreSQL` uses `?` as a
/// jsonb operator.
pub(super) fn scan(sql: &str, anonymous: bool) -> Vec<Token> {
    let bytes = sql.as_bytes();
    let mut tokens = Vec::new();
    let mut state = State::Normal;
    let mut idx = 0;

    while idx < bytes.len() {
        let b = bytes[idx];
        match state {
            State::Normal => match b {
                b'\'' => state = State::SingleQuoted,
                b'"' => state = State::DoubleQuoted,
                _ if is_line_comment_start(bytes, idx) => {
                    state = State::LineComment;
                    idx += 1;
                }
                _ if is_block_comment_start(bytes, idx) => {
                    state = State::BlockComment(1);
                    idx += 1;
                }
                b'$' => {
                    if let Some((digits_end, digits)) = scan_digits(bytes, idx + 1) {
                        push_numbered(&mut tokens, idx, digits_end, digits);
                        idx = digits_end - 1;
                    } else if let Some((tag, advance)) = try_start_dollar_quote(bytes, idx) {
                        state = State::DollarQuoted(tag);
                        idx = advance;
                    } else if let Some(end) = scan_identifier(bytes, idx + 1) {
                        push_named(&mut tokens, sql, idx, end);
                        idx = end - 1;
                    }
                }
                b'?' => {
                    if let Some((digits_end, digits)) = scan_digits(bytes, idx + 1) {
                        push_numbered(&mut tokens, idx, digits_end, digits);
                        idx = digits_end - 1;
                    } else if anonymous {
                        tokens.push(Token {
                            start: idx,
                            end: idx + 1,
                            placeholder: Placeholder::Anonymous,
                        });
                    }
                }
                // `::type` casts
                b':' if bytes.get(idx + 1) == Some(&b':') => idx += 1,
                // `@@version` style system variables
                b'@' if bytes.get(idx + 1) == Some(&b'@') => idx += 1,
                b':' | b'@' => {
                    if let Some(end) = scan_identifier(bytes, idx + 1) {
                        push_named(&mut tokens, sql, idx, end);
                        idx = end - 1;
                    }
                }
                _ => {}
            },
            State::SingleQuoted => {
                if b == b'\'' {
                    if bytes.get(idx + 1) == Some(&b'\'') {
                        idx += 1; // skip escaped quote
                    } else {
                        state = State::Normal;
                    }
                }
            }
            State::DoubleQuoted => {
                if b == b'"' {
                    if bytes.get(idx + 1) == Some(&b'"') {
                        idx += 1; // skip escaped quote
                    } else {
                        state = State::Normal;
                    }
                }
            }
            State::LineComment => {
                if b == b'\n' {
                    state = State::Normal;
                }
            }
            State::BlockComment(depth) => {
                if is_block_comment_start(bytes, idx) {
                    state = State::BlockComment(depth + 1);
                    idx += 1;
                } else if is_block_comment_end(bytes, idx) {
                    if depth == 1 {
                        state = State::Normal;
                    } else {
                        state = State::BlockComment(depth - 1);
                    }
                    idx += 1;
                }
            }
            State::DollarQuoted(ref tag) => {
                if b == b'$' && matches_tag(bytes, idx, tag) {
                    let tag_len = tag.len();
                    state = State::Normal;
                    idx += tag_len + 1;
                }
            }
        }

        idx += 1;
    }

    tokens
}

fn push_numbered(tokens: &mut Vec<Token>, start: usize, end: usize, digits: &str) {
    if let Ok(n) = digits.parse::<usize>() {
        tokens.push(Token {
            start,
            end,
            placeholder: Placeholder::Numbered(n),
        });
    }
}

fn push_named(tokens: &mut Vec<Token>, sql: &str, start: usize, end: usize) {
    tokens.push(Token {
        start,
        end,
        placeholder: Placeholder::Named(sql[start + 1..end].to_string()),
    });
}
