//! Just enough JSON to pull string fields out of cloud messages.
//!
//! Keys are matched at any nesting depth and never inside string values.
//! The first matching key wins.

use core::fmt;

use heapless::String;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldError {
    Missing,
    NotAString,
    Unterminated,
    InvalidEscape,
    TooLong,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldError::Missing => write!(f, "field missing"),
            FieldError::NotAString => write!(f, "field is not a string"),
            FieldError::Unterminated => write!(f, "unterminated string"),
            FieldError::InvalidEscape => write!(f, "invalid escape sequence"),
            FieldError::TooLong => write!(f, "value too long"),
        }
    }
}

/// Find `"key": "value"` in `json` and return the unescaped value.
pub fn find_string_field<const N: usize>(json: &str, key: &str) -> Result<String<N>, FieldError> {
    let bytes = json.as_bytes();
    let mut pos = 0;

    while let Some(offset) = bytes[pos..].iter().position(|&b| b == b'"') {
        let start = pos + offset + 1;
        let end = string_end(bytes, start)?;
        let after = skip_whitespace(bytes, end + 1);
        pos = end + 1;

        if bytes.get(after) != Some(&b':') {
            continue;
        }
        if &json[start..end] != key {
            pos = after + 1;
            continue;
        }

        let value = skip_whitespace(bytes, after + 1);
        if bytes.get(value) != Some(&b'"') {
            return Err(FieldError::NotAString);
        }
        let value_end = string_end(bytes, value + 1)?;
        return unescape(&json[value + 1..value_end]);
    }

    Err(FieldError::Missing)
}

/// Index of the closing quote of the string whose body starts at `start`.
fn string_end(bytes: &[u8], start: usize) -> Result<usize, FieldError> {
    let mut i = start;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'"' => return Ok(i),
            _ => i += 1,
        }
    }
    Err(FieldError::Unterminated)
}

fn skip_whitespace(bytes: &[u8], mut i: usize) -> usize {
    while bytes.get(i).is_some_and(u8::is_ascii_whitespace) {
        i += 1;
    }
    i
}

fn unescape<const N: usize>(raw: &str) -> Result<String<N>, FieldError> {
    let mut out = String::new();
    let mut chars = raw.chars();

    while let Some(c) = chars.next() {
        let c = if c == '\\' {
            match chars.next() {
                Some('"') => '"',
                Some('\\') => '\\',
                Some('/') => '/',
                Some('b') => '\u{8}',
                Some('f') => '\u{c}',
                Some('n') => '\n',
                Some('r') => '\r',
                Some('t') => '\t',
                Some('u') => {
                    let rest = chars.as_str();
                    let hex = rest.get(..4).ok_or(FieldError::InvalidEscape)?;
                    if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
                        return Err(FieldError::InvalidEscape);
                    }
                    let code = u32::from_str_radix(hex, 16).map_err(|_| FieldError::InvalidEscape)?;
                    chars = rest[4..].chars();
                    char::from_u32(code).ok_or(FieldError::InvalidEscape)?
                }
                _ => return Err(FieldError::InvalidEscape),
            }
        } else {
            c
        };
        out.push(c).map_err(|()| FieldError::TooLong)?;
    }

    Ok(out)
}
