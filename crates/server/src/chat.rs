//! Name/message validation and chat text helpers.

use crate::net::protocol::STRING_LEN;

pub const YELLOW: &str = "&e";
pub const WHITE: &str = "&f";
pub const RED: &str = "&c";

/// 3–16 characters of ASCII letters, digits and underscore.
pub fn is_valid_name(name: &str) -> bool {
    (3..=16).contains(&name.len())
        && name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

/// Printable ASCII without the `&` colour escape.
pub fn is_valid_message(message: &str) -> bool {
    message.bytes().all(|b| (b' '..=b'~').contains(&b) && b != b'&')
}

/// Turn user-typed `%x` colour codes into wire `&x` codes.
pub fn convert_colors(message: &str) -> String {
    let bytes = message.as_bytes();
    let mut out = String::with_capacity(message.len());
    for (i, c) in message.char_indices() {
        let next_is_code = bytes
            .get(i + 1)
            .is_some_and(|b| b.is_ascii_hexdigit());
        if c == '%' && next_is_code {
            out.push('&');
        } else {
            out.push(c);
        }
    }
    out
}

/// Split text into wire-sized lines: one per `\n`, long lines wrapped at 64 bytes.
pub fn wrap(text: &str) -> Vec<String> {
    let mut lines = Vec::new();
    for line in text.split('\n') {
        let chars: Vec<char> = line.chars().collect();
        if chars.is_empty() {
            lines.push(String::new());
            continue;
        }
        for part in chars.chunks(STRING_LEN) {
            lines.push(part.iter().collect());
        }
    }
    lines
}
