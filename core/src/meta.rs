/*
 * meta.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Gemello, a Gemini protocol client.
 *
 * Gemello is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Gemello is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Gemello.  If not, see <http://www.gnu.org/licenses/>.
 */

//! MIME type carried in the meta string of a success (2x) response, e.g.
//! `text/gemini; charset=utf-8; lang=en`.

use std::collections::HashMap;

/// Assumed when a success response has an empty meta.
pub const DEFAULT_MIME: &str = "text/gemini; charset=utf-8";

#[inline]
fn is_token_char(c: u8) -> bool {
    matches!(c,
        b'0'..=b'9' | b'A'..=b'Z' | b'a'..=b'z' |
        b'!' | b'#' | b'$' | b'%' | b'&' | b'\'' | b'*' | b'+' | b'-' | b'.' |
        b'^' | b'_' | b'`' | b'{' | b'|' | b'}' | b'~'
    )
}

fn is_token(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(is_token_char)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MimeType {
    primary_type: String,
    sub_type: String,
    parameters: HashMap<String, String>,
}

impl MimeType {
    /// Parse a success meta. Empty meta means `text/gemini; charset=utf-8`.
    /// Returns None if the type/subtype are not valid tokens.
    pub fn parse(meta: &str) -> Option<Self> {
        let meta = meta.trim();
        let meta = if meta.is_empty() { DEFAULT_MIME } else { meta };
        let (type_part, params_part) = match meta.find(';') {
            Some(i) => (meta[..i].trim(), meta[i + 1..].trim()),
            None => (meta, ""),
        };
        let slash = type_part.find('/')?;
        let primary = type_part[..slash].trim();
        let sub = type_part[slash + 1..].trim();
        if !is_token(primary) || !is_token(sub) {
            return None;
        }
        Some(Self {
            primary_type: primary.to_ascii_lowercase(),
            sub_type: sub.to_ascii_lowercase(),
            parameters: parse_parameters(params_part),
        })
    }

    pub fn primary_type(&self) -> &str {
        &self.primary_type
    }

    pub fn sub_type(&self) -> &str {
        &self.sub_type
    }

    /// `type/subtype` without parameters, lower case.
    pub fn essence(&self) -> String {
        format!("{}/{}", self.primary_type, self.sub_type)
    }

    pub fn is_mime_type(&self, primary: &str, sub: &str) -> bool {
        self.primary_type.eq_ignore_ascii_case(primary) && self.sub_type.eq_ignore_ascii_case(sub)
    }

    pub fn is_text(&self) -> bool {
        self.primary_type == "text"
    }

    pub fn is_gemtext(&self) -> bool {
        self.is_mime_type("text", "gemini")
    }

    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// Declared charset, `utf-8` when absent.
    pub fn charset(&self) -> &str {
        self.parameter("charset").unwrap_or("utf-8")
    }

    /// Whether the body can be decoded as UTF-8 (utf-8 or its us-ascii subset).
    pub fn is_utf8_compatible(&self) -> bool {
        let charset = self.charset();
        charset.eq_ignore_ascii_case("utf-8")
            || charset.eq_ignore_ascii_case("utf8")
            || charset.eq_ignore_ascii_case("us-ascii")
    }

    /// Raw `lang` parameter.
    pub fn lang(&self) -> Option<&str> {
        self.parameter("lang")
    }

    /// Comma-separated language tags from the `lang` parameter.
    pub fn languages(&self) -> Vec<&str> {
        self.parameter("lang")
            .map(|l| l.split(',').map(str::trim).filter(|s| !s.is_empty()).collect())
            .unwrap_or_default()
    }
}

/// Semicolon-separated `name=value` or `name="quoted value"`. Malformed entries are skipped.
fn parse_parameters(params_part: &str) -> HashMap<String, String> {
    let mut out = HashMap::new();
    let bytes = params_part.as_bytes();
    let len = bytes.len();
    let mut pos = 0;

    while pos < len {
        while pos < len && (bytes[pos] == b';' || bytes[pos].is_ascii_whitespace()) {
            pos += 1;
        }
        if pos >= len {
            break;
        }
        let Some(eq) = bytes[pos..].iter().position(|&b| b == b'=') else {
            break;
        };
        let name = params_part[pos..pos + eq].trim();
        pos += eq + 1;
        let value = if pos < len && bytes[pos] == b'"' {
            pos += 1;
            let mut v = String::new();
            let mut chars = params_part[pos..].char_indices();
            let mut consumed = params_part.len() - pos;
            while let Some((i, c)) = chars.next() {
                match c {
                    '\\' => {
                        if let Some((_, escaped)) = chars.next() {
                            v.push(escaped);
                        }
                    }
                    '"' => {
                        consumed = i + 1;
                        break;
                    }
                    _ => v.push(c),
                }
            }
            pos += consumed;
            // Skip anything between the closing quote and the next separator.
            pos = bytes[pos..]
                .iter()
                .position(|&b| b == b';')
                .map(|i| pos + i)
                .unwrap_or(len);
            v
        } else {
            let end = bytes[pos..]
                .iter()
                .position(|&b| b == b';')
                .map(|i| pos + i)
                .unwrap_or(len);
            let v = params_part[pos..end].trim().to_string();
            pos = end;
            v
        };
        if is_token(name) {
            out.insert(name.to_ascii_lowercase(), value);
        }
    }
    out
}
