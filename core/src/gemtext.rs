/*
 * gemtext.rs
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

//! Line-oriented gemtext parser (text/gemini).
//!
//! Single pass, one line at a time. The only state is whether we are inside a
//! preformatted block and whether the last emitted element is a list that further
//! `* ` lines should join. Parsing never fails: unrecognised lines become `Text`.

use crate::document::{Document, Element};

const PREFORMAT_TOGGLE: &str = "```";
const LINK_MARKER: &str = "=>";
const LIST_MARKER: &str = "* ";
const MAX_HEADING_LEVEL: usize = 3;

enum State {
    Normal,
    Preformatted { alt: Option<String>, lines: Vec<String> },
}

/// Incremental gemtext parser. Feed lines with `push_line`, then call `finish`.
pub struct GemtextParser {
    state: State,
    elements: Vec<Element>,
}

impl Default for GemtextParser {
    fn default() -> Self {
        Self {
            state: State::Normal,
            elements: Vec::new(),
        }
    }
}

impl GemtextParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify one line (without its line terminator).
    pub fn push_line(&mut self, line: &str) {
        if line.starts_with(PREFORMAT_TOGGLE) {
            self.toggle_preformatted(&line[PREFORMAT_TOGGLE.len()..]);
            return;
        }
        if let State::Preformatted { lines, .. } = &mut self.state {
            lines.push(line.to_string());
            return;
        }
        if let Some(item) = line.strip_prefix(LIST_MARKER) {
            let item = item.trim().to_string();
            match self.elements.last_mut() {
                Some(Element::List(items)) => items.push(item),
                _ => self.elements.push(Element::List(vec![item])),
            }
            return;
        }
        let element = parse_heading(line)
            .or_else(|| parse_link(line))
            .or_else(|| line.strip_prefix('>').map(|q| Element::Quote(q.trim().to_string())))
            .unwrap_or_else(|| Element::Text(line.to_string()));
        self.elements.push(element);
    }

    /// End of input. An unterminated preformatted block is kept as is.
    pub fn finish(mut self) -> Document {
        if let State::Preformatted { alt, lines } = std::mem::replace(&mut self.state, State::Normal) {
            self.elements.push(Element::Preformatted { alt, lines });
        }
        Document::new(self.elements)
    }

    fn toggle_preformatted(&mut self, rest: &str) {
        match std::mem::replace(&mut self.state, State::Normal) {
            State::Normal => {
                let alt = rest.trim();
                self.state = State::Preformatted {
                    alt: (!alt.is_empty()).then(|| alt.to_string()),
                    lines: Vec::new(),
                };
            }
            State::Preformatted { alt, lines } => {
                self.elements.push(Element::Preformatted { alt, lines });
            }
        }
    }
}

fn parse_heading(line: &str) -> Option<Element> {
    let hashes = line.bytes().take_while(|&b| b == b'#').count();
    if hashes == 0 {
        return None;
    }
    let level = hashes.min(MAX_HEADING_LEVEL);
    Some(Element::Heading {
        level: level as u8,
        text: line[level..].trim().to_string(),
    })
}

/// `=>` then optional whitespace, a URL token, then an optional label. No token: not a link.
fn parse_link(line: &str) -> Option<Element> {
    let rest = line.strip_prefix(LINK_MARKER)?.trim_start();
    if rest.is_empty() {
        return None;
    }
    let (target, label) = match rest.find(char::is_whitespace) {
        Some(i) => (&rest[..i], rest[i..].trim()),
        None => (rest, ""),
    };
    Some(Element::Link {
        target: target.to_string(),
        label: (!label.is_empty()).then(|| label.to_string()),
    })
}

/// Parse a sequence of lines (terminators already removed).
pub fn parse<I, S>(lines: I) -> Document
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut parser = GemtextParser::new();
    for line in lines {
        parser.push_line(line.as_ref());
    }
    parser.finish()
}

/// Parse a whole body. Accepts LF or CRLF line endings.
pub fn parse_str(text: &str) -> Document {
    parse(text.lines())
}
