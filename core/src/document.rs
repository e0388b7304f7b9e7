/*
 * document.rs
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

//! Gemtext document model: an ordered list of block elements, in source line order.

use std::fmt;

/// One block of a gemtext document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Element {
    /// Plain text line, stored as received.
    Text(String),
    /// Heading, level 1 to 3.
    Heading { level: u8, text: String },
    /// Link line: target URL (possibly relative) and optional label.
    Link { target: String, label: Option<String> },
    /// Consecutive list items, merged.
    List(Vec<String>),
    Quote(String),
    /// Lines between two toggle markers, verbatim. `alt` is the text after the opening marker.
    Preformatted { alt: Option<String>, lines: Vec<String> },
}

impl Element {
    /// Serialize back to gemtext (one or more lines, no trailing newline).
    pub fn to_gemtext(&self) -> String {
        match self {
            Element::Text(text) => text.clone(),
            Element::Heading { level, text } => {
                format!("{} {}", "#".repeat(usize::from(*level)), text)
            }
            Element::Link { target, label: Some(label) } => format!("=> {} {}", target, label),
            Element::Link { target, label: None } => format!("=> {}", target),
            Element::List(items) => items
                .iter()
                .map(|item| format!("* {}", item))
                .collect::<Vec<_>>()
                .join("\n"),
            Element::Quote(text) => format!("> {}", text),
            Element::Preformatted { alt, lines } => {
                let mut out = String::from("```");
                if let Some(alt) = alt {
                    out.push_str(alt);
                }
                for line in lines {
                    out.push('\n');
                    out.push_str(line);
                }
                out.push_str("\n```");
                out
            }
        }
    }
}

/// Heading entry for a table of contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutlineEntry<'a> {
    /// Position of the heading in `Document::elements()`.
    pub index: usize,
    pub level: u8,
    pub text: &'a str,
}

/// Parsed gemtext document. Immutable once built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    elements: Vec<Element>,
}

impl Document {
    pub fn new(elements: Vec<Element>) -> Self {
        Self { elements }
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Element> {
        self.elements.iter()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn into_elements(self) -> Vec<Element> {
        self.elements
    }

    /// Text of the first level-1 heading, if any.
    pub fn title(&self) -> Option<&str> {
        self.elements.iter().find_map(|e| match e {
            Element::Heading { level: 1, text } => Some(text.as_str()),
            _ => None,
        })
    }

    /// All headings in document order.
    pub fn outline(&self) -> Vec<OutlineEntry<'_>> {
        self.elements
            .iter()
            .enumerate()
            .filter_map(|(index, e)| match e {
                Element::Heading { level, text } => Some(OutlineEntry {
                    index,
                    level: *level,
                    text: text.as_str(),
                }),
                _ => None,
            })
            .collect()
    }

    /// Link elements as (target, label) pairs.
    pub fn links(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.elements.iter().filter_map(|e| match e {
            Element::Link { target, label } => Some((target.as_str(), label.as_deref())),
            _ => None,
        })
    }
}

impl<'a> IntoIterator for &'a Document {
    type Item = &'a Element;
    type IntoIter = std::slice::Iter<'a, Element>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.iter()
    }
}

impl IntoIterator for Document {
    type Item = Element;
    type IntoIter = std::vec::IntoIter<Element>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.into_iter()
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, e) in self.elements.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", e.to_gemtext())?;
        }
        Ok(())
    }
}
