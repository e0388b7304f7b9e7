/*
 * config.rs
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

//! Client configuration: timeouts, redirect limit, trust policy. Persisted as XML in
//! ~/.gemello/client.xml, read and written with quick_xml. A missing file means defaults;
//! unknown elements are ignored so the UI can keep its own settings alongside.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::reader::Reader;
use quick_xml::writer::Writer;

use crate::error::GeminiError;
use crate::net::Timeouts;
use crate::trust::{InsecureAcceptAll, SystemTrust, TrustPolicy};

pub const DEFAULT_MAX_REDIRECTS: usize = 5;

const ROOT: &str = "client";
const CONNECT_TIMEOUT: &str = "connect-timeout-secs";
const READ_TIMEOUT: &str = "read-timeout-secs";
const MAX_REDIRECTS: &str = "max-redirects";
const TRUST: &str = "trust";

/// Which built-in trust policy the client uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrustSetting {
    /// Chain and hostname validation against the system roots.
    #[default]
    System,
    /// No validation at all. Must be chosen explicitly.
    InsecureAcceptAll,
}

impl TrustSetting {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrustSetting::System => "system",
            TrustSetting::InsecureAcceptAll => "insecure-accept-all",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "system" => Some(TrustSetting::System),
            "insecure-accept-all" => Some(TrustSetting::InsecureAcceptAll),
            _ => None,
        }
    }

    pub fn policy(&self) -> Result<Arc<dyn TrustPolicy>, GeminiError> {
        Ok(match self {
            TrustSetting::System => Arc::new(SystemTrust::new()?),
            TrustSetting::InsecureAcceptAll => Arc::new(InsecureAcceptAll),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub timeouts: Timeouts,
    pub max_redirects: usize,
    pub trust: TrustSetting,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeouts: Timeouts::default(),
            max_redirects: DEFAULT_MAX_REDIRECTS,
            trust: TrustSetting::default(),
        }
    }
}

/// Default config directory: ~/.gemello.
pub fn default_config_dir() -> Option<PathBuf> {
    std::env::var_os("HOME").map(PathBuf::from).map(|h| h.join(".gemello"))
}

/// Default config path: ~/.gemello/client.xml.
pub fn default_config_path() -> Option<PathBuf> {
    default_config_dir().map(|d| d.join("client.xml"))
}

/// Load configuration. Missing file: defaults.
pub fn load_config(path: &Path) -> Result<ClientConfig, GeminiError> {
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(ClientConfig::default()),
        Err(e) => return Err(GeminiError::Config(format!("{}: {}", path.display(), e))),
    };
    parse_config(&content)
}

/// Parse `<client>...</client>` XML. Elements not set keep their defaults.
pub fn parse_config(content: &str) -> Result<ClientConfig, GeminiError> {
    let mut config = ClientConfig::default();
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut element_name = Vec::<u8>::new();
    let mut in_root = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Err(e) => return Err(GeminiError::Config(format!("XML parse error: {}", e))),
            Ok(Event::Eof) => break,
            Ok(Event::Start(e)) => {
                let name = e.name();
                let name = name.as_ref();
                if name == ROOT.as_bytes() {
                    in_root = true;
                } else if in_root {
                    element_name.clear();
                    element_name.extend_from_slice(name);
                }
            }
            Ok(Event::Text(e)) => {
                if !in_root || element_name.is_empty() {
                    continue;
                }
                let text = e
                    .unescape()
                    .map_err(|e| GeminiError::Config(e.to_string()))?
                    .trim()
                    .to_string();
                apply_setting(&mut config, &element_name, &text)?;
                element_name.clear();
            }
            Ok(Event::End(e)) => {
                if e.name().as_ref() == ROOT.as_bytes() {
                    in_root = false;
                }
                element_name.clear();
            }
            _ => {}
        }
        buf.clear();
    }
    Ok(config)
}

fn apply_setting(config: &mut ClientConfig, name: &[u8], value: &str) -> Result<(), GeminiError> {
    let number = |v: &str| {
        v.parse::<u64>().map_err(|_| {
            GeminiError::Config(format!(
                "{}: expected a number, got {:?}",
                String::from_utf8_lossy(name),
                v
            ))
        })
    };
    // Sockets refuse a zero timeout.
    let seconds = |v: &str| match number(v)? {
        0 => Err(GeminiError::Config(format!(
            "{}: timeout must be at least 1 second",
            String::from_utf8_lossy(name)
        ))),
        n => Ok(Duration::from_secs(n)),
    };
    if name == CONNECT_TIMEOUT.as_bytes() {
        config.timeouts.connect = seconds(value)?;
    } else if name == READ_TIMEOUT.as_bytes() {
        config.timeouts.read = seconds(value)?;
    } else if name == MAX_REDIRECTS.as_bytes() {
        config.max_redirects = number(value)? as usize;
    } else if name == TRUST.as_bytes() {
        config.trust = TrustSetting::parse(value)
            .ok_or_else(|| GeminiError::Config(format!("unknown trust policy {:?}", value)))?;
    }
    Ok(())
}

fn xml_err<E: std::fmt::Display>(e: E) -> GeminiError {
    GeminiError::Config(e.to_string())
}

/// Serialize configuration as XML (UTF-8).
pub fn config_to_xml(config: &ClientConfig) -> Result<Vec<u8>, GeminiError> {
    let mut out = Vec::new();
    let mut writer = Writer::new_with_indent(&mut out, b' ', 2);
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(xml_err)?;
    writer
        .write_event(Event::Start(BytesStart::new(ROOT)))
        .map_err(xml_err)?;
    let entries = [
        (CONNECT_TIMEOUT, config.timeouts.connect.as_secs().to_string()),
        (READ_TIMEOUT, config.timeouts.read.as_secs().to_string()),
        (MAX_REDIRECTS, config.max_redirects.to_string()),
        (TRUST, config.trust.as_str().to_string()),
    ];
    for (name, value) in entries {
        writer
            .write_event(Event::Start(BytesStart::new(name)))
            .map_err(xml_err)?;
        writer
            .write_event(Event::Text(BytesText::new(&value)))
            .map_err(xml_err)?;
        writer
            .write_event(Event::End(BytesEnd::new(name)))
            .map_err(xml_err)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new(ROOT)))
        .map_err(xml_err)?;
    Ok(out)
}

/// Write configuration, creating the parent directory if needed.
pub fn save_config(path: &Path, config: &ClientConfig) -> Result<(), GeminiError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| GeminiError::Config(e.to_string()))?;
    }
    let bytes = config_to_xml(config)?;
    fs::write(path, bytes).map_err(|e| GeminiError::Config(format!("{}: {}", path.display(), e)))
}
