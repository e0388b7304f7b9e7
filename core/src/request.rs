/*
 * request.rs
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

//! Gemini request: one absolute URL on a single line. URL normalization, input queries
//! (answers to 1x prompts) and relative link resolution.
//!
//! Normalization applied by `Request::new`:
//! - missing scheme: `gemini://` is prepended (`example.org/a` -> `gemini://example.org/a`);
//! - empty path becomes `/`;
//! - the fragment is dropped (never sent to the server);
//! - a trailing `/` is appended to the path unless the URL has a query, so
//!   `gemini://host/path` is sent as `gemini://host/path/`. Turn this off with
//!   `RequestBuilder::trailing_slash(false)`.

use std::net::IpAddr;

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use url::{Host, Url};

use crate::error::GeminiError;

pub const SCHEME: &str = "gemini";
pub const DEFAULT_PORT: u16 = 1965;
/// Maximum URL length on the wire, excluding CRLF.
pub const MAX_REQUEST_URL_LEN: usize = 1024;

/// Input query: encode everything except RFC 3986 unreserved characters.
const QUERY_INPUT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Validated, normalized request. Immutable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    url: Url,
}

impl Request {
    /// Normalize and validate `url` with the default rules.
    pub fn new(url: &str) -> Result<Self, GeminiError> {
        RequestBuilder::new(url).build()
    }

    /// Follow-up request answering a 1x prompt: `input` becomes the percent-encoded query of `base`.
    pub fn with_input(base: &Request, input: &str) -> Result<Self, GeminiError> {
        let mut url = base.url.clone();
        let encoded = utf8_percent_encode(input, QUERY_INPUT).to_string();
        url.set_query(Some(&encoded));
        check_length(&url)?;
        Ok(Self { url })
    }

    /// The URL as sent on the wire.
    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    /// Host name or IP address (IPv6 without brackets).
    pub fn host(&self) -> String {
        match self.url.host() {
            Some(Host::Domain(d)) => d.to_string(),
            Some(Host::Ipv4(a)) => IpAddr::V4(a).to_string(),
            Some(Host::Ipv6(a)) => IpAddr::V6(a).to_string(),
            None => String::new(),
        }
    }

    pub fn port(&self) -> u16 {
        self.url.port().unwrap_or(DEFAULT_PORT)
    }

    pub fn query(&self) -> Option<&str> {
        self.url.query()
    }

    /// `<url>\r\n`
    pub fn request_line(&self) -> String {
        format!("{}\r\n", self.url.as_str())
    }
}

impl std::fmt::Display for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.url.as_str())
    }
}

/// Request builder for callers that need to switch normalization rules off.
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    pub url: String,
    /// Append `/` to query-less paths (default true).
    pub trailing_slash: bool,
}

impl RequestBuilder {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            trailing_slash: true,
        }
    }

    pub fn trailing_slash(&mut self, enabled: bool) -> &mut Self {
        self.trailing_slash = enabled;
        self
    }

    pub fn build(&self) -> Result<Request, GeminiError> {
        let raw = self.url.trim();
        if raw.is_empty() {
            return Err(GeminiError::invalid_request("empty URL"));
        }
        // Checked before parsing: the url crate silently strips tabs and newlines.
        if raw.contains(['\r', '\n']) {
            return Err(GeminiError::invalid_request("URL contains a line terminator"));
        }
        let with_scheme = if has_scheme(raw) {
            raw.to_string()
        } else {
            format!("{}://{}", SCHEME, raw)
        };
        let mut url = Url::parse(&with_scheme)
            .map_err(|e| GeminiError::invalid_request(format!("{}: {}", raw, e)))?;
        if url.scheme() != SCHEME {
            return Err(GeminiError::invalid_request(format!(
                "unsupported scheme: {}",
                url.scheme()
            )));
        }
        if url.host_str().map_or(true, str::is_empty) {
            return Err(GeminiError::invalid_request("URL has no host"));
        }
        if !url.username().is_empty() || url.password().is_some() {
            return Err(GeminiError::invalid_request("URL must not contain userinfo"));
        }
        ascii_host(&mut url)?;
        url.set_fragment(None);
        if url.path().is_empty() {
            url.set_path("/");
        }
        if self.trailing_slash && url.query().is_none() && !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        check_length(&url)?;
        Ok(Request { url })
    }
}

/// True if `raw` starts with `scheme://`, i.e. `://` appears before any `/`, `?` or `#`.
fn has_scheme(raw: &str) -> bool {
    match raw.find("://") {
        Some(i) => i > 0 && !raw[..i].contains(['/', '?', '#']),
        None => false,
    }
}

/// `gemini` is not a special scheme for the url crate, so its domain is kept percent-encoded
/// and never mapped. Convert internationalized names to their ASCII (punycode) form.
fn ascii_host(url: &mut Url) -> Result<(), GeminiError> {
    let domain = match url.host() {
        Some(Host::Domain(d)) => d.to_string(),
        _ => return Ok(()),
    };
    let decoded = percent_decode_str(&domain)
        .decode_utf8()
        .map_err(|_| GeminiError::invalid_request(format!("invalid host name: {}", domain)))?;
    if decoded.is_ascii() && !domain.contains('%') {
        return Ok(());
    }
    let ascii = match Host::parse(&decoded) {
        Ok(Host::Domain(ascii)) => ascii,
        _ => {
            return Err(GeminiError::invalid_request(format!(
                "invalid host name: {}",
                decoded
            )))
        }
    };
    url.set_host(Some(&ascii))
        .map_err(|e| GeminiError::invalid_request(format!("{}: {}", ascii, e)))
}

fn check_length(url: &Url) -> Result<(), GeminiError> {
    let len = url.as_str().len();
    if len > MAX_REQUEST_URL_LEN {
        return Err(GeminiError::invalid_request(format!(
            "URL is {} bytes, limit is {}",
            len, MAX_REQUEST_URL_LEN
        )));
    }
    Ok(())
}

/// Resolve a link or redirect target against the URL of the page it came from.
/// Absolute references are returned as is.
pub fn resolve(base: &str, reference: &str) -> Result<String, GeminiError> {
    let base = Url::parse(base)
        .map_err(|e| GeminiError::invalid_request(format!("{}: {}", base, e)))?;
    let joined = base
        .join(reference.trim())
        .map_err(|e| GeminiError::invalid_request(format!("{}: {}", reference, e)))?;
    Ok(joined.to_string())
}
