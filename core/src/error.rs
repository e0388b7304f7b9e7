/*
 * error.rs
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

//! Request, connection and protocol errors.

use std::io;

/// Errors from building a request, connecting, or reading a response.
#[derive(Debug, thiserror::Error)]
pub enum GeminiError {
    /// Malformed input URL. Local; never worth retrying.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// DNS, TCP connect or TLS handshake failure.
    #[error("connection failed: {0}")]
    Connection(String),

    /// No connection or no response within the configured bound.
    #[error("timed out: {0}")]
    Timeout(String),

    /// Status line malformed or undecodable; the server is non-conformant.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Stream failure while reading or writing an established connection.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Redirect chain longer than the configured limit.
    #[error("too many redirects (limit {0})")]
    TooManyRedirects(usize),

    /// Configuration file unreadable or invalid.
    #[error("configuration error: {0}")]
    Config(String),
}

impl GeminiError {
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// True for failures a caller may reasonably retry (network trouble, not bad input).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GeminiError::Connection(_) | GeminiError::Timeout(_) | GeminiError::Io(_)
        )
    }

    /// Classify an I/O error raised while establishing a connection.
    pub(crate) fn from_connect(context: &str, e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => {
                GeminiError::Timeout(format!("{}: {}", context, e))
            }
            _ => GeminiError::Connection(format!("{}: {}", context, e)),
        }
    }

    /// Classify an I/O error raised on an established connection.
    pub(crate) fn from_transfer(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => {
                GeminiError::Timeout(e.to_string())
            }
            _ => GeminiError::Io(e),
        }
    }
}
