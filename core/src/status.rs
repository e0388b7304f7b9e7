/*
 * status.rs
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

//! Two-digit Gemini status codes. The first digit selects the category, which tells the
//! caller what the meta string means.

use std::fmt;

/// Status category (first digit of the code).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// 1x: meta is a prompt; re-request with the answer as query.
    Input,
    /// 2x: meta is the MIME type of the body.
    Success,
    /// 3x: meta is the new target URL.
    Redirect,
    /// 4x: meta is an error message; may succeed later.
    TemporaryFailure,
    /// 5x: meta is an error message.
    PermanentFailure,
    /// 6x: meta is an error message.
    ClientCertificateRequired,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Input => "input required",
            Category::Success => "success",
            Category::Redirect => "redirect",
            Category::TemporaryFailure => "temporary failure",
            Category::PermanentFailure => "permanent failure",
            Category::ClientCertificateRequired => "client certificate required",
        }
    }
}

/// Response status, always in 10..=69.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Status(u8);

impl Status {
    pub const INPUT: Status = Status(10);
    pub const SENSITIVE_INPUT: Status = Status(11);
    pub const SUCCESS: Status = Status(20);
    pub const REDIRECT_TEMPORARY: Status = Status(30);
    pub const REDIRECT_PERMANENT: Status = Status(31);
    pub const TEMPORARY_FAILURE: Status = Status(40);
    pub const SERVER_UNAVAILABLE: Status = Status(41);
    pub const CGI_ERROR: Status = Status(42);
    pub const PROXY_ERROR: Status = Status(43);
    pub const SLOW_DOWN: Status = Status(44);
    pub const PERMANENT_FAILURE: Status = Status(50);
    pub const NOT_FOUND: Status = Status(51);
    pub const GONE: Status = Status(52);
    pub const PROXY_REQUEST_REFUSED: Status = Status(53);
    pub const BAD_REQUEST: Status = Status(59);
    pub const CLIENT_CERTIFICATE_REQUIRED: Status = Status(60);
    pub const CERTIFICATE_NOT_AUTHORISED: Status = Status(61);
    pub const CERTIFICATE_NOT_VALID: Status = Status(62);

    /// Returns None unless `code` is in 10..=69.
    pub fn from_code(code: u8) -> Option<Self> {
        (10..=69).contains(&code).then_some(Status(code))
    }

    /// Status from the two ASCII digits at the start of a status line.
    pub fn from_digits(tens: u8, units: u8) -> Option<Self> {
        if !tens.is_ascii_digit() || !units.is_ascii_digit() {
            return None;
        }
        Self::from_code((tens - b'0') * 10 + (units - b'0'))
    }

    pub fn code(&self) -> u8 {
        self.0
    }

    pub fn category(&self) -> Category {
        match self.0 / 10 {
            1 => Category::Input,
            2 => Category::Success,
            3 => Category::Redirect,
            4 => Category::TemporaryFailure,
            5 => Category::PermanentFailure,
            _ => Category::ClientCertificateRequired,
        }
    }

    pub fn is_success(&self) -> bool {
        self.category() == Category::Success
    }

    pub fn is_redirect(&self) -> bool {
        self.category() == Category::Redirect
    }

    pub fn is_input(&self) -> bool {
        self.category() == Category::Input
    }

    /// 11: the prompt asks for something that should not be echoed (e.g. a password).
    pub fn is_sensitive_input(&self) -> bool {
        *self == Status::SENSITIVE_INPUT
    }

    pub fn is_failure(&self) -> bool {
        matches!(
            self.category(),
            Category::TemporaryFailure
                | Category::PermanentFailure
                | Category::ClientCertificateRequired
        )
    }

    /// Human-readable meaning of the code; unknown codes fall back to the category.
    pub fn description(&self) -> &'static str {
        match self.0 {
            10 => "Input",
            11 => "Sensitive input",
            20 => "Success",
            30 => "Temporary redirect",
            31 => "Permanent redirect",
            40 => "Temporary failure",
            41 => "Server unavailable due to overload or maintenance",
            42 => "CGI error: a dynamic content process died unexpectedly or timed out",
            43 => "Proxy error: the server could not complete a transaction with the remote host",
            44 => "Slow down: do not send requests that frequently",
            50 => "Permanent failure",
            51 => "Not found",
            52 => "Gone: the resource will not be available again",
            53 => "Proxy request refused",
            59 => "Bad request",
            60 => "Client certificate required",
            61 => "Certificate not authorised",
            62 => "Certificate not valid",
            _ => self.category().as_str(),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
