/*
 * lib.rs
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

//! Gemini protocol core: request building, TLS transport, response framing and the
//! gemtext document model. Blocking; no runtime and no internal threads.

pub mod client;
pub mod config;
pub mod document;
pub mod error;
pub mod gemtext;
pub mod meta;
pub mod net;
pub mod request;
pub mod response;
pub mod status;
pub mod trust;

pub use client::{Client, ClientBuilder};
pub use config::{ClientConfig, TrustSetting};
pub use document::{Document, Element};
pub use error::GeminiError;
pub use meta::MimeType;
pub use net::{CancelHandle, Connection, Connector, Timeouts};
pub use request::Request;
pub use response::Response;
pub use status::{Category, Status};
pub use trust::{InsecureAcceptAll, SystemTrust, TrustPolicy};
