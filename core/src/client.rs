/*
 * client.rs
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

//! Gemini client: one request/response exchange per call, blocking.
//!
//! The client holds configuration and a connector, nothing else. Every `send` opens
//! a fresh connection and hands it to the returned `Response`, so a single client can
//! be shared between threads without requests interleaving on a socket.

use std::io::Write;
use std::sync::Arc;

use crate::config::ClientConfig;
use crate::error::GeminiError;
use crate::net::{Connector, TlsConnector};
use crate::request::{resolve, Request, RequestBuilder};
use crate::response::Response;
use crate::trust::TrustPolicy;

pub struct Client {
    config: ClientConfig,
    connector: Arc<dyn Connector>,
}

impl Client {
    /// Client with the trust policy named in `config`.
    pub fn new(config: ClientConfig) -> Result<Self, GeminiError> {
        Self::builder().config(config).build()
    }

    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Send one request and read the status line. The body is left on the connection.
    pub fn send(&self, request: &Request) -> Result<Response, GeminiError> {
        let host = request.host();
        let port = request.port();
        log::debug!("[gemini] request {} ({}:{})", request, host, port);
        let mut conn = self.connector.connect(&host, port, &self.config.timeouts)?;
        let cancel = conn.cancel_handle();
        conn.write_all(request.request_line().as_bytes())
            .and_then(|_| conn.flush())
            .map_err(GeminiError::from_transfer)?;
        Response::read_with_cancel(conn, cancel)
    }

    /// Normalize `url` and send it.
    pub fn fetch(&self, url: &str) -> Result<Response, GeminiError> {
        self.send(&Request::new(url)?)
    }

    /// Send, following 3x redirects up to `config.max_redirects`. Relative targets are
    /// resolved against the URL that produced the redirect. Returns the request that
    /// produced the final response, as the base for its relative links.
    pub fn send_following_redirects(
        &self,
        request: &Request,
    ) -> Result<(Request, Response), GeminiError> {
        let mut current = request.clone();
        let mut hops = 0;
        loop {
            let response = self.send(&current)?;
            if !response.status().is_redirect() {
                return Ok((current, response));
            }
            if hops >= self.config.max_redirects {
                return Err(GeminiError::TooManyRedirects(self.config.max_redirects));
            }
            let meta = response.meta().trim();
            if meta.is_empty() {
                return Err(GeminiError::protocol("redirect without target"));
            }
            let target = resolve(current.url(), meta)?;
            if let Err(e) = response.close() {
                log::debug!("[gemini] close after redirect: {}", e);
            }
            log::debug!("[gemini] redirect {} -> {}", current, target);
            // Servers give exact targets; do not add a trailing slash to them.
            current = RequestBuilder::new(target).trailing_slash(false).build()?;
            hops += 1;
        }
    }
}

#[derive(Default)]
pub struct ClientBuilder {
    config: ClientConfig,
    policy: Option<Arc<dyn TrustPolicy>>,
    connector: Option<Arc<dyn Connector>>,
}

impl ClientBuilder {
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Trust policy for the default TLS connector; overrides `config.trust`.
    pub fn trust_policy(mut self, policy: Arc<dyn TrustPolicy>) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Replace the TLS connector entirely (tests, proxies).
    pub fn connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    pub fn build(self) -> Result<Client, GeminiError> {
        let connector = match self.connector {
            Some(c) => c,
            None => {
                let policy = match self.policy {
                    Some(p) => p,
                    None => self.config.trust.policy()?,
                };
                Arc::new(TlsConnector::new(policy))
            }
        };
        Ok(Client {
            config: self.config,
            connector,
        })
    }
}
