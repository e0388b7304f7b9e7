/*
 * net.rs
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

//! Blocking connections: TcpStream wrapped with rustls (implicit TLS, handshake on connect).
//!
//! `Connector` opens one connection per request; the client never reuses them.
//! `CancelHandle` lets another thread shut the socket down under a pending read.

use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rustls::pki_types::ServerName;
use rustls::{ClientConfig, ClientConnection, StreamOwned};

use crate::error::GeminiError;
use crate::trust::{client_config, TrustPolicy};

/// Connect and per-read/write timeouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub connect: Duration,
    pub read: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(15),
            read: Duration::from_secs(30),
        }
    }
}

/// Aborts a blocking exchange from another thread by shutting the socket down.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    socket: Arc<TcpStream>,
    cancelled: Arc<AtomicBool>,
}

impl CancelHandle {
    /// Handle on a clone of `socket`; None if the descriptor cannot be duplicated.
    pub fn for_socket(socket: &TcpStream) -> Option<Self> {
        let socket = socket.try_clone().ok()?;
        Some(Self {
            socket: Arc::new(socket),
            cancelled: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        let _ = self.socket.shutdown(Shutdown::Both);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// A byte-stream connection owned by exactly one request.
pub trait Connection: Read + Write + Send {
    /// Orderly close (TLS close_notify, socket shutdown). Dropping also releases the connection.
    fn close(&mut self) -> io::Result<()> {
        self.flush()
    }

    fn cancel_handle(&self) -> Option<CancelHandle> {
        None
    }
}

impl<C: Connection + ?Sized> Connection for Box<C> {
    fn close(&mut self) -> io::Result<()> {
        (**self).close()
    }

    fn cancel_handle(&self) -> Option<CancelHandle> {
        (**self).cancel_handle()
    }
}

/// Plain TCP, for loopback testing and for TLS-terminating proxies.
impl Connection for TcpStream {
    fn close(&mut self) -> io::Result<()> {
        self.flush()?;
        match self.shutdown(Shutdown::Both) {
            Err(e) if e.kind() != io::ErrorKind::NotConnected => Err(e),
            _ => Ok(()),
        }
    }

    fn cancel_handle(&self) -> Option<CancelHandle> {
        CancelHandle::for_socket(self)
    }
}

/// Opens connections to host:port.
pub trait Connector: Send + Sync {
    fn connect(
        &self,
        host: &str,
        port: u16,
        timeouts: &Timeouts,
    ) -> Result<Box<dyn Connection>, GeminiError>;
}

/// Resolve host:port and connect to the first address that answers within the timeout.
pub fn connect_tcp(host: &str, port: u16, timeouts: &Timeouts) -> Result<TcpStream, GeminiError> {
    let authority = format!("{}:{}", host, port);
    let addrs: Vec<SocketAddr> = (host, port)
        .to_socket_addrs()
        .map_err(|e| GeminiError::Connection(format!("cannot resolve {}: {}", authority, e)))?
        .collect();
    if addrs.is_empty() {
        return Err(GeminiError::Connection(format!("no addresses for {}", authority)));
    }
    let mut last_err = None;
    for addr in addrs {
        match TcpStream::connect_timeout(&addr, timeouts.connect) {
            Ok(tcp) => {
                tcp.set_read_timeout(Some(timeouts.read))
                    .and_then(|_| tcp.set_write_timeout(Some(timeouts.read)))
                    .map_err(|e| GeminiError::from_connect(&authority, e))?;
                let _ = tcp.set_nodelay(true);
                log::debug!("[gemini] connected to {} ({})", authority, addr);
                return Ok(tcp);
            }
            Err(e) => {
                log::debug!("[gemini] connect to {} failed: {}", addr, e);
                last_err = Some(e);
            }
        }
    }
    Err(GeminiError::from_connect(
        &authority,
        last_err.unwrap_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "no address connected")),
    ))
}

/// TLS over TCP. The handshake is complete before the connection is returned.
pub struct TlsConnection {
    inner: StreamOwned<ClientConnection, TcpStream>,
}

impl TlsConnection {
    /// Access the underlying rustls connection (e.g. negotiated cipher suite, peer certificates).
    pub fn tls(&self) -> &ClientConnection {
        &self.inner.conn
    }
}

impl Read for TlsConnection {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.inner.read(buf) {
            // Many servers close the socket without close_notify; treat as end of body.
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                log::warn!("[gemini] peer closed connection without TLS close_notify");
                Ok(0)
            }
            other => other,
        }
    }
}

impl Write for TlsConnection {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl Connection for TlsConnection {
    fn close(&mut self) -> io::Result<()> {
        self.inner.conn.send_close_notify();
        let flushed = self.inner.flush();
        let _ = self.inner.sock.shutdown(Shutdown::Both);
        flushed
    }

    fn cancel_handle(&self) -> Option<CancelHandle> {
        CancelHandle::for_socket(&self.inner.sock)
    }
}

/// Default connector: DNS, TCP with timeouts, then a TLS handshake checked by a trust policy.
pub struct TlsConnector {
    config: Arc<ClientConfig>,
    policy_name: &'static str,
}

impl TlsConnector {
    pub fn new(policy: Arc<dyn TrustPolicy>) -> Self {
        let policy_name = policy.name();
        Self {
            config: client_config(policy),
            policy_name,
        }
    }

    /// Connect and complete the TLS handshake.
    pub fn connect_tls(
        &self,
        host: &str,
        port: u16,
        timeouts: &Timeouts,
    ) -> Result<TlsConnection, GeminiError> {
        let server_name = ServerName::try_from(host)
            .map_err(|_| GeminiError::invalid_request(format!("invalid host name: {}", host)))?
            .to_owned();
        let mut tcp = connect_tcp(host, port, timeouts)?;
        let mut conn = ClientConnection::new(Arc::clone(&self.config), server_name)
            .map_err(|e| GeminiError::Connection(format!("TLS setup for {}: {}", host, e)))?;
        let context = format!("TLS handshake with {}:{}", host, port);
        while conn.is_handshaking() {
            conn.complete_io(&mut tcp)
                .map_err(|e| GeminiError::from_connect(&context, e))?;
        }
        log::debug!(
            "[gemini] TLS established with {}:{} ({:?}, trust={})",
            host,
            port,
            conn.protocol_version(),
            self.policy_name
        );
        Ok(TlsConnection {
            inner: StreamOwned::new(conn, tcp),
        })
    }
}

impl Connector for TlsConnector {
    fn connect(
        &self,
        host: &str,
        port: u16,
        timeouts: &Timeouts,
    ) -> Result<Box<dyn Connection>, GeminiError> {
        Ok(Box::new(self.connect_tls(host, port, timeouts)?))
    }
}

/// Connects without TLS. Only for loopback tests and trusted TLS-terminating proxies.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainConnector;

impl Connector for PlainConnector {
    fn connect(
        &self,
        host: &str,
        port: u16,
        timeouts: &Timeouts,
    ) -> Result<Box<dyn Connection>, GeminiError> {
        Ok(Box::new(connect_tcp(host, port, timeouts)?))
    }
}
