/*
 * trust.rs
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

//! Server certificate trust policies, plugged into rustls as a custom verifier.
//!
//! The policy only decides whether a certificate chain is acceptable for a host.
//! Handshake signatures are always verified with the rustls crypto provider, so a
//! permissive policy never disables the proof that the peer holds the key.

use std::fmt;
use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::client::WebPkiServerVerifier;
use rustls::crypto::WebPkiSupportedAlgorithms;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{CertificateError, ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};

use crate::error::GeminiError;

/// Decides whether a server certificate chain is acceptable.
pub trait TrustPolicy: fmt::Debug + Send + Sync {
    /// `end_entity` is the server certificate, `intermediates` the rest of the chain as sent.
    fn acceptable(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        host: &ServerName<'_>,
        now: UnixTime,
    ) -> bool;

    /// Short name for logs and configuration.
    fn name(&self) -> &'static str;
}

/// Build a root certificate store: platform native certs first, then webpki-roots as fallback.
pub fn build_root_store() -> RootCertStore {
    let mut root_store = RootCertStore::empty();
    match rustls_native_certs::load_native_certs() {
        Ok(certs) => {
            for cert in certs {
                let _ = root_store.add(cert);
            }
        }
        Err(e) => log::debug!("[gemini] native root certificates unavailable: {}", e),
    }
    if root_store.is_empty() {
        root_store.roots = webpki_roots::TLS_SERVER_ROOTS.iter().cloned().collect();
    }
    root_store
}

/// Full chain and hostname validation against the system roots (default policy).
pub struct SystemTrust {
    verifier: Arc<WebPkiServerVerifier>,
}

impl SystemTrust {
    pub fn new() -> Result<Self, GeminiError> {
        Self::with_roots(build_root_store())
    }

    pub fn with_roots(roots: RootCertStore) -> Result<Self, GeminiError> {
        let verifier = WebPkiServerVerifier::builder(Arc::new(roots))
            .build()
            .map_err(|e| GeminiError::Config(format!("cannot build certificate verifier: {}", e)))?;
        Ok(Self { verifier })
    }
}

impl fmt::Debug for SystemTrust {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SystemTrust")
    }
}

impl TrustPolicy for SystemTrust {
    fn acceptable(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        host: &ServerName<'_>,
        now: UnixTime,
    ) -> bool {
        match self
            .verifier
            .verify_server_cert(end_entity, intermediates, host, &[], now)
        {
            Ok(_) => true,
            Err(e) => {
                log::debug!("[gemini] certificate rejected for {:?}: {}", host, e);
                false
            }
        }
    }

    fn name(&self) -> &'static str {
        "system"
    }
}

/// Accepts every certificate without chain or hostname validation.
///
/// Insecure: anyone on the path can impersonate the server. Opt-in only, for
/// testing or for servers whose self-signed certificates are checked elsewhere.
#[derive(Debug, Default, Clone, Copy)]
pub struct InsecureAcceptAll;

impl TrustPolicy for InsecureAcceptAll {
    fn acceptable(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        host: &ServerName<'_>,
        _now: UnixTime,
    ) -> bool {
        log::warn!("[gemini] accepting unverified certificate for {:?} (insecure-accept-all)", host);
        true
    }

    fn name(&self) -> &'static str {
        "insecure-accept-all"
    }
}

/// rustls adapter: chain decision from the policy, signatures from the crypto provider.
struct PolicyVerifier {
    policy: Arc<dyn TrustPolicy>,
    algorithms: WebPkiSupportedAlgorithms,
}

impl fmt::Debug for PolicyVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolicyVerifier").field("policy", &self.policy).finish()
    }
}

impl ServerCertVerifier for PolicyVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        if self.policy.acceptable(end_entity, intermediates, server_name, now) {
            Ok(ServerCertVerified::assertion())
        } else {
            Err(rustls::Error::InvalidCertificate(
                CertificateError::ApplicationVerificationFailure,
            ))
        }
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(message, cert, dss, &self.algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(message, cert, dss, &self.algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.algorithms.supported_schemes()
    }
}

/// TLS client config whose server certificate check is delegated to `policy`. No client auth.
pub fn client_config(policy: Arc<dyn TrustPolicy>) -> Arc<ClientConfig> {
    let verifier = PolicyVerifier {
        policy,
        algorithms: rustls::crypto::ring::default_provider().signature_verification_algorithms,
    };
    let config = ClientConfig::builder()
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(verifier))
        .with_no_client_auth();
    Arc::new(config)
}
