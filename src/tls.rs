mod cert_utils;
mod errors;

#[doc(hidden)]
pub use cert_utils::*;
pub use errors::TlsError;

use std::path::Path;

use openssl::pkcs12::Pkcs12;
use openssl::pkey::{PKey, Private};
use openssl::x509::X509;
use reqwest::{Certificate, Client, Identity, redirect};
use secrecy::{ExposeSecret, SecretBox};
use tracing::{debug, instrument, trace};

use crate::config::CredentialsConfig;

/// Client identity and trust anchor of the relying party, normalized to PEM.
///
/// Construction parses every piece of material with OpenSSL, so a value of this
/// type always holds a usable identity and at least one trust anchor.
pub struct ClientCredentials {
    identity_pem: SecretBox<Vec<u8>>,
    trust_anchors: Vec<Vec<u8>>,
}

impl ClientCredentials {
    /// Builds credentials from PEM encoded data.
    ///
    /// # Arguments
    ///
    /// * `cert_chain` - Client certificate, optionally followed by intermediates.
    /// * `key` - Private key of the client certificate.
    /// * `ca_cert` - One or more trusted CA certificates for the endpoint.
    pub fn from_pem(cert_chain: &[u8], key: &[u8], ca_cert: &[u8]) -> Result<Self, TlsError> {
        trace!("Loading client certificate chain from PEM...");
        let chain = X509::stack_from_pem(cert_chain).map_err(TlsError::openssl("certificate"))?;
        trace!("Loading client private key from PEM...");
        let key = PKey::private_key_from_pem(key).map_err(TlsError::openssl("private key"))?;

        Self::from_parts(chain, key, ca_cert)
    }

    /// Builds credentials from a DER encoded PKCS#12 bundle.
    pub fn from_pkcs12(der: &[u8], passphrase: &str, ca_cert: &[u8]) -> Result<Self, TlsError> {
        trace!("Decrypting PKCS#12 bundle...");
        let parsed = Pkcs12::from_der(der)
            .and_then(|bundle| bundle.parse2(passphrase))
            .map_err(TlsError::openssl("PKCS#12 bundle"))?;

        let cert = parsed.cert.ok_or(TlsError::IncompleteBundle("certificate"))?;
        let key = parsed.pkey.ok_or(TlsError::IncompleteBundle("private key"))?;

        let mut chain = vec![cert];
        if let Some(extra) = parsed.ca {
            chain.extend(extra.into_iter());
        }

        Self::from_parts(chain, key, ca_cert)
    }

    /// Reads the files referenced by `config`.
    #[instrument(skip(config))]
    pub async fn load(config: &CredentialsConfig) -> Result<Self, TlsError> {
        let ca_cert = read(&config.ca_certificate, "trust anchor").await?;

        if let Some(bundle) = &config.pkcs12 {
            debug!("Using PKCS#12 client identity");
            let der = read(bundle, "PKCS#12 bundle").await?;
            let passphrase = config
                .passphrase
                .as_ref()
                .map(|p| p.expose_secret())
                .unwrap_or_default();
            return Self::from_pkcs12(&der, passphrase, &ca_cert);
        }

        match (&config.certificate, &config.private_key) {
            (Some(cert_path), Some(key_path)) => {
                debug!("Using PEM client identity");
                let cert = read(cert_path, "certificate").await?;
                let key = read(key_path, "private key").await?;
                Self::from_pem(&cert, &key, &ca_cert)
            }
            _ => Err(TlsError::MissingIdentity),
        }
    }

    /// Builds an HTTPS client presenting the identity and trusting only the
    /// configured anchors.
    pub fn build_client(&self) -> Result<Client, TlsError> {
        let identity = Identity::from_pem(self.identity_pem.expose_secret())?;

        let mut builder = Client::builder()
            .use_rustls_tls()
            .tls_built_in_root_certs(false)
            .https_only(true)
            // One call, one request: a 3xx is handed back as an unexpected status
            .redirect(redirect::Policy::none())
            .identity(identity)
            .user_agent(concat!("bankid-rs/", env!("CARGO_PKG_VERSION")));

        for anchor in &self.trust_anchors {
            builder = builder.add_root_certificate(Certificate::from_pem(anchor)?);
        }

        Ok(builder.build()?)
    }

    fn from_parts(
        chain: Vec<X509>,
        key: PKey<Private>,
        ca_cert: &[u8],
    ) -> Result<Self, TlsError> {
        let leaf = chain
            .first()
            .ok_or(TlsError::NoCertificate("client certificate chain"))?;
        let public_key = leaf
            .public_key()
            .map_err(TlsError::openssl("certificate"))?;
        if !public_key.public_eq(&key) {
            return Err(TlsError::KeyMismatch);
        }

        // PKCS#8 is the one key encoding every TLS backend accepts
        let mut identity_pem = key
            .private_key_to_pem_pkcs8()
            .map_err(TlsError::openssl("private key"))?;
        for cert in &chain {
            let pem = cert.to_pem().map_err(TlsError::openssl("certificate"))?;
            identity_pem.extend_from_slice(&pem);
        }

        trace!("Loading trust anchors from PEM...");
        let anchors = X509::stack_from_pem(ca_cert).map_err(TlsError::openssl("trust anchor"))?;
        if anchors.is_empty() {
            return Err(TlsError::NoCertificate("trust anchor"));
        }
        let trust_anchors = anchors
            .iter()
            .map(|cert| cert.to_pem())
            .collect::<Result<Vec<_>, _>>()
            .map_err(TlsError::openssl("trust anchor"))?;

        debug!(
            chain_len = chain.len(),
            anchors = trust_anchors.len(),
            "Loaded client credentials"
        );

        Ok(Self {
            identity_pem: SecretBox::new(Box::new(identity_pem)),
            trust_anchors,
        })
    }
}

async fn read(path: &Path, kind: &'static str) -> Result<Vec<u8>, TlsError> {
    tokio::fs::read(path).await.map_err(|source| TlsError::Read {
        kind,
        path: path.to_path_buf(),
        source,
    })
}
