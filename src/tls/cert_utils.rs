use openssl::asn1::{Asn1Integer, Asn1Time};
use openssl::bn::{BigNum, MsbOption};
use openssl::hash::MessageDigest;
use openssl::pkcs12::Pkcs12;
use openssl::pkey::{PKey, Private};
use openssl::rsa::Rsa;
use openssl::x509::extension::{
    BasicConstraints, ExtendedKeyUsage, KeyUsage, SubjectAlternativeName,
};
use openssl::x509::{X509, X509Builder, X509Name, X509NameBuilder};

/// Helper function to generate a complete set of mutual TLS test credentials.
///
/// A single root issues both the endpoint certificate (valid for `localhost`
/// and `127.0.0.1`) and the relying party certificate.
pub fn generate_test_credentials() -> TestCredentials {
    let (ca_cert, ca_key) = generate_ca_certificate();
    let (server_cert, server_key) = generate_leaf_certificate(&ca_cert, &ca_key, Role::Server);
    let (client_cert, client_key) = generate_leaf_certificate(&ca_cert, &ca_key, Role::Client);

    TestCredentials {
        ca_cert: ca_cert.to_pem().unwrap(),
        server_cert,
        server_key,
        client_cert,
        client_key,
    }
}

#[derive(Debug, Clone)]
pub struct TestCredentials {
    pub ca_cert: Vec<u8>,
    pub server_cert: Vec<u8>,
    pub server_key: Vec<u8>,
    pub client_cert: Vec<u8>,
    pub client_key: Vec<u8>,
}

impl TestCredentials {
    /// Packs the relying party certificate and key into a DER PKCS#12 bundle.
    pub fn client_pkcs12(&self, passphrase: &str) -> Vec<u8> {
        let cert = X509::from_pem(&self.client_cert).unwrap();
        let key = PKey::private_key_from_pem(&self.client_key).unwrap();

        let mut builder = Pkcs12::builder();
        builder.name("relying party").pkey(&key).cert(&cert);
        builder.build2(passphrase).unwrap().to_der().unwrap()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Server,
    Client,
}

pub fn generate_ca_certificate() -> (X509, PKey<Private>) {
    let key_pair = generate_key();

    let mut cert_builder = X509Builder::new().unwrap();
    cert_builder.set_version(2).unwrap();
    cert_builder
        .set_serial_number(&generate_serial_number())
        .unwrap();

    let subject_name = create_x509_name(&[
        ("C", "SE"),
        ("O", "Test BankID"),
        ("CN", "Test BankID Root CA"),
    ])
    .unwrap();
    cert_builder.set_subject_name(&subject_name).unwrap();
    cert_builder.set_issuer_name(&subject_name).unwrap();
    cert_builder.set_pubkey(&key_pair).unwrap();
    set_validity(&mut cert_builder);

    cert_builder
        .append_extension(BasicConstraints::new().critical().ca().build().unwrap())
        .unwrap();
    cert_builder
        .append_extension(
            KeyUsage::new()
                .critical()
                .key_cert_sign()
                .crl_sign()
                .build()
                .unwrap(),
        )
        .unwrap();

    cert_builder
        .sign(&key_pair, MessageDigest::sha256())
        .unwrap();

    (cert_builder.build(), key_pair)
}

/// Issues a leaf certificate and returns it with its key, both PEM encoded.
pub fn generate_leaf_certificate(
    ca_cert: &X509,
    ca_key: &PKey<Private>,
    role: Role,
) -> (Vec<u8>, Vec<u8>) {
    let key_pair = generate_key();

    let mut cert_builder = X509Builder::new().unwrap();
    cert_builder.set_version(2).unwrap();
    cert_builder
        .set_serial_number(&generate_serial_number())
        .unwrap();

    let common_name = match role {
        Role::Server => "localhost",
        Role::Client => "Test Relying Party",
    };
    let subject_name =
        create_x509_name(&[("C", "SE"), ("O", "Test"), ("CN", common_name)]).unwrap();
    cert_builder.set_subject_name(&subject_name).unwrap();
    cert_builder
        .set_issuer_name(ca_cert.subject_name())
        .unwrap();
    cert_builder.set_pubkey(&key_pair).unwrap();
    set_validity(&mut cert_builder);

    cert_builder
        .append_extension(BasicConstraints::new().build().unwrap())
        .unwrap();
    cert_builder
        .append_extension(
            KeyUsage::new()
                .critical()
                .digital_signature()
                .key_encipherment()
                .build()
                .unwrap(),
        )
        .unwrap();

    match role {
        Role::Server => {
            cert_builder
                .append_extension(ExtendedKeyUsage::new().server_auth().build().unwrap())
                .unwrap();
            let san = SubjectAlternativeName::new()
                .dns("localhost")
                .ip("127.0.0.1")
                .build(&cert_builder.x509v3_context(Some(ca_cert), None))
                .unwrap();
            cert_builder.append_extension(san).unwrap();
        }
        Role::Client => {
            cert_builder
                .append_extension(ExtendedKeyUsage::new().client_auth().build().unwrap())
                .unwrap();
        }
    }

    cert_builder.sign(ca_key, MessageDigest::sha256()).unwrap();

    (
        cert_builder.build().to_pem().unwrap(),
        key_pair.private_key_to_pem_pkcs8().unwrap(),
    )
}

fn generate_key() -> PKey<Private> {
    let rsa = Rsa::generate(2048).unwrap();
    PKey::from_rsa(rsa).unwrap()
}

// One year, starting now
fn set_validity(cert_builder: &mut X509Builder) {
    let not_before = Asn1Time::days_from_now(0).unwrap();
    let not_after = Asn1Time::days_from_now(365).unwrap();
    cert_builder.set_not_before(&not_before).unwrap();
    cert_builder.set_not_after(&not_after).unwrap();
}

fn generate_serial_number() -> Asn1Integer {
    let mut serial = BigNum::new().unwrap();
    serial.rand(128, MsbOption::MAYBE_ZERO, false).unwrap();
    serial.to_asn1_integer().unwrap()
}

fn create_x509_name(entries: &[(&str, &str)]) -> Result<X509Name, openssl::error::ErrorStack> {
    let mut name_builder = X509NameBuilder::new()?;
    for (key, value) in entries {
        name_builder.append_entry_by_text(key, value)?;
    }
    Ok(name_builder.build())
}
