use std::collections::HashMap;
use std::net::TcpListener;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::Redirect,
    routing::post,
};
use axum_server::tls_openssl::{OpenSSLAcceptor, OpenSSLConfig};
use bankid::config::{BankIdConfig, CredentialsConfig, Environment};
use bankid::telemetry;
use bankid::tls::TestCredentials;
use openssl::pkey::PKey;
use openssl::ssl::{SslAcceptor, SslMethod, SslVerifyMode};
use openssl::x509::X509;
use serde_json::{Value, json};
use uuid::Uuid;

const BASE_PATH: &str = "/rp/v5.1";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OrderState {
    Started,
    Complete,
}

/// In-memory stand-in for the BankID endpoint.
///
/// A new order reports pending on its first collect and complete afterwards.
#[derive(Clone, Default)]
struct MockBankId {
    orders: Arc<Mutex<HashMap<String, OrderState>>>,
    next_order: Arc<AtomicUsize>,
}

type Reply = (StatusCode, Json<Value>);

fn error(code: &str, details: &str) -> Reply {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "errorCode": code, "details": details })),
    )
}

impl MockBankId {
    fn start_order(&self, body: &Value) -> Reply {
        if body.get("endUserIp").and_then(Value::as_str).is_none() {
            return error("invalidParameters", "Invalid endUserIp");
        }
        let order_ref = format!("order-{}", self.next_order.fetch_add(1, Ordering::SeqCst));
        self.orders
            .lock()
            .unwrap()
            .insert(order_ref.clone(), OrderState::Started);
        (
            StatusCode::OK,
            Json(json!({ "orderRef": order_ref, "autoStartToken": Uuid::new_v4().to_string() })),
        )
    }

    fn collect(&self, order_ref: &str) -> Reply {
        let mut orders = self.orders.lock().unwrap();
        match orders.get(order_ref).copied() {
            Some(OrderState::Started) => {
                orders.insert(order_ref.to_string(), OrderState::Complete);
                (
                    StatusCode::OK,
                    Json(json!({
                        "orderRef": order_ref,
                        "status": "pending",
                        "hintCode": "outstandingTransaction"
                    })),
                )
            }
            Some(OrderState::Complete) => (
                StatusCode::OK,
                Json(json!({
                    "orderRef": order_ref,
                    "status": "complete",
                    "completionData": {
                        "user": {
                            "personalNumber": "190000000000",
                            "name": "Karl Karlsson",
                            "givenName": "Karl",
                            "surname": "Karlsson"
                        },
                        "device": { "ipAddress": "127.0.0.1" },
                        "cert": { "notBefore": "1502983274000", "notAfter": "1563549674000" },
                        "signature": "PD94bWwgdmVyc2lvbj0iMS4wIj8+",
                        "ocspResponse": "MIIHfgoBAKCCB3cwggdzBgkrBgEFBQcwAQEEggdkMIIHYDCCAT"
                    }
                })),
            ),
            None => error("invalidParameters", "No such order"),
        }
    }

    fn cancel(&self, order_ref: &str) -> Reply {
        let mut orders = self.orders.lock().unwrap();
        match orders.get(order_ref).copied() {
            Some(OrderState::Started) => {
                orders.remove(order_ref);
                (StatusCode::OK, Json(json!({})))
            }
            _ => error("invalidParameters", "No such order"),
        }
    }
}

fn order_ref(body: &Value) -> &str {
    body.get("orderRef").and_then(Value::as_str).unwrap_or_default()
}

async fn auth(State(state): State<MockBankId>, Json(body): Json<Value>) -> Reply {
    state.start_order(&body)
}

async fn sign(State(state): State<MockBankId>, Json(body): Json<Value>) -> Reply {
    if body.get("userVisibleData").is_none() {
        return error("invalidParameters", "Invalid userVisibleData");
    }
    state.start_order(&body)
}

async fn collect(State(state): State<MockBankId>, Json(body): Json<Value>) -> Reply {
    state.collect(order_ref(&body))
}

async fn cancel(State(state): State<MockBankId>, Json(body): Json<Value>) -> Reply {
    state.cancel(order_ref(&body))
}

/// Starts the mock endpoint behind a TLS acceptor that requires a client
/// certificate issued by `creds.ca_cert`. Returns the base address.
pub async fn spawn_bankid(creds: &TestCredentials) -> String {
    let router = Router::new()
        .route(&format!("{BASE_PATH}/auth"), post(auth))
        .route(&format!("{BASE_PATH}/sign"), post(sign))
        .route(&format!("{BASE_PATH}/collect"), post(collect))
        .route(&format!("{BASE_PATH}/cancel"), post(cancel))
        .with_state(MockBankId::default());

    serve(creds, router).await
}

/// Starts an endpoint whose collect answers with a temporary redirect to a
/// path that would return a valid collect body. Every request is counted.
pub async fn spawn_redirecting(creds: &TestCredentials) -> (String, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));

    let router = Router::new()
        .route(
            &format!("{BASE_PATH}/collect"),
            post(|State(hits): State<Arc<AtomicUsize>>| async move {
                hits.fetch_add(1, Ordering::SeqCst);
                Redirect::temporary(&format!("{BASE_PATH}/elsewhere"))
            }),
        )
        .route(
            &format!("{BASE_PATH}/elsewhere"),
            post(|State(hits): State<Arc<AtomicUsize>>| async move {
                hits.fetch_add(1, Ordering::SeqCst);
                Json(json!({ "orderRef": "abc123", "status": "pending" }))
            }),
        )
        .with_state(hits.clone());

    (serve(creds, router).await, hits)
}

async fn serve(creds: &TestCredentials, router: Router) -> String {
    telemetry::init_tracing();

    let mut builder = SslAcceptor::mozilla_intermediate_v5(SslMethod::tls_server()).unwrap();
    builder
        .set_certificate(&X509::from_pem(&creds.server_cert).unwrap())
        .unwrap();
    builder
        .set_private_key(&PKey::private_key_from_pem(&creds.server_key).unwrap())
        .unwrap();
    builder
        .cert_store_mut()
        .add_cert(X509::from_pem(&creds.ca_cert).unwrap())
        .unwrap();
    builder.set_verify(SslVerifyMode::PEER | SslVerifyMode::FAIL_IF_NO_PEER_CERT);
    let tls_config = OpenSSLConfig::from_acceptor(Arc::new(builder.build()));

    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.set_nonblocking(true).unwrap();
    let port = listener.local_addr().unwrap().port();

    let server = axum_server::from_tcp(listener)
        .acceptor(OpenSSLAcceptor::new(tls_config))
        .serve(router.into_make_service());
    tokio::spawn(async move {
        if let Err(e) = server.await {
            tracing::error!("Mock BankID server error: {e:?}");
        }
    });

    format!("https://localhost:{port}{BASE_PATH}")
}

/// Credential files of a relying party, written to a fresh temporary directory.
pub struct CredentialFiles {
    pub dir: PathBuf,
    pub ca_cert: PathBuf,
    pub client_cert: PathBuf,
    pub client_key: PathBuf,
    pub client_pkcs12: PathBuf,
}

pub const PKCS12_PASSPHRASE: &str = "qwerty123";

impl CredentialFiles {
    pub fn write(creds: &TestCredentials) -> Self {
        let dir = std::env::temp_dir().join(format!("bankid-test-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();

        let files = Self {
            ca_cert: dir.join("ca.pem"),
            client_cert: dir.join("rp.crt"),
            client_key: dir.join("rp.key"),
            client_pkcs12: dir.join("rp.p12"),
            dir,
        };
        std::fs::write(&files.ca_cert, &creds.ca_cert).unwrap();
        std::fs::write(&files.client_cert, &creds.client_cert).unwrap();
        std::fs::write(&files.client_key, &creds.client_key).unwrap();
        std::fs::write(&files.client_pkcs12, creds.client_pkcs12(PKCS12_PASSPHRASE)).unwrap();
        files
    }

    pub fn pem_config(&self, url: &str) -> BankIdConfig {
        let credentials =
            CredentialsConfig::pem(&self.client_cert, &self.client_key, &self.ca_cert);
        BankIdConfig::new(Environment::Test, credentials).with_url(url)
    }

    pub fn pkcs12_config(&self, url: &str, passphrase: &str) -> BankIdConfig {
        let credentials =
            CredentialsConfig::pkcs12(&self.client_pkcs12, passphrase, &self.ca_cert);
        BankIdConfig::new(Environment::Test, credentials).with_url(url)
    }
}

impl Drop for CredentialFiles {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.dir);
    }
}
