mod errors;
mod session;

pub use errors::{Error, InitError, ProtocolError, ValidationError};

use std::{sync::Arc, time::Duration};

use tokio::time::{Instant, timeout_at};
use tracing::{debug, instrument, warn};

use crate::config::BankIdConfig;
use crate::domain::models::{
    AuthenticateResponse, AuthenticationPayload, CancelPayload, CancelResponse, CollectPayload,
    CollectResponse, ErrorResponse, Request, Response, SignPayload, SignResponse,
};
use crate::transport::{Connector, RawResponse, TlsConnector};
use session::LazySession;

pub type Result<T> = std::result::Result<T, Error>;

/// Interval at which callers are expected to collect a pending order.
///
/// The client never polls on its own; this is the cadence the endpoint expects
/// from whoever drives the order to completion.
pub const COLLECT_INTERVAL: Duration = Duration::from_secs(2);

/// Client of the BankID relying party API.
///
/// The transport session is built on the first call and reused by every later
/// call of this instance. Instances are independent of each other, so several
/// differently configured clients may live in one process.
///
/// The per-call timeout also covers building the session, which reads and
/// parses the credential files. Keep it above the time that takes. A call whose
/// deadline fires during setup returns [`Error::Timeout`]; the setup carries on
/// in the background and the next call picks up its outcome.
pub struct BankId {
    config: Arc<BankIdConfig>,
    connector: Arc<dyn Connector>,
    session: LazySession,
}

impl BankId {
    /// Creates a client that reads its credential material from the files
    /// referenced by `config`.
    ///
    /// Nothing is read until the first call.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use bankid::client::BankId;
    /// # use bankid::config::{BankIdConfig, CredentialsConfig, Environment};
    /// let credentials = CredentialsConfig::pkcs12("rp.p12", "qwerty123", "test-ca.pem");
    /// let client = BankId::new(BankIdConfig::new(Environment::Test, credentials));
    /// ```
    pub fn new(config: BankIdConfig) -> Self {
        let config = Arc::new(config);
        let connector = TlsConnector::new(config.clone());
        Self::from_parts(config, Arc::new(connector))
    }

    /// Creates a client whose session is built by `connector`.
    pub fn with_connector(config: BankIdConfig, connector: impl Connector + 'static) -> Self {
        Self::from_parts(Arc::new(config), Arc::new(connector))
    }

    fn from_parts(config: Arc<BankIdConfig>, connector: Arc<dyn Connector>) -> Self {
        Self {
            config,
            connector,
            session: LazySession::new(),
        }
    }

    pub fn config(&self) -> &BankIdConfig {
        &self.config
    }

    /// Whether the transport session has been established.
    pub fn is_connected(&self) -> bool {
        self.session.is_initialized()
    }

    /// Initiates an authentication order.
    ///
    /// Use [`collect`](Self::collect) to follow the order.
    pub async fn authenticate(
        &self,
        payload: &AuthenticationPayload,
    ) -> Result<AuthenticateResponse> {
        let response = self.call(Request::Authenticate(payload)).await?;
        Ok(response.into_authenticate()?)
    }

    /// Initiates a sign order.
    ///
    /// Use [`collect`](Self::collect) to follow the order.
    pub async fn sign(&self, payload: &SignPayload) -> Result<SignResponse> {
        let response = self.call(Request::Sign(payload)).await?;
        Ok(response.into_sign()?)
    }

    /// Queries the current state of an order, once.
    ///
    /// While the returned status is pending, call again every
    /// [`COLLECT_INTERVAL`]. Stop when it is complete or failed; the endpoint
    /// rejects further collects of a finished order. On [`Error::Timeout`] the
    /// state is unknown and the order must be collected again.
    pub async fn collect(&self, payload: &CollectPayload) -> Result<CollectResponse> {
        let response = self.call(Request::Collect(payload)).await?;
        Ok(response.into_collect()?)
    }

    /// Cancels a pending order.
    ///
    /// Best effort: if the order reached a final state first, the endpoint
    /// answers with an [`Error::Remote`].
    pub async fn cancel(&self, payload: &CancelPayload) -> Result<CancelResponse> {
        let response = self.call(Request::Cancel(payload)).await?;
        Ok(response.into_cancel()?)
    }

    /// Validates, ensures the session, dispatches and decodes a single request.
    ///
    /// Performs at most one network attempt.
    #[instrument(skip(self, request), fields(operation = %request.operation()))]
    async fn call(&self, request: Request<'_>) -> Result<Response> {
        let operation = request.operation();
        let timeout = self.config.timeout;
        let deadline = Instant::now() + timeout;

        request.validate().map_err(ValidationError::from)?;
        let body = request
            .to_body()
            .map_err(|source| ProtocolError::Encode { operation, source })?;

        let exchange = async {
            let transport = self.session.get_or_connect(&self.connector).await?;
            Ok::<_, Error>(transport.post(operation, body).await?)
        };

        let raw = match timeout_at(deadline, exchange).await {
            Ok(result) => result?,
            Err(_) => {
                warn!(?timeout, "Deadline expired before a response arrived");
                return Err(Error::Timeout { operation, timeout });
            }
        };

        decode(request, raw)
    }
}

fn decode(request: Request<'_>, raw: RawResponse) -> Result<Response> {
    let operation = request.operation();

    if raw.is_success() {
        let response = Response::decode(operation, &raw.body)?;
        debug!(status = raw.status, "Call succeeded");
        return Ok(response);
    }

    match serde_json::from_slice::<ErrorResponse>(&raw.body) {
        Ok(error) => {
            debug!(status = raw.status, code = %error.error_code, "Call rejected");
            Err(Error::Remote {
                operation,
                status: raw.status,
                error,
            })
        }
        Err(_) => Err(ProtocolError::UnexpectedStatus {
            operation,
            status: raw.status,
            body: String::from_utf8_lossy(&raw.body).into_owned(),
        }
        .into()),
    }
}
