//! Asynchronous vCD client and the conditional-write XML request executor.

use crate::models::ConcurrencyToken;
use crate::Result;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE, ETAG, IF_MATCH};
use reqwest::{Client, ClientBuilder, Method, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};
use vcd_core::client::ClientConfig;
use vcd_core::config::VcdClientConfig;
use vcd_core::xml::{from_xml_str, to_xml_document};
use vcd_core::{ApiError, Error};
use url::Url;

const USER_AGENT: &str = concat!("vcd-dfw/", env!("CARGO_PKG_VERSION"));

/// Media type sent in both `Accept` and `Content-Type`.
pub const XML_MEDIA_TYPE: &str = "application/xml;charset=UTF-8";

/// Placeholder the error message template must contain exactly once.
pub const ERROR_PLACEHOLDER: &str = "{}";

/// Builder for [`VcdClient`].
#[derive(Debug, Clone)]
pub struct VcdClientBuilder {
    base_url: Url,
    http_config: ClientConfig,
    user_agent: String,
    api_version: Option<String>,
    token: Option<Arc<SecretString>>,
    tls_verify: bool,
}

impl VcdClientBuilder {
    /// Create a builder for the given base endpoint (e.g. `https://vcd.example.com/api`).
    pub fn new(base_url: impl AsRef<str>) -> Result<Self> {
        let url = Url::parse(base_url.as_ref()).map_err(|err| {
            Error::ConfigError(format!(
                "Invalid vCD base URL `{}`: {err}",
                base_url.as_ref()
            ))
        })?;

        Ok(Self {
            base_url: url,
            http_config: ClientConfig::new(),
            user_agent: USER_AGENT.to_string(),
            api_version: None,
            token: None,
            tls_verify: true,
        })
    }

    /// Create a builder from a validated [`VcdClientConfig`].
    pub fn from_config(config: &VcdClientConfig) -> Result<Self> {
        let mut builder = Self {
            base_url: config.parse_endpoint()?,
            http_config: ClientConfig::new().with_timeout(config.timeout()),
            user_agent: USER_AGENT.to_string(),
            api_version: config.api_version.clone(),
            token: None,
            tls_verify: config.tls_verify,
        };
        if let Some(user_agent) = &config.user_agent {
            builder.user_agent.clone_from(user_agent);
        }
        Ok(builder)
    }

    /// Override the HTTP client configuration.
    #[must_use]
    pub fn with_http_config(mut self, config: ClientConfig) -> Self {
        self.http_config = config;
        self
    }

    /// Override the user agent.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Advertise an API version (`;version=<v>` on the `Accept` header).
    #[must_use]
    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = Some(version.into());
        self
    }

    /// Send an already established session token as `Authorization: Bearer`.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(Arc::new(SecretString::from(token.into())));
        self
    }

    /// Enable or disable TLS certificate verification.
    #[must_use]
    pub const fn with_tls_verify(mut self, verify: bool) -> Self {
        self.tls_verify = verify;
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<VcdClient> {
        let mut builder = ClientBuilder::new()
            .timeout(self.http_config.timeout)
            .user_agent(self.user_agent)
            .pool_idle_timeout(self.http_config.pool_idle_timeout)
            .pool_max_idle_per_host(self.http_config.pool_max_idle_per_host)
            .connect_timeout(self.http_config.connect_timeout);

        if !self.http_config.enable_compression {
            builder = builder.no_gzip();
        }

        if !self.tls_verify {
            warn!("TLS verification disabled for vCD client");
            builder = builder.danger_accept_invalid_certs(true);
        }

        let http = builder
            .build()
            .map_err(|err| Error::ConfigError(format!("Failed to build vCD HTTP client: {err}")))?;

        let accept = match &self.api_version {
            Some(version) => format!("{XML_MEDIA_TYPE};version={version}"),
            None => XML_MEDIA_TYPE.to_string(),
        };

        Ok(VcdClient {
            http,
            base_url: self.base_url,
            accept,
            token: self.token,
        })
    }
}

/// Asynchronous vCD client.
///
/// Resolves API paths against the base endpoint and executes XML requests.
/// Every call is a single request/response exchange; nothing is retried.
#[derive(Clone)]
pub struct VcdClient {
    http: Client,
    base_url: Url,
    accept: String,
    token: Option<Arc<SecretString>>,
}

impl VcdClient {
    /// Construct a client directly from the base endpoint.
    pub fn new(base_url: impl AsRef<str>) -> Result<Self> {
        VcdClientBuilder::new(base_url)?.build()
    }

    /// Start a builder for the given base endpoint.
    pub fn builder(base_url: impl AsRef<str>) -> Result<VcdClientBuilder> {
        VcdClientBuilder::new(base_url)
    }

    /// Return the base URL.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolve a relative path (with optional query) against the base URL.
    ///
    /// A leading `/` resolves from the host root.
    pub fn resolve(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|err| Error::InvalidEndpoint(format!("Invalid vCD path `{path}`: {err}")))
    }

    /// Execute a request without decoding the response body.
    ///
    /// The body is still consumed so the connection is released; a failure
    /// while doing so is returned even if the status was fine.
    pub async fn execute(&self, request: XmlRequest) -> Result<XmlResponse> {
        let (response, _) = self.send(request).await?;
        Ok(response)
    }

    /// Execute a request and decode a successful, non-empty body into `R`.
    ///
    /// Non-success statuses (other than `400`) are returned undecoded for the
    /// caller to interpret.
    pub async fn execute_decoded<R>(&self, request: XmlRequest) -> Result<(XmlResponse, Option<R>)>
    where
        R: DeserializeOwned,
    {
        let (response, body) = self.send(request).await?;

        if !response.status.is_success() || body.trim().is_empty() {
            return Ok((response, None));
        }

        let decoded = from_xml_str(&body)?;
        Ok((response, Some(decoded)))
    }

    async fn send(&self, request: XmlRequest) -> Result<(XmlResponse, String)> {
        let template = ErrorTemplate::parse(&request.error_message)?;
        let headers = self.headers_for(&request)?;

        let XmlRequest {
            method,
            url,
            payload,
            ..
        } = request;

        let mut builder = self.http.request(method.clone(), url.clone()).headers(headers);
        if let Some(body) = payload {
            if is_write(&method) {
                builder = builder.body(body);
            } else {
                debug!(%method, "Dropping XML payload on non-write request");
            }
        }

        info!(%method, %url, "vCD request");

        let response = builder
            .send()
            .await
            .map_err(|err| Error::from_transport(&err, template.fill(&err)))?;

        let status = response.status();
        let headers = response.headers().clone();
        debug!(%method, %url, %status, "vCD response");

        let body = response
            .text()
            .await
            .map_err(|err| Error::HttpError(format!("error consuming response body: {err}")))?;

        if status == StatusCode::BAD_REQUEST {
            if body.trim().is_empty() {
                return Err(Error::BadRequest(status.to_string()));
            }
            return Err(match from_xml_str::<ApiError>(&body) {
                Ok(api_error) => Error::Api(api_error),
                Err(err) => {
                    debug!(%method, %url, "Undecodable 400 error document: {err}");
                    Error::BadRequest(format!("{status}: {}", body.trim()))
                }
            });
        }

        Ok((XmlResponse { status, headers }, body))
    }

    fn headers_for(&self, request: &XmlRequest) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(IF_MATCH, header_value("If-Match", request.if_match.as_str())?);
        headers.insert(ACCEPT, header_value("Accept", &self.accept)?);
        headers.insert(
            CONTENT_TYPE,
            header_value(
                "Content-Type",
                request.content_type.as_deref().unwrap_or(XML_MEDIA_TYPE),
            )?,
        );

        if let Some(token) = &self.token {
            let mut value =
                header_value("Authorization", &format!("Bearer {}", token.expose_secret()))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        Ok(headers)
    }
}

fn header_value(name: &str, value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|err| Error::InvalidRequest(format!("Invalid {name} header value: {err}")))
}

fn is_write(method: &Method) -> bool {
    *method == Method::POST || *method == Method::PUT
}

/// A single XML request to the vCD API.
///
/// The `If-Match` header is always sent; it defaults to the unconditional
/// (empty) token.
#[derive(Debug, Clone)]
pub struct XmlRequest {
    method: Method,
    url: Url,
    error_message: String,
    if_match: ConcurrencyToken,
    content_type: Option<String>,
    payload: Option<String>,
}

impl XmlRequest {
    /// Create a request.
    ///
    /// `error_message` is used to wrap transport failures and must contain
    /// exactly one `{}` placeholder; this is checked when the request is
    /// executed, before anything is sent.
    #[must_use]
    pub fn new(method: Method, url: Url, error_message: impl Into<String>) -> Self {
        Self {
            method,
            url,
            error_message: error_message.into(),
            if_match: ConcurrencyToken::unconditional(),
            content_type: None,
            payload: None,
        }
    }

    /// Set the concurrency token sent as `If-Match`.
    #[must_use]
    pub fn with_if_match(mut self, token: ConcurrencyToken) -> Self {
        self.if_match = token;
        self
    }

    /// Override the `Content-Type` header. The override replaces the default
    /// XML media type; both are never sent together.
    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Encode `payload` as the XML body. Only sent for `POST` and `PUT`.
    pub fn with_payload<P>(mut self, payload: &P) -> Result<Self>
    where
        P: Serialize + ?Sized,
    {
        self.payload = Some(to_xml_document(payload)?);
        Ok(self)
    }

    /// HTTP method.
    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Target URL.
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Encoded XML body, if any.
    #[must_use]
    pub fn payload(&self) -> Option<&str> {
        self.payload.as_deref()
    }
}

/// Status and headers of an executed request. The body has already been
/// consumed.
#[derive(Debug, Clone)]
pub struct XmlResponse {
    status: StatusCode,
    headers: HeaderMap,
}

impl XmlResponse {
    /// HTTP status.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Response headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// The `ETag` header as a concurrency token, if present and valid UTF-8.
    #[must_use]
    pub fn etag(&self) -> Option<ConcurrencyToken> {
        self.headers
            .get(ETAG)
            .and_then(|value| value.to_str().ok())
            .map(ConcurrencyToken::from)
    }

    /// Build the error for a status the calling operation does not handle.
    #[must_use]
    pub fn unexpected_status(&self, context: impl Into<String>) -> Error {
        Error::UnexpectedStatus {
            context: context.into(),
            status: self.status.as_u16(),
            status_text: self.status.to_string(),
        }
    }
}

struct ErrorTemplate<'a>(&'a str);

impl<'a> ErrorTemplate<'a> {
    fn parse(message: &'a str) -> Result<Self> {
        if message.matches(ERROR_PLACEHOLDER).count() != 1 {
            return Err(Error::InvalidRequest(format!(
                "error message `{message}` has to include exactly one `{ERROR_PLACEHOLDER}` placeholder for the error"
            )));
        }
        Ok(Self(message))
    }

    fn fill(&self, err: &reqwest::Error) -> String {
        self.0.replacen(ERROR_PLACEHOLDER, &err.to_string(), 1)
    }
}
