//! AWS SQS provider implementation using the HTTP query API.
//!
//! Requests are form-encoded `POST`s against the configured endpoint, signed
//! with AWS Signature Version 4, and answered with XML documents that are
//! parsed with `quick-xml`. Any SQS-compatible endpoint works, which is how
//! LocalStack is used during development.
//!
//! ## Supported actions
//!
//! - `ListQueues` (health check)
//! - `GetQueueUrl` / `CreateQueue` (queue resolution)
//! - `SendMessage`, `ReceiveMessage`, `DeleteMessage`
//!
//! Message bodies travel as plain text so that other SQS clients sharing the
//! queues read the same payloads.
//!
//! ## Example
//!
//! ```no_run
//! use queue_runtime::{AwsSqsConfig, QueueClientFactory, ProviderConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ProviderConfig::AwsSqs(AwsSqsConfig {
//!     endpoint: Some("http://localhost:4566".to_string()),
//!     ..Default::default()
//! });
//!
//! let provider = QueueClientFactory::connect(&config).await?;
//! # Ok(())
//! # }
//! ```

use crate::client::QueueProvider;
use crate::error::{QueueError, SerializationError};
use crate::message::{
    Message, MessageId, QueueName, QueueUrl, ReceiptHandle, ReceivedMessage,
};
use crate::provider::{AwsSqsConfig, ProviderType};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use reqwest::Client as HttpClient;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, trace};

#[cfg(test)]
#[path = "aws_tests.rs"]
mod tests;

const SQS_API_VERSION: &str = "2012-11-05";

/// Longest long-poll wait SQS accepts
const MAX_WAIT_SECONDS: i64 = 20;

/// Failures specific to talking to SQS over HTTP
#[derive(Debug, thiserror::Error)]
pub enum AwsError {
    #[error("SQS rejected the credentials: {0}")]
    Unauthorized(String),

    #[error("Could not reach SQS: {0}")]
    Transport(String),

    #[error("SQS returned {code}: {message}")]
    Sqs { code: String, message: String },

    #[error("SQS has no queue {0}")]
    NoSuchQueue(String),

    #[error("SQS no longer accepts receipt {0}")]
    StaleReceipt(String),

    #[error("Message of {size} bytes exceeds the SQS limit of {max_size}")]
    MessageTooLarge { size: usize, max_size: usize },

    #[error("Invalid SQS configuration: {0}")]
    InvalidConfig(String),

    #[error("Unreadable SQS response: {0}")]
    UnreadableResponse(String),
}

impl From<AwsError> for QueueError {
    fn from(error: AwsError) -> Self {
        match error {
            AwsError::Unauthorized(message) => Self::AuthenticationFailed { message },
            AwsError::Transport(message) => Self::BackendUnavailable { message },
            AwsError::Sqs { code, message } => Self::ProviderFailure {
                provider: ProviderType::AwsSqs.to_string(),
                code,
                message,
            },
            AwsError::NoSuchQueue(queue) => Self::QueueNotFound { queue },
            AwsError::StaleReceipt(receipt) => Self::ReceiptNotFound { receipt },
            AwsError::MessageTooLarge { size, max_size } => {
                Self::MessageTooLarge { size, max_size }
            }
            AwsError::InvalidConfig(message) => Self::Configuration { message },
            AwsError::UnreadableResponse(message) => {
                SerializationError::MalformedResponse { message }.into()
            }
        }
    }
}

// ============================================================================
// Request signing
// ============================================================================

type HmacSha256 = Hmac<Sha256>;

const SIGNING_ALGORITHM: &str = "AWS4-HMAC-SHA256";
const SIGNED_HEADERS: &str = "host;x-amz-date";

/// Signs form-encoded SQS requests with AWS Signature Version 4
///
/// Only `host` and `x-amz-date` are signed. Action parameters travel in the
/// body, so they are covered by the payload hash and the canonical query
/// string stays empty.
#[derive(Clone)]
struct RequestSigner {
    access_key: String,
    secret_key: String,
    region: String,
}

impl RequestSigner {
    fn new(access_key: String, secret_key: String, region: String) -> Self {
        Self {
            access_key,
            secret_key,
            region,
        }
    }

    /// Headers to attach to a request: `Authorization`, `x-amz-date`, `host`
    fn sign_request(
        &self,
        method: &str,
        host: &str,
        path: &str,
        body: &str,
        timestamp: &DateTime<Utc>,
    ) -> HashMap<String, String> {
        let day = timestamp.format("%Y%m%d").to_string();
        let amz_date = timestamp.format("%Y%m%dT%H%M%SZ").to_string();
        let scope = format!("{}/{}/sqs/aws4_request", day, self.region);

        let canonical_request = [
            method.to_string(),
            path.to_string(),
            String::new(),
            format!("host:{}\nx-amz-date:{}\n", host, amz_date),
            SIGNED_HEADERS.to_string(),
            sha256_hex(body.as_bytes()),
        ]
        .join("\n");

        let string_to_sign = [
            SIGNING_ALGORITHM,
            &amz_date,
            &scope,
            &sha256_hex(canonical_request.as_bytes()),
        ]
        .join("\n");

        let signature = hex::encode(hmac_sha256(
            &self.signing_key(&day),
            string_to_sign.as_bytes(),
        ));

        HashMap::from([
            (
                "Authorization".to_string(),
                format!(
                    "{} Credential={}/{}, SignedHeaders={}, Signature={}",
                    SIGNING_ALGORITHM, self.access_key, scope, SIGNED_HEADERS, signature
                ),
            ),
            ("x-amz-date".to_string(), amz_date),
            ("host".to_string(), host.to_string()),
        ])
    }

    /// Key for one day, region and service, derived from the secret
    fn signing_key(&self, day: &str) -> Vec<u8> {
        [self.region.as_bytes(), b"sqs", b"aws4_request"].iter().fold(
            hmac_sha256(format!("AWS4{}", self.secret_key).as_bytes(), day.as_bytes()),
            |key, part| hmac_sha256(&key, part),
        )
    }
}

fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

// ============================================================================
// AWS SQS Provider
// ============================================================================

/// AWS SQS queue provider implementation
///
/// ## Thread Safety
///
/// The provider is thread-safe and can be shared across async tasks using `Arc`.
/// The queue URL cache is protected by `RwLock`.
pub struct AwsSqsProvider {
    http_client: HttpClient,
    signer: Option<RequestSigner>,
    config: AwsSqsConfig,
    endpoint: String,
    host: String,
    /// Absolute URL requests are posted to; its path is what gets signed
    request_url: url::Url,
    queue_url_cache: Arc<RwLock<HashMap<QueueName, QueueUrl>>>,
}

impl AwsSqsProvider {
    /// Create new AWS SQS provider
    ///
    /// No network traffic happens here; use [`QueueProvider::health_check`]
    /// to probe the endpoint.
    ///
    /// # Errors
    ///
    /// Returns error if the region is empty, the endpoint is not an HTTP(S)
    /// URL or carries a query, or the HTTP client cannot be built.
    pub fn new(config: AwsSqsConfig) -> Result<Self, AwsError> {
        if config.region.is_empty() {
            return Err(AwsError::InvalidConfig(
                "Region cannot be empty".to_string(),
            ));
        }

        let endpoint = config.endpoint_url();
        let parsed = url::Url::parse(&endpoint).map_err(|e| {
            AwsError::InvalidConfig(format!("Invalid endpoint {}: {}", endpoint, e))
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(AwsError::InvalidConfig(format!(
                "Endpoint must be an http(s) URL: {}",
                endpoint
            )));
        }
        if parsed.query().is_some() || parsed.fragment().is_some() {
            return Err(AwsError::InvalidConfig(format!(
                "Endpoint cannot carry a query or fragment: {}",
                endpoint
            )));
        }
        let host = match (parsed.host_str(), parsed.port()) {
            (Some(host), Some(port)) => format!("{}:{}", host, port),
            (Some(host), None) => host.to_string(),
            (None, _) => {
                return Err(AwsError::InvalidConfig(format!(
                    "Endpoint has no host: {}",
                    endpoint
                )))
            }
        };

        let signer = match (&config.access_key_id, &config.secret_access_key) {
            (Some(access_key), Some(secret_key)) => Some(RequestSigner::new(
                access_key.clone(),
                secret_key.clone(),
                config.region.clone(),
            )),
            _ => None,
        };

        let http_client = HttpClient::builder()
            .timeout(std::time::Duration::from_secs(
                config.request_timeout_seconds,
            ))
            .build()
            .map_err(|e| AwsError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            signer,
            config,
            endpoint,
            host,
            request_url: parsed,
            queue_url_cache: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    /// Endpoint host (and port), as used in the signed `host` header
    fn host(&self) -> &str {
        &self.host
    }

    /// Make a signed query API call and return the response body
    async fn call(&self, action: &str, params: BTreeMap<&str, String>) -> Result<String, AwsError> {
        let signer = self
            .signer
            .as_ref()
            .ok_or_else(|| AwsError::Unauthorized("No credentials configured".to_string()))?;

        let mut form = params;
        form.insert("Action", action.to_string());
        form.insert("Version", SQS_API_VERSION.to_string());
        let body = form
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");

        let auth_headers = signer.sign_request(
            "POST",
            self.host(),
            self.request_url.path(),
            &body,
            &Utc::now(),
        );

        let mut request = self
            .http_client
            .post(self.request_url.clone())
            .header("content-type", "application/x-www-form-urlencoded")
            .body(body);
        for (key, value) in auth_headers {
            request = request.header(key, value);
        }

        trace!(action, endpoint = %self.endpoint, "Calling SQS");
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                AwsError::Transport(format!("Request timeout: {}", e))
            } else if e.is_connect() {
                AwsError::Transport(format!("Connection failed: {}", e))
            } else {
                AwsError::Transport(format!("HTTP request failed: {}", e))
            }
        })?;

        let status = response.status();
        let response_body = response
            .text()
            .await
            .map_err(|e| AwsError::Transport(format!("Failed to read response body: {}", e)))?;

        if !status.is_success() {
            return Err(parse_error_response(&response_body, status.as_u16()));
        }

        Ok(response_body)
    }

    async fn cache_queue_url(&self, queue: &QueueName, url: &QueueUrl) {
        let mut cache = self.queue_url_cache.write().await;
        cache.insert(queue.clone(), url.clone());
    }
}

impl fmt::Debug for AwsSqsProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AwsSqsProvider")
            .field("endpoint", &self.endpoint)
            .field("region", &self.config.region)
            .field("credentials", &self.signer.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[async_trait]
impl QueueProvider for AwsSqsProvider {
    async fn health_check(&self) -> Result<(), QueueError> {
        self.call("ListQueues", BTreeMap::new())
            .await
            .map(|_| ())
            .map_err(QueueError::from)
    }

    async fn get_queue_url(&self, queue: &QueueName) -> Result<QueueUrl, QueueError> {
        {
            let cache = self.queue_url_cache.read().await;
            if let Some(url) = cache.get(queue) {
                return Ok(url.clone());
            }
        }

        let mut params = BTreeMap::new();
        params.insert("QueueName", queue.as_str().to_string());
        let response = self.call("GetQueueUrl", params).await?;
        let url = parse_queue_url_response(&response)?;

        self.cache_queue_url(queue, &url).await;
        Ok(url)
    }

    async fn create_queue(&self, queue: &QueueName) -> Result<QueueUrl, QueueError> {
        let mut params = BTreeMap::new();
        params.insert("QueueName", queue.as_str().to_string());
        let response = self.call("CreateQueue", params).await?;
        let url = parse_queue_url_response(&response)?;

        debug!(queue = %queue, url = %url, "SQS queue created or already present");
        self.cache_queue_url(queue, &url).await;
        Ok(url)
    }

    async fn send_message(
        &self,
        queue: &QueueUrl,
        message: &Message,
    ) -> Result<MessageId, QueueError> {
        let body =
            std::str::from_utf8(&message.body).map_err(|_| SerializationError::InvalidUtf8)?;

        let max_size = ProviderType::AwsSqs.max_message_size();
        if body.len() > max_size {
            return Err(AwsError::MessageTooLarge {
                size: body.len(),
                max_size,
            }
            .into());
        }

        let mut params = BTreeMap::new();
        params.insert("QueueUrl", queue.as_str().to_string());
        params.insert("MessageBody", body.to_string());

        let response = self.call("SendMessage", params).await?;

        parse_send_message_response(&response).map_err(QueueError::from)
    }

    async fn receive_messages(
        &self,
        queue: &QueueUrl,
        max_messages: u32,
        wait: Duration,
    ) -> Result<Vec<ReceivedMessage>, QueueError> {
        let wait_time_seconds = wait.num_seconds().clamp(0, MAX_WAIT_SECONDS);

        let mut params = BTreeMap::new();
        params.insert("QueueUrl", queue.as_str().to_string());
        params.insert(
            "MaxNumberOfMessages",
            max_messages.clamp(1, self.max_batch_size()).to_string(),
        );
        params.insert("WaitTimeSeconds", wait_time_seconds.to_string());
        params.insert("AttributeName.1", "All".to_string());

        let response = self.call("ReceiveMessage", params).await?;

        parse_receive_message_response(&response).map_err(QueueError::from)
    }

    async fn delete_message(
        &self,
        queue: &QueueUrl,
        receipt: &ReceiptHandle,
    ) -> Result<(), QueueError> {
        let mut params = BTreeMap::new();
        params.insert("QueueUrl", queue.as_str().to_string());
        params.insert("ReceiptHandle", receipt.handle().to_string());

        // DeleteMessage returns an empty result on success
        self.call("DeleteMessage", params)
            .await
            .map(|_| ())
            .map_err(QueueError::from)
    }

    fn provider_type(&self) -> ProviderType {
        ProviderType::AwsSqs
    }
}

// ============================================================================
// XML Response Parsing
// ============================================================================

/// Text content of the first element named `tag`
fn first_element_text(xml: &str, tag: &[u8]) -> Result<Option<String>, AwsError> {
    use quick_xml::events::Event;
    use quick_xml::Reader;

    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut inside = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.name().as_ref() == tag => inside = true,
            Ok(Event::Text(e)) if inside => {
                return e.unescape().map(|s| Some(s.into_owned())).map_err(|e| {
                    AwsError::UnreadableResponse(format!("Failed to parse XML: {}", e))
                });
            }
            Ok(Event::Eof) => return Ok(None),
            Err(e) => {
                return Err(AwsError::UnreadableResponse(format!(
                    "XML parsing error: {}",
                    e
                )))
            }
            _ => {}
        }
        buf.clear();
    }
}

/// Parse a GetQueueUrl or CreateQueue response
fn parse_queue_url_response(xml: &str) -> Result<QueueUrl, AwsError> {
    first_element_text(xml, b"QueueUrl")?
        .map(QueueUrl::new)
        .ok_or_else(|| AwsError::UnreadableResponse("QueueUrl not found in response".to_string()))
}

/// Parse a SendMessage response
fn parse_send_message_response(xml: &str) -> Result<MessageId, AwsError> {
    let id = first_element_text(xml, b"MessageId")?.ok_or_else(|| {
        AwsError::UnreadableResponse("MessageId not found in response".to_string())
    })?;
    MessageId::from_str(&id).map_err(|e| AwsError::UnreadableResponse(e.to_string()))
}

/// Parse error response from XML
fn parse_error_response(xml: &str, status_code: u16) -> AwsError {
    let code = first_element_text(xml, b"Code")
        .ok()
        .flatten()
        .unwrap_or_else(|| "Unknown".to_string());
    let message = first_element_text(xml, b"Message")
        .ok()
        .flatten()
        .unwrap_or_else(|| format!("HTTP status {}", status_code));

    match code.as_str() {
        "AWS.SimpleQueueService.NonExistentQueue" | "QueueDoesNotExist" => {
            AwsError::NoSuchQueue(message)
        }
        "InvalidClientTokenId" | "UnrecognizedClientException" | "SignatureDoesNotMatch" => {
            AwsError::Unauthorized(format!("{}: {}", code, message))
        }
        "InvalidReceiptHandle" | "ReceiptHandleIsInvalid" => AwsError::StaleReceipt(message),
        _ if status_code == 401 || status_code == 403 => {
            AwsError::Unauthorized(format!("{}: {}", code, message))
        }
        _ => AwsError::Sqs { code, message },
    }
}

/// Parse ReceiveMessage XML response
fn parse_receive_message_response(xml: &str) -> Result<Vec<ReceivedMessage>, AwsError> {
    use quick_xml::events::Event;
    use quick_xml::Reader;

    #[derive(Default)]
    struct Pending {
        message_id: Option<String>,
        receipt_handle: Option<String>,
        body: Option<String>,
        delivery_count: Option<u32>,
    }

    #[derive(Clone, Copy, PartialEq)]
    enum Field {
        None,
        MessageId,
        ReceiptHandle,
        Body,
        AttributeName,
        AttributeValue,
    }

    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut messages = Vec::new();
    let mut current: Option<Pending> = None;
    let mut field = Field::None;
    let mut attribute_name: Option<String> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"Message" => current = Some(Pending::default()),
                b"MessageId" if current.is_some() => field = Field::MessageId,
                b"ReceiptHandle" if current.is_some() => field = Field::ReceiptHandle,
                b"Body" if current.is_some() => field = Field::Body,
                b"Name" if current.is_some() => field = Field::AttributeName,
                b"Value" if current.is_some() => field = Field::AttributeValue,
                _ => {}
            },
            Ok(Event::Text(e)) => {
                let text = e
                    .unescape()
                    .map(|s| s.into_owned())
                    .map_err(|e| AwsError::UnreadableResponse(format!("XML parsing error: {}", e)))?;
                if let Some(pending) = current.as_mut() {
                    match field {
                        Field::MessageId => pending.message_id = Some(text),
                        Field::ReceiptHandle => pending.receipt_handle = Some(text),
                        Field::Body => pending.body = Some(text),
                        Field::AttributeName => attribute_name = Some(text),
                        Field::AttributeValue => {
                            if attribute_name.as_deref() == Some("ApproximateReceiveCount") {
                                pending.delivery_count = text.parse().ok();
                            }
                            attribute_name = None;
                        }
                        Field::None => {}
                    }
                }
                field = Field::None;
            }
            Ok(Event::End(ref e)) => {
                if e.name().as_ref() == b"Message" {
                    if let Some(pending) = current.take() {
                        messages.push(build_received_message(
                            pending.message_id,
                            pending.receipt_handle,
                            pending.body,
                            pending.delivery_count,
                        )?);
                    }
                }
                field = Field::None;
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(AwsError::UnreadableResponse(format!(
                    "XML parsing error: {}",
                    e
                )))
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(messages)
}

fn build_received_message(
    message_id: Option<String>,
    receipt_handle: Option<String>,
    body: Option<String>,
    delivery_count: Option<u32>,
) -> Result<ReceivedMessage, AwsError> {
    let receipt_handle = receipt_handle.ok_or_else(|| {
        AwsError::UnreadableResponse("Message without ReceiptHandle in response".to_string())
    })?;

    let message_id = message_id
        .as_deref()
        .and_then(|id| MessageId::from_str(id).ok())
        .unwrap_or_else(MessageId::generate);

    Ok(ReceivedMessage {
        message_id,
        // An empty <Body/> produces no text event
        body: bytes::Bytes::from(body.unwrap_or_default()),
        receipt_handle: ReceiptHandle::new(receipt_handle),
        delivery_count: delivery_count.unwrap_or(1),
    })
}
