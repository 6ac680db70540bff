//! Provider types and configuration.

use serde::{Deserialize, Serialize};

/// Endpoint of the SQS-compatible backend in the reference deployment.
pub const DEFAULT_SQS_ENDPOINT: &str = "http://localstack:4576";

/// Enumeration of supported queue providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProviderType {
    AwsSqs,
    InMemory,
}

impl ProviderType {
    /// Get maximum message size for provider
    pub fn max_message_size(&self) -> usize {
        match self {
            Self::AwsSqs => 256 * 1024,         // 256KB
            Self::InMemory => 10 * 1024 * 1024, // 10MB
        }
    }

    /// Get maximum number of messages a single receive may return
    pub fn max_batch_size(&self) -> u32 {
        match self {
            Self::AwsSqs => 10,
            Self::InMemory => 100,
        }
    }
}

impl std::fmt::Display for ProviderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AwsSqs => write!(f, "AwsSqs"),
            Self::InMemory => write!(f, "InMemory"),
        }
    }
}

/// Provider-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderConfig {
    AwsSqs(AwsSqsConfig),
    InMemory(InMemoryConfig),
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self::AwsSqs(AwsSqsConfig::default())
    }
}

impl ProviderConfig {
    pub fn provider_type(&self) -> ProviderType {
        match self {
            Self::AwsSqs(_) => ProviderType::AwsSqs,
            Self::InMemory(_) => ProviderType::InMemory,
        }
    }
}

/// AWS SQS configuration
///
/// `endpoint` points at any SQS-compatible service (LocalStack in development).
/// When absent the regional AWS endpoint is used.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AwsSqsConfig {
    pub region: String,
    pub endpoint: Option<String>,
    pub access_key_id: Option<String>,
    #[serde(skip_serializing)]
    pub secret_access_key: Option<String>,
    pub request_timeout_seconds: u64,
}

impl Default for AwsSqsConfig {
    fn default() -> Self {
        Self {
            region: "us-east-1".to_string(),
            endpoint: Some(DEFAULT_SQS_ENDPOINT.to_string()),
            // LocalStack accepts any static credentials
            access_key_id: Some("test".to_string()),
            secret_access_key: Some("test".to_string()),
            request_timeout_seconds: 30,
        }
    }
}

impl AwsSqsConfig {
    /// Resolved endpoint URL without a trailing slash
    pub fn endpoint_url(&self) -> String {
        match &self.endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => format!("https://sqs.{}.amazonaws.com", self.region),
        }
    }
}

/// In-memory provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InMemoryConfig {
    pub max_queue_size: usize,
    pub visibility_timeout_seconds: u64,
}

impl Default for InMemoryConfig {
    fn default() -> Self {
        Self {
            max_queue_size: 10000,
            // SQS default visibility timeout
            visibility_timeout_seconds: 30,
        }
    }
}

#[cfg(test)]
#[path = "provider_tests.rs"]
mod tests;
