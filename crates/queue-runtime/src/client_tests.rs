//! Tests for the provider factory and trait defaults.

use super::*;
use crate::provider::{AwsSqsConfig, InMemoryConfig};
use crate::QueueError;

#[test]
fn test_factory_builds_in_memory_provider() {
    let config = ProviderConfig::InMemory(InMemoryConfig::default());
    let provider = QueueClientFactory::create_provider(&config).unwrap();

    assert_eq!(provider.provider_type(), ProviderType::InMemory);
    assert_eq!(provider.max_batch_size(), 100);
}

#[test]
fn test_factory_builds_sqs_provider_without_network() {
    let config = ProviderConfig::AwsSqs(AwsSqsConfig {
        endpoint: Some("http://127.0.0.1:9".to_string()),
        ..Default::default()
    });
    let provider = QueueClientFactory::create_provider(&config).unwrap();

    assert_eq!(provider.provider_type(), ProviderType::AwsSqs);
    assert_eq!(provider.max_batch_size(), 10);
}

#[test]
fn test_factory_rejects_invalid_sqs_config() {
    let config = ProviderConfig::AwsSqs(AwsSqsConfig {
        region: String::new(),
        ..Default::default()
    });
    let result = QueueClientFactory::create_provider(&config);
    assert!(matches!(result, Err(QueueError::Configuration { .. })));
}

#[tokio::test]
async fn test_connect_runs_health_check() {
    let config = ProviderConfig::InMemory(InMemoryConfig::default());
    assert!(QueueClientFactory::connect(&config).await.is_ok());

    let unreachable = ProviderConfig::AwsSqs(AwsSqsConfig {
        endpoint: Some("http://127.0.0.1:9".to_string()),
        ..Default::default()
    });
    match QueueClientFactory::connect(&unreachable).await {
        Err(error) => assert!(error.is_transient(), "{}", error),
        Ok(_) => panic!("Expected the health check to fail"),
    }
}

#[tokio::test]
async fn test_in_memory_provider_starts_empty() {
    let config = ProviderConfig::InMemory(InMemoryConfig::default());
    let provider = QueueClientFactory::create_provider(&config).unwrap();
    let name = QueueName::new("A".to_string()).unwrap();
    assert!(matches!(
        provider.get_queue_url(&name).await,
        Err(QueueError::QueueNotFound { .. })
    ));
}
