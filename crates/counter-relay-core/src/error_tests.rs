//! Tests for relay error types.

use super::*;

#[test]
fn test_malformed_payload_quotes_the_body() {
    let error = RelayError::MalformedPayload {
        queue: "A".to_string(),
        body: "abc".to_string(),
    };
    assert_eq!(
        error.to_string(),
        "Malformed payload on queue A: \"abc\" is not a non-negative decimal integer"
    );
}

#[test]
fn test_invalid_queue_name_keeps_its_source() {
    let source = queue_runtime::QueueName::new("not valid".to_string()).unwrap_err();
    let error = RelayError::InvalidQueueName {
        name: "not valid".to_string(),
        source,
    };
    assert!(error.to_string().starts_with("Invalid queue name 'not valid'"));
    assert!(std::error::Error::source(&error).is_some());
}

#[test]
fn test_config_error_names_the_field() {
    let error = ConfigError::InvalidValue {
        field: "relay.max_messages".to_string(),
        message: "must be between 1 and 10".to_string(),
    };
    assert_eq!(
        error.to_string(),
        "Invalid value for relay.max_messages: must be between 1 and 10"
    );
}
