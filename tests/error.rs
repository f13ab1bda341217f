use std::path::PathBuf;

use ocwatch::error::{exit_codes, Error, JsonError};

#[test]
fn exit_codes_map_correctly() {
    let user = Error::MissingCredential("API_KEY");
    assert_eq!(user.exit_code(), exit_codes::USER_ERROR);

    let blocked = Error::LockFailed(PathBuf::from("run.lock"));
    assert_eq!(blocked.exit_code(), exit_codes::BLOCKED);

    let op = Error::PartialPersist(vec!["naughty".to_string()]);
    assert_eq!(op.exit_code(), exit_codes::OPERATION_FAILED);
}

#[test]
fn upstream_code_reaches_diagnostics() {
    let err = Error::Upstream {
        endpoint: "members".to_string(),
        message: "Incorrect key".to_string(),
        code: Some(2),
    };
    assert_eq!(err.diagnostic_code(), Some(2));
    assert_eq!(err.exit_code(), exit_codes::OPERATION_FAILED);
    assert_eq!(err.to_string(), "Upstream members request failed: Incorrect key");
}

#[test]
fn json_error_includes_code_and_details() {
    let err = Error::StoreWrite {
        store: "crimes".to_string(),
        message: "disk full".to_string(),
    };
    let json = JsonError::from(&err);
    assert_eq!(json.code, exit_codes::OPERATION_FAILED);
    assert!(json.error.contains("Store crimes write failed"));
    assert_eq!(json.details, Some(serde_json::json!({ "store": "crimes" })));
}
