use crate::server::status::{CharacteristicError, HapStatus, StatusBody};
use serde_json::json;

#[test]
fn test_codes() {
    assert_eq!(HapStatus::Success.code(), 0);
    assert_eq!(HapStatus::InsufficientPrivileges.code(), -70401);
    assert_eq!(HapStatus::ResourceDoesNotExist.code(), -70409);
    assert_eq!(HapStatus::NotAllowedInCurrentState.code(), -70412);
}

#[test]
fn test_from_code() {
    for code in -70412..=-70401 {
        let status = HapStatus::from_code(code).unwrap();
        assert_eq!(status.code(), code);
        assert!(!status.is_success());
    }
    assert_eq!(HapStatus::from_code(0), Some(HapStatus::Success));
    assert_eq!(HapStatus::from_code(-70400), None);
    assert_eq!(HapStatus::from_code(1), None);
}

#[test]
fn test_serde_as_integer() {
    assert_eq!(
        serde_json::to_value(StatusBody::from(HapStatus::InvalidValueInRequest)).unwrap(),
        json!({"status": -70410})
    );
    let body: StatusBody = serde_json::from_value(json!({"status": -70402})).unwrap();
    assert_eq!(body.status, HapStatus::ServiceCommunicationFailure);
    assert!(serde_json::from_value::<StatusBody>(json!({"status": 5})).is_err());
}

#[test]
fn test_characteristic_error_status() {
    assert_eq!(
        CharacteristicError::from(HapStatus::ResourceBusy).status(),
        HapStatus::ResourceBusy
    );
    assert_eq!(
        CharacteristicError::Other("boom".into()).status(),
        HapStatus::ServiceCommunicationFailure
    );
    // Success is not a failure status
    assert_eq!(
        CharacteristicError::Status(HapStatus::Success).status(),
        HapStatus::ServiceCommunicationFailure
    );
}
