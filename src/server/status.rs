//! HAP status codes carried in JSON bodies

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Closed set of HAP status codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HapStatus {
    Success,
    InsufficientPrivileges,
    ServiceCommunicationFailure,
    ResourceBusy,
    ReadOnlyCharacteristic,
    WriteOnlyCharacteristic,
    NotificationNotSupported,
    OutOfResource,
    OperationTimedOut,
    ResourceDoesNotExist,
    InvalidValueInRequest,
    InsufficientAuthorization,
    NotAllowedInCurrentState,
}

impl HapStatus {
    const ALL: [Self; 13] = [
        Self::Success,
        Self::InsufficientPrivileges,
        Self::ServiceCommunicationFailure,
        Self::ResourceBusy,
        Self::ReadOnlyCharacteristic,
        Self::WriteOnlyCharacteristic,
        Self::NotificationNotSupported,
        Self::OutOfResource,
        Self::OperationTimedOut,
        Self::ResourceDoesNotExist,
        Self::InvalidValueInRequest,
        Self::InsufficientAuthorization,
        Self::NotAllowedInCurrentState,
    ];

    /// Numeric wire value
    #[must_use]
    pub fn code(self) -> i32 {
        match self {
            Self::Success => 0,
            Self::InsufficientPrivileges => -70401,
            Self::ServiceCommunicationFailure => -70402,
            Self::ResourceBusy => -70403,
            Self::ReadOnlyCharacteristic => -70404,
            Self::WriteOnlyCharacteristic => -70405,
            Self::NotificationNotSupported => -70406,
            Self::OutOfResource => -70407,
            Self::OperationTimedOut => -70408,
            Self::ResourceDoesNotExist => -70409,
            Self::InvalidValueInRequest => -70410,
            Self::InsufficientAuthorization => -70411,
            Self::NotAllowedInCurrentState => -70412,
        }
    }

    /// Look up a wire value
    #[must_use]
    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.code() == code)
    }

    #[must_use]
    pub fn is_success(self) -> bool {
        self == Self::Success
    }
}

impl Serialize for HapStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i32(self.code())
    }
}

impl<'de> Deserialize<'de> for HapStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = i32::deserialize(deserializer)?;
        Self::from_code(code)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown HAP status {code}")))
    }
}

/// `{"status": <code>}` body used for endpoint-level failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusBody {
    pub status: HapStatus,
}

impl From<HapStatus> for StatusBody {
    fn from(status: HapStatus) -> Self {
        Self { status }
    }
}

/// Error returned by accessory code outside the crate
#[derive(Debug, Clone, thiserror::Error)]
pub enum CharacteristicError {
    /// A specific HAP status, reported to the controller unchanged
    #[error("characteristic reported status {0:?}")]
    Status(HapStatus),

    /// Anything else
    #[error("characteristic failure: {0}")]
    Other(String),
}

impl CharacteristicError {
    /// Status reported to the controller
    ///
    /// Unrecognized failures collapse to `ServiceCommunicationFailure`.
    #[must_use]
    pub fn status(&self) -> HapStatus {
        match self {
            Self::Status(status) if !status.is_success() => *status,
            _ => HapStatus::ServiceCommunicationFailure,
        }
    }
}

impl From<HapStatus> for CharacteristicError {
    fn from(status: HapStatus) -> Self {
        Self::Status(status)
    }
}
