//! Interface to the accessory object graph owned by the application

use super::connection::ConnectionId;
use super::status::{CharacteristicError, HapStatus};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// `aid.iid` address of a characteristic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CharacteristicId {
    pub aid: u64,
    pub iid: u64,
}

impl CharacteristicId {
    #[must_use]
    pub fn new(aid: u64, iid: u64) -> Self {
        Self { aid, iid }
    }
}

impl fmt::Display for CharacteristicId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.aid, self.iid)
    }
}

impl FromStr for CharacteristicId {
    type Err = HapStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (aid, iid) = s
            .split_once('.')
            .ok_or(HapStatus::InvalidValueInRequest)?;
        Ok(Self {
            aid: aid
                .trim()
                .parse()
                .map_err(|_| HapStatus::InvalidValueInRequest)?,
            iid: iid
                .trim()
                .parse()
                .map_err(|_| HapStatus::InvalidValueInRequest)?,
        })
    }
}

/// Characteristic permission flags as they appear in HAP JSON
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Perm {
    #[serde(rename = "pr")]
    PairedRead,
    #[serde(rename = "pw")]
    PairedWrite,
    #[serde(rename = "ev")]
    Notify,
    #[serde(rename = "aa")]
    AdditionalAuthorization,
    #[serde(rename = "tw")]
    TimedWrite,
    #[serde(rename = "hd")]
    Hidden,
    #[serde(rename = "wr")]
    WriteResponse,
}

/// Operation that may be restricted to admin controllers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Access {
    Read,
    Write,
    Notify,
}

/// Optional metadata returned for `meta=1`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacteristicMeta {
    pub format: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_step: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_len: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_values: Option<Vec<i64>>,
}

/// Static description of one characteristic
#[derive(Debug, Clone, PartialEq)]
pub struct CharacteristicInfo {
    /// Short or full UUID type
    pub char_type: String,
    pub perms: Vec<Perm>,
    /// Operations only admin controllers may perform
    pub admin_only: Vec<Access>,
    pub meta: CharacteristicMeta,
}

impl CharacteristicInfo {
    #[must_use]
    pub fn new(char_type: impl Into<String>, format: impl Into<String>, perms: &[Perm]) -> Self {
        Self {
            char_type: char_type.into(),
            perms: perms.to_vec(),
            admin_only: Vec::new(),
            meta: CharacteristicMeta {
                format: format.into(),
                ..CharacteristicMeta::default()
            },
        }
    }

    /// Restrict an operation to admin controllers
    #[must_use]
    pub fn with_admin_only(mut self, access: Access) -> Self {
        if !self.admin_only.contains(&access) {
            self.admin_only.push(access);
        }
        self
    }

    #[must_use]
    pub fn has_perm(&self, perm: Perm) -> bool {
        self.perms.contains(&perm)
    }

    #[must_use]
    pub fn is_admin_only(&self, access: Access) -> bool {
        self.admin_only.contains(&access)
    }
}

/// Who is asking, passed to every read and write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    /// Originating connection, excluded from the resulting change event
    pub connection: ConnectionId,
    /// Verified controller, absent on insecure connections
    pub username: Option<String>,
    pub is_admin: bool,
}

/// `POST /resource` body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aid: Option<u64>,
    #[serde(rename = "resource-type")]
    pub resource_type: String,
    #[serde(rename = "image-width")]
    pub image_width: u32,
    #[serde(rename = "image-height")]
    pub image_height: u32,
}

/// The application's accessory database
///
/// Every read and write may suspend; the server joins them per batch.
#[async_trait]
pub trait AccessoryGraph: Send + Sync {
    /// Full `{"accessories": [...]}` document
    async fn accessories(&self) -> Result<Value, CharacteristicError>;

    /// Resolve a characteristic address
    fn characteristic(&self, id: CharacteristicId) -> Option<CharacteristicInfo>;

    /// Read the current value
    async fn read(&self, id: CharacteristicId, ctx: &RequestContext)
    -> Result<Value, CharacteristicError>;

    /// Write a value, returning the write-response value if the
    /// characteristic produces one
    async fn write(
        &self,
        id: CharacteristicId,
        value: Value,
        ctx: &RequestContext,
    ) -> Result<Option<Value>, CharacteristicError>;

    /// Run the identify routine
    async fn identify(&self) -> Result<(), CharacteristicError> {
        Ok(())
    }

    /// JPEG snapshot for a camera accessory
    async fn snapshot(&self, request: &ResourceRequest) -> Result<Vec<u8>, CharacteristicError> {
        let _ = request;
        Err(CharacteristicError::Status(HapStatus::ResourceDoesNotExist))
    }

    /// A connection subscribed to `id`; called once per subscribing connection
    async fn subscribe(&self, id: CharacteristicId) {
        let _ = id;
    }

    /// A connection unsubscribed from `id` or closed
    async fn unsubscribe(&self, id: CharacteristicId) {
        let _ = id;
    }
}
