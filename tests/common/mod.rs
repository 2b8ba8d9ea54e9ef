//! Common test utilities and fixtures
#![allow(dead_code)]

use std::sync::{Mutex, Once, OnceLock};

use async_trait::async_trait;
use hap_server::server::{
    AccessoryGraph, CharacteristicError, CharacteristicId, CharacteristicInfo, EventNotifier,
    Perm, RequestContext,
};
use serde_json::{Value, json};
use tracing_subscriber::{EnvFilter, fmt};

static INIT: Once = Once::new();

/// Initialize test logging (call once per test module)
pub fn init_logging() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::from_default_env().add_directive("hap_server=debug".parse().unwrap());

        fmt().with_env_filter(filter).with_test_writer().init();
    });
}

pub const NAME: CharacteristicId = CharacteristicId { aid: 1, iid: 9 };
pub const ON: CharacteristicId = CharacteristicId { aid: 1, iid: 10 };

/// One switch with a name and an on/off state
pub struct SwitchGraph {
    on: Mutex<bool>,
    notifier: OnceLock<EventNotifier>,
}

impl SwitchGraph {
    pub fn new() -> Self {
        Self {
            on: Mutex::new(false),
            notifier: OnceLock::new(),
        }
    }

    /// Hook up change notifications once the server exists
    pub fn attach(&self, notifier: EventNotifier) {
        let _ = self.notifier.set(notifier);
    }

    pub fn is_on(&self) -> bool {
        *self.on.lock().unwrap()
    }

    /// Flip the switch locally, as a physical button would
    pub fn press(&self) {
        let on = {
            let mut on = self.on.lock().unwrap();
            *on = !*on;
            *on
        };
        if let Some(notifier) = self.notifier.get() {
            notifier.notify_change(ON, json!(on), None);
        }
    }
}

#[async_trait]
impl AccessoryGraph for SwitchGraph {
    async fn accessories(&self) -> Result<Value, CharacteristicError> {
        Ok(json!({"accessories": [{
            "aid": 1,
            "services": [{
                "iid": 8,
                "type": "49",
                "characteristics": [
                    {"iid": 9, "type": "23", "format": "string", "perms": ["pr"], "value": "Switch"},
                    {"iid": 10, "type": "25", "format": "bool", "perms": ["pr", "pw", "ev"], "value": self.is_on()},
                ],
            }],
        }]}))
    }

    fn characteristic(&self, id: CharacteristicId) -> Option<CharacteristicInfo> {
        match id {
            NAME => Some(CharacteristicInfo::new("23", "string", &[Perm::PairedRead])),
            ON => Some(CharacteristicInfo::new(
                "25",
                "bool",
                &[Perm::PairedRead, Perm::PairedWrite, Perm::Notify],
            )),
            _ => None,
        }
    }

    async fn read(
        &self,
        id: CharacteristicId,
        _ctx: &RequestContext,
    ) -> Result<Value, CharacteristicError> {
        match id {
            NAME => Ok(json!("Switch")),
            _ => Ok(json!(self.is_on())),
        }
    }

    async fn write(
        &self,
        id: CharacteristicId,
        value: Value,
        ctx: &RequestContext,
    ) -> Result<Option<Value>, CharacteristicError> {
        let on = value
            .as_bool()
            .ok_or(hap_server::HapStatus::InvalidValueInRequest)?;
        *self.on.lock().unwrap() = on;
        if let Some(notifier) = self.notifier.get() {
            notifier.notify_change(id, value, Some(ctx.connection));
        }
        Ok(None)
    }
}
