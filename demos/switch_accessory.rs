//! Example: a single switch accessory
//!
//! Pairs with the default setup code `031-45-154`. The accessory identity is
//! kept in `./switch-identity.json` and pairings in `./switch-pairings.json`,
//! so a paired controller can reconnect after a restart.
//!
//! Advertising over mDNS is left to the host; point a controller at the
//! printed address, or use `HAP_INSECURE=1` and plain HTTP for poking at it:
//!
//! ```text
//! curl -X PUT -d '{"characteristics":[{"aid":1,"iid":10,"value":true}]}' \
//!     http://127.0.0.1:51826/characteristics
//! ```

use async_trait::async_trait;
use hap_server::FileStorage;
use hap_server::prelude::*;
use hap_server::server::{EventNotifier, Perm};
use serde_json::{Value, json};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

const ON: CharacteristicId = CharacteristicId { aid: 1, iid: 10 };
const NAME: CharacteristicId = CharacteristicId { aid: 1, iid: 9 };

struct Switch {
    on: AtomicBool,
    notifier: OnceLock<EventNotifier>,
}

#[async_trait]
impl AccessoryGraph for Switch {
    async fn accessories(&self) -> Result<Value, CharacteristicError> {
        Ok(json!({"accessories": [{
            "aid": 1,
            "services": [
                {
                    "iid": 1,
                    "type": "3E",
                    "characteristics": [
                        {"iid": 2, "type": "14", "format": "bool", "perms": ["pw"]},
                        {"iid": 3, "type": "20", "format": "string", "perms": ["pr"], "value": "hap-server"},
                        {"iid": 4, "type": "21", "format": "string", "perms": ["pr"], "value": "Switch1,1"},
                        {"iid": 5, "type": "23", "format": "string", "perms": ["pr"], "value": "Switch"},
                        {"iid": 6, "type": "30", "format": "string", "perms": ["pr"], "value": "0001"},
                        {"iid": 7, "type": "52", "format": "string", "perms": ["pr"], "value": "1.0.0"},
                    ],
                },
                {
                    "iid": 8,
                    "type": "49",
                    "primary": true,
                    "characteristics": [
                        {"iid": 9, "type": "23", "format": "string", "perms": ["pr"], "value": "Switch"},
                        {"iid": 10, "type": "25", "format": "bool", "perms": ["pr", "pw", "ev"],
                         "value": self.on.load(Ordering::SeqCst)},
                    ],
                },
            ],
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
        Ok(match id {
            NAME => json!("Switch"),
            _ => json!(self.on.load(Ordering::SeqCst)),
        })
    }

    async fn write(
        &self,
        id: CharacteristicId,
        value: Value,
        ctx: &RequestContext,
    ) -> Result<Option<Value>, CharacteristicError> {
        let on = value.as_bool().ok_or(HapStatus::InvalidValueInRequest)?;
        self.on.store(on, Ordering::SeqCst);
        println!("Switch turned {}", if on { "on" } else { "off" });
        if let Some(notifier) = self.notifier.get() {
            notifier.notify_change(id, value, Some(ctx.connection));
        }
        Ok(None)
    }

    async fn identify(&self) -> Result<(), CharacteristicError> {
        println!("Identify requested");
        Ok(())
    }
}

/// Load the accessory identity, creating it on first run
async fn load_identity(path: &str) -> Result<AccessoryIdentity, Box<dyn std::error::Error>> {
    if let Ok(bytes) = tokio::fs::read(path).await {
        let saved: Value = serde_json::from_slice(&bytes)?;
        let username = saved["username"].as_str().ok_or("missing username")?;
        let secret: Vec<u8> = serde_json::from_value(saved["secret"].clone())?;
        return Ok(AccessoryIdentity::from_secret(username, &secret)?);
    }

    let identity = AccessoryIdentity::generate(HapServerConfig::default().username);
    let saved = json!({
        "username": identity.username,
        "secret": identity.keypair.secret_bytes().to_vec(),
    });
    tokio::fs::write(path, serde_json::to_vec_pretty(&saved)?).await?;
    Ok(identity)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("hap_server=info".parse()?),
        )
        .init();

    let switch = Arc::new(Switch {
        on: AtomicBool::new(false),
        notifier: OnceLock::new(),
    });

    let identity = load_identity("switch-identity.json").await?;
    let config = HapServerConfig::new("Switch")
        .with_username(identity.username.clone())
        .with_allow_insecure(std::env::var_os("HAP_INSECURE").is_some());
    let store = FileStorage::new("switch-pairings.json").await?;

    println!("=== HAP switch accessory ===");
    println!("Setup code: {}", config.pincode);
    println!("Accessory ID: {}", config.username);

    let mut server = HapServer::new(config, identity, Box::new(store), switch.clone())?;
    let _ = switch.notifier.set(server.notifier());
    let addr = server.start().await?;
    println!("Listening on {addr}, press Ctrl+C to stop");

    // Toggle every 30 seconds to show events reaching subscribed controllers
    let toggler = switch.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(30));
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let on = !toggler.on.fetch_xor(true, Ordering::SeqCst);
            if let Some(notifier) = toggler.notifier.get() {
                notifier.notify_change(ON, json!(on), None);
            }
        }
    });

    tokio::signal::ctrl_c().await?;
    server.stop().await;
    Ok(())
}
