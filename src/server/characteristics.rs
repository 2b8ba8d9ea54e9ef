//! `GET` and `PUT /characteristics`
//!
//! Items in a batch are checked and resolved independently. Reads and
//! writes against the graph run concurrently; the response keeps the
//! request order.

use super::accessory::{
    Access, CharacteristicId, CharacteristicInfo, CharacteristicMeta, Perm, RequestContext,
};
use super::connection::HapConnection;
use super::context::ServerContext;
use super::status::{HapStatus, StatusBody};
use crate::protocol::http::{HttpRequest, HttpResponse, ResponseBuilder, StatusCode};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::time::Instant;

/// One entry of a read response
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReadEntry {
    pub aid: u64,
    pub iid: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub char_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub perms: Option<Vec<Perm>>,
    #[serde(flatten)]
    pub meta: Option<CharacteristicMeta>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ev: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<HapStatus>,
}

impl ReadEntry {
    fn failed(id: CharacteristicId, status: HapStatus) -> Self {
        Self {
            aid: id.aid,
            iid: id.iid,
            value: None,
            char_type: None,
            perms: None,
            meta: None,
            ev: None,
            status: Some(status),
        }
    }

    fn is_error(&self) -> bool {
        self.status.is_some_and(|status| !status.is_success())
    }
}

/// One entry of a write response
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WriteEntry {
    pub aid: u64,
    pub iid: u64,
    pub status: HapStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl WriteEntry {
    fn new(id: CharacteristicId, status: HapStatus) -> Self {
        Self {
            aid: id.aid,
            iid: id.iid,
            status,
            value: None,
        }
    }
}

#[derive(Debug, Serialize)]
struct CharacteristicsBody<T> {
    characteristics: Vec<T>,
}

/// `PUT /characteristics` body
#[derive(Debug, Clone, Deserialize)]
pub struct WriteRequest {
    pub characteristics: Vec<WriteItem>,
    #[serde(default)]
    pub pid: Option<u64>,
}

/// One item of a write request
#[derive(Debug, Clone, Deserialize)]
pub struct WriteItem {
    pub aid: u64,
    pub iid: u64,
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default)]
    pub ev: Option<bool>,
    /// Ask for the write-response value
    #[serde(default)]
    pub r: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimedWriteState {
    NotTimed,
    Authenticated,
    Rejected,
}

#[derive(Debug, Clone, Copy, Default)]
struct ReadFlags {
    meta: bool,
    perms: bool,
    char_type: bool,
    ev: bool,
}

fn invalid_request() -> HttpResponse {
    ResponseBuilder::new(StatusCode::BAD_REQUEST)
        .json_body(&StatusBody::from(HapStatus::InvalidValueInRequest))
        .build()
}

async fn request_context(ctx: &ServerContext, conn: &HapConnection) -> RequestContext {
    let username = conn.username().map(str::to_string);
    let is_admin = match &username {
        Some(username) => ctx.is_admin(username).await,
        None => false,
    };
    RequestContext {
        connection: conn.id(),
        username,
        is_admin,
    }
}

/// Parse `id=1.9,2.14`
fn parse_ids(raw: &str) -> Result<Vec<CharacteristicId>, HapStatus> {
    raw.split(',')
        .filter(|part| !part.is_empty())
        .map(str::parse)
        .collect()
}

/// `GET /characteristics`
pub async fn handle_read(
    ctx: &ServerContext,
    conn: &HapConnection,
    request: &HttpRequest,
) -> HttpResponse {
    let Some(ids) = request
        .query_param("id")
        .and_then(|raw| parse_ids(raw).ok())
        .filter(|ids| !ids.is_empty())
    else {
        return invalid_request();
    };

    let flags = ReadFlags {
        meta: request.query_flag("meta"),
        perms: request.query_flag("perms"),
        char_type: request.query_flag("type"),
        ev: request.query_flag("ev"),
    };
    let request_ctx = request_context(ctx, conn).await;

    let mut entries = join_all(
        ids.iter()
            .map(|id| read_one(ctx, conn, &request_ctx, *id, flags)),
    )
    .await;

    if entries.iter().any(ReadEntry::is_error) {
        for entry in &mut entries {
            entry.status.get_or_insert(HapStatus::Success);
        }
        ResponseBuilder::new(StatusCode::MULTI_STATUS)
            .json_body(&CharacteristicsBody {
                characteristics: entries,
            })
            .build()
    } else {
        ResponseBuilder::ok()
            .json_body(&CharacteristicsBody {
                characteristics: entries,
            })
            .build()
    }
}

async fn read_one(
    ctx: &ServerContext,
    conn: &HapConnection,
    request_ctx: &RequestContext,
    id: CharacteristicId,
    flags: ReadFlags,
) -> ReadEntry {
    let info = match check_read(ctx, request_ctx, id) {
        Ok(info) => info,
        Err(status) => {
            tracing::debug!(%id, ?status, "Read rejected");
            return ReadEntry::failed(id, status);
        }
    };

    match ctx.graph.read(id, request_ctx).await {
        Ok(value) => ReadEntry {
            aid: id.aid,
            iid: id.iid,
            value: Some(value),
            char_type: flags.char_type.then(|| info.char_type.clone()),
            perms: flags.perms.then(|| info.perms.clone()),
            meta: flags.meta.then(|| info.meta.clone()),
            ev: flags.ev.then(|| conn.is_subscribed(id)),
            status: None,
        },
        Err(e) => {
            tracing::debug!(%id, "Read failed: {}", e);
            ReadEntry::failed(id, e.status())
        }
    }
}

fn check_read(
    ctx: &ServerContext,
    request_ctx: &RequestContext,
    id: CharacteristicId,
) -> Result<CharacteristicInfo, HapStatus> {
    let info = ctx
        .graph
        .characteristic(id)
        .ok_or(HapStatus::ServiceCommunicationFailure)?;
    if !info.has_perm(Perm::PairedRead) {
        return Err(HapStatus::WriteOnlyCharacteristic);
    }
    if info.is_admin_only(Access::Read) && !request_ctx.is_admin {
        return Err(HapStatus::InsufficientPrivileges);
    }
    Ok(info)
}

/// A write that passed every check and still has to reach the graph
struct PendingWrite {
    index: usize,
    id: CharacteristicId,
    value: Value,
    want_response: bool,
}

/// `PUT /characteristics`
pub async fn handle_write(
    ctx: &ServerContext,
    conn: &mut HapConnection,
    request: &HttpRequest,
) -> HttpResponse {
    let Ok(write_request) = serde_json::from_slice::<WriteRequest>(&request.body) else {
        return invalid_request();
    };

    let timed = match write_request.pid {
        None => TimedWriteState::NotTimed,
        Some(pid) if conn.take_timed_write(pid, Instant::now()) => {
            tracing::debug!(connection = %conn.id(), pid, "Timed write accepted");
            TimedWriteState::Authenticated
        }
        Some(pid) => {
            tracing::debug!(connection = %conn.id(), pid, "Timed write rejected");
            TimedWriteState::Rejected
        }
    };

    let request_ctx = request_context(ctx, conn).await;
    let mut entries = Vec::with_capacity(write_request.characteristics.len());
    let mut pending = Vec::new();

    for (index, item) in write_request.characteristics.into_iter().enumerate() {
        let id = CharacteristicId::new(item.aid, item.iid);
        match prepare_write(ctx, conn, &request_ctx, timed, index, item).await {
            Ok(Some(write)) => {
                entries.push(WriteEntry::new(id, HapStatus::Success));
                pending.push(write);
            }
            Ok(None) => entries.push(WriteEntry::new(id, HapStatus::Success)),
            Err(status) => {
                tracing::debug!(%id, ?status, "Write rejected");
                entries.push(WriteEntry::new(id, status));
            }
        }
    }

    let results = join_all(pending.into_iter().map(|write| {
        let request_ctx = &request_ctx;
        async move {
            let result = ctx.graph.write(write.id, write.value, request_ctx).await;
            (write.index, write.id, write.want_response, result)
        }
    }))
    .await;

    for (index, id, want_response, result) in results {
        let entry = &mut entries[index];
        match result {
            Ok(value) => {
                if want_response {
                    entry.value = value;
                }
            }
            Err(e) => {
                tracing::debug!(%id, "Write failed: {}", e);
                entry.status = e.status();
            }
        }
    }

    if entries
        .iter()
        .any(|entry| !entry.status.is_success() || entry.value.is_some())
    {
        ResponseBuilder::new(StatusCode::MULTI_STATUS)
            .json_body(&CharacteristicsBody {
                characteristics: entries,
            })
            .build()
    } else {
        ResponseBuilder::no_content().build()
    }
}

/// Apply subscription changes and check a write item
///
/// Returns the write still to be performed, if the item carries a value.
async fn prepare_write(
    ctx: &ServerContext,
    conn: &mut HapConnection,
    request_ctx: &RequestContext,
    timed: TimedWriteState,
    index: usize,
    item: WriteItem,
) -> Result<Option<PendingWrite>, HapStatus> {
    let id = CharacteristicId::new(item.aid, item.iid);
    let info = ctx
        .graph
        .characteristic(id)
        .ok_or(HapStatus::ServiceCommunicationFailure)?;

    if timed == TimedWriteState::Rejected {
        return Err(HapStatus::InvalidValueInRequest);
    }

    if let Some(subscribe) = item.ev {
        if !info.has_perm(Perm::Notify) {
            return Err(HapStatus::NotificationNotSupported);
        }
        if info.is_admin_only(Access::Notify) && !request_ctx.is_admin {
            return Err(HapStatus::InsufficientPrivileges);
        }
        if subscribe {
            if conn.subscribe(id) {
                tracing::debug!(connection = %conn.id(), %id, "Subscribed");
                ctx.graph.subscribe(id).await;
            }
        } else if conn.unsubscribe(id) {
            tracing::debug!(connection = %conn.id(), %id, "Unsubscribed");
            ctx.graph.unsubscribe(id).await;
        }
    }

    let Some(value) = item.value else {
        return Ok(None);
    };

    if !info.has_perm(Perm::PairedWrite) {
        return Err(HapStatus::ReadOnlyCharacteristic);
    }
    if info.is_admin_only(Access::Write) && !request_ctx.is_admin {
        return Err(HapStatus::InsufficientPrivileges);
    }
    if info.has_perm(Perm::TimedWrite) && timed != TimedWriteState::Authenticated {
        return Err(HapStatus::InvalidValueInRequest);
    }

    Ok(Some(PendingWrite {
        index,
        id,
        value,
        want_response: item.r.unwrap_or(false) && info.has_perm(Perm::WriteResponse),
    }))
}

/// `PUT /prepare` body
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PrepareRequest {
    /// Milliseconds the token stays valid
    pub ttl: u64,
    pub pid: u64,
}

/// `PUT /prepare`
pub async fn handle_prepare(
    _ctx: &ServerContext,
    conn: &mut HapConnection,
    request: &HttpRequest,
) -> HttpResponse {
    let Ok(prepare) = serde_json::from_slice::<PrepareRequest>(&request.body) else {
        return invalid_request();
    };

    tracing::debug!(connection = %conn.id(), pid = prepare.pid, ttl = prepare.ttl, "Timed write prepared");
    conn.prepare_timed_write(
        prepare.pid,
        std::time::Duration::from_millis(prepare.ttl),
        Instant::now(),
    );

    ResponseBuilder::ok()
        .json_body(&StatusBody::from(HapStatus::Success))
        .build()
}
