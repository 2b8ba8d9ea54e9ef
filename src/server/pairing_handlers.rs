//! `/pair-setup`, `/pair-verify` and `/pairings` handlers
//!
//! Pairing failures are reported inside the TLV body with HTTP 200; only a
//! body that cannot be parsed as a pairing message gets HTTP 400.

use super::connection::{HapConnection, SessionState};
use super::context::ServerContext;
use crate::protocol::http::{HttpRequest, HttpResponse, ResponseBuilder, StatusCode};
use crate::protocol::pairing::tlv::{errors, methods};
use crate::protocol::pairing::{
    PairSetup, PairVerify, PairedController, PairingError, Permission, TlvDecoder, TlvEncoder,
    TlvError, TlvType,
};

fn tlv_response(body: Vec<u8>) -> HttpResponse {
    ResponseBuilder::ok().tlv_body(body).build()
}

/// Reply for a message whose sequence number is not part of the exchange
fn bad_sequence(sequence: u8) -> HttpResponse {
    ResponseBuilder::new(StatusCode::BAD_REQUEST)
        .tlv_body(
            TlvEncoder::new()
                .add_state(sequence.wrapping_add(1))
                .add_error(errors::UNKNOWN)
                .build(),
        )
        .build()
}

fn decode_body(request: &HttpRequest) -> Result<(TlvDecoder, u8), HttpResponse> {
    let tlv = TlvDecoder::decode(&request.body).map_err(|_| bad_sequence(1))?;
    let sequence = tlv.get_state().map_err(|_| bad_sequence(1))?;
    Ok((tlv, sequence))
}

/// `POST /pair-setup`
pub async fn handle_pair_setup(
    ctx: &ServerContext,
    conn: &mut HapConnection,
    request: &HttpRequest,
) -> HttpResponse {
    let (tlv, sequence) = match decode_body(request) {
        Ok(decoded) => decoded,
        Err(response) => return response,
    };

    if !ctx.config.allow_insecure && ctx.is_paired().await {
        tracing::debug!(connection = %conn.id(), "Pair-Setup refused, already paired");
        abandon_setup(ctx, conn).await;
        return tlv_response(PairingError::Unavailable.response(2));
    }

    let engine = PairSetup::new(&ctx.identity, &ctx.config.pincode);

    match sequence {
        1 => {
            if !ctx.claim_setup(conn.id()).await {
                tracing::debug!(connection = %conn.id(), "Pair-Setup busy");
                return tlv_response(PairingError::Busy.response(2));
            }
            tracing::debug!(connection = %conn.id(), "Pair-Setup M1");
            match engine.handle_m1(&tlv) {
                Ok((response, state)) => {
                    conn.set_state(SessionState::PairSetupInProgress(state));
                    tlv_response(response)
                }
                Err(e) => {
                    abandon_setup(ctx, conn).await;
                    tlv_response(e.response(2))
                }
            }
        }
        3 => {
            tracing::debug!(connection = %conn.id(), "Pair-Setup M3");
            let Some(state) = conn.take_setup_state() else {
                abandon_setup(ctx, conn).await;
                return tlv_response(PairingError::InvalidState { expected: 1, actual: 3 }.response(4));
            };
            if ctx.too_many_attempts() {
                tracing::warn!(connection = %conn.id(), "Pair-Setup locked after too many failures");
                abandon_setup(ctx, conn).await;
                return tlv_response(PairingError::MaxTries.response(4));
            }
            match engine.handle_m3(state, &tlv) {
                Ok((response, state)) => {
                    conn.set_state(SessionState::PairSetupInProgress(state));
                    tlv_response(response)
                }
                Err(e) => {
                    if matches!(e, PairingError::SrpVerificationFailed) {
                        let failures = ctx.record_failed_attempt();
                        tracing::warn!(connection = %conn.id(), failures, "Pair-Setup proof rejected");
                    }
                    abandon_setup(ctx, conn).await;
                    tlv_response(e.response(4))
                }
            }
        }
        5 => {
            tracing::debug!(connection = %conn.id(), "Pair-Setup M5");
            let Some(state) = conn.take_setup_state() else {
                abandon_setup(ctx, conn).await;
                return tlv_response(PairingError::InvalidState { expected: 1, actual: 5 }.response(6));
            };
            let result = match engine.handle_m5(state, &tlv) {
                Ok(complete) => store_new_pairing(ctx, &complete.controller)
                    .await
                    .map(|()| (complete.controller.username, complete.response)),
                Err(e) => Err(e),
            };
            abandon_setup(ctx, conn).await;
            match result {
                Ok((username, response)) => {
                    tracing::info!(connection = %conn.id(), controller = %username, "Pair-Setup complete");
                    tlv_response(response)
                }
                Err(e) => {
                    tracing::warn!(connection = %conn.id(), "Pair-Setup M5 failed: {}", e);
                    tlv_response(e.response(6))
                }
            }
        }
        other => {
            abandon_setup(ctx, conn).await;
            bad_sequence(other)
        }
    }
}

async fn store_new_pairing(
    ctx: &ServerContext,
    controller: &PairedController,
) -> Result<(), PairingError> {
    let mut store = ctx.store.write().await;
    if store.list().await.len() >= ctx.config.max_pairings {
        return Err(PairingError::MaxPeers);
    }
    store.save(controller).await?;
    Ok(())
}

/// Drop any in-progress setup on `conn` and free the shared slot
pub(crate) async fn abandon_setup(ctx: &ServerContext, conn: &mut HapConnection) {
    let _ = conn.take_setup_state();
    ctx.release_setup(conn.id()).await;
}

/// `POST /pair-verify`
pub async fn handle_pair_verify(
    ctx: &ServerContext,
    conn: &mut HapConnection,
    request: &HttpRequest,
) -> HttpResponse {
    let (tlv, sequence) = match decode_body(request) {
        Ok(decoded) => decoded,
        Err(response) => return response,
    };

    let engine = PairVerify::new(&ctx.identity);

    match sequence {
        1 => {
            tracing::debug!(connection = %conn.id(), "Pair-Verify M1");
            abandon_setup(ctx, conn).await;
            match engine.handle_m1(&tlv) {
                Ok((response, state)) => {
                    conn.set_state(SessionState::PairVerifyInProgress(state));
                    tlv_response(response)
                }
                Err(e) => tlv_response(e.response(2)),
            }
        }
        3 => {
            tracing::debug!(connection = %conn.id(), "Pair-Verify M3");
            let Some(state) = conn.take_verify_state() else {
                return tlv_response(PairingError::InvalidState { expected: 1, actual: 3 }.response(4));
            };

            let result = {
                let store = ctx.store.read().await;
                engine.handle_m3(state, &tlv, &**store).await
            };

            match result {
                Ok(complete) => {
                    if let Err(e) = conn.authenticate(complete.username.clone(), &complete.keys) {
                        tracing::warn!(connection = %conn.id(), "Failed to install traffic keys: {}", e);
                        return tlv_response(PairingError::SignatureVerificationFailed.response(4));
                    }
                    tracing::info!(
                        connection = %conn.id(),
                        controller = %complete.username,
                        "Pair-Verify complete"
                    );
                    tlv_response(complete.response)
                }
                Err(e) => {
                    tracing::warn!(connection = %conn.id(), "Pair-Verify rejected: {}", e);
                    tlv_response(e.response(4))
                }
            }
        }
        other => bad_sequence(other),
    }
}

/// `POST /pairings`
pub async fn handle_pairings(
    ctx: &ServerContext,
    conn: &mut HapConnection,
    request: &HttpRequest,
) -> HttpResponse {
    let (tlv, sequence) = match decode_body(request) {
        Ok(decoded) => decoded,
        Err(response) => return response,
    };
    if sequence != 1 {
        return tlv_response(PairingError::InvalidState { expected: 1, actual: sequence }.response(2));
    }

    let is_admin = match conn.username() {
        Some(username) => ctx.is_admin(username).await,
        None => ctx.config.allow_insecure,
    };
    if !is_admin {
        tracing::warn!(connection = %conn.id(), "Pairings request without admin permission");
        return tlv_response(PairingError::NotAdmin.response(2));
    }

    let result = match tlv.get_u8(TlvType::Method) {
        Some(methods::ADD_PAIRING) => add_pairing(ctx, &tlv).await,
        Some(methods::REMOVE_PAIRING) => remove_pairing(ctx, conn, &tlv).await,
        Some(methods::LIST_PAIRINGS) => Ok(list_pairings(ctx).await),
        Some(other) => Err(PairingError::UnsupportedMethod(other)),
        None => Err(TlvError::MissingField(TlvType::Method).into()),
    };

    match result {
        Ok(body) => tlv_response(body),
        Err(e) => {
            tracing::debug!(connection = %conn.id(), "Pairings request failed: {}", e);
            tlv_response(e.response(2))
        }
    }
}

async fn add_pairing(ctx: &ServerContext, tlv: &TlvDecoder) -> Result<Vec<u8>, PairingError> {
    let username = String::from_utf8_lossy(tlv.get_required(TlvType::Identifier)?).into_owned();
    let public_key: [u8; 32] = tlv
        .get_required(TlvType::PublicKey)?
        .try_into()
        .map_err(|_| TlvError::InvalidValue(TlvType::PublicKey))?;
    let permission = Permission::from_byte(tlv.get_u8(TlvType::Permissions).unwrap_or(0));

    let mut store = ctx.store.write().await;
    match store.load(&username).await {
        Some(existing) if existing.public_key != public_key => {
            return Err(PairingError::UnknownPairingKey);
        }
        Some(_) => {}
        None => {
            if store.list().await.len() >= ctx.config.max_pairings {
                return Err(PairingError::MaxPeers);
            }
        }
    }

    store
        .save(&PairedController {
            username: username.clone(),
            public_key,
            permission,
        })
        .await?;
    tracing::info!(controller = %username, ?permission, "Pairing added");

    Ok(TlvEncoder::new().add_state(2).build())
}

async fn remove_pairing(
    ctx: &ServerContext,
    conn: &mut HapConnection,
    tlv: &TlvDecoder,
) -> Result<Vec<u8>, PairingError> {
    let username = String::from_utf8_lossy(tlv.get_required(TlvType::Identifier)?).into_owned();

    let mut removed = vec![username.clone()];
    {
        let mut store = ctx.store.write().await;
        store.remove(&username).await?;

        let remaining = store.list().await;
        if !remaining.is_empty() && !remaining.iter().any(PairedController::is_admin) {
            for controller in remaining {
                store.remove(&controller.username).await?;
                removed.push(controller.username);
            }
        }
    }

    for username in &removed {
        tracing::info!(controller = %username, "Pairing removed");
        ctx.notifier.pairing_removed(username);
    }
    if conn.username().is_some_and(|own| removed.iter().any(|r| r == own)) {
        conn.close_after_flush();
    }

    Ok(TlvEncoder::new().add_state(2).build())
}

async fn list_pairings(ctx: &ServerContext) -> Vec<u8> {
    let controllers = ctx.store.read().await.list().await;

    let mut encoder = TlvEncoder::new().add_state(2);
    for (index, controller) in controllers.iter().enumerate() {
        if index > 0 {
            encoder = encoder.add_separator();
        }
        encoder = encoder
            .add(TlvType::Identifier, controller.username.as_bytes())
            .add(TlvType::PublicKey, &controller.public_key)
            .add_byte(TlvType::Permissions, controller.permission.as_byte());
    }
    encoder.build()
}
