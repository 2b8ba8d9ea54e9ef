//! `/identify`, `/accessories` and `/resource` handlers

use super::accessory::ResourceRequest;
use super::connection::HapConnection;
use super::context::ServerContext;
use super::status::{HapStatus, StatusBody};
use crate::protocol::http::{HttpRequest, HttpResponse, ResponseBuilder, StatusCode, content_types};

fn status_response(code: StatusCode, status: HapStatus) -> HttpResponse {
    ResponseBuilder::new(code)
        .json_body(&StatusBody::from(status))
        .build()
}

/// `POST /identify`
///
/// Only available while the accessory is unpaired.
pub async fn handle_identify(
    ctx: &ServerContext,
    conn: &mut HapConnection,
    _request: &HttpRequest,
) -> HttpResponse {
    if !ctx.config.allow_insecure && ctx.is_paired().await {
        return status_response(StatusCode::BAD_REQUEST, HapStatus::InsufficientPrivileges);
    }

    match ctx.graph.identify().await {
        Ok(()) => {
            tracing::info!(connection = %conn.id(), "Identify");
            ResponseBuilder::no_content().build()
        }
        Err(e) => {
            tracing::warn!(connection = %conn.id(), "Identify failed: {}", e);
            status_response(StatusCode::INTERNAL_SERVER_ERROR, e.status())
        }
    }
}

/// `GET /accessories`
pub async fn handle_accessories(
    ctx: &ServerContext,
    conn: &mut HapConnection,
    _request: &HttpRequest,
) -> HttpResponse {
    match ctx.graph.accessories().await {
        Ok(database) => ResponseBuilder::ok().json_body(&database).build(),
        Err(e) => {
            tracing::warn!(connection = %conn.id(), "Accessory database unavailable: {}", e);
            status_response(StatusCode::INTERNAL_SERVER_ERROR, e.status())
        }
    }
}

/// `POST /resource`
pub async fn handle_resource(
    ctx: &ServerContext,
    conn: &mut HapConnection,
    request: &HttpRequest,
) -> HttpResponse {
    let resource = match serde_json::from_slice::<ResourceRequest>(&request.body) {
        Ok(resource) if resource.resource_type == "image" => resource,
        _ => {
            return status_response(StatusCode::BAD_REQUEST, HapStatus::InvalidValueInRequest);
        }
    };

    match ctx.graph.snapshot(&resource).await {
        Ok(image) => ResponseBuilder::ok()
            .binary_body(image, content_types::IMAGE_JPEG)
            .build(),
        Err(e) => {
            let status = e.status();
            tracing::debug!(connection = %conn.id(), ?status, "Snapshot failed: {}", e);
            let code = if status == HapStatus::ResourceDoesNotExist {
                StatusCode::NOT_FOUND
            } else {
                StatusCode::INTERNAL_SERVER_ERROR
            };
            status_response(code, status)
        }
    }
}
