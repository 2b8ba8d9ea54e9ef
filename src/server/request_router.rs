//! Static dispatch table for the fixed HAP endpoints

use super::characteristics;
use super::connection::HapConnection;
use super::context::ServerContext;
use super::pairing_handlers;
use super::request_handler;
use super::status::{HapStatus, StatusBody};
use crate::protocol::http::{HttpRequest, HttpResponse, Method, ResponseBuilder, StatusCode};
use futures::future::BoxFuture;

/// Endpoint handler
pub type Handler = for<'a> fn(
    &'a ServerContext,
    &'a mut HapConnection,
    &'a HttpRequest,
) -> BoxFuture<'a, HttpResponse>;

/// One row of the dispatch table
pub struct Route {
    pub path: &'static str,
    pub method: Method,
    /// Requires a Pair-Verify session unless the server is insecure
    pub requires_auth: bool,
    pub handler: Handler,
}

/// Every endpoint the accessory serves
pub static ROUTES: &[Route] = &[
    Route {
        path: "/identify",
        method: Method::Post,
        requires_auth: false,
        handler: identify,
    },
    Route {
        path: "/pair-setup",
        method: Method::Post,
        requires_auth: false,
        handler: pair_setup,
    },
    Route {
        path: "/pair-verify",
        method: Method::Post,
        requires_auth: false,
        handler: pair_verify,
    },
    Route {
        path: "/pairings",
        method: Method::Post,
        requires_auth: true,
        handler: pairings,
    },
    Route {
        path: "/accessories",
        method: Method::Get,
        requires_auth: true,
        handler: accessories,
    },
    Route {
        path: "/characteristics",
        method: Method::Get,
        requires_auth: true,
        handler: read_characteristics,
    },
    Route {
        path: "/characteristics",
        method: Method::Put,
        requires_auth: true,
        handler: write_characteristics,
    },
    Route {
        path: "/prepare",
        method: Method::Put,
        requires_auth: true,
        handler: prepare,
    },
    Route {
        path: "/resource",
        method: Method::Post,
        requires_auth: true,
        handler: resource,
    },
];

/// Outcome of looking up a request in [`ROUTES`]
#[derive(Clone, Copy)]
pub enum RouteMatch {
    Found(&'static Route),
    MethodNotAllowed,
    NotFound,
}

/// Look up the route for `method` and `path`
#[must_use]
pub fn resolve(method: Method, path: &str) -> RouteMatch {
    let mut path_known = false;
    for route in ROUTES {
        if route.path == path {
            if route.method == method {
                return RouteMatch::Found(route);
            }
            path_known = true;
        }
    }
    if path_known {
        RouteMatch::MethodNotAllowed
    } else {
        RouteMatch::NotFound
    }
}

/// Route a request and produce its response
pub async fn dispatch(
    ctx: &ServerContext,
    conn: &mut HapConnection,
    request: &HttpRequest,
) -> HttpResponse {
    tracing::debug!(
        connection = %conn.id(),
        method = %request.method,
        path = %request.path,
        "Request"
    );

    match resolve(request.method, &request.path) {
        RouteMatch::NotFound => ResponseBuilder::new(StatusCode::NOT_FOUND)
            .json_body(&StatusBody::from(HapStatus::ResourceDoesNotExist))
            .build(),
        RouteMatch::MethodNotAllowed => ResponseBuilder::new(StatusCode::METHOD_NOT_ALLOWED).build(),
        RouteMatch::Found(route) => {
            if route.requires_auth && !conn.is_authenticated() && !ctx.config.allow_insecure {
                tracing::debug!(connection = %conn.id(), path = %request.path, "Unauthenticated request");
                return ResponseBuilder::new(StatusCode::CONNECTION_AUTHORIZATION_REQUIRED)
                    .json_body(&StatusBody::from(HapStatus::InsufficientPrivileges))
                    .build();
            }
            (route.handler)(ctx, conn, request).await
        }
    }
}

fn identify<'a>(
    ctx: &'a ServerContext,
    conn: &'a mut HapConnection,
    request: &'a HttpRequest,
) -> BoxFuture<'a, HttpResponse> {
    Box::pin(request_handler::handle_identify(ctx, conn, request))
}

fn pair_setup<'a>(
    ctx: &'a ServerContext,
    conn: &'a mut HapConnection,
    request: &'a HttpRequest,
) -> BoxFuture<'a, HttpResponse> {
    Box::pin(pairing_handlers::handle_pair_setup(ctx, conn, request))
}

fn pair_verify<'a>(
    ctx: &'a ServerContext,
    conn: &'a mut HapConnection,
    request: &'a HttpRequest,
) -> BoxFuture<'a, HttpResponse> {
    Box::pin(pairing_handlers::handle_pair_verify(ctx, conn, request))
}

fn pairings<'a>(
    ctx: &'a ServerContext,
    conn: &'a mut HapConnection,
    request: &'a HttpRequest,
) -> BoxFuture<'a, HttpResponse> {
    Box::pin(pairing_handlers::handle_pairings(ctx, conn, request))
}

fn accessories<'a>(
    ctx: &'a ServerContext,
    conn: &'a mut HapConnection,
    request: &'a HttpRequest,
) -> BoxFuture<'a, HttpResponse> {
    Box::pin(request_handler::handle_accessories(ctx, conn, request))
}

fn read_characteristics<'a>(
    ctx: &'a ServerContext,
    conn: &'a mut HapConnection,
    request: &'a HttpRequest,
) -> BoxFuture<'a, HttpResponse> {
    Box::pin(characteristics::handle_read(ctx, conn, request))
}

fn write_characteristics<'a>(
    ctx: &'a ServerContext,
    conn: &'a mut HapConnection,
    request: &'a HttpRequest,
) -> BoxFuture<'a, HttpResponse> {
    Box::pin(characteristics::handle_write(ctx, conn, request))
}

fn prepare<'a>(
    ctx: &'a ServerContext,
    conn: &'a mut HapConnection,
    request: &'a HttpRequest,
) -> BoxFuture<'a, HttpResponse> {
    Box::pin(characteristics::handle_prepare(ctx, conn, request))
}

fn resource<'a>(
    ctx: &'a ServerContext,
    conn: &'a mut HapConnection,
    request: &'a HttpRequest,
) -> BoxFuture<'a, HttpResponse> {
    Box::pin(request_handler::handle_resource(ctx, conn, request))
}
