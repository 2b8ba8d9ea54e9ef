//! HTTP/1.1 framing for the HAP control connection
//!
//! HAP reuses plain HTTP requests and responses plus one extension: the
//! accessory may push `EVENT/1.0` messages at any time on the same stream.

pub mod client_codec;
pub mod headers;
pub mod server_codec;


pub use client_codec::{HttpClientCodec, IncomingMessage};
pub use headers::{Headers, content_types, names};
pub use server_codec::{
    HttpServerCodec, ParseError, ResponseBuilder, encode_event, encode_response,
};

use std::fmt;
use std::str::FromStr;

/// HTTP request methods accepted by the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Put,
    Post,
    Delete,
    Head,
    Options,
}

impl Method {
    /// Method name as sent on the wire
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Put => "PUT",
            Self::Post => "POST",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
        }
    }
}

impl FromStr for Method {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GET" => Ok(Self::Get),
            "PUT" => Ok(Self::Put),
            "POST" => Ok(Self::Post),
            "DELETE" => Ok(Self::Delete),
            "HEAD" => Ok(Self::Head),
            "OPTIONS" => Ok(Self::Options),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// HTTP status code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatusCode(pub u16);

impl StatusCode {
    pub const OK: Self = Self(200);
    pub const NO_CONTENT: Self = Self(204);
    pub const MULTI_STATUS: Self = Self(207);
    pub const BAD_REQUEST: Self = Self(400);
    pub const NOT_FOUND: Self = Self(404);
    pub const METHOD_NOT_ALLOWED: Self = Self(405);
    pub const CONNECTION_AUTHORIZATION_REQUIRED: Self = Self(470);
    pub const INTERNAL_SERVER_ERROR: Self = Self(500);

    /// Numeric value
    #[must_use]
    pub fn as_u16(self) -> u16 {
        self.0
    }

    /// Standard reason phrase
    #[must_use]
    pub fn reason(self) -> &'static str {
        match self.0 {
            200 => "OK",
            204 => "No Content",
            207 => "Multi-Status",
            400 => "Bad Request",
            404 => "Not Found",
            405 => "Method Not Allowed",
            470 => "Connection Authorization Required",
            500 => "Internal Server Error",
            _ => "Unknown",
        }
    }
}

/// A parsed HTTP request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: Method,
    /// Path without the query string
    pub path: String,
    /// Raw query string without the leading `?`
    pub query: String,
    pub headers: Headers,
    pub body: Vec<u8>,
}

impl HttpRequest {
    /// Look up a query parameter
    #[must_use]
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .split('&')
            .filter_map(|pair| pair.split_once('=').or(Some((pair, ""))))
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value)
    }

    /// Whether a `0`/`1` query flag is set
    #[must_use]
    pub fn query_flag(&self, name: &str) -> bool {
        matches!(self.query_param(name), Some("1" | "true"))
    }
}

/// An HTTP response ready for encoding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: Headers,
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Parse the body as JSON
    ///
    /// # Errors
    ///
    /// Returns error if the body is not valid JSON
    pub fn json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}
