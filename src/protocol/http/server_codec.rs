//! Server-side HTTP codec: request parsing, response and event encoding

use super::{Headers, HttpRequest, HttpResponse, Method, StatusCode, content_types, names};
use bytes::BytesMut;
use std::str::{self, FromStr};

/// Errors during HTTP parsing
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("Invalid request line: {0}")]
    InvalidRequestLine(String),

    #[error("Invalid method: {0}")]
    InvalidMethod(String),

    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    #[error("Invalid Content-Length: {0}")]
    InvalidContentLength(String),

    #[error("Body too large: {size} > {max}")]
    BodyTooLarge { size: usize, max: usize },

    #[error("Invalid UTF-8 in headers")]
    InvalidUtf8,
}

/// Maximum allowed body size
pub(crate) const MAX_BODY_SIZE: usize = 1024 * 1024;

/// Maximum header section size
pub(crate) const MAX_HEADER_SIZE: usize = 16 * 1024;

/// Server-side HTTP codec
///
/// Sans-IO: `feed()` appends bytes, `decode()` yields complete requests.
/// Requests may be pipelined; each `decode()` call consumes exactly one.
pub struct HttpServerCodec {
    buffer: BytesMut,
}

impl HttpServerCodec {
    /// Create a new server codec
    #[must_use]
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(4096),
        }
    }

    /// Feed bytes into the internal buffer
    pub fn feed(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Get current buffer length
    #[must_use]
    pub fn buffer_len(&self) -> usize {
        self.buffer.len()
    }

    /// Take all buffered, not yet decoded bytes
    ///
    /// Used when the connection switches to encrypted framing: anything the
    /// controller pipelined after the last plaintext request is ciphertext.
    pub fn take_remaining(&mut self) -> Vec<u8> {
        self.buffer.split().to_vec()
    }

    /// Attempt to decode a complete HTTP request
    ///
    /// Returns:
    /// - `Ok(Some(request))` if a complete request was parsed
    /// - `Ok(None)` if more data is needed
    ///
    /// # Errors
    /// Returns `ParseError` if the request is malformed.
    pub fn decode(&mut self) -> Result<Option<HttpRequest>, ParseError> {
        let Some(header_end) = find_header_end(&self.buffer) else {
            if self.buffer.len() > MAX_HEADER_SIZE {
                return Err(ParseError::InvalidHeader("Headers too large".into()));
            }
            return Ok(None);
        };

        let header_str =
            str::from_utf8(&self.buffer[..header_end]).map_err(|_| ParseError::InvalidUtf8)?;
        let mut lines = header_str.split("\r\n");

        let request_line = lines
            .next()
            .ok_or_else(|| ParseError::InvalidRequestLine("Empty request".into()))?;
        let (method, target) = parse_request_line(request_line)?;
        let headers = parse_header_lines(lines)?;

        let content_length = body_length(&headers)?;
        let total_size = header_end + 4 + content_length;
        if self.buffer.len() < total_size {
            return Ok(None);
        }

        let _ = self.buffer.split_to(header_end + 4);
        let body = self.buffer.split_to(content_length).to_vec();

        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path.to_string(), query.to_string()),
            None => (target, String::new()),
        };

        Ok(Some(HttpRequest {
            method,
            path,
            query,
            headers,
            body,
        }))
    }
}

impl Default for HttpServerCodec {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn find_header_end(buffer: &[u8]) -> Option<usize> {
    let needle = b"\r\n\r\n";
    buffer
        .windows(needle.len())
        .position(|window| window == needle)
}

fn parse_request_line(line: &str) -> Result<(Method, String), ParseError> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() != 3 {
        return Err(ParseError::InvalidRequestLine(line.to_string()));
    }

    let method =
        Method::from_str(parts[0]).map_err(|()| ParseError::InvalidMethod(parts[0].to_string()))?;

    if !parts[2].starts_with("HTTP/1.") {
        return Err(ParseError::InvalidRequestLine(format!(
            "Invalid protocol: {}",
            parts[2]
        )));
    }

    Ok((method, parts[1].to_string()))
}

pub(crate) fn parse_header_lines<'a>(
    lines: impl Iterator<Item = &'a str>,
) -> Result<Headers, ParseError> {
    let mut headers = Headers::new();
    for line in lines {
        if line.is_empty() {
            break;
        }
        let Some((name, value)) = line.split_once(':') else {
            return Err(ParseError::InvalidHeader(line.to_string()));
        };
        headers.insert(name.trim(), value.trim());
    }
    Ok(headers)
}

pub(crate) fn body_length(headers: &Headers) -> Result<usize, ParseError> {
    let Some(raw) = headers.get(names::CONTENT_LENGTH) else {
        return Ok(0);
    };
    let length: usize = raw
        .trim()
        .parse()
        .map_err(|_| ParseError::InvalidContentLength(raw.to_string()))?;
    if length > MAX_BODY_SIZE {
        return Err(ParseError::BodyTooLarge {
            size: length,
            max: MAX_BODY_SIZE,
        });
    }
    Ok(length)
}

/// Builder for HTTP responses
#[derive(Debug, Clone)]
pub struct ResponseBuilder {
    status: StatusCode,
    headers: Headers,
    body: Option<Vec<u8>>,
}

impl ResponseBuilder {
    /// Create a new response builder with the given status
    #[must_use]
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: Headers::new(),
            body: None,
        }
    }

    /// Create an OK (200) response
    #[must_use]
    pub fn ok() -> Self {
        Self::new(StatusCode::OK)
    }

    /// Create a No Content (204) response
    #[must_use]
    pub fn no_content() -> Self {
        Self::new(StatusCode::NO_CONTENT)
    }

    /// Add a custom header
    #[must_use]
    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Set a binary body
    #[must_use]
    pub fn binary_body(mut self, body: Vec<u8>, content_type: &str) -> Self {
        self.body = Some(body);
        self.headers.insert(names::CONTENT_TYPE, content_type);
        self
    }

    /// Set a `application/pairing+tlv8` body
    #[must_use]
    pub fn tlv_body(self, body: Vec<u8>) -> Self {
        self.binary_body(body, content_types::PAIRING_TLV8)
    }

    /// Set a `application/hap+json` body
    ///
    /// Serialization failures turn the response into a bodiless 500.
    #[must_use]
    pub fn json_body<T: serde::Serialize + ?Sized>(mut self, body: &T) -> Self {
        match serde_json::to_vec(body) {
            Ok(bytes) => self.binary_body(bytes, content_types::HAP_JSON),
            Err(e) => {
                tracing::error!("Failed to serialize response body: {}", e);
                self.status = StatusCode::INTERNAL_SERVER_ERROR;
                self.body = None;
                self
            }
        }
    }

    /// Build into an `HttpResponse`
    #[must_use]
    pub fn build(mut self) -> HttpResponse {
        let body = self.body.unwrap_or_default();
        if self.status != StatusCode::NO_CONTENT {
            self.headers
                .insert(names::CONTENT_LENGTH, body.len().to_string());
        }

        HttpResponse {
            status: self.status,
            headers: self.headers,
            body,
        }
    }

    /// Encode directly to bytes
    #[must_use]
    pub fn encode(self) -> Vec<u8> {
        encode_response(&self.build())
    }
}

/// Encode an HTTP response to bytes
#[must_use]
pub fn encode_response(response: &HttpResponse) -> Vec<u8> {
    encode_message("HTTP/1.1", response)
}

/// Encode an unsolicited `EVENT/1.0` message carrying a HAP JSON body
#[must_use]
pub fn encode_event(body: &[u8]) -> Vec<u8> {
    let response = ResponseBuilder::ok()
        .binary_body(body.to_vec(), content_types::HAP_JSON)
        .build();
    encode_message("EVENT/1.0", &response)
}

fn encode_message(protocol: &str, response: &HttpResponse) -> Vec<u8> {
    let mut output = Vec::with_capacity(128 + response.body.len());

    output.extend_from_slice(
        format!(
            "{} {} {}\r\n",
            protocol,
            response.status.as_u16(),
            response.status.reason()
        )
        .as_bytes(),
    );

    for (name, value) in response.headers.iter() {
        output.extend_from_slice(format!("{name}: {value}\r\n").as_bytes());
    }

    output.extend_from_slice(b"\r\n");
    output.extend_from_slice(&response.body);

    output
}
