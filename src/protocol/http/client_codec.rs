//! Controller-side codec: parses responses and pushed events

use super::server_codec::{ParseError, body_length, find_header_end, parse_header_lines};
use super::{HttpResponse, StatusCode};

/// A message received by a controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IncomingMessage {
    /// Reply to a request
    Response(HttpResponse),
    /// Unsolicited `EVENT/1.0` push
    Event(HttpResponse),
}

/// Sans-IO parser for the accessory-to-controller direction
#[derive(Debug, Default)]
pub struct HttpClientCodec {
    buffer: Vec<u8>,
}

impl HttpClientCodec {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed bytes into the codec
    pub fn feed(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Try to decode a complete response or event
    ///
    /// # Errors
    /// Returns `ParseError` if the status line or headers are malformed.
    pub fn decode(&mut self) -> Result<Option<IncomingMessage>, ParseError> {
        let Some(header_end) = find_header_end(&self.buffer) else {
            return Ok(None);
        };

        let header_str = std::str::from_utf8(&self.buffer[..header_end])
            .map_err(|_| ParseError::InvalidUtf8)?;
        let mut lines = header_str.split("\r\n");
        let status_line = lines.next().unwrap_or_default();

        let mut parts = status_line.splitn(3, ' ');
        let protocol = parts.next().unwrap_or_default();
        let status = parts
            .next()
            .and_then(|code| code.parse::<u16>().ok())
            .ok_or_else(|| ParseError::InvalidRequestLine(status_line.to_string()))?;
        let is_event = match protocol {
            "EVENT/1.0" => true,
            p if p.starts_with("HTTP/1.") => false,
            _ => return Err(ParseError::InvalidRequestLine(status_line.to_string())),
        };

        let headers = parse_header_lines(lines)?;
        let content_length = body_length(&headers)?;
        let total = header_end + 4 + content_length;
        if self.buffer.len() < total {
            return Ok(None);
        }

        let body = self.buffer[header_end + 4..total].to_vec();
        self.buffer.drain(..total);

        let response = HttpResponse {
            status: StatusCode(status),
            headers,
            body,
        };
        Ok(Some(if is_event {
            IncomingMessage::Event(response)
        } else {
            IncomingMessage::Response(response)
        }))
    }
}
