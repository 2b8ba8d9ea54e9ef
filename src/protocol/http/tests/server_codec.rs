use crate::protocol::http::server_codec::{MAX_BODY_SIZE, ParseError};
use crate::protocol::http::{
    HttpServerCodec, Method, ResponseBuilder, StatusCode, encode_event,
};

#[test]
fn test_parse_get_with_query() {
    let mut codec = HttpServerCodec::new();
    codec.feed(b"GET /characteristics?id=1.9,2.14&meta=1 HTTP/1.1\r\nHost: lights.local\r\n\r\n");

    let request = codec.decode().unwrap().unwrap();
    assert_eq!(request.method, Method::Get);
    assert_eq!(request.path, "/characteristics");
    assert_eq!(request.query_param("id"), Some("1.9,2.14"));
    assert!(request.query_flag("meta"));
    assert!(!request.query_flag("perms"));
    assert!(request.body.is_empty());
}

#[test]
fn test_parse_post_with_body() {
    let body = [0x06, 0x01, 0x01];
    let mut raw = format!(
        "POST /pair-setup HTTP/1.1\r\n\
         Content-Type: application/pairing+tlv8\r\n\
         Content-Length: {}\r\n\
         \r\n",
        body.len()
    )
    .into_bytes();
    raw.extend_from_slice(&body);

    let mut codec = HttpServerCodec::new();
    codec.feed(&raw);

    let request = codec.decode().unwrap().unwrap();
    assert_eq!(request.method, Method::Post);
    assert_eq!(request.path, "/pair-setup");
    assert_eq!(request.query, "");
    assert_eq!(request.body, body);
    assert_eq!(
        request.headers.content_type(),
        Some("application/pairing+tlv8")
    );
}

#[test]
fn test_parse_incomplete_headers() {
    let mut codec = HttpServerCodec::new();
    codec.feed(b"GET /accessories HTTP/1.1\r\n");
    assert!(codec.decode().unwrap().is_none());

    codec.feed(b"\r\n");
    let request = codec.decode().unwrap().unwrap();
    assert_eq!(request.path, "/accessories");
}

#[test]
fn test_parse_incomplete_body() {
    let mut codec = HttpServerCodec::new();
    codec.feed(b"PUT /characteristics HTTP/1.1\r\nContent-Length: 10\r\n\r\n{\"ch");
    assert!(codec.decode().unwrap().is_none());

    codec.feed(b"ar\":[]}");
    let request = codec.decode().unwrap().unwrap();
    assert_eq!(request.body, b"{\"char\":[]".to_vec());
    assert_eq!(codec.buffer_len(), 1);
}

#[test]
fn test_pipelined_requests() {
    let mut codec = HttpServerCodec::new();
    codec.feed(b"GET /accessories HTTP/1.1\r\n\r\nGET /characteristics?id=1.2 HTTP/1.1\r\n\r\n");

    let first = codec.decode().unwrap().unwrap();
    let second = codec.decode().unwrap().unwrap();
    assert_eq!(first.path, "/accessories");
    assert_eq!(second.path, "/characteristics");
    assert!(codec.decode().unwrap().is_none());
}

#[test]
fn test_take_remaining_after_request() {
    let mut codec = HttpServerCodec::new();
    codec.feed(b"POST /pair-verify HTTP/1.1\r\nContent-Length: 0\r\n\r\n\x10\x00\xAA\xBB");

    codec.decode().unwrap().unwrap();
    assert_eq!(codec.take_remaining(), vec![0x10, 0x00, 0xAA, 0xBB]);
    assert_eq!(codec.buffer_len(), 0);
}

#[test]
fn test_invalid_method() {
    let mut codec = HttpServerCodec::new();
    codec.feed(b"BREW /pot HTTP/1.1\r\n\r\n");
    assert_eq!(
        codec.decode(),
        Err(ParseError::InvalidMethod("BREW".to_string()))
    );
}

#[test]
fn test_invalid_protocol() {
    let mut codec = HttpServerCodec::new();
    codec.feed(b"GET /accessories RTSP/1.0\r\n\r\n");
    assert!(matches!(
        codec.decode(),
        Err(ParseError::InvalidRequestLine(_))
    ));
}

#[test]
fn test_invalid_header_line() {
    let mut codec = HttpServerCodec::new();
    codec.feed(b"GET /accessories HTTP/1.1\r\nno-colon-here\r\n\r\n");
    assert!(matches!(codec.decode(), Err(ParseError::InvalidHeader(_))));
}

#[test]
fn test_body_too_large() {
    let mut codec = HttpServerCodec::new();
    codec.feed(
        format!(
            "PUT /characteristics HTTP/1.1\r\nContent-Length: {}\r\n\r\n",
            MAX_BODY_SIZE + 1
        )
        .as_bytes(),
    );
    assert!(matches!(
        codec.decode(),
        Err(ParseError::BodyTooLarge { .. })
    ));
}

#[test]
fn test_bad_content_length() {
    let mut codec = HttpServerCodec::new();
    codec.feed(b"PUT /characteristics HTTP/1.1\r\nContent-Length: lots\r\n\r\n");
    assert!(matches!(
        codec.decode(),
        Err(ParseError::InvalidContentLength(_))
    ));
}

#[test]
fn test_encode_json_response() {
    let encoded = ResponseBuilder::new(StatusCode::MULTI_STATUS)
        .json_body(&serde_json::json!({"characteristics": []}))
        .encode();
    let text = String::from_utf8(encoded).unwrap();

    assert!(text.starts_with("HTTP/1.1 207 Multi-Status\r\n"));
    assert!(text.contains("Content-Type: application/hap+json\r\n"));
    assert!(text.contains("Content-Length: 22\r\n"));
    assert!(text.ends_with("\r\n\r\n{\"characteristics\":[]}"));
}

#[test]
fn test_encode_no_content_has_no_length() {
    let text = String::from_utf8(ResponseBuilder::no_content().encode()).unwrap();
    assert_eq!(text, "HTTP/1.1 204 No Content\r\n\r\n");
}

#[test]
fn test_encode_tlv_response() {
    let response = ResponseBuilder::ok().tlv_body(vec![0x06, 0x01, 0x02]).build();
    assert_eq!(
        response.headers.content_type(),
        Some("application/pairing+tlv8")
    );
    assert_eq!(response.headers.content_length(), Some(3));
}

#[test]
fn test_encode_event_frame() {
    let body = br#"{"characteristics":[]}"#;
    let encoded = encode_event(body);

    let expected = format!(
        "EVENT/1.0 200 OK\r\nContent-Type: application/hap+json\r\nContent-Length: {}\r\n\r\n{}",
        body.len(),
        std::str::from_utf8(body).unwrap()
    );
    assert_eq!(encoded, expected.into_bytes());
}
