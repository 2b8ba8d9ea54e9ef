use crate::protocol::http::{
    HttpClientCodec, IncomingMessage, ResponseBuilder, StatusCode, encode_event,
};

#[test]
fn test_decode_response_then_event() {
    let mut bytes = ResponseBuilder::new(StatusCode::OK)
        .json_body(&serde_json::json!({"characteristics": [{"aid": 1, "iid": 9, "value": true}]}))
        .encode();
    bytes.extend_from_slice(&encode_event(br#"{"characteristics":[]}"#));

    let mut codec = HttpClientCodec::new();
    codec.feed(&bytes);

    let Some(IncomingMessage::Response(response)) = codec.decode().unwrap() else {
        panic!("expected response");
    };
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json().unwrap()["characteristics"][0]["value"], true);

    let Some(IncomingMessage::Event(event)) = codec.decode().unwrap() else {
        panic!("expected event");
    };
    assert_eq!(event.body, br#"{"characteristics":[]}"#);
    assert!(codec.decode().unwrap().is_none());
}

#[test]
fn test_decode_split_delivery() {
    let bytes = ResponseBuilder::ok().tlv_body(vec![0x06, 0x01, 0x04]).encode();
    let (head, tail) = bytes.split_at(bytes.len() - 2);

    let mut codec = HttpClientCodec::new();
    codec.feed(head);
    assert!(codec.decode().unwrap().is_none());
    codec.feed(tail);

    let Some(IncomingMessage::Response(response)) = codec.decode().unwrap() else {
        panic!("expected response");
    };
    assert_eq!(response.body, vec![0x06, 0x01, 0x04]);
}

#[test]
fn test_decode_no_content() {
    let mut codec = HttpClientCodec::new();
    codec.feed(&ResponseBuilder::no_content().encode());

    let Some(IncomingMessage::Response(response)) = codec.decode().unwrap() else {
        panic!("expected response");
    };
    assert_eq!(response.status, StatusCode::NO_CONTENT);
    assert!(response.body.is_empty());
}

#[test]
fn test_rejects_unknown_protocol() {
    let mut codec = HttpClientCodec::new();
    codec.feed(b"RTSP/1.0 200 OK\r\n\r\n");
    assert!(codec.decode().is_err());
}
