use crate::protocol::http::{Headers, names};

#[test]
fn test_case_insensitive_lookup() {
    let mut headers = Headers::new();
    headers.insert("content-length", "42");
    assert_eq!(headers.get(names::CONTENT_LENGTH), Some("42"));
    assert_eq!(headers.content_length(), Some(42));
    assert!(headers.contains("CONTENT-LENGTH"));
}

#[test]
fn test_insert_replaces_and_keeps_order() {
    let mut headers = Headers::new();
    headers.insert("Content-Type", "text/plain");
    headers.insert("Content-Length", "0");
    headers.insert("content-type", "application/hap+json");

    let collected: Vec<_> = headers.iter().collect();
    assert_eq!(
        collected,
        vec![
            ("content-type", "application/hap+json"),
            ("Content-Length", "0")
        ]
    );
    assert_eq!(headers.len(), 2);
}

#[test]
fn test_empty_headers() {
    let headers = Headers::new();
    assert!(headers.is_empty());
    assert_eq!(headers.content_type(), None);
    assert_eq!(headers.content_length(), None);
}
