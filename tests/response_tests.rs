use wirefold::{
    parse_message, serialize_response, serialize_response_with_reason, Headers, ParserMode,
    ResponseTemplate,
};

fn headers(pairs: &[(&str, &str)]) -> Headers {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[test]
fn status_headers_and_body() {
    let h = headers(&[("Content-Length", "5")]);
    let wire = serialize_response(200, Some(&h), Some(b"hello"));
    assert_eq!(wire, b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\nhello");
}

#[test]
fn no_headers_no_body() {
    assert_eq!(serialize_response(204, None, None), b"HTTP/1.1 204 OK\r\n\r\n");
    assert_eq!(
        serialize_response(204, Some(&Headers::new()), Some(b"")),
        b"HTTP/1.1 204 OK\r\n\r\n"
    );
}

#[test]
fn reason_phrase_is_fixed_for_every_status() {
    let wire = serialize_response(404, None, None);
    assert!(wire.starts_with(b"HTTP/1.1 404 OK\r\n"));
}

#[test]
fn custom_reason_phrase() {
    let wire = serialize_response_with_reason(404, "Not Found", None, Some(b"gone"));
    assert_eq!(wire, b"HTTP/1.1 404 Not Found\r\n\r\ngone");
}

#[test]
fn headers_written_in_insertion_order() {
    let h = headers(&[("Zeta", "1"), ("Alpha", "2"), ("Content-Type", "text/plain")]);
    let wire = serialize_response(200, Some(&h), None);
    assert_eq!(
        wire,
        b"HTTP/1.1 200 OK\r\nZeta: 1\r\nAlpha: 2\r\nContent-Type: text/plain\r\n\r\n"
    );
}

#[test]
fn binary_body_is_verbatim() {
    let body = [0u8, 0xFF, b'\r', b'\n', 0x80];
    let wire = serialize_response(200, None, Some(&body));
    assert!(wire.ends_with(&body));
}

#[test]
fn serialized_response_parses_back() {
    let h = headers(&[("Content-Length", "11"), ("X-Trace", "abc")]);
    let wire = serialize_response_with_reason(201, "Created", Some(&h), Some(b"hello world"));

    let msg = parse_message(ParserMode::Response, &wire).unwrap();
    assert_eq!(msg.status_code, Some(201));
    assert_eq!(msg.status_text.as_deref(), Some("Created"));
    assert_eq!(msg.headers, h);
    assert_eq!(msg.body, b"hello world");
}

#[test]
fn template_from_json() {
    let template: ResponseTemplate = serde_json::from_str(
        r#"{"status": 503, "reason": "Service Unavailable",
            "headers": {"Retry-After": "30", "Content-Length": "4"}, "body": "busy"}"#,
    )
    .unwrap();

    assert_eq!(
        template.to_bytes(),
        b"HTTP/1.1 503 Service Unavailable\r\nRetry-After: 30\r\nContent-Length: 4\r\n\r\nbusy"
    );
}

#[test]
fn template_without_reason_uses_default() {
    let template: ResponseTemplate = serde_json::from_str(r#"{"status": 302}"#).unwrap();
    assert_eq!(template.to_bytes(), b"HTTP/1.1 302 OK\r\n\r\n");
}
