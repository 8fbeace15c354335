use crate::types::Message;

/// Serialize a [`Message`] to a JSON string.
///
/// When `pretty` is `true` the output is indented for readability.
pub fn format_json(message: &Message, pretty: bool) -> String {
    let rendered = if pretty {
        serde_json::to_string_pretty(message)
    } else {
        serde_json::to_string(message)
    };
    rendered.unwrap_or_else(|e| format!("{{\"error\": \"{e}\"}}"))
}

/// Render a [`Message`] in a human-readable debug format.
pub fn format_debug(message: &Message) -> String {
    let mut out = String::with_capacity(256);

    if message.is_response() {
        out.push_str("=== HTTP Response ===\n");
        if let Some(code) = message.status_code {
            out.push_str(&format!("Status:  {code}\n"));
        }
        if let Some(text) = &message.status_text {
            out.push_str(&format!("Reason:  {text}\n"));
        }
    } else {
        out.push_str("=== HTTP Request ===\n");
        out.push_str(&format!("Method:  {}\n", message.method.as_deref().unwrap_or("")));
        out.push_str(&format!("URL:     {}\n", message.url.as_deref().unwrap_or("")));
    }
    out.push_str(&format!(
        "Version: HTTP/{}.{}\n",
        message.http_major, message.http_minor
    ));
    out.push_str(&format!("Complete: {}\n", message.complete));

    out.push_str(&format!("\n--- Headers ({}) ---\n", message.headers.len()));
    for (name, value) in &message.headers {
        out.push_str(&format!("  {name}: {value}\n"));
    }

    if message.body.is_empty() {
        out.push_str("\n--- No Body ---\n");
    } else {
        out.push_str(&format!("\n--- Body ({} bytes) ---\n", message.body.len()));
        match message.body_as_str() {
            Some(s) => out.push_str(s),
            None => {
                out.push_str("<not UTF-8, shown lossily>\n");
                out.push_str(&message.body_as_lossy_string());
            }
        }
        out.push('\n');
    }

    out.push_str("====================\n");
    out
}

/// Render only the start line and headers (no body).
pub fn format_headers_only(message: &Message) -> String {
    let mut out = String::with_capacity(64 + message.headers.len() * 40);

    let version = format!("HTTP/{}.{}", message.http_major, message.http_minor);
    if message.is_response() {
        out.push_str(&format!(
            "{version} {} {}\n",
            message.status_code.unwrap_or_default(),
            message.status_text.as_deref().unwrap_or("")
        ));
    } else {
        out.push_str(&format!(
            "{} {} {version}\n",
            message.method.as_deref().unwrap_or(""),
            message.url.as_deref().unwrap_or("")
        ));
    }

    for (name, value) in &message.headers {
        out.push_str(&format!("{name}: {value}\n"));
    }

    out
}
