//! TwiML reply rendering
//!
//! The synchronous webhook reply is a small XML document the provider reads
//! from the HTTP response body. Only the `<Message>` verb is needed here.

/// Builder for a messaging TwiML response
#[derive(Debug, Default)]
pub struct MessagingResponse {
    messages: Vec<String>,
}

impl MessagingResponse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message verb
    pub fn message(mut self, text: &str) -> Self {
        self.messages.push(text.to_string());
        self
    }

    /// Render the response document
    pub fn to_xml(&self) -> String {
        let mut xml =
            String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?><Response>");
        for message in &self.messages {
            xml.push_str("<Message>");
            xml.push_str(&escape_xml(message));
            xml.push_str("</Message>");
        }
        xml.push_str("</Response>");
        xml
    }
}

fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            other => escaped.push(other),
        }
    }
    escaped
}
