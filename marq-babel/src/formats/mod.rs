//! Concrete backend implementations.

pub mod ditaxml;
pub mod plaintext;

pub use ditaxml::DitaXmlBackend;
pub use plaintext::PlainTextBackend;

/// Escapes text for XML element content and attribute values.
pub(crate) fn xml_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_covers_markup_chars() {
        assert_eq!(xml_escape(r#"a < b && "c""#), "a &lt; b &amp;&amp; &quot;c&quot;");
        assert_eq!(xml_escape("plain"), "plain");
    }
}
