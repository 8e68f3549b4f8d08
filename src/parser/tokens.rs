use std::borrow::Cow;

use quick_xml::encoding::Decoder;
use quick_xml::escape::{resolve_html5_entity, unescape_with};
use quick_xml::events::{BytesStart, BytesText, Event};
use quick_xml::Reader;
use tracing::debug;

/// Elements whose content is raw text, never markup.
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

/// Structural markup event, in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Open {
        name: String,
        attrs: Vec<(String, String)>,
    },
    Text(String),
    Close(String),
}

/// Split an HTML document into open/text/close tokens.
///
/// Tag and attribute names are lowercased and entities are decoded. Comments,
/// doctype and processing instructions are dropped. Tokenizing stops quietly
/// at the first syntax error; whatever was read up to that point is returned.
pub fn tokenize(markup: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut offset = 0;
    while let Some(consumed) = tokenize_segment(&markup[offset..], &mut tokens) {
        offset += consumed;
    }
    tokens
}

/// Read events until end of input, or until a raw-text element has been
/// consumed. In the latter case returns the byte offset to resume from.
fn tokenize_segment(markup: &str, tokens: &mut Vec<Token>) -> Option<usize> {
    let mut reader = Reader::from_str(markup);
    reader.config_mut().check_end_names = false;
    reader.config_mut().allow_unmatched_ends = true;
    let decoder = reader.decoder();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = tag_name(e.name().as_ref());
                tokens.push(Token::Open {
                    attrs: attributes(&e, decoder),
                    name: name.clone(),
                });
                if RAW_TEXT_ELEMENTS.contains(&name.as_str()) {
                    let body_start = reader.buffer_position() as usize;
                    return Some(consume_raw_text(markup, body_start, &name, tokens));
                }
            }
            Ok(Event::Empty(e)) => {
                let name = tag_name(e.name().as_ref());
                tokens.push(Token::Open {
                    attrs: attributes(&e, decoder),
                    name: name.clone(),
                });
                tokens.push(Token::Close(name));
            }
            Ok(Event::Text(e)) => tokens.push(Token::Text(text(&e))),
            Ok(Event::End(e)) => tokens.push(Token::Close(tag_name(e.name().as_ref()))),
            Ok(Event::Eof) => return None,
            Ok(_) => {}
            Err(e) => {
                debug!(
                    position = reader.error_position(),
                    error = %e,
                    "Stopping tokenizer on malformed markup"
                );
                return None;
            }
        }
    }
}

/// Emit the body of a raw-text element and its close tag. Returns the offset
/// just past the close tag.
fn consume_raw_text(markup: &str, body_start: usize, name: &str, tokens: &mut Vec<Token>) -> usize {
    let rest = &markup[body_start..];
    let closing = format!("</{}", name);
    let Some(end) = rest.to_ascii_lowercase().find(&closing) else {
        if !rest.is_empty() {
            tokens.push(Token::Text(rest.to_string()));
        }
        return markup.len();
    };

    if end > 0 {
        tokens.push(Token::Text(rest[..end].to_string()));
    }
    tokens.push(Token::Close(name.to_string()));
    match rest[end..].find('>') {
        Some(gt) => body_start + end + gt + 1,
        None => markup.len(),
    }
}

fn tag_name(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).to_ascii_lowercase()
}

fn attributes(e: &BytesStart<'_>, decoder: Decoder) -> Vec<(String, String)> {
    e.html_attributes()
        .with_checks(false)
        .filter_map(|attr| match attr {
            Ok(a) => Some(a),
            Err(err) => {
                debug!(error = %err, "Skipping unreadable attribute");
                None
            }
        })
        .map(|a| {
            let key = String::from_utf8_lossy(a.key.as_ref()).to_ascii_lowercase();
            let value = a
                .decode_and_unescape_value_with(decoder, resolve_html5_entity)
                .map(Cow::into_owned)
                .unwrap_or_else(|_| unescape_lenient(&String::from_utf8_lossy(&a.value)));
            (key, value)
        })
        .collect()
}

fn text(e: &BytesText<'_>) -> String {
    match e.unescape_with(resolve_html5_entity) {
        Ok(t) => t.into_owned(),
        Err(_) => unescape_lenient(&String::from_utf8_lossy(e)),
    }
}

/// Decode each `&...;` run on its own. An `&` that does not start a known
/// entity is kept as a literal.
fn unescape_lenient(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        let run_len = tail[1..]
            .find(|c: char| c == ';' || c == '&' || c.is_whitespace())
            .filter(|&i| tail.as_bytes()[i + 1] == b';')
            .map(|i| i + 2);
        let decoded = run_len.and_then(|len| unescape_with(&tail[..len], resolve_html5_entity).ok());
        match (run_len, decoded) {
            (Some(len), Some(d)) => {
                out.push_str(&d);
                rest = &tail[len..];
            }
            _ => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open(name: &str, attrs: &[(&str, &str)]) -> Token {
        Token::Open {
            name: name.to_string(),
            attrs: attrs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[test]
    fn open_text_close() {
        let tokens = tokenize(r#"<span class="timezone--time">06:00</span>"#);
        assert_eq!(
            tokens,
            vec![
                open("span", &[("class", "timezone--time")]),
                Token::Text("06:00".into()),
                Token::Close("span".into()),
            ]
        );
    }

    #[test]
    fn names_are_lowercased() {
        let tokens = tokenize(r#"<H3 DATA-PID="b0">x</H3>"#);
        assert_eq!(tokens[0], open("h3", &[("data-pid", "b0")]));
        assert_eq!(tokens[2], Token::Close("h3".into()));
    }

    #[test]
    fn attribute_values_are_not_trimmed() {
        let tokens = tokenize(r#"<span class="programme__title ">"#);
        assert_eq!(tokens[0], open("span", &[("class", "programme__title ")]));
    }

    #[test]
    fn html_entities_decoded() {
        let tokens = tokenize("<p>Tom &amp; Jerry&nbsp;&#39;s</p>");
        assert_eq!(tokens[1], Token::Text("Tom & Jerry\u{a0}'s".into()));
    }

    #[test]
    fn bare_ampersand_keeps_other_entities_decoded() {
        let tokens = tokenize("<span>Tom & Jerry &amp; co&#33; &bogus; &</span>");
        assert_eq!(tokens[1], Token::Text("Tom & Jerry & co! &bogus; &".into()));
    }

    #[test]
    fn bare_ampersand_in_attribute_value() {
        let tokens = tokenize(r#"<a title="R&B &amp; Soul">x</a>"#);
        assert_eq!(tokens[0], open("a", &[("title", "R&B & Soul")]));
    }

    #[test]
    fn unquoted_and_valueless_attributes() {
        let tokens = tokenize("<input type=checkbox checked>");
        assert_eq!(tokens[0], open("input", &[("type", "checkbox"), ("checked", "")]));
    }

    #[test]
    fn self_closing_emits_open_and_close() {
        let tokens = tokenize(r#"<meta content="2017-04-14"/>"#);
        assert_eq!(
            tokens,
            vec![
                open("meta", &[("content", "2017-04-14")]),
                Token::Close("meta".into()),
            ]
        );
    }

    #[test]
    fn void_elements_without_close_are_tolerated() {
        let tokens = tokenize("<div><br><p>a</p></div>");
        assert_eq!(tokens.len(), 6);
        assert_eq!(tokens.last(), Some(&Token::Close("div".into())));
    }

    #[test]
    fn script_content_is_raw_text() {
        let tokens = tokenize("<script>if (a<b && c>d) {}</script><h3>x</h3>");
        assert_eq!(
            tokens,
            vec![
                open("script", &[]),
                Token::Text("if (a<b && c>d) {}".into()),
                Token::Close("script".into()),
                open("h3", &[]),
                Token::Text("x".into()),
                Token::Close("h3".into()),
            ]
        );
    }

    #[test]
    fn unterminated_script_swallows_rest() {
        let tokens = tokenize("<script>var a = '<h3>';");
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[1], Token::Text("var a = '<h3>';".into()));
    }

    #[test]
    fn comments_and_doctype_dropped() {
        let tokens = tokenize("<!DOCTYPE html><!-- note --><html></html>");
        assert_eq!(tokens, vec![open("html", &[]), Token::Close("html".into())]);
    }

    #[test]
    fn whitespace_text_is_kept() {
        let tokens = tokenize("<a>\n  </a>");
        assert_eq!(tokens[1], Token::Text("\n  ".into()));
    }
}
