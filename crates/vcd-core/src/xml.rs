//! XML encoding and decoding with the vCD wire conventions.
//!
//! Payloads start with the standard XML declaration. Every element line is
//! prefixed with two spaces and nested elements are indented by four.

use crate::{Error, Result};
use quick_xml::events::{BytesText, Event};
use quick_xml::se::Serializer;
use quick_xml::{Reader, Writer};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::borrow::Cow;

/// Standard XML declaration, including the trailing newline.
pub const XML_HEADER: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n";

/// Prefix written at the start of each element line.
pub const LINE_PREFIX: &str = "  ";

/// Indentation added per nesting level.
pub const INDENT_SIZE: usize = 4;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Previous {
    Nothing,
    Open,
    Close,
    Text,
}

/// Encode `value` as an indented XML document, declaration included.
///
/// Layout whitespace is only ever inserted between markup. Leading and
/// trailing whitespace of text content is written as character references
/// so it survives decoders that trim text.
///
/// # Errors
///
/// Returns [`Error::XmlEncode`] if the value cannot be represented as XML.
pub fn to_xml_document<T>(value: &T) -> Result<String>
where
    T: Serialize + ?Sized,
{
    let mut compact = String::new();
    value
        .serialize(Serializer::new(&mut compact))
        .map_err(encode_error)?;

    let mut reader = Reader::from_str(&compact);
    let mut writer = Writer::new(XML_HEADER.as_bytes().to_vec());
    let mut depth = 0usize;
    let mut previous = Previous::Nothing;

    loop {
        match reader.read_event().map_err(encode_error)? {
            Event::Eof => break,
            Event::Start(start) => {
                if previous != Previous::Text {
                    break_line(writer.get_mut(), depth, previous);
                }
                writer.write_event(Event::Start(start)).map_err(encode_error)?;
                depth += 1;
                previous = Previous::Open;
            }
            Event::End(end) => {
                depth = depth.saturating_sub(1);
                if previous == Previous::Close {
                    break_line(writer.get_mut(), depth, previous);
                }
                writer.write_event(Event::End(end)).map_err(encode_error)?;
                previous = Previous::Close;
            }
            Event::Empty(empty) => {
                if previous != Previous::Text {
                    break_line(writer.get_mut(), depth, previous);
                }
                writer.write_event(Event::Empty(empty)).map_err(encode_error)?;
                previous = Previous::Close;
            }
            Event::Text(text) => {
                let raw = std::str::from_utf8(&text).map_err(encode_error)?;
                let text = BytesText::from_escaped(reference_edge_whitespace(raw));
                writer.write_event(Event::Text(text)).map_err(encode_error)?;
                previous = Previous::Text;
            }
            other => {
                writer.write_event(other).map_err(encode_error)?;
                previous = Previous::Text;
            }
        }
    }

    String::from_utf8(writer.into_inner()).map_err(encode_error)
}

fn encode_error(err: impl std::fmt::Display) -> Error {
    Error::XmlEncode(err.to_string())
}

fn break_line(out: &mut Vec<u8>, depth: usize, previous: Previous) {
    if previous != Previous::Nothing {
        out.push(b'\n');
    }
    out.extend_from_slice(LINE_PREFIX.as_bytes());
    out.resize(out.len() + depth * INDENT_SIZE, b' ');
}

fn is_xml_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\r')
}

/// Replace leading and trailing whitespace of escaped text with numeric
/// character references.
fn reference_edge_whitespace(raw: &str) -> Cow<'_, str> {
    let inner = raw.trim_matches(is_xml_space);
    if inner.len() == raw.len() {
        return Cow::Borrowed(raw);
    }

    let lead = raw.len() - raw.trim_start_matches(is_xml_space).len();
    let (head, rest) = raw.split_at(lead);
    let tail = &rest[inner.len()..];

    let mut out = String::with_capacity(raw.len() + 6 * (head.len() + tail.len()));
    push_char_refs(&mut out, head);
    out.push_str(inner);
    push_char_refs(&mut out, tail);
    Cow::Owned(out)
}

fn push_char_refs(out: &mut String, whitespace: &str) {
    for c in whitespace.chars() {
        out.push_str("&#");
        out.push_str(&u32::from(c).to_string());
        out.push(';');
    }
}

/// Decode an XML document into `T`.
///
/// Unknown elements and attributes are ignored, including unknown elements
/// placed between the items of a list.
///
/// # Errors
///
/// Returns [`Error::XmlDecode`] when the document is malformed or does not
/// match the shape of `T`.
pub fn from_xml_str<T>(document: &str) -> Result<T>
where
    T: DeserializeOwned,
{
    quick_xml::de::from_str(document).map_err(|err| Error::XmlDecode(err.to_string()))
}
