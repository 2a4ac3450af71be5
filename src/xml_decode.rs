//! Generic XML-to-tree decoder
//!
//! This module turns one XML document into a generic, order-preserving tree of
//! strings, arrays, and objects (`serde_json::Value` with the `preserve_order`
//! feature), without any knowledge of the catalog's schema. The decoder mirrors
//! the loosely-typed shape an XML-to-JSON converter produces:
//!
//! - an element with only text becomes a string,
//! - an element with child elements becomes an object keyed by child name,
//! - repeated sibling names collect into an array,
//! - an element with no content at all becomes an empty object,
//! - attributes merge into the element's object as plain string fields.
//!
//! The one deliberate deviation from a naive converter: element names that are
//! known to be list positions in the catalog (`Series`, `Episode`, ...) always
//! decode as arrays, even when a single sibling is present, so downstream code
//! never has to branch on singleton-vs-array cardinality.

use quick_xml::Reader;
use quick_xml::events::Event;
use serde_json::{Map, Value};
use std::str;
use thiserror::Error;

/// Element names that are always list positions in the catalog's XML.
///
/// The catalog encodes lists as repeated sibling elements, which a generic
/// converter would decode as a plain object when exactly one sibling exists.
/// Forcing these names into arrays removes that ambiguity at the source.
const LIST_ELEMENTS: [&str; 5] = ["Series", "Episode", "Actor", "Banner", "Language"];

/// Errors that can occur while decoding an XML document into a generic tree
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The document is not well-formed XML
    #[error("Malformed XML: {0}")]
    Xml(#[from] quick_xml::Error),

    /// An attribute could not be parsed
    #[error("Malformed XML attribute: {0}")]
    Attribute(#[from] quick_xml::events::attributes::AttrError),

    /// Element names or content are not valid UTF-8
    #[error("XML content is not valid UTF-8: {0}")]
    Utf8(#[from] str::Utf8Error),

    /// The document contained no root element
    #[error("XML document has no root element")]
    MissingRoot,

    /// A closing tag appeared without a matching opening tag
    #[error("Closing tag without a matching opening tag")]
    UnbalancedTag,
}

/// An element currently being assembled while its closing tag is pending.
struct Frame {
    name: String,
    /// Child fields in document order; attributes are inserted first.
    children: Vec<(String, Value)>,
    text: String,
}

/// Decodes one XML document into a generic tree.
///
/// The result is an object with a single key, the root element's name, whose
/// value is the decoded root content. Scalars are always strings; the decoder
/// performs no numeric or boolean coercion.
///
/// # Examples
///
/// ```
/// use thetvdb_client::decode;
///
/// let tree = decode(b"<Data><Series><id>42</id></Series></Data>").unwrap();
/// assert_eq!(tree["Data"]["Series"][0]["id"], "42");
/// ```
pub fn decode(xml: &[u8]) -> Result<Value, DecodeError> {
    let mut reader = Reader::from_reader(xml);
    // Self-closing elements behave exactly like an empty open/close pair
    reader.config_mut().expand_empty_elements = true;

    let mut stack: Vec<Frame> = Vec::new();
    let mut root: Option<(String, Value)> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(start) => {
                let name = str::from_utf8(start.name().as_ref())?.to_string();
                let mut frame = Frame {
                    name,
                    children: Vec::new(),
                    text: String::new(),
                };

                // Attributes become ordinary string fields of the element
                for attribute in start.attributes() {
                    let attribute = attribute?;
                    let key = str::from_utf8(attribute.key.as_ref())?.to_string();
                    let value = attribute.unescape_value()?.into_owned();
                    frame.children.push((key, Value::String(value)));
                }

                stack.push(frame);
            }
            Event::End(_) => {
                let frame = stack.pop().ok_or(DecodeError::UnbalancedTag)?;
                let name = frame.name.clone();
                let value = finish_element(frame);

                match stack.last_mut() {
                    Some(parent) => parent.children.push((name, value)),
                    None => root = Some((name, value)),
                }
            }
            Event::Text(text) => {
                // Text outside the root element (prolog whitespace) is ignored
                if let Some(frame) = stack.last_mut() {
                    frame.text.push_str(&text.unescape()?);
                }
            }
            Event::CData(cdata) => {
                if let Some(frame) = stack.last_mut() {
                    frame.text.push_str(str::from_utf8(&cdata.into_inner())?);
                }
            }
            Event::Eof => break,
            // Declarations, comments, processing instructions, doctypes
            _ => {}
        }
        buf.clear();
    }

    let (name, value) = root.ok_or(DecodeError::MissingRoot)?;
    let mut tree = Map::new();
    tree.insert(name, value);
    Ok(Value::Object(tree))
}

/// Builds the final value for a fully-read element.
///
/// Elements with children become objects (inter-element whitespace is
/// discarded), elements with only text become strings, and elements with
/// nothing at all become empty objects, the catalog's marker for a blank
/// field.
fn finish_element(frame: Frame) -> Value {
    if frame.children.is_empty() {
        if frame.text.is_empty() {
            Value::Object(Map::new())
        } else {
            Value::String(frame.text)
        }
    } else {
        let mut object = Map::new();
        for (name, value) in frame.children {
            insert_child(&mut object, name, value);
        }
        Value::Object(object)
    }
}

/// Inserts a child field, folding repeated names into arrays.
///
/// Known list positions become arrays from their first occurrence; any other
/// name becomes an array only once a second sibling with the same name shows
/// up.
fn insert_child(object: &mut Map<String, Value>, name: String, value: Value) {
    match object.get_mut(&name) {
        Some(Value::Array(items)) => items.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
        }
        None => {
            if LIST_ELEMENTS.contains(&name.as_str()) {
                object.insert(name, Value::Array(vec![value]));
            } else {
                object.insert(name, value);
            }
        }
    }
}
