//! Menu definition (`.menu`) reader.
//!
//! Produces a plain element tree. The element vocabulary (`Include`,
//! `Layout`, `MergeFile`, ...) is not interpreted here, so unknown elements
//! survive and can be ignored or rejected by the merge engine.

use std::path::{Path, PathBuf};

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::debug;

use crate::error::{SourceError, SourceResult};

/// Name of the required root element
const ROOT_ELEMENT: &str = "Menu";

/// One XML element with its attributes, text and children
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    /// Concatenated character data directly inside this element
    pub text: String,
    pub children: Vec<Element>,
}

impl Element {
    /// Create an empty element
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Attribute value by name
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Element text with surrounding whitespace removed
    pub fn text(&self) -> &str {
        self.text.trim()
    }

    /// Direct children with the given element name
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }
}

/// A definition file read from disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuDocument {
    pub path: PathBuf,
    pub root: Element,
}

/// Load and parse a menu definition file
pub fn load_menu(path: &Path) -> SourceResult<MenuDocument> {
    let content = std::fs::read_to_string(path).map_err(|e| SourceError::io(path, e))?;
    let root = parse_menu(&content)?;
    Ok(MenuDocument {
        path: path.to_path_buf(),
        root,
    })
}

/// Parse menu definition XML into an element tree rooted at `<Menu>`
pub fn parse_menu(xml: &str) -> SourceResult<Element> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        match reader.read_event()? {
            Event::Start(ref e) => {
                stack.push(element_from_start(e)?);
            }
            Event::Empty(ref e) => {
                let element = element_from_start(e)?;
                attach(&mut stack, &mut root, element);
            }
            Event::End(_) => {
                // quick-xml already verified the end name matches
                if let Some(element) = stack.pop() {
                    attach(&mut stack, &mut root, element);
                }
            }
            Event::Text(ref t) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&t.unescape()?);
                }
            }
            Event::CData(t) => {
                if let Some(current) = stack.last_mut() {
                    current
                        .text
                        .push_str(&String::from_utf8_lossy(&t.into_inner()));
                }
            }
            Event::Eof => break,
            // Declarations, DOCTYPE, comments and processing instructions
            _ => {}
        }
    }

    let root = root.ok_or(SourceError::Empty)?;
    if root.name != ROOT_ELEMENT {
        return Err(SourceError::UnexpectedRoot(root.name));
    }
    Ok(root)
}

fn element_from_start(start: &BytesStart<'_>) -> SourceResult<Element> {
    let mut element = Element::new(String::from_utf8_lossy(start.name().as_ref()));
    for attr in start.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value()?.into_owned();
        element.attributes.push((key, value));
    }
    Ok(element)
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        // Only the first top-level element counts as the document root
        None => {
            if root.is_none() {
                *root = Some(element);
            } else {
                debug!(element = %element.name, "ignoring element after document root");
            }
        }
    }
}
