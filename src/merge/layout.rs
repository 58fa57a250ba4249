//! `<Layout>` and `<DefaultLayout>` descriptions.

use menutree_source::Element;

use super::SectionError;

/// Inline subdirectories with at most this many items by default
pub(crate) const DEFAULT_INLINE_LIMIT: usize = 4;

/// Which pool a `<Merge>` drains
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MergeKind {
    Menus,
    Files,
    All,
}

/// Presentation options for subdirectories.
///
/// Unset fields fall back to the enclosing layout's attributes, then to the
/// built-in defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct MenunameOptions {
    pub show_empty: Option<bool>,
    pub inline: Option<bool>,
    pub inline_limit: Option<usize>,
    pub inline_header: Option<bool>,
    pub inline_alias: Option<bool>,
}

/// Fully resolved [`MenunameOptions`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct InlinePolicy {
    pub show_empty: bool,
    pub inline: bool,
    /// Zero means unlimited
    pub inline_limit: usize,
    pub inline_header: bool,
    pub inline_alias: bool,
}

impl MenunameOptions {
    fn from_element(element: &Element) -> Result<Self, SectionError> {
        let inline_limit = match element.attr("inline_limit") {
            Some(raw) => Some(raw.trim().parse::<usize>().map_err(|_| {
                SectionError::InvalidAttribute {
                    attribute: "inline_limit",
                    value: raw.to_string(),
                }
            })?),
            None => None,
        };
        Ok(Self {
            show_empty: bool_attr(element, "show_empty")?,
            inline: bool_attr(element, "inline")?,
            inline_limit,
            inline_header: bool_attr(element, "inline_header")?,
            inline_alias: bool_attr(element, "inline_alias")?,
        })
    }

    /// Resolve against the layout-level options
    pub(crate) fn resolve(&self, defaults: &MenunameOptions) -> InlinePolicy {
        InlinePolicy {
            show_empty: self.show_empty.or(defaults.show_empty).unwrap_or(false),
            inline: self.inline.or(defaults.inline).unwrap_or(false),
            inline_limit: self
                .inline_limit
                .or(defaults.inline_limit)
                .unwrap_or(DEFAULT_INLINE_LIMIT),
            inline_header: self.inline_header.or(defaults.inline_header).unwrap_or(true),
            inline_alias: self.inline_alias.or(defaults.inline_alias).unwrap_or(false),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum LayoutNode {
    /// Subdirectory by menu id
    Menuname {
        id: String,
        options: MenunameOptions,
    },
    /// Entry by desktop-file id
    Filename(String),
    Separator,
    Merge(MergeKind),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Layout {
    pub nodes: Vec<LayoutNode>,
    /// Attributes of the `<Layout>` element itself
    pub defaults: MenunameOptions,
}

impl Default for Layout {
    /// Subdirectories first, then entries, each run sorted
    fn default() -> Self {
        Self {
            nodes: vec![
                LayoutNode::Merge(MergeKind::Menus),
                LayoutNode::Merge(MergeKind::Files),
            ],
            defaults: MenunameOptions::default(),
        }
    }
}

impl Layout {
    pub(crate) fn from_element(element: &Element) -> Result<Self, SectionError> {
        let defaults = MenunameOptions::from_element(element)?;
        let mut nodes = Vec::with_capacity(element.children.len());

        for child in &element.children {
            let node = match child.name.as_str() {
                "Menuname" => LayoutNode::Menuname {
                    id: non_empty(child)?,
                    options: MenunameOptions::from_element(child)?,
                },
                "Filename" => LayoutNode::Filename(non_empty(child)?),
                "Separator" => LayoutNode::Separator,
                "Merge" => LayoutNode::Merge(match child.attr("type") {
                    Some("menus") => MergeKind::Menus,
                    Some("files") => MergeKind::Files,
                    Some("all") => MergeKind::All,
                    other => {
                        return Err(SectionError::InvalidAttribute {
                            attribute: "type",
                            value: other.unwrap_or_default().to_string(),
                        })
                    }
                }),
                other => {
                    return Err(SectionError::UnknownElement {
                        element: other.to_string(),
                        context: "layout",
                    })
                }
            };
            nodes.push(node);
        }

        Ok(Self { nodes, defaults })
    }
}

fn bool_attr(element: &Element, name: &'static str) -> Result<Option<bool>, SectionError> {
    match element.attr(name).map(str::trim) {
        None => Ok(None),
        Some("true") => Ok(Some(true)),
        Some("false") => Ok(Some(false)),
        Some(other) => Err(SectionError::InvalidAttribute {
            attribute: name,
            value: other.to_string(),
        }),
    }
}

fn non_empty(element: &Element) -> Result<String, SectionError> {
    match element.text() {
        "" => Err(SectionError::EmptyElement(element.name.clone())),
        text => Ok(text.to_string()),
    }
}
