//! Generic mdast tree shared by the parse and stringify directions.
//!
//! markdown-rs produces its own mdast but has no directive nodes and no way
//! back to text. This tree is the subset this crate maps, plus
//! `containerDirective`, `leafDirective` and `textDirective` for shortcodes.
//! [`from_markdown`] lowers a markdown-rs tree into it and rejects every
//! construct that has no mapping.

use crate::{DepthGuard, RichmarkError};
use markdown::mdast as md;
use serde::{Deserialize, Serialize};

/// An mdast node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Node {
    /// Document root.
    Root(Root),
    /// Paragraph of phrasing content.
    Paragraph(Parent),
    /// ATX heading.
    Heading(Heading),
    /// Horizontal rule.
    ThematicBreak,
    /// Block quote of flow content.
    Blockquote(Parent),
    /// Ordered or bullet list.
    List(List),
    /// Item of a list.
    ListItem(ListItem),
    /// Fenced or indented code.
    Code(Code),
    /// Raw HTML, flow or phrasing.
    Html(Literal),
    /// GFM table.
    Table(Table),
    /// Row of a table.
    TableRow(Parent),
    /// Cell of a table row.
    TableCell(Parent),
    /// Plain text.
    Text(Literal),
    /// Emphasis (`*a*`).
    Emphasis(Parent),
    /// Strong (`**a**`).
    Strong(Parent),
    /// GFM strikethrough (`~~a~~`).
    Delete(Parent),
    /// Code span.
    InlineCode(Literal),
    /// Hard line break.
    Break,
    /// Inline link.
    Link(Link),
    /// Inline image.
    Image(Image),
    /// MDX JSX element in flow position.
    MdxJsxFlowElement(JsxElement),
    /// MDX JSX element in phrasing position.
    MdxJsxTextElement(JsxElement),
    /// Shortcode with nested flow content.
    ContainerDirective(Directive),
    /// Shortcode on a line of its own.
    LeafDirective(Directive),
    /// Shortcode inside running text.
    TextDirective(Directive),
}

/// Root node.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Root {
    /// Flow children.
    pub children: Vec<Node>,
}

/// Node with children and no other fields.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Parent {
    /// Children.
    pub children: Vec<Node>,
}

/// Node carrying a single string value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Literal {
    /// The value.
    pub value: String,
}

/// Heading node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Heading {
    /// Level, 1 to 6.
    pub depth: u8,
    /// Phrasing children.
    pub children: Vec<Node>,
}

/// List node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct List {
    /// Numbered list when true.
    pub ordered: bool,
    /// First number of an ordered list.
    pub start: Option<u32>,
    /// Whether items are separated by blank lines.
    pub spread: bool,
    /// `listItem` children.
    pub children: Vec<Node>,
}

/// List item node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListItem {
    /// Whether the item's children are separated by blank lines.
    pub spread: bool,
    /// Flow children.
    pub children: Vec<Node>,
}

/// Code block node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Code {
    /// Language from the info string.
    pub lang: Option<String>,
    /// Rest of the info string.
    pub meta: Option<String>,
    /// Code content.
    pub value: String,
}

/// Column alignment of a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlignKind {
    /// `:--`
    Left,
    /// `--:`
    Right,
    /// `:-:`
    Center,
    /// `---`
    #[default]
    None,
}

/// Table node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    /// Alignment per column.
    pub align: Vec<AlignKind>,
    /// `tableRow` children, the first one is the header.
    pub children: Vec<Node>,
}

/// Link node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    /// Destination.
    pub url: String,
    /// Optional title.
    pub title: Option<String>,
    /// Phrasing children.
    pub children: Vec<Node>,
}

/// Image node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Image {
    /// Source.
    pub url: String,
    /// Optional title.
    pub title: Option<String>,
    /// Alternative text.
    pub alt: String,
}

/// MDX JSX element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsxElement {
    /// Element name.
    pub name: String,
    /// Attributes in source order.
    pub attributes: Vec<JsxAttribute>,
    /// Flow or phrasing children, matching the element's position.
    pub children: Vec<Node>,
}

/// A `name` or `name=value` JSX attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsxAttribute {
    /// Attribute name.
    pub name: String,
    /// Value, absent for boolean shorthand.
    pub value: Option<AttributeValue>,
}

/// A JSX attribute value - either a literal string or an expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum AttributeValue {
    /// A literal string value (from key="value").
    Literal(String),
    /// An expression (from key={expression}), without the braces.
    Expression(String),
}

/// Shortcode directive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Directive {
    /// Template name.
    pub name: String,
    /// String attributes in source order; positional values use `_value`.
    pub attributes: Vec<DirectiveAttribute>,
    /// Flow children (container directives only).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Node>,
}

/// Attribute of a directive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectiveAttribute {
    /// Attribute name, `_value` for a positional value.
    pub name: String,
    /// Attribute value.
    pub value: String,
}

impl DirectiveAttribute {
    /// Creates a named attribute.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

impl Node {
    /// Creates a text node.
    pub fn text(value: impl Into<String>) -> Self {
        Node::Text(Literal {
            value: value.into(),
        })
    }

    /// Creates a paragraph node.
    pub fn paragraph(children: Vec<Node>) -> Self {
        Node::Paragraph(Parent { children })
    }

    /// The mdast type name of this node.
    pub fn kind(&self) -> &'static str {
        match self {
            Node::Root(_) => "root",
            Node::Paragraph(_) => "paragraph",
            Node::Heading(_) => "heading",
            Node::ThematicBreak => "thematicBreak",
            Node::Blockquote(_) => "blockquote",
            Node::List(_) => "list",
            Node::ListItem(_) => "listItem",
            Node::Code(_) => "code",
            Node::Html(_) => "html",
            Node::Table(_) => "table",
            Node::TableRow(_) => "tableRow",
            Node::TableCell(_) => "tableCell",
            Node::Text(_) => "text",
            Node::Emphasis(_) => "emphasis",
            Node::Strong(_) => "strong",
            Node::Delete(_) => "delete",
            Node::InlineCode(_) => "inlineCode",
            Node::Break => "break",
            Node::Link(_) => "link",
            Node::Image(_) => "image",
            Node::MdxJsxFlowElement(_) => "mdxJsxFlowElement",
            Node::MdxJsxTextElement(_) => "mdxJsxTextElement",
            Node::ContainerDirective(_) => "containerDirective",
            Node::LeafDirective(_) => "leafDirective",
            Node::TextDirective(_) => "textDirective",
        }
    }
}

/// Lowers a markdown-rs tree into the generic tree.
///
/// Fails with [`RichmarkError::Unsupported`] on constructs the document tree
/// cannot hold (footnotes, definitions, references, ESM, expressions, math,
/// frontmatter, fragments and spread attributes).
pub fn from_markdown(node: md::Node, guard: DepthGuard) -> Result<Node, RichmarkError> {
    let node = match node {
        md::Node::Root(root) => Node::Root(Root {
            children: lower_all(root.children, guard)?,
        }),
        md::Node::Paragraph(p) => Node::paragraph(lower_all(p.children, guard)?),
        md::Node::Heading(h) => Node::Heading(Heading {
            depth: h.depth,
            children: lower_all(h.children, guard)?,
        }),
        md::Node::ThematicBreak(_) => Node::ThematicBreak,
        md::Node::Blockquote(q) => Node::Blockquote(Parent {
            children: lower_all(q.children, guard)?,
        }),
        md::Node::List(list) => Node::List(List {
            ordered: list.ordered,
            start: list.start,
            spread: list.spread,
            children: lower_all(list.children, guard)?,
        }),
        md::Node::ListItem(item) => Node::ListItem(ListItem {
            spread: item.spread,
            children: lower_all(item.children, guard)?,
        }),
        md::Node::Code(code) => Node::Code(Code {
            lang: code.lang,
            meta: code.meta,
            value: code.value,
        }),
        md::Node::Html(html) => Node::Html(Literal { value: html.value }),
        md::Node::Table(table) => Node::Table(Table {
            align: table.align.iter().map(lower_align).collect(),
            children: lower_all(table.children, guard)?,
        }),
        md::Node::TableRow(row) => Node::TableRow(Parent {
            children: lower_all(row.children, guard)?,
        }),
        md::Node::TableCell(cell) => Node::TableCell(Parent {
            children: lower_all(cell.children, guard)?,
        }),
        md::Node::Text(text) => Node::text(text.value),
        md::Node::Emphasis(e) => Node::Emphasis(Parent {
            children: lower_all(e.children, guard)?,
        }),
        md::Node::Strong(s) => Node::Strong(Parent {
            children: lower_all(s.children, guard)?,
        }),
        md::Node::Delete(d) => Node::Delete(Parent {
            children: lower_all(d.children, guard)?,
        }),
        md::Node::InlineCode(code) => Node::InlineCode(Literal { value: code.value }),
        md::Node::Break(_) => Node::Break,
        md::Node::Link(link) => Node::Link(Link {
            url: link.url,
            title: link.title,
            children: lower_all(link.children, guard)?,
        }),
        md::Node::Image(image) => Node::Image(Image {
            url: image.url,
            title: image.title,
            alt: image.alt,
        }),
        md::Node::MdxJsxFlowElement(el) => Node::MdxJsxFlowElement(lower_jsx(
            el.name,
            el.attributes,
            el.children,
            guard,
        )?),
        md::Node::MdxJsxTextElement(el) => Node::MdxJsxTextElement(lower_jsx(
            el.name,
            el.attributes,
            el.children,
            guard,
        )?),
        other => return Err(RichmarkError::unsupported("markdown", markdown_kind(&other))),
    };
    Ok(node)
}

fn lower_all(children: Vec<md::Node>, guard: DepthGuard) -> Result<Vec<Node>, RichmarkError> {
    let guard = guard.descend()?;
    children
        .into_iter()
        .map(|child| from_markdown(child, guard))
        .collect()
}

fn lower_align(align: &md::AlignKind) -> AlignKind {
    match align {
        md::AlignKind::Left => AlignKind::Left,
        md::AlignKind::Right => AlignKind::Right,
        md::AlignKind::Center => AlignKind::Center,
        md::AlignKind::None => AlignKind::None,
    }
}

fn lower_jsx(
    name: Option<String>,
    attributes: Vec<md::AttributeContent>,
    children: Vec<md::Node>,
    guard: DepthGuard,
) -> Result<JsxElement, RichmarkError> {
    let Some(name) = name else {
        return Err(RichmarkError::unsupported("markdown", "mdxJsxFragment"));
    };

    let mut lowered = Vec::with_capacity(attributes.len());
    for attribute in attributes {
        match attribute {
            md::AttributeContent::Property(prop) => lowered.push(JsxAttribute {
                name: prop.name,
                value: prop.value.map(|value| match value {
                    md::AttributeValue::Literal(s) => AttributeValue::Literal(s),
                    md::AttributeValue::Expression(expr) => AttributeValue::Expression(expr.value),
                }),
            }),
            md::AttributeContent::Expression(_) => {
                return Err(RichmarkError::unsupported(
                    "jsx attribute",
                    "mdxJsxExpressionAttribute",
                ));
            }
        }
    }

    Ok(JsxElement {
        name,
        attributes: lowered,
        children: lower_all(children, guard)?,
    })
}

/// The mdast type name of a markdown-rs node.
pub fn markdown_kind(node: &md::Node) -> &'static str {
    match node {
        md::Node::Root(_) => "root",
        md::Node::Blockquote(_) => "blockquote",
        md::Node::FootnoteDefinition(_) => "footnoteDefinition",
        md::Node::MdxJsxFlowElement(_) => "mdxJsxFlowElement",
        md::Node::List(_) => "list",
        md::Node::MdxjsEsm(_) => "mdxjsEsm",
        md::Node::Toml(_) => "toml",
        md::Node::Yaml(_) => "yaml",
        md::Node::Break(_) => "break",
        md::Node::InlineCode(_) => "inlineCode",
        md::Node::InlineMath(_) => "inlineMath",
        md::Node::Delete(_) => "delete",
        md::Node::Emphasis(_) => "emphasis",
        md::Node::MdxTextExpression(_) => "mdxTextExpression",
        md::Node::FootnoteReference(_) => "footnoteReference",
        md::Node::Html(_) => "html",
        md::Node::Image(_) => "image",
        md::Node::ImageReference(_) => "imageReference",
        md::Node::MdxJsxTextElement(_) => "mdxJsxTextElement",
        md::Node::Link(_) => "link",
        md::Node::LinkReference(_) => "linkReference",
        md::Node::Strong(_) => "strong",
        md::Node::Text(_) => "text",
        md::Node::Code(_) => "code",
        md::Node::Math(_) => "math",
        md::Node::MdxFlowExpression(_) => "mdxFlowExpression",
        md::Node::Heading(_) => "heading",
        md::Node::Table(_) => "table",
        md::Node::ThematicBreak(_) => "thematicBreak",
        md::Node::TableRow(_) => "tableRow",
        md::Node::TableCell(_) => "tableCell",
        md::Node::ListItem(_) => "listItem",
        md::Node::Definition(_) => "definition",
        md::Node::Paragraph(_) => "paragraph",
    }
}
