//! Rich document tree.
//!
//! Blocks and inlines are tagged with `type` in snake_case so the tree can be
//! exchanged as JSON with an editor.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Component props keyed by field name.
pub type Props = BTreeMap<String, PropValue>;

/// Document root.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename = "root")]
pub struct Root {
    /// Block children.
    #[serde(default)]
    pub children: Vec<Block>,
}

impl Root {
    /// Creates a root from blocks.
    pub fn new(children: Vec<Block>) -> Self {
        Self { children }
    }

    /// Root holding a single `invalid_markdown` node that keeps the raw text.
    pub fn invalid(value: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            children: vec![Block::InvalidMarkdown {
                value: value.into(),
                message: message.into(),
            }],
        }
    }

    /// The raw value if this root is only an `invalid_markdown` sentinel.
    pub fn invalid_value(&self) -> Option<&str> {
        match self.children.as_slice() {
            [Block::InvalidMarkdown { value, .. }] => Some(value),
            _ => None,
        }
    }
}

/// Column alignment of a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Align {
    /// Left aligned.
    Left,
    /// Right aligned.
    Right,
    /// Centered.
    Center,
    /// No alignment.
    #[default]
    None,
}

/// Block-level node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    /// Heading of depth 1 to 6.
    Heading {
        /// Level.
        depth: u8,
        /// Inline children.
        children: Vec<Inline>,
    },
    /// Paragraph. A single empty text child marks an empty paragraph.
    Paragraph {
        /// Inline children.
        children: Vec<Inline>,
    },
    /// Fenced code.
    CodeBlock {
        /// Language.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        lang: Option<String>,
        /// Rest of the info string.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        meta: Option<String>,
        /// Code content.
        value: String,
    },
    /// Block quote.
    BlockQuote {
        /// Block children.
        children: Vec<Block>,
    },
    /// Ordered or bullet list.
    List {
        /// Numbered list when true.
        #[serde(default)]
        ordered: bool,
        /// Items.
        children: Vec<ListItem>,
    },
    /// Inline content of a list item. Only valid directly inside a list item.
    Lic {
        /// Inline children.
        children: Vec<Inline>,
    },
    /// Table; the first row is the header.
    Table {
        /// Alignment per column.
        #[serde(default)]
        align: Vec<Align>,
        /// Rows.
        children: Vec<TableRow>,
    },
    /// Standalone image.
    Image {
        /// Source.
        url: String,
        /// Alternative text.
        #[serde(default)]
        alt: String,
        /// Caption (the markdown title).
        #[serde(default, skip_serializing_if = "Option::is_none")]
        caption: Option<String>,
    },
    /// Raw HTML.
    Html {
        /// Markup.
        value: String,
    },
    /// Thematic break.
    #[serde(rename = "hr")]
    ThematicBreak,
    /// Custom block component.
    Component {
        /// Template name.
        name: String,
        /// Props, `children` holds nested rich text.
        #[serde(default)]
        props: Props,
    },
    /// Text that could not be parsed, kept verbatim.
    InvalidMarkdown {
        /// The raw text.
        value: String,
        /// Why parsing failed.
        message: String,
    },
}

impl Block {
    /// The `type` tag of this block.
    pub fn kind(&self) -> &'static str {
        match self {
            Block::Heading { .. } => "heading",
            Block::Paragraph { .. } => "paragraph",
            Block::CodeBlock { .. } => "code_block",
            Block::BlockQuote { .. } => "block_quote",
            Block::List { .. } => "list",
            Block::Lic { .. } => "lic",
            Block::Table { .. } => "table",
            Block::Image { .. } => "image",
            Block::Html { .. } => "html",
            Block::ThematicBreak => "hr",
            Block::Component { .. } => "component",
            Block::InvalidMarkdown { .. } => "invalid_markdown",
        }
    }

    /// Paragraph of plain text.
    pub fn paragraph(text: impl Into<String>) -> Self {
        Block::Paragraph {
            children: vec![Inline::text(text)],
        }
    }
}

/// Item of a list.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename = "list_item")]
pub struct ListItem {
    /// `lic`, list and block quote children.
    pub children: Vec<Block>,
}

/// Row of a table.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename = "table_row")]
pub struct TableRow {
    /// Cells.
    pub children: Vec<TableCell>,
}

/// Cell of a table row.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename = "table_cell")]
pub struct TableCell {
    /// Inline children.
    pub children: Vec<Inline>,
}

/// Inline-level node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Inline {
    /// Text with mark flags.
    Text(Text),
    /// Link.
    Link {
        /// Destination.
        url: String,
        /// Title.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        /// Inline children.
        children: Vec<Inline>,
    },
    /// Inline image.
    Image {
        /// Source.
        url: String,
        /// Alternative text.
        #[serde(default)]
        alt: String,
        /// Caption (the markdown title).
        #[serde(default, skip_serializing_if = "Option::is_none")]
        caption: Option<String>,
    },
    /// Hard line break.
    Break,
    /// Raw inline HTML.
    HtmlInline {
        /// Markup.
        value: String,
    },
    /// Custom inline component.
    Component {
        /// Template name.
        name: String,
        /// Props.
        #[serde(default)]
        props: Props,
    },
}

impl Inline {
    /// Plain text leaf.
    pub fn text(text: impl Into<String>) -> Self {
        Inline::Text(Text::new(text))
    }

    /// The `type` tag of this inline.
    pub fn kind(&self) -> &'static str {
        match self {
            Inline::Text(_) => "text",
            Inline::Link { .. } => "link",
            Inline::Image { .. } => "image",
            Inline::Break => "break",
            Inline::HtmlInline { .. } => "html_inline",
            Inline::Component { .. } => "component",
        }
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Text leaf. `code` excludes nothing here; the mark engine enforces that
/// code is never combined across siblings.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Text {
    /// Content.
    pub text: String,
    /// Strong.
    #[serde(default, skip_serializing_if = "is_false")]
    pub bold: bool,
    /// Emphasis.
    #[serde(default, skip_serializing_if = "is_false")]
    pub italic: bool,
    /// Inline code.
    #[serde(default, skip_serializing_if = "is_false")]
    pub code: bool,
    /// Strikethrough.
    #[serde(default, skip_serializing_if = "is_false")]
    pub strikethrough: bool,
}

impl Text {
    /// Unmarked text.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    /// Sets bold.
    pub fn bold(mut self) -> Self {
        self.bold = true;
        self
    }

    /// Sets italic.
    pub fn italic(mut self) -> Self {
        self.italic = true;
        self
    }

    /// Sets code.
    pub fn code(mut self) -> Self {
        self.code = true;
        self
    }

    /// Sets strikethrough.
    pub fn strikethrough(mut self) -> Self {
        self.strikethrough = true;
        self
    }
}

/// A prop value, typed by the field it is bound to.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PropValue {
    /// Boolean field.
    Boolean(bool),
    /// Number field.
    Number(serde_json::Number),
    /// String, datetime, image or reference field.
    String(String),
    /// Rich-text field.
    RichText(Box<Root>),
    /// Objects and lists.
    Json(serde_json::Value),
}

impl PropValue {
    /// Classifies a JSON value. Objects tagged `"type": "root"` are rich text.
    pub fn from_json(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        use serde_json::Value;
        Ok(match value {
            Value::Bool(b) => PropValue::Boolean(b),
            Value::Number(n) => PropValue::Number(n),
            Value::String(s) => PropValue::String(s),
            Value::Object(ref map) if map.get("type").and_then(Value::as_str) == Some("root") => {
                PropValue::RichText(Box::new(serde_json::from_value(value)?))
            }
            other => PropValue::Json(other),
        })
    }

    /// The value as JSON.
    pub fn to_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    /// Whether the value is a string, number or boolean.
    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            PropValue::Boolean(_) | PropValue::Number(_) | PropValue::String(_)
        )
    }

    /// Scalar value as text, `None` for rich text and JSON.
    pub fn scalar_text(&self) -> Option<String> {
        match self {
            PropValue::Boolean(b) => Some(b.to_string()),
            PropValue::Number(n) => Some(n.to_string()),
            PropValue::String(s) => Some(s.clone()),
            PropValue::RichText(_) | PropValue::Json(_) => None,
        }
    }
}

impl<'de> Deserialize<'de> for PropValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        PropValue::from_json(value).map_err(serde::de::Error::custom)
    }
}

impl From<&str> for PropValue {
    fn from(value: &str) -> Self {
        PropValue::String(value.to_string())
    }
}

impl From<bool> for PropValue {
    fn from(value: bool) -> Self {
        PropValue::Boolean(value)
    }
}

impl From<Root> for PropValue {
    fn from(value: Root) -> Self {
        PropValue::RichText(Box::new(value))
    }
}
