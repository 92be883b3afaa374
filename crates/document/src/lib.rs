#![deny(missing_docs)]
//! Richmark document layer: Markdown/MDX text ⇄ rich document tree.
//!
//! [`parse`] and [`stringify`] are the entry points. Both take the rich-text
//! field configuration and an image URL mapper on every call and share no
//! state, so they can run concurrently (see [`batch`]).

/// Attribute serializer for component props.
pub mod attributes;
/// Parallel parse/stringify over many inputs.
pub mod batch;
/// Rich-text field and template configuration.
pub mod config;
/// Tree converter between the generic mdast and the document tree.
pub mod convert;
/// Mark engine: text flags ⇄ mark wrappers.
pub mod marks;
/// Rich document tree types.
pub mod types;

pub use config::{
    Field, FieldKind, MatchConfig, ParserConfig, ParserKind, RichTextField, SkipEscaping, Template,
    TemplateEntry,
};
pub use convert::Converter;
pub use richmark_core::{DepthGuard, RichmarkError};
pub use types::{Align, Block, Inline, ListItem, PropValue, Props, Root, TableCell, TableRow, Text};

/// Image URL mapper that keeps every URL unchanged.
pub fn identity(url: &str) -> String {
    url.to_string()
}

/// Parses Markdown or MDX text into a document tree.
///
/// Text markdown-rs rejects yields a root holding one `invalid_markdown`
/// node with the raw text; every other failure is an error.
///
/// # Example
///
/// ```
/// use richmark_document::{Block, RichTextField, identity, parse};
///
/// let root = parse("# Hello", &RichTextField::default(), &identity).unwrap();
/// assert!(matches!(root.children[0], Block::Heading { depth: 1, .. }));
/// ```
pub fn parse(
    text: &str,
    field: &RichTextField,
    image_url: &dyn Fn(&str) -> String,
) -> Result<Root, RichmarkError> {
    field.validate()?;
    Converter::new(field, image_url).parse_text(text, DepthGuard::default())
}

/// Serializes a document tree to Markdown or MDX text.
///
/// A root holding only an `invalid_markdown` node returns its raw value.
pub fn stringify(
    root: &Root,
    field: &RichTextField,
    image_url: &dyn Fn(&str) -> String,
) -> Result<String, RichmarkError> {
    field.validate()?;
    Converter::new(field, image_url).stringify_root(root, DepthGuard::default())
}

/// Serializes a document tree given as JSON, as an editor sends it.
///
/// A JSON string instead of a tree is a malformed call.
pub fn stringify_value(
    value: &serde_json::Value,
    field: &RichTextField,
    image_url: &dyn Fn(&str) -> String,
) -> Result<String, RichmarkError> {
    if value.is_string() {
        return Err(RichmarkError::MalformedCall(
            "expected a document tree to stringify, received a string".to_string(),
        ));
    }
    let root: Root = serde_json::from_value(value.clone())
        .map_err(|err| RichmarkError::MalformedCall(format!("not a document tree: {err}")))?;
    stringify(&root, field, image_url)
}
