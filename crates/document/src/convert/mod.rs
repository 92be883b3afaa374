//! Tree converter between the generic mdast and the document tree.
//!
//! [`Converter`] carries the field configuration and the image URL mapper;
//! every other piece of state travels as arguments, so nested rich-text
//! fields just build a second converter over their own configuration.

mod table;
mod to_document;
mod to_mdast;

use crate::config::{Field, RichTextField};
use crate::types::Root;
use richmark_core::{
    DepthGuard, RichmarkError, from_markdown, parse_mdast, preprocess, rewrite, to_markdown,
};

/// Converts between text, the generic mdast and the document tree for one
/// rich-text field.
#[derive(Clone, Copy)]
pub struct Converter<'a> {
    field: &'a RichTextField,
    image_url: &'a dyn Fn(&str) -> String,
}

impl<'a> Converter<'a> {
    /// A converter for `field`. `image_url` rewrites every image reference,
    /// once, in both directions.
    pub fn new(field: &'a RichTextField, image_url: &'a dyn Fn(&str) -> String) -> Self {
        Self { field, image_url }
    }

    /// The field configuration.
    pub fn field(&self) -> &'a RichTextField {
        self.field
    }

    pub(crate) fn map_image(&self, url: &str) -> String {
        (self.image_url)(url)
    }

    /// Runs `f` with a converter for the nested rich-text `field`.
    pub(crate) fn with_nested<T>(
        &self,
        field: &Field,
        f: impl FnOnce(Converter<'_>) -> Result<T, RichmarkError>,
    ) -> Result<T, RichmarkError> {
        let nested = self.field.nested(field);
        f(Converter {
            field: &nested,
            image_url: self.image_url,
        })
    }

    /// Text to document tree. Text markdown-rs rejects becomes an
    /// `invalid_markdown` root holding the raw text.
    pub fn parse_text(&self, text: &str, guard: DepthGuard) -> Result<Root, RichmarkError> {
        let patterns = self.field.shortcode_patterns();
        let preprocessed = preprocess(text, &patterns)?;
        let tree = match parse_mdast(&preprocessed.text, &self.field.parse_options()) {
            Ok(tree) => tree,
            Err(err @ RichmarkError::MarkdownAdapter { .. }) => {
                log::warn!("keeping unparseable markdown as-is: {err}");
                return Ok(Root::invalid(text, err.to_string()));
            }
            Err(err) => return Err(err),
        };
        let lowered = from_markdown(tree, guard)?;
        self.to_document(preprocessed.fold(lowered), guard)
    }

    /// Document tree to text. A root holding only an `invalid_markdown`
    /// node yields its raw value.
    pub fn stringify_root(&self, root: &Root, guard: DepthGuard) -> Result<String, RichmarkError> {
        if let Some(value) = root.invalid_value() {
            return Ok(value.to_string());
        }
        let patterns = self.field.shortcode_patterns();
        let tree = self.to_mdast(root, guard)?;
        let text = to_markdown(&tree, &self.field.serialize_options(&patterns))?;
        rewrite(&text, &patterns)
    }
}
