//! Rich-text field configuration supplied by the caller.
//!
//! Mirrors the shape a content schema uses for a rich-text field: a parser
//! choice plus the templates of the components allowed inside the field.
//! Everything is re-validated on every call; nothing is cached.

use richmark_core::serialize::{SerializeOptions, Unsafe};
use richmark_core::shortcode::{self, Placement, ShortcodePattern};
use richmark_core::{ParseOptions, RichmarkError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A rich-text field: the input to `parse` and `stringify`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RichTextField {
    /// Field name.
    #[serde(default)]
    pub name: String,
    /// Component templates usable in this field.
    #[serde(default)]
    pub templates: Vec<TemplateEntry>,
    /// Text syntax options.
    #[serde(default)]
    pub parser: ParserConfig,
}

/// Text syntax options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParserConfig {
    /// Markdown or MDX.
    #[serde(rename = "type", default)]
    pub kind: ParserKind,
    /// Escaping to leave out when writing text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_escaping: Option<SkipEscaping>,
}

/// Text syntax.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParserKind {
    /// CommonMark + GFM with raw HTML; components only as shortcodes.
    Markdown,
    /// MDX: components as JSX.
    #[default]
    Mdx,
}

/// Escaping to disable on output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SkipEscaping {
    /// Write text verbatim.
    All,
    /// Keep `<` unescaped so inline HTML typed as text stays HTML.
    Html,
    /// Escape everything (same as leaving the option out).
    None,
}

/// A template, or the name of a global template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TemplateEntry {
    /// Reference to a template defined elsewhere. Not supported here.
    Global(String),
    /// Inline template definition.
    Template(Template),
}

/// Component template.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    /// Component name.
    pub name: String,
    /// Display label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Fields, in the order attributes are written.
    #[serde(default)]
    pub fields: Vec<Field>,
    /// Shortcode delimiters; when set the component is written as a shortcode.
    #[serde(rename = "match", default, skip_serializing_if = "Option::is_none")]
    pub matcher: Option<MatchConfig>,
}

/// Shortcode delimiters of a template.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchConfig {
    /// Opening delimiter.
    pub start: String,
    /// Closing delimiter.
    pub end: String,
    /// Name used between the delimiters, defaults to the template name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Field kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FieldKind {
    /// Text.
    String,
    /// Number.
    Number,
    /// Boolean.
    Boolean,
    /// Date/time string.
    Datetime,
    /// Image URL.
    Image,
    /// Reference to another document.
    Reference,
    /// Nested object.
    Object,
    /// Nested rich text.
    RichText,
}

/// Field of a template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    /// Field name; `children` and `_value` are reserved.
    pub name: String,
    /// Kind.
    #[serde(rename = "type")]
    pub kind: FieldKind,
    /// Holds a list of values.
    #[serde(default)]
    pub list: bool,
    /// Templates allowed inside a rich-text field.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub templates: Vec<TemplateEntry>,
    /// Sub-fields of an object field.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<Field>,
    /// Keys this crate does not interpret.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Field {
    /// A field of the given kind.
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            list: false,
            templates: Vec::new(),
            fields: Vec::new(),
            extra: BTreeMap::new(),
        }
    }

    /// Whether this is the rich-text `children` field.
    pub fn is_children(&self) -> bool {
        self.name == "children" && self.kind == FieldKind::RichText
    }
}

impl Template {
    /// A template without fields or shortcode delimiters.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Adds a field.
    pub fn with_field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    /// Sets the shortcode delimiters.
    pub fn with_match(mut self, start: &str, end: &str) -> Self {
        self.matcher = Some(MatchConfig {
            start: start.to_string(),
            end: end.to_string(),
            name: None,
        });
        self
    }

    /// The field with the given name.
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Block when the template declares rich-text `children`, leaf otherwise.
    pub fn placement(&self) -> Placement {
        if self.fields.iter().any(Field::is_children) {
            Placement::Block
        } else {
            Placement::Leaf
        }
    }

    /// Whether components of this template are written as shortcodes.
    pub fn uses_directive(&self) -> bool {
        self.matcher.is_some()
    }

    /// Shortcode pattern, when the template declares `match`.
    pub fn shortcode_pattern(&self) -> Option<ShortcodePattern> {
        self.matcher.as_ref().map(|m| ShortcodePattern {
            start: m.start.clone(),
            end: m.end.clone(),
            name: m.name.clone(),
            template_name: self.name.clone(),
            placement: self.placement(),
        })
    }
}

impl RichTextField {
    /// A field with the given templates and parser.
    pub fn new(templates: Vec<Template>, parser: ParserConfig) -> Self {
        Self {
            name: String::new(),
            templates: templates.into_iter().map(TemplateEntry::Template).collect(),
            parser,
        }
    }

    /// The field configuration used for a nested rich-text field.
    pub fn nested(&self, field: &Field) -> Self {
        Self {
            name: field.name.clone(),
            templates: field.templates.clone(),
            parser: self.parser,
        }
    }

    /// Checks every template, including those of nested rich-text fields.
    ///
    /// Global templates are a configuration error; unnamed templates are a
    /// malformed call.
    pub fn validate(&self) -> Result<(), RichmarkError> {
        validate_entries(&self.templates)
    }

    /// Inline templates, in declaration order.
    pub fn templates(&self) -> impl Iterator<Item = &Template> {
        self.templates.iter().filter_map(|entry| match entry {
            TemplateEntry::Template(t) => Some(t),
            TemplateEntry::Global(_) => None,
        })
    }

    /// The template with the given name.
    pub fn template(&self, name: &str) -> Option<&Template> {
        self.templates().find(|t| t.name == name)
    }

    /// Whether the parser is MDX.
    pub fn is_mdx(&self) -> bool {
        self.parser.kind == ParserKind::Mdx
    }

    /// Shortcode patterns of the templates declaring `match`, in declaration
    /// order, followed by those of nested rich-text fields. A template name
    /// already seen keeps its first pattern.
    pub fn shortcode_patterns(&self) -> Vec<ShortcodePattern> {
        let mut patterns = Vec::new();
        collect_patterns(&self.templates, &mut patterns);
        patterns
    }

    /// markdown-rs options for this parser type.
    pub fn parse_options(&self) -> ParseOptions {
        match self.parser.kind {
            ParserKind::Markdown => ParseOptions::markdown(),
            ParserKind::Mdx => ParseOptions::mdx(),
        }
    }

    /// Serializer options: escaping list adjusted by `skipEscaping`, plus
    /// guards for the shortcode start delimiters.
    pub fn serialize_options(&self, patterns: &[ShortcodePattern]) -> SerializeOptions {
        let mut unsafe_chars = Unsafe::defaults(self.is_mdx());
        match self.parser.skip_escaping {
            Some(SkipEscaping::All) => unsafe_chars.clear(),
            Some(SkipEscaping::Html) => unsafe_chars.retain(|u| u.character != '<'),
            Some(SkipEscaping::None) | None => {}
        }
        SerializeOptions {
            unsafe_chars,
            literal_guards: shortcode::literal_guards(patterns),
        }
    }
}

fn collect_patterns(entries: &[TemplateEntry], patterns: &mut Vec<ShortcodePattern>) {
    for entry in entries {
        let TemplateEntry::Template(template) = entry else {
            continue;
        };
        if let Some(pattern) = template.shortcode_pattern()
            && !patterns.iter().any(|p| p.template_name == pattern.template_name)
        {
            patterns.push(pattern);
        }
        for field in &template.fields {
            if field.kind == FieldKind::RichText {
                collect_patterns(&field.templates, patterns);
            }
        }
    }
}

fn validate_entries(entries: &[TemplateEntry]) -> Result<(), RichmarkError> {
    for entry in entries {
        match entry {
            TemplateEntry::Global(name) => {
                return Err(RichmarkError::Config(format!(
                    "global template `{name}` is not supported, define the template inline"
                )));
            }
            TemplateEntry::Template(template) => {
                if template.name.trim().is_empty() {
                    return Err(RichmarkError::MalformedCall(
                        "template is missing a name".to_string(),
                    ));
                }
                for field in &template.fields {
                    validate_field(field)?;
                }
            }
        }
    }
    Ok(())
}

fn validate_field(field: &Field) -> Result<(), RichmarkError> {
    validate_entries(&field.templates)?;
    for sub in &field.fields {
        validate_field(sub)?;
    }
    Ok(())
}
