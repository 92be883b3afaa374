//! Document tree → generic mdast.

use super::Converter;
use crate::attributes::to_attributes;
use crate::marks;
use crate::types::{Block, Inline, ListItem, Props, Root};
use richmark_core::mdast::{
    self, AttributeValue, Code, Directive, DirectiveAttribute, Heading, JsxAttribute, JsxElement,
    Link, List, Literal, Node, Parent,
};
use richmark_core::shortcode::Placement;
use richmark_core::{DepthGuard, RichmarkError};

/// Component name carrying an editor table as props.
const TABLE_COMPONENT: &str = "table";

impl Converter<'_> {
    /// Converts a document root into an mdast root.
    pub fn to_mdast(&self, root: &Root, guard: DepthGuard) -> Result<Node, RichmarkError> {
        Ok(Node::Root(mdast::Root {
            children: self.flow(&root.children, guard)?,
        }))
    }

    /// Converts blocks into flow content, dropping empty paragraphs.
    pub(crate) fn flow(&self, blocks: &[Block], guard: DepthGuard) -> Result<Vec<Node>, RichmarkError> {
        let guard = guard.descend()?;
        let mut out = Vec::with_capacity(blocks.len());
        for block in blocks {
            if let Some(node) = self.block_node(block, guard)? {
                out.push(node);
            }
        }
        Ok(out)
    }

    fn block_node(&self, block: &Block, guard: DepthGuard) -> Result<Option<Node>, RichmarkError> {
        let node = match block {
            Block::Paragraph { children } => {
                if is_empty(children) {
                    return Ok(None);
                }
                Node::paragraph(self.phrasing(children, guard)?)
            }
            Block::Heading { depth, children } => {
                if !(1..=6).contains(depth) {
                    return Err(RichmarkError::invalid_attribute(
                        "depth",
                        format!("heading depth {depth} is outside 1 to 6"),
                    ));
                }
                Node::Heading(Heading {
                    depth: *depth,
                    children: self.phrasing(children, guard)?,
                })
            }
            Block::CodeBlock { lang, meta, value } => Node::Code(Code {
                lang: lang.clone(),
                meta: meta.clone(),
                value: value.clone(),
            }),
            Block::BlockQuote { children } => Node::Blockquote(Parent {
                children: self.flow(children, guard)?,
            }),
            Block::List { ordered, children } => {
                let guard = guard.descend()?;
                Node::List(List {
                    ordered: *ordered,
                    start: None,
                    spread: false,
                    children: children
                        .iter()
                        .map(|item| self.mdast_list_item(item, guard))
                        .collect::<Result<_, _>>()?,
                })
            }
            Block::Lic { .. } => return Err(RichmarkError::unsupported("block", block.kind())),
            Block::Table { align, children } => self.table_to_mdast(align, children, guard)?,
            Block::Image { url, alt, caption } => Node::paragraph(vec![Node::Image(mdast::Image {
                url: self.map_image(url),
                title: caption.clone(),
                alt: alt.clone(),
            })]),
            Block::Html { value } => Node::Html(Literal {
                value: value.clone(),
            }),
            Block::ThematicBreak => Node::ThematicBreak,
            Block::Component { name, props } if name == TABLE_COMPONENT => {
                self.table_component(props, guard)?
            }
            Block::Component { name, props } => self.mdast_component(name, props, false, guard)?,
            Block::InvalidMarkdown { value, .. } => {
                log::debug!("writing invalid markdown inside a larger document as raw html");
                Node::Html(Literal {
                    value: value.clone(),
                })
            }
        };
        Ok(Some(node))
    }

    fn mdast_list_item(&self, item: &ListItem, guard: DepthGuard) -> Result<Node, RichmarkError> {
        let guard = guard.descend()?;
        let mut children = Vec::with_capacity(item.children.len());
        for child in &item.children {
            let node = match child {
                Block::Lic { children } | Block::Paragraph { children } => {
                    if is_empty(children) {
                        continue;
                    }
                    Node::paragraph(self.phrasing(children, guard)?)
                }
                Block::List { .. } | Block::BlockQuote { .. } => match self.block_node(child, guard)? {
                    Some(node) => node,
                    None => continue,
                },
                other => return Err(RichmarkError::unsupported("list item", other.kind())),
            };
            children.push(node);
        }
        Ok(Node::ListItem(mdast::ListItem {
            spread: false,
            children,
        }))
    }

    /// Converts inlines into phrasing content, merging marks into wrappers.
    pub(crate) fn phrasing(&self, inlines: &[Inline], guard: DepthGuard) -> Result<Vec<Node>, RichmarkError> {
        marks::expand(inlines, guard.descend()?, &|inline, guard| {
            self.opaque_phrasing(inline, guard)
        })
    }

    fn opaque_phrasing(&self, inline: &Inline, guard: DepthGuard) -> Result<Node, RichmarkError> {
        let node = match inline {
            Inline::Link {
                url,
                title,
                children,
            } => Node::Link(Link {
                url: url.clone(),
                title: title.clone(),
                children: self.phrasing(children, guard)?,
            }),
            Inline::Image { url, alt, caption } => Node::Image(mdast::Image {
                url: self.map_image(url),
                title: caption.clone(),
                alt: alt.clone(),
            }),
            Inline::Break => Node::Break,
            Inline::HtmlInline { value } => Node::Html(Literal {
                value: value.clone(),
            }),
            Inline::Component { name, props } => self.mdast_component(name, props, true, guard)?,
            Inline::Text(_) => {
                return Err(RichmarkError::InternalError(
                    "text reached the opaque inline mapper".to_string(),
                ));
            }
        };
        Ok(node)
    }

    fn mdast_component(
        &self,
        name: &str,
        props: &Props,
        inline: bool,
        guard: DepthGuard,
    ) -> Result<Node, RichmarkError> {
        let guard = guard.descend()?;
        let template = self.field().template(name);
        let output = to_attributes(props, template, self, guard)?;

        if output.use_directive {
            let directive = Directive {
                name: name.to_string(),
                attributes: output
                    .attributes
                    .into_iter()
                    .map(directive_attribute)
                    .collect::<Result<_, _>>()?,
                children: output.children,
            };
            return match (inline, output.directive_type) {
                (false, Placement::Block) => Ok(Node::ContainerDirective(directive)),
                (false, Placement::Leaf) => Ok(Node::LeafDirective(directive)),
                (true, Placement::Leaf) => Ok(Node::TextDirective(directive)),
                (true, Placement::Block) => Err(RichmarkError::Config(format!(
                    "shortcode `{name}` holds rich-text children and cannot be used inline"
                ))),
            };
        }

        if !self.field().is_mdx() {
            return Err(RichmarkError::Config(format!(
                "component `{name}` needs a shortcode `match` to be written as markdown"
            )));
        }
        if template.is_none() {
            log::warn!("component `{name}` has no template, writing its props as-is");
        }

        let element = JsxElement {
            name: name.to_string(),
            attributes: output.attributes,
            children: output.children,
        };
        if inline {
            if !element.children.is_empty() {
                return Err(RichmarkError::invalid_attribute(
                    crate::attributes::CHILDREN,
                    format!("inline component `{name}` cannot hold content"),
                ));
            }
            return Ok(Node::MdxJsxTextElement(element));
        }
        Ok(Node::MdxJsxFlowElement(element))
    }
}

fn directive_attribute(attribute: JsxAttribute) -> Result<DirectiveAttribute, RichmarkError> {
    match attribute.value {
        Some(AttributeValue::Literal(value)) => Ok(DirectiveAttribute::new(attribute.name, value)),
        None => Ok(DirectiveAttribute::new(attribute.name, "true")),
        Some(AttributeValue::Expression(_)) => Err(RichmarkError::invalid_attribute(
            attribute.name,
            "shortcode attributes cannot hold expressions",
        )),
    }
}

/// A paragraph with no content, or only the empty-text sentinel.
fn is_empty(children: &[Inline]) -> bool {
    match children {
        [] => true,
        [Inline::Text(text)] => text.text.is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use crate::config::{Field, FieldKind, ParserConfig, ParserKind, RichTextField, Template};
    use crate::convert::Converter;
    use crate::types::{Block, Inline, ListItem, PropValue, Props, Root, Text};
    use richmark_core::{DepthGuard, RichmarkError};

    fn identity(url: &str) -> String {
        url.to_string()
    }

    fn stringify(root: &Root, field: &RichTextField) -> Result<String, RichmarkError> {
        Converter::new(field, &identity).stringify_root(root, DepthGuard::default())
    }

    fn markdown(templates: Vec<Template>) -> RichTextField {
        RichTextField::new(
            templates,
            ParserConfig {
                kind: ParserKind::Markdown,
                skip_escaping: None,
            },
        )
    }

    #[test]
    fn empty_paragraphs_are_dropped() {
        let root = Root::new(vec![
            Block::paragraph("a"),
            Block::paragraph(""),
            Block::Paragraph { children: vec![] },
            Block::paragraph("b"),
        ]);
        assert_eq!(stringify(&root, &markdown(vec![])).unwrap(), "a\n\nb\n");
    }

    #[test]
    fn lic_outside_list_is_unsupported() {
        let root = Root::new(vec![Block::Lic {
            children: vec![Inline::text("x")],
        }]);
        let err = stringify(&root, &markdown(vec![])).unwrap_err();
        assert_eq!(err.to_string(), "block kind `lic` is not supported");
    }

    #[test]
    fn heading_depth_is_checked() {
        let root = Root::new(vec![Block::Heading {
            depth: 7,
            children: vec![Inline::text("x")],
        }]);
        let err = stringify(&root, &markdown(vec![])).unwrap_err();
        assert!(matches!(err, RichmarkError::InvalidAttribute { ref name, .. } if name == "depth"));
    }

    #[test]
    fn hr_inside_list_item_is_unsupported() {
        let root = Root::new(vec![Block::List {
            ordered: true,
            children: vec![ListItem {
                children: vec![Block::ThematicBreak],
            }],
        }]);
        let err = stringify(&root, &markdown(vec![])).unwrap_err();
        assert_eq!(err.to_string(), "list item kind `hr` is not supported");
    }

    #[test]
    fn ordered_list_with_nested_bullets() {
        let root = Root::new(vec![Block::List {
            ordered: true,
            children: vec![ListItem {
                children: vec![
                    Block::Lic {
                        children: vec![Inline::text("one")],
                    },
                    Block::List {
                        ordered: false,
                        children: vec![ListItem {
                            children: vec![Block::Lic {
                                children: vec![Inline::Text(Text::new("two").italic())],
                            }],
                        }],
                    },
                ],
            }],
        }]);
        assert_eq!(stringify(&root, &markdown(vec![])).unwrap(), "1. one\n   - *two*\n");
    }

    #[test]
    fn component_without_match_fails_in_markdown_mode() {
        let root = Root::new(vec![Block::Component {
            name: "Hero".into(),
            props: Props::new(),
        }]);
        let err = stringify(&root, &markdown(vec![Template::new("Hero")])).unwrap_err();
        assert!(matches!(err, RichmarkError::Config(_)));
    }

    #[test]
    fn jsx_component_in_mdx_mode() {
        let field = RichTextField::new(
            vec![Template::new("Hero").with_field(Field::new("title", FieldKind::String))],
            ParserConfig::default(),
        );
        let mut props = Props::new();
        props.insert("title".into(), PropValue::from("Hi \"you\""));
        let root = Root::new(vec![Block::Component {
            name: "Hero".into(),
            props,
        }]);
        assert_eq!(stringify(&root, &field).unwrap(), "<Hero title='Hi \"you\"' />\n");
    }

    #[test]
    fn leaf_shortcode_with_positional_value() {
        let field = markdown(vec![Template::new("youtube")
            .with_field(Field::new("_value", FieldKind::String))
            .with_match("{{%", "%}}")]);
        let mut props = Props::new();
        props.insert("_value".into(), PropValue::from("abc"));
        let root = Root::new(vec![Block::Component {
            name: "youtube".into(),
            props,
        }]);
        assert_eq!(stringify(&root, &field).unwrap(), "{{% youtube \"abc\" %}}\n");
    }

    #[test]
    fn inline_shortcode_inside_text() {
        let field = markdown(vec![Template::new("icon")
            .with_field(Field::new("name", FieldKind::String))
            .with_match("{{", "}}")]);
        let mut props = Props::new();
        props.insert("name".into(), PropValue::from("save"));
        let root = Root::new(vec![Block::Paragraph {
            children: vec![
                Inline::text("press "),
                Inline::Component {
                    name: "icon".into(),
                    props,
                },
            ],
        }]);
        assert_eq!(stringify(&root, &field).unwrap(), "press {{ icon name=\"save\" }}\n");
    }

    #[test]
    fn invalid_markdown_inside_document_is_raw() {
        let root = Root::new(vec![
            Block::paragraph("a"),
            Block::InvalidMarkdown {
                value: "<b".into(),
                message: "boom".into(),
            },
        ]);
        assert_eq!(stringify(&root, &markdown(vec![])).unwrap(), "a\n\n<b\n");
    }
}
