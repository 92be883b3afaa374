//! Generic mdast → document tree.

use super::Converter;
use crate::attributes::{CHILDREN, children_prop, to_props};
use crate::marks::{self, Marks};
use crate::types::{Block, Inline, ListItem, Props, Root};
use richmark_core::mdast::{AttributeValue, Directive, JsxAttribute, JsxElement, Node};
use richmark_core::{DepthGuard, RichmarkError};

impl Converter<'_> {
    /// Converts a lowered and folded mdast root.
    pub fn to_document(&self, node: Node, guard: DepthGuard) -> Result<Root, RichmarkError> {
        let Node::Root(root) = node else {
            return Err(RichmarkError::unsupported("document", node.kind()));
        };
        Ok(Root::new(self.blocks(root.children, guard)?))
    }

    /// Converts flow content.
    pub(crate) fn blocks(&self, nodes: Vec<Node>, guard: DepthGuard) -> Result<Vec<Block>, RichmarkError> {
        let guard = guard.descend()?;
        nodes.into_iter().map(|node| self.block(node, guard)).collect()
    }

    fn block(&self, node: Node, guard: DepthGuard) -> Result<Block, RichmarkError> {
        let block = match node {
            Node::Paragraph(p) => match <[Node; 1]>::try_from(p.children) {
                Ok([Node::Image(image)]) => Block::Image {
                    url: self.map_image(&image.url),
                    alt: image.alt,
                    caption: image.title,
                },
                Ok(single) => Block::Paragraph {
                    children: self.inlines(single.into(), guard)?,
                },
                Err(children) => Block::Paragraph {
                    children: self.inlines(children, guard)?,
                },
            },
            Node::Heading(h) => Block::Heading {
                depth: h.depth,
                children: self.inlines(h.children, guard)?,
            },
            Node::ThematicBreak => Block::ThematicBreak,
            Node::Blockquote(q) => Block::BlockQuote {
                children: self.blocks(q.children, guard)?,
            },
            Node::List(list) => {
                let guard = guard.descend()?;
                let children = list
                    .children
                    .into_iter()
                    .map(|item| self.list_item(item, guard))
                    .collect::<Result<_, _>>()?;
                Block::List {
                    ordered: list.ordered,
                    children,
                }
            }
            Node::Code(code) => Block::CodeBlock {
                lang: code.lang,
                meta: code.meta,
                value: code.value,
            },
            Node::Html(html) => Block::Html { value: html.value },
            Node::Table(table) => self.table_from_mdast(table, guard)?,
            Node::MdxJsxFlowElement(el) => {
                let (name, props) = self.jsx_component(el, guard)?;
                Block::Component { name, props }
            }
            Node::ContainerDirective(d) | Node::LeafDirective(d) => {
                let (name, props) = self.directive_component(d, guard)?;
                Block::Component { name, props }
            }
            other => return Err(RichmarkError::unsupported("block", other.kind())),
        };
        Ok(block)
    }

    fn list_item(&self, node: Node, guard: DepthGuard) -> Result<ListItem, RichmarkError> {
        let Node::ListItem(item) = node else {
            return Err(RichmarkError::unsupported("list", node.kind()));
        };
        let guard = guard.descend()?;
        let mut children = Vec::with_capacity(item.children.len());
        for child in item.children {
            children.push(match child {
                Node::Paragraph(p) => Block::Lic {
                    children: self.inlines(p.children, guard)?,
                },
                child @ (Node::List(_) | Node::Blockquote(_)) => self.block(child, guard)?,
                other => return Err(RichmarkError::unsupported("list item", other.kind())),
            });
        }
        Ok(ListItem { children })
    }

    /// Converts phrasing content, pushing marks down onto text leaves.
    pub(crate) fn inlines(&self, nodes: Vec<Node>, guard: DepthGuard) -> Result<Vec<Inline>, RichmarkError> {
        marks::flatten(nodes, Marks::default(), guard.descend()?, &|node, guard| {
            self.opaque_inline(node, guard)
        })
    }

    fn opaque_inline(&self, node: Node, guard: DepthGuard) -> Result<Inline, RichmarkError> {
        let inline = match node {
            Node::Image(image) => Inline::Image {
                url: self.map_image(&image.url),
                alt: image.alt,
                caption: image.title,
            },
            Node::Break => Inline::Break,
            Node::Html(html) => Inline::HtmlInline { value: html.value },
            Node::MdxJsxTextElement(el) => {
                if !el.children.is_empty() {
                    return Err(RichmarkError::invalid_attribute(
                        CHILDREN,
                        format!("inline component `{}` cannot hold content", el.name),
                    ));
                }
                let (name, props) = self.jsx_component(el, guard)?;
                Inline::Component { name, props }
            }
            Node::TextDirective(d) => {
                let (name, props) = self.directive_component(d, guard)?;
                Inline::Component { name, props }
            }
            other => return Err(RichmarkError::unsupported("inline", other.kind())),
        };
        Ok(inline)
    }

    fn jsx_component(&self, el: JsxElement, guard: DepthGuard) -> Result<(String, Props), RichmarkError> {
        self.component(el.name, &el.attributes, el.children, guard)
    }

    fn directive_component(&self, d: Directive, guard: DepthGuard) -> Result<(String, Props), RichmarkError> {
        let attributes: Vec<JsxAttribute> = d
            .attributes
            .into_iter()
            .map(|a| JsxAttribute {
                name: a.name,
                value: Some(AttributeValue::Literal(a.value)),
            })
            .collect();
        self.component(d.name, &attributes, d.children, guard)
    }

    fn component(
        &self,
        name: String,
        attributes: &[JsxAttribute],
        children: Vec<Node>,
        guard: DepthGuard,
    ) -> Result<(String, Props), RichmarkError> {
        let guard = guard.descend()?;
        let template = self.field().template(&name);
        if template.is_none() {
            log::warn!("component `{name}` has no template, keeping its props as-is");
        }
        let mut props = to_props(attributes, template, self, guard)?;
        if let Some(value) = children_prop(children, template, self, guard)? {
            props.insert(CHILDREN.to_string(), value);
        }
        Ok((name, props))
    }
}

#[cfg(test)]
mod tests {
    use crate::config::{Field, FieldKind, ParserConfig, ParserKind, RichTextField, Template};
    use crate::convert::Converter;
    use crate::types::{Block, Inline, ListItem, PropValue, Root, Text};
    use richmark_core::{DepthGuard, RichmarkError};

    fn identity(url: &str) -> String {
        url.to_string()
    }

    fn parse(text: &str, field: &RichTextField) -> Result<Root, RichmarkError> {
        Converter::new(field, &identity).parse_text(text, DepthGuard::default())
    }

    fn markdown() -> RichTextField {
        RichTextField::new(
            Vec::new(),
            ParserConfig {
                kind: ParserKind::Markdown,
                skip_escaping: None,
            },
        )
    }

    #[test]
    fn headings_and_marks() {
        let root = parse("# Title\n\nsome **bold *both*** text", &markdown()).unwrap();
        assert_eq!(
            root.children,
            vec![
                Block::Heading {
                    depth: 1,
                    children: vec![Inline::text("Title")],
                },
                Block::Paragraph {
                    children: vec![
                        Inline::text("some "),
                        Inline::Text(Text::new("bold ").bold()),
                        Inline::Text(Text::new("both").bold().italic()),
                        Inline::text(" text"),
                    ],
                },
            ]
        );
    }

    #[test]
    fn list_items_hold_lic_and_nested_lists() {
        let root = parse("- a\n  - b\n- c", &markdown()).unwrap();
        assert_eq!(
            root.children,
            vec![Block::List {
                ordered: false,
                children: vec![
                    ListItem {
                        children: vec![
                            Block::Lic {
                                children: vec![Inline::text("a")],
                            },
                            Block::List {
                                ordered: false,
                                children: vec![ListItem {
                                    children: vec![Block::Lic {
                                        children: vec![Inline::text("b")],
                                    }],
                                }],
                            },
                        ],
                    },
                    ListItem {
                        children: vec![Block::Lic {
                            children: vec![Inline::text("c")],
                        }],
                    },
                ],
            }]
        );
    }

    #[test]
    fn code_inside_list_item_is_unsupported() {
        let err = parse("- a\n\n  ```\n  x\n  ```", &markdown()).unwrap_err();
        assert_eq!(err.to_string(), "list item kind `code` is not supported");
    }

    #[test]
    fn inline_code_keeps_enclosing_marks() {
        let root = parse("~~`x`~~", &markdown()).unwrap();
        assert_eq!(
            root.children,
            vec![Block::Paragraph {
                children: vec![Inline::Text(Text::new("x").code().strikethrough())],
            }]
        );
    }

    #[test]
    fn jsx_component_props_follow_template() {
        let field = RichTextField::new(
            vec![
                Template::new("Callout")
                    .with_field(Field::new("level", FieldKind::Number))
                    .with_field(Field::new("children", FieldKind::RichText)),
            ],
            ParserConfig::default(),
        );
        let root = parse("<Callout level={2}>\n  Hi *there*\n</Callout>", &field).unwrap();
        let [Block::Component { name, props }] = root.children.as_slice() else {
            panic!("expected a component, got {:?}", root.children);
        };
        assert_eq!(name, "Callout");
        assert_eq!(props["level"], PropValue::Number(2.into()));
        assert_eq!(
            props["children"],
            PropValue::from(Root::new(vec![Block::Paragraph {
                children: vec![
                    Inline::text("Hi "),
                    Inline::Text(Text::new("there").italic()),
                ],
            }]))
        );
    }

    #[test]
    fn unknown_component_keeps_props() {
        let root = parse("<Badge tone=\"info\" loud />", &RichTextField::default()).unwrap();
        let [Block::Component { name, props }] = root.children.as_slice() else {
            panic!("expected a component");
        };
        assert_eq!(name, "Badge");
        assert_eq!(props["tone"], PropValue::from("info"));
        assert_eq!(props["loud"], PropValue::Boolean(true));
    }

    #[test]
    fn unknown_component_with_content_fails() {
        let err = parse("<Badge>\n  hi\n</Badge>", &RichTextField::default()).unwrap_err();
        assert!(matches!(err, RichmarkError::InvalidAttribute { .. }));
    }

    #[test]
    fn inline_shortcode_becomes_inline_component() {
        let field = RichTextField::new(
            vec![Template::new("icon")
                .with_field(Field::new("_value", FieldKind::String))
                .with_match("{{", "}}")],
            ParserConfig {
                kind: ParserKind::Markdown,
                skip_escaping: None,
            },
        );
        let root = parse("press {{ icon \"save\" }} now", &field).unwrap();
        let [Block::Paragraph { children }] = root.children.as_slice() else {
            panic!("expected a paragraph");
        };
        assert_eq!(children.len(), 3);
        assert_eq!(children[0], Inline::text("press "));
        let Inline::Component { name, props } = &children[1] else {
            panic!("expected a component");
        };
        assert_eq!(name, "icon");
        assert_eq!(props["_value"], PropValue::from("save"));
        assert_eq!(children[2], Inline::text(" now"));
    }

    #[test]
    fn native_table_converts_cells() {
        let root = parse("| a | b |\n| :- | -: |\n| *c* | d |", &markdown()).unwrap();
        let [Block::Table { align, children }] = root.children.as_slice() else {
            panic!("expected a table");
        };
        assert_eq!(align, &[crate::types::Align::Left, crate::types::Align::Right]);
        assert_eq!(children.len(), 2);
        assert_eq!(
            children[1].children[0].children,
            vec![Inline::Text(Text::new("c").italic())]
        );
    }
}
