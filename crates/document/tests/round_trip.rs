use richmark_document::{
    Align, Block, Field, FieldKind, Inline, ListItem, ParserConfig, ParserKind, PropValue, Props,
    RichTextField, RichmarkError, Root, TableCell, TableRow, Template, Text, identity, parse,
    stringify, stringify_value,
};
use serde_json::json;

fn markdown(templates: Vec<Template>) -> RichTextField {
    RichTextField::new(
        templates,
        ParserConfig {
            kind: ParserKind::Markdown,
            skip_escaping: None,
        },
    )
}

fn lic(text: &str) -> Block {
    Block::Lic {
        children: vec![Inline::text(text)],
    }
}

fn cell(text: &str) -> TableCell {
    TableCell {
        children: vec![Inline::text(text)],
    }
}

fn signature(fields: Vec<Field>) -> Template {
    fields
        .into_iter()
        .fold(Template::new("signature"), Template::with_field)
        .with_match("{{<", ">}}")
}

fn component(name: &str, props: &[(&str, PropValue)]) -> Block {
    let props: Props = props
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect();
    Block::Component {
        name: name.into(),
        props,
    }
}

fn sample_document() -> Root {
    Root::new(vec![
        Block::Heading {
            depth: 2,
            children: vec![Inline::text("Title")],
        },
        Block::Paragraph {
            children: vec![
                Inline::text("Plain "),
                Inline::Text(Text::new("bold").bold()),
                Inline::text(" and "),
                Inline::Text(Text::new("both").bold().italic()),
                Inline::text(" "),
                Inline::Link {
                    url: "https://example.com".into(),
                    title: None,
                    children: vec![Inline::text("link")],
                },
                Inline::text("."),
            ],
        },
        Block::BlockQuote {
            children: vec![Block::paragraph("quoted")],
        },
        Block::List {
            ordered: false,
            children: vec![
                ListItem {
                    children: vec![
                        lic("one"),
                        Block::List {
                            ordered: true,
                            children: vec![ListItem {
                                children: vec![lic("two")],
                            }],
                        },
                    ],
                },
                ListItem {
                    children: vec![lic("three")],
                },
            ],
        },
        Block::CodeBlock {
            lang: Some("rust".into()),
            meta: None,
            value: "fn main() {}".into(),
        },
        Block::Image {
            url: "/a.png".into(),
            alt: "A".into(),
            caption: None,
        },
        Block::ThematicBreak,
        Block::Table {
            align: vec![Align::Left, Align::Right],
            children: vec![
                TableRow {
                    children: vec![cell("a"), cell("b")],
                },
                TableRow {
                    children: vec![cell("c"), cell("d")],
                },
            ],
        },
    ])
}

#[test]
fn document_round_trips_through_markdown() {
    let field = markdown(Vec::new());
    let root = sample_document();
    let text = stringify(&root, &field, &identity).expect("stringify should succeed");
    insta::assert_snapshot!(text, @r"
    ## Title

    Plain **bold** and ***both*** [link](https://example.com).

    > quoted

    - one
      1. two
    - three

    ```rust
    fn main() {}
    ```

    ![A](/a.png)

    ***

    | a | b |
    | :-- | --: |
    | c | d |
    ");

    let parsed = parse(&text, &field, &identity).expect("parse should succeed");
    assert_eq!(parsed, root);
}

#[test]
fn document_round_trips_through_mdx() {
    let field = RichTextField::new(
        vec![
            Template::new("Callout")
                .with_field(Field::new("level", FieldKind::Number))
                .with_field(Field::new("children", FieldKind::RichText)),
        ],
        ParserConfig::default(),
    );
    let mut root = sample_document();
    root.children.push(component(
        "Callout",
        &[
            ("level", PropValue::Number(2.into())),
            ("children", PropValue::from(Root::new(vec![Block::paragraph("inside")]))),
        ],
    ));

    let text = stringify(&root, &field, &identity).unwrap();
    assert!(
        text.ends_with("<Callout level=\"2\">\ninside\n</Callout>\n"),
        "unexpected tail: {text}"
    );
    assert_eq!(parse(&text, &field, &identity).unwrap(), root);
}

#[test]
fn shared_marks_merge_into_one_wrapper() {
    let root = Root::new(vec![Block::Paragraph {
        children: vec![
            Inline::Text(Text::new("a").bold()),
            Inline::Text(Text::new("b").bold()),
            Inline::Text(Text::new("c").bold().italic()),
        ],
    }]);
    let text = stringify(&root, &markdown(Vec::new()), &identity).unwrap();
    insta::assert_snapshot!(text, @"**ab*c***");
}

#[test]
fn adjacent_code_leaves_are_rejected() {
    let root = Root::new(vec![Block::Paragraph {
        children: vec![
            Inline::Text(Text::new("a").code()),
            Inline::Text(Text::new("b").code()),
        ],
    }]);
    let err = stringify(&root, &markdown(Vec::new()), &identity).unwrap_err();
    assert!(matches!(err, RichmarkError::MarkConflict));
    assert_eq!(err.to_string(), "Marks inside inline code are not supported");
}

#[test]
fn block_shortcode_round_trips() {
    let field = markdown(vec![signature(vec![
        Field::new("foo", FieldKind::String),
        Field::new("children", FieldKind::RichText),
    ])]);
    let root = Root::new(vec![component("signature", &[("foo", PropValue::from("bar123"))])]);

    let text = stringify(&root, &field, &identity).unwrap();
    assert_eq!(text, "{{< signature foo=\"bar123\" >}}\n{{< /signature >}}\n");

    let parsed = parse(&text, &field, &identity).unwrap();
    let [Block::Component { name, props }] = parsed.children.as_slice() else {
        panic!("expected one component, got {:?}", parsed.children);
    };
    assert_eq!(name, "signature");
    assert_eq!(props["foo"], PropValue::from("bar123"));
}

#[test]
fn shortcode_without_children_field_is_a_single_tag() {
    let field = markdown(vec![signature(vec![Field::new("foo", FieldKind::String)])]);
    let root = Root::new(vec![component("signature", &[("foo", PropValue::from("bar123"))])]);

    let text = stringify(&root, &field, &identity).unwrap();
    assert_eq!(text, "{{< signature foo=\"bar123\" >}}\n");
    assert_eq!(parse(&text, &field, &identity).unwrap(), root);
}

#[test]
fn shortcode_values_with_delimiters_and_newlines_round_trip() {
    let field = markdown(vec![
        Template::new("note")
            .with_field(Field::new("text", FieldKind::String))
            .with_match("{{%", "%}}"),
    ]);
    let root = Root::new(vec![component("note", &[("text", PropValue::from("a %}} b\nc"))])]);

    let text = stringify(&root, &field, &identity).unwrap();
    assert_eq!(text, "{{% note text=\"a &#x25;}} b&#xA;c\" %}}\n");
    assert_eq!(parse(&text, &field, &identity).unwrap(), root);
}

#[test]
fn private_use_characters_in_code_round_trip() {
    let field = markdown(vec![signature(vec![Field::new("_value", FieldKind::String)])]);
    let root = Root::new(vec![
        Block::Paragraph {
            children: vec![Inline::Text(Text::new("a\u{E000}b").code())],
        },
        Block::CodeBlock {
            lang: None,
            meta: None,
            value: "x\u{E001}y".into(),
        },
    ]);
    let text = stringify(&root, &field, &identity).unwrap();
    assert_eq!(parse(&text, &field, &identity).unwrap(), root);
}

#[test]
fn block_shortcode_keeps_its_children() {
    let field = markdown(vec![signature(vec![
        Field::new("foo", FieldKind::String),
        Field::new("children", FieldKind::RichText),
    ])]);
    let root = Root::new(vec![component(
        "signature",
        &[
            ("foo", PropValue::from("bar123")),
            (
                "children",
                PropValue::from(Root::new(vec![Block::Paragraph {
                    children: vec![Inline::Text(Text::new("Hello").italic())],
                }])),
            ),
        ],
    )]);

    let text = stringify(&root, &field, &identity).unwrap();
    insta::assert_snapshot!(text, @r#"
    {{< signature foo="bar123" >}}
    *Hello*
    {{< /signature >}}
    "#);
    assert_eq!(parse(&text, &field, &identity).unwrap(), root);
}

#[test]
fn positional_value_binds_to_value_field() {
    let field = markdown(vec![signature(vec![Field::new("_value", FieldKind::String)])]);

    let parsed = parse("{{< signature \"bar123\" >}}", &field, &identity).unwrap();
    assert_eq!(
        parsed,
        Root::new(vec![component("signature", &[("_value", PropValue::from("bar123"))])])
    );

    let text = stringify(&parsed, &field, &identity).unwrap();
    assert_eq!(text, "{{< signature \"bar123\" >}}\n");
}

#[test]
fn shortcode_name_override_is_used_both_ways() {
    let mut template = signature(vec![Field::new("_value", FieldKind::String)]);
    if let Some(matcher) = template.matcher.as_mut() {
        matcher.name = Some("sig-nature".into());
    }
    let field = markdown(vec![template]);

    let parsed = parse("{{< sig-nature \"x\" >}}", &field, &identity).unwrap();
    assert_eq!(
        parsed,
        Root::new(vec![component("signature", &[("_value", PropValue::from("x"))])])
    );
    assert_eq!(
        stringify(&parsed, &field, &identity).unwrap(),
        "{{< sig-nature \"x\" >}}\n"
    );
}

#[test]
fn literal_delimiters_in_text_survive() {
    let field = markdown(vec![signature(vec![Field::new("children", FieldKind::RichText)])]);
    let root = Root::new(vec![Block::paragraph("see {{< x >}}")]);
    let text = stringify(&root, &field, &identity).unwrap();
    insta::assert_snapshot!(text, @r"see \{\{\< x >}}");
    assert_eq!(parse(&text, &field, &identity).unwrap(), root);
}

#[test]
fn serializer_edge_cases_round_trip() {
    let paragraph = |children: Vec<Inline>| vec![Block::Paragraph { children }];
    let heading = |text: &str| {
        vec![Block::Heading {
            depth: 2,
            children: vec![Inline::text(text)],
        }]
    };
    let cases: Vec<(&str, Vec<Block>)> = vec![
        (
            "bang before link",
            paragraph(vec![
                Inline::text("wow!"),
                Inline::Link {
                    url: "/u".into(),
                    title: None,
                    children: vec![Inline::Text(Text::new("x").italic()), Inline::text("y")],
                },
            ]),
        ),
        ("closing hash", heading("C #")),
        ("lone hash", heading("#")),
        (
            "punctuation before word",
            paragraph(vec![Inline::Text(Text::new("a.").bold()), Inline::text("b")]),
        ),
        (
            "word before punctuation",
            paragraph(vec![Inline::text("a"), Inline::Text(Text::new("(b)").bold())]),
        ),
        (
            "trailing space inside strong",
            paragraph(vec![Inline::Text(Text::new("foo ").bold()), Inline::text("bar")]),
        ),
        (
            "pipe in table code",
            vec![Block::Table {
                align: vec![Align::None, Align::None],
                children: vec![
                    TableRow {
                        children: vec![
                            TableCell {
                                children: vec![Inline::Text(Text::new("a|b").code())],
                            },
                            cell("z"),
                        ],
                    },
                    TableRow {
                        children: vec![cell("1"), cell("2")],
                    },
                ],
            }],
        ),
    ];

    let field = markdown(Vec::new());
    for (name, children) in cases {
        let root = Root::new(children);
        let text = stringify(&root, &field, &identity).unwrap();
        let parsed = parse(&text, &field, &identity).unwrap();
        assert_eq!(parsed, root, "{name}: {text:?}");
    }
}

#[test]
fn break_in_table_cell_is_rejected() {
    let root = Root::new(vec![Block::Table {
        align: Vec::new(),
        children: vec![TableRow {
            children: vec![TableCell {
                children: vec![Inline::text("a"), Inline::Break, Inline::text("b")],
            }],
        }],
    }]);
    let err = stringify(&root, &markdown(Vec::new()), &identity).unwrap_err();
    assert_eq!(err.to_string(), "table cell kind `break` is not supported");
}

#[test]
fn aligned_table_round_trips() {
    let field = markdown(Vec::new());
    let root = Root::new(vec![Block::Table {
        align: vec![Align::Left, Align::Right],
        children: vec![
            TableRow {
                children: vec![cell("h1"), cell("h2")],
            },
            TableRow {
                children: vec![cell("x"), cell("y")],
            },
        ],
    }]);
    let text = stringify(&root, &field, &identity).unwrap();
    assert_eq!(parse(&text, &field, &identity).unwrap(), root);
}

#[test]
fn invalid_markdown_is_written_verbatim() {
    let root = Root::invalid("raw text", "could not parse");
    let text = stringify(&root, &RichTextField::default(), &identity).unwrap();
    assert_eq!(text, "raw text");
}

#[test]
fn unparseable_mdx_is_kept_as_invalid_markdown() {
    let field = RichTextField::default();
    let root = parse("<Hero title=\"x\"", &field, &identity).unwrap();
    assert_eq!(root.invalid_value(), Some("<Hero title=\"x\""));
    assert_eq!(stringify(&root, &field, &identity).unwrap(), "<Hero title=\"x\"");
}

#[test]
fn global_template_is_a_configuration_error() {
    let field: RichTextField = serde_json::from_value(json!({
        "parser": {"type": "markdown"},
        "templates": ["signature"]
    }))
    .unwrap();
    let err = stringify(&Root::default(), &field, &identity).unwrap_err();
    assert!(matches!(err, RichmarkError::Config(_)), "got {err:?}");
}

#[test]
fn string_instead_of_tree_is_malformed() {
    let err = stringify_value(&json!("# not a tree"), &RichTextField::default(), &identity)
        .unwrap_err();
    assert!(matches!(err, RichmarkError::MalformedCall(_)), "got {err:?}");
}

#[test]
fn skip_escaping_html_keeps_angle_brackets() {
    let root = Root::new(vec![Block::paragraph("a <b> c")]);

    let escaped = stringify(&root, &markdown(Vec::new()), &identity).unwrap();
    insta::assert_snapshot!(escaped, @r"a \<b> c");

    let field = RichTextField::new(
        Vec::new(),
        ParserConfig {
            kind: ParserKind::Markdown,
            skip_escaping: Some(richmark_document::SkipEscaping::Html),
        },
    );
    let raw = stringify(&root, &field, &identity).unwrap();
    insta::assert_snapshot!(raw, @"a <b> c");
}

#[test]
fn image_urls_are_mapped_once_per_reference() {
    use std::sync::atomic::{AtomicUsize, Ordering};

    let calls = AtomicUsize::new(0);
    let mapper = |url: &str| {
        calls.fetch_add(1, Ordering::Relaxed);
        format!("https://cdn.test{url}")
    };
    let root = parse(
        "![a](/a.png) and ![b](/b.png)",
        &markdown(Vec::new()),
        &mapper,
    )
    .unwrap();
    assert_eq!(calls.load(Ordering::Relaxed), 2);
    let [Block::Paragraph { children }] = root.children.as_slice() else {
        panic!("expected a paragraph");
    };
    assert!(matches!(&children[0], Inline::Image { url, .. } if url == "https://cdn.test/a.png"));
}
