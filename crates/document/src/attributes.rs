//! Attribute serializer: component props ⇄ attribute lists.
//!
//! Declared fields are written in template order, then any extra props in key
//! order. Whether a component becomes a shortcode directive or a JSX element
//! is decided once per template, never per field.

use crate::config::{Field, FieldKind, Template};
use crate::convert::Converter;
use crate::types::{PropValue, Props, Root};
use richmark_core::mdast::{AttributeValue, JsxAttribute, Node};
use richmark_core::shortcode::Placement;
use richmark_core::{DepthGuard, RichmarkError};

/// Reserved field holding a component's nested rich text.
pub const CHILDREN: &str = "children";

/// Reserved field bound to an unnamed shortcode value.
pub const POSITIONAL: &str = "_value";

/// Attributes and children of one component, plus the node shape to emit.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeOutput {
    /// Attributes in output order.
    pub attributes: Vec<JsxAttribute>,
    /// Flow content of the rich-text `children` field.
    pub children: Vec<Node>,
    /// Emit a shortcode directive instead of a JSX element.
    pub use_directive: bool,
    /// Directive shape when `use_directive` is set.
    pub directive_type: Placement,
}

/// Builds the attributes of a component from its props.
///
/// `template` is `None` for components no template describes; their props
/// are passed through as extras and cannot hold rich text.
pub fn to_attributes(
    props: &Props,
    template: Option<&Template>,
    converter: &Converter<'_>,
    guard: DepthGuard,
) -> Result<AttributeOutput, RichmarkError> {
    let use_directive = template.is_some_and(Template::uses_directive);
    let mut output = AttributeOutput {
        attributes: Vec::with_capacity(props.len()),
        children: Vec::new(),
        use_directive,
        directive_type: template.map_or(Placement::Leaf, Template::placement),
    };

    let fields = template.map(|t| t.fields.as_slice()).unwrap_or_default();
    for field in fields {
        let Some(value) = props.get(&field.name) else {
            continue;
        };
        if field.is_children() {
            let PropValue::RichText(root) = value else {
                return Err(RichmarkError::invalid_attribute(
                    CHILDREN,
                    "expected a rich-text tree",
                ));
            };
            output.children = converter.with_nested(field, |nested| {
                nested.flow(&root.children, guard.descend()?)
            })?;
            continue;
        }
        if let Some(value) = field_value(field, value, use_directive, converter, guard)? {
            output.attributes.push(JsxAttribute {
                name: field.name.clone(),
                value: Some(value),
            });
        }
    }

    for (name, value) in props {
        if fields.iter().any(|f| &f.name == name) {
            continue;
        }
        if template.is_some() {
            log::debug!("prop `{name}` has no field, writing it as-is");
        }
        if let Some(value) = extra_value(name, value, use_directive)? {
            output.attributes.push(JsxAttribute {
                name: name.clone(),
                value: Some(value),
            });
        }
    }

    Ok(output)
}

fn field_value(
    field: &Field,
    value: &PropValue,
    use_directive: bool,
    converter: &Converter<'_>,
    guard: DepthGuard,
) -> Result<Option<AttributeValue>, RichmarkError> {
    if use_directive {
        let Some(text) = value.scalar_text() else {
            return Err(RichmarkError::invalid_attribute(
                &field.name,
                "shortcode attributes only hold strings, numbers and booleans",
            ));
        };
        return Ok(Some(AttributeValue::Literal(map_if_image(field, text, converter))));
    }

    let value = match value {
        PropValue::Json(serde_json::Value::Null) => return Ok(None),
        PropValue::RichText(root) => {
            let text = converter.with_nested(field, |nested| {
                nested.stringify_root(root, guard.descend()?)
            })?;
            let text = text.strip_suffix('\n').unwrap_or(&text);
            AttributeValue::Expression(serde_json::to_string(text)?)
        }
        PropValue::Json(json) => AttributeValue::Expression(json.to_string()),
        scalar => match scalar.scalar_text() {
            Some(text) => AttributeValue::Literal(map_if_image(field, text, converter)),
            None => {
                return Err(RichmarkError::InternalError(format!(
                    "prop `{}` is neither scalar nor structured",
                    field.name
                )));
            }
        },
    };
    Ok(Some(value))
}

fn map_if_image(field: &Field, text: String, converter: &Converter<'_>) -> String {
    if field.kind == FieldKind::Image {
        converter.map_image(&text)
    } else {
        text
    }
}

fn extra_value(
    name: &str,
    value: &PropValue,
    use_directive: bool,
) -> Result<Option<AttributeValue>, RichmarkError> {
    let value = match value {
        PropValue::String(s) => AttributeValue::Literal(s.clone()),
        PropValue::Json(serde_json::Value::Null) => return Ok(None),
        PropValue::RichText(_) => {
            return Err(RichmarkError::invalid_attribute(
                name,
                "rich text needs a rich-text field on the template",
            ));
        }
        _ if use_directive => match value.scalar_text() {
            Some(text) => AttributeValue::Literal(text),
            None => {
                return Err(RichmarkError::invalid_attribute(
                    name,
                    "shortcode attributes only hold strings, numbers and booleans",
                ));
            }
        },
        PropValue::Boolean(b) => AttributeValue::Expression(b.to_string()),
        PropValue::Number(n) => AttributeValue::Expression(n.to_string()),
        PropValue::Json(json) => AttributeValue::Expression(json.to_string()),
    };
    Ok(Some(value))
}

/// Builds props from a component's attributes.
///
/// Attributes are bound to template fields by name and coerced by field kind;
/// attributes without a field are kept as strings or parsed JSON expressions.
pub fn to_props(
    attributes: &[JsxAttribute],
    template: Option<&Template>,
    converter: &Converter<'_>,
    guard: DepthGuard,
) -> Result<Props, RichmarkError> {
    let mut props = Props::new();
    for attribute in attributes {
        let field = template.and_then(|t| t.field(&attribute.name));
        let value = match field {
            Some(field) if field.is_children() => {
                return Err(RichmarkError::invalid_attribute(
                    CHILDREN,
                    "rich-text children cannot be given as an attribute",
                ));
            }
            Some(field) => coerce(field, attribute.value.as_ref(), converter, guard)?,
            None => passthrough(&attribute.name, attribute.value.as_ref()),
        };
        props.insert(attribute.name.clone(), value);
    }
    Ok(props)
}

/// Converts a component's flow children into its `children` prop.
///
/// Returns `None` when the template declares no rich-text `children` field
/// and there is nothing to keep; child content without such a field fails.
pub fn children_prop(
    children: Vec<Node>,
    template: Option<&Template>,
    converter: &Converter<'_>,
    guard: DepthGuard,
) -> Result<Option<PropValue>, RichmarkError> {
    let Some(field) = template.and_then(|t| t.field(CHILDREN)).filter(|f| f.is_children()) else {
        if children.is_empty() {
            return Ok(None);
        }
        return Err(RichmarkError::invalid_attribute(
            CHILDREN,
            "component holds content but its template has no rich-text `children` field",
        ));
    };
    let blocks = converter.with_nested(field, |nested| nested.blocks(children, guard.descend()?))?;
    Ok(Some(PropValue::from(Root::new(blocks))))
}

fn passthrough(name: &str, value: Option<&AttributeValue>) -> PropValue {
    match value {
        None => PropValue::Boolean(true),
        Some(AttributeValue::Literal(s)) => PropValue::String(s.clone()),
        Some(AttributeValue::Expression(expr)) => expression_value(name, expr),
    }
}

/// JSON expressions become structured values; anything else is kept as text.
fn expression_value(name: &str, expr: &str) -> PropValue {
    match serde_json::from_str(expr).map(PropValue::from_json) {
        Ok(Ok(value)) => value,
        _ => {
            log::warn!("attribute `{name}` holds a non-JSON expression, keeping it as a string");
            PropValue::String(expr.to_string())
        }
    }
}

fn coerce(
    field: &Field,
    value: Option<&AttributeValue>,
    converter: &Converter<'_>,
    guard: DepthGuard,
) -> Result<PropValue, RichmarkError> {
    let Some(value) = value else {
        return Ok(PropValue::Boolean(true));
    };

    if field.kind == FieldKind::RichText {
        let text = match value {
            AttributeValue::Literal(s) => s.clone(),
            AttributeValue::Expression(expr) => serde_json::from_str::<String>(expr).map_err(|_| {
                RichmarkError::invalid_attribute(&field.name, "expected a string of markdown")
            })?,
        };
        let root = converter.with_nested(field, |nested| {
            nested.parse_text(&text, guard.descend()?)
        })?;
        return Ok(PropValue::from(root));
    }

    let text = match value {
        AttributeValue::Literal(s) => s,
        AttributeValue::Expression(expr) if field.list || field.kind == FieldKind::Object => {
            let json = serde_json::from_str(expr).map_err(|err| {
                RichmarkError::invalid_attribute(&field.name, format!("expected JSON: {err}"))
            })?;
            return Ok(PropValue::from_json(json)?);
        }
        AttributeValue::Expression(expr) => {
            // `{2}`, `{true}` and `{"a"}` carry the same scalar as a literal.
            match serde_json::from_str::<serde_json::Value>(expr) {
                Ok(serde_json::Value::String(s)) => return scalar(field, &s, converter),
                Ok(serde_json::Value::Bool(_) | serde_json::Value::Number(_)) => expr,
                _ => return Ok(expression_value(&field.name, expr)),
            }
        }
    };
    scalar(field, text, converter)
}

fn scalar(field: &Field, text: &str, converter: &Converter<'_>) -> Result<PropValue, RichmarkError> {
    let value = match field.kind {
        FieldKind::Number => PropValue::Number(parse_number(&field.name, text)?),
        FieldKind::Boolean => match text {
            "true" => PropValue::Boolean(true),
            "false" => PropValue::Boolean(false),
            other => {
                return Err(RichmarkError::invalid_attribute(
                    &field.name,
                    format!("expected `true` or `false`, found `{other}`"),
                ));
            }
        },
        FieldKind::Image => PropValue::String(converter.map_image(text)),
        FieldKind::String
        | FieldKind::Datetime
        | FieldKind::Reference
        | FieldKind::Object
        | FieldKind::RichText => PropValue::String(text.to_string()),
    };
    Ok(value)
}

fn parse_number(name: &str, text: &str) -> Result<serde_json::Number, RichmarkError> {
    let text = text.trim();
    if let Ok(n) = text.parse::<i64>() {
        return Ok(n.into());
    }
    text.parse::<f64>()
        .ok()
        .and_then(serde_json::Number::from_f64)
        .ok_or_else(|| RichmarkError::invalid_attribute(name, format!("`{text}` is not a number")))
}
