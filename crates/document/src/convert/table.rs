//! Tables: the native table block and the `table` component both come out as
//! one rectangular mdast table.

use super::Converter;
use crate::types::{Align, Block, Inline, Props, Root, TableCell, TableRow};
use richmark_core::mdast::{self, AlignKind, Node, Parent};
use richmark_core::{DepthGuard, RichmarkError};
use serde_json::Value;

impl Converter<'_> {
    pub(super) fn table_from_mdast(
        &self,
        table: mdast::Table,
        guard: DepthGuard,
    ) -> Result<Block, RichmarkError> {
        let guard = guard.descend()?;
        let mut rows = Vec::with_capacity(table.children.len());
        for row in table.children {
            let Node::TableRow(row) = row else {
                return Err(RichmarkError::unsupported("table", row.kind()));
            };
            let mut cells = Vec::with_capacity(row.children.len());
            for cell in row.children {
                let Node::TableCell(cell) = cell else {
                    return Err(RichmarkError::unsupported("table row", cell.kind()));
                };
                cells.push(TableCell {
                    children: self.inlines(cell.children, guard)?,
                });
            }
            rows.push(TableRow { children: cells });
        }
        Ok(Block::Table {
            align: table.align.into_iter().map(from_align_kind).collect(),
            children: rows,
        })
    }

    pub(super) fn table_to_mdast(
        &self,
        align: &[Align],
        rows: &[TableRow],
        guard: DepthGuard,
    ) -> Result<Node, RichmarkError> {
        let guard = guard.descend()?;
        let columns = rows
            .iter()
            .map(|row| row.children.len())
            .chain(std::iter::once(align.len()))
            .max()
            .unwrap_or(0);

        let mut children = Vec::with_capacity(rows.len());
        for row in rows {
            let mut cells = Vec::with_capacity(columns);
            for cell in &row.children {
                cells.push(Node::TableCell(Parent {
                    children: self.phrasing(&cell.children, guard)?,
                }));
            }
            cells.resize(columns, Node::TableCell(Parent::default()));
            children.push(Node::TableRow(Parent { children: cells }));
        }

        let mut align: Vec<AlignKind> = align.iter().copied().map(to_align_kind).collect();
        align.resize(columns, AlignKind::None);
        Ok(Node::Table(mdast::Table { align, children }))
    }

    /// A `table` component: `align` plus `tableRows[].tableCells[].value`,
    /// where each value is a rich-text root whose first paragraph is the cell.
    pub(super) fn table_component(&self, props: &Props, guard: DepthGuard) -> Result<Node, RichmarkError> {
        let align: Vec<Align> = match props.get("align").map(|v| v.to_json()).transpose()? {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items
                .iter()
                .map(parse_align)
                .collect::<Result<_, _>>()?,
            Some(_) => {
                return Err(RichmarkError::invalid_attribute("align", "expected a list"));
            }
        };

        let rows: Vec<TableRow> = match props.get("tableRows").map(|v| v.to_json()).transpose()? {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(rows)) => rows.into_iter().map(component_row).collect::<Result<_, _>>()?,
            Some(_) => {
                return Err(RichmarkError::invalid_attribute(
                    "tableRows",
                    "expected a list of rows",
                ));
            }
        };

        self.table_to_mdast(&align, &rows, guard)
    }
}

fn component_row(row: Value) -> Result<TableRow, RichmarkError> {
    let cells = match row.get("tableCells") {
        None | Some(Value::Null) => return Ok(TableRow::default()),
        Some(Value::Array(cells)) => cells,
        Some(_) => {
            return Err(RichmarkError::invalid_attribute(
                "tableCells",
                "expected a list of cells",
            ));
        }
    };
    let children = cells
        .iter()
        .map(|cell| -> Result<TableCell, RichmarkError> {
            let Some(value) = cell.get("value").filter(|v| !v.is_null()) else {
                return Ok(TableCell::default());
            };
            let root: Root = serde_json::from_value(value.clone())?;
            Ok(TableCell {
                children: first_paragraph(root),
            })
        })
        .collect::<Result<_, _>>()?;
    Ok(TableRow { children })
}

fn first_paragraph(root: Root) -> Vec<Inline> {
    root.children
        .into_iter()
        .find_map(|block| match block {
            Block::Paragraph { children } => Some(children),
            _ => None,
        })
        .unwrap_or_default()
}

fn parse_align(value: &Value) -> Result<Align, RichmarkError> {
    match value {
        Value::Null => Ok(Align::None),
        Value::String(s) if s == "left" => Ok(Align::Left),
        Value::String(s) if s == "right" => Ok(Align::Right),
        Value::String(s) if s == "center" => Ok(Align::Center),
        Value::String(s) if s == "none" => Ok(Align::None),
        other => Err(RichmarkError::invalid_attribute(
            "align",
            format!("unknown alignment {other}"),
        )),
    }
}

fn from_align_kind(align: AlignKind) -> Align {
    match align {
        AlignKind::Left => Align::Left,
        AlignKind::Right => Align::Right,
        AlignKind::Center => Align::Center,
        AlignKind::None => Align::None,
    }
}

fn to_align_kind(align: Align) -> AlignKind {
    match align {
        Align::Left => AlignKind::Left,
        Align::Right => AlignKind::Right,
        Align::Center => AlignKind::Center,
        Align::None => AlignKind::None,
    }
}
