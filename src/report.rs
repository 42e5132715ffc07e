//! Table export.
//!
//! Analytics hand over a plain [`Table`] of strings; a [`TableRenderer`]
//! turns it into document bytes. [`PdfRenderer`] is the default renderer:
//! a title followed by a bordered grid with a light-grey header row and
//! centred, word-wrapped cells, continued on new A4 pages as needed.

use crate::data::Record;
use crate::error::{AnalyticsError, Result};
use crate::model::{
    AggregateRow, ClusterAssignment, DeclineRecord, DistributionRow, Field, RankEntry, Suggestion,
};
use printpdf::path::{PaintMode, WindingOrder};
use printpdf::*;
use serde::Serialize;
use std::path::Path;
use tracing::info;

pub const DEFAULT_REPORT_FILE: &str = "student_report.pdf";
pub const DEFAULT_REPORT_TITLE: &str = "Student Performance Report";

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Fixed-schema output rows that can be laid out as a table.
pub trait TableRow {
    const COLUMNS: &'static [&'static str];

    fn cells(&self) -> Vec<String>;
}

impl Table {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Table { columns, rows }
    }

    pub fn from_rows<T: TableRow>(rows: &[T]) -> Self {
        Table {
            columns: T::COLUMNS.iter().map(|c| c.to_string()).collect(),
            rows: rows.iter().map(TableRow::cells).collect(),
        }
    }

    /// Aggregate rows carry their key columns at runtime, so the header
    /// comes from the grouping used to produce them.
    pub fn from_aggregates(group_by: &[Field], rows: &[AggregateRow]) -> Self {
        let mut columns: Vec<String> = group_by.iter().map(|f| f.column().to_string()).collect();
        columns.push("Marks".to_string());
        let rows = rows
            .iter()
            .map(|row| {
                let mut cells: Vec<String> = row.keys.iter().map(|(_, v)| v.to_string()).collect();
                cells.push(marks(row.marks));
                cells
            })
            .collect();
        Table { columns, rows }
    }
}

fn marks(value: f64) -> String {
    format!("{:.2}", value)
}

impl TableRow for Record {
    const COLUMNS: &'static [&'static str] = &["Name", "Class", "Subject", "Exam", "Marks"];

    fn cells(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            self.class.clone(),
            self.subject.clone(),
            self.exam.to_string(),
            marks(self.marks),
        ]
    }
}

impl TableRow for RankEntry {
    const COLUMNS: &'static [&'static str] = &["Name", "Average Marks"];

    fn cells(&self) -> Vec<String> {
        vec![self.name.clone(), marks(self.average_marks)]
    }
}

impl TableRow for ClusterAssignment {
    const COLUMNS: &'static [&'static str] = &["Name", "Marks", "Cluster"];

    fn cells(&self) -> Vec<String> {
        vec![self.name.clone(), marks(self.marks), self.cluster.to_string()]
    }
}

impl TableRow for DeclineRecord {
    const COLUMNS: &'static [&'static str] = &["Name", "Total Decline"];

    fn cells(&self) -> Vec<String> {
        vec![self.name.clone(), marks(self.total_decline)]
    }
}

impl TableRow for Suggestion {
    const COLUMNS: &'static [&'static str] = &["Name", "Class", "Suggestion"];

    fn cells(&self) -> Vec<String> {
        vec![self.name.clone(), self.class.clone(), self.suggestion.clone()]
    }
}

impl TableRow for DistributionRow {
    const COLUMNS: &'static [&'static str] = &["Class", "Count", "Min", "Q1", "Median", "Q3", "Max"];

    fn cells(&self) -> Vec<String> {
        vec![
            self.class.clone(),
            self.count.to_string(),
            marks(self.min),
            marks(self.q1),
            marks(self.median),
            marks(self.q3),
            marks(self.max),
        ]
    }
}

/// Render a titled table to document bytes.
pub trait TableRenderer {
    fn render(&self, table: &Table, title: &str) -> Result<Vec<u8>>;
}

/// A4 portrait layout, all lengths in millimetres.
#[derive(Debug, Clone)]
pub struct PdfRenderer {
    pub page_width: f32,
    pub page_height: f32,
    pub margin: f32,
    pub title_size: f32,
    pub font_size: f32,
    pub cell_padding: f32,
}

impl Default for PdfRenderer {
    fn default() -> Self {
        PdfRenderer {
            page_width: 210.0,
            page_height: 297.0,
            margin: 15.0,
            title_size: 18.0,
            font_size: 9.0,
            cell_padding: 1.5,
        }
    }
}

const PT_TO_MM: f32 = 0.3528;
// Helvetica's mean glyph advance is a little over half an em.
const AVG_GLYPH_EM: f32 = 0.52;

impl PdfRenderer {
    fn line_height(&self) -> f32 {
        self.font_size * PT_TO_MM * 1.25
    }

    fn text_width(&self, text: &str) -> f32 {
        text.chars().count() as f32 * self.font_size * PT_TO_MM * AVG_GLYPH_EM
    }

    fn chars_per_line(&self, column_width: f32) -> usize {
        let usable = (column_width - 2.0 * self.cell_padding).max(0.0);
        ((usable / (self.font_size * PT_TO_MM * AVG_GLYPH_EM)) as usize).max(1)
    }

    fn title_height(&self) -> f32 {
        self.title_size * PT_TO_MM
    }

    /// Title split into lines that fit between the margins.
    fn title_lines(&self, title: &str) -> Vec<String> {
        let usable = self.page_width - 2.0 * self.margin;
        let chars = (usable / (self.title_height() * AVG_GLYPH_EM)) as usize;
        wrap_text(title, chars)
    }

    fn row_height(&self, lines: usize) -> f32 {
        lines.max(1) as f32 * self.line_height() + 2.0 * self.cell_padding
    }

    fn draw_row(
        &self,
        layer: &PdfLayerReference,
        font: &IndirectFontRef,
        top: f32,
        column_width: f32,
        cells: &[Vec<String>],
        shaded: bool,
    ) {
        let lines = cells.iter().map(Vec::len).max().unwrap_or(1);
        let height = self.row_height(lines);
        let left = self.margin;
        let right = left + column_width * cells.len().max(1) as f32;
        let bottom = top - height;

        if shaded {
            layer.set_fill_color(Color::Rgb(Rgb::new(0.83, 0.83, 0.83, None)));
            layer.add_polygon(Polygon {
                rings: vec![rectangle(left, bottom, right, top)],
                mode: PaintMode::Fill,
                winding_order: WindingOrder::NonZero,
            });
        }

        layer.set_outline_color(Color::Rgb(Rgb::new(0.0, 0.0, 0.0, None)));
        layer.set_outline_thickness(1.0);
        layer.add_line(Line {
            points: rectangle(left, bottom, right, top),
            is_closed: true,
        });
        for i in 1..cells.len() {
            let x = left + column_width * i as f32;
            layer.add_line(Line {
                points: vec![
                    (Point::new(Mm(x), Mm(bottom)), false),
                    (Point::new(Mm(x), Mm(top)), false),
                ],
                is_closed: false,
            });
        }

        layer.set_fill_color(Color::Rgb(Rgb::new(0.0, 0.0, 0.0, None)));
        for (i, cell_lines) in cells.iter().enumerate() {
            let centre = left + column_width * (i as f32 + 0.5);
            // vertically centre the block of lines inside the row
            let block = cell_lines.len() as f32 * self.line_height();
            let mut baseline = top - (height - block) / 2.0 - self.line_height() * 0.8;
            for line in cell_lines {
                let x = centre - self.text_width(line) / 2.0;
                layer.use_text(line.as_str(), self.font_size, Mm(x), Mm(baseline), font);
                baseline -= self.line_height();
            }
        }
    }
}

fn rectangle(left: f32, bottom: f32, right: f32, top: f32) -> Vec<(Point, bool)> {
    vec![
        (Point::new(Mm(left), Mm(bottom)), false),
        (Point::new(Mm(right), Mm(bottom)), false),
        (Point::new(Mm(right), Mm(top)), false),
        (Point::new(Mm(left), Mm(top)), false),
    ]
}

/// Greedy word wrap to at most `width` characters per line. Words longer
/// than a line are split.
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();
        while word.len() > width {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            let rest = word.split_off(width);
            lines.push(word.into_iter().collect());
            word = rest;
        }
        let word: String = word.into_iter().collect();
        let needed = if current.is_empty() {
            word.chars().count()
        } else {
            current.chars().count() + 1 + word.chars().count()
        };
        if needed > width && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(&word);
    }
    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}

impl TableRenderer for PdfRenderer {
    fn render(&self, table: &Table, title: &str) -> Result<Vec<u8>> {
        let (doc, page, layer) = PdfDocument::new(
            title,
            Mm(self.page_width),
            Mm(self.page_height),
            "Layer 1",
        );
        let regular = doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|e| AnalyticsError::Render(e.to_string()))?;
        let bold = doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(|e| AnalyticsError::Render(e.to_string()))?;

        let columns = table.columns.len().max(1);
        let column_width = (self.page_width - 2.0 * self.margin) / columns as f32;
        let chars = self.chars_per_line(column_width);
        let wrap = |cells: &[String]| -> Vec<Vec<String>> {
            cells.iter().map(|c| wrap_text(c, chars)).collect()
        };
        let header = wrap(&table.columns);
        let header_height = self.row_height(header.iter().map(Vec::len).max().unwrap_or(1));

        let mut layer = doc.get_page(page).get_layer(layer);
        let title_height = self.title_height();
        let mut top = self.page_height - self.margin;
        for line in self.title_lines(title) {
            top -= title_height;
            let x = self.page_width / 2.0
                - line.chars().count() as f32 * title_height * AVG_GLYPH_EM / 2.0;
            layer.use_text(line.as_str(), self.title_size, Mm(x.max(self.margin)), Mm(top), &bold);
        }
        // spacer below the title
        top -= 12.0 * PT_TO_MM + title_height * 0.5;

        self.draw_row(&layer, &bold, top, column_width, &header, true);
        top -= header_height;

        let mut pages = 1;
        for row in &table.rows {
            let cells = wrap(row);
            let height = self.row_height(cells.iter().map(Vec::len).max().unwrap_or(1));
            if top - height < self.margin {
                let (next_page, next_layer) =
                    doc.add_page(Mm(self.page_width), Mm(self.page_height), "Layer 1");
                layer = doc.get_page(next_page).get_layer(next_layer);
                pages += 1;
                top = self.page_height - self.margin;
                self.draw_row(&layer, &bold, top, column_width, &header, true);
                top -= header_height;
            }
            self.draw_row(&layer, &regular, top, column_width, &cells, false);
            top -= height;
        }

        let bytes = doc
            .save_to_bytes()
            .map_err(|e| AnalyticsError::Render(e.to_string()))?;
        info!(rows = table.rows.len(), pages, bytes = bytes.len(), "rendered table to pdf");
        Ok(bytes)
    }
}

pub fn export_table(table: &Table, title: &str) -> Result<Vec<u8>> {
    PdfRenderer::default().render(table, title)
}

pub fn write_report(path: &Path, table: &Table, title: &str) -> Result<()> {
    write_report_with(&PdfRenderer::default(), path, table, title)
}

#[tracing::instrument(skip(renderer, table), fields(rows = table.rows.len()))]
pub fn write_report_with<R: TableRenderer>(
    renderer: &R,
    path: &Path,
    table: &Table,
    title: &str,
) -> Result<()> {
    let bytes = renderer.render(table, title)?;
    std::fs::write(path, bytes)?;
    info!(path = %path.display(), "wrote report");
    Ok(())
}
