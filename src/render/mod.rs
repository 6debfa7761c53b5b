//! Display collaborator: artifacts registered by executing code.
//!
//! The executor only captures text; anything visual goes through a
//! `RenderSink`. The terminal backend draws width-scaled bar charts, the
//! recording sink is for tests and embedding.

use owo_colors::OwoColorize;
use unicode_width::UnicodeWidthStr;

use crate::dataset::format_float;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartKind {
    Blank,
    Bar,
    Hist,
    Scatter,
}

/// Declarative chart description built up by `plt`/`sns` calls.
#[derive(Debug, Clone, PartialEq)]
pub struct FigureSpec {
    pub kind: ChartKind,
    pub title: Option<String>,
    pub xlabel: Option<String>,
    pub ylabel: Option<String>,
    /// Labelled numeric points: category/bin/x-value and its y-value.
    pub points: Vec<(String, f64)>,
}

impl FigureSpec {
    pub fn blank() -> Self {
        Self {
            kind: ChartKind::Blank,
            title: None,
            xlabel: None,
            ylabel: None,
            points: Vec::new(),
        }
    }
}

pub trait RenderSink {
    fn figure(&mut self, fig: FigureSpec);
    fn table(&mut self, preview: String);
    fn text(&mut self, text: String);
}

/// Renders artifacts straight to stdout.
#[derive(Debug, Clone)]
pub struct TerminalRenderer {
    /// Maximum bar length in cells.
    pub bar_width: usize,
}

impl Default for TerminalRenderer {
    fn default() -> Self {
        Self { bar_width: 32 }
    }
}

impl TerminalRenderer {
    fn draw_bars(&self, fig: &FigureSpec) {
        let max = fig
            .points
            .iter()
            .map(|(_, v)| v.abs())
            .fold(0f64, f64::max);
        let label_width = fig
            .points
            .iter()
            .map(|(l, _)| UnicodeWidthStr::width(l.as_str()))
            .max()
            .unwrap_or(0);
        for (label, v) in &fig.points {
            let cells = if max > 0.0 {
                ((v.abs() / max) * self.bar_width as f64).round() as usize
            } else {
                0
            };
            let bar: String = "█".repeat(cells.max(1));
            let mut padded = label.clone();
            for _ in UnicodeWidthStr::width(label.as_str())..label_width {
                padded.push(' ');
            }
            println!("  {}  {} {}", padded, bar.cyan(), format_float(*v));
        }
    }
}

impl RenderSink for TerminalRenderer {
    fn figure(&mut self, fig: FigureSpec) {
        if let Some(title) = &fig.title {
            println!("{}", title.bold());
        }
        match fig.kind {
            ChartKind::Bar | ChartKind::Hist => self.draw_bars(&fig),
            ChartKind::Scatter => {
                for (x, y) in &fig.points {
                    println!("  ({}, {})", x, format_float(*y));
                }
            }
            ChartKind::Blank => println!("(figure with no chart layers)"),
        }
        if let (Some(x), Some(y)) = (&fig.xlabel, &fig.ylabel) {
            println!("  {} {} by {}", "axes:".dimmed(), y, x);
        }
        println!();
    }

    fn table(&mut self, preview: String) {
        print!("{}", preview);
        if !preview.ends_with('\n') {
            println!();
        }
    }

    fn text(&mut self, text: String) {
        println!("{}", text);
    }
}

/// Collects artifacts instead of drawing them.
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    pub figures: Vec<FigureSpec>,
    pub tables: Vec<String>,
    pub texts: Vec<String>,
}

impl RenderSink for RecordingSink {
    fn figure(&mut self, fig: FigureSpec) {
        self.figures.push(fig);
    }

    fn table(&mut self, preview: String) {
        self.tables.push(preview);
    }

    fn text(&mut self, text: String) {
        self.texts.push(text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_sink_collects_in_order() {
        let mut sink = RecordingSink::default();
        sink.text("first".into());
        let mut fig = FigureSpec::blank();
        fig.kind = ChartKind::Bar;
        fig.points.push(("Female".into(), 110.0));
        sink.figure(fig.clone());
        assert_eq!(sink.texts, vec!["first"]);
        assert_eq!(sink.figures.len(), 1);
        assert_eq!(sink.figures[0].points[0].1, 110.0);
    }
}
