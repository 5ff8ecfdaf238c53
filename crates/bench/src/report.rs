//! Rendering sweep results as a markdown table or JSON records.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::errors::Result;
use crate::kernels::{Variant, FAILED_LATENCY};
use crate::shape::WorkloadShape;

/// Outcome of one variant on one shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BenchRecord {
    pub variant: Variant,
    #[serde(flatten)]
    pub shape: WorkloadShape,
    /// Mean milliseconds per step, or `-1` when the benchmark failed.
    pub latency_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BenchRecord {
    pub fn success(variant: Variant, shape: WorkloadShape, latency_ms: f64) -> Self {
        Self {
            variant,
            shape,
            latency_ms,
            error: None,
        }
    }

    pub fn failure(variant: Variant, shape: WorkloadShape, error: impl fmt::Display) -> Self {
        Self {
            variant,
            shape,
            latency_ms: FAILED_LATENCY,
            error: Some(error.to_string()),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.error.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Markdown,
    Json,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            "json" => Ok(OutputFormat::Json),
            other => Err(format!("unknown output format '{other}' (expected markdown or json)")),
        }
    }
}

pub fn format_markdown_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut table = String::new();
    table.push_str("| ");
    table.push_str(&headers.join(" | "));
    table.push_str(" |\n| ");
    table.push_str(&headers.iter().map(|_| "---").collect::<Vec<_>>().join(" | "));
    table.push_str(" |\n");
    for row in rows {
        table.push_str("| ");
        table.push_str(&row.join(" | "));
        table.push_str(" |\n");
    }
    table
}

fn format_latency(latency_ms: f64) -> String {
    if latency_ms == FAILED_LATENCY {
        "-1".to_string()
    } else {
        format!("{latency_ms:.4}")
    }
}

pub fn render_markdown(records: &[BenchRecord]) -> String {
    let rows: Vec<Vec<String>> = records
        .iter()
        .map(|record| {
            let shape = &record.shape;
            vec![
                record.variant.to_string(),
                shape.batch_size.to_string(),
                shape.context_length.to_string(),
                format!("{}/{}", shape.num_heads, shape.num_kv_heads),
                shape.head_dim.to_string(),
                shape
                    .block_size
                    .map_or_else(|| "-".to_string(), |block| block.to_string()),
                format_latency(record.latency_ms),
            ]
        })
        .collect();
    format_markdown_table(
        &["variant", "bs", "cl", "heads (q/kv)", "head_dim", "block", "latency (ms)"],
        &rows,
    )
}

pub fn render_json(records: &[BenchRecord]) -> Result<String> {
    Ok(serde_json::to_string_pretty(records)?)
}

pub fn render(records: &[BenchRecord], format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Markdown => Ok(render_markdown(records)),
        OutputFormat::Json => render_json(records),
    }
}
