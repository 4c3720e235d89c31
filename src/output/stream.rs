//! Incremental rendering of snapshot files
//!
//! Each resource is written as soon as it is decoded, so memory use does not
//! grow with the snapshot. Only formats that can be emitted record by record
//! are available here.

use std::io::Write;
use std::path::Path;

use super::csv::{resource_record, SNAPSHOT_HEADER};
use super::table::truncate;
use super::Format;
use crate::cancel::CancellationToken;
use crate::error::{Error, Result};
use crate::models::Resource;
use crate::storage::stream::for_each_resource;
use crate::storage::SnapshotStore;

/// Fixed column widths for streamed tables: type, id, name, region
const TABLE_WIDTHS: [usize; 4] = [24, 36, 28, 16];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamFormat {
    /// One JSON object per line
    JsonLines,
    Csv,
    Table,
    Markdown,
}

impl TryFrom<Format> for StreamFormat {
    type Error = Error;

    fn try_from(format: Format) -> Result<Self> {
        match format {
            Format::Json => Ok(StreamFormat::JsonLines),
            Format::Csv => Ok(StreamFormat::Csv),
            Format::Table => Ok(StreamFormat::Table),
            Format::Markdown => Ok(StreamFormat::Markdown),
            other => Err(Error::validation(format!(
                "format {} cannot be streamed (use json, csv, table or markdown)",
                other.as_str()
            ))),
        }
    }
}

fn write_err(e: std::io::Error) -> Error {
    Error::Internal(format!("failed to write output: {}", e))
}

/// Writes resources to `out` as they are decoded
#[derive(Debug, Clone, Copy)]
pub struct StreamRenderer {
    format: StreamFormat,
}

impl StreamRenderer {
    pub fn new(format: StreamFormat) -> Self {
        Self { format }
    }

    /// Stream the snapshot document at `path`, returning the record count
    pub fn render_file(&self, path: &Path, cancel: &CancellationToken, out: &mut dyn Write) -> Result<usize> {
        self.header(out)?;
        let count = for_each_resource(path, cancel, |resource| self.record(out, &resource))?;
        self.footer(out, count)?;
        Ok(count)
    }

    /// Stream a stored snapshot by id
    pub fn render_stored(
        &self,
        store: &SnapshotStore,
        id: &str,
        cancel: &CancellationToken,
        out: &mut dyn Write,
    ) -> Result<usize> {
        self.header(out)?;
        let count = store.stream_snapshot(id, cancel, |resource| self.record(out, &resource))?;
        self.footer(out, count)?;
        Ok(count)
    }

    fn header(&self, out: &mut dyn Write) -> Result<()> {
        match self.format {
            StreamFormat::JsonLines => Ok(()),
            StreamFormat::Csv => writeln!(out, "{}", SNAPSHOT_HEADER).map_err(write_err),
            StreamFormat::Table => {
                let line = table_line(["TYPE", "ID", "NAME", "REGION"]);
                writeln!(out, "{}", line).map_err(write_err)?;
                writeln!(out, "{}", "-".repeat(line.chars().count())).map_err(write_err)
            }
            StreamFormat::Markdown => {
                writeln!(out, "| Type | ID | Name | Region |\n|---|---|---|---|").map_err(write_err)
            }
        }
    }

    fn record(&self, out: &mut dyn Write, resource: &Resource) -> Result<()> {
        match self.format {
            StreamFormat::JsonLines => {
                serde_json::to_writer(&mut *out, resource)?;
                writeln!(out).map_err(write_err)
            }
            StreamFormat::Csv => out.write_all(resource_record(resource).as_bytes()).map_err(write_err),
            StreamFormat::Table => {
                let region = resource.region.as_deref().unwrap_or("");
                let line = table_line([
                    resource.resource_type.as_str(),
                    resource.id.as_str(),
                    resource.name.as_str(),
                    region,
                ]);
                writeln!(out, "{}", line).map_err(write_err)
            }
            StreamFormat::Markdown => writeln!(
                out,
                "| {} | {} | {} | {} |",
                md_cell(&resource.resource_type),
                md_cell(&resource.id),
                md_cell(&resource.name),
                md_cell(resource.region.as_deref().unwrap_or(""))
            )
            .map_err(write_err),
        }
    }

    fn footer(&self, out: &mut dyn Write, count: usize) -> Result<()> {
        match self.format {
            StreamFormat::Table => writeln!(out, "\n{} resources", count).map_err(write_err),
            _ => Ok(()),
        }
    }
}

fn table_line(cells: [&str; 4]) -> String {
    cells
        .iter()
        .zip(TABLE_WIDTHS)
        .map(|(cell, width)| {
            let text = truncate(cell, width);
            format!("{:<width$}", text, width = width)
        })
        .collect::<Vec<_>>()
        .join("  ")
        .trim_end()
        .to_string()
}

fn md_cell(text: &str) -> String {
    text.replace('|', "\\|")
}
