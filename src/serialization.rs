use crate::Graph;
use anyhow::{Context, Result};
use serde_json::Value;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

/// Read a graph document (`{ paper, cells, ... }`) from disk
pub fn read_document(path: &Path) -> Result<Value> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open graph file: {}", path.display()))?;
    let reader = BufReader::new(file);
    serde_json::from_reader(reader)
        .with_context(|| format!("Failed to parse graph from: {}", path.display()))
}

/// Write a graph document to disk, pretty-printed
pub fn write_document(path: &Path, document: &Value) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create graph file: {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, document)
        .with_context(|| format!("Failed to write graph to: {}", path.display()))?;
    writer
        .flush()
        .with_context(|| format!("Failed to flush graph file: {}", path.display()))?;
    Ok(())
}

impl Graph {
    /// Bulk-load a graph document from disk into this graph
    pub fn load_file(&mut self, path: &Path) -> Result<()> {
        let document = read_document(path)?;
        self.from_json(document)
            .with_context(|| format!("Invalid graph document: {}", path.display()))
    }

    /// Save paper state and cells to disk
    pub fn save_file(&self, path: &Path) -> Result<()> {
        let document = self
            .to_json()
            .context("Failed to serialize graph")?;
        write_document(path, &document)
    }
}
