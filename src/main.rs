use anyhow::{Context, Result};
use clap::Parser;
use diagram_graph::{CellModel, CellOptions, Endpoint, Graph, LinkQuery};
use serde_json::Value;
use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;
use tracing_subscriber::EnvFilter;

/// Inspect a diagram document and apply cell removals
#[derive(Debug, Parser)]
#[command(name = "diagram-graph", version)]
struct Cli {
    /// Graph document (`{ "paper": {...}, "cells": [...] }`)
    file: PathBuf,

    /// Remove a cell by id; may be repeated
    #[arg(long = "remove", value_name = "ID")]
    remove: Vec<String>,

    /// Detach links from removed cells instead of removing them
    #[arg(long)]
    disconnect_links: bool,

    /// Write the resulting document here
    #[arg(long, short, value_name = "FILE")]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut graph = Graph::new();
    graph.load_file(&cli.file)?;

    println!("Loaded {}", cli.file.display());
    print_cells(&graph);

    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&log);
    graph.on(move |_, event| {
        let entry = match event.cell_id() {
            Some(id) => format!("{} {}", event.name(), id),
            None => event.name(),
        };
        sink.borrow_mut().push(entry);
    });

    let options = CellOptions {
        disconnect_links: cli.disconnect_links,
        ..CellOptions::default()
    };
    for id in &cli.remove {
        let removed = graph
            .remove_cell(id, &options)
            .with_context(|| format!("Failed to remove cell {}", id))?;
        if removed.is_none() {
            println!("Cell {} not found", id);
        }
    }

    if !log.borrow().is_empty() {
        println!("\nEvents:");
        for entry in log.borrow().iter() {
            println!("  {}", entry);
        }
        println!("\nAfter removal:");
        print_cells(&graph);
    }

    if let Some(output) = &cli.output {
        graph.save_file(output)?;
        println!("\nSaved {}", output.display());
    }

    Ok(())
}

fn print_cells(graph: &Graph) {
    println!("  Cells: {}", graph.cell_count());
    for cell in graph.cells().iter() {
        if cell.is_link() || cell.model() == &CellModel::Link {
            println!(
                "  [z={}] link {}: {} -> {}",
                cell.z_index(),
                cell.id(),
                describe(cell.source()),
                describe(cell.target())
            );
        } else {
            let links = graph.connected_links(cell.id(), LinkQuery::both()).len();
            println!(
                "  [z={}] {} {} ({} link ends)",
                cell.z_index(),
                cell.cell_type(),
                cell.id(),
                links
            );
        }
    }
}

fn describe(endpoint: Option<&Endpoint>) -> String {
    match endpoint {
        Some(Endpoint::Cell { id, .. }) => id.clone(),
        Some(Endpoint::Point(p)) => format!("({}, {})", p.x, p.y),
        Some(Endpoint::Other(raw)) => Value::Object(raw.clone()).to_string(),
        None => "-".to_string(),
    }
}
