/// Example: Building and editing a small diagram
///
/// This example demonstrates:
/// - Loading a graph from JSON
/// - Adding elements and links with automatic z-ordering
/// - Listening to graph notifications
/// - Removing a node with and without link disconnection
/// - Saving the result
use anyhow::Result;
use diagram_graph::*;
use serde_json::json;
use std::cell::RefCell;
use std::rc::Rc;

fn main() -> Result<()> {
    println!("=== Diagram Graph: Simple Workflow Example ===\n");

    // Step 1: Load a document
    println!("Step 1: Loading graph...");
    let mut graph = Graph::new();
    graph.from_json(json!({
        "paper": { "width": 640, "height": 480 },
        "cells": [
            { "id": "start", "type": "basic.Circle" },
            { "id": "work", "type": "basic.Rect" },
            { "id": "start-work", "type": "link", "source": { "id": "start" }, "target": { "id": "work" } }
        ]
    }))?;
    println!("  ✓ {} cells loaded", graph.cell_count());

    // Step 2: Subscribe to notifications
    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&log);
    graph.on(move |_, event| {
        sink.borrow_mut()
            .push(format!("{} {}", event.name(), event.cell_id().unwrap_or("-")));
    });

    // Step 3: Extend the diagram
    println!("\nStep 2: Adding cells...");
    graph.add_cells(vec![
        CellAttrs::element("review", "basic.Rect"),
        CellAttrs::element("done", "basic.Circle"),
        CellAttrs::link("work-review", Endpoint::cell("work"), Endpoint::cell("review")),
        CellAttrs::link("review-done", Endpoint::cell("review"), Endpoint::cell("done")),
        CellAttrs::link("review-work", Endpoint::cell("review"), Endpoint::cell("work")),
    ])?;
    for cell in graph.cells().iter() {
        println!("  [z={}] {}", cell.z_index(), cell.id());
    }

    // Step 4: Connectivity
    let around_review = graph.connected_links("review", LinkQuery::both());
    println!("\nStep 3: 'review' has {} link ends attached", around_review.len());

    // Step 5: Remove with disconnection, then with the default cascade
    println!("\nStep 4: Removing cells...");
    graph.remove_cell("review", &CellOptions::disconnect_links())?;
    println!("  ✓ 'review' removed, links kept: {}", graph.get_cell("review-done").is_some());
    graph.remove_cell("work", &CellOptions::default())?;
    println!("  ✓ 'work' removed, 'start-work' gone: {}", graph.get_cell("start-work").is_none());

    println!("\nNotifications:");
    for entry in log.borrow().iter() {
        println!("  {}", entry);
    }

    // Step 6: Save
    let path = std::env::temp_dir().join("simple_workflow.json");
    graph.save_file(&path)?;
    println!("\n✓ Saved to {}", path.display());

    Ok(())
}
