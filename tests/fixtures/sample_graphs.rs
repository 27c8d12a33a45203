// Helper functions to build test graphs with various configurations

#![allow(dead_code)]

use diagram_graph::{CellAttrs, Endpoint, Graph};
use serde_json::{json, Value};

pub fn element(id: &str) -> CellAttrs {
    CellAttrs::element(id, "basic.Rect")
}

pub fn link(id: &str, source: &str, target: &str) -> CellAttrs {
    CellAttrs::link(id, Endpoint::cell(source), Endpoint::cell(target))
}

/// a -> b -> c, plus c -> a closing the triangle
pub fn create_triangle() -> Graph {
    let mut graph = Graph::new();
    graph
        .add_cells(vec![
            element("a"),
            element("b"),
            element("c"),
            link("ab", "a", "b"),
            link("bc", "b", "c"),
            link("ca", "c", "a"),
        ])
        .unwrap();
    graph
}

/// Hub with two spokes, a self-loop on the hub and an unrelated link
pub fn create_hub() -> Graph {
    let mut graph = Graph::new();
    graph
        .add_cells(vec![
            element("hub"),
            element("left"),
            element("right"),
            link("to-left", "hub", "left"),
            link("from-right", "right", "hub"),
            link("loop", "hub", "hub"),
            link("left-right", "left", "right"),
        ])
        .unwrap();
    graph
}

/// Document in the wire shape, including a dangling link and extra attributes
pub fn sample_document() -> Value {
    json!({
        "paper": { "width": 800, "height": 600, "gridSize": 10 },
        "title": "Deployment",
        "cells": [
            {
                "id": "web",
                "type": "basic.Rect",
                "position": { "x": 40, "y": 40 },
                "size": { "width": 120, "height": 60 }
            },
            { "id": "db", "type": "basic.Circle", "z": 10 },
            { "id": "queue", "type": "devops.Queue" },
            {
                "id": "web-db",
                "type": "link",
                "source": { "id": "web" },
                "target": { "id": "db" }
            },
            {
                "id": "web-queue",
                "type": "link",
                "source": { "id": "web" },
                "target": { "id": "queue" }
            },
            {
                "id": "dangling",
                "type": "link",
                "source": { "x": 300, "y": 40 },
                "target": { "id": "queue" }
            }
        ]
    })
}
