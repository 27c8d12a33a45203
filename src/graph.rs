use crate::collection::{CellCollection, LinkQuery};
use crate::error::{GraphError, Result};
use crate::{Cell, CellAttrs, CellOptions, Endpoint, GraphEvent, ShapeRegistry};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;
use tracing::{debug, debug_span, trace};

/// Callback invoked for every notification, with the graph it came from
pub type Listener = Rc<dyn Fn(&mut Graph, &GraphEvent)>;

/// Handle returned by [`Graph::on`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// A diagram: an ordered cell collection plus graph-level paper state
///
/// Every notification produced by the collection is re-emitted to the graph's
/// listeners synchronously, in subscription order. Listeners receive the graph
/// mutably and may change it; events caused by such changes are delivered
/// before the remaining events of the outer operation.
pub struct Graph {
    cells: CellCollection,

    /// Top-level attributes other than `cells`
    paper: Map<String, Value>,

    listeners: Vec<(ListenerId, Listener)>,
    next_listener: u64,

    /// Cells whose removal cascade is in progress
    removing: HashSet<String>,
}

impl Graph {
    /// Create an empty graph with the `basic` shapes registered
    pub fn new() -> Self {
        Self::with_registry(Arc::new(ShapeRegistry::with_basic_shapes()))
    }

    /// Create an empty graph that constructs cells through `registry`
    pub fn with_registry(registry: Arc<ShapeRegistry>) -> Self {
        let mut paper = Map::new();
        paper.insert("paper".to_string(), Value::Object(Map::new()));

        Self {
            cells: CellCollection::new(registry),
            paper,
            listeners: Vec::new(),
            next_listener: 0,
            removing: HashSet::new(),
        }
    }

    /// The underlying cell collection
    pub fn cells(&self) -> &CellCollection {
        &self.cells
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    // ========== Listeners ==========

    /// Subscribe to every notification
    pub fn on<F>(&mut self, listener: F) -> ListenerId
    where
        F: Fn(&mut Graph, &GraphEvent) + 'static,
    {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        let listener: Listener = Rc::new(listener);
        self.listeners.push((id, listener));
        id
    }

    /// Unsubscribe; returns whether the listener was registered
    pub fn off(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(listener_id, _)| *listener_id != id);
        self.listeners.len() != before
    }

    /// Deliver the collection's pending notifications
    fn flush(&mut self) {
        for event in self.cells.take_events() {
            self.dispatch(&event);
        }
    }

    fn dispatch(&mut self, event: &GraphEvent) {
        trace!(event = %event.name(), cell = ?event.cell_id(), "dispatch");
        let listeners: Vec<Listener> = self.listeners.iter().map(|(_, l)| Rc::clone(l)).collect();
        for listener in listeners {
            listener(self, event);
        }
    }

    // ========== Paper State ==========

    /// Graph-level attributes, opaque to the cell model
    pub fn paper(&self) -> &Map<String, Value> {
        &self.paper
    }

    pub fn paper_attr(&self, key: &str) -> Option<&Value> {
        self.paper.get(key)
    }

    /// Set a graph-level attribute; `cells` is reserved
    pub fn set_paper_attr(&mut self, key: impl Into<String>, value: Value) -> Result<()> {
        let key = key.into();
        if key == "cells" {
            return Err(GraphError::ReadOnlyAttribute(key));
        }
        self.paper.insert(key, value);
        Ok(())
    }

    // ========== Loading ==========

    /// Bulk-load `{ paper, cells, ... }`
    ///
    /// Everything is validated before the graph is touched: a malformed
    /// document or a duplicate id leaves the graph unchanged.
    pub fn from_json(&mut self, json: Value) -> Result<()> {
        let Value::Object(attrs) = json else {
            return Err(GraphError::MalformedGraph(
                "graph JSON must be an object".to_string(),
            ));
        };

        let present = |key: &str| attrs.get(key).is_some_and(|v| !v.is_null());
        if !present("paper") || !present("cells") {
            return Err(GraphError::MalformedGraph(
                "graph JSON must contain paper and cells properties".to_string(),
            ));
        }

        let mut cells = Vec::new();
        let mut paper = Map::new();
        for (key, value) in attrs {
            if key != "cells" {
                paper.insert(key, value);
                continue;
            }
            match value {
                Value::Array(entries) => cells = entries,
                _ => {
                    return Err(GraphError::MalformedGraph(
                        "cells must be an array".to_string(),
                    ))
                }
            }
        }

        // Stack z-less cells in document order, as consecutive `add_cell`s would
        let base = self.cells.len();
        let batch = cells
            .into_iter()
            .enumerate()
            .map(|(index, value)| {
                let mut attrs = CellAttrs::from_value(value)?;
                if attrs.z.is_none() {
                    attrs.z = Some((base + index) as i64);
                }
                Ok(attrs)
            })
            .collect::<Result<Vec<_>>>()?;
        let staged = self.cells.build(batch)?;

        debug!(cells = staged.len(), attributes = paper.len(), "loading graph");

        self.paper.extend(paper);
        for cell in staged {
            self.insert_cell(cell)?;
        }
        Ok(())
    }

    /// Parse and bulk-load a JSON document
    pub fn from_json_str(&mut self, json: &str) -> Result<()> {
        self.from_json(serde_json::from_str(json)?)
    }

    /// Paper state plus `cells` in z order
    pub fn to_json(&self) -> Result<Value> {
        let mut json = self.paper.clone();
        let cells = self
            .cells
            .iter()
            .map(|cell| serde_json::to_value(cell.to_attrs()))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        json.insert("cells".to_string(), Value::Array(cells));
        Ok(Value::Object(json))
    }

    // ========== Cells ==========

    /// Add one cell, stacking it on top when it has no `z`
    pub fn add_cell(&mut self, mut attrs: CellAttrs) -> Result<String> {
        if attrs.z.is_none() {
            attrs.z = Some(self.cells.len() as i64);
        }

        // `z` was assigned before insertion, so no change event is emitted for it
        let mut built = self.cells.build(vec![attrs])?;
        match built.pop() {
            Some(cell) => self.insert_cell(cell),
            None => Ok(String::new()),
        }
    }

    fn insert_cell(&mut self, cell: Cell) -> Result<String> {
        let id = cell.id().to_string();
        self.cells.insert(vec![cell], &CellOptions::default())?;
        self.flush();

        debug!(id = %id, "added cell");
        Ok(id)
    }

    /// Add cells one at a time, in order
    pub fn add_cells(&mut self, cells: Vec<CellAttrs>) -> Result<Vec<String>> {
        cells.into_iter().map(|attrs| self.add_cell(attrs)).collect()
    }

    /// Add a cell object or an array of them
    pub fn add_json(&mut self, json: Value) -> Result<Vec<String>> {
        match json {
            Value::Array(entries) => {
                let batch = entries
                    .into_iter()
                    .map(CellAttrs::from_value)
                    .collect::<Result<Vec<_>>>()?;
                self.add_cells(batch)
            }
            other => Ok(vec![self.add_cell(CellAttrs::from_value(other)?)?]),
        }
    }

    /// Get a cell by id
    pub fn get_cell(&self, id: &str) -> Option<&Cell> {
        self.cells.get(id)
    }

    /// Update an attribute and notify listeners
    pub fn set_cell_attr(
        &mut self,
        id: &str,
        attribute: &str,
        value: Value,
        options: &CellOptions,
    ) -> Result<bool> {
        let changed = self.cells.set(id, attribute, value, options)?;
        self.flush();
        Ok(changed)
    }

    /// Emit a custom event for a cell
    pub fn trigger(&mut self, name: &str, id: &str, options: &CellOptions) -> Result<()> {
        self.cells.trigger(name, id, options)?;
        self.flush();
        Ok(())
    }

    /// Remove a cell together with its link cascade
    ///
    /// Listeners see one `remove` for the cell while it is still present,
    /// then the cascade (links rewired to the origin with
    /// `disconnect_links`, otherwise removed), after which the cell is
    /// dropped. A silent removal skips both the notification and the cascade.
    pub fn remove_cell(&mut self, id: &str, options: &CellOptions) -> Result<Option<Cell>> {
        if self.removing.contains(id) || !self.cells.contains(id) {
            return Ok(None);
        }

        if options.silent {
            return Ok(self.cells.remove(id, options));
        }

        let _span = debug_span!("remove_cell", id).entered();
        self.removing.insert(id.to_string());
        let result = self.remove_with_cascade(id, options);
        self.removing.remove(id);
        result
    }

    fn remove_with_cascade(&mut self, id: &str, options: &CellOptions) -> Result<Option<Cell>> {
        self.cells.trigger("remove", id, options)?;
        self.flush();

        if options.disconnect_links {
            self.disconnect_links(id)?;
        } else {
            self.remove_links(id)?;
        }

        // Listeners already saw `remove` above
        let removed = self.cells.remove(id, &options.silenced());
        debug!(removed = removed.is_some(), "removed cell");
        Ok(removed)
    }

    /// Remove every cell, cascading as ordinary removals do; paper state is kept
    pub fn clear(&mut self) -> Result<()> {
        for id in self.cells.ids() {
            self.remove_cell(&id, &CellOptions::default())?;
        }
        Ok(())
    }

    // ========== Connectivity ==========

    /// Links attached to a cell; see [`CellCollection::connected_links`]
    pub fn connected_links(&self, id: &str, query: LinkQuery) -> Vec<&Cell> {
        self.cells.connected_links(id, query)
    }

    fn connected_link_ids(&self, id: &str) -> Vec<String> {
        self.connected_links(id, LinkQuery::both())
            .into_iter()
            .map(|link| link.id().to_string())
            .collect()
    }

    /// Detach every link touching `id`, moving that end to the origin
    pub fn disconnect_links(&mut self, id: &str) -> Result<()> {
        let origin = serde_json::to_value(Endpoint::origin())?;

        for link_id in self.connected_link_ids(id) {
            // Earlier steps or listeners may have changed the link
            let Some(link) = self.cells.get(&link_id) else {
                continue;
            };
            let end = if link.source().is_some_and(|s| s.references(id)) {
                "source"
            } else if link.target().is_some_and(|t| t.references(id)) {
                "target"
            } else {
                continue;
            };

            debug!(link = %link_id, end, "disconnecting link");
            self.set_cell_attr(&link_id, end, origin.clone(), &CellOptions::default())?;
        }

        Ok(())
    }

    /// Remove every link touching `id`
    pub fn remove_links(&mut self, id: &str) -> Result<()> {
        for link_id in self.connected_link_ids(id) {
            debug!(link = %link_id, "removing link");
            self.remove_cell(&link_id, &CellOptions::default())?;
        }
        Ok(())
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Graph")
            .field("cells", &self.cells)
            .field("paper", &self.paper)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
