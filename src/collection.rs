use crate::error::{GraphError, Result};
use crate::{Cell, CellAttrs, CellOptions, EventKind, GraphEvent, ShapeRegistry};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;

/// Direction filter for connectivity queries
///
/// When neither flag is given both directions are selected; when only one is
/// given the other counts as `false`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkQuery {
    pub inbound: Option<bool>,
    pub outbound: Option<bool>,
}

impl LinkQuery {
    /// Both directions
    pub fn both() -> Self {
        Self::default()
    }

    /// Links whose target is the cell
    pub fn inbound() -> Self {
        Self {
            inbound: Some(true),
            outbound: Some(false),
        }
    }

    /// Links whose source is the cell
    pub fn outbound() -> Self {
        Self {
            inbound: Some(false),
            outbound: Some(true),
        }
    }

    fn resolve(self) -> (bool, bool) {
        match (self.inbound, self.outbound) {
            (None, None) => (true, true),
            (inbound, outbound) => (inbound.unwrap_or(false), outbound.unwrap_or(false)),
        }
    }
}

/// Ordered set of cells, unique by id and sorted by `z`
#[derive(Debug, Clone)]
pub struct CellCollection {
    /// Cells in ascending `z` order; ties keep insertion order
    cells: Vec<Cell>,

    registry: Arc<ShapeRegistry>,

    /// Notifications not yet taken by the owner
    events: Vec<GraphEvent>,
}

impl CellCollection {
    /// Create an empty collection using the given shape registry
    pub fn new(registry: Arc<ShapeRegistry>) -> Self {
        Self {
            cells: Vec::new(),
            registry,
            events: Vec::new(),
        }
    }

    pub fn registry(&self) -> &Arc<ShapeRegistry> {
        &self.registry
    }

    // ========== Membership ==========

    /// Insert cells, constructing each record from its `type`
    ///
    /// Fails without inserting anything if any constructed id is already
    /// present or repeated within `batch`.
    pub fn add(&mut self, batch: Vec<CellAttrs>, options: &CellOptions) -> Result<Vec<String>> {
        let cells = self.build(batch)?;
        self.insert(cells, options)
    }

    /// Construct records through the registry without inserting them
    ///
    /// Ids are checked after construction, since shape factories may rewrite
    /// them.
    pub fn build(&self, batch: Vec<CellAttrs>) -> Result<Vec<Cell>> {
        let cells: Vec<Cell> = batch
            .into_iter()
            .map(|attrs| self.registry.construct(attrs))
            .collect();
        self.check_unique(&cells)?;
        Ok(cells)
    }

    /// Insert already constructed records, then sort and log `add` events
    pub fn insert(&mut self, cells: Vec<Cell>, options: &CellOptions) -> Result<Vec<String>> {
        self.check_unique(&cells)?;
        if cells.is_empty() {
            return Ok(Vec::new());
        }

        let added: Vec<String> = cells.iter().map(|c| c.id().to_string()).collect();
        self.cells.extend(cells);
        self.sort();

        if !options.silent {
            for id in &added {
                let cell = self.get(id).cloned();
                self.log_event(EventKind::Add, cell, options);
            }
            self.log_event(EventKind::Sort, None, options);
        }

        Ok(added)
    }

    /// Verify that `cells` introduce only new, distinct ids
    fn check_unique(&self, cells: &[Cell]) -> Result<()> {
        let mut seen = HashSet::new();
        for id in cells.iter().map(Cell::id) {
            if self.contains(id) || !seen.insert(id) {
                return Err(GraphError::DuplicateId(id.to_string()));
            }
        }
        Ok(())
    }

    /// Remove a cell by id, returning it if it was present
    pub fn remove(&mut self, id: &str, options: &CellOptions) -> Option<Cell> {
        let index = self.index_of(id)?;
        let cell = self.cells.remove(index);

        if !options.silent {
            self.log_event(EventKind::Remove, Some(cell.clone()), options);
        }

        Some(cell)
    }

    /// Get a cell by id
    pub fn get(&self, id: &str) -> Option<&Cell> {
        self.cells.iter().find(|c| c.id() == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Position of a cell in z order
    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.cells.iter().position(|c| c.id() == id)
    }

    /// Iterate cells in z order
    pub fn iter(&self) -> impl Iterator<Item = &Cell> {
        self.cells.iter()
    }

    /// Ids in z order
    pub fn ids(&self) -> Vec<String> {
        self.cells.iter().map(|c| c.id().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    // ========== Attributes ==========

    /// Update one attribute of a cell
    ///
    /// Emits `change:<attr>` followed by `change` when the value actually
    /// changed; a `z` change re-sorts the collection and emits `sort`.
    pub fn set(
        &mut self,
        id: &str,
        attribute: &str,
        value: Value,
        options: &CellOptions,
    ) -> Result<bool> {
        let index = self
            .index_of(id)
            .ok_or_else(|| GraphError::CellNotFound(id.to_string()))?;

        let changed = self.cells[index].set(attribute, value)?;
        if !changed {
            return Ok(false);
        }

        if !options.silent {
            let cell = Some(self.cells[index].clone());
            self.log_event(EventKind::Change(attribute.to_string()), cell.clone(), options);
            self.log_event(EventKind::Changed, cell, options);
        }

        if attribute == "z" {
            self.sort();
            if !options.silent {
                self.log_event(EventKind::Sort, None, options);
            }
        }

        Ok(true)
    }

    /// Emit an arbitrary event for a cell
    pub fn trigger(&mut self, name: &str, id: &str, options: &CellOptions) -> Result<()> {
        let cell = self
            .get(id)
            .cloned()
            .ok_or_else(|| GraphError::CellNotFound(id.to_string()))?;
        let kind = match name {
            "add" => EventKind::Add,
            "remove" => EventKind::Remove,
            "change" => EventKind::Changed,
            "sort" => EventKind::Sort,
            other => match other.strip_prefix("change:") {
                Some(attribute) => EventKind::Change(attribute.to_string()),
                None => EventKind::Custom(other.to_string()),
            },
        };
        self.log_event(kind, Some(cell), options);
        Ok(())
    }

    // ========== Ordering ==========

    /// Stable sort by `z`, missing `z` counting as 0
    fn sort(&mut self) {
        self.cells.sort_by_key(Cell::z_index);
    }

    // ========== Connectivity ==========

    /// Links attached to `cell_id`, in z order
    ///
    /// A link is reported once per matching direction, so a self-loop appears
    /// twice when both directions are requested.
    pub fn connected_links(&self, cell_id: &str, query: LinkQuery) -> Vec<&Cell> {
        let (inbound, outbound) = query.resolve();
        let mut links = Vec::new();

        for cell in &self.cells {
            if outbound && cell.source().is_some_and(|s| s.references(cell_id)) {
                links.push(cell);
            }
            if inbound && cell.target().is_some_and(|t| t.references(cell_id)) {
                links.push(cell);
            }
        }

        links
    }

    // ========== Event Logging ==========

    fn log_event(&mut self, kind: EventKind, cell: Option<Cell>, options: &CellOptions) {
        self.events
            .push(GraphEvent::new(kind, cell, options.clone()));
    }

    /// Pending notifications, oldest first
    pub fn events(&self) -> &[GraphEvent] {
        &self.events
    }

    /// Take all pending notifications
    pub fn take_events(&mut self) -> Vec<GraphEvent> {
        std::mem::take(&mut self.events)
    }
}

impl Default for CellCollection {
    fn default() -> Self {
        Self::new(Arc::new(ShapeRegistry::default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CellModel, Endpoint};
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn element(id: &str) -> CellAttrs {
        CellAttrs::element(id, "basic.Rect")
    }

    fn link(id: &str, source: &str, target: &str) -> CellAttrs {
        CellAttrs::link(id, Endpoint::cell(source), Endpoint::cell(target))
    }

    fn event_names(collection: &mut CellCollection) -> Vec<String> {
        collection
            .take_events()
            .iter()
            .map(|e| match e.cell_id() {
                Some(id) => format!("{}:{}", e.name(), id),
                None => e.name(),
            })
            .collect()
    }

    #[test]
    fn test_add_and_get() {
        let mut cells = CellCollection::new(Arc::new(ShapeRegistry::with_basic_shapes()));
        let ids = cells
            .add(vec![element("a"), link("l", "a", "a")], &CellOptions::default())
            .unwrap();

        assert_eq!(ids, vec!["a", "l"]);
        assert_eq!(cells.len(), 2);
        assert_matches!(cells.get("a").unwrap().model(), CellModel::Shape { .. });
        assert_eq!(cells.get("l").unwrap().model(), &CellModel::Link);
        assert!(cells.get("missing").is_none());
        assert_eq!(event_names(&mut cells), vec!["add:a", "add:l", "sort"]);
    }

    #[test]
    fn test_duplicate_id_rejected_atomically() {
        let mut cells = CellCollection::default();
        cells.add(vec![element("a")], &CellOptions::default()).unwrap();
        cells.take_events();

        let result = cells.add(vec![element("b"), element("a")], &CellOptions::default());
        assert_matches!(result, Err(GraphError::DuplicateId(id)) if id == "a");
        assert!(!cells.contains("b"));

        let result = cells.add(vec![element("c"), element("c")], &CellOptions::default());
        assert_matches!(result, Err(GraphError::DuplicateId(id)) if id == "c");
        assert_eq!(cells.len(), 1);
        assert!(cells.events().is_empty());
    }

    #[test]
    fn test_rewritten_ids_rejected_atomically() {
        let mut registry = ShapeRegistry::new();
        registry
            .register("x", "Fixed", |attrs: CellAttrs| attrs.with_id("fixed"))
            .unwrap();
        let mut cells = CellCollection::new(Arc::new(registry));

        let batch = vec![
            element("p").with_z(5),
            CellAttrs::element("q", "x.Fixed").with_z(0),
            CellAttrs::element("r", "x.Fixed").with_z(1),
        ];
        let result = cells.add(batch, &CellOptions::default());

        assert_matches!(result, Err(GraphError::DuplicateId(id)) if id == "fixed");
        assert!(cells.is_empty());
        assert!(cells.events().is_empty());

        cells
            .add(vec![CellAttrs::element("q", "x.Fixed")], &CellOptions::default())
            .unwrap();
        cells.take_events();
        assert_matches!(
            cells.add(vec![CellAttrs::element("s", "x.Fixed")], &CellOptions::default()),
            Err(GraphError::DuplicateId(_))
        );
        assert_eq!(cells.ids(), vec!["fixed"]);
        assert!(cells.events().is_empty());
    }

    #[test]
    fn test_sorted_by_z_stable() {
        let mut cells = CellCollection::default();
        cells
            .add(
                vec![
                    element("three").with_z(3),
                    element("one").with_z(1),
                    element("two").with_z(2),
                    element("one-again").with_z(1),
                    element("none"),
                ],
                &CellOptions::default(),
            )
            .unwrap();

        assert_eq!(cells.ids(), vec!["none", "one", "one-again", "two", "three"]);
    }

    #[test]
    fn test_z_change_resorts() {
        let mut cells = CellCollection::default();
        cells
            .add(vec![element("a").with_z(0), element("b").with_z(1)], &CellOptions::default())
            .unwrap();
        cells.take_events();

        assert!(cells.set("a", "z", json!(5), &CellOptions::default()).unwrap());
        assert_eq!(cells.ids(), vec!["b", "a"]);
        assert_eq!(event_names(&mut cells), vec!["change:z:a", "change:a", "sort"]);

        assert!(!cells.set("a", "z", json!(5), &CellOptions::default()).unwrap());
        assert!(cells.events().is_empty());
    }

    #[test]
    fn test_set_missing_cell() {
        let mut cells = CellCollection::default();
        assert_matches!(
            cells.set("nope", "z", json!(1), &CellOptions::default()),
            Err(GraphError::CellNotFound(_))
        );
    }

    #[test]
    fn test_remove_silent_and_loud() {
        let mut cells = CellCollection::default();
        cells
            .add(vec![element("a"), element("b")], &CellOptions::default())
            .unwrap();
        cells.take_events();

        assert!(cells.remove("a", &CellOptions::silent()).is_some());
        assert!(cells.events().is_empty());

        assert!(cells.remove("b", &CellOptions::default()).is_some());
        assert_eq!(event_names(&mut cells), vec!["remove:b"]);

        assert!(cells.remove("b", &CellOptions::default()).is_none());
        assert!(cells.is_empty());
    }

    #[test]
    fn test_connected_links_directions() {
        let mut cells = CellCollection::default();
        cells
            .add(
                vec![
                    element("a"),
                    element("b"),
                    link("out", "a", "b"),
                    link("in", "b", "a"),
                    link("loop", "a", "a"),
                    link("other", "b", "b"),
                ],
                &CellOptions::default(),
            )
            .unwrap();

        let ids = |links: Vec<&Cell>| -> Vec<String> {
            links.iter().map(|c| c.id().to_string()).collect()
        };

        assert_eq!(
            ids(cells.connected_links("a", LinkQuery::both())),
            vec!["out", "in", "loop", "loop"]
        );
        assert_eq!(ids(cells.connected_links("a", LinkQuery::inbound())), vec!["in", "loop"]);
        assert_eq!(ids(cells.connected_links("a", LinkQuery::outbound())), vec!["out", "loop"]);

        let only_inbound = LinkQuery {
            inbound: Some(true),
            outbound: None,
        };
        assert_eq!(ids(cells.connected_links("a", only_inbound)), vec!["in", "loop"]);
        assert!(cells.connected_links("missing", LinkQuery::both()).is_empty());
    }

    #[test]
    fn test_point_endpoints_do_not_connect() {
        let mut cells = CellCollection::default();
        let dangling = CellAttrs::link("l", Endpoint::point(0.0, 0.0), Endpoint::cell("a"));
        cells
            .add(vec![element("a"), dangling], &CellOptions::default())
            .unwrap();

        assert!(cells.connected_links("a", LinkQuery::outbound()).is_empty());
        assert_eq!(cells.connected_links("a", LinkQuery::both()).len(), 1);
    }

    #[test]
    fn test_custom_trigger() {
        let mut cells = CellCollection::default();
        cells.add(vec![element("a")], &CellOptions::default()).unwrap();
        cells.take_events();

        cells.trigger("highlight", "a", &CellOptions::default()).unwrap();
        cells.trigger("change:label", "a", &CellOptions::default()).unwrap();

        let events = cells.take_events();
        assert_eq!(events[0].kind, EventKind::Custom("highlight".to_string()));
        assert_eq!(events[1].kind, EventKind::Change("label".to_string()));
        assert_matches!(
            cells.trigger("highlight", "missing", &CellOptions::default()),
            Err(GraphError::CellNotFound(_))
        );
    }
}
