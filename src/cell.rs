use crate::error::{GraphError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use ulid::Ulid;

/// Unanchored position on the paper
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    /// Create a new point
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// One end of a link: another cell (by id), a free point, or any other object
///
/// Keys besides `id` (`port`, `selector`, ...) are carried through untouched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Endpoint {
    /// Weak reference to a cell; does not keep the cell alive
    Cell {
        id: String,
        #[serde(flatten)]
        extra: Map<String, Value>,
    },
    Point(Point),
    /// Object that is neither; never references a cell
    Other(Map<String, Value>),
}

impl Endpoint {
    /// Reference a cell by id
    pub fn cell(id: impl Into<String>) -> Self {
        Endpoint::Cell {
            id: id.into(),
            extra: Map::new(),
        }
    }

    /// Free point endpoint
    pub fn point(x: f64, y: f64) -> Self {
        Endpoint::Point(Point::new(x, y))
    }

    /// The point a disconnected endpoint is moved to
    pub fn origin() -> Self {
        Self::point(0.0, 0.0)
    }

    /// Id of the referenced cell, if this endpoint is anchored
    pub fn cell_id(&self) -> Option<&str> {
        match self {
            Endpoint::Cell { id, .. } => Some(id),
            Endpoint::Point(_) | Endpoint::Other(_) => None,
        }
    }

    /// Check if this endpoint references the given cell
    pub fn references(&self, cell_id: &str) -> bool {
        self.cell_id() == Some(cell_id)
    }
}

/// Cell attributes as they appear on the wire
///
/// `type` is mandatory; everything the model does not interpret is kept in
/// `attrs` in its original order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CellAttrs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(rename = "type")]
    pub cell_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<Endpoint>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<Endpoint>,

    #[serde(flatten)]
    pub attrs: Map<String, Value>,
}

impl CellAttrs {
    /// Attributes for a cell of the given type
    pub fn new(cell_type: impl Into<String>) -> Self {
        Self {
            id: None,
            cell_type: cell_type.into(),
            z: None,
            source: None,
            target: None,
            attrs: Map::new(),
        }
    }

    /// Element attributes with an explicit id
    pub fn element(id: impl Into<String>, cell_type: impl Into<String>) -> Self {
        Self::new(cell_type).with_id(id)
    }

    /// Link attributes between two endpoints
    pub fn link(id: impl Into<String>, source: Endpoint, target: Endpoint) -> Self {
        let mut attrs = Self::new(LINK_TYPE).with_id(id);
        attrs.source = Some(source);
        attrs.target = Some(target);
        attrs
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_z(mut self, z: i64) -> Self {
        self.z = Some(z);
        self
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attrs.insert(key.into(), value);
        self
    }

    /// Parse attributes from a JSON value
    pub fn from_value(value: Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }
}

/// The `type` sentinel that selects a link record
pub const LINK_TYPE: &str = "link";

/// Concrete record kind, resolved once from `type` at construction
///
/// This only selects how the record was built. Whether a cell takes part in
/// connectivity is decided by its endpoints, see [`Cell::is_link`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellModel {
    /// Built for `type == "link"`
    Link,
    /// A registered shape
    Shape { namespace: String, kind: String },
    /// Fallback for types without a registered shape
    Element,
}

/// A member of the graph: an element (node) or a link (edge)
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    id: String,
    cell_type: String,
    model: CellModel,
    z: Option<i64>,
    source: Option<Endpoint>,
    target: Option<Endpoint>,
    attrs: Map<String, Value>,
}

impl Cell {
    /// Build a cell record from wire attributes, generating an id when absent
    pub fn new(attrs: CellAttrs, model: CellModel) -> Self {
        Self {
            id: attrs.id.unwrap_or_else(|| Ulid::new().to_string()),
            cell_type: attrs.cell_type,
            model,
            z: attrs.z,
            source: attrs.source,
            target: attrs.target,
            attrs: attrs.attrs,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn cell_type(&self) -> &str {
        &self.cell_type
    }

    pub fn model(&self) -> &CellModel {
        &self.model
    }

    /// Raw `z` attribute
    pub fn z(&self) -> Option<i64> {
        self.z
    }

    /// Rank used for ordering; a missing `z` counts as 0
    pub fn z_index(&self) -> i64 {
        self.z.unwrap_or(0)
    }

    pub fn source(&self) -> Option<&Endpoint> {
        self.source.as_ref()
    }

    pub fn target(&self) -> Option<&Endpoint> {
        self.target.as_ref()
    }

    /// Links are told apart by shape: they carry both endpoints
    ///
    /// A `link`-typed record missing an end is not a link here, and an element
    /// type given both ends is.
    pub fn is_link(&self) -> bool {
        self.source.is_some() && self.target.is_some()
    }

    pub fn is_element(&self) -> bool {
        !self.is_link()
    }

    /// Shape-specific attributes
    pub fn attrs(&self) -> &Map<String, Value> {
        &self.attrs
    }

    /// Read any attribute as JSON
    pub fn get(&self, attribute: &str) -> Option<Value> {
        match attribute {
            "id" => Some(Value::String(self.id.clone())),
            "type" => Some(Value::String(self.cell_type.clone())),
            "z" => self.z.map(Value::from),
            "source" => self.source.as_ref().and_then(|e| serde_json::to_value(e).ok()),
            "target" => self.target.as_ref().and_then(|e| serde_json::to_value(e).ok()),
            other => self.attrs.get(other).cloned(),
        }
    }

    /// Write an attribute, returning whether the stored value changed
    ///
    /// `null` clears optional attributes.
    pub fn set(&mut self, attribute: &str, value: Value) -> Result<bool> {
        match attribute {
            "id" | "type" => Err(GraphError::ReadOnlyAttribute(attribute.to_string())),
            "z" => {
                let z = match &value {
                    Value::Null => None,
                    v => Some(v.as_i64().ok_or_else(|| GraphError::InvalidAttribute {
                        attribute: attribute.to_string(),
                        reason: format!("expected an integer, got {}", v),
                    })?),
                };
                Ok(replace(&mut self.z, z))
            }
            "source" | "target" => {
                let endpoint = parse_endpoint(attribute, value)?;
                let slot = if attribute == "source" {
                    &mut self.source
                } else {
                    &mut self.target
                };
                Ok(replace(slot, endpoint))
            }
            other => {
                if value.is_null() {
                    Ok(self.attrs.remove(other).is_some())
                } else if self.attrs.get(other) == Some(&value) {
                    Ok(false)
                } else {
                    self.attrs.insert(other.to_string(), value);
                    Ok(true)
                }
            }
        }
    }

    /// Convert back to the wire shape
    pub fn to_attrs(&self) -> CellAttrs {
        CellAttrs {
            id: Some(self.id.clone()),
            cell_type: self.cell_type.clone(),
            z: self.z,
            source: self.source.clone(),
            target: self.target.clone(),
            attrs: self.attrs.clone(),
        }
    }
}

fn parse_endpoint(attribute: &str, value: Value) -> Result<Option<Endpoint>> {
    if value.is_null() {
        return Ok(None);
    }
    serde_json::from_value(value)
        .map(Some)
        .map_err(|e| GraphError::InvalidAttribute {
            attribute: attribute.to_string(),
            reason: e.to_string(),
        })
}

fn replace<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        false
    } else {
        *slot = value;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    #[test]
    fn test_attrs_parse_wire_shape() {
        let attrs = CellAttrs::from_value(json!({
            "id": "l1",
            "type": "link",
            "z": 4,
            "source": { "id": "a" },
            "target": { "x": 10, "y": 20 },
            "labels": ["x"]
        }))
        .unwrap();

        assert_eq!(attrs.id.as_deref(), Some("l1"));
        assert_eq!(attrs.z, Some(4));
        assert_eq!(attrs.source, Some(Endpoint::cell("a")));
        assert_eq!(attrs.target, Some(Endpoint::point(10.0, 20.0)));
        assert_eq!(attrs.attrs.get("labels"), Some(&json!(["x"])));
    }

    #[test]
    fn test_endpoint_keeps_extra_keys() {
        let source = json!({ "id": "a", "port": "out", "selector": ".body" });
        let endpoint: Endpoint = serde_json::from_value(source.clone()).unwrap();

        assert!(endpoint.references("a"));
        assert_eq!(serde_json::to_value(&endpoint).unwrap(), source);
    }

    #[test]
    fn test_nonconforming_endpoint_is_kept_verbatim() {
        let odd = json!({ "id": 5 });
        let endpoint: Endpoint = serde_json::from_value(odd.clone()).unwrap();

        assert_matches!(endpoint, Endpoint::Other(_));
        assert_eq!(endpoint.cell_id(), None);
        assert_eq!(serde_json::to_value(&endpoint).unwrap(), odd);

        let labelled = json!({ "x": 1, "y": 2, "name": "anchor" });
        let endpoint: Endpoint = serde_json::from_value(labelled.clone()).unwrap();
        assert_eq!(serde_json::to_value(&endpoint).unwrap(), labelled);
    }

    #[test]
    fn test_attrs_require_type() {
        let result = CellAttrs::from_value(json!({ "id": "a" }));
        assert_matches!(result, Err(GraphError::Json(_)));
    }

    #[test]
    fn test_cell_generates_missing_id() {
        let a = Cell::new(CellAttrs::new("basic.Rect"), CellModel::Element);
        let b = Cell::new(CellAttrs::new("basic.Rect"), CellModel::Element);

        assert!(!a.id().is_empty());
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_link_detection_by_shape() {
        let link = Cell::new(
            CellAttrs::link("l", Endpoint::cell("a"), Endpoint::cell("b")),
            CellModel::Link,
        );
        let element = Cell::new(CellAttrs::element("a", "basic.Rect"), CellModel::Element);

        assert!(link.is_link());
        assert!(element.is_element());
        assert_eq!(element.z_index(), 0);

        let half = Cell::new(
            CellAttrs::new(LINK_TYPE).with_id("h"),
            CellModel::Link,
        );
        assert_eq!(half.model(), &CellModel::Link);
        assert!(!half.is_link());
    }

    #[test]
    fn test_set_reports_changes() {
        let mut cell = Cell::new(CellAttrs::element("a", "basic.Rect"), CellModel::Element);

        assert!(cell.set("z", json!(3)).unwrap());
        assert!(!cell.set("z", json!(3)).unwrap());
        assert_eq!(cell.z(), Some(3));

        assert!(cell.set("label", json!("hi")).unwrap());
        assert_eq!(cell.get("label"), Some(json!("hi")));
        assert!(cell.set("label", Value::Null).unwrap());
        assert_eq!(cell.get("label"), None);

        assert!(cell.set("source", json!({ "id": "b" })).unwrap());
        assert_eq!(cell.source(), Some(&Endpoint::cell("b")));
    }

    #[test]
    fn test_set_rejects_bad_values() {
        let mut cell = Cell::new(CellAttrs::element("a", "basic.Rect"), CellModel::Element);

        assert_matches!(cell.set("id", json!("b")), Err(GraphError::ReadOnlyAttribute(_)));
        assert_matches!(cell.set("type", json!("x")), Err(GraphError::ReadOnlyAttribute(_)));
        assert_matches!(
            cell.set("z", json!("top")),
            Err(GraphError::InvalidAttribute { .. })
        );
        assert_matches!(
            cell.set("target", json!(42)),
            Err(GraphError::InvalidAttribute { .. })
        );
    }

    #[test]
    fn test_to_attrs_keeps_extra_attributes() {
        let attrs = CellAttrs::element("a", "basic.Rect")
            .with_z(2)
            .with_attr("size", json!({ "width": 10, "height": 5 }));
        let cell = Cell::new(attrs.clone(), CellModel::Element);

        assert_eq!(cell.to_attrs(), attrs);
    }
}
