//! Shape registry
//!
//! Maps a `(namespace, kind)` pair, as spelled in a cell's dotted `type`
//! attribute, to a factory that prepares the cell's attributes. The registry is
//! read-only once handed to a [`Graph`](crate::Graph); cell construction
//! consults it exactly once per inserted cell.

use crate::cell::{Cell, CellAttrs, CellModel, LINK_TYPE};
use crate::error::{GraphError, Result};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Registered shape identity
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShapeKey {
    pub namespace: String,
    pub kind: String,
}

impl ShapeKey {
    /// Create a validated key
    pub fn new(namespace: impl Into<String>, kind: impl Into<String>) -> Result<Self> {
        let key = Self {
            namespace: namespace.into(),
            kind: kind.into(),
        };
        let valid = |part: &str| !part.is_empty() && !part.contains('.');
        if valid(&key.namespace) && valid(&key.kind) {
            Ok(key)
        } else {
            Err(GraphError::InvalidShapeKey(key.to_string()))
        }
    }

    /// Split a cell `type` into its namespace and kind
    ///
    /// Only the first two dot-separated segments are used.
    fn parse(cell_type: &str) -> Option<(&str, &str)> {
        let mut parts = cell_type.split('.');
        Some((parts.next()?, parts.next()?))
    }
}

impl fmt::Display for ShapeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.namespace, self.kind)
    }
}

/// Prepares the attributes of a newly constructed shape
///
/// The returned `cell_type` is ignored: a shape keeps the type it was
/// looked up by.
pub trait ShapeFactory: Send + Sync {
    fn build(&self, attrs: CellAttrs) -> CellAttrs;
}

impl<F> ShapeFactory for F
where
    F: Fn(CellAttrs) -> CellAttrs + Send + Sync,
{
    fn build(&self, attrs: CellAttrs) -> CellAttrs {
        self(attrs)
    }
}

/// Factory that fills in default attributes without overriding supplied ones
#[derive(Debug, Clone, Default)]
pub struct ShapeDefaults {
    defaults: Map<String, Value>,
}

impl ShapeDefaults {
    /// `defaults` must be a JSON object; anything else yields no defaults
    pub fn new(defaults: Value) -> Self {
        match defaults {
            Value::Object(defaults) => Self { defaults },
            _ => Self::default(),
        }
    }
}

impl ShapeFactory for ShapeDefaults {
    fn build(&self, mut attrs: CellAttrs) -> CellAttrs {
        for (key, default) in &self.defaults {
            match attrs.attrs.get_mut(key) {
                Some(existing) => deep_supplement(existing, default),
                None => {
                    attrs.attrs.insert(key.clone(), default.clone());
                }
            }
        }
        attrs
    }
}

/// Copy keys from `defaults` that `target` lacks, recursing into objects
fn deep_supplement(target: &mut Value, defaults: &Value) {
    if let (Value::Object(target), Value::Object(defaults)) = (target, defaults) {
        for (key, default) in defaults {
            match target.get_mut(key) {
                Some(existing) => deep_supplement(existing, default),
                None => {
                    target.insert(key.clone(), default.clone());
                }
            }
        }
    }
}

/// Registry of shape factories keyed by `(namespace, kind)`
#[derive(Clone, Default)]
pub struct ShapeRegistry {
    factories: HashMap<ShapeKey, Arc<dyn ShapeFactory>>,
}

impl ShapeRegistry {
    /// Create an empty registry; every non-link cell becomes a generic element
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the `basic` shapes pre-registered
    pub fn with_basic_shapes() -> Self {
        let mut registry = Self::new();
        for (kind, defaults) in basic_shapes() {
            // Keys are static and distinct
            let key = ShapeKey {
                namespace: "basic".to_string(),
                kind: kind.to_string(),
            };
            registry
                .factories
                .insert(key, Arc::new(ShapeDefaults::new(defaults)));
        }
        registry
    }

    /// Register a factory for `namespace.kind`
    pub fn register(
        &mut self,
        namespace: &str,
        kind: &str,
        factory: impl ShapeFactory + 'static,
    ) -> Result<()> {
        let key = ShapeKey::new(namespace, kind)?;
        if self.factories.contains_key(&key) {
            return Err(GraphError::ShapeAlreadyRegistered(key.to_string()));
        }
        self.factories.insert(key, Arc::new(factory));
        Ok(())
    }

    /// Check if a shape is registered
    pub fn contains(&self, namespace: &str, kind: &str) -> bool {
        self.lookup(namespace, kind).is_some()
    }

    /// Number of registered shapes
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    fn lookup(&self, namespace: &str, kind: &str) -> Option<(&ShapeKey, &Arc<dyn ShapeFactory>)> {
        let key = ShapeKey {
            namespace: namespace.to_string(),
            kind: kind.to_string(),
        };
        self.factories.get_key_value(&key)
    }

    /// Construct a cell record, dispatching on its `type`
    pub fn construct(&self, attrs: CellAttrs) -> Cell {
        if attrs.cell_type == LINK_TYPE {
            return Cell::new(attrs, CellModel::Link);
        }

        let shape = ShapeKey::parse(&attrs.cell_type).and_then(|(ns, kind)| self.lookup(ns, kind));
        match shape {
            Some((key, factory)) => {
                let model = CellModel::Shape {
                    namespace: key.namespace.clone(),
                    kind: key.kind.clone(),
                };
                let cell_type = attrs.cell_type.clone();
                let mut built = factory.build(attrs);
                built.cell_type = cell_type;
                Cell::new(built, model)
            }
            None => Cell::new(attrs, CellModel::Element),
        }
    }
}

impl fmt::Debug for ShapeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<String> = self.factories.keys().map(|k| k.to_string()).collect();
        keys.sort();
        f.debug_struct("ShapeRegistry").field("shapes", &keys).finish()
    }
}

fn basic_shapes() -> Vec<(&'static str, Value)> {
    let text = json!({ "font-size": 14, "text": "", "fill": "black" });
    vec![
        (
            "Rect",
            json!({
                "size": { "width": 1, "height": 1 },
                "attrs": {
                    "rect": { "fill": "white", "stroke": "black", "width": 1, "height": 1 },
                    "text": text.clone()
                }
            }),
        ),
        (
            "Circle",
            json!({
                "size": { "width": 1, "height": 1 },
                "attrs": {
                    "circle": { "fill": "white", "stroke": "black", "r": 30 },
                    "text": text.clone()
                }
            }),
        ),
        (
            "Ellipse",
            json!({
                "size": { "width": 1, "height": 1 },
                "attrs": {
                    "ellipse": { "fill": "white", "stroke": "black", "rx": 30, "ry": 20 },
                    "text": text.clone()
                }
            }),
        ),
        (
            "Text",
            json!({
                "size": { "width": 1, "height": 1 },
                "attrs": { "text": text }
            }),
        ),
    ]
}
