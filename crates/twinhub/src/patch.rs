use alloc::format;
use alloc::string::String;

use hashbrown::DefaultHashBuilder;

use indexmap::map::{IndexMap, IntoIter, Iter};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, ErrorKind, Result};

/// Reserved key identifying a component inside a patch.
pub const COMPONENT_MARKER_KEY: &str = "__t";

/// Value associated with [`COMPONENT_MARKER_KEY`] in a component.
pub const COMPONENT_MARKER_VALUE: &str = "c";

// Normalizes a component name: an empty name addresses the root interface.
pub(crate) fn component_name(component: Option<&str>) -> Option<&str> {
    component.filter(|name| !name.is_empty())
}

pub(crate) fn check_property_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::new(
            ErrorKind::InvalidArgument,
            "A property name must not be empty",
        ));
    }

    if name == COMPONENT_MARKER_KEY {
        return Err(Error::new(
            ErrorKind::InvalidArgument,
            format!("`{COMPONENT_MARKER_KEY}` is a reserved property name"),
        ));
    }

    Ok(())
}

fn component_marker() -> (String, Value) {
    (
        COMPONENT_MARKER_KEY.into(),
        Value::String(COMPONENT_MARKER_VALUE.into()),
    )
}

/// Checks whether a value is a component property group, hence a mapping
/// carrying the component marker.
#[must_use]
pub fn is_component(value: &Value) -> bool {
    value
        .as_object()
        .and_then(|map| map.get(COMPONENT_MARKER_KEY))
        .and_then(Value::as_str)
        == Some(COMPONENT_MARKER_VALUE)
}

/// A property patch.
///
/// An ordered mapping whose top-level keys are either root-interface
/// properties or component names. A component is a nested mapping which
/// carries the `"__t": "c"` marker, so it can be distinguished from an
/// object-valued root property.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertyPatch(IndexMap<String, Value, DefaultHashBuilder>);

impl IntoIterator for PropertyPatch {
    type Item = (String, Value);
    type IntoIter = IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a PropertyPatch {
    type Item = (&'a String, &'a Value);
    type IntoIter = Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl PropertyPatch {
    /// Creates an empty [`PropertyPatch`].
    #[must_use]
    #[inline]
    pub fn new() -> Self {
        Self(IndexMap::with_hasher(DefaultHashBuilder::default()))
    }

    /// Creates a [`PropertyPatch`] from a `JSON` object.
    ///
    /// # Errors
    ///
    /// The value is not a `JSON` object.
    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Object(map) = value else {
            return Err(Error::new(
                ErrorKind::InvalidPatch,
                "A property patch must be a JSON object",
            ));
        };
        Ok(Self::from_map(map))
    }

    pub(crate) fn from_map(map: Map<String, Value>) -> Self {
        let mut patch = Self::new();
        patch.0.extend(map);
        patch
    }

    /// Converts a [`PropertyPatch`] into a `JSON` object.
    #[must_use]
    pub fn into_value(self) -> Value {
        Value::Object(self.0.into_iter().collect())
    }

    /// Adds a root-interface property, replacing any previous value.
    #[inline]
    pub fn insert_property(&mut self, name: impl Into<String>, value: Value) {
        self.0.insert(name.into(), value);
    }

    /// Adds a property to a component.
    ///
    /// The component group is created along with its marker when it does not
    /// exist yet. An empty component name addresses the root interface.
    pub fn insert_component_property(
        &mut self,
        component: &str,
        name: impl Into<String>,
        value: Value,
    ) {
        if component.is_empty() {
            self.insert_property(name, value);
            return;
        }

        let group = self
            .0
            .entry(component.into())
            .or_insert_with(|| Value::Object(Map::new()));

        // A non-object value under a component name is replaced by the group.
        if !group.is_object() {
            *group = Value::Object(Map::new());
        }

        if let Value::Object(map) = group {
            let (marker_key, marker_value) = component_marker();
            map.entry(marker_key).or_insert(marker_value);
            map.insert(name.into(), value);
        }
    }

    /// Returns the value of a property.
    ///
    /// When a component is given, the property is searched inside the
    /// nested component mapping. A missing key at either level returns
    /// [`None`]. The component marker is never returned as a property.
    #[must_use]
    pub fn property(&self, name: &str, component: Option<&str>) -> Option<&Value> {
        if name == COMPONENT_MARKER_KEY {
            return None;
        }

        match component_name(component) {
            None => self.0.get(name),
            Some(component) => self.component(component)?.get(name),
        }
    }

    /// Returns the nested mapping of a component.
    ///
    /// If [`None`], the patch does not contain a mapping under that name.
    #[must_use]
    #[inline]
    pub fn component(&self, component: &str) -> Option<&Map<String, Value>> {
        self.0.get(component).and_then(Value::as_object)
    }

    /// Returns an iterator over the names of all marked components.
    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.0
            .iter()
            .filter(|(_, value)| is_component(value))
            .map(|(name, _)| name.as_str())
    }

    /// Returns an iterator over all root-interface properties.
    pub fn root_properties(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0
            .iter()
            .filter(|(_, value)| !is_component(value))
            .map(|(name, value)| (name.as_str(), value))
    }

    /// Merges another patch into this one.
    ///
    /// Component groups are merged property by property, any other key is
    /// overwritten by the incoming value.
    #[must_use]
    pub fn merge(mut self, other: Self) -> Self {
        for (key, value) in other {
            let both_components =
                is_component(&value) && self.0.get(&key).is_some_and(is_component);

            if both_components {
                if let (Some(Value::Object(current)), Value::Object(incoming)) =
                    (self.0.get_mut(&key), value)
                {
                    current.extend(incoming);
                }
            } else {
                self.0.insert(key, value);
            }
        }
        self
    }

    /// Removes a top-level key, returning its value.
    #[inline]
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.shift_remove(key)
    }

    /// Checks whether a top-level key exists.
    #[must_use]
    #[inline]
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Returns the value associated with a top-level key.
    #[must_use]
    #[inline]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Checks whether the patch is empty.
    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of top-level keys.
    #[must_use]
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns an iterator over the top-level entries.
    #[inline]
    pub fn iter(&self) -> Iter<'_, String, Value> {
        self.0.iter()
    }
}

impl From<Map<String, Value>> for PropertyPatch {
    fn from(map: Map<String, Value>) -> Self {
        Self::from_map(map)
    }
}
