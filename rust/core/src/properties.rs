// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Property and quantity sets
//!
//! Values keep their source type: a boolean stays a boolean, a length measure
//! stays a number tagged with its measure type.

use crate::document::ParsedFile;
use crate::instance::{AttributeValue, EntityId, RawInstance};

/// Typed property value
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PropertyValue {
    Text(String),
    Real(f64),
    Integer(i64),
    /// Logical value; `None` is UNKNOWN
    Boolean(Option<bool>),
    Enum(String),
    Ref(EntityId),
    List(Vec<PropertyValue>),
    Derived,
    Unset,
}

impl PropertyValue {
    /// Convert an attribute, unwrapping typed values.
    /// Returns the value and the measure type name if one was written.
    pub fn from_attribute(attr: &AttributeValue) -> (Self, Option<String>) {
        match attr {
            AttributeValue::Typed { type_name, value } => {
                let converted = match (type_name.as_str(), value.as_logical()) {
                    ("IFCBOOLEAN" | "IFCLOGICAL", Some(logical)) => PropertyValue::Boolean(logical),
                    _ => Self::from_attribute(value).0,
                };
                (converted, Some(type_name.clone()))
            }
            other => (Self::from_untyped(other), None),
        }
    }

    fn from_untyped(attr: &AttributeValue) -> Self {
        match attr {
            AttributeValue::String(s) => PropertyValue::Text(s.clone()),
            AttributeValue::Integer(i) => PropertyValue::Integer(*i),
            AttributeValue::Real(f) => PropertyValue::Real(*f),
            AttributeValue::Enum(e) => PropertyValue::Enum(e.clone()),
            AttributeValue::Ref(id) => PropertyValue::Ref(*id),
            AttributeValue::List(items) => {
                PropertyValue::List(items.iter().map(|v| Self::from_attribute(v).0).collect())
            }
            AttributeValue::Typed { .. } => Self::from_attribute(attr).0,
            AttributeValue::Unset => PropertyValue::Unset,
            AttributeValue::Derived => PropertyValue::Derived,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            PropertyValue::Text(s) | PropertyValue::Enum(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PropertyValue::Real(f) => Some(*f),
            PropertyValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropertyValue::Boolean(b) => *b,
            _ => None,
        }
    }
}

/// A named property
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Property {
    pub name: String,
    pub value: PropertyValue,
    /// Measure type of a typed value, e.g. `IFCLENGTHMEASURE`
    pub measure: Option<String>,
    /// Unit instance id
    pub unit: Option<EntityId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PropertySetKind {
    /// IfcPropertySet
    Properties,
    /// IfcElementQuantity
    Quantities,
}

/// Property or quantity set
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PropertySet {
    pub id: EntityId,
    pub name: String,
    pub kind: PropertySetKind,
    /// First-seen order
    pub properties: Vec<Property>,
}

impl PropertySet {
    pub fn get(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn value(&self, name: &str) -> Option<&PropertyValue> {
        self.get(name).map(|p| &p.value)
    }
}

/// Property sets attached to one element, in first-seen order
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PropertySets {
    sets: Vec<PropertySet>,
}

impl PropertySets {
    /// Attach a set unless the same set instance is already attached
    pub fn attach(&mut self, set: PropertySet) {
        if !self.sets.iter().any(|s| s.id == set.id) {
            self.sets.push(set);
        }
    }

    pub fn get(&self, name: &str) -> Option<&PropertySet> {
        self.sets.iter().find(|s| s.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Look up `set.property`
    pub fn value(&self, set: &str, property: &str) -> Option<&PropertyValue> {
        self.get(set).and_then(|s| s.value(property))
    }

    pub fn iter(&self) -> impl Iterator<Item = &PropertySet> {
        self.sets.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.sets.iter().map(|s| s.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }
}

/// Read a property set or element quantity definition.
/// Returns `None` for other definition types.
pub fn read_property_set(file: &ParsedFile, id: EntityId) -> Option<PropertySet> {
    let inst = file.get(id)?;
    // [0]=GlobalId, [1]=OwnerHistory, [2]=Name, [3]=Description, then HasProperties / Quantities
    let (kind, list_index) = if inst.is_type("IFCPROPERTYSET") {
        (PropertySetKind::Properties, 4)
    } else if inst.is_type("IFCELEMENTQUANTITY") {
        (PropertySetKind::Quantities, 5)
    } else {
        return None;
    };

    let name = inst.get_string(2).unwrap_or_default().to_string();
    let properties = inst
        .get_ref_list(list_index)
        .into_iter()
        .filter_map(|pid| file.get(pid))
        .filter_map(|p| match kind {
            PropertySetKind::Properties => read_property(p),
            PropertySetKind::Quantities => read_quantity(p),
        })
        .collect();

    Some(PropertySet {
        id,
        name,
        kind,
        properties,
    })
}

fn read_property(inst: &RawInstance) -> Option<Property> {
    let name = inst.get_string(0)?.to_string();
    let type_name = inst.type_name.as_str();

    let (value, measure, unit) = match type_name {
        // [0]=Name, [1]=Description, [2]=NominalValue, [3]=Unit
        "IFCPROPERTYSINGLEVALUE" => {
            let (value, measure) = inst
                .get(2)
                .map(PropertyValue::from_attribute)
                .unwrap_or((PropertyValue::Unset, None));
            (value, measure, inst.get_ref(3))
        }
        // [2]=EnumerationValues, [3]=EnumerationReference
        "IFCPROPERTYENUMERATEDVALUE" => {
            let (value, measure) = list_value(inst.get(2));
            (value, measure, None)
        }
        // [2]=ListValues, [3]=Unit
        "IFCPROPERTYLISTVALUE" => {
            let (value, measure) = list_value(inst.get(2));
            (value, measure, inst.get_ref(3))
        }
        // [2]=UpperBoundValue, [3]=LowerBoundValue, [4]=Unit
        "IFCPROPERTYBOUNDEDVALUE" => {
            let (upper, measure) = inst
                .get(2)
                .map(PropertyValue::from_attribute)
                .unwrap_or((PropertyValue::Unset, None));
            let (lower, _) = inst
                .get(3)
                .map(PropertyValue::from_attribute)
                .unwrap_or((PropertyValue::Unset, None));
            (PropertyValue::List(vec![lower, upper]), measure, inst.get_ref(4))
        }
        _ => return None,
    };

    Some(Property {
        name,
        value,
        measure,
        unit,
    })
}

/// List-valued property; a single entry collapses to a scalar
fn list_value(attr: Option<&AttributeValue>) -> (PropertyValue, Option<String>) {
    let items = match attr.and_then(|a| a.as_list()) {
        Some(items) => items,
        None => return (PropertyValue::Unset, None),
    };
    let converted: Vec<(PropertyValue, Option<String>)> =
        items.iter().map(PropertyValue::from_attribute).collect();
    let measure = converted.iter().find_map(|(_, m)| m.clone());

    if converted.len() == 1 {
        let (value, _) = converted.into_iter().next().unwrap_or((PropertyValue::Unset, None));
        return (value, measure);
    }
    (
        PropertyValue::List(converted.into_iter().map(|(v, _)| v).collect()),
        measure,
    )
}

fn read_quantity(inst: &RawInstance) -> Option<Property> {
    // [0]=Name, [1]=Description, [2]=Unit, [3]=Value, [4]=Formula (IFC4)
    let measure = match inst.type_name.as_str() {
        "IFCQUANTITYLENGTH" => "IFCLENGTHMEASURE",
        "IFCQUANTITYAREA" => "IFCAREAMEASURE",
        "IFCQUANTITYVOLUME" => "IFCVOLUMEMEASURE",
        "IFCQUANTITYCOUNT" => "IFCCOUNTMEASURE",
        "IFCQUANTITYWEIGHT" => "IFCMASSMEASURE",
        "IFCQUANTITYTIME" => "IFCTIMEMEASURE",
        _ => return None,
    };

    let name = inst.get_string(0)?.to_string();
    let value = match inst.get(3).map(|v| v.untyped()) {
        Some(AttributeValue::Integer(i)) => PropertyValue::Integer(*i),
        Some(AttributeValue::Real(f)) => PropertyValue::Real(*f),
        _ => PropertyValue::Unset,
    };

    Some(Property {
        name,
        value,
        measure: Some(measure.to_string()),
        unit: inst.get_ref(2),
    })
}
