// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Raw instance records and attribute values
//!
//! Every `#id=TYPE(...)` statement becomes a [`RawInstance`], whether or not the
//! type name is known. References are stored as ids and resolved by lookup.

use crate::parser::Token;
use crate::text::decode_step_string;

/// Instance label (`#123` -> `123`)
pub type EntityId = u64;

/// Attribute value as written in the source document
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AttributeValue {
    /// Reference to another instance
    Ref(EntityId),
    /// Decoded string value
    String(String),
    /// Integer value
    Integer(i64),
    /// Real value
    Real(f64),
    /// Enumeration token without the dots (`.T.` -> `T`)
    Enum(String),
    /// Nested aggregate
    List(Vec<AttributeValue>),
    /// Typed value such as `IFCLABEL('x')` or `IFCBOOLEAN(.T.)`
    Typed {
        type_name: String,
        value: Box<AttributeValue>,
    },
    /// `$`
    Unset,
    /// `*`
    Derived,
}

impl AttributeValue {
    /// Convert from a parser token, decoding string escapes
    pub fn from_token(token: &Token) -> Self {
        match token {
            Token::EntityRef(id) => AttributeValue::Ref(*id),
            Token::String(raw) => AttributeValue::String(decode_step_string(raw).into_owned()),
            Token::Integer(i) => AttributeValue::Integer(*i),
            Token::Float(f) => AttributeValue::Real(*f),
            Token::Enum(e) => AttributeValue::Enum((*e).to_string()),
            Token::List(items) => AttributeValue::List(items.iter().map(Self::from_token).collect()),
            Token::TypedValue(type_name, args) => {
                let value = match args.as_slice() {
                    [single] => Self::from_token(single),
                    many => AttributeValue::List(many.iter().map(Self::from_token).collect()),
                };
                AttributeValue::Typed {
                    type_name: type_name.to_ascii_uppercase(),
                    value: Box::new(value),
                }
            }
            Token::Null => AttributeValue::Unset,
            Token::Derived => AttributeValue::Derived,
        }
    }

    /// Strip a typed-value wrapper, if any
    #[inline]
    pub fn untyped(&self) -> &AttributeValue {
        match self {
            AttributeValue::Typed { value, .. } => value.untyped(),
            other => other,
        }
    }

    #[inline]
    pub fn as_entity_ref(&self) -> Option<EntityId> {
        match self {
            AttributeValue::Ref(id) => Some(*id),
            _ => None,
        }
    }

    /// Get as string (looks through typed values)
    #[inline]
    pub fn as_string(&self) -> Option<&str> {
        match self.untyped() {
            AttributeValue::String(s) => Some(s),
            _ => None,
        }
    }

    #[inline]
    pub fn as_enum(&self) -> Option<&str> {
        match self.untyped() {
            AttributeValue::Enum(s) => Some(s),
            _ => None,
        }
    }

    /// Get as float, accepting integers
    #[inline]
    pub fn as_float(&self) -> Option<f64> {
        match self.untyped() {
            AttributeValue::Real(f) => Some(*f),
            AttributeValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    #[inline]
    pub fn as_int(&self) -> Option<i64> {
        match self.untyped() {
            AttributeValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// STEP logical: `.T.`, `.F.`, `.U.` (unknown maps to `None`)
    pub fn as_logical(&self) -> Option<Option<bool>> {
        match self.as_enum()? {
            "T" | "TRUE" => Some(Some(true)),
            "F" | "FALSE" => Some(Some(false)),
            "U" | "UNKNOWN" => Some(None),
            _ => None,
        }
    }

    #[inline]
    pub fn as_list(&self) -> Option<&[AttributeValue]> {
        match self.untyped() {
            AttributeValue::List(items) => Some(items),
            _ => None,
        }
    }

    /// Type name of a typed value
    #[inline]
    pub fn type_name(&self) -> Option<&str> {
        match self {
            AttributeValue::Typed { type_name, .. } => Some(type_name),
            _ => None,
        }
    }

    /// Check if unset or derived
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, AttributeValue::Unset | AttributeValue::Derived)
    }

    /// Visit every reference contained in this value, depth first
    pub fn for_each_ref(&self, f: &mut impl FnMut(EntityId)) {
        match self {
            AttributeValue::Ref(id) => f(*id),
            AttributeValue::List(items) => items.iter().for_each(|item| item.for_each_ref(f)),
            AttributeValue::Typed { value, .. } => value.for_each_ref(f),
            _ => {}
        }
    }

    /// Collect the references of a list attribute, ignoring non-reference items
    pub fn ref_list(&self) -> Vec<EntityId> {
        self.as_list()
            .map(|items| items.iter().filter_map(|v| v.as_entity_ref()).collect())
            .unwrap_or_default()
    }
}

/// One parsed `#id=TYPE(...)` statement
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RawInstance {
    pub id: EntityId,
    /// Upper-case type name; for complex instances the first partial type
    pub type_name: String,
    pub attributes: Vec<AttributeValue>,
    /// Byte offset of the statement in the source text
    pub offset: usize,
    /// Partial type names of a complex instance, empty otherwise
    pub parts: Vec<String>,
}

impl RawInstance {
    pub fn new(id: EntityId, type_name: impl Into<String>, attributes: Vec<AttributeValue>) -> Self {
        Self {
            id,
            type_name: type_name.into(),
            attributes,
            offset: 0,
            parts: Vec::new(),
        }
    }

    /// Case-insensitive type check
    #[inline]
    pub fn is_type(&self, name: &str) -> bool {
        self.type_name.eq_ignore_ascii_case(name)
            || self.parts.iter().any(|p| p.eq_ignore_ascii_case(name))
    }

    #[inline]
    pub fn is_complex(&self) -> bool {
        !self.parts.is_empty()
    }

    /// Get attribute by index
    #[inline]
    pub fn get(&self, index: usize) -> Option<&AttributeValue> {
        self.attributes.get(index)
    }

    #[inline]
    pub fn get_ref(&self, index: usize) -> Option<EntityId> {
        self.get(index).and_then(|v| v.as_entity_ref())
    }

    #[inline]
    pub fn get_string(&self, index: usize) -> Option<&str> {
        self.get(index).and_then(|v| v.as_string())
    }

    #[inline]
    pub fn get_float(&self, index: usize) -> Option<f64> {
        self.get(index).and_then(|v| v.as_float())
    }

    #[inline]
    pub fn get_enum(&self, index: usize) -> Option<&str> {
        self.get(index).and_then(|v| v.as_enum())
    }

    #[inline]
    pub fn get_list(&self, index: usize) -> Option<&[AttributeValue]> {
        self.get(index).and_then(|v| v.as_list())
    }

    /// References held in a list attribute
    pub fn get_ref_list(&self, index: usize) -> Vec<EntityId> {
        self.get(index).map(|v| v.ref_list()).unwrap_or_default()
    }

    /// Every (attribute index, referenced id) pair in this instance
    pub fn references(&self) -> Vec<(usize, EntityId)> {
        let mut refs = Vec::new();
        for (index, attr) in self.attributes.iter().enumerate() {
            attr.for_each_ref(&mut |id| refs.push((index, id)));
        }
        refs
    }
}
