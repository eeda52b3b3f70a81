// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! HEADER section and schema identification

use crate::instance::AttributeValue;
use crate::parser::Token;
use std::fmt;

/// Supported IFC schema releases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Schema {
    Ifc2x3,
    Ifc4,
    Ifc4x1,
    Ifc4x2,
    Ifc4x3,
}

impl Schema {
    /// Resolve a FILE_SCHEMA identifier such as `IFC4`, `IFC2X3` or `IFC4X3_ADD2`
    pub fn from_identifier(identifier: &str) -> Option<Self> {
        let upper = identifier.trim().to_ascii_uppercase();
        // Longest prefixes first so IFC4X3 is not read as IFC4
        let schema = if upper.starts_with("IFC4X3") {
            Schema::Ifc4x3
        } else if upper.starts_with("IFC4X2") {
            Schema::Ifc4x2
        } else if upper.starts_with("IFC4X1") {
            Schema::Ifc4x1
        } else if upper.starts_with("IFC2X3") {
            Schema::Ifc2x3
        } else if upper == "IFC4" || upper.starts_with("IFC4_") || upper.starts_with("IFC4ADD") {
            Schema::Ifc4
        } else {
            return None;
        };
        Some(schema)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Schema::Ifc2x3 => "IFC2X3",
            Schema::Ifc4 => "IFC4",
            Schema::Ifc4x1 => "IFC4X1",
            Schema::Ifc4x2 => "IFC4X2",
            Schema::Ifc4x3 => "IFC4X3",
        }
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Information from the HEADER section
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FileHeader {
    /// Resolved schema, `None` until FILE_SCHEMA is seen
    pub schema: Option<Schema>,
    /// Identifier exactly as written in FILE_SCHEMA
    pub schema_identifier: Option<String>,
    pub description: Vec<String>,
    pub file_name: Option<String>,
    pub timestamp: Option<String>,
    pub author: Vec<String>,
    pub organization: Vec<String>,
    pub preprocessor_version: Option<String>,
    pub originating_system: Option<String>,
}

impl FileHeader {
    /// Record one header statement. Unknown statements are ignored.
    pub fn apply(&mut self, name: &str, args: &[Token]) {
        let values: Vec<AttributeValue> = args.iter().map(AttributeValue::from_token).collect();
        let string_at = |i: usize| values.get(i).and_then(|v| v.as_string()).map(str::to_string);
        let strings_at = |i: usize| {
            values
                .get(i)
                .and_then(|v| v.as_list())
                .map(|items| items.iter().filter_map(|v| v.as_string()).map(str::to_string).collect())
                .unwrap_or_default()
        };

        match name.to_ascii_uppercase().as_str() {
            "FILE_DESCRIPTION" => self.description = strings_at(0),
            "FILE_NAME" => {
                self.file_name = string_at(0);
                self.timestamp = string_at(1);
                self.author = strings_at(2);
                self.organization = strings_at(3);
                self.preprocessor_version = string_at(4);
                self.originating_system = string_at(5);
            }
            "FILE_SCHEMA" => {
                let identifiers: Vec<String> = strings_at(0);
                if let Some(first) = identifiers.into_iter().next() {
                    self.schema = Schema::from_identifier(&first);
                    self.schema_identifier = Some(first);
                }
            }
            _ => {}
        }
    }
}
