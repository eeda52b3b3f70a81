// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # bimkit Core
//!
//! STEP/IFC parser and entity graph built with [nom](https://docs.rs/nom).
//!
//! ## Overview
//!
//! - **Parsing**: one left-to-right pass over an ISO 10303-21 document into
//!   [`RawInstance`] records keyed by `#id`. Unknown types are kept.
//! - **Entity Graph**: reference checking, the Project → Site → Building →
//!   Storey → Element containment tree, and typed property sets.
//! - **Diagnostics**: recoverable problems (duplicate ids, orphans, cycles)
//!   are collected instead of failing the load.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use bimkit_core::{build, parse};
//!
//! let parsed = parse(text)?;
//! let graph = build(parsed)?;
//!
//! for (id, depth) in graph.walk() {
//!     let element = graph.element(id).unwrap();
//!     println!("{:indent$}{}", "", element.display_name(), indent = depth * 2);
//! }
//! ```
//!
//! ## Feature Flags
//!
//! - `serde`: Enable serialization support for parsed data

pub mod diagnostics;
pub mod document;
pub mod element;
pub mod error;
pub mod graph;
pub mod header;
pub mod instance;
pub mod parser;
pub mod properties;
pub mod text;

pub use diagnostics::{Diagnostic, DiagnosticKind, Diagnostics, Severity};
pub use document::{parse, parse_with, ParseOptions, ParsedFile};
pub use element::{ElementNode, ElementType};
pub use error::{ErrorClass, ModelError, ParseError, Result};
pub use graph::{build, build_with, DuplicateGlobalIdPolicy, EntityGraph, GraphOptions, SYNTHETIC_ROOT};
pub use header::{FileHeader, Schema};
pub use instance::{AttributeValue, EntityId, RawInstance};
pub use parser::{parse_entity, Token};
pub use properties::{Property, PropertySet, PropertySetKind, PropertySets, PropertyValue};
pub use text::decode_step_string;
