// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use bimkit_core::EntityId;
use thiserror::Error;

/// Result type for geometry operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during geometry processing.
///
/// These never leave the crate's public extraction API: the router turns them
/// into per-element diagnostics.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Triangulation failed: {0}")]
    TriangulationError(String),

    #[error("Invalid profile: {0}")]
    InvalidProfile(String),

    #[error("Invalid extrusion parameters: {0}")]
    InvalidExtrusion(String),

    #[error("#{0} is missing")]
    MissingEntity(EntityId),

    #[error("#{id} is {found}, expected {expected}")]
    UnexpectedType {
        id: EntityId,
        expected: &'static str,
        found: String,
    },

    #[error("placement chain through #{0} is cyclic or too deep")]
    PlacementCycle(EntityId),

    #[error("Geometry error: {0}")]
    Geometry(String),
}

impl Error {
    pub fn geometry(message: impl Into<String>) -> Self {
        Error::Geometry(message.into())
    }
}
