// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for parsing and model construction.

use crate::instance::EntityId;
use thiserror::Error;

/// Result type for model operations
pub type Result<T, E = ModelError> = std::result::Result<T, E>;

/// Errors raised while reading STEP text.
///
/// The first three variants are lexical failures, the last two are structural
/// problems with the document as a whole. Offsets are byte offsets into the input.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("unexpected token at byte {offset}: expected {expected}")]
    UnexpectedToken { offset: usize, expected: String },

    #[error("unterminated string literal starting at byte {offset}")]
    UnterminatedString { offset: usize },

    #[error("list nesting exceeds limit of {limit} at byte {offset}")]
    NestingTooDeep { offset: usize, limit: usize },

    #[error("document has no DATA section")]
    MissingDataSection,

    #[error("unsupported schema: {0}")]
    UnsupportedSchema(String),
}

impl ParseError {
    /// Malformed token stream, as opposed to a well-formed but unusable document.
    pub fn is_lexical(&self) -> bool {
        matches!(
            self,
            ParseError::UnexpectedToken { .. }
                | ParseError::UnterminatedString { .. }
                | ParseError::NestingTooDeep { .. }
        )
    }

    /// Byte offset of the failure, when known.
    pub fn offset(&self) -> Option<usize> {
        match self {
            ParseError::UnexpectedToken { offset, .. }
            | ParseError::UnterminatedString { offset }
            | ParseError::NestingTooDeep { offset, .. } => Some(*offset),
            _ => None,
        }
    }
}

/// Errors from building, loading, and managing models.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("instance #{referrer} references missing instance #{missing}")]
    DanglingReference { referrer: EntityId, missing: EntityId },

    #[error("a model with id '{0}' is already loaded")]
    DuplicateModelId(String),

    #[error("model '{0}' not found")]
    NotFound(String),

    #[error("load of model '{0}' was cancelled")]
    Cancelled(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Coarse classification used when reporting a failed load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Malformed token stream
    Lex,
    /// Document-level problem (dangling reference, no data, unknown schema)
    Structural,
    /// Registry call failure (duplicate id, unknown id, cancelled)
    Registry,
}

impl ModelError {
    pub fn class(&self) -> ErrorClass {
        match self {
            ModelError::Parse(e) if e.is_lexical() => ErrorClass::Lex,
            ModelError::Parse(_) | ModelError::DanglingReference { .. } => ErrorClass::Structural,
            ModelError::DuplicateModelId(_)
            | ModelError::NotFound(_)
            | ModelError::Cancelled(_)
            | ModelError::Internal(_) => ErrorClass::Registry,
        }
    }

    /// True for errors that make the whole document unusable.
    pub fn is_fatal_to_load(&self) -> bool {
        matches!(self.class(), ErrorClass::Lex | ErrorClass::Structural)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classes() {
        let lex = ModelError::from(ParseError::UnterminatedString { offset: 4 });
        assert_eq!(lex.class(), ErrorClass::Lex);
        assert!(lex.is_fatal_to_load());

        let schema = ModelError::from(ParseError::UnsupportedSchema("IFC9".into()));
        assert_eq!(schema.class(), ErrorClass::Structural);

        let dangling = ModelError::DanglingReference { referrer: 2, missing: 999 };
        assert!(dangling.to_string().contains("#999"));
        assert!(dangling.is_fatal_to_load());

        assert_eq!(ModelError::NotFound("a".into()).class(), ErrorClass::Registry);
    }
}
