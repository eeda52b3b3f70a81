// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Whole-document parsing
//!
//! One left-to-right pass over the text: optional `ISO-10303-21;` preamble,
//! HEADER section (schema resolved before any instance is read), then the
//! DATA section's instance statements.

use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::error::ParseError;
use crate::header::{FileHeader, Schema};
use crate::instance::{EntityId, RawInstance};
use crate::parser::{self, convert_error, ws};
use rustc_hash::FxHashMap;
use std::time::Instant;

/// Parser settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOptions {
    /// Maximum list nesting depth inside one instance
    pub max_depth: usize,
    /// Reject documents without a FILE_SCHEMA statement
    pub require_schema: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            max_depth: 32,
            require_schema: true,
        }
    }
}

/// Result of parsing a document: every instance by id, plus header and diagnostics
#[derive(Debug, Clone, Default)]
pub struct ParsedFile {
    pub header: FileHeader,
    instances: FxHashMap<EntityId, RawInstance>,
    /// Ids in order of first definition
    order: Vec<EntityId>,
    pub diagnostics: Diagnostics,
}

impl ParsedFile {
    /// Assemble a parsed file from instances, e.g. for tests or generated models.
    /// Later instances with a repeated id replace earlier ones.
    pub fn from_instances(schema: Schema, instances: impl IntoIterator<Item = RawInstance>) -> Self {
        let mut file = ParsedFile {
            header: FileHeader {
                schema: Some(schema),
                schema_identifier: Some(schema.as_str().to_string()),
                ..FileHeader::default()
            },
            ..ParsedFile::default()
        };
        for instance in instances {
            file.insert(instance);
        }
        file
    }

    fn insert(&mut self, instance: RawInstance) {
        let id = instance.id;
        if let Some(previous) = self.instances.insert(id, instance) {
            self.diagnostics.push(
                DiagnosticKind::DuplicateInstanceId,
                Some(id),
                format!(
                    "#{} defined again; {} at byte {} replaced",
                    id, previous.type_name, previous.offset
                ),
            );
        } else {
            self.order.push(id);
        }
    }

    pub fn schema(&self) -> Option<Schema> {
        self.header.schema
    }

    #[inline]
    pub fn get(&self, id: EntityId) -> Option<&RawInstance> {
        self.instances.get(&id)
    }

    #[inline]
    pub fn contains(&self, id: EntityId) -> bool {
        self.instances.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Instances in order of first definition
    pub fn iter(&self) -> impl Iterator<Item = &RawInstance> {
        self.order.iter().filter_map(move |id| self.instances.get(id))
    }

    /// Instances of a type, case-insensitive, in definition order
    pub fn instances_of_type<'a>(&'a self, type_name: &'a str) -> impl Iterator<Item = &'a RawInstance> + 'a {
        self.iter().filter(move |inst| inst.is_type(type_name))
    }

    /// Count instances by type name
    pub fn count_by_type(&self) -> FxHashMap<String, usize> {
        let mut counts = FxHashMap::default();
        for inst in self.instances.values() {
            *counts.entry(inst.type_name.clone()).or_insert(0) += 1;
        }
        counts
    }
}

/// Parse a document with default options
pub fn parse(text: &str) -> Result<ParsedFile, ParseError> {
    parse_with(text, &ParseOptions::default())
}

/// Parse a document
pub fn parse_with(text: &str, options: &ParseOptions) -> Result<ParsedFile, ParseError> {
    let started = Instant::now();
    let limit = options.max_depth;
    let fail = |e| convert_error(e, text, limit);

    let source = text.strip_prefix('\u{feff}').unwrap_or(text);
    let (mut rest, _) = ws(source).map_err(fail)?;

    if let Ok((after, _)) = parser::section_keyword(rest, "ISO-10303-21") {
        rest = after;
    }

    let mut file = ParsedFile::default();

    let (at, _) = ws(rest).map_err(fail)?;
    rest = at;
    if let Ok((after, _)) = parser::section_keyword(rest, "HEADER") {
        rest = after;
        loop {
            let (at, _) = ws(rest).map_err(fail)?;
            if let Ok((after, _)) = parser::section_keyword(at, "ENDSEC") {
                rest = after;
                break;
            }
            if at.is_empty() {
                return Err(ParseError::UnexpectedToken {
                    offset: text.len(),
                    expected: "ENDSEC".to_string(),
                });
            }
            let (after, (name, args)) = parser::header_statement(at, limit).map_err(fail)?;
            file.header.apply(name, &args);
            rest = after;
        }
    }

    // The schema is settled before any DATA instance is read
    match (&file.header.schema_identifier, file.header.schema) {
        (Some(identifier), None) => return Err(ParseError::UnsupportedSchema(identifier.clone())),
        (None, _) if options.require_schema => {
            return Err(ParseError::UnsupportedSchema("<missing>".to_string()))
        }
        _ => {}
    }

    let (at, _) = ws(rest).map_err(fail)?;
    rest = match data_section_start(at) {
        Some(after) => after,
        None => return Err(ParseError::MissingDataSection),
    };

    loop {
        let (at, _) = ws(rest).map_err(fail)?;
        if let Ok((after, _)) = parser::section_keyword(at, "ENDSEC") {
            rest = after;
            break;
        }
        if at.is_empty() {
            return Err(ParseError::UnexpectedToken {
                offset: text.len(),
                expected: "ENDSEC".to_string(),
            });
        }

        let offset = text.len() - at.len();
        let (after, (id, body)) = parser::instance(at, limit).map_err(fail)?;
        file.insert(body.into_instance(id, offset));
        rest = after;
    }

    let trailing = rest.trim();
    if !trailing.is_empty() && !trailing.starts_with("END-ISO-10303-21") {
        tracing::debug!(bytes = trailing.len(), "ignoring content after DATA section");
    }

    tracing::debug!(
        instances = file.len(),
        schema = ?file.header.schema,
        duplicates = file.diagnostics.count(DiagnosticKind::DuplicateInstanceId),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "parsed document"
    );

    Ok(file)
}

/// Accept `DATA;` or the edition-3 form `DATA(...);`
fn data_section_start(input: &str) -> Option<&str> {
    if let Ok((after, _)) = parser::section_keyword(input, "DATA") {
        return Some(after);
    }
    let params = input.strip_prefix("DATA")?;
    let (after, _) = ws(params).ok()?;
    let (after, _) = parser::arguments(after, 1, 8).ok()?;
    let (after, _) = ws(after).ok()?;
    after.strip_prefix(';')
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"ISO-10303-21;
HEADER;
FILE_DESCRIPTION(('ViewDefinition [CoordinationView]'),'2;1');
FILE_NAME('minimal.ifc','2024-05-01T10:00:00',('Author'),('Org'),'pre','app',$);
FILE_SCHEMA(('IFC4'));
ENDSEC;
DATA;
#1=IFCPROJECT('0YvctVUKr0kugbFTf53O9L',$,'Project',$,$,$,$,$,$);
#2=IFCWALL('1YvctVUKr0kugbFTf53O9L',$,'Wall ''A''',$,$,$,$,$,$);
ENDSEC;
END-ISO-10303-21;
"#;

    #[test]
    fn test_parse_minimal() {
        let file = parse(MINIMAL).unwrap();
        assert_eq!(file.schema(), Some(Schema::Ifc4));
        assert_eq!(file.len(), 2);
        assert_eq!(file.get(2).unwrap().get_string(2), Some("Wall 'A'"));
        assert_eq!(file.header.file_name.as_deref(), Some("minimal.ifc"));
        assert!(file.diagnostics.is_empty());
    }

    #[test]
    fn test_duplicate_id_last_wins() {
        let text = MINIMAL.replace(
            "ENDSEC;\nEND",
            "#2=IFCSLAB('2YvctVUKr0kugbFTf53O9L',$,'Slab',$,$,$,$,$,$);\nENDSEC;\nEND",
        );
        let file = parse(&text).unwrap();
        assert_eq!(file.len(), 2);
        assert_eq!(file.get(2).unwrap().type_name, "IFCSLAB");
        assert_eq!(file.diagnostics.count(DiagnosticKind::DuplicateInstanceId), 1);
        let ids: Vec<_> = file.iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn test_unknown_schema_rejected_before_data() {
        // The DATA section is garbage; the schema error must win
        let text = "ISO-10303-21;HEADER;FILE_SCHEMA(('IFC9'));ENDSEC;DATA;#1=(((;";
        assert_eq!(parse(text).unwrap_err(), ParseError::UnsupportedSchema("IFC9".into()));
    }

    #[test]
    fn test_missing_data_section() {
        let text = "ISO-10303-21;HEADER;FILE_SCHEMA(('IFC2X3'));ENDSEC;END-ISO-10303-21;";
        assert_eq!(parse(text).unwrap_err(), ParseError::MissingDataSection);
    }

    #[test]
    fn test_missing_schema() {
        let text = "DATA;#1=IFCWALL('a');ENDSEC;";
        assert!(matches!(parse(text), Err(ParseError::UnsupportedSchema(_))));

        let lenient = ParseOptions {
            require_schema: false,
            ..ParseOptions::default()
        };
        let file = parse_with(text, &lenient).unwrap();
        assert_eq!(file.len(), 1);
        assert_eq!(file.schema(), None);
    }

    #[test]
    fn test_nesting_too_deep_reports_offset() {
        let text = "HEADER;FILE_SCHEMA(('IFC4'));ENDSEC;DATA;#1=X(((((1)))));ENDSEC;";
        let options = ParseOptions {
            max_depth: 3,
            ..ParseOptions::default()
        };
        let err = parse_with(text, &options).unwrap_err();
        let start = text.find("#1=X(").unwrap() + "#1=X(((".len();
        assert_eq!(err, ParseError::NestingTooDeep { offset: start, limit: 3 });
    }

    #[test]
    fn test_unterminated_string_offset() {
        let text = "HEADER;FILE_SCHEMA(('IFC4'));ENDSEC;DATA;#1=IFCWALL('open);ENDSEC;";
        let err = parse(text).unwrap_err();
        assert_eq!(
            err,
            ParseError::UnterminatedString {
                offset: text.find("'open").unwrap()
            }
        );
    }

    #[test]
    fn test_unknown_types_kept() {
        let text = "HEADER;FILE_SCHEMA(('IFC4'));ENDSEC;DATA;#5=IFCSOMETHINGNEW(#6,.X.);#6=IFCFOO();ENDSEC;";
        let file = parse(text).unwrap();
        assert_eq!(file.get(5).unwrap().type_name, "IFCSOMETHINGNEW");
        assert_eq!(file.get(5).unwrap().get_ref(0), Some(6));
        assert!(file.get(6).unwrap().attributes.is_empty());
    }

    #[test]
    fn test_instance_offsets() {
        let file = parse(MINIMAL).unwrap();
        let wall = file.get(2).unwrap();
        assert!(MINIMAL[wall.offset..].starts_with("#2=IFCWALL"));
    }
}
