//! Serializable form of [`ParserClient`] calls.
//!
//! An out-of-process front end cannot see the ids a client hands back, so
//! events refer to earlier id-producing events by their position in the
//! stream. [`replay`] resolves those positions and drives any client.

use serde::{Deserialize, Serialize};

use super::client::{ParseLocation, ParserClient};
use crate::model::{AccessKind, DefinitionKind, EdgeType, Id, LocationKind, NameHierarchy, NodeType};

/// Position of an earlier event in the same stream.
pub type EventRef = usize;

/// A location whose file is given as a reference to a `FileStart` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventLocation {
    pub file: EventRef,
    pub start_line: u32,
    pub start_column: u32,
    pub end_line: u32,
    pub end_column: u32,
    #[serde(default = "default_location_kind")]
    pub kind: LocationKind,
}

fn default_location_kind() -> LocationKind {
    LocationKind::Token
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum IngestEvent {
    FileStart {
        path: String,
        #[serde(default)]
        modification_time: i64,
    },
    Node {
        name: NameHierarchy,
        node_type: NodeType,
        #[serde(default)]
        definition_kind: DefinitionKind,
    },
    Edge {
        edge_type: EdgeType,
        from: EventRef,
        to: EventRef,
    },
    SourceLocation {
        token: EventRef,
        location: EventLocation,
    },
    LocalSymbol {
        name: String,
        location: EventLocation,
    },
    Comment {
        location: EventLocation,
    },
    Error {
        message: String,
        location: EventLocation,
        fatal: bool,
    },
    Access {
        node: EventRef,
        access: AccessKind,
    },
    FileFinish {
        indexed: bool,
        complete: bool,
    },
}

/// Unresolvable references become id 0, which no buffer ever issues, so the
/// client drops the record with a diagnostic.
fn resolve(produced: &[Option<Id>], reference: EventRef) -> Id {
    produced.get(reference).copied().flatten().unwrap_or(0)
}

fn resolve_location(produced: &[Option<Id>], location: &EventLocation) -> ParseLocation {
    ParseLocation::new(
        resolve(produced, location.file),
        location.start_line,
        location.start_column,
        location.end_line,
        location.end_column,
    )
    .with_kind(location.kind)
}

/// Drives `client` with `events` in order.
///
/// Returns, per event, the id it produced (if any).
pub fn replay(events: &[IngestEvent], client: &mut dyn ParserClient) -> Vec<Option<Id>> {
    let mut produced: Vec<Option<Id>> = Vec::with_capacity(events.len());

    for event in events {
        let id = match event {
            IngestEvent::FileStart {
                path,
                modification_time,
            } => Some(client.on_file_start(path, *modification_time)),
            IngestEvent::Node {
                name,
                node_type,
                definition_kind,
            } => client.on_node(name, *node_type, *definition_kind),
            IngestEvent::Edge {
                edge_type,
                from,
                to,
            } => client.on_edge(
                *edge_type,
                resolve(&produced, *from),
                resolve(&produced, *to),
            ),
            IngestEvent::SourceLocation { token, location } => client.on_source_location(
                resolve(&produced, *token),
                &resolve_location(&produced, location),
            ),
            IngestEvent::LocalSymbol { name, location } => {
                Some(client.on_local_symbol(name, &resolve_location(&produced, location)))
            }
            IngestEvent::Comment { location } => {
                client.on_comment(&resolve_location(&produced, location))
            }
            IngestEvent::Error {
                message,
                location,
                fatal,
            } => Some(client.on_error(message, &resolve_location(&produced, location), *fatal)),
            IngestEvent::Access { node, access } => {
                client.on_access(resolve(&produced, *node), *access);
                None
            }
            IngestEvent::FileFinish { indexed, complete } => {
                client.on_file_finish(*indexed, *complete);
                None
            }
        };
        produced.push(id);
    }

    produced
}

/// Parses a newline-delimited JSON event stream.
pub fn parse_event_lines(input: &str) -> anyhow::Result<Vec<IngestEvent>> {
    input
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(number, line)| {
            serde_json::from_str(line)
                .map_err(|e| anyhow::anyhow!("Invalid ingest event on line {}: {}", number + 1, e))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::StorageParserClient;
    use crate::model::DELIMITER_CXX;
    use crate::storage::IntermediateStorage;

    fn location(file: EventRef, line: u32) -> EventLocation {
        EventLocation {
            file,
            start_line: line,
            start_column: 1,
            end_line: line,
            end_column: 4,
            kind: LocationKind::Token,
        }
    }

    #[test]
    fn test_replay_resolves_references() {
        let events = vec![
            IngestEvent::FileStart {
                path: "a.cpp".to_string(),
                modification_time: 1,
            },
            IngestEvent::Node {
                name: NameHierarchy::parse("caller", DELIMITER_CXX),
                node_type: NodeType::Function,
                definition_kind: DefinitionKind::Explicit,
            },
            IngestEvent::Node {
                name: NameHierarchy::parse("callee", DELIMITER_CXX),
                node_type: NodeType::Function,
                definition_kind: DefinitionKind::Unresolved,
            },
            IngestEvent::Edge {
                edge_type: EdgeType::Call,
                from: 1,
                to: 2,
            },
            IngestEvent::SourceLocation {
                token: 3,
                location: location(0, 2),
            },
            IngestEvent::FileFinish {
                indexed: true,
                complete: true,
            },
        ];

        let mut storage = IntermediateStorage::new();
        let mut client = StorageParserClient::new(&mut storage, "a.cpp");
        let produced = replay(&events, &mut client);

        assert_eq!(produced.len(), events.len());
        assert!(produced[3].is_some());
        assert_eq!(storage.edge_count(), 1);
        assert_eq!(storage.occurrences().len(), 1);
        assert_eq!(storage.occurrences()[0].element_id, produced[3].unwrap());
        assert!(storage.files()[0].complete);
    }

    #[test]
    fn test_forward_reference_is_dropped() {
        let events = vec![
            IngestEvent::Node {
                name: NameHierarchy::parse("a", DELIMITER_CXX),
                node_type: NodeType::Function,
                definition_kind: DefinitionKind::Explicit,
            },
            IngestEvent::Edge {
                edge_type: EdgeType::Call,
                from: 0,
                to: 5,
            },
        ];

        let mut storage = IntermediateStorage::new();
        let mut client = StorageParserClient::new(&mut storage, "a.cpp");
        let produced = replay(&events, &mut client);

        assert_eq!(produced[1], None);
        assert_eq!(storage.edge_count(), 0);
        assert_eq!(storage.diagnostics().len(), 1);
    }

    #[test]
    fn test_parse_event_lines() {
        let input = r#"
{"event":"file_start","path":"a.cpp"}
{"event":"file_finish","indexed":true,"complete":true}
"#;
        let events = parse_event_lines(input).unwrap();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], IngestEvent::FileStart { modification_time: 0, .. }));

        let local = parse_event_lines(
            r#"{"event":"local_symbol","name":"a.cpp<2:5>","location":{"file":0,"start_line":2,"start_column":5,"end_line":2,"end_column":6}}"#,
        )
        .unwrap();
        assert!(matches!(&local[0], IngestEvent::LocalSymbol { name, .. } if name == "a.cpp<2:5>"));

        let err = parse_event_lines("{\"event\":\"bogus\"}").unwrap_err();
        assert!(err.to_string().contains("line 1"));
    }
}
