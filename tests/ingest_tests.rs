//! A front end walking nested scopes, observed through the buffer and the merged graph.

use codetrail::ingest::{ParseLocation, ParserClient, ScopeStack, StorageParserClient};
use codetrail::model::{AccessKind, DefinitionKind, EdgeType, LocationKind, NodeType, DELIMITER_JAVA};
use codetrail::{GraphStorage, IntermediateStorage, RecordKind};

/// Emits `package shop; class Cart { private int total; void add() { total++; } }`.
fn walk_cart(client: &mut dyn ParserClient) {
    let file = client.on_file_start("shop/Cart.java", 42);
    let mut scopes = ScopeStack::new(DELIMITER_JAVA);
    scopes.push("shop");

    let cart = client
        .on_node(&scopes.name_for("Cart"), NodeType::Class, DefinitionKind::Explicit)
        .unwrap();
    client.on_source_location(cart, &ParseLocation::new(file, 2, 7, 2, 10));
    client.on_source_location(cart, &ParseLocation::new(file, 2, 1, 5, 1).with_kind(LocationKind::Scope));
    client.on_comment(&ParseLocation::new(file, 1, 1, 1, 20));

    scopes.push("Cart");
    let total = client
        .on_node(&scopes.name_for("total"), NodeType::Field, DefinitionKind::Explicit)
        .unwrap();
    client.on_access(total, AccessKind::Private);
    let add = client
        .on_node(&scopes.name_for("add"), NodeType::Method, DefinitionKind::Explicit)
        .unwrap();
    client.on_access(add, AccessKind::Default);

    let usage = client.on_edge(EdgeType::Usage, add, total).unwrap();
    client.on_source_location(usage, &ParseLocation::new(file, 4, 16, 4, 20));
    client.on_error("unknown type 'int'", &ParseLocation::point(file, 3, 13), false);
    scopes.pop();

    client.on_file_finish(true, true);
}

#[test]
fn test_nested_scopes_produce_member_edges() {
    let mut buffer = IntermediateStorage::new();
    let mut client = StorageParserClient::new(&mut buffer, "shop/Cart.java");
    walk_cart(&mut client);

    let names: Vec<String> = buffer
        .nodes()
        .iter()
        .map(|n| n.data.name.qualified_name())
        .collect();
    for expected in ["shop", "shop.Cart", "shop.Cart.total", "shop.Cart.add"] {
        assert!(names.contains(&expected.to_string()), "missing {}", expected);
    }
    let members = buffer
        .edges()
        .iter()
        .filter(|e| e.data.edge_type == EdgeType::Member)
        .count();
    assert_eq!(members, 3);
    assert!(buffer.diagnostics().is_empty());
}

#[test]
fn test_walking_twice_changes_nothing() {
    let mut buffer = IntermediateStorage::new();
    {
        let mut client = StorageParserClient::new(&mut buffer, "shop/Cart.java");
        walk_cart(&mut client);
    }
    let nodes = buffer.node_count();
    let edges = buffer.edge_count();
    let locations = buffer.source_location_count();
    let occurrences = buffer.occurrences().len();
    {
        let mut client = StorageParserClient::new(&mut buffer, "shop/Cart.java");
        walk_cart(&mut client);
    }
    assert_eq!(buffer.node_count(), nodes);
    assert_eq!(buffer.edge_count(), edges);
    assert_eq!(buffer.source_location_count(), locations);
    assert_eq!(buffer.occurrences().len(), occurrences);
    assert_eq!(buffer.error_count(), 1);
}

#[test]
fn test_non_fatal_error_keeps_file_complete() {
    let mut buffer = IntermediateStorage::new();
    let mut client = StorageParserClient::new(&mut buffer, "shop/Cart.java");
    walk_cart(&mut client);

    let mut graph = GraphStorage::open_in_memory().unwrap();
    let report = graph.merge_file("shop/Cart.java", &buffer).unwrap();
    assert_eq!(report.errors, 1);
    assert_eq!(report.comment_locations, 1);

    let file = graph.file("shop/Cart.java").unwrap().unwrap();
    assert!(file.complete);
    assert_eq!(file.modification_time, 42);

    let errors = graph.errors().unwrap();
    assert_eq!(errors.len(), 1);
    assert!(!errors[0].data.fatal);
    assert_eq!(errors[0].data.file_path, "shop/Cart.java");
}

#[test]
fn test_dangling_references_are_reported_not_stored() {
    let mut buffer = IntermediateStorage::new();
    let mut client = StorageParserClient::new(&mut buffer, "x.java");
    let file = client.on_file_start("x.java", 1);
    assert!(client.on_edge(EdgeType::Call, 1000, 1001).is_none());
    assert!(client
        .on_source_location(2000, &ParseLocation::new(file, 1, 1, 1, 2))
        .is_none());
    client.on_file_finish(true, true);

    let records: Vec<_> = buffer
        .diagnostics()
        .iter()
        .map(|d| match d {
            codetrail::IngestDiagnostic::Dropped { record, .. } => *record,
            other => panic!("unexpected diagnostic {:?}", other),
        })
        .collect();
    assert_eq!(records[0], RecordKind::Edge);
    assert_eq!(buffer.edge_count(), 0);

    let mut graph = GraphStorage::open_in_memory().unwrap();
    graph.merge_file("x.java", &buffer).unwrap();
    assert_eq!(graph.edge_count().unwrap(), 0);
    assert!(graph.storage_stats().unwrap().dropped_references >= records.len());
}
