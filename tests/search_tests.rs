//! Fuzzy search over an index rebuilt from a persisted graph.

use std::sync::{Arc, RwLock};
use std::thread;

use codetrail::ingest::{ParserClient, StorageParserClient};
use codetrail::model::{DefinitionKind, NameHierarchy, NodeType, DELIMITER_CXX};
use codetrail::{rebuild_search_index, GraphStorage, IntermediateStorage, SearchIndex};

fn graph_with(symbols: &[&str]) -> GraphStorage {
    let mut buffer = IntermediateStorage::new();
    let mut client = StorageParserClient::new(&mut buffer, "lib.cpp");
    client.on_file_start("lib.cpp", 1);
    for symbol in symbols {
        client.on_node(
            &NameHierarchy::parse(symbol, DELIMITER_CXX),
            NodeType::Function,
            DefinitionKind::Explicit,
        );
    }
    client.on_file_finish(true, true);

    let mut graph = GraphStorage::open_in_memory().unwrap();
    graph.merge_file("lib.cpp", &buffer).unwrap();
    graph
}

#[test]
fn test_build_attaches_persistent_ids() {
    let graph = graph_with(&["net::http::get", "net::http::post"]);
    let index = SearchIndex::build(&graph, DELIMITER_CXX).unwrap();

    let get = index.get_node("net::http::get").unwrap();
    let persisted = graph
        .node_id_for_name(&NameHierarchy::parse("net::http::get", DELIMITER_CXX))
        .unwrap()
        .unwrap();
    assert_eq!(
        index.node(get).unwrap().token_ids().iter().copied().collect::<Vec<_>>(),
        vec![persisted]
    );
    // Ancestor scopes are nodes of their own.
    assert_eq!(index.node(index.get_node("net::http").unwrap()).unwrap().token_ids().len(), 1);
}

#[test]
fn test_ranking_prefers_exact_then_short() {
    let graph = graph_with(&["parse", "parse_args", "parser::parse_line", "sparse_matrix"]);
    let index = SearchIndex::build(&graph, DELIMITER_CXX).unwrap();

    let matches = index.find_fuzzy_matches("parse");
    let names: Vec<&str> = matches.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names[0], "parse");
    assert!(names.contains(&"parse_args"));
    assert!(names.contains(&"sparse_matrix"));
    for pair in matches.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }
}

#[test]
fn test_query_is_case_insensitive_and_highlights() {
    let graph = graph_with(&["HttpClient::sendRequest"]);
    let index = SearchIndex::build(&graph, DELIMITER_CXX).unwrap();

    let matches = index.find_fuzzy_matches("sendreq");
    let best = &matches[0];
    assert_eq!(best.name, "HttpClient::sendRequest");
    let highlighted: String = best
        .indices
        .iter()
        .map(|&i| best.name.chars().nth(i).unwrap())
        .collect();
    assert_eq!(highlighted.to_lowercase(), "sendreq");
}

#[test]
fn test_non_subsequence_matches_nothing() {
    let graph = graph_with(&["alpha", "beta"]);
    let index = SearchIndex::build(&graph, DELIMITER_CXX).unwrap();
    assert!(index.find_fuzzy_matches("zeta").is_empty());
    assert!(index.find_fuzzy_matches("").is_empty());
}

#[test]
fn test_readers_share_index_during_rebuild() {
    let graph = RwLock::new(graph_with(&["core::run", "core::stop"]));
    let index = Arc::new(RwLock::new(SearchIndex::new(DELIMITER_CXX)));
    rebuild_search_index(&graph, &index, DELIMITER_CXX).unwrap();

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let index = Arc::clone(&index);
            thread::spawn(move || {
                let index = index.read().unwrap();
                index.find_fuzzy_matches("core::run")[0].name.clone()
            })
        })
        .collect();
    rebuild_search_index(&graph, &index, DELIMITER_CXX).unwrap();

    for reader in readers {
        assert_eq!(reader.join().unwrap(), "core::run");
    }
}
