//! Integration tests linking real pipeline configuration
//!
//! Covers:
//! - Parsing a `config/pipeline_groups` payload
//! - Linking pipelines through their pipeline materials
//! - Transitive upstream/downstream walks over the linked pipelines

use gocd_core::{build_graph, graph_depth_walk, Material, Pipeline, PipelineGroup};
use std::collections::{HashMap, HashSet};

const GROUPS: &str = r#"[
    {
        "name": "build",
        "pipelines": [
            {
                "name": "compile",
                "materials": [
                    {"description": "URL: https://github.com/acme/app, Branch: main", "type": "Git"}
                ]
            },
            {
                "name": "unit",
                "materials": [{"description": "compile", "type": "Pipeline"}]
            },
            {
                "name": "lint",
                "materials": [{"description": "compile [build]", "type": "Pipeline"}]
            }
        ]
    },
    {
        "name": "release",
        "pipelines": [
            {
                "name": "package",
                "materials": [
                    {"description": "unit", "type": "Pipeline"},
                    {"description": "lint", "type": "Pipeline"}
                ]
            },
            {
                "name": "deploy",
                "materials": [
                    {"description": "package", "type": "Pipeline"},
                    {"description": "URL: https://github.com/acme/infra, Branch: main", "type": "Git"}
                ]
            }
        ]
    }
]"#;

/// Helper to parse and link the fixture
fn linked_pipelines() -> Vec<Pipeline> {
    let groups: Vec<PipelineGroup> = serde_json::from_str(GROUPS).expect("fixture parses");
    let mut pipelines: Vec<Pipeline> = groups.into_iter().flat_map(|g| g.pipelines).collect();

    build_graph(
        &mut pipelines,
        |p| p.materials.clone(),
        |m: &Material, p: &Pipeline| m.upstream_pipeline() == Some(p.name.as_str()),
    );

    pipelines
}

fn by_name(pipelines: &[Pipeline]) -> HashMap<String, Pipeline> {
    pipelines.iter().map(|p| (p.name.clone(), p.clone())).collect()
}

fn names(items: &[&str]) -> HashSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[test]
fn test_direct_links() {
    let pipelines = by_name(&linked_pipelines());

    assert!(pipelines["compile"].predecessors.is_empty());
    assert_eq!(pipelines["compile"].descendants, vec!["unit", "lint"]);
    assert_eq!(pipelines["package"].predecessors, vec!["unit", "lint"]);
    assert_eq!(pipelines["package"].descendants, vec!["deploy"]);
    assert_eq!(pipelines["deploy"].predecessors, vec!["package"]);
    assert!(pipelines["deploy"].descendants.is_empty());
}

#[test]
fn test_transitive_upstream() {
    let pipelines = by_name(&linked_pipelines());

    let upstream = graph_depth_walk(["deploy".to_string()], |name| {
        pipelines[name].predecessors.clone()
    });

    assert_eq!(upstream, names(&["deploy", "package", "unit", "lint", "compile"]));
}

#[test]
fn test_transitive_downstream() {
    let pipelines = by_name(&linked_pipelines());

    let downstream = graph_depth_walk(["lint".to_string()], |name| {
        pipelines[name].descendants.clone()
    });

    assert_eq!(downstream, names(&["lint", "package", "deploy"]));
}

#[test]
fn test_linking_is_deterministic() {
    let first = linked_pipelines();
    let second = linked_pipelines();
    assert_eq!(first, second);
}
