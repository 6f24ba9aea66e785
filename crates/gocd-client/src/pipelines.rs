//! Pipeline dependency graph
//!
//! Pipelines name their upstream pipelines in their materials. Once every
//! pipeline configuration is known, [`PipelineGraph`] links them and answers
//! upstream/downstream questions.

use gocd_core::{
    build_graph, try_graph_depth_walk, GocdError, Material, Pipeline, PipelineGroup, Result,
};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::{debug, instrument};

use crate::server::GoServer;

/// All pipelines of a server, cross-linked through their pipeline materials
#[derive(Debug, Clone)]
pub struct PipelineGraph {
    pipelines: Vec<Pipeline>,
    index: HashMap<String, usize>,
}

/// Serializable view of one linked pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphEntry<'a> {
    pub name: &'a str,
    pub predecessors: &'a [String],
    pub descendants: &'a [String],
}

impl PipelineGraph {
    /// Fetch every pipeline group from the server and link the pipelines
    #[instrument(skip(server))]
    pub async fn fetch<S: GoServer + ?Sized>(server: &S) -> Result<Self> {
        let groups = server.pipeline_groups().await?;
        Ok(Self::from_groups(groups))
    }

    pub fn from_groups(groups: Vec<PipelineGroup>) -> Self {
        Self::from_pipelines(groups.into_iter().flat_map(|g| g.pipelines).collect())
    }

    /// Link a flat list of pipelines
    ///
    /// A pipeline material whose upstream name matches no pipeline in the
    /// list produces no edge.
    pub fn from_pipelines(mut pipelines: Vec<Pipeline>) -> Self {
        build_graph(
            &mut pipelines,
            |p| p.materials.clone(),
            |material: &Material, candidate: &Pipeline| {
                material.upstream_pipeline() == Some(candidate.name.as_str())
            },
        );

        let index = pipelines
            .iter()
            .enumerate()
            .map(|(i, p)| (p.name.clone(), i))
            .collect();

        debug!("Built pipeline graph with {} pipelines", pipelines.len());
        Self { pipelines, index }
    }

    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty()
    }

    pub fn pipelines(&self) -> &[Pipeline] {
        &self.pipelines
    }

    pub fn get(&self, name: &str) -> Option<&Pipeline> {
        self.index.get(name).map(|&i| &self.pipelines[i])
    }

    fn require(&self, name: &str) -> Result<&Pipeline> {
        self.get(name)
            .ok_or_else(|| GocdError::PipelineNotFound(name.to_string()))
    }

    /// Pipelines this one consumes directly
    pub fn predecessors(&self, name: &str) -> Result<&[String]> {
        Ok(&self.require(name)?.predecessors)
    }

    /// Pipelines consuming this one directly
    pub fn descendants(&self, name: &str) -> Result<&[String]> {
        Ok(&self.require(name)?.descendants)
    }

    /// Every pipeline this one depends on, directly or not
    ///
    /// The pipeline itself is never part of the result, even inside a cycle.
    pub fn upstream(&self, name: &str) -> Result<HashSet<String>> {
        self.transitive(name, |n| self.predecessors(n))
    }

    /// Every pipeline depending on this one, directly or not
    ///
    /// The pipeline itself is never part of the result, even inside a cycle.
    pub fn downstream(&self, name: &str) -> Result<HashSet<String>> {
        self.transitive(name, |n| self.descendants(n))
    }

    fn transitive<'a, F>(&'a self, name: &str, mut neighbors: F) -> Result<HashSet<String>>
    where
        F: FnMut(&str) -> Result<&'a [String]>,
    {
        self.require(name)?;

        let mut reached = try_graph_depth_walk([name.to_string()], |n: &String| {
            neighbors(n.as_str()).map(|next| next.to_vec())
        })?;
        reached.remove(name);
        Ok(reached)
    }

    /// Pipelines without upstream pipelines
    pub fn roots(&self) -> Vec<&Pipeline> {
        self.pipelines
            .iter()
            .filter(|p| p.predecessors.is_empty())
            .collect()
    }

    /// Pipelines nothing depends on
    pub fn leaves(&self) -> Vec<&Pipeline> {
        self.pipelines
            .iter()
            .filter(|p| p.descendants.is_empty())
            .collect()
    }

    pub fn entries(&self) -> Vec<GraphEntry<'_>> {
        self.pipelines
            .iter()
            .map(|p| GraphEntry {
                name: &p.name,
                predecessors: &p.predecessors,
                descendants: &p.descendants,
            })
            .collect()
    }
}
