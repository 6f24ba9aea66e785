//! Type definitions for pipeline configuration and history

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::graph::Linked;

/// A named group of pipelines as returned by `config/pipeline_groups`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineGroup {
    pub name: String,
    #[serde(default)]
    pub pipelines: Vec<Pipeline>,
}

/// Pipeline configuration
///
/// `predecessors` and `descendants` are never sent by the server; they are
/// filled in by [`crate::build_graph`] once every pipeline is known.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pipeline {
    pub name: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub materials: Vec<Material>,
    #[serde(default)]
    pub stages: Vec<StageRef>,

    /// Names of the pipelines this one consumes as materials
    #[serde(skip)]
    pub predecessors: Vec<String>,
    /// Names of the pipelines consuming this one as a material
    #[serde(skip)]
    pub descendants: Vec<String>,
}

impl Pipeline {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Add a material (builder style, mostly for tests and fixtures)
    pub fn with_material(mut self, material: Material) -> Self {
        self.materials.push(material);
        self
    }

    /// Names of upstream pipelines declared in the materials
    pub fn upstream_names(&self) -> impl Iterator<Item = &str> {
        self.materials.iter().filter_map(Material::upstream_pipeline)
    }
}

impl Linked for Pipeline {
    type Id = String;

    fn id(&self) -> String {
        self.name.clone()
    }

    fn predecessors_mut(&mut self) -> &mut Vec<String> {
        &mut self.predecessors
    }

    fn descendants_mut(&mut self) -> &mut Vec<String> {
        &mut self.descendants
    }
}

/// Stage declared in a pipeline configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageRef {
    pub name: String,
}

/// Material (source) of a pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Material {
    pub description: String,
    #[serde(default)]
    pub fingerprint: Option<String>,
    #[serde(rename = "type")]
    pub material_type: MaterialType,
}

impl Material {
    /// A dependency on another pipeline
    pub fn pipeline(upstream: impl Into<String>) -> Self {
        Self {
            description: upstream.into(),
            fingerprint: None,
            material_type: MaterialType::Pipeline,
        }
    }

    /// Name of the upstream pipeline, for pipeline materials only
    ///
    /// Some server versions describe a dependency as `upstream [stage]`;
    /// only the pipeline part is returned.
    pub fn upstream_pipeline(&self) -> Option<&str> {
        if self.material_type != MaterialType::Pipeline {
            return None;
        }
        let name = match self.description.find(" [") {
            Some(idx) => &self.description[..idx],
            None => self.description.as_str(),
        };
        Some(name.trim())
    }
}

/// Kind of material
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MaterialType {
    Git,
    Mercurial,
    Subversion,
    Perforce,
    Tfs,
    Pipeline,
    Package,
    Plugin,
    Other(String),
}

impl From<String> for MaterialType {
    fn from(s: String) -> Self {
        match s.to_lowercase().as_str() {
            "git" => Self::Git,
            "mercurial" | "hg" => Self::Mercurial,
            "subversion" | "svn" => Self::Subversion,
            "perforce" | "p4" => Self::Perforce,
            "tfs" => Self::Tfs,
            "pipeline" | "dependency" => Self::Pipeline,
            "package" => Self::Package,
            "plugin" | "scm" => Self::Plugin,
            _ => Self::Other(s),
        }
    }
}

impl From<MaterialType> for String {
    fn from(t: MaterialType) -> Self {
        t.to_string()
    }
}

impl std::fmt::Display for MaterialType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Git => write!(f, "Git"),
            Self::Mercurial => write!(f, "Mercurial"),
            Self::Subversion => write!(f, "Subversion"),
            Self::Perforce => write!(f, "Perforce"),
            Self::Tfs => write!(f, "Tfs"),
            Self::Pipeline => write!(f, "Pipeline"),
            Self::Package => write!(f, "Package"),
            Self::Plugin => write!(f, "Plugin"),
            Self::Other(s) => write!(f, "{}", s),
        }
    }
}

/// Envelope of `pipelines/{name}/history`
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineHistory {
    #[serde(default)]
    pub pipelines: Vec<PipelineInstance>,
}

/// One run of a pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineInstance {
    pub name: String,
    #[serde(deserialize_with = "counter")]
    pub counter: u64,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub stages: Vec<StageInstance>,
}

impl PipelineInstance {
    /// True once every stage has a final result
    pub fn is_finished(&self) -> bool {
        !self.stages.is_empty()
            && self
                .stages
                .iter()
                .all(|s| matches!(s.result.as_deref(), Some(r) if r != "Unknown"))
    }
}

/// One run of a stage inside a pipeline instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageInstance {
    pub name: String,
    #[serde(deserialize_with = "counter")]
    pub counter: u64,
    #[serde(default)]
    pub scheduled: bool,
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub jobs: Vec<JobInstance>,
}

/// One run of a job inside a stage instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobInstance {
    pub name: String,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub scheduled_date: Option<DateTime<Utc>>,
}

/// Location of a job artifact on the server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactLocator {
    pub pipeline: String,
    pub pipeline_counter: u64,
    pub stage: String,
    pub stage_counter: u64,
    pub job: String,
    pub path: String,
}

impl ArtifactLocator {
    /// Path below `/go/files/`
    pub fn url_path(&self) -> String {
        format!(
            "{}/{}/{}/{}/{}/{}",
            self.pipeline,
            self.pipeline_counter,
            self.stage,
            self.stage_counter,
            self.job,
            self.path.trim_start_matches('/')
        )
    }
}

impl std::fmt::Display for ArtifactLocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.url_path())
    }
}

/// Counters are numbers in some payloads and strings in others
fn counter<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}
