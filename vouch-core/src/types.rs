//! Artifact vocabulary shared by scoring, lineage and the registry boundary.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of registered artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactType {
    Model,
    Dataset,
    Code,
}

impl fmt::Display for ArtifactType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactType::Model => write!(f, "model"),
            ArtifactType::Dataset => write!(f, "dataset"),
            ArtifactType::Code => write!(f, "code"),
        }
    }
}

impl FromStr for ArtifactType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "model" => Ok(ArtifactType::Model),
            "dataset" => Ok(ArtifactType::Dataset),
            "code" => Ok(ArtifactType::Code),
            other => Err(format!("unknown artifact type: {other}")),
        }
    }
}

/// How a linked artifact relates to the artifact that declares the link.
///
/// The linked artifact is always the parent side of the lineage edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RelationKind {
    ParentModel,
    DatasetDep,
    CodeDep,
}

impl RelationKind {
    /// Artifact type implied for the parent side of this relation.
    pub fn parent_type(self) -> ArtifactType {
        match self {
            RelationKind::ParentModel => ArtifactType::Model,
            RelationKind::DatasetDep => ArtifactType::Dataset,
            RelationKind::CodeDep => ArtifactType::Code,
        }
    }

    /// Relation used when an artifact of `parent` type is linked as a parent.
    pub fn for_parent_type(parent: ArtifactType) -> Self {
        match parent {
            ArtifactType::Model => RelationKind::ParentModel,
            ArtifactType::Dataset => RelationKind::DatasetDep,
            ArtifactType::Code => RelationKind::CodeDep,
        }
    }
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelationKind::ParentModel => write!(f, "parent-model"),
            RelationKind::DatasetDep => write!(f, "dataset-dep"),
            RelationKind::CodeDep => write!(f, "code-dep"),
        }
    }
}

/// Reference to another registered artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactLink {
    /// Registry identifier of the linked artifact.
    pub id: String,
    /// Source URL of the linked artifact, when the registry knows it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl ArtifactLink {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: None,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }
}

/// Immutable view of one artifact, built once per scoring request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactSnapshot {
    pub id: String,
    #[serde(rename = "type")]
    pub artifact_type: ArtifactType,
    #[serde(default)]
    pub name: String,
    /// Declared size in bytes.
    #[serde(default)]
    pub size_bytes: u64,
    /// SPDX identifier or expression.
    #[serde(default)]
    pub license: String,
    #[serde(default)]
    pub source_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<ArtifactLink>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset: Option<ArtifactLink>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_model: Option<String>,
    /// Model card or README text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readme: Option<String>,
    /// Net scores of the parent models, filled by the engine before scoring.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parent_net_scores: Vec<f64>,
}

impl ArtifactSnapshot {
    pub fn new(id: impl Into<String>, artifact_type: ArtifactType) -> Self {
        Self {
            id: id.into(),
            artifact_type,
            name: String::new(),
            size_bytes: 0,
            license: String::new(),
            source_url: String::new(),
            code: None,
            dataset: None,
            parent_model: None,
            readme: None,
            parent_net_scores: Vec::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_size(mut self, size_bytes: u64) -> Self {
        self.size_bytes = size_bytes;
        self
    }

    pub fn with_license(mut self, license: impl Into<String>) -> Self {
        self.license = license.into();
        self
    }

    pub fn with_source_url(mut self, url: impl Into<String>) -> Self {
        self.source_url = url.into();
        self
    }

    pub fn with_code(mut self, link: ArtifactLink) -> Self {
        self.code = Some(link);
        self
    }

    pub fn with_dataset(mut self, link: ArtifactLink) -> Self {
        self.dataset = Some(link);
        self
    }

    pub fn with_parent_model(mut self, id: impl Into<String>) -> Self {
        self.parent_model = Some(id.into());
        self
    }

    pub fn with_readme(mut self, readme: impl Into<String>) -> Self {
        self.readme = Some(readme.into());
        self
    }

    pub fn with_parent_net_scores(mut self, scores: Vec<f64>) -> Self {
        self.parent_net_scores = scores;
        self
    }

    /// Repository to consult for contributor and review data.
    ///
    /// Prefers the linked code artifact's URL, falling back to the artifact's
    /// own source URL when that points at GitHub.
    pub fn repository_url(&self) -> Option<&str> {
        if let Some(url) = self.code.as_ref().and_then(|c| c.url.as_deref()) {
            return Some(url);
        }
        if self.source_url.contains("github.com/") {
            return Some(&self.source_url);
        }
        None
    }

    /// Parent-side links declared by this artifact, in a fixed order.
    pub fn declared_links(&self) -> Vec<(RelationKind, String)> {
        let mut links = Vec::new();
        if let Some(parent) = &self.parent_model {
            links.push((RelationKind::ParentModel, parent.clone()));
        }
        if let Some(dataset) = &self.dataset {
            links.push((RelationKind::DatasetDep, dataset.id.clone()));
        }
        if let Some(code) = &self.code {
            links.push((RelationKind::CodeDep, code.id.clone()));
        }
        links
    }
}
