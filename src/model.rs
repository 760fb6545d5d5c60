// src/model.rs

use serde::{Deserialize, Serialize};

/// Caps the analysis service applied to the scan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanLimits {
    pub max_bytes: u64,
    pub max_files: u64,
}

/// Identity and summary of one completed scan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanSummary {
    pub scan_id: String,
    pub owner: String,
    pub repo: String,
    pub repo_url: String,
    /// Unix timestamp (seconds)
    pub created_at: i64,
    pub files_scanned: u64,
    pub total_loc: u64,
    pub limits: ScanLimits,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// One filesystem entry in the size tree. Files carry `loc`, directories
/// carry `children`; the structure is recursive with unbounded depth.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SizeTreeNode {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loc: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<SizeTreeNode>>,
}

impl SizeTreeNode {
    pub fn is_dir(&self) -> bool {
        self.children.is_some()
    }

    pub fn children(&self) -> &[SizeTreeNode] {
        self.children.as_deref().unwrap_or(&[])
    }

    /// Lines of code in this subtree, files summed recursively.
    pub fn total_loc(&self) -> u64 {
        match &self.children {
            Some(kids) => kids.iter().map(SizeTreeNode::total_loc).sum(),
            None => self.loc.unwrap_or(0),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphNode {
    /// File path, unique within the graph
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphEdge {
    pub source: String,
    pub target: String,
}

/// File-level reference graph for one scan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyGraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Repository metadata as reported by the hosting platform
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthSnapshot {
    pub full_name: String,
    pub url: String,
    #[serde(default)]
    pub description: Option<String>,
    pub stars: u64,
    pub forks: u64,
    pub open_issues: u64,
    #[serde(default)]
    pub license: Option<String>,
    /// RFC 3339 timestamp of the last push, if known
    #[serde(default)]
    pub pushed_at: Option<String>,
    #[serde(default)]
    pub default_branch: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TourHeader {
    pub owner: String,
    pub repo: String,
    pub repo_url: String,
    pub files_scanned: u64,
    pub total_loc: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TourSection {
    pub title: String,
    /// Bullets may contain inline markup; they are passed through verbatim.
    pub bullets: Vec<String>,
}

/// Generated narrative walkthrough of the scanned repository
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TourDocument {
    pub header: TourHeader,
    pub sections: Vec<TourSection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}
