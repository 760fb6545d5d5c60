// src/cli.rs

use std::fmt;
use std::path::PathBuf;

use clap::Parser;

use crate::session::ArtifactKind;

pub const DEFAULT_API_BASE: &str = "http://127.0.0.1:8000";
pub const API_BASE_ENV: &str = "CODELENS_API_BASE";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Public URL of the repository to scan
    #[arg(short, long)]
    pub repo_url: String,

    /// Base URL of the analysis service (default: $CODELENS_API_BASE, then
    /// http://127.0.0.1:8000)
    #[arg(long)]
    pub api_base: Option<String>,

    /// Directory to write the rendered views into
    #[arg(short, long, default_value = "codelens-out")]
    pub output: PathBuf,

    /// Views to render, in activation order
    #[arg(long, value_enum, value_delimiter = ',',
          default_values_t = vec![View::Tree, View::Graph, View::Health, View::Tour])]
    pub views: Vec<View>,

    /// Drill the treemap into this directory before rendering (e.g. src/core)
    #[arg(long)]
    pub focus: Option<String>,

    /// Highlight this file's neighborhood in the dependency graph
    #[arg(long)]
    pub highlight: Option<String>,

    /// Width of the graph canvas in pixels
    #[arg(long, default_value_t = 1280)]
    pub width: u32,

    /// Height of the graph canvas in pixels
    #[arg(long, default_value_t = 720)]
    pub height: u32,

    /// Also write the raw JSON payloads next to the rendered views
    #[arg(long)]
    pub save_artifacts: bool,

    /// Give artifacts whose fetch failed one more attempt
    #[arg(long)]
    pub retry_failed: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum View {
    Tree,
    Graph,
    Health,
    Tour,
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(ArtifactKind::from(*self).as_str())
    }
}

impl From<View> for ArtifactKind {
    fn from(view: View) -> Self {
        match view {
            View::Tree => ArtifactKind::Tree,
            View::Graph => ArtifactKind::Graph,
            View::Health => ArtifactKind::Health,
            View::Tour => ArtifactKind::Tour,
        }
    }
}

impl Args {
    /// Flag wins over environment, environment over the built-in default.
    /// Nothing validates the value; a bad base surfaces as a network error
    /// on first use.
    pub fn resolve_api_base(&self) -> String {
        self.api_base
            .clone()
            .or_else(|| std::env::var(API_BASE_ENV).ok())
            .filter(|base| !base.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string())
    }

    pub fn view_kinds(&self) -> Vec<ArtifactKind> {
        self.views.iter().map(|&v| v.into()).collect()
    }
}
