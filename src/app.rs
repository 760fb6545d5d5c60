// src/app.rs

use std::fs;
use std::path::{Path, PathBuf};

use indicatif::ProgressBar;
use tracing::{debug, warn};

use crate::client::AnalysisService;
use crate::error::Error;
use crate::session::{ArtifactKind, ArtifactPayload, FetchTicket, Session};

/// Drives one scanning session against an analysis service.
///
/// The session decides *whether* to fetch; the app performs the request and
/// feeds the completion back. Both completion paths go through the session,
/// so an artifact's loading flag is always cleared whatever the outcome.
pub struct App<'a> {
    session: Session,
    service: &'a dyn AnalysisService,
}

impl<'a> App<'a> {
    pub fn new(service: &'a dyn AnalysisService) -> Self {
        Self {
            session: Session::new(),
            service,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Submit a scan. Validation failures never reach the network; remote
    /// and transport failures are recorded on the session and returned.
    pub fn submit_scan(&mut self, repo_url: &str) -> Result<(), Error> {
        let trimmed = self.session.begin_scan(repo_url)?;

        let bar = ProgressBar::new_spinner();
        bar.set_message("scanning repository");
        let result = self.service.start_scan(&trimmed);
        bar.finish_and_clear();

        match result {
            Ok(summary) => {
                self.session.scan_succeeded(summary);
                Ok(())
            }
            Err(err) => {
                self.session.scan_failed(err.to_string());
                Err(err)
            }
        }
    }

    /// Activate a view, fetching its artifact if the session asks for it.
    pub fn activate(&mut self, kind: ArtifactKind) {
        if let Some(ticket) = self.session.select_tab(kind) {
            self.run_fetch(ticket);
        } else {
            debug!(kind = kind.as_str(), "view activated without a fetch");
        }
    }

    /// Give every failed artifact one more attempt. Returns how many were
    /// retried.
    pub fn retry_failed(&mut self) -> usize {
        let mut retried = 0;
        for kind in ArtifactKind::ALL {
            if let Some(ticket) = self.session.retry(kind) {
                self.run_fetch(ticket);
                retried += 1;
            }
        }
        retried
    }

    fn run_fetch(&mut self, ticket: FetchTicket) {
        let bar = ProgressBar::new_spinner();
        bar.set_message(format!("fetching {}", ticket.kind.as_str()));

        let result = match ticket.kind {
            ArtifactKind::Tree => self
                .service
                .fetch_tree(&ticket.scan_id)
                .map(ArtifactPayload::Tree),
            ArtifactKind::Graph => self
                .service
                .fetch_graph(&ticket.scan_id)
                .map(ArtifactPayload::Graph),
            ArtifactKind::Health => self
                .service
                .fetch_health(&ticket.scan_id)
                .map(ArtifactPayload::Health),
            ArtifactKind::Tour => self
                .service
                .fetch_tour(&ticket.scan_id)
                .map(ArtifactPayload::Tour),
        };
        bar.finish_and_clear();

        match result {
            Ok(payload) => {
                self.session.fetch_succeeded(&ticket, payload);
            }
            Err(err) => {
                warn!(kind = ticket.kind.as_str(), "fetch failed: {err}");
                self.session.fetch_failed(&ticket, err.to_string());
            }
        }
    }
}

/// Write the raw JSON payloads of everything the session holds, mirroring
/// the scan records the service keeps on its side. Returns the files
/// written.
pub fn save_artifacts(session: &Session, dir: &Path) -> Result<Vec<PathBuf>, Error> {
    fs::create_dir_all(dir)?;
    let mut written = Vec::new();

    if let Some(summary) = session.scan() {
        let path = dir.join("scan.json");
        fs::write(&path, serde_json::to_string_pretty(summary)?)?;
        written.push(path);
    }

    for kind in ArtifactKind::ALL {
        let Some(payload) = &session.slot(kind).payload else {
            continue;
        };
        let json = match payload {
            ArtifactPayload::Tree(tree) => serde_json::to_string_pretty(tree)?,
            ArtifactPayload::Graph(graph) => serde_json::to_string_pretty(graph)?,
            ArtifactPayload::Health(health) => serde_json::to_string_pretty(health)?,
            ArtifactPayload::Tour(tour) => serde_json::to_string_pretty(tour)?,
        };
        let path = dir.join(format!("{}.json", kind.as_str()));
        fs::write(&path, json)?;
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ScanLimits, ScanSummary, SizeTreeNode};

    fn summary() -> ScanSummary {
        ScanSummary {
            scan_id: "abc123".into(),
            owner: "octocat".into(),
            repo: "Hello-World".into(),
            repo_url: "https://github.com/octocat/Hello-World".into(),
            created_at: 1_722_000_000,
            files_scanned: 3,
            total_loc: 42,
            limits: ScanLimits {
                max_bytes: 100 * 1024 * 1024,
                max_files: 5000,
            },
            status: None,
        }
    }

    #[test]
    fn save_artifacts_writes_scan_and_cached_payloads_only() {
        let mut session = Session::new();
        session.scan_succeeded(summary());
        let ticket = session.select_tab(ArtifactKind::Tree).unwrap();
        session.fetch_succeeded(
            &ticket,
            ArtifactPayload::Tree(SizeTreeNode {
                name: "root".into(),
                loc: None,
                children: Some(vec![SizeTreeNode {
                    name: "main.rs".into(),
                    loc: Some(42),
                    children: None,
                }]),
            }),
        );

        let dir = tempfile::tempdir().unwrap();
        let written = save_artifacts(&session, dir.path()).unwrap();

        let names: Vec<String> = written
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["scan.json", "tree.json"]);

        let tree_json = std::fs::read_to_string(dir.path().join("tree.json")).unwrap();
        let decoded: SizeTreeNode = serde_json::from_str(&tree_json).unwrap();
        assert_eq!(decoded.total_loc(), 42);
    }

    #[test]
    fn save_artifacts_without_a_scan_writes_nothing() {
        let session = Session::new();
        let dir = tempfile::tempdir().unwrap();
        let written = save_artifacts(&session, dir.path()).unwrap();
        assert!(written.is_empty());
    }
}
