// tests/session_flow.rs
//
// End-to-end session behavior against an in-memory analysis service.

use std::cell::{Cell, RefCell};

use codelens::app::App;
use codelens::client::AnalysisService;
use codelens::error::Error;
use codelens::model::{
    DependencyGraph, GraphEdge, GraphNode, HealthSnapshot, ScanLimits, ScanSummary, SizeTreeNode,
    TourDocument, TourHeader, TourSection,
};
use codelens::report;
use codelens::session::ArtifactKind;

/// Counts every request and can be told to fail upcoming calls.
#[derive(Default)]
struct FakeService {
    scan_calls: Cell<usize>,
    tree_calls: Cell<usize>,
    graph_calls: Cell<usize>,
    health_calls: Cell<usize>,
    tour_calls: Cell<usize>,
    last_health_id: RefCell<Option<String>>,
    fail_next_scans: Cell<usize>,
    fail_next_graphs: Cell<usize>,
}

impl FakeService {
    fn summary(&self, scan_id: &str) -> ScanSummary {
        ScanSummary {
            scan_id: scan_id.to_string(),
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
}

impl AnalysisService for FakeService {
    fn start_scan(&self, _repo_url: &str) -> Result<ScanSummary, Error> {
        self.scan_calls.set(self.scan_calls.get() + 1);
        if self.fail_next_scans.get() > 0 {
            self.fail_next_scans.set(self.fail_next_scans.get() - 1);
            return Err(Error::remote(422, Some("Unsupported repo URL".into())));
        }
        Ok(self.summary(&format!("scan-{}", self.scan_calls.get())))
    }

    fn fetch_tree(&self, _scan_id: &str) -> Result<SizeTreeNode, Error> {
        self.tree_calls.set(self.tree_calls.get() + 1);
        Ok(SizeTreeNode {
            name: "root".into(),
            loc: None,
            children: Some(vec![SizeTreeNode {
                name: "main.rs".into(),
                loc: Some(42),
                children: None,
            }]),
        })
    }

    fn fetch_graph(&self, _scan_id: &str) -> Result<DependencyGraph, Error> {
        self.graph_calls.set(self.graph_calls.get() + 1);
        if self.fail_next_graphs.get() > 0 {
            self.fail_next_graphs.set(self.fail_next_graphs.get() - 1);
            return Err(Error::remote(502, None));
        }
        Ok(DependencyGraph {
            nodes: vec![
                GraphNode { id: "a.ts".into() },
                GraphNode { id: "b.ts".into() },
            ],
            edges: vec![GraphEdge {
                source: "a.ts".into(),
                target: "b.ts".into(),
            }],
            note: None,
        })
    }

    fn fetch_health(&self, scan_id: &str) -> Result<HealthSnapshot, Error> {
        self.health_calls.set(self.health_calls.get() + 1);
        *self.last_health_id.borrow_mut() = Some(scan_id.to_string());
        Ok(HealthSnapshot {
            full_name: "octocat/Hello-World".into(),
            url: "https://github.com/octocat/Hello-World".into(),
            description: Some("My first repository on GitHub!".into()),
            stars: 1700,
            forks: 900,
            open_issues: 12,
            license: None,
            pushed_at: None,
            default_branch: Some("master".into()),
        })
    }

    fn fetch_tour(&self, _scan_id: &str) -> Result<TourDocument, Error> {
        self.tour_calls.set(self.tour_calls.get() + 1);
        Ok(TourDocument {
            header: TourHeader {
                owner: "octocat".into(),
                repo: "Hello-World".into(),
                repo_url: "https://github.com/octocat/Hello-World".into(),
                files_scanned: 3,
                total_loc: 42,
            },
            sections: vec![TourSection {
                title: "Overview".into(),
                bullets: vec!["A minimal repository".into()],
            }],
            note: None,
        })
    }
}

#[test]
fn blank_input_never_reaches_the_network() {
    let service = FakeService::default();
    let mut app = App::new(&service);

    for input in ["", "   ", "\n\t "] {
        let err = app.submit_scan(input).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(err.to_string(), "Enter a repository URL");
    }
    assert_eq!(service.scan_calls.get(), 0);
    assert_eq!(
        app.session().scan_error.as_deref(),
        Some("Enter a repository URL")
    );
}

#[test]
fn health_is_fetched_exactly_once_and_rendered_verbatim() {
    let service = FakeService::default();
    let mut app = App::new(&service);

    app.submit_scan("https://github.com/octocat/Hello-World").unwrap();
    assert_eq!(app.session().active(), ArtifactKind::Tree);

    app.activate(ArtifactKind::Health);
    app.activate(ArtifactKind::Tree);
    app.activate(ArtifactKind::Health);
    app.activate(ArtifactKind::Health);

    assert_eq!(service.health_calls.get(), 1);
    assert_eq!(service.last_health_id.borrow().as_deref(), Some("scan-1"));

    let health = app.session().health().unwrap();
    let text = report::render_health(health);
    assert!(text.contains("- Stars: 1700"));
    assert!(text.contains("- Forks: 900"));
    assert!(text.contains("- Open issues: 12"));
    assert!(text.contains("- License: —"));
    assert!(text.contains("- Last push: —"));
    assert!(text.contains("- Default branch: master"));
}

#[test]
fn failed_fetch_is_sticky_until_explicitly_retried() {
    let service = FakeService::default();
    service.fail_next_graphs.set(1);
    let mut app = App::new(&service);

    app.submit_scan("https://github.com/octocat/Hello-World").unwrap();
    app.activate(ArtifactKind::Graph);
    assert_eq!(service.graph_calls.get(), 1);
    assert!(app.session().slot(ArtifactKind::Graph).is_failed());
    assert_eq!(
        app.session().slot(ArtifactKind::Graph).error.as_deref(),
        Some("request failed with status 502")
    );

    // Re-activation must not re-issue the request.
    app.activate(ArtifactKind::Tree);
    app.activate(ArtifactKind::Graph);
    assert_eq!(service.graph_calls.get(), 1);

    // The explicit retry is the recovery path.
    assert_eq!(app.retry_failed(), 1);
    assert_eq!(service.graph_calls.get(), 2);
    assert!(app.session().graph().is_some());
    assert!(app.session().slot(ArtifactKind::Graph).error.is_none());
}

#[test]
fn a_new_scan_invalidates_every_cached_artifact() {
    let service = FakeService::default();
    let mut app = App::new(&service);

    app.submit_scan("https://github.com/octocat/Hello-World").unwrap();
    for kind in ArtifactKind::ALL {
        app.activate(kind);
    }
    assert_eq!(service.tree_calls.get(), 1);
    assert_eq!(service.graph_calls.get(), 1);
    assert_eq!(service.health_calls.get(), 1);
    assert_eq!(service.tour_calls.get(), 1);

    app.submit_scan("https://github.com/octocat/Spoon-Knife").unwrap();
    for kind in ArtifactKind::ALL {
        assert!(app.session().slot(kind).payload.is_none());
        assert!(app.session().slot(kind).error.is_none());
    }

    // The cleared slots fetch again, against the new scan id.
    for kind in ArtifactKind::ALL {
        app.activate(kind);
    }
    assert_eq!(service.tree_calls.get(), 2);
    assert_eq!(service.health_calls.get(), 2);
    assert_eq!(service.last_health_id.borrow().as_deref(), Some("scan-2"));
}

#[test]
fn remote_scan_failure_is_surfaced_with_the_body_detail() {
    let service = FakeService::default();
    service.fail_next_scans.set(1);
    let mut app = App::new(&service);

    let err = app
        .submit_scan("https://example.com/not-a-repo")
        .unwrap_err();
    assert!(matches!(err, Error::Remote { status: 422, .. }));
    assert_eq!(
        app.session().scan_error.as_deref(),
        Some("Unsupported repo URL")
    );
    assert!(app.session().scan().is_none());

    // A later successful scan recovers fully.
    app.submit_scan("https://github.com/octocat/Hello-World").unwrap();
    assert!(app.session().scan_error.is_none());
    assert!(app.session().scan().is_some());
}
