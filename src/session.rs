// src/session.rs

use tracing::debug;

use crate::error::Error;
use crate::model::{DependencyGraph, HealthSnapshot, ScanSummary, SizeTreeNode, TourDocument};

/// The four derived views of one scan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Tree,
    Graph,
    Health,
    Tour,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 4] = [
        ArtifactKind::Tree,
        ArtifactKind::Graph,
        ArtifactKind::Health,
        ArtifactKind::Tour,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ArtifactKind::Tree => "tree",
            ArtifactKind::Graph => "graph",
            ArtifactKind::Health => "health",
            ArtifactKind::Tour => "tour",
        }
    }

    fn index(self) -> usize {
        match self {
            ArtifactKind::Tree => 0,
            ArtifactKind::Graph => 1,
            ArtifactKind::Health => 2,
            ArtifactKind::Tour => 3,
        }
    }
}

impl Default for ArtifactKind {
    fn default() -> Self {
        ArtifactKind::Tree
    }
}

#[derive(Debug, Clone)]
pub enum ArtifactPayload {
    Tree(SizeTreeNode),
    Graph(DependencyGraph),
    Health(HealthSnapshot),
    Tour(TourDocument),
}

impl ArtifactPayload {
    pub fn kind(&self) -> ArtifactKind {
        match self {
            ArtifactPayload::Tree(_) => ArtifactKind::Tree,
            ArtifactPayload::Graph(_) => ArtifactKind::Graph,
            ArtifactPayload::Health(_) => ArtifactKind::Health,
            ArtifactPayload::Tour(_) => ArtifactKind::Tour,
        }
    }
}

/// Per-artifact fetch state: loading flag, error text, cached payload
#[derive(Debug, Clone, Default)]
pub struct ArtifactSlot {
    pub loading: bool,
    pub error: Option<String>,
    pub payload: Option<ArtifactPayload>,
}

impl ArtifactSlot {
    fn clear(&mut self) {
        *self = ArtifactSlot::default();
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some() && self.payload.is_none() && !self.loading
    }
}

/// Token carried by an in-flight artifact fetch. Completion events are only
/// committed while the ticket's scan id still matches the session's; a fetch
/// outlived by a newer scan is discarded instead of overwriting fresh state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    pub scan_id: String,
    pub kind: ArtifactKind,
}

/// Single source of truth for one scanning session.
///
/// All mutation goes through the transition methods below; readers treat the
/// stored scan summary and artifact payloads as immutable snapshots.
#[derive(Debug, Default)]
pub struct Session {
    pub scan_loading: bool,
    pub scan_error: Option<String>,
    scan: Option<ScanSummary>,
    active: ArtifactKind,
    slots: [ArtifactSlot; 4],
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scan(&self) -> Option<&ScanSummary> {
        self.scan.as_ref()
    }

    pub fn active(&self) -> ArtifactKind {
        self.active
    }

    pub fn slot(&self, kind: ArtifactKind) -> &ArtifactSlot {
        &self.slots[kind.index()]
    }

    fn slot_mut(&mut self, kind: ArtifactKind) -> &mut ArtifactSlot {
        &mut self.slots[kind.index()]
    }

    pub fn tree(&self) -> Option<&SizeTreeNode> {
        match &self.slot(ArtifactKind::Tree).payload {
            Some(ArtifactPayload::Tree(tree)) => Some(tree),
            _ => None,
        }
    }

    pub fn graph(&self) -> Option<&DependencyGraph> {
        match &self.slot(ArtifactKind::Graph).payload {
            Some(ArtifactPayload::Graph(graph)) => Some(graph),
            _ => None,
        }
    }

    pub fn health(&self) -> Option<&HealthSnapshot> {
        match &self.slot(ArtifactKind::Health).payload {
            Some(ArtifactPayload::Health(health)) => Some(health),
            _ => None,
        }
    }

    pub fn tour(&self) -> Option<&TourDocument> {
        match &self.slot(ArtifactKind::Tour).payload {
            Some(ArtifactPayload::Tour(tour)) => Some(tour),
            _ => None,
        }
    }

    /// Validate the submitted URL and prepare the session for a new scan.
    ///
    /// A blank input fails with `Error::Validation` and leaves everything but
    /// the scan-level error untouched; no request may be issued. A non-blank
    /// input clears every artifact slot and all error state in one step, so
    /// stale views from the previous scan can never show through, and returns
    /// the trimmed URL for the caller to submit.
    pub fn begin_scan(&mut self, repo_url: &str) -> Result<String, Error> {
        let trimmed = repo_url.trim();
        if trimmed.is_empty() {
            let err = Error::Validation("Enter a repository URL".into());
            self.scan_error = Some(err.to_string());
            return Err(err);
        }

        self.scan_loading = true;
        self.scan_error = None;
        for slot in &mut self.slots {
            slot.clear();
        }
        debug!("scan submitted, artifact slots cleared");
        Ok(trimmed.to_string())
    }

    pub fn scan_succeeded(&mut self, summary: ScanSummary) {
        debug!(scan_id = %summary.scan_id, "scan succeeded");
        self.scan = Some(summary);
        self.scan_loading = false;
        self.scan_error = None;
        // Force re-entry into the lazy-load path of the default view.
        self.active = ArtifactKind::Tree;
    }

    /// A failed scan keeps any previously stored summary; only a later
    /// success replaces it.
    pub fn scan_failed(&mut self, message: String) {
        debug!("scan failed: {message}");
        self.scan_loading = false;
        self.scan_error = Some(message);
    }

    /// Activate a view. The switch itself is unconditional; a fetch ticket is
    /// produced only when a scan exists and the slot holds no payload, is not
    /// already loading, and has not failed before. Repeated activation while
    /// a fetch is pending therefore never duplicates requests, and a failure
    /// stays sticky until the scan changes or `retry` is called.
    pub fn select_tab(&mut self, kind: ArtifactKind) -> Option<FetchTicket> {
        self.active = kind;

        let scan_id = self.scan.as_ref()?.scan_id.clone();
        let slot = self.slot_mut(kind);
        if slot.payload.is_some() || slot.loading || slot.error.is_some() {
            return None;
        }
        slot.loading = true;
        debug!(kind = kind.as_str(), %scan_id, "artifact fetch started");
        Some(FetchTicket { scan_id, kind })
    }

    /// Explicit recovery path for a sticky failure, distinct from activation.
    pub fn retry(&mut self, kind: ArtifactKind) -> Option<FetchTicket> {
        let scan_id = self.scan.as_ref()?.scan_id.clone();
        let slot = self.slot_mut(kind);
        if !slot.is_failed() {
            return None;
        }
        slot.error = None;
        slot.loading = true;
        debug!(kind = kind.as_str(), %scan_id, "artifact fetch retried");
        Some(FetchTicket { scan_id, kind })
    }

    /// Commit a successful fetch. Returns false when the ticket belongs to a
    /// superseded scan and the result was discarded.
    pub fn fetch_succeeded(&mut self, ticket: &FetchTicket, payload: ArtifactPayload) -> bool {
        debug_assert_eq!(ticket.kind, payload.kind());
        if !self.ticket_is_current(ticket) {
            debug!(kind = ticket.kind.as_str(), "discarding stale fetch result");
            return false;
        }
        let slot = self.slot_mut(ticket.kind);
        slot.loading = false;
        slot.error = None;
        slot.payload = Some(payload);
        true
    }

    /// Record a failed fetch. Stale tickets are discarded the same way.
    pub fn fetch_failed(&mut self, ticket: &FetchTicket, message: String) -> bool {
        if !self.ticket_is_current(ticket) {
            debug!(kind = ticket.kind.as_str(), "discarding stale fetch failure");
            return false;
        }
        let slot = self.slot_mut(ticket.kind);
        slot.loading = false;
        slot.error = Some(message);
        true
    }

    fn ticket_is_current(&self, ticket: &FetchTicket) -> bool {
        self.scan
            .as_ref()
            .is_some_and(|scan| scan.scan_id == ticket.scan_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ScanLimits;

    fn summary(scan_id: &str) -> ScanSummary {
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

    fn tree_payload() -> ArtifactPayload {
        ArtifactPayload::Tree(SizeTreeNode {
            name: "root".into(),
            loc: None,
            children: Some(vec![]),
        })
    }

    #[test]
    fn blank_submit_is_rejected_without_touching_slots() {
        let mut session = Session::new();
        for input in ["", "   ", "\t\n"] {
            let err = session.begin_scan(input).unwrap_err();
            assert!(matches!(err, Error::Validation(_)));
            assert_eq!(session.scan_error.as_deref(), Some("Enter a repository URL"));
            assert!(!session.scan_loading);
        }
    }

    #[test]
    fn successful_scan_resets_active_tab_to_tree() {
        let mut session = Session::new();
        session.begin_scan("https://github.com/octocat/Hello-World").unwrap();
        assert!(session.scan_loading);

        session.select_tab(ArtifactKind::Tour);
        session.scan_succeeded(summary("abc123"));

        assert_eq!(session.active(), ArtifactKind::Tree);
        assert!(session.scan_error.is_none());
        assert!(!session.scan_loading);
        assert_eq!(session.scan().unwrap().scan_id, "abc123");
    }

    #[test]
    fn select_tab_without_scan_switches_but_never_fetches() {
        let mut session = Session::new();
        assert!(session.select_tab(ArtifactKind::Graph).is_none());
        assert_eq!(session.active(), ArtifactKind::Graph);
    }

    #[test]
    fn repeated_activation_produces_exactly_one_ticket() {
        let mut session = Session::new();
        session.scan_succeeded(summary("abc123"));

        let ticket = session.select_tab(ArtifactKind::Tree);
        assert!(ticket.is_some());
        // Tab is revisited before the fetch resolves: no duplicate request.
        assert!(session.select_tab(ArtifactKind::Health).is_some());
        assert!(session.select_tab(ArtifactKind::Tree).is_none());
        assert!(session.select_tab(ArtifactKind::Tree).is_none());
    }

    #[test]
    fn cached_payload_suppresses_refetch() {
        let mut session = Session::new();
        session.scan_succeeded(summary("abc123"));

        let ticket = session.select_tab(ArtifactKind::Tree).unwrap();
        assert!(session.fetch_succeeded(&ticket, tree_payload()));
        assert!(session.select_tab(ArtifactKind::Tree).is_none());
        assert!(session.tree().is_some());
    }

    #[test]
    fn failure_is_sticky_until_retry() {
        let mut session = Session::new();
        session.scan_succeeded(summary("abc123"));

        let ticket = session.select_tab(ArtifactKind::Graph).unwrap();
        assert!(session.fetch_failed(&ticket, "request failed with status 502".into()));
        assert!(session.slot(ArtifactKind::Graph).is_failed());

        // Re-entering the tab must not re-issue the fetch.
        assert!(session.select_tab(ArtifactKind::Graph).is_none());
        assert!(session.select_tab(ArtifactKind::Tree).is_some());
        assert!(session.select_tab(ArtifactKind::Graph).is_none());

        // The explicit retry transition is the only recovery short of a new scan.
        let retry = session.retry(ArtifactKind::Graph).unwrap();
        assert_eq!(retry.kind, ArtifactKind::Graph);
        assert!(session.slot(ArtifactKind::Graph).loading);
        assert!(session.slot(ArtifactKind::Graph).error.is_none());
    }

    #[test]
    fn retry_is_a_noop_outside_the_failed_state() {
        let mut session = Session::new();
        assert!(session.retry(ArtifactKind::Tree).is_none());

        session.scan_succeeded(summary("abc123"));
        assert!(session.retry(ArtifactKind::Tree).is_none());

        let ticket = session.select_tab(ArtifactKind::Tree).unwrap();
        assert!(session.retry(ArtifactKind::Tree).is_none()); // loading
        session.fetch_succeeded(&ticket, tree_payload());
        assert!(session.retry(ArtifactKind::Tree).is_none()); // cached
    }

    #[test]
    fn new_scan_clears_every_slot_and_error() {
        let mut session = Session::new();
        session.scan_succeeded(summary("abc123"));

        let tree_ticket = session.select_tab(ArtifactKind::Tree).unwrap();
        session.fetch_succeeded(&tree_ticket, tree_payload());
        let graph_ticket = session.select_tab(ArtifactKind::Graph).unwrap();
        session.fetch_failed(&graph_ticket, "boom".into());

        session.begin_scan("https://github.com/octocat/Spoon-Knife").unwrap();
        for kind in ArtifactKind::ALL {
            let slot = session.slot(kind);
            assert!(slot.payload.is_none());
            assert!(slot.error.is_none());
            assert!(!slot.loading);
        }
    }

    #[test]
    fn stale_completion_is_discarded() {
        let mut session = Session::new();
        session.scan_succeeded(summary("abc123"));
        let old_ticket = session.select_tab(ArtifactKind::Tree).unwrap();

        // A new scan supersedes the in-flight fetch.
        session.begin_scan("https://github.com/octocat/Spoon-Knife").unwrap();
        session.scan_succeeded(summary("def456"));

        assert!(!session.fetch_succeeded(&old_ticket, tree_payload()));
        assert!(session.tree().is_none());
        assert!(!session.fetch_failed(&old_ticket, "late failure".into()));
        assert!(session.slot(ArtifactKind::Tree).error.is_none());

        // The new scan's own fetch still goes through.
        let fresh = session.select_tab(ArtifactKind::Tree).unwrap();
        assert!(session.fetch_succeeded(&fresh, tree_payload()));
        assert!(session.tree().is_some());
    }

    #[test]
    fn scan_failure_keeps_previous_summary() {
        let mut session = Session::new();
        session.scan_succeeded(summary("abc123"));
        session.begin_scan("https://github.com/octocat/Spoon-Knife").unwrap();
        session.scan_failed("request failed with status 502".into());

        assert_eq!(session.scan().unwrap().scan_id, "abc123");
        assert_eq!(
            session.scan_error.as_deref(),
            Some("request failed with status 502")
        );
        assert!(!session.scan_loading);
    }
}
