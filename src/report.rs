// src/report.rs

use chrono::{DateTime, TimeZone, Utc};

use crate::model::{HealthSnapshot, ScanSummary, TourDocument};

/// Placeholder shown for any null metadata field
const DASH: &str = "—";

pub fn render_summary(summary: &ScanSummary) -> String {
    let created = Utc
        .timestamp_opt(summary.created_at, 0)
        .single()
        .map(|t| t.to_rfc2822())
        .unwrap_or_else(|| summary.created_at.to_string());

    let mut out = String::new();
    out.push_str(&format!("Scan {}\n", summary.scan_id));
    out.push_str(&format!("  repository:    {}/{}\n", summary.owner, summary.repo));
    out.push_str(&format!("  url:           {}\n", summary.repo_url));
    out.push_str(&format!("  created:       {created}\n"));
    out.push_str(&format!("  files scanned: {}\n", summary.files_scanned));
    out.push_str(&format!("  total LOC:     {}\n", summary.total_loc));
    out.push_str(&format!(
        "  limits:        {} MB, {} files\n",
        summary.limits.max_bytes / (1024 * 1024),
        summary.limits.max_files
    ));
    if let Some(status) = &summary.status {
        out.push_str(&format!("  status:        {status}\n"));
    }
    out
}

pub fn render_health(health: &HealthSnapshot) -> String {
    let mut out = String::new();
    out.push_str(&format!("# {}\n\n", health.full_name));
    out.push_str(&format!("{}\n\n", health.url));
    out.push_str(&format!(
        "{}\n\n",
        health.description.as_deref().unwrap_or(DASH)
    ));
    out.push_str(&format!("- Stars: {}\n", health.stars));
    out.push_str(&format!("- Forks: {}\n", health.forks));
    out.push_str(&format!("- Open issues: {}\n", health.open_issues));
    out.push_str(&format!(
        "- License: {}\n",
        health.license.as_deref().unwrap_or(DASH)
    ));
    out.push_str(&format!(
        "- Last push: {}\n",
        health
            .pushed_at
            .as_deref()
            .map(humanize_timestamp)
            .unwrap_or_else(|| DASH.to_string())
    ));
    out.push_str(&format!(
        "- Default branch: {}\n",
        health.default_branch.as_deref().unwrap_or(DASH)
    ));
    out
}

pub fn render_tour(tour: &TourDocument) -> String {
    let header = &tour.header;
    let mut out = String::new();
    out.push_str(&format!("# Tour of {}/{}\n\n", header.owner, header.repo));
    out.push_str(&format!("{}\n\n", header.repo_url));
    out.push_str(&format!(
        "{} files scanned, {} lines of code.\n",
        header.files_scanned, header.total_loc
    ));

    for section in &tour.sections {
        out.push_str(&format!("\n## {}\n\n", section.title));
        // Bullets arrive with their own inline markup; pass them through.
        for bullet in &section.bullets {
            out.push_str(&format!("- {bullet}\n"));
        }
    }

    if let Some(note) = &tour.note {
        out.push_str(&format!("\n*{note}*\n"));
    }
    out
}

/// Render an RFC 3339 timestamp as a friendlier UTC date; anything that
/// fails to parse is shown verbatim.
fn humanize_timestamp(raw: &str) -> String {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(t) => t.with_timezone(&Utc).format("%Y-%m-%d %H:%M UTC").to_string(),
        Err(_) => raw.to_string(),
    }
}
