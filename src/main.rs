// src/main.rs

use std::fs;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use codelens::app::{self, App};
use codelens::cli::Args;
use codelens::client::ApiClient;
use codelens::graph::GraphView;
use codelens::report;
use codelens::session::ArtifactKind;
use codelens::treemap::{self, TreemapNav};

fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = Args::parse();

    let client = ApiClient::new(args.resolve_api_base());
    let mut app = App::new(&client);

    app.submit_scan(&args.repo_url)?;
    let summary = app
        .session()
        .scan()
        .context("scan succeeded but no summary was stored")?;
    print!("{}", report::render_summary(summary));

    fs::create_dir_all(&args.output)
        .with_context(|| format!("creating output directory {}", args.output.display()))?;

    // Activating a view is what triggers its lazy fetch; artifacts the user
    // did not ask for are never requested.
    for kind in args.view_kinds() {
        app.activate(kind);
    }
    if args.retry_failed {
        app.retry_failed();
    }

    // Render whatever arrived. One artifact's failure never blocks the rest.
    for kind in args.view_kinds() {
        let slot = app.session().slot(kind);
        if let Some(error) = &slot.error {
            eprintln!("{}: {}", kind.as_str(), error);
            continue;
        }
        match kind {
            ArtifactKind::Tree => render_tree_view(&app, &args)?,
            ArtifactKind::Graph => render_graph_view(&app, &args)?,
            ArtifactKind::Health => {
                if let Some(health) = app.session().health() {
                    let path = args.output.join("health.md");
                    fs::write(&path, report::render_health(health))?;
                    println!("wrote {}", path.display());
                }
            }
            ArtifactKind::Tour => {
                if let Some(tour) = app.session().tour() {
                    let path = args.output.join("tour.md");
                    fs::write(&path, report::render_tour(tour))?;
                    println!("wrote {}", path.display());
                }
            }
        }
    }

    if args.save_artifacts {
        for path in app::save_artifacts(app.session(), &args.output)? {
            println!("wrote {}", path.display());
        }
    }
    Ok(())
}

fn render_tree_view(app: &App<'_>, args: &Args) -> anyhow::Result<()> {
    let Some(tree) = app.session().tree() else {
        return Ok(());
    };
    let mut nav = TreemapNav::new();
    if let Some(focus) = &args.focus {
        if let Err(err) = nav.descend_path(tree, focus) {
            warn!("treemap focus ignored: {err}");
            nav.reset();
        }
    }
    if nav.depth() > 0 {
        println!("treemap focus: {}", nav.trail(tree).join(" / "));
    }

    let image = treemap::render(nav.focus(tree));
    let path = args.output.join("treemap.png");
    image.save(&path)?;
    println!("wrote {}", path.display());
    Ok(())
}

fn render_graph_view(app: &App<'_>, args: &Args) -> anyhow::Result<()> {
    let Some(graph) = app.session().graph() else {
        return Ok(());
    };
    if let Some(note) = &graph.note {
        println!("graph note: {note}");
    }

    let mut view = GraphView::new(args.width, args.height);
    view.set_graph(Arc::new(graph.clone()));
    if let Some(target) = &args.highlight {
        if !view.hover_node(Some(target)) {
            warn!("highlight target not in graph: {target}");
        }
    }

    let image = view.render();
    let path = args.output.join("graph.png");
    image.save(&path)?;
    println!("wrote {}", path.display());
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
