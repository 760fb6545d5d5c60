// src/graph.rs

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use image::{Rgb, RgbImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use tracing::{debug, info};

use crate::model::DependencyGraph;

pub const MIN_RADIUS: f32 = 4.0;
pub const MAX_RADIUS: f32 = 16.0;
const RADIUS_SCALE: f32 = 2.0;

pub const MIN_ZOOM: f32 = 0.35;
pub const MAX_ZOOM: f32 = 3.0;
const FOCUS_ZOOM_STEP: f32 = 1.6;

const BACKGROUND: Rgb<u8> = Rgb([11, 13, 18]);
const EDGE_COLOR: Rgb<u8> = Rgb([74, 84, 100]);
const EDGE_HIGHLIGHT: Rgb<u8> = Rgb([214, 220, 229]);
/// How far non-neighborhood elements sink toward the background on hover
const DIM_FACTOR: f32 = 0.82;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    fn length(self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }
}

/// Force simulation parameters. The seed is fixed so a given graph always
/// lays out the same way.
#[derive(Debug, Clone)]
pub struct LayoutParams {
    pub edge_length: f32,
    pub repulsion: f32,
    pub gravity: f32,
    pub iterations: usize,
    pub seed: u64,
}

impl Default for LayoutParams {
    fn default() -> Self {
        Self {
            edge_length: 80.0,
            repulsion: 6000.0,
            gravity: 0.03,
            iterations: 300,
            seed: 42,
        }
    }
}

/// A node's closed neighborhood: itself, its direct neighbors, and every
/// incident edge.
#[derive(Debug, Clone)]
pub struct Neighborhood {
    pub nodes: HashSet<usize>,
    pub edges: HashSet<usize>,
}

/// Positions and topology for one graph snapshot.
///
/// Built once per snapshot and dropped when the snapshot changes; the
/// simulation runs at construction, so positions are immutable afterwards.
pub struct LayoutEngine {
    ids: Vec<String>,
    index: HashMap<String, usize>,
    edges: Vec<(usize, usize)>,
    neighbors: Vec<HashSet<usize>>,
    degrees: Vec<usize>,
    positions: Vec<Vec2>,
    params: LayoutParams,
}

impl LayoutEngine {
    pub fn new(graph: &DependencyGraph, params: LayoutParams) -> Self {
        let ids: Vec<String> = graph.nodes.iter().map(|n| n.id.clone()).collect();
        let index: HashMap<String, usize> = ids
            .iter()
            .enumerate()
            .map(|(i, id)| (id.clone(), i))
            .collect();

        let mut edges = Vec::with_capacity(graph.edges.len());
        let mut dropped = 0usize;
        for edge in &graph.edges {
            match (index.get(&edge.source), index.get(&edge.target)) {
                (Some(&a), Some(&b)) => edges.push((a, b)),
                _ => dropped += 1,
            }
        }
        if dropped > 0 {
            debug!(dropped, "edges referencing unknown nodes were skipped");
        }

        let mut neighbors = vec![HashSet::new(); ids.len()];
        let mut degrees = vec![0usize; ids.len()];
        for &(a, b) in &edges {
            degrees[a] += 1;
            degrees[b] += 1;
            neighbors[a].insert(b);
            neighbors[b].insert(a);
        }

        let mut engine = Self {
            ids,
            index,
            edges,
            neighbors,
            degrees,
            positions: Vec::new(),
            params,
        };
        engine.run_simulation();
        engine
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn id(&self, node: usize) -> &str {
        &self.ids[node]
    }

    pub fn node_index(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn position(&self, node: usize) -> Vec2 {
        self.positions[node]
    }

    pub fn degree(&self, node: usize) -> usize {
        self.degrees[node]
    }

    /// Square-root dampened radius so hub nodes don't swallow the canvas.
    pub fn radius(&self, node: usize) -> f32 {
        (MIN_RADIUS + RADIUS_SCALE * (self.degrees[node] as f32).sqrt()).min(MAX_RADIUS)
    }

    pub fn neighborhood(&self, node: usize) -> Neighborhood {
        let mut nodes: HashSet<usize> = self.neighbors[node].clone();
        nodes.insert(node);
        let edges = self
            .edges
            .iter()
            .enumerate()
            .filter(|(_, &(a, b))| a == node || b == node)
            .map(|(i, _)| i)
            .collect();
        Neighborhood { nodes, edges }
    }

    pub fn edges(&self) -> &[(usize, usize)] {
        &self.edges
    }

    fn bounding_box(&self) -> (Vec2, Vec2) {
        if self.positions.is_empty() {
            return (Vec2::default(), Vec2::default());
        }
        let mut min = Vec2::new(f32::INFINITY, f32::INFINITY);
        let mut max = Vec2::new(f32::NEG_INFINITY, f32::NEG_INFINITY);
        for p in &self.positions {
            min.x = min.x.min(p.x);
            min.y = min.y.min(p.y);
            max.x = max.x.max(p.x);
            max.y = max.y.max(p.y);
        }
        (min, max)
    }

    /// Seeded initial placement followed by a fixed number of
    /// repulsion/spring/gravity steps with a cooling displacement cap.
    /// The repulsion pass reads the previous iteration's positions
    /// immutably, so parallelizing it keeps the layout deterministic.
    fn run_simulation(&mut self) {
        let n = self.ids.len();
        if n == 0 {
            return;
        }

        let mut rng = StdRng::seed_from_u64(self.params.seed);
        self.positions = (0..n)
            .map(|_| Vec2::new(rng.gen_range(-300.0..300.0), rng.gen_range(-300.0..300.0)))
            .collect();
        if n == 1 {
            self.positions[0] = Vec2::default();
            return;
        }

        let spring_k = 0.02f32;
        let initial_temp = 60.0f32;

        for iter in 0..self.params.iterations {
            let cooling = 1.0 - iter as f32 / self.params.iterations as f32;
            let temp = (initial_temp * cooling).max(0.5);

            let positions = &self.positions;
            let repulsion = self.params.repulsion;
            let mut disp: Vec<Vec2> = (0..n)
                .into_par_iter()
                .map(|i| {
                    let mut d = Vec2::default();
                    let pi = positions[i];
                    for (j, &pj) in positions.iter().enumerate() {
                        if i == j {
                            continue;
                        }
                        let dx = pi.x - pj.x;
                        let dy = pi.y - pj.y;
                        let dist_sq = (dx * dx + dy * dy).max(0.01);
                        let force = repulsion / dist_sq;
                        let dist = dist_sq.sqrt();
                        d.x += dx / dist * force;
                        d.y += dy / dist * force;
                    }
                    d
                })
                .collect();

            for &(a, b) in &self.edges {
                let pa = self.positions[a];
                let pb = self.positions[b];
                let dx = pb.x - pa.x;
                let dy = pb.y - pa.y;
                let dist = (dx * dx + dy * dy).sqrt().max(0.1);
                let pull = (dist - self.params.edge_length) * spring_k;
                let ux = dx / dist;
                let uy = dy / dist;
                disp[a].x += ux * pull;
                disp[a].y += uy * pull;
                disp[b].x -= ux * pull;
                disp[b].y -= uy * pull;
            }

            for (i, d) in disp.iter_mut().enumerate() {
                let p = self.positions[i];
                d.x -= p.x * self.params.gravity;
                d.y -= p.y * self.params.gravity;

                let len = d.length();
                let capped = if len > temp { temp / len } else { 1.0 };
                self.positions[i].x += d.x * capped;
                self.positions[i].y += d.y * capped;
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Camera {
    pub center: Vec2,
    pub zoom: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            center: Vec2::default(),
            zoom: 1.0,
        }
    }
}

/// Owns exactly one layout engine per graph snapshot.
///
/// `set_graph` rebuilds (and drops) the engine only when the snapshot
/// reference changes, clearing interaction state with it; dropping the view
/// releases everything. `layout_generation` counts rebuilds.
pub struct GraphView {
    width: u32,
    height: u32,
    graph: Option<Arc<DependencyGraph>>,
    engine: Option<LayoutEngine>,
    camera: Camera,
    hover: Option<usize>,
    generation: u64,
}

impl GraphView {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            graph: None,
            engine: None,
            camera: Camera::default(),
            hover: None,
            generation: 0,
        }
    }

    pub fn layout_generation(&self) -> u64 {
        self.generation
    }

    pub fn engine(&self) -> Option<&LayoutEngine> {
        self.engine.as_ref()
    }

    pub fn camera(&self) -> Camera {
        self.camera
    }

    pub fn hovered(&self) -> Option<usize> {
        self.hover
    }

    /// Install a new snapshot. A second call with the same `Arc` is a no-op;
    /// a different one tears the old engine down and rebuilds from scratch.
    pub fn set_graph(&mut self, graph: Arc<DependencyGraph>) {
        if self
            .graph
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, &graph))
        {
            return;
        }

        let engine = LayoutEngine::new(&graph, LayoutParams::default());
        self.camera = fit_camera(&engine, self.width, self.height);
        self.hover = None;
        self.engine = Some(engine);
        self.graph = Some(graph);
        self.generation += 1;
        info!(generation = self.generation, "graph layout rebuilt");
    }

    /// Hovering highlights the closed neighborhood; `None` (leaving the
    /// node) clears it.
    pub fn hover_node(&mut self, id: Option<&str>) -> bool {
        match id {
            None => {
                self.hover = None;
                true
            }
            Some(id) => match self.engine.as_ref().and_then(|e| e.node_index(id)) {
                Some(node) => {
                    self.hover = Some(node);
                    true
                }
                None => false,
            },
        }
    }

    /// Clicking empty canvas clears any highlight.
    pub fn click_background(&mut self) {
        self.hover = None;
    }

    /// Clicking a node recenters on it and zooms in, clamped.
    pub fn click_node(&mut self, id: &str) -> bool {
        let Some(engine) = self.engine.as_ref() else {
            return false;
        };
        let Some(node) = engine.node_index(id) else {
            return false;
        };
        self.camera.center = engine.position(node);
        self.camera.zoom = (self.camera.zoom * FOCUS_ZOOM_STEP).clamp(MIN_ZOOM, MAX_ZOOM);
        true
    }

    pub fn render(&self) -> RgbImage {
        let mut image = RgbImage::from_pixel(self.width, self.height, BACKGROUND);
        let Some(engine) = self.engine.as_ref() else {
            return image;
        };

        let highlight = self.hover.map(|node| engine.neighborhood(node));

        for (i, &(a, b)) in engine.edges().iter().enumerate() {
            let color = match &highlight {
                Some(hl) if hl.edges.contains(&i) => EDGE_HIGHLIGHT,
                Some(_) => dim(EDGE_COLOR),
                None => EDGE_COLOR,
            };
            let pa = self.to_screen(engine.position(a));
            let pb = self.to_screen(engine.position(b));
            draw_line(&mut image, pa, pb, color);
        }

        for node in 0..engine.len() {
            let base = node_color(engine.id(node));
            let color = match &highlight {
                Some(hl) if hl.nodes.contains(&node) => base,
                Some(_) => dim(base),
                None => base,
            };
            let center = self.to_screen(engine.position(node));
            let radius = engine.radius(node) * self.camera.zoom;
            draw_circle(&mut image, center, radius, color);
        }

        info!(
            nodes = engine.len(),
            edges = engine.edges().len(),
            "dependency graph rendered"
        );
        image
    }

    fn to_screen(&self, p: Vec2) -> (i32, i32) {
        let x = (p.x - self.camera.center.x) * self.camera.zoom + self.width as f32 / 2.0;
        let y = (p.y - self.camera.center.y) * self.camera.zoom + self.height as f32 / 2.0;
        (x.round() as i32, y.round() as i32)
    }
}

/// Center on the layout's bounding box and zoom so it fills most of the
/// canvas, within the allowed zoom range.
fn fit_camera(engine: &LayoutEngine, width: u32, height: u32) -> Camera {
    if engine.is_empty() {
        return Camera::default();
    }
    let (min, max) = engine.bounding_box();
    let center = Vec2::new((min.x + max.x) / 2.0, (min.y + max.y) / 2.0);
    let extent_x = (max.x - min.x).max(1.0);
    let extent_y = (max.y - min.y).max(1.0);
    let zoom = (width as f32 * 0.9 / extent_x)
        .min(height as f32 * 0.9 / extent_y)
        .clamp(MIN_ZOOM, MAX_ZOOM);
    Camera { center, zoom }
}

/// Coarse color groups by file extension; a separate, flatter table than the
/// treemap's.
fn node_color(id: &str) -> Rgb<u8> {
    let name = id.rsplit('/').next().unwrap_or(id);
    let ext = name
        .rfind('.')
        .map(|dot| name[dot + 1..].to_ascii_lowercase())
        .unwrap_or_default();
    let rgb = match ext.as_str() {
        "ts" | "tsx" | "mts" | "cts" => [0x2b, 0x74, 0x89],
        "js" | "jsx" | "mjs" | "cjs" => [0xf7, 0xdf, 0x1e],
        "py" | "pyi" => [0x30, 0x69, 0x98],
        "json" => [0xf5, 0xa6, 0x23],
        "md" | "mdx" => [0x6a, 0x73, 0x7d],
        "css" | "scss" | "sass" | "less" => [0x7e, 0x57, 0xc2],
        _ => [0x9a, 0xa5, 0xb1],
    };
    Rgb(rgb)
}

fn dim(c: Rgb<u8>) -> Rgb<u8> {
    let t = DIM_FACTOR;
    let mix = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * t) as u8;
    Rgb([
        mix(c.0[0], BACKGROUND.0[0]),
        mix(c.0[1], BACKGROUND.0[1]),
        mix(c.0[2], BACKGROUND.0[2]),
    ])
}

fn draw_line(image: &mut RgbImage, from: (i32, i32), to: (i32, i32), color: Rgb<u8>) {
    let (mut x0, mut y0) = from;
    let (x1, y1) = to;
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        put_pixel_checked(image, x0, y0, color);
        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

fn draw_circle(image: &mut RgbImage, center: (i32, i32), radius: f32, color: Rgb<u8>) {
    let r = radius.max(1.0);
    let outline = dim_towards_black(color);
    let ri = r.ceil() as i32;
    for dy in -ri..=ri {
        for dx in -ri..=ri {
            let dist = ((dx * dx + dy * dy) as f32).sqrt();
            if dist > r {
                continue;
            }
            let c = if dist > r - 1.5 { outline } else { color };
            put_pixel_checked(image, center.0 + dx, center.1 + dy, c);
        }
    }
}

fn dim_towards_black(c: Rgb<u8>) -> Rgb<u8> {
    Rgb([c.0[0] / 2, c.0[1] / 2, c.0[2] / 2])
}

fn put_pixel_checked(image: &mut RgbImage, x: i32, y: i32, color: Rgb<u8>) {
    if x >= 0 && y >= 0 && (x as u32) < image.width() && (y as u32) < image.height() {
        image.put_pixel(x as u32, y as u32, color);
    }
}
