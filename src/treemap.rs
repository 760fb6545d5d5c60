// src/treemap.rs

use image::{Rgb, RgbImage};
use palette::{FromColor, Lch, Srgb};
use tracing::info;

use crate::error::Error;
use crate::font;
use crate::model::SizeTreeNode;

pub const CANVAS_WIDTH: u32 = 960;
pub const CANVAS_HEIGHT: u32 = 520;

// Tiles smaller than this get no label at all; the font never shrinks.
const MIN_LABEL_WIDTH: f32 = 70.0;
const MIN_LABEL_HEIGHT: f32 = 18.0;
const LABEL_SCALE: u32 = 2;
const LABEL_PAD: i32 = 4;

/// Area multiplier for lockfiles, which are huge but say nothing about the
/// amount of hand-written code. They stay visible as a sliver.
const LOCKFILE_FACTOR: f64 = 0.02;

const LOCKFILE_NAMES: &[&str] = &[
    "package-lock.json",
    "pnpm-lock.yaml",
    "yarn.lock",
    "bun.lockb",
    "cargo.lock",
    "poetry.lock",
    "uv.lock",
    "pipfile.lock",
    "gemfile.lock",
    "composer.lock",
    "go.sum",
];

const BACKGROUND: Rgb<u8> = Rgb([14, 17, 22]);

/// Fallback for directories and files without a known extension.
/// Directories always take this gray, even when their name looks like it has
/// an extension.
const NO_EXT_GRAY: Rgb<u8> = Rgb([0x96, 0x96, 0x96]);

const LABEL_DARK: Rgb<u8> = Rgb([0x11, 0x11, 0x11]);
const LABEL_LIGHT: Rgb<u8> = Rgb([0xf5, 0xf5, 0xf5]);
const LUMA_MIDPOINT: f32 = 128.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Rect {
    pub fn area(&self) -> f32 {
        self.w * self.h
    }
}

#[derive(Debug, Clone)]
pub struct TileLabel {
    pub text: String,
    pub color: Rgb<u8>,
}

/// One laid-out rectangle of the current focus level
#[derive(Debug)]
pub struct Tile<'a> {
    pub node: &'a SizeTreeNode,
    /// Index into the focus node's children; None for the focus itself when
    /// it has nothing to partition (a file, or an empty directory).
    pub child_index: Option<usize>,
    pub rect: Rect,
    pub fill: Rgb<u8>,
    pub label: Option<TileLabel>,
}

/// Layout weight: recursive LOC total, with lockfiles down-weighted so they
/// do not dominate the partition.
pub fn effective_weight(node: &SizeTreeNode) -> f64 {
    let loc = node.total_loc() as f64;
    if !node.is_dir() && is_lockfile(&node.name) {
        loc * LOCKFILE_FACTOR
    } else {
        loc
    }
}

fn is_lockfile(name: &str) -> bool {
    LOCKFILE_NAMES
        .iter()
        .any(|lock| name.eq_ignore_ascii_case(lock))
}

fn extension(name: &str) -> Option<&str> {
    let dot = name.rfind('.')?;
    if dot == 0 || dot + 1 == name.len() {
        return None;
    }
    Some(&name[dot + 1..])
}

fn color_for_extension(ext: &str) -> Option<Rgb<u8>> {
    let rgb = match ext.to_ascii_lowercase().as_str() {
        "ts" | "tsx" => [0x31, 0x78, 0xc6],
        "js" | "jsx" | "mjs" | "cjs" => [0xf1, 0xe0, 0x5a],
        "py" => [0x35, 0x72, 0xa5],
        "rs" => [0xde, 0xa5, 0x84],
        "go" => [0x00, 0xad, 0xd8],
        "java" => [0xb0, 0x72, 0x19],
        "c" | "h" => [0x55, 0x55, 0x55],
        "cpp" | "cc" | "hpp" => [0xf3, 0x4b, 0x7d],
        "cs" => [0x17, 0x86, 0x00],
        "rb" => [0x70, 0x15, 0x16],
        "php" => [0x4f, 0x5d, 0x95],
        "sh" => [0x89, 0xe0, 0x51],
        "html" => [0xe3, 0x4c, 0x26],
        "css" => [0x56, 0x3d, 0x7c],
        "scss" => [0xc6, 0x53, 0x8c],
        "md" => [0x08, 0x3f, 0xa1],
        "yml" | "yaml" => [0xcb, 0x17, 0x1e],
        "toml" => [0x9c, 0x42, 0x21],
        "json" => [0x29, 0x29, 0x29],
        "txt" => [0x77, 0x77, 0x77],
        _ => return None,
    };
    Some(Rgb(rgb))
}

/// Fill color for a tile. Directories never consult the extension table.
pub fn fill_color(node: &SizeTreeNode) -> Rgb<u8> {
    if node.is_dir() {
        return NO_EXT_GRAY;
    }
    extension(&node.name)
        .and_then(color_for_extension)
        .unwrap_or(NO_EXT_GRAY)
}

/// Rec. 601 luma of an sRGB color, 0..255.
pub fn perceived_luma(c: Rgb<u8>) -> f32 {
    0.299 * c.0[0] as f32 + 0.587 * c.0[1] as f32 + 0.114 * c.0[2] as f32
}

/// Near-black on bright fills, near-white on dark ones.
pub fn label_color(fill: Rgb<u8>) -> Rgb<u8> {
    if perceived_luma(fill) < LUMA_MIDPOINT {
        LABEL_LIGHT
    } else {
        LABEL_DARK
    }
}

/// Navigation state layered over the immutable tree snapshot: an index path
/// from the root to the focus node. The breadcrumb stack is the set of path
/// prefixes, so Up pops exactly one level.
#[derive(Debug, Default, Clone)]
pub struct TreemapNav {
    path: Vec<usize>,
}

impl TreemapNav {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn depth(&self) -> usize {
        self.path.len()
    }

    pub fn focus<'t>(&self, root: &'t SizeTreeNode) -> &'t SizeTreeNode {
        let mut node = root;
        for &idx in &self.path {
            match node.children().get(idx) {
                Some(child) => node = child,
                None => break,
            }
        }
        node
    }

    /// Names along the path, root first
    pub fn trail<'t>(&self, root: &'t SizeTreeNode) -> Vec<&'t str> {
        let mut names = vec![root.name.as_str()];
        let mut node = root;
        for &idx in &self.path {
            match node.children().get(idx) {
                Some(child) => {
                    names.push(child.name.as_str());
                    node = child;
                }
                None => break,
            }
        }
        names
    }

    /// Drill into a child of the current focus. Only directories accept the
    /// click; files return false and leave the path alone.
    pub fn drill_down(&mut self, root: &SizeTreeNode, child_index: usize) -> bool {
        let focus = self.focus(root);
        match focus.children().get(child_index) {
            Some(child) if child.is_dir() => {
                self.path.push(child_index);
                true
            }
            _ => false,
        }
    }

    /// Pop one level. No-op (false) when already at the root.
    pub fn up(&mut self) -> bool {
        self.path.pop().is_some()
    }

    /// A new snapshot invalidates the path entirely.
    pub fn reset(&mut self) {
        self.path.clear();
    }

    /// Replay drill-down clicks along a slash-separated directory path.
    pub fn descend_path(&mut self, root: &SizeTreeNode, path: &str) -> Result<(), Error> {
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            let focus = self.focus(root);
            let index = focus
                .children()
                .iter()
                .position(|child| child.name == segment)
                .ok_or_else(|| {
                    Error::Validation(format!("no directory named '{segment}' under '{}'", focus.name))
                })?;
            if !self.drill_down(root, index) {
                return Err(Error::Validation(format!("'{segment}' is not a directory")));
            }
        }
        Ok(())
    }
}

/// Partition the focus node's direct children over the fixed canvas, each
/// child's area proportional to its effective weight. Pure in (focus,
/// canvas, down-weight set); navigation state lives outside.
pub fn layout(focus: &SizeTreeNode) -> Vec<Tile<'_>> {
    let bounds = Rect {
        x: 0.0,
        y: 0.0,
        w: CANVAS_WIDTH as f32,
        h: CANVAS_HEIGHT as f32,
    };

    let children = focus.children();
    if children.is_empty() {
        return vec![make_tile(focus, None, bounds)];
    }

    let mut weights: Vec<f64> = children.iter().map(effective_weight).collect();
    // All-empty directories still render: fall back to equal weights.
    if weights.iter().sum::<f64>() <= 0.0 {
        weights = vec![1.0; children.len()];
    }

    let rects = squarify(&weights, bounds);
    children
        .iter()
        .zip(rects)
        .enumerate()
        .map(|(i, (child, rect))| make_tile(child, Some(i), rect))
        .collect()
}

fn make_tile<'a>(node: &'a SizeTreeNode, child_index: Option<usize>, rect: Rect) -> Tile<'a> {
    let fill = fill_color(node);
    let label = plan_label(node, &rect, fill);
    Tile {
        node,
        child_index,
        rect,
        fill,
        label,
    }
}

fn plan_label(node: &SizeTreeNode, rect: &Rect, fill: Rgb<u8>) -> Option<TileLabel> {
    if rect.w < MIN_LABEL_WIDTH || rect.h < MIN_LABEL_HEIGHT {
        return None;
    }
    let avail = (rect.w as i32 - 2 * LABEL_PAD).max(0) as u32;
    let mut count = node.name.chars().count();
    while count > 0 && font::text_width(count, LABEL_SCALE) > avail {
        count -= 1;
    }
    if count == 0 {
        return None;
    }
    let text: String = node.name.chars().take(count).collect();
    Some(TileLabel {
        text,
        color: label_color(fill),
    })
}

/// Squarified treemap layout (Bruls, Huizing, van Wijk). Rects come back in
/// the children's input order; areas sum to the bounds area.
fn squarify(weights: &[f64], bounds: Rect) -> Vec<Rect> {
    let total: f64 = weights.iter().sum();
    let scale = if total > 0.0 {
        bounds.area() as f64 / total
    } else {
        0.0
    };

    let mut order: Vec<usize> = (0..weights.len()).collect();
    order.sort_by(|&a, &b| weights[b].partial_cmp(&weights[a]).unwrap_or(std::cmp::Ordering::Equal));

    let mut rects = vec![
        Rect {
            x: bounds.x,
            y: bounds.y,
            w: 0.0,
            h: 0.0
        };
        weights.len()
    ];
    let mut remaining = bounds;
    let mut row: Vec<usize> = Vec::new();

    for &idx in &order {
        let side = remaining.w.min(remaining.h) as f64;
        let area = weights[idx] * scale;
        if row.is_empty()
            || worst_ratio(&row, weights, scale, side, Some(area))
                <= worst_ratio(&row, weights, scale, side, None)
        {
            row.push(idx);
        } else {
            place_row(&row, weights, scale, &mut remaining, &mut rects);
            row.clear();
            row.push(idx);
        }
    }
    if !row.is_empty() {
        place_row(&row, weights, scale, &mut remaining, &mut rects);
    }
    rects
}

fn worst_ratio(row: &[usize], weights: &[f64], scale: f64, side: f64, extra: Option<f64>) -> f64 {
    let mut sum = 0.0;
    let mut min = f64::INFINITY;
    let mut max: f64 = 0.0;
    for &idx in row {
        let area = weights[idx] * scale;
        sum += area;
        min = min.min(area);
        max = max.max(area);
    }
    if let Some(area) = extra {
        sum += area;
        min = min.min(area);
        max = max.max(area);
    }
    if sum <= 0.0 || side <= 0.0 || min <= 0.0 {
        return f64::INFINITY;
    }
    let s2 = side * side;
    let sum2 = sum * sum;
    (s2 * max / sum2).max(sum2 / (s2 * min))
}

fn place_row(row: &[usize], weights: &[f64], scale: f64, remaining: &mut Rect, rects: &mut [Rect]) {
    let sum: f64 = row.iter().map(|&idx| weights[idx] * scale).sum();

    if remaining.w >= remaining.h {
        // Vertical strip on the left edge
        let thickness = if remaining.h > 0.0 {
            (sum / remaining.h as f64) as f32
        } else {
            0.0
        };
        let mut y = remaining.y;
        for &idx in row {
            let h = if sum > 0.0 {
                ((weights[idx] * scale / sum) * remaining.h as f64) as f32
            } else {
                0.0
            };
            rects[idx] = Rect {
                x: remaining.x,
                y,
                w: thickness,
                h,
            };
            y += h;
        }
        remaining.x += thickness;
        remaining.w -= thickness;
    } else {
        // Horizontal strip along the top edge
        let thickness = if remaining.w > 0.0 {
            (sum / remaining.w as f64) as f32
        } else {
            0.0
        };
        let mut x = remaining.x;
        for &idx in row {
            let w = if sum > 0.0 {
                ((weights[idx] * scale / sum) * remaining.w as f64) as f32
            } else {
                0.0
            };
            rects[idx] = Rect {
                x,
                y: remaining.y,
                w,
                h: thickness,
            };
            x += w;
        }
        remaining.y += thickness;
        remaining.h -= thickness;
    }
}

/// Rasterize the current focus level to the fixed canvas.
pub fn render(focus: &SizeTreeNode) -> RgbImage {
    let tiles = layout(focus);
    let mut image = RgbImage::from_pixel(CANVAS_WIDTH, CANVAS_HEIGHT, BACKGROUND);

    for tile in &tiles {
        draw_tile(&mut image, tile);
    }
    info!(
        tiles = tiles.len(),
        focus = %focus.name,
        "treemap rendered"
    );
    image
}

fn draw_tile(image: &mut RgbImage, tile: &Tile<'_>) {
    let x0 = tile.rect.x.round().max(0.0) as u32;
    let y0 = tile.rect.y.round().max(0.0) as u32;
    let x1 = ((tile.rect.x + tile.rect.w).round() as u32).min(image.width());
    let y1 = ((tile.rect.y + tile.rect.h).round() as u32).min(image.height());
    if x1 <= x0 || y1 <= y0 {
        return;
    }

    let border = darken(tile.fill, 0.55);
    for y in y0..y1 {
        for x in x0..x1 {
            let on_border = x == x0 || y == y0 || x + 1 == x1 || y + 1 == y1;
            image.put_pixel(x, y, if on_border { border } else { tile.fill });
        }
    }

    if let Some(label) = &tile.label {
        font::draw_text(
            image,
            x0 as i32 + LABEL_PAD,
            y0 as i32 + LABEL_PAD,
            LABEL_SCALE,
            label.color,
            &label.text,
        );
    }
}

fn darken(c: Rgb<u8>, factor: f32) -> Rgb<u8> {
    let srgb = Srgb::new(
        c.0[0] as f32 / 255.0,
        c.0[1] as f32 / 255.0,
        c.0[2] as f32 / 255.0,
    );
    let mut lch = Lch::from_color(srgb);
    lch.l *= factor;
    let out = Srgb::from_color(lch);
    let (r, g, b) = out.into_components();
    Rgb([
        (r.clamp(0.0, 1.0) * 255.0) as u8,
        (g.clamp(0.0, 1.0) * 255.0) as u8,
        (b.clamp(0.0, 1.0) * 255.0) as u8,
    ])
}
