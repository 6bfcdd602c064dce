//! SVG export of the settled state of a frame.

use crate::frame::RenderFrame;
use crate::state::{Expansion, Point};
use std::fmt::Write as _;
use std::path::Path;
use subjecttree_core::Result;
use tracing::info;

const MARGIN: f64 = 40.0;
const LABEL_ROOM: f64 = 220.0;
const NODE_RADIUS: f64 = 5.0;

/// Draw the nodes and links that remain once `frame` finishes animating.
pub fn render_svg(frame: &RenderFrame) -> String {
    let points: Vec<Point> = frame.settled_nodes().map(|n| n.to).collect();
    let min_x = points.iter().map(|p| p.x).fold(f64::INFINITY, f64::min);
    let min_y = points.iter().map(|p| p.y).fold(f64::INFINITY, f64::min);
    let max_x = points.iter().map(|p| p.x).fold(f64::NEG_INFINITY, f64::max);
    let max_y = points.iter().map(|p| p.y).fold(f64::NEG_INFINITY, f64::max);
    let (min_x, min_y, max_x, max_y) = if points.is_empty() {
        (0.0, 0.0, 0.0, 0.0)
    } else {
        (min_x, min_y, max_x, max_y)
    };

    let width = max_x - min_x + 2.0 * MARGIN + LABEL_ROOM;
    let height = max_y - min_y + 2.0 * MARGIN;
    let shift = |p: Point| Point::new(p.x - min_x + MARGIN, p.y - min_y + MARGIN);

    let mut svg = String::new();
    let _ = writeln!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w:.0}" height="{h:.0}" viewBox="0 0 {w:.0} {h:.0}" font-family="sans-serif" font-size="12">"#,
        w = width,
        h = height
    );
    svg.push_str("  <g class=\"links\" fill=\"none\" stroke=\"#999\" stroke-width=\"1.5\">\n");
    for link in frame.settled_links() {
        let s = shift(link.to.source);
        let t = shift(link.to.target);
        let mid = (s.x + t.x) / 2.0;
        let _ = writeln!(
            svg,
            r#"    <path d="M{:.1},{:.1} C{:.1},{:.1} {:.1},{:.1} {:.1},{:.1}"/>"#,
            s.x, s.y, mid, s.y, mid, t.y, t.x, t.y
        );
    }
    svg.push_str("  </g>\n  <g class=\"nodes\">\n");
    for node in frame.settled_nodes() {
        let p = shift(node.to);
        let fill = if node.has_children && node.expansion == Expansion::Collapsed {
            "#b0c4de"
        } else {
            "#fff"
        };
        let class = if node.pending { "node pending" } else { "node" };
        let _ = writeln!(svg, r#"    <g class="{}" transform="translate({:.1},{:.1})">"#, class, p.x, p.y);
        if let Some(description) = &node.description {
            let _ = writeln!(svg, "      <title>{}</title>", escape(description));
        }
        let _ = writeln!(
            svg,
            "      <circle r=\"{}\" fill=\"{}\" stroke=\"#4682b4\" stroke-width=\"1.5\"/>",
            NODE_RADIUS, fill
        );
        let label = if node.pending {
            format!("{} …", node.name)
        } else {
            node.name.clone()
        };
        let _ = writeln!(
            svg,
            r#"      <text x="10" dy="0.35em">{}</text>"#,
            escape(&label)
        );
        svg.push_str("    </g>\n");
    }
    svg.push_str("  </g>\n</svg>\n");
    svg
}

/// Write `render_svg(frame)` to `path`, creating parent directories.
pub fn write_svg(frame: &RenderFrame, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, render_svg(frame))?;
    info!("Wrote diagram to {}", path.display());
    Ok(())
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}
