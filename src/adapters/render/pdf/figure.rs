//! Vector rendering of knowledge graphs.
//!
//! Nodes sit on a circle inside the figure area, edges are straight lines
//! with an arrowhead and their type printed at the midpoint.

use std::collections::HashMap;
use std::f32::consts::PI;
use std::fmt::Write as _;

use lopdf::content::Operation;

use crate::domain::document::GraphData;

use super::layout::{fit, op, text_op, text_width, Font};

const NODE_HEIGHT: f32 = 22.0;
const NODE_MAX_WIDTH: f32 = 140.0;
const LABEL_SIZE: f32 = 9.0;
const EDGE_LABEL_SIZE: f32 = 7.5;
const ARROW_SIZE: f32 = 6.0;

/// Rectangle in page space, origin bottom-left.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(super) struct Area {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, Copy)]
struct Placed {
    cx: f32,
    cy: f32,
    half_width: f32,
}

/// Alternate text describing the graph for assistive technology.
pub(super) fn alt_text(graph: &GraphData) -> String {
    let labels: HashMap<&str, &str> = graph
        .nodes
        .iter()
        .map(|n| (n.id.as_str(), n.label.as_str()))
        .collect();
    let mut alt = format!(
        "Knowledge graph {} with {} nodes and {} edges.",
        graph.id,
        graph.nodes.len(),
        graph.edges.len()
    );
    for edge in &graph.edges {
        let source = labels.get(edge.source.as_str()).copied().unwrap_or(&edge.source);
        let target = labels.get(edge.target.as_str()).copied().unwrap_or(&edge.target);
        if edge.edge_type.is_empty() {
            let _ = write!(alt, " {} links to {}.", source, target);
        } else {
            let _ = write!(alt, " {} {} {}.", source, edge.edge_type, target);
        }
    }
    alt
}

/// Content-stream operators drawing `graph` inside `area`.
pub(super) fn draw(graph: &GraphData, area: Area) -> Vec<Operation> {
    let placed = place_nodes(graph, area);
    let mut ops = Vec::new();

    // Edges first so node boxes paint over the line ends.
    ops.push(op("q", &[]));
    ops.push(op("RG", &[0.45, 0.45, 0.5]));
    ops.push(op("rg", &[0.45, 0.45, 0.5]));
    ops.push(op("w", &[0.8]));
    for edge in &graph.edges {
        let (Some(from), Some(to)) = (placed.get(edge.source.as_str()), placed.get(edge.target.as_str())) else {
            continue;
        };
        ops.extend(edge_ops(from, to));
        if !edge.edge_type.is_empty() {
            let label = fit(&edge.edge_type, Font::Oblique, EDGE_LABEL_SIZE, 100.0);
            let width = text_width(&label, Font::Oblique, EDGE_LABEL_SIZE);
            let mx = (from.cx + to.cx) / 2.0 - width / 2.0;
            let my = (from.cy + to.cy) / 2.0 + 3.0;
            ops.extend(text_op(&label, Font::Oblique, EDGE_LABEL_SIZE, mx, my, 0.0));
        }
    }
    ops.push(op("Q", &[]));

    for node in &graph.nodes {
        let Some(p) = placed.get(node.id.as_str()) else {
            continue;
        };
        ops.extend([
            op("q", &[]),
            op("rg", &[0.93, 0.95, 1.0]),
            op("RG", &[0.2, 0.3, 0.6]),
            op("w", &[1.0]),
            op(
                "re",
                &[p.cx - p.half_width, p.cy - NODE_HEIGHT / 2.0, p.half_width * 2.0, NODE_HEIGHT],
            ),
            op("B", &[]),
            op("Q", &[]),
        ]);

        let label = fit(&node.label, Font::Regular, LABEL_SIZE, p.half_width * 2.0 - 8.0);
        let width = text_width(&label, Font::Regular, LABEL_SIZE);
        ops.extend(text_op(
            &label,
            Font::Regular,
            LABEL_SIZE,
            p.cx - width / 2.0,
            p.cy - LABEL_SIZE / 3.0,
            0.0,
        ));
    }
    ops
}

fn place_nodes(graph: &GraphData, area: Area) -> HashMap<&str, Placed> {
    let cx = area.x + area.width / 2.0;
    let cy = area.y + area.height / 2.0;
    let radius = (area.width.min(area.height) / 2.0 - NODE_MAX_WIDTH / 2.0).max(0.0);
    let count = graph.nodes.len();

    graph
        .nodes
        .iter()
        .enumerate()
        .map(|(i, node)| {
            let (x, y) = if count == 1 {
                (cx, cy)
            } else {
                let angle = PI / 2.0 - 2.0 * PI * i as f32 / count as f32;
                (cx + radius * angle.cos(), cy + radius * angle.sin())
            };
            let label_width = text_width(&fit(&node.label, Font::Regular, LABEL_SIZE, NODE_MAX_WIDTH - 8.0), Font::Regular, LABEL_SIZE);
            let half_width = ((label_width + 12.0).min(NODE_MAX_WIDTH)) / 2.0;
            (node.id.as_str(), Placed { cx: x, cy: y, half_width })
        })
        .collect()
}

/// Line from box edge to box edge plus a filled arrowhead at the target.
fn edge_ops(from: &Placed, to: &Placed) -> Vec<Operation> {
    let dx = to.cx - from.cx;
    let dy = to.cy - from.cy;
    let length = (dx * dx + dy * dy).sqrt();
    if length < f32::EPSILON {
        return Vec::new();
    }
    let (ux, uy) = (dx / length, dy / length);
    let start = clip_to_box(from, ux, uy);
    let end = clip_to_box(to, -ux, -uy);

    let end_x = to.cx + end.0;
    let end_y = to.cy + end.1;
    let base_x = end_x - ux * ARROW_SIZE;
    let base_y = end_y - uy * ARROW_SIZE;
    let (px, py) = (-uy * ARROW_SIZE / 2.0, ux * ARROW_SIZE / 2.0);

    vec![
        op("m", &[from.cx + start.0, from.cy + start.1]),
        op("l", &[base_x, base_y]),
        op("S", &[]),
        op("m", &[end_x, end_y]),
        op("l", &[base_x + px, base_y + py]),
        op("l", &[base_x - px, base_y - py]),
        op("h", &[]),
        op("f", &[]),
    ]
}

/// Offset from a box centre to its border along direction (ux, uy).
fn clip_to_box(node: &Placed, ux: f32, uy: f32) -> (f32, f32) {
    let half_height = NODE_HEIGHT / 2.0;
    let tx = if ux.abs() > f32::EPSILON { node.half_width / ux.abs() } else { f32::INFINITY };
    let ty = if uy.abs() > f32::EPSILON { half_height / uy.abs() } else { f32::INFINITY };
    let t = tx.min(ty);
    (ux * t, uy * t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::document::{GraphEdge, GraphNode};

    fn graph() -> GraphData {
        GraphData {
            id: "g1".into(),
            nodes: vec![GraphNode::new("a", "Alpha"), GraphNode::new("b", "Beta")],
            edges: vec![GraphEdge::new("a", "b", "cites"), GraphEdge::new("a", "missing", "x")],
            layout: Default::default(),
        }
    }

    fn area() -> Area {
        Area {
            x: 50.0,
            y: 100.0,
            width: 480.0,
            height: 480.0,
        }
    }

    fn count(ops: &[Operation], operator: &str) -> usize {
        ops.iter().filter(|o| o.operator == operator).count()
    }

    fn shown_text(ops: &[Operation]) -> Vec<String> {
        ops.iter()
            .filter(|o| o.operator == "Tj")
            .filter_map(|o| match o.operands.first() {
                Some(lopdf::Object::String(bytes, _)) => Some(String::from_utf8_lossy(bytes).into_owned()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn draws_a_box_per_node_and_skips_dangling_edges() {
        let ops = draw(&graph(), area());
        assert_eq!(count(&ops, "re"), 2);
        assert_eq!(count(&ops, "S"), 1);
        let text = shown_text(&ops);
        assert!(text.contains(&"cites".to_string()));
        assert!(text.contains(&"Alpha".to_string()));
    }

    #[test]
    fn nodes_stay_inside_area() {
        let g = graph();
        let a = area();
        for p in place_nodes(&g, a).values() {
            assert!(p.cx - p.half_width >= a.x);
            assert!(p.cx + p.half_width <= a.x + a.width);
            assert!(p.cy >= a.y && p.cy <= a.y + a.height);
        }
    }

    #[test]
    fn alt_text_names_relationships() {
        let alt = alt_text(&graph());
        assert!(alt.starts_with("Knowledge graph g1 with 2 nodes and 2 edges."));
        assert!(alt.contains("Alpha cites Beta."));
    }
}
