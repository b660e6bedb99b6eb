//! Renders a composed program as the learner-facing preview listing.

use std::fmt::Write;

use crate::block::{Block, BlockBody};

/// Produces the preview text shown beside the workspace, one statement
/// per block, nested bodies indented two spaces per depth.
pub fn render_program(blocks: &[Block]) -> String {
    let mut out = String::new();
    render_into(&mut out, blocks, 0);
    out
}

fn render_into(out: &mut String, blocks: &[Block], depth: usize) {
    let pad = "  ".repeat(depth);
    for block in blocks {
        match block.body() {
            BlockBody::Move { distance } => {
                let _ = writeln!(out, "{pad}moveForward({distance});");
            }
            BlockBody::Turn { direction } => {
                let _ = writeln!(out, "{pad}turn{direction}();");
            }
            BlockBody::Repeat { count, children } => {
                let _ = writeln!(out, "{pad}repeat({count}, function() {{");
                render_into(out, children, depth + 1);
                let _ = writeln!(out, "{pad}}});");
            }
            BlockBody::Conditional {
                condition,
                children,
            } => {
                let _ = writeln!(out, "{pad}if ({condition}) {{");
                render_into(out, children, depth + 1);
                let _ = writeln!(out, "{pad}}}");
            }
            BlockBody::Unknown { kind } => {
                let _ = writeln!(out, "{pad}// unknown block: {kind}");
            }
        }
    }
}
