use client_core::{SquareView, SyncSnapshot};
use shared::domain::Color;

const RESET: &str = "\x1b[0m";

pub const CONNECTED_LABEL: &str = "Connected";
pub const DISCONNECTED_LABEL: &str = "No Connection To Server";
pub const SYNCING_LABEL: &str = "Syncing...";

fn ansi_background(color: Color) -> &'static str {
    match color {
        Color::Red => "\x1b[48;5;196m\x1b[30m",
        Color::Green => "\x1b[48;5;46m\x1b[30m",
        Color::Blue => "\x1b[48;5;21m\x1b[97m",
        Color::Yellow => "\x1b[48;5;226m\x1b[30m",
        Color::Purple => "\x1b[48;5;129m\x1b[97m",
        Color::Pink => "\x1b[48;5;213m\x1b[30m",
        Color::Cyan => "\x1b[48;5;51m\x1b[30m",
        Color::Orange => "\x1b[48;5;208m\x1b[30m",
    }
}

/// One status line followed by the grid, columns left to right and each
/// column read top to bottom. Unsynced squares carry a `*`.
pub fn render(snapshot: &SyncSnapshot) -> String {
    let mut out = status_line(snapshot);
    out.push('\n');

    let width = cell_width(snapshot);
    let rows = snapshot.columns.iter().map(Vec::len).max().unwrap_or(0);
    for row in 0..rows {
        for column in &snapshot.columns {
            match column.get(row) {
                Some(view) => out.push_str(&cell(view, width)),
                None => out.push_str(&" ".repeat(width)),
            }
        }
        out.push('\n');
    }
    if rows == 0 {
        out.push_str("(no squares yet)\n");
    }
    out
}

pub fn status_line(snapshot: &SyncSnapshot) -> String {
    let mut parts = vec![if snapshot.connected {
        CONNECTED_LABEL.to_string()
    } else {
        DISCONNECTED_LABEL.to_string()
    }];
    if snapshot.syncing {
        parts.push(SYNCING_LABEL.to_string());
    }
    if snapshot.pending > 0 {
        parts.push(format!("{} unsynced", snapshot.pending));
    }
    parts.push(format!("{} squares", snapshot.square_count()));
    if let Some(at) = snapshot.last_probe_at {
        parts.push(format!("checked {}", at.format("%H:%M:%S UTC")));
    }
    parts.join(" | ")
}

fn cell_width(snapshot: &SyncSnapshot) -> usize {
    let digits = snapshot
        .columns
        .iter()
        .flatten()
        .map(|view| view.square.id.to_string().len())
        .max()
        .unwrap_or(1);
    digits + 3
}

fn cell(view: &SquareView, width: usize) -> String {
    let marker = if view.unsynced { '*' } else { ' ' };
    let label = format!("{:>w$}{marker} ", view.square.id, w = width - 2);
    format!("{}{label}{RESET}", ansi_background(view.square.color))
}

#[cfg(test)]
#[path = "tests/render_tests.rs"]
mod tests;
