use super::*;
use client_core::SquareView;
use shared::domain::{Square, SquareId};

fn view(id: i64, color: Color, unsynced: bool) -> SquareView {
    SquareView {
        square: Square::new(SquareId(id), color),
        unsynced,
    }
}

fn snapshot(columns: Vec<Vec<SquareView>>, connected: bool, pending: usize) -> SyncSnapshot {
    SyncSnapshot {
        columns,
        connected,
        syncing: false,
        pending,
        next_id: SquareId(5),
        last_probe_at: None,
    }
}

fn strip_ansi(raw: &str) -> String {
    let mut out = String::new();
    let mut chars = raw.chars();
    while let Some(ch) = chars.next() {
        if ch == '\x1b' {
            for skipped in chars.by_ref() {
                if skipped == 'm' {
                    break;
                }
            }
        } else {
            out.push(ch);
        }
    }
    out
}

#[test]
fn renders_columns_top_to_bottom() {
    let grid = snapshot(
        vec![
            vec![view(1, Color::Red, false), view(4, Color::Blue, false)],
            vec![view(2, Color::Green, false), view(3, Color::Cyan, false)],
        ],
        true,
        0,
    );
    let text = strip_ansi(&render(&grid));
    let lines: Vec<&str> = text.lines().collect();

    assert_eq!(lines[0], "Connected | 4 squares");
    assert_eq!(lines[1], " 1   2  ");
    assert_eq!(lines[2], " 4   3  ");
}

#[test]
fn marks_unsynced_squares_and_offline_state() {
    let grid = snapshot(
        vec![vec![view(1, Color::Red, false)], vec![view(2, Color::Pink, true)]],
        false,
        1,
    );
    let text = strip_ansi(&render(&grid));

    assert!(text.starts_with("No Connection To Server | 1 unsynced | 2 squares"));
    assert!(text.contains("2* "));
    assert!(!text.contains("1*"));
}

#[test]
fn shows_syncing_indicator() {
    let mut grid = snapshot(Vec::new(), true, 0);
    grid.syncing = true;
    let text = render(&grid);
    assert!(status_line(&grid).contains(SYNCING_LABEL));
    assert!(text.contains("(no squares yet)"));
}
