use std::{collections::HashSet, path::PathBuf, process::ExitCode};

use anyhow::Result;
use clap::{Parser, Subcommand};
use shared::{
    domain::{Color, Square, SquareId},
    protocol::RESET_CONFIRMATION,
};
use storage::SquareStore;

#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, default_value = "square.json")]
    data_path: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print stored squares ordered by id.
    List {
        /// Only show squares of this color.
        #[arg(long)]
        color: Option<Color>,
    },
    /// Replace the data file with an empty list.
    Reset,
    /// Exit non-zero if any id is out of range or appears more than once.
    Check,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let store = SquareStore::open(&cli.data_path).await?;

    match cli.command {
        Command::List { color } => {
            let mut squares = store.load_squares().await?;
            squares.retain(|square| color.map_or(true, |wanted| square.color == wanted));
            squares.sort_by_key(|square| square.id);
            for square in &squares {
                println!("{}\t{}", square.id, square.color);
            }
            println!("{} squares in {}", squares.len(), store.path().display());
        }
        Command::Reset => {
            store.reset().await?;
            println!("{RESET_CONFIRMATION}");
        }
        Command::Check => {
            let problems = find_problems(&store.load_squares().await?);
            if !problems.is_empty() {
                for problem in &problems {
                    eprintln!("{problem}");
                }
                return Ok(ExitCode::FAILURE);
            }
            println!("ok");
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn find_problems(squares: &[Square]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut problems = Vec::new();
    for square in squares {
        if !square.id.is_valid() {
            problems.push(format!(
                "square {} is outside {}..={}",
                square.id,
                SquareId::FIRST,
                SquareId::MAX
            ));
        }
        if !seen.insert(square.id) {
            problems.push(format!("square id {} is stored more than once", square.id));
        }
    }
    problems
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_data_has_no_problems() {
        let squares = [
            Square::new(SquareId(2), Color::Red),
            Square::new(SquareId(1), Color::Blue),
        ];
        assert!(find_problems(&squares).is_empty());
    }

    #[test]
    fn reports_duplicates_and_invalid_ids() {
        let squares = [
            Square::new(SquareId(0), Color::Red),
            Square::new(SquareId(3), Color::Blue),
            Square::new(SquareId(3), Color::Green),
        ];
        let problems = find_problems(&squares);
        assert_eq!(problems.len(), 2);
        assert!(problems[0].contains("outside"));
        assert!(problems[1].contains("more than once"));
    }

    #[test]
    fn list_accepts_a_color_filter() {
        let cli = Cli::try_parse_from(["tools", "list", "--color", "Purple"]).expect("parse");
        assert!(matches!(
            cli.command,
            Command::List {
                color: Some(Color::Purple)
            }
        ));

        let err = Cli::try_parse_from(["tools", "list", "--color", "magenta"]).expect_err("reject");
        assert!(err.to_string().contains("unknown color 'magenta'"));
    }

    #[tokio::test]
    async fn reset_leaves_an_empty_list_behind() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SquareStore::open(dir.path().join("square.json"))
            .await
            .expect("store");
        store
            .insert_square(Square::new(SquareId(1), Color::Cyan))
            .await
            .expect("insert");
        store.reset().await.expect("reset");
        assert!(store.load_squares().await.expect("load").is_empty());
    }
}
