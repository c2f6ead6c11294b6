use anyhow::{Context, Result};
use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::{fs, sync::Mutex};
use tracing::debug;

use shared::domain::{Square, SquareId};

/// Square records kept in a single JSON document.
///
/// Every read loads the whole file and every mutation rewrites it. A missing
/// file reads as an empty list. Mutations made through one `SquareStore` (and
/// its clones) are serialized; other writers to the same file are not.
#[derive(Clone)]
pub struct SquareStore {
    path: Arc<PathBuf>,
    write_lock: Arc<Mutex<()>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted(Square),
    Duplicate(SquareId),
}

impl SquareStore {
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        ensure_parent_dir_exists(&path).await?;
        Ok(Self {
            path: Arc::new(path),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn health_check(&self) -> Result<()> {
        self.load_squares()
            .await
            .map(|_| ())
            .context("square store is not readable")
    }

    pub async fn load_squares(&self) -> Result<Vec<Square>> {
        let raw = match fs::read_to_string(self.path.as_path()).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                return Err(err).with_context(|| {
                    format!("failed to read square store '{}'", self.path.display())
                })
            }
        };
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&raw)
            .with_context(|| format!("malformed square store '{}'", self.path.display()))
    }

    pub async fn insert_square(&self, square: Square) -> Result<InsertOutcome> {
        let _guard = self.write_lock.lock().await;
        let mut squares = self.load_squares().await?;
        if squares.iter().any(|existing| existing.id == square.id) {
            return Ok(InsertOutcome::Duplicate(square.id));
        }
        squares.push(square);
        self.save_squares(&squares).await?;
        Ok(InsertOutcome::Inserted(square))
    }

    pub async fn reset(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.save_squares(&[]).await
    }

    async fn save_squares(&self, squares: &[Square]) -> Result<()> {
        let json = serde_json::to_string_pretty(squares).context("failed to encode squares")?;
        fs::write(self.path.as_path(), json)
            .await
            .with_context(|| format!("failed to write square store '{}'", self.path.display()))?;
        debug!(path = %self.path.display(), count = squares.len(), "square store saved");
        Ok(())
    }
}

async fn ensure_parent_dir_exists(path: &Path) -> Result<()> {
    let Some(parent) = path.parent() else {
        return Ok(());
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }
    fs::create_dir_all(parent).await.with_context(|| {
        format!(
            "failed to create parent directory '{}' for square store",
            parent.display()
        )
    })
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
