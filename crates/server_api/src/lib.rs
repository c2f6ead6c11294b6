use shared::{
    domain::{Square, SquareId},
    error::{ApiError, ErrorCode},
    protocol::ResetResponse,
};
use storage::{InsertOutcome, SquareStore};
use tracing::{info, warn};

#[derive(Clone)]
pub struct ApiContext {
    pub store: SquareStore,
}

pub async fn list_squares(ctx: &ApiContext) -> Result<Vec<Square>, ApiError> {
    let squares = ctx.store.load_squares().await.map_err(internal)?;
    info!(count = squares.len(), "retrieved squares from store");
    Ok(squares)
}

pub async fn create_square(ctx: &ApiContext, square: Square) -> Result<Square, ApiError> {
    if !square.id.is_valid() {
        return Err(ApiError::new(
            ErrorCode::Validation,
            format!(
                "square id must be between {} and {}, got {}",
                SquareId::FIRST,
                SquareId::MAX,
                square.id
            ),
        ));
    }

    match ctx.store.insert_square(square).await.map_err(internal)? {
        InsertOutcome::Inserted(stored) => {
            info!(square_id = stored.id.0, color = %stored.color, "square added");
            Ok(stored)
        }
        InsertOutcome::Duplicate(id) => {
            warn!(square_id = id.0, "duplicate square id rejected");
            Err(ApiError::new(
                ErrorCode::Conflict,
                format!("A square with ID {id} already exists."),
            ))
        }
    }
}

pub async fn reset_squares(ctx: &ApiContext) -> Result<ResetResponse, ApiError> {
    ctx.store.reset().await.map_err(internal)?;
    info!("all squares deleted");
    Ok(ResetResponse::confirmed())
}

fn internal(err: anyhow::Error) -> ApiError {
    ApiError::new(ErrorCode::Internal, format!("{err:#}"))
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
