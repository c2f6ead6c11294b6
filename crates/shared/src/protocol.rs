use serde::{Deserialize, Serialize};

pub const SQUARE_ROUTE: &str = "/api/square";
pub const SQUARE_RESET_ROUTE: &str = "/api/square/reset";
pub const HEALTH_ROUTE: &str = "/healthz";

pub const RESET_CONFIRMATION: &str = "All squares have been deleted.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetResponse {
    pub message: String,
}

impl ResetResponse {
    pub fn confirmed() -> Self {
        Self {
            message: RESET_CONFIRMATION.to_string(),
        }
    }
}
