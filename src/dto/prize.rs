use serde::Serialize;
use utoipa::ToSchema;

use crate::dao::models::PrizeEntity;

/// One prize and its remaining stock.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PrizeSummary {
    /// Prize id.
    pub id: u32,
    /// Display name.
    pub name: String,
    /// Remaining count.
    pub stock: u32,
}

impl From<&PrizeEntity> for PrizeSummary {
    fn from(prize: &PrizeEntity) -> Self {
        Self {
            id: prize.id,
            name: prize.name.clone(),
            stock: prize.stock,
        }
    }
}

/// The prize pool.
#[derive(Debug, Serialize, ToSchema)]
pub struct PrizeListResponse {
    /// Every prize, out-of-stock ones included.
    pub prizes: Vec<PrizeSummary>,
    /// Sum of every remaining stock.
    pub remaining: u64,
}

/// The prize handed out by a draw, with its stock after the decrement.
#[derive(Debug, Serialize, ToSchema)]
pub struct DrawResponse {
    /// Prize won.
    pub prize: PrizeSummary,
}
