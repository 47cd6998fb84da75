use serde::{Deserialize, Serialize};

/// Body of `POST /post/{id}/like/`.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct LikeResponse {
    pub likes_count: i64,
    pub liked: bool,
}
