use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QuerySelect, Set,
};

use crate::entities::{follows, prelude::*};

pub struct FollowRepository {
    conn: DatabaseConnection,
}

impl FollowRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn is_following(&self, follower_id: i32, followed_id: i32) -> Result<bool> {
        let edge = Follows::find_by_id((follower_id, followed_id))
            .one(&self.conn)
            .await
            .context("Failed to query follow edge")?;
        Ok(edge.is_some())
    }

    /// No-op when the edge already exists. Returns whether a new edge was added.
    pub async fn follow(&self, follower_id: i32, followed_id: i32) -> Result<bool> {
        if self.is_following(follower_id, followed_id).await? {
            return Ok(false);
        }

        follows::ActiveModel {
            follower_id: Set(follower_id),
            followed_id: Set(followed_id),
            timestamp: Set(chrono::Utc::now().to_rfc3339()),
        }
        .insert(&self.conn)
        .await
        .context("Failed to insert follow edge")?;

        Ok(true)
    }

    pub async fn unfollow(&self, follower_id: i32, followed_id: i32) -> Result<bool> {
        let result = Follows::delete_by_id((follower_id, followed_id))
            .exec(&self.conn)
            .await
            .context("Failed to delete follow edge")?;
        Ok(result.rows_affected > 0)
    }

    /// Ids of everyone `follower_id` follows, including itself.
    pub async fn followed_ids(&self, follower_id: i32) -> Result<Vec<i32>> {
        let ids = Follows::find()
            .select_only()
            .column(follows::Column::FollowedId)
            .filter(follows::Column::FollowerId.eq(follower_id))
            .into_tuple::<i32>()
            .all(&self.conn)
            .await
            .context("Failed to list followed users")?;
        Ok(ids)
    }

    pub async fn follower_count(&self, followed_id: i32) -> Result<u64> {
        let count = Follows::find()
            .filter(follows::Column::FollowedId.eq(followed_id))
            .count(&self.conn)
            .await
            .context("Failed to count followers")?;
        Ok(count)
    }
}
