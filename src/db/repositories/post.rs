use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};

use crate::domain::Post;
use crate::entities::{posts, prelude::*};

pub struct PostRepository {
    conn: DatabaseConnection,
}

impl PostRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn create(&self, post: &Post) -> Result<Post> {
        let inserted = posts::ActiveModel {
            body: Set(post.body.clone()),
            body_html: Set(post.body_html.clone()),
            timestamp: Set(post.timestamp.clone()),
            author_id: Set(post.author_id),
            ..Default::default()
        }
        .insert(&self.conn)
        .await
        .context("Failed to insert post")?;

        Ok(Post::from(inserted))
    }

    pub async fn get(&self, id: i32) -> Result<Option<Post>> {
        let post = Posts::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query post")?;
        Ok(post.map(Post::from))
    }

    /// Persists `body` and `body_html` as set by `Post::set_body`.
    pub async fn update_body(&self, post: &Post) -> Result<()> {
        posts::ActiveModel {
            id: Set(post.id),
            body: Set(post.body.clone()),
            body_html: Set(post.body_html.clone()),
            ..Default::default()
        }
        .update(&self.conn)
        .await
        .context("Failed to update post")?;
        Ok(())
    }

    /// Newest first.
    pub async fn by_authors(&self, author_ids: &[i32], limit: u64) -> Result<Vec<Post>> {
        if author_ids.is_empty() {
            return Ok(Vec::new());
        }

        let posts = Posts::find()
            .filter(posts::Column::AuthorId.is_in(author_ids.iter().copied()))
            .order_by_desc(posts::Column::Timestamp)
            .order_by_desc(posts::Column::Id)
            .limit(limit)
            .all(&self.conn)
            .await
            .context("Failed to query posts by authors")?;

        Ok(posts.into_iter().map(Post::from).collect())
    }

    /// Newest first, across every author.
    pub async fn recent(&self, limit: u64) -> Result<Vec<Post>> {
        let posts = Posts::find()
            .order_by_desc(posts::Column::Timestamp)
            .order_by_desc(posts::Column::Id)
            .limit(limit)
            .all(&self.conn)
            .await
            .context("Failed to query recent posts")?;

        Ok(posts.into_iter().map(Post::from).collect())
    }

    pub async fn count_by_author(&self, author_id: i32) -> Result<u64> {
        let count = Posts::find()
            .filter(posts::Column::AuthorId.eq(author_id))
            .count(&self.conn)
            .await
            .context("Failed to count posts")?;
        Ok(count)
    }
}
