use crate::domain::{Permission, Post, ROLE_SEEDS, User};
use crate::entities::roles;
use anyhow::Result;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use std::path::Path;
use std::time::Duration;
use tracing::info;

pub mod migrator;
pub mod repositories;

pub use repositories::user::{AccountChanges, NewUser, ProfileChanges};

#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
}

impl Store {
    pub async fn new(db_url: &str) -> Result<Self> {
        Self::with_pool_options(db_url, 5, 1).await
    }

    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        if !db_url.contains(":memory:") {
            let path_str = db_url.trim_start_matches("sqlite:");
            let path_str = path_str.split('?').next().unwrap_or(path_str);
            if let Some(parent) = Path::new(path_str).parent() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
        }

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(300))
            .max_lifetime(Duration::from_secs(600))
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self { conn })
    }

    fn user_repo(&self) -> repositories::user::UserRepository {
        repositories::user::UserRepository::new(self.conn.clone())
    }

    fn role_repo(&self) -> repositories::role::RoleRepository {
        repositories::role::RoleRepository::new(self.conn.clone())
    }

    fn follow_repo(&self) -> repositories::follow::FollowRepository {
        repositories::follow::FollowRepository::new(self.conn.clone())
    }

    fn post_repo(&self) -> repositories::post::PostRepository {
        repositories::post::PostRepository::new(self.conn.clone())
    }

    // ========== Roles ==========

    /// Seeds the fixed role table. Safe to run on every start.
    pub async fn insert_roles(&self) -> Result<()> {
        self.role_repo().insert_roles(&ROLE_SEEDS).await
    }

    pub async fn list_roles(&self) -> Result<Vec<roles::Model>> {
        self.role_repo().list().await
    }

    pub async fn get_role_by_name(&self, name: &str) -> Result<Option<roles::Model>> {
        self.role_repo().get_by_name(name).await
    }

    pub async fn get_default_role(&self) -> Result<Option<roles::Model>> {
        self.role_repo().get_default().await
    }

    pub async fn get_role_by_permissions(
        &self,
        permissions: Permission,
    ) -> Result<Option<roles::Model>> {
        self.role_repo().get_by_permissions(permissions).await
    }

    // ========== Users ==========

    pub async fn get_user(&self, id: i32) -> Result<Option<User>> {
        self.user_repo().get_by_id(id).await
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.user_repo().get_by_email(email).await
    }

    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        self.user_repo().get_by_username(username).await
    }

    pub async fn get_user_by_login(&self, identifier: &str) -> Result<Option<User>> {
        self.user_repo().get_by_login(identifier).await
    }

    pub async fn email_exists(&self, email: &str) -> Result<bool> {
        self.user_repo().email_exists(email).await
    }

    pub async fn username_exists(&self, username: &str) -> Result<bool> {
        self.user_repo().username_exists(username).await
    }

    pub async fn create_user(&self, new_user: NewUser) -> Result<User> {
        self.user_repo().create(new_user).await
    }

    pub async fn confirm_user(&self, id: i32) -> Result<bool> {
        self.user_repo().set_confirmed(id).await
    }

    pub async fn touch_last_seen(&self, id: i32) -> Result<()> {
        self.user_repo().touch_last_seen(id).await
    }

    pub async fn update_password_hash(&self, id: i32, password_hash: String) -> Result<()> {
        self.user_repo().update_password_hash(id, password_hash).await
    }

    pub async fn update_profile(&self, id: i32, changes: ProfileChanges) -> Result<User> {
        self.user_repo().update_profile(id, changes).await
    }

    pub async fn update_account(&self, id: i32, changes: AccountChanges) -> Result<User> {
        self.user_repo().update_account(id, changes).await
    }

    // ========== Follows ==========

    pub async fn follow(&self, follower_id: i32, followed_id: i32) -> Result<bool> {
        self.follow_repo().follow(follower_id, followed_id).await
    }

    pub async fn unfollow(&self, follower_id: i32, followed_id: i32) -> Result<bool> {
        self.follow_repo().unfollow(follower_id, followed_id).await
    }

    pub async fn is_following(&self, follower_id: i32, followed_id: i32) -> Result<bool> {
        self.follow_repo()
            .is_following(follower_id, followed_id)
            .await
    }

    pub async fn follower_count(&self, followed_id: i32) -> Result<u64> {
        self.follow_repo().follower_count(followed_id).await
    }

    // ========== Posts ==========

    pub async fn create_post(&self, post: &Post) -> Result<Post> {
        self.post_repo().create(post).await
    }

    pub async fn get_post(&self, id: i32) -> Result<Option<Post>> {
        self.post_repo().get(id).await
    }

    pub async fn update_post_body(&self, post: &Post) -> Result<()> {
        self.post_repo().update_body(post).await
    }

    pub async fn recent_posts(&self, limit: u64) -> Result<Vec<Post>> {
        self.post_repo().recent(limit).await
    }

    pub async fn count_posts_by_author(&self, author_id: i32) -> Result<u64> {
        self.post_repo().count_by_author(author_id).await
    }

    pub async fn posts_by_author(&self, author_id: i32, limit: u64) -> Result<Vec<Post>> {
        self.post_repo().by_authors(&[author_id], limit).await
    }

    /// Posts written by anyone `user_id` follows, newest first.
    pub async fn followed_posts(&self, user_id: i32, limit: u64) -> Result<Vec<Post>> {
        let authors = self.follow_repo().followed_ids(user_id).await?;
        self.post_repo().by_authors(&authors, limit).await
    }
}
