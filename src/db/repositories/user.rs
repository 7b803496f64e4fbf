use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};

use crate::domain::User;
use crate::entities::{follows, prelude::*, users};

/// Fields required to insert a new account.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub role_id: Option<i32>,
    pub confirmed: bool,
}

/// Free-text profile fields. Blank values are stored as NULL.
#[derive(Debug, Clone, Default)]
pub struct ProfileChanges {
    pub name: Option<String>,
    pub location: Option<String>,
    pub about_me: Option<String>,
}

/// Everything an administrator may rewrite on an account.
#[derive(Debug, Clone)]
pub struct AccountChanges {
    pub email: String,
    pub username: String,
    pub confirmed: bool,
    pub role_id: Option<i32>,
    pub profile: ProfileChanges,
}

/// Emails are stored and compared lowercased.
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub struct UserRepository {
    conn: DatabaseConnection,
}

impl UserRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Get user by ID, with its role
    pub async fn get_by_id(&self, id: i32) -> Result<Option<User>> {
        let row = Users::find_by_id(id)
            .find_also_related(Roles)
            .one(&self.conn)
            .await
            .context("Failed to query user by ID")?;

        Ok(row.map(|(user, role)| User::from_model(user, role)))
    }

    pub async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        let row = Users::find()
            .filter(users::Column::Email.eq(normalize_email(email)))
            .find_also_related(Roles)
            .one(&self.conn)
            .await
            .context("Failed to query user by email")?;

        Ok(row.map(|(user, role)| User::from_model(user, role)))
    }

    pub async fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        let row = Users::find()
            .filter(users::Column::Username.eq(username))
            .find_also_related(Roles)
            .one(&self.conn)
            .await
            .context("Failed to query user by username")?;

        Ok(row.map(|(user, role)| User::from_model(user, role)))
    }

    /// Looks the identifier up as an email first, then as a username.
    pub async fn get_by_login(&self, identifier: &str) -> Result<Option<User>> {
        if let Some(user) = self.get_by_email(identifier).await? {
            return Ok(Some(user));
        }
        self.get_by_username(identifier).await
    }

    pub async fn email_exists(&self, email: &str) -> Result<bool> {
        let user = Users::find()
            .filter(users::Column::Email.eq(normalize_email(email)))
            .one(&self.conn)
            .await
            .context("Failed to check email uniqueness")?;
        Ok(user.is_some())
    }

    pub async fn username_exists(&self, username: &str) -> Result<bool> {
        let user = Users::find()
            .filter(users::Column::Username.eq(username))
            .one(&self.conn)
            .await
            .context("Failed to check username uniqueness")?;
        Ok(user.is_some())
    }

    /// Inserts the user and its self-follow edge in one transaction.
    pub async fn create(&self, new_user: NewUser) -> Result<User> {
        let now = chrono::Utc::now().to_rfc3339();
        let txn = self.conn.begin().await?;

        let inserted = users::ActiveModel {
            email: Set(normalize_email(&new_user.email)),
            username: Set(new_user.username),
            password_hash: Set(new_user.password_hash),
            confirmed: Set(new_user.confirmed),
            role_id: Set(new_user.role_id),
            name: Set(None),
            location: Set(None),
            about_me: Set(None),
            member_since: Set(now.clone()),
            last_seen: Set(now.clone()),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .context("Failed to insert user")?;

        follows::ActiveModel {
            follower_id: Set(inserted.id),
            followed_id: Set(inserted.id),
            timestamp: Set(now),
        }
        .insert(&txn)
        .await
        .context("Failed to insert self-follow")?;

        txn.commit().await?;

        self.get_by_id(inserted.id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Failed to retrieve created user"))
    }

    /// Returns whether the flag actually changed.
    pub async fn set_confirmed(&self, id: i32) -> Result<bool> {
        let user = Users::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query user for confirmation")?
            .ok_or_else(|| anyhow::anyhow!("User not found: {id}"))?;

        if user.confirmed {
            return Ok(false);
        }

        let mut active: users::ActiveModel = user.into();
        active.confirmed = Set(true);
        active.update(&self.conn).await?;

        Ok(true)
    }

    pub async fn touch_last_seen(&self, id: i32) -> Result<()> {
        Users::update_many()
            .col_expr(
                users::Column::LastSeen,
                sea_orm::sea_query::Expr::value(chrono::Utc::now().to_rfc3339()),
            )
            .filter(users::Column::Id.eq(id))
            .exec(&self.conn)
            .await
            .context("Failed to update last_seen")?;

        Ok(())
    }

    pub async fn update_password_hash(&self, id: i32, password_hash: String) -> Result<()> {
        let user = Users::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query user for password update")?
            .ok_or_else(|| anyhow::anyhow!("User not found: {id}"))?;

        let mut active: users::ActiveModel = user.into();
        active.password_hash = Set(password_hash);
        active.update(&self.conn).await?;

        Ok(())
    }

    pub async fn update_profile(&self, id: i32, changes: ProfileChanges) -> Result<User> {
        let user = Users::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query user for profile update")?
            .ok_or_else(|| anyhow::anyhow!("User not found: {id}"))?;

        let mut active: users::ActiveModel = user.into();
        active.name = Set(non_blank(changes.name));
        active.location = Set(non_blank(changes.location));
        active.about_me = Set(non_blank(changes.about_me));
        active.update(&self.conn).await?;

        self.get_by_id(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Failed to retrieve updated user"))
    }

    pub async fn update_account(&self, id: i32, changes: AccountChanges) -> Result<User> {
        let user = Users::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query user for account update")?
            .ok_or_else(|| anyhow::anyhow!("User not found: {id}"))?;

        let mut active: users::ActiveModel = user.into();
        active.email = Set(normalize_email(&changes.email));
        active.username = Set(changes.username);
        active.confirmed = Set(changes.confirmed);
        active.role_id = Set(changes.role_id);
        active.name = Set(non_blank(changes.profile.name));
        active.location = Set(non_blank(changes.profile.location));
        active.about_me = Set(non_blank(changes.profile.about_me));
        active
            .update(&self.conn)
            .await
            .context("Failed to update account")?;

        self.get_by_id(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Failed to retrieve updated user"))
    }
}
