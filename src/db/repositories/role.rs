use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};

use crate::domain::{Permission, RoleSeed};
use crate::entities::{prelude::*, roles};

pub struct RoleRepository {
    conn: DatabaseConnection,
}

impl RoleRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Creates missing roles and overwrites the bits and default flag of
    /// existing ones, so re-running after a table change updates in place.
    pub async fn insert_roles(&self, seeds: &[RoleSeed]) -> Result<()> {
        let txn = self.conn.begin().await?;

        for seed in seeds {
            let existing = Roles::find()
                .filter(roles::Column::Name.eq(seed.name))
                .one(&txn)
                .await
                .with_context(|| format!("Failed to look up role {}", seed.name))?;

            match existing {
                Some(role) => {
                    let mut active: roles::ActiveModel = role.into();
                    active.permissions = Set(seed.permissions.bits());
                    active.is_default = Set(seed.is_default);
                    active.update(&txn).await?;
                }
                None => {
                    roles::ActiveModel {
                        name: Set(seed.name.to_string()),
                        permissions: Set(seed.permissions.bits()),
                        is_default: Set(seed.is_default),
                        ..Default::default()
                    }
                    .insert(&txn)
                    .await?;
                }
            }
        }

        txn.commit().await?;
        Ok(())
    }

    pub async fn list(&self) -> Result<Vec<roles::Model>> {
        let roles = Roles::find()
            .order_by_asc(roles::Column::Id)
            .all(&self.conn)
            .await
            .context("Failed to list roles")?;
        Ok(roles)
    }

    pub async fn get_by_name(&self, name: &str) -> Result<Option<roles::Model>> {
        let role = Roles::find()
            .filter(roles::Column::Name.eq(name))
            .one(&self.conn)
            .await
            .context("Failed to query role by name")?;
        Ok(role)
    }

    pub async fn get_default(&self) -> Result<Option<roles::Model>> {
        let role = Roles::find()
            .filter(roles::Column::IsDefault.eq(true))
            .order_by_asc(roles::Column::Id)
            .one(&self.conn)
            .await
            .context("Failed to query default role")?;
        Ok(role)
    }

    /// The role whose bits are exactly `permissions`.
    pub async fn get_by_permissions(&self, permissions: Permission) -> Result<Option<roles::Model>> {
        let role = Roles::find()
            .filter(roles::Column::Permissions.eq(permissions.bits()))
            .order_by_asc(roles::Column::Id)
            .one(&self.conn)
            .await
            .context("Failed to query role by permissions")?;
        Ok(role)
    }
}
