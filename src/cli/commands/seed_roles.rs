//! Seed roles command handler

use crate::config::Config;
use crate::db::Store;
use crate::domain::Permission;

pub async fn cmd_seed_roles(config: &Config) -> anyhow::Result<()> {
    let store = Store::with_pool_options(
        &config.general.database_path,
        config.general.max_db_connections,
        config.general.min_db_connections,
    )
    .await?;

    store.insert_roles().await?;

    let roles = store.list_roles().await?;
    println!("Roles ({} total)", roles.len());
    println!("{:-<50}", "");

    for role in roles {
        let marker = if role.is_default { " (default)" } else { "" };
        println!(
            "{:<15} {}{}",
            role.name,
            Permission::from_bits(role.permissions),
            marker
        );
    }

    Ok(())
}
