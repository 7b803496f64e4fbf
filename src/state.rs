use std::sync::Arc;

use crate::config::Config;
use crate::db::Store;
use crate::services::{
    AuthService, LogTransport, MailQueue, MailTransport, SeaOrmAuthService, TokenService,
};

#[derive(Clone)]
pub struct SharedState {
    pub config: Arc<Config>,

    pub store: Store,

    pub auth_service: Arc<dyn AuthService>,
}

impl SharedState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        Self::with_transport(config, Arc::new(LogTransport)).await
    }

    /// Same as [`SharedState::new`] but delivers mail through `transport`.
    pub async fn with_transport(
        config: Config,
        transport: Arc<dyn MailTransport>,
    ) -> anyhow::Result<Self> {
        config.validate()?;

        let store = Store::with_pool_options(
            &config.general.database_path,
            config.general.max_db_connections,
            config.general.min_db_connections,
        )
        .await?;
        store.insert_roles().await?;

        let tokens = TokenService::new(config.security.secret_key.as_bytes())?;
        let mail = MailQueue::start(transport, &config.mail);
        let config = Arc::new(config);

        let auth_service = Arc::new(SeaOrmAuthService::new(
            store.clone(),
            tokens,
            mail,
            config.clone(),
        )) as Arc<dyn AuthService + Send + Sync + 'static>;

        Ok(Self {
            config,
            store,
            auth_service,
        })
    }
}
