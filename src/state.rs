use crate::catalog::Catalog;
use crate::clock::{Clock, SystemClock};
use crate::config::AppConfig;
use crate::mail::{LogMailer, Mailer, SesMailer};
use crate::mirror::{postgres::PgMirror, Mirror, NoopMirror, UserMirror};
use crate::users::directory::UserDirectory;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub directory: Arc<UserDirectory>,
    pub mirror: Mirror,
    pub mailer: Arc<dyn Mailer>,
    pub clock: Arc<dyn Clock>,
    pub catalog: Arc<Catalog>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let store: Arc<dyn UserMirror> = match &config.database_url {
            Some(url) => {
                let pg = PgMirror::connect(url).await?;
                if let Err(e) = sqlx::migrate!("./migrations").run(pg.pool()).await {
                    warn!(error = %e, "migrations failed; continuing");
                }
                Arc::new(pg)
            }
            None => {
                info!("DATABASE_URL not set; running without a persistent mirror");
                Arc::new(NoopMirror)
            }
        };

        let mailer: Arc<dyn Mailer> = match &config.mail {
            Some(mail) => Arc::new(SesMailer::new(mail).await?),
            None => {
                info!("MAIL_FROM not set; reset codes will only be logged");
                Arc::new(LogMailer)
            }
        };

        let catalog = Arc::new(Catalog::load(config.catalog_path.as_deref())?);

        Ok(Self::from_parts(config, store, mailer, Arc::new(SystemClock), catalog))
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        store: Arc<dyn UserMirror>,
        mailer: Arc<dyn Mailer>,
        clock: Arc<dyn Clock>,
        catalog: Arc<Catalog>,
    ) -> Self {
        Self {
            config,
            directory: Arc::new(UserDirectory::new()),
            mirror: Mirror::spawn(store),
            mailer,
            clock,
            catalog,
        }
    }

    /// Isolated state for tests: fresh directory, no persistence, log-only mail.
    /// Must be called inside a tokio runtime.
    #[cfg(test)]
    pub fn fake() -> Self {
        Self::fake_with(Arc::new(NoopMirror), Arc::new(LogMailer), Arc::new(SystemClock))
    }

    #[cfg(test)]
    pub fn fake_with(
        store: Arc<dyn UserMirror>,
        mailer: Arc<dyn Mailer>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let config = Arc::new(AppConfig {
            database_url: None,
            jwt: crate::config::JwtConfig {
                secret: "test-secret".into(),
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
                ttl_days: 180,
            },
            admin_email: "admin@admin".into(),
            admin_password: Some("Adm1nPassword".into()),
            reset_code_ttl_minutes: 15,
            mail: None,
            catalog_path: None,
            listen_addr: ([127, 0, 0, 1], 0).into(),
        });
        let catalog = Arc::new(Catalog::embedded().expect("embedded catalog parses"));
        Self::from_parts(config, store, mailer, clock, catalog)
    }
}
