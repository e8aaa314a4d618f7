#![forbid(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::todo)]
#![warn(clippy::panic)]
#![warn(clippy::dbg_macro)]
#![warn(clippy::print_stdout)]
#![warn(clippy::print_stderr)]
#![warn(clippy::clone_on_ref_ptr)]
#![warn(unreachable_pub)]
#![warn(missing_debug_implementations)]
#![warn(unused_qualifications)]
#![deny(unused_must_use)]

pub mod adapters;
pub mod api;
pub mod config;
pub mod domain;
pub mod error;
pub mod services;
pub mod telemetry;

use crate::adapters::database::{
    DbPool, book_repo::PgBookStore, book_request_repo::PgBookRequestStore, category_repo::PgCategoryStore,
    message_repo::PgMessageStore, user_repo::PgUserStore,
};
use crate::adapters::mail::LogMailer;
use crate::adapters::memory::{
    MemoryBookRequestStore, MemoryBookStore, MemoryCategoryStore, MemoryMessageStore, MemoryUserStore,
};
use crate::adapters::storage::LocalImageStore;
use crate::api::ServiceContainer;
use crate::config::Config;
use crate::domain::ports::{BookRequestStore, BookStore, CategoryStore, Mailer, MessageStore, UserStore};
use crate::services::account_service::AccountService;
use crate::services::auth_service::AuthService;
use crate::services::book_request_service::BookRequestService;
use crate::services::book_service::BookService;
use crate::services::category_service::CategoryService;
use crate::services::chat_service::ChatService;
use crate::services::gateway::GatewayService;
use crate::services::gateway::hub::ConnectionHub;
use crate::services::gateway::router::EventRouter;
use crate::services::health_service::HealthService;
use crate::services::message_service::MessageService;
use crate::services::presence::PresenceRegistry;
use crate::services::rate_limit_service::RateLimitService;
use crate::services::upload_service::UploadService;
use std::sync::Arc;
use tokio::sync::watch;

/// Everything the listeners need, wired and ready to serve.
#[derive(Debug)]
pub struct App {
    pub services: ServiceContainer,
    pub health_service: HealthService,
}

struct Stores {
    users: Arc<dyn UserStore>,
    messages: Arc<dyn MessageStore>,
    categories: Arc<dyn CategoryStore>,
    books: Arc<dyn BookStore>,
    requests: Arc<dyn BookRequestStore>,
}

/// Wires stores, services and the gateway from configuration.
///
/// Without a database the builder falls back to in-process stores.
#[derive(Debug)]
pub struct AppBuilder {
    config: Config,
    pool: Option<DbPool>,
    mailer: Option<Arc<dyn Mailer>>,
}

impl AppBuilder {
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config, pool: None, mailer: None }
    }

    #[must_use]
    pub fn with_database(mut self, pool: Option<DbPool>) -> Self {
        self.pool = pool;
        self
    }

    #[must_use]
    pub fn with_mailer(mut self, mailer: Arc<dyn Mailer>) -> Self {
        self.mailer = Some(mailer);
        self
    }

    /// Builds the application.
    ///
    /// # Errors
    /// Returns an error if the upload directory cannot be created.
    pub async fn build(self) -> anyhow::Result<App> {
        let config = self.config;

        let stores = match &self.pool {
            Some(pool) => Stores {
                users: Arc::new(PgUserStore::new(pool.clone())),
                messages: Arc::new(PgMessageStore::new(pool.clone())),
                categories: Arc::new(PgCategoryStore::new(pool.clone())),
                books: Arc::new(PgBookStore::new(pool.clone())),
                requests: Arc::new(PgBookRequestStore::new(pool.clone())),
            },
            None => {
                tracing::warn!("No database configured, all records are kept in memory");
                Stores {
                    users: Arc::new(MemoryUserStore::new()),
                    messages: Arc::new(MemoryMessageStore::new()),
                    categories: Arc::new(MemoryCategoryStore::new()),
                    books: Arc::new(MemoryBookStore::new()),
                    requests: Arc::new(MemoryBookRequestStore::new()),
                }
            }
        };
        let Stores { users, messages, categories, books, requests } = stores;

        let images = LocalImageStore::new(&config.uploads.dir, config.uploads.max_image_bytes);
        images.ensure_dir().await?;
        let uploads = UploadService::new(Arc::new(images), config.uploads.max_image_bytes);

        let mailer = self.mailer.unwrap_or_else(|| Arc::new(LogMailer::new(config.mail.from.clone())));

        let auth_service = AuthService::new(config.auth.clone());
        let account_service = AccountService::new(
            Arc::clone(&users),
            auth_service.clone(),
            mailer,
            config.mail.reset_link_base.clone(),
        );
        let message_service =
            MessageService::new(messages, Arc::clone(&users), uploads.clone(), config.uploads.max_images);
        let category_service = CategoryService::new(Arc::clone(&categories), Arc::clone(&books), uploads.clone());
        let book_service = BookService::new(
            Arc::clone(&books),
            categories,
            Arc::clone(&requests),
            Arc::clone(&users),
            uploads,
        );
        let book_request_service = BookRequestService::new(requests, books, Arc::clone(&users));

        let presence = Arc::new(PresenceRegistry::new());
        let hub = Arc::new(ConnectionHub::new());
        let chat_service = ChatService::new(message_service.clone(), users, Arc::clone(&presence));
        let router = EventRouter::new(Arc::clone(&hub), presence, message_service.clone(), chat_service.clone());
        let gateway_service = GatewayService::new(hub, router, config.gateway.clone());

        let rate_limit_service = RateLimitService::new(config.server.trusted_proxies.clone());
        let health_service = HealthService::new(self.pool, config.database.health_timeout_ms);

        Ok(App {
            services: ServiceContainer {
                account_service,
                auth_service,
                message_service,
                category_service,
                book_service,
                book_request_service,
                chat_service,
                gateway_service,
                rate_limit_service,
            },
            health_service,
        })
    }
}

/// Routes panics through tracing so they reach the same sinks as every other log line.
pub fn setup_panic_hook() {
    std::panic::set_hook(Box::new(|info| {
        let location = info.location().map(ToString::to_string).unwrap_or_default();
        let payload = info
            .payload()
            .downcast_ref::<&str>()
            .map(ToString::to_string)
            .or_else(|| info.payload().downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        tracing::error!(panic.location = %location, panic.payload = %payload, "Thread panicked");
    }));
}

/// Flips `shutdown_tx` on Ctrl-C or SIGTERM.
pub fn spawn_signal_handler(shutdown_tx: watch::Sender<bool>) {
    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to install Ctrl+C handler");
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to install SIGTERM handler");
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            () = ctrl_c => {},
            () = terminate => {},
        }

        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(true);
    });
}

/// Applies pending schema migrations.
///
/// # Errors
/// Returns an error if a migration fails.
pub async fn run_migrations(pool: &DbPool) -> anyhow::Result<()> {
    tracing::info!("Running database migrations");
    adapters::database::MIGRATOR.run(pool).await?;
    Ok(())
}
