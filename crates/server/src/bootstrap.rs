use std::sync::Arc;

use chrono::Duration;
use thiserror::Error;
use tracing::{info, warn};

use helpbot_core::clock::{Clock, SystemClock};
use helpbot_core::config::AppConfig;
use helpbot_core::notifications::NotificationRouter;
use helpbot_db::{connect, migrations, DbPool, RepositoryError};
use helpbot_discord::{
    default_dispatcher, BotComponents, ForumGateway, GatewayRunner, GatewayTransport,
    GuildSettings, LoggingMessageSender, MemberSource, MessageSender, NoopForumGateway,
    NoopGatewayTransport, NotifierChannels, PlatformNotifier, ReconnectPolicy,
    StaticMemberSource,
};
use helpbot_workflows::{
    MemberDirectory, RecoveryReport, ReputationLedger, ReviewError, ReviewLifecycle,
    TicketWorkflow,
};

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub reviews: ReviewLifecycle,
    pub gateway_runner: GatewayRunner,
    pub recovery: RecoveryReport,
    pub synced_members: u64,
}

/// Platform seams the binary plugs in. Defaults log outbound traffic and
/// never receive events.
pub struct PlatformParts {
    pub transport: Arc<dyn GatewayTransport>,
    pub sender: Arc<dyn MessageSender>,
    pub forum: Arc<dyn ForumGateway>,
    pub member_source: Arc<dyn MemberSource>,
    pub clock: Arc<dyn Clock>,
}

impl Default for PlatformParts {
    fn default() -> Self {
        Self {
            transport: Arc::new(NoopGatewayTransport),
            sender: Arc::new(LoggingMessageSender::default()),
            forum: Arc::new(NoopForumGateway),
            member_source: Arc::new(StaticMemberSource::default()),
            clock: Arc::new(SystemClock),
        }
    }
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("review recovery failed: {0}")]
    Recovery(#[source] ReviewError),
    #[error("member synchronization failed: {0}")]
    MemberSync(#[source] RepositoryError),
}

pub async fn bootstrap_with_config(
    config: AppConfig,
    parts: PlatformParts,
) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool = connect(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let notifier = PlatformNotifier::new(parts.sender, NotifierChannels::from_config(&config));
    let mut router = NotificationRouter::new();
    router.register(notifier.clone());

    let tickets = TicketWorkflow::new(
        db_pool.clone(),
        parts.clock.clone(),
        router.clone(),
        config.tickets.default_bounty,
    );
    let members =
        MemberDirectory::new(db_pool.clone(), router.clone(), config.subscription.tiers.clone());
    let ledger = ReputationLedger::new(db_pool.clone(), router.clone());
    let reviews = ReviewLifecycle::new(
        db_pool.clone(),
        parts.clock,
        router,
        Arc::new(notifier),
        Duration::days(i64::from(config.review.max_duration_days)),
    );

    let recovery = reviews.recover("bootstrap").await.map_err(BootstrapError::Recovery)?;
    info!(
        event_name = "system.bootstrap.reviews_recovered",
        correlation_id = "bootstrap",
        closed = recovery.closed.len(),
        rearmed = ?recovery.rearmed,
        "review schedule recovered"
    );

    let synced_members = match parts.member_source.guild_members().await {
        Ok(current) => members
            .sync_members(current, "bootstrap")
            .await
            .map_err(BootstrapError::MemberSync)?,
        Err(error) => {
            warn!(
                event_name = "system.bootstrap.member_sync_skipped",
                correlation_id = "bootstrap",
                error = %error,
                "guild member list unavailable; skipping startup sync"
            );
            0
        }
    };

    let dispatcher = default_dispatcher(BotComponents {
        settings: GuildSettings::from_config(&config),
        tickets,
        members,
        ledger,
        reviews: reviews.clone(),
        forum: parts.forum,
    });
    let gateway_runner =
        GatewayRunner::new(parts.transport, dispatcher, ReconnectPolicy::default());

    Ok(Application { config, db_pool, reviews, gateway_runner, recovery, synced_members })
}
