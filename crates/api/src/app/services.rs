use std::{
    convert::Infallible,
    sync::{Arc, Mutex},
    time::Duration,
};

use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use tokio::sync::broadcast;
use tokio_stream::{Stream, StreamExt, wrappers::BroadcastStream};
use tracing::{info, warn};

use trattoria_auth::{
    AssignRole, JwtIssuer, RegisterUser, Role, User, UserCommand, UserId, hash_password, user,
    validate_password_strength, verify_password,
};
use trattoria_core::{Aggregate, AggregateId, DomainError, validate};
use trattoria_events::EventEnvelope;
use trattoria_infra::{
    Checkout, CommandDispatcher, Namespace, ProjectingEventBus, ReadModels, UniqueIndex,
    event_store::{EventStore, InMemoryEventStore, StoredEvent},
    projections::OrderView,
    replay,
    workers::{EventWorker, Notifier, WorkerHandle},
};
use trattoria_orders::order;

use crate::app::errors::{ApiError, ApiResult};
use crate::config::AppConfig;

pub type Store = Arc<dyn EventStore>;
pub type Bus = Arc<ProjectingEventBus>;
pub type Dispatcher = CommandDispatcher<Store, Bus>;

/// Realtime message broadcasted via SSE.
#[derive(Debug, Clone, Serialize)]
pub struct RealtimeMessage {
    pub topic: String,
    pub aggregate_id: AggregateId,
    pub payload: JsonValue,
}

/// What a tracking stream pushes on every order change.
#[derive(Debug, Clone, Serialize)]
pub struct OrderStatusUpdate {
    pub tracking_code: String,
    pub status: &'static str,
    pub note: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl From<&OrderView> for OrderStatusUpdate {
    fn from(view: &OrderView) -> Self {
        Self {
            tracking_code: view.tracking_code.to_string(),
            status: view.status.as_str(),
            note: view.history.last().and_then(|h| h.note.clone()),
            updated_at: view.updated_at,
        }
    }
}

/// Shared application state: one dispatcher over the configured event store,
/// the read models it feeds, and the background workers.
pub struct AppServices {
    pub config: AppConfig,
    pub dispatcher: Dispatcher,
    pub read_models: ReadModels,
    pub index: Arc<UniqueIndex>,
    pub issuer: JwtIssuer,
    pub realtime_tx: broadcast::Sender<RealtimeMessage>,
    workers: Mutex<Vec<WorkerHandle>>,
}

impl AppServices {
    /// Run a command and map failures to API errors.
    pub fn dispatch<A>(
        &self,
        aggregate_id: AggregateId,
        aggregate_type: &'static str,
        command: A::Command,
        make_aggregate: impl FnOnce(AggregateId) -> A,
    ) -> ApiResult<Vec<StoredEvent>>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: trattoria_events::Event + Serialize + DeserializeOwned,
    {
        Ok(self
            .dispatcher
            .dispatch(aggregate_id, aggregate_type, command, make_aggregate)?)
    }

    pub fn checkout(&self) -> Checkout<'_, Store, Bus> {
        Checkout {
            dispatcher: &self.dispatcher,
            foods: &self.read_models.foods,
            index: &self.index,
            policy: self.config.delivery,
        }
    }

    /// Claim the email, register the user, release the claim on failure.
    pub async fn register_user(
        &self,
        name: &str,
        email: &str,
        phone: Option<String>,
        password: &str,
        role: Role,
        now: DateTime<Utc>,
    ) -> ApiResult<UserId> {
        let email = validate::email(email)?;
        validate_password_strength(password)?;
        let password_hash = hash_password_blocking(password.to_string()).await?;

        let user_id = UserId::generate();
        self.index.claim(Namespace::Email, &email, user_id.aggregate_id())?;

        let cmd = UserCommand::Register(RegisterUser {
            user_id,
            name: name.to_string(),
            email: email.clone(),
            phone,
            password_hash,
            role,
            occurred_at: now,
        });
        if let Err(err) = self.dispatch(user_id.aggregate_id(), user::AGGREGATE_TYPE, cmd, |id| {
            User::empty(UserId::new(id))
        }) {
            self.index.release(Namespace::Email, &email, user_id.aggregate_id());
            return Err(err);
        }
        Ok(user_id)
    }

    /// Create the configured admin account, or promote it if it exists.
    async fn seed_admin(&self) -> anyhow::Result<()> {
        let (Some(email), Some(password)) = (self.config.admin_email.clone(), self.config.admin_password.clone()) else {
            return Ok(());
        };
        let now = Utc::now();

        if let Some(existing) = self.read_models.users.by_email(&email) {
            if !existing.role.is_admin() {
                let cmd = UserCommand::AssignRole(AssignRole {
                    user_id: existing.id,
                    role: Role::ADMIN,
                    occurred_at: now,
                });
                self.dispatch(existing.id.aggregate_id(), user::AGGREGATE_TYPE, cmd, |id| {
                    User::empty(UserId::new(id))
                })?;
                info!(email = %existing.email, "promoted seeded account to admin");
            }
            return Ok(());
        }

        let user_id = self
            .register_user("Administrator", &email, None, &password, Role::ADMIN, now)
            .await?;
        info!(user_id = %user_id, email = %email, "seeded admin account");
        Ok(())
    }

    fn spawn_workers(&self) -> anyhow::Result<()> {
        let bus = self.dispatcher.bus();

        let notifier = Notifier::new(
            self.read_models.orders.clone(),
            self.read_models.reservations.clone(),
            self.config.admin_email.clone(),
        );
        let notifications = EventWorker::spawn("notifier", bus.as_ref(), move |env: EventEnvelope<JsonValue>| {
            notifier.handle(&env)
        })?;

        // Orders are projected before fan-out, so the view already reflects `env`.
        let orders = self.read_models.orders.clone();
        let realtime_tx = self.realtime_tx.clone();
        let tracking = EventWorker::spawn("order-tracking", bus.as_ref(), move |env: EventEnvelope<JsonValue>| {
            if env.aggregate_type() != order::AGGREGATE_TYPE {
                return Ok::<(), serde_json::Error>(());
            }
            let Some(view) = orders.get(&env.aggregate_id().into()) else {
                return Ok(());
            };
            // Lossy: nobody listening is fine.
            let _ = realtime_tx.send(RealtimeMessage {
                topic: env.event_type().to_string(),
                aggregate_id: env.aggregate_id(),
                payload: serde_json::to_value(OrderStatusUpdate::from(&view))?,
            });
            Ok(())
        })?;

        if let Ok(mut workers) = self.workers.lock() {
            workers.push(notifications);
            workers.push(tracking);
        }
        Ok(())
    }

    /// Stop background workers (graceful shutdown).
    pub fn shutdown_workers(&self) {
        let drained: Vec<WorkerHandle> = match self.workers.lock() {
            Ok(mut workers) => workers.drain(..).collect(),
            Err(_) => return,
        };
        for handle in drained {
            handle.shutdown();
        }
    }
}

/// Argon2 hashing is CPU-bound and runs on the blocking pool.
pub async fn hash_password_blocking(password: String) -> ApiResult<String> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| ApiError::Internal(format!("password hashing task: {e}")))?
        .map_err(ApiError::from)
}

pub async fn verify_password_blocking(password: String, phc: String) -> ApiResult<bool> {
    tokio::task::spawn_blocking(move || verify_password(&password, &phc))
        .await
        .map_err(|e| ApiError::Internal(format!("password verification task: {e}")))?
        .map_err(ApiError::from)
}

pub async fn build_services(config: AppConfig) -> anyhow::Result<Arc<AppServices>> {
    let store = open_store(&config).await?;

    let read_models = ReadModels::in_memory();
    let bus: Bus = Arc::new(ProjectingEventBus::new(read_models.projections()));
    let index = Arc::new(UniqueIndex::new());

    let report = replay::rebuild(&store, &bus, &read_models, &index)?;
    info!(events = report.events, "read models rebuilt");

    let (realtime_tx, _realtime_rx) = broadcast::channel::<RealtimeMessage>(256);
    let issuer = JwtIssuer::new(config.jwt_secret.as_bytes(), config.token_ttl);

    let services = Arc::new(AppServices {
        dispatcher: CommandDispatcher::new(store, bus),
        read_models,
        index,
        issuer,
        realtime_tx,
        config,
        workers: Mutex::new(Vec::new()),
    });

    services.seed_admin().await?;
    services.spawn_workers()?;
    Ok(services)
}

async fn open_store(config: &AppConfig) -> anyhow::Result<Store> {
    if config.use_persistent_stores {
        #[cfg(feature = "postgres")]
        {
            let url = config
                .database_url
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("USE_PERSISTENT_STORES=true requires DATABASE_URL"))?;
            let store = trattoria_infra::event_store::PostgresEventStore::connect(url).await?;
            store.migrate().await?;
            info!("using postgres event store");
            return Ok(Arc::new(store));
        }
        #[cfg(not(feature = "postgres"))]
        {
            warn!("USE_PERSISTENT_STORES=true but postgres feature not enabled, falling back to in-memory");
        }
    }
    Ok(Arc::new(InMemoryEventStore::new()))
}

/// SSE stream of status updates for one order, starting with its current state.
pub fn order_sse_stream(
    services: &AppServices,
    view: &OrderView,
) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>> + use<>> {
    let order_id = view.id.aggregate_id();
    let rx = services.realtime_tx.subscribe();

    let current = serde_json::to_value(OrderStatusUpdate::from(view)).unwrap_or(JsonValue::Null);
    let updates = BroadcastStream::new(rx).filter_map(move |msg| match msg {
        Ok(m) if m.aggregate_id == order_id => Some(m.payload),
        Ok(_) => None,
        Err(_lagged) => None,
    });

    let stream = tokio_stream::once(current).chain(updates).map(|payload| {
        Ok(SseEvent::default()
            .event("status")
            .json_data(&payload)
            .unwrap_or_else(|_| SseEvent::default().comment("unencodable update")))
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}
