/// Application state and router builder
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use std::time::Duration;
/// use taskboard_api::{app::{build_router, AppState}, config::Config};
/// use taskboard_shared::events::LocalHub;
/// use taskboard_shared::notify::LogNotifier;
/// use taskboard_shared::session::MemorySessionStore;
/// use taskboard_shared::store::MemoryStore;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let hub = LocalHub::default();
/// let state = AppState::new(
///     config,
///     Arc::new(MemoryStore::new()),
///     Arc::new(MemorySessionStore::new(Duration::from_secs(3600))),
///     Arc::new(hub.clone()),
///     hub,
///     Arc::new(LogNotifier),
/// );
/// let app = build_router(state);
/// let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
/// axum::serve(listener, app).await?;
/// # Ok(())
/// # }
/// ```

use crate::{config::Config, middleware::security::SecurityHeadersLayer};
use axum::{
    http::{header, HeaderValue, Method},
    routing::{delete, get, patch, post},
    Router,
};
use sqlx::PgPool;
use std::sync::Arc;
use taskboard_shared::{
    auth::{Access, GuardChain, GuardPolicy, RequestContext, ScopeHint},
    board::{TaskActivityService, TaskOrderingEngine},
    events::{ChangePublisher, LocalHub},
    notify::Notifier,
    projects::ProjectService,
    redis::RedisClient,
    session::{SessionStore, SessionToken},
    store::{AccountStore, ActivityStore, BoardStore, Directory, DocumentStore, ProjectStore},
};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::error::ApiResult;

/// Shared application state
///
/// Cloned for each request handler via Axum's `State` extractor; every field
/// is reference counted.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub guard: Arc<GuardChain>,
    pub sessions: Arc<dyn SessionStore>,
    pub accounts: Arc<dyn AccountStore>,
    pub projects: Arc<ProjectService>,
    pub project_store: Arc<dyn ProjectStore>,
    pub board: Arc<TaskOrderingEngine>,
    pub board_store: Arc<dyn BoardStore>,
    pub activity: Arc<TaskActivityService>,
    pub documents: Arc<dyn DocumentStore>,

    /// Local fan-out feeding SSE subscribers
    pub hub: LocalHub,

    /// Backends probed by the health check; absent in tests
    pub db: Option<PgPool>,
    pub redis: Option<RedisClient>,
}

impl AppState {
    /// Wires every service over one store implementation
    pub fn new<S>(
        config: Config,
        store: Arc<S>,
        sessions: Arc<dyn SessionStore>,
        publisher: Arc<dyn ChangePublisher>,
        hub: LocalHub,
        notifier: Arc<dyn Notifier>,
    ) -> Self
    where
        S: Directory + AccountStore + ProjectStore + BoardStore + DocumentStore + ActivityStore + 'static,
    {
        let guard = GuardChain::new(sessions.clone(), store.clone(), config.cache.user_ttl());

        Self {
            config: Arc::new(config),
            guard: Arc::new(guard),
            sessions,
            accounts: store.clone(),
            projects: Arc::new(ProjectService::new(store.clone(), notifier.clone(), publisher.clone())),
            project_store: store.clone(),
            board: Arc::new(TaskOrderingEngine::new(store.clone(), publisher.clone())),
            board_store: store.clone(),
            activity: Arc::new(TaskActivityService::new(store.clone(), store.clone(), publisher, notifier)),
            documents: store,
            hub,
            db: None,
            redis: None,
        }
    }

    /// Attaches the production backends for health reporting
    pub fn with_backends(mut self, db: PgPool, redis: RedisClient) -> Self {
        self.db = Some(db);
        self.redis = Some(redis);
        self
    }

    /// Runs the guard chain for one operation
    pub async fn authorize(
        &self,
        policy: &GuardPolicy,
        token: Option<SessionToken>,
        scope: ScopeHint,
    ) -> ApiResult<Access> {
        let ctx = RequestContext::new(token).scoped(scope);
        Ok(self.guard.evaluate(policy, ctx).await?)
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Architecture
///
/// ```text
/// /
/// ├── GET /health
/// └── /v1/
///     ├── /auth/            register, login, logout, me
///     ├── /sessions/        list, current, remove other
///     ├── /projects/        create, list, get, update, delete, select,
///     │   │                 statistics
///     │   └── /:project_id/ members, invitations, tasks, documents
///     ├── /invitations/:token/accept
///     ├── /board            tasks of the session's project (+ /events SSE)
///     ├── /tasks/:task_id   get, edit, delete, move
///     │   ├── /assignees    list, assign, unassign
///     │   └── /comments     list, add, edit, delete
///     └── /documents/:document_id
/// ```
///
/// Authorization is not a layer: each handler evaluates its own policy so
/// the scope (project, task or document id) comes from its path.
pub fn build_router(state: AppState) -> Router {
    use crate::routes;

    let health_routes = Router::new().route("/health", get(routes::health::health_check));

    let auth_routes = Router::new()
        .route("/register", post(routes::auth::register))
        .route("/login", post(routes::auth::login))
        .route("/logout", post(routes::auth::logout))
        .route("/me", get(routes::auth::me));

    let session_routes = Router::new()
        .route("/", get(routes::sessions::list_sessions))
        .route("/current", get(routes::sessions::current_session))
        .route("/:session_id", delete(routes::sessions::remove_session));

    let project_routes = Router::new()
        .route(
            "/",
            get(routes::projects::list_projects).post(routes::projects::create_project),
        )
        .route(
            "/:project_id",
            get(routes::projects::get_project)
                .patch(routes::projects::update_project)
                .delete(routes::projects::delete_project),
        )
        .route("/:project_id/select", post(routes::projects::select_project))
        .route("/:project_id/statistics", get(routes::projects::project_statistics))
        .route("/:project_id/members", get(routes::members::list_members))
        .route(
            "/:project_id/members/:user_id",
            patch(routes::members::change_role).delete(routes::members::remove_member),
        )
        .route("/:project_id/invitations", post(routes::members::invite))
        .route(
            "/:project_id/tasks",
            get(routes::tasks::list_tasks).post(routes::tasks::create_task),
        )
        .route(
            "/:project_id/documents",
            get(routes::documents::list_documents).post(routes::documents::create_document),
        );

    let task_routes = Router::new()
        .route(
            "/:task_id",
            get(routes::tasks::get_task)
                .patch(routes::tasks::update_task)
                .delete(routes::tasks::delete_task),
        )
        .route("/:task_id/move", post(routes::tasks::move_task))
        .route("/:task_id/assignees", get(routes::activity::list_assignees))
        .route(
            "/:task_id/assignees/:user_id",
            post(routes::activity::assign).delete(routes::activity::unassign),
        )
        .route(
            "/:task_id/comments",
            get(routes::activity::list_comments).post(routes::activity::add_comment),
        )
        .route(
            "/:task_id/comments/:comment_id",
            patch(routes::activity::edit_comment).delete(routes::activity::delete_comment),
        );

    let document_routes = Router::new().route(
        "/:document_id",
        get(routes::documents::get_document).delete(routes::documents::delete_document),
    );

    let v1_routes = Router::new()
        .nest("/auth", auth_routes)
        .nest("/sessions", session_routes)
        .nest("/projects", project_routes)
        .route("/invitations/:token/accept", post(routes::members::accept_invitation))
        .route("/board", get(routes::tasks::board))
        .route("/board/events", get(routes::events::board_events))
        .nest("/tasks", task_routes)
        .nest("/documents", document_routes);

    let cors = if state.config.api.cors_origins.iter().any(|origin| origin == "*") {
        CorsLayer::permissive()
    } else {
        let origins: Vec<HeaderValue> = state
            .config
            .api
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PATCH,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::CONTENT_TYPE])
            .allow_credentials(true)
            .max_age(std::time::Duration::from_secs(3600))
    };

    Router::new()
        .merge(health_routes)
        .nest("/v1", v1_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
        .layer(SecurityHeadersLayer::new(state.config.api.production))
        .with_state(state)
}
