// Item Configuration - Web Server
// REST API over the editor core with Axum

use anyhow::{Context, Result};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use item_config::{
    derive_function_set, get_events_for_item, search, Collaborators, DirtyFlag, EditingSession,
    Event, FormChanges, FunctionKind, GroupTypeChoice, Item, ItemListing, ItemRow, ItemSnapshot,
    ItemStore, LoadError, MessageLog, PathIconResolver, RemovalRequest, SearchQuery, SessionMode,
    Settings, SqliteItemStore, StoreError, SubmitError, SubmitOutcome, ValidationError,
};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tower_http::cors::CorsLayer;

/// Shared application state
#[derive(Clone)]
struct AppState {
    store: Arc<Mutex<SqliteItemStore>>,
    icons: Arc<PathIconResolver>,
}

impl AppState {
    fn store(&self) -> MutexGuard<'_, SqliteItemStore> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            error: None,
        }
    }
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    let body = ApiResponse {
        success: false,
        data: (),
        error: Some(message.into()),
    };
    (status, Json(body)).into_response()
}

fn store_error(e: StoreError) -> Response {
    match e {
        StoreError::NotFound(name) => error_response(StatusCode::NOT_FOUND, format!("No item named {}", name)),
        StoreError::Rejected(reason) => error_response(StatusCode::CONFLICT, reason),
        other => {
            log::error!("Store error: {}", other);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, other.to_string())
        }
    }
}

fn validation_error(e: ValidationError) -> Response {
    error_response(StatusCode::BAD_REQUEST, e.to_string())
}

fn load_snapshot(store: &SqliteItemStore) -> Result<ItemSnapshot, Response> {
    store.list_non_recursive().map(ItemSnapshot::new).map_err(store_error)
}

/// Search query string: `?q=temp&groups=true&exclude=Temp1`
#[derive(Deserialize)]
struct SearchParams {
    #[serde(default)]
    q: String,
    #[serde(default)]
    groups: bool,
    exclude: Option<String>,
}

#[derive(Serialize)]
struct FunctionResponse {
    kind: FunctionKind,
    parameters: usize,
}

/// Outcome of a write or removal, with the notices it produced
#[derive(Serialize)]
struct SubmitResponse {
    mode: SessionMode,
    outcome: SubmitOutcome,
    item: Item,
    messages: Vec<String>,
}

#[derive(Serialize)]
struct RemoveResponse {
    item: Item,
    messages: Vec<String>,
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/items - List rows, sorted by name
async fn list_items(State(state): State<AppState>) -> Response {
    let store = state.store();
    match ItemListing::load(&*store) {
        Ok(listing) => {
            let rows: Vec<ItemRow> = listing.rows(&*state.icons);
            Json(ApiResponse::ok(rows)).into_response()
        }
        Err(e) => store_error(e),
    }
}

/// GET /api/items/:name - One item in wire form
async fn get_item(State(state): State<AppState>, Path(name): Path<String>) -> Response {
    let store = state.store();
    let snapshot = match load_snapshot(&store) {
        Ok(snapshot) => snapshot,
        Err(response) => return response,
    };
    match snapshot.get(&name).cloned() {
        Some(item) => Json(ApiResponse::ok(item)).into_response(),
        None => error_response(StatusCode::NOT_FOUND, format!("No item named {}", name)),
    }
}

/// GET /api/items/:name/events - Audit trail, newest first
async fn get_item_events(State(state): State<AppState>, Path(name): Path<String>) -> Response {
    let store = state.store();
    match get_events_for_item(store.connection(), &name) {
        Ok(events) => Json(ApiResponse::<Vec<Event>>::ok(events)).into_response(),
        Err(e) => store_error(e),
    }
}

/// PUT /api/items/:name - Create or edit an item from a set of field changes
async fn put_item(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(mut changes): Json<FormChanges>,
) -> Response {
    let store = state.store();
    let snapshot = match load_snapshot(&store) {
        Ok(snapshot) => snapshot,
        Err(response) => return response,
    };

    let session = if snapshot.contains(&name) {
        EditingSession::edit(snapshot, &name)
    } else {
        changes.name = Some(name.clone());
        Ok(EditingSession::create(snapshot))
    };
    let mut session = match session {
        Ok(session) => session,
        Err(LoadError::Store(e)) => return store_error(e),
        Err(e) => return error_response(StatusCode::UNPROCESSABLE_ENTITY, e.to_string()),
    };

    if let Err(e) = session.apply(&changes) {
        return validation_error(e);
    }

    let dirty = DirtyFlag::new();
    let messages = MessageLog::new();
    let services = Collaborators::new(&*store, &dirty, &messages);
    match session.submit(services) {
        Ok(outcome) => {
            // prepare() already succeeded inside submit
            let item = match session.prepare() {
                Ok(item) => item,
                Err(e) => return validation_error(e),
            };
            Json(ApiResponse::ok(SubmitResponse {
                mode: session.mode(),
                outcome,
                item,
                messages: messages.drain(),
            }))
            .into_response()
        }
        Err(SubmitError::Validation(e)) => validation_error(e),
        Err(SubmitError::Write(e)) => store_error(e),
    }
}

/// DELETE /api/items/:name - Confirmed removal
async fn delete_item(State(state): State<AppState>, Path(name): Path<String>) -> Response {
    let store = state.store();
    let snapshot = match load_snapshot(&store) {
        Ok(snapshot) => snapshot,
        Err(response) => return response,
    };
    let Some(item) = snapshot.get(&name).cloned() else {
        return error_response(StatusCode::NOT_FOUND, format!("No item named {}", name));
    };

    let dirty = DirtyFlag::new();
    let messages = MessageLog::new();
    match RemovalRequest::new(item).confirm(Collaborators::new(&*store, &dirty, &messages)) {
        Ok(item) => Json(ApiResponse::ok(RemoveResponse {
            item,
            messages: messages.drain(),
        }))
        .into_response(),
        Err(e) => store_error(e),
    }
}

/// GET /api/search - Name suggestions for the parent/member pickers
async fn search_items(State(state): State<AppState>, Query(params): Query<SearchParams>) -> Response {
    let store = state.store();
    let snapshot = match load_snapshot(&store) {
        Ok(snapshot) => snapshot,
        Err(response) => return response,
    };

    let mut query = SearchQuery::new(&params.q).excluding(params.exclude.as_deref());
    if params.groups {
        query = query.groups_only();
    }
    let names: Vec<String> = search(&snapshot, query).map(str::to_string).collect();
    Json(ApiResponse::ok(names)).into_response()
}

/// GET /api/functions/:group_type - Functions offered for a group type
async fn list_functions(Path(group_type): Path<String>) -> Response {
    let Some(choice) = GroupTypeChoice::parse(&group_type) else {
        return error_response(StatusCode::BAD_REQUEST, format!("unknown group type: {}", group_type));
    };

    let functions: Vec<FunctionResponse> = derive_function_set(choice.base_type())
        .iter()
        .map(|&kind| FunctionResponse {
            kind,
            parameters: kind.arity(),
        })
        .collect();
    Json(ApiResponse::ok(functions)).into_response()
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    println!("🌐 Item Configuration - Web Server");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let config_path = std::env::args().nth(1).map(std::path::PathBuf::from);
    let settings = Settings::load(config_path.as_deref())?;

    let store = SqliteItemStore::open(&settings.database_path)?;
    println!("✓ Database opened: {:?}", settings.database_path);

    // Create shared state
    let state = AppState {
        store: Arc::new(Mutex::new(store)),
        icons: Arc::new(PathIconResolver::new(settings.icon_base.clone())),
    };

    // Build API routes
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/items", get(list_items))
        .route("/items/:name", get(get_item).put(put_item).delete(delete_item))
        .route("/items/:name/events", get(get_item_events))
        .route("/search", get(search_items))
        .route("/functions/:group_type", get(list_functions))
        .with_state(state);

    let app = Router::new()
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive());

    // Start server
    let listener = tokio::net::TcpListener::bind(&settings.listen_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", settings.listen_addr))?;

    println!("\n🚀 Server running on http://{}", settings.listen_addr);
    println!("   API: http://{}/api/items", settings.listen_addr);
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, app).await.context("Failed to start server")?;
    Ok(())
}
