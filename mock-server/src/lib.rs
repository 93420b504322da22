use std::sync::Arc;

use axum::{
    extract::{Path, Query, Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::debug;
use uuid::Uuid;

pub const TRACKING_ID: &str = "trackingid";
pub const DEFAULT_PER_PAGE: usize = 10;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[allow(non_snake_case)]
pub struct Widget {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<serde_json::Number>,
    pub isActive: bool,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Deserialize)]
#[allow(non_snake_case)]
pub struct CreateWidget {
    pub name: String,
    pub count: Option<i64>,
    pub price: Option<serde_json::Number>,
    #[serde(default)]
    pub isActive: bool,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Deserialize)]
#[allow(non_snake_case)]
pub struct UpdateWidget {
    pub name: Option<String>,
    pub count: Option<i64>,
    pub price: Option<serde_json::Number>,
    pub isActive: Option<bool>,
    pub tags: Option<Vec<String>>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct Page<T> {
    pub items: Vec<T>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub struct ErrorBody {
    pub message: String,
    pub errors: Vec<String>,
    #[serde(rename = "trackingId")]
    pub tracking_id: Option<String>,
}

#[derive(Deserialize)]
pub struct ListParams {
    pub page: Option<usize>,
    pub per_page: Option<usize>,
}

/// Widgets in insertion order.
pub type Db = Arc<RwLock<Vec<Widget>>>;

#[derive(Clone)]
pub struct AppState {
    db: Db,
    base_url: Arc<str>,
}

/// Error response carrying the API's JSON error body.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    tracking_id: Option<String>,
}

impl ApiError {
    fn new(status: StatusCode, message: &str, headers: &HeaderMap) -> Self {
        Self {
            status,
            message: message.to_string(),
            tracking_id: tracking_id(headers),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            message: self.message,
            errors: Vec::new(),
            tracking_id: self.tracking_id,
        };
        (self.status, Json(body)).into_response()
    }
}

/// Builds the router; `base_url` is used for absolute `Link` targets.
pub fn app(base_url: &str) -> Router {
    let state = AppState {
        db: Arc::new(RwLock::new(Vec::new())),
        base_url: Arc::from(base_url.trim_end_matches('/')),
    };
    Router::new()
        .route("/widgets", get(list_widgets).post(create_widget))
        .route(
            "/widgets/{id}",
            get(get_widget).put(update_widget).delete(delete_widget),
        )
        .layer(middleware::from_fn(require_bearer))
        .with_state(state)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    axum::serve(listener, app(&format!("http://{addr}"))).await
}

fn tracking_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get(TRACKING_ID)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

async fn require_bearer(request: Request, next: Next) -> Response {
    let authorized = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .is_some_and(|token| !token.trim().is_empty());
    debug!(
        method = %request.method(),
        uri = %request.uri(),
        tracking_id = ?tracking_id(request.headers()),
        authorized,
        "request"
    );
    if !authorized {
        return ApiError::new(
            StatusCode::UNAUTHORIZED,
            "missing bearer token",
            request.headers(),
        )
        .into_response();
    }
    next.run(request).await
}

async fn list_widgets(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
    headers: HeaderMap,
) -> Result<(HeaderMap, Json<Page<Widget>>), ApiError> {
    let per_page = params.per_page.unwrap_or(DEFAULT_PER_PAGE);
    if per_page == 0 {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "per_page must be positive",
            &headers,
        ));
    }
    let page = params.page.unwrap_or(1).max(1);

    let widgets = state.db.read().await;
    let last = widgets.len().div_ceil(per_page).max(1);
    let items = widgets
        .iter()
        .skip((page - 1) * per_page)
        .take(per_page)
        .cloned()
        .collect();

    let target = |p: usize| format!("<{}/widgets?page={p}&per_page={per_page}>", state.base_url);
    let mut links = vec![format!("{}; rel=\"first\"", target(1))];
    if page > 1 {
        links.push(format!("{}; rel=\"prev\"", target(page - 1)));
    }
    if page < last {
        links.push(format!("{}; rel=\"next\"", target(page + 1)));
    }
    links.push(format!("{}; rel=\"last\"", target(last)));

    let mut response_headers = HeaderMap::new();
    let link = HeaderValue::from_str(&links.join(", ")).map_err(|_| {
        ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "bad link header", &headers)
    })?;
    response_headers.insert(header::LINK, link);
    Ok((response_headers, Json(Page { items })))
}

async fn create_widget(
    State(state): State<AppState>,
    Json(input): Json<CreateWidget>,
) -> (StatusCode, Json<Widget>) {
    let widget = Widget {
        id: Uuid::new_v4().to_string(),
        name: input.name,
        count: input.count,
        price: input.price,
        isActive: input.isActive,
        tags: input.tags,
    };
    state.db.write().await.push(widget.clone());
    (StatusCode::CREATED, Json(widget))
}

async fn get_widget(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Widget>, ApiError> {
    let widgets = state.db.read().await;
    widgets
        .iter()
        .find(|w| w.id == id)
        .cloned()
        .map(Json)
        .ok_or_else(|| ApiError::new(StatusCode::NOT_FOUND, "widget not found", &headers))
}

async fn update_widget(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(input): Json<UpdateWidget>,
) -> Result<Json<Widget>, ApiError> {
    let mut widgets = state.db.write().await;
    let widget = widgets
        .iter_mut()
        .find(|w| w.id == id)
        .ok_or_else(|| ApiError::new(StatusCode::NOT_FOUND, "widget not found", &headers))?;
    if let Some(name) = input.name {
        widget.name = name;
    }
    if let Some(count) = input.count {
        widget.count = Some(count);
    }
    if let Some(price) = input.price {
        widget.price = Some(price);
    }
    if let Some(active) = input.isActive {
        widget.isActive = active;
    }
    if let Some(tags) = input.tags {
        widget.tags = tags;
    }
    Ok(Json(widget.clone()))
}

async fn delete_widget(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let mut widgets = state.db.write().await;
    let position = widgets
        .iter()
        .position(|w| w.id == id)
        .ok_or_else(|| ApiError::new(StatusCode::NOT_FOUND, "widget not found", &headers))?;
    widgets.remove(position);
    Ok(StatusCode::NO_CONTENT)
}
