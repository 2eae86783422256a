// src/api.rs
//! JSON surface over the collection views: browse, detail, session, reload.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use crate::catalog::{
    browse_careers, browse_universities, fallback_universities, find_by_id, BrowseOutcome,
    CareerFilter, PageSlice, UniversityFilter,
};
use crate::client::PageSource;
use crate::config::CatalogConfig;
use crate::model::{Collection, Record};
use crate::session::SessionStore;
use crate::view::CollectionView;

#[derive(Clone)]
pub struct AppState {
    pub careers: Arc<CollectionView>,
    pub universities: Arc<CollectionView>,
    pub session: Arc<SessionStore>,
    pub source: Arc<dyn PageSource>,
    pub config: Arc<CatalogConfig>,
}

impl AppState {
    pub fn new(config: CatalogConfig, source: Arc<dyn PageSource>, session: SessionStore) -> Self {
        let universities = CollectionView::new(Collection::Universities);
        let universities = if config.fallback_universities {
            universities.with_fallback(fallback_universities())
        } else {
            universities
        };
        Self {
            careers: Arc::new(CollectionView::new(Collection::Careers)),
            universities: Arc::new(universities),
            session: Arc::new(session),
            source,
            config: Arc::new(config),
        }
    }

    fn view(&self, collection: Collection) -> &Arc<CollectionView> {
        match collection {
            Collection::Careers => &self.careers,
            Collection::Universities => &self.universities,
        }
    }
}

/// Load both collections one after the other. Each view publishes on its own.
pub async fn load_all(state: &AppState) {
    for collection in [Collection::Careers, Collection::Universities] {
        let opts = state.config.fetch_options(collection);
        state
            .view(collection)
            .load(state.source.as_ref(), &opts)
            .await;
    }
}

/// Run [`load_all`] in the background.
pub fn spawn_load(state: &AppState) -> tokio::task::JoinHandle<()> {
    let state = state.clone();
    tokio::spawn(async move { load_all(&state).await })
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/careers", get(list_careers))
        .route("/careers/{id}", get(career_detail))
        .route("/universities", get(list_universities))
        .route("/universities/{id}", get(university_detail))
        .route("/session", get(session_info))
        .route("/session/profile", post(set_profile))
        .route("/session/reset", post(reset_session))
        .route("/reload", post(reload))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(Debug, Default, Deserialize)]
struct BrowseParams {
    #[serde(default)]
    q: String,
    #[serde(default)]
    filter: String,
    #[serde(default)]
    page: Option<usize>,
}

#[derive(Serialize)]
struct BrowseResp {
    #[serde(flatten)]
    page: PageSlice<Record>,
    loading: bool,
}

fn error_json(status: StatusCode, code: &str) -> Response {
    (status, Json(json!({ "error": code }))).into_response()
}

async fn list_careers(
    State(state): State<AppState>,
    Query(params): Query<BrowseParams>,
) -> Response {
    let filter = params
        .filter
        .parse::<CareerFilter>()
        .unwrap_or(CareerFilter::All);
    let profile = state.session.profile_created();
    let outcome = state.careers.with_records(|records| {
        browse_careers(records, &params.q, &filter, params.page.unwrap_or(1), profile)
    });
    match outcome {
        BrowseOutcome::Page(page) => Json(BrowseResp {
            page,
            loading: state.careers.is_loading(),
        })
        .into_response(),
        BrowseOutcome::ProfileRequired => error_json(StatusCode::FORBIDDEN, "profile_required"),
    }
}

async fn list_universities(
    State(state): State<AppState>,
    Query(params): Query<BrowseParams>,
) -> Response {
    let Ok(filter) = params.filter.parse::<UniversityFilter>() else {
        return error_json(StatusCode::BAD_REQUEST, "unknown_filter");
    };
    let page = state.universities.with_records(|records| {
        browse_universities(records, &params.q, filter, params.page.unwrap_or(1))
    });
    Json(BrowseResp {
        page,
        loading: state.universities.is_loading(),
    })
    .into_response()
}

async fn career_detail(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    detail(&state.careers, &id)
}

async fn university_detail(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    detail(&state.universities, &id)
}

fn detail(view: &CollectionView, id: &str) -> Response {
    match view.with_records(|records| find_by_id(records, id).cloned()) {
        Some(record) => Json(record).into_response(),
        None => error_json(StatusCode::NOT_FOUND, "not_found"),
    }
}

#[derive(Serialize)]
struct SessionResp {
    user_id: String,
    profile_created: bool,
}

fn session_resp(session: &SessionStore) -> Response {
    match session.user_id() {
        Ok(user_id) => Json(SessionResp {
            user_id,
            profile_created: session.profile_created(),
        })
        .into_response(),
        Err(e) => {
            error!(target: "api", error = ?e, "session unavailable");
            error_json(StatusCode::INTERNAL_SERVER_ERROR, "session_unavailable")
        }
    }
}

async fn session_info(State(state): State<AppState>) -> Response {
    session_resp(&state.session)
}

#[derive(Deserialize)]
struct ProfileReq {
    #[serde(default = "default_true")]
    created: bool,
}

fn default_true() -> bool {
    true
}

async fn set_profile(State(state): State<AppState>, Json(body): Json<ProfileReq>) -> Response {
    if let Err(e) = state.session.set_profile_created(body.created) {
        error!(target: "api", error = ?e, "could not store profile flag");
        return error_json(StatusCode::INTERNAL_SERVER_ERROR, "session_unavailable");
    }
    session_resp(&state.session)
}

async fn reset_session(State(state): State<AppState>) -> Response {
    if let Err(e) = state.session.reset() {
        error!(target: "api", error = ?e, "could not reset session");
        return error_json(StatusCode::INTERNAL_SERVER_ERROR, "session_unavailable");
    }
    session_resp(&state.session)
}

async fn reload(State(state): State<AppState>) -> impl IntoResponse {
    info!(target: "api", "reload requested");
    spawn_load(&state);
    (StatusCode::ACCEPTED, Json(json!({ "status": "reloading" })))
}
