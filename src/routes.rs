use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    database::{PAGE_SIZE, PostRecord, ReportRecord, ScanFilters, is_unique_violation},
    error::AppError,
    geo::{GeoPoint, ProximityQuery, find_nearby},
    state::State as AppState,
};

pub async fn root_handler() -> impl IntoResponse {
    "This is the backend service for UW Wildlife."
}

pub async fn health_handler() -> impl IntoResponse {
    Json(json!({ "status": "OK" }))
}

#[derive(Deserialize)]
pub struct NearbyParams {
    lat: Option<f64>,
    lon: Option<f64>,
    report_count: Option<i64>,
    animal_type: Option<String>,
    severity: Option<i64>,
}

pub async fn nearby_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<NearbyParams>,
) -> Result<impl IntoResponse, AppError> {
    let (Some(lat), Some(lon)) = (params.lat, params.lon) else {
        return Err(AppError::InvalidArgument(
            "missing lat/lon coordinates".to_string(),
        ));
    };

    let query = ProximityQuery::new(
        lat,
        lon,
        params.report_count,
        params.animal_type,
        params.severity,
    )?;

    let result = find_nearby(&state.store, &query).await?;

    Ok(Json(result))
}

pub async fn report_handler(
    State(state): State<Arc<AppState>>,
    Path(report_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let report = state
        .store
        .get_report(report_id)
        .await?
        .ok_or(AppError::NotFound)?;

    Ok(Json(report))
}

#[derive(Deserialize)]
pub struct ReportPageParams {
    page: Option<i64>,
    animal_type: Option<String>,
    severity: Option<i64>,
}

#[derive(Serialize)]
pub struct ReportPage {
    reports: Vec<ReportRecord>,
    #[serde(rename = "hasMore")]
    has_more: bool,
    page: i64,
    #[serde(rename = "totalPages")]
    total_pages: i64,
}

fn total_pages(total: i64) -> i64 {
    (total + PAGE_SIZE - 1) / PAGE_SIZE
}

pub async fn reports_page_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ReportPageParams>,
) -> Result<impl IntoResponse, AppError> {
    let page = params
        .page
        .filter(|p| *p >= 1)
        .ok_or_else(|| AppError::InvalidArgument("invalid page number".to_string()))?;

    let filters = ScanFilters {
        animal_type: params.animal_type,
        severity: params.severity,
    };

    let total_pages = total_pages(state.store.count_reports(&filters).await?);
    if page > total_pages && total_pages != 0 {
        return Err(AppError::InvalidArgument(
            "page number exceeds total pages".to_string(),
        ));
    }

    let reports = state.store.page_reports(&filters, page).await?;

    Ok(Json(ReportPage {
        reports,
        has_more: page < total_pages,
        page,
        total_pages,
    }))
}

#[derive(Deserialize)]
pub struct LatestParams {
    report_count: Option<i64>,
    animal_type: Option<String>,
    severity: Option<i64>,
}

#[derive(Serialize)]
pub struct LatestReports {
    reports: Vec<ReportRecord>,
}

pub async fn latest_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LatestParams>,
) -> Result<impl IntoResponse, AppError> {
    // Unlike /nearby, an explicit out-of-range count here is the caller's
    // mistake and gets a 400 instead of the default
    let report_count = match params.report_count {
        None => 10,
        Some(n) if (1..=100).contains(&n) => n,
        Some(n) => {
            return Err(AppError::InvalidArgument(format!(
                "invalid report_count {n} (must be 1-100)"
            )));
        }
    };

    let filters = ScanFilters {
        animal_type: params.animal_type,
        severity: params.severity,
    };

    let reports = state.store.latest_reports(&filters, report_count).await?;

    Ok(Json(LatestReports { reports }))
}

#[derive(Deserialize)]
pub struct CreateReport {
    pub user_id: Option<String>,
    pub location_lat: Option<f64>,
    pub location_lon: Option<f64>,
    pub location_name: Option<String>,
    pub severity: Option<i64>,
    pub animal_type: Option<String>,
    pub description: Option<String>,
    pub date_reported: Option<String>,
    #[serde(default)]
    pub image_exists: bool,
}

#[derive(Serialize)]
pub struct ReportCreated {
    message: &'static str,
    report_id: i64,
}

pub async fn create_report_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateReport>,
) -> Result<impl IntoResponse, AppError> {
    let (Some(severity), Some(animal_type), Some(description), Some(date_reported)) = (
        payload.severity,
        payload.animal_type,
        payload.description,
        payload.date_reported,
    ) else {
        return Err(AppError::InvalidArgument(
            "missing required report data".to_string(),
        ));
    };

    if severity < 1 {
        return Err(AppError::InvalidArgument(format!(
            "severity {severity} must be a positive integer"
        )));
    }

    // Coordinates come as a pair or not at all
    let location = match (payload.location_lat, payload.location_lon) {
        (Some(lat), Some(lon)) => Some(GeoPoint::new(lat, lon)?),
        (None, None) => None,
        _ => {
            return Err(AppError::InvalidArgument(
                "location requires both lat and lon".to_string(),
            ));
        }
    };

    let store = &state.store;
    let report_id = state.ids.allocate(|id| store.report_id_exists(id)).await?;

    let mut record = ReportRecord {
        report_id,
        user_id: payload.user_id,
        location_lat: location.map(|p| p.lat),
        location_lon: location.map(|p| p.lon),
        location_name: payload.location_name,
        severity,
        animal_type,
        description,
        date_reported,
        date_created: Utc::now(),
        image_exists: payload.image_exists,
    };

    if let Err(e) = store.insert_report(&record).await {
        if !is_unique_violation(&e) {
            return Err(e.into());
        }

        // Lost the allocate/insert race to a concurrent writer; the insert
        // is the authoritative collision check, so draw once more
        record.report_id = state.ids.allocate(|id| store.report_id_exists(id)).await?;
        store.insert_report(&record).await?;
    }

    Ok((
        StatusCode::CREATED,
        Json(ReportCreated {
            message: "Report created successfully",
            report_id: record.report_id,
        }),
    ))
}

pub async fn download_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    let reports = state.store.dump_reports().await?;

    Ok(Json(reports))
}

#[derive(Deserialize)]
pub struct PostParams {
    post_id: Option<i64>,
}

pub async fn post_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PostParams>,
) -> Result<impl IntoResponse, AppError> {
    let post_id = params
        .post_id
        .ok_or_else(|| AppError::InvalidArgument("missing post_id".to_string()))?;

    let post = state.store.get_post(post_id).await?.ok_or(AppError::NotFound)?;

    Ok(Json(post))
}

#[derive(Deserialize)]
pub struct DiscussionPageParams {
    page: Option<i64>,
}

#[derive(Serialize)]
pub struct DiscussionPage {
    posts: Vec<PostRecord>,
    #[serde(rename = "hasMore")]
    has_more: bool,
}

pub async fn discussion_page_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<DiscussionPageParams>,
) -> Result<impl IntoResponse, AppError> {
    let page = params
        .page
        .filter(|p| *p >= 1)
        .ok_or_else(|| AppError::InvalidArgument("invalid page number".to_string()))?;

    let total_pages = total_pages(state.store.count_posts().await?);
    if page > total_pages && total_pages != 0 {
        return Err(AppError::InvalidArgument(
            "page number exceeds total pages".to_string(),
        ));
    }

    let posts = state.store.page_posts(page).await?;

    Ok(Json(DiscussionPage {
        posts,
        has_more: page < total_pages,
    }))
}

#[derive(Deserialize)]
pub struct CreatePost {
    pub user_id: Option<String>,
    pub title: Option<String>,
    pub message: Option<String>,
}

#[derive(Serialize)]
pub struct PostCreated {
    message: &'static str,
    post_id: i64,
}

pub async fn create_post_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreatePost>,
) -> Result<impl IntoResponse, AppError> {
    let (Some(title), Some(message)) = (payload.title, payload.message) else {
        return Err(AppError::InvalidArgument(
            "missing required post data".to_string(),
        ));
    };

    if title.is_empty() || message.is_empty() {
        return Err(AppError::InvalidArgument(
            "title and message must not be empty".to_string(),
        ));
    }

    let store = &state.store;
    let post_id = state.ids.allocate(|id| store.post_id_exists(id)).await?;

    let mut record = PostRecord {
        post_id,
        user_id: payload.user_id,
        title,
        message,
        date_created: Utc::now(),
    };

    if let Err(e) = store.insert_post(&record).await {
        if !is_unique_violation(&e) {
            return Err(e.into());
        }

        record.post_id = state.ids.allocate(|id| store.post_id_exists(id)).await?;
        store.insert_post(&record).await?;
    }

    Ok((
        StatusCode::CREATED,
        Json(PostCreated {
            message: "Post created successfully",
            post_id: record.post_id,
        }),
    ))
}
