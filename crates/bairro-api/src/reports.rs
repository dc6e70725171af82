use std::collections::HashMap;

use axum::{
    Extension, Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
};
use base64::{Engine, engine::general_purpose::STANDARD};
use chrono::{DateTime, Utc};
use tracing::{info, warn};

use bairro_db::Database;
use bairro_db::models::{
    MediaRow, NewReport, RateLimit, ReportInsert, ReportListingRow, ReportQuery, SortColumn,
};
use bairro_types::api::{ReportFilters, SubmitReportRequest};
use bairro_types::error::FieldError;
use bairro_types::models::{
    Page, RecordStatus, Report, ReportMedia, ReportView, Session, TaxonRef,
};

use crate::auth::{AppState, Policy, blocking};
use crate::error::ApiError;
use crate::moderation::ProfanityFilter;
use crate::taxonomy;

const TITLE_CHARS: usize = 50;
const DEFAULT_PAGE: u32 = 1;
const DEFAULT_LIMIT: u32 = 25;
const MAX_LIMIT: u32 = 100;

// -- Submission --

/// Validate, moderate and persist a new report for the session's user.
/// Checks run in a fixed order and the first failing stage wins; nothing is
/// written unless every stage passes.
pub fn submit(
    db: &Database,
    policy: &Policy,
    filter: &ProfanityFilter,
    session: &Session,
    payload: &SubmitReportRequest,
) -> Result<Report, ApiError> {
    let user = session
        .user
        .as_ref()
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    let now = Utc::now();

    let limit = RateLimit {
        since: now
            .checked_sub_signed(policy.rate_limit_window)
            .unwrap_or(DateTime::<Utc>::MIN_UTC),
        max: policy.rate_limit_max,
    };

    // Fail fast before validation; the insert re-checks under the write lock.
    let recent = db.count_reports_since(user.id, limit.since)?;
    if recent >= limit.max {
        return Err(rate_limited(policy, user.id, recent));
    }

    let fields = validate_submission(payload);
    if !fields.is_empty() {
        return Err(ApiError::validation("Invalid report", fields));
    }

    if filter.is_profane(&payload.body) {
        return Err(ApiError::not_allowed("Report contains inappropriate language")
            .with_field("body", "Inappropriate language"));
    }

    let location = taxonomy::resolve_location(
        db,
        payload.city.trim(),
        payload.district.trim(),
        payload.category.trim(),
    )?;

    let body = payload.body.trim();
    let title: String = body.chars().take(TITLE_CHARS).collect();
    let medias: Vec<String> = payload
        .medias
        .iter()
        .map(|m| m.base64.trim().to_string())
        .collect();

    let inserted = db.create_report_within_limit(
        &NewReport {
            user_id: user.id,
            title: &title,
            body,
            city_id: location.city_id,
            district_id: location.district_id,
            category_id: location.category_id,
            created_at: now,
        },
        &medias,
        &limit,
    )?;
    let (row, media_rows) = match inserted {
        ReportInsert::Created { report, media } => (report, media),
        ReportInsert::RateLimited { recent } => return Err(rate_limited(policy, user.id, recent)),
    };

    info!("Report {} created by {} ({} media)", row.id, user.username, media_rows.len());

    Ok(Report {
        id: row.id,
        user_id: row.user_id,
        title: row.title,
        body: row.body,
        city_id: row.city_id,
        district_id: row.district_id,
        category_id: row.category_id,
        status: RecordStatus::from_code(&row.status).unwrap_or(RecordStatus::Active),
        votes: row.votes,
        created_at: row.created_at,
        updated_at: row.updated_at,
        medias: media_rows.into_iter().map(media_view).collect(),
    })
}

fn rate_limited(policy: &Policy, user_id: i64, recent: i64) -> ApiError {
    warn!("Rate limit hit for user {} ({} recent reports)", user_id, recent);
    ApiError::not_allowed(format!(
        "You must wait {} minutes between reports",
        policy.rate_limit_window.num_minutes()
    ))
}

fn validate_submission(payload: &SubmitReportRequest) -> Vec<FieldError> {
    let mut fields = Vec::new();

    for (name, value) in [
        ("body", &payload.body),
        ("city", &payload.city),
        ("district", &payload.district),
        ("category", &payload.category),
    ] {
        if value.trim().is_empty() {
            fields.push(FieldError::new(name, format!("{name} is required")));
        }
    }

    for (i, media) in payload.medias.iter().enumerate() {
        if !is_valid_media(&media.base64) {
            fields.push(FieldError::new(format!("medias[{i}]"), "Media must be base64 encoded"));
        }
    }

    fields
}

/// Accepts bare base64 or a `data:<mime>;base64,` URL.
fn is_valid_media(raw: &str) -> bool {
    let raw = raw.trim();
    let encoded = match raw.strip_prefix("data:") {
        Some(rest) => match rest.split_once(";base64,") {
            Some((_, data)) => data,
            None => return false,
        },
        None => raw,
    };
    !encoded.is_empty() && STANDARD.decode(encoded).is_ok()
}

// -- Listing --

/// Validated listing parameters, before taxonomy resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingParams {
    pub search: Option<String>,
    pub page: u32,
    pub limit: u32,
    pub status: Option<RecordStatus>,
    pub sort: SortColumn,
    pub descending: bool,
}

pub fn validate_filters(filters: &ReportFilters) -> Result<ListingParams, ApiError> {
    let page = match non_empty(&filters.page) {
        None => DEFAULT_PAGE,
        Some(raw) => raw
            .parse::<u32>()
            .ok()
            .filter(|p| *p >= 1)
            .ok_or_else(|| ApiError::bad_request("Invalid page").with_field("page", "Invalid page"))?,
    };

    let limit = match non_empty(&filters.limit) {
        None => DEFAULT_LIMIT,
        Some(raw) => raw
            .parse::<u32>()
            .ok()
            .filter(|l| (1..=MAX_LIMIT).contains(l))
            .ok_or_else(|| {
                ApiError::bad_request("Invalid limit").with_field("limit", "Invalid limit")
            })?,
    };

    let status = match non_empty(&filters.status) {
        None => None,
        Some(raw) => Some(RecordStatus::from_code(raw).ok_or_else(|| {
            ApiError::bad_request("Invalid status").with_field("status", "Invalid status")
        })?),
    };

    let sort = match non_empty(&filters.sort_field) {
        None | Some("created_at") => SortColumn::CreatedAt,
        Some("updated_at") => SortColumn::UpdatedAt,
        Some("votes") => SortColumn::Votes,
        Some(_) => {
            return Err(ApiError::bad_request("Invalid sortField")
                .with_field("sortField", "Invalid sortField"));
        }
    };

    let descending = match non_empty(&filters.sort_order) {
        None | Some("asc") => false,
        Some("desc") => true,
        Some(_) => {
            return Err(ApiError::bad_request("Invalid sortOrder")
                .with_field("sortOrder", "Invalid sortOrder"));
        }
    };

    Ok(ListingParams {
        search: non_empty(&filters.search).map(str::to_string),
        page,
        limit,
        status,
        sort,
        descending,
    })
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// One page of report views. Taxonomy filters that do not resolve are
/// dropped rather than rejected.
pub fn list(db: &Database, filters: &ReportFilters) -> Result<Page<ReportView>, ApiError> {
    let params = validate_filters(filters)?;

    let city_id = match non_empty(&filters.city) {
        Some(name) => db.find_city(name)?.map(|c| c.id),
        None => None,
    };
    let district_ids = match (non_empty(&filters.district), city_id) {
        (Some(name), Some(city_id)) => db.find_district(name, city_id)?.map(|d| vec![d.id]),
        (Some(name), None) => {
            let ids: Vec<i64> = db
                .find_districts_by_name(name)?
                .into_iter()
                .map(|d| d.id)
                .collect();
            (!ids.is_empty()).then_some(ids)
        }
        (None, _) => None,
    };
    let category_id = match non_empty(&filters.category) {
        Some(name) => db.find_category(name)?.map(|c| c.id),
        None => None,
    };

    let query = ReportQuery {
        search: params.search,
        status: params.status.map(|s| s.code().to_string()),
        city_id,
        district_ids,
        category_id,
        sort: params.sort,
        descending: params.descending,
        offset: u64::from(params.page - 1) * u64::from(params.limit),
        limit: params.limit,
    };

    let (rows, total_data) = db.list_reports(&query)?;
    let data = project(db, rows, Utc::now())?;

    Ok(Page {
        data,
        page: params.page,
        total_data,
        total_pages: total_data.div_ceil(u64::from(params.limit)),
    })
}

pub fn get(db: &Database, id: i64) -> Result<ReportView, ApiError> {
    let row = db
        .get_report_listing(id)?
        .ok_or_else(|| ApiError::not_found("Report not found"))?;

    project(db, vec![row], Utc::now())?
        .pop()
        .ok_or_else(ApiError::internal)
}

fn project(
    db: &Database,
    rows: Vec<ReportListingRow>,
    now: DateTime<Utc>,
) -> Result<Vec<ReportView>, ApiError> {
    let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
    let mut media_by_report: HashMap<i64, Vec<ReportMedia>> = HashMap::new();
    for media in db.get_media_for_reports(&ids)? {
        media_by_report
            .entry(media.report_id)
            .or_default()
            .push(media_view(media));
    }

    Ok(rows
        .into_iter()
        .map(|r| ReportView {
            medias: media_by_report.remove(&r.id).unwrap_or_default(),
            time_since: time_since(r.created_at, now),
            id: r.id,
            title: r.title,
            body: r.body,
            username: r.username,
            city: TaxonRef {
                indexed_name: r.city_indexed_name,
                name: r.city_name,
            },
            district: TaxonRef {
                indexed_name: r.district_indexed_name,
                name: r.district_name,
            },
            category: TaxonRef {
                indexed_name: r.category_indexed_name,
                name: r.category_name,
            },
            votes: r.votes,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
        .collect())
}

fn media_view(row: MediaRow) -> ReportMedia {
    ReportMedia {
        id: row.id,
        base64: row.base64,
    }
}

/// Coarse relative age, e.g. "just now", "5 minutes ago", "1 day ago".
pub fn time_since(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - then).num_seconds().max(0);

    let (amount, unit) = match secs {
        s if s < 60 => return "just now".to_string(),
        s if s < 3_600 => (s / 60, "minute"),
        s if s < 86_400 => (s / 3_600, "hour"),
        s if s < 30 * 86_400 => (s / 86_400, "day"),
        s if s < 365 * 86_400 => (s / (30 * 86_400), "month"),
        s => (s / (365 * 86_400), "year"),
    };

    if amount == 1 {
        format!("1 {unit} ago")
    } else {
        format!("{amount} {unit}s ago")
    }
}

// -- Handlers --

/// GET /reports
pub async fn list_reports(
    State(state): State<AppState>,
    query: Result<Query<ReportFilters>, QueryRejection>,
) -> Result<Json<Page<ReportView>>, ApiError> {
    let Query(filters) = query.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let page = blocking(&state, move |s| list(&s.db, &filters)).await?;
    Ok(Json(page))
}

/// GET /reports/{id}
pub async fn get_report(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ReportView>, ApiError> {
    let id: i64 = id
        .parse()
        .map_err(|_| ApiError::not_found("Report not found"))?;
    let report = blocking(&state, move |s| get(&s.db, id)).await?;
    Ok(Json(report))
}

/// POST /reports (authenticated)
pub async fn submit_report(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    payload: Result<Json<SubmitReportRequest>, JsonRejection>,
) -> Result<Json<Report>, ApiError> {
    let Json(req) = payload?;
    let report = blocking(&state, move |s| {
        submit(&s.db, &s.policy, &s.profanity, &session, &req)
    })
    .await?;
    Ok(Json(report))
}
