//! Database row types. These map directly to SQLite rows.
//! Distinct from bairro-types API models to keep the DB layer independent.

use chrono::{DateTime, Utc};

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub password: String,
    pub status: String,
    pub admin: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct SessionRow {
    pub id: i64,
    pub user_id: Option<i64>,
    pub public_token: String,
    pub private_token: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

pub struct NewSession<'a> {
    pub user_id: i64,
    pub public_token: &'a str,
    pub private_token: &'a str,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// City or category.
#[derive(Debug, Clone)]
pub struct TaxonRow {
    pub id: i64,
    pub indexed_name: String,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct DistrictRow {
    pub id: i64,
    pub city_id: i64,
    pub indexed_name: String,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct ReportRow {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub body: String,
    pub city_id: i64,
    pub district_id: i64,
    pub category_id: i64,
    pub status: String,
    pub votes: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub struct NewReport<'a> {
    pub user_id: i64,
    pub title: &'a str,
    pub body: &'a str,
    pub city_id: i64,
    pub district_id: i64,
    pub category_id: i64,
    pub created_at: DateTime<Utc>,
}

/// Per-user submission cap checked inside the insert transaction.
#[derive(Debug, Clone, Copy)]
pub struct RateLimit {
    pub since: DateTime<Utc>,
    pub max: i64,
}

#[derive(Debug, Clone)]
pub enum ReportInsert {
    Created {
        report: ReportRow,
        media: Vec<MediaRow>,
    },
    /// Nothing was written; `recent` reports already fall in the window.
    RateLimited { recent: i64 },
}

#[derive(Debug, Clone)]
pub struct MediaRow {
    pub id: i64,
    pub report_id: i64,
    pub base64: String,
}

/// Report joined with its author and taxonomy labels.
#[derive(Debug, Clone)]
pub struct ReportListingRow {
    pub id: i64,
    pub title: String,
    pub body: String,
    pub username: String,
    pub city_indexed_name: String,
    pub city_name: String,
    pub district_indexed_name: String,
    pub district_name: String,
    pub category_indexed_name: String,
    pub category_name: String,
    pub votes: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct FeedbackRow {
    pub id: i64,
    pub report_id: i64,
    pub user_id: i64,
    pub kind: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortColumn {
    CreatedAt,
    UpdatedAt,
    Votes,
}

impl SortColumn {
    pub(crate) fn sql(self) -> &'static str {
        match self {
            Self::CreatedAt => "r.created_at",
            Self::UpdatedAt => "r.updated_at",
            Self::Votes => "r.votes",
        }
    }
}

/// Resolved listing constraints. `None` means unconstrained.
#[derive(Debug, Clone)]
pub struct ReportQuery {
    pub search: Option<String>,
    pub status: Option<String>,
    pub city_id: Option<i64>,
    pub district_ids: Option<Vec<i64>>,
    pub category_id: Option<i64>,
    pub sort: SortColumn,
    pub descending: bool,
    pub offset: u64,
    pub limit: u32,
}
