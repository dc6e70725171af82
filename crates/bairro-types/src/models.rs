use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Row status shared by users, sessions and reports: `A`ctive or `I`nactive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordStatus {
    #[serde(rename = "A")]
    Active,
    #[serde(rename = "I")]
    Inactive,
}

impl RecordStatus {
    pub fn code(self) -> &'static str {
        match self {
            Self::Active => "A",
            Self::Inactive => "I",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "A" => Some(Self::Active),
            "I" => Some(Self::Inactive),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VoteDirection {
    Up,
    Down,
}

impl VoteDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Up => "UP",
            Self::Down => "DOWN",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "UP" => Some(Self::Up),
            "DOWN" => Some(Self::Down),
            _ => None,
        }
    }
}

// -- Sessions --

/// What a session exposes about its owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: i64,
    pub username: String,
    pub admin: bool,
}

/// Normalized session view returned by login, registration and lookups.
///
/// `private_token` is only filled in when the caller already proved it holds
/// the credential (login, registration, request resolution).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: i64,
    pub user: Option<UserSummary>,
    pub public_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_token: Option<String>,
    pub expires_at: DateTime<Utc>,
}

// -- Reports --

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportMedia {
    pub id: i64,
    pub base64: String,
}

/// A persisted report as returned by the submission endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub body: String,
    pub city_id: i64,
    pub district_id: i64,
    pub category_id: i64,
    pub status: RecordStatus,
    pub votes: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub medias: Vec<ReportMedia>,
}

/// Indexed name plus display label of a taxonomy entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxonRef {
    pub indexed_name: String,
    pub name: String,
}

/// Denormalized read-side projection used by listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportView {
    pub id: i64,
    pub title: String,
    pub body: String,
    pub username: String,
    pub city: TaxonRef,
    pub district: TaxonRef,
    pub category: TaxonRef,
    pub votes: i64,
    pub time_since: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub medias: Vec<ReportMedia>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub data: Vec<T>,
    pub page: u32,
    pub total_data: u64,
    pub total_pages: u64,
}

// -- Taxonomy --

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CityEntry {
    pub indexed_name: String,
    pub name: String,
    pub districts: Vec<TaxonRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Taxonomy {
    pub cities: Vec<CityEntry>,
    pub categories: Vec<TaxonRef>,
}
