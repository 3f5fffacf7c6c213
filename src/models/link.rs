use serde::{Deserialize, Serialize};

use crate::analytics::LinkAnalytics;

/// One shortened URL together with its per-slug aggregate.
///
/// Timestamps are Unix milliseconds. `clicks` eventually equals the number of
/// detail events recorded for the slug; the two are written independently and
/// are not transactionally coupled.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShortLink {
    pub slug: String,
    pub original_url: String,
    pub created_at: i64,
    pub expires_at: Option<i64>,
    pub clicks: i64,
    pub analytics: LinkAnalytics,
}

impl ShortLink {
    pub fn is_expired(&self, now_ms: i64) -> bool {
        matches!(self.expires_at, Some(at) if at <= now_ms)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLinkRequest {
    pub url: String,
    #[serde(default, alias = "customSlug")]
    pub slug: Option<String>,
    #[serde(default)]
    pub expires_in: Option<ExpiresIn>,
}

/// Enumerated relative lifetimes accepted at creation time. Anything else is
/// rejected at deserialization; omitting the field means the entry never
/// expires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExpiresIn {
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "1d")]
    OneDay,
    #[serde(rename = "7d")]
    OneWeek,
    #[serde(rename = "30d")]
    OneMonth,
}

impl ExpiresIn {
    pub fn duration_ms(self) -> i64 {
        match self {
            ExpiresIn::OneHour => 3_600_000,
            ExpiresIn::OneDay => 86_400_000,
            ExpiresIn::OneWeek => 7 * 86_400_000,
            ExpiresIn::OneMonth => 30 * 86_400_000,
        }
    }
}
