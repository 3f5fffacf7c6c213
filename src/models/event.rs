use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::enrich::EnrichedEvent;

/// One immutable detail record per tracked link click. Created once, never
/// mutated; bulk-deleted only together with its parent link.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClickEvent {
    pub slug: String,
    /// Unix milliseconds
    pub timestamp: i64,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub referer: Option<String>,
    pub referrer_host: String,
    pub browser: String,
    pub browser_version: Option<String>,
    pub os: String,
    pub os_version: Option<String>,
    pub device_type: String,
    pub device_model: Option<String>,
    pub is_mobile: bool,
    pub is_tablet: bool,
    pub is_desktop: bool,
    pub country: Option<String>,
    pub region: Option<String>,
    pub city: Option<String>,
    pub language: Option<String>,
    pub timezone: Option<String>,
    pub screen_width: Option<i64>,
    pub screen_height: Option<i64>,
    pub utm_source: Option<String>,
    pub utm_medium: Option<String>,
    pub utm_campaign: Option<String>,
    pub utm_term: Option<String>,
    pub utm_content: Option<String>,
    /// 0-23, derived from server time at record creation
    pub hour_of_day: u32,
    /// 0 (Sunday) - 6 (Saturday), derived from server time
    pub day_of_week: u32,
}

impl Default for ClickEvent {
    fn default() -> Self {
        Self {
            slug: String::new(),
            timestamp: 0,
            ip: None,
            user_agent: None,
            referer: None,
            referrer_host: "direct".to_string(),
            browser: "Unknown".to_string(),
            browser_version: None,
            os: "Unknown".to_string(),
            os_version: None,
            device_type: "desktop".to_string(),
            device_model: None,
            is_mobile: false,
            is_tablet: false,
            is_desktop: true,
            country: None,
            region: None,
            city: None,
            language: None,
            timezone: None,
            screen_width: None,
            screen_height: None,
            utm_source: None,
            utm_medium: None,
            utm_campaign: None,
            utm_term: None,
            utm_content: None,
            hour_of_day: 0,
            day_of_week: 0,
        }
    }
}

impl ClickEvent {
    pub fn from_enriched(slug: &str, fields: &EnrichedEvent, now: DateTime<Utc>) -> Self {
        Self {
            slug: slug.to_string(),
            timestamp: now.timestamp_millis(),
            ip: fields.ip.clone(),
            user_agent: fields.user_agent.clone(),
            referer: fields.referer.clone(),
            referrer_host: fields.referrer_host.clone(),
            browser: fields.browser.clone(),
            browser_version: fields.browser_version.clone(),
            os: fields.os.clone(),
            os_version: fields.os_version.clone(),
            device_type: fields.device_type.clone(),
            device_model: fields.device_model.clone(),
            is_mobile: fields.is_mobile,
            is_tablet: fields.is_tablet,
            is_desktop: fields.is_desktop,
            country: fields.country.clone(),
            region: fields.region.clone(),
            city: fields.city.clone(),
            language: fields.language.clone(),
            timezone: fields.timezone.clone(),
            screen_width: fields.screen_width,
            screen_height: fields.screen_height,
            utm_source: fields.utm_source.clone(),
            utm_medium: fields.utm_medium.clone(),
            utm_campaign: fields.utm_campaign.clone(),
            utm_term: fields.utm_term.clone(),
            utm_content: fields.utm_content.clone(),
            hour_of_day: now.hour(),
            day_of_week: now.weekday().num_days_from_sunday(),
        }
    }
}
