//! Per-slug aggregate bundles: named dimension dictionaries plus scalar
//! counters, serialized as one JSON value per entity row.

use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::enrich::EnrichedEvent;

fn bump(map: &mut HashMap<String, i64>, key: impl Into<String>) {
    *map.entry(key.into()).or_insert(0) += 1;
}

fn bump_opt(map: &mut HashMap<String, i64>, key: &Option<String>) {
    if let Some(key) = key.as_deref().filter(|k| !k.is_empty()) {
        bump(map, key);
    }
}

/// `"<name> <version>"` dictionary key for version dimensions.
fn version_key(name: &str, version: &Option<String>) -> Option<String> {
    version
        .as_deref()
        .filter(|v| !v.is_empty())
        .map(|v| format!("{} {}", name, v))
}

fn date_key(now: DateTime<Utc>) -> String {
    now.format("%Y-%m-%d").to_string()
}

/// Aggregate bundle for a short link.
///
/// Every dictionary maps a dimension key to a hit count. `visitors` is a
/// hit-count-per-visitor map, not a distinct count: the unique-visitor figure
/// is the size of the map, computed by readers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LinkAnalytics {
    pub referrers: HashMap<String, i64>,
    pub browsers: HashMap<String, i64>,
    pub browser_versions: HashMap<String, i64>,
    pub operating_systems: HashMap<String, i64>,
    pub os_versions: HashMap<String, i64>,
    pub devices: HashMap<String, i64>,
    pub device_models: HashMap<String, i64>,
    pub countries: HashMap<String, i64>,
    pub regions: HashMap<String, i64>,
    pub cities: HashMap<String, i64>,
    pub languages: HashMap<String, i64>,
    pub timezones: HashMap<String, i64>,
    pub screen_resolutions: HashMap<String, i64>,
    pub utm_sources: HashMap<String, i64>,
    pub utm_mediums: HashMap<String, i64>,
    pub utm_campaigns: HashMap<String, i64>,
    pub platforms: HashMap<String, i64>,
    pub in_app_browsers: HashMap<String, i64>,
    pub connection_types: HashMap<String, i64>,
    pub clicks_by_date: HashMap<String, i64>,
    pub clicks_by_hour: HashMap<String, i64>,
    pub clicks_by_weekday: HashMap<String, i64>,
    pub visitors: HashMap<String, i64>,
    pub bot_clicks: i64,
    pub human_clicks: i64,
    pub dark_mode_users: i64,
    pub light_mode_users: i64,
}

impl LinkAnalytics {
    /// Fold one canonical event into the bundle. Time buckets derive from the
    /// server clock passed in, never from client input.
    pub fn apply(&mut self, fields: &EnrichedEvent, now: DateTime<Utc>) {
        bump(&mut self.referrers, fields.referrer_host.as_str());
        bump(&mut self.browsers, fields.browser.as_str());
        if let Some(key) = version_key(&fields.browser, &fields.browser_version) {
            bump(&mut self.browser_versions, key);
        }
        bump(&mut self.operating_systems, fields.os.as_str());
        if let Some(key) = version_key(&fields.os, &fields.os_version) {
            bump(&mut self.os_versions, key);
        }

        // Exactly one of the three fixed device keys, never a new key
        let device = if fields.is_tablet {
            "tablet"
        } else if fields.is_mobile {
            "mobile"
        } else {
            "desktop"
        };
        bump(&mut self.devices, device);

        bump_opt(&mut self.device_models, &fields.device_model);
        bump_opt(&mut self.countries, &fields.country);
        bump_opt(&mut self.regions, &fields.region);
        bump_opt(&mut self.cities, &fields.city);
        bump_opt(&mut self.languages, &fields.language);
        bump_opt(&mut self.timezones, &fields.timezone);

        if let (Some(w), Some(h)) = (fields.screen_width, fields.screen_height) {
            bump(&mut self.screen_resolutions, format!("{}x{}", w, h));
        }

        bump_opt(&mut self.utm_sources, &fields.utm_source);
        bump_opt(&mut self.utm_mediums, &fields.utm_medium);
        bump_opt(&mut self.utm_campaigns, &fields.utm_campaign);
        bump_opt(&mut self.platforms, &fields.platform);
        if fields.is_in_app_browser {
            bump_opt(&mut self.in_app_browsers, &fields.app_name);
        }
        bump_opt(&mut self.connection_types, &fields.connection_type);

        bump(&mut self.clicks_by_date, date_key(now));
        bump(&mut self.clicks_by_hour, now.hour().to_string());
        bump(
            &mut self.clicks_by_weekday,
            now.weekday().num_days_from_sunday().to_string(),
        );

        if let Some(visitor) = fields.visitor_id.as_deref().filter(|v| !v.is_empty()) {
            bump(&mut self.visitors, visitor);
        }

        if fields.is_bot {
            self.bot_clicks += 1;
        } else {
            self.human_clicks += 1;
        }

        match fields.prefers_dark_mode {
            Some(true) => self.dark_mode_users += 1,
            Some(false) => self.light_mode_users += 1,
            None => {}
        }
    }

    /// Distinct visitors seen so far: the size of the visitor-hit map.
    pub fn unique_visitors(&self) -> usize {
        self.visitors.len()
    }
}

/// Aggregate bundle for an uploaded file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FileAnalytics {
    pub downloads_by_date: HashMap<String, i64>,
    pub views_by_date: HashMap<String, i64>,
    pub countries: HashMap<String, i64>,
    pub cities: HashMap<String, i64>,
    pub browsers: HashMap<String, i64>,
    pub operating_systems: HashMap<String, i64>,
    pub devices: HashMap<String, i64>,
    pub referrers: HashMap<String, i64>,
    pub platforms: HashMap<String, i64>,
    pub languages: HashMap<String, i64>,
    pub screen_resolutions: HashMap<String, i64>,
}

impl FileAnalytics {
    /// Fold one info-fetch (view) event into the bundle.
    pub fn apply_view(&mut self, fields: &EnrichedEvent, now: DateTime<Utc>) {
        bump(&mut self.views_by_date, date_key(now));
        bump_opt(&mut self.countries, &fields.country);
        bump_opt(&mut self.cities, &fields.city);
        bump(&mut self.browsers, fields.browser.as_str());
        bump(&mut self.operating_systems, fields.os.as_str());
        bump(&mut self.devices, fields.device_type.as_str());
        bump(&mut self.referrers, fields.referrer_host.as_str());
        bump_opt(&mut self.platforms, &fields.platform);
        bump_opt(&mut self.languages, &fields.language);
        if let (Some(w), Some(h)) = (fields.screen_width, fields.screen_height) {
            bump(&mut self.screen_resolutions, format!("{}x{}", w, h));
        }
    }

    /// Fold one completed download into the per-date download bucket.
    pub fn apply_download(&mut self, now: DateTime<Utc>) {
        bump(&mut self.downloads_by_date, date_key(now));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event_with_browser(browser: &str) -> EnrichedEvent {
        EnrichedEvent {
            browser: browser.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn browser_counts_sum_to_event_count() {
        let mut bundle = LinkAnalytics::default();
        let now = Utc::now();
        let browsers = ["Chrome", "Firefox", "Safari", "Edge", "Chrome"];
        for browser in browsers {
            bundle.apply(&event_with_browser(browser), now);
        }

        let total: i64 = bundle.browsers.values().sum();
        assert_eq!(total, browsers.len() as i64);
        assert_eq!(bundle.browsers["Chrome"], 2);
        assert_eq!(bundle.human_clicks, browsers.len() as i64);
        assert_eq!(bundle.bot_clicks, 0);
    }

    #[test]
    fn device_triple_increments_exactly_one_fixed_key() {
        let mut bundle = LinkAnalytics::default();
        let now = Utc::now();

        let mut mobile = EnrichedEvent::default();
        mobile.is_mobile = true;
        mobile.is_desktop = false;
        bundle.apply(&mobile, now);
        bundle.apply(&EnrichedEvent::default(), now);

        assert_eq!(bundle.devices.len(), 2);
        assert_eq!(bundle.devices["mobile"], 1);
        assert_eq!(bundle.devices["desktop"], 1);
        let total: i64 = bundle.devices.values().sum();
        assert_eq!(total, 2);
    }

    #[test]
    fn version_keys_are_synthesized() {
        let mut bundle = LinkAnalytics::default();
        let mut event = event_with_browser("Chrome");
        event.browser_version = Some("120.0".to_string());
        event.os = "Windows 10".to_string();
        event.os_version = Some("NT 10.0".to_string());
        bundle.apply(&event, Utc::now());

        assert_eq!(bundle.browser_versions["Chrome 120.0"], 1);
        assert_eq!(bundle.os_versions["Windows 10 NT 10.0"], 1);

        // No version -> no synthesized key
        let mut bundle = LinkAnalytics::default();
        bundle.apply(&event_with_browser("Chrome"), Utc::now());
        assert!(bundle.browser_versions.is_empty());
    }

    #[test]
    fn visitor_map_counts_hits_not_distinct() {
        let mut bundle = LinkAnalytics::default();
        let now = Utc::now();
        for visitor in ["v1", "v1", "v2", "v1"] {
            let mut event = EnrichedEvent::default();
            event.visitor_id = Some(visitor.to_string());
            bundle.apply(&event, now);
        }

        assert_eq!(bundle.visitors["v1"], 3);
        assert_eq!(bundle.visitors["v2"], 1);
        assert_eq!(bundle.unique_visitors(), 2);
    }

    #[test]
    fn dark_mode_counters_only_when_reported() {
        let mut bundle = LinkAnalytics::default();
        let now = Utc::now();

        bundle.apply(&EnrichedEvent::default(), now);
        let mut dark = EnrichedEvent::default();
        dark.prefers_dark_mode = Some(true);
        bundle.apply(&dark, now);

        assert_eq!(bundle.dark_mode_users, 1);
        assert_eq!(bundle.light_mode_users, 0);
    }

    #[test]
    fn time_buckets_derive_from_server_clock() {
        let mut bundle = LinkAnalytics::default();
        let now = "2026-08-23T14:30:00Z".parse::<DateTime<Utc>>().unwrap();
        bundle.apply(&EnrichedEvent::default(), now);

        // 2026-08-23 is a Sunday
        assert_eq!(bundle.clicks_by_date["2026-08-23"], 1);
        assert_eq!(bundle.clicks_by_hour["14"], 1);
        assert_eq!(bundle.clicks_by_weekday["0"], 1);
    }

    #[test]
    fn bundle_round_trips_through_json() {
        let mut bundle = LinkAnalytics::default();
        bundle.apply(&event_with_browser("Chrome"), Utc::now());

        let json = serde_json::to_string(&bundle).unwrap();
        let parsed: LinkAnalytics = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.browsers["Chrome"], 1);

        // Older rows missing newer fields still parse
        let sparse: LinkAnalytics = serde_json::from_str("{}").unwrap();
        assert!(sparse.browsers.is_empty());
    }

    #[test]
    fn file_view_and_download_buckets() {
        let mut bundle = FileAnalytics::default();
        let now = "2026-08-24T10:00:00Z".parse::<DateTime<Utc>>().unwrap();

        bundle.apply_view(&EnrichedEvent::default(), now);
        bundle.apply_download(now);
        bundle.apply_download(now);

        assert_eq!(bundle.views_by_date["2026-08-24"], 1);
        assert_eq!(bundle.downloads_by_date["2026-08-24"], 2);
        assert_eq!(bundle.browsers["Unknown"], 1);
    }
}
