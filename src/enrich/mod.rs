//! Enrichment resolver: merges the client-reported payload, request headers,
//! and the UA/geo collaborators into one canonical fields record.
//!
//! This is a pure transform. Parse failures anywhere inside it degrade to the
//! `"Unknown"`/`"direct"` defaults and are never propagated.

pub mod geoip;
pub mod user_agent;

pub use geoip::{GeoFields, GeoIpService};
pub use user_agent::UaInfo;

use axum::http::HeaderMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::IpAddr;
use std::str::FromStr;

/// Client-reported enrichment payload. Every field is optional; absence of a
/// field group triggers the server-side fallback for that group.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientHints {
    pub browser: Option<String>,
    pub browser_version: Option<String>,
    pub os: Option<String>,
    pub os_version: Option<String>,
    pub device_type: Option<String>,
    pub device_model: Option<String>,
    pub is_mobile: Option<bool>,
    pub is_tablet: Option<bool>,
    pub is_desktop: Option<bool>,
    pub country: Option<String>,
    #[serde(alias = "regionName")]
    pub region: Option<String>,
    pub city: Option<String>,
    pub language: Option<String>,
    pub timezone: Option<String>,
    pub screen_width: Option<i64>,
    pub screen_height: Option<i64>,
    pub platform: Option<String>,
    pub is_in_app_browser: Option<bool>,
    pub app_name: Option<String>,
    pub connection_type: Option<String>,
    pub is_bot: Option<bool>,
    pub visitor_id: Option<String>,
    pub prefers_dark_mode: Option<bool>,
    pub utm_source: Option<String>,
    pub utm_medium: Option<String>,
    pub utm_campaign: Option<String>,
    pub utm_term: Option<String>,
    pub utm_content: Option<String>,
    pub client_ip: Option<String>,
    pub referer: Option<String>,
}

/// Canonical fields record produced by [`resolve`]. Everything downstream
/// (aggregate counters, detail event log) consumes this shape only.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EnrichedEvent {
    pub browser: String,
    pub browser_version: Option<String>,
    pub os: String,
    pub os_version: Option<String>,
    pub device_type: String,
    pub device_model: Option<String>,
    pub is_mobile: bool,
    pub is_tablet: bool,
    pub is_desktop: bool,
    pub referrer_host: String,
    pub referer: Option<String>,
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
    pub platform: Option<String>,
    pub is_in_app_browser: bool,
    pub app_name: Option<String>,
    pub connection_type: Option<String>,
    pub is_bot: bool,
    pub prefers_dark_mode: Option<bool>,
    pub visitor_id: Option<String>,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

impl Default for EnrichedEvent {
    fn default() -> Self {
        Self {
            browser: "Unknown".to_string(),
            browser_version: None,
            os: "Unknown".to_string(),
            os_version: None,
            device_type: "desktop".to_string(),
            device_model: None,
            is_mobile: false,
            is_tablet: false,
            is_desktop: true,
            referrer_host: "direct".to_string(),
            referer: None,
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
            platform: None,
            is_in_app_browser: false,
            app_name: None,
            connection_type: None,
            is_bot: false,
            prefers_dark_mode: None,
            visitor_id: None,
            ip: None,
            user_agent: None,
        }
    }
}

/// Resolve a raw inbound event into the canonical fields record.
///
/// Per field group: the device/browser/OS trio is taken verbatim from the
/// client when it reports a non-default browser name, otherwise derived from
/// the `User-Agent` header; location is taken from the client when a country
/// is present, otherwise from the geo collaborator when a usable client IP
/// exists; everything else is client-payload-only, with UTM parameters also
/// falling back to same-named query-string values.
pub fn resolve(
    payload: Option<&ClientHints>,
    headers: &HeaderMap,
    query: &HashMap<String, String>,
    remote_ip: Option<IpAddr>,
    geoip: Option<&GeoIpService>,
) -> EnrichedEvent {
    let mut event = EnrichedEvent::default();

    let user_agent = header_str(headers, "user-agent");
    event.user_agent = user_agent.clone();

    // Device / browser / OS group
    let client_browser = payload
        .and_then(|p| p.browser.as_deref())
        .filter(|b| !b.is_empty() && *b != "Unknown");

    if let (Some(payload), Some(browser)) = (payload, client_browser) {
        event.browser = browser.to_string();
        event.browser_version = payload.browser_version.clone();
        event.os = payload.os.clone().unwrap_or_else(|| "Unknown".to_string());
        event.os_version = payload.os_version.clone();
        event.device_model = payload.device_model.clone();

        let device_type = payload.device_type.as_deref();
        event.is_mobile = payload
            .is_mobile
            .unwrap_or(device_type == Some("mobile"));
        event.is_tablet = payload
            .is_tablet
            .unwrap_or(device_type == Some("tablet"));
        event.is_desktop = payload
            .is_desktop
            .unwrap_or(!event.is_mobile && !event.is_tablet);
        event.device_type = device_type
            .map(str::to_string)
            .unwrap_or_else(|| device_label(event.is_mobile, event.is_tablet).to_string());
    } else {
        let ua = user_agent::parse(user_agent.as_deref());
        event.browser = ua.browser;
        event.browser_version = ua.browser_version;
        event.os = ua.os;
        event.os_version = ua.os_version;
        event.device_model = ua.device_model;
        event.is_mobile = ua.is_mobile;
        event.is_tablet = ua.is_tablet;
        event.is_desktop = !ua.is_mobile && !ua.is_tablet;
        event.device_type = device_label(ua.is_mobile, ua.is_tablet).to_string();
    }

    // Bot flag is client-reported only; the fallback never infers it
    if let Some(bot) = payload.and_then(|p| p.is_bot) {
        event.is_bot = bot;
    }

    // Referrer: explicit payload value wins over the Referer header
    let referer = payload
        .and_then(|p| p.referer.clone())
        .or_else(|| header_str(headers, "referer"));
    event.referrer_host = referrer_host(referer.as_deref());
    event.referer = referer;

    // Language: client payload, else primary subtag of Accept-Language
    event.language = payload
        .and_then(|p| p.language.clone())
        .or_else(|| header_str(headers, "accept-language").and_then(|v| primary_language(&v)));

    // Client IP: payload value, proxy headers, then the socket address
    let client_ip = payload
        .and_then(|p| p.client_ip.as_deref())
        .and_then(parse_ip)
        .or_else(|| extract_header_ip(headers))
        .or(remote_ip);
    event.ip = client_ip.map(|ip| ip.to_string());

    // Location group
    let client_country = payload.and_then(|p| p.country.clone()).filter(|c| !c.is_empty());
    if let Some(country) = client_country {
        event.country = Some(country);
        event.region = payload.and_then(|p| p.region.clone());
        event.city = payload.and_then(|p| p.city.clone());
    } else if let (Some(geoip), Some(ip)) = (geoip, client_ip.filter(|ip| is_usable(*ip))) {
        let geo = geoip.lookup(ip);
        event.country = geo.country;
        event.region = geo.region;
        event.city = geo.city;
    }

    // UTM: payload, then same-named query parameters
    let utm = |field: Option<&String>, name: &str| -> Option<String> {
        field
            .cloned()
            .or_else(|| query.get(name).cloned())
            .filter(|v| !v.is_empty())
    };
    event.utm_source = utm(payload.and_then(|p| p.utm_source.as_ref()), "utm_source");
    event.utm_medium = utm(payload.and_then(|p| p.utm_medium.as_ref()), "utm_medium");
    event.utm_campaign = utm(payload.and_then(|p| p.utm_campaign.as_ref()), "utm_campaign");
    event.utm_term = utm(payload.and_then(|p| p.utm_term.as_ref()), "utm_term");
    event.utm_content = utm(payload.and_then(|p| p.utm_content.as_ref()), "utm_content");

    // Client-payload-only fields
    if let Some(payload) = payload {
        event.timezone = payload.timezone.clone();
        event.screen_width = payload.screen_width;
        event.screen_height = payload.screen_height;
        event.platform = payload.platform.clone();
        event.is_in_app_browser = payload.is_in_app_browser.unwrap_or(false);
        event.app_name = payload.app_name.clone();
        event.connection_type = payload.connection_type.clone();
        event.prefers_dark_mode = payload.prefers_dark_mode;
        event.visitor_id = payload.visitor_id.clone();
    }

    event
}

fn device_label(is_mobile: bool, is_tablet: bool) -> &'static str {
    if is_tablet {
        "tablet"
    } else if is_mobile {
        "mobile"
    } else {
        "desktop"
    }
}

fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Hostname of the referrer URL, or `"direct"` when absent or unparseable.
fn referrer_host(referer: Option<&str>) -> String {
    let Some(referer) = referer.filter(|r| !r.is_empty()) else {
        return "direct".to_string();
    };
    match url::Url::parse(referer) {
        Ok(parsed) => parsed
            .host_str()
            .map(str::to_string)
            .unwrap_or_else(|| "direct".to_string()),
        Err(_) => "direct".to_string(),
    }
}

/// Primary subtag of the first Accept-Language entry: "en-US,en;q=0.9" -> "en"
fn primary_language(accept_language: &str) -> Option<String> {
    let first = accept_language.split(',').next()?.trim();
    let primary = first.split(';').next()?.split('-').next()?.trim();
    if primary.is_empty() || primary == "*" {
        None
    } else {
        Some(primary.to_lowercase())
    }
}

fn parse_ip(raw: &str) -> Option<IpAddr> {
    // Strip an IPv6-mapped IPv4 prefix: "::ffff:1.2.3.4" -> "1.2.3.4"
    let raw = raw.trim();
    let raw = raw.strip_prefix("::ffff:").unwrap_or(raw);
    IpAddr::from_str(raw).ok()
}

/// First parseable address from X-Forwarded-For, then X-Real-IP.
fn extract_header_ip(headers: &HeaderMap) -> Option<IpAddr> {
    if let Some(xff) = header_str(headers, "x-forwarded-for") {
        if let Some(ip) = xff.split(',').next().and_then(|s| parse_ip(s)) {
            return Some(ip);
        }
    }
    header_str(headers, "x-real-ip").and_then(|v| parse_ip(&v))
}

/// Addresses that can never be geolocated: loopback, link-local, private
/// ranges, and IPv6 special addresses.
fn is_usable(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(addr) => {
            let octets = addr.octets();
            !(addr.is_loopback()
                || addr.is_link_local()
                || addr.is_unspecified()
                || addr.is_broadcast()
                || octets[0] == 10
                || (octets[0] == 172 && (16..=31).contains(&octets[1]))
                || (octets[0] == 192 && octets[1] == 168))
        }
        IpAddr::V6(addr) => {
            !(addr.is_loopback()
                || addr.is_unspecified()
                || (addr.segments()[0] & 0xffc0) == 0xfe80
                || (addr.segments()[0] & 0xfe00) == 0xfc00)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    const CHROME_DESKTOP: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
        AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(
                axum::http::HeaderName::from_bytes(name.as_bytes()).unwrap(),
                HeaderValue::from_str(value).unwrap(),
            );
        }
        map
    }

    #[test]
    fn falls_back_to_user_agent_parsing() {
        let headers = headers(&[("user-agent", CHROME_DESKTOP)]);
        let event = resolve(None, &headers, &HashMap::new(), None, None);

        let ua = user_agent::parse(Some(CHROME_DESKTOP));
        assert_eq!(event.browser, ua.browser);
        assert_eq!(event.browser_version, ua.browser_version);
        assert_eq!(event.os, ua.os);
        assert_eq!(event.device_type, "desktop");
        assert!(event.is_desktop);
        assert!(!event.is_mobile && !event.is_tablet);
    }

    #[test]
    fn trusts_client_browser_group_verbatim() {
        let payload = ClientHints {
            browser: Some("Firefox".to_string()),
            browser_version: Some("121.0".to_string()),
            os: Some("Linux".to_string()),
            device_type: Some("mobile".to_string()),
            ..Default::default()
        };
        // Conflicting User-Agent header must be ignored
        let headers = headers(&[("user-agent", CHROME_DESKTOP)]);
        let event = resolve(Some(&payload), &headers, &HashMap::new(), None, None);

        assert_eq!(event.browser, "Firefox");
        assert_eq!(event.browser_version.as_deref(), Some("121.0"));
        assert_eq!(event.os, "Linux");
        assert_eq!(event.device_type, "mobile");
        assert!(event.is_mobile);
        assert!(!event.is_desktop);
    }

    #[test]
    fn default_client_browser_does_not_short_circuit_ua() {
        let payload = ClientHints {
            browser: Some("Unknown".to_string()),
            ..Default::default()
        };
        let headers = headers(&[("user-agent", CHROME_DESKTOP)]);
        let event = resolve(Some(&payload), &headers, &HashMap::new(), None, None);
        assert_eq!(event.browser, "Chrome");
    }

    #[test]
    fn bot_flag_is_client_reported_only() {
        // A crawler User-Agent alone must not flip the bot flag
        let headers = headers(&[(
            "user-agent",
            "Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)",
        )]);
        let event = resolve(None, &headers, &HashMap::new(), None, None);
        assert!(!event.is_bot);

        // Only the client payload sets it
        let payload = ClientHints {
            is_bot: Some(true),
            ..Default::default()
        };
        let event = resolve(Some(&payload), &headers, &HashMap::new(), None, None);
        assert!(event.is_bot);
    }

    #[test]
    fn referrer_host_extraction() {
        assert_eq!(
            referrer_host(Some("https://news.ycombinator.com/item?id=1")),
            "news.ycombinator.com"
        );
        assert_eq!(referrer_host(Some("not a url")), "direct");
        assert_eq!(referrer_host(Some("")), "direct");
        assert_eq!(referrer_host(None), "direct");
    }

    #[test]
    fn language_primary_subtag() {
        assert_eq!(primary_language("en-US,en;q=0.9"), Some("en".to_string()));
        assert_eq!(primary_language("pt-BR"), Some("pt".to_string()));
        assert_eq!(primary_language("*"), None);
    }

    #[test]
    fn utm_falls_back_to_query_params() {
        let mut query = HashMap::new();
        query.insert("utm_source".to_string(), "newsletter".to_string());
        query.insert("utm_campaign".to_string(), "launch".to_string());

        let payload = ClientHints {
            utm_source: Some("twitter".to_string()),
            ..Default::default()
        };
        let event = resolve(Some(&payload), &HeaderMap::new(), &query, None, None);

        // Payload wins where present, query fills the gaps
        assert_eq!(event.utm_source.as_deref(), Some("twitter"));
        assert_eq!(event.utm_campaign.as_deref(), Some("launch"));
        assert_eq!(event.utm_medium, None);
    }

    #[test]
    fn client_location_trusted_when_country_present() {
        let payload = ClientHints {
            country: Some("Germany".to_string()),
            region: Some("Berlin".to_string()),
            city: Some("Berlin".to_string()),
            ..Default::default()
        };
        let event = resolve(Some(&payload), &HeaderMap::new(), &HashMap::new(), None, None);
        assert_eq!(event.country.as_deref(), Some("Germany"));
        assert_eq!(event.city.as_deref(), Some("Berlin"));
    }

    #[test]
    fn private_addresses_are_not_usable() {
        assert!(!is_usable("127.0.0.1".parse().unwrap()));
        assert!(!is_usable("10.1.2.3".parse().unwrap()));
        assert!(!is_usable("192.168.0.1".parse().unwrap()));
        assert!(!is_usable("172.20.0.1".parse().unwrap()));
        assert!(is_usable("8.8.8.8".parse().unwrap()));
    }

    #[test]
    fn forwarded_header_wins_over_socket_addr() {
        let headers = headers(&[("x-forwarded-for", "203.0.113.9, 10.0.0.1")]);
        let event = resolve(
            None,
            &headers,
            &HashMap::new(),
            Some("127.0.0.1".parse().unwrap()),
            None,
        );
        assert_eq!(event.ip.as_deref(), Some("203.0.113.9"));
    }
}
