//! User-Agent parsing behind the woothee library.
//!
//! Woothee returns "UNKNOWN" sentinels for anything it cannot classify; this
//! wrapper normalizes those to the "Unknown" label the aggregate dimensions
//! key on.

use woothee::parser::Parser;

const UNKNOWN: &str = "Unknown";

#[derive(Debug, Clone)]
pub struct UaInfo {
    pub browser: String,
    pub browser_version: Option<String>,
    pub os: String,
    pub os_version: Option<String>,
    pub device_model: Option<String>,
    pub is_mobile: bool,
    pub is_tablet: bool,
}

impl Default for UaInfo {
    fn default() -> Self {
        Self {
            browser: UNKNOWN.to_string(),
            browser_version: None,
            os: UNKNOWN.to_string(),
            os_version: None,
            device_model: None,
            is_mobile: false,
            is_tablet: false,
        }
    }
}

fn known(value: &str) -> Option<String> {
    if value.is_empty() || value == "UNKNOWN" {
        None
    } else {
        Some(value.to_string())
    }
}

/// Parse a `User-Agent` string into structured browser/OS/device fields.
/// Missing or unparseable input degrades to the defaults, never errors.
pub fn parse(ua: Option<&str>) -> UaInfo {
    let ua = match ua {
        Some(s) if !s.is_empty() => s,
        _ => return UaInfo::default(),
    };

    let parser = Parser::new();
    let result = match parser.parse(ua) {
        Some(result) => result,
        None => return UaInfo::default(),
    };

    let is_mobile = matches!(result.category, "smartphone" | "mobilephone");
    // Woothee folds tablets into the smartphone category; the iPad OS label
    // is the only tablet signal it exposes.
    let is_tablet = result.os == "iPad";

    UaInfo {
        browser: known(result.name).unwrap_or_else(|| UNKNOWN.to_string()),
        browser_version: known(result.version),
        os: known(&result.os).unwrap_or_else(|| UNKNOWN.to_string()),
        os_version: known(&result.os_version),
        device_model: known(result.vendor),
        is_mobile: is_mobile && !is_tablet,
        is_tablet,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHROME_DESKTOP: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
        AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

    #[test]
    fn parses_desktop_chrome() {
        let info = parse(Some(CHROME_DESKTOP));
        assert_eq!(info.browser, "Chrome");
        assert!(info.browser_version.is_some());
        assert!(!info.is_mobile);
        assert!(!info.is_tablet);
    }

    #[test]
    fn missing_ua_degrades_to_unknown() {
        let info = parse(None);
        assert_eq!(info.browser, "Unknown");
        assert_eq!(info.os, "Unknown");
        assert!(!info.is_mobile);

        let info = parse(Some(""));
        assert_eq!(info.browser, "Unknown");
    }

    #[test]
    fn iphone_is_mobile() {
        let info = parse(Some(
            "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) \
             AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Mobile/15E148 Safari/604.1",
        ));
        assert!(info.is_mobile);
        assert!(!info.is_tablet);
    }
}
