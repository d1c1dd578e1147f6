//! Browser-like header profiles rotated per item.
//!
//! Image hosts behind hotlink protection often reject one client fingerprint
//! and accept another. Each item is attempted with the profiles in order until
//! one succeeds.

const DESKTOP_CHROME_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// A named set of request headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderProfile {
    /// Short profile name for logs and error messages.
    pub name: &'static str,
    /// Headers sent with this profile, in order.
    pub headers: Vec<(String, String)>,
}

impl HeaderProfile {
    /// Creates a profile from static header pairs.
    #[must_use]
    pub fn new(name: &'static str, headers: &[(&str, &str)]) -> Self {
        Self {
            name,
            headers: headers
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        }
    }

    /// Returns the profile with a `Referer` and caller headers merged in.
    ///
    /// Caller headers replace profile headers of the same name
    /// (case-insensitive) and are appended otherwise.
    #[must_use]
    pub fn materialize(&self, referer: &str, custom: &[(String, String)]) -> Vec<(String, String)> {
        let mut headers = self.headers.clone();
        headers.push(("Referer".to_string(), referer.to_string()));
        merge_headers(headers, custom)
    }

    /// Desktop Chrome 120 with full client-hint headers.
    #[must_use]
    pub fn desktop_chrome() -> Self {
        Self::new(
            "desktop-chrome",
            &[
                ("User-Agent", DESKTOP_CHROME_UA),
                ("Accept", "image/webp,image/apng,image/svg+xml,image/*,*/*;q=0.8"),
                ("Accept-Language", "en-US,en;q=0.9,vi;q=0.8"),
                ("Cache-Control", "no-cache"),
                ("Pragma", "no-cache"),
                (
                    "Sec-Ch-Ua",
                    "\"Not_A Brand\";v=\"8\", \"Chromium\";v=\"120\", \"Google Chrome\";v=\"120\"",
                ),
                ("Sec-Ch-Ua-Mobile", "?0"),
                ("Sec-Ch-Ua-Platform", "\"Windows\""),
                ("Sec-Fetch-Dest", "image"),
                ("Sec-Fetch-Mode", "no-cors"),
                ("Sec-Fetch-Site", "cross-site"),
            ],
        )
    }

    /// Mobile Safari on iOS 17.
    #[must_use]
    pub fn mobile_safari() -> Self {
        Self::new(
            "mobile-safari",
            &[
                (
                    "User-Agent",
                    "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Mobile/15E148 Safari/604.1",
                ),
                ("Accept", "image/webp,image/apng,image/*,*/*;q=0.8"),
            ],
        )
    }

    /// Desktop Firefox 120.
    #[must_use]
    pub fn desktop_firefox() -> Self {
        Self::new(
            "desktop-firefox",
            &[
                (
                    "User-Agent",
                    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:120.0) Gecko/20100101 Firefox/120.0",
                ),
                ("Accept", "image/webp,*/*"),
            ],
        )
    }

    /// The default rotation order.
    #[must_use]
    pub fn default_rotation() -> Vec<Self> {
        vec![
            Self::desktop_chrome(),
            Self::mobile_safari(),
            Self::desktop_firefox(),
        ]
    }

    /// Headers for member-listing JSON endpoints.
    #[must_use]
    pub fn json_listing(referer: &str) -> Vec<(String, String)> {
        vec![
            ("User-Agent".to_string(), DESKTOP_CHROME_UA.to_string()),
            (
                "Accept".to_string(),
                "application/json, text/javascript, */*; q=0.01".to_string(),
            ),
            ("Referer".to_string(), referer.to_string()),
            ("X-Requested-With".to_string(), "XMLHttpRequest".to_string()),
        ]
    }

    /// Headers for HTML page requests (collection, member and listing pages).
    #[must_use]
    pub fn html_page(referer: &str) -> Vec<(String, String)> {
        vec![
            ("User-Agent".to_string(), DESKTOP_CHROME_UA.to_string()),
            (
                "Accept".to_string(),
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8".to_string(),
            ),
            ("Accept-Language".to_string(), "en-US,en;q=0.9,vi;q=0.8".to_string()),
            ("Referer".to_string(), referer.to_string()),
        ]
    }
}

/// Applies caller headers on top of `headers`.
///
/// A caller header replaces every existing header of the same name
/// (case-insensitive); new names are appended.
#[must_use]
pub fn merge_headers(mut headers: Vec<(String, String)>, custom: &[(String, String)]) -> Vec<(String, String)> {
    for (name, value) in custom {
        headers.retain(|(existing, _)| !existing.eq_ignore_ascii_case(name));
        headers.push((name.clone(), value.clone()));
    }
    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
        headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_default_rotation_order() {
        let names: Vec<&str> = HeaderProfile::default_rotation()
            .iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["desktop-chrome", "mobile-safari", "desktop-firefox"]);
    }

    #[test]
    fn test_every_profile_sets_user_agent_and_accept() {
        for profile in HeaderProfile::default_rotation() {
            assert!(header(&profile.headers, "user-agent").is_some(), "{}", profile.name);
            assert!(header(&profile.headers, "accept").is_some(), "{}", profile.name);
        }
    }

    #[test]
    fn test_materialize_adds_referer() {
        let headers = HeaderProfile::mobile_safari().materialize("https://site.test/c/1", &[]);
        assert_eq!(header(&headers, "Referer"), Some("https://site.test/c/1"));
    }

    #[test]
    fn test_materialize_custom_headers_override_case_insensitively() {
        let custom = vec![
            ("user-agent".to_string(), "custom-agent".to_string()),
            ("X-Extra".to_string(), "1".to_string()),
        ];
        let headers = HeaderProfile::desktop_firefox().materialize("https://site.test", &custom);
        assert_eq!(header(&headers, "User-Agent"), Some("custom-agent"));
        assert_eq!(header(&headers, "X-Extra"), Some("1"));
        let ua_count = headers
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case("user-agent"))
            .count();
        assert_eq!(ua_count, 1);
    }

    #[test]
    fn test_json_listing_headers() {
        let headers = HeaderProfile::json_listing("https://site.test/truyen-tranh/abc");
        assert_eq!(header(&headers, "X-Requested-With"), Some("XMLHttpRequest"));
        assert!(header(&headers, "Accept").unwrap_or_default().contains("application/json"));
    }

    #[test]
    fn test_html_page_headers_merge_custom_referer() {
        let custom = vec![("Referer".to_string(), "https://other.test".to_string())];
        let headers = merge_headers(HeaderProfile::html_page("https://site.test"), &custom);
        assert_eq!(header(&headers, "referer"), Some("https://other.test"));
        assert!(header(&headers, "Accept").unwrap_or_default().starts_with("text/html"));
    }
}
