use serde_json::json;
use std::collections::HashMap;
use std::time::Duration;
use webdriver::capabilities::Capabilities;

/// Desktop Chrome user agent sent when none is configured.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

#[derive(Debug, Clone, PartialEq)]
/// Browser session settings for a capture.
pub struct CaptureOptions {
    /// WebDriver endpoint (chromedriver listens on 9515 by default).
    pub webdriver_url: String,
    pub viewport: (u32, u32),
    /// Upper bound for page load.
    pub nav_timeout: Duration,
    /// Wait after load before scrolling.
    pub settle: Duration,
    /// Wait at the bottom of the page for lazy content.
    pub scroll_settle: Duration,
    pub headless: bool,
    pub user_agent: Option<String>,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            webdriver_url: "http://localhost:9515".to_string(),
            viewport: (1920, 3000),
            nav_timeout: Duration::from_secs(90),
            settle: Duration::from_secs(3),
            scroll_settle: Duration::from_secs(2),
            headless: true,
            user_agent: None,
        }
    }
}

impl CaptureOptions {
    pub fn user_agent(&self) -> &str {
        self.user_agent
            .as_deref()
            .filter(|ua| !ua.trim().is_empty())
            .unwrap_or(DEFAULT_USER_AGENT)
    }
}

/// Chrome command-line arguments for a capture session.
pub fn chrome_arguments(opts: &CaptureOptions) -> Vec<String> {
    let mut args = vec![
        "--disable-blink-features=AutomationControlled".to_string(),
        "--disable-infobars".to_string(),
        "--disable-dev-shm-usage".to_string(),
        "--no-sandbox".to_string(),
        "--disable-extensions".to_string(),
        "--hide-scrollbars".to_string(),
        format!("--user-agent={}", opts.user_agent()),
        format!("--window-size={},{}", opts.viewport.0, opts.viewport.1),
        "--lang=en-US".to_string(),
    ];
    if opts.headless {
        args.push("--headless=new".to_string());
        args.push("--disable-gpu".to_string());
    }
    args
}

/// W3C capabilities carrying `goog:chromeOptions`.
pub fn capabilities(opts: &CaptureOptions) -> Capabilities {
    let mut chrome_opts = HashMap::new();
    chrome_opts.insert("args".to_string(), json!(chrome_arguments(opts)));

    let mut caps = Capabilities::new();
    caps.insert("browserName".to_string(), json!("chrome"));
    caps.insert("goog:chromeOptions".to_string(), json!(chrome_opts));
    caps
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headless_adds_flags() {
        let args = chrome_arguments(&CaptureOptions::default());
        assert!(args.contains(&"--headless=new".to_string()));
        assert!(args.contains(&"--window-size=1920,3000".to_string()));

        let headed = CaptureOptions {
            headless: false,
            ..CaptureOptions::default()
        };
        assert!(!chrome_arguments(&headed).iter().any(|a| a.starts_with("--headless")));
    }

    #[test]
    fn blank_user_agent_falls_back_to_default() {
        let opts = CaptureOptions {
            user_agent: Some("  ".into()),
            ..CaptureOptions::default()
        };
        assert_eq!(opts.user_agent(), DEFAULT_USER_AGENT);

        let custom = CaptureOptions {
            user_agent: Some("placelens/1".into()),
            ..CaptureOptions::default()
        };
        assert!(chrome_arguments(&custom).contains(&"--user-agent=placelens/1".to_string()));
    }

    #[test]
    fn capabilities_nest_chrome_args() {
        let caps = capabilities(&CaptureOptions::default());
        let args = caps["goog:chromeOptions"]["args"].as_array().unwrap();
        assert!(args.iter().any(|a| a == "--no-sandbox"));
    }
}
