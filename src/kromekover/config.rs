/// Fingerprint values exposed to page scripts
///
/// Defaults describe a Windows desktop with a Vietnamese locale, which is
/// what the job boards expect from local visitors.
#[derive(Debug, Clone)]
pub struct Config {
    pub accept_language: String,
    pub platform: String,
    pub languages: Vec<String>,
    pub screen_width: u32,
    pub screen_height: u32,
    pub webgl_vendor: String,
    pub webgl_renderer: String,
    pub hardware_concurrency: u32,
}

impl Config {
    /// Fingerprint consistent with the given user agent and window size
    #[must_use]
    pub fn for_user_agent(user_agent: &str, window: (u32, u32)) -> Self {
        let platform = if user_agent.contains("Macintosh") {
            "MacIntel"
        } else if user_agent.contains("Linux") {
            "Linux x86_64"
        } else {
            "Win32"
        };
        Self {
            platform: platform.to_string(),
            screen_width: window.0,
            screen_height: window.1,
            ..Self::default()
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            accept_language: "vi-VN,vi;q=0.9,en-US;q=0.8,en;q=0.7".to_string(),
            platform: "Win32".to_string(),
            languages: vec![
                "vi-VN".to_string(),
                "vi".to_string(),
                "en-US".to_string(),
                "en".to_string(),
            ],
            screen_width: 1920,
            screen_height: 1080,
            webgl_vendor: "Intel Inc.".to_string(),
            webgl_renderer: "Intel(R) UHD Graphics".to_string(),
            hardware_concurrency: 8,
        }
    }
}
