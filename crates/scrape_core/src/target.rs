use serde::{Deserialize, Serialize};
use url::Url;

/// Domain class inferred from a target's hostname.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Zillow,
    Redfin,
    Realtor,
    Trulia,
    Facebook,
    Instagram,
    Reddit,
    Nextdoor,
    Craigslist,
    Twitter,
    Linkedin,
    Web,
}

const PLATFORM_DOMAINS: &[(&str, Platform)] = &[
    ("zillow.com", Platform::Zillow),
    ("redfin.com", Platform::Redfin),
    ("realtor.com", Platform::Realtor),
    ("trulia.com", Platform::Trulia),
    ("facebook.com", Platform::Facebook),
    ("fb.com", Platform::Facebook),
    ("instagram.com", Platform::Instagram),
    ("reddit.com", Platform::Reddit),
    ("nextdoor.com", Platform::Nextdoor),
    ("craigslist.org", Platform::Craigslist),
    ("twitter.com", Platform::Twitter),
    ("x.com", Platform::Twitter),
    ("linkedin.com", Platform::Linkedin),
];

impl Platform {
    pub fn from_host(host: &str) -> Self {
        PLATFORM_DOMAINS
            .iter()
            .find(|(domain, _)| host_matches(host, domain))
            .map(|(_, platform)| *platform)
            .unwrap_or(Platform::Web)
    }

    pub fn label(self) -> &'static str {
        match self {
            Platform::Zillow => "zillow",
            Platform::Redfin => "redfin",
            Platform::Realtor => "realtor",
            Platform::Trulia => "trulia",
            Platform::Facebook => "facebook",
            Platform::Instagram => "instagram",
            Platform::Reddit => "reddit",
            Platform::Nextdoor => "nextdoor",
            Platform::Craigslist => "craigslist",
            Platform::Twitter => "twitter",
            Platform::Linkedin => "linkedin",
            Platform::Web => "web",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Platform::Zillow => "Zillow",
            Platform::Redfin => "Redfin",
            Platform::Realtor => "Realtor.com",
            Platform::Trulia => "Trulia",
            Platform::Facebook => "Facebook",
            Platform::Instagram => "Instagram",
            Platform::Reddit => "Reddit",
            Platform::Nextdoor => "Nextdoor",
            Platform::Craigslist => "Craigslist",
            Platform::Twitter => "X (Twitter)",
            Platform::Linkedin => "LinkedIn",
            Platform::Web => "Web",
        }
    }

    pub fn is_real_estate(self) -> bool {
        matches!(
            self,
            Platform::Zillow | Platform::Redfin | Platform::Realtor | Platform::Trulia
        )
    }

    pub fn is_social(self) -> bool {
        matches!(
            self,
            Platform::Facebook
                | Platform::Instagram
                | Platform::Reddit
                | Platform::Nextdoor
                | Platform::Twitter
                | Platform::Linkedin
        )
    }
}

/// `true` when `host` is `domain` or one of its subdomains. A leading `www.` and
/// letter case are ignored.
pub(crate) fn host_matches(host: &str, domain: &str) -> bool {
    let host = host.trim().trim_end_matches('.').to_ascii_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);
    let domain = domain.trim().to_ascii_lowercase();
    let domain = domain.strip_prefix("www.").unwrap_or(&domain);
    if domain.is_empty() {
        return false;
    }
    host == domain || host.ends_with(&format!(".{domain}"))
}

/// Free-form location tags attached by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TargetContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

impl TargetContext {
    /// "City, ST", "City", "ST", or `None` when no tag is set.
    pub fn describe(&self) -> Option<String> {
        let city = self.city.as_deref().map(str::trim).filter(|c| !c.is_empty());
        let state = self.state.as_deref().map(str::trim).filter(|s| !s.is_empty());
        match (city, state) {
            (Some(city), Some(state)) => Some(format!("{city}, {state}")),
            (Some(city), None) => Some(city.to_string()),
            (None, Some(state)) => Some(state.to_string()),
            (None, None) => None,
        }
    }
}

/// One URL to resolve. Construction never fails: a URL that does not parse is
/// kept verbatim with no host and classified as [`Platform::Web`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeTarget {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    pub platform: Platform,
    #[serde(default)]
    pub context: TargetContext,
}

impl ScrapeTarget {
    pub fn new(url: impl Into<String>) -> Self {
        let url = url.into().trim().to_string();
        let host = Url::parse(&url)
            .ok()
            .and_then(|parsed| parsed.host_str().map(str::to_ascii_lowercase));
        let platform = host
            .as_deref()
            .map(Platform::from_host)
            .unwrap_or(Platform::Web);
        Self {
            url,
            host,
            platform,
            context: TargetContext::default(),
        }
    }

    pub fn with_context(mut self, city: Option<String>, state: Option<String>) -> Self {
        self.context = TargetContext { city, state };
        self
    }

    /// Host without a leading `www.`, or the raw URL when there is no host.
    pub fn display_host(&self) -> &str {
        match self.host.as_deref() {
            Some(host) => host.strip_prefix("www.").unwrap_or(host),
            None => &self.url,
        }
    }
}
