//! User-Agent sent with every board request.

/// Project URL advertised in the User-Agent.
const PROJECT_UA_URL: &str = "https://github.com/fierce/booru-crawler";

/// Default User-Agent for count, page and image requests.
#[must_use]
pub(crate) fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("booru-crawler/{version} (+{PROJECT_UA_URL})")
}
