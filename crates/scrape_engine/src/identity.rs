use reqwest::header::{HeaderMap, HeaderName, HeaderValue, USER_AGENT};

use engine_logging::engine_warn;

use crate::timing::JitterSource;

/// Browser-like header bundle presented on a request.
///
/// `Accept-Encoding` is left to the HTTP client, which decodes compressed bodies
/// only when it negotiated the encoding itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestIdentity {
    user_agent: String,
    headers: Vec<(String, String)>,
}

impl RequestIdentity {
    pub fn new(user_agent: impl Into<String>) -> Self {
        Self {
            user_agent: user_agent.into(),
            headers: Vec::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Header map for the request; malformed entries are skipped with a warning.
    pub fn header_map(&self) -> HeaderMap {
        let mut map = HeaderMap::with_capacity(self.headers.len() + 1);
        match HeaderValue::from_str(&self.user_agent) {
            Ok(value) => {
                map.insert(USER_AGENT, value);
            }
            Err(err) => engine_warn!("Skipping invalid user agent {:?}: {}", self.user_agent, err),
        }
        for (name, value) in &self.headers {
            let parsed = HeaderName::from_bytes(name.as_bytes())
                .map_err(|err| err.to_string())
                .and_then(|n| {
                    HeaderValue::from_str(value)
                        .map(|v| (n, v))
                        .map_err(|err| err.to_string())
                });
            match parsed {
                Ok((n, v)) => {
                    map.insert(n, v);
                }
                Err(err) => engine_warn!("Skipping invalid header {name}: {err}"),
            }
        }
        map
    }
}

const BROWSER_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.2.1 Safari/605.1.15",
];

fn browser_identity(user_agent: &str) -> RequestIdentity {
    RequestIdentity::new(user_agent)
        .with_header(
            "Accept",
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
        )
        .with_header(
            "Accept-Language",
            "zh-CN,zh;q=0.8,zh-TW;q=0.7,zh-HK;q=0.5,en-US;q=0.3,en;q=0.2",
        )
        .with_header("DNT", "1")
        .with_header("Upgrade-Insecure-Requests", "1")
        .with_header("Sec-Fetch-Dest", "document")
        .with_header("Sec-Fetch-Mode", "navigate")
        .with_header("Sec-Fetch-Site", "none")
        .with_header("Sec-Fetch-User", "?1")
        .with_header("Cache-Control", "max-age=0")
}

/// Fixed set of identities; read-only once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityPool {
    identities: Vec<RequestIdentity>,
}

impl IdentityPool {
    pub fn new(identities: Vec<RequestIdentity>) -> Self {
        Self { identities }
    }

    /// Desktop browser identities mixing Chrome, Firefox and Safari.
    pub fn browsers() -> Self {
        Self::from_user_agents(BROWSER_USER_AGENTS)
    }

    /// Browser identities for the given user agents, each with the usual browser headers.
    pub fn from_user_agents<S: AsRef<str>>(user_agents: &[S]) -> Self {
        Self::new(
            user_agents
                .iter()
                .map(|ua| browser_identity(ua.as_ref()))
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.identities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&RequestIdentity> {
        self.identities.get(index)
    }

    /// Picks an identity, never returning `previous` again when another one exists.
    pub fn select(
        &self,
        previous: Option<usize>,
        jitter: &dyn JitterSource,
    ) -> Option<(usize, &RequestIdentity)> {
        let len = self.identities.len();
        if len == 0 {
            return None;
        }
        let mut index = jitter.pick(len) % len;
        if len > 1 && previous == Some(index) {
            index = (index + 1) % len;
        }
        self.identities.get(index).map(|identity| (index, identity))
    }
}

impl Default for IdentityPool {
    fn default() -> Self {
        Self::browsers()
    }
}
