use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::cookie::Jar;
use reqwest::header::SET_COOKIE;
use url::Url;

use watch_logging::watch_debug;

/// Settings for the HTTP page driver.
#[derive(Debug, Clone)]
pub struct DriverSettings {
    pub connect_timeout: Duration,
    pub redirect_limit: usize,
    pub max_bytes: u64,
    pub user_agent: String,
    /// Resource-type hints from the run configuration. The HTTP driver loads
    /// no subresources, so these only show up in debug logging.
    pub blocked_resources: Vec<String>,
}

impl Default for DriverSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            redirect_limit: 5,
            max_bytes: 5 * 1024 * 1024,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
                         AppleWebKit/537.36 (KHTML, like Gecko) \
                         Chrome/126.0.0.0 Safari/537.36"
                .to_string(),
            blocked_resources: Vec::new(),
        }
    }
}

/// A navigated page: the URL the transport finally settled on plus its body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageView {
    pub final_url: String,
    pub body: String,
}

/// A submitted form: the settled page plus the cookies the server granted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormResponse {
    pub page: PageView,
    pub set_cookies: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverError {
    pub kind: DriverFailure,
    pub message: String,
}

impl DriverError {
    pub(crate) fn new(kind: DriverFailure, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for DriverError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverFailure {
    InvalidUrl,
    HttpStatus(u16),
    Timeout,
    RedirectLimitExceeded,
    TooLarge { max_bytes: u64, actual: Option<u64> },
    Network,
}

impl fmt::Display for DriverFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriverFailure::InvalidUrl => write!(f, "invalid url"),
            DriverFailure::HttpStatus(code) => write!(f, "http status {code}"),
            DriverFailure::Timeout => write!(f, "timeout"),
            DriverFailure::RedirectLimitExceeded => write!(f, "redirect limit exceeded"),
            DriverFailure::TooLarge { max_bytes, actual } => {
                write!(f, "response too large (max {max_bytes}, actual {actual:?})")
            }
            DriverFailure::Network => write!(f, "network error"),
        }
    }
}

/// Navigation and raw-transport primitives the probing pipeline consumes.
///
/// Every call is a blocking operation bounded by its own timeout; the
/// rendering engine behind the primitives is an implementation choice.
#[async_trait::async_trait]
pub trait PageDriver: Send + Sync {
    /// Loads `url` and returns the settled page within `timeout`.
    async fn navigate(&self, url: &str, timeout: Duration) -> Result<PageView, DriverError>;

    /// Fetches the raw transport payload without any rendering.
    async fn fetch_raw(&self, url: &str, timeout: Duration) -> Result<String, DriverError>;
}

/// [`PageDriver`] over a plain reqwest client with a shared cookie jar.
pub struct HttpDriver {
    client: reqwest::Client,
    jar: Arc<Jar>,
    settings: DriverSettings,
}

impl HttpDriver {
    pub fn new(settings: DriverSettings) -> Result<Self, DriverError> {
        if !settings.blocked_resources.is_empty() {
            watch_debug!(
                "resource block hints not applicable to the http driver: {:?}",
                settings.blocked_resources
            );
        }
        let jar = Arc::new(Jar::default());
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .redirect(reqwest::redirect::Policy::limited(settings.redirect_limit))
            .user_agent(settings.user_agent.clone())
            .cookie_provider(jar.clone())
            .build()
            .map_err(|err| DriverError::new(DriverFailure::Network, err.to_string()))?;
        Ok(Self {
            client,
            jar,
            settings,
        })
    }

    /// The jar backing every request. The session store materializes stored
    /// cookies into it before a run.
    pub fn cookie_jar(&self) -> Arc<Jar> {
        self.jar.clone()
    }

    /// Submits a form and captures the cookies granted in the response.
    pub async fn post_form(
        &self,
        url: &str,
        fields: &[(String, String)],
        timeout: Duration,
    ) -> Result<FormResponse, DriverError> {
        let parsed = Url::parse(url)
            .map_err(|err| DriverError::new(DriverFailure::InvalidUrl, err.to_string()))?;
        let response = self
            .client
            .post(parsed)
            .form(fields)
            .timeout(timeout)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let set_cookies = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok().map(str::to_string))
            .collect();

        let page = self.read_page(response).await?;
        Ok(FormResponse { page, set_cookies })
    }

    async fn get(&self, url: &str, timeout: Duration) -> Result<PageView, DriverError> {
        let parsed = Url::parse(url)
            .map_err(|err| DriverError::new(DriverFailure::InvalidUrl, err.to_string()))?;
        let response = self
            .client
            .get(parsed)
            .timeout(timeout)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        self.read_page(response).await
    }

    async fn read_page(&self, response: reqwest::Response) -> Result<PageView, DriverError> {
        let status = response.status();
        if !status.is_success() {
            return Err(DriverError::new(
                DriverFailure::HttpStatus(status.as_u16()),
                status.to_string(),
            ));
        }

        if let Some(content_len) = response.content_length() {
            if content_len > self.settings.max_bytes {
                return Err(DriverError::new(
                    DriverFailure::TooLarge {
                        max_bytes: self.settings.max_bytes,
                        actual: Some(content_len),
                    },
                    "response too large",
                ));
            }
        }

        let final_url = response.url().to_string();
        let mut bytes = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_reqwest_error)?;
            let next_len = bytes.len() as u64 + chunk.len() as u64;
            if next_len > self.settings.max_bytes {
                return Err(DriverError::new(
                    DriverFailure::TooLarge {
                        max_bytes: self.settings.max_bytes,
                        actual: Some(next_len),
                    },
                    "response too large",
                ));
            }
            bytes.extend_from_slice(&chunk);
        }

        Ok(PageView {
            final_url,
            body: String::from_utf8_lossy(&bytes).into_owned(),
        })
    }
}

#[async_trait::async_trait]
impl PageDriver for HttpDriver {
    async fn navigate(&self, url: &str, timeout: Duration) -> Result<PageView, DriverError> {
        self.get(url, timeout).await
    }

    async fn fetch_raw(&self, url: &str, timeout: Duration) -> Result<String, DriverError> {
        self.get(url, timeout).await.map(|page| page.body)
    }
}

fn map_reqwest_error(err: reqwest::Error) -> DriverError {
    if err.is_timeout() {
        return DriverError::new(DriverFailure::Timeout, err.to_string());
    }
    if err.is_redirect() {
        return DriverError::new(DriverFailure::RedirectLimitExceeded, err.to_string());
    }
    DriverError::new(DriverFailure::Network, err.to_string())
}
