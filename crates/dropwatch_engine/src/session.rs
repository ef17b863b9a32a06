use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use url::Url;
use watch_logging::{watch_info, watch_warn};

use crate::driver::{DriverError, HttpDriver, PageDriver};

/// Paths probed, in order, when hunting for the credential form.
const LOGIN_PATH_CANDIDATES: [&str; 3] = ["/users/sign_in", "/login", "/sign_in"];
/// Label text that marks an authentication wall alongside a password field.
const LOGIN_TEXT_MARKER: &str = "ログイン";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredCookie {
    url: String,
    name: String,
    value: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoredSession {
    cookies: Vec<StoredCookie>,
}

/// Stored session cookies persisted across runs so a race starts
/// authenticated instead of spending post-deadline time on login.
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Materializes stored cookies into the driver's jar, returning how many
    /// were applied. A missing or unreadable session file is not an error;
    /// the run simply starts anonymous.
    pub fn materialize(&self, driver: &HttpDriver) -> usize {
        let session = self.load();
        let jar = driver.cookie_jar();
        let mut applied = 0;
        for cookie in &session.cookies {
            let Ok(url) = Url::parse(&cookie.url) else {
                continue;
            };
            jar.add_cookie_str(&format!("{}={}", cookie.name, cookie.value), &url);
            applied += 1;
        }
        applied
    }

    /// Records cookies granted during login so later runs skip the wall.
    pub fn record(&self, url: &str, set_cookies: &[String]) {
        let mut session = self.load();
        for raw in set_cookies {
            let name_value = raw.split(';').next().unwrap_or(raw);
            let Some((name, value)) = name_value.split_once('=') else {
                continue;
            };
            let name = name.trim().to_string();
            session
                .cookies
                .retain(|c| !(c.name == name && c.url == url));
            session.cookies.push(StoredCookie {
                url: url.to_string(),
                name,
                value: value.trim().to_string(),
            });
        }
        self.save(&session);
    }

    fn load(&self) -> StoredSession {
        let content = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return StoredSession::default();
            }
            Err(err) => {
                watch_warn!("failed to read session file {:?}: {}", self.path, err);
                return StoredSession::default();
            }
        };
        match serde_json::from_str(&content) {
            Ok(session) => session,
            Err(err) => {
                watch_warn!("failed to parse session file {:?}: {}", self.path, err);
                StoredSession::default()
            }
        }
    }

    fn save(&self, session: &StoredSession) {
        let content = match serde_json::to_string_pretty(session) {
            Ok(text) => text,
            Err(err) => {
                watch_warn!("failed to serialize session: {}", err);
                return;
            }
        };
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let result = NamedTempFile::new_in(dir).and_then(|mut tmp| {
            tmp.write_all(content.as_bytes())?;
            tmp.flush()?;
            tmp.persist(&self.path).map_err(|e| e.error)?;
            Ok(())
        });
        match result {
            Ok(()) => watch_info!("session saved to {:?}", self.path),
            Err(err) => watch_warn!("failed to write session file {:?}: {}", self.path, err),
        }
    }
}

/// Whether the page is an authentication wall: a password field, or the
/// login marker in the body text.
pub fn login_wall_present(body: &str) -> bool {
    let Ok(password) = Selector::parse("input[type='password']") else {
        return false;
    };
    let doc = Html::parse_document(body);
    if doc.select(&password).next().is_some() {
        return true;
    }
    body.contains(LOGIN_TEXT_MARKER)
}

struct LoginForm {
    action: Url,
    email_field: String,
    password_field: String,
    hidden_fields: Vec<(String, String)>,
}

/// Walks the login path candidates and submits the first recognizable
/// credential form. Returns whether the wall is gone afterwards.
pub async fn try_auto_login(
    driver: &HttpDriver,
    store: &SessionStore,
    base: &Url,
    email: &str,
    password: &str,
    timeout: Duration,
) -> Result<bool, DriverError> {
    for path in LOGIN_PATH_CANDIDATES {
        let Ok(url) = base.join(path) else {
            continue;
        };
        let page = match driver.navigate(url.as_str(), timeout).await {
            Ok(page) => page,
            Err(err) => {
                watch_warn!("login path {} unreachable: {}", url, err);
                continue;
            }
        };
        if !login_wall_present(&page.body) {
            // No wall behind this path; the stored session already holds.
            return Ok(true);
        }
        let Some(form) = read_login_form(&page.body, &url) else {
            continue;
        };

        let mut fields = form.hidden_fields;
        fields.push((form.email_field, email.to_string()));
        fields.push((form.password_field, password.to_string()));
        let response = driver
            .post_form(form.action.as_str(), &fields, timeout)
            .await?;
        if login_wall_present(&response.page.body) {
            return Ok(false);
        }
        store.record(base.as_str(), &response.set_cookies);
        return Ok(true);
    }
    Ok(false)
}

/// The first form carrying a password input, with its credential field names
/// and hidden inputs (CSRF tokens and the like) captured for resubmission.
fn read_login_form(body: &str, page_url: &Url) -> Option<LoginForm> {
    let form_sel = Selector::parse("form").ok()?;
    let input_sel = Selector::parse("input").ok()?;
    let doc = Html::parse_document(body);

    for form in doc.select(&form_sel) {
        let mut email_field = None;
        let mut password_field = None;
        let mut hidden_fields = Vec::new();
        for input in form.select(&input_sel) {
            let value = input.value();
            let name = match value.attr("name") {
                Some(name) if !name.is_empty() => name,
                _ => continue,
            };
            match value.attr("type").unwrap_or("text") {
                "password" => password_field = Some(name.to_string()),
                "email" => email_field = Some(name.to_string()),
                "hidden" => hidden_fields.push((
                    name.to_string(),
                    value.attr("value").unwrap_or("").to_string(),
                )),
                _ => {
                    if email_field.is_none()
                        && (name.contains("email") || name.contains("login") || name.contains("user"))
                    {
                        email_field = Some(name.to_string());
                    }
                }
            }
        }
        if let (Some(email_field), Some(password_field)) = (email_field, password_field) {
            let action = form
                .value()
                .attr("action")
                .and_then(|action| page_url.join(action).ok())
                .unwrap_or_else(|| page_url.clone());
            return Some(LoginForm {
                action,
                email_field,
                password_field,
                hidden_fields,
            });
        }
    }
    None
}
