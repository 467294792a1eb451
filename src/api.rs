//! HTTP client for the provider: browse-page fetch and the profile-switch
//! call whose side effect is the session we capture.

use std::path::PathBuf;

use chrono::Utc;
use log::{debug, info, warn};
use reqwest::{header, redirect, StatusCode};
use url::Url;

use crate::cookie_store::{CookieStore, CookieStoreLoadError};
use crate::relay::HandoffError;
use crate::schema::{ProfileUid, SessionCookie};

pub const BROWSE_URL: &str = "https://www.netflix.com/browse";
pub const SWITCH_URL: &str = "https://www.netflix.com/api/shakti/mre/profiles/switch";
pub const COOKIE_DOMAIN: &str = "netflix.com";

/// Classified result of the browse-page fetch.
#[derive(Debug)]
pub enum PageFetch {
    Body(String),
    LoggedOut,
    Status(StatusCode),
}

pub struct NetflixClient {
    client: reqwest::Client,
    cookie_store: CookieStore,
    cookie_store_path: Option<PathBuf>,
}

impl NetflixClient {
    /// When a path is given, cookies captured so far are persisted there and
    /// reloaded on the next run.
    pub fn new(cookie_store_path: Option<PathBuf>) -> anyhow::Result<Self> {
        let cookie_store = match &cookie_store_path {
            Some(path) => match CookieStore::load(path) {
                Ok(store) => {
                    info!("Cookie store was found.  Trying to use this cookie.");
                    store
                }
                Err(CookieStoreLoadError::NotFound) => {
                    info!("Cookie store was not found.");
                    CookieStore::default()
                }
                Err(e) => return Err(e.into()),
            },
            None => CookieStore::default(),
        };
        Ok(Self {
            client: reqwest_client()?,
            cookie_store,
            cookie_store_path,
        })
    }

    /// GET the browse endpoint and classify the answer: a body to hand to the
    /// extractor, a redirect toward login, or an unexpected status.
    pub async fn fetch_profile_page(&mut self) -> anyhow::Result<PageFetch> {
        let response = self.client.get(BROWSE_URL).send().await?;
        self.record_cookies(&response);
        if response.status().is_redirection() {
            let location = location_path(&response);
            debug!("Browse page redirected to {location:?}");
            return Ok(match location {
                Some(path) if login_redirect(&path) => PageFetch::LoggedOut,
                _ => PageFetch::Status(response.status()),
            });
        }
        if !response.status().is_success() {
            return Ok(PageFetch::Status(response.status()));
        }
        Ok(PageFetch::Body(response.text().await?))
    }

    /// Switches the active profile on the remote service, then reads back the
    /// cookies scoped to the provider's domain.  The switch is an observable
    /// remote side effect; callers must invoke this at most once per
    /// user-initiated selection.
    pub async fn switch_profile(
        &mut self,
        uid: &ProfileUid,
    ) -> Result<Vec<SessionCookie>, HandoffError> {
        info!("Switching to Netflix profile {uid}");
        let url = switch_url(uid, Utc::now().timestamp_millis());
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(HandoffError::Transport)?;
        self.record_cookies(&response);
        if response.status() != StatusCode::OK {
            return Err(HandoffError::Switch {
                uid: uid.clone(),
                status: response.status(),
            });
        }
        let cookies = self.cookie_store.cookies_for_domain(COOKIE_DOMAIN);
        info!("Found {} cookies for profile {uid}", cookies.len());
        Ok(cookies)
    }

    fn record_cookies(&mut self, response: &reqwest::Response) {
        let recorded = self.cookie_store.record_response(response);
        if recorded == 0 {
            return;
        }
        debug!("Recorded {recorded} cookies from {}", response.url());
        if let Some(path) = &self.cookie_store_path {
            if let Err(e) = self.cookie_store.save(path) {
                warn!("Failed to persist the cookie store to {path:?}: {e}");
            }
        }
    }
}

/// The cache-busting `_` parameter mirrors what the web player sends; without
/// it the switch endpoint may serve a stale cached response.
fn switch_url(uid: &ProfileUid, timestamp: i64) -> String {
    format!("{SWITCH_URL}?switchProfileGuid={uid}&_={timestamp}&authURL=/")
}

/// Redirects toward the login page are stopped instead of followed so that
/// the caller can classify the logged-out state from the 3xx response.
fn reqwest_client() -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .cookie_store(true)
        .redirect(redirect::Policy::custom(|attempt| {
            if attempt.url().path().contains("login") {
                attempt.stop()
            } else {
                attempt.follow()
            }
        }))
        .build()
}

fn location_path(response: &reqwest::Response) -> Option<String> {
    let raw = response.headers().get(header::LOCATION)?.to_str().ok()?;
    Some(raw.to_owned())
}

fn login_redirect(location: &str) -> bool {
    let path = match Url::parse(location) {
        Ok(url) => url.path().to_owned(),
        // Relative redirect target; treat the whole thing as a path.
        Err(_) => location.split(['?', '#']).next().unwrap_or(location).to_owned(),
    };
    path.contains("login")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_redirects_are_classified() {
        assert!(login_redirect("https://www.netflix.com/login?nextpage=browse"));
        assert!(login_redirect("/login"));
        assert!(login_redirect("/fr/login"));
        assert!(!login_redirect("https://www.netflix.com/browse"));
        // Only the path counts, not the query.
        assert!(!login_redirect("/browse?from=login"));
    }

    #[test]
    fn switch_url_carries_uid_and_cache_buster() {
        let url = switch_url(&"GUID-9".to_owned().into(), 1700000000000);
        assert_eq!(
            url,
            "https://www.netflix.com/api/shakti/mre/profiles/switch?switchProfileGuid=GUID-9&_=1700000000000&authURL=/"
        );
    }
}
