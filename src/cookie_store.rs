//! In-process record of the cookies the provider has set, keyed by
//! `(name, domain)`.  This is what the second device ultimately receives, so
//! only the normalized triple is kept; every other cookie attribute is
//! dropped on the way in.

use std::{
    io::{self, BufReader, BufWriter},
    path::PathBuf,
};

use fs_err::File;
use serde::{Deserialize, Serialize};

use crate::schema::SessionCookie;

#[derive(Default, Debug, Serialize, Deserialize)]
pub struct CookieStore {
    cookies: Vec<SessionCookie>,
}

impl CookieStore {
    /// Folds one response's `Set-Cookie` headers into the store and returns
    /// how many cookies were observed.  A cookie without an explicit domain
    /// attribute is scoped to the response's host.
    pub fn record_response(&mut self, response: &reqwest::Response) -> usize {
        let host = response
            .url()
            .host_str()
            .map(|host| host.trim_start_matches("www.").to_owned());
        let mut count = 0;
        for cookie in response.cookies() {
            let Some(domain) = cookie.domain().map(str::to_owned).or_else(|| host.clone()) else {
                continue;
            };
            self.record(SessionCookie {
                name: cookie.name().to_owned(),
                value: cookie.value().to_owned(),
                domain,
            });
            count += 1;
        }
        count
    }

    /// Last observed value wins for a given `(name, domain)`.
    pub fn record(&mut self, cookie: SessionCookie) {
        match self
            .cookies
            .iter_mut()
            .find(|c| c.name == cookie.name && c.domain == cookie.domain)
        {
            Some(existing) => existing.value = cookie.value,
            None => self.cookies.push(cookie),
        }
    }

    /// All cookies scoped to `domain` or one of its subdomains.
    pub fn cookies_for_domain(&self, domain: &str) -> Vec<SessionCookie> {
        self.cookies
            .iter()
            .filter(|cookie| domain_matches(&cookie.domain, domain))
            .cloned()
            .collect()
    }

    pub fn load(path: impl Into<PathBuf>) -> Result<Self, CookieStoreLoadError> {
        Ok(serde_json::from_reader(BufReader::new(File::open(
            path.into(),
        )?))?)
    }

    pub fn save(&self, path: impl Into<PathBuf>) -> std::io::Result<()> {
        let writer = BufWriter::new(File::create(path.into())?);
        serde_json::to_writer(writer, self)?;
        Ok(())
    }
}

fn domain_matches(cookie_domain: &str, domain: &str) -> bool {
    let cookie_domain = cookie_domain.trim_start_matches('.');
    cookie_domain == domain || cookie_domain.ends_with(&format!(".{domain}"))
}

#[derive(Debug, thiserror::Error)]
pub enum CookieStoreLoadError {
    #[error("Cookie store was not found.")]
    NotFound,
    #[error("An I/O error occurred when loading the cookie store: {0:?}")]
    IOError(io::Error),
    #[error("The cookie store json file is corrupted and could not be loaded: {0:?}")]
    JsonError(#[from] serde_json::Error),
}
impl From<io::Error> for CookieStoreLoadError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::NotFound => Self::NotFound,
            _ => Self::IOError(e),
        }
    }
}
