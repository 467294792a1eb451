//! Discovery orchestration: `Idle → Loading → {ProfilesShown | ErrorShown}`,
//! plus the per-profile handoff sub-flow that runs on user selection.
//!
//! The UI is an external collaborator behind [`UiSink`]; this module decides
//! what happens, the sink decides what it looks like.

use std::collections::HashSet;
use std::future::Future;

use log::{error, info, warn};
use scraper::Html;

use crate::api::{NetflixClient, PageFetch};
use crate::profile_parser;
use crate::qr::{CodeArtifact, CodeEncoder};
use crate::relay::{issue_ticket, HandoffError, RelayClient};
use crate::schema::{
    DiscoveryResult, HandoffPayload, HandoffTicket, ProfileDescriptor, ProfileUid, SessionCookie,
};

/// Switch-and-capture step of the handoff pipeline.  [`NetflixClient`] is the
/// real implementation; the seam exists so the pipeline can be exercised
/// without the provider.
pub trait SessionSource {
    fn capture_session(
        &mut self,
        uid: &ProfileUid,
    ) -> impl Future<Output = Result<Vec<SessionCookie>, HandoffError>>;
}

impl SessionSource for NetflixClient {
    async fn capture_session(
        &mut self,
        uid: &ProfileUid,
    ) -> Result<Vec<SessionCookie>, HandoffError> {
        self.switch_profile(uid).await
    }
}

/// Ticket storage step; [`RelayClient`] is the real implementation.
pub trait TicketSink {
    fn submit(&self, ticket: &HandoffTicket) -> impl Future<Output = Result<(), HandoffError>>;
}

impl TicketSink for RelayClient {
    async fn submit(&self, ticket: &HandoffTicket) -> Result<(), HandoffError> {
        RelayClient::submit(self, ticket).await
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum DiscoveryState {
    Idle,
    Loading,
    ProfilesShown,
    ErrorShown,
}

/// What the orchestrator tells its UI collaborator.  `show_handoff_error` is
/// deliberately separate from `show_error`: a failed handoff is reported
/// inline near the affected profile and never tears down the profile list.
pub trait UiSink {
    fn show_loading(&mut self);
    fn show_profiles(&mut self, profiles: &[ProfileDescriptor]);
    fn show_error(&mut self, message: &str);
    fn show_code(&mut self, profile: &ProfileDescriptor, code: &CodeArtifact);
    fn show_handoff_error(&mut self, profile: &ProfileDescriptor, error: &HandoffError);
}

pub struct DiscoveryFlow<U> {
    state: DiscoveryState,
    profiles: Vec<ProfileDescriptor>,
    in_flight: HashSet<ProfileUid>,
    ui: U,
}

impl<U: UiSink> DiscoveryFlow<U> {
    pub fn new(ui: U) -> Self {
        Self {
            state: DiscoveryState::Idle,
            profiles: vec![],
            in_flight: HashSet::new(),
            ui,
        }
    }

    pub fn state(&self) -> DiscoveryState {
        self.state
    }

    pub fn profiles(&self) -> &[ProfileDescriptor] {
        &self.profiles
    }

    /// Runs one full discovery: fetch, extract, classify, and report the
    /// outcome to the UI.  Terminal until a new discovery is initiated.
    pub async fn discover(&mut self, client: &mut NetflixClient) -> DiscoveryState {
        self.begin();
        let result = discover_profiles(client).await;
        self.complete(result)
    }

    fn begin(&mut self) {
        self.state = DiscoveryState::Loading;
        self.profiles.clear();
        self.in_flight.clear();
        self.ui.show_loading();
    }

    fn complete(&mut self, result: DiscoveryResult) -> DiscoveryState {
        self.state = match result {
            DiscoveryResult::Success { profiles } => {
                info!("Netflix profiles fetched: {}", profiles.len());
                self.ui.show_profiles(&profiles);
                self.profiles = profiles;
                DiscoveryState::ProfilesShown
            }
            DiscoveryResult::LoggedOut => {
                warn!("Not logged in: the browse page redirected to login.");
                self.ui.show_error("You are not logged in to Netflix.");
                DiscoveryState::ErrorShown
            }
            DiscoveryResult::Empty => {
                warn!("No profiles found in the browse page.");
                self.ui.show_error("No profiles were found on this account.");
                DiscoveryState::ErrorShown
            }
            DiscoveryResult::Failure { reason } => {
                error!("Error fetching profiles: {reason}");
                self.ui.show_error("Unable to fetch your Netflix profiles.");
                DiscoveryState::ErrorShown
            }
        };
        self.state
    }

    /// Handles a user-driven profile selection.  Runs the sequential
    /// pipeline: switch and capture, build payload, encode, submit, and only
    /// then encode the identifier into the scannable code.  A failure is
    /// reported inline and leaves the orchestrator in `ProfilesShown`.
    pub async fn select_profile(
        &mut self,
        session: &mut impl SessionSource,
        relay: &impl TicketSink,
        encoder: &impl CodeEncoder,
        uid: &ProfileUid,
    ) -> Option<HandoffTicket> {
        let profile = self.begin_handoff(uid)?;
        let outcome = run_handoff(session, relay, encoder, &profile).await;
        self.finish_handoff(uid);
        match outcome {
            Ok((ticket, code)) => {
                self.ui.show_code(&profile, &code);
                Some(ticket)
            }
            Err(e) => {
                error!("Handoff for profile {} failed: {e}", profile.uid);
                self.ui.show_handoff_error(&profile, &e);
                None
            }
        }
    }

    /// Marks the profile's handoff as in flight; `None` when the selection is
    /// not actionable (wrong state, unknown uid, or a handoff for this
    /// profile already running).
    fn begin_handoff(&mut self, uid: &ProfileUid) -> Option<ProfileDescriptor> {
        if self.state != DiscoveryState::ProfilesShown {
            warn!("Ignoring profile selection outside of the profile list view.");
            return None;
        }
        let Some(profile) = self.profiles.iter().find(|p| &p.uid == uid).cloned() else {
            warn!("Selected profile {uid} is not in the current list.");
            return None;
        };
        if !self.in_flight.insert(uid.clone()) {
            info!("A handoff for profile {uid} is already in progress.");
            return None;
        }
        Some(profile)
    }

    fn finish_handoff(&mut self, uid: &ProfileUid) {
        self.in_flight.remove(uid);
    }
}

/// Fetch and classify, catching every failure into a `DiscoveryResult`.
pub async fn discover_profiles(client: &mut NetflixClient) -> DiscoveryResult {
    info!("Fetching Netflix profiles...");
    match client.fetch_profile_page().await {
        Ok(page) => classify_page(page),
        Err(e) => DiscoveryResult::Failure {
            reason: format!("{e:#}"),
        },
    }
}

pub fn classify_page(page: PageFetch) -> DiscoveryResult {
    match page {
        PageFetch::LoggedOut => DiscoveryResult::LoggedOut,
        PageFetch::Status(status) => DiscoveryResult::Failure {
            reason: format!("Code {status} while fetching Netflix profiles"),
        },
        PageFetch::Body(body) => {
            let html = Html::parse_document(&body);
            match profile_parser::extract_profiles(&html) {
                Some(profiles) => DiscoveryResult::Success { profiles },
                None => DiscoveryResult::Empty,
            }
        }
    }
}

/// The handoff pipeline proper.  Each step takes the previous step's output;
/// a switch that succeeded but whose capture failed leaves the remote profile
/// switched, which is accepted and documented rather than rolled back.
async fn run_handoff(
    session: &mut impl SessionSource,
    relay: &impl TicketSink,
    encoder: &impl CodeEncoder,
    profile: &ProfileDescriptor,
) -> Result<(HandoffTicket, CodeArtifact), HandoffError> {
    let cookies = session.capture_session(&profile.uid).await?;
    let payload = HandoffPayload::new(profile.name.clone(), profile.uid.clone(), cookies)?;
    let ticket = issue_ticket(&payload)?;
    relay.submit(&ticket).await?;
    // Only the identifier goes into the code; the payload stays on the relay.
    let code = encoder
        .encode(ticket.identifier().as_str())
        .map_err(HandoffError::Code)?;
    Ok((ticket, code))
}
