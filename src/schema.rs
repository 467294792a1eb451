use getset::Getters;
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;
use uuid::Uuid;

/// Display name of a viewer profile, with HTML entities already decoded.
#[derive(
    Clone, PartialEq, Eq, Debug, derive_more::From, derive_more::Display, Serialize, Deserialize,
)]
pub struct ProfileName(String);
impl ProfileName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// The stable identifier Netflix uses to address a profile (`data-profile-guid`).
#[derive(
    Clone,
    PartialEq,
    Eq,
    Hash,
    Debug,
    derive_more::From,
    derive_more::Display,
    Serialize,
    Deserialize,
)]
pub struct ProfileUid(String);
impl ProfileUid {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(
    Clone, PartialEq, Eq, Debug, derive_more::From, derive_more::Display, Serialize, Deserialize,
)]
pub struct AvatarUrl(String);

/// One viewer profile on the account.  Produced fresh on every discovery;
/// never persisted.
#[derive(Clone, PartialEq, Eq, Debug, TypedBuilder, Serialize, Deserialize)]
pub struct ProfileDescriptor {
    pub name: ProfileName,
    pub uid: ProfileUid,
    pub avatar: Option<AvatarUrl>,
}

/// Outcome of one discovery attempt.  Exactly one variant is active per call;
/// `LoggedOut` and `Empty` are distinct from a generic `Failure` so that the
/// UI can branch on them.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum DiscoveryResult {
    Success { profiles: Vec<ProfileDescriptor> },
    LoggedOut,
    Empty,
    Failure { reason: String },
}

/// A cookie normalized to the shape the second device needs.  Identity is
/// `(name, domain)`; the last observed value wins.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
    pub domain: String,
}

pub const HANDOFF_ACTION: &str = "add-new-profile";

#[derive(Debug, thiserror::Error)]
#[error("A handoff payload requires at least one captured cookie.")]
pub struct EmptyCookieSet;

/// The session state transferred to the second device.  Immutable once built;
/// construction fails rather than producing a payload with no cookies.
#[derive(Clone, PartialEq, Eq, Debug, Getters, Serialize, Deserialize)]
pub struct HandoffPayload {
    #[getset(get = "pub")]
    action: String,
    #[serde(rename = "profileUsername")]
    #[getset(get = "pub")]
    profile_username: ProfileName,
    #[serde(rename = "profileObject")]
    #[getset(get = "pub")]
    profile_object: ProfileObject,
}

#[derive(Clone, PartialEq, Eq, Debug, Getters, Serialize, Deserialize)]
pub struct ProfileObject {
    #[serde(rename = "profileUid")]
    #[getset(get = "pub")]
    profile_uid: ProfileUid,
    #[getset(get = "pub")]
    cookies: Vec<SessionCookie>,
}

impl HandoffPayload {
    pub fn new(
        profile_username: ProfileName,
        profile_uid: ProfileUid,
        cookies: Vec<SessionCookie>,
    ) -> Result<Self, EmptyCookieSet> {
        if cookies.is_empty() {
            return Err(EmptyCookieSet);
        }
        Ok(Self {
            action: HANDOFF_ACTION.to_owned(),
            profile_username,
            profile_object: ProfileObject {
                profile_uid,
                cookies,
            },
        })
    }
}

/// Random opaque token addressing one relay entry.  Generated independently
/// for every handoff and never reused.
#[derive(
    Clone, PartialEq, Eq, Hash, Debug, derive_more::Display, Serialize, Deserialize,
)]
pub struct TicketId(String);
impl TicketId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// What actually travels: the relay key plus the transport-encoded payload.
/// Only the identifier is ever encoded into the scannable code.
#[derive(Clone, PartialEq, Eq, Debug, Getters, Serialize, Deserialize)]
#[getset(get = "pub")]
pub struct HandoffTicket {
    identifier: TicketId,
    encoded_payload: String,
}

impl HandoffTicket {
    pub fn new(identifier: TicketId, encoded_payload: String) -> Self {
        Self {
            identifier,
            encoded_payload,
        }
    }
}
