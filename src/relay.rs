//! Turns a captured session into a retrievable, shareable reference.
//!
//! The payload itself never travels over the scannable-code channel: it is
//! stored on the relay under a fresh random identifier, and only that
//! identifier gets encoded for the second device.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use log::{debug, info};
use reqwest::StatusCode;
use serde::Serialize;
use url::Url;

use crate::schema::{EmptyCookieSet, HandoffPayload, HandoffTicket, ProfileUid, TicketId};

/// Everything that can go wrong between selecting a profile and showing the
/// code.  All variants are reported inline near the affected profile; none of
/// them touches the already-displayed profile list.
#[derive(Debug, thiserror::Error)]
pub enum HandoffError {
    #[error(transparent)]
    Validation(#[from] EmptyCookieSet),
    #[error("Code {status} while switching to Netflix profile {uid}.")]
    Switch { uid: ProfileUid, status: StatusCode },
    #[error("Network error while switching Netflix profiles: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("Failed to encode the handoff payload: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("Failed to store the handoff ticket on the relay: {0}")]
    RelaySubmission(#[source] anyhow::Error),
    #[error("Failed to generate the scannable code: {0}")]
    Code(#[source] anyhow::Error),
}

/// Canonical JSON, then standard base64.  The round trip through
/// [`decode_transport`] is exact for any payload.
pub fn encode_transport(payload: &HandoffPayload) -> serde_json::Result<String> {
    Ok(BASE64.encode(serde_json::to_string(payload)?))
}

/// Reverses [`encode_transport`]; the second device runs this after fetching
/// the payload from the relay.
pub fn decode_transport(encoded: &str) -> anyhow::Result<HandoffPayload> {
    let bytes = BASE64.decode(encoded)?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Builds the ticket for one handoff.  The identifier is generated fresh
/// every time; two handoffs of the same profile never share one.
pub fn issue_ticket(payload: &HandoffPayload) -> serde_json::Result<HandoffTicket> {
    Ok(HandoffTicket::new(
        TicketId::generate(),
        encode_transport(payload)?,
    ))
}

#[derive(Serialize)]
struct TicketSubmission<'a> {
    #[serde(rename = "unique-identifier")]
    identifier: &'a TicketId,
    content: &'a str,
}

pub struct RelayClient {
    client: reqwest::Client,
    endpoint: Url,
}

impl RelayClient {
    pub fn new(endpoint: Url) -> reqwest::Result<Self> {
        Ok(Self {
            client: reqwest::Client::builder().build()?,
            endpoint,
        })
    }

    /// Stores the ticket on the relay.  The store is at-most-one write per
    /// identifier, so an ambiguous failure is surfaced as-is rather than
    /// retried; a resubmission could create a duplicate entry.
    pub async fn submit(&self, ticket: &HandoffTicket) -> Result<(), HandoffError> {
        info!("Submitting handoff ticket {}", ticket.identifier());
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&TicketSubmission {
                identifier: ticket.identifier(),
                content: ticket.encoded_payload(),
            })
            .send()
            .await
            .map_err(|e| HandoffError::RelaySubmission(e.into()))?
            .error_for_status()
            .map_err(|e| HandoffError::RelaySubmission(e.into()))?;
        // The relay's response body is informational only.
        match response.json::<serde_json::Value>().await {
            Ok(body) => debug!("Relay response: {body}"),
            Err(e) => debug!("Relay response was not JSON: {e}"),
        }
        Ok(())
    }
}
