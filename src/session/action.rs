//! Store actions accepted by the session.
//!
//! Names are the literal dispatch strings of the chat client's store, so a
//! dispatch log can be compared against what the UI layer sends.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::error::{ResilienceError, ResilienceResult};

/// A command from the UI/store layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// First handshake; starts both polling tasks on success.
    InitializeStore,
    /// (Re)start channel polling. `None` uses the configured interval.
    SetChannelPolling(Option<Duration>),
    /// (Re)start chatter polling. `None` uses the configured interval.
    SetRefreshChatterInterval(Option<Duration>),
    SkipBackoff,
    ResetConnectionState,
    /// Alias of `signalDisconnect`.
    SignalHoloDisconnect,
    /// Overwrite the displayed reconnect countdown. `None` (payload `true`)
    /// shows the time left before the armed attempt; `false` clears it.
    SetReconnecting(Option<Duration>),
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::InitializeStore => "initializeStore",
            Action::SetChannelPolling(_) => "elementalChat/setChannelPolling",
            Action::SetRefreshChatterInterval(_) => "elementalChat/setRefreshChatterInterval",
            Action::SkipBackoff => "holochain/skipBackoff",
            Action::ResetConnectionState => "holochain/resetConnectionState",
            Action::SignalHoloDisconnect => "holochain/signalHoloDisconnect",
            Action::SetReconnecting(_) => "holochain/setReconnecting",
        }
    }

    /// Reject malformed payloads before they reach the session.
    pub fn validate(&self) -> ResilienceResult<()> {
        match self {
            Action::SetChannelPolling(Some(interval)) | Action::SetRefreshChatterInterval(Some(interval))
                if interval.is_zero() =>
            {
                Err(ResilienceError::FatalConfiguration(format!(
                    "{} interval must be non-zero",
                    self.name()
                )))
            }
            _ => Ok(()),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::SetChannelPolling(Some(d))
            | Action::SetRefreshChatterInterval(Some(d))
            | Action::SetReconnecting(Some(d)) => write!(f, "{} {}", self.name(), d.as_millis()),
            Action::SetReconnecting(None) => write!(f, "{} true", self.name()),
            _ => f.write_str(self.name()),
        }
    }
}

/// Error for textual actions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseActionError {
    #[error("unknown action '{0}'")]
    Unknown(String),

    #[error("invalid payload '{payload}' for {action}")]
    InvalidPayload { action: &'static str, payload: String },

    #[error("{0} takes no payload")]
    UnexpectedPayload(&'static str),

    #[error("{0} requires a payload in milliseconds")]
    MissingPayload(&'static str),
}

/// Parses `"<name> [millis]"`, e.g. `elementalChat/setChannelPolling 2000`.
impl FromStr for Action {
    type Err = ParseActionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split_whitespace();
        let name = parts.next().unwrap_or_default();
        let payload = parts.next();

        let millis = |action: &'static str| -> Result<Option<Duration>, ParseActionError> {
            payload
                .map(|p| {
                    p.parse::<u64>()
                        .map(Duration::from_millis)
                        .map_err(|_| ParseActionError::InvalidPayload {
                            action,
                            payload: p.to_string(),
                        })
                })
                .transpose()
        };
        let bare = |action: Action| -> Result<Action, ParseActionError> {
            match payload {
                Some(_) => Err(ParseActionError::UnexpectedPayload(action.name())),
                None => Ok(action),
            }
        };

        match name {
            "initializeStore" => bare(Action::InitializeStore),
            "elementalChat/setChannelPolling" => Ok(Action::SetChannelPolling(millis(
                "elementalChat/setChannelPolling",
            )?)),
            "elementalChat/setRefreshChatterInterval" => Ok(Action::SetRefreshChatterInterval(millis(
                "elementalChat/setRefreshChatterInterval",
            )?)),
            "holochain/skipBackoff" => bare(Action::SkipBackoff),
            "holochain/resetConnectionState" => bare(Action::ResetConnectionState),
            "holochain/signalHoloDisconnect" => bare(Action::SignalHoloDisconnect),
            "holochain/setReconnecting" => match payload {
                Some("true") => Ok(Action::SetReconnecting(None)),
                Some("false") => Ok(Action::SetReconnecting(Some(Duration::ZERO))),
                _ => millis("holochain/setReconnecting")?
                    .map(|remaining| Action::SetReconnecting(Some(remaining)))
                    .ok_or(ParseActionError::MissingPayload("holochain/setReconnecting")),
            },
            other => Err(ParseActionError::Unknown(other.to_string())),
        }
    }
}
