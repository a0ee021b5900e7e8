//! # Direction Policy
//!
//! Decides whether a member's changes may leave this endpoint and whether
//! changes arriving from the peer may be applied. The policy is a pure
//! function of the link's [`RemotingMode`] and the member's effective
//! [`RemotingDirection`]:
//!
//! | mode   | direction     | outbound | inbound |
//! |--------|---------------|----------|---------|
//! | Host   | HostToClient  | yes      | no      |
//! | Host   | ClientToHost  | no       | yes     |
//! | Host   | Bidirectional | yes      | yes     |
//! | Host   | None          | no       | no      |
//! | Client | HostToClient  | no       | yes     |
//! | Client | ClientToHost  | yes      | no      |
//! | Client | Bidirectional | yes      | yes     |
//! | Client | None          | no       | no      |
//!
//! Inbound checks fail closed: anything not explicitly accepted is dropped.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which way changes to a member (or class) are allowed to flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RemotingDirection {
    HostToClient,
    ClientToHost,
    Bidirectional,
    #[default]
    None,
}

/// Role of one endpoint of a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RemotingMode {
    Host,
    Client,
}

impl RemotingMode {
    /// The role on the other end of the link.
    pub fn peer(self) -> Self {
        match self {
            RemotingMode::Host => RemotingMode::Client,
            RemotingMode::Client => RemotingMode::Host,
        }
    }
}

impl fmt::Display for RemotingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemotingMode::Host => f.write_str("host"),
            RemotingMode::Client => f.write_str("client"),
        }
    }
}

impl fmt::Display for RemotingDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RemotingDirection::HostToClient => "HostToClient",
            RemotingDirection::ClientToHost => "ClientToHost",
            RemotingDirection::Bidirectional => "Bidirectional",
            RemotingDirection::None => "None",
        };
        f.write_str(s)
    }
}

/// Returns true when a local mutation on an endpoint in `mode` may be sent
/// to the peer.
pub fn should_propagate(mode: RemotingMode, direction: RemotingDirection) -> bool {
    matches!(
        (mode, direction),
        (RemotingMode::Host, RemotingDirection::HostToClient)
            | (RemotingMode::Client, RemotingDirection::ClientToHost)
            | (_, RemotingDirection::Bidirectional)
    )
}

/// Returns true when a message arriving at an endpoint in `mode` may be
/// applied. The peer's outbound permission is the local inbound permission.
pub fn accepts_inbound(mode: RemotingMode, direction: RemotingDirection) -> bool {
    should_propagate(mode.peer(), direction)
}

/// Effective direction: member override, then class default, then `None`.
pub fn resolve_direction(
    member: Option<RemotingDirection>,
    class: Option<RemotingDirection>,
) -> RemotingDirection {
    member.or(class).unwrap_or_default()
}
