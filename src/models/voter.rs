//! Viewer identity and role.

use serde::{Deserialize, Serialize};

/// Who is casting a vote.
///
/// Signed-in members vote with their account id; everyone else votes with a
/// token persisted on their device. The two never compare equal, even when the
/// strings happen to match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "camelCase")]
pub enum VoterIdentity {
    Authenticated(String),
    Anonymous(String),
}

impl VoterIdentity {
    /// Storage discriminator for the `voter_kind` column.
    pub fn kind(&self) -> &'static str {
        match self {
            VoterIdentity::Authenticated(_) => "user",
            VoterIdentity::Anonymous(_) => "anon",
        }
    }

    pub fn id(&self) -> &str {
        match self {
            VoterIdentity::Authenticated(id) | VoterIdentity::Anonymous(id) => id,
        }
    }

    /// Account id, if the voter is signed in.
    pub fn user_id(&self) -> Option<&str> {
        match self {
            VoterIdentity::Authenticated(id) => Some(id),
            VoterIdentity::Anonymous(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Role {
    Member,
    Admin,
}

/// The caller of an operation: role plus optional voting identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Viewer {
    pub role: Role,
    pub voter: Option<VoterIdentity>,
}

impl Viewer {
    pub fn member(voter: Option<VoterIdentity>) -> Self {
        Self {
            role: Role::Member,
            voter,
        }
    }

    pub fn admin(voter: Option<VoterIdentity>) -> Self {
        Self {
            role: Role::Admin,
            voter,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}
