//! # Member Registry
//!
//! Maps instance ids to their [`MemberRemote`] and member signatures to a
//! specific annotated member of a specific instance. Lookups use only the
//! string content of the signature plus this process's own metadata.
//!
//! Entries are keyed by id and stamped with the remote's registration
//! token, so a remote that was replaced under [`DuplicatePolicy::ReplaceWithWarning`]
//! can never unregister the entry that replaced it.

use crate::error::RemotingError;
use crate::member::{RemotableObject, ResolvedMember};
use crate::remote::MemberRemote;
use crate::signature::MemberSignature;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

/// Behaviour when an id is registered while another instance holds it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Fail with [`RemotingError::DuplicateInstance`]
    #[default]
    Reject,
    /// Replace the existing entry and log a warning
    ReplaceWithWarning,
}

/// Concurrent id -> instance map shared by a link and its remotes.
#[derive(Debug)]
pub struct MemberRegistry {
    entries: DashMap<String, MemberRemote>,
    policy: DuplicatePolicy,
}

impl MemberRegistry {
    pub fn new(policy: DuplicatePolicy) -> Self {
        Self {
            entries: DashMap::new(),
            policy,
        }
    }

    pub fn policy(&self) -> DuplicatePolicy {
        self.policy
    }

    /// Registers `remote` under its id. Returns the displaced remote when the
    /// policy allowed a replacement.
    pub fn register(&self, remote: MemberRemote) -> Result<Option<MemberRemote>, RemotingError> {
        let id = remote.id().to_string();

        match self.entries.entry(id.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(remote);
                debug!("📝 Registered instance '{}'", id);
                Ok(None)
            }
            Entry::Occupied(mut slot) => match self.policy {
                DuplicatePolicy::Reject => Err(RemotingError::DuplicateInstance(id)),
                DuplicatePolicy::ReplaceWithWarning => {
                    warn!("⚠️ Instance '{}' was already registered; replacing it", id);
                    Ok(Some(slot.insert(remote)))
                }
            },
        }
    }

    /// Removes `id`. Removing an unknown id is a no-op.
    pub fn unregister(&self, id: &str) -> bool {
        self.entries.remove(id).is_some()
    }

    /// Removes `id` only while it still belongs to the registration `token`.
    pub fn unregister_instance(&self, id: &str, token: Uuid) -> bool {
        self.entries
            .remove_if(id, |_, remote| remote.token() == token)
            .is_some()
    }

    pub fn resolve(&self, id: &str) -> Result<MemberRemote, RemotingError> {
        self.entries
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| RemotingError::UnknownInstance(id.to_string()))
    }

    /// Resolves an encoded signature to its instance and annotated member.
    pub fn resolve_member(&self, signature: &str) -> Result<(MemberRemote, ResolvedMember), RemotingError> {
        let parsed = MemberSignature::parse(signature)?;
        let remote = self.resolve(parsed.instance_id())?;
        let member = remote.member(parsed.member_name())?;
        Ok((remote, member))
    }

    /// Every member of `object` carrying a direction annotation, either its
    /// own or inherited from the class. Unannotated members are never
    /// returned, so they can never be targeted by inbound messages.
    pub fn enumerate_remotable_members(object: &dyn RemotableObject) -> Vec<ResolvedMember> {
        let class_direction = object.class_direction();
        object
            .members()
            .iter()
            .filter_map(|member| member.resolve(class_direction))
            .collect()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ids(&self) -> Vec<String> {
        self.entries.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Snapshot of every registered remote.
    pub fn remotes(&self) -> Vec<MemberRemote> {
        self.entries.iter().map(|entry| entry.value().clone()).collect()
    }
}

impl Default for MemberRegistry {
    fn default() -> Self {
        Self::new(DuplicatePolicy::default())
    }
}
