//! # Member Signatures
//!
//! A member signature addresses one member of one registered instance using
//! nothing but string content: `<instanceId>.<memberName>`. Both segments are
//! escaped so that a `.` or `\` occurring inside a real id or member name can
//! never be mistaken for the structural separator:
//!
//! | raw         | encoded      |
//! |-------------|--------------|
//! | `.`         | `\.`         |
//! | `\`         | `\\`         |
//!
//! A signature therefore contains exactly one unescaped `.`.

use crate::error::RemotingError;
use std::fmt;
use std::str::FromStr;

/// Structural separator between the instance id and the member name.
pub const SIGNATURE_SEPARATOR: char = '.';

const ESCAPE: char = '\\';

/// Parsed `(instanceId, memberName)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MemberSignature {
    instance_id: String,
    member_name: String,
}

impl MemberSignature {
    pub fn new(instance_id: impl Into<String>, member_name: impl Into<String>) -> Self {
        Self {
            instance_id: instance_id.into(),
            member_name: member_name.into(),
        }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    pub fn member_name(&self) -> &str {
        &self.member_name
    }

    /// Encodes the signature into its wire form.
    pub fn encode(&self) -> String {
        let mut out = String::with_capacity(self.instance_id.len() + self.member_name.len() + 1);
        escape_into(&self.instance_id, &mut out);
        out.push(SIGNATURE_SEPARATOR);
        escape_into(&self.member_name, &mut out);
        out
    }

    /// Parses the wire form produced by [`MemberSignature::encode`].
    pub fn parse(signature: &str) -> Result<Self, RemotingError> {
        let invalid = |reason: &str| RemotingError::InvalidSignature {
            signature: signature.to_string(),
            reason: reason.to_string(),
        };

        let mut instance_id = String::new();
        let mut member_name = String::new();
        let mut seen_separator = false;
        let mut chars = signature.chars();

        while let Some(c) = chars.next() {
            let target = if seen_separator { &mut member_name } else { &mut instance_id };
            match c {
                ESCAPE => match chars.next() {
                    Some(escaped @ (ESCAPE | SIGNATURE_SEPARATOR)) => target.push(escaped),
                    Some(other) => {
                        return Err(invalid(&format!("unknown escape sequence '\\{other}'")))
                    }
                    None => return Err(invalid("dangling escape character")),
                },
                SIGNATURE_SEPARATOR if !seen_separator => seen_separator = true,
                SIGNATURE_SEPARATOR => return Err(invalid("more than one unescaped separator")),
                other => target.push(other),
            }
        }

        if !seen_separator {
            return Err(invalid("missing separator"));
        }

        Ok(Self {
            instance_id,
            member_name,
        })
    }
}

impl fmt::Display for MemberSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for MemberSignature {
    type Err = RemotingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Convenience for building the wire form without an intermediate value.
pub fn encode_signature(instance_id: &str, member_name: &str) -> String {
    MemberSignature::new(instance_id, member_name).encode()
}

fn escape_into(segment: &str, out: &mut String) {
    for c in segment.chars() {
        if c == ESCAPE || c == SIGNATURE_SEPARATOR {
            out.push(ESCAPE);
        }
        out.push(c);
    }
}
