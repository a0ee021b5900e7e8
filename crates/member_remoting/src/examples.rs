//! Example remotable object.
//!
//! [`ExampleTrack`] shows how a domain type opts into remoting: it lists its
//! members with their directions, forwards get/set/invoke by name, and keeps
//! the [`MemberHook`] it is given so its own setters report changes.

use crate::direction::RemotingDirection;
use crate::error::MemberError;
use crate::member::{MemberDescriptor, RemotableObject};
use crate::remote::MemberHook;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

/// A music track shared between host and client.
#[derive(Debug, Clone)]
pub struct ExampleTrack {
    name: String,
    play_count: u64,
    rating: u8,
    local_note: String,
    cache: Value,
    position_secs: u64,
    played_notifications: u64,
    hook: MemberHook,
}

impl ExampleTrack {
    pub const TYPE_NAME: &'static str = "ExampleTrack";

    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            play_count: 0,
            rating: 0,
            local_note: String::new(),
            cache: Value::Null,
            position_secs: 0,
            played_notifications: 0,
            hook: MemberHook::detached(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn play_count(&self) -> u64 {
        self.play_count
    }

    pub fn rating(&self) -> u8 {
        self.rating
    }

    pub fn local_note(&self) -> &str {
        &self.local_note
    }

    pub fn position_secs(&self) -> u64 {
        self.position_secs
    }

    /// Number of `Played` events this instance has seen.
    pub fn played_notifications(&self) -> u64 {
        self.played_notifications
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        let name = name.into();
        if name == self.name {
            return;
        }
        let old = std::mem::replace(&mut self.name, name);
        self.hook.property_changed("Name", &json!(old), &json!(self.name));
    }

    pub fn set_play_count(&mut self, play_count: u64) {
        let old = std::mem::replace(&mut self.play_count, play_count);
        self.hook.property_changed("PlayCount", &json!(old), &json!(play_count));
    }

    pub fn set_rating(&mut self, rating: u8) -> Result<(), MemberError> {
        if rating > 5 {
            return Err(MemberError::invalid_argument(format!(
                "rating must be between 0 and 5, got {rating}"
            )));
        }
        let old = std::mem::replace(&mut self.rating, rating);
        self.hook.property_changed("Rating", &json!(old), &json!(rating));
        Ok(())
    }

    /// Never leaves this process: the member opts out of remoting.
    pub fn set_local_note(&mut self, note: impl Into<String>) {
        let note = note.into();
        let old = std::mem::replace(&mut self.local_note, note);
        self.hook.property_changed("LocalNote", &json!(old), &json!(self.local_note));
    }

    /// Starts playback; bumps the play count and raises `Played`.
    pub fn play(&mut self) -> u64 {
        self.hook.method_called("Play", &[]);
        self.set_play_count(self.play_count + 1);
        self.played_notifications += 1;
        self.hook.event_raised("Played", &[json!(self.play_count)]);
        self.play_count
    }

    /// Moves the playback position.
    pub fn skip(&mut self, seconds: i64) -> Result<u64, MemberError> {
        let position = self
            .position_secs
            .checked_add_signed(seconds)
            .ok_or_else(|| MemberError::invalid_argument(format!("cannot skip {seconds}s from {}s", self.position_secs)))?;
        self.position_secs = position;
        self.hook.method_called("Skip", &[json!(seconds)]);
        Ok(position)
    }

    /// Always fails.
    pub fn fail(&mut self) -> Result<(), MemberError> {
        self.hook.method_called("Fail", &[]);
        Err(MemberError::invalid_operation("boom"))
    }
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T, MemberError> {
    serde_json::from_value(value).map_err(MemberError::from_serde)
}

fn argument<T: DeserializeOwned>(arguments: &mut Vec<Value>, name: &str) -> Result<T, MemberError> {
    if arguments.is_empty() {
        return Err(MemberError::invalid_argument(format!("missing argument '{name}'")));
    }
    decode(arguments.remove(0))
}

impl RemotableObject for ExampleTrack {
    fn type_name(&self) -> &str {
        Self::TYPE_NAME
    }

    fn members(&self) -> Vec<MemberDescriptor> {
        vec![
            MemberDescriptor::property("Name").with_direction(RemotingDirection::Bidirectional),
            MemberDescriptor::property("PlayCount").with_direction(RemotingDirection::HostToClient),
            MemberDescriptor::property("Rating").with_direction(RemotingDirection::ClientToHost),
            MemberDescriptor::property("LocalNote").with_direction(RemotingDirection::None),
            MemberDescriptor::property("Cache"),
            MemberDescriptor::method("Play", 0).with_direction(RemotingDirection::Bidirectional),
            MemberDescriptor::method("Skip", 1).with_direction(RemotingDirection::HostToClient),
            MemberDescriptor::method("Fail", 0).with_direction(RemotingDirection::Bidirectional),
            MemberDescriptor::event("Played", 1).with_direction(RemotingDirection::HostToClient),
        ]
    }

    fn get_property(&self, name: &str) -> Result<Value, MemberError> {
        match name {
            "Name" => Ok(json!(self.name)),
            "PlayCount" => Ok(json!(self.play_count)),
            "Rating" => Ok(json!(self.rating)),
            "LocalNote" => Ok(json!(self.local_note)),
            "Cache" => Ok(self.cache.clone()),
            other => Err(MemberError::missing_member(other)),
        }
    }

    fn set_property(&mut self, name: &str, value: Value) -> Result<(), MemberError> {
        match name {
            "Name" => self.set_name(decode::<String>(value)?),
            "PlayCount" => self.set_play_count(decode(value)?),
            "Rating" => self.set_rating(decode(value)?)?,
            "LocalNote" => self.set_local_note(decode::<String>(value)?),
            "Cache" => self.cache = value,
            other => return Err(MemberError::missing_member(other)),
        }
        Ok(())
    }

    fn invoke(&mut self, name: &str, mut arguments: Vec<Value>) -> Result<Value, MemberError> {
        match name {
            "Play" => Ok(json!(self.play())),
            "Skip" => {
                let seconds: i64 = argument(&mut arguments, "seconds")?;
                Ok(json!(self.skip(seconds)?))
            }
            "Fail" => self.fail().map(|_| Value::Null),
            "Played" => {
                let count: u64 = argument(&mut arguments, "count")?;
                self.played_notifications += 1;
                self.hook.event_raised("Played", &[json!(count)]);
                Ok(Value::Null)
            }
            other => Err(MemberError::missing_member(other)),
        }
    }

    fn attach_hook(&mut self, hook: MemberHook) -> bool {
        self.hook = hook;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_forwards_by_name() {
        let mut track = ExampleTrack::new("Intro");

        track.set_property("Name", json!("Foo")).unwrap();
        assert_eq!(track.name(), "Foo");
        assert_eq!(track.get_property("Name").unwrap(), json!("Foo"));

        assert_eq!(track.invoke("Play", vec![]).unwrap(), json!(1));
        assert_eq!(track.play_count(), 1);
        assert_eq!(track.played_notifications(), 1);

        assert_eq!(track.invoke("Skip", vec![json!(30)]).unwrap(), json!(30));
        assert_eq!(track.position_secs(), 30);
    }

    #[test]
    fn test_track_member_failures() {
        let mut track = ExampleTrack::new("Intro");

        let err = track.invoke("Fail", vec![]).unwrap_err();
        assert_eq!(err.type_name, "InvalidOperationException");
        assert_eq!(err.message, "boom");

        assert_eq!(track.set_property("Rating", json!(9)).unwrap_err().type_name, "ArgumentException");
        assert_eq!(track.set_property("Name", json!(42)).unwrap_err().type_name, "SerializationException");
        assert_eq!(track.invoke("Skip", vec![json!(-5)]).unwrap_err().type_name, "ArgumentException");
        assert_eq!(track.get_property("Tempo").unwrap_err().type_name, "MissingMemberException");
    }

    #[test]
    fn test_detached_hook_keeps_local_behaviour() {
        let mut track = ExampleTrack::new("Intro");
        track.set_local_note("remember");
        track.set_rating(4).unwrap();
        assert_eq!(track.local_note(), "remember");
        assert_eq!(track.rating(), 4);
    }
}
