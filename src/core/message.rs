use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Role {
    User,
    Model,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Model => "model",
        }
    }

    /// Role name used by OpenAI-compatible chat completion endpoints.
    pub fn to_api_role(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Model => "assistant",
        }
    }

    pub fn is_user(self) -> bool {
        self == Role::User
    }
}

impl AsRef<str> for Role {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl TryFrom<&str> for Role {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "user" => Ok(Role::User),
            "model" | "assistant" => Ok(Role::Model),
            _ => Err(format!("invalid message role: {value}")),
        }
    }
}

impl TryFrom<String> for Role {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::try_from(value.as_str())
    }
}

impl From<Role> for String {
    fn from(value: Role) -> Self {
        value.as_str().to_string()
    }
}

/// A per-emoji tally attached to a message. `user_reacted` records whether the
/// local viewer is one of the `count` reactors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reaction {
    pub emoji: String,
    pub count: u32,
    pub user_reacted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub text: String,
    #[serde(default)]
    pub reactions: Vec<Reaction>,
}

impl Message {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
            reactions: Vec::new(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self::new(Role::Model, text)
    }

    pub fn is_user(&self) -> bool {
        self.role.is_user()
    }

    /// Toggles the viewer's reaction for `emoji`.
    ///
    /// An existing entry moves its count by one in the direction that flips
    /// `user_reacted`, and is dropped once the count reaches zero. A missing
    /// entry is created with a single viewer reaction.
    pub fn toggle_reaction(&mut self, emoji: &str) {
        let Some(position) = self.reactions.iter().position(|r| r.emoji == emoji) else {
            self.reactions.push(Reaction {
                emoji: emoji.to_string(),
                count: 1,
                user_reacted: true,
            });
            return;
        };

        let reaction = &mut self.reactions[position];
        if reaction.user_reacted {
            reaction.count = reaction.count.saturating_sub(1);
        } else {
            reaction.count = reaction.count.saturating_add(1);
        }
        reaction.user_reacted = !reaction.user_reacted;

        if reaction.count == 0 {
            self.reactions.remove(position);
        }
    }

    pub fn reaction(&self, emoji: &str) -> Option<&Reaction> {
        self.reactions.iter().find(|r| r.emoji == emoji)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.role.as_str(), self.text)?;
        if !self.reactions.is_empty() {
            let tally = self
                .reactions
                .iter()
                .map(|r| format!("{} {}", r.emoji, r.count))
                .collect::<Vec<_>>()
                .join("  ");
            write!(f, " [{tally}]")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggling_twice_removes_reaction() {
        let mut message = Message::model("hello");
        message.toggle_reaction("👍");
        assert_eq!(
            message.reactions,
            vec![Reaction {
                emoji: "👍".into(),
                count: 1,
                user_reacted: true,
            }]
        );

        message.toggle_reaction("👍");
        assert!(message.reactions.is_empty());
    }

    #[test]
    fn distinct_emoji_are_tracked_independently() {
        let mut message = Message::model("hello");
        message.toggle_reaction("👍");
        message.toggle_reaction("🔥");

        assert_eq!(message.reactions.len(), 2);
        assert_eq!(message.reactions[0].emoji, "👍");
        assert_eq!(message.reactions[1].emoji, "🔥");
        assert!(message
            .reactions
            .iter()
            .all(|r| r.count == 1 && r.user_reacted));
    }

    #[test]
    fn toggling_joins_reactions_from_others() {
        let mut message = Message::model("hello");
        message.reactions.push(Reaction {
            emoji: "😂".into(),
            count: 2,
            user_reacted: false,
        });

        message.toggle_reaction("😂");
        let reaction = message.reaction("😂").expect("reaction kept");
        assert_eq!(reaction.count, 3);
        assert!(reaction.user_reacted);

        message.toggle_reaction("😂");
        let reaction = message.reaction("😂").expect("reaction kept");
        assert_eq!(reaction.count, 2);
        assert!(!reaction.user_reacted);
    }

    #[test]
    fn roles_accept_api_aliases() {
        assert_eq!(Role::try_from("assistant"), Ok(Role::Model));
        assert_eq!(Role::Model.to_api_role(), "assistant");
        assert!(Role::try_from("system").is_err());
    }

    #[test]
    fn messages_serialize_with_string_roles() {
        let json = serde_json::to_string(&Message::user("hi")).expect("serialize");
        assert_eq!(json, r#"{"role":"user","text":"hi","reactions":[]}"#);

        let parsed: Message =
            serde_json::from_str(r#"{"role":"model","text":"yo"}"#).expect("deserialize");
        assert_eq!(parsed, Message::model("yo"));
    }
}
