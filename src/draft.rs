//! Message drafts with mention autocomplete.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::{MentionedUser, OutgoingMessage, TextLink, User};
use crate::sdk::{ChatService, ServiceResult};

/// Characters typed after `@` before suggestions are offered.
const MIN_FRAGMENT_CHARS: usize = 3;

/// Upper bound on suggestions returned per change.
const MAX_SUGGESTIONS: usize = 10;

/// Where mention candidates come from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionSource {
    /// Members of the draft's channel.
    #[default]
    Channel,
    /// Every user known to the service.
    Global,
}

/// Users matching the `@fragment` at the end of the draft.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuggestedMentions {
    /// Char index of the `@`.
    pub position: usize,
    pub fragment: String,
    pub users: Vec<User>,
}

/// A staged message for one channel.
#[derive(Debug, Clone)]
pub struct MessageDraft {
    channel_id: String,
    candidates: Vec<User>,
    value: String,
    mentions: Vec<MentionedUser>,
    text_links: Vec<TextLink>,
}

impl MessageDraft {
    pub fn new(channel_id: &str, candidates: Vec<User>) -> Self {
        Self {
            channel_id: channel_id.to_string(),
            candidates,
            value: String::new(),
            mentions: Vec::new(),
            text_links: Vec::new(),
        }
    }

    /// Load mention candidates from `source` and start an empty draft.
    pub async fn create(
        service: &dyn ChatService,
        channel_id: &str,
        source: SuggestionSource,
    ) -> ServiceResult<Self> {
        let users = match source {
            SuggestionSource::Channel => service.get_channel_members(channel_id).await?,
            SuggestionSource::Global => service.get_users().await?,
        };
        let me = service.current_user_id();
        let candidates = users.into_iter().filter(|u| u.id != me).collect();
        Ok(Self::new(channel_id, candidates))
    }

    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn mentions(&self) -> &[MentionedUser] {
        &self.mentions
    }

    /// Replace the draft text and return suggestions for a trailing `@fragment`.
    pub fn on_change(&mut self, text: &str) -> Option<SuggestedMentions> {
        self.value = text.to_string();
        let len = self.value.chars().count();
        self.mentions
            .retain(|m| text.contains(&format!("@{}", m.name)));
        self.text_links.retain(|l| l.end_index <= len);
        self.suggest()
    }

    fn suggest(&self) -> Option<SuggestedMentions> {
        let chars: Vec<char> = self.value.chars().collect();
        let position = chars.iter().rposition(|&c| c == '@')?;
        if position > 0 && !chars[position - 1].is_whitespace() {
            return None;
        }
        let fragment: String = chars[position + 1..].iter().collect();
        if fragment.chars().count() < MIN_FRAGMENT_CHARS
            || fragment.chars().any(char::is_whitespace)
        {
            return None;
        }

        let needle = fragment.to_lowercase();
        let users: Vec<User> = self
            .candidates
            .iter()
            .filter(|u| {
                u.display_name().to_lowercase().starts_with(&needle)
                    || u.id.to_lowercase().starts_with(&needle)
            })
            .take(MAX_SUGGESTIONS)
            .cloned()
            .collect();
        if users.is_empty() {
            return None;
        }
        Some(SuggestedMentions {
            position,
            fragment,
            users,
        })
    }

    /// Replace the suggested `@fragment` with `@Name `.
    ///
    /// Returns false when the draft changed since the suggestion was made.
    pub fn add_mentioned_user(&mut self, user: &User, suggestion: &SuggestedMentions) -> bool {
        let chars: Vec<char> = self.value.chars().collect();
        let expected: Vec<char> = std::iter::once('@')
            .chain(suggestion.fragment.chars())
            .collect();
        let end = suggestion.position + expected.len();
        if end > chars.len() || chars[suggestion.position..end] != expected[..] {
            return false;
        }

        let name = user.display_name().to_string();
        let mut value: String = chars[..suggestion.position].iter().collect();
        value.push('@');
        value.push_str(&name);
        if end == chars.len() {
            value.push(' ');
        } else {
            value.extend(&chars[end..]);
        }
        let shift = value.chars().count() as isize - chars.len() as isize;
        for link in &mut self.text_links {
            if link.start_index >= end {
                link.start_index = (link.start_index as isize + shift) as usize;
                link.end_index = (link.end_index as isize + shift) as usize;
            }
        }
        self.value = value;
        self.mentions.push(MentionedUser { id: user.id.clone(), name });
        true
    }

    /// Append `label` as a link to `link`.
    pub fn add_linked_text(&mut self, label: &str, link: &str) {
        if !self.value.is_empty() && !self.value.ends_with(char::is_whitespace) {
            self.value.push(' ');
        }
        let start_index = self.value.chars().count();
        self.value.push_str(label);
        self.text_links.push(TextLink {
            start_index,
            end_index: start_index + label.chars().count(),
            link: link.to_string(),
        });
    }

    /// The message to send: text, mention map by occurrence, labelled links.
    pub fn outgoing(&self) -> OutgoingMessage {
        let chars: Vec<char> = self.value.chars().collect();
        let mut by_length: Vec<&MentionedUser> = self.mentions.iter().collect();
        by_length.sort_by_key(|m| std::cmp::Reverse(m.name.chars().count()));

        let mut mentioned_users = BTreeMap::new();
        let mut i = 0;
        while i < chars.len() {
            if chars[i] == '@' {
                let found = by_length.iter().find(|m| {
                    let name: Vec<char> = m.name.chars().collect();
                    chars[i + 1..].starts_with(&name)
                });
                if let Some(m) = found {
                    mentioned_users.insert(mentioned_users.len(), (*m).clone());
                    i += 1 + m.name.chars().count();
                    continue;
                }
            }
            i += 1;
        }

        OutgoingMessage {
            text: self.value.trim_end().to_string(),
            mentioned_users,
            text_links: self.text_links.clone(),
        }
    }

    /// Start over with the same channel and candidates.
    pub fn reset(&mut self) {
        self.value.clear();
        self.mentions.clear();
        self.text_links.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linked_text::{split, MessagePart};
    use crate::models::UserCustom;

    fn user(id: &str, name: &str) -> User {
        User {
            id: id.to_string(),
            name: Some(name.to_string()),
            custom: UserCustom::default(),
        }
    }

    fn draft() -> MessageDraft {
        MessageDraft::new(
            "direct.a.b",
            vec![user("supported-user", "Mary Watson"), user("mark", "Mark Lee")],
        )
    }

    #[test]
    fn test_short_fragment_gives_no_suggestion() {
        let mut d = draft();
        assert!(d.on_change("hello @Ma").is_none());
        assert!(d.on_change("email@Mary").is_none());
    }

    #[test]
    fn test_suggestion_matches_name_prefix() {
        let mut d = draft();
        let s = d.on_change("hi @mar").unwrap();
        assert_eq!(s.position, 3);
        assert_eq!(s.fragment, "mar");
        assert_eq!(s.users.len(), 2);

        let s = d.on_change("hi @mary").unwrap();
        assert_eq!(s.users, vec![user("supported-user", "Mary Watson")]);
    }

    #[test]
    fn test_add_mention_and_send_payload() {
        let mut d = draft();
        let s = d.on_change("thanks @Mary").unwrap();
        assert!(d.add_mentioned_user(&s.users[0], &s));
        assert_eq!(d.value(), "thanks @Mary Watson ");

        // A completed mention is not suggested again.
        assert!(d.on_change("thanks @Mary Watson ").is_none());

        let out = d.outgoing();
        assert_eq!(out.text, "thanks @Mary Watson");
        assert_eq!(out.mentioned_users.len(), 1);
        assert_eq!(out.mentioned_users[&0].id, "supported-user");

        let parts = split(&out.text, &out.mentioned_users, &out.text_links);
        assert_eq!(
            parts[1],
            MessagePart::Mention {
                id: "supported-user".into(),
                name: "Mary Watson".into()
            }
        );
    }

    #[test]
    fn test_stale_suggestion_rejected() {
        let mut d = draft();
        let s = d.on_change("@Mary").unwrap();
        d.on_change("something else");
        assert!(!d.add_mentioned_user(&s.users[0], &s));
        assert_eq!(d.value(), "something else");
        assert!(d.mentions().is_empty());
    }

    #[test]
    fn test_deleting_mention_text_drops_it() {
        let mut d = draft();
        let s = d.on_change("@Mary").unwrap();
        d.add_mentioned_user(&s.users[0], &s);
        d.on_change("plain text");
        assert!(d.mentions().is_empty());
        assert!(d.outgoing().mentioned_users.is_empty());
    }

    #[test]
    fn test_linked_text_and_reset() {
        let mut d = draft();
        d.on_change("read");
        d.add_linked_text("the docs", "https://example.com");
        assert_eq!(d.value(), "read the docs");
        let out = d.outgoing();
        assert_eq!(out.text_links.len(), 1);
        assert_eq!(out.text_links[0].start_index, 5);
        assert_eq!(out.text_links[0].end_index, 13);

        d.reset();
        assert!(d.value().is_empty());
        assert!(d.outgoing().text_links.is_empty());
    }

    #[tokio::test]
    async fn test_create_excludes_current_user() {
        use crate::models::{ChannelFields, UserData};
        use crate::sdk::memory::MemoryServer;
        use std::time::Duration;

        let server = MemoryServer::new(Duration::from_secs(5));
        let me = server.client("me");
        me.create_user("me", UserData::default()).await.unwrap();
        me.create_user("other", UserData { name: Some("Other Person".into()), custom: None })
            .await
            .unwrap();
        let other = me.get_user("other").await.unwrap().unwrap();
        let dm = me
            .create_direct_conversation(&other, ChannelFields::default())
            .await
            .unwrap();

        let mut d = MessageDraft::create(&me, &dm.channel.id, SuggestionSource::Channel)
            .await
            .unwrap();
        let s = d.on_change("@oth").unwrap();
        assert_eq!(s.users.len(), 1);
        assert_eq!(s.users[0].id, "other");
    }
}
