//! Channel-related models and the option bags passed to the chat service.

use serde::{Deserialize, Serialize};

/// Channel type as reported by the chat service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelType {
    Direct,
    Group,
    Public,
    #[default]
    Unknown,
}

/// Channel entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(rename = "type", default)]
    pub channel_type: ChannelType,
}

impl Channel {
    /// Name for headers and lists, falling back to the id.
    pub fn display_name(&self) -> &str {
        match self.name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => &self.id,
        }
    }
}

/// Mutable channel fields: `{ name, description, status }`.
///
/// Absent fields are omitted on the wire and left untouched by updates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl ChannelFields {
    /// Build from form input, treating empty strings as absent.
    pub fn from_form(name: &str, description: &str, status: &str) -> Self {
        fn non_empty(s: &str) -> Option<String> {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Self {
            name: non_empty(name),
            description: non_empty(description),
            status: non_empty(status),
        }
    }

    /// Build from the update form. Every field is sent, so a field the
    /// user emptied goes out as `""` and clears the stored value.
    pub fn from_update_form(name: &str, description: &str, status: &str) -> Self {
        Self {
            name: Some(name.trim().to_string()),
            description: Some(description.trim().to_string()),
            status: Some(status.trim().to_string()),
        }
    }
}

/// Opaque cursor pair returned by the listing operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageCursor {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prev: Option<String>,
}

/// Options for `get_channels`: `{ limit, page }`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<PageCursor>,
}

/// One page of channels.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChannelPage {
    pub channels: Vec<Channel>,
    pub page: PageCursor,
    pub total: usize,
}

/// Options for `delete_channel`: `{ soft }`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteOptions {
    pub soft: bool,
}

/// A user's association with a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Membership {
    pub channel_id: String,
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_read_message_timetoken: Option<super::Timetoken>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_fields_omit_absent() {
        let fields = ChannelFields {
            name: Some("General".into()),
            description: None,
            status: Some("active".into()),
        };
        let json = serde_json::to_value(&fields).unwrap();
        assert_eq!(json, serde_json::json!({ "name": "General", "status": "active" }));
    }

    #[test]
    fn test_update_form_sends_cleared_fields() {
        let fields = ChannelFields::from_update_form("Ops", " ", "active");
        let json = serde_json::to_value(&fields).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "name": "Ops", "description": "", "status": "active" })
        );
    }

    #[test]
    fn test_fields_from_form_trims_and_drops_empty() {
        let fields = ChannelFields::from_form(" Ops ", "", "  ");
        assert_eq!(fields.name.as_deref(), Some("Ops"));
        assert!(fields.description.is_none());
        assert!(fields.status.is_none());
    }

    #[test]
    fn test_list_options_wire_names() {
        let opts = ListOptions {
            limit: Some(2),
            page: Some(PageCursor {
                next: Some("abc".into()),
                prev: None,
            }),
        };
        let json = serde_json::to_value(&opts).unwrap();
        assert_eq!(json, serde_json::json!({ "limit": 2, "page": { "next": "abc" } }));
    }

    #[test]
    fn test_channel_type_field_name() {
        let channel = Channel {
            id: "direct.1".into(),
            name: None,
            description: None,
            status: None,
            channel_type: ChannelType::Direct,
        };
        let json = serde_json::to_value(&channel).unwrap();
        assert_eq!(json, serde_json::json!({ "id": "direct.1", "type": "direct" }));
        assert_eq!(channel.display_name(), "direct.1");
    }
}
