//! User-related models

use serde::{Deserialize, Serialize};

/// Free-form profile decorations used by the chat screen.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCustom {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initials: Option<String>,
    /// Avatar colour, e.g. `#9fa7df`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

/// User profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub custom: UserCustom,
}

impl User {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }

    pub fn initials(&self) -> String {
        if let Some(initials) = self.custom.initials.as_deref() {
            return initials.to_string();
        }
        self.display_name()
            .split_whitespace()
            .filter_map(|w| w.chars().next())
            .take(2)
            .collect::<String>()
            .to_uppercase()
    }
}

/// Create/update bag for users: `{ name, custom }`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom: Option<UserCustom>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initials_fallback() {
        let user = User {
            id: "u1".into(),
            name: Some("Mary Watson".into()),
            custom: UserCustom::default(),
        };
        assert_eq!(user.initials(), "MW");

        let anon = User {
            id: "anon".into(),
            name: None,
            custom: UserCustom {
                initials: Some("AN".into()),
                avatar: None,
            },
        };
        assert_eq!(anon.display_name(), "anon");
        assert_eq!(anon.initials(), "AN");
    }
}
