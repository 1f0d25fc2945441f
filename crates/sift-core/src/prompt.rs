use serde::{Deserialize, Serialize};

/// The complete input sent to a provider for one invocation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prompt {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    pub user: String,
}

impl Prompt {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            system: None,
            user: text.into(),
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Total characters across system and user text.
    pub fn char_len(&self) -> usize {
        self.system.as_deref().map_or(0, |s| s.chars().count()) + self.user.chars().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_system() {
        let prompt = Prompt::user("question").with_system("be brief");
        assert_eq!(prompt.system.as_deref(), Some("be brief"));
        assert_eq!(prompt.user, "question");
        assert_eq!(prompt.char_len(), "questionbe brief".len());
    }

    #[test]
    fn system_omitted_from_json_when_absent() {
        let json = serde_json::to_string(&Prompt::user("hi")).unwrap();
        assert_eq!(json, r#"{"user":"hi"}"#);
    }
}
