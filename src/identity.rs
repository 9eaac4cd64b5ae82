use serde::{Deserialize, Serialize};

/// Who is acting, as reported by the auth layer. The engine never derives
/// identity or role itself.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub owner_id: String,
    pub display_name: String,
    #[serde(default)]
    pub is_privileged: bool,
}

impl Identity {
    pub fn user(owner_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            display_name: display_name.into(),
            is_privileged: false,
        }
    }

    pub fn privileged(owner_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            is_privileged: true,
            ..Self::user(owner_id, display_name)
        }
    }

    pub fn owns(&self, owner_id: &str) -> bool {
        self.owner_id == owner_id
    }
}
