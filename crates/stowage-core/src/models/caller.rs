//! The authenticated principal on whose behalf an operation runs.

use crate::audit::RequestMeta;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    pub user_id: String,
    pub username: Option<String>,
    pub is_admin: bool,
}

impl Caller {
    pub fn user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            username: None,
            is_admin: false,
        }
    }

    pub fn admin(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            username: None,
            is_admin: true,
        }
    }

    /// Owners see their own records; administrators see everything.
    pub fn can_access(&self, owner_id: &str) -> bool {
        self.is_admin || self.user_id == owner_id
    }
}

/// Caller plus the request it arrived on. Threaded through every service operation so
/// audit events can carry client metadata.
#[derive(Debug, Clone)]
pub struct CallContext {
    pub caller: Caller,
    pub meta: RequestMeta,
}

impl CallContext {
    pub fn new(caller: Caller) -> Self {
        Self {
            caller,
            meta: RequestMeta::default(),
        }
    }

    pub fn with_meta(mut self, meta: RequestMeta) -> Self {
        self.meta = meta;
        self
    }

    /// Tenant the operation acts for.
    pub fn owner_id(&self) -> &str {
        &self.caller.user_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_can_access() {
        assert!(Caller::user("alice").can_access("alice"));
        assert!(!Caller::user("bob").can_access("alice"));
        assert!(Caller::admin("root").can_access("alice"));
    }
}
