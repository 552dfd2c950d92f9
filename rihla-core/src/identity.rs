use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{CoreError, CoreResult};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Staff,
    Customer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Staff => "staff",
            Role::Customer => "customer",
        }
    }

    pub fn is_staff(&self) -> bool {
        matches!(self, Role::Admin | Role::Staff)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "staff" => Ok(Role::Staff),
            "customer" => Ok(Role::Customer),
            other => Err(CoreError::Forbidden(format!("unknown role '{}'", other))),
        }
    }
}

/// The caller on whose behalf an operation runs, as supplied by the identity layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Actor {
    pub user_id: String,
    pub role: Role,
}

impl Actor {
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        Self {
            user_id: user_id.into(),
            role,
        }
    }

    pub fn customer(user_id: impl Into<String>) -> Self {
        Self::new(user_id, Role::Customer)
    }

    pub fn staff(user_id: impl Into<String>) -> Self {
        Self::new(user_id, Role::Staff)
    }

    pub fn admin(user_id: impl Into<String>) -> Self {
        Self::new(user_id, Role::Admin)
    }

    pub fn is_staff(&self) -> bool {
        self.role.is_staff()
    }

    /// Owners may act on their own records; staff and admins on anyone's.
    pub fn can_act_for(&self, owner_id: &str) -> bool {
        self.is_staff() || self.user_id == owner_id
    }

    pub fn require_owner_or_staff(&self, owner_id: &str, action: &str) -> CoreResult<()> {
        if self.can_act_for(owner_id) {
            Ok(())
        } else {
            Err(CoreError::Forbidden(format!("You do not have permission to {}", action)))
        }
    }

    pub fn require_staff(&self, action: &str) -> CoreResult<()> {
        if self.is_staff() {
            Ok(())
        } else {
            Err(CoreError::Forbidden(format!("only staff or admins may {}", action)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ownership_rules() {
        let owner = Actor::customer("user-1");
        let stranger = Actor::customer("user-2");
        let staff = Actor::staff("agent-7");

        assert!(owner.require_owner_or_staff("user-1", "cancel this booking").is_ok());
        assert!(staff.require_owner_or_staff("user-1", "cancel this booking").is_ok());
        assert_eq!(
            stranger.require_owner_or_staff("user-1", "cancel this booking").unwrap_err(),
            CoreError::Forbidden("You do not have permission to cancel this booking".to_string())
        );
    }

    #[test]
    fn test_staff_gate() {
        assert!(Actor::admin("root").require_staff("approve refunds").is_ok());
        assert!(Actor::customer("user-1").require_staff("approve refunds").is_err());
        assert_eq!("STAFF".parse::<Role>().unwrap(), Role::Staff);
        assert!("pilot".parse::<Role>().is_err());
    }
}
