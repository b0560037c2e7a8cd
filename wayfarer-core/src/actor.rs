use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::identity::{Role, User};

/// The authenticated caller of a service operation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Actor {
    pub user_id: Uuid,
    pub roles: BTreeSet<Role>,
}

impl Actor {
    pub fn new(user_id: Uuid, roles: impl IntoIterator<Item = Role>) -> Self {
        let mut roles: BTreeSet<Role> = roles.into_iter().collect();
        roles.insert(Role::User);
        Self { user_id, roles }
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn is_admin(&self) -> bool {
        self.roles.iter().any(Role::is_admin)
    }

    /// Admins can act wherever an agent can.
    pub fn is_agent(&self) -> bool {
        self.has_role(Role::Agent) || self.is_admin()
    }
}

impl From<&User> for Actor {
    fn from(user: &User) -> Self {
        Self::new(user.id, user.roles().iter().copied())
    }
}
