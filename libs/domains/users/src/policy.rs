//! Authorization decisions for user operations.

use crate::actor::Actor;
use crate::models::{User, UserStatus};

/// Gated operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Action {
    /// List all users
    Users,
    Read,
    Update,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

impl Decision {
    pub fn is_allowed(self) -> bool {
        self == Decision::Allow
    }
}

/// Allow/deny for an (actor, action, target) triple
pub trait PolicyGate: Send + Sync {
    fn check(&self, actor: &Actor, action: Action, target: Option<&User>) -> Decision;
}

/// Role-based policy.
///
/// Administrators may do anything. Everyone else may read and update their own
/// record, unless that record is banned. Listing and deleting are
/// administrator-only.
#[derive(Debug, Clone, Copy, Default)]
pub struct RolePolicy;

impl PolicyGate for RolePolicy {
    fn check(&self, actor: &Actor, action: Action, target: Option<&User>) -> Decision {
        if actor.is_admin() {
            return Decision::Allow;
        }

        let own_active_record = target
            .is_some_and(|user| user.uid == actor.uid && user.status != UserStatus::Banned);

        match action {
            Action::Read | Action::Update if own_active_record => Decision::Allow,
            _ => Decision::Deny,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    const SELF_UID: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
    const OTHER_UID: &str = "bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";

    fn user(uid: &str, status: UserStatus) -> User {
        User {
            id: 1,
            uid: uid.into(),
            name: "n".into(),
            email: "n@example.com".into(),
            password_hash: String::new(),
            thumbnail: None,
            status,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn member() -> Actor {
        Actor::new(SELF_UID, vec!["member".into()])
    }

    fn admin() -> Actor {
        Actor::new(OTHER_UID, vec!["admin".into()])
    }

    #[test]
    fn test_admin_is_allowed_everything() {
        let target = user(SELF_UID, UserStatus::Banned);
        for action in [Action::Users, Action::Read, Action::Update, Action::Delete] {
            let target = (action != Action::Users).then_some(&target);
            assert!(RolePolicy.check(&admin(), action, target).is_allowed(), "{action}");
        }
    }

    #[test]
    fn test_member_may_read_and_update_self() {
        let me = user(SELF_UID, UserStatus::Activated);
        assert!(RolePolicy.check(&member(), Action::Read, Some(&me)).is_allowed());
        assert!(RolePolicy.check(&member(), Action::Update, Some(&me)).is_allowed());
        assert!(!RolePolicy.check(&member(), Action::Delete, Some(&me)).is_allowed());
    }

    #[test]
    fn test_member_is_denied_others_and_listing() {
        let other = user(OTHER_UID, UserStatus::Activated);
        assert_eq!(
            RolePolicy.check(&member(), Action::Read, Some(&other)),
            Decision::Deny
        );
        assert_eq!(
            RolePolicy.check(&member(), Action::Update, Some(&other)),
            Decision::Deny
        );
        assert_eq!(RolePolicy.check(&member(), Action::Users, None), Decision::Deny);
    }

    #[test]
    fn test_banned_member_is_denied_self_access() {
        let me = user(SELF_UID, UserStatus::Banned);
        assert_eq!(
            RolePolicy.check(&member(), Action::Read, Some(&me)),
            Decision::Deny
        );
        assert_eq!(
            RolePolicy.check(&member(), Action::Update, Some(&me)),
            Decision::Deny
        );
    }
}
