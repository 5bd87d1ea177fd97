//! Global permissions granted by a user's role tier.

use signup_core::types::RoleTier;

/// Tier-level permissions, independent of any particular event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)] // A permission table is a set of flags
pub struct TierPermissions {
    /// May create events
    pub can_create_event: bool,
    /// May edit any event
    pub can_edit_any_event: bool,
    /// May delete any event, including ones with live registrations
    pub can_delete_any_event: bool,
    /// May delete events they created, including ones with live registrations
    pub can_delete_own_event: bool,
    /// May move or remove registrations on any event
    pub can_manage_any_participants: bool,
}

impl TierPermissions {
    /// Permission table lookup.
    #[must_use]
    pub const fn for_tier(tier: RoleTier) -> Self {
        match tier {
            RoleTier::Participant => Self {
                can_create_event: false,
                can_edit_any_event: false,
                can_delete_any_event: false,
                can_delete_own_event: false,
                can_manage_any_participants: false,
            },
            RoleTier::Leader => Self {
                can_create_event: true,
                can_edit_any_event: false,
                can_delete_any_event: false,
                can_delete_own_event: true,
                can_manage_any_participants: false,
            },
            RoleTier::Administrator | RoleTier::SuperAdmin => Self {
                can_create_event: true,
                can_edit_any_event: true,
                can_delete_any_event: true,
                can_delete_own_event: true,
                can_manage_any_participants: true,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_elevated_tiers_delete_any_event() {
        assert!(!TierPermissions::for_tier(RoleTier::Participant).can_delete_any_event);
        assert!(!TierPermissions::for_tier(RoleTier::Leader).can_delete_any_event);
        assert!(TierPermissions::for_tier(RoleTier::Administrator).can_delete_any_event);
        assert!(TierPermissions::for_tier(RoleTier::SuperAdmin).can_delete_any_event);
    }

    #[test]
    fn participants_cannot_create_events() {
        assert!(!TierPermissions::for_tier(RoleTier::Participant).can_create_event);
        assert!(TierPermissions::for_tier(RoleTier::Leader).can_create_event);
    }
}
