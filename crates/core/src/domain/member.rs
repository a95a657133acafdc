use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoleId(pub i64);

/// A paid-subscription tier unlocked by holding a platform role.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionTier {
    pub role_id: RoleId,
    pub level: u32,
}

/// Highest subscription level granted by any of `roles`, if any role maps to a tier.
pub fn subscription_level(tiers: &[SubscriptionTier], roles: &[RoleId]) -> Option<u32> {
    tiers
        .iter()
        .filter(|tier| tier.level > 0 && roles.contains(&tier.role_id))
        .map(|tier| tier.level)
        .max()
}

#[cfg(test)]
mod tests {
    use super::{subscription_level, RoleId, SubscriptionTier};

    fn tiers() -> Vec<SubscriptionTier> {
        vec![
            SubscriptionTier { role_id: RoleId(1), level: 1 },
            SubscriptionTier { role_id: RoleId(2), level: 2 },
            SubscriptionTier { role_id: RoleId(3), level: 3 },
        ]
    }

    #[test]
    fn picks_highest_tier_among_added_roles() {
        assert_eq!(subscription_level(&tiers(), &[RoleId(1), RoleId(3), RoleId(99)]), Some(3));
    }

    #[test]
    fn unrelated_roles_grant_nothing() {
        assert_eq!(subscription_level(&tiers(), &[RoleId(42)]), None);
        assert_eq!(subscription_level(&tiers(), &[]), None);
    }
}
