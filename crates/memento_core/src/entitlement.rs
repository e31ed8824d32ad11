//! What paid capabilities the user holds, and the limits that follow from it.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "camelCase")]
pub enum PremiumFeature {
    UnlimitedPhotos,
    PremiumTransitions,
    CustomMusic,
    #[serde(rename = "export4K")]
    Export4K,
    NoWatermark,
    AdvancedEffects,
    PrioritySupport,
    CloudSync,
}

impl PremiumFeature {
    pub const ALL: [PremiumFeature; 8] = [
        PremiumFeature::UnlimitedPhotos,
        PremiumFeature::PremiumTransitions,
        PremiumFeature::CustomMusic,
        PremiumFeature::Export4K,
        PremiumFeature::NoWatermark,
        PremiumFeature::AdvancedEffects,
        PremiumFeature::PrioritySupport,
        PremiumFeature::CloudSync,
    ];
}

/// Capability check consulted by the editor and export controller.
pub trait Entitlement: Send + Sync {
    fn is_premium(&self) -> bool;
    fn has_feature(&self, feature: PremiumFeature) -> bool;
}

/// Fixed entitlement: either nothing or everything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StaticEntitlement {
    pub premium: bool,
}

impl StaticEntitlement {
    pub const FREE: Self = Self { premium: false };
    pub const PREMIUM: Self = Self { premium: true };
}

impl Entitlement for StaticEntitlement {
    fn is_premium(&self) -> bool {
        self.premium
    }

    fn has_feature(&self, _feature: PremiumFeature) -> bool {
        self.premium
    }
}

// ---------------------------------------------------------------------------
// Tier limits
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierLimits {
    pub max_photos: usize,
    pub max_effects: usize,
}

impl TierLimits {
    pub const FREE: Self = Self {
        max_photos: 5,
        max_effects: 3,
    };
    pub const PREMIUM: Self = Self {
        max_photos: 50,
        max_effects: 8,
    };

    pub fn for_entitlement(entitlement: &dyn Entitlement) -> Self {
        if entitlement.is_premium() {
            Self::PREMIUM
        } else {
            Self::FREE
        }
    }
}

// ---------------------------------------------------------------------------
// PurchaseState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SubscriptionType {
    Monthly,
    Annual,
}

impl SubscriptionType {
    pub fn trial_days(&self) -> i64 {
        match self {
            SubscriptionType::Monthly => 3,
            SubscriptionType::Annual => 7,
        }
    }
}

/// Locally cached subscription state. The store backend is out of scope;
/// hosts feed it purchase results and call [`PurchaseState::refresh`] to
/// expire lapsed subscriptions and trials.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseState {
    pub is_premium: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription_type: Option<SubscriptionType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub features: BTreeSet<PremiumFeature>,
    #[serde(default)]
    pub is_trial_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trial_end_date: Option<DateTime<Utc>>,
}

impl PurchaseState {
    pub fn activate_trial(&mut self, kind: SubscriptionType, now: DateTime<Utc>) {
        *self = Self {
            is_premium: true,
            subscription_type: Some(kind),
            expiration_date: None,
            features: PremiumFeature::ALL.into_iter().collect(),
            is_trial_active: true,
            trial_end_date: Some(now + Duration::days(kind.trial_days())),
        };
        tracing::info!(?kind, "trial activated");
    }

    pub fn activate_subscription(&mut self, kind: SubscriptionType, expires: DateTime<Utc>) {
        *self = Self {
            is_premium: true,
            subscription_type: Some(kind),
            expiration_date: Some(expires),
            features: PremiumFeature::ALL.into_iter().collect(),
            is_trial_active: false,
            trial_end_date: None,
        };
        tracing::info!(?kind, %expires, "subscription activated");
    }

    pub fn cancel(&mut self) {
        *self = Self::default();
    }

    /// Drop premium status for an expired subscription or trial. Returns
    /// `true` if anything changed.
    pub fn refresh(&mut self, now: DateTime<Utc>) -> bool {
        let mut changed = false;
        if self.expiration_date.is_some_and(|exp| now > exp) && self.is_premium {
            self.is_premium = false;
            self.subscription_type = None;
            self.features.clear();
            changed = true;
            tracing::info!("subscription expired");
        }
        if self.is_trial_active && self.trial_end_date.is_some_and(|end| now > end) {
            self.is_trial_active = false;
            self.is_premium = false;
            self.features.clear();
            changed = true;
            tracing::info!("trial expired");
        }
        changed
    }
}

impl Entitlement for PurchaseState {
    fn is_premium(&self) -> bool {
        self.is_premium
    }

    fn has_feature(&self, feature: PremiumFeature) -> bool {
        self.features.contains(&feature)
    }
}
