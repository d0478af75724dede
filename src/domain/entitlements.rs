use crate::domain::models::{PlanType, SubscriptionStatus, User, UserType};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlanTier {
    Free,
    Basic,
    Pro,
}

impl PlanTier {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Free => "FREE",
            Self::Basic => "BASIC",
            Self::Pro => "PRO",
        }
    }

    pub fn limits(self) -> PlanLimits {
        match self {
            Self::Free => PlanLimits {
                max_goals: Limit::Limited(3),
                max_schedules: Limit::Limited(5),
                max_tasks_per_day: Limit::Limited(3),
            },
            Self::Basic => PlanLimits {
                max_goals: Limit::Limited(10),
                max_schedules: Limit::Unlimited,
                max_tasks_per_day: Limit::Unlimited,
            },
            Self::Pro => PlanLimits {
                max_goals: Limit::Unlimited,
                max_schedules: Limit::Unlimited,
                max_tasks_per_day: Limit::Unlimited,
            },
        }
    }
}

impl fmt::Display for PlanTier {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case", tag = "kind", content = "max")]
pub enum Limit {
    Limited(u32),
    Unlimited,
}

impl Limit {
    pub fn allows(self, current_count: u32) -> bool {
        match self {
            Self::Limited(max) => current_count < max,
            Self::Unlimited => true,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct PlanLimits {
    pub max_goals: Limit,
    pub max_schedules: Limit,
    pub max_tasks_per_day: Limit,
}

impl PlanLimits {
    pub fn for_resource(&self, resource: ResourceKind) -> Limit {
        match resource {
            ResourceKind::Goals => self.max_goals,
            ResourceKind::Schedules => self.max_schedules,
            ResourceKind::TasksPerDay => self.max_tasks_per_day,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Goals,
    Schedules,
    TasksPerDay,
}

impl ResourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Goals => "goals",
            Self::Schedules => "schedules",
            Self::TasksPerDay => "tasksPerDay",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EntitlementProfile {
    pub user_type: UserType,
    pub unlimited_access: bool,
    pub plan: PlanType,
    pub subscription_status: Option<SubscriptionStatus>,
    pub subscription_end_date: Option<DateTime<Utc>>,
    pub billing_subscription_id: Option<String>,
    pub admin_assigned_plan: Option<PlanType>,
}

impl From<&User> for EntitlementProfile {
    fn from(user: &User) -> Self {
        Self {
            user_type: user.user_type,
            unlimited_access: user.unlimited_access,
            plan: user.plan,
            subscription_status: user.subscription_status,
            subscription_end_date: user.subscription_end_date,
            billing_subscription_id: user.billing_subscription_id.clone(),
            admin_assigned_plan: user.admin_assigned_plan,
        }
    }
}

impl EntitlementProfile {
    pub fn effective_plan(&self) -> PlanType {
        self.admin_assigned_plan.unwrap_or(self.plan)
    }

    pub fn has_valid_subscription(&self, now: DateTime<Utc>) -> bool {
        let is_active = self.subscription_status == Some(SubscriptionStatus::Active);
        let billing_active = self.billing_subscription_id.is_some() && is_active;
        let manual_active = self.billing_subscription_id.is_none()
            && is_active
            && self.subscription_end_date.is_none_or(|end| end > now);
        billing_active || manual_active || self.admin_assigned_plan.is_some()
    }

    pub fn is_explicitly_canceled(&self, now: DateTime<Utc>) -> bool {
        self.subscription_status == Some(SubscriptionStatus::Canceled)
            && self.subscription_end_date.is_some_and(|end| end < now)
    }
}

pub fn resolve_plan_tier(profile: &EntitlementProfile, now: DateTime<Utc>) -> PlanTier {
    if profile.user_type == UserType::Internal || profile.unlimited_access {
        return PlanTier::Pro;
    }

    let honored = profile.has_valid_subscription(now) || !profile.is_explicitly_canceled(now);
    match profile.effective_plan() {
        PlanType::Pro if honored => PlanTier::Pro,
        PlanType::Basic if honored => PlanTier::Basic,
        PlanType::Pro | PlanType::Basic | PlanType::Free => PlanTier::Free,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapacityExceeded {
    pub tier: PlanTier,
    pub resource: ResourceKind,
    pub limit: u32,
}

impl fmt::Display for CapacityExceeded {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            formatter,
            "you've reached your {} plan limit for {} ({})",
            self.tier, self.resource, self.limit
        )
    }
}

impl std::error::Error for CapacityExceeded {}

pub fn check_capacity(
    tier: PlanTier,
    resource: ResourceKind,
    current_count: u32,
) -> Result<(), CapacityExceeded> {
    match tier.limits().for_resource(resource) {
        limit if limit.allows(current_count) => Ok(()),
        Limit::Unlimited => Ok(()),
        Limit::Limited(max) => Err(CapacityExceeded {
            tier,
            resource,
            limit: max,
        }),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StandingIssue {
    InvoicePending,
    Subscription(SubscriptionStatus),
}

impl StandingIssue {
    pub fn code(self) -> &'static str {
        match self {
            Self::InvoicePending => "INVOICE_PENDING",
            Self::Subscription(_) => "SUBSCRIPTION_ISSUE",
        }
    }

    pub fn message(self) -> String {
        match self {
            Self::InvoicePending => {
                "your invoice is pending payment; update your payment method to continue".to_string()
            }
            Self::Subscription(status) => format!(
                "your subscription is {}; resolve it to continue using paid features",
                status.as_str()
            ),
        }
    }
}

/// Blocks mutations for paid plans whose billing is in trouble. Free plans,
/// internal users and unlimited accounts are never blocked.
pub fn check_subscription_standing(user: &User) -> Result<(), StandingIssue> {
    if user.user_type == UserType::Internal || user.unlimited_access {
        return Ok(());
    }
    if user.plan == PlanType::Free && user.admin_assigned_plan.is_none() {
        return Ok(());
    }
    if user.invoice_pending {
        return Err(StandingIssue::InvoicePending);
    }
    match user.subscription_status {
        Some(
            status @ (SubscriptionStatus::PastDue
            | SubscriptionStatus::Paused
            | SubscriptionStatus::Unpaid),
        ) => Err(StandingIssue::Subscription(status)),
        _ => Ok(()),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BillingEvent {
    CheckoutCompleted { subscription_id: String },
    SubscriptionChanged {
        status: SubscriptionStatus,
        cancel_at: Option<DateTime<Utc>>,
    },
    PaymentFailed,
    InvoicePaid,
    InvoiceFinalized { open: bool },
}

pub fn apply_billing_event(user: &mut User, event: &BillingEvent) {
    match event {
        BillingEvent::CheckoutCompleted { subscription_id } => {
            user.billing_subscription_id = Some(subscription_id.clone());
            user.subscription_status = Some(SubscriptionStatus::Active);
            user.plan = PlanType::Pro;
            user.subscription_end_date = None;
        }
        BillingEvent::SubscriptionChanged { status, cancel_at } => {
            let is_active = matches!(status, SubscriptionStatus::Active | SubscriptionStatus::Trialing);
            user.subscription_status = Some(*status);
            user.plan = if is_active { PlanType::Pro } else { PlanType::Free };
            user.subscription_end_date = *cancel_at;
        }
        BillingEvent::PaymentFailed => {
            user.subscription_status = Some(SubscriptionStatus::PastDue);
            user.invoice_pending = true;
        }
        BillingEvent::InvoicePaid => {
            user.invoice_pending = false;
            if user.subscription_status == Some(SubscriptionStatus::PastDue) {
                user.subscription_status = Some(SubscriptionStatus::Active);
            }
        }
        BillingEvent::InvoiceFinalized { open } => {
            if *open {
                user.invoice_pending = true;
            }
        }
    }
}
