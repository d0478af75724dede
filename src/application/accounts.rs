use crate::application::categories::seed_default_categories;
use crate::application::labels::seed_default_labels;
use crate::application::state::{AppState, next_id};
use crate::domain::entitlements::{
    BillingEvent, EntitlementProfile, PlanLimits, PlanTier, ResourceKind, apply_billing_event, check_capacity,
    check_subscription_standing, resolve_plan_tier,
};
use crate::domain::models::{PlanType, SubscriptionStatus, User, UserRole, UserType};
use crate::infrastructure::error::AppError;
use crate::infrastructure::goal_repository::count_open_goals;
use crate::infrastructure::schedule_repository::count_blocks;
use crate::infrastructure::time_entry_repository::count_entries_on;
use crate::infrastructure::user_repository::{count_users, insert_user, list_users, require_user, update_user};
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub user_type: Option<UserType>,
    pub role: Option<UserRole>,
    pub plan: Option<PlanType>,
    pub subscription_status: Option<SubscriptionStatus>,
    pub subscription_end_date: Option<DateTime<Utc>>,
    pub billing_subscription_id: Option<String>,
    pub unlimited_access: bool,
    pub admin_assigned_plan: Option<PlanType>,
    pub invoice_pending: bool,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct Usage {
    pub goals: u32,
    pub schedules: u32,
    pub tasks_today: u32,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Standing {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserPage {
    pub users: Vec<User>,
    pub total: u32,
    pub page: u32,
    pub limit: u32,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct UserLimits {
    pub user_id: String,
    pub tier: PlanTier,
    pub effective_plan: PlanType,
    pub limits: PlanLimits,
    pub usage: Usage,
    pub standing: Option<Standing>,
}

pub fn create_user_impl(state: &AppState, input: NewUser) -> Result<User, AppError> {
    let user = User {
        id: next_id("usr"),
        email: input.email.trim().to_lowercase(),
        name: input.name.trim().to_string(),
        user_type: input.user_type.unwrap_or(UserType::External),
        role: input.role.unwrap_or(UserRole::User),
        plan: input.plan.unwrap_or(PlanType::Free),
        subscription_status: input.subscription_status,
        subscription_end_date: input.subscription_end_date,
        billing_subscription_id: input
            .billing_subscription_id
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty()),
        unlimited_access: input.unlimited_access,
        admin_assigned_plan: input.admin_assigned_plan,
        invoice_pending: input.invoice_pending,
        created_at: state.now(),
    };
    user.validate().map_err(AppError::Validation)?;

    let mut connection = state.database().connect()?;
    let transaction = connection.transaction()?;
    insert_user(&transaction, &user)?;
    let categories = seed_default_categories(&transaction, &user.id, user.created_at)?;
    let labels = seed_default_labels(&transaction, &user.id, user.created_at)?;
    transaction.commit()?;

    state.log_info(
        "create_user",
        &format!("created user_id={} categories={categories} labels={labels}", user.id),
    );
    Ok(user)
}

pub fn get_user_impl(state: &AppState, user_id: &str) -> Result<User, AppError> {
    let connection = state.database().connect()?;
    require_user(&connection, user_id)
}

pub fn get_user_limits_impl(state: &AppState, user_id: &str) -> Result<UserLimits, AppError> {
    let connection = state.database().connect()?;
    let user = require_user(&connection, user_id)?;
    let profile = EntitlementProfile::from(&user);
    let tier = resolve_plan_tier(&profile, state.now());
    let usage = Usage {
        goals: count_open_goals(&connection, &user.id)?,
        schedules: count_blocks(&connection, &user.id)?,
        tasks_today: count_entries_on(&connection, &user.id, state.today())?,
    };
    let standing = check_subscription_standing(&user).err().map(|issue| Standing {
        code: issue.code(),
        message: issue.message(),
    });

    Ok(UserLimits {
        user_id: user.id,
        tier,
        effective_plan: profile.effective_plan(),
        limits: tier.limits(),
        usage,
        standing,
    })
}

pub fn update_profile_impl(state: &AppState, user_id: &str, name: &str) -> Result<User, AppError> {
    let connection = state.database().connect()?;
    let mut user = require_user(&connection, user_id)?;
    user.name = name.trim().to_string();
    user.validate().map_err(AppError::Validation)?;
    update_user(&connection, &user)?;
    state.log_info("update_profile", &format!("updated user_id={}", user.id));
    Ok(user)
}

pub fn grant_free_access_impl(state: &AppState, admin_id: &str, user_id: &str) -> Result<User, AppError> {
    let connection = state.database().connect()?;
    require_admin(&connection, admin_id)?;
    let mut user = require_user(&connection, user_id)?;
    user.unlimited_access = true;
    user.plan = PlanType::Pro;
    update_user(&connection, &user)?;
    state.log_info(
        "grant_free_access",
        &format!("admin_id={admin_id} granted unlimited access to user_id={}", user.id),
    );
    Ok(user)
}

pub fn revoke_free_access_impl(state: &AppState, admin_id: &str, user_id: &str) -> Result<User, AppError> {
    let connection = state.database().connect()?;
    require_admin(&connection, admin_id)?;
    let mut user = require_user(&connection, user_id)?;
    if user.user_type == UserType::Internal {
        return Err(AppError::forbidden("cannot revoke access from an internal user"));
    }
    user.unlimited_access = false;
    user.plan = if user.subscription_status == Some(SubscriptionStatus::Active) {
        PlanType::Pro
    } else {
        PlanType::Free
    };
    update_user(&connection, &user)?;
    state.log_info(
        "revoke_free_access",
        &format!("admin_id={admin_id} revoked unlimited access from user_id={} plan={}", user.id, user.plan.as_str()),
    );
    Ok(user)
}

pub fn assign_plan_impl(state: &AppState, admin_id: &str, user_id: &str, plan: Option<PlanType>) -> Result<User, AppError> {
    let connection = state.database().connect()?;
    require_admin(&connection, admin_id)?;
    let mut user = require_user(&connection, user_id)?;
    user.admin_assigned_plan = plan;
    update_user(&connection, &user)?;
    state.log_info(
        "assign_plan",
        &format!(
            "admin_id={admin_id} user_id={} plan={}",
            user.id,
            plan.map(PlanType::as_str).unwrap_or("none")
        ),
    );
    Ok(user)
}

pub fn list_users_impl(state: &AppState, admin_id: &str, page: u32, limit: u32) -> Result<UserPage, AppError> {
    let connection = state.database().connect()?;
    require_admin(&connection, admin_id)?;
    let page = page.max(1);
    let limit = limit.clamp(1, 100);
    let users = list_users(&connection, limit, (page - 1).saturating_mul(limit))?;
    let total = count_users(&connection)?;
    Ok(UserPage { users, total, page, limit })
}

pub fn promote_to_admin_impl(state: &AppState, caller_id: &str, user_id: &str) -> Result<User, AppError> {
    let connection = state.database().connect()?;
    let caller = require_user(&connection, caller_id)?;
    if caller.role != UserRole::SuperAdmin {
        return Err(AppError::forbidden("only a super admin can promote users"));
    }
    let mut user = require_user(&connection, user_id)?;
    if user.role == UserRole::User {
        user.role = UserRole::Admin;
        update_user(&connection, &user)?;
    }
    state.log_info("promote_to_admin", &format!("caller_id={caller_id} promoted user_id={}", user.id));
    Ok(user)
}

pub fn apply_billing_event_impl(state: &AppState, user_id: &str, event: &BillingEvent) -> Result<User, AppError> {
    let connection = state.database().connect()?;
    let mut user = require_user(&connection, user_id)?;
    apply_billing_event(&mut user, event);
    update_user(&connection, &user)?;
    state.log_info(
        "apply_billing_event",
        &format!(
            "user_id={} plan={} status={}",
            user.id,
            user.plan.as_str(),
            user.subscription_status.map(SubscriptionStatus::as_str).unwrap_or("none")
        ),
    );
    Ok(user)
}

pub(crate) fn require_admin(connection: &Connection, user_id: &str) -> Result<User, AppError> {
    let user = require_user(connection, user_id)?;
    if !user.role.is_admin() {
        return Err(AppError::forbidden("admin access required"));
    }
    Ok(user)
}

pub fn check_plan_limit_impl(state: &AppState, user_id: &str, resource: ResourceKind) -> Result<(), AppError> {
    let connection = state.database().connect()?;
    let user = require_user(&connection, user_id)?;
    let current = match resource {
        ResourceKind::Goals => count_open_goals(&connection, &user.id)?,
        ResourceKind::Schedules => count_blocks(&connection, &user.id)?,
        ResourceKind::TasksPerDay => count_entries_on(&connection, &user.id, state.today())?,
    };
    check_capacity(plan_tier(state, &user), resource, current)?;
    Ok(())
}

pub(crate) fn authorize_mutation(connection: &Connection, user_id: &str) -> Result<User, AppError> {
    let user = require_user(connection, user_id)?;
    check_subscription_standing(&user)?;
    Ok(user)
}

pub(crate) fn plan_tier(state: &AppState, user: &User) -> PlanTier {
    resolve_plan_tier(&EntitlementProfile::from(user), state.now())
}
