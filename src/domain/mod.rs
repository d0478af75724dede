pub mod activity;
pub mod entitlements;
pub mod models;
pub mod report;
pub mod schedule;
pub mod sharing;
