pub mod accounts;
pub mod bootstrap;
pub mod categories;
pub mod dashboard;
pub mod feedback;
pub mod goals;
pub mod labels;
pub mod notes;
pub mod notifications;
pub mod release_notes;
pub mod reports;
pub mod schedule;
pub mod sharing;
pub mod state;
pub mod tasks;
pub mod time_entries;

#[cfg(test)]
pub(crate) mod test_support;
