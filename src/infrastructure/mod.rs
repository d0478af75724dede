pub mod category_repository;
pub mod config;
pub mod email_client;
pub mod error;
pub mod feedback_repository;
pub mod goal_repository;
pub mod label_repository;
pub mod logging;
pub mod note_repository;
pub mod notification_repository;
pub mod release_note_repository;
pub mod report_export;
pub mod schedule_repository;
pub mod share_repository;
pub mod storage;
pub mod task_repository;
pub mod time_entry_repository;
pub mod user_repository;
