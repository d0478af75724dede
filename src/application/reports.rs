use crate::application::goals::non_empty;
use crate::application::state::AppState;
use crate::domain::report::{GroupBy, Report, ReportOptions, ReportView, SortBy, aggregate};
use crate::infrastructure::error::AppError;
use crate::infrastructure::report_export::{ExportMeta, export_csv};
use crate::infrastructure::schedule_repository::list_blocks;
use crate::infrastructure::time_entry_repository::{ReportQuery, report_entries};
use crate::infrastructure::user_repository::require_user;
use chrono::NaiveDate;
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct ReportRequest {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub view_type: Option<String>,
    pub group_by: Option<String>,
    pub goal_ids: Vec<String>,
    pub task_ids: Vec<String>,
    pub category: Option<String>,
    pub sort_by: Option<String>,
    pub hourly_rate: Option<f64>,
}

pub fn generate_report_impl(state: &AppState, user_id: &str, request: &ReportRequest) -> Result<Report, AppError> {
    let (start_date, end_date) = date_range(request)?;
    let view = parse_view(request.view_type.as_deref(), request.group_by.as_deref())?;
    let sort_by = match request.sort_by.as_deref() {
        Some(value) => SortBy::parse(value).ok_or_else(|| AppError::Validation(format!("unknown sort_by: {value}")))?,
        None => SortBy::default(),
    };
    if let Some(rate) = request.hourly_rate {
        if !rate.is_finite() || rate < 0.0 {
            return Err(AppError::Validation("hourly_rate must be a non-negative number".to_string()));
        }
    }

    let connection = state.database().connect()?;
    let user = require_user(&connection, user_id)?;
    let query = ReportQuery {
        user_id: user.id.clone(),
        start: Some(start_date),
        end: Some(end_date),
        goal_ids: request.goal_ids.clone(),
        task_ids: request.task_ids.clone(),
        category: non_empty(request.category.clone()),
        limit: None,
    };
    let entries = report_entries(&connection, &query)?;
    let blocks = if view == ReportView::Schedule {
        list_blocks(&connection, &user.id)?
    } else {
        Vec::new()
    };

    let options = ReportOptions {
        start_date,
        end_date,
        generated_at: state.now(),
        sort_by,
        hourly_rate: request.hourly_rate,
        currency: state.settings().currency.clone(),
    };
    let report = aggregate(&entries, &blocks, view, &options);
    tracing::debug!(
        user_id = %user.id,
        entries = entries.len(),
        "report generated for {start_date}..{end_date}"
    );
    Ok(report)
}

pub fn export_report_csv_impl(
    state: &AppState,
    user_id: &str,
    request: &ReportRequest,
    meta: &ExportMeta,
) -> Result<String, AppError> {
    let report = generate_report_impl(state, user_id, request)?;
    Ok(export_csv(&report, meta))
}

fn date_range(request: &ReportRequest) -> Result<(NaiveDate, NaiveDate), AppError> {
    let start_date = request
        .start_date
        .ok_or_else(|| AppError::Validation("start_date is required".to_string()))?;
    let end_date = request
        .end_date
        .ok_or_else(|| AppError::Validation("end_date is required".to_string()))?;
    if end_date < start_date {
        return Err(AppError::Validation("end_date must not be before start_date".to_string()));
    }
    Ok((start_date, end_date))
}

pub fn parse_view(view_type: Option<&str>, group_by: Option<&str>) -> Result<ReportView, AppError> {
    let view_type = view_type.map(|value| value.trim().to_ascii_lowercase());
    match view_type.as_deref() {
        None | Some("detailed") => Ok(ReportView::Detailed),
        Some("summary") => {
            let group_by = match group_by {
                Some(value) => {
                    GroupBy::parse(value).ok_or_else(|| AppError::Validation(format!("unknown group_by: {value}")))?
                }
                None => GroupBy::Goal,
            };
            Ok(ReportView::Summary(group_by))
        }
        Some("day_by_task") => Ok(ReportView::DayByTask),
        Some("day_total") => Ok(ReportView::DayTotal),
        Some("schedule") => Ok(ReportView::Schedule),
        Some(other) => Err(AppError::Validation(format!("unknown view_type: {other}"))),
    }
}
