use crate::domain::models::day_of_week;
use crate::domain::report::{ReportEntry, format_duration, percentage};
use chrono::{Duration, NaiveDate};
use serde::Serialize;
use std::collections::BTreeMap;

const OTHER_GOAL_ID: &str = "other";
const OTHER_TITLE: &str = "Other";
const OTHER_COLOR: &str = "#94A3B8";
const OTHER_CATEGORY: &str = "OTHER";
const TOP_ACTIVITY_COUNT: usize = 5;
const DAY_NAMES: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DayActivity {
    pub day: u8,
    pub day_name: &'static str,
    pub minutes: u32,
    pub formatted: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct GoalShare {
    pub goal_id: String,
    pub title: String,
    pub color: String,
    pub minutes: u32,
    pub percentage: u32,
    pub formatted: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TopActivity {
    pub rank: usize,
    pub task_name: String,
    pub duration_minutes: u32,
    pub goal_title: String,
    pub goal_color: String,
    pub formatted: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct WeeklyReport {
    pub week_start: NaiveDate,
    pub week_end: NaiveDate,
    pub total_minutes: u32,
    pub total_formatted: String,
    pub daily_average: u32,
    pub daily_average_formatted: String,
    pub tasks_logged: usize,
    pub daily_activity: Vec<DayActivity>,
    pub goal_breakdown: Vec<GoalShare>,
    pub top_activities: Vec<TopActivity>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct GoalMinutes {
    pub goal_id: String,
    pub goal_title: String,
    pub minutes: u32,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SummaryDay {
    pub date: NaiveDate,
    pub total_minutes: u32,
    pub entries_count: usize,
    pub categories: BTreeMap<String, u32>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct WeeklySummary {
    pub total_minutes: u32,
    pub avg_minutes_per_day: u32,
    pub total_entries: usize,
    pub most_productive_day: Option<NaiveDate>,
    pub by_category: BTreeMap<String, u32>,
    pub by_goal: Vec<GoalMinutes>,
    pub daily_breakdown: Vec<SummaryDay>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MonthlyReport {
    pub year: i32,
    pub month: u32,
    pub total_minutes: u32,
    pub total_formatted: String,
    pub total_hours: f64,
    pub days_active: usize,
    pub daily_average: u32,
    pub tasks_logged: usize,
}

pub fn week_end(week_start: NaiveDate) -> NaiveDate {
    week_start + Duration::days(6)
}

fn average_per_active_day(total_minutes: u32, active_days: usize) -> u32 {
    match u32::try_from(active_days) {
        Ok(days) if days > 0 => (f64::from(total_minutes) / f64::from(days)).round() as u32,
        _ => 0,
    }
}

fn goal_category(entry: &ReportEntry) -> String {
    entry
        .goal
        .as_ref()
        .and_then(|goal| goal.category.clone())
        .unwrap_or_else(|| OTHER_CATEGORY.to_string())
}

pub fn weekly_report(entries: &[ReportEntry], week_start: NaiveDate) -> WeeklyReport {
    let mut daily = [0u32; 7];
    let mut goals: Vec<GoalShare> = Vec::new();
    let mut activities: Vec<TopActivity> = Vec::new();
    let total_minutes = entries.iter().map(|entry| entry.duration_minutes).sum::<u32>();

    for entry in entries {
        daily[usize::from(day_of_week(entry.date))] += entry.duration_minutes;

        let (goal_id, title, color) = match &entry.goal {
            Some(goal) => (goal.id.as_str(), goal.title.as_str(), goal.color.as_str()),
            None => (OTHER_GOAL_ID, OTHER_TITLE, OTHER_COLOR),
        };
        match goals.iter_mut().find(|share| share.goal_id == goal_id) {
            Some(share) => share.minutes += entry.duration_minutes,
            None => goals.push(GoalShare {
                goal_id: goal_id.to_string(),
                title: title.to_string(),
                color: color.to_string(),
                minutes: entry.duration_minutes,
                percentage: 0,
                formatted: String::new(),
            }),
        }

        match activities.iter_mut().find(|activity| activity.task_name == entry.task_name) {
            Some(activity) => activity.duration_minutes += entry.duration_minutes,
            None => activities.push(TopActivity {
                rank: 0,
                task_name: entry.task_name.clone(),
                duration_minutes: entry.duration_minutes,
                goal_title: title.to_string(),
                goal_color: color.to_string(),
                formatted: String::new(),
            }),
        }
    }

    for share in &mut goals {
        share.percentage = percentage(share.minutes, total_minutes);
        share.formatted = format_duration(share.minutes);
    }
    activities.sort_by(|left, right| right.duration_minutes.cmp(&left.duration_minutes));
    activities.truncate(TOP_ACTIVITY_COUNT);
    for (index, activity) in activities.iter_mut().enumerate() {
        activity.rank = index + 1;
        activity.formatted = format_duration(activity.duration_minutes);
    }

    let active_days = daily.iter().filter(|minutes| **minutes > 0).count();
    let daily_average = average_per_active_day(total_minutes, active_days);
    WeeklyReport {
        week_start,
        week_end: week_end(week_start),
        total_minutes,
        total_formatted: format_duration(total_minutes),
        daily_average,
        daily_average_formatted: format_duration(daily_average),
        tasks_logged: entries.len(),
        daily_activity: daily
            .iter()
            .zip(DAY_NAMES)
            .zip(0u8..)
            .map(|((minutes, day_name), day)| DayActivity {
                day,
                day_name,
                minutes: *minutes,
                formatted: format_duration(*minutes),
            })
            .collect(),
        goal_breakdown: goals,
        top_activities: activities,
    }
}

pub fn weekly_summary(entries: &[ReportEntry], week_start: NaiveDate) -> WeeklySummary {
    let mut by_category: BTreeMap<String, u32> = BTreeMap::new();
    let mut by_goal: Vec<GoalMinutes> = Vec::new();
    for entry in entries {
        *by_category.entry(goal_category(entry)).or_default() += entry.duration_minutes;
        if let Some(goal) = &entry.goal {
            match by_goal.iter_mut().find(|item| item.goal_id == goal.id) {
                Some(item) => item.minutes += entry.duration_minutes,
                None => by_goal.push(GoalMinutes {
                    goal_id: goal.id.clone(),
                    goal_title: goal.title.clone(),
                    minutes: entry.duration_minutes,
                }),
            }
        }
    }

    let daily_breakdown = (0..7)
        .map(|offset| {
            let date = week_start + Duration::days(offset);
            let mut day = SummaryDay {
                date,
                total_minutes: 0,
                entries_count: 0,
                categories: BTreeMap::new(),
            };
            for entry in entries.iter().filter(|entry| entry.date == date) {
                day.total_minutes += entry.duration_minutes;
                day.entries_count += 1;
                *day.categories.entry(goal_category(entry)).or_default() += entry.duration_minutes;
            }
            day
        })
        .collect::<Vec<_>>();

    // First day with the strictly highest total wins ties.
    let mut most_productive_day = None;
    let mut best = 0;
    for day in &daily_breakdown {
        if day.total_minutes > best {
            best = day.total_minutes;
            most_productive_day = Some(day.date);
        }
    }

    let total_minutes = entries.iter().map(|entry| entry.duration_minutes).sum::<u32>();
    let active_days = daily_breakdown.iter().filter(|day| day.entries_count > 0).count();
    WeeklySummary {
        total_minutes,
        avg_minutes_per_day: average_per_active_day(total_minutes, active_days),
        total_entries: entries.len(),
        most_productive_day,
        by_category,
        by_goal,
        daily_breakdown,
    }
}

pub fn monthly_report(entries: &[ReportEntry], year: i32, month: u32) -> MonthlyReport {
    let total_minutes = entries.iter().map(|entry| entry.duration_minutes).sum::<u32>();
    let mut dates = entries.iter().map(|entry| entry.date).collect::<Vec<_>>();
    dates.sort_unstable();
    dates.dedup();
    let days_active = dates.len();
    MonthlyReport {
        year,
        month,
        total_minutes,
        total_formatted: format_duration(total_minutes),
        total_hours: (f64::from(total_minutes) / 6.0).round() / 10.0,
        days_active,
        daily_average: average_per_active_day(total_minutes, days_active),
        tasks_logged: entries.len(),
    }
}

pub fn month_bounds(year: i32, month: u32) -> Option<(NaiveDate, NaiveDate)> {
    let start = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    Some((start, next - Duration::days(1)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::report::GoalRef;
    use chrono::{DateTime, Utc};

    fn date(value: &str) -> NaiveDate {
        NaiveDate::parse_from_str(value, "%Y-%m-%d").expect("valid date")
    }

    fn entry(day: &str, minutes: u32, task_name: &str, goal: Option<(&str, Option<&str>)>) -> ReportEntry {
        ReportEntry {
            id: format!("ent-{day}-{task_name}"),
            date: date(day),
            started_at: DateTime::parse_from_rfc3339(&format!("{day}T09:00:00Z"))
                .expect("valid datetime")
                .with_timezone(&Utc),
            task_name: task_name.to_string(),
            duration_minutes: minutes,
            notes: None,
            goal: goal.map(|(id, category)| GoalRef {
                id: id.to_string(),
                title: format!("Goal {id}"),
                color: "#3B82F6".to_string(),
                category: category.map(ToOwned::to_owned),
            }),
            task: None,
            task_category: None,
            schedule_block: None,
        }
    }

    fn week() -> Vec<ReportEntry> {
        vec![
            entry("2026-03-09", 60, "Reading", Some(("g1", Some("LEARNING")))),
            entry("2026-03-09", 30, "Email", None),
            entry("2026-03-11", 90, "Reading", Some(("g1", Some("LEARNING")))),
            entry("2026-03-15", 20, "Run", Some(("g2", None))),
        ]
    }

    #[test]
    fn weekly_report_breaks_down_days_goals_and_activities() {
        let report = weekly_report(&week(), date("2026-03-09"));
        assert_eq!(report.week_end, date("2026-03-15"));
        assert_eq!(report.total_minutes, 200);
        assert_eq!(report.total_formatted, "3h 20m");
        assert_eq!(report.daily_average, 67);
        assert_eq!(report.tasks_logged, 4);

        assert_eq!(report.daily_activity.len(), 7);
        assert_eq!(report.daily_activity[0].day_name, "Sun");
        assert_eq!(report.daily_activity[0].minutes, 20);
        assert_eq!(report.daily_activity[1].minutes, 90);
        assert_eq!(report.daily_activity[3].minutes, 90);

        let goals = report
            .goal_breakdown
            .iter()
            .map(|share| (share.goal_id.as_str(), share.minutes, share.percentage))
            .collect::<Vec<_>>();
        assert_eq!(goals, vec![("g1", 150, 75), ("other", 30, 15), ("g2", 20, 10)]);

        let top = &report.top_activities[0];
        assert_eq!((top.rank, top.task_name.as_str(), top.duration_minutes), (1, "Reading", 150));
        assert_eq!(report.top_activities[1].goal_title, "Other");
    }

    #[test]
    fn top_activities_keep_five() {
        let entries = (0..7)
            .map(|index| entry("2026-03-10", 10 + index, &format!("Task {index}"), None))
            .collect::<Vec<_>>();
        let report = weekly_report(&entries, date("2026-03-09"));
        assert_eq!(report.top_activities.len(), 5);
        assert_eq!(report.top_activities[0].task_name, "Task 6");
        assert_eq!(report.top_activities[4].rank, 5);
    }

    #[test]
    fn weekly_summary_groups_by_category_and_finds_best_day() {
        let summary = weekly_summary(&week(), date("2026-03-09"));
        assert_eq!(summary.total_minutes, 200);
        assert_eq!(summary.avg_minutes_per_day, 67);
        assert_eq!(summary.most_productive_day, Some(date("2026-03-09")));
        assert_eq!(summary.by_category.get("LEARNING"), Some(&150));
        assert_eq!(summary.by_category.get("OTHER"), Some(&50));
        assert_eq!(summary.by_goal.len(), 2);
        assert_eq!(summary.daily_breakdown[0].entries_count, 2);
        assert_eq!(summary.daily_breakdown[1].total_minutes, 0);
        assert_eq!(summary.daily_breakdown[6].date, date("2026-03-15"));
    }

    #[test]
    fn empty_week_has_no_best_day() {
        let summary = weekly_summary(&[], date("2026-03-09"));
        assert_eq!(summary.most_productive_day, None);
        assert_eq!(summary.avg_minutes_per_day, 0);
        let report = weekly_report(&[], date("2026-03-09"));
        assert_eq!(report.daily_average_formatted, "0m");
        assert!(report.goal_breakdown.is_empty());
    }

    #[test]
    fn monthly_report_counts_active_days() {
        let report = monthly_report(&week(), 2026, 3);
        assert_eq!(report.days_active, 3);
        assert_eq!(report.daily_average, 67);
        assert_eq!(report.total_hours, 3.3);
        assert_eq!(report.tasks_logged, 4);
    }

    #[test]
    fn month_bounds_handle_december_and_leap_years() {
        assert_eq!(month_bounds(2024, 2), Some((date("2024-02-01"), date("2024-02-29"))));
        assert_eq!(month_bounds(2026, 12), Some((date("2026-12-01"), date("2026-12-31"))));
        assert_eq!(month_bounds(2026, 13), None);
    }
}
