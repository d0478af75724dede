use crate::domain::report::{Report, ReportHeader, format_duration};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportMeta {
    pub title: Option<String>,
    pub client_name: Option<String>,
    pub project_name: Option<String>,
    pub notes: Option<String>,
}

const DEFAULT_TITLE: &str = "Time Report";

pub fn export_csv(report: &Report, meta: &ExportMeta) -> String {
    let mut rows: Vec<Vec<String>> = Vec::new();
    write_preamble(&mut rows, report.header(), meta);
    rows.push(Vec::new());

    match report {
        Report::Detailed(detailed) => {
            rows.push(cells(&[
                "Date", "Day", "Start", "End", "Task", "Goal", "Category", "Minutes", "Duration", "Notes",
            ]));
            for day in &detailed.daily_breakdown {
                for entry in &day.entries {
                    rows.push(vec![
                        entry.date.to_string(),
                        day.day_of_week.clone(),
                        entry.started_at.format("%H:%M").to_string(),
                        entry.ended_at.format("%H:%M").to_string(),
                        entry.task_name.clone(),
                        entry.goal.as_ref().map(|goal| goal.title.clone()).unwrap_or_default(),
                        entry.category.clone().unwrap_or_default(),
                        entry.duration_minutes.to_string(),
                        entry.duration_formatted.clone(),
                        entry.notes.clone().unwrap_or_default(),
                    ]);
                }
                rows.push(total_row(10, 7, "Daily total", day.total_minutes));
            }
        }
        Report::Summary(summary) => {
            let billable = summary.header.billable.is_some();
            let mut header = cells(&["Name", "Minutes", "Duration", "Hours", "Percentage", "Entries"]);
            if billable {
                header.push("Billable".to_string());
            }
            rows.push(header);
            for item in &summary.items {
                let mut row = vec![
                    item.name.clone(),
                    item.total_minutes.to_string(),
                    item.total_formatted.clone(),
                    format!("{:.2}", item.total_hours),
                    format!("{}%", item.percentage),
                    item.entries_count.to_string(),
                ];
                if let Some(amount) = item.billable_amount {
                    row.push(format!("{amount:.2}"));
                }
                rows.push(row);
            }
        }
        Report::DayByTask(by_task) => {
            rows.push(cells(&["Date", "Day", "Task", "Goal", "Minutes", "Duration"]));
            for day in &by_task.daily_breakdown {
                for task in &day.tasks {
                    rows.push(vec![
                        day.date.to_string(),
                        day.day_of_week.clone(),
                        task.task_name.clone(),
                        task.goal_title.clone().unwrap_or_default(),
                        task.total_minutes.to_string(),
                        task.total_formatted.clone(),
                    ]);
                }
                rows.push(total_row(6, 3, "Daily total", day.total_minutes));
            }
        }
        Report::DayTotal(day_total) => {
            rows.push(cells(&["Date", "Day", "Tasks", "Minutes", "Duration", "Hours"]));
            for day in &day_total.daily_breakdown {
                rows.push(vec![
                    day.date.to_string(),
                    day.day_of_week.clone(),
                    day.task_names.clone(),
                    day.total_minutes.to_string(),
                    day.total_formatted.clone(),
                    format!("{:.2}", day.total_hours),
                ]);
            }
        }
        Report::Schedule(schedule) => {
            let mut header = cells(&["Schedule", "Time"]);
            header.extend(
                schedule
                    .days
                    .iter()
                    .map(|day| format!("{} {}", day.day_of_week, day.date.format("%m-%d"))),
            );
            header.extend(cells(&["Logged", "Expected", "Percentage"]));
            rows.push(header);
            for row in &schedule.rows {
                let mut line = vec![row.pattern.title.clone(), row.pattern.time_range_formatted.clone()];
                line.extend(row.days.iter().map(|day| {
                    if day.expected_minutes == 0 && day.logged_minutes == 0 {
                        String::new()
                    } else {
                        format!("{} / {}", day.logged_formatted, format_duration(day.expected_minutes))
                    }
                }));
                line.push(row.total_logged_formatted.clone());
                line.push(format_duration(row.total_expected));
                line.push(format!("{}%", row.overall_percentage));
                rows.push(line);
            }
        }
    }

    let header = report.header();
    rows.push(Vec::new());
    rows.push(vec![
        "Total".to_string(),
        header.summary.total_minutes.to_string(),
        header.summary.total_formatted.clone(),
    ]);
    if let Some(billable) = &header.billable {
        rows.push(vec![
            "Billable".to_string(),
            format!("{:.2}", billable.total_amount),
            billable.currency.clone(),
            format!("{:.2}/h", billable.hourly_rate),
        ]);
    }
    if let Some(notes) = meta.notes.as_deref().filter(|notes| !notes.trim().is_empty()) {
        rows.push(vec!["Notes".to_string(), notes.trim().to_string()]);
    }

    let mut output = String::new();
    for row in rows {
        let line = row.iter().map(|cell| quote(cell)).collect::<Vec<_>>().join(",");
        output.push_str(&line);
        output.push('\n');
    }
    output
}

fn write_preamble(rows: &mut Vec<Vec<String>>, header: &ReportHeader, meta: &ExportMeta) {
    let title = meta
        .title
        .as_deref()
        .map(str::trim)
        .filter(|title| !title.is_empty())
        .unwrap_or(DEFAULT_TITLE);
    rows.push(vec![title.to_string()]);
    rows.push(vec![
        "Period".to_string(),
        format!("{} - {}", header.start_date, header.end_date),
    ]);
    rows.push(vec!["Generated".to_string(), header.generated_at.to_rfc3339()]);
    if let Some(client) = meta.client_name.as_deref().filter(|value| !value.trim().is_empty()) {
        rows.push(vec!["Client".to_string(), client.trim().to_string()]);
    }
    if let Some(project) = meta.project_name.as_deref().filter(|value| !value.trim().is_empty()) {
        rows.push(vec!["Project".to_string(), project.trim().to_string()]);
    }
}

fn cells(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| (*value).to_string()).collect()
}

fn total_row(width: usize, label_column: usize, label: &str, minutes: u32) -> Vec<String> {
    let mut row = vec![String::new(); width];
    if let Some(cell) = row.get_mut(label_column - 1) {
        *cell = label.to_string();
    }
    if let Some(cell) = row.get_mut(label_column) {
        *cell = minutes.to_string();
    }
    if let Some(cell) = row.get_mut(label_column + 1) {
        *cell = format_duration(minutes);
    }
    row
}

fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}
