use crate::domain::models::{ScheduleBlock, day_of_week};
use crate::domain::schedule::TimeRange;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

const NO_GOAL_ID: &str = "no-goal";
const NO_GOAL_TITLE: &str = "No Goal";
const UNCATEGORIZED: &str = "UNCATEGORIZED";

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct GoalRef {
    pub id: String,
    pub title: String,
    pub color: String,
    pub category: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TaskRef {
    pub id: String,
    pub title: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct BlockRef {
    pub id: String,
    pub title: String,
    pub start_time: String,
    pub end_time: String,
    pub color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportEntry {
    pub id: String,
    pub date: NaiveDate,
    pub started_at: DateTime<Utc>,
    pub task_name: String,
    pub duration_minutes: u32,
    pub notes: Option<String>,
    pub goal: Option<GoalRef>,
    pub task: Option<TaskRef>,
    pub task_category: Option<String>,
    pub schedule_block: Option<BlockRef>,
}

impl ReportEntry {
    /// Goal category wins over the task's own category.
    pub fn category(&self) -> Option<&str> {
        self.goal
            .as_ref()
            .and_then(|goal| goal.category.as_deref())
            .or(self.task_category.as_deref())
    }

    pub fn ended_at(&self) -> DateTime<Utc> {
        self.started_at + Duration::minutes(i64::from(self.duration_minutes))
    }

    fn task_identity(&self) -> String {
        match &self.task {
            Some(task) => format!("id:{}", task.id),
            None => format!("name:{}", self.task_name.trim().to_lowercase()),
        }
    }

    fn display_task_name(&self) -> String {
        self.task
            .as_ref()
            .map(|task| task.title.clone())
            .unwrap_or_else(|| self.task_name.trim().to_string())
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GroupBy {
    Goal,
    Task,
    Category,
    Date,
}

impl GroupBy {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "goal" => Some(Self::Goal),
            "task" => Some(Self::Task),
            "category" => Some(Self::Category),
            "date" => Some(Self::Date),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortBy {
    #[default]
    DateAsc,
    DateDesc,
    DurationAsc,
    DurationDesc,
    Goal,
    Task,
}

impl SortBy {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "date_asc" => Some(Self::DateAsc),
            "date_desc" => Some(Self::DateDesc),
            "duration_asc" => Some(Self::DurationAsc),
            "duration_desc" => Some(Self::DurationDesc),
            "goal" => Some(Self::Goal),
            "task" => Some(Self::Task),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportView {
    Detailed,
    Summary(GroupBy),
    DayByTask,
    DayTotal,
    Schedule,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportOptions {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub generated_at: DateTime<Utc>,
    pub sort_by: SortBy,
    pub hourly_rate: Option<f64>,
    pub currency: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ReportSummary {
    pub total_minutes: u32,
    pub total_formatted: String,
    pub total_hours: f64,
    pub total_entries: usize,
    pub days_with_entries: usize,
    pub avg_minutes_per_day: u32,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BillableInfo {
    pub hourly_rate: f64,
    pub total_hours: f64,
    pub total_amount: f64,
    pub currency: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ReportHeader {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub generated_at: DateTime<Utc>,
    pub summary: ReportSummary,
    pub billable: Option<BillableInfo>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "report_type", rename_all = "snake_case")]
pub enum Report {
    Detailed(DetailedReport),
    Summary(SummaryReport),
    DayByTask(DayByTaskReport),
    DayTotal(DayTotalReport),
    Schedule(ScheduleReport),
}

impl Report {
    pub fn header(&self) -> &ReportHeader {
        match self {
            Self::Detailed(report) => &report.header,
            Self::Summary(report) => &report.header,
            Self::DayByTask(report) => &report.header,
            Self::DayTotal(report) => &report.header,
            Self::Schedule(report) => &report.header,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DetailedEntry {
    pub id: String,
    pub date: NaiveDate,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub task_name: String,
    pub duration_minutes: u32,
    pub duration_formatted: String,
    pub notes: Option<String>,
    pub goal: Option<GoalRef>,
    pub task: Option<TaskRef>,
    pub category: Option<String>,
    pub schedule_block: Option<BlockRef>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DailyBreakdown {
    pub date: NaiveDate,
    pub day_of_week: String,
    pub entries: Vec<DetailedEntry>,
    pub total_minutes: u32,
    pub total_formatted: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DetailedReport {
    #[serde(flatten)]
    pub header: ReportHeader,
    pub daily_breakdown: Vec<DailyBreakdown>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SummaryItem {
    pub id: String,
    pub name: String,
    pub color: Option<String>,
    pub total_minutes: u32,
    pub total_formatted: String,
    pub total_hours: f64,
    pub percentage: u32,
    pub entries_count: usize,
    pub billable_amount: Option<f64>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DateBreakdownItem {
    pub date: NaiveDate,
    pub minutes: u32,
    pub formatted: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SummaryReport {
    #[serde(flatten)]
    pub header: ReportHeader,
    pub group_by: GroupBy,
    pub items: Vec<SummaryItem>,
    pub date_breakdown: Vec<DateBreakdownItem>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DayByTaskRow {
    pub task_name: String,
    pub task_id: Option<String>,
    pub goal_title: Option<String>,
    pub goal_color: Option<String>,
    pub total_minutes: u32,
    pub total_formatted: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DayByTaskBreakdown {
    pub date: NaiveDate,
    pub day_of_week: String,
    pub tasks: Vec<DayByTaskRow>,
    pub total_minutes: u32,
    pub total_formatted: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DayByTaskReport {
    #[serde(flatten)]
    pub header: ReportHeader,
    pub daily_breakdown: Vec<DayByTaskBreakdown>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DayTotalGoalGroup {
    pub goal_id: Option<String>,
    pub goal_title: String,
    pub goal_color: Option<String>,
    pub task_names: String,
    pub total_minutes: u32,
    pub total_formatted: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DayTotalBreakdown {
    pub date: NaiveDate,
    pub day_of_week: String,
    pub task_names: String,
    pub goal_groups: Vec<DayTotalGoalGroup>,
    pub total_minutes: u32,
    pub total_formatted: String,
    pub total_hours: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DayTotalReport {
    #[serde(flatten)]
    pub header: ReportHeader,
    pub daily_breakdown: Vec<DayTotalBreakdown>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SchedulePattern {
    pub pattern_key: String,
    pub title: String,
    pub start_time: String,
    pub end_time: String,
    pub category: Option<String>,
    pub color: Option<String>,
    pub goal_id: Option<String>,
    pub days_of_week: Vec<u8>,
    pub time_range_formatted: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ScheduleTaskItem {
    pub task_name: String,
    pub minutes: u32,
    pub formatted: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ScheduleDayData {
    pub date: NaiveDate,
    pub day_of_week: String,
    pub day_number: u8,
    pub logged_minutes: u32,
    pub logged_formatted: String,
    pub expected_minutes: u32,
    pub percentage: u32,
    pub tasks: Vec<ScheduleTaskItem>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ScheduleReportRow {
    pub pattern: SchedulePattern,
    pub days: Vec<ScheduleDayData>,
    pub total_logged: u32,
    pub total_logged_formatted: String,
    pub total_expected: u32,
    pub overall_percentage: u32,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ScheduleDay {
    pub date: NaiveDate,
    pub day_of_week: String,
    pub day_number: u8,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AdherenceSummary {
    pub total_minutes: u32,
    pub total_formatted: String,
    pub total_expected_minutes: u32,
    pub total_expected_formatted: String,
    pub overall_percentage: u32,
    pub total_entries: usize,
    pub schedules_tracked: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ScheduleReport {
    #[serde(flatten)]
    pub header: ReportHeader,
    pub adherence: AdherenceSummary,
    pub days: Vec<ScheduleDay>,
    pub rows: Vec<ScheduleReportRow>,
}

pub fn aggregate(
    entries: &[ReportEntry],
    blocks: &[ScheduleBlock],
    view: ReportView,
    options: &ReportOptions,
) -> Report {
    let header = build_header(entries, options);
    match view {
        ReportView::Detailed => Report::Detailed(DetailedReport {
            daily_breakdown: detailed_breakdown(entries, options.sort_by),
            header,
        }),
        ReportView::Summary(group_by) => Report::Summary(SummaryReport {
            items: summary_items(entries, group_by, options.hourly_rate),
            date_breakdown: date_breakdown(entries),
            group_by,
            header,
        }),
        ReportView::DayByTask => Report::DayByTask(DayByTaskReport {
            daily_breakdown: day_by_task(entries),
            header,
        }),
        ReportView::DayTotal => Report::DayTotal(DayTotalReport {
            daily_breakdown: day_totals(entries),
            header,
        }),
        ReportView::Schedule => {
            let (adherence, days, rows) =
                schedule_adherence(blocks, entries, options.start_date, options.end_date);
            Report::Schedule(ScheduleReport {
                header,
                adherence,
                days,
                rows,
            })
        }
    }
}

pub fn format_duration(minutes: u32) -> String {
    let hours = minutes / 60;
    let mins = minutes % 60;
    if hours == 0 {
        return format!("{mins}m");
    }
    if mins == 0 {
        return format!("{hours}h");
    }
    format!("{hours}h {mins}m")
}

pub fn minutes_to_hours(minutes: u32) -> f64 {
    round2(f64::from(minutes) / 60.0)
}

pub fn billable_amount(minutes: u32, hourly_rate: f64) -> f64 {
    round2(f64::from(minutes) / 60.0 * hourly_rate)
}

pub fn percentage(part: u32, total: u32) -> u32 {
    if total == 0 {
        return 0;
    }
    // part <= total in every caller, so the rounded value fits in u32
    let rounded = (f64::from(part) / f64::from(total) * 100.0).round();
    if rounded <= 0.0 { 0 } else { rounded as u32 }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn weekday_label(date: NaiveDate) -> String {
    date.format("%a").to_string()
}

fn total_minutes<'a, I>(entries: I) -> u32
where
    I: IntoIterator<Item = &'a ReportEntry>,
{
    entries
        .into_iter()
        .fold(0u32, |sum, entry| sum.saturating_add(entry.duration_minutes))
}

fn build_header(entries: &[ReportEntry], options: &ReportOptions) -> ReportHeader {
    let total = total_minutes(entries);
    let days_with_entries = entries
        .iter()
        .map(|entry| entry.date)
        .collect::<std::collections::BTreeSet<_>>()
        .len();
    let avg_minutes_per_day = match u32::try_from(days_with_entries) {
        Ok(days) if days > 0 => (f64::from(total) / f64::from(days)).round() as u32,
        _ => 0,
    };

    let billable = options
        .hourly_rate
        .filter(|rate| rate.is_finite() && *rate >= 0.0)
        .map(|hourly_rate| BillableInfo {
            hourly_rate,
            total_hours: minutes_to_hours(total),
            total_amount: billable_amount(total, hourly_rate),
            currency: options.currency.clone(),
        });

    ReportHeader {
        start_date: options.start_date,
        end_date: options.end_date,
        generated_at: options.generated_at,
        summary: ReportSummary {
            total_minutes: total,
            total_formatted: format_duration(total),
            total_hours: minutes_to_hours(total),
            total_entries: entries.len(),
            days_with_entries,
            avg_minutes_per_day,
        },
        billable,
    }
}

fn group_by_date(entries: &[ReportEntry]) -> BTreeMap<NaiveDate, Vec<&ReportEntry>> {
    let mut days: BTreeMap<NaiveDate, Vec<&ReportEntry>> = BTreeMap::new();
    for entry in entries {
        days.entry(entry.date).or_default().push(entry);
    }
    days
}

fn detailed_breakdown(entries: &[ReportEntry], sort_by: SortBy) -> Vec<DailyBreakdown> {
    let mut days = group_by_date(entries)
        .into_iter()
        .map(|(date, mut day_entries)| {
            sort_day_entries(&mut day_entries, sort_by);
            let total = total_minutes(day_entries.iter().copied());
            DailyBreakdown {
                date,
                day_of_week: weekday_label(date),
                entries: day_entries.into_iter().map(detailed_entry).collect(),
                total_minutes: total,
                total_formatted: format_duration(total),
            }
        })
        .collect::<Vec<_>>();
    if sort_by == SortBy::DateDesc {
        days.reverse();
    }
    days
}

fn sort_day_entries(entries: &mut [&ReportEntry], sort_by: SortBy) {
    match sort_by {
        SortBy::DateAsc => entries.sort_by_key(|entry| entry.started_at),
        SortBy::DateDesc => entries.sort_by(|left, right| right.started_at.cmp(&left.started_at)),
        SortBy::DurationAsc => entries.sort_by_key(|entry| entry.duration_minutes),
        SortBy::DurationDesc => {
            entries.sort_by(|left, right| right.duration_minutes.cmp(&left.duration_minutes))
        }
        SortBy::Goal => entries.sort_by(|left, right| {
            let left_title = left.goal.as_ref().map(|goal| goal.title.to_lowercase());
            let right_title = right.goal.as_ref().map(|goal| goal.title.to_lowercase());
            left_title
                .cmp(&right_title)
                .then_with(|| left.started_at.cmp(&right.started_at))
        }),
        SortBy::Task => entries.sort_by(|left, right| {
            left.display_task_name()
                .to_lowercase()
                .cmp(&right.display_task_name().to_lowercase())
                .then_with(|| left.started_at.cmp(&right.started_at))
        }),
    }
}

fn detailed_entry(entry: &ReportEntry) -> DetailedEntry {
    DetailedEntry {
        id: entry.id.clone(),
        date: entry.date,
        started_at: entry.started_at,
        ended_at: entry.ended_at(),
        task_name: entry.task_name.clone(),
        duration_minutes: entry.duration_minutes,
        duration_formatted: format_duration(entry.duration_minutes),
        notes: entry.notes.clone(),
        goal: entry.goal.clone(),
        task: entry.task.clone(),
        category: entry.category().map(ToOwned::to_owned),
        schedule_block: entry.schedule_block.clone(),
    }
}

struct Bucket {
    id: String,
    name: String,
    color: Option<String>,
    minutes: u32,
    count: usize,
}

fn summary_key(entry: &ReportEntry, group_by: GroupBy) -> (String, String, Option<String>) {
    match group_by {
        GroupBy::Goal => match &entry.goal {
            Some(goal) => (goal.id.clone(), goal.title.clone(), Some(goal.color.clone())),
            None => (NO_GOAL_ID.to_string(), NO_GOAL_TITLE.to_string(), None),
        },
        GroupBy::Task => match &entry.task {
            Some(task) => (task.id.clone(), task.title.clone(), None),
            None => (
                entry.task_identity(),
                entry.task_name.trim().to_string(),
                None,
            ),
        },
        GroupBy::Category => {
            let category = entry.category().unwrap_or(UNCATEGORIZED).to_string();
            (category.clone(), category, None)
        }
        GroupBy::Date => {
            let date = entry.date.format("%Y-%m-%d").to_string();
            (date.clone(), date, None)
        }
    }
}

fn summary_items(entries: &[ReportEntry], group_by: GroupBy, hourly_rate: Option<f64>) -> Vec<SummaryItem> {
    let mut buckets: Vec<Bucket> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for entry in entries {
        let (id, name, color) = summary_key(entry, group_by);
        let position = *index.entry(id.clone()).or_insert_with(|| {
            buckets.push(Bucket {
                id,
                name,
                color,
                minutes: 0,
                count: 0,
            });
            buckets.len() - 1
        });
        if let Some(bucket) = buckets.get_mut(position) {
            bucket.minutes = bucket.minutes.saturating_add(entry.duration_minutes);
            bucket.count += 1;
        }
    }

    let grand_total = total_minutes(entries);
    let rate = hourly_rate.filter(|rate| rate.is_finite() && *rate >= 0.0);
    let mut items = buckets
        .into_iter()
        .map(|bucket| SummaryItem {
            total_formatted: format_duration(bucket.minutes),
            total_hours: minutes_to_hours(bucket.minutes),
            percentage: percentage(bucket.minutes, grand_total),
            billable_amount: rate.map(|rate| billable_amount(bucket.minutes, rate)),
            id: bucket.id,
            name: bucket.name,
            color: bucket.color,
            total_minutes: bucket.minutes,
            entries_count: bucket.count,
        })
        .collect::<Vec<_>>();
    items.sort_by(|left, right| {
        right
            .total_minutes
            .cmp(&left.total_minutes)
            .then_with(|| left.name.cmp(&right.name))
    });
    items
}

fn date_breakdown(entries: &[ReportEntry]) -> Vec<DateBreakdownItem> {
    group_by_date(entries)
        .into_iter()
        .map(|(date, day_entries)| {
            let minutes = total_minutes(day_entries);
            DateBreakdownItem {
                date,
                minutes,
                formatted: format_duration(minutes),
            }
        })
        .collect()
}

fn day_by_task(entries: &[ReportEntry]) -> Vec<DayByTaskBreakdown> {
    group_by_date(entries)
        .into_iter()
        .map(|(date, day_entries)| {
            let mut rows: Vec<DayByTaskRow> = Vec::new();
            let mut index: HashMap<String, usize> = HashMap::new();
            for entry in &day_entries {
                let position = *index.entry(entry.task_identity()).or_insert_with(|| {
                    rows.push(DayByTaskRow {
                        task_name: entry.display_task_name(),
                        task_id: entry.task.as_ref().map(|task| task.id.clone()),
                        goal_title: entry.goal.as_ref().map(|goal| goal.title.clone()),
                        goal_color: entry.goal.as_ref().map(|goal| goal.color.clone()),
                        total_minutes: 0,
                        total_formatted: String::new(),
                    });
                    rows.len() - 1
                });
                if let Some(row) = rows.get_mut(position) {
                    row.total_minutes = row.total_minutes.saturating_add(entry.duration_minutes);
                }
            }
            for row in &mut rows {
                row.total_formatted = format_duration(row.total_minutes);
            }
            rows.sort_by(|left, right| right.total_minutes.cmp(&left.total_minutes));

            let total = total_minutes(day_entries);
            DayByTaskBreakdown {
                date,
                day_of_week: weekday_label(date),
                tasks: rows,
                total_minutes: total,
                total_formatted: format_duration(total),
            }
        })
        .collect()
}

#[derive(Default)]
struct NameSet {
    seen: Vec<String>,
    names: Vec<String>,
}

impl NameSet {
    fn insert(&mut self, name: &str) {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return;
        }
        let folded = trimmed.to_lowercase();
        if !self.seen.contains(&folded) {
            self.seen.push(folded);
            self.names.push(trimmed.to_string());
        }
    }

    fn joined(&self) -> String {
        self.names.join(", ")
    }
}

fn day_totals(entries: &[ReportEntry]) -> Vec<DayTotalBreakdown> {
    struct GoalGroup {
        goal_id: Option<String>,
        goal_title: String,
        goal_color: Option<String>,
        names: NameSet,
        minutes: u32,
    }

    group_by_date(entries)
        .into_iter()
        .map(|(date, day_entries)| {
            let mut all_names = NameSet::default();
            let mut groups: Vec<GoalGroup> = Vec::new();
            let mut index: HashMap<Option<String>, usize> = HashMap::new();
            for entry in &day_entries {
                let goal_id = entry.goal.as_ref().map(|goal| goal.id.clone());
                let position = *index.entry(goal_id.clone()).or_insert_with(|| {
                    groups.push(GoalGroup {
                        goal_id,
                        goal_title: entry
                            .goal
                            .as_ref()
                            .map(|goal| goal.title.clone())
                            .unwrap_or_else(|| NO_GOAL_TITLE.to_string()),
                        goal_color: entry.goal.as_ref().map(|goal| goal.color.clone()),
                        names: NameSet::default(),
                        minutes: 0,
                    });
                    groups.len() - 1
                });
                let name = entry.display_task_name();
                all_names.insert(&name);
                if let Some(group) = groups.get_mut(position) {
                    group.names.insert(&name);
                    group.minutes = group.minutes.saturating_add(entry.duration_minutes);
                }
            }

            let mut goal_groups = groups
                .into_iter()
                .map(|group| DayTotalGoalGroup {
                    task_names: group.names.joined(),
                    total_formatted: format_duration(group.minutes),
                    goal_id: group.goal_id,
                    goal_title: group.goal_title,
                    goal_color: group.goal_color,
                    total_minutes: group.minutes,
                })
                .collect::<Vec<_>>();
            goal_groups.sort_by(|left, right| right.total_minutes.cmp(&left.total_minutes));

            let total = total_minutes(day_entries);
            DayTotalBreakdown {
                date,
                day_of_week: weekday_label(date),
                task_names: all_names.joined(),
                goal_groups,
                total_minutes: total,
                total_formatted: format_duration(total),
                total_hours: minutes_to_hours(total),
            }
        })
        .collect()
}

fn dates_in_range(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    start.iter_days().take_while(|date| *date <= end).collect()
}

pub fn schedule_adherence(
    blocks: &[ScheduleBlock],
    entries: &[ReportEntry],
    start_date: NaiveDate,
    end_date: NaiveDate,
) -> (AdherenceSummary, Vec<ScheduleDay>, Vec<ScheduleReportRow>) {
    struct Pattern {
        info: SchedulePattern,
        length: u32,
        logged: BTreeMap<NaiveDate, (u32, Vec<ScheduleTaskItem>)>,
    }

    let mut ordered = blocks.iter().collect::<Vec<_>>();
    ordered.sort_by(|left, right| {
        left.start_time
            .cmp(&right.start_time)
            .then_with(|| left.title.cmp(&right.title))
            .then_with(|| left.day_of_week.cmp(&right.day_of_week))
    });

    let mut patterns: Vec<Pattern> = Vec::new();
    let mut by_key: HashMap<String, usize> = HashMap::new();
    let mut by_block: HashMap<&str, usize> = HashMap::new();
    for block in ordered {
        let Some(range) = TimeRange::of_block(block) else {
            continue;
        };
        let key = format!("{}|{}|{}", block.title, block.start_time, block.end_time);
        let position = *by_key.entry(key.clone()).or_insert_with(|| {
            patterns.push(Pattern {
                info: SchedulePattern {
                    pattern_key: key,
                    title: block.title.clone(),
                    start_time: block.start_time.clone(),
                    end_time: block.end_time.clone(),
                    category: block.category.clone(),
                    color: block.color.clone(),
                    goal_id: block.goal_id.clone(),
                    days_of_week: Vec::new(),
                    time_range_formatted: format!("{} - {}", block.start_time, block.end_time),
                },
                length: range.duration_minutes(),
                logged: BTreeMap::new(),
            });
            patterns.len() - 1
        });
        if let Some(pattern) = patterns.get_mut(position) {
            if !pattern.info.days_of_week.contains(&block.day_of_week) {
                pattern.info.days_of_week.push(block.day_of_week);
                pattern.info.days_of_week.sort_unstable();
            }
        }
        by_block.insert(block.id.as_str(), position);
    }

    let mut linked_entries = 0usize;
    for entry in entries {
        let Some(position) = entry
            .schedule_block
            .as_ref()
            .and_then(|block| by_block.get(block.id.as_str()))
        else {
            continue;
        };
        if entry.date < start_date || entry.date > end_date {
            continue;
        }
        let Some(pattern) = patterns.get_mut(*position) else {
            continue;
        };
        linked_entries += 1;
        let (minutes, tasks) = pattern.logged.entry(entry.date).or_default();
        *minutes = minutes.saturating_add(entry.duration_minutes);
        let name = entry.display_task_name();
        match tasks
            .iter_mut()
            .find(|item| item.task_name.eq_ignore_ascii_case(&name))
        {
            Some(item) => item.minutes = item.minutes.saturating_add(entry.duration_minutes),
            None => tasks.push(ScheduleTaskItem {
                task_name: name,
                minutes: entry.duration_minutes,
                formatted: String::new(),
            }),
        }
    }

    let dates = dates_in_range(start_date, end_date);
    let days = dates
        .iter()
        .map(|date| ScheduleDay {
            date: *date,
            day_of_week: weekday_label(*date),
            day_number: day_of_week(*date),
        })
        .collect::<Vec<_>>();

    let mut rows = Vec::new();
    for pattern in patterns {
        let mut total_logged = 0u32;
        let mut total_expected = 0u32;
        let mut row_days = Vec::with_capacity(dates.len());
        for date in &dates {
            let day_number = day_of_week(*date);
            let expected = if pattern.info.days_of_week.contains(&day_number) {
                pattern.length
            } else {
                0
            };
            let (logged, mut tasks) = pattern.logged.get(date).cloned().unwrap_or_default();
            for task in &mut tasks {
                task.formatted = format_duration(task.minutes);
            }
            tasks.sort_by(|left, right| right.minutes.cmp(&left.minutes));
            total_logged = total_logged.saturating_add(logged);
            total_expected = total_expected.saturating_add(expected);
            row_days.push(ScheduleDayData {
                date: *date,
                day_of_week: weekday_label(*date),
                day_number,
                logged_minutes: logged,
                logged_formatted: format_duration(logged),
                expected_minutes: expected,
                percentage: adherence_percentage(logged, expected),
                tasks,
            });
        }
        if total_logged == 0 && total_expected == 0 {
            continue;
        }
        rows.push(ScheduleReportRow {
            pattern: pattern.info,
            days: row_days,
            total_logged,
            total_logged_formatted: format_duration(total_logged),
            total_expected,
            overall_percentage: adherence_percentage(total_logged, total_expected),
        });
    }

    let total_logged = rows.iter().fold(0u32, |sum, row| sum.saturating_add(row.total_logged));
    let total_expected = rows
        .iter()
        .fold(0u32, |sum, row| sum.saturating_add(row.total_expected));
    let summary = AdherenceSummary {
        total_minutes: total_logged,
        total_formatted: format_duration(total_logged),
        total_expected_minutes: total_expected,
        total_expected_formatted: format_duration(total_expected),
        overall_percentage: adherence_percentage(total_logged, total_expected),
        total_entries: linked_entries,
        schedules_tracked: rows.len(),
    };
    (summary, days, rows)
}

fn adherence_percentage(logged: u32, expected: u32) -> u32 {
    if expected == 0 {
        return 0;
    }
    let rounded = (f64::from(logged) / f64::from(expected) * 100.0).round();
    if rounded <= 0.0 { 0 } else { rounded as u32 }
}
