use crate::domain::models::{ScheduleBlock, parse_hhmm_minutes};
use serde::Serialize;

/// Half-open `[start, end)` range in minutes since midnight.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct TimeRange {
    pub start: u32,
    pub end: u32,
}

impl TimeRange {
    pub fn parse(start_time: &str, end_time: &str) -> Result<Self, String> {
        let start = parse_hhmm_minutes(start_time)
            .ok_or_else(|| format!("start time '{start_time}' must be HH:MM"))?;
        let end = parse_hhmm_minutes(end_time)
            .ok_or_else(|| format!("end time '{end_time}' must be HH:MM"))?;
        if end <= start {
            return Err(format!("end time {end_time} must be after start time {start_time}"));
        }
        Ok(Self { start, end })
    }

    pub fn of_block(block: &ScheduleBlock) -> Option<Self> {
        Self::parse(&block.start_time, &block.end_time).ok()
    }

    pub fn duration_minutes(self) -> u32 {
        self.end - self.start
    }

    /// Touching endpoints do not overlap.
    pub fn overlaps(self, other: TimeRange) -> bool {
        self.start < other.end && self.end > other.start
    }
}

pub fn has_conflict<'a, I>(existing: I, day_of_week: u8, range: TimeRange, exclude_id: Option<&str>) -> bool
where
    I: IntoIterator<Item = &'a ScheduleBlock>,
{
    find_conflict(existing, day_of_week, range, exclude_id).is_some()
}

pub fn find_conflict<'a, I>(
    existing: I,
    day_of_week: u8,
    range: TimeRange,
    exclude_id: Option<&str>,
) -> Option<&'a ScheduleBlock>
where
    I: IntoIterator<Item = &'a ScheduleBlock>,
{
    existing.into_iter().find(|block| {
        block.day_of_week == day_of_week
            && exclude_id != Some(block.id.as_str())
            && TimeRange::of_block(block).is_some_and(|other| range.overlaps(other))
    })
}

pub fn find_series_conflict<'a>(
    series: &'a [ScheduleBlock],
    all_blocks: &[ScheduleBlock],
    start_time: Option<&str>,
    end_time: Option<&str>,
) -> Result<Option<&'a ScheduleBlock>, String> {
    for sibling in series {
        let next_start = start_time.unwrap_or(&sibling.start_time);
        let next_end = end_time.unwrap_or(&sibling.end_time);
        let range = TimeRange::parse(next_start, next_end)?;
        if has_conflict(all_blocks, sibling.day_of_week, range, Some(&sibling.id)) {
            return Ok(Some(sibling));
        }
    }
    Ok(None)
}

pub fn weekly_schedule(blocks: &[ScheduleBlock]) -> [Vec<ScheduleBlock>; 7] {
    let mut week: [Vec<ScheduleBlock>; 7] = Default::default();
    for block in blocks {
        if let Some(day) = week.get_mut(usize::from(block.day_of_week)) {
            day.push(block.clone());
        }
    }
    for day in &mut week {
        day.sort_by_key(|block| parse_hhmm_minutes(&block.start_time).unwrap_or(u32::MAX));
    }
    week
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use proptest::prelude::*;

    fn block(id: &str, day: u8, start: &str, end: &str) -> ScheduleBlock {
        ScheduleBlock {
            id: id.to_string(),
            user_id: "usr-1".to_string(),
            title: "Focus".to_string(),
            day_of_week: day,
            start_time: start.to_string(),
            end_time: end.to_string(),
            category: None,
            color: None,
            goal_id: None,
            series_id: Some("series-1".to_string()),
            created_at: DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
                .expect("valid datetime")
                .with_timezone(&Utc),
        }
    }

    fn range(start: &str, end: &str) -> TimeRange {
        TimeRange::parse(start, end).expect("valid range")
    }

    #[test]
    fn overlapping_request_conflicts_and_touching_one_does_not() {
        let existing = vec![block("blk-1", 1, "09:00", "10:00")];
        assert!(has_conflict(&existing, 1, range("09:30", "10:30"), None));
        assert!(!has_conflict(&existing, 1, range("10:00", "11:00"), None));
        assert!(!has_conflict(&existing, 1, range("08:00", "09:00"), None));
    }

    #[test]
    fn other_days_never_conflict() {
        let existing = vec![block("blk-1", 1, "09:00", "10:00")];
        assert!(!has_conflict(&existing, 2, range("09:00", "10:00"), None));
    }

    #[test]
    fn excluded_block_does_not_conflict_with_itself() {
        let existing = vec![block("blk-1", 1, "09:00", "10:00")];
        assert!(has_conflict(&existing, 1, range("09:00", "10:00"), None));
        assert!(!has_conflict(&existing, 1, range("09:00", "10:00"), Some("blk-1")));
    }

    #[test]
    fn range_parse_rejects_inverted_times() {
        assert!(TimeRange::parse("10:00", "09:00").is_err());
        assert!(TimeRange::parse("10:00", "10:00").is_err());
        assert!(TimeRange::parse("9am", "10:00").is_err());
        assert_eq!(range("09:15", "10:00").duration_minutes(), 45);
    }

    #[test]
    fn series_move_is_rejected_when_any_sibling_collides() {
        let series = vec![block("blk-mon", 1, "09:00", "10:00"), block("blk-wed", 3, "09:00", "10:00")];
        let mut all = series.clone();
        all.push(block("blk-other", 3, "10:30", "11:30"));

        let clear = find_series_conflict(&series, &all, Some("08:00"), Some("09:30")).expect("valid times");
        assert!(clear.is_none());

        let blocked = find_series_conflict(&series, &all, Some("10:00"), Some("11:00"))
            .expect("valid times")
            .expect("wednesday collides");
        assert_eq!(blocked.id, "blk-wed");
    }

    #[test]
    fn weekly_schedule_buckets_and_sorts() {
        let blocks = vec![
            block("b", 1, "13:00", "14:00"),
            block("a", 1, "09:00", "10:00"),
            block("c", 0, "07:00", "08:00"),
        ];
        let week = weekly_schedule(&blocks);
        assert_eq!(week[0].len(), 1);
        assert_eq!(week[1].iter().map(|block| block.id.as_str()).collect::<Vec<_>>(), vec!["a", "b"]);
        assert!(week[6].is_empty());
    }

    fn range_strategy() -> impl Strategy<Value = TimeRange> {
        (0u32..1439u32)
            .prop_flat_map(|start| (Just(start), (start + 1)..=1439u32))
            .prop_map(|(start, end)| TimeRange { start, end })
    }

    proptest! {
        #[test]
        fn conflict_is_symmetric(a in range_strategy(), b in range_strategy()) {
            prop_assert_eq!(a.overlaps(b), b.overlaps(a));
        }

        #[test]
        fn a_range_always_overlaps_itself(a in range_strategy()) {
            prop_assert!(a.overlaps(a));
        }
    }
}
