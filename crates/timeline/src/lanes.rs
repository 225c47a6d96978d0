//! Greedy interval partitioning of one session's task spans into display
//! lanes.
//!
//! Spans are taken in `start_ts` order; each goes to the first lane whose
//! last end is at or before the span's start, opening a new lane when none
//! qualifies. For a fixed scan order this is optimal in lane count, and no
//! two spans in one lane ever overlap in `[start_ts, end_ts)`.

use crate::view::TaskView;

pub fn pack_lanes(spans: &[TaskView]) -> Vec<Vec<TaskView>> {
    let mut ordered: Vec<&TaskView> = spans.iter().collect();
    ordered.sort_by(|a, b| {
        a.start_ts
            .cmp(&b.start_ts)
            .then_with(|| a.end_ts.cmp(&b.end_ts))
            .then_with(|| a.task_id.cmp(&b.task_id))
    });

    let mut lanes: Vec<Vec<TaskView>> = Vec::new();
    let mut last_end: Vec<i64> = Vec::new();

    for span in ordered {
        let slot = last_end.iter().position(|end| *end <= span.start_ts);
        let lane = match slot {
            Some(lane) => lane,
            None => {
                lanes.push(Vec::new());
                last_end.push(i64::MIN);
                lanes.len() - 1
            }
        };
        lanes[lane].push(span.clone());
        last_end[lane] = last_end[lane].max(span.end_ts);
    }

    lanes
}
