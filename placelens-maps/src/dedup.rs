use crate::record::ResultRecord;
use std::collections::HashSet;

/// Counts from one dedup pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DedupReport {
    pub before: usize,
    pub after: usize,
    /// Records kept without a `place_id`; dedup could not cover them.
    pub missing_place_id: usize,
}

impl DedupReport {
    pub fn dropped(&self) -> usize {
        self.before - self.after
    }
}

/// Keep the first record for each distinct `place_id`, preserving arrival order.
///
/// Records without a `place_id` are all kept.
///
/// ```
/// use placelens_maps::{dedup_by_place_id, ResultRecord};
/// use serde_json::json;
///
/// let rec = |id: &str, name: &str| {
///     ResultRecord::from_value(json!({"place_id": id, "title": name})).unwrap()
/// };
/// let (kept, report) = dedup_by_place_id(vec![rec("1", "A"), rec("2", "B"), rec("1", "C")]);
/// let titles: Vec<_> = kept.iter().filter_map(|r| r.title()).collect();
/// assert_eq!(titles, ["A", "B"]);
/// assert_eq!(report.dropped(), 1);
/// ```
pub fn dedup_by_place_id(records: Vec<ResultRecord>) -> (Vec<ResultRecord>, DedupReport) {
    let before = records.len();
    let mut seen: HashSet<String> = HashSet::with_capacity(before);
    let mut missing = 0usize;

    let kept: Vec<ResultRecord> = records
        .into_iter()
        .filter(|rec| match rec.place_id() {
            Some(id) => seen.insert(id.to_string()),
            None => {
                missing += 1;
                true
            }
        })
        .collect();

    let report = DedupReport {
        before,
        after: kept.len(),
        missing_place_id: missing,
    };

    if missing > 0 {
        tracing::warn!(
            missing_place_id = missing,
            total = before,
            "maps.dedup.incomplete: records without place_id were kept as-is"
        );
    }
    tracing::info!(
        before = report.before,
        after = report.after,
        dropped = report.dropped(),
        "maps.dedup.done"
    );

    (kept, report)
}
