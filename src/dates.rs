use chrono::{Days, NaiveDate};

/// Schedule dates to fetch: `extra_days` before `today` up to `today`,
/// oldest first so output comes out in broadcast order.
///
/// `today` is fixed by the caller once per run; a run that crosses midnight
/// still finishes the plan it started with.
pub fn plan(today: NaiveDate, extra_days: u32) -> Vec<NaiveDate> {
    (0..=extra_days)
        .rev()
        .filter_map(|n| today.checked_sub_days(Days::new(u64::from(n))))
        .collect()
}

/// `YYYY/MM/DD`, the form used in schedule URLs and record dates.
pub fn label(date: NaiveDate) -> String {
    date.format("%Y/%m/%d").to_string()
}
