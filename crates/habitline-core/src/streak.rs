use chrono::{Days, NaiveDate};

/// Counts consecutive calendar days ending at `today` that appear in `dates`.
///
/// Dates are walked newest first; the i-th date must equal `today - i` days.
/// The walk stops at the first gap, so a run that does not include `today`
/// yields zero. Callers guarantee at most one entry per day.
pub fn current_streak(dates: &[NaiveDate], today: NaiveDate) -> u32 {
    let mut sorted = dates.to_vec();
    sorted.sort_unstable_by(|a, b| b.cmp(a));

    let mut streak = 0u32;
    for (offset, date) in sorted.iter().enumerate() {
        let Some(expected) = today.checked_sub_days(Days::new(offset as u64)) else {
            break;
        };
        if *date != expected {
            break;
        }
        streak += 1;
    }
    streak
}

#[cfg(test)]
mod tests {
    use super::current_streak;
    use chrono::{Days, NaiveDate};

    fn day(raw: &str) -> NaiveDate {
        NaiveDate::parse_from_str(raw, "%Y-%m-%d").expect("valid date")
    }

    fn run_ending(today: NaiveDate, length: u64) -> Vec<NaiveDate> {
        (0..length)
            .map(|offset| today.checked_sub_days(Days::new(offset)).expect("in range"))
            .collect()
    }

    #[test]
    fn empty_history_has_no_streak() {
        assert_eq!(current_streak(&[], day("2024-03-10")), 0);
    }

    #[test]
    fn only_today_counts_as_one() {
        let today = day("2024-03-10");
        assert_eq!(current_streak(&[today], today), 1);
    }

    #[test]
    fn run_must_include_today() {
        let today = day("2024-03-10");
        let dates = vec![day("2024-03-09"), day("2024-03-08"), day("2024-03-07")];
        assert_eq!(current_streak(&dates, today), 0);
    }

    #[test]
    fn stops_at_first_gap() {
        let today = day("2024-03-10");
        let dates = vec![
            day("2024-03-10"),
            day("2024-03-09"),
            day("2024-03-07"),
            day("2024-03-06"),
        ];
        assert_eq!(current_streak(&dates, today), 2);
    }

    #[test]
    fn input_order_does_not_matter() {
        let today = day("2024-03-10");
        let dates = vec![day("2024-03-08"), day("2024-03-10"), day("2024-03-09")];
        assert_eq!(current_streak(&dates, today), 3);
    }

    #[test]
    fn crosses_month_and_leap_day_boundaries() {
        let today = day("2024-03-01");
        let dates = vec![day("2024-03-01"), day("2024-02-29"), day("2024-02-28")];
        assert_eq!(current_streak(&dates, today), 3);

        let today = day("2025-01-01");
        let dates = vec![day("2025-01-01"), day("2024-12-31")];
        assert_eq!(current_streak(&dates, today), 2);
    }

    #[test]
    fn future_date_breaks_the_walk() {
        let today = day("2024-03-10");
        let dates = vec![day("2024-03-11"), day("2024-03-10"), day("2024-03-09")];
        assert_eq!(current_streak(&dates, today), 0);
    }

    #[test]
    fn run_of_length_k_followed_by_a_gap_counts_k() {
        let today = day("2024-06-15");
        for length in 0..40u64 {
            let mut dates = run_ending(today, length);
            // Older history beyond the gap must never extend the count.
            let gap_start = today
                .checked_sub_days(Days::new(length + 1))
                .expect("in range");
            dates.extend(run_ending(gap_start, 5));
            assert_eq!(current_streak(&dates, today), length as u32, "length {length}");
        }
    }
}
