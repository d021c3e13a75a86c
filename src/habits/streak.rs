use time::Date;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Streak {
    pub current: i64,
    pub longest: i64,
}

/// Recomputes the streak pair from the habit's completion days.
///
/// Faithful port of the original tracker's walk, including its quirk: after
/// the two most recent entries, consecutive days keep extending the run
/// counter but `current` is never reassigned, so `current` caps at 2 for
/// longer runs while `longest` still sees the full run. Callers rely on
/// `longest` never decreasing, which `prior_longest` guarantees here.
pub(crate) fn recompute(today: Date, completion_days: &[Date], prior_longest: i64) -> Streak {
    if completion_days.is_empty() {
        return Streak {
            current: 0,
            longest: prior_longest,
        };
    }

    let mut days = completion_days.to_vec();
    days.sort_by(|a, b| b.cmp(a));

    let mut current = 0;
    let mut longest = 0;
    let mut temp = 0;

    for i in 0..days.len() {
        if i == 0 {
            // Streak is alive only if the newest completion is today or yesterday.
            if days_between(today, days[0]) <= 1 {
                current = 1;
                temp = 1;
            }
        } else {
            let diff = days_between(days[i - 1], days[i]);
            if diff == 1 {
                temp += 1;
                if i == 1 {
                    current = temp;
                }
            } else {
                longest = longest.max(temp);
                temp = 1;
                if i == 1 {
                    current = 0;
                }
            }
        }
    }

    longest = longest.max(temp);

    Streak {
        current,
        longest: prior_longest.max(longest),
    }
}

fn days_between(later: Date, earlier: Date) -> i64 {
    i64::from(later.to_julian_day()) - i64::from(earlier.to_julian_day())
}
