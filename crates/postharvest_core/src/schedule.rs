//! Minute-resolution scheduling for unattended runs.
//!
//! # Responsibility
//! - Parse the five-field cron expression in `schedule.cron`.
//! - Decide, once per wall-clock minute, whether a run is due.
//!
//! # Invariants
//! - At most one run starts within [`MIN_RUN_INTERVAL`] of the previous one.
//! - Standard cron syntax (lists, ranges, steps, names); weekday 0 and 7
//!   both mean Sunday.

use chrono::{DateTime, Local, Timelike};
use croner::errors::CronError;
use croner::Cron;
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Duration;

/// A run finishing less than this long ago suppresses the next match.
pub const MIN_RUN_INTERVAL: Duration = Duration::from_secs(60);
/// Sleep between checks in the scheduler loop.
pub const CHECK_INTERVAL: Duration = Duration::from_secs(30);

const WEEKDAY_NAMES: [&str; 7] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

pub type ScheduleResult<T> = Result<T, ScheduleError>;

#[derive(Debug)]
pub enum ScheduleError {
    FieldCount(usize),
    Invalid {
        expression: String,
        source: CronError,
    },
}

impl Display for ScheduleError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FieldCount(count) => {
                write!(f, "cron expression needs 5 fields, found {count}")
            }
            Self::Invalid { expression, source } => {
                write!(f, "invalid cron expression `{expression}`: {source}")
            }
        }
    }
}

impl Error for ScheduleError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::FieldCount(_) => None,
            Self::Invalid { source, .. } => Some(source),
        }
    }
}

/// Parsed `schedule.cron` expression.
#[derive(Debug, Clone)]
pub struct CronSchedule {
    expression: String,
    cron: Cron,
}

impl CronSchedule {
    pub fn parse(expression: &str) -> ScheduleResult<Self> {
        let fields: Vec<&str> = expression.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(ScheduleError::FieldCount(fields.len()));
        }
        let expression = fields.join(" ");

        let cron = Cron::new(&expression)
            .parse()
            .map_err(|source| ScheduleError::Invalid {
                expression: expression.clone(),
                source,
            })?;
        Ok(Self { expression, cron })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// True when the minute containing `at` is selected by the expression.
    pub fn matches(&self, at: &DateTime<Local>) -> bool {
        let minute = at
            .with_second(0)
            .and_then(|time| time.with_nanosecond(0))
            .unwrap_or(*at);
        self.cron.is_time_matching(&minute).unwrap_or(false)
    }

    /// Short English description, e.g. `every Monday at 08:00`.
    ///
    /// Expressions using lists, ranges or steps are shown verbatim.
    pub fn describe(&self) -> String {
        let simple: Option<Vec<Option<u32>>> = self
            .expression
            .split(' ')
            .map(|field| match field {
                "*" => Some(None),
                value => value.parse::<u32>().ok().map(Some),
            })
            .collect();
        let Some(fields) = simple else {
            return format!("on cron `{}`", self.expression);
        };
        let (minute, hour, day, month, weekday) =
            (fields[0], fields[1], fields[2], fields[3], fields[4]);

        let mut parts = Vec::new();
        if let Some(weekday) = weekday {
            parts.push(format!("every {}", WEEKDAY_NAMES[(weekday % 7) as usize]));
        }
        if let Some(day) = day {
            parts.push(format!("on day {day}"));
        }
        if let Some(month) = month {
            parts.push(format!("in month {month}"));
        }
        match (hour, minute) {
            (Some(hour), Some(minute)) => parts.push(format!("at {hour:02}:{minute:02}")),
            (Some(hour), None) => parts.push(format!("every minute of hour {hour}")),
            (None, Some(minute)) => parts.push(format!("at minute {minute} of every hour")),
            (None, None) => {}
        }
        if parts.is_empty() {
            "every minute".to_string()
        } else {
            parts.join(" ")
        }
    }
}

/// Remembers the last run and refuses another inside [`MIN_RUN_INTERVAL`].
#[derive(Debug, Default, Clone)]
pub struct RunGuard {
    last_run: Option<DateTime<Local>>,
}

impl RunGuard {
    pub fn allows(&self, now: &DateTime<Local>) -> bool {
        match self.last_run {
            None => true,
            Some(last) => (*now - last)
                .to_std()
                .map_or(false, |elapsed| elapsed > MIN_RUN_INTERVAL),
        }
    }

    pub fn record(&mut self, at: DateTime<Local>) {
        self.last_run = Some(at);
    }

    pub fn last_run(&self) -> Option<DateTime<Local>> {
        self.last_run
    }
}

/// Evaluates the schedule at most once per wall-clock minute.
#[derive(Debug, Clone)]
pub struct Scheduler {
    schedule: CronSchedule,
    guard: RunGuard,
    last_checked: Option<(u32, u32)>,
}

impl Scheduler {
    pub fn new(schedule: CronSchedule) -> Self {
        info!(
            "event=scheduler_init module=schedule status=ok plan=\"{}\"",
            schedule.describe()
        );
        Self {
            schedule,
            guard: RunGuard::default(),
            last_checked: None,
        }
    }

    pub fn schedule(&self) -> &CronSchedule {
        &self.schedule
    }

    /// Runs `job` when `now` is due; returns its outcome, or `None` if nothing ran.
    pub fn tick<F>(&mut self, now: DateTime<Local>, job: F) -> Option<bool>
    where
        F: FnOnce() -> bool,
    {
        let minute_key = (now.hour(), now.minute());
        if self.last_checked == Some(minute_key) {
            return None;
        }
        self.last_checked = Some(minute_key);

        if !self.schedule.matches(&now) {
            return None;
        }
        if !self.guard.allows(&now) {
            warn!("event=scheduled_run module=schedule status=skip reason=recent_run");
            return None;
        }

        info!("event=scheduled_run module=schedule status=start");
        let succeeded = job();
        self.guard.record(Local::now().max(now));
        info!(
            "event=scheduled_run module=schedule status={}",
            if succeeded { "ok" } else { "error" }
        );
        Some(succeeded)
    }
}

#[cfg(test)]
mod tests {
    use super::{CronSchedule, RunGuard, ScheduleError, Scheduler};
    use chrono::{DateTime, Duration, Local, TimeZone};

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Local> {
        Local
            .with_ymd_and_hms(y, mo, d, h, mi, s)
            .single()
            .expect("unambiguous local time")
    }

    #[test]
    fn weekly_schedule_matches_monday_morning_only() {
        let schedule = CronSchedule::parse("0 8 * * 1").expect("valid cron");

        // 2025-12-08 is a Monday.
        assert!(schedule.matches(&at(2025, 12, 8, 8, 0, 0)));
        assert!(schedule.matches(&at(2025, 12, 8, 8, 0, 42)));
        assert!(!schedule.matches(&at(2025, 12, 8, 8, 1, 0)));
        assert!(!schedule.matches(&at(2025, 12, 9, 8, 0, 0)));
        assert_eq!(schedule.describe(), "every Monday at 08:00");
    }

    #[test]
    fn weekday_zero_and_seven_both_mean_sunday() {
        let sunday = at(2025, 12, 7, 10, 30, 0);
        assert!(CronSchedule::parse("30 10 * * 0").expect("cron").matches(&sunday));
        assert!(CronSchedule::parse("30 10 * * 7").expect("cron").matches(&sunday));
        assert_eq!(
            CronSchedule::parse("30 10 * * 7").expect("cron").describe(),
            "every Sunday at 10:30"
        );
    }

    #[test]
    fn steps_and_ranges_are_supported() {
        let every_five = CronSchedule::parse("*/5 * * * *").expect("step cron");
        assert!(every_five.matches(&at(2025, 12, 8, 9, 15, 0)));
        assert!(!every_five.matches(&at(2025, 12, 8, 9, 16, 0)));
        assert_eq!(every_five.describe(), "on cron `*/5 * * * *`");

        let workdays = CronSchedule::parse("0 8 * * 1-5").expect("range cron");
        assert!(workdays.matches(&at(2025, 12, 12, 8, 0, 0)));
        assert!(!workdays.matches(&at(2025, 12, 13, 8, 0, 0)));
    }

    #[test]
    fn malformed_expressions_are_rejected() {
        assert!(matches!(
            CronSchedule::parse("0 8 * *"),
            Err(ScheduleError::FieldCount(4))
        ));
        assert!(matches!(
            CronSchedule::parse("0 0 8 * * 1"),
            Err(ScheduleError::FieldCount(6))
        ));
        assert!(matches!(
            CronSchedule::parse("61 8 * * 1"),
            Err(ScheduleError::Invalid { .. })
        ));
        assert_eq!(
            CronSchedule::parse("* * * * *").expect("cron").describe(),
            "every minute"
        );
    }

    #[test]
    fn run_guard_blocks_reruns_within_a_minute() {
        let mut guard = RunGuard::default();
        let start = at(2025, 12, 8, 8, 0, 0);
        assert!(guard.allows(&start));

        guard.record(start);
        assert!(!guard.allows(&(start + Duration::seconds(30))));
        assert!(!guard.allows(&(start + Duration::seconds(60))));
        assert!(guard.allows(&(start + Duration::seconds(61))));
    }

    #[test]
    fn scheduler_checks_each_minute_once() {
        let schedule = CronSchedule::parse("* * * * *").expect("cron");
        let mut scheduler = Scheduler::new(schedule);
        let first = at(2020, 1, 6, 9, 15, 0);

        assert_eq!(scheduler.tick(first, || true), Some(true));
        assert_eq!(scheduler.tick(first + Duration::seconds(30), || true), None);
    }
}
