#[cfg(test)]
mod cron_utils_tests {
    use planner_dispatcher::cron_utils::*;

    use chrono::{Duration, TimeZone, Timelike, Utc};

    #[test]
    fn test_cron_scheduler_creation() {
        assert!(CronScheduler::new("0 0 0 * * *").is_ok());
        assert!(CronScheduler::new("invalid").is_err());
        assert!(CronScheduler::with_timezone("0 0 4 * * *", "Europe/Paris").is_ok());
        assert!(CronScheduler::with_timezone("0 0 4 * * *", "Mars/Olympus").is_err());
    }

    #[test]
    fn test_five_field_expressions_are_normalized() {
        assert_eq!(CronScheduler::normalize_expression("0 4 * * *"), "0 0 4 * * *");
        assert_eq!(
            CronScheduler::normalize_expression("0 0 4 * * *"),
            "0 0 4 * * *"
        );

        let scheduler = CronScheduler::new("30 9 * * *").unwrap();
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap();
        let next = scheduler.next_execution_time(now).unwrap();
        assert_eq!((next.hour(), next.minute(), next.second()), (9, 30, 0));
    }

    #[test]
    fn test_validate_cron_expression() {
        assert!(CronScheduler::validate_cron_expression("0 0 0 * * *").is_ok());
        assert!(CronScheduler::validate_cron_expression("0 */5 * * * *").is_ok());
        assert!(CronScheduler::validate_cron_expression("0 0 9-17 * * 1-5").is_ok());
        assert!(CronScheduler::validate_cron_expression("invalid").is_err());
        assert!(CronScheduler::validate_cron_expression("0 0 0 32 * *").is_err());
        assert!(CronScheduler::validate_cron_expression("").is_err());
    }

    #[test]
    fn test_timezone_is_applied() {
        // 巴黎冬令时 UTC+1
        let scheduler = CronScheduler::with_timezone("0 0 4 * * *", "Europe/Paris").unwrap();
        let now = Utc.with_ymd_and_hms(2024, 1, 10, 12, 0, 0).unwrap();
        let next = scheduler.next_execution_time(now).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 1, 11, 3, 0, 0).unwrap());

        // 夏令时 UTC+2
        let now = Utc.with_ymd_and_hms(2024, 7, 10, 12, 0, 0).unwrap();
        let next = scheduler.next_execution_time(now).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 7, 11, 2, 0, 0).unwrap());
    }

    #[test]
    fn test_upcoming_times() {
        let scheduler = CronScheduler::new("0 0 * * * *").unwrap();
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 30, 0).unwrap();
        let upcoming = scheduler.upcoming_times(now, 3);

        assert_eq!(upcoming.len(), 3);
        assert_eq!(upcoming[0].hour(), 13);
        assert_eq!(upcoming[1].hour(), 14);
        assert_eq!(upcoming[2].hour(), 15);
    }

    #[test]
    fn test_firings_between_is_left_open_right_closed() {
        let scheduler = CronScheduler::new("0 */15 * * * *").unwrap();
        let after = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let until = Utc.with_ymd_and_hms(2024, 1, 1, 12, 45, 0).unwrap();

        let firings = scheduler.firings_between(after, until);
        assert_eq!(firings.len(), 3);
        assert_eq!(firings[0].minute(), 15);
        assert_eq!(firings[2], until);

        assert!(scheduler.firings_between(after, after).is_empty());
    }

    #[test]
    fn test_expected_runs_per_day() {
        let cases = [
            ("0 0 4 * * *", 1),
            ("0 4 * * *", 1),
            ("0 0 */2 * * *", 12),
            ("0 * * * * *", 1440),
            ("*/30 * * * * *", 2880),
            ("0 0,30 9-17 * * *", 18),
        ];
        for (expr, expected) in cases {
            let scheduler = CronScheduler::new(expr).unwrap();
            assert_eq!(scheduler.expected_runs_per_day(), expected, "{expr}");
        }
    }

    #[test]
    fn test_time_until_next_execution() {
        let scheduler = CronScheduler::new("0 0 * * * *").unwrap();
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 45, 0).unwrap();
        assert_eq!(
            scheduler.time_until_next_execution(now),
            Some(Duration::minutes(15))
        );
    }
}
