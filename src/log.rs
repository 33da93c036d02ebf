use std::time::SystemTime;

/// Year, month, day, hours, minutes, seconds from unix seconds
/// (accurate for 1970-2099).
fn civil_parts(secs: u64) -> (i64, i64, i64, u64, u64, u64) {
    let time_of_day = secs % 86400;
    let hours = time_of_day / 3600;
    let minutes = (time_of_day % 3600) / 60;
    let seconds = time_of_day % 60;

    let mut remaining_days = (secs / 86400) as i64;
    let mut year = 1970i64;
    loop {
        let days_in_year = if is_leap_year(year) { 366 } else { 365 };
        if remaining_days < days_in_year {
            break;
        }
        remaining_days -= days_in_year;
        year += 1;
    }

    let month_lengths: [i64; 12] = if is_leap_year(year) {
        [31, 29, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31]
    } else {
        [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31]
    };

    let mut month = 1;
    for &days in &month_lengths {
        if remaining_days < days {
            break;
        }
        remaining_days -= days;
        month += 1;
    }
    let day = remaining_days + 1;

    (year, month, day, hours, minutes, seconds)
}

/// Format the current UTC time as ISO 8601.
fn timestamp() -> String {
    let now = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default();

    let (year, month, day, hours, minutes, seconds) = civil_parts(now.as_secs());
    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}.{:03}Z",
        year,
        month,
        day,
        hours,
        minutes,
        seconds,
        now.subsec_millis()
    )
}

/// Format unix seconds as a short UTC date-time for display.
pub fn format_unix_secs(secs: i64) -> String {
    let (year, month, day, hours, minutes, _) = civil_parts(secs.max(0) as u64);
    format!(
        "{:04}-{:02}-{:02} {:02}:{:02}",
        year, month, day, hours, minutes
    )
}

fn is_leap_year(year: i64) -> bool {
    year % 4 == 0 && (year % 100 != 0 || year % 400 == 0)
}

/// Get current timestamp string (used by macros)
pub fn now() -> String {
    timestamp()
}


#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        eprintln!("[{}] [INFO] {}", $crate::log::now(), format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        eprintln!("[{}] [DEBUG] {}", $crate::log::now(), format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        eprintln!("[{}] [ERROR] {}", $crate::log::now(), format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        eprintln!("[{}] [WARN] {}", $crate::log::now(), format!($($arg)*))
    };
}
