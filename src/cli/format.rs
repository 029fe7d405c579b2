use chrono::{DateTime, Local, SecondsFormat, Utc};

const NANOS_PER_SEC: u64 = 1_000_000_000;

pub fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.1} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

/// `ls`-style permission string for a regular file, e.g. `-rwsr-xr-x`.
/// Setuid, setgid and sticky show as `s`/`S` and `t`/`T`.
pub fn format_mode(mode: u32) -> String {
    let special = [(0o4000, 's', 'S'), (0o2000, 's', 'S'), (0o1000, 't', 'T')];
    let mut out = String::with_capacity(10);
    out.push('-');
    for (shift, (flag, set, unset)) in [6u32, 3, 0].into_iter().zip(special) {
        let bits = (mode >> shift) & 0o7;
        out.push(if bits & 0o4 != 0 { 'r' } else { '-' });
        out.push(if bits & 0o2 != 0 { 'w' } else { '-' });
        out.push(match (mode & flag != 0, bits & 0o1 != 0) {
            (true, true) => set,
            (true, false) => unset,
            (false, true) => 'x',
            (false, false) => '-',
        });
    }
    out
}

fn timestamp(nanos: u64) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp((nanos / NANOS_PER_SEC) as i64, (nanos % NANOS_PER_SEC) as u32)
}

/// Local time to the second, for listings
pub fn format_time(nanos: u64) -> String {
    match timestamp(nanos) {
        Some(time) => time.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string(),
        None => nanos.to_string(),
    }
}

/// Local time with full precision and offset
pub fn format_time_precise(nanos: u64) -> String {
    match timestamp(nanos) {
        Some(time) => time
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M:%S%.9f %z")
            .to_string(),
        None => nanos.to_string(),
    }
}

/// RFC 3339 in UTC, for machine-readable output
pub fn format_time_rfc3339(nanos: u64) -> String {
    match timestamp(nanos) {
        Some(time) => time.to_rfc3339_opts(SecondsFormat::Nanos, true),
        None => nanos.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(500), "500 B");
        assert_eq!(format_size(1024), "1.0 KB");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(1048576), "1.0 MB");
    }

    #[test]
    fn test_format_mode() {
        assert_eq!(format_mode(0o644), "-rw-r--r--");
        assert_eq!(format_mode(0o755), "-rwxr-xr-x");
        assert_eq!(format_mode(0o600), "-rw-------");
        assert_eq!(format_mode(0), "----------");
        assert_eq!(format_mode(0o4755), "-rwsr-xr-x");
        assert_eq!(format_mode(0o2644), "-rw-r-Sr--");
        assert_eq!(format_mode(0o1777), "-rwxrwxrwt");
    }

    #[test]
    fn test_format_time_rfc3339() {
        assert_eq!(
            format_time_rfc3339(1_700_000_000_123_456_789),
            "2023-11-14T22:13:20.123456789Z"
        );
        assert_eq!(format_time_rfc3339(0), "1970-01-01T00:00:00.000000000Z");
    }
}
