/// Format whole seconds as an HH:MM:SS timestamp. Hours grow past two digits when needed.
pub fn format_timestamp(seconds: u64) -> String {
    let hours = seconds / 3600;
    let mins = (seconds % 3600) / 60;
    let secs = seconds % 60;
    format!("{:02}:{:02}:{:02}", hours, mins, secs)
}

/// Parse an HH:MM:SS timestamp back into whole seconds
pub fn parse_timestamp(timestamp: &str) -> Option<u64> {
    let mut parts = timestamp.split(':');
    let hours: u64 = parts.next()?.parse().ok()?;
    let mins: u64 = parts.next()?.parse().ok()?;
    let secs: u64 = parts.next()?.parse().ok()?;

    if parts.next().is_some() || mins > 59 || secs > 59 {
        return None;
    }

    hours.checked_mul(3600)?.checked_add(mins * 60 + secs)
}
