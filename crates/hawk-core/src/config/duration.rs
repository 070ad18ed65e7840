//! `HH:MM:SS` interval strings used for controller polling settings

use crate::{HawkError, HawkResult};
use std::time::Duration;

/// Parse an `HH:MM:SS` interval
pub fn parse_hms(value: &str) -> HawkResult<Duration> {
    let parts: Vec<&str> = value.trim().split(':').collect();
    let &[hours, minutes, seconds] = parts.as_slice() else {
        return Err(HawkError::invalid(format!(
            "interval '{value}' is not in HH:MM:SS format"
        )));
    };

    let field = |text: &str, max: u64| -> HawkResult<u64> {
        let parsed: u64 = text
            .parse()
            .map_err(|_| HawkError::invalid(format!("interval '{value}' has a non-numeric part")))?;
        if text.len() != 2 || parsed > max {
            return Err(HawkError::invalid(format!(
                "interval '{value}' is not in HH:MM:SS format"
            )));
        }
        Ok(parsed)
    };

    let total = field(hours, 23)? * 3600 + field(minutes, 59)? * 60 + field(seconds, 59)?;
    Ok(Duration::from_secs(total))
}

/// Format a duration as `HH:MM:SS`, saturating at `23:59:59`
pub fn format_hms(duration: Duration) -> String {
    let secs = duration.as_secs().min(23 * 3600 + 59 * 60 + 59);
    format!(
        "{:02}:{:02}:{:02}",
        secs / 3600,
        (secs / 60) % 60,
        secs % 60
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_format() {
        assert_eq!(parse_hms("00:05:00").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_hms("23:59:59").unwrap(), Duration::from_secs(86_399));
        assert_eq!(format_hms(Duration::from_secs(3_725)), "01:02:05");
    }

    #[test]
    fn test_rejects_malformed() {
        assert!(parse_hms("5:00").is_err());
        assert!(parse_hms("00:60:00").is_err());
        assert!(parse_hms("aa:bb:cc").is_err());
        assert!(parse_hms("0:05:00").is_err());
    }
}
