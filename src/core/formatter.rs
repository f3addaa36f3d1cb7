use crate::core::models::usage::{DayLabel, MonthLabel};

/// Returns "999", "1.5K", "2.3M", "1.1B".
pub fn format_token_count(count: u64) -> String {
    if count >= 1_000_000_000 {
        format!("{:.1}B", count as f64 / 1_000_000_000.0)
    } else if count >= 1_000_000 {
        format!("{:.1}M", count as f64 / 1_000_000.0)
    } else if count >= 1_000 {
        format!("{:.1}K", count as f64 / 1_000.0)
    } else {
        format!("{}", count)
    }
}

/// English ordinal suffix: 1st, 2nd, 3rd, 4th, 11th, 12th, 13th, 21st.
pub fn ordinal(day: u32) -> String {
    let suffix = match (day % 10, day % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{}{}", day, suffix)
}

/// Returns "Yesterday" or "15th June".
pub fn format_day_label(label: &DayLabel) -> String {
    if label.is_yesterday {
        "Yesterday".to_string()
    } else {
        format!("{} {}", ordinal(label.ordinal_day), label.month_name)
    }
}

/// Returns "June 2025".
pub fn format_month_label(label: &MonthLabel) -> String {
    format!("{} {}", label.month_name, label.year)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn format_token_count_abbreviates() {
        assert_eq!(format_token_count(0), "0");
        assert_eq!(format_token_count(999), "999");
        assert_eq!(format_token_count(1_500), "1.5K");
        assert_eq!(format_token_count(2_340_000), "2.3M");
        assert_eq!(format_token_count(1_100_000_000), "1.1B");
    }

    #[test]
    fn ordinal_handles_teens() {
        assert_eq!(ordinal(1), "1st");
        assert_eq!(ordinal(2), "2nd");
        assert_eq!(ordinal(3), "3rd");
        assert_eq!(ordinal(4), "4th");
        assert_eq!(ordinal(11), "11th");
        assert_eq!(ordinal(12), "12th");
        assert_eq!(ordinal(13), "13th");
        assert_eq!(ordinal(21), "21st");
        assert_eq!(ordinal(22), "22nd");
        assert_eq!(ordinal(31), "31st");
    }

    #[test]
    fn day_labels() {
        let date = NaiveDate::from_ymd_opt(2025, 6, 15).unwrap();
        assert_eq!(format_day_label(&DayLabel::new(date, true)), "Yesterday");
        assert_eq!(format_day_label(&DayLabel::new(date, false)), "15th June");
    }

    #[test]
    fn month_label() {
        let date = NaiveDate::from_ymd_opt(2025, 6, 15).unwrap();
        assert_eq!(format_month_label(&MonthLabel::new(date)), "June 2025");
    }
}
