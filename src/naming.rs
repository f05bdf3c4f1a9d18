/// Display title for a tracker name: separators become spaces, each word is
/// title-cased, and a fixed suffix is appended. Same input, same title.
pub fn tracker_title(name: &str) -> String {
    let spaced = name.replace(['_', '-'], " ");
    let mut title = String::with_capacity(spaced.len() + 8);
    for (i, word) in spaced.split_whitespace().enumerate() {
        if i > 0 {
            title.push(' ');
        }
        let mut chars = word.chars();
        if let Some(first) = chars.next() {
            title.extend(first.to_uppercase());
            for c in chars {
                title.extend(c.to_lowercase());
            }
        }
    }
    title.push_str(" Tracker");
    title
}

/// Store filename for a tracker.
pub fn store_filename(name: &str) -> String {
    format!("{name}.csv")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_word() {
        assert_eq!(tracker_title("mood"), "Mood Tracker");
    }

    #[test]
    fn test_underscores_become_spaces() {
        assert_eq!(tracker_title("sleep_quality"), "Sleep Quality Tracker");
    }

    #[test]
    fn test_hyphens_become_spaces() {
        assert_eq!(tracker_title("daily-steps"), "Daily Steps Tracker");
    }

    #[test]
    fn test_mixed_case_is_normalized() {
        assert_eq!(tracker_title("DAILY_mood"), "Daily Mood Tracker");
    }

    #[test]
    fn test_title_is_idempotent_per_name() {
        assert_eq!(tracker_title("water_intake"), tracker_title("water_intake"));
    }

    #[test]
    fn test_store_filename() {
        assert_eq!(store_filename("mood"), "mood.csv");
        assert_eq!(store_filename("sleep_quality"), "sleep_quality.csv");
    }
}
