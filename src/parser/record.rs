use std::fmt;

use serde::Serialize;

/// One programme instance recovered from a schedule page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProgrammeRecord {
    pub date: String,
    pub time: String,
    pub pid: String,
    pub title: String,
    pub subtitle: String,
    pub repeat: bool,
}

impl ProgrammeRecord {
    /// Append one subtitle fragment. Fragments ending in a comma keep a
    /// space after it, otherwise fragments are glued together.
    pub fn push_subtitle(&mut self, fragment: &str) {
        let fragment = fragment.trim_matches(|c| matches!(c, ' ' | '\t' | '\n' | '\r'));
        self.subtitle.push_str(fragment);
        if fragment.ends_with(',') {
            self.subtitle.push(' ');
        }
    }
}

/// `2024/01/02-18:00 abc123 "News - Evening" (R)`
impl fmt::Display for ProgrammeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{} {} ", self.date, self.time, self.pid)?;
        match (self.subtitle.is_empty(), self.repeat) {
            (true, false) => write!(f, "\"{}\"", self.title),
            (false, false) => write!(f, "\"{} - {}\"", self.title, self.subtitle),
            (true, true) => write!(f, "\"{}\" (R)", self.title),
            (false, true) => write!(f, "\"{} - {}\" (R)", self.title, self.subtitle),
        }
    }
}

/// Normalize a machine-readable timestamp (`2017-04-14T06:00:00+01:00`) to
/// the `YYYY/MM/DD` form used for page dates.
pub fn schedule_date(value: &str) -> String {
    value
        .chars()
        .take(10)
        .map(|c| if c == '-' { '/' } else { c })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn news(subtitle: &str, repeat: bool) -> ProgrammeRecord {
        ProgrammeRecord {
            date: "2024/01/02".into(),
            time: "18:00".into(),
            pid: "abc123".into(),
            title: "News".into(),
            subtitle: subtitle.into(),
            repeat,
        }
    }

    #[test]
    fn formatting_matrix() {
        assert_eq!(news("", false).to_string(), r#"2024/01/02-18:00 abc123 "News""#);
        assert_eq!(
            news("Evening", false).to_string(),
            r#"2024/01/02-18:00 abc123 "News - Evening""#
        );
        assert_eq!(news("", true).to_string(), r#"2024/01/02-18:00 abc123 "News" (R)"#);
        assert_eq!(
            news("Evening", true).to_string(),
            r#"2024/01/02-18:00 abc123 "News - Evening" (R)"#
        );
    }

    #[test]
    fn no_trailing_whitespace() {
        for (sub, repeat) in [("", false), ("Evening", false), ("", true), ("Evening", true)] {
            let line = news(sub, repeat).to_string();
            assert_eq!(line, line.trim_end());
        }
    }

    #[test]
    fn subtitle_comma_join() {
        let mut r = ProgrammeRecord::default();
        r.push_subtitle("\n    Part One,\n");
        r.push_subtitle("  Episode 2 ");
        assert_eq!(r.subtitle, "Part One, Episode 2");
    }

    #[test]
    fn subtitle_plain_join() {
        let mut r = ProgrammeRecord::default();
        r.push_subtitle("Foo");
        r.push_subtitle("Bar");
        assert_eq!(r.subtitle, "FooBar");
    }

    #[test]
    fn subtitle_whitespace_fragment_is_noop() {
        let mut r = ProgrammeRecord::default();
        r.push_subtitle("Foo");
        r.push_subtitle("\n\t ");
        assert_eq!(r.subtitle, "Foo");
    }

    #[test]
    fn date_from_timestamp() {
        assert_eq!(schedule_date("2017-04-14T06:00:00+01:00"), "2017/04/14");
        assert_eq!(schedule_date("2017-04"), "2017/04");
    }
}
