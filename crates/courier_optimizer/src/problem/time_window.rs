use jiff::{SignedDuration, Timestamp};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::utils::time::positive;

#[derive(Deserialize, Serialize, JsonSchema, Debug, Clone, Copy, Default, PartialEq)]
pub struct TimeWindow {
    start: Option<Timestamp>,
    end: Option<Timestamp>,
}

impl TimeWindow {
    pub fn new(start: Option<Timestamp>, end: Option<Timestamp>) -> Self {
        TimeWindow { start, end }
    }

    pub fn between(start: Timestamp, end: Timestamp) -> Self {
        TimeWindow {
            start: Some(start),
            end: Some(end),
        }
    }

    pub fn parse(start: Option<&str>, end: Option<&str>) -> Result<Self, jiff::Error> {
        Ok(TimeWindow {
            start: start.map(str::parse).transpose()?,
            end: end.map(str::parse).transpose()?,
        })
    }

    pub fn start(&self) -> Option<Timestamp> {
        self.start
    }

    pub fn end(&self) -> Option<Timestamp> {
        self.end
    }

    pub fn is_empty(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    pub fn is_satisfied(&self, arrival: Timestamp) -> bool {
        match self.end {
            Some(end) => arrival <= end,
            None => true,
        }
    }

    /// Service cannot begin before the window opens.
    pub fn service_start(&self, arrival: Timestamp) -> Timestamp {
        match self.start {
            Some(start) if arrival < start => start,
            _ => arrival,
        }
    }

    pub fn lateness(&self, arrival: Timestamp) -> SignedDuration {
        match self.end {
            Some(end) => positive(arrival.duration_since(end)),
            None => SignedDuration::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        let time_window =
            TimeWindow::parse(Some("2025-06-10T08:00:00Z"), Some("2025-06-10T10:00:00Z")).unwrap();

        let start: Timestamp = "2025-06-10T08:00:00Z".parse().unwrap();
        let end: Timestamp = "2025-06-10T10:00:00Z".parse().unwrap();

        assert_eq!(time_window.start(), Some(start));
        assert_eq!(time_window.end(), Some(end));
        assert!(TimeWindow::parse(Some("not a date"), None).is_err());
    }

    #[test]
    fn test_lateness_and_waiting() {
        let start: Timestamp = "2025-06-10T08:00:00Z".parse().unwrap();
        let end: Timestamp = "2025-06-10T10:00:00Z".parse().unwrap();
        let time_window = TimeWindow::between(start, end);

        let early = start - SignedDuration::from_mins(30);
        assert_eq!(time_window.service_start(early), start);
        assert_eq!(time_window.lateness(early), SignedDuration::ZERO);

        let late = end + SignedDuration::from_mins(15);
        assert!(!time_window.is_satisfied(late));
        assert_eq!(time_window.lateness(late), SignedDuration::from_mins(15));
        assert_eq!(time_window.service_start(late), late);
    }

    #[test]
    fn test_open_window() {
        let time_window = TimeWindow::default();
        let arrival: Timestamp = "2025-06-10T23:00:00Z".parse().unwrap();

        assert!(time_window.is_empty());
        assert!(time_window.is_satisfied(arrival));
        assert_eq!(time_window.lateness(arrival), SignedDuration::ZERO);
    }
}
