use jiff::SpanRelativeTo;

pub fn parse_duration(input: &str) -> Result<jiff::SignedDuration, String> {
    if let Ok(duration) = input.parse::<jiff::SignedDuration>() {
        return Ok(duration);
    }

    if let Ok(duration) = input
        .parse::<jiff::Span>()
        .and_then(|span| span.to_duration(SpanRelativeTo::days_are_24_hours()))
    {
        return Ok(duration);
    }

    if let Ok(seconds) = input.parse::<i64>() {
        return Ok(jiff::SignedDuration::from_secs(seconds.abs()));
    }

    Err(String::from("Invalid duration"))
}

pub fn parse_date(input: &str) -> Result<jiff::civil::Date, String> {
    input
        .parse::<jiff::civil::Date>()
        .map_err(|error| format!("Invalid date: {error}"))
}

#[cfg(test)]
mod tests {
    use jiff::SignedDuration;

    use super::*;

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("PT1M30S"), Ok(SignedDuration::from_secs(90)));
        assert_eq!(parse_duration("5m"), Ok(SignedDuration::from_mins(5)));
        assert_eq!(parse_duration("45"), Ok(SignedDuration::from_secs(45)));
        assert!(parse_duration("soon").is_err());
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(parse_date("2025-03-14"), Ok(jiff::civil::date(2025, 3, 14)));
        assert!(parse_date("14/03/2025").is_err());
    }
}
