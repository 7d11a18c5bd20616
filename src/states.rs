/// Two-letter postal abbreviation to output slug, 50 states plus DC.
///
/// Territories (PR, GU, VI, ...) are deliberately absent; rows for them are
/// dropped by the normalizer.
pub static STATES: &[(&str, &str)] = &[
    ("AL", "alabama"),
    ("AK", "alaska"),
    ("AZ", "arizona"),
    ("AR", "arkansas"),
    ("CA", "california"),
    ("CO", "colorado"),
    ("CT", "connecticut"),
    ("DE", "delaware"),
    ("FL", "florida"),
    ("GA", "georgia"),
    ("HI", "hawaii"),
    ("ID", "idaho"),
    ("IL", "illinois"),
    ("IN", "indiana"),
    ("IA", "iowa"),
    ("KS", "kansas"),
    ("KY", "kentucky"),
    ("LA", "louisiana"),
    ("ME", "maine"),
    ("MD", "maryland"),
    ("MA", "massachusetts"),
    ("MI", "michigan"),
    ("MN", "minnesota"),
    ("MS", "mississippi"),
    ("MO", "missouri"),
    ("MT", "montana"),
    ("NE", "nebraska"),
    ("NV", "nevada"),
    ("NH", "new-hampshire"),
    ("NJ", "new-jersey"),
    ("NM", "new-mexico"),
    ("NY", "new-york"),
    ("NC", "north-carolina"),
    ("ND", "north-dakota"),
    ("OH", "ohio"),
    ("OK", "oklahoma"),
    ("OR", "oregon"),
    ("PA", "pennsylvania"),
    ("RI", "rhode-island"),
    ("SC", "south-carolina"),
    ("SD", "south-dakota"),
    ("TN", "tennessee"),
    ("TX", "texas"),
    ("UT", "utah"),
    ("VT", "vermont"),
    ("VA", "virginia"),
    ("WA", "washington"),
    ("WV", "west-virginia"),
    ("WI", "wisconsin"),
    ("WY", "wyoming"),
    ("DC", "district-of-columbia"),
];

/// Looks up the slug for an exact, upper-case abbreviation.
pub fn state_slug(abbrev: &str) -> Option<&'static str> {
    STATES
        .iter()
        .find(|(code, _)| *code == abbrev)
        .map(|(_, slug)| *slug)
}

pub fn is_state_slug(slug: &str) -> bool {
    STATES.iter().any(|(_, s)| *s == slug)
}
