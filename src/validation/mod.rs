use crate::error::CandidateError;
use crate::models::Candidate;
use lazy_static::lazy_static;
use regex::Regex;

pub const MAX_VOTES: u64 = 1_000_000;
pub const MAX_FIELD_LEN: usize = 100;
// Upper bound on votes bought in a single submission
pub const MAX_VOTES_PER_SUBMISSION: u64 = 100_000;

lazy_static! {
    static ref NON_DIGIT: Regex = Regex::new(r"\D").unwrap();
    static ref LOCAL_MOBILE: Regex = Regex::new(r"^[0-9]{9}$").unwrap();
    static ref WHITESPACE_RUN: Regex = Regex::new(r"\s+").unwrap();
}

/// Escape the characters that matter in an HTML rendering context.
pub fn sanitize_input(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            '/' => escaped.push_str("&#x2F;"),
            other => escaped.push(other),
        }
    }
    escaped
}

// Local mobile numbers are nine digits once separators are stripped
pub fn validate_phone_number(text: &str) -> bool {
    let digits = NON_DIGIT.replace_all(text, "");
    LOCAL_MOBILE.is_match(&digits)
}

pub fn slugify(text: &str) -> String {
    WHITESPACE_RUN
        .replace_all(text.trim(), "-")
        .to_lowercase()
}

fn check_text(field: &str, value: &str) -> Result<(), CandidateError> {
    if value.trim().is_empty() {
        return Err(CandidateError::Validation(format!("{field} is required")));
    }
    if value.chars().count() > MAX_FIELD_LEN {
        return Err(CandidateError::Validation(format!(
            "{field} must be at most {MAX_FIELD_LEN} characters"
        )));
    }
    Ok(())
}

/// Shape check run before any create or update is written.
pub fn validate_candidate_data(candidate: &Candidate) -> Result<(), CandidateError> {
    check_text("name", &candidate.name)?;
    if candidate.category.is_missing() {
        return Err(CandidateError::Validation("category is required".into()));
    }
    check_text("category", candidate.category.key())?;
    if candidate.image.trim().is_empty() {
        return Err(CandidateError::Validation("image is required".into()));
    }
    if candidate.votes > MAX_VOTES {
        return Err(CandidateError::Validation(format!(
            "votes must be between 0 and {MAX_VOTES}"
        )));
    }
    if candidate.percentage > 100 {
        return Err(CandidateError::Validation(
            "percentage must be between 0 and 100".into(),
        ));
    }
    Ok(())
}

/// Vote counter supplied by an admin write. Negative or oversized values are
/// rejected rather than clamped.
pub fn checked_votes(votes: i64) -> Result<u64, CandidateError> {
    match u64::try_from(votes) {
        Ok(votes) if votes <= MAX_VOTES => Ok(votes),
        _ => Err(CandidateError::Validation(format!(
            "votes must be between 0 and {MAX_VOTES}"
        ))),
    }
}

pub fn validate_vote_count(count: u64) -> Result<(), CandidateError> {
    if count == 0 || count > MAX_VOTES_PER_SUBMISSION {
        return Err(CandidateError::Validation(format!(
            "vote count must be between 1 and {MAX_VOTES_PER_SUBMISSION}"
        )));
    }
    Ok(())
}
