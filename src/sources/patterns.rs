//! Tolerant text extraction over the site's HTML.
//!
//! There is no DOM here; the patterns accept attribute quoting, whitespace and
//! nested inline tags around the numbers.

use std::sync::LazyLock;

use regex::Regex;

use super::FetchRequest;
use crate::core::{
    Counts,
    FetchError,
    ParseType,
    StatPayload,
};

pub trait PageParser: Send + Sync {
    fn parse(&self, request: &FetchRequest, html: &str) -> Result<StatPayload, FetchError>;
}

static OWNERS_COUNT: LazyLock<Regex> = LazyLock::new(|| counter_pattern("owners-count"));
static OWNERS_NEED: LazyLock<Regex> = LazyLock::new(|| counter_pattern("owners-need"));
static OWNERS_TRADE: LazyLock<Regex> = LazyLock::new(|| counter_pattern("owners-trade"));
static CARDS_CONTAINER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)class\s*=\s*["'][^"']*\banime-cards\b"#).unwrap());

fn counter_pattern(id: &str) -> Regex {
    Regex::new(&format!(
        r#"(?is)id\s*=\s*["']?{}["']?[^>]*>(?:\s|<[a-z][^>]*>)*([0-9][0-9\s,.\x{{a0}}]*)"#,
        regex::escape(id)
    ))
    .unwrap()
}

fn extract_number(re: &Regex, html: &str) -> Option<u32> {
    let digits: String = re.captures(html)?.get(1)?.as_str().chars().filter(char::is_ascii_digit).collect();
    digits.parse().ok()
}

fn parse_counts(html: &str) -> Result<Counts, FetchError> {
    let Some(owner) = extract_number(&OWNERS_COUNT, html) else {
        return Err(FetchError::NotFound("Card not found".to_string()));
    };

    Ok(Counts {
        owner,
        need: extract_number(&OWNERS_NEED, html).unwrap_or(0),
        trade: extract_number(&OWNERS_TRADE, html).unwrap_or(0),
    })
}

fn parse_duplicates(request: &FetchRequest, html: &str) -> Result<u32, FetchError> {
    if !CARDS_CONTAINER.is_match(html) {
        return Err(FetchError::NotFound("User cards not found".to_string()));
    }

    let item = Regex::new(&format!(
        r#"(?i)data-card-id\s*=\s*["']?{}(?:["'\s/>])"#,
        regex::escape(request.card_id.as_str())
    ))
    .map_err(|e| FetchError::Parse(e.to_string()))?;

    Ok(item.find_iter(html).count() as u32)
}

/// Default parser for the card users page and the user inventory page.
#[derive(Debug, Default, Clone, Copy)]
pub struct PatternParser;

impl PageParser for PatternParser {
    fn parse(&self, request: &FetchRequest, html: &str) -> Result<StatPayload, FetchError> {
        match request.parse_type {
            ParseType::Counts | ParseType::Unlocked => Ok(StatPayload::Counts(parse_counts(html)?)),
            ParseType::Duplicates => {
                Ok(StatPayload::Duplicates { duplicates: parse_duplicates(request, html)? })
            }
            other => Err(FetchError::Unsupported(other.to_string())),
        }
    }
}
