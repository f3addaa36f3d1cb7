use chrono::{DateTime, FixedOffset};
use serde::Deserialize;

use crate::core::models::tokens::TokenTotals;

// ── Wire shapes ───────────────────────────────────────────────────────

#[derive(Deserialize)]
struct LogLine {
    #[serde(rename = "type")]
    line_type: Option<String>,
    timestamp: Option<String>,
    payload: Option<LogPayload>,
}

#[derive(Deserialize)]
struct LogPayload {
    #[serde(rename = "type")]
    payload_type: Option<String>,
    info: Option<TokenCountInfo>,
}

#[derive(Deserialize)]
struct TokenCountInfo {
    total_token_usage: Option<UsageShape>,
    last_token_usage: Option<UsageShape>,
}

/// One `*_token_usage` object. Counts are signed on the wire so a stray
/// negative value clamps to zero instead of rejecting the line.
#[derive(Debug, Default, Deserialize)]
pub struct UsageShape {
    input_tokens: Option<i64>,
    cached_input_tokens: Option<i64>,
    /// Older logs used this name for the cached input count.
    cache_read_input_tokens: Option<i64>,
    output_tokens: Option<i64>,
    reasoning_output_tokens: Option<i64>,
    total_tokens: Option<i64>,
}

impl UsageShape {
    pub fn totals(&self) -> TokenTotals {
        let count = |v: Option<i64>| v.unwrap_or(0).max(0) as u64;
        TokenTotals {
            input_tokens: count(self.input_tokens),
            cached_input_tokens: count(self.cached_input_tokens.or(self.cache_read_input_tokens)),
            output_tokens: count(self.output_tokens),
            reasoning_output_tokens: count(self.reasoning_output_tokens),
            total_tokens: count(self.total_tokens),
        }
    }
}

// ── Decoded line ──────────────────────────────────────────────────────

/// Why a line did not produce a token-count event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Blank,
    Malformed,
    NotEventMessage,
    NotTokenCount,
    MissingTimestamp,
    InvalidTimestamp,
    MissingUsage,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DecodedLine {
    TokenCount(TokenCountEvent),
    Skip(SkipReason),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TokenCountEvent {
    /// Timestamp exactly as written, used for dedup.
    pub timestamp: String,
    pub at: DateTime<FixedOffset>,
    pub last_usage: Option<TokenTotals>,
    pub total_usage: Option<TokenTotals>,
}

/// (timestamp, snapshot) pair identifying a resent event within one file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EventSignature {
    pub timestamp: String,
    pub totals: TokenTotals,
}

impl TokenCountEvent {
    pub fn signature(&self) -> EventSignature {
        EventSignature {
            timestamp: self.timestamp.clone(),
            totals: self
                .last_usage
                .or(self.total_usage)
                .unwrap_or_default(),
        }
    }

    /// Turn this event into a usage delta.
    ///
    /// `last_usage` is already incremental and wins when present. Otherwise
    /// the cumulative `total_usage` is diffed against `previous_total`; with no
    /// previous snapshot the event only becomes the baseline. Either way a
    /// cumulative snapshot on the event replaces `previous_total`.
    pub fn take_delta(&self, previous_total: &mut Option<TokenTotals>) -> Option<TokenTotals> {
        let raw = match (self.last_usage, self.total_usage) {
            (Some(last), total) => {
                if total.is_some() {
                    *previous_total = total;
                }
                Some(last)
            }
            (None, Some(total)) => previous_total
                .replace(total)
                .map(|previous| total.delta_since(previous)),
            (None, None) => None,
        };
        raw.map(TokenTotals::normalized).filter(|delta| !delta.is_zero())
    }
}

/// Fast ASCII check before paying for a JSON parse.
fn is_token_count_candidate(line: &str) -> bool {
    line.contains("\"token_count\"")
}

pub fn decode_line(line: &str) -> DecodedLine {
    let line = line.trim();
    if line.is_empty() {
        return DecodedLine::Skip(SkipReason::Blank);
    }
    if !is_token_count_candidate(line) {
        return DecodedLine::Skip(SkipReason::NotTokenCount);
    }

    let parsed: LogLine = match serde_json::from_str(line) {
        Ok(p) => p,
        Err(_) => return DecodedLine::Skip(SkipReason::Malformed),
    };

    if parsed.line_type.as_deref() != Some("event_msg") {
        return DecodedLine::Skip(SkipReason::NotEventMessage);
    }
    let payload = match parsed.payload {
        Some(p) if p.payload_type.as_deref() == Some("token_count") => p,
        _ => return DecodedLine::Skip(SkipReason::NotTokenCount),
    };

    let timestamp = match parsed.timestamp {
        Some(ts) => ts,
        None => return DecodedLine::Skip(SkipReason::MissingTimestamp),
    };
    let at = match DateTime::parse_from_rfc3339(&timestamp) {
        Ok(at) => at,
        Err(_) => return DecodedLine::Skip(SkipReason::InvalidTimestamp),
    };

    let Some(info) = payload.info else {
        return DecodedLine::Skip(SkipReason::MissingUsage);
    };
    let last_usage = info.last_token_usage.as_ref().map(UsageShape::totals);
    let total_usage = info.total_token_usage.as_ref().map(UsageShape::totals);
    if last_usage.is_none() && total_usage.is_none() {
        return DecodedLine::Skip(SkipReason::MissingUsage);
    }

    DecodedLine::TokenCount(TokenCountEvent {
        timestamp,
        at,
        last_usage,
        total_usage,
    })
}
