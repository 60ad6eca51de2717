//! Query classification
//!
//! A lookup query is classified once, up front, as an email address, a phone
//! number, or a username. Classification is pure and total: every string maps
//! to exactly one [`QueryType`].

use crate::{Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Longest query accepted after trimming
pub const MAX_QUERY_LEN: usize = 256;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"));

static PHONE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+?[1-9]\d{5,15}$").expect("valid phone regex"));

/// Kind of identity being looked up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryType {
    Email,
    Phone,
    Username,
}

impl QueryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryType::Email => "email",
            QueryType::Phone => "phone",
            QueryType::Username => "username",
        }
    }
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueryType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "email" => Ok(QueryType::Email),
            "phone" => Ok(QueryType::Phone),
            "username" => Ok(QueryType::Username),
            other => Err(Error::InvalidQuery(format!("unknown query type '{}'", other))),
        }
    }
}

/// Strip the separators people type inside phone numbers
pub fn strip_phone_separators(value: &str) -> String {
    value
        .chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, '-' | '(' | ')'))
        .collect()
}

/// Classify a (trimmed) query value
pub fn classify(value: &str) -> QueryType {
    if EMAIL_RE.is_match(value) {
        QueryType::Email
    } else if PHONE_RE.is_match(&strip_phone_separators(value)) {
        QueryType::Phone
    } else {
        QueryType::Username
    }
}

/// A classified lookup query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    pub raw_value: String,
    pub query_type: QueryType,
}

impl Query {
    /// Trim, validate and classify raw user input
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidQuery("query is empty".to_string()));
        }
        if trimmed.chars().count() > MAX_QUERY_LEN {
            return Err(Error::InvalidQuery(format!(
                "query exceeds {} characters",
                MAX_QUERY_LEN
            )));
        }

        Ok(Self {
            raw_value: trimmed.to_string(),
            query_type: classify(trimmed),
        })
    }

    /// Phone number reduced to characters usable as a username
    pub fn username_form(&self) -> String {
        self.raw_value
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '+')
            .collect()
    }
}
