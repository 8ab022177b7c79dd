use std::fmt;

use phonenumber::{country, Mode};
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// Region assumed for numbers supplied without a country code.
pub const DEFAULT_REGION: country::Id = country::Id::US;

/// Length of a national number in the default region's numbering plan.
const DEFAULT_REGION_NATIONAL_DIGITS: usize = 10;

const KEY_SEPARATOR: char = '_';

/// Stable identifier of a participant set: sorted E.164 numbers joined with `_`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationKey(String);

impl ConversationKey {
    /// Builds a key from a bracket-delimited, comma-separated list such as
    /// `"[5551112222,5551113333]"`.
    pub fn from_participant_list(raw: &str) -> Result<Self, DomainError> {
        let inner = raw.trim().trim_matches(|ch| ch == '[' || ch == ']');
        if inner.trim().is_empty() {
            return Err(DomainError::EmptyParticipantList);
        }
        Self::from_numbers(inner.split(',').map(str::trim))
    }

    pub fn from_numbers<I, S>(numbers: I) -> Result<Self, DomainError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut normalized = numbers
            .into_iter()
            .map(|number| normalize_e164(number.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        if normalized.is_empty() {
            return Err(DomainError::EmptyParticipantList);
        }

        // Lexicographic, not numeric: the key depends on string content only.
        normalized.sort();
        Ok(Self(normalized.join(&KEY_SEPARATOR.to_string())))
    }

    /// Wraps a key read back from the store. No normalization is applied.
    pub fn from_stored(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn participants(&self) -> impl Iterator<Item = &str> {
        self.0.split(KEY_SEPARATOR)
    }
}

impl fmt::Display for ConversationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ConversationKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

pub fn normalize_e164(raw: &str) -> Result<String, DomainError> {
    let trimmed = raw.trim();
    let parsed = phonenumber::parse(Some(DEFAULT_REGION), trimmed)
        .map_err(|_| DomainError::InvalidPhoneNumber { raw: raw.to_owned() })?;

    // A leading country-code digit is only stripped from national input when
    // what remains is a full national number; "123" stays "+1123".
    if matches!(parsed.code().source(), country::Source::Number) {
        let national_digits = parsed.national().value().to_string().len();
        if national_digits != DEFAULT_REGION_NATIONAL_DIGITS {
            let digits: String = trimmed.chars().filter(char::is_ascii_digit).collect();
            return Ok(format!("+{}{digits}", parsed.code().value()));
        }
    }

    Ok(parsed.format().mode(Mode::E164).to_string())
}

/// Senders are either phone numbers or literal labels such as `"Assistant"`.
pub fn normalize_sender(raw: &str) -> String {
    normalize_e164(raw).unwrap_or_else(|_| raw.to_owned())
}
