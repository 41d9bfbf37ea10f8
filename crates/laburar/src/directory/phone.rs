//! WhatsApp-compatible phone validation and contact deep links.
//!
//! Numbers are accepted in the Argentine mobile formats people actually type: with or without
//! the `+54` country code, with the `9` mobile indicator, with the `15` trunk prefix, or as a bare
//! local number. Separators (spaces, hyphens, parentheses) are ignored.

use once_cell::sync::Lazy;
use regex::Regex;
use url::form_urlencoded;

use super::domain::DEFAULT_CONTACT_MESSAGE;

pub const MIN_PHONE_LENGTH: usize = 10;
pub const MAX_PHONE_LENGTH: usize = 15;

const VALID_EXAMPLES: &str = "+5491134567890, +549341234567, 1134567890, 15XXXXXXXX";

const WHATSAPP_BASE: &str = "https://wa.me/";

static ACCEPTED_FORMATS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"^\+549[0-9]{10}$",
        r"^549[0-9]{10}$",
        r"^\+54911[0-9]{8}$",
        r"^54911[0-9]{8}$",
        r"^\+54[0-9]{2}15[0-9]{8}$",
        r"^[0-9]{2}15[0-9]{8}$",
        r"^15[0-9]{8}$",
        r"^9[0-9]{10}$",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("phone pattern compiles"))
    .collect()
});

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PhoneError {
    #[error("invalid WhatsApp phone format: expected 10 to 15 characters, found {length}; valid examples: {}", VALID_EXAMPLES)]
    Length { length: usize },
    #[error("invalid WhatsApp phone format; valid examples: {}", VALID_EXAMPLES)]
    UnrecognizedFormat,
}

/// A phone number that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhoneNumber {
    raw: String,
    cleaned: String,
}

impl PhoneNumber {
    pub fn parse(raw: &str) -> Result<Self, PhoneError> {
        let cleaned = clean(raw);

        let length = cleaned.chars().count();
        if !(MIN_PHONE_LENGTH..=MAX_PHONE_LENGTH).contains(&length) {
            return Err(PhoneError::Length { length });
        }

        if !ACCEPTED_FORMATS.iter().any(|format| format.is_match(&cleaned)) {
            return Err(PhoneError::UnrecognizedFormat);
        }

        Ok(Self {
            raw: raw.to_string(),
            cleaned,
        })
    }

    /// The number exactly as entered.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Separators removed, leading `+` kept.
    pub fn cleaned(&self) -> &str {
        &self.cleaned
    }

    pub fn digits(&self) -> String {
        self.cleaned.chars().filter(char::is_ascii_digit).collect()
    }

    /// `https://wa.me/<digits>?text=<message>`, falling back to the default greeting.
    pub fn whatsapp_link(&self, message: Option<&str>) -> String {
        let message = message
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .unwrap_or(DEFAULT_CONTACT_MESSAGE);

        // Spaces go out as %20; a literal '+' is already escaped as %2B.
        let text = form_urlencoded::byte_serialize(message.as_bytes())
            .collect::<String>()
            .replace('+', "%20");
        format!("{WHATSAPP_BASE}{}?text={text}", self.digits())
    }

    pub fn tel_link(&self) -> String {
        format!("tel:{}", self.cleaned)
    }
}

/// Strip whitespace, hyphens and parentheses.
pub fn clean(raw: &str) -> String {
    raw.chars()
        .filter(|ch| !(ch.is_whitespace() || matches!(ch, '-' | '(' | ')')))
        .collect()
}

pub fn is_valid(raw: &str) -> bool {
    PhoneNumber::parse(raw).is_ok()
}

/// Contact targets rendered on a listing's detail view.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ContactLinks {
    pub whatsapp: String,
    pub tel: String,
}

impl ContactLinks {
    pub fn for_phone(phone: &PhoneNumber, message: Option<&str>) -> Self {
        Self {
            whatsapp: phone.whatsapp_link(message),
            tel: phone.tel_link(),
        }
    }
}
