//! Typed form records and the single validation boundary they pass through before any
//! repository or identity call is made.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::domain::{ListingDraft, ListingPatch, CUSTOM_CATEGORY_PREFIX};
use super::phone::PhoneNumber;
use crate::auth::{PasswordCredentials, SignUpRequest};

pub const MIN_NAME_LENGTH: usize = 2;
pub const MIN_CITY_LENGTH: usize = 2;
pub const MIN_DESCRIPTION_LENGTH: usize = 50;
pub const MIN_PASSWORD_LENGTH: usize = 6;

static EMAIL_SHAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern compiles"));

/// Implemented by every form record; the only way form input becomes domain input.
pub trait FormSchema {
    type Valid;

    fn validate(&self) -> Result<Self::Valid, ValidationErrors>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

/// Per-field failures collected in form order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationErrors {
    pub errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn push(&mut self, field: &'static str, message: impl Into<String>) {
        self.errors.push(FieldError {
            field,
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn field(&self, field: &str) -> Option<&FieldError> {
        self.errors.iter().find(|error| error.field == field)
    }

    fn into_result<T>(self, valid: impl FnOnce() -> T) -> Result<T, ValidationErrors> {
        if self.is_empty() {
            Ok(valid())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for error in &self.errors {
            if !first {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", error.field, error.message)?;
            first = false;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

/// Publish form as submitted by the client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishForm {
    pub name: String,
    #[serde(default)]
    pub company: Option<String>,
    pub city: String,
    #[serde(default)]
    pub neighborhood: Option<String>,
    pub phone: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    pub description: String,
    #[serde(default)]
    pub contact_message: Option<String>,
    /// Free text next to the "Otros" checkbox.
    #[serde(default)]
    pub custom_category: Option<String>,
}

impl FormSchema for PublishForm {
    type Valid = ListingDraft;

    fn validate(&self) -> Result<ListingDraft, ValidationErrors> {
        let mut errors = ValidationErrors::default();

        let name = required_text(&mut errors, "name", &self.name, MIN_NAME_LENGTH);
        let city = required_text(&mut errors, "city", &self.city, MIN_CITY_LENGTH);
        check_phone(&mut errors, &self.phone);
        let email = optional_email(&mut errors, self.email.as_deref());
        let categories = merge_categories(&self.categories, self.custom_category.as_deref());
        if categories.is_empty() {
            errors.push("categories", "select at least one category");
        }
        check_description(&mut errors, &self.description);

        errors.into_result(|| ListingDraft {
            name,
            company: optional_text(self.company.as_deref()),
            city,
            neighborhood: optional_text(self.neighborhood.as_deref()),
            phone: self.phone.clone(),
            email,
            categories,
            description: self.description.clone(),
            contact_message: optional_text(self.contact_message.as_deref()),
        })
    }
}

/// Edit form: every field optional, provided fields follow the publish rules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditForm {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub neighborhood: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub categories: Option<Vec<String>>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub contact_message: Option<String>,
    #[serde(default)]
    pub custom_category: Option<String>,
}

impl FormSchema for EditForm {
    type Valid = ListingPatch;

    fn validate(&self) -> Result<ListingPatch, ValidationErrors> {
        let mut errors = ValidationErrors::default();

        let name = self
            .name
            .as_deref()
            .map(|name| required_text(&mut errors, "name", name, MIN_NAME_LENGTH));
        let city = self
            .city
            .as_deref()
            .map(|city| required_text(&mut errors, "city", city, MIN_CITY_LENGTH));
        if let Some(phone) = self.phone.as_deref() {
            check_phone(&mut errors, phone);
        }
        let email = self.email.as_deref().map(|email| {
            optional_email(&mut errors, Some(email)).unwrap_or_default()
        });
        let custom = self
            .custom_category
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty());
        // A custom entry on its own is folded into the stored categories later.
        let (categories, custom_category) = match (&self.categories, custom) {
            (None, custom) => (None, custom.map(custom_tag)),
            (Some(selected), custom) => {
                let merged = merge_categories(selected, custom);
                if merged.is_empty() {
                    errors.push("categories", "select at least one category");
                }
                (Some(merged), None)
            }
        };
        if let Some(description) = self.description.as_deref() {
            check_description(&mut errors, description);
        }

        errors.into_result(|| ListingPatch {
            name,
            company: self.company.as_deref().map(|value| value.trim().to_string()),
            city,
            neighborhood: self
                .neighborhood
                .as_deref()
                .map(|value| value.trim().to_string()),
            phone: self.phone.clone(),
            email,
            categories,
            custom_category,
            description: self.description.clone(),
            contact_message: self
                .contact_message
                .as_deref()
                .map(|value| value.trim().to_string()),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignInForm {
    pub email: String,
    pub password: String,
}

impl FormSchema for SignInForm {
    type Valid = PasswordCredentials;

    fn validate(&self) -> Result<PasswordCredentials, ValidationErrors> {
        let mut errors = ValidationErrors::default();
        let email = required_email(&mut errors, &self.email);
        if self.password.is_empty() {
            errors.push("password", "password is required");
        }

        errors.into_result(|| PasswordCredentials {
            email,
            password: self.password.clone(),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignUpForm {
    pub name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

impl FormSchema for SignUpForm {
    type Valid = SignUpRequest;

    fn validate(&self) -> Result<SignUpRequest, ValidationErrors> {
        let mut errors = ValidationErrors::default();
        let display_name = required_text(&mut errors, "name", &self.name, MIN_NAME_LENGTH);
        let email = required_email(&mut errors, &self.email);
        if self.password.chars().count() < MIN_PASSWORD_LENGTH {
            errors.push(
                "password",
                format!("password must be at least {MIN_PASSWORD_LENGTH} characters"),
            );
        }
        if self.password != self.confirm_password {
            errors.push("confirm_password", "passwords do not match");
        }

        errors.into_result(|| SignUpRequest {
            display_name,
            credentials: PasswordCredentials {
                email,
                password: self.password.clone(),
            },
        })
    }
}

fn required_text(
    errors: &mut ValidationErrors,
    field: &'static str,
    value: &str,
    min: usize,
) -> String {
    let trimmed = value.trim();
    if trimmed.chars().count() < min {
        errors.push(field, format!("{field} must be at least {min} characters"));
    }
    trimmed.to_string()
}

fn optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

fn is_email(value: &str) -> bool {
    EMAIL_SHAPE.is_match(value)
}

fn required_email(errors: &mut ValidationErrors, value: &str) -> String {
    let trimmed = value.trim();
    if !is_email(trimmed) {
        errors.push("email", "invalid email address");
    }
    trimmed.to_string()
}

fn optional_email(errors: &mut ValidationErrors, value: Option<&str>) -> Option<String> {
    let email = optional_text(value)?;
    if !is_email(&email) {
        errors.push("email", "invalid email address");
    }
    Some(email)
}

fn check_phone(errors: &mut ValidationErrors, phone: &str) {
    if let Err(error) = PhoneNumber::parse(phone) {
        errors.push("phone", error.to_string());
    }
}

fn check_description(errors: &mut ValidationErrors, description: &str) {
    if description.chars().count() < MIN_DESCRIPTION_LENGTH {
        errors.push(
            "description",
            format!("description must be at least {MIN_DESCRIPTION_LENGTH} characters"),
        );
    }
}

/// Trim, drop blanks and duplicates, and fold the custom entry into a single `Otros: …` tag.
fn merge_categories(selected: &[String], custom: Option<&str>) -> Vec<String> {
    let custom = custom.map(str::trim).filter(|text| !text.is_empty());
    let mut merged: Vec<String> = Vec::with_capacity(selected.len() + 1);

    for category in selected {
        let category = category.trim();
        if category.is_empty() || merged.iter().any(|existing| existing == category) {
            continue;
        }
        if custom.is_some() && category.starts_with(CUSTOM_CATEGORY_PREFIX) {
            continue;
        }
        merged.push(category.to_string());
    }

    if let Some(custom) = custom {
        merged.push(custom_tag(custom));
    }

    merged
}

fn custom_tag(custom: &str) -> String {
    format!("{CUSTOM_CATEGORY_PREFIX} {custom}")
}
