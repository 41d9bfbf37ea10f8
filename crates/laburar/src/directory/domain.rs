use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::UserId;

/// Greeting used for WhatsApp contact links when a listing has no custom message.
pub const DEFAULT_CONTACT_MESSAGE: &str =
    "Hola, te contacto por LaburAr para solicitarte un presupuesto por";

/// Prefix marking a free-text category entered next to the "Otros" checkbox.
pub const CUSTOM_CATEGORY_PREFIX: &str = "Otros:";

/// Trades offered in the publish form.
pub const SERVICE_CATEGORIES: [&str; 24] = [
    "Carpintería",
    "Plomería",
    "Albañilería",
    "Construcción",
    "Zinguería",
    "Pintura",
    "Electricidad",
    "Gasista",
    "Jardinería",
    "Herrería",
    "Cuidado de personas",
    "Costurería",
    "Mecánico",
    "Gastronomía",
    "Peluquería",
    "Arquitectura",
    "Artes",
    "Decoración",
    "Ingeniería",
    "Rental",
    "Veterinaria",
    "Salud",
    "Informática",
    "Otros",
];

/// Opaque document id assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ListingId(pub String);

impl std::fmt::Display for ListingId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingStatus {
    Active,
    Inactive,
}

impl ListingStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ListingStatus::Active => "active",
            ListingStatus::Inactive => "inactive",
        }
    }
}

/// A published service-provider profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    pub id: ListingId,
    pub owner_id: UserId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    pub city: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub neighborhood: Option<String>,
    pub phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub categories: Vec<String>,
    pub description: String,
    pub status: ListingStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_message: Option<String>,
}

impl Listing {
    pub fn is_active(&self) -> bool {
        self.status == ListingStatus::Active
    }

    pub fn is_owned_by(&self, owner: &UserId) -> bool {
        &self.owner_id == owner
    }

    pub fn contact_message(&self) -> &str {
        self.contact_message
            .as_deref()
            .unwrap_or(DEFAULT_CONTACT_MESSAGE)
    }

    /// Fold a validated patch into the listing; absent fields stay untouched.
    pub fn apply(&mut self, patch: ListingPatch) {
        let ListingPatch {
            name,
            company,
            city,
            neighborhood,
            phone,
            email,
            categories,
            custom_category,
            description,
            contact_message,
        } = patch;

        if let Some(name) = name {
            self.name = name;
        }
        if let Some(company) = company {
            self.company = non_empty(company);
        }
        if let Some(city) = city {
            self.city = city;
        }
        if let Some(neighborhood) = neighborhood {
            self.neighborhood = non_empty(neighborhood);
        }
        if let Some(phone) = phone {
            self.phone = phone;
        }
        if let Some(email) = email {
            self.email = non_empty(email);
        }
        if let Some(categories) = categories {
            self.categories = categories;
        }
        if let Some(custom) = custom_category {
            self.categories
                .retain(|category| !category.starts_with(CUSTOM_CATEGORY_PREFIX));
            self.categories.push(custom);
        }
        if let Some(description) = description {
            self.description = description;
        }
        if let Some(message) = contact_message {
            self.contact_message = non_empty(message);
        }
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Validated content of the publish form, ready to persist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingDraft {
    pub name: String,
    pub company: Option<String>,
    pub city: String,
    pub neighborhood: Option<String>,
    pub phone: String,
    pub email: Option<String>,
    pub categories: Vec<String>,
    pub description: String,
    pub contact_message: Option<String>,
}

/// Validated partial update. An empty string on an optional text field clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingPatch {
    pub name: Option<String>,
    pub company: Option<String>,
    pub city: Option<String>,
    pub neighborhood: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub categories: Option<Vec<String>>,
    /// An `Otros: …` entry that replaces any previous custom category.
    pub custom_category: Option<String>,
    pub description: Option<String>,
    pub contact_message: Option<String>,
}

impl ListingPatch {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}
