use serde::{Deserialize, Serialize};

use super::domain::Listing;

/// AND-combined search criteria. Blank strings count as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingFilter {
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub neighborhood: Option<String>,
}

impl ListingFilter {
    pub fn search(mut self, text: impl Into<String>) -> Self {
        self.search = Some(text.into());
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn city(mut self, city: impl Into<String>) -> Self {
        self.city = Some(city.into());
        self
    }

    pub fn neighborhood(mut self, neighborhood: impl Into<String>) -> Self {
        self.neighborhood = Some(neighborhood.into());
        self
    }

    /// Category criterion, trimmed, if one was given.
    pub fn category_criterion(&self) -> Option<&str> {
        criterion(&self.category)
    }

    pub fn is_unconstrained(&self) -> bool {
        criterion(&self.search).is_none()
            && criterion(&self.category).is_none()
            && criterion(&self.city).is_none()
            && criterion(&self.neighborhood).is_none()
    }

    /// Whether a single listing survives the filter. Inactive listings never do.
    pub fn matches(&self, listing: &Listing) -> bool {
        if !listing.is_active() {
            return false;
        }

        if let Some(needle) = criterion(&self.search).map(str::to_lowercase) {
            let hit = contains_folded(&listing.name, &needle)
                || listing
                    .company
                    .as_deref()
                    .is_some_and(|company| contains_folded(company, &needle))
                || contains_folded(&listing.description, &needle);
            if !hit {
                return false;
            }
        }

        if let Some(category) = criterion(&self.category) {
            if !listing.categories.iter().any(|tag| tag == category) {
                return false;
            }
        }

        if let Some(needle) = criterion(&self.city).map(str::to_lowercase) {
            if !contains_folded(&listing.city, &needle) {
                return false;
            }
        }

        if let Some(needle) = criterion(&self.neighborhood).map(str::to_lowercase) {
            let hit = listing
                .neighborhood
                .as_deref()
                .is_some_and(|neighborhood| contains_folded(neighborhood, &needle));
            if !hit {
                return false;
            }
        }

        true
    }

    /// Keep the listings that match, in their original order.
    pub fn apply<I>(&self, listings: I) -> Vec<Listing>
    where
        I: IntoIterator<Item = Listing>,
    {
        listings
            .into_iter()
            .filter(|listing| self.matches(listing))
            .collect()
    }
}

fn criterion(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|text| !text.is_empty())
}

fn contains_folded(haystack: &str, folded_needle: &str) -> bool {
    haystack.to_lowercase().contains(folded_needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::UserId;
    use crate::directory::domain::{ListingId, ListingStatus};
    use chrono::{TimeZone, Utc};

    fn listing(id: &str, name: &str, categories: &[&str], city: &str) -> Listing {
        Listing {
            id: ListingId(id.to_string()),
            owner_id: UserId(format!("owner-{id}")),
            name: name.to_string(),
            company: None,
            city: city.to_string(),
            neighborhood: None,
            phone: "+5491134567890".to_string(),
            email: None,
            categories: categories.iter().map(|tag| tag.to_string()).collect(),
            description: "Trabajos garantizados con materiales de primera calidad y presupuesto sin cargo."
                .to_string(),
            status: ListingStatus::Active,
            created_at: Utc.with_ymd_and_hms(2024, 12, 1, 9, 0, 0).single().expect("valid"),
            contact_message: None,
        }
    }

    fn catalogue() -> Vec<Listing> {
        let mut plumber = listing("1", "Juan Carlos Pérez", &["Plomería", "Gasista"], "Buenos Aires");
        plumber.company = Some("Plomería JCP".to_string());
        plumber.neighborhood = Some("Palermo".to_string());

        let mut carpenter = listing("2", "María González", &["Carpintería"], "Buenos Aires");
        carpenter.neighborhood = Some("Villa Crespo".to_string());

        let electrician = listing("3", "Roberto Silva", &["Electricidad"], "Rosario");

        let mut retired = listing("4", "Ana Torres", &["Plomería"], "Rosario");
        retired.status = ListingStatus::Inactive;

        let gas = listing("5", "Carlos Mendoza", &["Gasista"], "Córdoba");

        vec![plumber, carpenter, electrician, retired, gas]
    }

    fn ids(listings: &[Listing]) -> Vec<&str> {
        listings.iter().map(|listing| listing.id.0.as_str()).collect()
    }

    #[test]
    fn empty_filter_returns_all_active_in_order() {
        let result = ListingFilter::default().apply(catalogue());
        assert_eq!(ids(&result), vec!["1", "2", "3", "5"]);
    }

    #[test]
    fn blank_criteria_are_ignored() {
        let filter = ListingFilter::default().search("   ").city("");
        assert!(filter.is_unconstrained());
        assert_eq!(filter.apply(catalogue()).len(), 4);
    }

    #[test]
    fn category_is_exact_membership() {
        let result = ListingFilter::default().category("Gasista").apply(catalogue());
        assert_eq!(ids(&result), vec!["1", "5"]);

        let partial = ListingFilter::default().category("Gas").apply(catalogue());
        assert!(partial.is_empty());
    }

    #[test]
    fn search_matches_name_company_or_description_case_insensitively() {
        let by_name = ListingFilter::default().search("maría").apply(catalogue());
        assert_eq!(ids(&by_name), vec!["2"]);

        let by_company = ListingFilter::default().search("jcp").apply(catalogue());
        assert_eq!(ids(&by_company), vec!["1"]);

        let by_description = ListingFilter::default()
            .search("PRESUPUESTO SIN CARGO")
            .apply(catalogue());
        assert_eq!(by_description.len(), 4);
    }

    #[test]
    fn city_and_neighborhood_use_substrings() {
        let city = ListingFilter::default().city("aires").apply(catalogue());
        assert_eq!(ids(&city), vec!["1", "2"]);

        let neighborhood = ListingFilter::default().neighborhood("crespo").apply(catalogue());
        assert_eq!(ids(&neighborhood), vec!["2"]);
    }

    #[test]
    fn combined_criteria_intersect_single_results() {
        let by_category = ListingFilter::default().category("Plomería").apply(catalogue());
        let by_city = ListingFilter::default().city("buenos").apply(catalogue());
        let both = ListingFilter::default()
            .category("Plomería")
            .city("buenos")
            .apply(catalogue());

        let expected: Vec<&str> = ids(&by_category)
            .into_iter()
            .filter(|id| ids(&by_city).contains(id))
            .collect();
        assert_eq!(ids(&both), expected);
    }

    #[test]
    fn inactive_listings_never_match() {
        let result = ListingFilter::default().search("ana torres").apply(catalogue());
        assert!(result.is_empty());
    }

    #[test]
    fn applying_twice_is_stable() {
        let filter = ListingFilter::default().city("buenos");
        let once = filter.apply(catalogue());
        let twice = filter.apply(once.clone());
        assert_eq!(once, twice);
    }
}
