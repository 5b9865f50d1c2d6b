//! Built-in beverage catalog.
//!
//! Typical single-serving caffeine figures in milligrams. The config
//! layer can overlay custom entries on top of these.

use crate::types::*;
use once_cell::sync::Lazy;
use std::collections::HashMap;

static DEFAULT_CATALOG: Lazy<Catalog> = Lazy::new(build_default_catalog);

/// Shared built-in catalog, constructed on first use
pub fn get_default_catalog() -> &'static Catalog {
    &DEFAULT_CATALOG
}

/// Build a fresh copy of the built-in catalog
///
/// Callers that overlay custom beverages start from this; everyone else
/// can borrow [`get_default_catalog`].
pub fn build_default_catalog() -> Catalog {
    let mut beverages = HashMap::new();

    let entries = [
        Beverage {
            id: "espresso_single".into(),
            name: "Espresso (single shot)".into(),
            caffeine_mg: 63.0,
            serving: "30 ml shot".into(),
            tags: vec!["coffee".into(), "hot".into()],
            reference_url: None,
        },
        Beverage {
            id: "espresso_double".into(),
            name: "Espresso (double shot)".into(),
            caffeine_mg: 126.0,
            serving: "60 ml shot".into(),
            tags: vec!["coffee".into(), "hot".into()],
            reference_url: None,
        },
        Beverage {
            id: "drip_coffee".into(),
            name: "Drip Coffee".into(),
            caffeine_mg: 95.0,
            serving: "240 ml cup".into(),
            tags: vec!["coffee".into(), "hot".into()],
            reference_url: None,
        },
        Beverage {
            id: "instant_coffee".into(),
            name: "Instant Coffee".into(),
            caffeine_mg: 62.0,
            serving: "240 ml cup".into(),
            tags: vec!["coffee".into(), "hot".into()],
            reference_url: None,
        },
        Beverage {
            id: "cold_brew".into(),
            name: "Cold Brew".into(),
            caffeine_mg: 155.0,
            serving: "330 ml glass".into(),
            tags: vec!["coffee".into(), "cold".into()],
            reference_url: None,
        },
        Beverage {
            id: "decaf_coffee".into(),
            name: "Decaf Coffee".into(),
            caffeine_mg: 2.0,
            serving: "240 ml cup".into(),
            tags: vec!["coffee".into(), "hot".into(), "decaf".into()],
            reference_url: None,
        },
        Beverage {
            id: "black_tea".into(),
            name: "Black Tea".into(),
            caffeine_mg: 47.0,
            serving: "240 ml cup".into(),
            tags: vec!["tea".into(), "hot".into()],
            reference_url: None,
        },
        Beverage {
            id: "green_tea".into(),
            name: "Green Tea".into(),
            caffeine_mg: 28.0,
            serving: "240 ml cup".into(),
            tags: vec!["tea".into(), "hot".into()],
            reference_url: None,
        },
        Beverage {
            id: "energy_drink".into(),
            name: "Energy Drink".into(),
            caffeine_mg: 80.0,
            serving: "250 ml can".into(),
            tags: vec!["cold".into(), "canned".into()],
            reference_url: None,
        },
        Beverage {
            id: "cola".into(),
            name: "Cola".into(),
            caffeine_mg: 34.0,
            serving: "355 ml can".into(),
            tags: vec!["cold".into(), "canned".into()],
            reference_url: None,
        },
    ];

    for beverage in entries {
        beverages.insert(beverage.id.clone(), beverage);
    }

    Catalog { beverages }
}

impl Catalog {
    /// Overlay custom beverages onto the catalog
    ///
    /// A custom entry sharing a built-in id replaces the built-in.
    pub fn with_custom(mut self, custom: Vec<Beverage>) -> Self {
        for beverage in custom {
            self.beverages.insert(beverage.id.clone(), beverage);
        }
        self
    }

    /// Check every entry for broken fields
    ///
    /// Returns one message per problem; an empty list means the catalog
    /// is usable.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.beverages.is_empty() {
            errors.push("Catalog has no beverages".to_string());
        }

        for (id, beverage) in &self.beverages {
            if id.is_empty() || beverage.id.is_empty() {
                errors.push("Beverage has empty ID".to_string());
            }
            if id != &beverage.id {
                errors.push(format!(
                    "Beverage key '{}' doesn't match beverage.id '{}'",
                    id, beverage.id
                ));
            }
            if beverage.name.is_empty() {
                errors.push(format!("Beverage '{}' has empty name", id));
            }
            if beverage.serving.is_empty() {
                errors.push(format!("Beverage '{}' has empty serving", id));
            }
            if !(beverage.caffeine_mg > 0.0) || !beverage.caffeine_mg.is_finite() {
                errors.push(format!(
                    "Beverage '{}' has non-positive caffeine {}mg",
                    id, beverage.caffeine_mg
                ));
            }
        }

        errors
    }
}
