use dashmap::DashMap;

use crate::model::*;

/// Secondary catalog indexes. Each maps an attribute value to property ids.
#[derive(Default)]
pub struct SearchIndexes {
    by_city: DashMap<String, Vec<PropertyId>>,
    by_country: DashMap<String, Vec<PropertyId>>,
    by_bedrooms: DashMap<u32, Vec<PropertyId>>,
    by_guests: DashMap<u32, Vec<PropertyId>>,
}

impl SearchIndexes {
    pub fn insert(&self, property: &Property) {
        self.by_city
            .entry(property.city.clone())
            .or_default()
            .push(property.id);
        self.by_country
            .entry(property.country.clone())
            .or_default()
            .push(property.id);
        self.by_bedrooms
            .entry(property.bedrooms)
            .or_default()
            .push(property.id);
        self.by_guests
            .entry(property.guests)
            .or_default()
            .push(property.id);
    }

    pub fn lookup(&self, index: &SearchIndex) -> Vec<PropertyId> {
        let ids = match index {
            SearchIndex::City(city) => self.by_city.get(city).map(|e| e.value().clone()),
            SearchIndex::Country(country) => {
                self.by_country.get(country).map(|e| e.value().clone())
            }
            SearchIndex::Bedrooms(n) => self.by_bedrooms.get(n).map(|e| e.value().clone()),
            SearchIndex::Guests(n) => self.by_guests.get(n).map(|e| e.value().clone()),
        };
        ids.unwrap_or_default()
    }
}
