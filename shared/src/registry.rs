use std::collections::HashSet;

use thiserror::Error;

use crate::city::City;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("city at index {index} has an empty name")]
    EmptyName { index: usize },

    #[error("duplicate city name {0:?}")]
    DuplicateName(String),

    #[error("city {name:?} has invalid latitude {value}")]
    InvalidLatitude { name: String, value: f64 },

    #[error("city {name:?} has invalid longitude {value}")]
    InvalidLongitude { name: String, value: f64 },

    #[error("malformed city list: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Built-in dataset: (name, latitude, longitude, count).
const BUILTIN_CITIES: &[(&str, f64, f64, u32)] = &[
    ("Delhi", 28.6139, 77.209, 500),
    ("Mumbai", 19.076, 72.8777, 400),
    ("Kolkata", 22.5726, 88.3639, 300),
    ("Chennai", 13.0827, 80.2707, 200),
    ("Bangalore", 12.9716, 77.5946, 150),
    ("Hyderabad", 17.385, 78.4867, 250),
];

/// Immutable, validated, ordered set of cities.
///
/// Every record is checked on construction, so anything holding a
/// `CityRegistry` can hand its coordinates straight to the viewport.
#[derive(Debug, Clone, PartialEq)]
pub struct CityRegistry {
    cities: Vec<City>,
}

impl CityRegistry {
    pub fn new(cities: Vec<City>) -> Result<Self, RegistryError> {
        let mut seen = HashSet::with_capacity(cities.len());
        for (index, city) in cities.iter().enumerate() {
            if city.name.trim().is_empty() {
                return Err(RegistryError::EmptyName { index });
            }
            if !city.latitude.is_finite() || !(-90.0..=90.0).contains(&city.latitude) {
                return Err(RegistryError::InvalidLatitude {
                    name: city.name.clone(),
                    value: city.latitude,
                });
            }
            if !city.longitude.is_finite() || !(-180.0..=180.0).contains(&city.longitude) {
                return Err(RegistryError::InvalidLongitude {
                    name: city.name.clone(),
                    value: city.longitude,
                });
            }
            if !seen.insert(city.name.as_str()) {
                return Err(RegistryError::DuplicateName(city.name.clone()));
            }
        }
        Ok(Self { cities })
    }

    pub fn from_json(json: &str) -> Result<Self, RegistryError> {
        let cities: Vec<City> = serde_json::from_str(json)?;
        Self::new(cities)
    }

    pub fn builtin() -> Self {
        Self {
            cities: builtin_cities(),
        }
    }

    pub fn all(&self) -> &[City] {
        &self.cities
    }

    pub fn iter(&self) -> std::slice::Iter<'_, City> {
        self.cities.iter()
    }

    pub fn len(&self) -> usize {
        self.cities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cities.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&City> {
        self.cities.iter().find(|city| city.name == name)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.cities.iter().position(|city| city.name == name)
    }

    pub fn city_at(&self, index: usize) -> Option<&City> {
        self.cities.get(index)
    }

    /// True only when `city` is the registered record itself, not merely a
    /// record that shares its name.
    pub fn contains(&self, city: &City) -> bool {
        self.get(&city.name).is_some_and(|known| known == city)
    }

    pub fn total_count(&self) -> u64 {
        self.cities.iter().map(|city| u64::from(city.count)).sum()
    }

    /// The city `step` places away from `current`, wrapping at both ends.
    /// With no current city, forward steps start at the first entry and
    /// backward steps at the last.
    pub fn step_from(&self, current: Option<&str>, step: isize) -> Option<&City> {
        let len = self.cities.len() as isize;
        if len == 0 {
            return None;
        }
        let target = match current.and_then(|name| self.index_of(name)) {
            Some(index) => (index as isize + step).rem_euclid(len),
            None if step >= 0 => (step - 1).max(0).rem_euclid(len),
            None => (len + step).rem_euclid(len),
        };
        self.cities.get(target as usize)
    }
}

impl Default for CityRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl<'a> IntoIterator for &'a CityRegistry {
    type Item = &'a City;
    type IntoIter = std::slice::Iter<'a, City>;

    fn into_iter(self) -> Self::IntoIter {
        self.cities.iter()
    }
}

pub fn builtin_cities() -> Vec<City> {
    BUILTIN_CITIES
        .iter()
        .map(|&(name, lat, lng, count)| City::new(name, lat, lng, count))
        .collect()
}
