//! Cache key generation for paginated queries.
//!
//! Keys have the shape `<entity>:<page>:<page_size>:<filters>` (the cache
//! adds its namespace in front). The entity is always the first segment so
//! invalidation can match it exactly.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cache::SEGMENT_DELIMITER;
use crate::error::{CacheError, Result};
use crate::query::PageRequest;

// == Filters ==
/// Query filters keyed by column name.
///
/// Stored sorted, so two filter sets with the same pairs always produce the
/// same signature whatever order they were built in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Filters(BTreeMap<String, Value>);

impl Filters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(column, value);
        self
    }

    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(column.into(), value.into());
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.0.get(column)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Canonical text form: `"col"=value` pairs in column order joined by `&`.
    ///
    /// Column names are JSON-quoted so no two distinct filter sets share a
    /// signature. Empty filters give an empty string.
    pub fn signature(&self) -> String {
        self.0
            .iter()
            .map(|(column, value)| format!("{}={}", Value::from(column.as_str()), value))
            .collect::<Vec<_>>()
            .join("&")
    }
}

impl<K, V> FromIterator<(K, V)> for Filters
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

// == Entity Validation ==
/// Checks that `entity` can serve as the first key segment.
pub fn validate_entity(entity: &str) -> Result<()> {
    if entity.is_empty() {
        return Err(CacheError::InvalidArgument(
            "Entity name cannot be empty".to_string(),
        ));
    }
    if entity.contains(SEGMENT_DELIMITER) {
        return Err(CacheError::InvalidArgument(format!(
            "Entity name '{}' cannot contain '{}'",
            entity, SEGMENT_DELIMITER
        )));
    }
    Ok(())
}

// == Cache Key ==
/// Identity of one cached page of one entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    entity: String,
    page: u32,
    page_size: u32,
    filters: String,
}

impl CacheKey {
    /// Builds the key for `request` over `entity` with `filters`.
    pub fn page(entity: &str, request: PageRequest, filters: &Filters) -> Result<Self> {
        validate_entity(entity)?;
        Ok(Self {
            entity: entity.to_string(),
            page: request.page,
            page_size: request.page_size,
            filters: filters.signature(),
        })
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let d = SEGMENT_DELIMITER;
        write!(
            f,
            "{}{d}{}{d}{}{d}{}",
            self.entity, self.page, self.page_size, self.filters
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(page: u32, page_size: u32) -> PageRequest {
        PageRequest { page, page_size }
    }

    #[test]
    fn test_key_shape() {
        let key = CacheKey::page("vehicles", request(2, 20), &Filters::new()).unwrap();
        assert_eq!(key.to_string(), "vehicles:2:20:");
        assert_eq!(key.entity(), "vehicles");
    }

    #[test]
    fn test_filter_order_does_not_matter() {
        let a = Filters::new().with("status", "active").with("year", 2020);
        let b = Filters::new().with("year", 2020).with("status", "active");

        let ka = CacheKey::page("vehicles", request(1, 20), &a).unwrap();
        let kb = CacheKey::page("vehicles", request(1, 20), &b).unwrap();
        assert_eq!(ka, kb);
        assert_eq!(ka.to_string(), r#"vehicles:1:20:"status"="active"&"year"=2020"#);
    }

    #[test]
    fn test_distinct_filters_distinct_keys() {
        let a = Filters::new().with("a", "1&\"b\"=2");
        let b = Filters::new().with("a", "1").with("b", 2);
        assert_ne!(a.signature(), b.signature());
    }

    #[test]
    fn test_filter_value_types_matter() {
        let a = Filters::new().with("year", 2020);
        let b = Filters::new().with("year", "2020");
        assert_ne!(a.signature(), b.signature());
    }

    #[test]
    fn test_page_params_in_key() {
        let f = Filters::new();
        let k1 = CacheKey::page("users", request(1, 20), &f).unwrap();
        let k2 = CacheKey::page("users", request(1, 50), &f).unwrap();
        let k3 = CacheKey::page("users", request(2, 20), &f).unwrap();
        assert_ne!(k1, k2);
        assert_ne!(k1, k3);
    }

    #[test]
    fn test_invalid_entity_names() {
        assert!(matches!(validate_entity(""), Err(CacheError::InvalidArgument(_))));
        assert!(matches!(
            validate_entity("users:archived"),
            Err(CacheError::InvalidArgument(_))
        ));
        assert!(validate_entity("vehicle_documents").is_ok());
    }

    #[test]
    fn test_filters_from_iter() {
        let filters: Filters = vec![("owner_id", json!("u-1")), ("status", json!("active"))]
            .into_iter()
            .collect();
        assert_eq!(filters.get("owner_id"), Some(&json!("u-1")));
        assert_eq!(filters.iter().count(), 2);
    }
}
