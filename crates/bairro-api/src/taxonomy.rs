//! Resolves human-entered city, district and category codes to row ids.

use axum::{Json, extract::State};

use bairro_db::Database;
use bairro_types::models::{CityEntry, TaxonRef, Taxonomy};

use crate::auth::{AppState, blocking};
use crate::error::ApiError;

/// Ids of a fully resolved report location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub city_id: i64,
    pub district_id: i64,
    pub category_id: i64,
}

pub fn resolve_city(db: &Database, indexed_name: &str) -> Result<i64, ApiError> {
    db.find_city(indexed_name)?
        .map(|c| c.id)
        .ok_or_else(|| ApiError::not_found("City not found").with_field("city", "City not found"))
}

/// District lookups are always scoped: the same indexed name exists in
/// several cities.
pub fn resolve_district(db: &Database, indexed_name: &str, city_id: i64) -> Result<i64, ApiError> {
    db.find_district(indexed_name, city_id)?
        .map(|d| d.id)
        .ok_or_else(|| {
            ApiError::not_found("District not found in this city")
                .with_field("district", "District not found in this city")
        })
}

pub fn resolve_category(db: &Database, indexed_name: &str) -> Result<i64, ApiError> {
    db.find_category(indexed_name)?
        .map(|c| c.id)
        .ok_or_else(|| {
            ApiError::not_found("Category not found").with_field("category", "Category not found")
        })
}

pub fn resolve_location(
    db: &Database,
    city: &str,
    district: &str,
    category: &str,
) -> Result<Location, ApiError> {
    let city_id = resolve_city(db, city)?;
    let district_id = resolve_district(db, district, city_id)?;
    let category_id = resolve_category(db, category)?;
    Ok(Location {
        city_id,
        district_id,
        category_id,
    })
}

pub fn taxonomy(db: &Database) -> Result<Taxonomy, ApiError> {
    let districts = db.list_districts()?;

    let cities = db
        .list_cities()?
        .into_iter()
        .map(|city| CityEntry {
            districts: districts
                .iter()
                .filter(|d| d.city_id == city.id)
                .map(|d| TaxonRef {
                    indexed_name: d.indexed_name.clone(),
                    name: d.name.clone(),
                })
                .collect(),
            indexed_name: city.indexed_name,
            name: city.name,
        })
        .collect();

    let categories = db
        .list_categories()?
        .into_iter()
        .map(|c| TaxonRef {
            indexed_name: c.indexed_name,
            name: c.name,
        })
        .collect();

    Ok(Taxonomy { cities, categories })
}

/// GET /taxonomy
pub async fn get_taxonomy(State(state): State<AppState>) -> Result<Json<Taxonomy>, ApiError> {
    let taxonomy = blocking(&state, |s| taxonomy(&s.db)).await?;
    Ok(Json(taxonomy))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bairro_types::error::ErrorKind;

    #[test]
    fn resolves_full_location() {
        let db = Database::open_in_memory().unwrap();
        let loc = resolve_location(&db, "PAROBE", "FUNIL", "TREES").unwrap();
        assert_eq!(loc.city_id, 2);
        assert_eq!(loc.category_id, 6);
    }

    #[test]
    fn district_of_another_city_is_not_found() {
        let db = Database::open_in_memory().unwrap();
        let err = resolve_location(&db, "PAROBE", "RONDA", "ROADS").unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
        assert_eq!(err.fields[0].field, "district");
    }

    #[test]
    fn misses_name_the_entity() {
        let db = Database::open_in_memory().unwrap();
        let err = resolve_location(&db, "PORTO_ALEGRE", "CENTRO", "ROADS").unwrap_err();
        assert_eq!(err.fields[0].field, "city");

        let err = resolve_location(&db, "TAQUARA", "CENTRO", "FLOODS").unwrap_err();
        assert_eq!(err.fields[0].field, "category");
    }

    #[test]
    fn taxonomy_groups_districts_by_city() {
        let db = Database::open_in_memory().unwrap();
        let tax = taxonomy(&db).unwrap();
        assert_eq!(tax.cities.len(), 2);
        assert_eq!(tax.cities[0].indexed_name, "TAQUARA");
        assert_eq!(tax.cities[0].districts.len(), 23);
        assert_eq!(tax.cities[1].districts.len(), 8);
        assert_eq!(tax.categories.len(), 7);
    }
}
