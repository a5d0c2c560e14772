//! Entity Fetch
//!
//! Pages through the NerdGraph entity search and returns every APM
//! application in upstream order.

use serde::Deserialize;
use tracing::{debug, instrument, warn};

use super::decode_data;
use crate::domain::{ApplicationEntity, GraphQlExecutor};
use crate::error::Result;
use crate::query;

/// Default bound on the number of entity search pages fetched per pass.
pub const DEFAULT_MAX_ENTITY_PAGES: usize = 50;

// =============================================================================
// NerdGraph Response Types
// =============================================================================

#[derive(Debug, Deserialize)]
struct EntitySearchData {
    actor: EntitySearchActor,
}

#[derive(Debug, Deserialize)]
struct EntitySearchActor {
    #[serde(rename = "entitySearch")]
    entity_search: EntitySearch,
}

#[derive(Debug, Deserialize)]
struct EntitySearch {
    results: EntitySearchPage,
}

#[derive(Debug, Deserialize)]
struct EntitySearchPage {
    #[serde(rename = "nextCursor", default)]
    next_cursor: Option<String>,
    #[serde(default)]
    entities: Vec<ApplicationEntity>,
}

// =============================================================================
// Fetch
// =============================================================================

/// Fetch all APM application entities.
///
/// Follows `nextCursor` until the backend stops returning one, or until
/// `max_pages` pages have been read. Any upstream error aborts the fetch.
#[instrument(skip(executor))]
pub async fn fetch_entities(
    executor: &dyn GraphQlExecutor,
    max_pages: usize,
) -> Result<Vec<ApplicationEntity>> {
    let mut entities = Vec::new();
    let mut cursor: Option<String> = None;

    for page in 1..=max_pages.max(1) {
        let query = query::entity_search(cursor.as_deref());
        let data = executor.execute(&query).await?;
        let results = decode_data::<EntitySearchData>(data)?.actor.entity_search.results;

        debug!(
            "Entity search page {} returned {} entities",
            page,
            results.entities.len()
        );
        entities.extend(results.entities);

        cursor = results.next_cursor.filter(|c| !c.is_empty());
        if cursor.is_none() {
            return Ok(entities);
        }
    }

    warn!(
        "Entity search still had more pages after {} pages, exporting {} entities",
        max_pages.max(1),
        entities.len()
    );
    Ok(entities)
}
