//! NerdGraph Query Builder
//!
//! Builds the GraphQL documents sent to NerdGraph. Pure string construction:
//! no network and no parsing live here.
//!
//! Every string interpolated into a document goes through [`string_literal`],
//! and identifier lists through [`list_literal`]. Numbers are only ever
//! written from integer types.

use crate::domain::{DeploymentWindow, EntityGuid, GraphQlQuery};
use crate::error::{Error, Result};
use crate::metrics::statistics::STATISTICS;

/// Upstream limit on the number of GUIDs accepted by `actor.entities`.
pub const MAX_GUIDS_PER_QUERY: usize = 25;

/// Entity search over all APM applications.
///
/// Requests the GUID, the name and every tracked statistic, plus the cursor
/// for the next page. `cursor` is the `nextCursor` of the previous page.
pub fn entity_search(cursor: Option<&str>) -> GraphQlQuery {
    let statistics = STATISTICS
        .iter()
        .map(|s| s.statistic)
        .collect::<Vec<_>>()
        .join(" ");

    let results_args = match cursor {
        Some(cursor) => format!("(cursor: {})", string_literal(cursor)),
        None => String::new(),
    };

    GraphQlQuery::new(format!(
        "{{ actor {{ entitySearch(queryBuilder: {{domain: APM}}) {{ results{results_args} {{ \
         nextCursor entities {{ guid name ... on ApmApplicationEntityOutline {{ \
         apmSummary {{ {statistics} }} }} }} }} }} }} }}"
    ))
}

/// Deployments of exactly `guids` that happened inside `window`.
///
/// Fails when the batch is empty or exceeds [`MAX_GUIDS_PER_QUERY`].
pub fn entity_deployments(guids: &[EntityGuid], window: &DeploymentWindow) -> Result<GraphQlQuery> {
    if guids.is_empty() {
        return Err(Error::InvalidQuery("deployment query needs at least one GUID".into()));
    }
    if guids.len() > MAX_GUIDS_PER_QUERY {
        return Err(Error::InvalidQuery(format!(
            "deployment query accepts at most {} GUIDs, got {}",
            MAX_GUIDS_PER_QUERY,
            guids.len()
        )));
    }

    let guids = list_literal(guids.iter().map(EntityGuid::as_str));
    Ok(GraphQlQuery::new(format!(
        "{{ actor {{ entities(guids: {guids}) {{ guid ... on ApmApplicationEntity {{ \
         deployments(timeWindow: {{startTime: {start}, endTime: {end}}}) {{ version timestamp }} \
         }} }} }} }}",
        start = window.start_ms,
        end = window.end_ms,
    )))
}

/// Account-scoped NRQL search over `Deployment` events inside `window`.
pub fn nrql_deployments(account_id: u64, window: &DeploymentWindow) -> GraphQlQuery {
    let nrql = format!(
        "SELECT entity.guid, version, timestamp FROM Deployment SINCE {} UNTIL {} LIMIT MAX",
        window.start_ms, window.end_ms
    );
    GraphQlQuery::new(format!(
        "{{ actor {{ account(id: {account_id}) {{ nrql(query: {}) {{ results }} }} }} }}",
        string_literal(&nrql)
    ))
}

/// Serialize `value` as a GraphQL string literal.
///
/// JSON string escaping is a subset of what GraphQL string literals accept,
/// so quotes, backslashes and control characters are all escaped.
pub fn string_literal(value: &str) -> String {
    serde_json::Value::String(value.to_owned()).to_string()
}

/// Serialize strings as a GraphQL list literal of string literals.
pub fn list_literal<'a>(values: impl IntoIterator<Item = &'a str>) -> String {
    let items = values
        .into_iter()
        .map(string_literal)
        .collect::<Vec<_>>()
        .join(", ");
    format!("[{items}]")
}
