//! Node/edge mutation and raw query execution
//!
//! The operations backing the HTTP API. Driver errors propagate to the
//! caller unrecovered; the API layer turns them into generic 400s.

use crate::error::{KgError, Result};
use neo4rs::{
    query, BoltBoolean, BoltFloat, BoltInteger, BoltList, BoltMap, BoltNull, BoltString, BoltType,
    Graph,
};
use tracing::debug;

/// Check that a caller-supplied relationship type is a plain Cypher
/// identifier. Relationship types cannot be parameterized, so anything else
/// is rejected before being spliced into query text.
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_')
}

/// Convert a JSON value into a bolt parameter value.
fn json_to_bolt(value: &serde_json::Value) -> Result<BoltType> {
    let bolt = match value {
        serde_json::Value::Null => BoltType::Null(BoltNull),
        serde_json::Value::Bool(b) => BoltType::Boolean(BoltBoolean::new(*b)),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                BoltType::Integer(BoltInteger::new(i))
            } else if let Some(f) = n.as_f64() {
                BoltType::Float(BoltFloat::new(f))
            } else {
                return Err(KgError::SerializationError(format!(
                    "Unrepresentable number: {}",
                    n
                )));
            }
        }
        serde_json::Value::String(s) => BoltType::String(BoltString::from(s.as_str())),
        serde_json::Value::Array(items) => {
            let mut list = BoltList::default();
            for item in items {
                list.push(json_to_bolt(item)?);
            }
            BoltType::List(list)
        }
        serde_json::Value::Object(map) => {
            let mut bolt_map = BoltMap::default();
            for (key, item) in map {
                bolt_map.put(BoltString::from(key.as_str()), json_to_bolt(item)?);
            }
            BoltType::Map(bolt_map)
        }
    };
    Ok(bolt)
}

/// Delete a node and all of its relationships.
///
/// # Returns
/// * `Ok(true)` when a node matched and was deleted
/// * `Ok(false)` when no node with the uuid exists
pub async fn delete_node(graph: &Graph, uuid: &str) -> Result<bool> {
    debug!("Deleting node {}", uuid);

    let cypher = query(
        "MATCH (n {uuid: $uuid})
         DETACH DELETE n
         RETURN count(n) as deleted",
    )
    .param("uuid", uuid.to_string());

    let mut result = graph
        .execute(cypher)
        .await
        .map_err(|e| KgError::QueryError(format!("Failed to delete node: {}", e)))?;

    let deleted: i64 = match result
        .next()
        .await
        .map_err(|e| KgError::QueryError(format!("Failed to read result: {}", e)))?
    {
        Some(row) => row.get("deleted").unwrap_or(0),
        None => 0,
    };

    Ok(deleted > 0)
}

/// Merge properties onto an existing edge between two nodes.
///
/// The relationship type is validated as an identifier (it cannot be a bolt
/// parameter) and the property map is applied with `SET r += $props`.
///
/// # Returns
/// * `Ok(true)` when an edge matched
/// * `Ok(false)` when no such edge exists
pub async fn update_edge(
    graph: &Graph,
    source_uuid: &str,
    target_uuid: &str,
    rel_type: &str,
    properties: &serde_json::Map<String, serde_json::Value>,
) -> Result<bool> {
    if !is_valid_identifier(rel_type) {
        return Err(KgError::InvalidInput(format!(
            "'{}' is not a valid relationship type",
            rel_type
        )));
    }

    debug!(
        "Updating edge ({})-[:{}]->({})",
        source_uuid, rel_type, target_uuid
    );

    let props = json_to_bolt(&serde_json::Value::Object(properties.clone()))?;

    let statement = format!(
        "MATCH (s)-[r:{}]->(t)
         WHERE s.uuid = $source_uuid AND t.uuid = $target_uuid
         SET r += $props
         RETURN count(r) as updated",
        rel_type
    );

    let cypher = query(&statement)
        .param("source_uuid", source_uuid.to_string())
        .param("target_uuid", target_uuid.to_string())
        .param("props", props);

    let mut result = graph
        .execute(cypher)
        .await
        .map_err(|e| KgError::QueryError(format!("Failed to update edge: {}", e)))?;

    let updated: i64 = match result
        .next()
        .await
        .map_err(|e| KgError::QueryError(format!("Failed to read result: {}", e)))?
    {
        Some(row) => row.get("updated").unwrap_or(0),
        None => 0,
    };

    Ok(updated > 0)
}

/// Execute a raw Cypher query with JSON parameters.
///
/// Each result row is deserialized into a JSON object keyed by its return
/// columns. Values the driver cannot represent as JSON surface as a
/// serialization error.
pub async fn run_cypher(
    graph: &Graph,
    statement: &str,
    params: &serde_json::Map<String, serde_json::Value>,
) -> Result<Vec<serde_json::Value>> {
    debug!("Executing raw cypher: {}", statement);

    let mut cypher = query(statement);
    for (key, value) in params {
        cypher = cypher.param(key, json_to_bolt(value)?);
    }

    let mut result = graph
        .execute(cypher)
        .await
        .map_err(|e| KgError::QueryError(format!("Query execution failed: {}", e)))?;

    let mut rows = Vec::new();
    while let Some(row) = result
        .next()
        .await
        .map_err(|e| KgError::QueryError(format!("Failed to read row: {}", e)))?
    {
        let value = row
            .to::<serde_json::Value>()
            .map_err(|e| KgError::SerializationError(format!("Failed to convert row: {}", e)))?;
        rows.push(value);
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_validation() {
        assert!(is_valid_identifier("RELATES_TO"));
        assert!(is_valid_identifier("_private"));
        assert!(is_valid_identifier("Mentions2"));

        assert!(!is_valid_identifier(""));
        assert!(!is_valid_identifier("2fast"));
        assert!(!is_valid_identifier("DROP INDEX"));
        assert!(!is_valid_identifier("r]->() DELETE n //"));
    }

    #[test]
    fn test_json_to_bolt_scalars() {
        assert!(matches!(
            json_to_bolt(&serde_json::json!(null)).unwrap(),
            BoltType::Null(_)
        ));
        assert!(matches!(
            json_to_bolt(&serde_json::json!(true)).unwrap(),
            BoltType::Boolean(_)
        ));
        assert!(matches!(
            json_to_bolt(&serde_json::json!(42)).unwrap(),
            BoltType::Integer(_)
        ));
        assert!(matches!(
            json_to_bolt(&serde_json::json!(2.5)).unwrap(),
            BoltType::Float(_)
        ));
        assert!(matches!(
            json_to_bolt(&serde_json::json!("نص")).unwrap(),
            BoltType::String(_)
        ));
    }

    #[test]
    fn test_json_to_bolt_containers() {
        let list = json_to_bolt(&serde_json::json!([1, "two", false])).unwrap();
        match list {
            BoltType::List(items) => assert_eq!(items.value.len(), 3),
            other => panic!("expected list, got {:?}", other),
        }

        let map = json_to_bolt(&serde_json::json!({"weight": 0.8, "label": "uses"})).unwrap();
        assert!(matches!(map, BoltType::Map(_)));
    }
}
