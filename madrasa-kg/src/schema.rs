//! Graph schema introspection
//!
//! Reads the live label/relationship/property schema out of Neo4j's
//! built-in procedures, for operators checking what the extraction tooling
//! has actually written.

use crate::error::{KgError, Result};
use neo4rs::{query, Graph};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The introspected shape of the graph.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphSchema {
    /// All node labels present in the database
    pub node_types: Vec<String>,
    /// All relationship types present in the database
    pub edge_types: Vec<String>,
    /// Property names per node label
    pub node_properties: HashMap<String, Vec<String>>,
    /// Property names per relationship type
    pub edge_properties: HashMap<String, Vec<String>>,
}

/// `db.schema.relTypeProperties()` reports types as ``:`NAME` `` - strip the
/// decoration so keys match what `db.relationshipTypes()` returns.
fn strip_rel_type(raw: &str) -> String {
    raw.trim_start_matches(':').replace('`', "")
}

/// Introspect the current label/relationship/property schema.
///
/// Node and edge property streams are consumed independently; labels with no
/// properties are filtered database-side.
pub async fn inspect_schema(graph: &Graph) -> Result<GraphSchema> {
    let mut schema = GraphSchema::default();

    let mut result = graph
        .execute(query("CALL db.labels() YIELD label RETURN label"))
        .await
        .map_err(|e| KgError::QueryError(format!("Failed to list labels: {}", e)))?;
    while let Some(row) = result
        .next()
        .await
        .map_err(|e| KgError::QueryError(format!("Failed to read row: {}", e)))?
    {
        if let Ok(label) = row.get::<String>("label") {
            schema.node_types.push(label);
        }
    }

    let mut result = graph
        .execute(query(
            "CALL db.relationshipTypes() YIELD relationshipType RETURN relationshipType",
        ))
        .await
        .map_err(|e| KgError::QueryError(format!("Failed to list relationship types: {}", e)))?;
    while let Some(row) = result
        .next()
        .await
        .map_err(|e| KgError::QueryError(format!("Failed to read row: {}", e)))?
    {
        if let Ok(edge_type) = row.get::<String>("relationshipType") {
            schema.edge_types.push(edge_type);
        }
    }

    let mut result = graph
        .execute(query(
            "CALL db.schema.nodeTypeProperties() YIELD nodeLabels, propertyName
             RETURN nodeLabels,
                    [p IN collect(propertyName) WHERE p IS NOT NULL] as properties",
        ))
        .await
        .map_err(|e| KgError::QueryError(format!("Failed to read node properties: {}", e)))?;
    while let Some(row) = result
        .next()
        .await
        .map_err(|e| KgError::QueryError(format!("Failed to read row: {}", e)))?
    {
        let labels: Vec<String> = row.get("nodeLabels").unwrap_or_default();
        let properties: Vec<String> = row.get("properties").unwrap_or_default();
        if let Some(label) = labels.into_iter().next() {
            schema.node_properties.insert(label, properties);
        }
    }

    let mut result = graph
        .execute(query(
            "CALL db.schema.relTypeProperties() YIELD relType, propertyName
             RETURN relType,
                    [p IN collect(propertyName) WHERE p IS NOT NULL] as properties",
        ))
        .await
        .map_err(|e| KgError::QueryError(format!("Failed to read edge properties: {}", e)))?;
    while let Some(row) = result
        .next()
        .await
        .map_err(|e| KgError::QueryError(format!("Failed to read row: {}", e)))?
    {
        let rel_type: String = row.get("relType").unwrap_or_default();
        let properties: Vec<String> = row.get("properties").unwrap_or_default();
        if !rel_type.is_empty() {
            schema.edge_properties.insert(strip_rel_type(&rel_type), properties);
        }
    }

    Ok(schema)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_rel_type_decoration() {
        assert_eq!(strip_rel_type(":`RELATES_TO`"), "RELATES_TO");
        assert_eq!(strip_rel_type("MENTIONS"), "MENTIONS");
    }

    #[test]
    fn test_schema_serializes_all_sections() {
        let mut schema = GraphSchema::default();
        schema.node_types.push("Episodic".to_string());
        schema.edge_types.push("RELATES_TO".to_string());
        schema
            .node_properties
            .insert("Episodic".to_string(), vec!["uuid".to_string(), "name".to_string()]);

        let json = serde_json::to_value(&schema).unwrap();
        assert_eq!(json["node_types"][0], "Episodic");
        assert_eq!(json["edge_types"][0], "RELATES_TO");
        assert_eq!(json["node_properties"]["Episodic"][0], "uuid");
        assert!(json["edge_properties"].as_object().unwrap().is_empty());
    }
}
