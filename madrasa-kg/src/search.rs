//! Hybrid retrieval over the knowledge graph
//!
//! All ranking is delegated to the database: fulltext (Lucene) index scores
//! for keyword relevance and `shortestPath` length for graph-distance
//! reranking. This module only issues Cypher and shapes the rows.

use crate::error::{KgError, Result};
use neo4rs::{query, Graph};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Default number of results returned by the search operations.
pub const DEFAULT_SEARCH_LIMIT: usize = 5;

/// Hop cutoff for graph-distance reranking; unreachable nodes rank as one
/// hop beyond it.
const RERANK_MAX_HOPS: i64 = 6;

/// A node hit from the knowledge graph, as handed to the agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSearchResult {
    /// The unique identifier for this node
    pub uuid: String,
    /// The name of the retrieved content
    pub name: String,
    /// The summary of the piece of information retrieved
    pub summary: String,
}

/// A fact (relationship) hit with its temporal validity window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactSearchResult {
    pub uuid: String,
    pub fact: String,
    /// When the fact became true in the real world, if known
    pub valid_at: Option<String>,
    /// When the fact stopped being true, if known
    pub invalid_at: Option<String>,
    pub source_node_uuid: String,
    pub target_node_uuid: String,
    pub score: f64,
}

/// Escape Lucene query syntax so user input reaches the fulltext index as
/// plain terms.
pub fn sanitize_fulltext_query(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '+' | '-' | '&' | '|' | '!' | '(' | ')' | '{' | '}' | '[' | ']' | '^' | '"' | '~'
            | '*' | '?' | ':' | '\\' | '/' => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}

/// Keyword search over entity and episodic nodes.
///
/// Queries the `node_name_and_summary` fulltext index and returns the top
/// `limit` hits ordered by index score. Episodic nodes have no summary, so
/// their raw content stands in for it.
pub async fn search_nodes(
    graph: &Graph,
    search_query: &str,
    limit: usize,
) -> Result<Vec<NodeSearchResult>> {
    let sanitized = sanitize_fulltext_query(search_query);
    debug!("Node search: '{}' (limit {})", sanitized, limit);

    let cypher = query(
        "CALL db.index.fulltext.queryNodes('node_name_and_summary', $q)
         YIELD node, score
         RETURN node.uuid as uuid,
                node.name as name,
                coalesce(node.summary, node.content, '') as summary
         ORDER BY score DESC
         LIMIT $limit",
    )
    .param("q", sanitized)
    .param("limit", limit as i64);

    let mut result = graph
        .execute(cypher)
        .await
        .map_err(|e| KgError::QueryError(format!("Node search failed: {}", e)))?;

    let mut hits = Vec::new();
    while let Some(row) = result
        .next()
        .await
        .map_err(|e| KgError::QueryError(format!("Failed to read row: {}", e)))?
    {
        hits.push(NodeSearchResult {
            uuid: row.get("uuid").unwrap_or_default(),
            name: row.get("name").unwrap_or_default(),
            summary: row.get("summary").unwrap_or_default(),
        });
    }

    Ok(hits)
}

/// Keyword search over facts (entity edges).
///
/// Queries the `edge_name_and_fact` fulltext index. Validity timestamps are
/// returned as ISO strings when present.
pub async fn search_facts(
    graph: &Graph,
    search_query: &str,
    limit: usize,
) -> Result<Vec<FactSearchResult>> {
    let sanitized = sanitize_fulltext_query(search_query);
    debug!("Fact search: '{}' (limit {})", sanitized, limit);

    let cypher = query(
        "CALL db.index.fulltext.queryRelationships('edge_name_and_fact', $q)
         YIELD relationship, score
         WITH relationship as r, score,
              startNode(relationship) as s, endNode(relationship) as t
         RETURN r.uuid as uuid,
                coalesce(r.fact, r.name, '') as fact,
                toString(r.valid_at) as valid_at,
                toString(r.invalid_at) as invalid_at,
                s.uuid as source_node_uuid,
                t.uuid as target_node_uuid,
                score
         ORDER BY score DESC
         LIMIT $limit",
    )
    .param("q", sanitized)
    .param("limit", limit as i64);

    collect_fact_rows(graph, cypher).await
}

/// Fact search reranked by graph distance from a center node.
///
/// The fulltext score is divided by `1 + distance(center, source_node)`,
/// where distance is a `shortestPath` length capped at [`RERANK_MAX_HOPS`]
/// hops; unreachable sources rank last. The path computation runs entirely
/// in the database.
pub async fn search_facts_reranked(
    graph: &Graph,
    search_query: &str,
    center_node_uuid: &str,
    limit: usize,
) -> Result<Vec<FactSearchResult>> {
    let sanitized = sanitize_fulltext_query(search_query);
    debug!(
        "Fact search (center {}): '{}' (limit {})",
        center_node_uuid, sanitized, limit
    );

    let cypher = query(
        "MATCH (center {uuid: $center_uuid})
         CALL db.index.fulltext.queryRelationships('edge_name_and_fact', $q)
         YIELD relationship, score
         WITH center, relationship as r, score,
              startNode(relationship) as s, endNode(relationship) as t
         OPTIONAL MATCH path = shortestPath((center)-[*..6]-(s))
         WHERE center <> s
         WITH r, s, t, score,
              CASE WHEN center = s THEN 0
                   WHEN path IS NULL THEN $max_hops + 1
                   ELSE length(path) END as distance
         RETURN r.uuid as uuid,
                coalesce(r.fact, r.name, '') as fact,
                toString(r.valid_at) as valid_at,
                toString(r.invalid_at) as invalid_at,
                s.uuid as source_node_uuid,
                t.uuid as target_node_uuid,
                score / (1.0 + distance) as score
         ORDER BY score DESC
         LIMIT $limit",
    )
    .param("center_uuid", center_node_uuid.to_string())
    .param("q", sanitized)
    .param("max_hops", RERANK_MAX_HOPS)
    .param("limit", limit as i64);

    collect_fact_rows(graph, cypher).await
}

async fn collect_fact_rows(graph: &Graph, cypher: neo4rs::Query) -> Result<Vec<FactSearchResult>> {
    let mut result = graph
        .execute(cypher)
        .await
        .map_err(|e| KgError::QueryError(format!("Fact search failed: {}", e)))?;

    let mut hits = Vec::new();
    while let Some(row) = result
        .next()
        .await
        .map_err(|e| KgError::QueryError(format!("Failed to read row: {}", e)))?
    {
        hits.push(FactSearchResult {
            uuid: row.get("uuid").unwrap_or_default(),
            fact: row.get("fact").unwrap_or_default(),
            valid_at: row.get("valid_at").ok(),
            invalid_at: row.get("invalid_at").ok(),
            source_node_uuid: row.get("source_node_uuid").unwrap_or_default(),
            target_node_uuid: row.get("target_node_uuid").unwrap_or_default(),
            score: row.get("score").unwrap_or_default(),
        });
    }

    Ok(hits)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_passes_plain_text() {
        assert_eq!(
            sanitize_fulltext_query("لماذا اللغة العربية مهمة"),
            "لماذا اللغة العربية مهمة"
        );
    }

    #[test]
    fn test_sanitize_escapes_lucene_specials() {
        assert_eq!(sanitize_fulltext_query("a+b"), "a\\+b");
        assert_eq!(sanitize_fulltext_query("(x OR y)"), "\\(x OR y\\)");
        assert_eq!(sanitize_fulltext_query("path/to:thing"), "path\\/to\\:thing");
        assert_eq!(sanitize_fulltext_query("back\\slash"), "back\\\\slash");
    }

    #[test]
    fn test_node_result_serializes_spec_keys() {
        let hit = NodeSearchResult {
            uuid: "u-1".to_string(),
            name: "النحو".to_string(),
            summary: "ملخص".to_string(),
        };
        let json = serde_json::to_value(&hit).unwrap();
        assert_eq!(json["uuid"], "u-1");
        assert_eq!(json["name"], "النحو");
        assert_eq!(json["summary"], "ملخص");
    }
}
