//! Prompt templates for the three LLM-backed steps: intent classification,
//! Cypher generation, and synthesis.

use plantwise_core::types::ScopeHint;

pub const INTENT_SYSTEM_PROMPT: &str =
    "You are an intent classification expert. Respond only with valid JSON.";

pub const CYPHER_SYSTEM_PROMPT: &str = "You are a Neo4j Cypher query expert.";

pub const SYNTHESIS_SYSTEM_PROMPT: &str = "\
You are an expert industrial data analyst providing insights for plant operations.
Always state which systems contributed to the answer (graph, maintenance, time-series).
Never invent sensor names or work-order numbers that are not present in the provided data.
If a requested data source was unavailable, acknowledge that explicitly.";

pub const GRAPH_SCHEMA_CONTEXT: &str = r#"
You have access to a graph database with the following schema:

NODES:
- Plant: top-level production sites (properties: name)
- AssetArea: areas within plants (properties: name, area_code - e.g. "40-10", "75-12")
- Equipment: industrial equipment (nested properties: equipment_name, equipment_type, sensor_count, source_tags)
- Sensor: measurement devices with properties:
  * tag: sensor tag identifier (e.g. "4010TI371.DACA.PV")
  * description: human-readable description
  * sensor_type_code: type code (e.g. "TI", "PI")
  * unit: measurement unit (e.g. "°C", "bar")
  * area_code: area identifier (e.g. "40-10")
  * classification: sensor classification (e.g. "PROCESS")

RELATIONSHIPS:
- (Plant)-[:HAS_AREA]->(AssetArea)
- (AssetArea)-[:HAS_EQUIPMENT]->(Equipment)
- (AssetArea)-[:HAS_SENSOR]->(Sensor)
- (Equipment)-[:HAS_SENSOR]->(Sensor)

IMPORTANT PROPERTY ACCESS RULES:
1. Sensor properties are DIRECT properties: use s.tag, s.description, s.unit (NOT s.properties.tag)
2. Equipment properties are NESTED: use e.properties.equipment_name
3. AssetArea and Plant use direct properties: a.name, p.name
4. Always use LIMIT 50 to prevent returning too many results
5. Use RETURN DISTINCT when appropriate to avoid duplicates
6. For counting, use COUNT(DISTINCT n)
"#;

/// Prompt asking the model to pick the data sources for a question.
pub fn intent_prompt(question: &str) -> String {
    format!(
        r#"Analyze this industrial data query and determine which data sources are needed.

Query: "{question}"

Available data sources:
- GRAPH: graph database with plants, areas, equipment, and sensors
- MAINTENANCE: work orders, maintenance schedules, and asset status
- TIME_SERIES: recent sensor measurements and anomaly flags

Respond with a JSON object containing:
{{
  "needs_graph": true/false,
  "needs_maintenance": true/false,
  "needs_time_series": true/false,
  "reasoning": "brief explanation"
}}

Rules:
- Sensor names come from the graph, so needs_graph must be true whenever any other flag is true.
- Set every flag false only when the question is not about plant data at all (e.g. small talk).

Examples:
- "What sensors are in area 40-10?" -> {{"needs_graph": true, "needs_maintenance": false, "needs_time_series": false}}
- "Do we have work orders for pump P-101?" -> {{"needs_graph": true, "needs_maintenance": true, "needs_time_series": false}}
- "Show me abnormal temperature readings" -> {{"needs_graph": true, "needs_maintenance": false, "needs_time_series": true}}
- "Complete status of area 40-10" -> {{"needs_graph": true, "needs_maintenance": true, "needs_time_series": true}}
- "Hello there" -> {{"needs_graph": false, "needs_maintenance": false, "needs_time_series": false}}

Your analysis (JSON only):"#
    )
}

/// Prompt asking the model for a single Cypher statement.
pub fn cypher_prompt(question: &str, scope: Option<&ScopeHint>) -> String {
    let scope_block = scope.map(scope_constraint).unwrap_or_default();

    format!(
        r#"{GRAPH_SCHEMA_CONTEXT}
{scope_block}
User Query: {question}

Generate a single Cypher query that answers this question. Return ONLY the Cypher query, no explanation.
Do not include markdown code fences (```), just the raw Cypher.

IMPORTANT: For work order/maintenance queries about an area, return the SENSORS in that area.
The maintenance system will use those sensor tags to check for work orders.

Example queries:
- "What sensors are in area 40-10?" -> MATCH (a:AssetArea {{name: "40-10"}})-[:HAS_SENSOR]->(s:Sensor) RETURN s.tag, s.description, s.unit LIMIT 50
- "Are there work orders in area 40-10?" -> MATCH (a:AssetArea {{name: "40-10"}})-[:HAS_SENSOR]->(s:Sensor) RETURN s.tag, s.area_code LIMIT 50
- "How many equipment items are there?" -> MATCH (e:Equipment) RETURN COUNT(DISTINCT e) as equipment_count
- "Show me temperature sensors" -> MATCH (s:Sensor) WHERE s.sensor_type_code = 'TI' RETURN s.tag, s.description, s.unit LIMIT 50
- "List equipment in area 40-10" -> MATCH (a:AssetArea {{name: "40-10"}})-[:HAS_EQUIPMENT]->(e:Equipment) RETURN e.properties.equipment_name, e.properties.equipment_type LIMIT 50

Your query:"#
    )
}

/// Hard scope constraint prepended when the caller supplied a navigation hint.
fn scope_constraint(scope: &ScopeHint) -> String {
    let node_type = scope.node_type.as_deref().unwrap_or("node");
    let node_name = scope.node_name.as_deref().unwrap_or("(unnamed)");
    let depth = scope.clamped_depth();

    format!(
        "HARD CONSTRAINT: restrict results to the {node_type} named \"{node_name}\".\n\
         If it is an AssetArea, include its equipment and sensors transitively up to {depth} hop(s).\n"
    )
}

/// Prompt asking the model to compose the final reply from agent outputs.
pub fn synthesis_prompt(question: &str, context: &str, errors: &[String]) -> String {
    let error_note = if errors.is_empty() {
        String::new()
    } else {
        let list: Vec<String> = errors.iter().map(|e| format!("- {e}")).collect();
        format!(
            "\n\nNote: Some agents encountered errors:\n{}",
            list.join("\n")
        )
    };

    format!(
        r#"Synthesize a clear, actionable response to the user's query based on the data provided by our specialized systems.

User Query: "{question}"

Available Data:
{context}{error_note}

Instructions:
1. Provide a direct answer to the user's question
2. Cite specific data points from the context
3. Highlight any important findings (anomalies, work orders, patterns)
4. If data is incomplete, acknowledge it briefly but focus on what IS available
5. Use clear, professional language suitable for plant operations
6. Keep the response concise (2-4 paragraphs max)

Your response:"#
    )
}
