// Notion REST proxy. Forwarded bodies are opaque JSON; saving text under a
// generated identifier shapes its own page properties.

use reqwest::{Client, Method};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, info};

use super::{
    check_response, endpoint,
    identifier::{next_identifier, DEFAULT_IDENTIFIER_PATTERN},
    ProxyError,
};

const SERVICE: &str = "Notion";
pub const NOTION_VERSION: &str = "2022-06-28";

/// Query fields forwarded to `databases/{id}/query`.
const QUERY_FIELDS: &[&str] = &["filter", "sorts", "start_cursor", "page_size"];

/// Notion's per-request page size ceiling.
const SCAN_PAGE_SIZE: u32 = 100;
/// Upper bound on query round trips while collecting identifiers.
const MAX_SCAN_PAGES: usize = 200;
/// Characters per rich-text segment accepted by Notion.
const MAX_TEXT_SEGMENT: usize = 2000;

/// Column mapping for a text saved under a generated identifier.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IdentifierTarget {
    pub database_id: String,
    pub identifier_column: String,
    pub text_column: String,
    pub annotation_column: String,
    pub annotation: String,
    pub page_column: String,
    pub page_number: String,
    pub identifier_pattern: String,
}

/// A page created by [`NotionClient::save_text_with_identifier`].
#[derive(Debug, Clone, PartialEq)]
pub struct SavedText {
    pub identifier: String,
    pub page_id: String,
}

#[derive(Clone)]
pub struct NotionClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
}

impl NotionClient {
    pub fn new(http: Client, base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self { http, base_url: base_url.into(), api_key }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    pub async fn get_database(&self, database_id: &str) -> Result<Value, ProxyError> {
        let id = validate_id(database_id)?;
        self.send(Method::GET, &format!("v1/databases/{id}"), None).await
    }

    pub async fn update_database(&self, database_id: &str, body: Value) -> Result<Value, ProxyError> {
        let id = validate_id(database_id)?;
        self.send(Method::PATCH, &format!("v1/databases/{id}"), Some(body)).await
    }

    /// Query a database, forwarding only the recognised query fields.
    pub async fn query_database(&self, database_id: &str, body: Option<Value>) -> Result<Value, ProxyError> {
        let id = validate_id(database_id)?;
        let query: Map<String, Value> = body
            .as_ref()
            .and_then(Value::as_object)
            .map(|object| {
                object
                    .iter()
                    .filter(|(key, value)| QUERY_FIELDS.contains(&key.as_str()) && !value.is_null())
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect()
            })
            .unwrap_or_default();

        let response = self.send(Method::POST, &format!("v1/databases/{id}/query"), Some(Value::Object(query))).await?;
        let count = response.get("results").and_then(Value::as_array).map_or(0, Vec::len);
        info!(database_id = %id, results = count, "queried notion database");
        Ok(response)
    }

    pub async fn create_page(&self, body: Value) -> Result<Value, ProxyError> {
        if !body.is_object() {
            return Err(ProxyError::InvalidRequest("Page body must be a JSON object".into()));
        }
        self.send(Method::POST, "v1/pages", Some(body)).await
    }

    pub async fn update_page(&self, page_id: &str, body: Value) -> Result<Value, ProxyError> {
        let id = validate_id(page_id)?;
        self.send(Method::PATCH, &format!("v1/pages/{id}"), Some(body)).await
    }

    /// Create a row holding `text` under the next free identifier.
    pub async fn save_text_with_identifier(
        &self,
        target: &IdentifierTarget,
        text: &str,
    ) -> Result<SavedText, ProxyError> {
        if text.trim().is_empty() {
            return Err(ProxyError::InvalidRequest("Text is required".into()));
        }
        if [&target.identifier_column, &target.text_column].iter().any(|column| column.trim().is_empty()) {
            return Err(ProxyError::InvalidRequest(
                "databaseId, identifierColumn and textColumn are required".into(),
            ));
        }
        let database_id = validate_id(&target.database_id)?;

        let schema = self.get_database(database_id).await?;
        let existing = self.existing_identifiers(database_id, &target.identifier_column).await?;
        let pattern = match target.identifier_pattern.trim() {
            "" => DEFAULT_IDENTIFIER_PATTERN,
            pattern => pattern,
        };
        let identifier = next_identifier(pattern, existing.iter().map(String::as_str));

        let mut properties = Map::new();
        let mut set = |column: &str, value: &str| -> Result<(), ProxyError> {
            properties.insert(column.to_owned(), property_value(&schema, column, value)?);
            Ok(())
        };
        set(&target.identifier_column, &identifier)?;
        set(&target.text_column, text)?;
        if !target.annotation_column.trim().is_empty() && !target.annotation.trim().is_empty() {
            set(&target.annotation_column, &target.annotation)?;
        }
        if !target.page_column.trim().is_empty() && !target.page_number.trim().is_empty() {
            set(&target.page_column, target.page_number.trim())?;
        }

        let page = self
            .create_page(json!({
                "parent": { "database_id": database_id },
                "properties": properties,
            }))
            .await?;
        let page_id = page.get("id").and_then(Value::as_str).unwrap_or_default().to_owned();
        info!(database_id, %identifier, page_id = %page_id, existing = existing.len(), "saved text with identifier");
        Ok(SavedText { identifier, page_id })
    }

    /// Plain text of `column` across every row, following query cursors.
    async fn existing_identifiers(&self, database_id: &str, column: &str) -> Result<Vec<String>, ProxyError> {
        let path = format!("v1/databases/{database_id}/query");
        let mut identifiers = Vec::new();
        let mut cursor: Option<String> = None;

        for _ in 0..MAX_SCAN_PAGES {
            let mut query = json!({ "page_size": SCAN_PAGE_SIZE });
            if let Some(cursor) = &cursor {
                query["start_cursor"] = json!(cursor);
            }
            let response = self.send(Method::POST, &path, Some(query)).await?;
            let rows = response.get("results").and_then(Value::as_array).into_iter().flatten();
            identifiers.extend(
                rows.filter_map(|row| row.get("properties")?.get(column))
                    .map(plain_text)
                    .filter(|text| !text.is_empty()),
            );

            let has_more = response.get("has_more").and_then(Value::as_bool).unwrap_or(false);
            cursor = response.get("next_cursor").and_then(Value::as_str).map(str::to_owned);
            if !has_more || cursor.is_none() {
                return Ok(identifiers);
            }
        }

        debug!(database_id, pages = MAX_SCAN_PAGES, "identifier scan stopped at page limit");
        Ok(identifiers)
    }

    /// List workspace users as a credentials check; returns the user count.
    pub async fn test_connection(&self) -> Result<usize, ProxyError> {
        let users = self.send(Method::GET, "v1/users", None).await?;
        Ok(users.get("results").and_then(Value::as_array).map_or(0, Vec::len))
    }

    async fn send(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value, ProxyError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ProxyError::NotConfigured("NOTION_API_KEY is not configured".into()))?;
        let url = endpoint(&self.base_url, path)?;
        debug!(method = %method, path, "forwarding to notion");

        let mut request = self
            .http
            .request(method, url)
            .bearer_auth(api_key)
            .header("Notion-Version", NOTION_VERSION);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await.map_err(ProxyError::network(SERVICE))?;
        let response = check_response(SERVICE, response).await?;
        response.json::<Value>().await.map_err(|error| ProxyError::UnexpectedResponse {
            service: SERVICE,
            message: error.to_string(),
        })
    }
}

/// Notion ids are UUIDs, with or without dashes.
fn validate_id(id: &str) -> Result<&str, ProxyError> {
    let id = id.trim();
    if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(ProxyError::InvalidRequest(format!("Invalid Notion id: {id}")));
    }
    Ok(id)
}

/// Concatenated text of a title or rich-text property value.
fn plain_text(property: &Value) -> String {
    let kind = property.get("type").and_then(Value::as_str).unwrap_or("rich_text");
    property
        .get(kind)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|segment| {
            segment
                .get("plain_text")
                .or_else(|| segment.get("text")?.get("content"))
                .and_then(Value::as_str)
        })
        .collect()
}

/// Property value for `column`, shaped by its type in the database schema.
fn property_value(schema: &Value, column: &str, value: &str) -> Result<Value, ProxyError> {
    let kind = schema
        .get("properties")
        .and_then(|properties| properties.get(column))
        .and_then(|property| property.get("type"))
        .and_then(Value::as_str)
        .ok_or_else(|| ProxyError::InvalidRequest(format!("Column '{column}' does not exist in the database")))?;

    Ok(match kind {
        "title" => json!({ "title": text_segments(value) }),
        "number" => {
            let number: f64 = value
                .trim()
                .parse()
                .map_err(|_| ProxyError::InvalidRequest(format!("Column '{column}' expects a number")))?;
            json!({ "number": number })
        }
        "select" => json!({ "select": { "name": value } }),
        "url" => json!({ "url": value }),
        _ => json!({ "rich_text": text_segments(value) }),
    })
}

fn text_segments(value: &str) -> Vec<Value> {
    let chars: Vec<char> = value.chars().collect();
    chars
        .chunks(MAX_TEXT_SEGMENT)
        .map(|chunk| json!({ "type": "text", "text": { "content": chunk.iter().collect::<String>() } }))
        .collect()
}
