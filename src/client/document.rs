//! Wire types returned by the content API

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// API root: lists the content refs (snapshots) that can be queried
#[derive(Debug, Clone, Deserialize)]
pub struct ApiInfo {
    #[serde(default)]
    pub refs: Vec<ContentRef>,
}

impl ApiInfo {
    /// The ref pointing at currently published content
    pub fn master(&self) -> Option<&ContentRef> {
        self.refs.iter().find(|r| r.is_master_ref)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentRef {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "ref")]
    pub ref_id: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub is_master_ref: bool,
}

/// Paginated search envelope
///
/// `next_page`, when present, is a fully qualified URL returning another
/// envelope of the same shape.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(bound(deserialize = "D: Deserialize<'de> + Default"))]
pub struct SearchResponse<D = Value> {
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub results_per_page: u32,
    #[serde(default)]
    pub total_results_size: u32,
    #[serde(default)]
    pub total_pages: u32,
    #[serde(default)]
    pub next_page: Option<String>,
    #[serde(default)]
    pub prev_page: Option<String>,
    pub results: Vec<Document<D>>,
}

/// A raw document; `data` holds the custom type's fields
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Document<D = Value> {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub uid: Option<String>,
    #[serde(rename = "type", default)]
    pub doc_type: Option<String>,
    #[serde(default)]
    pub first_publication_date: Option<String>,
    #[serde(default)]
    pub last_publication_date: Option<String>,
    #[serde(default)]
    pub data: D,
}
