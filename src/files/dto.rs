use reqwest::Url;
use serde::Deserialize;
use serde_json::Value;

/// Query of `GET /files`.
#[derive(Debug, Default, Deserialize)]
pub struct FilesQuery {
    #[serde(default)]
    pub public_key: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
}

/// The fields of an upstream item descriptor the listing page shows.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ListingItem {
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default, rename = "file")]
    pub download_url: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
}

impl ListingItem {
    pub fn is_dir(&self) -> bool {
        self.kind == "dir"
    }
}

/// Items under `_embedded.items`, in upstream order. A missing or malformed
/// collection is an empty listing; entries that are not objects are skipped.
pub fn extract_items(listing: &Value) -> Vec<ListingItem> {
    listing
        .get("_embedded")
        .and_then(|e| e.get("items"))
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| ListingItem::deserialize(item).ok())
                .collect()
        })
        .unwrap_or_default()
}

pub fn files_href(public_key: &str, path: &str) -> String {
    Url::parse_with_params(
        "http://localhost/files",
        &[("public_key", public_key), ("path", path)],
    )
    .map(|url| format!("{}?{}", url.path(), url.query().unwrap_or_default()))
    .unwrap_or_else(|_| "/files".to_string())
}

/// Parent of a share-relative directory; `None` at the root.
pub fn parent_path(path: &str) -> Option<String> {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.rfind('/') {
        Some(0) | None => Some("/".to_string()),
        Some(i) => Some(trimmed[..i].to_string()),
    }
}
