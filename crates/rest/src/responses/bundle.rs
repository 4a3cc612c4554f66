//! Searchset bundles for paged results.

use serde_json::Value;

use crate::paging::SearchPage;

/// A link in a Bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleLink {
    /// The relation type (self, next, previous).
    pub relation: &'static str,
    /// The URL.
    pub url: String,
}

impl BundleLink {
    /// Converts to FHIR JSON.
    pub fn to_json(&self) -> Value {
        serde_json::json!({
            "relation": self.relation,
            "url": self.url
        })
    }
}

/// URL of a page of a stored search.
pub fn page_url(base_url: &str, search_id: &str, offset: usize, count: usize) -> String {
    let query = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("_getpages", search_id)
        .append_pair("_getpagesoffset", &offset.to_string())
        .append_pair("_count", &count.to_string())
        .append_pair("_bundletype", "searchset")
        .finish();
    format!("{}?{}", base_url, query)
}

/// Links for a page: `self`, then `next` and `previous` when they exist.
pub fn page_links(base_url: &str, page: &SearchPage) -> Vec<BundleLink> {
    let mut links = vec![BundleLink {
        relation: "self",
        url: page_url(base_url, &page.search_id, page.offset, page.count),
    }];

    if let Some(next) = page.next_offset() {
        links.push(BundleLink {
            relation: "next",
            url: page_url(base_url, &page.search_id, next, page.count),
        });
    }

    if let Some(previous) = page.previous_offset() {
        links.push(BundleLink {
            relation: "previous",
            url: page_url(base_url, &page.search_id, previous, page.count),
        });
    }

    links
}

fn full_url(base_url: &str, resource: &Value) -> Option<String> {
    let resource_type = resource.get("resourceType")?.as_str()?;
    let id = resource.get("id")?.as_str()?;
    Some(format!("{}/{}/{}", base_url, resource_type, id))
}

/// Builds the searchset Bundle for a page.
pub fn searchset_bundle(base_url: &str, page: &SearchPage, resources: Vec<Value>) -> Value {
    let entries: Vec<Value> = resources
        .into_iter()
        .map(|resource| {
            let mut entry = serde_json::json!({
                "resource": resource,
                "search": { "mode": "match" }
            });
            if let Some(url) = full_url(base_url, &entry["resource"]) {
                entry["fullUrl"] = Value::String(url);
            }
            entry
        })
        .collect();

    serde_json::json!({
        "resourceType": "Bundle",
        "id": page.search_id,
        "meta": {
            "lastUpdated": chrono::Utc::now().to_rfc3339()
        },
        "type": "searchset",
        "total": page.total,
        "link": page_links(base_url, page).iter().map(BundleLink::to_json).collect::<Vec<_>>(),
        "entry": entries
    })
}
