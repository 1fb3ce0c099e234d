//! Search API query building
//!
//! NSX's search endpoint takes a Lucene-style query string. Values with
//! reserved characters (the `/` in tag scopes) must be escaped before the
//! whole query is URL-encoded.

use crate::common::HttpClient;
use crate::error::NsxError;
use serde::Deserialize;

const SEARCH_PATH: &str = "/search/query";

/// Escape Lucene reserved characters in a query term
pub fn escape_term(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(
            c,
            '/' | '+' | '-' | '&' | '|' | '!' | '(' | ')' | '{' | '}' | '[' | ']' | '^' | '"'
                | '~' | '*' | '?' | ':' | '\\'
        ) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Build `resource_type:<type> AND tags.scope:<scope> AND tags.tag:<tag> ...`
pub fn build_query(resource_type: &str, tags: &[(&str, &str)]) -> String {
    let mut clauses = vec![format!("resource_type:{}", resource_type)];
    for (scope, tag) in tags {
        clauses.push(format!("tags.scope:{}", escape_term(scope)));
        clauses.push(format!("tags.tag:{}", escape_term(tag)));
    }
    clauses.join(" AND ")
}

/// Run a search query and fetch every page of results
pub async fn search_resources<T: for<'de> Deserialize<'de>>(
    http: &HttpClient,
    resource_type: &str,
    tags: &[(&str, &str)],
) -> Result<Vec<T>, NsxError> {
    let query = build_query(resource_type, tags);
    let path = format!("{}?query={}", SEARCH_PATH, urlencoding::encode(&query));
    http.fetch_all_pages(&path).await
}
