//! Web-search adapter. One GET per query, top five results, snippets as
//! `title: description` lines. Never fatal to a conversation — callers
//! degrade to a "continue without research" directive when this errors.

use serde::Deserialize;

use mb_domain::{Error, Result};

const DEFAULT_BASE_URL: &str = "https://api.search.brave.com/res/v1/web/search";
const RESULTS_PER_QUERY: usize = 5;

#[derive(Debug, Clone, Deserialize)]
pub struct SearchHit {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
}

impl SearchHit {
    pub fn snippet(&self) -> String {
        format!("{}: {}", self.title, self.description)
    }
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    web: WebResults,
}

#[derive(Default, Deserialize)]
struct WebResults {
    #[serde(default)]
    results: Vec<SearchHit>,
}

pub struct SearchClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl SearchClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;
        Ok(Self {
            client,
            base_url: DEFAULT_BASE_URL.into(),
            api_key: api_key.into(),
        })
    }

    /// Top results for one query.
    pub async fn search(&self, query: &str) -> Result<Vec<SearchHit>> {
        let resp = self
            .client
            .get(&self.base_url)
            .query(&[("q", query), ("count", "5")])
            .header("X-Subscription-Token", &self.api_key)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| Error::Search(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Search(format!("HTTP {}", status.as_u16())));
        }

        let body: SearchResponse = resp
            .json()
            .await
            .map_err(|e| Error::Search(e.to_string()))?;
        Ok(body
            .web
            .results
            .into_iter()
            .take(RESULTS_PER_QUERY)
            .collect())
    }
}

/// Join per-query hits into one research summary block.
pub fn summarize_hits(query: &str, hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return format!("[{query}] no results");
    }
    let lines: Vec<String> = hits.iter().map(|h| format!("- {}", h.snippet())).collect();
    format!("[{query}]\n{}", lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snippet_joins_title_and_description() {
        let hit = SearchHit {
            title: "Azure Resort".into(),
            description: "Beachfront resort in Phuket".into(),
        };
        assert_eq!(hit.snippet(), "Azure Resort: Beachfront resort in Phuket");
    }

    #[test]
    fn summarize_handles_empty_results() {
        assert_eq!(summarize_hits("q", &[]), "[q] no results");
    }

    #[test]
    fn response_parses_nested_web_results() {
        let raw = r#"{"web":{"results":[{"title":"A","description":"B"},{"title":"C","description":"D"}]}}"#;
        let parsed: SearchResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.web.results.len(), 2);
        assert_eq!(parsed.web.results[0].snippet(), "A: B");
    }
}
