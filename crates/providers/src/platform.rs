//! Music-platform GraphQL adapter. Authenticates with the pre-shared API
//! token and covers exactly the operations the pipeline needs: paginated
//! account listing, zone discovery, remote schedule creation, library
//! add, and source assignment.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use mb_domain::{Error, Result};

const DEFAULT_BASE_URL: &str = "https://api.soundtrackyourbrand.com/v2";
const ACCOUNTS_PAGE_SIZE: u32 = 200;
const ZONES_PAGE_SIZE: u32 = 100;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformAccount {
    pub id: String,
    pub business_name: String,
}

#[derive(Debug, Clone)]
pub struct AccountsPage {
    pub accounts: Vec<PlatformAccount>,
    pub has_next: bool,
    pub end_cursor: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlatformZone {
    pub id: String,
    pub name: String,
    pub location: Option<String>,
}

/// One weekly slot in a remote schedule.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleSlot {
    /// `FREQ=WEEKLY;BYDAY=<MO|TU|WE|TH|FR|SA|SU>`
    pub rrule: String,
    /// `HHMMSS`, venue-local wall clock.
    pub start: String,
    /// Milliseconds; wrap-through-midnight already folded in.
    pub duration: u64,
    pub playlist_ids: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct SchedulePlan {
    pub owner_id: String,
    pub name: String,
    pub description: String,
    pub slots: Vec<ScheduleSlot>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GraphQL documents
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

const ACCOUNTS_QUERY: &str = r#"
query Accounts($first: Int!, $after: String) {
  me {
    accounts(first: $first, after: $after) {
      pageInfo { hasNextPage endCursor }
      edges { node { id businessName } }
    }
  }
}"#;

const ZONES_QUERY: &str = r#"
query Zones($accountId: ID!, $first: Int!) {
  account(id: $accountId) {
    soundZones(first: $first) {
      edges { node { id name location { id name } } }
    }
  }
}"#;

const CREATE_SCHEDULE_MUTATION: &str = r#"
mutation CreateSchedule($input: ScheduleInput!) {
  createSchedule(input: $input) { id }
}"#;

const ADD_TO_LIBRARY_MUTATION: &str = r#"
mutation AddToLibrary($input: AddToMusicLibraryInput!) {
  addToMusicLibrary(input: $input) { id }
}"#;

const ASSIGN_SOURCE_MUTATION: &str = r#"
mutation AssignSource($input: SoundZoneAssignSourceInput!) {
  soundZoneAssignSource(input: $input) { soundZones }
}"#;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Client
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct PlatformClient {
    client: reqwest::Client,
    base_url: String,
    api_token: String,
}

impl PlatformClient {
    pub fn new(api_token: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;
        Ok(Self {
            client,
            base_url: DEFAULT_BASE_URL.into(),
            api_token: api_token.into(),
        })
    }

    async fn graphql(&self, query: &str, variables: Value) -> Result<Value> {
        let resp = self
            .client
            .post(&self.base_url)
            .header("Authorization", format!("Basic {}", self.api_token))
            .header("Content-Type", "application/json")
            .json(&serde_json::json!({ "query": query, "variables": variables }))
            .send()
            .await
            .map_err(|e| Error::Platform(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Platform(format!("HTTP {}", status.as_u16())));
        }

        let body: Value = resp
            .json()
            .await
            .map_err(|e| Error::Platform(e.to_string()))?;
        if let Some(errors) = body.get("errors").and_then(|e| e.as_array()) {
            if !errors.is_empty() {
                let message = errors[0]
                    .get("message")
                    .and_then(|m| m.as_str())
                    .unwrap_or("unknown GraphQL error");
                return Err(Error::Platform(message.to_string()));
            }
        }
        Ok(body.get("data").cloned().unwrap_or(Value::Null))
    }

    /// One 200-account page; walk until `has_next` is false.
    pub async fn accounts_page(&self, cursor: Option<&str>) -> Result<AccountsPage> {
        let data = self
            .graphql(
                ACCOUNTS_QUERY,
                serde_json::json!({ "first": ACCOUNTS_PAGE_SIZE, "after": cursor }),
            )
            .await?;
        Ok(parse_accounts_page(&data))
    }

    /// Sound zones for one account, up to 100.
    pub async fn zones(&self, account_id: &str) -> Result<Vec<PlatformZone>> {
        let data = self
            .graphql(
                ZONES_QUERY,
                serde_json::json!({ "accountId": account_id, "first": ZONES_PAGE_SIZE }),
            )
            .await?;
        Ok(parse_zones(&data))
    }

    /// Create a remote schedule; returns the platform schedule id.
    pub async fn create_schedule(&self, plan: &SchedulePlan) -> Result<String> {
        let data = self
            .graphql(
                CREATE_SCHEDULE_MUTATION,
                serde_json::json!({
                    "input": {
                        "ownerId": plan.owner_id,
                        "name": plan.name,
                        "presentAs": "daily",
                        "description": plan.description,
                        "slots": plan.slots,
                    }
                }),
            )
            .await?;
        data.pointer("/createSchedule/id")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| Error::Platform("createSchedule returned no id".into()))
    }

    /// Best-effort library add; callers log failures and continue.
    pub async fn add_to_music_library(&self, parent: &str, source: &str) -> Result<()> {
        self.graphql(
            ADD_TO_LIBRARY_MUTATION,
            serde_json::json!({ "input": { "parent": parent, "source": source } }),
        )
        .await?;
        Ok(())
    }

    /// Assign a source (playlist or schedule) to one or more sound zones.
    /// The same mutation serves both the executor's per-entry assignment
    /// and the approval flow's schedule bind.
    pub async fn assign_source(&self, zone_ids: &[String], source: &str) -> Result<()> {
        self.graphql(
            ASSIGN_SOURCE_MUTATION,
            serde_json::json!({ "input": { "soundZones": zone_ids, "source": source } }),
        )
        .await?;
        Ok(())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Response parsing
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn parse_accounts_page(data: &Value) -> AccountsPage {
    let connection = data.pointer("/me/accounts");
    let accounts = connection
        .and_then(|c| c.get("edges"))
        .and_then(|e| e.as_array())
        .map(|edges| {
            edges
                .iter()
                .filter_map(|edge| {
                    let node = edge.get("node")?;
                    Some(PlatformAccount {
                        id: node.get("id")?.as_str()?.to_string(),
                        business_name: node
                            .get("businessName")
                            .and_then(|n| n.as_str())
                            .unwrap_or_default()
                            .to_string(),
                    })
                })
                .collect()
        })
        .unwrap_or_default();
    let has_next = connection
        .and_then(|c| c.pointer("/pageInfo/hasNextPage"))
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    let end_cursor = connection
        .and_then(|c| c.pointer("/pageInfo/endCursor"))
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());
    AccountsPage {
        accounts,
        has_next,
        end_cursor,
    }
}

fn parse_zones(data: &Value) -> Vec<PlatformZone> {
    data.pointer("/account/soundZones/edges")
        .and_then(|e| e.as_array())
        .map(|edges| {
            edges
                .iter()
                .filter_map(|edge| {
                    let node = edge.get("node")?;
                    Some(PlatformZone {
                        id: node.get("id")?.as_str()?.to_string(),
                        name: node
                            .get("name")
                            .and_then(|n| n.as_str())
                            .unwrap_or_default()
                            .to_string(),
                        location: node
                            .pointer("/location/name")
                            .and_then(|n| n.as_str())
                            .map(|s| s.to_string()),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accounts_page_parses_connection() {
        let data = serde_json::json!({
            "me": {
                "accounts": {
                    "pageInfo": { "hasNextPage": true, "endCursor": "c2" },
                    "edges": [
                        { "node": { "id": "acc1", "businessName": "Azure Resort" } },
                        { "node": { "id": "acc2", "businessName": "Harbor Cafe" } }
                    ]
                }
            }
        });
        let page = parse_accounts_page(&data);
        assert_eq!(page.accounts.len(), 2);
        assert!(page.has_next);
        assert_eq!(page.end_cursor.as_deref(), Some("c2"));
        assert_eq!(page.accounts[0].business_name, "Azure Resort");
    }

    #[test]
    fn accounts_page_handles_empty_data() {
        let page = parse_accounts_page(&Value::Null);
        assert!(page.accounts.is_empty());
        assert!(!page.has_next);
    }

    #[test]
    fn zones_parse_with_optional_location() {
        let data = serde_json::json!({
            "account": {
                "soundZones": {
                    "edges": [
                        { "node": { "id": "z1", "name": "Lobby", "location": { "id": "l1", "name": "Main Building" } } },
                        { "node": { "id": "z2", "name": "Pool", "location": null } }
                    ]
                }
            }
        });
        let zones = parse_zones(&data);
        assert_eq!(zones.len(), 2);
        assert_eq!(zones[0].location.as_deref(), Some("Main Building"));
        assert!(zones[1].location.is_none());
    }

    #[test]
    fn schedule_slot_serializes_camel_case() {
        let slot = ScheduleSlot {
            rrule: "FREQ=WEEKLY;BYDAY=MO".into(),
            start: "170000".into(),
            duration: 3 * 60 * 60 * 1000,
            playlist_ids: vec!["syb:p1".into()],
        };
        let v = serde_json::to_value(&slot).unwrap();
        assert_eq!(v["rrule"], "FREQ=WEEKLY;BYDAY=MO");
        assert_eq!(v["playlistIds"][0], "syb:p1");
        assert_eq!(v["duration"], 10_800_000);
    }
}
