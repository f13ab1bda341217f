//! Faction API client and wire types
//!
//! Two reads feed every run: the member roster and the organized-crime
//! roster. They are independent, so [`TornClient::fetch_snapshot`] issues
//! them together.

use serde::de::{self, DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ApiConfig;
use crate::error::{Error, Result};
use crate::status::RawStatus;

/// One faction member as returned by the roster endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Member {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub revive_setting: String,
    #[serde(default)]
    pub status: MemberStatus,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MemberStatus {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default)]
    pub state: String,
}

impl Member {
    pub fn raw_status(&self) -> RawStatus<'_> {
        RawStatus {
            description: &self.status.description,
            details: self.status.details.as_deref(),
            state: &self.status.state,
            revive_setting: &self.revive_setting,
        }
    }
}

/// One organized crime as returned by the crimes endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Crime {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub difficulty: Option<u32>,
    #[serde(default)]
    pub ready_at: Option<i64>,
    #[serde(default)]
    pub executed_at: Option<i64>,
    #[serde(default)]
    pub expired_at: Option<i64>,
    #[serde(default)]
    pub previous_crime_id: Option<u64>,
    #[serde(default)]
    pub slots: Vec<CrimeSlot>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CrimeSlot {
    #[serde(deserialize_with = "string_or_number")]
    pub position_id: String,
    #[serde(default)]
    pub position: Option<String>,
    #[serde(default)]
    pub position_number: Option<u32>,
    #[serde(default)]
    pub user: Option<SlotUser>,
    #[serde(default)]
    pub checkpoint_pass_rate: Option<serde_json::Number>,
    #[serde(default)]
    pub item_requirement: Option<ItemRequirement>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SlotUser {
    pub id: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ItemRequirement {
    #[serde(default)]
    pub is_available: Option<bool>,
}

/// Both rosters from one poll.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FactionSnapshot {
    pub members: Vec<Member>,
    pub crimes: Vec<Crime>,
}

/// Error payload the API returns with a 200 status.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiError {
    pub code: i64,
    pub error: String,
}

#[derive(Debug, Deserialize)]
struct MembersResponse {
    #[serde(default)]
    members: Vec<Member>,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct CrimesResponse {
    #[serde(default)]
    crimes: Vec<Crime>,
    #[serde(default)]
    error: Option<ApiError>,
}

fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(value) => Ok(value),
        serde_json::Value::Number(value) => Ok(value.to_string()),
        other => Err(de::Error::custom(format!(
            "expected string or number, got {other}"
        ))),
    }
}

/// HTTP client for the faction endpoints.
#[derive(Debug, Clone)]
pub struct TornClient {
    http: reqwest::Client,
    base_url: String,
    faction_id: u64,
    comment: String,
    key: String,
}

impl TornClient {
    pub fn new(config: &ApiConfig, key: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("ocwatch/", env!("CARGO_PKG_VERSION")))
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            faction_id: config.faction_id,
            comment: config.comment.clone(),
            key: key.into(),
        })
    }

    /// Members endpoint; faction id 0 asks for the key's own faction.
    pub fn members_url(&self) -> String {
        match self.faction_id {
            0 => format!("{}/faction/members", self.base_url),
            id => format!("{}/faction/{id}/members", self.base_url),
        }
    }

    pub fn crimes_url(&self) -> String {
        format!("{}/faction/crimes", self.base_url)
    }

    /// Fetch both rosters concurrently. Either failure fails the poll.
    pub async fn fetch_snapshot(&self) -> Result<FactionSnapshot> {
        let (members, crimes) = tokio::try_join!(self.fetch_members(), self.fetch_crimes())?;
        debug!(members = members.len(), crimes = crimes.len(), "fetched faction snapshot");
        Ok(FactionSnapshot { members, crimes })
    }

    pub async fn fetch_members(&self) -> Result<Vec<Member>> {
        let url = self.members_url();
        let body: MembersResponse = self
            .get("members", &url, &[("striptags", "true")])
            .await?;
        check_api_error("members", body.error)?;
        Ok(body.members)
    }

    pub async fn fetch_crimes(&self) -> Result<Vec<Crime>> {
        let url = self.crimes_url();
        let body: CrimesResponse = self
            .get("crimes", &url, &[("offset", "0"), ("sort", "DESC")])
            .await?;
        check_api_error("crimes", body.error)?;
        Ok(body.crimes)
    }

    async fn get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        url: &str,
        params: &[(&str, &str)],
    ) -> Result<T> {
        let response = self
            .http
            .get(url)
            .query(params)
            .query(&[("comment", self.comment.as_str()), ("key", self.key.as_str())])
            .send()
            .await
            .map_err(|err| Error::Http(err.without_url()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Upstream {
                endpoint: endpoint.to_string(),
                message: format!("HTTP {status}"),
                code: Some(i64::from(status.as_u16())),
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|err| Error::Http(err.without_url()))
    }
}

fn check_api_error(endpoint: &str, error: Option<ApiError>) -> Result<()> {
    match error {
        Some(err) => Err(Error::Upstream {
            endpoint: endpoint.to_string(),
            message: err.error,
            code: Some(err.code),
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn member_roster_parses_and_defaults() {
        let body = r#"{
            "members": [
                {
                    "id": 1,
                    "name": "alpha",
                    "revive_setting": "Everyone",
                    "status": {
                        "description": "Traveling to Mexico",
                        "details": null,
                        "state": "Traveling",
                        "color": "blue",
                        "until": null
                    }
                },
                { "id": 2, "name": "beta" }
            ]
        }"#;
        let parsed: MembersResponse = serde_json::from_str(body).expect("parse");
        assert!(parsed.error.is_none());
        assert_eq!(parsed.members.len(), 2);
        assert_eq!(parsed.members[0].raw_status().state, "Traveling");
        assert_eq!(parsed.members[1].status, MemberStatus::default());
    }

    #[test]
    fn crime_slots_accept_numeric_position_ids() {
        let body = r#"{
            "crimes": [{
                "id": 77,
                "name": "Mob Mentality",
                "status": "Planning",
                "ready_at": 1000,
                "executed_at": null,
                "slots": [
                    {
                        "position": "Looter",
                        "position_id": 3,
                        "position_number": 1,
                        "user": { "id": 5, "joined_at": 900 },
                        "checkpoint_pass_rate": 71,
                        "item_requirement": null
                    },
                    { "position_id": "P2", "user": null }
                ]
            }]
        }"#;
        let parsed: CrimesResponse = serde_json::from_str(body).expect("parse");
        let crime = &parsed.crimes[0];
        assert_eq!(crime.id, Some(77));
        assert_eq!(crime.slots[0].position_id, "3");
        assert_eq!(crime.slots[0].user.as_ref().map(|u| u.id), Some(5));
        assert!(crime.slots[0].item_requirement.is_none());
        assert_eq!(crime.slots[1].position_id, "P2");
    }

    #[test]
    fn api_error_payload_becomes_upstream_error() {
        let body = r#"{ "error": { "code": 2, "error": "Incorrect key" } }"#;
        let parsed: MembersResponse = serde_json::from_str(body).expect("parse");
        let err = check_api_error("members", parsed.error).expect_err("error payload");
        match err {
            Error::Upstream { code, message, .. } => {
                assert_eq!(code, Some(2));
                assert_eq!(message, "Incorrect key");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn urls_follow_faction_config() {
        let mut config = ApiConfig::default();
        config.base_url = "https://api.example.test/v2/".to_string();
        config.faction_id = 35840;
        let client = TornClient::new(&config, "k").expect("client");
        assert_eq!(
            client.members_url(),
            "https://api.example.test/v2/faction/35840/members"
        );
        assert_eq!(client.crimes_url(), "https://api.example.test/v2/faction/crimes");

        config.faction_id = 0;
        let client = TornClient::new(&config, "k").expect("client");
        assert_eq!(client.members_url(), "https://api.example.test/v2/faction/members");
    }
}
