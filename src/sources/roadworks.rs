//! Disruptive roadworks near the hippodrome, from the Paris open-data API.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::config;
use crate::prim::client::PrimClient;
use crate::prim::error::{PrimError, PrimResult};

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct RoadworkEvent {
    #[serde(rename = "type")]
    pub category: Option<String>,
    pub lieu: Option<String>,
    pub intitule: Option<String>,
    pub datedebut: Option<String>,
    pub datefin: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RoadworksResponse {
    #[serde(default)]
    results: Vec<RoadworkEvent>,
}

fn records_url() -> PrimResult<Url> {
    let mut url =
        Url::parse(config::ROADWORKS_URL).map_err(|e| PrimError::Init(e.to_string()))?;
    url.query_pairs_mut()
        .append_pair("where", config::ROADWORKS_WHERE)
        .append_pair("limit", config::ROADWORKS_LIMIT);
    Ok(url)
}

pub async fn fetch(client: &PrimClient) -> PrimResult<Vec<RoadworkEvent>> {
    let response: RoadworksResponse = client.get_proxied_json(records_url()?.as_str()).await?;
    Ok(response.results)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_records_url_carries_filter_and_limit() {
        let url = records_url().unwrap();
        assert!(url.as_str().starts_with(config::ROADWORKS_URL));

        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert!(pairs.contains(&("where".to_string(), config::ROADWORKS_WHERE.to_string())));
        assert!(pairs.contains(&("limit".to_string(), "10".to_string())));
    }

    #[test]
    fn test_deserialize_results() {
        let payload = r#"{
            "total_count": 2,
            "results": [
                {
                    "type": "Travaux de voirie",
                    "lieu": "Route de la Pyramide",
                    "intitule": "Réfection de chaussée",
                    "datedebut": "2024-03-01",
                    "datefin": "2024-03-20"
                },
                { "intitule": "Élagage" }
            ]
        }"#;

        let response: RoadworksResponse = serde_json::from_str(payload).unwrap();
        assert_eq!(response.results.len(), 2);
        assert_eq!(
            response.results[0].lieu.as_deref(),
            Some("Route de la Pyramide")
        );
        assert_eq!(response.results[1].intitule.as_deref(), Some("Élagage"));
        assert!(response.results[1].category.is_none());
    }

    #[test]
    fn test_missing_results_yield_empty() {
        let response: RoadworksResponse = serde_json::from_str(r#"{ "total_count": 0 }"#).unwrap();
        assert!(response.results.is_empty());
    }
}
