//! SIRI-Lite response shapes as served by the PRIM marketplace endpoints.
//!
//! The upstream omits nested levels freely, so every level that can be absent
//! is an `Option` (or a defaulted `Vec`) rather than a crash at access depth.

use chrono::{DateTime, FixedOffset};
use serde::Deserialize;

/// Tolerates fields that are sometimes a single value, sometimes an array.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Many<T> {
    /// Single value
    One(T),
    /// Array of values
    Many(Vec<T>),
}

impl<T> Many<T> {
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        match self {
            Many::One(val) => std::slice::from_ref(val).iter(),
            Many::Many(vec) => vec.iter(),
        }
    }

    pub fn first(&self) -> Option<&T> {
        self.iter().next()
    }
}

impl<T> From<Many<T>> for Vec<T> {
    fn from(from: Many<T>) -> Self {
        match from {
            Many::One(val) => vec![val],
            Many::Many(vec) => vec,
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct SiriValue {
    #[serde(default)]
    pub value: String,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct SiriResponse {
    #[serde(rename = "Siri")]
    pub siri: Option<Siri>,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct Siri {
    pub service_delivery: Option<ServiceDelivery>,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct ServiceDelivery {
    #[serde(default)]
    pub stop_monitoring_delivery: Vec<StopMonitoringDelivery>,
    #[serde(default)]
    pub general_message_delivery: Vec<GeneralMessageDelivery>,
    #[serde(default)]
    pub vehicle_journey_delivery: Vec<VehicleJourneyDelivery>,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct StopMonitoringDelivery {
    #[serde(default)]
    pub monitored_stop_visit: Vec<MonitoredStopVisit>,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct MonitoredStopVisit {
    pub monitoring_ref: Option<SiriValue>,
    pub monitored_vehicle_journey: Option<MonitoredVehicleJourney>,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct MonitoredVehicleJourney {
    pub line_ref: Option<SiriValue>,
    pub direction_ref: Option<SiriValue>,
    pub destination_name: Option<Many<SiriValue>>,
    pub monitored_call: Option<MonitoredCall>,
    pub dated_vehicle_journey_ref: Option<String>,
    pub journey_note: Option<Many<SiriValue>>,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct MonitoredCall {
    pub aimed_departure_time: Option<String>,
    pub expected_departure_time: Option<String>,
    pub departure_status: Option<String>,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct GeneralMessageDelivery {
    #[serde(default)]
    pub info_message: Vec<InfoMessage>,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct InfoMessage {
    pub content: Option<InfoMessageContent>,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct InfoMessageContent {
    #[serde(default)]
    pub message: Vec<Message>,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct Message {
    pub message_text: Option<Many<SiriValue>>,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct VehicleJourneyDelivery {
    #[serde(default)]
    pub dated_vehicle_journey: Vec<DatedVehicleJourney>,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct DatedVehicleJourney {
    pub calls: Option<Calls>,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct Calls {
    #[serde(default)]
    pub call: Vec<Call>,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct Call {
    pub stop_point_name: Option<Many<SiriValue>>,
    pub aimed_arrival_time: Option<String>,
    pub expected_arrival_time: Option<String>,
}

impl SiriResponse {
    fn service_delivery(&self) -> Option<&ServiceDelivery> {
        self.siri.as_ref()?.service_delivery.as_ref()
    }

    /// Visits of the first stop-monitoring delivery, in upstream order.
    pub fn visits(&self) -> &[MonitoredStopVisit] {
        self.service_delivery()
            .and_then(|sd| sd.stop_monitoring_delivery.first())
            .map(|d| d.monitored_stop_visit.as_slice())
            .unwrap_or_default()
    }

    pub fn into_visits(mut self) -> Vec<MonitoredStopVisit> {
        self.siri
            .take()
            .and_then(|s| s.service_delivery)
            .and_then(|sd| sd.stop_monitoring_delivery.into_iter().next())
            .map(|d| d.monitored_stop_visit)
            .unwrap_or_default()
    }

    pub fn info_messages(&self) -> &[InfoMessage] {
        self.service_delivery()
            .and_then(|sd| sd.general_message_delivery.first())
            .map(|d| d.info_message.as_slice())
            .unwrap_or_default()
    }

    /// Call sequence of the first dated vehicle journey.
    pub fn journey_calls(&self) -> &[Call] {
        self.service_delivery()
            .and_then(|sd| sd.vehicle_journey_delivery.first())
            .and_then(|d| d.dated_vehicle_journey.first())
            .and_then(|j| j.calls.as_ref())
            .map(|c| c.call.as_slice())
            .unwrap_or_default()
    }
}

impl MonitoredStopVisit {
    pub fn line_ref(&self) -> Option<&str> {
        self.monitored_vehicle_journey
            .as_ref()?
            .line_ref
            .as_ref()
            .map(|v| v.value.as_str())
    }

    /// `expected ?? aimed` departure instant, used for chronological merges.
    pub fn departure_instant(&self) -> Option<DateTime<FixedOffset>> {
        let call = self
            .monitored_vehicle_journey
            .as_ref()?
            .monitored_call
            .as_ref()?;
        call.expected_departure_time
            .as_deref()
            .and_then(parse_time)
            .or_else(|| call.aimed_departure_time.as_deref().and_then(parse_time))
    }
}

/// Parses a SIRI timestamp; anything unparseable is a typed absence.
pub fn parse_time(raw: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(raw).ok()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_deserialize_stop_monitoring() {
        let msg = r#"{
            "Siri": {
                "ServiceDelivery": {
                    "StopMonitoringDelivery": [
                        {
                            "MonitoredStopVisit": [
                                {
                                    "MonitoringRef": { "value": "STIF:StopPoint:Q:463641:" },
                                    "MonitoredVehicleJourney": {
                                        "LineRef": { "value": "STIF:Line::C02251:" },
                                        "DestinationName": [ { "value": "Joinville-le-Pont RER" } ],
                                        "DatedVehicleJourneyRef": "STIF:VehicleJourney::abc:",
                                        "MonitoredCall": {
                                            "AimedDepartureTime": "2024-03-05T12:00:00+01:00",
                                            "ExpectedDepartureTime": "2024-03-05T12:03:00+01:00",
                                            "DepartureStatus": "onTime"
                                        }
                                    }
                                }
                            ]
                        }
                    ]
                }
            }
        }"#;

        let response: SiriResponse = serde_json::from_str(msg).unwrap();
        let visits = response.visits();
        assert_eq!(visits.len(), 1);
        assert_eq!(visits[0].line_ref(), Some("STIF:Line::C02251:"));

        let journey = visits[0].monitored_vehicle_journey.as_ref().unwrap();
        let dest = journey.destination_name.as_ref().unwrap().first().unwrap();
        assert_eq!(dest.value, "Joinville-le-Pont RER");
    }

    #[test]
    fn test_missing_levels_yield_empty() {
        let response: SiriResponse =
            serde_json::from_str(r#"{ "Siri": { "ServiceDelivery": {} } }"#).unwrap();
        assert!(response.visits().is_empty());
        assert!(response.info_messages().is_empty());
        assert!(response.journey_calls().is_empty());

        let response: SiriResponse = serde_json::from_str(r#"{}"#).unwrap();
        assert!(response.visits().is_empty());
    }

    #[test]
    fn test_many_single_or_array() {
        let one: Many<SiriValue> = serde_json::from_str(r#"{ "value": "a" }"#).unwrap();
        let many: Many<SiriValue> =
            serde_json::from_str(r#"[ { "value": "a" }, { "value": "b" } ]"#).unwrap();
        assert_eq!(one.iter().count(), 1);
        assert_eq!(many.iter().count(), 2);
        assert_eq!(many.first().unwrap().value, "a");
    }

    #[test]
    fn test_departure_instant_prefers_expected() {
        let visit: MonitoredStopVisit = serde_json::from_str(
            r#"{
                "MonitoredVehicleJourney": {
                    "MonitoredCall": {
                        "AimedDepartureTime": "2024-03-05T12:00:00+01:00",
                        "ExpectedDepartureTime": "2024-03-05T12:05:00+01:00"
                    }
                }
            }"#,
        )
        .unwrap();
        let instant = visit.departure_instant().unwrap();
        assert_eq!(instant.to_rfc3339(), "2024-03-05T12:05:00+01:00");
    }
}
