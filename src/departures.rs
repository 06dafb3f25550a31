//! Departure normalization and grouping, the realtime core of the board.
//!
//! Raw monitored-stop visits come in as deeply optional SIRI trees; this
//! module turns them into [`Departure`] values and groups them for display,
//! either per destination (single-line widgets) or per line then destination
//! (hub widgets).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use chrono_tz::Europe::Paris;
use regex::Regex;
use serde::Serialize;

use crate::config::{self, TransportWidget};
use crate::prim::siri::{parse_time, MonitoredStopVisit};

/// Departures kept per destination group.
pub const MAX_DEPARTURES: usize = 3;
/// A departure later than this many minutes behind schedule is flagged.
pub const DELAY_THRESHOLD_MIN: i64 = 2;

const DEFAULT_DESTINATION: &str = "Terminus";

/// One normalized departure, recomputed from scratch on every poll.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Departure {
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub journey_ref: Option<String>,
    pub destination: String,
    pub remaining_minutes: i64,
    pub delay_minutes: i64,
    pub is_cancelled: bool,
    pub is_delayed: bool,
    /// Expected (or aimed) departure rendered as `HH:mm`, Paris time.
    pub expected_time: String,
}

/// Destination predicate for the itinerary path.
#[derive(Debug, Clone)]
pub enum DestinationMatch {
    Matches(Regex),
    Excludes(Regex),
}

impl DestinationMatch {
    pub fn accepts(&self, destination: &str) -> bool {
        match self {
            DestinationMatch::Matches(re) => re.is_match(destination),
            DestinationMatch::Excludes(re) => !re.is_match(destination),
        }
    }
}

/// What to keep while normalizing.
///
/// The display path keeps cancelled visits (they are rendered struck
/// through); the itinerary path drops them, since a cancelled run can never
/// be "the next departure".
pub struct VisitFilter<'a> {
    pub line_ref: Option<&'a str>,
    pub destination: Option<&'a DestinationMatch>,
    pub drop_cancelled: bool,
}

impl Default for VisitFilter<'_> {
    fn default() -> Self {
        VisitFilter {
            line_ref: None,
            destination: None,
            drop_cancelled: false,
        }
    }
}

/// Owns the compiled cancellation pattern; construct once per process.
pub struct Normalizer {
    cancelled: Regex,
}

impl Normalizer {
    pub fn new() -> Self {
        Normalizer {
            cancelled: Regex::new(r"(?i)supprim|cancel").expect("valid cancellation pattern"),
        }
    }

    /// Normalizes a visit list, preserving upstream order.
    ///
    /// `now` is sampled once by the caller so that every remaining-time in
    /// one pass is computed against the same instant.
    pub fn normalize(
        &self,
        visits: &[MonitoredStopVisit],
        now: DateTime<Utc>,
        filter: &VisitFilter,
    ) -> Vec<Departure> {
        visits
            .iter()
            .filter_map(|visit| self.departure(visit, now, filter))
            .collect()
    }

    fn departure(
        &self,
        visit: &MonitoredStopVisit,
        now: DateTime<Utc>,
        filter: &VisitFilter,
    ) -> Option<Departure> {
        let journey = visit.monitored_vehicle_journey.as_ref()?;

        let line_ref = journey
            .line_ref
            .as_ref()
            .map(|v| v.value.as_str())
            .unwrap_or("");
        if let Some(wanted) = filter.line_ref {
            if line_ref != wanted {
                return None;
            }
        }

        let destination = journey
            .destination_name
            .as_ref()
            .and_then(|names| names.first())
            .map(|v| v.value.trim())
            .filter(|v| !v.is_empty())
            .unwrap_or(DEFAULT_DESTINATION)
            .to_string();
        if let Some(matcher) = filter.destination {
            if !matcher.accepts(&destination) {
                return None;
            }
        }

        let call = journey.monitored_call.as_ref()?;
        let aimed = call.aimed_departure_time.as_deref().and_then(parse_time);
        let expected = call
            .expected_departure_time
            .as_deref()
            .and_then(parse_time)
            .or(aimed);
        // A visit with neither timestamp is dropped, never defaulted.
        let expected = expected?;
        let aimed = aimed.unwrap_or(expected);

        let remaining_minutes = minutes_between(now, expected.with_timezone(&Utc));
        let delay_minutes = minutes_between(aimed.with_timezone(&Utc), expected.with_timezone(&Utc));

        let notes = journey
            .journey_note
            .as_ref()
            .map(|notes| {
                notes
                    .iter()
                    .map(|n| n.value.as_str())
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .unwrap_or_default();
        let status = call.departure_status.as_deref().unwrap_or("");
        let is_cancelled = self.cancelled.is_match(status) || self.cancelled.is_match(&notes);
        if filter.drop_cancelled && is_cancelled {
            return None;
        }

        // Deterministic composite fallback so list reconciliation stays
        // stable when the upstream omits the journey ref.
        let key = journey.dated_vehicle_journey_ref.clone().unwrap_or_else(|| {
            format!("{}|{}|{}", line_ref, destination, aimed.to_rfc3339())
        });

        Some(Departure {
            key,
            journey_ref: journey.dated_vehicle_journey_ref.clone(),
            destination,
            remaining_minutes,
            delay_minutes,
            is_cancelled,
            is_delayed: delay_minutes > DELAY_THRESHOLD_MIN,
            expected_time: expected.with_timezone(&Paris).format("%H:%M").to_string(),
        })
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Normalizer::new()
    }
}

/// Whole minutes from `from` to `to`, clamped at zero.
fn minutes_between(from: DateTime<Utc>, to: DateTime<Utc>) -> i64 {
    let seconds = (to - from).num_seconds();
    ((seconds as f64 / 60.0).round() as i64).max(0)
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DestinationGroup {
    pub destination: String,
    pub departures: Vec<Departure>,
}

/// Groups departures by destination label, first-seen order, capped at
/// [`MAX_DEPARTURES`] each. Destinations that end up empty are not emitted.
pub fn group_by_destination(departures: Vec<Departure>) -> Vec<DestinationGroup> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<Departure>> = HashMap::new();

    for departure in departures {
        if !groups.contains_key(&departure.destination) {
            order.push(departure.destination.clone());
        }
        groups
            .entry(departure.destination.clone())
            .or_default()
            .push(departure);
    }

    order
        .into_iter()
        .filter_map(|destination| {
            let mut departures = groups.remove(&destination)?;
            departures.truncate(MAX_DEPARTURES);
            Some(DestinationGroup {
                destination,
                departures,
            })
        })
        .collect()
}

/// Groups raw visits by line ref, first-seen order, for hub widgets.
pub fn group_by_line(visits: &[MonitoredStopVisit]) -> Vec<(String, Vec<&MonitoredStopVisit>)> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<&MonitoredStopVisit>> = HashMap::new();

    for visit in visits {
        let Some(line_ref) = visit.line_ref() else {
            continue;
        };
        if !groups.contains_key(line_ref) {
            order.push(line_ref.to_string());
        }
        groups.entry(line_ref.to_string()).or_default().push(visit);
    }

    order
        .into_iter()
        .map(|line_ref| {
            let visits = groups.remove(&line_ref).unwrap_or_default();
            (line_ref, visits)
        })
        .collect()
}

/// Human label for a line ref, with a synthesized fallback for unknown refs.
pub fn line_label(line_ref: &str) -> String {
    match config::line_key(line_ref) {
        Some("RERA") => "RER A".to_string(),
        Some(key) if key.starts_with("BUS_") => format!("Bus {}", &key[4..]),
        Some(key) if key.starts_with('N') => format!("Noctilien {}", key),
        Some(key) => key.to_string(),
        None => {
            // Last four characters before the trailing colon of the raw ref.
            let chars: Vec<char> = line_ref.chars().collect();
            let slice = if chars.len() >= 5 {
                chars[chars.len() - 5..chars.len() - 1].iter().collect()
            } else {
                line_ref.to_string()
            };
            format!("Ligne {}", slice)
        }
    }
}

/// One line's board: label plus its destination groups.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LineBoard {
    pub line_ref: String,
    pub label: String,
    pub destinations: Vec<DestinationGroup>,
}

/// Builds the departure board for one widget from its latest visit list.
pub fn board_view(
    normalizer: &Normalizer,
    widget: &TransportWidget,
    visits: &[MonitoredStopVisit],
    now: DateTime<Utc>,
) -> Vec<LineBoard> {
    match widget.line_ref {
        Some(line_ref) => {
            let filter = VisitFilter {
                line_ref: Some(line_ref),
                ..Default::default()
            };
            let departures = normalizer.normalize(visits, now, &filter);
            let destinations = group_by_destination(departures);
            if destinations.is_empty() {
                vec![]
            } else {
                vec![LineBoard {
                    line_ref: line_ref.to_string(),
                    label: widget.label.to_string(),
                    destinations,
                }]
            }
        }
        None => group_by_line(visits)
            .into_iter()
            .filter_map(|(line_ref, line_visits)| {
                let filter = VisitFilter {
                    line_ref: Some(line_ref.as_str()),
                    ..Default::default()
                };
                let owned: Vec<MonitoredStopVisit> =
                    line_visits.into_iter().cloned().collect();
                let departures = normalizer.normalize(&owned, now, &filter);
                let destinations = group_by_destination(departures);
                if destinations.is_empty() {
                    return None;
                }
                Some(LineBoard {
                    label: line_label(&line_ref),
                    line_ref,
                    destinations,
                })
            })
            .collect(),
    }
}

#[cfg(test)]
mod test {
    use chrono::TimeZone;

    use super::*;
    use crate::prim::siri::{
        Many, MonitoredCall, MonitoredVehicleJourney, SiriValue,
    };

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 5, 11, 0, 0).unwrap()
    }

    fn visit(
        line_ref: &str,
        destination: Option<&str>,
        aimed: Option<&str>,
        expected: Option<&str>,
        status: &str,
        note: Option<&str>,
    ) -> MonitoredStopVisit {
        MonitoredStopVisit {
            monitoring_ref: None,
            monitored_vehicle_journey: Some(MonitoredVehicleJourney {
                line_ref: Some(SiriValue {
                    value: line_ref.to_string(),
                }),
                direction_ref: None,
                destination_name: destination.map(|d| {
                    Many::Many(vec![SiriValue {
                        value: d.to_string(),
                    }])
                }),
                monitored_call: Some(MonitoredCall {
                    aimed_departure_time: aimed.map(String::from),
                    expected_departure_time: expected.map(String::from),
                    departure_status: Some(status.to_string()),
                }),
                dated_vehicle_journey_ref: None,
                journey_note: note.map(|n| {
                    Many::One(SiriValue {
                        value: n.to_string(),
                    })
                }),
            }),
        }
    }

    #[test]
    fn test_line_and_destination_filter() {
        let visits = vec![visit(
            "A",
            Some("Boissy"),
            Some("2024-03-05T12:00:00+01:00"),
            Some("2024-03-05T12:03:00+01:00"),
            "",
            None,
        )];
        let normalizer = Normalizer::new();

        let excludes = DestinationMatch::Excludes(Regex::new("(?i)Boissy").unwrap());
        let filter = VisitFilter {
            line_ref: Some("A"),
            destination: Some(&excludes),
            drop_cancelled: false,
        };
        assert!(normalizer.normalize(&visits, now(), &filter).is_empty());

        let filter = VisitFilter {
            line_ref: Some("B"),
            ..Default::default()
        };
        assert!(normalizer.normalize(&visits, now(), &filter).is_empty());

        let filter = VisitFilter {
            line_ref: Some("A"),
            ..Default::default()
        };
        assert_eq!(normalizer.normalize(&visits, now(), &filter).len(), 1);
    }

    #[test]
    fn test_minutes_never_negative() {
        // Expected in the past and earlier than aimed.
        let visits = vec![visit(
            "A",
            Some("Paris"),
            Some("2024-03-05T11:30:00+01:00"),
            Some("2024-03-05T11:20:00+01:00"),
            "",
            None,
        )];
        let departures = Normalizer::new().normalize(&visits, now(), &VisitFilter::default());
        assert_eq!(departures.len(), 1);
        assert_eq!(departures[0].remaining_minutes, 0);
        assert_eq!(departures[0].delay_minutes, 0);
        assert!(!departures[0].is_delayed);
    }

    #[test]
    fn test_delay_and_remaining() {
        // Aimed 12:00, expected 12:03, now 11:00 UTC = 12:00 Paris.
        let visits = vec![visit(
            "A",
            Some("Paris"),
            Some("2024-03-05T12:00:00+01:00"),
            Some("2024-03-05T12:03:00+01:00"),
            "",
            None,
        )];
        let departures = Normalizer::new().normalize(&visits, now(), &VisitFilter::default());
        assert_eq!(departures[0].remaining_minutes, 3);
        assert_eq!(departures[0].delay_minutes, 3);
        assert!(departures[0].is_delayed);
        assert_eq!(departures[0].expected_time, "12:03");
    }

    #[test]
    fn test_missing_timestamps_dropped() {
        let visits = vec![
            visit("A", Some("Paris"), None, None, "", None),
            visit(
                "A",
                Some("Paris"),
                None,
                Some("2024-03-05T12:10:00+01:00"),
                "",
                None,
            ),
            visit("A", Some("Paris"), Some("not a date"), None, "", None),
        ];
        let departures = Normalizer::new().normalize(&visits, now(), &VisitFilter::default());
        // Only the visit with a parseable expected time survives.
        assert_eq!(departures.len(), 1);
        assert_eq!(departures[0].remaining_minutes, 10);
        assert_eq!(departures[0].delay_minutes, 0);
    }

    #[test]
    fn test_cancellation_from_journey_note() {
        let visits = vec![visit(
            "A",
            Some("Paris"),
            Some("2024-03-05T12:00:00+01:00"),
            None,
            "",
            Some("Course supprimée"),
        )];
        let normalizer = Normalizer::new();

        // Display path keeps the cancelled visit.
        let kept = normalizer.normalize(&visits, now(), &VisitFilter::default());
        assert_eq!(kept.len(), 1);
        assert!(kept[0].is_cancelled);

        // Itinerary path drops it.
        let filter = VisitFilter {
            drop_cancelled: true,
            ..Default::default()
        };
        assert!(normalizer.normalize(&visits, now(), &filter).is_empty());
    }

    #[test]
    fn test_cancellation_from_status() {
        let visits = vec![visit(
            "A",
            Some("Paris"),
            Some("2024-03-05T12:00:00+01:00"),
            None,
            "CANCELLED",
            None,
        )];
        let departures = Normalizer::new().normalize(&visits, now(), &VisitFilter::default());
        assert!(departures[0].is_cancelled);
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let visits = vec![
            visit(
                "A",
                Some("Gare de Lyon"),
                Some("2024-03-05T12:04:00+01:00"),
                None,
                "",
                None,
            ),
            visit(
                "A",
                Some("Gare de Lyon"),
                Some("2024-03-05T12:11:00+01:00"),
                None,
                "",
                None,
            ),
        ];
        let normalizer = Normalizer::new();
        let instant = now();
        let first = normalizer.normalize(&visits, instant, &VisitFilter::default());
        let second = normalizer.normalize(&visits, instant, &VisitFilter::default());
        assert_eq!(first, second);
    }

    #[test]
    fn test_composite_key_is_deterministic() {
        let visits = vec![visit(
            "A",
            Some("Paris"),
            Some("2024-03-05T12:00:00+01:00"),
            None,
            "",
            None,
        )];
        let normalizer = Normalizer::new();
        let a = normalizer.normalize(&visits, now(), &VisitFilter::default());
        let b = normalizer.normalize(&visits, now(), &VisitFilter::default());
        assert_eq!(a[0].key, b[0].key);
        assert!(a[0].key.contains("Paris"));
    }

    #[test]
    fn test_destination_group_cap_and_order() {
        let mut visits = vec![];
        for minute in [4, 11, 20, 31] {
            visits.push(visit(
                "A",
                Some("Gare de Lyon"),
                Some(&format!("2024-03-05T12:{:02}:00+01:00", minute)),
                None,
                "",
                None,
            ));
        }
        visits.push(visit(
            "A",
            Some("Boissy"),
            Some("2024-03-05T12:07:00+01:00"),
            None,
            "",
            None,
        ));

        let departures = Normalizer::new().normalize(&visits, now(), &VisitFilter::default());
        let groups = group_by_destination(departures);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].destination, "Gare de Lyon");
        assert_eq!(groups[0].departures.len(), MAX_DEPARTURES);
        assert_eq!(
            groups[0]
                .departures
                .iter()
                .map(|d| d.remaining_minutes)
                .collect::<Vec<_>>(),
            vec![4, 11, 20]
        );
        assert_eq!(groups[1].destination, "Boissy");
    }

    #[test]
    fn test_default_destination_label() {
        let visits = vec![visit(
            "A",
            None,
            Some("2024-03-05T12:00:00+01:00"),
            None,
            "",
            None,
        )];
        let departures = Normalizer::new().normalize(&visits, now(), &VisitFilter::default());
        assert_eq!(departures[0].destination, "Terminus");
    }

    #[test]
    fn test_group_by_line_first_seen_order() {
        let visits = vec![
            visit("B", Some("X"), Some("2024-03-05T12:00:00+01:00"), None, "", None),
            visit("A", Some("Y"), Some("2024-03-05T12:01:00+01:00"), None, "", None),
            visit("B", Some("X"), Some("2024-03-05T12:02:00+01:00"), None, "", None),
        ];
        let groups = group_by_line(&visits);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0, "B");
        assert_eq!(groups[0].1.len(), 2);
        assert_eq!(groups[1].0, "A");
    }

    #[test]
    fn test_line_labels() {
        assert_eq!(line_label(config::lines::RER_A), "RER A");
        assert_eq!(line_label(config::lines::BUS_77), "Bus 77");
        assert_eq!(line_label(config::lines::N33), "Noctilien N33");
        assert_eq!(line_label("STIF:Line::C99999:"), "Ligne 9999");
        assert_eq!(line_label("X"), "Ligne X");
    }

    #[test]
    fn test_hub_board_view() {
        let widget = config::widget("hippodrome-hub").unwrap();
        let visits = vec![
            visit(
                config::lines::BUS_77,
                Some("Joinville-le-Pont RER"),
                Some("2024-03-05T12:05:00+01:00"),
                None,
                "",
                None,
            ),
            visit(
                config::lines::N33,
                Some("Paris Gare de Lyon"),
                Some("2024-03-05T12:09:00+01:00"),
                None,
                "",
                None,
            ),
        ];
        let boards = board_view(&Normalizer::new(), widget, &visits, now());
        assert_eq!(boards.len(), 2);
        assert_eq!(boards[0].label, "Bus 77");
        assert_eq!(boards[1].label, "Noctilien N33");
        assert_eq!(boards[0].destinations[0].destination, "Joinville-le-Pont RER");
    }
}
