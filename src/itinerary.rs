//! Itinerary estimation: combines the soonest non-cancelled departures of the
//! source lines with static leg durations into ranked route options.

use std::cmp::Ordering;
use std::ops::Add;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;

use crate::config::{self, lines};
use crate::departures::{Departure, DestinationMatch, Normalizer, VisitFilter};
use crate::prim::siri::MonitoredStopVisit;

/// Travel time in whole minutes, with an explicit "cannot currently be
/// computed" sentinel. `Unknown` absorbs through addition and sorts last; it
/// is never rendered (routes carrying it are filtered out, not shown as N/A).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eta {
    Minutes(i64),
    Unknown,
}

impl Eta {
    pub fn finite(self) -> Option<i64> {
        match self {
            Eta::Minutes(m) => Some(m),
            Eta::Unknown => None,
        }
    }
}

impl Add for Eta {
    type Output = Eta;

    fn add(self, rhs: Eta) -> Eta {
        match (self, rhs) {
            (Eta::Minutes(a), Eta::Minutes(b)) => Eta::Minutes(a + b),
            _ => Eta::Unknown,
        }
    }
}

impl Add<i64> for Eta {
    type Output = Eta;

    fn add(self, rhs: i64) -> Eta {
        self + Eta::Minutes(rhs)
    }
}

impl Ord for Eta {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Eta::Minutes(a), Eta::Minutes(b)) => a.cmp(b),
            (Eta::Minutes(_), Eta::Unknown) => Ordering::Less,
            (Eta::Unknown, Eta::Minutes(_)) => Ordering::Greater,
            (Eta::Unknown, Eta::Unknown) => Ordering::Equal,
        }
    }
}

impl PartialOrd for Eta {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RouteOption {
    pub mode: &'static str,
    pub description: &'static str,
    pub minutes: i64,
    pub best: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RouteSet {
    pub destination: &'static str,
    pub options: Vec<RouteOption>,
}

/// First non-cancelled departure for the line, soonest first.
pub fn next_departure(
    normalizer: &Normalizer,
    visits: &[MonitoredStopVisit],
    now: DateTime<Utc>,
    line_ref: &str,
    destination: Option<&DestinationMatch>,
) -> Option<Departure> {
    let filter = VisitFilter {
        line_ref: Some(line_ref),
        destination,
        drop_cancelled: true,
    };
    normalizer
        .normalize(visits, now, &filter)
        .into_iter()
        .min_by_key(|d| d.remaining_minutes)
}

fn wait_time(departure: Option<Departure>) -> Eta {
    match departure {
        Some(d) => Eta::Minutes(d.remaining_minutes),
        None => Eta::Unknown,
    }
}

/// Sorts ascending, drops the unknowns, marks the first survivor best.
fn rank(candidates: Vec<(&'static str, &'static str, Eta)>) -> Vec<RouteOption> {
    let mut candidates = candidates;
    candidates.sort_by_key(|(_, _, eta)| *eta);

    candidates
        .into_iter()
        .filter_map(|(mode, description, eta)| {
            eta.finite().map(|minutes| (mode, description, minutes))
        })
        .enumerate()
        .map(|(index, (mode, description, minutes))| RouteOption {
            mode,
            description,
            minutes,
            best: index == 0,
        })
        .collect()
}

/// Owns the compiled destination matchers; construct once per process.
pub struct RoutePlanner {
    towards_joinville: DestinationMatch,
    towards_gare_de_lyon: DestinationMatch,
    towards_paris: DestinationMatch,
}

impl RoutePlanner {
    pub fn new() -> Self {
        RoutePlanner {
            towards_joinville: DestinationMatch::Matches(
                Regex::new("(?i)Joinville").expect("valid pattern"),
            ),
            towards_gare_de_lyon: DestinationMatch::Matches(
                Regex::new("(?i)Gare de Lyon").expect("valid pattern"),
            ),
            towards_paris: DestinationMatch::Excludes(
                Regex::new("(?i)Boissy|Marne").expect("valid pattern"),
            ),
        }
    }

    /// Ranked route sets for the board's three destinations.
    ///
    /// `bus_visits` is the Bus 77 feed at the hippodrome stop, `rer_visits`
    /// the RER A feed at Joinville. Either may be absent (source down);
    /// affected routes degrade to `Unknown` and disappear from the output.
    pub fn estimate_routes(
        &self,
        normalizer: &Normalizer,
        bus_visits: Option<&[MonitoredStopVisit]>,
        rer_visits: Option<&[MonitoredStopVisit]>,
        now: DateTime<Utc>,
    ) -> Vec<RouteSet> {
        let legs = &config::LEGS;

        let bus_to_joinville = wait_time(bus_visits.and_then(|v| {
            next_departure(normalizer, v, now, lines::BUS_77, Some(&self.towards_joinville))
        }));
        let bus_to_gare_de_lyon = wait_time(bus_visits.and_then(|v| {
            next_departure(
                normalizer,
                v,
                now,
                lines::BUS_77,
                Some(&self.towards_gare_de_lyon),
            )
        }));
        let rer_to_paris = wait_time(rer_visits.and_then(|v| {
            next_departure(normalizer, v, now, lines::RER_A, Some(&self.towards_paris))
        }));

        let bus_then_rer =
            bus_to_joinville + legs.bus_hippodrome_to_joinville + legs.transfer + rer_to_paris;

        let joinville = rank(vec![
            (
                "bus",
                "Bus 77 (vers Joinville)",
                bus_to_joinville + legs.bus_hippodrome_to_joinville,
            ),
            ("walk", "À pied", Eta::Minutes(legs.walk_to_joinville)),
        ]);

        let gare_de_lyon = rank(vec![
            (
                "bus",
                "Bus 77 (direct)",
                bus_to_gare_de_lyon + legs.bus_hippodrome_to_gare_de_lyon,
            ),
            (
                "bus_rer",
                "Bus 77 + RER A",
                bus_then_rer + legs.rer_joinville_to_gare_de_lyon,
            ),
            ("velib", "Vélib'", Eta::Minutes(legs.velib_to_gare_de_lyon)),
        ]);

        let chatelet = rank(vec![
            (
                "bus_rer",
                "Bus 77 + RER A",
                bus_then_rer + legs.rer_joinville_to_chatelet,
            ),
            ("velib", "Vélib'", Eta::Minutes(legs.velib_to_chatelet)),
        ]);

        vec![
            RouteSet {
                destination: "Rejoindre Joinville RER",
                options: joinville,
            },
            RouteSet {
                destination: "Aller à Gare de Lyon",
                options: gare_de_lyon,
            },
            RouteSet {
                destination: "Aller à Châtelet",
                options: chatelet,
            },
        ]
    }
}

impl Default for RoutePlanner {
    fn default() -> Self {
        RoutePlanner::new()
    }
}
