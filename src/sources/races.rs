//! Race programme for the day at Vincennes, from the PMU programme endpoint.

use chrono::{DateTime, Datelike, Timelike, Utc};
use chrono_tz::Europe::Paris;
use serde::{Deserialize, Serialize};

use crate::config;
use crate::prim::client::PrimClient;
use crate::prim::error::PrimResult;

#[derive(Debug, Clone, Deserialize)]
pub struct Hippodrome {
    #[serde(rename = "libelleCourt")]
    pub libelle_court: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Course {
    #[serde(rename = "numOrdre")]
    pub num_ordre: Option<u32>,
    pub libelle: Option<String>,
    /// Local start time as "14h30".
    #[serde(rename = "heureDepart")]
    pub heure_depart: Option<String>,
    pub distance: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Reunion {
    pub hippodrome: Option<Hippodrome>,
    #[serde(default)]
    pub courses: Vec<Course>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Programme {
    #[serde(default)]
    pub reunions: Vec<Reunion>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PmuResponse {
    pub programme: Option<Programme>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CourseView {
    pub number: u32,
    pub label: String,
    pub time: String,
    pub distance: Option<u32>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RacesView {
    pub next: Option<CourseView>,
    /// Countdown to the next race, in whole minutes.
    pub minutes_to_next: Option<u32>,
    pub following: Vec<CourseView>,
    pub remaining: usize,
}

/// Programme URL for the given instant, dated in Paris local time.
pub fn programme_url(now: DateTime<Utc>) -> String {
    let local = now.with_timezone(&Paris);
    format!(
        "{}{:02}{:02}{}",
        config::PMU_PROGRAMME_BASE_URL,
        local.day(),
        local.month(),
        local.year()
    )
}

pub async fn fetch(client: &PrimClient) -> PrimResult<PmuResponse> {
    client.get_proxied_json(&programme_url(Utc::now())).await
}

/// "14h30" as minutes since local midnight.
fn minutes_of_day(depart: &str) -> Option<u32> {
    let (hours, minutes) = depart.split_once('h')?;
    let hours: u32 = hours.trim().parse().ok()?;
    let minutes: u32 = minutes.trim().parse().ok()?;
    Some(hours * 60 + minutes)
}

fn course_view(course: &Course) -> Option<CourseView> {
    Some(CourseView {
        number: course.num_ordre?,
        label: course.libelle.clone().unwrap_or_default(),
        time: course.heure_depart.clone()?,
        distance: course.distance,
    })
}

/// Upcoming races at the configured venue: the next one, up to three after
/// it, and how many more remain today. Races whose start time has passed
/// (strictly, in Paris local time) are dropped.
pub fn view(response: &PmuResponse, now: DateTime<Utc>) -> Option<RacesView> {
    let local = now.with_timezone(&Paris);
    let now_minutes = local.hour() * 60 + local.minute();

    let reunion = response
        .programme
        .as_ref()?
        .reunions
        .iter()
        .find(|r| {
            r.hippodrome
                .as_ref()
                .and_then(|h| h.libelle_court.as_deref())
                .map(|l| l.to_uppercase() == config::PMU_VENUE)
                .unwrap_or(false)
        })?;

    let mut upcoming: Vec<&Course> = reunion
        .courses
        .iter()
        .filter(|c| {
            c.heure_depart
                .as_deref()
                .and_then(minutes_of_day)
                .map(|m| m > now_minutes)
                .unwrap_or(false)
        })
        .collect();
    upcoming.sort_by_key(|c| c.heure_depart.as_deref().and_then(minutes_of_day));

    let mut views = upcoming.iter().filter_map(|c| course_view(c));
    let next = views.next()?;
    let minutes_to_next = minutes_of_day(&next.time).map(|m| m - now_minutes);
    let following: Vec<CourseView> = views.by_ref().take(3).collect();
    let remaining = views.count();

    Some(RacesView {
        next: Some(next),
        minutes_to_next,
        following,
        remaining,
    })
}
