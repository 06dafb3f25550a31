//! Board configuration: upstream identifiers, widget catalog, leg durations
//! and refresh cadences. These are data, not logic; they mirror the deployed
//! board for the Vincennes hippodrome area.

pub const PRIM_BASE_URL: &str = "https://prim.iledefrance-mobilites.fr";
pub const DEFAULT_PROXY_URL: &str = "https://ratp-proxy.hippodrome-proxy42.workers.dev/";

pub const VELIB_STATUS_URL: &str =
    "https://opendata.paris.fr/api/explore/v2.1/catalog/datasets/velib-disponibilite-en-temps-reel/records";
pub const WEATHER_URL: &str =
    "https://api.open-meteo.com/v1/forecast?latitude=48.827&longitude=2.45&current_weather=true&timezone=Europe%2FParis";
pub const NEWS_FEED_URL: &str = "https://www.lemonde.fr/rss/une.xml";
pub const ROADWORKS_URL: &str =
    "https://opendata.paris.fr/api/explore/v2.1/catalog/datasets/chantiers-perturbants/records";
pub const ROADWORKS_WHERE: &str = "geom within(circle(48.827, 2.45, 2000))";
pub const ROADWORKS_LIMIT: &str = "10";
pub const PMU_PROGRAMME_BASE_URL: &str =
    "https://online.turfinfo.api.pmu.fr/rest/client/1/programme/";
pub const PMU_VENUE: &str = "VINCENNES";

pub mod lines {
    pub const RER_A: &str = "STIF:Line::C01742:";
    pub const BUS_77: &str = "STIF:Line::C02251:";
    pub const BUS_101: &str = "STIF:Line::C01130:";
    pub const BUS_106: &str = "STIF:Line::C01135:";
    pub const BUS_108: &str = "STIF:Line::C01137:";
    pub const BUS_110: &str = "STIF:Line::C01139:";
    pub const BUS_201: &str = "STIF:Line::C01219:";
    pub const N33: &str = "STIF:Line::C01399:";
    pub const N71: &str = "STIF:Line::C01501:";
}

/// Reverse lookup from a line ref to its short configuration key.
pub fn line_key(line_ref: &str) -> Option<&'static str> {
    match line_ref {
        lines::RER_A => Some("RERA"),
        lines::BUS_77 => Some("BUS_77"),
        lines::BUS_101 => Some("BUS_101"),
        lines::BUS_106 => Some("BUS_106"),
        lines::BUS_108 => Some("BUS_108"),
        lines::BUS_110 => Some("BUS_110"),
        lines::BUS_201 => Some("BUS_201"),
        lines::N33 => Some("N33"),
        lines::N71 => Some("N71"),
        _ => None,
    }
}

pub mod stops {
    pub const JOINVILLE_RER_A: &[&str] = &["STIF:StopPoint:Q:22452:", "STIF:StopPoint:Q:22453:"];
    pub const JOINVILLE_GARE: &str = "STIF:StopPoint:Q:39406:";
    pub const JOINVILLE_GALLIENI: &str = "STIF:StopPoint:Q:39407:";
    pub const HIPPODROME: &str = "STIF:StopPoint:Q:463641:";
    pub const ECOLE_DU_BREUIL: &str = "STIF:StopPoint:Q:463644:";
}

#[derive(Debug, Clone, Copy)]
pub struct TransportWidget {
    pub id: &'static str,
    pub label: &'static str,
    /// `None` makes this a hub widget (multi-line view).
    pub line_ref: Option<&'static str>,
    pub stop_refs: &'static [&'static str],
    pub omit_line_refs: &'static [&'static str],
}

pub const TRANSPORT_WIDGETS: &[TransportWidget] = &[
    TransportWidget {
        id: "rer-a",
        label: "RER A",
        line_ref: Some(lines::RER_A),
        stop_refs: stops::JOINVILLE_RER_A,
        omit_line_refs: &[],
    },
    TransportWidget {
        id: "bus-77-hippodrome",
        label: "Bus 77",
        line_ref: Some(lines::BUS_77),
        stop_refs: &[stops::HIPPODROME],
        omit_line_refs: &[],
    },
    TransportWidget {
        id: "joinville-hub-gare",
        label: "Bus - Arrêt Gare",
        line_ref: None,
        stop_refs: &[stops::JOINVILLE_GARE],
        omit_line_refs: &[lines::RER_A],
    },
    TransportWidget {
        id: "joinville-hub-gallieni",
        label: "Bus - Arrêt Av. Gallieni",
        line_ref: None,
        stop_refs: &[stops::JOINVILLE_GALLIENI],
        omit_line_refs: &[lines::RER_A],
    },
    TransportWidget {
        id: "hippodrome-hub",
        label: "Bus - Arrêt Hippodrome",
        line_ref: None,
        stop_refs: &[stops::HIPPODROME],
        omit_line_refs: &[],
    },
    TransportWidget {
        id: "ecole-du-breuil-hub",
        label: "Bus - Arrêt École du Breuil",
        line_ref: None,
        stop_refs: &[stops::ECOLE_DU_BREUIL],
        omit_line_refs: &[],
    },
];

pub fn widget(id: &str) -> Option<&'static TransportWidget> {
    TRANSPORT_WIDGETS.iter().find(|w| w.id == id)
}

/// Static leg durations for the itinerary estimator, in minutes.
#[derive(Debug, Clone, Copy)]
pub struct LegMinutes {
    pub bus_hippodrome_to_joinville: i64,
    pub walk_to_joinville: i64,
    pub bus_hippodrome_to_gare_de_lyon: i64,
    pub transfer: i64,
    pub rer_joinville_to_gare_de_lyon: i64,
    pub velib_to_gare_de_lyon: i64,
    pub rer_joinville_to_chatelet: i64,
    pub velib_to_chatelet: i64,
}

pub const LEGS: LegMinutes = LegMinutes {
    bus_hippodrome_to_joinville: 10,
    walk_to_joinville: 25,
    bus_hippodrome_to_gare_de_lyon: 40,
    transfer: 5,
    rer_joinville_to_gare_de_lyon: 10,
    velib_to_gare_de_lyon: 35,
    rer_joinville_to_chatelet: 15,
    velib_to_chatelet: 45,
};

/// Vélib' stations shown on the board, with a display-name fallback for when
/// the feed omits the station name.
pub const VELIB_STATIONS: &[(&str, &str)] = &[
    ("12163", "Hippodrome de Vincennes"),
    ("12128", "École du Breuil / Pyramides"),
];

pub mod refresh {
    use std::time::Duration;

    pub const TRANSPORT: Duration = Duration::from_secs(30);
    pub const VELIB: Duration = Duration::from_secs(60);
    pub const RACES: Duration = Duration::from_secs(60);
    pub const ROADWORKS: Duration = Duration::from_secs(120);
    pub const NEWS: Duration = Duration::from_secs(180);
    pub const WEATHER: Duration = Duration::from_secs(300);
}
