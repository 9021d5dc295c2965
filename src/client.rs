use bevy_reflect::Reflect;
use chrono::{DateTime, Duration, Utc};
use geo::{point, Point};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::settings::ParserSettings;
use crate::tokenizer::Fields;

#[derive(Clone, Copy, Debug, Default, Reflect, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Network {
    #[default]
    Vatsim,
    Ivao,
    Other,
}

pub(crate) mod field {
    pub const CALLSIGN: usize = 0;
    pub const CID: usize = 1;
    pub const REAL_NAME: usize = 2;
    pub const CLIENT_TYPE: usize = 3;
    pub const FREQUENCY: usize = 4;
    pub const LATITUDE: usize = 5;
    pub const LONGITUDE: usize = 6;
    pub const ALTITUDE: usize = 7;
    pub const GROUNDSPEED: usize = 8;
    pub const PLANNED_AIRCRAFT: usize = 9;
    pub const PLANNED_TAS: usize = 10;
    pub const PLANNED_DEPARTURE: usize = 11;
    pub const PLANNED_ALTITUDE: usize = 12;
    pub const PLANNED_DESTINATION: usize = 13;
    pub const SERVER: usize = 14;
    pub const PROTOCOL_REVISION: usize = 15;
    pub const RATING: usize = 16;
    pub const TRANSPONDER: usize = 17;
    pub const FACILITY_TYPE: usize = 18;
    pub const VISUAL_RANGE: usize = 19;
    pub const PLANNED_REVISION: usize = 20;
    pub const PLANNED_FLIGHT_RULES: usize = 21;
    pub const PLANNED_DEPARTURE_TIME: usize = 22;
    pub const PLANNED_ACTUAL_DEPARTURE_TIME: usize = 23;
    pub const PLANNED_HOURS_ENROUTE: usize = 24;
    pub const PLANNED_MINUTES_ENROUTE: usize = 25;
    pub const PLANNED_HOURS_FUEL: usize = 26;
    pub const PLANNED_MINUTES_FUEL: usize = 27;
    pub const PLANNED_ALTERNATE: usize = 28;
    pub const PLANNED_REMARKS: usize = 29;
    pub const PLANNED_ROUTE: usize = 30;
    pub const DEPARTURE_LATITUDE: usize = 31;
    pub const DEPARTURE_LONGITUDE: usize = 32;
    pub const DESTINATION_LATITUDE: usize = 33;
    pub const DESTINATION_LONGITUDE: usize = 34;
    pub const ATIS_MESSAGE: usize = 35;
    pub const ATIS_RECEIVED: usize = 36;
    pub const LOGON_TIME: usize = 37;
    pub const HEADING: usize = 38;
    pub const QNH_INHG: usize = 39;
    pub const QNH_MB: usize = 40;
    // IVAO only
    pub const ADMIN_RATING: usize = 41;
    pub const NETWORK_RATING: usize = 42;
    pub const CLIENT_SOFTWARE: usize = 43;
}

/// Per-snapshot parsing state shared by all client records.
#[derive(Clone, Debug)]
pub struct ClientContext {
    pub network: Network,
    pub delimiter: char,
    name_filter: Regex,
    extract_home_base: bool,
}

impl ClientContext {
    pub fn new(settings: &ParserSettings) -> Result<Self, regex::Error> {
        Ok(Self {
            network: settings.network,
            delimiter: settings.delimiter,
            name_filter: settings.name_filter()?,
            extract_home_base: settings.extract_home_base,
        })
    }

    /// Strips filtered characters and splits off a trailing home base code.
    pub fn sanitize_name(&self, raw: &str) -> (String, Option<String>) {
        let cleaned = self.name_filter.replace_all(raw, "");
        let cleaned = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
        if !self.extract_home_base {
            return (cleaned, None);
        }
        match home_base_regex().captures(&cleaned) {
            Some(captures) => (
                captures[1].trim_end_matches(['-', ' ']).to_string(),
                Some(captures[2].to_string()),
            ),
            None => (cleaned, None),
        }
    }
}

impl Default for ClientContext {
    fn default() -> Self {
        // the default pattern is a constant and always compiles
        Self::new(&ParserSettings::default()).unwrap()
    }
}

fn home_base_regex() -> &'static Regex {
    static HOME_BASE_RE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"^(\S.*?)\s+[-(]?\s*([A-Z]{4})\)?$").unwrap());
    &HOME_BASE_RE
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct Client {
    pub callsign: String,
    pub user_id: String,
    pub real_name: String,
    pub home_base: Option<String>,
    pub server: String,
    pub protocol_revision: i32,
    pub rating: i32,
    pub admin_rating: Option<i32>,
    pub client_software: Option<String>,
    pub logon_time: Option<DateTime<Utc>>,
    pub network: Network,
    pub position: Point,
}

impl Client {
    pub fn parse(fields: &Fields, ctx: &ClientContext) -> Self {
        let (real_name, home_base) = ctx.sanitize_name(fields.trimmed(field::REAL_NAME));
        let (rating, admin_rating, client_software) = match ctx.network {
            Network::Ivao => (
                fields
                    .parse(field::NETWORK_RATING)
                    .unwrap_or_else(|| fields.i32_or_zero(field::RATING)),
                fields.parse(field::ADMIN_RATING),
                Some(fields.string(field::CLIENT_SOFTWARE)).filter(|s| !s.is_empty()),
            ),
            Network::Vatsim | Network::Other => (fields.i32_or_zero(field::RATING), None, None),
        };

        Self {
            callsign: fields.string(field::CALLSIGN),
            user_id: fields.string(field::CID),
            real_name,
            home_base,
            server: fields.string(field::SERVER),
            protocol_revision: fields.i32_or_zero(field::PROTOCOL_REVISION),
            rating,
            admin_rating,
            client_software,
            logon_time: fields.timestamp(field::LOGON_TIME),
            network: ctx.network,
            position: point! {
                x: fields.f64_or_zero(field::LONGITUDE),
                y: fields.f64_or_zero(field::LATITUDE),
            },
        }
    }

    pub fn is_null(&self) -> bool {
        self.callsign.is_empty()
    }

    pub fn has_position(&self) -> bool {
        !(self.position.x() == 0. && self.position.y() == 0.)
    }

    pub fn online_duration(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.logon_time.map(|logon| now - logon)
    }

    pub fn rating_name(&self) -> Option<&'static str> {
        match self.network {
            Network::Vatsim => match self.rating {
                1 => Some("OBS"),
                2 => Some("S1"),
                3 => Some("S2"),
                4 => Some("S3"),
                5 => Some("C1"),
                6 => Some("C2"),
                7 => Some("C3"),
                8 => Some("I1"),
                9 => Some("I2"),
                10 => Some("I3"),
                11 => Some("SUP"),
                12 => Some("ADM"),
                _ => None,
            },
            Network::Ivao => match self.rating {
                1 => Some("OBS"),
                2 => Some("AS1"),
                3 => Some("AS2"),
                4 => Some("AS3"),
                5 => Some("ADC"),
                6 => Some("APC"),
                7 => Some("ACC"),
                8 => Some("SEC"),
                9 => Some("SAI"),
                10 => Some("CAI"),
                _ => None,
            },
            Network::Other => None,
        }
    }

    pub fn matches(&self, pattern: &Regex) -> bool {
        pattern.is_match(&self.callsign)
            || pattern.is_match(&self.real_name)
            || pattern.is_match(&self.user_id)
    }
}
