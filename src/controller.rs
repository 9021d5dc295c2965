use std::fmt::Display;

use bevy_derive::{Deref, DerefMut};
use bevy_reflect::Reflect;
use chrono::{DateTime, Utc};
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use phf::phf_map;
use regex::Regex;
use serde::Serialize;

use crate::client::{field, Client, ClientContext};
use crate::sectors::SectorLoader;
use crate::tokenizer::Fields;

/// Frequency used by clients without a voice frequency.
pub const OBSERVER_FREQUENCY: &str = "199.998";

const ATIS_LINE_SEPARATOR: &str = "^§";

#[derive(
    Copy, Clone, Debug, Default, Reflect, Serialize, PartialEq, Eq, Hash, FromPrimitive,
)]
pub enum Facility {
    #[default]
    Observer = 0,
    FlightService = 1,
    Delivery = 2,
    Ground = 3,
    Tower = 4,
    Approach = 5,
    Center = 6,
    Atis = 7,
    Staff = 8,
}

static CALLSIGN_SUFFIXES: phf::Map<&'static str, Facility> = phf_map! {
    "OBS" => Facility::Observer,
    "FSS" => Facility::FlightService,
    "DEL" => Facility::Delivery,
    "GND" => Facility::Ground,
    "TWR" => Facility::Tower,
    "APP" => Facility::Approach,
    "DEP" => Facility::Approach,
    "CTR" => Facility::Center,
    "ATIS" => Facility::Atis,
    "SUP" => Facility::Staff,
};

impl Facility {
    pub fn from_callsign(callsign: &str) -> Option<Self> {
        let (_, suffix) = callsign.rsplit_once('_')?;
        CALLSIGN_SUFFIXES.get(suffix.to_uppercase().as_str()).copied()
    }

    /// Facility type column first; the callsign suffix decides when the
    /// column is missing and always wins for ATIS and supervisors.
    pub fn derive(code: Option<i32>, callsign: &str) -> Self {
        match (Self::from_callsign(callsign), code.and_then(Self::from_i32)) {
            (Some(suffix @ (Self::Atis | Self::Staff)), _) => suffix,
            (_, Some(facility)) if facility != Self::Observer => facility,
            (Some(suffix), _) => suffix,
            (None, facility) => facility.unwrap_or_default(),
        }
    }

    /// Facilities whose callsign prefix names an airport.
    pub fn is_airport(self) -> bool {
        matches!(
            self,
            Self::Delivery | Self::Ground | Self::Tower | Self::Approach | Self::Atis
        )
    }

    /// Facilities whose callsign prefix names a sector (FIR).
    pub fn is_enroute(self) -> bool {
        matches!(self, Self::Center | Self::FlightService)
    }
}

impl Display for Facility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Observer => "OBS",
            Self::FlightService => "FSS",
            Self::Delivery => "DEL",
            Self::Ground => "GND",
            Self::Tower => "TWR",
            Self::Approach => "APP",
            Self::Center => "CTR",
            Self::Atis => "ATIS",
            Self::Staff => "SUP",
        })
    }
}

#[derive(Clone, Debug, Serialize, PartialEq, Deref, DerefMut)]
pub struct Controller {
    #[deref]
    pub client: Client,
    pub frequency: String,
    pub facility: Facility,
    pub visual_range: i32,
    pub atis: Vec<String>,
    pub atis_received: Option<DateTime<Utc>>,
    /// ICAO of the sector this controller covers, if it is known
    pub sector: Option<String>,
}

impl Controller {
    pub fn parse(fields: &Fields, ctx: &ClientContext) -> Self {
        let client = Client::parse(fields, ctx);
        let facility = Facility::derive(fields.parse(field::FACILITY_TYPE), &client.callsign);
        Self {
            frequency: fields.string(field::FREQUENCY),
            facility,
            visual_range: fields.i32_or_zero(field::VISUAL_RANGE),
            atis: split_atis(fields.get(field::ATIS_MESSAGE)),
            atis_received: fields.timestamp(field::ATIS_RECEIVED),
            sector: None,
            client,
        }
    }

    pub fn is_null(&self) -> bool {
        self.client.is_null()
    }

    pub fn is_observer(&self) -> bool {
        self.facility == Facility::Observer || self.frequency == OBSERVER_FREQUENCY
    }

    pub fn is_atc(&self) -> bool {
        !self.is_observer() && self.facility != Facility::Staff
    }

    fn callsign_prefix(&self) -> &str {
        self.callsign.split('_').next().unwrap_or_default()
    }

    /// ICAO of the airport a DEL/GND/TWR/APP/ATIS station belongs to.
    pub fn airport_icao(&self) -> Option<&str> {
        Some(self.callsign_prefix()).filter(|_| self.facility.is_airport())
    }

    /// Sector ICAO taken from the callsign of CTR/FSS stations,
    /// `EDGG_CTR` -> `EDGG`, `EDGG_N_CTR` -> `EDGG`.
    pub fn sector_icao(&self) -> Option<&str> {
        Some(self.callsign_prefix())
            .filter(|prefix| self.facility.is_enroute() && !prefix.is_empty())
    }

    /// Links the controller to its sector when the sector list knows it.
    pub fn assign_sector(&mut self, sectors: &SectorLoader) -> bool {
        self.sector = self
            .sector_icao()
            .filter(|icao| sectors.sector(icao).is_some())
            .map(String::from);
        self.sector.is_some()
    }

    pub fn matches(&self, pattern: &Regex) -> bool {
        self.client.matches(pattern)
            || pattern.is_match(&self.frequency)
            || self.atis.iter().any(|line| pattern.is_match(line))
    }
}

pub(crate) fn split_atis(message: &str) -> Vec<String> {
    message
        .split(ATIS_LINE_SEPARATOR)
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod test {
    use crate::client::ClientContext;
    use crate::sectors::{Sector, SectorLoader};
    use crate::tokenizer::Fields;

    use super::{Controller, Facility};

    fn controller_line(callsign: &str, facility: &str, frequency: &str) -> String {
        let mut fields = vec![""; 41];
        fields[0] = callsign;
        fields[1] = "7654321";
        fields[2] = "Max Mustermann";
        fields[3] = "ATC";
        fields[4] = frequency;
        fields[5] = "50.0";
        fields[6] = "8.5";
        fields[16] = "5";
        fields[18] = facility;
        fields[19] = "150";
        fields[35] = "$ fra.atis.example^§Frankfurt Radar^§^§Welcome";
        fields[36] = "20240317115500";
        fields[37] = "20240317110000";
        fields.join(":")
    }

    fn parse(callsign: &str, facility: &str, frequency: &str) -> Controller {
        let line = controller_line(callsign, facility, frequency);
        Controller::parse(&Fields::split(&line, ':'), &ClientContext::default())
    }

    #[test]
    fn test_parse_controller() {
        let ctr = parse("EDGG_CTR", "6", "135.725");

        assert_eq!(ctr.callsign, "EDGG_CTR");
        assert_eq!(ctr.facility, Facility::Center);
        assert_eq!(ctr.frequency, "135.725");
        assert_eq!(ctr.visual_range, 150);
        assert_eq!(
            ctr.atis,
            vec!["$ fra.atis.example", "Frankfurt Radar", "Welcome"]
        );
        assert!(ctr.atis_received.is_some());
        assert!(ctr.is_atc());
        assert_eq!(ctr.sector_icao(), Some("EDGG"));
        assert_eq!(ctr.airport_icao(), None);
    }

    #[test]
    fn test_facility_derivation() {
        assert_eq!(Facility::derive(Some(4), "EDDF_TWR"), Facility::Tower);
        assert_eq!(Facility::derive(None, "EDDF_N_APP"), Facility::Approach);
        assert_eq!(Facility::derive(Some(0), "EDDF_GND"), Facility::Ground);
        assert_eq!(Facility::derive(Some(4), "EDDF_ATIS"), Facility::Atis);
        assert_eq!(Facility::derive(Some(11), "JOHN_SUP"), Facility::Staff);
        assert_eq!(Facility::derive(Some(42), "NOSUFFIX"), Facility::Observer);
        assert_eq!(Facility::derive(None, "edgg_ctr"), Facility::Center);

        let twr = parse("EDDF_TWR", "4", "119.900");
        assert_eq!(twr.airport_icao(), Some("EDDF"));
        assert_eq!(twr.sector_icao(), None);
    }

    #[test]
    fn test_observer() {
        let obs = parse("DLH_OBS", "0", "199.998");
        assert!(obs.is_observer());
        assert!(!obs.is_atc());

        let no_freq = parse("EDDF_TWR", "4", "199.998");
        assert!(no_freq.is_observer());
    }

    #[test]
    fn test_assign_sector() {
        let mut sectors = SectorLoader::default();
        sectors.insert(Sector {
            icao: "EDGG".to_string(),
            name: "Langen".to_string(),
            country_code: "DE".to_string(),
            id: 1,
            ..Default::default()
        });

        let mut known = parse("EDGG_N_CTR", "6", "136.955");
        assert!(known.assign_sector(&sectors));
        assert_eq!(known.sector.as_deref(), Some("EDGG"));

        let mut unknown = parse("EDMM_CTR", "6", "127.950");
        assert!(!unknown.assign_sector(&sectors));
        assert!(unknown.sector.is_none());

        let mut tower = parse("EDGG_TWR", "4", "118.000");
        assert!(!tower.assign_sector(&sectors));
    }
}
