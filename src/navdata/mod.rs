pub mod airways;

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt::Display;
use std::hash::Hash;
use std::io;

use bevy_derive::Deref;
use bevy_reflect::Reflect;
use geo::{point, Point};
use multimap::MultiMap;
use num_derive::FromPrimitive;
use num_traits::FromPrimitive as _;
use regex::Regex;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, trace};

use crate::geodesy::distance_nm;
use crate::settings::NavDataSettings;
use crate::tokenizer::{lines, Fields};
use crate::{read_to_string, DegMinSecExt as _};

use self::airways::{parse_airways, AirwayIndex};

#[derive(Error, Debug)]
pub enum NavDataError {
    #[error("failed to read navigation data: {0}")]
    FileRead(#[from] io::Error),
}

pub type NavDataResult<T> = Result<T, NavDataError>;

#[derive(Clone, Debug, Serialize)]
pub struct Waypoint {
    pub label: String,
    pub position: Point,
}

impl Waypoint {
    pub fn new(label: &str, lat: f64, lon: f64) -> Self {
        Self {
            label: label.to_string(),
            position: point! { x: lon, y: lat },
        }
    }

    pub fn matches(&self, pattern: &Regex) -> bool {
        pattern.is_match(&self.label)
    }
}

// nav data sources disagree in the last decimals for the same fix
const DECIMALS: u32 = 4;

fn quantize(v: f64) -> i64 {
    let factor = 10_i64.pow(DECIMALS) as f64;
    (v * factor).round() as i64
}

impl Hash for Waypoint {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.label.hash(state);
        quantize(self.position.x()).hash(state);
        quantize(self.position.y()).hash(state);
    }
}

impl PartialEq for Waypoint {
    fn eq(&self, other: &Self) -> bool {
        self.label == other.label
            && quantize(self.position.x()) == quantize(other.position.x())
            && quantize(self.position.y()) == quantize(other.position.y())
    }
}
impl Eq for Waypoint {}

impl Display for Waypoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.label, self.position.deg_min_sec_fmt())
    }
}

#[derive(Copy, Clone, Debug, Reflect, Serialize, PartialEq, Eq, Hash, FromPrimitive)]
pub enum NavAidType {
    Ndb = 2,
    Vor = 3,
    IlsLoc = 4,
    Loc = 5,
    Gs = 6,
    Om = 7,
    Mm = 8,
    Im = 9,
    DmeNoFreq = 12,
    Dme = 13,
}

impl NavAidType {
    /// Whether the navaid can be filed as a route point.
    pub fn is_enroute(self) -> bool {
        matches!(self, Self::Ndb | Self::Vor | Self::DmeNoFreq | Self::Dme)
    }
}

impl Display for NavAidType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Ndb => "NDB",
            Self::Vor => "VOR",
            Self::IlsLoc => "ILS",
            Self::Loc => "LOC",
            Self::Gs => "GS",
            Self::Om => "OM",
            Self::Mm => "MM",
            Self::Im => "IM",
            Self::DmeNoFreq => "DME",
            Self::Dme => "DME",
        })
    }
}

#[derive(Clone, Debug, Serialize, PartialEq, Deref)]
pub struct NavAid {
    #[deref]
    pub waypoint: Waypoint,
    pub kind: NavAidType,
    pub elevation: i32,
    /// kHz for NDBs, 10 kHz units for everything else
    pub frequency: i32,
    pub range: i32,
    pub heading: f64,
    pub name: String,
}

impl NavAid {
    fn parse(fields: &Fields) -> Option<Self> {
        let kind = fields.parse::<u8>(0).and_then(NavAidType::from_u8)?;
        let lat = fields.parse(1)?;
        let lon = fields.parse(2)?;
        let label = fields.trimmed(7);
        if label.is_empty() {
            return None;
        }
        Some(Self {
            waypoint: Waypoint::new(label, lat, lon),
            kind,
            elevation: fields.i32_or_zero(3),
            frequency: fields.i32_or_zero(4),
            range: fields.i32_or_zero(5),
            heading: fields.f64_or_zero(6),
            name: fields.rest(8, " "),
        })
    }

    pub fn frequency_string(&self) -> String {
        match self.kind {
            NavAidType::Ndb => format!("{} kHz", self.frequency),
            NavAidType::Om | NavAidType::Mm | NavAidType::Im | NavAidType::DmeNoFreq => {
                String::new()
            }
            _ => format!("{:.2} MHz", f64::from(self.frequency) / 100.),
        }
    }
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct Airport {
    pub icao: String,
    pub name: String,
    pub city: String,
    pub country: String,
    pub position: Point,
}

impl Airport {
    /// `ICAO:name:city:country:lat:lon`
    fn parse(fields: &Fields) -> Option<Self> {
        let icao = fields.string(0);
        if icao.is_empty() {
            return None;
        }
        let lat = fields.parse(4)?;
        let lon = fields.parse(5)?;
        Some(Self {
            icao,
            name: fields.string(1),
            city: fields.string(2),
            country: fields.string(3),
            position: point! { x: lon, y: lat },
        })
    }

    pub fn waypoint(&self) -> Waypoint {
        Waypoint {
            label: self.icao.clone(),
            position: self.position,
        }
    }

    pub fn matches(&self, pattern: &Regex) -> bool {
        pattern.is_match(&self.icao) || pattern.is_match(&self.name) || pattern.is_match(&self.city)
    }
}

pub fn parse_airports(content: &[u8]) -> NavDataResult<HashMap<String, Airport>> {
    let content = read_to_string(content)?;
    Ok(lines(&content).fold(HashMap::new(), |mut acc, line| {
        match Airport::parse(&Fields::split(line, ':')) {
            Some(airport) => {
                acc.entry(airport.icao.clone()).or_insert(airport);
            }
            None => debug!("skipping airport line: {line}"),
        }
        acc
    }))
}

/// X-Plane `earth_nav.dat`: `type lat lon elev freq range heading ident name...`
pub fn parse_navaids(content: &[u8]) -> NavDataResult<MultiMap<String, NavAid>> {
    let content = read_to_string(content)?;
    let mut navaids = MultiMap::new();
    for line in lines(&content) {
        let fields = Fields::split_whitespace(line);
        if fields.trimmed(0) == "99" {
            break;
        }
        match NavAid::parse(&fields) {
            Some(navaid) => navaids.insert(navaid.label.clone(), navaid),
            None => trace!("skipping navaid line: {line}"),
        }
    }
    Ok(navaids)
}

/// X-Plane `earth_fix.dat`: `lat lon ident`
pub fn parse_fixes(content: &[u8]) -> NavDataResult<MultiMap<String, Waypoint>> {
    let content = read_to_string(content)?;
    let mut fixes = MultiMap::new();
    for line in lines(&content) {
        let fields = Fields::split_whitespace(line);
        if fields.trimmed(0) == "99" {
            break;
        }
        let label = fields.trimmed(2);
        match (fields.parse::<f64>(0), fields.parse::<f64>(1)) {
            (Some(lat), Some(lon)) if !label.is_empty() => {
                fixes.insert(label.to_string(), Waypoint::new(label, lat, lon));
            }
            _ => trace!("skipping fix line: {line}"),
        }
    }
    Ok(fixes)
}

/// Waypoint and airway lookup graph used for route resolution.
#[derive(Clone, Debug, Default, Serialize)]
pub struct NavData {
    pub airports: HashMap<String, Airport>,
    pub fixes: MultiMap<String, Waypoint>,
    pub navaids: MultiMap<String, NavAid>,
    pub airways: AirwayIndex,
}

impl NavData {
    pub fn load(settings: &NavDataSettings) -> NavDataResult<Self> {
        let mut nav_data = NavData::default();
        if let Some(path) = &settings.airports {
            nav_data.airports = parse_airports(&fs_err::read(path)?)?;
        }
        if let Some(path) = &settings.navaids {
            nav_data.navaids = parse_navaids(&fs_err::read(path)?)?;
        }
        if let Some(path) = &settings.fixes {
            nav_data.fixes = parse_fixes(&fs_err::read(path)?)?;
        }
        if let Some(path) = &settings.airways {
            nav_data.airways = parse_airways(&fs_err::read(path)?)?;
        }
        info!(
            "loaded {} airports, {} navaids, {} fixes, {} airway names",
            nav_data.airports.len(),
            nav_data.navaids.len(),
            nav_data.fixes.len(),
            nav_data.airways.len()
        );
        Ok(nav_data)
    }

    pub fn airport(&self, icao: &str) -> Option<&Airport> {
        self.airports.get(icao)
    }

    /// All route points filed under `label`: enroute navaids, fixes and airports.
    pub fn candidates(&self, label: &str) -> Vec<Waypoint> {
        self.navaids
            .get_vec(label)
            .into_iter()
            .flatten()
            .filter(|navaid| navaid.kind.is_enroute())
            .map(|navaid| navaid.waypoint.clone())
            .chain(self.fixes.get_vec(label).into_iter().flatten().cloned())
            .chain(self.airports.get(label).map(Airport::waypoint))
            .collect()
    }

    /// The candidate named `label` closest to `near`.
    pub fn nearest_waypoint(&self, label: &str, near: Point) -> Option<Waypoint> {
        self.candidates(label).into_iter().min_by(|a, b| {
            distance_nm(a.position, near)
                .partial_cmp(&distance_nm(b.position, near))
                .unwrap_or(Ordering::Equal)
        })
    }

    pub fn contains_designator(&self, label: &str) -> bool {
        self.navaids.contains_key(label)
            || self.fixes.contains_key(label)
            || self.airports.contains_key(label)
    }
}
