use std::fmt::Display;

use bevy_derive::{Deref, DerefMut};
use bevy_reflect::Reflect;
use chrono::{DateTime, Duration, NaiveTime, Utc};
use geo::{point, Point};
use regex::Regex;
use serde::Serialize;

use crate::client::{field, Client, ClientContext};
use crate::geodesy::distance_nm;
use crate::navdata::{NavData, Waypoint};
use crate::route::{RouteKey, RouteMemo, RouteResolver};
use crate::tokenizer::Fields;

/// below this groundspeed a pilot counts as on the ground
pub const GROUND_SPEED_KT: i32 = 50;
/// radius around an airport counting as "at" the airport
pub const AT_AIRPORT_NM: f64 = 5.;
/// radius around an airport counting as departing from / arriving at it
pub const TERMINAL_AREA_NM: f64 = 50.;

#[derive(Copy, Clone, Debug, Reflect, Serialize, PartialEq, Eq, Hash)]
pub enum FlightStatus {
    Boarding,
    GroundDep,
    Departing,
    EnRoute,
    Arriving,
    GroundArr,
    Blocked,
    Crashed,
    Bush,
    Prefiled,
}

impl Display for FlightStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Boarding => "boarding",
            Self::GroundDep => "taxiing out",
            Self::Departing => "departing",
            Self::EnRoute => "en route",
            Self::Arriving => "arriving",
            Self::GroundArr => "taxiing in",
            Self::Blocked => "blocked",
            Self::Crashed => "crashed",
            Self::Bush => "bush pilot",
            Self::Prefiled => "prefiled",
        })
    }
}

#[derive(Clone, Debug, Default, Serialize, PartialEq)]
pub struct FlightPlan {
    pub aircraft: String,
    pub tas_cruise: i32,
    pub departure: String,
    pub destination: String,
    pub alternate: String,
    pub altitude: String,
    pub flight_rules: String,
    pub revision: i32,
    pub departure_time: String,
    pub actual_departure_time: String,
    pub hours_enroute: i32,
    pub minutes_enroute: i32,
    pub hours_fuel: i32,
    pub minutes_fuel: i32,
    pub remarks: String,
    pub route: String,
}

impl FlightPlan {
    fn parse(fields: &Fields) -> Self {
        Self {
            aircraft: fields.string(field::PLANNED_AIRCRAFT),
            tas_cruise: fields.i32_or_zero(field::PLANNED_TAS),
            departure: fields.trimmed(field::PLANNED_DEPARTURE).to_uppercase(),
            destination: fields.trimmed(field::PLANNED_DESTINATION).to_uppercase(),
            alternate: fields.trimmed(field::PLANNED_ALTERNATE).to_uppercase(),
            altitude: fields.string(field::PLANNED_ALTITUDE),
            flight_rules: fields.string(field::PLANNED_FLIGHT_RULES),
            revision: fields.i32_or_zero(field::PLANNED_REVISION),
            departure_time: fields.string(field::PLANNED_DEPARTURE_TIME),
            actual_departure_time: fields.string(field::PLANNED_ACTUAL_DEPARTURE_TIME),
            hours_enroute: fields.i32_or_zero(field::PLANNED_HOURS_ENROUTE),
            minutes_enroute: fields.i32_or_zero(field::PLANNED_MINUTES_ENROUTE),
            hours_fuel: fields.i32_or_zero(field::PLANNED_HOURS_FUEL),
            minutes_fuel: fields.i32_or_zero(field::PLANNED_MINUTES_FUEL),
            remarks: fields.string(field::PLANNED_REMARKS),
            route: fields.string(field::PLANNED_ROUTE),
        }
    }

    /// ICAO type designator without wake category prefix or equipment suffix,
    /// `H/B744/L` -> `B744`.
    pub fn aircraft_type(&self) -> &str {
        let mut parts = self.aircraft.split('/');
        let first = parts.next().unwrap_or_default();
        if first.len() == 1 {
            parts.next().unwrap_or(first)
        } else {
            first
        }
    }

    /// Planned altitude in feet. `FL350`, `F350` and bare values below 1000
    /// are flight levels.
    pub fn altitude_ft(&self) -> Option<i32> {
        let altitude = self.altitude.trim().to_uppercase();
        let (digits, flight_level) = match altitude
            .strip_prefix("FL")
            .or_else(|| altitude.strip_prefix(['F', 'A']))
        {
            Some(rest) => (rest, true),
            None => (altitude.as_str(), false),
        };
        let value: i32 = digits.parse().ok()?;
        Some(if flight_level || value < 1000 {
            value * 100
        } else {
            value
        })
    }

    pub fn enroute(&self) -> Duration {
        Duration::hours(self.hours_enroute.into()) + Duration::minutes(self.minutes_enroute.into())
    }

    pub fn fuel(&self) -> Duration {
        Duration::hours(self.hours_fuel.into()) + Duration::minutes(self.minutes_fuel.into())
    }

    /// First planned departure (`hhmm`) not earlier than `since`, so a plan
    /// for 0010 filed at 2350 departs the next day.
    pub fn departure_at(&self, since: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let time = self.departure_time.trim();
        let time = NaiveTime::parse_from_str(&format!("{time:0>4}"), "%H%M").ok()?;
        let departs = since.date_naive().and_time(time).and_utc();
        Some(if departs < since {
            departs + Duration::days(1)
        } else {
            departs
        })
    }

    fn route_key(&self) -> RouteKey {
        RouteKey {
            route: self.route.clone(),
            departure: self.departure.clone(),
            destination: self.destination.clone(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deref, DerefMut)]
pub struct Pilot {
    #[deref]
    pub client: Client,
    pub altitude: i32,
    pub groundspeed: i32,
    pub heading: i32,
    pub transponder: String,
    pub qnh_inhg: f64,
    pub qnh_mb: i32,
    pub flight_plan: FlightPlan,
    /// position of the departure airport as sent by the feed
    pub departure_position: Option<Point>,
    pub destination_position: Option<Point>,
    pub prefiled: bool,
    #[serde(skip)]
    route_memo: RouteMemo,
}

fn optional_position(fields: &Fields, lat: usize, lon: usize) -> Option<Point> {
    match (fields.parse::<f64>(lat), fields.parse::<f64>(lon)) {
        (Some(lat), Some(lon)) if lat != 0. || lon != 0. => Some(point! { x: lon, y: lat }),
        _ => None,
    }
}

impl Pilot {
    pub fn parse(fields: &Fields, ctx: &ClientContext, prefiled: bool) -> Self {
        Self {
            client: Client::parse(fields, ctx),
            altitude: fields.i32_or_zero(field::ALTITUDE),
            groundspeed: fields.i32_or_zero(field::GROUNDSPEED),
            heading: fields.i32_or_zero(field::HEADING),
            transponder: fields.string(field::TRANSPONDER),
            qnh_inhg: fields.f64_or_zero(field::QNH_INHG),
            qnh_mb: fields.i32_or_zero(field::QNH_MB),
            flight_plan: FlightPlan::parse(fields),
            departure_position: optional_position(
                fields,
                field::DEPARTURE_LATITUDE,
                field::DEPARTURE_LONGITUDE,
            ),
            destination_position: optional_position(
                fields,
                field::DESTINATION_LATITUDE,
                field::DESTINATION_LONGITUDE,
            ),
            prefiled,
            route_memo: RouteMemo::default(),
        }
    }

    pub fn is_null(&self) -> bool {
        self.client.is_null()
    }

    pub fn is_airborne(&self) -> bool {
        self.groundspeed >= GROUND_SPEED_KT
    }

    /// Takes over the resolved route of the same flight from an older
    /// snapshot; the memo itself decides whether it still applies.
    pub(crate) fn inherit_route_memo(&mut self, previous: &mut Pilot) {
        self.route_memo = std::mem::take(&mut previous.route_memo);
    }

    pub fn departure_waypoint(&self, nav: &NavData) -> Option<Waypoint> {
        airport_waypoint(nav, &self.flight_plan.departure, self.departure_position)
    }

    pub fn destination_waypoint(&self, nav: &NavData) -> Option<Waypoint> {
        airport_waypoint(nav, &self.flight_plan.destination, self.destination_position)
    }

    pub fn distance_from_departure(&self, nav: &NavData) -> Option<f64> {
        self.departure_waypoint(nav)
            .map(|dep| distance_nm(dep.position, self.position))
    }

    pub fn distance_to_destination(&self, nav: &NavData) -> Option<f64> {
        self.destination_waypoint(nav)
            .map(|dest| distance_nm(self.position, dest.position))
    }

    /// Estimated arrival at the current groundspeed along the direct line.
    pub fn eta(&self, now: DateTime<Utc>, nav: &NavData) -> Option<DateTime<Utc>> {
        if self.groundspeed <= 0 {
            return None;
        }
        let remaining = self.distance_to_destination(nav)?;
        let seconds = remaining / f64::from(self.groundspeed) * 3600.;
        Some(now + Duration::seconds(seconds.round() as i64))
    }

    pub fn flight_status(&self, nav: &NavData) -> FlightStatus {
        if self.prefiled {
            return FlightStatus::Prefiled;
        }
        let (Some(from_departure), Some(to_destination)) = (
            self.distance_from_departure(nav),
            self.distance_to_destination(nav),
        ) else {
            return FlightStatus::Bush;
        };

        if self.groundspeed < GROUND_SPEED_KT {
            if from_departure < AT_AIRPORT_NM {
                if self.groundspeed == 0 {
                    FlightStatus::Boarding
                } else {
                    FlightStatus::GroundDep
                }
            } else if to_destination < AT_AIRPORT_NM {
                if self.groundspeed == 0 {
                    FlightStatus::Blocked
                } else {
                    FlightStatus::GroundArr
                }
            } else {
                FlightStatus::Crashed
            }
        } else if from_departure < TERMINAL_AREA_NM {
            FlightStatus::Departing
        } else if to_destination < TERMINAL_AREA_NM {
            FlightStatus::Arriving
        } else {
            FlightStatus::EnRoute
        }
    }

    /// Departure, resolved route and destination; cached until the route or
    /// either airport of the flight plan changes.
    pub fn route_waypoints(&mut self, resolver: &RouteResolver) -> &[Waypoint] {
        let nav = resolver.nav_data();
        let departure = self.departure_waypoint(nav);
        let destination = self.destination_waypoint(nav);
        let route = self.flight_plan.route.clone();
        self.route_memo
            .get_or_resolve(self.flight_plan.route_key(), || {
                resolver.resolve_flight(departure, destination, &route)
            })
    }

    pub fn route_is_cached(&self) -> bool {
        self.route_memo.is_cached_for(&self.flight_plan.route_key())
    }

    pub fn matches(&self, pattern: &Regex) -> bool {
        self.client.matches(pattern)
            || pattern.is_match(&self.flight_plan.aircraft)
            || pattern.is_match(&self.flight_plan.departure)
            || pattern.is_match(&self.flight_plan.destination)
    }
}

impl PartialEq for Pilot {
    fn eq(&self, other: &Self) -> bool {
        self.client == other.client
            && self.altitude == other.altitude
            && self.groundspeed == other.groundspeed
            && self.heading == other.heading
            && self.transponder == other.transponder
            && self.flight_plan == other.flight_plan
            && self.prefiled == other.prefiled
    }
}

fn airport_waypoint(nav: &NavData, icao: &str, fallback: Option<Point>) -> Option<Waypoint> {
    if icao.is_empty() {
        return None;
    }
    nav.airport(icao).map(crate::navdata::Airport::waypoint).or_else(|| {
        fallback.map(|position| Waypoint {
            label: icao.to_string(),
            position,
        })
    })
}
