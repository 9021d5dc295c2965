use std::collections::HashMap;
use std::io;
use std::iter::once;

use bevy_reflect::Reflect;
use chrono::{DateTime, Duration, Utc};
use geo::Point;
use itertools::Itertools;
use regex::Regex;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, trace, warn};

use crate::booking::BookedController;
use crate::client::{field, ClientContext, Network};
use crate::controller::Controller;
use crate::geodesy::{
    bearing_deg, distance_nm, normalize_bearing, path_distance_nm, point_along_path,
    point_distance_bearing,
};
use crate::map_object::{MapItem, MapObject};
use crate::pilot::Pilot;
use crate::read_to_string;
use crate::route::RouteResolver;
use crate::sectors::SectorLoader;
use crate::settings::ParserSettings;
use crate::tokenizer::{lines, parse_timestamp, Fields};

#[derive(Error, Debug)]
pub enum WhazzupError {
    #[error("failed to read whazzup: {0}")]
    FileRead(#[from] io::Error),
    #[error("invalid name filter: {0}")]
    NameFilter(#[from] regex::Error),
}

pub type WhazzupResult = Result<WhazzupData, WhazzupError>;

#[derive(Clone, Debug, Default, Serialize, PartialEq, Eq)]
pub struct Server {
    pub ident: String,
    pub host: String,
    pub location: String,
    pub name: String,
    pub clients_allowed: bool,
}

impl Server {
    /// `ident:host:location:name:allowed`
    fn parse(fields: &Fields) -> Self {
        Self {
            ident: fields.string(0),
            host: fields.string(1),
            location: fields.string(2),
            name: fields.string(3),
            clients_allowed: fields.trimmed(4) == "1",
        }
    }

    pub fn is_null(&self) -> bool {
        self.ident.is_empty()
    }
}

/// Which feed a snapshot was parsed from; decides what it replaces when
/// merged into the live model.
#[derive(Copy, Clone, Debug, Default, Reflect, Serialize, PartialEq, Eq, Hash)]
pub enum Source {
    #[default]
    Whazzup,
    Bookings,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Section {
    General,
    Clients,
    Prefile,
    Servers,
    Bookings,
    Unknown,
}

impl Section {
    fn from_header(header: &str) -> Self {
        let name = header.trim().trim_start_matches('!').trim_end_matches(':');
        match name.trim().to_uppercase().as_str() {
            "GENERAL" => Self::General,
            "CLIENTS" => Self::Clients,
            "PREFILE" => Self::Prefile,
            "SERVERS" => Self::Servers,
            "BOOKINGS" => Self::Bookings,
            _ => Self::Unknown,
        }
    }
}

/// One parsed snapshot of the network, or the live model snapshots are
/// merged into.
#[derive(Clone, Debug, Default, Serialize)]
pub struct WhazzupData {
    pub pilots: HashMap<String, Pilot>,
    pub prefiled: HashMap<String, Pilot>,
    pub controllers: HashMap<String, Controller>,
    pub booked_controllers: Vec<BookedController>,
    pub servers: Vec<Server>,
    pub whazzup_time: Option<DateTime<Utc>>,
    pub bookings_time: Option<DateTime<Utc>>,
    pub predicted_time: Option<DateTime<Utc>>,
    pub connected_clients: u32,
    pub reload_minutes: u32,
    pub version: u32,
    pub network: Network,
    pub source: Source,
    /// The feed carried a `!BOOKINGS` section, even an empty one.
    pub has_bookings: bool,
}

impl WhazzupData {
    pub fn parse(content: &[u8], settings: &ParserSettings) -> WhazzupResult {
        Self::parse_source(content, settings, Source::Whazzup)
    }

    /// A bookings feed: same layout, only `!GENERAL` and `!BOOKINGS` matter.
    pub fn parse_bookings(content: &[u8], settings: &ParserSettings) -> WhazzupResult {
        Self::parse_source(content, settings, Source::Bookings)
    }

    fn parse_source(content: &[u8], settings: &ParserSettings, source: Source) -> WhazzupResult {
        let content = read_to_string(content)?;
        let ctx = ClientContext::new(settings)?;
        let mut data = WhazzupData {
            network: settings.network,
            source,
            ..Default::default()
        };
        let mut update = None;
        let mut section = Section::Unknown;

        for line in lines(&content) {
            if line.starts_with('!') {
                section = Section::from_header(line);
                if section == Section::Unknown {
                    debug!("skipping unknown section {line}");
                }
                data.has_bookings |= section == Section::Bookings;
                continue;
            }

            match section {
                Section::General => {
                    let Some((key, value)) = line.split_once('=') else {
                        debug!("skipping general line: {line}");
                        continue;
                    };
                    let value = value.trim();
                    match key.trim().to_uppercase().as_str() {
                        "VERSION" => data.version = value.parse().unwrap_or_default(),
                        "RELOAD" => data.reload_minutes = value.parse().unwrap_or_default(),
                        "UPDATE" => update = parse_timestamp(value),
                        "CONNECTED CLIENTS" => {
                            data.connected_clients = value.parse().unwrap_or_default();
                        }
                        _ => trace!("ignoring general key {key}"),
                    }
                }
                Section::Clients if source == Source::Whazzup => {
                    data.insert_client(&Fields::split(line, ctx.delimiter), &ctx);
                }
                Section::Prefile if source == Source::Whazzup => {
                    let pilot = Pilot::parse(&Fields::split(line, ctx.delimiter), &ctx, true);
                    if pilot.is_null() {
                        debug!("skipping prefile line: {line}");
                    } else {
                        data.prefiled.insert(pilot.callsign.clone(), pilot);
                    }
                }
                Section::Servers if source == Source::Whazzup => {
                    let server = Server::parse(&Fields::split(line, ctx.delimiter));
                    if !server.is_null() {
                        data.servers.push(server);
                    }
                }
                Section::Bookings => {
                    let fields = Fields::split(line, ctx.delimiter);
                    let booking = BookedController::parse(&fields, &ctx);
                    if booking.is_null() {
                        debug!("skipping booking line: {line}");
                    } else {
                        data.booked_controllers.push(booking);
                    }
                }
                _ => {}
            }
        }

        match source {
            Source::Whazzup => {
                data.whazzup_time = update;
                if data.has_bookings {
                    data.bookings_time = update;
                }
            }
            Source::Bookings => data.bookings_time = update,
        }
        if update.is_none() {
            warn!("{source:?} feed without UPDATE time");
        }

        info!(
            "parsed {} pilots, {} prefiled, {} controllers, {} bookings",
            data.pilots.len(),
            data.prefiled.len(),
            data.controllers.len(),
            data.booked_controllers.len()
        );

        Ok(data)
    }

    fn insert_client(&mut self, fields: &Fields, ctx: &ClientContext) {
        match fields.trimmed(field::CLIENT_TYPE) {
            "PILOT" => {
                let pilot = Pilot::parse(fields, ctx, false);
                if pilot.is_null() {
                    debug!("skipping pilot without callsign");
                } else if let Some(previous) = self.pilots.insert(pilot.callsign.clone(), pilot) {
                    debug!("duplicate pilot {}", previous.callsign);
                }
            }
            "ATC" => {
                let controller = Controller::parse(fields, ctx);
                if controller.is_null() {
                    debug!("skipping controller without callsign");
                } else if let Some(previous) = self
                    .controllers
                    .insert(controller.callsign.clone(), controller)
                {
                    debug!("duplicate controller {}", previous.callsign);
                }
            }
            other => debug!("skipping client of type {other:?}"),
        }
    }

    /// Merges a freshly parsed snapshot. A whazzup replaces the clients,
    /// servers and general info, and the bookings only when it carried a
    /// bookings section. A bookings feed replaces the bookings only.
    pub fn update_from(&mut self, new: WhazzupData) {
        let WhazzupData {
            mut pilots,
            prefiled,
            controllers,
            booked_controllers,
            servers,
            whazzup_time,
            bookings_time,
            connected_clients,
            reload_minutes,
            version,
            network,
            source,
            has_bookings,
            ..
        } = new;

        if source == Source::Whazzup {
            for (callsign, pilot) in &mut pilots {
                if let Some(previous) = self.pilots.get_mut(callsign) {
                    pilot.inherit_route_memo(previous);
                }
            }
            self.pilots = pilots;
            self.prefiled = prefiled;
            self.controllers = controllers;
            self.servers = servers;
            self.whazzup_time = whazzup_time;
            self.connected_clients = connected_clients;
            self.reload_minutes = reload_minutes;
            self.version = version;
            self.network = network;
        }
        if has_bookings || source == Source::Bookings {
            self.booked_controllers = booked_controllers;
            self.bookings_time = bookings_time;
        }
        self.predicted_time = None;
    }

    pub fn assign_sectors(&mut self, sectors: &SectorLoader) {
        let mut assigned = 0;
        for controller in self.controllers.values_mut() {
            if controller.assign_sector(sectors) {
                assigned += 1;
            }
        }
        debug!("assigned sectors to {assigned} controllers");
    }

    /// Live pilots take precedence over prefiled flights of the same callsign.
    pub fn find_pilot(&self, callsign: &str) -> Option<&Pilot> {
        self.pilots
            .get(callsign)
            .or_else(|| self.prefiled.get(callsign))
    }

    pub fn find_controller(&self, callsign: &str) -> Option<&Controller> {
        self.controllers.get(callsign)
    }

    pub fn bookings_for(&self, callsign: &str) -> impl Iterator<Item = &BookedController> {
        let callsign = callsign.to_string();
        self.booked_controllers
            .iter()
            .filter(move |booking| booking.callsign == callsign)
    }

    /// Everything matching `pattern`, ordered by label.
    pub fn search(&self, pattern: &Regex) -> Vec<MapItem> {
        self.pilots
            .values()
            .map(MapItem::Pilot)
            .chain(self.prefiled.values().map(MapItem::Pilot))
            .chain(self.controllers.values().map(MapItem::Controller))
            .chain(self.booked_controllers.iter().map(MapItem::BookedController))
            .filter(|item| item.matches(pattern))
            .sorted_by(|a, b| a.label().cmp(b.label()))
            .collect()
    }

    /// The snapshot as it would look at `at`: airborne pilots moved along
    /// their route (or heading) at their groundspeed, prefiled flights
    /// departing in between started, bookings active at `at` online. Source
    /// timestamps are kept, only `predicted_time` is set.
    pub fn predict(&self, at: DateTime<Utc>, resolver: &RouteResolver) -> WhazzupData {
        let mut predicted = self.clone();
        predicted.predicted_time = Some(at);
        let elapsed_hours = self.whazzup_time.map_or(0., |time| hours_between(time, at));

        for pilot in predicted.pilots.values_mut() {
            if pilot.is_airborne() && elapsed_hours > 0. {
                let moved = f64::from(pilot.groundspeed) * elapsed_hours;
                advance(pilot, moved, resolver);
            }
        }

        let nav = resolver.nav_data();
        // without an update time the last day counts as the window
        let since = self.whazzup_time.unwrap_or(at - Duration::days(1));
        let prefiled = std::mem::take(&mut predicted.prefiled);
        for (callsign, mut pilot) in prefiled {
            let departs = pilot
                .flight_plan
                .departure_at(since)
                .filter(|departs| *departs > since && *departs <= at);
            let departure = pilot.departure_waypoint(nav);
            match (departs, departure) {
                (Some(departs), Some(departure)) if !predicted.pilots.contains_key(&callsign) => {
                    trace!("{callsign} departs {} at {departs}", departure.label);
                    pilot.prefiled = false;
                    pilot.client.position = departure.position;
                    pilot.groundspeed = pilot.flight_plan.tas_cruise;
                    pilot.altitude = pilot.flight_plan.altitude_ft().unwrap_or_default();
                    let moved = f64::from(pilot.groundspeed) * hours_between(departs, at);
                    advance(&mut pilot, moved, resolver);
                    predicted.pilots.insert(callsign, pilot);
                }
                _ => {
                    predicted.prefiled.insert(callsign, pilot);
                }
            }
        }

        for booking in &self.booked_controllers {
            if booking.is_active_at(at) && !predicted.controllers.contains_key(&booking.callsign) {
                predicted
                    .controllers
                    .insert(booking.callsign.clone(), booking.to_controller());
            }
        }

        predicted
    }
}

fn hours_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_milliseconds() as f64 / 3_600_000.
}

/// Route points still ahead of `position`: from the closest waypoint on,
/// or from the one after it when that has already been passed.
fn remaining_route(position: Point, route: &[Point]) -> Vec<Point> {
    let Some((closest, _)) = route.iter().enumerate().min_by(|(_, a), (_, b)| {
        distance_nm(position, **a)
            .partial_cmp(&distance_nm(position, **b))
            .unwrap_or(std::cmp::Ordering::Equal)
    }) else {
        return vec![];
    };
    let start = match route.get(closest + 1) {
        Some(next) if distance_nm(position, *next) < distance_nm(route[closest], *next) => {
            closest + 1
        }
        _ => closest,
    };
    route[start..].to_vec()
}

fn advance(pilot: &mut Pilot, moved_nm: f64, resolver: &RouteResolver) {
    let route = pilot
        .route_waypoints(resolver)
        .iter()
        .map(|wpt| wpt.position)
        .collect::<Vec<_>>();
    let position = pilot.client.position;

    if route.len() < 2 {
        pilot.client.position =
            point_distance_bearing(position, moved_nm, f64::from(pilot.heading));
        return;
    }

    let path = once(position)
        .chain(remaining_route(position, &route))
        .collect::<Vec<_>>();
    if moved_nm >= path_distance_nm(&path) {
        trace!("{} arrived", pilot.callsign);
        pilot.client.position = *path.last().unwrap_or(&position);
        pilot.groundspeed = 0;
        pilot.altitude = 0;
        return;
    }
    if let Some((point, next)) = point_along_path(&path, moved_nm) {
        pilot.client.position = point;
        if let Some(next_point) = path.get(next) {
            pilot.heading = normalize_bearing(bearing_deg(point, *next_point)).round() as i32 % 360;
        }
    }
}

#[cfg(test)]
mod test {
    use chrono::{Duration, TimeZone, Utc};
    use regex::Regex;

    use crate::client::Network;
    use crate::geodesy::distance_nm;
    use crate::navdata::{parse_airports, NavData};
    use crate::route::RouteResolver;
    use crate::settings::{ParserSettings, ResolverSettings};

    use super::{Source, WhazzupData};

    fn line(values: &[(usize, &str)]) -> String {
        let mut fields = vec![""; 41];
        for (index, value) in values {
            fields[*index] = *value;
        }
        fields.join(":")
    }

    fn pilot_line(callsign: &str, lat: &str, lon: &str, groundspeed: &str) -> String {
        line(&[
            (0, callsign),
            (1, "1234567"),
            (2, "Jane Doe"),
            (3, "PILOT"),
            (5, lat),
            (6, lon),
            (7, "35000"),
            (8, groundspeed),
            (10, "450"),
            (11, "EDDF"),
            (12, "FL350"),
            (13, "EDDM"),
            (22, "1215"),
            (30, "DCT"),
            (38, "90"),
        ])
    }

    fn feed() -> String {
        [
            "; whazzup".to_string(),
            "!GENERAL".to_string(),
            "VERSION = 8".to_string(),
            "RELOAD = 2".to_string(),
            "UPDATE = 20240317120000".to_string(),
            "CONNECTED CLIENTS = 4".to_string(),
            "!CLIENTS".to_string(),
            pilot_line("DLH123", "50.033333", "8.570556", "300"),
            pilot_line("DLH9", "abc", "8.0", "0"),
            pilot_line("", "50.0", "8.0", "0"),
            line(&[(0, "EDGG_CTR"), (1, "7654321"), (3, "ATC"), (4, "135.725"), (18, "6")]),
            line(&[(0, "SOMEONE"), (3, "ALIEN")]),
            "!PREFILE".to_string(),
            pilot_line("DLH123", "0", "0", "0"),
            pilot_line("BAW1", "0", "0", "0"),
            "!SERVERS".to_string(),
            "GERMANY:1.2.3.4:Frankfurt:Germany Server:1".to_string(),
            "!WEIRD".to_string(),
            "whatever:line".to_string(),
            "!BOOKINGS".to_string(),
            booking_line("EDDM_TWR", "20240317130000", "20240317150000"),
        ]
        .join("\n")
    }

    fn booking_line(callsign: &str, starts: &str, ends: &str) -> String {
        let mut fields = vec![""; 17];
        fields[0] = callsign;
        fields[1] = "1112223";
        fields[2] = "Erika Muster";
        fields[3] = "ATC";
        fields[14] = ends;
        fields[16] = starts;
        fields.join(":")
    }

    fn nav() -> NavData {
        NavData {
            airports: parse_airports(
                b"EDDF:Frankfurt Main:Frankfurt:DE:50.033333:8.570556
EDDM:Muenchen:Munich:DE:48.353783:11.786086
",
            )
            .unwrap(),
            ..Default::default()
        }
    }

    fn update_time() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 17, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_parse_sections() {
        let data = WhazzupData::parse(feed().as_bytes(), &ParserSettings::default()).unwrap();

        assert_eq!(data.version, 8);
        assert_eq!(data.reload_minutes, 2);
        assert_eq!(data.connected_clients, 4);
        assert_eq!(data.whazzup_time, Some(update_time()));
        assert_eq!(data.bookings_time, Some(update_time()));
        assert_eq!(data.predicted_time, None);

        let mut pilots: Vec<_> = data.pilots.keys().cloned().collect();
        pilots.sort();
        assert_eq!(pilots, vec!["DLH123", "DLH9"]);
        assert_eq!(data.controllers.len(), 1);
        assert_eq!(data.prefiled.len(), 2);
        assert_eq!(data.servers.len(), 1);
        assert!(data.servers[0].clients_allowed);
        assert_eq!(data.booked_controllers.len(), 1);
        assert_eq!(data.source, Source::Whazzup);
    }

    #[test]
    fn test_non_numeric_latitude_pilot_kept() {
        let data = WhazzupData::parse(feed().as_bytes(), &ParserSettings::default()).unwrap();
        let pilot = &data.pilots["DLH9"];
        assert!(pilot.position.y().abs() < f64::EPSILON);
        assert_eq!(pilot.user_id, "1234567");
    }

    #[test]
    fn test_find_pilot_prefers_live() {
        let data = WhazzupData::parse(feed().as_bytes(), &ParserSettings::default()).unwrap();

        assert!(!data.find_pilot("DLH123").unwrap().prefiled);
        assert!(data.find_pilot("BAW1").unwrap().prefiled);
        assert!(data.find_pilot("NOPE").is_none());
    }

    #[test]
    fn test_search() {
        let data = WhazzupData::parse(feed().as_bytes(), &ParserSettings::default()).unwrap();
        let labels: Vec<_> = data
            .search(&Regex::new("^DLH|_TWR$").unwrap())
            .into_iter()
            .map(|item| crate::map_object::MapObject::label(&item).to_string())
            .collect();
        assert_eq!(labels, vec!["DLH123", "DLH123", "DLH9", "EDDM_TWR"]);
    }

    #[test]
    fn test_update_from_by_source() {
        let settings = ParserSettings::default();
        let mut live = WhazzupData::parse(feed().as_bytes(), &settings).unwrap();

        let next = "!GENERAL\nUPDATE = 20240317120200\n!CLIENTS\n".to_string()
            + &pilot_line("AFR1", "48.0", "2.0", "420");
        live.update_from(WhazzupData::parse(next.as_bytes(), &settings).unwrap());
        assert_eq!(live.pilots.len(), 1);
        assert!(live.pilots.contains_key("AFR1"));
        assert!(live.prefiled.is_empty());
        assert_eq!(live.whazzup_time, Some(update_time() + Duration::minutes(2)));
        // no bookings section: bookings survive
        assert_eq!(live.booked_controllers.len(), 1);
        assert_eq!(live.bookings_time, Some(update_time()));

        let bookings = "!GENERAL\nUPDATE = 20240317121000\n!BOOKINGS\n".to_string()
            + &booking_line("EDDF_APP", "20240317180000", "20240317200000")
            + "\n"
            + &booking_line("EDDF_TWR", "20240317180000", "20240317200000");
        live.update_from(WhazzupData::parse_bookings(bookings.as_bytes(), &settings).unwrap());
        assert_eq!(live.booked_controllers.len(), 2);
        assert_eq!(live.bookings_time, Some(update_time() + Duration::minutes(10)));
        assert_eq!(live.whazzup_time, Some(update_time() + Duration::minutes(2)));
        assert!(live.pilots.contains_key("AFR1"));
    }

    #[test]
    fn test_predict_keeps_source_timestamps() {
        let nav = nav();
        let resolver = RouteResolver::new(&nav, &ResolverSettings::default());
        let data = WhazzupData::parse(feed().as_bytes(), &ParserSettings::default()).unwrap();
        let at = update_time() + Duration::minutes(10);

        let predicted = data.predict(at, &resolver);
        assert_eq!(predicted.whazzup_time, data.whazzup_time);
        assert_eq!(predicted.bookings_time, data.bookings_time);
        assert_eq!(predicted.predicted_time, Some(at));
    }

    #[test]
    fn test_predict_moves_along_route() {
        let nav = nav();
        let resolver = RouteResolver::new(&nav, &ResolverSettings::default());
        let data = WhazzupData::parse(feed().as_bytes(), &ParserSettings::default()).unwrap();
        let eddf = nav.airports["EDDF"].position;
        let eddm = nav.airports["EDDM"].position;

        // 300 kt for 10 minutes
        let predicted = data.predict(update_time() + Duration::minutes(10), &resolver);
        let pilot = &predicted.pilots["DLH123"];
        assert!((distance_nm(eddf, pilot.position) - 50.).abs() < 0.05);
        assert!(
            (distance_nm(pilot.position, eddm) - (distance_nm(eddf, eddm) - 50.)).abs() < 0.05
        );
        assert!((120..=135).contains(&pilot.heading));
        assert_eq!(pilot.groundspeed, 300);

        // an hour is enough to arrive
        let predicted = data.predict(update_time() + Duration::hours(1), &resolver);
        let pilot = &predicted.pilots["DLH123"];
        assert!(distance_nm(pilot.position, eddm) < 0.01);
        assert_eq!(pilot.groundspeed, 0);

        // ground traffic does not move
        assert_eq!(predicted.pilots["DLH9"].position, data.pilots["DLH9"].position);
    }

    #[test]
    fn test_predict_without_route_follows_heading() {
        let nav = NavData::default();
        let resolver = RouteResolver::new(&nav, &ResolverSettings::default());
        let feed = "!GENERAL\nUPDATE = 20240317120000\n!CLIENTS\n".to_string()
            + &line(&[
                (0, "BUSH1"),
                (3, "PILOT"),
                (5, "10.0"),
                (6, "20.0"),
                (8, "600"),
                (38, "90"),
            ]);
        let data = WhazzupData::parse(feed.as_bytes(), &ParserSettings::default()).unwrap();

        let predicted = data.predict(update_time() + Duration::minutes(6), &resolver);
        let pilot = &predicted.pilots["BUSH1"];
        let start = data.pilots["BUSH1"].position;
        assert!((distance_nm(start, pilot.position) - 60.).abs() < 0.05);
        assert!(pilot.position.x() > 20.9);
    }

    #[test]
    fn test_predict_starts_prefiled_and_bookings() {
        let nav = nav();
        let resolver = RouteResolver::new(&nav, &ResolverSettings::default());
        let data = WhazzupData::parse(feed().as_bytes(), &ParserSettings::default()).unwrap();

        // BAW1 departs 12:15 at 450 kt TAS, EDDM_TWR is booked 13:00-15:00
        let predicted = data.predict(update_time() + Duration::minutes(20), &resolver);
        let baw = &predicted.pilots["BAW1"];
        assert!(!baw.prefiled);
        assert!(!predicted.prefiled.contains_key("BAW1"));
        let eddf = nav.airports["EDDF"].position;
        assert!((distance_nm(eddf, baw.position) - 37.5).abs() < 0.05);
        assert_eq!(baw.altitude, 35000);
        // live DLH123 keeps precedence over its prefile
        assert!(predicted.prefiled.contains_key("DLH123"));
        assert!(!predicted.controllers.contains_key("EDDM_TWR"));

        let later = data.predict(update_time() + Duration::minutes(70), &resolver);
        assert!(later.controllers.contains_key("EDDM_TWR"));
        assert!(later.controllers.contains_key("EDGG_CTR"));
    }

    #[test]
    fn test_headers_with_trailing_colon() {
        let feed = [
            "!GENERAL:".to_string(),
            "UPDATE = 20240317120000".to_string(),
            "!CLIENTS:".to_string(),
            pilot_line("DLH123", "50.033333", "8.570556", "300"),
            "!PREFILE:".to_string(),
            pilot_line("BAW1", "0", "0", "0"),
            "!SERVERS:".to_string(),
            "GERMANY:1.2.3.4:Frankfurt:Germany Server:1".to_string(),
        ]
        .join("\n");
        let data = WhazzupData::parse(feed.as_bytes(), &ParserSettings::default()).unwrap();

        assert_eq!(data.whazzup_time, Some(update_time()));
        assert!(data.pilots.contains_key("DLH123"));
        assert!(data.prefiled.contains_key("BAW1"));
        assert_eq!(data.servers.len(), 1);
    }

    #[test]
    fn test_bookings_section_without_update_replaces_bookings() {
        let settings = ParserSettings::default();
        let mut live = WhazzupData::parse(feed().as_bytes(), &settings).unwrap();
        assert_eq!(live.booked_controllers[0].callsign, "EDDM_TWR");

        let next = format!(
            "!CLIENTS\n{}\n!BOOKINGS\n{}",
            pilot_line("AFR1", "48.0", "2.0", "420"),
            booking_line("EDDF_TWR", "20240317180000", "20240317200000")
        );
        let next = WhazzupData::parse(next.as_bytes(), &settings).unwrap();
        assert!(next.has_bookings);
        assert!(next.bookings_time.is_none());
        live.update_from(next);

        let bookings: Vec<_> = live
            .booked_controllers
            .iter()
            .map(|booking| booking.callsign.as_str())
            .collect();
        assert_eq!(bookings, vec!["EDDF_TWR"]);
        assert!(live.pilots.contains_key("AFR1"));

        // an empty bookings section clears them too
        let empty = WhazzupData::parse(b"!CLIENTS\n!BOOKINGS\n", &settings).unwrap();
        live.update_from(empty);
        assert!(live.booked_controllers.is_empty());
    }

    #[test]
    fn test_predict_starts_prefile_after_midnight() {
        let nav = nav();
        let resolver = RouteResolver::new(&nav, &ResolverSettings::default());
        let mut prefile = vec![""; 41];
        prefile[0] = "CFG1";
        prefile[3] = "PILOT";
        prefile[10] = "420";
        prefile[11] = "EDDF";
        prefile[13] = "EDDM";
        prefile[22] = "0005";
        prefile[30] = "DCT";
        let feed = format!(
            "!GENERAL\nUPDATE = 20240317235000\n!PREFILE\n{}",
            prefile.join(":")
        );
        let data = WhazzupData::parse(feed.as_bytes(), &ParserSettings::default()).unwrap();
        let snapshot = Utc.with_ymd_and_hms(2024, 3, 17, 23, 50, 0).unwrap();

        let before = data.predict(snapshot + Duration::minutes(10), &resolver);
        assert!(before.prefiled.contains_key("CFG1"));

        let after = data.predict(snapshot + Duration::minutes(20), &resolver);
        assert!(after.pilots.contains_key("CFG1"));
        let eddf = nav.airports["EDDF"].position;
        assert!((distance_nm(eddf, after.pilots["CFG1"].position) - 35.).abs() < 0.05);
    }

    #[test]
    fn test_ivao_network() {
        let settings = ParserSettings {
            network: Network::Ivao,
            ..Default::default()
        };
        let mut fields = vec![""; 44];
        fields[0] = "IVA123";
        fields[3] = "PILOT";
        fields[42] = "4";
        let feed = format!("!CLIENTS\n{}", fields.join(":"));
        let data = WhazzupData::parse(feed.as_bytes(), &settings).unwrap();

        assert_eq!(data.network, Network::Ivao);
        assert_eq!(data.pilots["IVA123"].rating, 4);
        assert!(data.whazzup_time.is_none());
    }
}
