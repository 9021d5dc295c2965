//! Route strings resolved against the navigation data.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::io;

use chrono::{DateTime, Utc};
use geo::{point, Point};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, trace};

use crate::geodesy::{distance_nm, path_distance_nm, point_distance_bearing};
use crate::navdata::{NavData, Waypoint};
use crate::settings::ResolverSettings;
use crate::tokenizer::{lines, Fields};
use crate::{read_to_string, DegMinSecExt as _};

#[derive(Error, Debug)]
pub enum RouteError {
    #[error("failed to read route list: {0}")]
    FileRead(#[from] io::Error),
}

pub type RouteResult = Result<Vec<Route>, RouteError>;

#[derive(Clone, Copy, Debug, Serialize, PartialEq)]
pub enum RouteDistance {
    /// as published by the route provider
    Supplied(f64),
    /// summed up from the resolved waypoints
    Calculated(f64),
}

impl RouteDistance {
    pub fn nm(self) -> f64 {
        match self {
            Self::Supplied(nm) | Self::Calculated(nm) => nm,
        }
    }
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct Route {
    pub provider: String,
    pub departure: String,
    pub destination: String,
    pub min_fl: Option<u32>,
    pub max_fl: Option<u32>,
    pub route: String,
    pub comments: String,
    pub last_change: Option<DateTime<Utc>>,
    pub waypoints: Vec<Waypoint>,
    pub distance: Option<RouteDistance>,
}

impl Route {
    /// `departure:destination:min_fl:max_fl:distance:last_change:route:comments`
    pub fn parse(fields: &Fields, provider: &str) -> Self {
        Self {
            provider: provider.to_string(),
            departure: fields.trimmed(0).to_uppercase(),
            destination: fields.trimmed(1).to_uppercase(),
            min_fl: fields.parse(2),
            max_fl: fields.parse(3),
            distance: fields.parse(4).map(RouteDistance::Supplied),
            last_change: fields.timestamp(5),
            route: fields.string(6),
            comments: fields.rest(7, ":").trim().to_string(),
            waypoints: vec![],
        }
    }

    pub fn is_null(&self) -> bool {
        self.departure.is_empty() || self.destination.is_empty()
    }

    /// Resolves the waypoints and fills in a calculated distance unless the
    /// provider supplied one.
    pub fn resolve(&mut self, resolver: &RouteResolver) {
        self.waypoints = resolver.resolve_flight(
            resolver.airport_waypoint(&self.departure),
            resolver.airport_waypoint(&self.destination),
            &self.route,
        );
        if !matches!(self.distance, Some(RouteDistance::Supplied(_))) {
            self.distance = Some(RouteDistance::Calculated(path_distance_nm(
                self.waypoints.iter().map(|wpt| &wpt.position),
            )));
        }
    }
}

pub fn parse_routes(content: &[u8], provider: &str) -> RouteResult {
    let content = read_to_string(content)?;
    Ok(lines(&content)
        .map(|line| Route::parse(&Fields::split(line, ':'), provider))
        .filter(|route| {
            if route.is_null() {
                debug!("skipping route without departure/destination");
            }
            !route.is_null()
        })
        .collect())
}

fn speed_level_regex() -> &'static Regex {
    static SPEED_LEVEL_RE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"^[NKM]\d{3,4}([FAMS]\d{3,4}|VFR)?$").unwrap());
    &SPEED_LEVEL_RE
}

fn coord_regex() -> &'static Regex {
    static COORD_RE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"^(\d{1,6})(N|S)(\d{2,7})(E|W)$").unwrap());
    &COORD_RE
}

fn range_bearing_regex() -> &'static Regex {
    static RANGE_BEARING_RE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"^([0-9A-Z]{2,5})(\d{3})(\d{3})$").unwrap());
    &RANGE_BEARING_RE
}

/// `DD`, `DDMM` or `DDMMSS` into degrees, minutes, seconds.
fn split_dms(value: &str, degree_digits: usize) -> Option<(i16, u8, f64)> {
    let deg = value.get(..degree_digits)?.parse().ok()?;
    let min = value.get(degree_digits..degree_digits + 2).map_or(Some(0), |m| m.parse().ok())?;
    let sec = value
        .get(degree_digits + 2..degree_digits + 4)
        .map_or(Some(0.), |s| s.parse().ok())?;
    Some((deg, min, sec))
}

/// Latitude/longitude designators like `46N078W`, `4620N05805W` or
/// `462013N0580503W`. Abbreviated degrees without a leading zero are
/// accepted (`4N40W`).
fn convert_coordinate(designator: &str) -> Option<Waypoint> {
    let captures = coord_regex().captures(designator)?;
    let lat_str = &captures[1];
    let lng_str = &captures[3];
    let normalised_lat_str = if matches!(lat_str.len(), 1 | 3 | 5) {
        if lat_str.starts_with('0') {
            debug!("abbreviated coordinate must not start with 0: {designator}");
            return None;
        }
        format!("0{lat_str}")
    } else {
        lat_str.to_string()
    };
    let normalised_lng_str = if matches!(lng_str.len(), 2 | 4 | 6) {
        if lng_str.starts_with('0') {
            debug!("abbreviated coordinate must not start with 0: {designator}");
            return None;
        }
        format!("0{lng_str}")
    } else {
        lng_str.to_string()
    };
    if normalised_lng_str.len().saturating_sub(normalised_lat_str.len()) != 1 {
        debug!("coordinate with mismatching lat/lon precision: {designator}");
        return None;
    }

    let position = Point::from_deg_min_sec(
        split_dms(&normalised_lat_str, 2)?,
        split_dms(&normalised_lng_str, 3)?,
    );
    let n_s = &captures[2];
    let w_e = &captures[4];
    Some(Waypoint {
        label: format!("{normalised_lat_str}{n_s}{normalised_lng_str}{w_e}"),
        position: point! {
            x: if w_e == "E" { 1.0 } else { -1.0 } * position.x(),
            y: if n_s == "N" { 1.0 } else { -1.0 } * position.y(),
        },
    })
}

/// Resolves route tokens against a [`NavData`].
#[derive(Clone, Debug)]
pub struct RouteResolver<'a> {
    nav: &'a NavData,
    ignored_tokens: HashSet<String>,
}

impl<'a> RouteResolver<'a> {
    pub fn new(nav: &'a NavData, settings: &ResolverSettings) -> Self {
        Self {
            nav,
            ignored_tokens: settings
                .ignored_tokens
                .iter()
                .map(|token| token.to_uppercase())
                .collect(),
        }
    }

    pub fn nav_data(&self) -> &'a NavData {
        self.nav
    }

    /// Upper-cased route tokens with `/` suffixes, speed/level groups and
    /// ignored keywords removed.
    pub fn tokens(&self, route: &str) -> Vec<String> {
        route
            .split_whitespace()
            .filter_map(|token| {
                let token = token.split('/').next().unwrap_or_default().to_uppercase();
                if token.is_empty()
                    || self.ignored_tokens.contains(&token)
                    || speed_level_regex().is_match(&token)
                {
                    None
                } else {
                    Some(token)
                }
            })
            .collect()
    }

    pub fn airport_waypoint(&self, icao: &str) -> Option<Waypoint> {
        self.nav.airport(icao).map(crate::navdata::Airport::waypoint)
    }

    fn convert_range_bearing(&self, designator: &str, near: Point) -> Option<Waypoint> {
        let captures = range_bearing_regex().captures(designator)?;
        let fix = self.nav.nearest_waypoint(&captures[1], near)?;
        // TODO apply magnetic variation once the nav data carries it
        let bearing: f64 = captures[2].parse().ok()?;
        let range: f64 = captures[3].parse().ok()?;
        Some(Waypoint {
            label: designator.to_string(),
            position: point_distance_bearing(fix.position, range, bearing),
        })
    }

    /// A single token as a point, picking the candidate closest to `near`.
    pub fn waypoint(&self, token: &str, near: Point) -> Option<Waypoint> {
        self.nav
            .nearest_waypoint(token, near)
            .or_else(|| convert_coordinate(token))
            .or_else(|| self.convert_range_bearing(token, near))
    }

    fn expand_airway(
        &self,
        airway: &str,
        from: &str,
        to: &str,
        near: Point,
    ) -> Option<Vec<Waypoint>> {
        self.nav
            .airways
            .get_vec(airway)?
            .iter()
            .filter(|chain| chain.position_of(from).is_some() && chain.position_of(to).is_some())
            .min_by(|a, b| {
                a.distance_to(near)
                    .partial_cmp(&b.distance_to(near))
                    .unwrap_or(Ordering::Equal)
            })
            .map(|chain| chain.expand(from, to))
            .filter(|expanded| !expanded.is_empty())
    }

    /// Walks `tokens` in order. Airways between a resolved point and the
    /// following token are expanded, everything else is looked up as a
    /// point near the last resolved position. Unresolvable tokens are
    /// dropped.
    pub fn resolve(&self, tokens: &[String], start: Point) -> Vec<Waypoint> {
        let mut waypoints: Vec<Waypoint> = vec![];
        let mut current = start;
        let mut index = 0;

        while index < tokens.len() {
            let token = &tokens[index];

            if let (Some(from), Some(to)) = (waypoints.last(), tokens.get(index + 1)) {
                if let Some(expanded) = self.expand_airway(token, &from.label, to, current) {
                    trace!("{token}: {} -> {to} ({} points)", from.label, expanded.len());
                    if let Some(last) = expanded.last() {
                        current = last.position;
                    }
                    waypoints.extend(expanded);
                    index += 2;
                    continue;
                }
            }

            match self.waypoint(token, current) {
                Some(wpt) => {
                    current = wpt.position;
                    waypoints.push(wpt);
                }
                None => debug!("could not resolve route token {token}"),
            }
            index += 1;
        }

        waypoints
    }

    /// Full flight path: departure, resolved route, destination.
    pub fn resolve_flight(
        &self,
        departure: Option<Waypoint>,
        destination: Option<Waypoint>,
        route: &str,
    ) -> Vec<Waypoint> {
        let start = departure
            .as_ref()
            .or(destination.as_ref())
            .map_or(point! { x: 0., y: 0. }, |wpt| wpt.position);
        let mut waypoints = self.resolve(&self.tokens(route), start);

        if let Some(departure) = departure {
            if waypoints.first().map(|wpt| &wpt.label) != Some(&departure.label) {
                waypoints.insert(0, departure);
            }
        }
        if let Some(destination) = destination {
            if waypoints.last().map(|wpt| &wpt.label) != Some(&destination.label) {
                waypoints.push(destination);
            }
        }
        waypoints
    }
}

/// Memoized route waypoints, recomputed whenever the route string or the
/// departure/destination it was resolved for changes.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RouteMemo {
    key: Option<RouteKey>,
    waypoints: Vec<Waypoint>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RouteKey {
    pub route: String,
    pub departure: String,
    pub destination: String,
}

impl RouteMemo {
    pub fn get_or_resolve(
        &mut self,
        key: RouteKey,
        resolve: impl FnOnce() -> Vec<Waypoint>,
    ) -> &[Waypoint] {
        if self.key.as_ref() != Some(&key) {
            trace!("resolving route {} {} {}", key.departure, key.route, key.destination);
            self.waypoints = resolve();
            self.key = Some(key);
        }
        &self.waypoints
    }

    pub fn invalidate(&mut self) {
        self.key = None;
        self.waypoints.clear();
    }

    pub fn is_cached_for(&self, key: &RouteKey) -> bool {
        self.key.as_ref() == Some(key)
    }
}

/// Distance between the first and last point of the path, for display next to
/// the flown route length.
pub fn direct_distance_nm(waypoints: &[Waypoint]) -> Option<f64> {
    Some(distance_nm(waypoints.first()?.position, waypoints.last()?.position))
}

#[cfg(test)]
mod test {
    use std::cell::Cell;

    use geo::point;
    use pretty_assertions_sorted::assert_eq_sorted;

    use crate::navdata::{airways::parse_airways, parse_airports, parse_fixes, NavData, Waypoint};
    use crate::settings::ResolverSettings;
    use crate::tokenizer::parse_timestamp;

    use super::{
        convert_coordinate, direct_distance_nm, parse_routes, RouteDistance, RouteKey, RouteMemo,
        RouteResolver,
    };

    fn nav() -> NavData {
        NavData {
            airports: parse_airports(
                b"EDDF:Frankfurt Main:Frankfurt:DE:50.033333:8.570556
EDDM:Muenchen:Munich:DE:48.353783:11.786086
",
            )
            .unwrap(),
            fixes: parse_fixes(
                b"49.196175 10.725828 ASPAT
49.360833 10.466111 DEBHI
48.844669 11.219353 ERNAS
49.722500 12.323333 ARMUT
-33.0 151.0 DEBHI
49.9 9.0 TOBAK
",
            )
            .unwrap(),
            airways: parse_airways(
                b"DEBHI 49.360833 10.466111 ASPAT 49.196175 10.725828 2 245 460 UN850
ASPAT 49.196175 10.725828 ERNAS 48.844669 11.219353 2 245 460 UN850
",
            )
            .unwrap(),
            ..Default::default()
        }
    }

    fn labels(waypoints: &[Waypoint]) -> Vec<&str> {
        waypoints.iter().map(|wpt| wpt.label.as_str()).collect()
    }

    #[test]
    fn test_tokens() {
        let nav = NavData::default();
        let resolver = RouteResolver::new(&nav, &ResolverSettings::default());
        assert_eq!(
            resolver.tokens("N0450F350 tobak/n0450f360 DCT debhi un850 ernas EDDM/26L SID"),
            vec!["TOBAK", "DEBHI", "UN850", "ERNAS", "EDDM"]
        );
    }

    #[test]
    fn test_airway_expansion() {
        let nav = nav();
        let resolver = RouteResolver::new(&nav, &ResolverSettings::default());
        let tokens = resolver.tokens("TOBAK DEBHI UN850 ERNAS");
        let resolved = resolver.resolve(&tokens, point! { x: 8.57, y: 50.03 });

        assert_eq!(labels(&resolved), vec!["TOBAK", "DEBHI", "ASPAT", "ERNAS"]);
        // the German DEBHI, not the Australian one
        assert!(resolved[1].position.y() > 0.);
    }

    #[test]
    fn test_unresolvable_tokens_are_skipped() {
        let nav = nav();
        let resolver = RouteResolver::new(&nav, &ResolverSettings::default());
        let resolved = resolver.resolve(
            &resolver.tokens("NOWHERE DEBHI UN850 NOPE ERNAS"),
            point! { x: 8.57, y: 50.03 },
        );
        // UN850 cannot reach NOPE, so it is tried (and dropped) as a point too
        assert_eq!(labels(&resolved), vec!["DEBHI", "ERNAS"]);
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let nav = nav();
        let resolver = RouteResolver::new(&nav, &ResolverSettings::default());
        let tokens = resolver.tokens("TOBAK DEBHI UN850 ERNAS ARMUT 4920N01100E");
        let start = point! { x: 8.57, y: 50.03 };
        assert_eq!(resolver.resolve(&tokens, start), resolver.resolve(&tokens, start));
    }

    #[test]
    fn test_direct_route_only_endpoints() {
        let nav = nav();
        let resolver = RouteResolver::new(&nav, &ResolverSettings::default());
        let mut routes = parse_routes(b"EDDF:EDDM::::20240301000000:DCT:direct", "test").unwrap();
        let route = &mut routes[0];
        route.resolve(&resolver);

        assert_eq!(labels(&route.waypoints), vec!["EDDF", "EDDM"]);
        let Some(RouteDistance::Calculated(nm)) = route.distance else {
            panic!("expected calculated distance, got {:?}", route.distance);
        };
        assert!((nm - direct_distance_nm(&route.waypoints).unwrap()).abs() < 1e-9);
        assert!((nm - 161.5).abs() < 1.5);
    }

    #[test]
    fn test_supplied_distance_is_kept() {
        let nav = nav();
        let resolver = RouteResolver::new(&nav, &ResolverSettings::default());
        let mut routes = parse_routes(
            b"; provider dump
eddf:eddm:100:240:180:20240301000000:TOBAK DEBHI UN850 ERNAS:via: the north
EDDF::::::
",
            "vroute",
        )
        .unwrap();
        assert_eq!(routes.len(), 1);
        let route = &mut routes[0];
        assert_eq!(route.provider, "vroute");
        assert_eq!(route.min_fl, Some(100));
        assert_eq!(route.max_fl, Some(240));
        assert_eq!(route.comments, "via: the north");
        assert_eq!(route.last_change, parse_timestamp("20240301000000"));

        route.resolve(&resolver);
        assert_eq!(
            labels(&route.waypoints),
            vec!["EDDF", "TOBAK", "DEBHI", "ASPAT", "ERNAS", "EDDM"]
        );
        assert_eq!(route.distance, Some(RouteDistance::Supplied(180.)));
    }

    #[test]
    fn test_coordinates() {
        assert_eq_sorted!(
            convert_coordinate("46N078W"),
            Some(Waypoint {
                label: "46N078W".to_string(),
                position: point! { x: -78.0, y: 46.0 },
            })
        );
        assert_eq!(
            convert_coordinate("4N40W").map(|wpt| wpt.label),
            Some("04N040W".to_string())
        );
        let wpt = convert_coordinate("4620N05805W").unwrap();
        assert!((wpt.position.y() - 46.333_333).abs() < 1e-5);
        assert!((wpt.position.x() + 58.083_333).abs() < 1e-5);
        assert!(convert_coordinate("4N04W").is_none());
        assert!(convert_coordinate("400N0400W").is_none());
        assert!(convert_coordinate("ARMUT").is_none());
    }

    #[test]
    fn test_range_bearing() {
        let nav = nav();
        let resolver = RouteResolver::new(&nav, &ResolverSettings::default());
        let wpt = resolver
            .waypoint("ARMUT090060", point! { x: 12., y: 49. })
            .unwrap();
        assert_eq!(wpt.label, "ARMUT090060");
        assert!((wpt.position.x() - 13.87).abs() < 0.05, "{:?}", wpt.position);
    }

    #[test]
    fn test_memo_invalidation() {
        let calls = Cell::new(0);
        let resolve = || {
            calls.set(calls.get() + 1);
            vec![Waypoint::new("EDDF", 50.03, 8.57)]
        };
        let key = RouteKey {
            route: "DCT".to_string(),
            departure: "EDDF".to_string(),
            destination: "EDDM".to_string(),
        };
        let mut memo = RouteMemo::default();

        assert_eq!(memo.get_or_resolve(key.clone(), resolve).len(), 1);
        assert_eq!(memo.get_or_resolve(key.clone(), resolve).len(), 1);
        assert_eq!(calls.get(), 1);
        assert!(memo.is_cached_for(&key));

        let changed = RouteKey {
            destination: "EDDS".to_string(),
            ..key.clone()
        };
        memo.get_or_resolve(changed, resolve);
        assert_eq!(calls.get(), 2);
        assert!(!memo.is_cached_for(&key));

        memo.invalidate();
        memo.get_or_resolve(key, resolve);
        assert_eq!(calls.get(), 3);
    }
}
