use std::{env::args, io, path::Path};

use itertools::Itertools;
use whazzup_parser::geodesy::path_distance_nm;
use whazzup_parser::route::{direct_distance_nm, RouteResolver};
use whazzup_parser::settings::Settings;
use whazzup_parser::{navdata::NavData, DegMinSecExt as _};

fn main() {
    tracing_subscriber::fmt().with_writer(io::stderr).init();
    let settings_path = args().nth(1).expect("missing argument: path to settings.json");
    let departure = args().nth(2).expect("missing argument: departure ICAO");
    let destination = args().nth(3).expect("missing argument: destination ICAO");
    let route = args().skip(4).join(" ");

    let settings = Settings::from_path(Path::new(&settings_path)).expect("invalid settings");
    let nav_data = NavData::load(&settings.nav_data).expect("could not load nav data");
    let resolver = RouteResolver::new(&nav_data, &settings.resolver);

    let waypoints = resolver.resolve_flight(
        resolver.airport_waypoint(&departure.to_uppercase()),
        resolver.airport_waypoint(&destination.to_uppercase()),
        &route,
    );
    for waypoint in &waypoints {
        println!("{:<8}{}", waypoint.label, waypoint.position.deg_min_sec_fmt());
    }
    if let Some(direct) = direct_distance_nm(&waypoints) {
        let flown = path_distance_nm(waypoints.iter().map(|wpt| &wpt.position));
        println!(
            "{} waypoints, {flown:.1} NM ({direct:.1} NM direct)",
            waypoints.len()
        );
    }
}
