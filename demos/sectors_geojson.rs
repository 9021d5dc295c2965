use std::{env::args_os, fs, io};

use geojson::feature::Id;
use geojson::{Feature, FeatureCollection};
use serde_json::Map;
use whazzup_parser::sectors::SectorLoader;

fn main() {
    tracing_subscriber::fmt().with_writer(io::stderr).init();
    let list_path = args_os()
        .nth(1)
        .expect("missing argument: path to sector list");
    let display_path = args_os()
        .nth(2)
        .expect("missing argument: path to sector display file");
    let geojson_path = args_os()
        .nth(3)
        .expect("missing argument: path to .geojson output");

    let mut loader = SectorLoader::default();
    let display = fs::read(display_path).unwrap();
    loader
        .load_from_bytes(&fs::read(list_path).unwrap(), [display.as_slice()])
        .expect("unsuccessful parse");

    let feature_collection = FeatureCollection::from_iter(loader.sectors().filter_map(|sector| {
        let polygon = sector.polygon()?;
        Some(Feature {
            id: Some(Id::String(sector.icao.clone())),
            geometry: Some((&polygon).into()),
            properties: Some(Map::from_iter(vec![
                ("name".to_string(), sector.name.clone().into()),
                ("country".to_string(), sector.country_code.clone().into()),
                ("id".to_string(), sector.id.into()),
            ])),
            ..Default::default()
        })
    }));

    fs::write(geojson_path, feature_collection.to_string()).expect("could not write .geojson");
}
