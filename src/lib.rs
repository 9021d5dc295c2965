use std::io;

use geo::{Coord, Point};
use tracing::warn;

pub mod booking;
pub mod client;
pub mod context;
pub mod controller;
pub mod geodesy;
pub mod map_object;
pub mod navdata;
pub mod pilot;
pub mod route;
pub mod sectors;
pub mod settings;
pub mod tokenizer;
pub mod whazzup;

fn read_to_string(contents: &[u8]) -> Result<String, io::Error> {
    String::from_utf8(contents.to_vec()).or_else(|_| {
        let (string, _, errors) = encoding_rs::WINDOWS_1252.decode(contents);
        if errors {
            warn!("errors while decoding win-1252");
        }
        Ok(string.to_string())
    })
}

type DegMinSec = (i16, u8, f64);

fn decimal_to_dms(decimal: f64, is_latitude: bool) -> (u8, u8, f64, char) {
    let degrees = decimal as i16;
    let minutes = (decimal.abs().fract() * 60.0) as u8;
    let seconds = (decimal.abs() - decimal.abs().floor() - f64::from(minutes) / 60.) * 3600.0;

    let direction = if is_latitude {
        if decimal >= 0. {
            'N'
        } else {
            'S'
        }
    } else if decimal >= 0. {
        'E'
    } else {
        'W'
    };

    (degrees.unsigned_abs() as u8, minutes, seconds, direction)
}

pub trait DegMinSecExt {
    fn from_deg_min_sec(lat: DegMinSec, lng: DegMinSec) -> Self;
    fn lat_deg_min_sec_fmt(&self) -> String;
    fn lng_deg_min_sec_fmt(&self) -> String;
    fn deg_min_sec_fmt(&self) -> String {
        format!(
            "{} {}",
            self.lat_deg_min_sec_fmt(),
            self.lng_deg_min_sec_fmt()
        )
    }
}

fn dms_part_fmt((deg, min, sec, hemisphere): (u8, u8, f64, char)) -> String {
    let carry_rounded_sec = (sec - 60.).abs() < 0.000_001;
    let min = min + u8::from(carry_rounded_sec);
    let sec = if carry_rounded_sec { 0.0 } else { sec };
    format!("{hemisphere}{deg:03}.{min:02}.{sec:06.3}")
}

impl DegMinSecExt for Coord {
    fn from_deg_min_sec(lat: DegMinSec, lng: DegMinSec) -> Self {
        let lat_deg = f64::from(lat.0);
        let lat_min = f64::from(lat.1);
        let lng_deg = f64::from(lng.0);
        let lng_min = f64::from(lng.1);
        Self {
            y: lat_deg + lat_deg.signum() * lat_min / 60.0 + lat_deg.signum() * lat.2 / 3600.0,
            x: lng_deg + lng_deg.signum() * lng_min / 60.0 + lng_deg.signum() * lng.2 / 3600.0,
        }
    }

    fn lat_deg_min_sec_fmt(&self) -> String {
        dms_part_fmt(decimal_to_dms(self.y, true))
    }

    fn lng_deg_min_sec_fmt(&self) -> String {
        dms_part_fmt(decimal_to_dms(self.x, false))
    }
}

impl DegMinSecExt for Point {
    fn from_deg_min_sec(lat: DegMinSec, lng: DegMinSec) -> Self {
        Coord::from_deg_min_sec(lat, lng).into()
    }

    fn lat_deg_min_sec_fmt(&self) -> String {
        self.0.lat_deg_min_sec_fmt()
    }

    fn lng_deg_min_sec_fmt(&self) -> String {
        self.0.lng_deg_min_sec_fmt()
    }
}
