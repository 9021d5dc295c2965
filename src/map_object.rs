use geo::Point;
use regex::Regex;
use serde::Serialize;

use crate::booking::BookedController;
use crate::controller::Controller;
use crate::navdata::{Airport, NavAid, Waypoint};
use crate::pilot::Pilot;
use crate::sectors::Sector;

/// Anything with a label and a position that can be found on the map.
pub trait MapObject {
    fn label(&self) -> &str;
    fn position(&self) -> Point;
    fn matches(&self, pattern: &Regex) -> bool {
        pattern.is_match(self.label())
    }
}

impl MapObject for Waypoint {
    fn label(&self) -> &str {
        &self.label
    }

    fn position(&self) -> Point {
        self.position
    }
}

impl MapObject for NavAid {
    fn label(&self) -> &str {
        &self.label
    }

    fn position(&self) -> Point {
        self.position
    }

    fn matches(&self, pattern: &Regex) -> bool {
        pattern.is_match(&self.label) || pattern.is_match(&self.name)
    }
}

impl MapObject for Airport {
    fn label(&self) -> &str {
        &self.icao
    }

    fn position(&self) -> Point {
        self.position
    }

    fn matches(&self, pattern: &Regex) -> bool {
        Airport::matches(self, pattern)
    }
}

impl MapObject for Pilot {
    fn label(&self) -> &str {
        &self.callsign
    }

    fn position(&self) -> Point {
        self.client.position
    }

    fn matches(&self, pattern: &Regex) -> bool {
        Pilot::matches(self, pattern)
    }
}

impl MapObject for Controller {
    fn label(&self) -> &str {
        &self.callsign
    }

    fn position(&self) -> Point {
        self.client.position
    }

    fn matches(&self, pattern: &Regex) -> bool {
        Controller::matches(self, pattern)
    }
}

impl MapObject for BookedController {
    fn label(&self) -> &str {
        &self.callsign
    }

    fn position(&self) -> Point {
        Point::default()
    }

    fn matches(&self, pattern: &Regex) -> bool {
        BookedController::matches(self, pattern)
    }
}

impl MapObject for Sector {
    fn label(&self) -> &str {
        &self.icao
    }

    fn position(&self) -> Point {
        self.position
    }

    fn matches(&self, pattern: &Regex) -> bool {
        Sector::matches(self, pattern)
    }
}

/// Borrowed view of any map object, for code that needs the concrete kind.
#[derive(Clone, Copy, Debug, Serialize)]
#[serde(tag = "kind", content = "item")]
pub enum MapItem<'a> {
    Airport(&'a Airport),
    Waypoint(&'a Waypoint),
    NavAid(&'a NavAid),
    Pilot(&'a Pilot),
    Controller(&'a Controller),
    BookedController(&'a BookedController),
    Sector(&'a Sector),
}

pub trait MapItemVisitor {
    type Output;

    fn visit_airport(&mut self, airport: &Airport) -> Self::Output;
    fn visit_waypoint(&mut self, waypoint: &Waypoint) -> Self::Output;
    fn visit_navaid(&mut self, navaid: &NavAid) -> Self::Output;
    fn visit_pilot(&mut self, pilot: &Pilot) -> Self::Output;
    fn visit_controller(&mut self, controller: &Controller) -> Self::Output;
    fn visit_booked_controller(&mut self, booking: &BookedController) -> Self::Output;
    fn visit_sector(&mut self, sector: &Sector) -> Self::Output;
}

impl<'a> MapItem<'a> {
    pub fn accept<V: MapItemVisitor>(&self, visitor: &mut V) -> V::Output {
        match *self {
            MapItem::Airport(airport) => visitor.visit_airport(airport),
            MapItem::Waypoint(waypoint) => visitor.visit_waypoint(waypoint),
            MapItem::NavAid(navaid) => visitor.visit_navaid(navaid),
            MapItem::Pilot(pilot) => visitor.visit_pilot(pilot),
            MapItem::Controller(controller) => visitor.visit_controller(controller),
            MapItem::BookedController(booking) => visitor.visit_booked_controller(booking),
            MapItem::Sector(sector) => visitor.visit_sector(sector),
        }
    }

    fn object(&self) -> &'a dyn MapObject {
        match *self {
            MapItem::Airport(airport) => airport,
            MapItem::Waypoint(waypoint) => waypoint,
            MapItem::NavAid(navaid) => navaid,
            MapItem::Pilot(pilot) => pilot,
            MapItem::Controller(controller) => controller,
            MapItem::BookedController(booking) => booking,
            MapItem::Sector(sector) => sector,
        }
    }
}

impl MapObject for MapItem<'_> {
    fn label(&self) -> &str {
        self.object().label()
    }

    fn position(&self) -> Point {
        self.object().position()
    }

    fn matches(&self, pattern: &Regex) -> bool {
        self.object().matches(pattern)
    }
}
