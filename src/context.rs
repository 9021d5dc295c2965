use chrono::{DateTime, Utc};
use itertools::Itertools;
use regex::Regex;
use thiserror::Error;
use tracing::info;

use crate::map_object::{MapItem, MapObject};
use crate::navdata::{NavData, NavDataError, Waypoint};
use crate::route::{parse_routes, Route, RouteError, RouteResolver};
use crate::sectors::{SectorError, SectorLoader};
use crate::settings::Settings;
use crate::whazzup::{WhazzupData, WhazzupError};

#[derive(Error, Debug)]
pub enum ContextError {
    #[error(transparent)]
    NavData(#[from] NavDataError),
    #[error(transparent)]
    Sector(#[from] SectorError),
    #[error(transparent)]
    Whazzup(#[from] WhazzupError),
    #[error(transparent)]
    Route(#[from] RouteError),
}

pub type ContextResult<T> = Result<T, ContextError>;

/// Everything the map needs, owned in one place and handed out by
/// reference. Feed downloads end in `apply_*`.
#[derive(Debug, Default)]
pub struct AppContext {
    pub settings: Settings,
    pub nav_data: NavData,
    pub sectors: SectorLoader,
    pub whazzup: WhazzupData,
    pub routes: Vec<Route>,
}

impl AppContext {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            ..Default::default()
        }
    }

    /// Loads nav data and sectors from the configured files.
    pub fn load(settings: Settings) -> ContextResult<Self> {
        let nav_data = NavData::load(&settings.nav_data)?;
        let mut sectors = SectorLoader::default();
        sectors.load_sectors(&settings.sectors)?;
        Ok(Self {
            settings,
            nav_data,
            sectors,
            ..Default::default()
        })
    }

    pub fn resolver(&self) -> RouteResolver {
        RouteResolver::new(&self.nav_data, &self.settings.resolver)
    }

    pub fn apply_whazzup(&mut self, content: &[u8]) -> ContextResult<()> {
        let mut data = WhazzupData::parse(content, &self.settings.parser)?;
        data.assign_sectors(&self.sectors);
        self.whazzup.update_from(data);
        Ok(())
    }

    pub fn apply_bookings(&mut self, content: &[u8]) -> ContextResult<()> {
        let data = WhazzupData::parse_bookings(content, &self.settings.parser)?;
        self.whazzup.update_from(data);
        Ok(())
    }

    /// Replaces the routes of `provider` with freshly resolved ones.
    pub fn apply_routes(&mut self, content: &[u8], provider: &str) -> ContextResult<()> {
        let mut routes = parse_routes(content, provider)?;
        let resolver = RouteResolver::new(&self.nav_data, &self.settings.resolver);
        for route in &mut routes {
            route.resolve(&resolver);
        }
        info!("resolved {} routes from {provider}", routes.len());
        self.routes.retain(|route| route.provider != provider);
        self.routes.extend(routes);
        Ok(())
    }

    pub fn routes_between<'a>(
        &'a self,
        departure: &'a str,
        destination: &'a str,
    ) -> impl Iterator<Item = &'a Route> {
        self.routes
            .iter()
            .filter(move |route| route.departure == departure && route.destination == destination)
    }

    /// Resolved flight path of a live or prefiled pilot.
    pub fn pilot_route(&mut self, callsign: &str) -> Option<Vec<Waypoint>> {
        let resolver = RouteResolver::new(&self.nav_data, &self.settings.resolver);
        let pilot = match self.whazzup.pilots.get_mut(callsign) {
            Some(pilot) => pilot,
            None => self.whazzup.prefiled.get_mut(callsign)?,
        };
        Some(pilot.route_waypoints(&resolver).to_vec())
    }

    pub fn predict(&self, at: DateTime<Utc>) -> WhazzupData {
        self.whazzup.predict(at, &self.resolver())
    }

    /// Clients, airports and sectors matching `pattern`, ordered by label.
    pub fn search(&self, pattern: &Regex) -> Vec<MapItem> {
        self.whazzup
            .search(pattern)
            .into_iter()
            .chain(
                self.nav_data
                    .airports
                    .values()
                    .filter(|airport| airport.matches(pattern))
                    .map(MapItem::Airport),
            )
            .chain(
                self.sectors
                    .sectors()
                    .filter(|sector| sector.matches(pattern))
                    .map(MapItem::Sector),
            )
            .sorted_by(|a, b| a.label().cmp(b.label()))
            .collect()
    }
}
