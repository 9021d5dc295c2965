use std::{
    cmp::Ordering,
    collections::{HashMap, HashSet},
    fmt::Display,
};

use bevy_derive::{Deref, DerefMut};
use bevy_reflect::Reflect;
use geo::Point;
use itertools::Itertools;
use multimap::MultiMap;
use serde::Serialize;
use tracing::{debug, trace};

use crate::{geodesy::distance_nm, read_to_string, tokenizer::Fields};

use super::{NavDataResult, Waypoint};

#[derive(Copy, Clone, Debug, Reflect, Serialize, PartialEq, Eq, Hash)]
pub enum AirwayLevel {
    Low,
    High,
}

impl AirwayLevel {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "1" => Some(Self::Low),
            "2" => Some(Self::High),
            _ => None,
        }
    }
}

impl Display for AirwayLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            AirwayLevel::Low => "L",
            AirwayLevel::High => "H",
        })
    }
}

/// One connected chain of an airway. Airways with gaps or branches are
/// split into several chains sharing the same name.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct Airway {
    pub name: String,
    pub level: AirwayLevel,
    pub waypoints: Vec<Waypoint>,
}

impl Airway {
    pub fn position_of(&self, label: &str) -> Option<usize> {
        self.waypoints.iter().position(|wpt| wpt.label == label)
    }

    /// Waypoints strictly after `from` up to and including `to`, walking the
    /// chain in whichever direction leads from one to the other. Empty when
    /// either end is not part of this chain.
    pub fn expand(&self, from: &str, to: &str) -> Vec<Waypoint> {
        let (Some(start), Some(end)) = (self.position_of(from), self.position_of(to)) else {
            return vec![];
        };

        trace!("expanding {} from {from}({start}) to {to}({end})", self.name);

        match start.cmp(&end) {
            Ordering::Less => self.waypoints[start + 1..=end].to_vec(),
            Ordering::Greater => self.waypoints[end..start].iter().rev().cloned().collect(),
            Ordering::Equal => vec![],
        }
    }

    pub fn closest_point(&self, near: Point) -> Option<&Waypoint> {
        self.waypoints.iter().min_by(|a, b| {
            distance_nm(a.position, near)
                .partial_cmp(&distance_nm(b.position, near))
                .unwrap_or(Ordering::Equal)
        })
    }

    pub fn distance_to(&self, near: Point) -> f64 {
        self.closest_point(near)
            .map_or(f64::INFINITY, |wpt| distance_nm(wpt.position, near))
    }
}

impl Display for Airway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({}): {}",
            self.name,
            self.level,
            self.waypoints.iter().map(|wpt| &wpt.label).join(" ")
        )
    }
}

/// Airway chains by name.
#[derive(Clone, Debug, Default, Serialize, Deref, DerefMut)]
pub struct AirwayIndex(pub MultiMap<String, Airway>);

impl AirwayIndex {
    /// The chain of `name` passing closest to `near`.
    pub fn nearest(&self, name: &str, near: Point) -> Option<&Airway> {
        self.0.get_vec(name)?.iter().min_by(|a, b| {
            a.distance_to(near)
                .partial_cmp(&b.distance_to(near))
                .unwrap_or(Ordering::Equal)
        })
    }

    pub fn from_segments(segments: MultiMap<(String, AirwayLevel), (Waypoint, Waypoint)>) -> Self {
        let mut index = MultiMap::new();
        for ((name, level), segments) in segments
            .into_iter()
            .sorted_by(|(a, _), (b, _)| a.0.cmp(&b.0).then((a.1 as u8).cmp(&(b.1 as u8))))
        {
            for waypoints in chains(&segments) {
                index.insert(
                    name.clone(),
                    Airway {
                        name: name.clone(),
                        level,
                        waypoints,
                    },
                );
            }
        }
        Self(index)
    }
}

fn compare_waypoints(a: &Waypoint, b: &Waypoint) -> Ordering {
    a.label
        .cmp(&b.label)
        .then(a.position.y().partial_cmp(&b.position.y()).unwrap_or(Ordering::Equal))
        .then(a.position.x().partial_cmp(&b.position.x()).unwrap_or(Ordering::Equal))
}

/// Joins unordered segments into maximal chains. Chains start at dead ends
/// first so a simple airway comes out as exactly one chain.
fn chains(segments: &[(Waypoint, Waypoint)]) -> Vec<Vec<Waypoint>> {
    let mut adjacency: HashMap<&Waypoint, Vec<&Waypoint>> = HashMap::new();
    for (a, b) in segments {
        if a == b {
            continue;
        }
        adjacency.entry(a).or_default().push(b);
        adjacency.entry(b).or_default().push(a);
    }
    for neighbours in adjacency.values_mut() {
        *neighbours = neighbours.iter().copied().unique().collect();
    }

    let (dead_ends, others): (Vec<&Waypoint>, Vec<&Waypoint>) = adjacency
        .iter()
        .map(|(wpt, _)| *wpt)
        .sorted_by(|a, b| compare_waypoints(a, b))
        .partition(|wpt| adjacency[wpt].len() == 1);

    let mut used: HashSet<(&Waypoint, &Waypoint)> = HashSet::new();
    let mut chains = vec![];
    for start in dead_ends.into_iter().chain(others) {
        loop {
            let mut chain = vec![start.clone()];
            let mut current = start;
            while let Some(next) = adjacency[current]
                .iter()
                .copied()
                .find(|next| !used.contains(&(current, *next)))
            {
                used.insert((current, next));
                used.insert((next, current));
                chain.push(next.clone());
                current = next;
            }
            if chain.len() < 2 {
                break;
            }
            chains.push(chain);
        }
    }
    chains
}

/// Parses an X-Plane `earth_awy.dat`:
/// `from lat lon to lat lon level base top name[-name...]`.
pub fn parse_airways(content: &[u8]) -> NavDataResult<AirwayIndex> {
    let content = read_to_string(content)?;
    let mut segments = MultiMap::new();

    for line in crate::tokenizer::lines(&content) {
        let fields = Fields::split_whitespace(line);
        if fields.trimmed(0) == "99" {
            break;
        }
        let (Some(from_lat), Some(from_lon), Some(to_lat), Some(to_lon), Some(level)) = (
            fields.parse::<f64>(1),
            fields.parse::<f64>(2),
            fields.parse::<f64>(4),
            fields.parse::<f64>(5),
            AirwayLevel::parse(fields.trimmed(6)),
        ) else {
            debug!("skipping airway line: {line}");
            continue;
        };
        let from = Waypoint::new(fields.trimmed(0), from_lat, from_lon);
        let to = Waypoint::new(fields.trimmed(3), to_lat, to_lon);

        for name in fields.trimmed(9).split('-').filter(|name| !name.is_empty()) {
            segments.insert((name.to_string(), level), (from.clone(), to.clone()));
        }
    }

    Ok(AirwayIndex::from_segments(segments))
}
