use std::collections::HashMap;
use std::io;

use from_pest::FromPest;
use geo::{point, LineString, Point, Polygon};
use multimap::MultiMap;
use pest::iterators::Pair;
use regex::Regex;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, trace, warn};

use crate::read_to_string;
use crate::settings::SectorSettings;

mod grammar {
    use pest_derive::Parser;

    #[derive(Parser)]
    #[grammar = "pest/base.pest"]
    #[grammar = "pest/sectors.pest"]
    pub struct Parser;
}

pub use grammar::Rule;

pub mod ast {
    use pest::Span;
    use pest_ast::FromPest;

    use super::grammar::Rule;

    fn span_into_string(span: Span) -> String {
        span.as_str().trim().to_string()
    }

    #[derive(Debug, FromPest, Default, Clone)]
    #[pest_ast(rule(Rule::sector_list))]
    pub struct SectorList {
        pub records: Vec<Record>,
        _eoi: Eoi,
    }

    #[derive(Debug, FromPest, Default, Clone)]
    #[pest_ast(rule(Rule::EOI))]
    struct Eoi;

    #[derive(Debug, FromPest, Default, Clone, PartialEq)]
    #[pest_ast(rule(Rule::record))]
    pub struct Record {
        pub fields: Vec<Field>,
    }

    #[derive(Debug, FromPest, Default, Clone, PartialEq)]
    #[pest_ast(rule(Rule::field))]
    pub struct Field {
        #[pest_ast(outer(with(span_into_string)))]
        pub value: String,
    }
}

#[derive(Error, Debug)]
pub enum SectorError {
    #[error("failed to parse sector file: {0}")]
    Parse(#[from] pest::error::Error<Rule>),
    #[error("failed to read sector file: {0}")]
    FileRead(#[from] io::Error),
}

pub type SectorResult<T> = Result<T, SectorError>;

#[derive(Clone, Debug, Default, Serialize, PartialEq)]
pub struct Sector {
    pub icao: String,
    pub name: String,
    pub country_code: String,
    pub id: u32,
    pub position: Point,
    pub points: Vec<Point>,
}

impl Sector {
    /// `icao:name:country:id:lat:lon[:...]`; anything shorter or with a
    /// non-numeric id or position yields a null sector.
    pub fn from_record(fields: &[String]) -> Self {
        if fields.len() < 6 {
            return Self::default();
        }
        let (Ok(id), Ok(lat), Ok(lon)) = (
            fields[3].parse::<u32>(),
            fields[4].parse::<f64>(),
            fields[5].parse::<f64>(),
        ) else {
            return Self::default();
        };
        Self {
            icao: fields[0].clone(),
            name: fields[1].clone(),
            country_code: fields[2].clone(),
            id,
            position: point! { x: lon, y: lat },
            points: vec![],
        }
    }

    pub fn is_null(&self) -> bool {
        self.icao.is_empty()
    }

    /// Closed boundary polygon, if at least three points are known.
    pub fn polygon(&self) -> Option<Polygon> {
        (self.points.len() >= 3).then(|| {
            Polygon::new(
                LineString::from(self.points.iter().map(|p| p.0).collect::<Vec<_>>()),
                vec![],
            )
        })
    }

    pub fn matches(&self, pattern: &Regex) -> bool {
        pattern.is_match(&self.icao) || pattern.is_match(&self.name)
    }
}

/// One `DISPLAY_LIST_<id>` block of a display file.
#[derive(Clone, Debug, PartialEq)]
pub struct DisplayBlock {
    pub id: u32,
    pub points: Vec<Point>,
}

pub fn parse_sector_list(content: &[u8]) -> SectorResult<Vec<Sector>> {
    use pest::Parser;

    let unparsed_file = read_to_string(content)?;
    let mut parse_tree = grammar::Parser::parse(Rule::sector_list, &unparsed_file)?;
    let syntax_tree = ast::SectorList::from_pest(&mut parse_tree).expect("infallible");

    Ok(syntax_tree
        .records
        .into_iter()
        .filter_map(|record| {
            let fields = record
                .fields
                .into_iter()
                .map(|field| field.value)
                .collect::<Vec<_>>();
            let sector = Sector::from_record(&fields);
            if sector.is_null() {
                debug!("skipping sector line: {}", fields.join(":"));
                None
            } else {
                Some(sector)
            }
        })
        .collect())
}

fn parse_coordinate(pair: Pair<Rule>) -> Option<Point> {
    let mut numbers = pair.into_inner();
    let lat = numbers.next()?.as_str().parse().ok()?;
    let lon = numbers.next()?.as_str().parse().ok()?;
    Some(point! { x: lon, y: lat })
}

fn close_block(blocks: &mut Vec<DisplayBlock>, current: &mut Option<DisplayBlock>) {
    if let Some(block) = current.take() {
        trace!("display block {} with {} points", block.id, block.points.len());
        blocks.push(block);
    }
}

pub fn parse_display(content: &[u8]) -> SectorResult<Vec<DisplayBlock>> {
    use pest::Parser;

    let unparsed_file = read_to_string(content)?;
    let mut pairs = grammar::Parser::parse(Rule::display, &unparsed_file)?;
    let Some(display) = pairs.next() else {
        return Ok(vec![]);
    };

    let mut blocks = vec![];
    let mut current: Option<DisplayBlock> = None;
    for pair in display.into_inner() {
        match pair.as_rule() {
            Rule::display_marker => {
                close_block(&mut blocks, &mut current);
                let id = pair
                    .into_inner()
                    .next()
                    .and_then(|id| id.as_str().parse().ok());
                match id {
                    Some(id) => {
                        current = Some(DisplayBlock { id, points: vec![] });
                    }
                    None => warn!("display block id out of range"),
                }
            }
            Rule::coordinate => match (current.as_mut(), parse_coordinate(pair)) {
                (Some(block), Some(point)) if point.x() != 0. || point.y() != 0. => {
                    block.points.push(point);
                }
                (Some(_), Some(_)) => trace!("dropping (0,0) display point"),
                _ => {}
            },
            Rule::block_end | Rule::blank_line | Rule::EOI => {
                close_block(&mut blocks, &mut current);
            }
            _ => trace!("skipping display line: {}", pair.as_str()),
        }
    }
    close_block(&mut blocks, &mut current);

    Ok(blocks)
}

/// Sectors by ICAO and the `id -> ICAO` index. The first sector of a
/// duplicated ICAO wins.
pub fn index_sectors(sectors: Vec<Sector>) -> (HashMap<String, Sector>, MultiMap<u32, String>) {
    sectors.into_iter().fold(
        (HashMap::new(), MultiMap::new()),
        |(mut by_icao, mut by_id), sector| {
            if by_icao.contains_key(&sector.icao) {
                debug!("duplicate sector {}", sector.icao);
            } else {
                by_id.insert(sector.id, sector.icao.clone());
                by_icao.insert(sector.icao.clone(), sector);
            }
            (by_icao, by_id)
        },
    )
}

/// Gives every sector mapped from a block's id that block's points. Blocks
/// for ids nobody maps from are skipped. Returns the number of sectors
/// that received a boundary.
pub fn assign_boundaries(
    sectors: &mut HashMap<String, Sector>,
    id_index: &MultiMap<u32, String>,
    blocks: Vec<DisplayBlock>,
) -> usize {
    let mut assigned = 0;
    for block in blocks {
        let Some(icaos) = id_index.get_vec(&block.id) else {
            debug!("no sector for display block {}", block.id);
            continue;
        };
        for icao in icaos {
            match sectors.get_mut(icao) {
                Some(sector) => {
                    sector.points = block.points.clone();
                    assigned += 1;
                }
                None => debug!("display block {} maps to unknown sector {icao}", block.id),
            }
        }
    }
    assigned
}

/// Sector list plus display boundaries, reloaded as a whole.
#[derive(Clone, Debug, Default, Serialize)]
pub struct SectorLoader {
    sectors: HashMap<String, Sector>,
    id_index: MultiMap<u32, String>,
}

impl SectorLoader {
    pub fn load_sectors(&mut self, settings: &SectorSettings) -> SectorResult<()> {
        let list = fs_err::read(&settings.sector_list)?;
        let mut displays = vec![fs_err::read(&settings.display)?];
        if settings.use_supplementary_display {
            match &settings.supplementary_display {
                Some(path) => displays.push(fs_err::read(path)?),
                None => warn!("supplementary display enabled without a file"),
            }
        }
        self.load_from_bytes(&list, displays.iter().map(Vec::as_slice))
    }

    /// Replaces all state from a sector list and display files applied in
    /// order, later files overriding earlier boundaries.
    pub fn load_from_bytes<'a>(
        &mut self,
        sector_list: &[u8],
        displays: impl IntoIterator<Item = &'a [u8]>,
    ) -> SectorResult<()> {
        self.sectors.clear();
        self.id_index = MultiMap::new();

        let (mut sectors, id_index) = index_sectors(parse_sector_list(sector_list)?);
        let mut assigned = 0;
        for display in displays {
            assigned += assign_boundaries(&mut sectors, &id_index, parse_display(display)?);
        }
        info!("loaded {} sectors, {assigned} boundaries assigned", sectors.len());

        self.sectors = sectors;
        self.id_index = id_index;
        Ok(())
    }

    pub fn sector(&self, icao: &str) -> Option<&Sector> {
        self.sectors.get(icao)
    }

    pub fn sectors(&self) -> impl Iterator<Item = &Sector> {
        self.sectors.values()
    }

    pub fn icaos_for_id(&self, id: u32) -> &[String] {
        self.id_index.get_vec(&id).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn insert(&mut self, sector: Sector) {
        self.id_index.insert(sector.id, sector.icao.clone());
        self.sectors.insert(sector.icao.clone(), sector);
    }

    pub fn len(&self) -> usize {
        self.sectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sectors.is_empty()
    }
}
