use chrono::{DateTime, Utc};
use geo::Point;
use regex::Regex;
use serde::Serialize;

use crate::client::{Client, ClientContext, Network};
use crate::controller::{split_atis, Controller, Facility};
use crate::tokenizer::Fields;

mod field {
    pub const CALLSIGN: usize = 0;
    pub const CID: usize = 1;
    pub const REAL_NAME: usize = 2;
    pub const BOOKING_TYPE: usize = 4;
    pub const END_TIME: usize = 14;
    pub const INFO: usize = 15;
    pub const START_TIME: usize = 16;
}

/// A scheduled ATC session from the bookings feed.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct BookedController {
    pub callsign: String,
    pub user_id: String,
    pub real_name: String,
    pub home_base: Option<String>,
    pub facility: Facility,
    pub booking_type: i32,
    pub starts: Option<DateTime<Utc>>,
    pub ends: Option<DateTime<Utc>>,
    pub info: String,
    pub network: Network,
}

impl BookedController {
    pub fn parse(fields: &Fields, ctx: &ClientContext) -> Self {
        let callsign = fields.string(field::CALLSIGN);
        let (real_name, home_base) = ctx.sanitize_name(fields.trimmed(field::REAL_NAME));
        Self {
            facility: Facility::from_callsign(&callsign).unwrap_or_default(),
            callsign,
            user_id: fields.string(field::CID),
            real_name,
            home_base,
            booking_type: fields.i32_or_zero(field::BOOKING_TYPE),
            starts: fields.timestamp(field::START_TIME),
            ends: fields.timestamp(field::END_TIME),
            info: fields.string(field::INFO),
            network: ctx.network,
        }
    }

    pub fn is_null(&self) -> bool {
        self.callsign.is_empty()
    }

    /// Booked for `at`, start inclusive and end exclusive.
    pub fn is_active_at(&self, at: DateTime<Utc>) -> bool {
        match (self.starts, self.ends) {
            (Some(starts), Some(ends)) => starts <= at && at < ends,
            _ => false,
        }
    }

    /// The controller this booking would put online. Booked positions carry
    /// no frequency or position of their own.
    pub fn to_controller(&self) -> Controller {
        Controller {
            client: Client {
                callsign: self.callsign.clone(),
                user_id: self.user_id.clone(),
                real_name: self.real_name.clone(),
                home_base: self.home_base.clone(),
                server: String::new(),
                protocol_revision: 0,
                rating: 0,
                admin_rating: None,
                client_software: None,
                logon_time: self.starts,
                network: self.network,
                position: Point::default(),
            },
            frequency: String::new(),
            facility: self.facility,
            visual_range: 0,
            atis: split_atis(&self.info),
            atis_received: None,
            sector: None,
        }
    }

    pub fn matches(&self, pattern: &Regex) -> bool {
        pattern.is_match(&self.callsign)
            || pattern.is_match(&self.real_name)
            || pattern.is_match(&self.user_id)
            || pattern.is_match(&self.info)
    }
}
