//! Internal gains and per-zone design loads.
//!
//! Appliance energy follows the Building America / Phius residential
//! conventions. Every value is a daily-average power in W unless noted.

use crate::artifacts::{GainsRow, InternalGainsTable, UnitZone};
use crate::error::{AppError, AppResult};
use rv_project::ConstructionDatabase;

pub const MAX_BEDROOMS: u32 = 8;

const FT2_PER_M2: f64 = 10.76391;

/// Appliance energy table for 0..=8 bedrooms from the selected items.
pub fn internal_gains_table(
    appliances: &[String],
    db: &ConstructionDatabase,
) -> AppResult<InternalGainsTable> {
    let mut table = InternalGainsTable::default();
    let mut selected = Vec::with_capacity(appliances.len());
    for name in appliances {
        let item = db.get(name).ok_or_else(|| AppError::UnknownItem {
            item: name.clone(),
            context: "APPLIANCE_LIST".to_string(),
            database: "construction database",
        })?;
        table.total_appliance_cost += item.mechanical_cost;
        if name.contains("LIGHTS") {
            table.lights_cost += item.mechanical_cost;
        }
        selected.push(item);
    }

    for bedrooms in 0..=MAX_BEDROOMS {
        let n = f64::from(bedrooms);
        let mut row = GainsRow {
            bedrooms,
            ..Default::default()
        };
        for item in &selected {
            let Some(rating) = item.appliance_rating else {
                continue;
            };
            let name = item.name.as_str();
            if name.contains("FRIDGE") {
                row.fridge_w += rating / 8760.0 * 1000.0;
            } else if name.contains("DISHWASHER") {
                row.dishwasher_w += (86.3 + 47.73 / (215.0 / rating)) / 215.0
                    * (88.4 + 34.9 * n)
                    / 365.0
                    * 1000.0;
            } else if name.contains("CLOTHESWASHER") {
                row.clothes_washer_w += rating / 365.0 * 1000.0;
            } else if name.contains("CLOTHESDRYER") {
                row.clothes_dryer_w += 12.4 * (164.0 + 46.5 * n) * 1.18 / 3.01
                    * (2.874 / 0.817 - 704.0 / rating)
                    / (0.2184 * (4.5 * 4.08 + 0.24))
                    / 365.0
                    * 1000.0;
            } else if name.contains("LIGHTS") {
                row.lighting_high_efficacy = rating;
            }
        }
        table.rows.push(row);
    }
    Ok(table)
}

/// Parse a geometry zone name; only `NAME|UNIT|<n>BR` zones are dwelling units.
pub fn parse_unit_zone(raw_name: &str, floor_area_m2: f64) -> Option<UnitZone> {
    let mut parts = raw_name.split('|');
    let name = parts.next()?.trim();
    let kind = parts.next()?;
    if !kind.contains("UNIT") {
        return None;
    }
    let bedrooms = parts
        .next()
        .and_then(|tag| tag.chars().next())
        .and_then(|c| c.to_digit(10))
        .unwrap_or(0);
    Some(UnitZone {
        name: name.to_string(),
        bedrooms,
        occupancy: 1.0 + f64::from(bedrooms),
        floor_area_m2,
    })
}

/// Design loads of one unit zone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoneLoads {
    pub lighting_w: f64,
    pub mels_w: f64,
    pub range_w: f64,
    pub sizing_sensible_w: f64,
    pub sizing_latent_w: f64,
    /// Combined hot water draw, m3/s.
    pub dhw_flow_m3_s: f64,
}

pub fn zone_loads(zone: &UnitZone, gains: &GainsRow) -> ZoneLoads {
    let n = f64::from(zone.bedrooms);
    let area = zone.floor_area_m2;
    let occ = zone.occupancy;
    let f = gains.lighting_high_efficacy;

    let clothes_washer = 2.3 + 0.78 * n;
    let dishwasher = 2.26 + 0.75 * n;
    let shower = 0.83 * (14.0 + 1.17 * n);
    let bath = 0.83 * (3.5 + 1.17 * n);
    let sinks = 0.83 * (12.5 + 4.16 * n);

    ZoneLoads {
        lighting_w: (0.2 + 0.8 * (4.0 - 3.0 * f) / 3.7)
            * (455.0 + 0.8 * area * FT2_PER_M2)
            * 0.8
            * 1000.0
            / 365.0,
        mels_w: (413.0 + 69.0 * n + 0.91 * area * FT2_PER_M2) / 365.0 * 1000.0 * 0.8,
        range_w: (331.0 + 39.0 * n) / 365.0 * 1000.0,
        sizing_sensible_w: 136.0 + 2.2 * area + 22.0 * occ,
        sizing_latent_w: 20.0 + 0.22 * area + 12.0 * occ,
        dhw_flow_m3_s: (clothes_washer + dishwasher + shower + bath + sinks) * 4.381e-8,
    }
}
