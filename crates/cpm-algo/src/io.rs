//! CSV loading for bid tables.
//!
//! **Generators:** `name,capacity,bid_price`
//!
//! **Demands:** `name,load,offer_price[,period]`
//!
//! Headers from spreadsheet exports (`Name`, `Capacity`, `Bid price`,
//! `Load`, `Offer price`) are accepted as aliases. Demand rows carrying a
//! `period` column split the file into one market period per distinct value;
//! every period shares the same generator table. Rows without a period go to
//! period 0.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use cpm_core::{
    ClearingError, CpmError, CpmResult, DemandBid, DemandTable, GeneratorBid, GeneratorTable,
    MarketPeriod,
};
use csv::{ReaderBuilder, Trim};
use serde::Deserialize;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct GeneratorRecord {
    #[serde(alias = "Name")]
    name: String,
    #[serde(alias = "Capacity")]
    capacity: f64,
    #[serde(alias = "Bid price", alias = "bid price")]
    bid_price: f64,
}

#[derive(Debug, Deserialize)]
struct DemandRecord {
    #[serde(alias = "Name")]
    name: String,
    #[serde(alias = "Load")]
    load: f64,
    #[serde(alias = "Offer price", alias = "offer price")]
    offer_price: f64,
    #[serde(default, alias = "Period")]
    period: Option<u32>,
}

fn records<T, R>(reader: R, source: &str) -> CpmResult<Vec<T>>
where
    T: for<'de> Deserialize<'de>,
    R: Read,
{
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .from_reader(reader);
    let mut rows = Vec::new();
    for result in rdr.deserialize() {
        let record: T = result.map_err(|e| {
            if matches!(e.kind(), csv::ErrorKind::Io(_)) {
                CpmError::Io(e.into())
            } else {
                ClearingError::InvalidInput(format!("{source}: {e}")).into()
            }
        })?;
        rows.push(record);
    }
    Ok(rows)
}

/// Read a generator table from CSV.
pub fn read_generators<R: Read>(reader: R, source: &str) -> CpmResult<GeneratorTable> {
    let rows: Vec<GeneratorRecord> = records(reader, source)?;
    let bids = rows
        .into_iter()
        .map(|r| GeneratorBid::new(r.name, r.capacity, r.bid_price))
        .collect();
    Ok(GeneratorTable::new(bids)?)
}

/// Read demand rows from CSV, grouped by period.
pub fn read_demands<R: Read>(reader: R, source: &str) -> CpmResult<BTreeMap<u32, DemandTable>> {
    let rows: Vec<DemandRecord> = records(reader, source)?;
    let mut grouped: BTreeMap<u32, Vec<DemandBid>> = BTreeMap::new();
    for r in rows {
        grouped
            .entry(r.period.unwrap_or(0))
            .or_default()
            .push(DemandBid::new(r.name, r.load, r.offer_price));
    }
    if grouped.is_empty() {
        return Err(ClearingError::InvalidInput(format!("{source}: no demand rows")).into());
    }

    let mut tables = BTreeMap::new();
    for (period, bids) in grouped {
        tables.insert(period, DemandTable::new(bids)?);
    }
    Ok(tables)
}

pub fn load_generators(path: &Path) -> CpmResult<GeneratorTable> {
    let file = File::open(path)?;
    read_generators(file, &path.display().to_string())
}

pub fn load_demands(path: &Path) -> CpmResult<BTreeMap<u32, DemandTable>> {
    let file = File::open(path)?;
    read_demands(file, &path.display().to_string())
}

/// Load a generator file and a demand file into market periods.
pub fn load_market(generators_path: &Path, demands_path: &Path) -> CpmResult<Vec<MarketPeriod>> {
    let generators = load_generators(generators_path)?;
    let demands = load_demands(demands_path)?;
    debug!(
        generators = generators.len(),
        periods = demands.len(),
        "loaded market tables"
    );
    Ok(demands
        .into_iter()
        .map(|(period, table)| MarketPeriod::new(period, generators.clone(), table))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_read_generators_sorts_rows() {
        let csv = "name,capacity,bid_price\nGas 1,40,80\nNuclear,80,20\n";
        let table = read_generators(csv.as_bytes(), "inline").unwrap();
        assert_eq!(table.bids()[0].name, "Nuclear");
        assert_eq!(table.total_capacity().value(), 120.0);
    }

    #[test]
    fn test_spreadsheet_headers_accepted() {
        let csv = "Name,Load,Offer price\nHouses,120,120\nIndustry 1,50,100\n";
        let tables = read_demands(csv.as_bytes(), "inline").unwrap();
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[&0].total_load().value(), 170.0);
    }

    #[test]
    fn test_non_numeric_field_is_invalid_input() {
        let csv = "name,capacity,bid_price\nGas 1,forty,80\n";
        let err = read_generators(csv.as_bytes(), "gens.csv").unwrap_err();
        assert!(matches!(
            err,
            CpmError::Clearing(ClearingError::InvalidInput(_))
        ));
        assert!(err.to_string().contains("gens.csv"));
    }

    #[test]
    fn test_demands_split_by_period() {
        let csv = "name,load,offer_price,period\nA,10,50,1\nB,5,40,0\nC,7,60,1\n";
        let tables = read_demands(csv.as_bytes(), "inline").unwrap();
        assert_eq!(tables.keys().copied().collect::<Vec<_>>(), vec![0, 1]);
        assert_eq!(tables[&1].bids()[0].name, "C");
    }

    #[test]
    fn test_load_market_from_files() {
        let dir = tempfile::tempdir().unwrap();
        let gen_path = dir.path().join("generators.csv");
        let dem_path = dir.path().join("demands.csv");
        let mut f = File::create(&gen_path).unwrap();
        writeln!(f, "name,capacity,bid_price\nWind,20,0\nCoal,30,65").unwrap();
        let mut f = File::create(&dem_path).unwrap();
        writeln!(f, "name,load,offer_price,period\nHouses,25,120,3\nHouses,40,120,4").unwrap();

        let periods = load_market(&gen_path, &dem_path).unwrap();
        assert_eq!(periods.len(), 2);
        assert_eq!(periods[0].period, 3);
        assert_eq!(periods[1].generators.len(), 2);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = load_generators(Path::new("/nonexistent/generators.csv")).unwrap_err();
        assert!(matches!(err, CpmError::Io(_)));
    }
}
