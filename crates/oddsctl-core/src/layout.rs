#![forbid(unsafe_code)]

//! Map rows within the trading sheet.
//!
//! Each of up to five maps has a "Map Winner" row holding the home odds in
//! one column and the away odds in the next. The row numbers come from the
//! workbook template and never change at runtime.

use std::collections::BTreeMap;

/// Highest map index a template can use.
pub const MAX_MAPS: u8 = 5;

/// Cells of one map's winner row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapRow {
    /// 1-based map index.
    pub map: u8,
    /// 1-based sheet row.
    pub row: u32,
    /// Home odds cell, e.g. `M44`.
    pub home_cell: String,
    /// Away odds cell, e.g. `N44`.
    pub away_cell: String,
}

/// Map index → winner row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapLayout {
    rows: BTreeMap<u8, u32>,
    home_column: String,
    away_column: String,
}

impl Default for MapLayout {
    fn default() -> Self {
        Self::new([(1, 44), (2, 190), (3, 336), (4, 482), (5, 628)], "M", "N")
    }
}

impl MapLayout {
    /// Build a layout. Map indices outside `1..=MAX_MAPS` are ignored.
    #[must_use]
    pub fn new(
        rows: impl IntoIterator<Item = (u8, u32)>,
        home_column: impl Into<String>,
        away_column: impl Into<String>,
    ) -> Self {
        Self {
            rows: rows
                .into_iter()
                .filter(|(map, _)| (1..=MAX_MAPS).contains(map))
                .collect(),
            home_column: home_column.into(),
            away_column: away_column.into(),
        }
    }

    /// Row for `map`, if the layout has one.
    #[must_use]
    pub fn row(&self, map: u8) -> Option<MapRow> {
        let row = *self.rows.get(&map)?;
        Some(MapRow {
            map,
            row,
            home_cell: format!("{}{row}", self.home_column),
            away_cell: format!("{}{row}", self.away_column),
        })
    }

    /// Row for `map`, falling back to the first configured map.
    ///
    /// Returns `None` only for an empty layout.
    #[must_use]
    pub fn row_or_first(&self, map: u8) -> Option<MapRow> {
        self.row(map)
            .or_else(|| self.rows.keys().next().and_then(|&first| self.row(first)))
    }

    /// All rows in map order.
    pub fn rows(&self) -> impl Iterator<Item = MapRow> + '_ {
        self.rows.keys().filter_map(|&map| self.row(map))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Number of maps a match template plays.
///
/// `bo1`/`bo3`/`bo5` anywhere in the (case-insensitive) template name pick
/// 1/3/5; anything else, including a blank name, means [`MAX_MAPS`].
#[must_use]
pub fn max_maps_for_template(template: &str) -> u8 {
    let lower = template.to_lowercase();
    if lower.contains("bo1") {
        1
    } else if lower.contains("bo3") {
        3
    } else if lower.contains("bo5") {
        5
    } else {
        MAX_MAPS
    }
}
