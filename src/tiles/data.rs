//! Tile map data.
//!
//! A dense grid of tile ids, rows of columns, deserialized from the same
//! JSON shape the map editor exports (a bare 2D array). Id 0 and negative
//! ids are empty by convention; the collision predicate on the consuming
//! layer decides what counts as solid.

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TileData {
    tiles: Vec<Vec<i32>>,
}

impl TileData {
    /// Wrap a rows-of-columns grid. Errors on empty or ragged data.
    pub fn new(tiles: Vec<Vec<i32>>) -> Result<Self, EngineError> {
        if tiles.is_empty() || tiles[0].is_empty() {
            return Err(EngineError::BadTileData("empty tile grid".into()));
        }
        let cols = tiles[0].len();
        if let Some(row) = tiles.iter().position(|r| r.len() != cols) {
            return Err(EngineError::BadTileData(format!(
                "ragged tile grid: row {} has {} columns, expected {}",
                row,
                tiles[row].len(),
                cols
            )));
        }
        Ok(Self { tiles })
    }

    /// Parse the editor's JSON export (a bare 2D array of ids).
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        let tiles: Vec<Vec<i32>> = serde_json::from_str(json)?;
        Self::new(tiles)
    }

    pub fn rows(&self) -> usize {
        self.tiles.len()
    }

    pub fn cols(&self) -> usize {
        self.tiles[0].len()
    }

    /// Tile id at (x, y); `None` outside the grid.
    pub fn get(&self, x: i32, y: i32) -> Option<i32> {
        if x < 0 || y < 0 {
            return None;
        }
        self.tiles
            .get(y as usize)
            .and_then(|row| row.get(x as usize))
            .copied()
    }

    /// Overwrite a tile. Returns false outside the grid.
    pub fn set(&mut self, x: i32, y: i32, tile: i32) -> bool {
        if x < 0 || y < 0 {
            return false;
        }
        match self
            .tiles
            .get_mut(y as usize)
            .and_then(|row| row.get_mut(x as usize))
        {
            Some(slot) => {
                *slot = tile;
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_array_json() {
        let data = TileData::from_json("[[0,1,0],[1,0,1]]").unwrap();
        assert_eq!(data.rows(), 2);
        assert_eq!(data.cols(), 3);
        assert_eq!(data.get(1, 0), Some(1));
        assert_eq!(data.get(2, 1), Some(1));
        assert_eq!(data.get(3, 0), None);
        assert_eq!(data.get(-1, 0), None);
    }

    #[test]
    fn ragged_rows_are_rejected() {
        assert!(TileData::from_json("[[0,1],[1]]").is_err());
        assert!(TileData::from_json("[]").is_err());
    }

    #[test]
    fn set_respects_bounds() {
        let mut data = TileData::from_json("[[0,0],[0,0]]").unwrap();
        assert!(data.set(1, 1, 7));
        assert_eq!(data.get(1, 1), Some(7));
        assert!(!data.set(2, 0, 7));
        assert!(!data.set(0, -1, 7));
    }
}
