use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};

use chroma_core::{
    Centroid, ClusterSolution, ColorKey, ColorPopulation, EngineConfig, EpochRecord, Rgb, Timeline,
    TimelineState, WarmStart,
};

use crate::error::{Result, StoreError};
use crate::schema;

/// Summary of a stored timeline.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoreStats {
    pub epochs: usize,
    pub unique_colors: usize,
    pub population_distinct: usize,
    pub population_total: u64,
    pub cap_reached: bool,
    pub last_epoch: Option<i64>,
    pub quantizer_version: Option<u32>,
    pub color_depth: Option<f64>,
}

pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        schema::initialize(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::initialize(&conn)?;
        Ok(Self { conn })
    }

    // --- Metadata ---

    pub fn get_metadata(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row("SELECT value FROM metadata WHERE key = ?1", [key], |row| row.get(0))
            .optional()?;
        Ok(value)
    }

    pub fn set_metadata(&self, key: &str, value: &str) -> Result<()> {
        set_metadata_on(&self.conn, key, value)
    }

    /// True once a timeline has been saved.
    pub fn has_timeline(&self) -> Result<bool> {
        Ok(self.get_metadata("quantizer_version")?.is_some())
    }

    // --- Save ---

    /// Replace the stored timeline with `timeline`'s full state.
    pub fn save_timeline(&self, timeline: &Timeline) -> Result<()> {
        let state = timeline.state();
        let tx = self.conn.unchecked_transaction()?;

        tx.execute_batch(
            "DELETE FROM novel_colors; DELETE FROM solutions; DELETE FROM epochs;
             DELETE FROM population; DELETE FROM warm_start;",
        )?;

        set_metadata_on(&tx, "quantizer_version", &state.quantizer_version.to_string())?;
        set_metadata_on(&tx, "color_depth", &state.color_depth.to_string())?;
        set_metadata_on(&tx, "cap_reached", if timeline.cap_reached() { "1" } else { "0" })?;

        for record in &state.records {
            save_record_on(&tx, record)?;
        }

        {
            let mut stmt = tx.prepare("INSERT INTO population (color, weight) VALUES (?1, ?2)")?;
            for (key, weight) in state.population.iter() {
                stmt.execute(params![key.value(), to_i64(weight)?])?;
            }
        }

        {
            // Stored as REAL columns so centroids round-trip bit-exactly.
            let mut stmt = tx.prepare(
                "INSERT INTO warm_start (k, idx, c0, c1, c2) VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for (k, centroids) in &state.warm_start {
                for (idx, [c0, c1, c2]) in centroids.iter().enumerate() {
                    stmt.execute(params![to_i64(*k as u64)?, to_i64(idx as u64)?, c0, c1, c2])?;
                }
            }
        }

        tx.commit()?;
        tracing::info!(
            epochs = state.records.len(),
            unique_colors = state.seen.len(),
            "timeline saved"
        );
        Ok(())
    }

    // --- Load ---

    /// Rebuild the stored timeline under `config`. An empty store yields a
    /// fresh timeline. Fails with [`StoreError::Config`] when the stored
    /// quantizer differs from the configured one.
    pub fn load_timeline(&self, config: EngineConfig) -> Result<Timeline> {
        let Some(state) = self.load_state()? else {
            tracing::debug!("no stored timeline, starting fresh");
            return Ok(Timeline::new(config)?);
        };
        tracing::debug!(
            epochs = state.records.len(),
            last_epoch = ?state.last_epoch,
            "loaded stored timeline"
        );
        Ok(Timeline::restore(config, state)?)
    }

    /// Raw persisted state, or `None` if nothing has been saved.
    pub fn load_state(&self) -> Result<Option<TimelineState>> {
        let Some(version) = self.get_metadata("quantizer_version")? else {
            return Ok(None);
        };
        let quantizer_version: u32 = version
            .parse()
            .map_err(|e| StoreError::InvalidData(format!("quantizer_version {version:?}: {e}")))?;
        let color_depth = self.stored_depth()?.ok_or_else(|| {
            StoreError::InvalidData("color_depth missing from metadata".to_string())
        })?;

        let records = self.load_records()?;
        let seen: BTreeSet<ColorKey> =
            records.iter().flat_map(|r| r.novel.iter().copied()).collect();

        Ok(Some(TimelineState {
            quantizer_version,
            color_depth,
            seen: seen.into_iter().collect(),
            population: self.load_population()?,
            warm_start: self.load_warm_start()?,
            last_epoch: records.last().map(|r| r.epoch),
            records,
        }))
    }

    fn stored_depth(&self) -> Result<Option<f64>> {
        self.get_metadata("color_depth")?
            .map(|d| {
                d.parse()
                    .map_err(|e| StoreError::InvalidData(format!("color_depth {d:?}: {e}")))
            })
            .transpose()
    }

    fn load_records(&self) -> Result<Vec<EpochRecord>> {
        let mut stmt = self.conn.prepare("SELECT id, dropped FROM epochs ORDER BY id")?;
        let epochs: Vec<(i64, i64)> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<std::result::Result<_, _>>()?;

        let mut novel_stmt = self
            .conn
            .prepare("SELECT color FROM novel_colors WHERE epoch_id = ?1 ORDER BY color")?;
        let mut solution_stmt = self.conn.prepare(
            "SELECT k, centroids, counts, total_colors FROM solutions \
             WHERE epoch_id = ?1 ORDER BY k",
        )?;

        let mut records = Vec::with_capacity(epochs.len());
        for (epoch, dropped) in epochs {
            let novel = novel_stmt
                .query_map([epoch], |row| row.get::<_, i64>(0))?
                .map(|raw| -> Result<ColorKey> {
                    let raw = raw?;
                    ColorKey::from_raw(raw).map_err(|e| StoreError::InvalidData(e.to_string()))
                })
                .collect::<Result<Vec<_>>>()?;

            let rows: Vec<(i64, String, String, i64)> = solution_stmt
                .query_map([epoch], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)))?
                .collect::<std::result::Result<_, _>>()?;
            let mut solutions = BTreeMap::new();
            for (k, centroids, counts, total) in rows {
                let centroids: Vec<Rgb> = parse_json(&centroids, "solution centroids")?;
                let counts: Vec<u64> = parse_json(&counts, "solution counts")?;
                solutions.insert(
                    to_usize(k)?,
                    ClusterSolution {
                        centroids,
                        counts,
                        total_colors: to_u64(total)?,
                    },
                );
            }

            records.push(EpochRecord {
                epoch,
                novel,
                dropped: to_usize(dropped)?,
                solutions,
            });
        }
        Ok(records)
    }

    fn load_population(&self) -> Result<ColorPopulation> {
        let mut stmt = self.conn.prepare("SELECT color, weight FROM population ORDER BY color")?;
        let rows: Vec<(i64, i64)> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<std::result::Result<_, _>>()?;
        rows.into_iter()
            .map(|(color, weight)| -> Result<(ColorKey, u64)> {
                let key = ColorKey::from_raw(color)
                    .map_err(|e| StoreError::InvalidData(e.to_string()))?;
                Ok((key, to_u64(weight)?))
            })
            .collect()
    }

    fn load_warm_start(&self) -> Result<WarmStart> {
        let mut stmt = self
            .conn
            .prepare("SELECT k, c0, c1, c2 FROM warm_start ORDER BY k, idx")?;
        let rows: Vec<(i64, Centroid)> = stmt
            .query_map([], |row| Ok((row.get(0)?, [row.get(1)?, row.get(2)?, row.get(3)?])))?
            .collect::<std::result::Result<_, _>>()?;

        let mut warm_start = WarmStart::new();
        for (k, centroid) in rows {
            warm_start.entry(to_usize(k)?).or_default().push(centroid);
        }
        Ok(warm_start)
    }

    // --- Stats ---

    pub fn stats(&self) -> Result<StoreStats> {
        let count =
            |sql: &str| -> Result<i64> { Ok(self.conn.query_row(sql, [], |row| row.get(0))?) };

        let last_epoch: Option<i64> =
            self.conn.query_row("SELECT MAX(id) FROM epochs", [], |row| row.get(0))?;
        let population_total: i64 = self.conn.query_row(
            "SELECT COALESCE(SUM(weight), 0) FROM population",
            [],
            |row| row.get(0),
        )?;
        let quantizer_version = self
            .get_metadata("quantizer_version")?
            .and_then(|v| v.parse().ok());

        Ok(StoreStats {
            epochs: to_usize(count("SELECT COUNT(*) FROM epochs")?)?,
            unique_colors: to_usize(count("SELECT COUNT(*) FROM novel_colors")?)?,
            population_distinct: to_usize(count("SELECT COUNT(*) FROM population")?)?,
            population_total: to_u64(population_total)?,
            cap_reached: self.get_metadata("cap_reached")?.as_deref() == Some("1"),
            last_epoch,
            quantizer_version,
            color_depth: self.stored_depth()?,
        })
    }
}

fn set_metadata_on(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)",
        params![key, value],
    )?;
    Ok(())
}

fn save_record_on(conn: &Connection, record: &EpochRecord) -> Result<()> {
    conn.execute(
        "INSERT INTO epochs (id, dropped) VALUES (?1, ?2)",
        params![record.epoch, to_i64(record.dropped as u64)?],
    )?;

    let mut novel = conn.prepare("INSERT INTO novel_colors (epoch_id, color) VALUES (?1, ?2)")?;
    for key in &record.novel {
        novel.execute(params![record.epoch, key.value()])?;
    }

    for (k, solution) in &record.solutions {
        let centroids = serde_json::to_string(&solution.centroids)
            .map_err(|e| StoreError::InvalidData(format!("centroids for k={k}: {e}")))?;
        let counts = serde_json::to_string(&solution.counts)
            .map_err(|e| StoreError::InvalidData(format!("counts for k={k}: {e}")))?;
        conn.execute(
            "INSERT INTO solutions (epoch_id, k, centroids, counts, total_colors)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                record.epoch,
                to_i64(*k as u64)?,
                centroids,
                counts,
                to_i64(solution.total_colors)?,
            ],
        )?;
    }
    Ok(())
}

fn parse_json<T: for<'de> Deserialize<'de>>(json: &str, what: &str) -> Result<T> {
    serde_json::from_str(json).map_err(|e| StoreError::InvalidData(format!("{what}: {e}")))
}

fn to_i64(v: u64) -> Result<i64> {
    i64::try_from(v)
        .map_err(|_| StoreError::InvalidData(format!("{v} exceeds SQLite integer range")))
}

fn to_u64(v: i64) -> Result<u64> {
    u64::try_from(v).map_err(|_| StoreError::InvalidData(format!("negative count {v}")))
}

fn to_usize(v: i64) -> Result<usize> {
    usize::try_from(v).map_err(|_| StoreError::InvalidData(format!("invalid size {v}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chroma_core::{ClusterConfig, ColorSample, ConfigError, EpochInput, QuantizeConfig};

    fn rgb(r: i64, g: i64, b: i64) -> ColorSample {
        ColorSample::Rgb([r, g, b])
    }

    fn config() -> EngineConfig {
        EngineConfig {
            cluster: ClusterConfig {
                resolutions: [2, 3].into_iter().collect(),
                ..ClusterConfig::default()
            },
            ..EngineConfig::default()
        }
    }

    fn epochs() -> Vec<EpochInput> {
        vec![
            EpochInput::from_colors(1950, vec![rgb(0, 0, 0), rgb(250, 10, 10), rgb(10, 250, 10)]),
            EpochInput::from_colors(1960, vec![rgb(10, 10, 250), rgb(0, 0, 0), rgb(128, 128, 0)]),
            EpochInput::from_colors(1970, vec![rgb(0, 128, 128), rgb(255, 255, 255)]),
        ]
    }

    #[test]
    fn test_empty_store_loads_fresh_timeline() {
        let store = Store::open_in_memory().unwrap();
        assert!(!store.has_timeline().unwrap());
        let tl = store.load_timeline(config()).unwrap();
        assert!(tl.records().is_empty());
        assert!(store.load_state().unwrap().is_none());
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let store = Store::open_in_memory().unwrap();
        let mut tl = Timeline::new(config()).unwrap();
        tl.advance_all(&epochs()).unwrap();
        store.save_timeline(&tl).unwrap();

        let loaded = store.load_timeline(config()).unwrap();
        assert_eq!(loaded.state(), tl.state());
    }

    #[test]
    fn test_resume_matches_uninterrupted_run() {
        let all = epochs();
        let mut straight = Timeline::new(config()).unwrap();
        straight.advance_all(&all).unwrap();

        let store = Store::open_in_memory().unwrap();
        let mut first = Timeline::new(config()).unwrap();
        first.advance_all(&all[..2]).unwrap();
        store.save_timeline(&first).unwrap();

        let mut resumed = store.load_timeline(config()).unwrap();
        resumed.advance(&all[2]).unwrap();
        store.save_timeline(&resumed).unwrap();

        assert_eq!(resumed.state(), straight.state());
        assert_eq!(store.load_state().unwrap(), Some(straight.state()));
    }

    #[test]
    fn test_depth_mismatch_is_config_error() {
        let store = Store::open_in_memory().unwrap();
        let mut tl = Timeline::new(config()).unwrap();
        tl.advance_all(&epochs()).unwrap();
        store.save_timeline(&tl).unwrap();

        let other = EngineConfig {
            quantize: QuantizeConfig { depth: 6.0 },
            ..config()
        };
        let err = store.load_timeline(other).err().unwrap();
        assert!(matches!(
            err,
            StoreError::Config(ConfigError::QuantizerMismatch { .. })
        ));
    }

    #[test]
    fn test_resave_replaces_previous_state() {
        let store = Store::open_in_memory().unwrap();
        let mut tl = Timeline::new(config()).unwrap();
        tl.advance_all(&epochs()).unwrap();
        store.save_timeline(&tl).unwrap();
        store.save_timeline(&tl).unwrap();
        assert_eq!(store.stats().unwrap().epochs, 3);
    }

    #[test]
    fn test_stats() {
        let store = Store::open_in_memory().unwrap();
        let empty = store.stats().unwrap();
        assert_eq!(empty.epochs, 0);
        assert_eq!(empty.last_epoch, None);
        assert_eq!(empty.color_depth, None);

        let mut tl = Timeline::new(config()).unwrap();
        tl.advance_all(&epochs()).unwrap();
        store.save_timeline(&tl).unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats.epochs, 3);
        assert_eq!(stats.unique_colors, tl.unique_colors());
        assert_eq!(stats.population_total, tl.population().total());
        assert_eq!(stats.population_distinct, tl.population().distinct());
        assert_eq!(stats.last_epoch, Some(1970));
        assert_eq!(stats.color_depth, Some(4.0));
        assert_eq!(stats.quantizer_version, Some(chroma_core::QUANTIZER_VERSION));
        assert!(!stats.cap_reached);
    }

    #[test]
    fn test_cap_flag_persists() {
        let store = Store::open_in_memory().unwrap();
        let cfg = EngineConfig {
            max_colors: Some(2),
            ..config()
        };
        let mut tl = Timeline::new(cfg.clone()).unwrap();
        tl.advance_all(&epochs()).unwrap();
        store.save_timeline(&tl).unwrap();

        assert!(store.stats().unwrap().cap_reached);
        let loaded = store.load_timeline(cfg).unwrap();
        assert!(loaded.cap_reached());
        assert_eq!(loaded.unique_colors(), 2);
    }

    #[test]
    fn test_file_store_persists_across_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("timeline.db");
        {
            let store = Store::open(&path).unwrap();
            let mut tl = Timeline::new(config()).unwrap();
            tl.advance_all(&epochs()[..1]).unwrap();
            store.save_timeline(&tl).unwrap();
        }
        let store = Store::open(&path).unwrap();
        let tl = store.load_timeline(config()).unwrap();
        assert_eq!(tl.last_epoch(), Some(1950));
        assert_eq!(tl.records().len(), 1);
    }
}
