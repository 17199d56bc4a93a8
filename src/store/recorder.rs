use rusqlite::{params, Connection};
use std::path::Path;

use crate::store::{PassRecord, StoreError};
#[cfg(test)]
use {crate::store::PredictedPass, rusqlite::OptionalExtension};

/// Persists decoded passes and retires the predictions they fulfil.
pub struct PassRecorder {
    conn: Connection,
}

impl PassRecorder {
    /// Open or create the database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let recorder = Self { conn };
        recorder.init_schema()?;
        Ok(recorder)
    }

    fn init_schema(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS decoded_passes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                pass_start INTEGER NOT NULL UNIQUE,
                file_path TEXT NOT NULL,
                daylight_pass INTEGER NOT NULL DEFAULT 0,
                sat_type INTEGER NOT NULL DEFAULT 0,
                has_spectrogram INTEGER NOT NULL DEFAULT 0,
                has_polar_az_el INTEGER NOT NULL DEFAULT 0,
                has_polar_direction INTEGER NOT NULL DEFAULT 0,
                gain TEXT
            );

            CREATE TABLE IF NOT EXISTS predict_passes (
                sat_name TEXT NOT NULL DEFAULT '',
                pass_start INTEGER NOT NULL,
                pass_end INTEGER NOT NULL DEFAULT 0,
                max_elev INTEGER NOT NULL DEFAULT 0,
                is_active INTEGER NOT NULL DEFAULT 1
            );

            CREATE INDEX IF NOT EXISTS idx_predict_passes_start ON predict_passes(pass_start);
            "#,
        )?;
        Ok(())
    }

    /// Upserts the pass, then deactivates the predictions for the same
    /// `pass_start`. Two statements, no transaction: a crash in between leaves
    /// the prediction active. Returns how many predictions were superseded.
    pub fn record(&self, record: &PassRecord) -> Result<usize, StoreError> {
        self.upsert(record)?;
        let superseded = self.supersede_predictions(record.pass_start)?;
        log::info!(
            "Recorded pass {} ({} prediction(s) superseded)",
            record.file_path,
            superseded
        );
        Ok(superseded)
    }

    pub fn upsert(&self, record: &PassRecord) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO decoded_passes (pass_start, file_path, daylight_pass, sat_type,
                    has_spectrogram, has_polar_az_el, has_polar_direction, gain)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(pass_start) DO UPDATE SET
                file_path = excluded.file_path,
                daylight_pass = excluded.daylight_pass,
                sat_type = excluded.sat_type,
                has_spectrogram = excluded.has_spectrogram,
                has_polar_az_el = excluded.has_polar_az_el,
                has_polar_direction = excluded.has_polar_direction,
                gain = excluded.gain",
            params![
                record.pass_start,
                record.file_path,
                record.daylight,
                record.sat_type,
                record.has_spectrogram,
                record.has_polar_az_el,
                record.has_polar_direction,
                record.gain,
            ],
        )?;
        Ok(())
    }

    /// Only predictions joined to a decoded pass at exactly `pass_start` change.
    pub fn supersede_predictions(&self, pass_start: i64) -> Result<usize, StoreError> {
        let updated = self.conn.execute(
            "UPDATE predict_passes SET is_active = 0
             WHERE is_active = 1 AND pass_start IN (
                SELECT predict_passes.pass_start FROM predict_passes
                INNER JOIN decoded_passes
                    ON predict_passes.pass_start = decoded_passes.pass_start
                WHERE decoded_passes.pass_start = ?1
             )",
            params![pass_start],
        )?;
        Ok(updated)
    }
}

/// Read side of the tables, owned by the web panel and the pass scheduler.
#[cfg(test)]
impl PassRecorder {
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let recorder = Self { conn };
        recorder.init_schema()?;
        Ok(recorder)
    }

    pub fn find_pass(&self, pass_start: i64) -> Result<Option<PassRecord>, StoreError> {
        let record = self
            .conn
            .query_row(
                "SELECT pass_start, file_path, daylight_pass, sat_type, has_spectrogram,
                        has_polar_az_el, has_polar_direction, gain
                 FROM decoded_passes WHERE pass_start = ?1",
                params![pass_start],
                |row| {
                    Ok(PassRecord {
                        pass_start: row.get(0)?,
                        file_path: row.get(1)?,
                        daylight: row.get(2)?,
                        sat_type: row.get(3)?,
                        has_spectrogram: row.get(4)?,
                        has_polar_az_el: row.get(5)?,
                        has_polar_direction: row.get(6)?,
                        gain: row.get::<_, Option<String>>(7)?.unwrap_or_default(),
                    })
                },
            )
            .optional()?;
        Ok(record)
    }

    pub fn count_passes(&self, pass_start: i64) -> Result<i64, StoreError> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM decoded_passes WHERE pass_start = ?1",
            params![pass_start],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Adds a prediction, as the pass scheduler does.
    pub fn add_prediction(&self, prediction: &PredictedPass) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO predict_passes (sat_name, pass_start, pass_end, max_elev, is_active)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                prediction.sat_name,
                prediction.pass_start,
                prediction.pass_end,
                prediction.max_elev,
                prediction.is_active,
            ],
        )?;
        Ok(())
    }

    pub fn predictions(&self) -> Result<Vec<PredictedPass>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT sat_name, pass_start, pass_end, max_elev, is_active
             FROM predict_passes ORDER BY pass_start",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(PredictedPass {
                sat_name: row.get(0)?,
                pass_start: row.get(1)?,
                pass_end: row.get(2)?,
                max_elev: row.get(3)?,
                is_active: row.get(4)?,
            })
        })?;

        let mut predictions = Vec::new();
        for row in rows {
            predictions.push(row?);
        }
        Ok(predictions)
    }
}
