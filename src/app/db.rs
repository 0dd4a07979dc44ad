use anyhow::Result;
use rusqlite::{params, Connection};
use std::path::Path;

use super::file::AnalysisRecord;

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        Ok(Self { conn })
    }

    pub fn init(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS analyses (
                id INTEGER PRIMARY KEY,
                filename TEXT NOT NULL,
                size INTEGER NOT NULL,
                hash TEXT NOT NULL,
                confidence REAL,
                is_edible INTEGER,
                edibility_confidence REAL,
                species TEXT,
                species_confidence REAL,
                lifespan TEXT,
                preservation TEXT,
                error TEXT,
                created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            )",
            [],
        )?;
        Ok(())
    }

    pub fn save_analyses_batch(&mut self, records: &[AnalysisRecord]) -> Result<()> {
        let tx = self.conn.transaction()?;
        for record in records {
            tx.execute(
                "INSERT INTO analyses (filename, size, hash, confidence, is_edible, edibility_confidence, species, species_confidence, lifespan, preservation, error)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    record.filename,
                    record.size as i64,
                    record.hash,
                    record.confidence,
                    record.is_edible,
                    record.edibility_confidence,
                    record.species,
                    record.species_confidence,
                    record.lifespan,
                    record.preservation,
                    record.error
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_save_analyses_batch() -> Result<()> {
        let dir = tempdir()?;
        let mut db = Database::new(dir.path().join("analyses.db"))?;
        db.init()?;
        // A second init must not fail on the existing table.
        db.init()?;

        let records = vec![
            AnalysisRecord {
                filename: "a.jpg".to_string(),
                size: 10,
                hash: "aa".to_string(),
                confidence: Some(20.0),
                ..Default::default()
            },
            AnalysisRecord {
                filename: "b.jpg".to_string(),
                size: 20,
                hash: "bb".to_string(),
                is_edible: Some(true),
                edibility_confidence: Some(80.0),
                species: Some("Coprinus_comatus".to_string()),
                species_confidence: Some(70.0),
                ..Default::default()
            },
        ];
        db.save_analyses_batch(&records)?;

        let count: i64 = db
            .conn
            .query_row("SELECT COUNT(*) FROM analyses", [], |row| row.get(0))?;
        assert_eq!(count, 2);

        let (species, edible, created): (Option<String>, Option<bool>, String) = db.conn.query_row(
            "SELECT species, is_edible, created_at FROM analyses WHERE filename = 'b.jpg'",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;
        assert_eq!(species.as_deref(), Some("Coprinus_comatus"));
        assert_eq!(edible, Some(true));
        assert!(!created.is_empty());
        Ok(())
    }
}
