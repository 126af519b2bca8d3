//! SQLite index of image sidecar metadata.

mod schema;
pub mod locate;

use anyhow::{bail, Context, Result};
use rusqlite::{params, Connection};
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::info;

pub use locate::{locate, DatabaseLocation};
pub use schema::SCHEMA_VERSION;

use crate::scanner::{ImageFilter, ImageRecord};
use crate::sidecar::{Description, People};
use schema::{DROP_ALL, SCHEMA};

/// Summary numbers for `aimeta stats`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatabaseStats {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub images: i64,
    pub described: i64,
    pub distinct_keywords: i64,
    pub distinct_people: i64,
}

pub struct ImageDatabase {
    conn: Connection,
    path: PathBuf,
}

impl ImageDatabase {
    /// Opens the database at `location`, rebuilding it first if asked to.
    pub fn open(location: &DatabaseLocation) -> Result<Self> {
        if let Some(parent) = location.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(&location.path)
            .with_context(|| format!("failed to open image database {}", location.path.display()))?;
        conn.pragma_update(None, "foreign_keys", true)?;

        let db = Self {
            conn,
            path: location.path.clone(),
        };
        if location.needs_rebuild {
            db.rebuild()?;
        } else {
            db.initialize()?;
        }
        Ok(db)
    }

    /// Opens an already-indexed database for reading.
    pub fn open_existing(primary: &Path) -> Result<Self> {
        let location = locate(primary);
        if location.needs_rebuild {
            bail!(
                "no usable image index at {}; run `aimeta index` first",
                primary.display()
            );
        }
        Self::open(&location)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn initialize(&self) -> Result<()> {
        self.conn.execute_batch(SCHEMA)?;
        self.conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
        Ok(())
    }

    /// Drops every table and recreates the schema.
    pub fn rebuild(&self) -> Result<()> {
        info!("Rebuilding image database {}", self.path.display());
        self.conn.execute_batch(DROP_ALL)?;
        self.initialize()
    }

    /// Replaces the whole index with `records` in one transaction.
    pub fn replace_all(&mut self, records: &[ImageRecord]) -> Result<usize> {
        let now = chrono::Utc::now().to_rfc3339();
        let tx = self.conn.transaction()?;
        tx.execute_batch(
            "DELETE FROM image_people; DELETE FROM image_keywords; DELETE FROM images;",
        )?;

        {
            let mut insert_image = tx.prepare(
                r#"
                INSERT INTO images
                    (path, filename, directory, description_json, people_json,
                     short_description, face_count, indexed_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
            )?;
            let mut insert_keyword = tx.prepare(
                "INSERT INTO image_keywords (image_id, position, keyword) VALUES (?1, ?2, ?3)",
            )?;
            let mut insert_person =
                tx.prepare("INSERT OR IGNORE INTO image_people (image_id, name) VALUES (?1, ?2)")?;

            for record in records {
                let filename = record
                    .path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default();
                let directory = record
                    .path
                    .parent()
                    .map(|p| p.to_string_lossy().to_string())
                    .unwrap_or_default();
                let description_json = record
                    .description
                    .as_ref()
                    .map(serde_json::to_string)
                    .transpose()?;
                let people_json = record.people.as_ref().map(serde_json::to_string).transpose()?;
                let short_description = record
                    .description
                    .as_ref()
                    .and_then(|d| d.short_description.clone());
                let face_count = record.face_names().len() as i64;

                insert_image.execute(params![
                    record.path.to_string_lossy(),
                    filename,
                    directory,
                    description_json,
                    people_json,
                    short_description,
                    face_count,
                    now,
                ])?;
                let image_id = tx.last_insert_rowid();

                for (position, keyword) in record.keywords.iter().enumerate() {
                    insert_keyword.execute(params![image_id, position as i64, keyword])?;
                }
                for name in record.face_names() {
                    insert_person.execute(params![image_id, name])?;
                }
            }
        }

        tx.commit()?;
        info!("Indexed {} images into {}", records.len(), self.path.display());
        Ok(records.len())
    }

    /// Every indexed image, ordered by path.
    pub fn load_records(&self) -> Result<Vec<ImageRecord>> {
        let mut keywords: HashMap<i64, Vec<String>> = HashMap::new();
        let mut stmt = self
            .conn
            .prepare("SELECT image_id, keyword FROM image_keywords ORDER BY image_id, position")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)))?;
        for row in rows {
            let (id, keyword) = row?;
            keywords.entry(id).or_default().push(keyword);
        }

        let mut stmt = self
            .conn
            .prepare("SELECT id, path, description_json, people_json FROM images ORDER BY path")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, Option<String>>(3)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (id, path, description_json, people_json) = row?;
            let description: Option<Description> =
                description_json.and_then(|json| serde_json::from_str(&json).ok());
            let people: Option<People> =
                people_json.and_then(|json| serde_json::from_str(&json).ok());
            records.push(ImageRecord {
                path: PathBuf::from(path),
                description,
                keywords: keywords.remove(&id).unwrap_or_default(),
                people,
            });
        }
        Ok(records)
    }

    /// Indexed images passing `filter`, with the same matching rules as a
    /// directory scan.
    pub fn search(&self, filter: &ImageFilter) -> Result<Vec<ImageRecord>> {
        let records = self.load_records()?;
        Ok(records
            .into_iter()
            .filter(|r| filter.is_empty() || r.matches(filter))
            .collect())
    }

    pub fn stats(&self) -> Result<DatabaseStats> {
        let count =
            |sql: &str| -> Result<i64> { Ok(self.conn.query_row(sql, [], |row| row.get(0))?) };

        Ok(DatabaseStats {
            path: self.path.clone(),
            size_bytes: std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0),
            images: count("SELECT COUNT(*) FROM images")?,
            described: count("SELECT COUNT(*) FROM images WHERE description_json IS NOT NULL")?,
            distinct_keywords: count("SELECT COUNT(DISTINCT keyword) FROM image_keywords")?,
            distinct_people: count("SELECT COUNT(DISTINCT name) FROM image_people")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn record(path: &str, keywords: &[&str], faces: Option<&[&str]>) -> ImageRecord {
        let keywords: Vec<String> = keywords.iter().map(|k| k.to_string()).collect();
        ImageRecord {
            path: PathBuf::from(path),
            description: Some(Description {
                short_description: Some(format!("about {}", path)),
                keywords: Some(keywords.clone()),
                ..Default::default()
            }),
            keywords,
            people: faces.map(|f| People {
                count: f.len() as u32,
                faces: f.iter().map(|n| n.to_string()).collect(),
            }),
        }
    }

    fn fresh_db(dir: &Path) -> ImageDatabase {
        ImageDatabase::open(&DatabaseLocation {
            path: dir.join("allimages.meta.db"),
            needs_rebuild: true,
        })
        .unwrap()
    }

    #[test]
    fn test_replace_and_load_round_trip() {
        let dir = tempdir().unwrap();
        let mut db = fresh_db(dir.path());
        let records = vec![
            record("/pics/b.jpg", &["sunset", "beach"], Some(&["Alice"])),
            record("/pics/a.jpg", &["forest"], None),
        ];

        assert_eq!(db.replace_all(&records).unwrap(), 2);
        let loaded = db.load_records().unwrap();

        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0], records[1]);
        assert_eq!(loaded[1], records[0]);

        // replacing drops what was there
        db.replace_all(&records[..1]).unwrap();
        assert_eq!(db.load_records().unwrap().len(), 1);
    }

    #[test]
    fn test_search_uses_scan_semantics() {
        let dir = tempdir().unwrap();
        let mut db = fresh_db(dir.path());
        db.replace_all(&[
            record("/pics/a.jpg", &["sunset", "beach"], None),
            record("/pics/b.jpg", &["beach"], Some(&["Bob"])),
        ])
        .unwrap();

        let beach = ImageFilter::new(&["*beach*".to_string()], &[]).unwrap();
        assert_eq!(db.search(&beach).unwrap().len(), 2);

        let bob = ImageFilter::new(&["beach".to_string()], &["b?b".to_string()]).unwrap();
        let found = db.search(&bob).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].path, PathBuf::from("/pics/b.jpg"));
    }

    #[test]
    fn test_stats() {
        let dir = tempdir().unwrap();
        let mut db = fresh_db(dir.path());
        db.replace_all(&[
            record("/pics/a.jpg", &["sunset", "beach"], Some(&["Alice", "Bob"])),
            record("/pics/b.jpg", &["beach"], Some(&["Bob"])),
        ])
        .unwrap();

        let stats = db.stats().unwrap();
        assert_eq!(stats.images, 2);
        assert_eq!(stats.described, 2);
        assert_eq!(stats.distinct_keywords, 2);
        assert_eq!(stats.distinct_people, 2);
        assert!(stats.size_bytes > 0);
    }

    #[test]
    fn test_open_existing_requires_index() {
        let dir = tempdir().unwrap();
        let primary = dir.path().join("allimages.meta.db");
        assert!(ImageDatabase::open_existing(&primary).is_err());

        drop(fresh_db(dir.path()));
        assert!(ImageDatabase::open_existing(&primary).is_ok());
    }
}
