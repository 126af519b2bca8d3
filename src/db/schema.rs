/// Bumped whenever `SCHEMA` changes shape. Stored in `PRAGMA user_version`.
pub const SCHEMA_VERSION: i64 = 2;

pub const SCHEMA: &str = r#"
-- Images table: one row per image that has sidecar metadata
CREATE TABLE IF NOT EXISTS images (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    path TEXT NOT NULL UNIQUE,
    filename TEXT NOT NULL,
    directory TEXT NOT NULL,

    -- Sidecar content, verbatim JSON
    description_json TEXT,
    people_json TEXT,

    -- Denormalized for listing
    short_description TEXT,
    face_count INTEGER NOT NULL DEFAULT 0,

    indexed_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_images_directory ON images(directory);

-- Keywords in sidecar order
CREATE TABLE IF NOT EXISTS image_keywords (
    image_id INTEGER NOT NULL,
    position INTEGER NOT NULL,
    keyword TEXT NOT NULL,
    PRIMARY KEY (image_id, position),
    FOREIGN KEY (image_id) REFERENCES images(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_image_keywords_keyword ON image_keywords(keyword);

-- Recognized face names
CREATE TABLE IF NOT EXISTS image_people (
    image_id INTEGER NOT NULL,
    name TEXT NOT NULL,
    PRIMARY KEY (image_id, name),
    FOREIGN KEY (image_id) REFERENCES images(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_image_people_name ON image_people(name);
"#;

/// Tables dropped before a full rebuild, children first.
pub const DROP_ALL: &str = r#"
DROP TABLE IF EXISTS image_people;
DROP TABLE IF EXISTS image_keywords;
DROP TABLE IF EXISTS images;
"#;
