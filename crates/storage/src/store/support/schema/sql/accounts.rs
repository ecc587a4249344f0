#![forbid(unsafe_code)]

pub(super) const SQL: &str = r#"

        CREATE TABLE IF NOT EXISTS users (
          id TEXT PRIMARY KEY,
          revision INTEGER NOT NULL,
          name TEXT NOT NULL,
          email TEXT NOT NULL UNIQUE,
          phone TEXT,
          role TEXT NOT NULL,
          health_center TEXT,
          district TEXT,
          region TEXT,
          password_hash TEXT NOT NULL,
          active INTEGER NOT NULL DEFAULT 1,
          created_at_ms INTEGER NOT NULL,
          updated_at_ms INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS sessions (
          token_digest TEXT PRIMARY KEY,
          user_id TEXT,
          guardian_phone TEXT,
          created_at_ms INTEGER NOT NULL,
          expires_at_ms INTEGER NOT NULL,
          CHECK ((user_id IS NULL) <> (guardian_phone IS NULL))
        );

        CREATE TABLE IF NOT EXISTS guardian_pins (
          phone TEXT PRIMARY KEY,
          pin_hash TEXT NOT NULL,
          failed_attempts INTEGER NOT NULL DEFAULT 0,
          locked_until_ms INTEGER,
          updated_at_ms INTEGER NOT NULL
        );
"#;
