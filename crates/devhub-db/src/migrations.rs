use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);"
    )?;

    let version: i64 = conn
        .query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id          TEXT PRIMARY KEY,
                name        TEXT NOT NULL DEFAULT '',
                username    TEXT UNIQUE,
                email       TEXT NOT NULL DEFAULT '',
                description TEXT,
                github_link TEXT,
                role        TEXT NOT NULL DEFAULT '',
                profile_pic TEXT,
                onboarded   INTEGER NOT NULL DEFAULT 0,
                created_at  TEXT NOT NULL
            );

            CREATE TABLE follows (
                id           TEXT PRIMARY KEY,
                follower_id  TEXT NOT NULL REFERENCES users(id),
                following_id TEXT NOT NULL REFERENCES users(id),
                created_at   TEXT NOT NULL,
                UNIQUE(follower_id, following_id),
                CHECK(follower_id <> following_id)
            );

            CREATE INDEX idx_follows_following ON follows(following_id);

            CREATE TABLE posts (
                id          TEXT PRIMARY KEY,
                author_id   TEXT NOT NULL REFERENCES users(id),
                content     TEXT NOT NULL,
                image_url   TEXT,
                created_at  TEXT NOT NULL,
                updated_at  TEXT NOT NULL
            );

            CREATE INDEX idx_posts_author ON posts(author_id, created_at);

            CREATE TABLE likes (
                id          TEXT PRIMARY KEY,
                user_id     TEXT NOT NULL REFERENCES users(id),
                post_id     TEXT NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
                created_at  TEXT NOT NULL,
                UNIQUE(user_id, post_id)
            );

            CREATE TABLE bookmarks (
                id          TEXT PRIMARY KEY,
                user_id     TEXT NOT NULL REFERENCES users(id),
                post_id     TEXT NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
                created_at  TEXT NOT NULL,
                UNIQUE(user_id, post_id)
            );

            CREATE TABLE projects (
                id           TEXT PRIMARY KEY,
                owner_id     TEXT NOT NULL REFERENCES users(id),
                title        TEXT NOT NULL,
                description  TEXT NOT NULL,
                github_url   TEXT NOT NULL,
                live_url     TEXT,
                thumbnail    TEXT,
                technologies TEXT NOT NULL DEFAULT '[]',
                created_at   TEXT NOT NULL,
                updated_at   TEXT NOT NULL
            );

            CREATE INDEX idx_projects_owner ON projects(owner_id, created_at);

            CREATE TABLE comments (
                id          TEXT PRIMARY KEY,
                author_id   TEXT NOT NULL REFERENCES users(id),
                content     TEXT NOT NULL,
                post_id     TEXT REFERENCES posts(id) ON DELETE CASCADE,
                project_id  TEXT REFERENCES projects(id) ON DELETE CASCADE,
                created_at  TEXT NOT NULL,
                CHECK((post_id IS NULL) <> (project_id IS NULL))
            );

            CREATE INDEX idx_comments_post ON comments(post_id);

            -- pair_low/pair_high hold the participants sorted, so one row per unordered pair
            CREATE TABLE conversations (
                id          TEXT PRIMARY KEY,
                user_one_id TEXT NOT NULL REFERENCES users(id),
                user_two_id TEXT NOT NULL REFERENCES users(id),
                pair_low    TEXT NOT NULL,
                pair_high   TEXT NOT NULL,
                created_at  TEXT NOT NULL,
                UNIQUE(pair_low, pair_high)
            );

            CREATE TABLE messages (
                id              TEXT PRIMARY KEY,
                conversation_id TEXT NOT NULL REFERENCES conversations(id),
                sender_id       TEXT NOT NULL REFERENCES users(id),
                receiver_id     TEXT NOT NULL REFERENCES users(id),
                content         TEXT NOT NULL,
                created_at      TEXT NOT NULL
            );

            CREATE INDEX idx_messages_conversation ON messages(conversation_id, created_at);

            CREATE TABLE notifications (
                id          TEXT PRIMARY KEY,
                kind        TEXT NOT NULL CHECK(kind IN ('LIKE', 'COMMENT', 'FOLLOW', 'MESSAGE')),
                user_id     TEXT NOT NULL REFERENCES users(id),
                actor_id    TEXT NOT NULL REFERENCES users(id),
                post_id     TEXT REFERENCES posts(id) ON DELETE SET NULL,
                read        INTEGER NOT NULL DEFAULT 0,
                created_at  TEXT NOT NULL
            );

            CREATE INDEX idx_notifications_user ON notifications(user_id, read, created_at);

            INSERT INTO schema_version (version) VALUES (1);
            "
        )?;
    }

    if version < 2 {
        info!("Running migration v2 (blogs)");
        conn.execute_batch(
            "
            CREATE TABLE blogs (
                id           TEXT PRIMARY KEY,
                author_id    TEXT NOT NULL REFERENCES users(id),
                title        TEXT NOT NULL,
                description  TEXT NOT NULL,
                content      TEXT NOT NULL,
                thumbnail    TEXT,
                technologies TEXT NOT NULL DEFAULT '[]',
                published_at TEXT NOT NULL,
                updated_at   TEXT NOT NULL
            );

            CREATE INDEX idx_blogs_author ON blogs(author_id, published_at);

            INSERT INTO schema_version (version) VALUES (2);
            "
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn).unwrap();
        run(&conn).unwrap();

        let (rows, latest): (i64, i64) = conn
            .query_row("SELECT COUNT(*), MAX(version) FROM schema_version", [], |r| {
                Ok((r.get(0)?, r.get(1)?))
            })
            .unwrap();
        assert_eq!((rows, latest), (2, 2));
    }

    #[test]
    fn v1_database_is_upgraded_in_place() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn).unwrap();
        conn.execute_batch("DROP TABLE blogs; DELETE FROM schema_version WHERE version = 2;")
            .unwrap();

        run(&conn).unwrap();
        let blogs: i64 = conn
            .query_row("SELECT COUNT(*) FROM sqlite_master WHERE name = 'blogs'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(blogs, 1);
    }

    #[test]
    fn conversation_pair_is_unique() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn).unwrap();
        conn.execute_batch(
            "INSERT INTO users (id, created_at) VALUES ('a', 'x'), ('b', 'x');
             INSERT INTO conversations VALUES ('c1', 'a', 'b', 'a', 'b', 'x');",
        )
        .unwrap();

        let dup = conn.execute(
            "INSERT INTO conversations VALUES ('c2', 'b', 'a', 'a', 'b', 'x')",
            [],
        );
        assert!(dup.is_err());
    }
}
