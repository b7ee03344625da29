use anyhow::Result;
use rusqlite::{Connection, Row};

use super::{OptionalExt, brief_at};
use crate::models::{ProjectFields, ProjectRow};
use crate::{Database, new_id, timestamp};

const PROJECT_SELECT: &str = "SELECT p.id, u.id, u.name, u.username, u.profile_pic,
        p.title, p.description, p.github_url, p.live_url, p.thumbnail, p.technologies,
        p.created_at, p.updated_at
     FROM projects p
     JOIN users u ON u.id = p.owner_id";

impl Database {
    pub fn create_project(&self, owner_id: &str, fields: &ProjectFields) -> Result<ProjectRow> {
        let technologies = serde_json::to_string(&fields.technologies)?;
        self.with_conn_mut(|conn| {
            let id = new_id();
            let now = timestamp();
            conn.execute(
                "INSERT INTO projects
                    (id, owner_id, title, description, github_url, live_url, thumbnail, technologies, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
                rusqlite::params![
                    id,
                    owner_id,
                    fields.title,
                    fields.description,
                    fields.github_url,
                    fields.live_url,
                    fields.thumbnail,
                    technologies,
                    now,
                ],
            )?;
            query_project(conn, &id)?.ok_or_else(|| anyhow::anyhow!("Project vanished after insert: {}", id))
        })
    }

    pub fn get_project(&self, id: &str) -> Result<Option<ProjectRow>> {
        self.with_conn(|conn| query_project(conn, id))
    }

    pub fn projects_by_owner(&self, owner_id: &str) -> Result<Vec<ProjectRow>> {
        self.with_conn(|conn| {
            let sql = format!("{PROJECT_SELECT} WHERE p.owner_id = ?1 ORDER BY p.created_at DESC, p.rowid DESC");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([owner_id], map_project)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows.into_iter().map(decode_project).collect()
        })
    }

    /// Projects owned by users `viewer_id` follows, newest first.
    pub fn project_feed(&self, viewer_id: &str, limit: u32) -> Result<Vec<ProjectRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "{PROJECT_SELECT}
                 WHERE p.owner_id IN (SELECT following_id FROM follows WHERE follower_id = ?1)
                 ORDER BY p.created_at DESC, p.rowid DESC
                 LIMIT ?2"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params![viewer_id, limit], map_project)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows.into_iter().map(decode_project).collect()
        })
    }

    /// Only touches the row if `owner_id` still owns it. Returns whether a
    /// row was updated.
    pub fn update_project(&self, id: &str, owner_id: &str, fields: &ProjectFields) -> Result<bool> {
        let technologies = serde_json::to_string(&fields.technologies)?;
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "UPDATE projects SET
                    title = ?3, description = ?4, github_url = ?5, live_url = ?6,
                    thumbnail = ?7, technologies = ?8, updated_at = ?9
                 WHERE id = ?1 AND owner_id = ?2",
                rusqlite::params![
                    id,
                    owner_id,
                    fields.title,
                    fields.description,
                    fields.github_url,
                    fields.live_url,
                    fields.thumbnail,
                    technologies,
                    timestamp(),
                ],
            )?;
            Ok(n == 1)
        })
    }

    pub fn delete_project(&self, id: &str, owner_id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute("DELETE FROM projects WHERE id = ?1 AND owner_id = ?2", [id, owner_id])?;
            Ok(n == 1)
        })
    }
}

/// Technologies come back as the raw JSON column; decoded in `decode_project`.
struct RawProject {
    row: ProjectRow,
    technologies: String,
}

fn query_project(conn: &Connection, id: &str) -> Result<Option<ProjectRow>> {
    let sql = format!("{PROJECT_SELECT} WHERE p.id = ?1");
    conn.query_row(&sql, [id], map_project)
        .optional()?
        .map(decode_project)
        .transpose()
}

fn map_project(row: &Row<'_>) -> rusqlite::Result<RawProject> {
    Ok(RawProject {
        row: ProjectRow {
            id: row.get(0)?,
            owner: brief_at(row, 1)?,
            title: row.get(5)?,
            description: row.get(6)?,
            github_url: row.get(7)?,
            live_url: row.get(8)?,
            thumbnail: row.get(9)?,
            technologies: Vec::new(),
            created_at: row.get(11)?,
            updated_at: row.get(12)?,
        },
        technologies: row.get(10)?,
    })
}

fn decode_project(raw: RawProject) -> Result<ProjectRow> {
    let mut row = raw.row;
    row.technologies = serde_json::from_str(&raw.technologies)?;
    Ok(row)
}
