use anyhow::Result;
use rusqlite::{Connection, Row};

use super::{OptionalExt, brief_at};
use crate::models::{BlogFields, BlogRow};
use crate::{Database, new_id, timestamp};

const BLOG_SELECT: &str = "SELECT b.id, u.id, u.name, u.username, u.profile_pic,
        b.title, b.description, b.content, b.thumbnail, b.technologies,
        b.published_at, b.updated_at
     FROM blogs b
     JOIN users u ON u.id = b.author_id";

impl Database {
    pub fn create_blog(&self, author_id: &str, fields: &BlogFields) -> Result<BlogRow> {
        let technologies = serde_json::to_string(&fields.technologies)?;
        self.with_conn_mut(|conn| {
            let id = new_id();
            conn.execute(
                "INSERT INTO blogs
                    (id, author_id, title, description, content, thumbnail, technologies, published_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
                rusqlite::params![
                    id,
                    author_id,
                    fields.title,
                    fields.description,
                    fields.content,
                    fields.thumbnail,
                    technologies,
                    timestamp(),
                ],
            )?;
            query_blog(conn, &id)?.ok_or_else(|| anyhow::anyhow!("Blog vanished after insert: {}", id))
        })
    }

    pub fn get_blog(&self, id: &str) -> Result<Option<BlogRow>> {
        self.with_conn(|conn| query_blog(conn, id))
    }

    /// Newest first.
    pub fn blogs_by_author(&self, author_id: &str) -> Result<Vec<BlogRow>> {
        self.with_conn(|conn| {
            let sql = format!("{BLOG_SELECT} WHERE b.author_id = ?1 ORDER BY b.published_at DESC, b.rowid DESC");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([author_id], map_blog)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows.into_iter().map(decode_blog).collect()
        })
    }

    /// Same ownership rule as `update_project`.
    pub fn update_blog(&self, id: &str, author_id: &str, fields: &BlogFields) -> Result<bool> {
        let technologies = serde_json::to_string(&fields.technologies)?;
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "UPDATE blogs SET
                    title = ?3, description = ?4, content = ?5, thumbnail = ?6,
                    technologies = ?7, updated_at = ?8
                 WHERE id = ?1 AND author_id = ?2",
                rusqlite::params![
                    id,
                    author_id,
                    fields.title,
                    fields.description,
                    fields.content,
                    fields.thumbnail,
                    technologies,
                    timestamp(),
                ],
            )?;
            Ok(n == 1)
        })
    }

    pub fn delete_blog(&self, id: &str, author_id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute("DELETE FROM blogs WHERE id = ?1 AND author_id = ?2", [id, author_id])?;
            Ok(n == 1)
        })
    }
}

struct RawBlog {
    row: BlogRow,
    technologies: String,
}

fn query_blog(conn: &Connection, id: &str) -> Result<Option<BlogRow>> {
    let sql = format!("{BLOG_SELECT} WHERE b.id = ?1");
    conn.query_row(&sql, [id], map_blog)
        .optional()?
        .map(decode_blog)
        .transpose()
}

fn map_blog(row: &Row<'_>) -> rusqlite::Result<RawBlog> {
    Ok(RawBlog {
        row: BlogRow {
            id: row.get(0)?,
            author: brief_at(row, 1)?,
            title: row.get(5)?,
            description: row.get(6)?,
            content: row.get(7)?,
            thumbnail: row.get(8)?,
            technologies: Vec::new(),
            published_at: row.get(10)?,
            updated_at: row.get(11)?,
        },
        technologies: row.get(9)?,
    })
}

fn decode_blog(raw: RawBlog) -> Result<BlogRow> {
    let mut row = raw.row;
    row.technologies = serde_json::from_str(&raw.technologies)?;
    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::fixtures::db_with_users;

    fn fields(title: &str) -> BlogFields {
        BlogFields {
            title: title.to_string(),
            description: "notes".into(),
            content: "# Heading\n\nbody".into(),
            thumbnail: None,
            technologies: vec!["rust".into()],
        }
    }

    #[test]
    fn author_listing_is_newest_first() {
        let db = db_with_users(&["u1", "u2"]);
        db.create_blog("u1", &fields("first")).unwrap();
        db.create_blog("u1", &fields("second")).unwrap();
        db.create_blog("u2", &fields("elsewhere")).unwrap();

        let titles: Vec<String> = db.blogs_by_author("u1").unwrap().into_iter().map(|b| b.title).collect();
        assert_eq!(titles, vec!["second".to_string(), "first".to_string()]);
    }

    #[test]
    fn only_author_can_update_or_delete() {
        let db = db_with_users(&["author", "intruder"]);
        let blog = db.create_blog("author", &fields("v1")).unwrap();
        assert_eq!(blog.technologies, vec!["rust"]);
        assert_eq!(blog.author.id, "author");

        assert!(!db.update_blog(&blog.id, "intruder", &fields("hacked")).unwrap());
        assert!(!db.delete_blog(&blog.id, "intruder").unwrap());
        assert_eq!(db.get_blog(&blog.id).unwrap().unwrap().title, "v1");

        assert!(db.update_blog(&blog.id, "author", &fields("v2")).unwrap());
        assert_eq!(db.get_blog(&blog.id).unwrap().unwrap().title, "v2");
        assert!(db.delete_blog(&blog.id, "author").unwrap());
        assert!(db.get_blog(&blog.id).unwrap().is_none());
    }
}
