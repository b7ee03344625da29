mod blogs;
mod messages;
mod notifications;
mod posts;
mod projects;
mod users;

pub use messages::History;
pub use users::ProfileWrite;

use anyhow::Result;
use rusqlite::Row;

use crate::models::UserBriefRow;

/// Read the four `UserBriefRow` columns starting at `idx`.
/// Queries select them as `x.id, x.name, x.username, x.profile_pic`.
fn brief_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<UserBriefRow> {
    Ok(UserBriefRow {
        id: row.get(idx)?,
        name: row.get(idx + 1)?,
        username: row.get(idx + 2)?,
        profile_pic: row.get(idx + 3)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
