//! The persistent tag/file index and its faceted queries.
//!
//! The index is the bipartite graph Files x Tags. Every resolver call
//! re-queries it; there is no derived cache. Set intersection is done with the
//! count technique: a file carries all N selected tags iff it has exactly N
//! matching edges, since (file, tag) pairs are unique.

use sqlx::{QueryBuilder, SqlitePool};
use tracing::debug;

use crate::error::FacetError;

pub const PATH_SEPARATOR: char = '/';

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct TagRow {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct FileRow {
    pub id: i64,
    pub path: String,
    pub mtime: i64,
}

/// Classifier-supplied stream names may contain the path separator
/// (`audio/mpeg`); those are substituted with underscores so every tag is a
/// legal path segment. Empty names are rejected.
pub fn normalize_tag_name(raw: &str) -> Result<String, FacetError> {
    let name: String = raw
        .chars()
        .map(|c| if c == PATH_SEPARATOR { '_' } else { c })
        .collect();
    if name.is_empty() {
        return Err(FacetError::InvalidTagName(raw.to_string()));
    }
    Ok(name)
}

/// Handle over the shared store. Cloning is cheap (the pool is refcounted) and
/// every operation is safe to call concurrently from the scan task and from
/// query-serving call paths.
#[derive(Clone)]
pub struct TagIndex {
    pool: SqlitePool,
}

impl TagIndex {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Opens the store behind `database_url` and brings the schema up to
    /// date. Failure here is fatal: there is no index to serve without it.
    pub async fn open(database_url: &str) -> Result<Self, FacetError> {
        let pool = storage::connect(database_url)
            .await
            .map_err(|e| FacetError::StoreUnavailable(e.to_string()))?;
        storage::migrate(&pool)
            .await
            .map_err(|e| FacetError::StoreUnavailable(e.to_string()))?;
        Ok(Self::new(pool))
    }

    /// Inserts the tag if absent and returns its id either way.
    ///
    /// Concurrent callers cannot produce duplicates: the UNIQUE constraint
    /// makes the insert a no-op for the loser, and both then fetch the same id.
    pub async fn ensure_tag(&self, raw_name: &str) -> Result<i64, FacetError> {
        let name = normalize_tag_name(raw_name)?;
        sqlx::query("INSERT OR IGNORE INTO tags (name) VALUES (?1)")
            .bind(&name)
            .execute(&self.pool)
            .await?;
        let id: i64 = sqlx::query_scalar("SELECT id FROM tags WHERE name = ?1")
            .bind(&name)
            .fetch_one(&self.pool)
            .await?;
        Ok(id)
    }

    pub async fn tag_by_name(&self, name: &str) -> Result<Option<TagRow>, FacetError> {
        let row = sqlx::query_as::<_, TagRow>("SELECT id, name FROM tags WHERE name = ?1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    /// Inserts the file if absent and returns its id.
    ///
    /// Deliberately does NOT update `mtime` on an existing row: a changed file
    /// must not look "seen" until its tag extraction has actually completed.
    /// That update is [`TagIndex::mark_seen`], called once classification
    /// fully succeeds.
    pub async fn record_file(&self, path: &str, mtime: i64) -> Result<i64, FacetError> {
        sqlx::query("INSERT OR IGNORE INTO files (path, mtime) VALUES (?1, ?2)")
            .bind(path)
            .bind(mtime)
            .execute(&self.pool)
            .await?;
        let id: i64 = sqlx::query_scalar("SELECT id FROM files WHERE path = ?1")
            .bind(path)
            .fetch_one(&self.pool)
            .await?;
        Ok(id)
    }

    /// Records that classification of `file_id` completed at `mtime`.
    pub async fn mark_seen(&self, file_id: i64, mtime: i64) -> Result<(), FacetError> {
        sqlx::query("UPDATE files SET mtime = ?2 WHERE id = ?1")
            .bind(file_id)
            .bind(mtime)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Adds the (file, tag) edge if the exact pair does not already exist.
    /// A duplicate link is a no-op, not an error.
    pub async fn link(&self, file_id: i64, tag_id: i64) -> Result<(), FacetError> {
        let existing: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM file_tags WHERE file_id = ?1 AND tag_id = ?2",
        )
        .bind(file_id)
        .bind(tag_id)
        .fetch_one(&self.pool)
        .await?;
        if existing > 0 {
            return Ok(());
        }
        // The UNIQUE constraint absorbs the race between the check above and
        // this insert.
        sqlx::query("INSERT OR IGNORE INTO file_tags (file_id, tag_id) VALUES (?1, ?2)")
            .bind(file_id)
            .bind(tag_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Drops every edge of a file. Called before reclassifying a changed file
    /// so tags its content no longer exhibits do not linger.
    pub async fn unlink_all(&self, file_id: i64) -> Result<(), FacetError> {
        sqlx::query("DELETE FROM file_tags WHERE file_id = ?1")
            .bind(file_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn file_by_id(&self, id: i64) -> Result<Option<FileRow>, FacetError> {
        let row = sqlx::query_as::<_, FileRow>("SELECT id, path, mtime FROM files WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    /// Last-seen mtime for a path, or `None` if the file was never indexed.
    pub async fn file_mtime(&self, path: &str) -> Result<Option<i64>, FacetError> {
        let mtime: Option<i64> = sqlx::query_scalar("SELECT mtime FROM files WHERE path = ?1")
            .bind(path)
            .fetch_optional(&self.pool)
            .await?;
        Ok(mtime)
    }

    /// Every tag that co-occurs with all of `selected` on at least one file,
    /// minus the selected tags themselves. Empty selection lists all tags.
    /// A selected name absent from the index yields an empty result, not an
    /// error: no facet simply means nothing lives under that path prefix.
    pub async fn tags_excluding(&self, selected: &[String]) -> Result<Vec<TagRow>, FacetError> {
        if selected.is_empty() {
            let rows = sqlx::query_as::<_, TagRow>("SELECT id, name FROM tags ORDER BY id")
                .fetch_all(&self.pool)
                .await?;
            return Ok(rows);
        }
        let Some(tag_ids) = self.resolve_selected(selected).await? else {
            return Ok(Vec::new());
        };

        let mut qb: QueryBuilder<sqlx::Sqlite> = QueryBuilder::new(
            "SELECT DISTINCT t.id, t.name FROM tags t \
             INNER JOIN file_tags ft ON ft.tag_id = t.id \
             INNER JOIN (SELECT file_id FROM file_tags WHERE tag_id IN (",
        );
        let mut in_list = qb.separated(", ");
        for id in &tag_ids {
            in_list.push_bind(*id);
        }
        qb.push(") GROUP BY file_id HAVING COUNT(*) = ");
        qb.push_bind(tag_ids.len() as i64);
        qb.push(") m ON m.file_id = ft.file_id WHERE t.id NOT IN (");
        let mut not_list = qb.separated(", ");
        for id in &tag_ids {
            not_list.push_bind(*id);
        }
        qb.push(") ORDER BY t.id");

        let rows = qb.build_query_as::<TagRow>().fetch_all(&self.pool).await?;
        debug!(selected = ?selected, found = rows.len(), "remaining facets");
        Ok(rows)
    }

    /// Files whose tag set is a superset of `selected`, ordered by ascending
    /// id (stable across calls, so pagination is well defined). Empty
    /// selection lists all files. `limit < 0` means no limit.
    pub async fn files_matching(
        &self,
        selected: &[String],
        offset: i64,
        limit: i64,
    ) -> Result<Vec<FileRow>, FacetError> {
        if selected.is_empty() {
            let rows = sqlx::query_as::<_, FileRow>(
                "SELECT id, path, mtime FROM files ORDER BY id LIMIT ?1 OFFSET ?2",
            )
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;
            return Ok(rows);
        }
        let Some(tag_ids) = self.resolve_selected(selected).await? else {
            return Ok(Vec::new());
        };

        let mut qb: QueryBuilder<sqlx::Sqlite> = QueryBuilder::new(
            "SELECT f.id, f.path, f.mtime FROM files f \
             INNER JOIN file_tags ft ON ft.file_id = f.id AND ft.tag_id IN (",
        );
        let mut in_list = qb.separated(", ");
        for id in &tag_ids {
            in_list.push_bind(*id);
        }
        qb.push(") GROUP BY f.id HAVING COUNT(*) = ");
        qb.push_bind(tag_ids.len() as i64);
        qb.push(" ORDER BY f.id LIMIT ");
        qb.push_bind(limit);
        qb.push(" OFFSET ");
        qb.push_bind(offset);

        let rows = qb.build_query_as::<FileRow>().fetch_all(&self.pool).await?;
        Ok(rows)
    }

    /// How many files match `selected`. Lets the adapter decide whether to
    /// show the `files` entry without fetching rows.
    pub async fn count_files_matching(&self, selected: &[String]) -> Result<i64, FacetError> {
        if selected.is_empty() {
            let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM files")
                .fetch_one(&self.pool)
                .await?;
            return Ok(n);
        }
        let Some(tag_ids) = self.resolve_selected(selected).await? else {
            return Ok(0);
        };

        let mut qb: QueryBuilder<sqlx::Sqlite> = QueryBuilder::new(
            "SELECT COUNT(*) FROM (SELECT file_id FROM file_tags WHERE tag_id IN (",
        );
        let mut in_list = qb.separated(", ");
        for id in &tag_ids {
            in_list.push_bind(*id);
        }
        qb.push(") GROUP BY file_id HAVING COUNT(*) = ");
        qb.push_bind(tag_ids.len() as i64);
        qb.push(")");

        let n: i64 = qb.build_query_scalar().fetch_one(&self.pool).await?;
        Ok(n)
    }

    /// Maps selected tag names to ids, deduplicating repeats. `None` when any
    /// name is unknown, which callers turn into an empty result set.
    async fn resolve_selected(&self, selected: &[String]) -> Result<Option<Vec<i64>>, FacetError> {
        let mut unique: Vec<&str> = Vec::with_capacity(selected.len());
        for name in selected {
            if !unique.contains(&name.as_str()) {
                unique.push(name);
            }
        }

        let mut qb: QueryBuilder<sqlx::Sqlite> =
            QueryBuilder::new("SELECT id FROM tags WHERE name IN (");
        let mut in_list = qb.separated(", ");
        for name in &unique {
            in_list.push_bind(*name);
        }
        qb.push(")");

        let ids: Vec<i64> = qb.build_query_scalar().fetch_all(&self.pool).await?;
        if ids.len() != unique.len() {
            return Ok(None);
        }
        Ok(Some(ids))
    }
}
