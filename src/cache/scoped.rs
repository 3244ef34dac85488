//! Per-kind scoped loader: `id -> entity` plus the scope flags that say which
//! lookups the cache can answer authoritatively.

use ahash::AHashSet;
use metacache_entity::{EntityKind, Identity};
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, QueryBuilder, Sqlite, SqliteConnection};
use std::collections::BTreeMap;
use tracing::{debug, trace};

use super::BIND_CHUNK;
use crate::error::{CacheError, CacheResult};

/// A row type the cache can hold in a [`ScopedLoader`].
pub trait Cached:
    Identity + Clone + Send + Sync + Unpin + for<'r> FromRow<'r, SqliteRow> + 'static
{
    const KIND: EntityKind;
    /// `SELECT ... FROM ...` (already joined with `projects`), without `WHERE`.
    const SELECT: &'static str;
    const ID_COLUMN: &'static str;
    const NAME_COLUMN: &'static str;
    /// `None` for kinds that do not live in a project.
    const PROJECT_COLUMN: Option<&'static str>;

    fn scope_name(&self) -> &str;

    fn scope_project(&self) -> Option<i64>;
}

/// Typed condition for [`ScopedLoader::load_by_sql`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    All,
    Project(i64),
    Names {
        project_id: Option<i64>,
        names: Vec<String>,
    },
    Ids(Vec<i64>),
}

impl Filter {
    /// An explicit list with nothing in it selects nothing.
    fn selects_nothing(&self) -> bool {
        match self {
            Filter::Names { names, .. } => names.is_empty(),
            Filter::Ids(ids) => ids.is_empty(),
            Filter::All | Filter::Project(_) => false,
        }
    }

    /// Splits explicit lists into bind-sized filters.
    fn chunks(&self) -> Vec<Filter> {
        match self {
            Filter::Names { project_id, names } => names
                .chunks(BIND_CHUNK)
                .map(|names| Filter::Names {
                    project_id: *project_id,
                    names: names.to_vec(),
                })
                .collect(),
            Filter::Ids(ids) => ids
                .chunks(BIND_CHUNK)
                .map(|ids| Filter::Ids(ids.to_vec()))
                .collect(),
            Filter::All | Filter::Project(_) => vec![self.clone()],
        }
    }
}

/// Breadth of a lookup, used to decide whether a miss is authoritative.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope<'a> {
    All,
    Project(i64),
    Name {
        project_id: Option<i64>,
        name: &'a str,
    },
}

#[derive(Debug)]
pub struct ScopedLoader<E> {
    entities: BTreeMap<i64, E>,
    all_loaded: bool,
    loaded_by_project: AHashSet<i64>,
    loaded_names: AHashSet<(Option<i64>, String)>,
}

impl<E> Default for ScopedLoader<E> {
    fn default() -> Self {
        Self {
            entities: BTreeMap::new(),
            all_loaded: false,
            loaded_by_project: AHashSet::new(),
            loaded_names: AHashSet::new(),
        }
    }
}

impl<E: Cached> ScopedLoader<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs the kind's SELECT under `filter`, upserting every returned row.
    /// Returns the touched ids in id order.
    pub async fn load_by_sql(
        &mut self,
        conn: &mut SqliteConnection,
        filter: &Filter,
    ) -> CacheResult<Vec<i64>> {
        if filter.selects_nothing() {
            return Ok(Vec::new());
        }

        let mut ids = Vec::new();
        for part in filter.chunks() {
            let mut qb = select_query::<E>(&part)?;
            let rows = qb
                .build_query_as::<E>()
                .fetch_all(&mut *conn)
                .await
                .map_err(CacheError::store(E::KIND, "load"))?;

            ids.extend(rows.iter().map(Identity::id));
            for row in rows {
                self.entities.insert(row.id(), row);
            }
        }
        ids.sort_unstable();
        ids.dedup();

        debug!(kind = %E::KIND, filter = ?filter, rows = ids.len(), "cache populated");
        Ok(ids)
    }

    pub async fn load_all(&mut self, conn: &mut SqliteConnection) -> CacheResult<Vec<i64>> {
        let ids = self.load_by_sql(conn, &Filter::All).await?;
        self.all_loaded = true;
        for id in &ids {
            if let Some(project_id) = self.entities.get(id).and_then(Cached::scope_project) {
                self.loaded_by_project.insert(project_id);
            }
        }
        Ok(ids)
    }

    pub async fn load_by_project_id(
        &mut self,
        conn: &mut SqliteConnection,
        project_id: i64,
    ) -> CacheResult<Vec<i64>> {
        let ids = self
            .load_by_sql(conn, &Filter::Project(project_id))
            .await?;
        self.loaded_by_project.insert(project_id);
        Ok(ids)
    }

    /// Loads an explicit list of names. Only the names themselves become
    /// authoritative; the project and global flags are left untouched.
    pub async fn load_by_name(
        &mut self,
        conn: &mut SqliteConnection,
        project_id: Option<i64>,
        names: &[String],
    ) -> CacheResult<Vec<i64>> {
        let filter = Filter::Names {
            project_id,
            names: names.to_vec(),
        };
        let ids = self.load_by_sql(conn, &filter).await?;
        self.loaded_names
            .extend(names.iter().map(|name| (project_id, name.clone())));
        Ok(ids)
    }

    pub async fn load_by_ids(
        &mut self,
        conn: &mut SqliteConnection,
        ids: &[i64],
    ) -> CacheResult<Vec<i64>> {
        self.load_by_sql(conn, &Filter::Ids(ids.to_vec())).await
    }

    pub fn is_all_loaded(&self) -> bool {
        self.all_loaded
    }

    pub fn is_loaded(&self, scope: &Scope<'_>) -> bool {
        if self.all_loaded {
            return true;
        }
        match *scope {
            Scope::All => false,
            Scope::Project(project_id) => self.loaded_by_project.contains(&project_id),
            Scope::Name { project_id, name } => {
                project_id.is_some_and(|p| self.loaded_by_project.contains(&p))
                    || self.loaded_names.contains(&(project_id, name.to_owned()))
            }
        }
    }

    /// Filters the cached rows. An empty result is `NotFound` when the caller
    /// says the scope is loaded, and a plain miss otherwise.
    pub fn get_from_cache<F>(
        &self,
        what: &str,
        predicate: F,
        expect_loaded: bool,
    ) -> CacheResult<Vec<&E>>
    where
        F: Fn(&E) -> bool,
    {
        let found = self.select(predicate);
        if found.is_empty() {
            if expect_loaded {
                return Err(CacheError::not_found(E::KIND, what));
            }
            trace!(kind = %E::KIND, what, "cache miss");
        } else {
            trace!(kind = %E::KIND, what, hits = found.len(), "cache hit");
        }
        Ok(found)
    }

    pub fn select<F>(&self, predicate: F) -> Vec<&E>
    where
        F: Fn(&E) -> bool,
    {
        self.entities.values().filter(|e| predicate(e)).collect()
    }

    pub fn get(&self, id: i64) -> Option<&E> {
        self.entities.get(&id)
    }

    pub fn contains(&self, id: i64) -> bool {
        self.entities.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

fn select_query<E: Cached>(filter: &Filter) -> CacheResult<QueryBuilder<'static, Sqlite>> {
    let mut qb = QueryBuilder::<Sqlite>::new(E::SELECT);

    match filter {
        Filter::All => {}
        Filter::Project(project_id) => {
            qb.push(" WHERE ")
                .push(project_column::<E>()?)
                .push(" = ")
                .push_bind(*project_id);
        }
        Filter::Names { project_id, names } => {
            qb.push(" WHERE ");
            if let Some(project_id) = project_id {
                qb.push(project_column::<E>()?)
                    .push(" = ")
                    .push_bind(*project_id)
                    .push(" AND ");
            }
            qb.push(E::NAME_COLUMN).push(" IN (");
            let mut list = qb.separated(", ");
            for name in names {
                list.push_bind(name.clone());
            }
            list.push_unseparated(")");
        }
        Filter::Ids(ids) => {
            qb.push(" WHERE ").push(E::ID_COLUMN).push(" IN (");
            let mut list = qb.separated(", ");
            for id in ids {
                list.push_bind(*id);
            }
            list.push_unseparated(")");
        }
    }

    qb.push(" ORDER BY ").push(E::ID_COLUMN);
    Ok(qb)
}

fn project_column<E: Cached>() -> CacheResult<&'static str> {
    E::PROJECT_COLUMN.ok_or_else(|| {
        CacheError::integrity(format!("{} rows are not scoped by project", E::KIND))
    })
}
