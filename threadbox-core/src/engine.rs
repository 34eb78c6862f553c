//! Storage engine: inode graph, version log, invariants, directory
//! auto-materialisation (spec §4.D).

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use crate::db::Database;
use crate::error::{StorageError, StorageResult};
use crate::ids::new_id;
use crate::path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    File,
    Directory,
}

impl NodeType {
    fn as_db_str(self) -> &'static str {
        match self {
            NodeType::File => "file",
            NodeType::Directory => "directory",
        }
    }

    fn from_db_str(s: &str) -> NodeType {
        match s {
            "directory" => NodeType::Directory,
            _ => NodeType::File,
        }
    }
}

/// Value-copied snapshot of a Node, optionally joined with its latest
/// content. No back-references to engine state.
#[derive(Debug, Clone)]
pub struct VirtualEntry {
    pub id: String,
    pub session: String,
    pub path: String,
    pub name: String,
    pub parent_path: Option<String>,
    pub node_type: NodeType,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// `latest_version` for files; `None` for directories.
    pub version: Option<i64>,
    /// Present only when the caller asked for content (`read_file`).
    pub content: Option<Vec<u8>>,
}

/// Value-copied snapshot of a single Version row.
#[derive(Debug, Clone)]
pub struct FileVersion {
    pub id: String,
    pub node_id: String,
    pub version: i64,
    pub content: Vec<u8>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct DirectoryListing {
    pub path: String,
    pub directories: Vec<VirtualEntry>,
    pub files: Vec<VirtualEntry>,
}

/// One row of a `--dump` summary: a node's path, kind, version, and size.
#[derive(Debug, Clone)]
pub struct NodeSummary {
    pub path: String,
    pub is_directory: bool,
    pub version: Option<i64>,
    pub size: i64,
}

/// Internal row shape, not exposed outside this module.
struct NodeRow {
    id: String,
    path: String,
    name: String,
    parent_path: Option<String>,
    node_type: NodeType,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    latest_version: Option<i64>,
}

impl NodeRow {
    fn into_entry(self, session: &str, content: Option<Vec<u8>>) -> VirtualEntry {
        VirtualEntry {
            id: self.id,
            session: session.to_string(),
            path: self.path,
            name: self.name,
            parent_path: self.parent_path,
            node_type: self.node_type,
            created_at: self.created_at,
            updated_at: self.updated_at,
            version: self.latest_version,
            content,
        }
    }
}

/// Normalise a caller-supplied session: trim; `None` becomes the empty
/// (default/global) session.
pub fn normalize_session(session: Option<&str>) -> String {
    session.map(str::trim).unwrap_or("").to_string()
}

pub struct Engine {
    db: Database,
}

impl Engine {
    pub fn open(path: &Path) -> StorageResult<Self> {
        Ok(Self { db: Database::open(path)? })
    }

    pub fn open_in_memory() -> StorageResult<Self> {
        Ok(Self { db: Database::open_in_memory()? })
    }

    /// Release the underlying handle. Any operation attempted afterwards
    /// fails because the connection is gone; this is the same "drop closes
    /// it" shape as the reference workspace's single-writer `Memory`.
    pub fn close(self) {
        drop(self);
    }

    // ---------------------------------------------------------------
    // write_file
    // ---------------------------------------------------------------

    pub fn write_file(
        &mut self,
        path: &str,
        bytes: &[u8],
        session: Option<&str>,
    ) -> StorageResult<VirtualEntry> {
        let canonical = path::normalize(path)?;
        let session = normalize_session(session);
        let now = Utc::now();
        let now_s = now.to_rfc3339();

        tracing::debug!(session = %session, path = %canonical, "writing file");
        self.db.write_transaction(|tx| {
            ensure_root(tx, &session, &now_s)?;
            let parent = path::parent(&canonical);
            if parent.is_some() {
                ensure_ancestors(tx, &session, &canonical, &now_s)?;
            }

            match find_node(tx, &session, &canonical)? {
                None => {
                    let id = new_id();
                    insert_node(
                        tx,
                        &id,
                        &session,
                        &canonical,
                        &path::basename(&canonical),
                        parent.as_deref(),
                        NodeType::File,
                        &now_s,
                        &now_s,
                        Some(1),
                    )?;
                    insert_version(tx, &new_id(), &id, 1, bytes, &now_s)?;
                    Ok(VirtualEntry {
                        id,
                        session: session.clone(),
                        path: canonical.clone(),
                        name: path::basename(&canonical),
                        parent_path: parent,
                        node_type: NodeType::File,
                        created_at: now,
                        updated_at: now,
                        version: Some(1),
                        content: None,
                    })
                }
                Some(row) if row.node_type == NodeType::Directory => {
                    tracing::warn!(session = %session, path = %canonical, "refusing to write over a directory");
                    Err(StorageError::is_directory(canonical))
                }
                Some(row) => {
                    let next_version = row.latest_version.unwrap_or(0) + 1;
                    tx.execute(
                        "UPDATE nodes SET latest_version = ?1, updated_at = ?2 WHERE id = ?3",
                        params![next_version, now_s, row.id],
                    )?;
                    insert_version(tx, &new_id(), &row.id, next_version, bytes, &now_s)?;
                    Ok(VirtualEntry {
                        id: row.id,
                        session: session.clone(),
                        path: canonical.clone(),
                        name: row.name,
                        parent_path: row.parent_path,
                        node_type: NodeType::File,
                        created_at: row.created_at,
                        updated_at: now,
                        version: Some(next_version),
                        content: None,
                    })
                }
            }
        })
    }

    // ---------------------------------------------------------------
    // read_file
    // ---------------------------------------------------------------

    pub fn read_file(
        &self,
        path: &str,
        session: Option<&str>,
    ) -> StorageResult<Option<VirtualEntry>> {
        let canonical = path::normalize(path)?;
        let session = normalize_session(session);

        let Some(row) = find_node(self.db_conn(), &session, &canonical)? else {
            return Ok(None);
        };
        if row.node_type != NodeType::File {
            return Ok(None);
        }
        let version = row.latest_version.unwrap_or(0);
        let content: Vec<u8> = self.db_conn().query_row(
            "SELECT content FROM file_versions WHERE node_id = ?1 AND version = ?2",
            params![row.id, version],
            |r| r.get(0),
        )?;
        Ok(Some(row.into_entry(&session, Some(content))))
    }

    // ---------------------------------------------------------------
    // list_directory
    // ---------------------------------------------------------------

    pub fn list_directory(
        &mut self,
        path: &str,
        session: Option<&str>,
    ) -> StorageResult<DirectoryListing> {
        let canonical = path::normalize(path)?;
        let session = normalize_session(session);
        let now_s = Utc::now().to_rfc3339();

        self.db.write_transaction(|tx| {
            match find_node(tx, &session, &canonical)? {
                Some(row) if row.node_type == NodeType::Directory => {}
                Some(_) => return Err(StorageError::not_a_directory(canonical)),
                None => {
                    if canonical == "/" {
                        ensure_root(tx, &session, &now_s)?;
                    } else {
                        return Err(StorageError::not_a_directory(canonical));
                    }
                }
            }

            let mut directories = Vec::new();
            let mut files = Vec::new();
            for row in find_children(tx, &session, &canonical)? {
                match row.node_type {
                    NodeType::Directory => directories.push(row.into_entry(&session, None)),
                    NodeType::File => files.push(row.into_entry(&session, None)),
                }
            }
            directories.sort_by(|a, b| a.name.cmp(&b.name));
            files.sort_by(|a, b| a.name.cmp(&b.name));

            Ok(DirectoryListing { path: canonical.clone(), directories, files })
        })
    }

    // ---------------------------------------------------------------
    // rename_node / move_node
    // ---------------------------------------------------------------

    pub fn rename_node(
        &mut self,
        path: &str,
        new_name: &str,
        session: Option<&str>,
    ) -> StorageResult<VirtualEntry> {
        let canonical = path::normalize(path)?;
        let name = path::normalize_name(new_name)?;
        let session = normalize_session(session);

        if canonical == "/" {
            return Err(StorageError::invalid_operation("cannot rename the root"));
        }
        let parent = path::parent(&canonical).expect("non-root path always has a parent");
        let target = path::join(&parent, &name);
        self.relocate(&session, &canonical, &target)
    }

    pub fn move_node(
        &mut self,
        path: &str,
        new_directory: &str,
        session: Option<&str>,
    ) -> StorageResult<VirtualEntry> {
        let canonical = path::normalize(path)?;
        let new_dir = path::normalize(new_directory)?;
        let session = normalize_session(session);

        let target = path::join(&new_dir, &path::basename(&canonical));
        if target == canonical {
            return Err(StorageError::invalid_operation(
                "cannot move a node onto its own path",
            ));
        }
        self.relocate(&session, &canonical, &target)
    }

    fn relocate(&mut self, session: &str, from: &str, to: &str) -> StorageResult<VirtualEntry> {
        if from == "/" {
            return Err(StorageError::invalid_operation("cannot relocate the root"));
        }
        let now = Utc::now();
        let now_s = now.to_rfc3339();

        tracing::debug!(session = %session, from = %from, to = %to, "relocating node");
        self.db.write_transaction(|tx| {
            let node = find_node(tx, session, from)?
                .ok_or_else(|| StorageError::not_found(from))?;
            if node.node_type != NodeType::File {
                return Err(StorageError::unsupported_kind(from));
            }
            let new_parent = path::parent(to)
                .ok_or_else(|| StorageError::invalid_path(to, "target has no parent"))?;
            if find_node(tx, session, to)?.is_some() {
                tracing::warn!(session = %session, to = %to, "relocation target already exists");
                return Err(StorageError::already_exists(to));
            }

            ensure_root(tx, session, &now_s)?;
            ensure_ancestors(tx, session, to, &now_s)?;

            let new_name = path::basename(to);
            tx.execute(
                "UPDATE nodes SET path = ?1, name = ?2, parent_path = ?3, updated_at = ?4 WHERE id = ?5",
                params![to, new_name, new_parent, now_s, node.id],
            )?;

            Ok(VirtualEntry {
                id: node.id,
                session: session.to_string(),
                path: to.to_string(),
                name: new_name,
                parent_path: Some(new_parent),
                node_type: NodeType::File,
                created_at: node.created_at,
                updated_at: now,
                version: node.latest_version,
                content: None,
            })
        })
    }

    // ---------------------------------------------------------------
    // get_file_history
    // ---------------------------------------------------------------

    pub fn get_file_history(
        &self,
        path: &str,
        session: Option<&str>,
    ) -> StorageResult<Vec<FileVersion>> {
        let canonical = path::normalize(path)?;
        let session = normalize_session(session);

        let Some(row) = find_node(self.db_conn(), &session, &canonical)? else {
            return Ok(Vec::new());
        };
        if row.node_type != NodeType::File {
            return Ok(Vec::new());
        }

        let mut stmt = self.db_conn().prepare(
            "SELECT id, node_id, version, content, created_at FROM file_versions \
             WHERE node_id = ?1 ORDER BY version DESC",
        )?;
        let rows = stmt.query_map(params![row.id], |r| {
            let created_at: String = r.get(4)?;
            Ok(FileVersion {
                id: r.get(0)?,
                node_id: r.get(1)?,
                version: r.get(2)?,
                content: r.get(3)?,
                created_at: parse_rfc3339(&created_at),
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    // ---------------------------------------------------------------
    // export_session_zip
    // ---------------------------------------------------------------

    pub fn export_session_zip(
        &self,
        session: Option<&str>,
        destination_dir: Option<&Path>,
    ) -> StorageResult<PathBuf> {
        let session = normalize_session(session);

        let mut stmt = self.db_conn().prepare(
            "SELECT n.path, fv.content FROM nodes n \
             JOIN file_versions fv ON fv.node_id = n.id AND fv.version = n.latest_version \
             WHERE n.session = ?1 AND n.type = 'file' \
             ORDER BY n.path ASC",
        )?;
        let rows = stmt.query_map(params![session], |r| {
            let path: String = r.get(0)?;
            let content: Vec<u8> = r.get(1)?;
            Ok((path, content))
        })?;

        let mut members = Vec::new();
        for row in rows {
            let (path, content) = row?;
            members.push((path.trim_start_matches('/').to_string(), content));
        }

        tracing::debug!(session = %session, members = members.len(), "encoding session zip");
        let bytes = crate::archive::encode_zip(&members)?;

        let dest_dir = destination_dir
            .map(Path::to_path_buf)
            .unwrap_or_else(std::env::temp_dir);
        std::fs::create_dir_all(&dest_dir)?;

        let filename = format!(
            "threadbox-session-{}-{}.zip",
            safe_session_name(&session),
            Utc::now().format("%Y%m%dT%H%M%S%3fZ"),
        );
        let file_path = dest_dir.join(filename);
        std::fs::write(&file_path, bytes)?;
        Ok(file_path)
    }

    /// Distinct sessions that have ever been written to, ordered
    /// ascending. Used by the CLI's `--dump` summary (spec §6); not part of
    /// the tool dispatcher's surface.
    pub fn sessions(&self) -> StorageResult<Vec<String>> {
        let mut stmt = self
            .db_conn()
            .prepare("SELECT DISTINCT session FROM nodes ORDER BY session ASC")?;
        let rows = stmt.query_map([], |r| r.get::<_, String>(0))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Every node (file or directory) in a session, ordered by path, with
    /// each file's size in bytes. Used by the CLI's `--dump` summary.
    pub fn dump_session(&self, session: &str) -> StorageResult<Vec<NodeSummary>> {
        let mut stmt = self.db_conn().prepare(
            "SELECT n.path, n.type, n.latest_version, \
                    (SELECT LENGTH(fv.content) FROM file_versions fv \
                     WHERE fv.node_id = n.id AND fv.version = n.latest_version) \
             FROM nodes n WHERE n.session = ?1 ORDER BY n.path ASC",
        )?;
        let rows = stmt.query_map(params![session], |row| {
            let type_str: String = row.get(1)?;
            Ok(NodeSummary {
                path: row.get(0)?,
                is_directory: NodeType::from_db_str(&type_str) == NodeType::Directory,
                version: row.get(2)?,
                size: row.get::<_, Option<i64>>(3)?.unwrap_or(0),
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    fn db_conn(&self) -> &Connection {
        &self.db.conn
    }
}

fn safe_session_name(session: &str) -> String {
    if session.is_empty() {
        return "default".to_string();
    }
    session
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '-' })
        .collect()
}

fn parse_rfc3339(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

// ---------------------------------------------------------------------
// Shared row helpers (operate over &Connection; a &Transaction derefs to
// one, so these serve both read and write call sites).
// ---------------------------------------------------------------------

fn find_node(conn: &Connection, session: &str, path: &str) -> StorageResult<Option<NodeRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, path, name, parent_path, type, created_at, updated_at, latest_version \
         FROM nodes WHERE session = ?1 AND path = ?2",
    )?;
    let mut rows = stmt.query(params![session, path])?;
    if let Some(row) = rows.next()? {
        let type_str: String = row.get(4)?;
        let created_at: String = row.get(5)?;
        let updated_at: String = row.get(6)?;
        Ok(Some(NodeRow {
            id: row.get(0)?,
            path: row.get(1)?,
            name: row.get(2)?,
            parent_path: row.get(3)?,
            node_type: NodeType::from_db_str(&type_str),
            created_at: parse_rfc3339(&created_at),
            updated_at: parse_rfc3339(&updated_at),
            latest_version: row.get(7)?,
        }))
    } else {
        Ok(None)
    }
}

fn find_children(conn: &Connection, session: &str, parent_path: &str) -> StorageResult<Vec<NodeRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, path, name, parent_path, type, created_at, updated_at, latest_version \
         FROM nodes WHERE session = ?1 AND parent_path = ?2",
    )?;
    let rows = stmt.query_map(params![session, parent_path], |row| {
        let type_str: String = row.get(4)?;
        let created_at: String = row.get(5)?;
        let updated_at: String = row.get(6)?;
        Ok(NodeRow {
            id: row.get(0)?,
            path: row.get(1)?,
            name: row.get(2)?,
            parent_path: row.get(3)?,
            node_type: NodeType::from_db_str(&type_str),
            created_at: parse_rfc3339(&created_at),
            updated_at: parse_rfc3339(&updated_at),
            latest_version: row.get(7)?,
        })
    })?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

#[allow(clippy::too_many_arguments)]
fn insert_node(
    conn: &Connection,
    id: &str,
    session: &str,
    path: &str,
    name: &str,
    parent_path: Option<&str>,
    node_type: NodeType,
    created_at: &str,
    updated_at: &str,
    latest_version: Option<i64>,
) -> StorageResult<()> {
    conn.execute(
        "INSERT INTO nodes (id, session, path, name, parent_path, type, created_at, updated_at, latest_version) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            id,
            session,
            path,
            name,
            parent_path,
            node_type.as_db_str(),
            created_at,
            updated_at,
            latest_version,
        ],
    )?;
    Ok(())
}

fn insert_version(
    conn: &Connection,
    id: &str,
    node_id: &str,
    version: i64,
    content: &[u8],
    created_at: &str,
) -> StorageResult<()> {
    conn.execute(
        "INSERT INTO file_versions (id, node_id, version, content, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![id, node_id, version, content, created_at],
    )?;
    Ok(())
}

/// Ensure the session root `/` exists, creating it as an empty directory if
/// absent (spec §3 invariant 4).
fn ensure_root(conn: &Connection, session: &str, now: &str) -> StorageResult<()> {
    if find_node(conn, session, "/")?.is_some() {
        return Ok(());
    }
    insert_node(conn, &new_id(), session, "/", "/", None, NodeType::Directory, now, now, None)
}

/// Ensure every ancestor directory of `path` exists, shallowest first, as an
/// iterative walk over path segments rather than recursion (spec §9).
fn ensure_ancestors(conn: &Connection, session: &str, path: &str, now: &str) -> StorageResult<()> {
    for ancestor in path::ancestors(path) {
        if find_node(conn, session, &ancestor)?.is_some() {
            continue;
        }
        tracing::debug!(session = %session, path = %ancestor, "auto-materialising directory");
        let parent = path::parent(&ancestor);
        insert_node(
            conn,
            &new_id(),
            session,
            &ancestor,
            &path::basename(&ancestor),
            parent.as_deref(),
            NodeType::Directory,
            now,
            now,
            None,
        )?;
    }
    Ok(())
}
