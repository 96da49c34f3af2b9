//! Purpose: Open a table archive and index its named Parquet members.
//! Exports: `Store`.
//! Role: Read-only container access; hands member bytes to the parquet reader.
//! Invariants: The archive is memory-mapped once and never written.
//! Invariants: Keys are member paths with the `.parquet` suffix stripped; a
//! leading `/` on a requested key is ignored.
use std::fs::File;
use std::io::{self, Cursor};
use std::path::{Path, PathBuf};

use bytes::Bytes;
use memmap2::Mmap;
use tracing::debug;

use crate::core::error::{Error, ErrorKind};

const PARQUET_MAGIC: &[u8; 4] = b"PAR1";

#[derive(Debug)]
struct Member {
    key: String,
    offset: usize,
    len: usize,
}

/// An opened table archive: a tar file of Parquet tables, or a bare Parquet
/// file acting as the degenerate single-table store.
#[derive(Debug)]
pub struct Store {
    path: PathBuf,
    mmap: Mmap,
    members: Vec<Member>,
}

impl Store {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|err| {
            Error::new(open_error_kind(&err))
                .with_message("cannot open store")
                .with_path(&path)
                .with_source(err)
        })?;

        let mmap = unsafe {
            Mmap::map(&file)
                .map_err(|err| Error::new(ErrorKind::Io).with_path(&path).with_source(err))?
        };

        let members = if mmap.len() >= PARQUET_MAGIC.len() && &mmap[..4] == PARQUET_MAGIC {
            vec![Member {
                key: bare_parquet_key(&path),
                offset: 0,
                len: mmap.len(),
            }]
        } else {
            index_tar(&mmap, &path)?
        };

        debug!(path = %path.display(), tables = members.len(), "store opened");
        Ok(Self {
            path,
            mmap,
            members,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn keys(&self) -> Vec<&str> {
        self.members.iter().map(|member| member.key.as_str()).collect()
    }

    /// Resolve an optional key the way the read entry point expects: a given
    /// key must name a member; an absent key is allowed only when the store
    /// holds exactly one table.
    pub fn resolve_key(&self, key: Option<&str>) -> Result<&str, Error> {
        match key {
            Some(key) => self.find(key).map(|member| member.key.as_str()),
            None => self.sole_key(),
        }
    }

    pub fn sole_key(&self) -> Result<&str, Error> {
        match self.members.as_slice() {
            [sole] => Ok(&sole.key),
            [] => Err(Error::new(ErrorKind::NotFound)
                .with_message("store holds no tables")
                .with_path(&self.path)),
            _ => Err(Error::new(ErrorKind::Usage)
                .with_message("key must be provided when the store holds more than one table")
                .with_path(&self.path)
                .with_hint(format!("Available tables: {}", self.keys().join(", ")))),
        }
    }

    /// Raw bytes of one member, ready for `ParquetRecordBatchReaderBuilder`.
    pub fn table_bytes(&self, key: &str) -> Result<Bytes, Error> {
        let member = self.find(key)?;
        Ok(Bytes::copy_from_slice(
            &self.mmap[member.offset..member.offset + member.len],
        ))
    }

    fn find(&self, key: &str) -> Result<&Member, Error> {
        let wanted = key.trim_start_matches('/');
        self.members
            .iter()
            .find(|member| member.key == wanted)
            .ok_or_else(|| {
                let err = Error::new(ErrorKind::NotFound)
                    .with_message(format!("no table named `{wanted}` in store"))
                    .with_path(&self.path)
                    .with_key(wanted);
                if self.members.is_empty() {
                    err
                } else {
                    err.with_hint(format!("Available tables: {}", self.keys().join(", ")))
                }
            })
    }
}

fn open_error_kind(err: &io::Error) -> ErrorKind {
    match err.kind() {
        io::ErrorKind::NotFound => ErrorKind::NotFound,
        io::ErrorKind::PermissionDenied => ErrorKind::Permission,
        _ => ErrorKind::Io,
    }
}

fn bare_parquet_key(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "table".to_string())
}

fn index_tar(mmap: &[u8], path: &Path) -> Result<Vec<Member>, Error> {
    let mut archive = tar::Archive::new(Cursor::new(mmap));
    let entries = archive.entries().map_err(|err| corrupt(path, err))?;

    let mut members = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| corrupt(path, err))?;
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let member_path = entry
            .path()
            .map_err(|err| corrupt(path, err))?
            .to_string_lossy()
            .into_owned();
        let Some(stripped) = member_path.strip_suffix(".parquet") else {
            debug!(member = %member_path, "skipping non-table member");
            continue;
        };
        let key = stripped.trim_start_matches("./").to_string();
        let offset = entry.raw_file_position() as usize;
        let len = entry.size() as usize;
        if offset.checked_add(len).is_none_or(|end| end > mmap.len()) {
            return Err(Error::new(ErrorKind::Corrupt)
                .with_message(format!("member `{member_path}` extends past end of archive"))
                .with_path(path));
        }
        members.push(Member { key, offset, len });
    }
    Ok(members)
}

fn corrupt(path: &Path, err: io::Error) -> Error {
    Error::new(ErrorKind::Corrupt)
        .with_message("not a readable table archive")
        .with_path(path)
        .with_source(err)
}
