//! Versioned binary song catalog.
//!
//! # Wire format
//!
//! All integers are little-endian `i32`. Strings are an `i32` byte length
//! followed by that many UTF-8 bytes.
//!
//! ```text
//! version            (must be 1)
//! count
//! count × entry:
//!     id
//!     shortname      string
//!     artist         string
//!     title          string
//!     source_count
//!     source_count × string
//! ```

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use tokio::sync::OnceCell;

use crate::error::CatalogError;
use crate::transport::Transport;

/// The only catalog version this crate reads.
pub const CATALOG_VERSION: i32 = 1;

/// Resource path fetched by [`CatalogLoader`] unless overridden.
pub const DEFAULT_CATALOG_PATH: &str = "songCache.bin";

/// Source tag of songs shipped on the game disc.
pub const DISC_SOURCE: &str = "rb4";

/// One song.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct CatalogEntry {
    pub id: i32,
    pub shortname: String,
    pub artist: String,
    pub title: String,
    pub sources: Vec<String>,
}

impl CatalogEntry {
    #[must_use]
    pub fn new(
        id: i32,
        shortname: impl Into<String>,
        artist: impl Into<String>,
        title: impl Into<String>,
        sources: Vec<String>,
    ) -> Self {
        Self {
            id,
            shortname: shortname.into(),
            artist: artist.into(),
            title: title.into(),
            sources,
        }
    }

    /// Shipped on the disc and nowhere else.
    #[must_use]
    pub fn is_disc_only(&self) -> bool {
        matches!(self.sources.as_slice(), [only] if only == DISC_SOURCE)
    }

    fn read_from(reader: &mut Reader<'_>) -> Result<Self, CatalogError> {
        let id = reader.read_i32()?;
        let shortname = reader.read_string()?;
        let artist = reader.read_string()?;
        let title = reader.read_string()?;
        let source_count = reader.read_count("source count")?;
        let mut sources = Vec::with_capacity(reader.capacity_hint(source_count, 4));
        for _ in 0..source_count {
            sources.push(reader.read_string()?);
        }
        Ok(Self {
            id,
            shortname,
            artist,
            title,
            sources,
        })
    }

    /// Append this entry in wire format.
    pub fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.id.to_le_bytes());
        write_string(out, &self.shortname);
        write_string(out, &self.artist);
        write_string(out, &self.title);
        write_len(out, self.sources.len());
        for source in &self.sources {
            write_string(out, source);
        }
    }
}

/// Songs indexed by id and by shortname.
///
/// Both indexes are built together and never mutated afterwards.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    by_id: HashMap<i32, CatalogEntry>,
    by_shortname: HashMap<String, i32>,
}

impl Catalog {
    /// Index `entries`.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::DuplicateId`] or
    /// [`CatalogError::DuplicateShortname`] if two entries collide.
    pub fn from_entries(entries: impl IntoIterator<Item = CatalogEntry>) -> Result<Self, CatalogError> {
        let mut catalog = Self::default();
        for entry in entries {
            catalog.insert(entry)?;
        }
        Ok(catalog)
    }

    /// Parse a catalog in wire format.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::UnsupportedVersion`] for any version other than
    /// [`CATALOG_VERSION`], or a format error for malformed content.
    pub fn decode(bytes: &[u8]) -> Result<Self, CatalogError> {
        let mut reader = Reader::new(bytes);

        let version = reader.read_i32()?;
        if version != CATALOG_VERSION {
            return Err(CatalogError::UnsupportedVersion(version));
        }

        let count = reader.read_count("entry count")?;
        let mut catalog = Self {
            by_id: HashMap::with_capacity(reader.capacity_hint(count, 20)),
            by_shortname: HashMap::with_capacity(reader.capacity_hint(count, 20)),
        };
        for _ in 0..count {
            catalog.insert(CatalogEntry::read_from(&mut reader)?)?;
        }
        Ok(catalog)
    }

    /// Serialize entries in wire format, in iteration order.
    #[must_use]
    pub fn encode<'a>(entries: impl IntoIterator<Item = &'a CatalogEntry>) -> Vec<u8> {
        let entries: Vec<_> = entries.into_iter().collect();
        let mut out = Vec::new();
        out.extend_from_slice(&CATALOG_VERSION.to_le_bytes());
        write_len(&mut out, entries.len());
        for entry in entries {
            entry.write_to(&mut out);
        }
        out
    }

    fn insert(&mut self, entry: CatalogEntry) -> Result<(), CatalogError> {
        if self.by_id.contains_key(&entry.id) {
            return Err(CatalogError::DuplicateId(entry.id));
        }
        match self.by_shortname.entry(entry.shortname.clone()) {
            Entry::Occupied(_) => return Err(CatalogError::DuplicateShortname(entry.shortname)),
            Entry::Vacant(slot) => {
                slot.insert(entry.id);
            }
        }
        self.by_id.insert(entry.id, entry);
        Ok(())
    }

    #[must_use]
    pub fn get(&self, id: i32) -> Option<&CatalogEntry> {
        self.by_id.get(&id)
    }

    #[must_use]
    pub fn get_by_shortname(&self, shortname: &str) -> Option<&CatalogEntry> {
        self.by_shortname
            .get(shortname)
            .and_then(|id| self.by_id.get(id))
    }

    /// Ids of disc-only songs. Order is stable for a given catalog but unsorted.
    #[must_use]
    pub fn disc_entries(&self) -> Vec<i32> {
        self.by_id
            .values()
            .filter(|entry| entry.is_disc_only())
            .map(|entry| entry.id)
            .collect()
    }

    pub fn entries(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.by_id.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

/// Fetches the catalog once and answers lookups against it.
///
/// Until a load succeeds every lookup misses. Concurrent
/// [`ensure_loaded`](Self::ensure_loaded) calls share a single fetch; a failed
/// load publishes nothing and the next call retries.
pub struct CatalogLoader<T> {
    transport: T,
    path: String,
    catalog: OnceCell<Catalog>,
}

impl<T: Transport> CatalogLoader<T> {
    #[must_use]
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            path: DEFAULT_CATALOG_PATH.to_string(),
            catalog: OnceCell::new(),
        }
    }

    /// Override the resource path (default: [`DEFAULT_CATALOG_PATH`]).
    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Fetch and publish the catalog unless it is already loaded.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Transport`] if the fetch fails, or a format
    /// error if the content is rejected. Either way the catalog stays
    /// unloaded and callers may ignore the error.
    pub async fn ensure_loaded(&self) -> Result<&Catalog, CatalogError> {
        self.catalog
            .get_or_try_init(|| async {
                let bytes = self
                    .transport
                    .fetch(&self.path)
                    .await
                    .map_err(CatalogError::Transport)
                    .inspect_err(|e| {
                        tracing::warn!(path = %self.path, error = %e, "Catalog fetch failed");
                    })?;

                let catalog = Catalog::decode(&bytes).inspect_err(|e| {
                    tracing::warn!(path = %self.path, error = %e, "Catalog rejected, not loading");
                })?;
                tracing::info!(songs = catalog.len(), "Catalog loaded");
                Ok::<_, CatalogError>(catalog)
            })
            .await
    }

    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.catalog.initialized()
    }

    /// The loaded catalog, if any.
    #[must_use]
    pub fn catalog(&self) -> Option<&Catalog> {
        self.catalog.get()
    }

    #[must_use]
    pub fn lookup_by_id(&self, id: i32) -> Option<&CatalogEntry> {
        self.catalog()?.get(id)
    }

    #[must_use]
    pub fn lookup_by_shortname(&self, shortname: &str) -> Option<&CatalogEntry> {
        self.catalog()?.get_by_shortname(shortname)
    }

    /// Ids of disc-only songs; empty while unloaded.
    #[must_use]
    pub fn disc_entries(&self) -> Vec<i32> {
        self.catalog().map(Catalog::disc_entries).unwrap_or_default()
    }
}

// ── Wire helpers ───────────────────────────────────────────────────

struct Reader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    fn take(&mut self, needed: usize) -> Result<&'a [u8], CatalogError> {
        let end = self
            .offset
            .checked_add(needed)
            .filter(|&end| end <= self.bytes.len())
            .ok_or(CatalogError::Truncated {
                offset: self.offset,
                needed,
            })?;
        let slice = &self.bytes[self.offset..end];
        self.offset = end;
        Ok(slice)
    }

    fn read_i32(&mut self) -> Result<i32, CatalogError> {
        let raw = self.take(4)?;
        Ok(i32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
    }

    fn read_count(&mut self, field: &'static str) -> Result<usize, CatalogError> {
        let offset = self.offset;
        let value = self.read_i32()?;
        usize::try_from(value).map_err(|_| CatalogError::NegativeLength {
            field,
            value,
            offset,
        })
    }

    fn read_string(&mut self) -> Result<String, CatalogError> {
        let len = self.read_count("string length")?;
        let offset = self.offset;
        let raw = self.take(len)?;
        std::str::from_utf8(raw)
            .map(str::to_owned)
            .map_err(|_| CatalogError::InvalidUtf8 { offset })
    }

    /// Preallocation bounded by what the remaining bytes could possibly hold.
    fn capacity_hint(&self, count: usize, min_item_size: usize) -> usize {
        count.min((self.bytes.len() - self.offset) / min_item_size)
    }
}

fn write_len(out: &mut Vec<u8>, len: usize) {
    let len = i32::try_from(len).unwrap_or(i32::MAX);
    out.extend_from_slice(&len.to_le_bytes());
}

fn write_string(out: &mut Vec<u8>, value: &str) {
    write_len(out, value.len());
    out.extend_from_slice(value.as_bytes());
}
