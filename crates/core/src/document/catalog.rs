//! The loaded document: cross-reference chain, trailer, security and
//! object dereferencing.

use std::cell::RefCell;
use std::fmt;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use memmap2::Mmap;
use rustc_hash::FxHashSet;

use super::cache::{DEFAULT_CACHE_CAPACITY, ObjectCache};
use super::objstm::read_compressed;
use super::xref::{XrefEntry, XrefTable, read_classic_section, read_stream_records};
use crate::codec::filters::{FilterLimits, decode_filters, filter_chain};
use crate::crypt::{Decrypt, Decrypter, IDENTITY, Password, Security, create_decrypter};
use crate::error::{PdfError, Result};
use crate::model::objects::{Dictionary, Name, ObjectId, ObjectOrigin, PdfObject, PdfStream, dict_get};
use crate::parser::object_parser::{ObjectParser, Resolve};
use crate::utils::decode_text;

/// `%PDF-major.minor` from the header, possibly raised by the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Version {
    pub major: u8,
    pub minor: u8,
}

impl Version {
    pub const DEFAULT: Self = Self { major: 1, minor: 4 };

    /// Names honour `#hh` escapes from PDF 1.2 on.
    pub fn hex_names(self) -> bool {
        self > Self { major: 1, minor: 1 }
    }

    fn parse(bytes: &[u8]) -> Option<Self> {
        match bytes {
            [major @ b'0'..=b'9', b'.', minor @ b'0'..=b'9', ..] => Some(Self {
                major: major - b'0',
                minor: minor - b'0',
            }),
            _ => None,
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

#[derive(Debug, Clone)]
pub struct DocumentOptions {
    /// Number of parsed objects kept in the LRU cache; 0 disables it.
    pub cache_capacity: usize,
}

impl Default for DocumentOptions {
    fn default() -> Self {
        Self {
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

pub struct Document {
    data: Bytes,
    version: Version,
    xref: XrefTable,
    trailer: Dictionary,
    root: Dictionary,
    info: Option<Dictionary>,
    encrypt: Option<Dictionary>,
    encrypt_id: Option<ObjectId>,
    decrypter: Decrypter,
    encrypt_metadata: bool,
    printable: bool,
    saveable: bool,
    /// False until the whole xref chain is merged; an id missing from a
    /// partial table must not be cached as `Null`.
    xref_complete: bool,
    cache: Mutex<ObjectCache>,
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("len", &self.data.len())
            .field("version", &self.version)
            .field("objects", &self.xref.len())
            .field("encrypted", &self.is_encrypted())
            .finish()
    }
}

/// Trailer values collected while walking the revision chain, newest first.
#[derive(Default)]
struct TrailerChain {
    newest: Option<Dictionary>,
    root: Option<PdfObject>,
    info: Option<ObjectId>,
    encrypt: Option<(Option<ObjectId>, Dictionary)>,
    pending_encrypt: Option<PdfObject>,
    id0: Option<Vec<u8>>,
}

/// Find the offset that follows the last `startxref` keyword.
///
/// The file is searched backward in 32-byte windows that overlap by 10
/// bytes, so a keyword straddling two windows is still found.
pub fn find_startxref(data: &[u8]) -> Result<usize> {
    const WINDOW: usize = 32;
    const OVERLAP: usize = 10;
    const KEYWORD: &[u8] = b"startxref";

    let mut end = data.len();
    let found = loop {
        let start = end.saturating_sub(WINDOW);
        if let Some(i) = data[start..end]
            .windows(KEYWORD.len())
            .rposition(|w| w == KEYWORD)
        {
            break Some(start + i);
        }
        if start == 0 {
            break None;
        }
        end = start + OVERLAP;
    };
    let not_pdf = || PdfError::format(0, "not a PDF file: no startxref");
    let pos = found.ok_or_else(not_pdf)? + KEYWORD.len();

    let rest = &data[pos..];
    let digits_start = rest
        .iter()
        .position(|b| !matches!(b, b' ' | b'\t' | b'\r' | b'\n'))
        .ok_or_else(not_pdf)?;
    let digits = rest[digits_start..]
        .iter()
        .take_while(|b| b.is_ascii_digit())
        .fold(Some(0usize), |acc, &b| {
            acc?.checked_mul(10)?.checked_add((b - b'0') as usize)
        });
    match digits {
        Some(offset) if rest[digits_start].is_ascii_digit() => Ok(offset),
        _ => Err(PdfError::format(pos, "startxref is not followed by an offset")),
    }
}

/// Version from a `%PDF-x.y` header near the start of the file.
fn header_version(data: &[u8]) -> Option<Version> {
    let head = &data[..data.len().min(1024)];
    let at = head.windows(5).position(|w| w == b"%PDF-")?;
    Version::parse(&head[at + 5..])
}

thread_local! {
    static RESOLVING: RefCell<FxHashSet<ObjectId>> = RefCell::new(FxHashSet::default());
}

struct ResolvingGuard {
    id: ObjectId,
}

impl ResolvingGuard {
    fn enter(id: ObjectId) -> Result<Self> {
        let fresh = RESOLVING.with(|set| set.borrow_mut().insert(id));
        if fresh {
            Ok(Self { id })
        } else {
            Err(PdfError::runtime(format!("circular reference to object {id}")))
        }
    }
}

impl Drop for ResolvingGuard {
    fn drop(&mut self) {
        RESOLVING.with(|set| {
            set.borrow_mut().remove(&self.id);
        });
    }
}

impl Document {
    pub fn load(data: impl Into<Bytes>, password: impl Into<Password>) -> Result<Self> {
        Self::load_with_options(data, password, DocumentOptions::default())
    }

    /// Load a memory-mapped file without copying it.
    pub fn from_mmap(mmap: Mmap, password: impl Into<Password>) -> Result<Self> {
        Self::load(Bytes::from_owner(mmap), password)
    }

    pub fn load_with_options(
        data: impl Into<Bytes>,
        password: impl Into<Password>,
        options: DocumentOptions,
    ) -> Result<Self> {
        let data = data.into();
        let password = password.into();
        let mut doc = Self {
            version: header_version(&data).unwrap_or(Version::DEFAULT),
            data,
            xref: XrefTable::new(),
            trailer: Dictionary::default(),
            root: Dictionary::default(),
            info: None,
            encrypt: None,
            encrypt_id: None,
            decrypter: Decrypter::Identity,
            encrypt_metadata: true,
            printable: true,
            saveable: true,
            xref_complete: false,
            cache: Mutex::new(ObjectCache::new(options.cache_capacity)),
        };

        let startxref = find_startxref(&doc.data)?;
        let chain = doc.load_xref_chain(startxref)?;
        doc.xref_complete = true;
        tracing::debug!(objects = doc.xref.len(), version = %doc.version, "xref chain merged");

        let encrypt = match (chain.encrypt, chain.pending_encrypt) {
            (Some(found), _) => Some(found),
            (None, Some(pending)) => Some(doc.resolve_encrypt(&pending)?),
            (None, None) => None,
        };
        if let Some((id, dict)) = &encrypt {
            doc.encrypt_id = *id;
            doc.install_security(dict, chain.id0.as_deref(), &password)?;
        }
        doc.encrypt = encrypt.map(|(_, dict)| dict);

        let root = chain
            .root
            .ok_or_else(|| PdfError::runtime("document has no /Root"))?;
        doc.root = match doc.resolve(&root)? {
            PdfObject::Dict(dict) => dict,
            other => {
                return Err(PdfError::runtime(format!(
                    "/Root is a {}, not a dictionary",
                    other.type_name()
                )));
            }
        };
        if let Some(info) = chain.info {
            doc.info = doc.dereference(info)?.as_dict().ok().cloned();
        }
        if let Some(Ok(name)) = doc.root.get(&Name::new("Version")).map(PdfObject::as_name)
            && let Some(version) = Version::parse(name.as_str().as_bytes())
            && version > doc.version
        {
            doc.version = version;
        }
        doc.trailer = chain.newest.unwrap_or_default();
        Ok(doc)
    }

    fn load_xref_chain(&mut self, startxref: usize) -> Result<TrailerChain> {
        let mut chain = TrailerChain::default();
        let mut visited = FxHashSet::default();
        let mut next = Some(startxref);

        while let Some(pos) = next {
            if !visited.insert(pos) {
                tracing::debug!(pos, "xref chain revisits an offset");
                break;
            }
            let trailer = self.read_xref_section(pos, &mut visited)?;
            self.absorb_trailer(&mut chain, &trailer)?;
            next = match dict_get(&trailer, "Prev") {
                Some(prev) => Some(
                    usize::try_from(prev.as_int()?)
                        .map_err(|_| PdfError::format(pos, "negative /Prev offset"))?,
                ),
                None => None,
            };
            if chain.newest.is_none() {
                chain.newest = Some(trailer);
            }
        }
        Ok(chain)
    }

    fn read_xref_section(&mut self, pos: usize, visited: &mut FxHashSet<usize>) -> Result<Dictionary> {
        if pos >= self.data.len() {
            return Err(PdfError::format(pos, "xref offset is beyond the end of the file"));
        }
        let data = self.data.clone();
        let mut parser = ObjectParser::new(&data, pos).hex_names(self.version.hex_names());
        if !parser.eat_keyword(b"xref") {
            return self.read_xref_stream(pos);
        }

        let trailer = read_classic_section(&mut parser, &mut self.xref)?;
        if let Some(stm) = dict_get(&trailer, "XRefStm").and_then(|o| o.as_int().ok())
            && let Ok(stm) = usize::try_from(stm)
            && visited.insert(stm)
            && let Err(err) = self.read_xref_stream(stm)
        {
            tracing::warn!(%err, offset = stm, "ignoring unreadable /XRefStm");
        }
        Ok(trailer)
    }

    /// Merge the cross-reference stream at `pos`; returns its dictionary.
    fn read_xref_stream(&mut self, pos: usize) -> Result<Dictionary> {
        let data = self.data.clone();
        let (_, obj) = ObjectParser::new(&data, pos)
            .hex_names(self.version.hex_names())
            .with_resolver(&*self)
            .read_indirect_object()?;
        let PdfObject::Stream(stream) = obj else {
            return Err(PdfError::format(pos, "xref offset points at a non-stream object"));
        };
        // Cross-reference streams are never encrypted.
        let steps = filter_chain(stream.get("Filter"), stream.get("DecodeParms"))?;
        let decoded = decode_filters(stream.raw().clone(), &steps, &FilterLimits::none())?;
        read_stream_records(&decoded, &stream.dict, &mut self.xref)?;
        Ok(stream.dict.clone())
    }

    fn absorb_trailer(&self, chain: &mut TrailerChain, trailer: &Dictionary) -> Result<()> {
        if chain.root.is_none() {
            chain.root = dict_get(trailer, "Root").cloned();
        }
        if chain.info.is_none()
            && let Some(info) = dict_get(trailer, "Info")
        {
            chain.info = Some(
                info.as_ref_id()
                    .ok_or_else(|| PdfError::format(0, "trailer /Info is not an indirect reference"))?,
            );
        }
        if chain.id0.is_none()
            && let Some(PdfObject::Array(ids)) = dict_get(trailer, "ID")
            && let Some(PdfObject::String(first)) = ids.first()
        {
            chain.id0 = Some(first.clone());
        }
        if chain.encrypt.is_none()
            && let Some(encrypt) = dict_get(trailer, "Encrypt")
        {
            let (id, dict) = self.resolve_encrypt(encrypt)?;
            if dict_get(&dict, "Filter").is_some() {
                chain.encrypt = Some((id, dict));
                chain.pending_encrypt = None;
            } else {
                tracing::warn!("deferring /Encrypt without /Filter to an older trailer");
                chain.pending_encrypt.get_or_insert_with(|| encrypt.clone());
            }
        }
        Ok(())
    }

    /// Resolve `/Encrypt` and its direct entries.
    fn resolve_encrypt(&self, encrypt: &PdfObject) -> Result<(Option<ObjectId>, Dictionary)> {
        let id = encrypt.as_ref_id();
        let dict = match self.resolve(encrypt)? {
            PdfObject::Dict(dict) => dict,
            PdfObject::Null => Dictionary::default(),
            other => {
                return Err(PdfError::TypeError {
                    expected: "dict",
                    got: other.type_name(),
                });
            }
        };
        let mut resolved = Dictionary::default();
        for (key, value) in dict {
            resolved.insert(key, self.resolve(&value)?);
        }
        Ok((id, resolved))
    }

    fn install_security(&mut self, encrypt: &Dictionary, id0: Option<&[u8]>, password: &Password) -> Result<()> {
        let Security {
            decrypter,
            permissions,
            encrypt_metadata,
        } = create_decrypter(Some(encrypt), id0, password)?;

        if let Some(p) = permissions
            && !decrypter.is_owner_authorised()
        {
            self.printable = p & 4 != 0;
            self.saveable = p & 16 != 0;
        }
        self.encrypt_metadata = encrypt_metadata;
        self.decrypter = decrypter;
        // Objects parsed during loading were read without the decrypter.
        self.clear_cache();
        Ok(())
    }

    pub fn clear_cache(&self) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.clear();
        }
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub const fn version(&self) -> Version {
        self.version
    }

    pub const fn root(&self) -> &Dictionary {
        &self.root
    }

    pub const fn info(&self) -> Option<&Dictionary> {
        self.info.as_ref()
    }

    /// The newest trailer dictionary.
    pub const fn trailer(&self) -> &Dictionary {
        &self.trailer
    }

    pub const fn encrypt_dict(&self) -> Option<&Dictionary> {
        self.encrypt.as_ref()
    }

    pub const fn decrypter(&self) -> &Decrypter {
        &self.decrypter
    }

    pub fn is_encrypted(&self) -> bool {
        self.decrypter.is_encrypted()
    }

    pub fn is_owner_authorised(&self) -> bool {
        self.decrypter.is_owner_authorised()
    }

    pub const fn is_printable(&self) -> bool {
        self.printable
    }

    pub const fn is_saveable(&self) -> bool {
        self.saveable
    }

    pub fn xref_entries(&self) -> impl Iterator<Item = (u32, XrefEntry)> + '_ {
        self.xref.iter()
    }

    /// Ids of every in-use or compressed object, in object-number order.
    pub fn object_ids(&self) -> Vec<ObjectId> {
        self.xref
            .iter()
            .filter_map(|(num, entry)| match entry {
                XrefEntry::Free => None,
                XrefEntry::InUse { generation, .. } => Some(ObjectId::new(num, generation)),
                XrefEntry::Compressed { .. } => Some(ObjectId::new(num, 0)),
            })
            .collect()
    }

    /// Text value of an `/Info` entry.
    pub fn string_metadata(&self, key: &str) -> Result<Option<String>> {
        let Some(info) = &self.info else {
            return Ok(None);
        };
        match dict_get(info, key) {
            Some(value) => match self.resolve(value)? {
                PdfObject::String(bytes) => Ok(Some(decode_text(&bytes))),
                PdfObject::Null => Ok(None),
                other => Err(PdfError::TypeError {
                    expected: "string",
                    got: other.type_name(),
                }),
            },
            None => Ok(None),
        }
    }

    pub fn metadata_keys(&self) -> Vec<Name> {
        let mut keys: Vec<Name> = self
            .info
            .as_ref()
            .map(|info| info.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }

    /// Parse (or fetch from the cache) the object with `id`.
    ///
    /// Missing, free and out-of-range entries dereference to `Null`.
    pub fn dereference_shared(&self, id: ObjectId) -> Result<Arc<PdfObject>> {
        if let Ok(mut cache) = self.cache.lock()
            && let Some(obj) = cache.get(id)
        {
            return Ok(obj);
        }
        let _guard = ResolvingGuard::enter(id)?;

        let obj = match self.xref.get(id.num) {
            None | Some(XrefEntry::Free) => PdfObject::Null,
            Some(XrefEntry::InUse { offset, .. }) => self.parse_at(offset, id)?,
            Some(XrefEntry::Compressed { container, index }) => {
                read_compressed(self, container, index, id)?
            }
        };
        tracing::debug!(object = %id, kind = obj.type_name(), "parsed object");

        let obj = Arc::new(obj);
        if self.xref_complete
            && let Ok(mut cache) = self.cache.lock()
        {
            cache.insert(id, Arc::clone(&obj));
        }
        Ok(obj)
    }

    pub fn dereference(&self, id: ObjectId) -> Result<PdfObject> {
        Ok((*self.dereference_shared(id)?).clone())
    }

    fn parse_at(&self, offset: usize, id: ObjectId) -> Result<PdfObject> {
        if offset >= self.data.len() {
            tracing::debug!(object = %id, offset, "xref offset out of range");
            return Ok(PdfObject::Null);
        }
        let decrypter = if Some(id) == self.encrypt_id {
            &IDENTITY
        } else {
            &self.decrypter
        };
        let (found, obj) = ObjectParser::new(&self.data, offset)
            .hex_names(self.version.hex_names())
            .with_decrypter(decrypter)
            .with_resolver(self)
            .read_indirect_object()?;
        if found.num != id.num {
            tracing::warn!(expected = %id, %found, "xref entry points at another object");
            return Ok(PdfObject::Null);
        }
        Ok(obj)
    }

    /// Follow references until a direct value is reached.
    pub fn resolve(&self, obj: &PdfObject) -> Result<PdfObject> {
        let mut current = obj.clone();
        let mut hops = 0;
        while let PdfObject::Ref(id) = current {
            hops += 1;
            if hops > 32 {
                return Err(PdfError::runtime(format!("reference chain through {id} is too long")));
            }
            current = self.dereference(id)?;
        }
        Ok(current)
    }

    /// Decoded payload of `stream` with the full filter chain applied.
    pub fn decode_stream(&self, stream: &PdfStream) -> Result<Bytes> {
        self.decode_stream_with_limits(stream, &FilterLimits::none())
    }

    /// Decrypt `stream` if needed and run its filters, stopping before any
    /// filter named in `limits`. Results are cached on the stream.
    pub fn decode_stream_with_limits(&self, stream: &PdfStream, limits: &FilterLimits) -> Result<Bytes> {
        if let Some(cached) = stream.cached_decode(limits) {
            return Ok(cached);
        }

        let filter = stream.get("Filter").map(|f| self.resolve_elements(f)).transpose()?;
        let parms = stream.get("DecodeParms").map(|p| self.resolve_elements(p)).transpose()?;
        let steps = filter_chain(filter.as_ref(), parms.as_ref())?;

        let raw = stream.raw().clone();
        let data = match self.stream_owner(stream) {
            Some(owner) => {
                // A /Crypt step without /Name selects the Identity filter.
                let crypt = steps.iter().find(|s| s.name == "Crypt").map(|s| {
                    s.parms
                        .as_ref()
                        .and_then(|p| dict_get(p, "Name"))
                        .and_then(|n| n.as_name().ok())
                        .unwrap_or_else(|| Name::new("Identity"))
                });
                match crypt {
                    Some(name) if name == "Identity" => raw,
                    crypt => self.decrypter.decrypt_buffer(crypt, Some(owner), raw)?,
                }
            }
            None => raw,
        };

        let decoded = decode_filters(data, &steps, limits)?;
        stream.store_decode(limits.clone(), decoded.clone());
        Ok(decoded)
    }

    /// The object whose key decrypts `stream`, or `None` when the stream
    /// is stored in the clear.
    fn stream_owner(&self, stream: &PdfStream) -> Option<ObjectId> {
        let ObjectOrigin::Indirect(id) = stream.origin() else {
            return None;
        };
        if Some(id) == self.encrypt_id {
            return None;
        }
        match stream.get("Type").and_then(|t| t.as_name().ok()) {
            Some(t) if t == "XRef" => None,
            Some(t) if t == "Metadata" && !self.encrypt_metadata => None,
            _ => Some(id),
        }
    }

    /// Resolve `obj` and, if it is an array, each of its elements.
    fn resolve_elements(&self, obj: &PdfObject) -> Result<PdfObject> {
        match self.resolve(obj)? {
            PdfObject::Array(items) => items
                .iter()
                .map(|item| self.resolve(item))
                .collect::<Result<Vec<_>>>()
                .map(PdfObject::Array),
            other => Ok(other),
        }
    }
}

impl Resolve for Document {
    fn resolve(&self, obj: &PdfObject) -> Result<PdfObject> {
        Document::resolve(self, obj)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_startxref_at_tail() {
        let data = b"%PDF-1.4\n...\nstartxref\n1234\n%%EOF\n";
        assert_eq!(find_startxref(data).unwrap(), 1234);
    }

    #[test]
    fn test_find_startxref_in_earlier_window() {
        let mut data = b"%PDF-1.7\nstartxref\r\n  77\r\n%%EOF".to_vec();
        data.extend(std::iter::repeat_n(b' ', 27));
        assert_eq!(find_startxref(&data).unwrap(), 77);
    }

    #[test]
    fn test_missing_startxref_is_not_a_pdf() {
        let err = find_startxref(b"hello world, this is not a pdf at all").unwrap_err();
        assert!(err.to_string().contains("not a PDF file"));
    }

    #[test]
    fn test_startxref_without_digits_is_format_error() {
        assert!(find_startxref(b"startxref\nxyz").is_err());
    }

    #[test]
    fn test_header_version() {
        assert_eq!(header_version(b"%PDF-1.7\n"), Some(Version { major: 1, minor: 7 }));
        assert_eq!(header_version(b"junk\n%PDF-1.1\n"), Some(Version { major: 1, minor: 1 }));
        assert_eq!(header_version(b"nothing"), None);
        assert!(!Version { major: 1, minor: 1 }.hex_names());
        assert!(Version::DEFAULT.hex_names());
    }
}
