//! File header, attribute section and event-type section

use crate::domain::{ExtractError, LoadError};
use byteorder::{LittleEndian, ReadBytesExt};
use perfscope_common::{
    PerfFileHeader, PerfFileSection, ATTR_CONFIG_OFFSET, ATTR_FLAG_SAMPLE_ID_ALL,
    ATTR_OPTIONS_OFFSET, ATTR_READ_FORMAT_OFFSET, ATTR_SAMPLE_TYPE_OFFSET, ATTR_SIZE_OFFSET,
    EVENT_TYPE_ENTRY_SIZE, MAX_EVENT_NAME, PERF_ATTR_SIZE_VER0, PERF_FILE_MAGIC,
    PERF_FILE_SECTION_SIZE, PERF_SAMPLE_READ,
};
use std::io::{self, Read, Seek, SeekFrom};

/// One event attribute, as recorded in the attribute section
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EventAttribute {
    pub config: u64,
    pub sample_type: u64,
    pub read_format: u64,
    /// Option bitfield (`disabled`, `inherit`, ..., `sample_id_all`, ...)
    pub options: u64,
    /// Sample ids written by the kernel for this attribute
    pub ids: Vec<u64>,
    /// Name from the event-type section, when present
    pub name: Option<String>,
}

impl EventAttribute {
    #[must_use]
    pub fn sample_id_all(&self) -> bool {
        self.options & ATTR_FLAG_SAMPLE_ID_ALL != 0
    }
}

/// Maps an I/O error to a truncation error naming the section being read
pub(crate) fn truncated(what: &'static str) -> impl FnOnce(io::Error) -> LoadError {
    move |err| {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            LoadError::Truncated(what)
        } else {
            LoadError::Io(err)
        }
    }
}

/// Fails with `Truncated(what)` unless `section` lies inside the stream
fn ensure_in_stream<R: Seek>(
    reader: &mut R,
    section: PerfFileSection,
    what: &'static str,
) -> Result<(), LoadError> {
    let stream_len = reader.seek(SeekFrom::End(0))?;
    match section.offset.checked_add(section.size) {
        Some(end) if end <= stream_len => Ok(()),
        _ => Err(LoadError::Truncated(what)),
    }
}

fn read_section<R: Read>(reader: &mut R) -> io::Result<PerfFileSection> {
    let offset = reader.read_u64::<LittleEndian>()?;
    let size = reader.read_u64::<LittleEndian>()?;
    Ok(PerfFileSection { offset, size })
}

/// Read and validate the fixed file header
///
/// # Errors
/// Fails on a short read or when the magic is not `PERFILE2`
pub fn read_file_header<R: Read>(reader: &mut R) -> Result<PerfFileHeader, LoadError> {
    let mut magic = [0u8; 8];
    reader.read_exact(&mut magic).map_err(truncated("file header"))?;
    if magic != PERF_FILE_MAGIC {
        return Err(LoadError::BadMagic(magic));
    }

    let fields = (|| -> io::Result<PerfFileHeader> {
        let size = reader.read_u64::<LittleEndian>()?;
        let attr_size = reader.read_u64::<LittleEndian>()?;
        let attrs = read_section(reader)?;
        let data = read_section(reader)?;
        let event_types = read_section(reader)?;
        let mut flags = [0u64; 4];
        reader.read_u64_into::<LittleEndian>(&mut flags)?;
        Ok(PerfFileHeader { magic, size, attr_size, attrs, data, event_types, flags })
    })();

    fields.map_err(truncated("file header"))
}

fn u32_at(buf: &[u8], offset: usize) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&buf[offset..offset + 4]);
    u32::from_le_bytes(bytes)
}

fn u64_at(buf: &[u8], offset: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&buf[offset..offset + 8]);
    u64::from_le_bytes(bytes)
}

/// Read the attribute section and the correlated ids of every attribute
///
/// Validates record sizing, a common sample format across attributes, and
/// the `sample_id_all` option. Nothing from the data section is touched.
///
/// # Errors
/// Any sizing or consistency violation aborts the load
pub fn read_attributes<R: Read + Seek>(
    reader: &mut R,
    header: &PerfFileHeader,
) -> Result<Vec<EventAttribute>, LoadError> {
    if header.attrs.size == 0 {
        return Err(LoadError::NoAttributes);
    }

    let attr_size = header.attr_size;
    let ids_section_size = PERF_FILE_SECTION_SIZE as u64;
    if attr_size < PERF_ATTR_SIZE_VER0 + ids_section_size {
        return Err(LoadError::AttrSizeTooSmall(attr_size));
    }
    if header.attrs.size % attr_size != 0 {
        return Err(LoadError::AttrSectionMisaligned {
            section_size: header.attrs.size,
            attr_size,
        });
    }

    ensure_in_stream(reader, header.attrs, "attribute section")?;
    let count = usize::try_from(header.attrs.size / attr_size)
        .map_err(|_| LoadError::Truncated("attribute section"))?;
    let record_len =
        usize::try_from(attr_size).map_err(|_| LoadError::AttrSizeTooSmall(attr_size))?;

    reader.seek(SeekFrom::Start(header.attrs.offset))?;

    let mut attributes = Vec::with_capacity(count);
    let mut id_sections = Vec::with_capacity(count);
    let mut buf = vec![0u8; record_len];

    for index in 0..count {
        reader.read_exact(&mut buf).map_err(truncated("attribute section"))?;

        let declared = u64::from(u32_at(&buf, ATTR_SIZE_OFFSET));
        if declared + ids_section_size != attr_size {
            return Err(LoadError::AttrSizeMismatch {
                index,
                declared,
                expected: attr_size - ids_section_size,
            });
        }

        let ids_at = record_len - PERF_FILE_SECTION_SIZE;
        id_sections.push(PerfFileSection {
            offset: u64_at(&buf, ids_at),
            size: u64_at(&buf, ids_at + 8),
        });

        attributes.push(EventAttribute {
            config: u64_at(&buf, ATTR_CONFIG_OFFSET),
            sample_type: u64_at(&buf, ATTR_SAMPLE_TYPE_OFFSET),
            read_format: u64_at(&buf, ATTR_READ_FORMAT_OFFSET),
            options: u64_at(&buf, ATTR_OPTIONS_OFFSET),
            ids: Vec::new(),
            name: None,
        });
    }

    validate_attributes(&attributes)?;

    for (attribute, section) in attributes.iter_mut().zip(&id_sections) {
        if section.size == 0 {
            continue;
        }
        ensure_in_stream(reader, *section, "attribute ids")?;
        reader.seek(SeekFrom::Start(section.offset))?;
        let count = usize::try_from(section.size / 8)
            .map_err(|_| LoadError::Truncated("attribute ids"))?;
        let mut ids = vec![0u64; count];
        reader
            .read_u64_into::<LittleEndian>(&mut ids)
            .map_err(truncated("attribute ids"))?;
        attribute.ids = ids;
    }

    Ok(attributes)
}

fn validate_attributes(attributes: &[EventAttribute]) -> Result<(), LoadError> {
    let Some(first) = attributes.first() else {
        return Err(LoadError::NoAttributes);
    };

    for (index, attribute) in attributes.iter().enumerate() {
        if attribute.sample_type != first.sample_type {
            return Err(LoadError::MixedSampleFormat {
                first: first.sample_type,
                found: attribute.sample_type,
            });
        }
        if !attribute.sample_id_all() {
            return Err(LoadError::MissingSampleIdAll(index));
        }
    }

    if first.sample_type & PERF_SAMPLE_READ != 0 {
        return Err(ExtractError::ReadGroupUnsupported.into());
    }

    Ok(())
}

/// Read the optional event-type section and attach names to attributes
///
/// # Errors
/// Fails on a misaligned section or an entry matching no attribute's `config`
pub fn read_event_types<R: Read + Seek>(
    reader: &mut R,
    header: &PerfFileHeader,
    attributes: &mut [EventAttribute],
) -> Result<(), LoadError> {
    let section = header.event_types;
    if section.size == 0 {
        return Ok(());
    }
    if section.size % EVENT_TYPE_ENTRY_SIZE as u64 != 0 {
        return Err(LoadError::EventTypesMisaligned(section.size));
    }

    reader.seek(SeekFrom::Start(section.offset))?;

    for _ in 0..section.size / EVENT_TYPE_ENTRY_SIZE as u64 {
        let event_id = reader.read_u64::<LittleEndian>().map_err(truncated("event types"))?;
        let mut raw_name = [0u8; MAX_EVENT_NAME];
        reader.read_exact(&mut raw_name).map_err(truncated("event types"))?;
        let name = c_string(&raw_name);

        let Some(attribute) = attributes.iter_mut().find(|a| a.config == event_id) else {
            return Err(LoadError::UnmatchedEventType { event_id, name });
        };
        attribute.name = Some(name);
    }

    Ok(())
}

/// Bytes up to the first NUL, lossily decoded
pub(crate) fn c_string(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}
