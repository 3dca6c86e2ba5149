//! Whole-file decoder
//!
//! Reads the sections in dependency order: header, attributes, event types,
//! then the data section. A load either produces a complete [`ParsedFile`]
//! or an error; nothing partial escapes.

use super::header::{c_string, read_attributes, read_event_types, read_file_header, truncated};
use super::records::{
    MmapRecord, Mmap2Record, Record, RecordBody, RecordCommon, RecordKind, SampleRecord,
    TaskRecord,
};
use super::sample_extractor::{SampleExtractor, SampleFields};
use super::EventAttribute;
use crate::domain::{CpuId, LoadError, Pid, Tid, Timestamp};
use crate::logging::SessionLog;
use byteorder::{LittleEndian, ReadBytesExt};
use perfscope_common::{PerfFileHeader, PERF_EVENT_HEADER_SIZE};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek, SeekFrom};
use std::path::Path;

/// Everything decoded from one perf file
#[derive(Debug, Clone)]
pub struct ParsedFile {
    pub header: PerfFileHeader,
    pub attributes: Vec<EventAttribute>,
    /// Supported records, stably sorted by timestamp
    pub records: Vec<Record>,
    /// Records of unsupported types that were stepped over
    pub skipped_records: u64,
}

pub struct FileParser {
    log: SessionLog,
}

impl FileParser {
    #[must_use]
    pub fn new(log: SessionLog) -> Self {
        Self { log }
    }

    /// Open and decode a perf file from disk
    ///
    /// # Errors
    /// Returns the first fatal decode error, or an I/O error opening the file
    pub fn parse_file(&self, path: &Path) -> Result<ParsedFile, LoadError> {
        let file = File::open(path)?;
        self.log.info(format_args!("Loading perf file {}", path.display()));
        self.parse(&mut BufReader::new(file))
    }

    /// Decode a perf file from any seekable reader
    ///
    /// # Errors
    /// Returns the first fatal decode error
    pub fn parse<R: Read + Seek>(&self, reader: &mut R) -> Result<ParsedFile, LoadError> {
        let header = read_file_header(reader)?;

        let mut attributes = read_attributes(reader, &header)?;
        read_event_types(reader, &header, &mut attributes)?;

        if header.data.is_empty() {
            return Err(LoadError::NoData);
        }

        let decoder = RecordDecoder::new(&attributes);
        let (mut records, skipped_records) = decoder.read_data_section(reader, &header)?;

        // Stable: records with equal timestamps keep file order.
        records.sort_by_key(|record| record.common.time);

        let samples = records.iter().filter(|r| r.kind() == RecordKind::Sample).count();
        self.log.info(format_args!(
            "Decoded {} records ({samples} samples, {skipped_records} skipped) across {} attribute(s)",
            records.len(),
            attributes.len()
        ));

        Ok(ParsedFile { header, attributes, records, skipped_records })
    }
}

struct RecordDecoder {
    extractor: SampleExtractor,
    id_to_attr: HashMap<u64, usize>,
    single_attr: bool,
}

impl RecordDecoder {
    fn new(attributes: &[EventAttribute]) -> Self {
        // Attributes all share one sample format by the time we get here.
        let sample_type = attributes.first().map_or(0, |a| a.sample_type);
        let id_to_attr = attributes
            .iter()
            .enumerate()
            .flat_map(|(index, attr)| attr.ids.iter().map(move |&id| (id, index)))
            .collect();
        Self {
            extractor: SampleExtractor::new(sample_type),
            id_to_attr,
            single_attr: attributes.len() == 1,
        }
    }

    fn correlate(&self, sample_id: Option<u64>) -> Option<usize> {
        match sample_id.and_then(|id| self.id_to_attr.get(&id)) {
            Some(&index) => Some(index),
            None if self.single_attr => Some(0),
            None => None,
        }
    }

    fn read_data_section<R: Read + Seek>(
        &self,
        reader: &mut R,
        header: &PerfFileHeader,
    ) -> Result<(Vec<Record>, u64), LoadError> {
        let section = header.data;
        reader.seek(SeekFrom::Start(section.offset))?;

        let mut records = Vec::new();
        let mut skipped = 0u64;
        let mut offset = section.offset;
        let mut sequence = 0u64;
        let prefix = PERF_EVENT_HEADER_SIZE as u64;

        while offset < section.end() {
            if section.end() - offset < prefix {
                return Err(LoadError::Truncated("data section"));
            }

            let record_type = reader.read_u32::<LittleEndian>().map_err(truncated("data section"))?;
            let misc = reader.read_u16::<LittleEndian>().map_err(truncated("data section"))?;
            let size = u64::from(reader.read_u16::<LittleEndian>().map_err(truncated("data section"))?);

            if size < prefix {
                return Err(LoadError::MalformedRecord {
                    index: sequence,
                    offset,
                    reason: format!("declared size {size} is smaller than the record header"),
                });
            }
            if offset + size > section.end() {
                return Err(LoadError::Truncated("data section"));
            }

            let payload_len = (size - prefix) as usize;
            match RecordKind::from_raw(record_type) {
                Some(kind) => {
                    let mut payload = vec![0u8; payload_len];
                    reader.read_exact(&mut payload).map_err(truncated("data section"))?;
                    let record = self
                        .decode(kind, misc, sequence, &payload)
                        .map_err(|err| match err {
                            LoadError::Truncated(what) => LoadError::MalformedRecord {
                                index: sequence,
                                offset,
                                reason: format!("{kind} record truncated while reading {what}"),
                            },
                            other => other,
                        })?;
                    records.push(record);
                }
                None => {
                    reader.seek(SeekFrom::Current(payload_len as i64))?;
                    skipped += 1;
                }
            }

            offset += size;
            sequence += 1;
        }

        Ok((records, skipped))
    }

    fn decode(
        &self,
        kind: RecordKind,
        misc: u16,
        sequence: u64,
        payload: &[u8],
    ) -> Result<Record, LoadError> {
        if kind == RecordKind::Sample {
            return self.decode_sample(misc, sequence, payload);
        }

        let trailer = self.extractor.extract_trailer(payload)?;
        let body_bytes = &payload[..payload.len() - self.extractor.trailer_len()];
        let mut cursor = Cursor::new(body_bytes);
        let mut common = self.common(&trailer, misc, sequence);

        let body = match kind {
            RecordKind::Mmap => {
                read_pid_tid(&mut cursor, &mut common)?;
                let start = read_u64(&mut cursor)?;
                let length = read_u64(&mut cursor)?;
                let page_offset = read_u64(&mut cursor)?;
                let filename = rest_as_string(&cursor);
                RecordBody::Mmap(MmapRecord { start, length, page_offset, filename })
            }
            RecordKind::Mmap2 => {
                read_pid_tid(&mut cursor, &mut common)?;
                let start = read_u64(&mut cursor)?;
                let length = read_u64(&mut cursor)?;
                let page_offset = read_u64(&mut cursor)?;
                let major = read_u32(&mut cursor)?;
                let minor = read_u32(&mut cursor)?;
                let inode = read_u64(&mut cursor)?;
                let inode_generation = read_u64(&mut cursor)?;
                let protection = read_u32(&mut cursor)?;
                let flags = read_u32(&mut cursor)?;
                let filename = rest_as_string(&cursor);
                RecordBody::Mmap2(Mmap2Record {
                    start,
                    length,
                    page_offset,
                    major,
                    minor,
                    inode,
                    inode_generation,
                    protection,
                    flags,
                    filename,
                })
            }
            RecordKind::Comm => {
                read_pid_tid(&mut cursor, &mut common)?;
                RecordBody::Comm { name: rest_as_string(&cursor) }
            }
            RecordKind::Fork | RecordKind::Exit => {
                let pid = read_u32(&mut cursor)?;
                let parent_pid = read_u32(&mut cursor)?;
                let tid = read_u32(&mut cursor)?;
                let parent_tid = read_u32(&mut cursor)?;
                let time = read_u64(&mut cursor)?;
                common.pid = Pid(pid);
                common.tid = Tid(tid);
                if trailer.time.is_none() {
                    common.time = Timestamp(time);
                }
                let task = TaskRecord { parent_pid: Pid(parent_pid), parent_tid: Tid(parent_tid) };
                if kind == RecordKind::Fork {
                    RecordBody::Fork(task)
                } else {
                    RecordBody::Exit(task)
                }
            }
            RecordKind::Sample => return self.decode_sample(misc, sequence, payload),
        };

        Ok(Record { common, body })
    }

    fn decode_sample(&self, misc: u16, sequence: u64, payload: &[u8]) -> Result<Record, LoadError> {
        let fields = self.extractor.extract_sample(payload)?;
        let common = self.common(&fields, misc, sequence);
        let body = RecordBody::Sample(SampleRecord {
            ip: fields.ip.unwrap_or(0),
            period: fields.period.unwrap_or(1),
            callchain: fields.callchain,
            addr: fields.addr,
            stream_id: fields.stream_id,
            raw: fields.raw,
        });
        Ok(Record { common, body })
    }

    fn common(&self, fields: &SampleFields, misc: u16, sequence: u64) -> RecordCommon {
        let sample_id = fields.sample_id();
        RecordCommon {
            pid: Pid(fields.pid.unwrap_or(0)),
            tid: Tid(fields.tid.unwrap_or(0)),
            cpu: CpuId(fields.cpu.unwrap_or(0)),
            time: Timestamp(fields.time.unwrap_or(0)),
            sequence,
            sample_id,
            attr_index: self.correlate(sample_id),
            misc,
        }
    }
}

fn read_pid_tid(cursor: &mut Cursor<&[u8]>, common: &mut RecordCommon) -> Result<(), LoadError> {
    common.pid = Pid(read_u32(cursor)?);
    common.tid = Tid(read_u32(cursor)?);
    Ok(())
}

fn read_u32(cursor: &mut Cursor<&[u8]>) -> Result<u32, LoadError> {
    cursor.read_u32::<LittleEndian>().map_err(truncated("record body"))
}

fn read_u64(cursor: &mut Cursor<&[u8]>) -> Result<u64, LoadError> {
    cursor.read_u64::<LittleEndian>().map_err(truncated("record body"))
}

fn rest_as_string(cursor: &Cursor<&[u8]>) -> String {
    let bytes = cursor.get_ref();
    let start = usize::try_from(cursor.position()).map_or(bytes.len(), |p| p.min(bytes.len()));
    c_string(&bytes[start..])
}
