//! Decoding of the variable-layout sample payload
//!
//! Which fields a sample carries is decided at record time by the attribute's
//! `sample_type` bitmask. The kernel writes the selected fields in one fixed
//! order, so the decoder walks an ordered table of `(flag, step)` pairs and
//! runs only the steps whose flag is set.
//!
//! ```text
//! SAMPLE payload                     sample_id_all trailer (non-sample records)
//! ┌──────────────────────┐           ┌──────────────────────┐
//! │ identifier   (bit 16)│           │ pid, tid     (bit 1) │
//! │ ip           (bit 0) │           │ time         (bit 2) │
//! │ pid, tid     (bit 1) │           │ id           (bit 6) │
//! │ time         (bit 2) │           │ stream id    (bit 9) │
//! │ addr         (bit 3) │           │ cpu, res     (bit 7) │
//! │ id           (bit 6) │           │ identifier   (bit 16)│
//! │ stream id    (bit 9) │           └──────────────────────┘
//! │ cpu, res     (bit 7) │            located at the end of
//! │ period       (bit 8) │            the record payload
//! │ read         (bit 4) │  unsupported
//! │ callchain    (bit 5) │  u64 nr + nr × u64
//! │ raw          (bit 10)│  u32 size + bytes, padded to 8
//! └──────────────────────┘
//! ```

use crate::domain::ExtractError;
use byteorder::{LittleEndian, ReadBytesExt};
use perfscope_common::{
    PERF_SAMPLE_ADDR, PERF_SAMPLE_CALLCHAIN, PERF_SAMPLE_CPU, PERF_SAMPLE_ID,
    PERF_SAMPLE_IDENTIFIER, PERF_SAMPLE_IP, PERF_SAMPLE_PERIOD, PERF_SAMPLE_RAW,
    PERF_SAMPLE_READ, PERF_SAMPLE_STREAM_ID, PERF_SAMPLE_TID, PERF_SAMPLE_TIME,
};
use std::io::{Cursor, Read, Seek, SeekFrom};

/// Optional fields decoded from a payload; absent fields stay `None`/empty
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SampleFields {
    pub identifier: Option<u64>,
    pub ip: Option<u64>,
    pub pid: Option<u32>,
    pub tid: Option<u32>,
    pub time: Option<u64>,
    pub addr: Option<u64>,
    pub id: Option<u64>,
    pub stream_id: Option<u64>,
    pub cpu: Option<u32>,
    pub period: Option<u64>,
    pub callchain: Vec<u64>,
    pub raw: Vec<u8>,
}

impl SampleFields {
    /// Sample id used to correlate the record with its attribute
    #[must_use]
    pub fn sample_id(&self) -> Option<u64> {
        self.identifier.or(self.id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecodeStep {
    Identifier,
    Ip,
    PidTid,
    Time,
    Addr,
    Id,
    StreamId,
    Cpu,
    Period,
    Read,
    Callchain,
    Raw,
}

const SAMPLE_LAYOUT: [(u64, DecodeStep); 12] = [
    (PERF_SAMPLE_IDENTIFIER, DecodeStep::Identifier),
    (PERF_SAMPLE_IP, DecodeStep::Ip),
    (PERF_SAMPLE_TID, DecodeStep::PidTid),
    (PERF_SAMPLE_TIME, DecodeStep::Time),
    (PERF_SAMPLE_ADDR, DecodeStep::Addr),
    (PERF_SAMPLE_ID, DecodeStep::Id),
    (PERF_SAMPLE_STREAM_ID, DecodeStep::StreamId),
    (PERF_SAMPLE_CPU, DecodeStep::Cpu),
    (PERF_SAMPLE_PERIOD, DecodeStep::Period),
    (PERF_SAMPLE_READ, DecodeStep::Read),
    (PERF_SAMPLE_CALLCHAIN, DecodeStep::Callchain),
    (PERF_SAMPLE_RAW, DecodeStep::Raw),
];

// Every trailer field is 8 bytes wide.
const TRAILER_LAYOUT: [(u64, DecodeStep); 6] = [
    (PERF_SAMPLE_TID, DecodeStep::PidTid),
    (PERF_SAMPLE_TIME, DecodeStep::Time),
    (PERF_SAMPLE_ID, DecodeStep::Id),
    (PERF_SAMPLE_STREAM_ID, DecodeStep::StreamId),
    (PERF_SAMPLE_CPU, DecodeStep::Cpu),
    (PERF_SAMPLE_IDENTIFIER, DecodeStep::Identifier),
];

/// Decodes payloads for one sample format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleExtractor {
    sample_type: u64,
}

impl SampleExtractor {
    #[must_use]
    pub fn new(sample_type: u64) -> Self {
        Self { sample_type }
    }

    fn has(&self, flag: u64) -> bool {
        self.sample_type & flag != 0
    }

    /// Decode the payload of a SAMPLE record
    ///
    /// # Errors
    /// Fails when the payload ends before a selected field, when the call
    /// chain claims more entries than remain, or when read values are requested
    pub fn extract_sample(&self, payload: &[u8]) -> Result<SampleFields, ExtractError> {
        let mut cursor = Cursor::new(payload);
        let mut fields = SampleFields::default();

        for (flag, step) in SAMPLE_LAYOUT {
            if self.has(flag) {
                apply_step(step, &mut cursor, &mut fields)?;
            }
        }

        Ok(fields)
    }

    /// Size in bytes of the `sample_id_all` trailer
    #[must_use]
    pub fn trailer_len(&self) -> usize {
        TRAILER_LAYOUT.iter().filter(|(flag, _)| self.has(*flag)).count() * 8
    }

    /// Decode the `sample_id_all` trailer at the end of a non-sample payload
    ///
    /// # Errors
    /// Fails when the payload is shorter than the trailer
    pub fn extract_trailer(&self, payload: &[u8]) -> Result<SampleFields, ExtractError> {
        let trailer_len = self.trailer_len();
        let start = payload
            .len()
            .checked_sub(trailer_len)
            .ok_or(ExtractError::Truncated("sample id trailer"))?;

        let mut cursor = Cursor::new(&payload[start..]);
        let mut fields = SampleFields::default();

        for (flag, step) in TRAILER_LAYOUT {
            if self.has(flag) {
                apply_step(step, &mut cursor, &mut fields)?;
            }
        }

        Ok(fields)
    }
}

fn apply_step(
    step: DecodeStep,
    cursor: &mut Cursor<&[u8]>,
    fields: &mut SampleFields,
) -> Result<(), ExtractError> {
    match step {
        DecodeStep::Identifier => fields.identifier = Some(read_u64(cursor, "identifier")?),
        DecodeStep::Ip => fields.ip = Some(read_u64(cursor, "ip")?),
        DecodeStep::PidTid => {
            fields.pid = Some(read_u32(cursor, "pid")?);
            fields.tid = Some(read_u32(cursor, "tid")?);
        }
        DecodeStep::Time => fields.time = Some(read_u64(cursor, "time")?),
        DecodeStep::Addr => fields.addr = Some(read_u64(cursor, "addr")?),
        DecodeStep::Id => fields.id = Some(read_u64(cursor, "id")?),
        DecodeStep::StreamId => fields.stream_id = Some(read_u64(cursor, "stream id")?),
        DecodeStep::Cpu => {
            fields.cpu = Some(read_u32(cursor, "cpu")?);
            read_u32(cursor, "cpu reserved")?;
        }
        DecodeStep::Period => fields.period = Some(read_u64(cursor, "period")?),
        DecodeStep::Read => return Err(ExtractError::ReadGroupUnsupported),
        DecodeStep::Callchain => {
            let nr = read_u64(cursor, "callchain length")?;
            if nr > remaining(cursor) / 8 {
                return Err(ExtractError::CallchainTooLong(nr));
            }
            fields.callchain = (0..nr)
                .map(|_| read_u64(cursor, "callchain"))
                .collect::<Result<_, _>>()?;
        }
        DecodeStep::Raw => {
            let size = read_u32(cursor, "raw size")?;
            if u64::from(size) > remaining(cursor) {
                return Err(ExtractError::Truncated("raw"));
            }
            let size = size as usize;
            let mut raw = vec![0u8; size];
            cursor.read_exact(&mut raw).map_err(|_| ExtractError::Truncated("raw"))?;
            fields.raw = raw;

            // The u32 size plus data is padded to a multiple of 8.
            let padding = (8 - (4 + size) % 8) % 8;
            let skip = padding.min(remaining(cursor) as usize);
            cursor
                .seek(SeekFrom::Current(skip as i64))
                .map_err(|_| ExtractError::Truncated("raw padding"))?;
        }
    }
    Ok(())
}

fn remaining(cursor: &Cursor<&[u8]>) -> u64 {
    (cursor.get_ref().len() as u64).saturating_sub(cursor.position())
}

fn read_u64(cursor: &mut Cursor<&[u8]>, field: &'static str) -> Result<u64, ExtractError> {
    cursor.read_u64::<LittleEndian>().map_err(|_| ExtractError::Truncated(field))
}

fn read_u32(cursor: &mut Cursor<&[u8]>, field: &'static str) -> Result<u32, ExtractError> {
    cursor.read_u32::<LittleEndian>().map_err(|_| ExtractError::Truncated(field))
}
