//! Synthetic perf.data writer shared by the integration tests

#![allow(dead_code)]

use byteorder::{LittleEndian, WriteBytesExt};
use perfscope_common::{
    ATTR_CONFIG_OFFSET, ATTR_FLAG_SAMPLE_ID_ALL, ATTR_OPTIONS_OFFSET, ATTR_SAMPLE_TYPE_OFFSET,
    ATTR_SIZE_OFFSET, MAX_EVENT_NAME, PERF_CONTEXT_USER, PERF_FILE_MAGIC, PERF_RECORD_COMM,
    PERF_RECORD_MMAP, PERF_RECORD_MMAP2, PERF_RECORD_SAMPLE, PERF_SAMPLE_CALLCHAIN,
    PERF_SAMPLE_CPU, PERF_SAMPLE_ID, PERF_SAMPLE_IDENTIFIER, PERF_SAMPLE_IP, PERF_SAMPLE_PERIOD,
    PERF_SAMPLE_STREAM_ID, PERF_SAMPLE_TID, PERF_SAMPLE_TIME,
};
use std::path::PathBuf;

/// Size of the `perf_event_attr` written by the builder
pub const ATTR_STRUCT_LEN: usize = 120;
/// Attribute record size: struct plus ids section
pub const ATTR_RECORD_LEN: usize = ATTR_STRUCT_LEN + 16;

pub const DEFAULT_SAMPLE_TYPE: u64 =
    PERF_SAMPLE_IP | PERF_SAMPLE_TID | PERF_SAMPLE_TIME | PERF_SAMPLE_CALLCHAIN;

pub struct AttrSpec {
    pub config: u64,
    pub sample_type: u64,
    pub options: u64,
    pub ids: Vec<u64>,
    /// Overrides the declared `perf_event_attr.size`
    pub declared_size: Option<u32>,
}

#[derive(Default, Clone)]
pub struct SampleSpec {
    pub ip: u64,
    pub pid: u32,
    pub tid: u32,
    pub time: u64,
    pub id: u64,
    pub period: u64,
    pub cpu: u32,
    pub callchain: Vec<u64>,
}

impl SampleSpec {
    /// Sample at `ip` whose ancestors are `callers`, innermost first
    pub fn at(time: u64, ip: u64, callers: &[u64]) -> Self {
        let mut callchain = vec![PERF_CONTEXT_USER, ip];
        callchain.extend_from_slice(callers);
        Self { ip, pid: 100, tid: 100, time, period: 1, callchain, ..Self::default() }
    }
}

pub struct PerfFileBuilder {
    attrs: Vec<AttrSpec>,
    event_types: Vec<(u64, String)>,
    data: Vec<u8>,
    omit_data: bool,
}

impl PerfFileBuilder {
    /// One attribute with `sample_type` and `sample_id_all` set
    pub fn new(sample_type: u64) -> Self {
        Self {
            attrs: vec![AttrSpec {
                config: 0,
                sample_type,
                options: ATTR_FLAG_SAMPLE_ID_ALL,
                ids: Vec::new(),
                declared_size: None,
            }],
            event_types: Vec::new(),
            data: Vec::new(),
            omit_data: false,
        }
    }

    pub fn with_attrs(attrs: Vec<AttrSpec>) -> Self {
        Self { attrs, event_types: Vec::new(), data: Vec::new(), omit_data: false }
    }

    fn sample_type(&self) -> u64 {
        self.attrs.first().map_or(0, |a| a.sample_type)
    }

    pub fn event_type(mut self, event_id: u64, name: &str) -> Self {
        self.event_types.push((event_id, name.to_string()));
        self
    }

    pub fn without_data(mut self) -> Self {
        self.omit_data = true;
        self
    }

    /// Append a record with an arbitrary type and payload
    pub fn raw_record(mut self, record_type: u32, payload: &[u8]) -> Self {
        self.data.write_u32::<LittleEndian>(record_type).unwrap();
        self.data.write_u16::<LittleEndian>(0).unwrap();
        self.data.write_u16::<LittleEndian>(u16::try_from(payload.len() + 8).unwrap()).unwrap();
        self.data.extend_from_slice(payload);
        self
    }

    fn trailer(&self, pid: u32, tid: u32, time: u64) -> Vec<u8> {
        let sample_type = self.sample_type();
        let mut buf = Vec::new();
        if sample_type & PERF_SAMPLE_TID != 0 {
            buf.write_u32::<LittleEndian>(pid).unwrap();
            buf.write_u32::<LittleEndian>(tid).unwrap();
        }
        if sample_type & PERF_SAMPLE_TIME != 0 {
            buf.write_u64::<LittleEndian>(time).unwrap();
        }
        if sample_type & PERF_SAMPLE_ID != 0 {
            buf.write_u64::<LittleEndian>(0).unwrap();
        }
        if sample_type & PERF_SAMPLE_STREAM_ID != 0 {
            buf.write_u64::<LittleEndian>(0).unwrap();
        }
        if sample_type & PERF_SAMPLE_CPU != 0 {
            buf.write_u64::<LittleEndian>(0).unwrap();
        }
        if sample_type & PERF_SAMPLE_IDENTIFIER != 0 {
            buf.write_u64::<LittleEndian>(0).unwrap();
        }
        buf
    }

    fn padded_string(buf: &mut Vec<u8>, text: &str) {
        buf.extend_from_slice(text.as_bytes());
        buf.push(0);
        while buf.len() % 8 != 0 {
            buf.push(0);
        }
    }

    pub fn mmap(self, start: u64, length: u64, filename: &str, time: u64) -> Self {
        let mut payload = Vec::new();
        payload.write_u32::<LittleEndian>(100).unwrap();
        payload.write_u32::<LittleEndian>(100).unwrap();
        payload.write_u64::<LittleEndian>(start).unwrap();
        payload.write_u64::<LittleEndian>(length).unwrap();
        payload.write_u64::<LittleEndian>(0).unwrap();
        Self::padded_string(&mut payload, filename);
        payload.extend(self.trailer(100, 100, time));
        self.raw_record(PERF_RECORD_MMAP, &payload)
    }

    pub fn mmap2(self, start: u64, length: u64, filename: &str, time: u64) -> Self {
        let mut payload = Vec::new();
        payload.write_u32::<LittleEndian>(100).unwrap();
        payload.write_u32::<LittleEndian>(100).unwrap();
        payload.write_u64::<LittleEndian>(start).unwrap();
        payload.write_u64::<LittleEndian>(length).unwrap();
        payload.write_u64::<LittleEndian>(0).unwrap();
        payload.write_u32::<LittleEndian>(8).unwrap();
        payload.write_u32::<LittleEndian>(1).unwrap();
        payload.write_u64::<LittleEndian>(4242).unwrap();
        payload.write_u64::<LittleEndian>(0).unwrap();
        payload.write_u32::<LittleEndian>(5).unwrap();
        payload.write_u32::<LittleEndian>(2).unwrap();
        Self::padded_string(&mut payload, filename);
        payload.extend(self.trailer(100, 100, time));
        self.raw_record(PERF_RECORD_MMAP2, &payload)
    }

    pub fn comm(self, pid: u32, tid: u32, name: &str, time: u64) -> Self {
        let mut payload = Vec::new();
        payload.write_u32::<LittleEndian>(pid).unwrap();
        payload.write_u32::<LittleEndian>(tid).unwrap();
        Self::padded_string(&mut payload, name);
        payload.extend(self.trailer(pid, tid, time));
        self.raw_record(PERF_RECORD_COMM, &payload)
    }

    pub fn sample(self, sample: &SampleSpec) -> Self {
        let sample_type = self.sample_type();
        let mut payload = Vec::new();
        if sample_type & PERF_SAMPLE_IDENTIFIER != 0 {
            payload.write_u64::<LittleEndian>(sample.id).unwrap();
        }
        if sample_type & PERF_SAMPLE_IP != 0 {
            payload.write_u64::<LittleEndian>(sample.ip).unwrap();
        }
        if sample_type & PERF_SAMPLE_TID != 0 {
            payload.write_u32::<LittleEndian>(sample.pid).unwrap();
            payload.write_u32::<LittleEndian>(sample.tid).unwrap();
        }
        if sample_type & PERF_SAMPLE_TIME != 0 {
            payload.write_u64::<LittleEndian>(sample.time).unwrap();
        }
        if sample_type & PERF_SAMPLE_ID != 0 {
            payload.write_u64::<LittleEndian>(sample.id).unwrap();
        }
        if sample_type & PERF_SAMPLE_CPU != 0 {
            payload.write_u32::<LittleEndian>(sample.cpu).unwrap();
            payload.write_u32::<LittleEndian>(0).unwrap();
        }
        if sample_type & PERF_SAMPLE_PERIOD != 0 {
            payload.write_u64::<LittleEndian>(sample.period).unwrap();
        }
        if sample_type & PERF_SAMPLE_CALLCHAIN != 0 {
            payload.write_u64::<LittleEndian>(sample.callchain.len() as u64).unwrap();
            for &addr in &sample.callchain {
                payload.write_u64::<LittleEndian>(addr).unwrap();
            }
        }
        self.raw_record(PERF_RECORD_SAMPLE, &payload)
    }

    pub fn build(&self) -> Vec<u8> {
        let attrs_offset = 104u64;
        let attrs_size = (self.attrs.len() * ATTR_RECORD_LEN) as u64;
        let mut ids_offset = attrs_offset + attrs_size;

        let mut attr_bytes = Vec::new();
        let mut ids_bytes = Vec::new();
        for attr in &self.attrs {
            let mut record = vec![0u8; ATTR_RECORD_LEN];
            let declared = attr.declared_size.unwrap_or(ATTR_STRUCT_LEN as u32);
            record[ATTR_SIZE_OFFSET..ATTR_SIZE_OFFSET + 4].copy_from_slice(&declared.to_le_bytes());
            record[ATTR_CONFIG_OFFSET..ATTR_CONFIG_OFFSET + 8].copy_from_slice(&attr.config.to_le_bytes());
            record[ATTR_SAMPLE_TYPE_OFFSET..ATTR_SAMPLE_TYPE_OFFSET + 8]
                .copy_from_slice(&attr.sample_type.to_le_bytes());
            record[ATTR_OPTIONS_OFFSET..ATTR_OPTIONS_OFFSET + 8]
                .copy_from_slice(&attr.options.to_le_bytes());

            let ids_size = (attr.ids.len() * 8) as u64;
            let section_at = ATTR_STRUCT_LEN;
            record[section_at..section_at + 8].copy_from_slice(&ids_offset.to_le_bytes());
            record[section_at + 8..section_at + 16].copy_from_slice(&ids_size.to_le_bytes());
            ids_offset += ids_size;

            for &id in &attr.ids {
                ids_bytes.write_u64::<LittleEndian>(id).unwrap();
            }
            attr_bytes.extend(record);
        }

        let event_types_offset = ids_offset;
        let mut event_type_bytes = Vec::new();
        for (event_id, name) in &self.event_types {
            event_type_bytes.write_u64::<LittleEndian>(*event_id).unwrap();
            let mut raw_name = [0u8; MAX_EVENT_NAME];
            raw_name[..name.len()].copy_from_slice(name.as_bytes());
            event_type_bytes.extend_from_slice(&raw_name);
        }
        let event_types_size = event_type_bytes.len() as u64;
        let data_offset = event_types_offset + event_types_size;

        let mut file = Vec::new();
        file.extend_from_slice(&PERF_FILE_MAGIC);
        file.write_u64::<LittleEndian>(104).unwrap();
        file.write_u64::<LittleEndian>(ATTR_RECORD_LEN as u64).unwrap();
        let sections = [
            (attrs_offset, attrs_size),
            if self.omit_data { (0, 0) } else { (data_offset, self.data.len() as u64) },
            if event_types_size == 0 { (0, 0) } else { (event_types_offset, event_types_size) },
        ];
        for (offset, size) in sections {
            file.write_u64::<LittleEndian>(offset).unwrap();
            file.write_u64::<LittleEndian>(size).unwrap();
        }
        file.extend_from_slice(&[0u8; 32]);

        file.extend(attr_bytes);
        file.extend(ids_bytes);
        file.extend(event_type_bytes);
        if !self.omit_data {
            file.extend_from_slice(&self.data);
        }
        file
    }

    /// Write the file into `dir` and return its path
    pub fn write_to(&self, dir: &tempfile::TempDir) -> PathBuf {
        let path = dir.path().join("perf.data");
        std::fs::write(&path, self.build()).unwrap();
        path
    }
}

/// Write a shell script that prints `lines`; run as `sh -a -C <script>` it
/// stands in for `nm -a -C <binary>`
pub fn fake_nm_script(dir: &std::path::Path, name: &str, lines: &[&str]) -> PathBuf {
    let path = dir.join(name);
    let mut script = String::new();
    for line in lines {
        script.push_str(&format!("echo '{line}'\n"));
    }
    std::fs::write(&path, script).unwrap();
    path
}
