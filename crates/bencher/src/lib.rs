/// A named benchmark input.
#[derive(Debug, Clone)]
pub struct TestCase {
    name: &'static str,
    group: TestGroup,
    payload_len: usize,
    wire: Vec<u8>,
}

impl TestCase {
    pub fn new(name: &'static str, group: TestGroup, wire: Vec<u8>, payload_len: usize) -> Self {
        Self { name, group, payload_len, wire }
    }

    /// Chunked wire bytes carrying `payload_len` bytes in chunks of at most `chunk_len`.
    pub fn chunked(name: &'static str, group: TestGroup, payload_len: usize, chunk_len: usize) -> Self {
        Self::new(name, group, chunked_wire(payload_len, chunk_len, "\r\n"), payload_len)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn group(&self) -> TestGroup {
        self.group
    }

    pub fn wire(&self) -> &[u8] {
        &self.wire
    }

    pub fn payload_len(&self) -> usize {
        self.payload_len
    }
}

#[derive(Clone, Copy, Debug)]
pub enum TestGroup {
    Small,
    Normal,
    Large,
}

/// Builds chunked transfer-encoding framing around a payload of `payload_len` bytes.
pub fn chunked_wire(payload_len: usize, chunk_len: usize, eol: &str) -> Vec<u8> {
    let chunk_len = chunk_len.max(1);
    let mut wire = Vec::with_capacity(payload_len + payload_len / chunk_len * 16 + 16);
    let mut remaining = payload_len;
    while remaining > 0 {
        let len = remaining.min(chunk_len);
        wire.extend_from_slice(format!("{len:x}{eol}").as_bytes());
        wire.resize(wire.len() + len, b'x');
        wire.extend_from_slice(eol.as_bytes());
        remaining -= len;
    }
    wire.extend_from_slice(format!("0{eol}{eol}").as_bytes());
    wire
}
