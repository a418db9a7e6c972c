//! Stream adapter (C7): a single-consumer readable handle over one
//! `Reader`-indexed entry, yielded by `Reader::open`.

use std::io;

use crate::codec::ArchiveReader;
use crate::source::{Source, SourceReader};

/// A readable handle over one entry's payload, positioned by `Reader::open`
/// at the start of that entry's data within a decoder walking its
/// originating pack. Closing is idempotent and happens automatically on
/// drop if the caller never calls `close` explicitly.
pub struct Stream {
    source: Source,
    decoder: Option<ArchiveReader<SourceReader>>,
}

impl Stream {
    pub(crate) fn new(source: Source, decoder: ArchiveReader<SourceReader>) -> Self {
        Self {
            source,
            decoder: Some(decoder),
        }
    }

    /// Releases the decoder and, if the originating pack is stream-backed,
    /// clears its busy latch so a later `open` can reopen it.
    pub fn close(&mut self) {
        if let Some(decoder) = self.decoder.take() {
            let raw = decoder.into_inner();
            self.source.close_reader(raw);
        }
    }
}

impl io::Read for Stream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.decoder.as_mut() {
            Some(decoder) => decoder
                .read_data(buf)
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string())),
            None => Ok(0),
        }
    }
}

impl Drop for Stream {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::Builder;
    use crate::reader::Reader;
    use std::io::Read;

    fn sealed(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut builder = Builder::new();
        builder.set_name("demo");
        for (path, bytes) in entries {
            builder.add_from_bytes(path, bytes.to_vec());
        }
        let mut out = Vec::new();
        builder.write_to(&mut out).unwrap();
        out
    }

    #[test]
    fn reads_full_payload_then_eof() {
        let pack = sealed(&[("/a", b"payload")]);
        let mut reader = Reader::new();
        reader.add_from_bytes(pack).unwrap();
        let mut stream = reader.open("/a").unwrap();
        let mut buf = Vec::new();
        stream.read_to_end(&mut buf).unwrap();
        assert_eq!(buf, b"payload");
        assert_eq!(stream.read(&mut [0u8; 4]).unwrap(), 0);
    }

    #[test]
    fn close_is_idempotent_and_yields_eof() {
        let pack = sealed(&[("/a", b"data")]);
        let mut reader = Reader::new();
        reader.add_from_bytes(pack).unwrap();
        let mut stream = reader.open("/a").unwrap();
        stream.close();
        stream.close();
        assert_eq!(stream.read(&mut [0u8; 4]).unwrap(), 0);
    }
}
