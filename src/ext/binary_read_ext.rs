use std::io::{self, Read, Seek, SeekFrom};

/// Cursor-style helpers for reading disc structures at absolute addresses.
pub trait BinaryReadExt: Read + Seek {
    /// Returns the current absolute position of the stream.
    fn address(&mut self) -> io::Result<u64> {
        self.stream_position()
    }

    /// Moves the stream to an absolute address.
    fn jump_to(&mut self, address: u64) -> io::Result<()> {
        self.seek(SeekFrom::Start(address))?;
        Ok(())
    }

    /// Reads exactly `len` bytes. The buffer only grows with data actually read.
    fn read_bytes(&mut self, len: usize) -> io::Result<Vec<u8>> {
        let mut bytes = Vec::new();
        Read::take(&mut *self, len as u64).read_to_end(&mut bytes)?;
        if bytes.len() != len {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("expected {len} bytes, stream ended after {}", bytes.len()),
            ));
        }
        Ok(bytes)
    }

    /// Reads a NUL-terminated string. The terminator is consumed but not returned.
    fn read_c_string(&mut self) -> io::Result<Vec<u8>> {
        let mut bytes = Vec::new();
        let mut byte = [0u8; 1];
        loop {
            self.read_exact(&mut byte)?;
            if byte[0] == 0 {
                return Ok(bytes);
            }
            bytes.push(byte[0]);
        }
    }
}

impl<R: Read + Seek + ?Sized> BinaryReadExt for R {}
