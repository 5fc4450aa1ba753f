use std::io::{self, Seek, Write};

const ZEROES: [u8; 64] = [0; 64];

pub trait BinaryWriteExt: Write + Seek {
    /// Writes zero bytes until the stream reaches `address`.
    ///
    /// Fails with `InvalidInput` when the stream is already past `address`.
    fn pad_to(&mut self, address: u64) -> io::Result<()> {
        let current = self.stream_position()?;
        if current > address {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("cannot pad backwards from {current:#x} to {address:#x}"),
            ));
        }

        let mut remaining = address - current;
        while remaining > 0 {
            let chunk = remaining.min(ZEROES.len() as u64) as usize;
            self.write_all(&ZEROES[..chunk])?;
            remaining -= chunk as u64;
        }
        Ok(())
    }
}

impl<W: Write + Seek + ?Sized> BinaryWriteExt for W {}

/// Rounds `address` up to a multiple of `alignment`. An alignment of 0 or 1 is a no-op.
pub fn align_up(address: u64, alignment: u64) -> u64 {
    if alignment <= 1 {
        return address;
    }
    address.div_ceil(alignment) * alignment
}
