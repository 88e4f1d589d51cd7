//! File table (spec §3): "dense sequence; index reused on close; slot
//! value `None` means free." Backs the `Open`/`ReadAt`/`Close` requests.

use crate::error::Error;
use crate::request::OpenMode;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom};

#[derive(Default)]
pub struct FileTable {
    slots: Vec<Option<File>>,
}

impl FileTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens `name` with `mode`, reusing the first free slot or appending
    /// a new one. Returns the fd (slot index).
    pub fn open(&mut self, name: &str, mode: OpenMode) -> Result<u32, Error> {
        let mut opts = OpenOptions::new();
        match mode {
            OpenMode::Read => {
                opts.read(true);
            }
            OpenMode::Write => {
                opts.write(true).create(true);
            }
            OpenMode::ReadWrite => {
                opts.read(true).write(true).create(true);
            }
        }
        let file = opts.open(name)?;

        let fd = match self.slots.iter().position(Option::is_none) {
            Some(idx) => {
                self.slots[idx] = Some(file);
                idx
            }
            None => {
                self.slots.push(Some(file));
                self.slots.len() - 1
            }
        };
        Ok(fd as u32)
    }

    /// Reads up to `len` bytes at `offset`; short reads are allowed
    /// (spec §6: "data length ≤ len, short reads allowed").
    pub fn read_at(&mut self, fd: u32, offset: u64, len: usize) -> Result<Vec<u8>, Error> {
        let file = self.slots.get_mut(fd as usize).and_then(Option::as_mut).ok_or(Error::BadFd(fd))?;
        file.seek(SeekFrom::Start(offset))?;
        let mut buf = vec![0u8; len];
        let n = file.read(&mut buf)?;
        buf.truncate(n);
        Ok(buf)
    }

    pub fn close(&mut self, fd: u32) -> Result<(), Error> {
        let slot = self.slots.get_mut(fd as usize).ok_or(Error::BadFd(fd))?;
        if slot.take().is_none() {
            return Err(Error::BadFd(fd));
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn open_read_close_round_trip() {
        let mut tmp = std::env::temp_dir();
        tmp.push(format!("rdbg-file-table-test-{}", std::process::id()));
        std::fs::write(&tmp, b"hello world").unwrap();

        let mut table = FileTable::new();
        let fd = table.open(tmp.to_str().unwrap(), OpenMode::Read).unwrap();
        assert_eq!(fd, 0);

        let data = table.read_at(fd, 6, 5).unwrap();
        assert_eq!(data, b"world");

        table.close(fd).unwrap();
        assert!(table.close(fd).is_err());

        std::fs::remove_file(&tmp).unwrap();
    }

    #[test]
    fn closed_slot_is_reused() {
        let mut tmp = std::env::temp_dir();
        tmp.push(format!("rdbg-file-table-reuse-{}", std::process::id()));
        std::fs::write(&tmp, b"x").unwrap();
        let path = tmp.to_str().unwrap();

        let mut table = FileTable::new();
        let first = table.open(path, OpenMode::Read).unwrap();
        table.close(first).unwrap();
        let second = table.open(path, OpenMode::Read).unwrap();
        assert_eq!(first, second);

        std::fs::remove_file(&tmp).unwrap();
    }

    #[test]
    fn read_at_unknown_fd_errors() {
        let mut table = FileTable::new();
        assert!(table.read_at(3, 0, 1).is_err());
    }
}
