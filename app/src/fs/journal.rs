//! ext3 journal: a linked chain of fixed-size records between the
//! superblock and the inode bitmap
use bincode::{Decode, Encode};
use log::{debug, warn};

use crate::{
    error::{FsError, Result},
    image::DiskImage,
    utils::{
        fixed_str::{from_fixed, to_fixed},
        time_util,
        traits::DiskRecord,
    },
};

use super::{FileSystem, SuperBlock, BLOCK_SIZE, JOURNAL_SIZE};

pub const OPERATION_LEN: usize = 10;
pub const JOURNAL_PATH_LEN: usize = 74;
pub const JOURNAL_CONTENT_LEN: usize = BLOCK_SIZE as usize;
/// `next` of the last record in the chain
pub const END_OF_CHAIN: i32 = -1;

/// operations that leave a trace in the journal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Mkdir,
    Mkfile,
    Login,
    Logout,
    Mkgrp,
    Rmgrp,
    Mkusr,
    Rmusr,
    Copy,
    Remove,
    Chmod,
    Chown,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Mkdir => "mkdir",
            Operation::Mkfile => "mkfile",
            Operation::Login => "login",
            Operation::Logout => "logout",
            Operation::Mkgrp => "mkgrp",
            Operation::Rmgrp => "rmgrp",
            Operation::Mkusr => "mkusr",
            Operation::Rmusr => "rmusr",
            Operation::Copy => "copy",
            Operation::Remove => "remove",
            Operation::Chmod => "chmod",
            Operation::Chown => "chown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Encode, Decode)]
pub struct JournalRecord {
    /// absolute offset of the following record
    pub next: i32,
    pub operation: [u8; OPERATION_LEN],
    pub path: [u8; JOURNAL_PATH_LEN],
    pub content: [u8; JOURNAL_CONTENT_LEN],
    pub date: f32,
}

impl DiskRecord for JournalRecord {
    const SIZE: usize = JOURNAL_SIZE as usize;
}

impl JournalRecord {
    /// a record stamped now; path and content longer than their fields are cut
    pub fn new(operation: Operation, path: &str, content: &[u8]) -> Self {
        let mut stored = [0u8; JOURNAL_CONTENT_LEN];
        let len = content.len().min(JOURNAL_CONTENT_LEN);
        stored[..len].copy_from_slice(&content[..len]);
        JournalRecord {
            next: END_OF_CHAIN,
            operation: to_fixed(operation.as_str()),
            path: to_fixed(path),
            content: stored,
            date: time_util::now(),
        }
    }

    pub fn operation(&self) -> String {
        from_fixed(&self.operation)
    }

    pub fn path(&self) -> String {
        from_fixed(&self.path)
    }

    pub fn content(&self) -> String {
        let end = self
            .content
            .iter()
            .rposition(|b| *b != 0)
            .map_or(0, |p| p + 1);
        String::from_utf8_lossy(&self.content[..end]).into_owned()
    }
}

/// journal records `content` is logged as, one per 64-byte chunk and at least one
pub fn records_for(content: &[u8]) -> i32 {
    content.len().div_ceil(JOURNAL_CONTENT_LEN).max(1) as i32
}

/// the journal region of an ext3 partition, room for one record per inode slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Journal {
    start: i32,
    capacity: i32,
}

impl Journal {
    /// the journal described by `superblock`, `None` on ext2
    pub fn of(superblock: &SuperBlock) -> Option<Journal> {
        superblock.journal_start().map(|start| Journal {
            start,
            capacity: superblock.structures_count(),
        })
    }

    pub fn start(&self) -> i32 {
        self.start
    }

    pub fn capacity(&self) -> i32 {
        self.capacity
    }

    fn end(&self) -> i32 {
        self.start + self.capacity * JOURNAL_SIZE
    }

    fn check_link(&self, next: i32) -> Result<()> {
        if next < self.start || next + JOURNAL_SIZE > self.end() {
            return Err(FsError::Format(format!(
                "journal link {next} points outside the journal region"
            )));
        }
        Ok(())
    }

    /// write `record` as the head of an empty chain
    pub fn init(&self, image: &mut DiskImage, mut record: JournalRecord) -> Result<()> {
        record.next = END_OF_CHAIN;
        image.write_record(self.start, &record)
    }

    /// follow the chain from the head
    /// # Return
    /// the offset of the tail, the tail itself and how many records the chain holds
    fn tail(&self, image: &DiskImage) -> Result<(i32, JournalRecord, i32)> {
        let mut offset = self.start;
        let mut tail = image.read_record::<JournalRecord>(offset)?;
        let mut len = 1;
        while tail.next != END_OF_CHAIN {
            self.check_link(tail.next)?;
            if tail.next <= offset {
                return Err(FsError::Format("journal chain loops back".into()));
            }
            offset = tail.next;
            tail = image.read_record(offset)?;
            len += 1;
        }
        Ok((offset, tail, len))
    }

    /// record slots still free
    pub fn free_slots(&self, image: &DiskImage) -> Result<i32> {
        let (_, _, len) = self.tail(image)?;
        Ok(self.capacity - len)
    }

    /// walk to the tail and link `record` right after it
    /// # Return
    /// the absolute offset the record was written at
    /// # Errors
    /// [FsError::NoSpace] once every record slot is used
    pub fn append(&self, image: &mut DiskImage, mut record: JournalRecord) -> Result<i32> {
        let (offset, mut tail, _) = self.tail(image)?;
        let next = offset + JOURNAL_SIZE;
        if next + JOURNAL_SIZE > self.end() {
            return Err(FsError::NoSpace("journal is full".into()));
        }
        tail.next = next;
        image.write_record(offset, &tail)?;
        record.next = END_OF_CHAIN;
        image.write_record(next, &record)?;
        debug!("journal: {} {} at {next}", record.operation(), record.path());
        Ok(next)
    }

    /// every record of the chain starting at the head
    pub fn records(&self, image: &DiskImage) -> Result<Vec<JournalRecord>> {
        let mut records = Vec::new();
        let mut offset = self.start;
        loop {
            let record = image.read_record::<JournalRecord>(offset)?;
            let next = record.next;
            records.push(record);
            if next == END_OF_CHAIN {
                return Ok(records);
            }
            self.check_link(next)?;
            if next <= offset {
                return Err(FsError::Format("journal chain loops back".into()));
            }
            offset = next;
        }
    }
}

/// journaling hooks of the filesystem
impl FileSystem<'_> {
    pub fn journal(&self) -> Option<Journal> {
        Journal::of(self.superblock())
    }

    /// fail unless `records` more records fit in the journal
    ///
    /// always passes outside ext3
    /// # Errors
    /// [FsError::NoSpace] when the journal has less room left
    pub fn reserve_journal(&self, records: i32) -> Result<()> {
        let Some(journal) = self.journal() else {
            return Ok(());
        };
        let free = journal.free_slots(self.image())?;
        if free < records {
            return Err(FsError::NoSpace(format!(
                "journal is full: {records} records needed, {free} free"
            )));
        }
        Ok(())
    }

    /// append a record for `operation`, one per 64-byte chunk of `content`
    ///
    /// a no-op outside ext3; nothing is appended unless every chunk fits
    pub fn log(&mut self, operation: Operation, path: &str, content: &[u8]) -> Result<()> {
        let Some(journal) = self.journal() else {
            return Ok(());
        };
        self.reserve_journal(records_for(content))?;
        if content.is_empty() {
            journal.append(self.image_mut(), JournalRecord::new(operation, path, content))?;
            return Ok(());
        }
        for chunk in content.chunks(JOURNAL_CONTENT_LEN) {
            journal.append(self.image_mut(), JournalRecord::new(operation, path, chunk))?;
        }
        Ok(())
    }

    /// like [Self::log] for login and logout, which a full journal never blocks
    pub fn log_session(&mut self, operation: Operation, content: &[u8]) -> Result<()> {
        match self.log(operation, "", content) {
            Err(FsError::NoSpace(reason)) => {
                warn!("{} left out of the journal: {reason}", operation.as_str());
                Ok(())
            }
            other => other,
        }
    }

    /// the whole journal chain
    /// # Errors
    /// [FsError::InvalidInput] on ext2 partitions
    pub fn journal_records(&self) -> Result<Vec<JournalRecord>> {
        let journal = self
            .journal()
            .ok_or_else(|| FsError::InvalidInput("partition has no journal, it is ext2".into()))?;
        journal.records(self.image())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::FsType;

    fn journal_image(capacity: i32) -> anyhow::Result<(tempfile::TempDir, DiskImage, Journal)> {
        let dir = tempfile::tempdir()?;
        let image = DiskImage::create(dir.path().join("A.dsk"), 8192)?;
        let journal = Journal {
            start: 100,
            capacity,
        };
        Ok((dir, image, journal))
    }

    #[test]
    fn test_record_size_in_disk() -> anyhow::Result<()> {
        let record = JournalRecord::new(Operation::Mkdir, "/", b"");
        assert_eq!(record.serialize()?.len(), JournalRecord::SIZE);
        Ok(())
    }

    #[test]
    fn test_append_links_records_in_order() -> anyhow::Result<()> {
        let (_dir, mut image, journal) = journal_image(4)?;
        journal.init(&mut image, JournalRecord::new(Operation::Mkdir, "/", b""))?;
        let second = journal.append(
            &mut image,
            JournalRecord::new(Operation::Mkfile, "/users.txt", b"1,G,root\n"),
        )?;
        assert_eq!(second, 100 + JOURNAL_SIZE);
        journal.append(&mut image, JournalRecord::new(Operation::Login, "", b"A105/root"))?;

        let records = journal.records(&image)?;
        let ops: Vec<String> = records.iter().map(JournalRecord::operation).collect();
        assert_eq!(ops, ["mkdir", "mkfile", "login"]);
        assert_eq!(records[1].path(), "/users.txt");
        assert_eq!(records[1].content(), "1,G,root\n");
        assert_eq!(records[0].next, second);
        assert_eq!(records[2].next, END_OF_CHAIN);
        Ok(())
    }

    #[test]
    fn test_append_stops_at_region_end() -> anyhow::Result<()> {
        let (_dir, mut image, journal) = journal_image(2)?;
        journal.init(&mut image, JournalRecord::new(Operation::Mkdir, "/", b""))?;
        journal.append(&mut image, JournalRecord::new(Operation::Logout, "", b""))?;
        assert!(matches!(
            journal.append(&mut image, JournalRecord::new(Operation::Logout, "", b"")),
            Err(FsError::NoSpace(_))
        ));
        assert_eq!(journal.records(&image)?.len(), 2);
        Ok(())
    }

    #[test]
    fn test_corrupt_link_is_reported() -> anyhow::Result<()> {
        let (_dir, mut image, journal) = journal_image(4)?;
        let mut head = JournalRecord::new(Operation::Mkdir, "/", b"");
        head.next = 7;
        image.write_record(100, &head)?;
        assert!(matches!(journal.records(&image), Err(FsError::Format(_))));
        Ok(())
    }

    #[test]
    fn test_looping_chain_stops_append() -> anyhow::Result<()> {
        let (_dir, mut image, journal) = journal_image(4)?;
        let mut head = JournalRecord::new(Operation::Mkdir, "/", b"");
        head.next = 100;
        image.write_record(100, &head)?;
        assert!(matches!(journal.records(&image), Err(FsError::Format(_))));
        assert!(matches!(
            journal.append(&mut image, JournalRecord::new(Operation::Logout, "", b"")),
            Err(FsError::Format(_))
        ));
        assert!(matches!(journal.free_slots(&image), Err(FsError::Format(_))));
        Ok(())
    }

    #[test]
    fn test_free_slots_and_chunk_count() -> anyhow::Result<()> {
        let (_dir, mut image, journal) = journal_image(3)?;
        journal.init(&mut image, JournalRecord::new(Operation::Mkdir, "/", b""))?;
        assert_eq!(journal.free_slots(&image)?, 2);
        journal.append(&mut image, JournalRecord::new(Operation::Logout, "", b""))?;
        assert_eq!(journal.free_slots(&image)?, 1);

        assert_eq!(records_for(b""), 1);
        assert_eq!(records_for(&[b'a'; 64]), 1);
        assert_eq!(records_for(&[b'a'; 65]), 2);
        assert_eq!(records_for(&[b'a'; 130]), 3);
        Ok(())
    }

    #[test]
    fn test_ext2_has_no_journal() {
        let ext2 = SuperBlock::new(153, 10_000, FsType::Ext2);
        assert!(Journal::of(&ext2).is_none());
        let ext3 = SuperBlock::new(153, 10_000, FsType::Ext3);
        let journal = Journal::of(&ext3).map(|j| (j.start(), j.capacity()));
        assert_eq!(journal, Some((153 + 68, ext3.structures_count())));
    }
}
