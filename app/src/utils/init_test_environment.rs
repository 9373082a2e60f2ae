use tempfile::TempDir;

use crate::{
    disk::DiskStore,
    fs::{FileSystem, FsType},
    mbr::{Fit, PartitionKind},
    utils::size_unit::SizeUnit,
};

pub const TEST_PARTITION_NAME: &str = "part1";
pub const TEST_PARTITION_SIZE: i32 = 512 * 1024;

/// a scratch disk store holding one formatted, mounted partition
pub struct TestDisk {
    /// removed when dropped
    pub dir: TempDir,
    pub store: DiskStore,
    pub id: String,
}

impl TestDisk {
    /// open the formatted partition and run `f` on it
    pub fn with_fs<T>(&self, f: impl FnOnce(&mut FileSystem<'_>) -> T) -> T {
        let (mut disk, mounted) = self
            .store
            .open_mounted(&self.id)
            .expect("Failed to open mounted partition");
        let mut fs = FileSystem::open(&mut disk.image, mounted.partition.start)
            .expect("Failed to open formatted partition");
        let result = f(&mut fs);
        disk.image.flush().expect("Failed to flush disk image");
        result
    }
}

/// a 1M disk with a 512K primary partition mounted and formatted as `fs_type`
pub fn init_test_environment(fs_type: FsType) -> TestDisk {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let store = DiskStore::new(dir.path()).expect("Failed to create disk store");
    let letter = store
        .mkdisk(1, SizeUnit::Mega, Fit::First)
        .expect("Failed to create disk");
    store
        .open(letter)
        .expect("Failed to open disk")
        .create_partition(
            TEST_PARTITION_SIZE,
            Fit::Worst,
            PartitionKind::Primary,
            TEST_PARTITION_NAME,
        )
        .expect("Failed to create partition");
    let id = store
        .mount(letter, TEST_PARTITION_NAME)
        .expect("Failed to mount partition");
    store.mkfs(&id, fs_type).expect("Failed to format partition");
    TestDisk { dir, store, id }
}
