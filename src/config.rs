//! Configuration constants for stegoloop.

use std::time::Duration;

/// Name of the single regular file exposed at the mount point's root.
pub const VIRTUAL_FILE_NAME: &str = "data";

/// Mode bits of the virtual file and of the mount root (rwx r-x r-x).
pub const VIRTUAL_FILE_MODE: u16 = 0o755;

/// One payload byte occupies the LSBs of this many image samples.
pub const SAMPLES_PER_BYTE: u64 = 8;

/// Inode of the mount root directory.
pub const ROOT_INO: u64 = 1;

/// Inode of the virtual file.
pub const DATA_INO: u64 = 2;

/// How long the kernel may cache attributes and lookups. The cover set is
/// fixed at mount time, so a long TTL would also be correct; one second
/// keeps debugging with external tools predictable.
pub const ATTR_TTL: Duration = Duration::from_secs(1);
