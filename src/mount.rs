//! FUSE adapter exposing the aggregate as a single regular file.
//!
//! The mount point contains exactly one entry, `data`, whose size is the
//! aggregate's capacity. The intended use is to attach that file to a loop
//! device and put an encrypted volume on top, so ciphertext ends up inside
//! the cover images.
//!
//! All aggregate state is behind one coarse mutex. The hot path is a
//! memory-to-memory copy of single bytes plus a permutation lookup, so
//! there is nothing to gain from finer locking. Errors are logged with the
//! operation that raised them and collapsed to `EIO`; the kernel only
//! understands integer codes.

use crate::aggregate::Aggregate;
use crate::config::{ATTR_TTL, DATA_INO, ROOT_INO, VIRTUAL_FILE_MODE, VIRTUAL_FILE_NAME};
use crate::error::{Error, Result};
use fuser::{
    FileAttr, FileType, Filesystem, MountOption, ReplyAttr, ReplyData, ReplyDirectory, ReplyEmpty,
    ReplyEntry, ReplyOpen, ReplyWrite, Request,
};
use libc::{EIO, ENOENT};
use log::{error, info};
use std::ffi::OsStr;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

/// The FUSE filesystem over one shared [`Aggregate`].
pub struct StegoFs {
    aggregate: Arc<Mutex<Aggregate>>,
    /// Capacity is fixed at mount time; cached here so `getattr` does not
    /// take the lock.
    capacity: u64,
    uid: u32,
    gid: u32,
    mounted_at: SystemTime,
}

impl StegoFs {
    /// Wrap an aggregate for mounting. The caller keeps its own handle on
    /// the mutex so it can run the authoritative sync after unmount.
    pub fn new(aggregate: Arc<Mutex<Aggregate>>) -> Result<Self> {
        let capacity = match aggregate.lock() {
            Ok(agg) => agg.capacity(),
            Err(_) => return Err(poisoned()),
        };
        Ok(Self {
            aggregate,
            capacity,
            uid: unsafe { libc::getuid() },
            gid: unsafe { libc::getgid() },
            mounted_at: SystemTime::now(),
        })
    }

    fn root_attr(&self) -> FileAttr {
        self.attr(ROOT_INO, 0, FileType::Directory, 2)
    }

    fn data_attr(&self) -> FileAttr {
        self.attr(DATA_INO, self.capacity, FileType::RegularFile, 1)
    }

    fn attr(&self, ino: u64, size: u64, kind: FileType, nlink: u32) -> FileAttr {
        FileAttr {
            ino,
            size,
            blocks: size.div_ceil(512),
            atime: self.mounted_at,
            mtime: self.mounted_at,
            ctime: self.mounted_at,
            crtime: self.mounted_at,
            kind,
            perm: VIRTUAL_FILE_MODE,
            nlink,
            uid: self.uid,
            gid: self.gid,
            rdev: 0,
            blksize: 512,
            flags: 0,
        }
    }
}

impl Filesystem for StegoFs {
    fn lookup(&mut self, _req: &Request, parent: u64, name: &OsStr, reply: ReplyEntry) {
        if parent == ROOT_INO && name == OsStr::new(VIRTUAL_FILE_NAME) {
            reply.entry(&ATTR_TTL, &self.data_attr(), 0);
        } else {
            reply.error(ENOENT);
        }
    }

    fn getattr(&mut self, _req: &Request, ino: u64, reply: ReplyAttr) {
        match ino {
            ROOT_INO => reply.attr(&ATTR_TTL, &self.root_attr()),
            DATA_INO => reply.attr(&ATTR_TTL, &self.data_attr()),
            _ => reply.error(ENOENT),
        }
    }

    fn readdir(
        &mut self,
        _req: &Request,
        ino: u64,
        _fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        if ino != ROOT_INO {
            reply.error(ENOENT);
            return;
        }

        let entries: [(u64, FileType, &str); 3] = [
            (ROOT_INO, FileType::Directory, "."),
            (ROOT_INO, FileType::Directory, ".."),
            (DATA_INO, FileType::RegularFile, VIRTUAL_FILE_NAME),
        ];
        for (i, &(ino, kind, name)) in entries.iter().enumerate().skip(offset as usize) {
            if reply.add(ino, (i + 1) as i64, kind, name) {
                break;
            }
        }
        reply.ok();
    }

    fn open(&mut self, _req: &Request, ino: u64, _flags: i32, reply: ReplyOpen) {
        // Only the one file can be opened; nothing to set up when it is.
        if ino == DATA_INO {
            reply.opened(0, 0);
        } else {
            reply.error(ENOENT);
        }
    }

    fn read(
        &mut self,
        _req: &Request,
        ino: u64,
        _fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        if ino != DATA_INO {
            reply.error(ENOENT);
            return;
        }
        if offset < 0 {
            error!("read: offset {} must be positive", offset);
            reply.error(EIO);
            return;
        }
        let Ok(mut agg) = self.aggregate.lock() else {
            error!("read: {}", poisoned());
            reply.error(EIO);
            return;
        };

        let mut buf = vec![0u8; size as usize];
        match agg.read(&mut buf, offset as u64) {
            Ok(n) => reply.data(&buf[..n]),
            Err(e) => {
                error!("read: {}", e);
                reply.error(EIO);
            }
        }
    }

    fn write(
        &mut self,
        _req: &Request,
        ino: u64,
        _fh: u64,
        offset: i64,
        data: &[u8],
        _write_flags: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyWrite,
    ) {
        if ino != DATA_INO {
            reply.error(ENOENT);
            return;
        }
        if offset < 0 {
            error!("write: offset {} must be positive", offset);
            reply.error(EIO);
            return;
        }
        let Ok(mut agg) = self.aggregate.lock() else {
            error!("write: {}", poisoned());
            reply.error(EIO);
            return;
        };

        match agg.write(data, offset as u64) {
            Ok(n) => reply.written(n as u32),
            Err(e) => {
                error!("write: {}", e);
                reply.error(EIO);
            }
        }
    }

    fn flush(&mut self, _req: &Request, _ino: u64, _fh: u64, _lock_owner: u64, reply: ReplyEmpty) {
        // Deliberately not a sync: flush fires on every close, and the
        // whole point of the cache is to rewrite covers as rarely as
        // possible. fsync and unmount are the durability points.
        reply.ok();
    }

    fn fsync(&mut self, _req: &Request, ino: u64, _fh: u64, _datasync: bool, reply: ReplyEmpty) {
        if ino != DATA_INO {
            reply.error(ENOENT);
            return;
        }
        let Ok(mut agg) = self.aggregate.lock() else {
            error!("fsync: {}", poisoned());
            reply.error(EIO);
            return;
        };
        match agg.sync() {
            Ok(()) => reply.ok(),
            Err(e) => {
                error!("fsync: {}", e);
                reply.error(EIO);
            }
        }
    }

    fn destroy(&mut self) {
        // Last chance inside the FUSE session. Failures are only logged
        // here; main holds its own handle and retries the sync where it
        // can report the error properly.
        if let Ok(mut agg) = self.aggregate.lock() {
            if let Err(e) = agg.sync() {
                error!("destroy: {}", e);
            }
        }
    }
}

/// Mount `aggregate` at `mountpoint` and serve until unmounted.
pub fn mount(
    aggregate: Arc<Mutex<Aggregate>>,
    mountpoint: &Path,
    allow_root: bool,
    auto_unmount: bool,
) -> Result<()> {
    let fs = StegoFs::new(aggregate)?;
    info!(
        "mounting {} bytes as '{}' at '{}'",
        fs.capacity,
        VIRTUAL_FILE_NAME,
        mountpoint.display()
    );

    let mut options = vec![
        MountOption::FSName("stegoloop".to_string()),
        MountOption::RW,
    ];
    if allow_root {
        options.push(MountOption::AllowRoot);
    }
    if auto_unmount {
        options.push(MountOption::AutoUnmount);
    }

    fuser::mount2(fs, mountpoint, &options)
        .map_err(|e| Error::io(mountpoint, "serve FUSE filesystem at", e))
}

fn poisoned() -> Error {
    Error::BackingStore("aggregate lock poisoned by an earlier panic".to_string())
}
