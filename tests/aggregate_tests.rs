//! End-to-end tests over real cover images.

use image::ExtendedColorType;
use std::path::{Path, PathBuf};
use stegoloop::{Aggregate, Error};
use tempfile::TempDir;

/// Deterministic sample pattern so two directories can hold bit-identical
/// covers.
fn pixel_pattern(w: u32, h: u32, channels: u8) -> Vec<u8> {
    (0..w as usize * h as usize * channels as usize)
        .map(|i| ((i * 31 + 17) % 256) as u8)
        .collect()
}

fn make_cover(dir: &Path, name: &str, w: u32, h: u32, channels: u8) -> PathBuf {
    let path = dir.join(name);
    let color = match channels {
        1 => ExtendedColorType::L8,
        3 => ExtendedColorType::Rgb8,
        4 => ExtendedColorType::Rgba8,
        _ => panic!("unexpected channel count"),
    };
    image::save_buffer(&path, &pixel_pattern(w, h, channels), w, h, color)
        .expect("failed to write cover image");
    path
}

/// Three 10x10 RGB PNGs: 300 samples each, 37 bytes per cover, 111 total.
fn three_png_dir() -> TempDir {
    let dir = TempDir::new().expect("failed to create temp dir");
    for name in ["one.png", "two.png", "three.png"] {
        make_cover(dir.path(), name, 10, 10, 3);
    }
    dir
}

fn raw_samples(path: &Path) -> Vec<u8> {
    image::open(path)
        .expect("failed to reopen cover")
        .into_rgb8()
        .into_raw()
}

#[test]
fn capacity_of_three_rgb_pngs() {
    let dir = three_png_dir();
    let agg: Aggregate = Aggregate::open(dir.path(), b"seed").expect("failed to open aggregate");

    assert_eq!(agg.region_count(), 3);
    assert_eq!(agg.capacity(), 111);
}

#[test]
fn full_round_trip_and_lsb_accounting() {
    let dir = three_png_dir();
    let mut agg: Aggregate =
        Aggregate::open(dir.path(), b"accounting").expect("failed to open aggregate");

    let payload: Vec<u8> = (0u8..111).collect();
    assert_eq!(agg.write(&payload, 0).expect("write failed"), 111);

    // Before sync.
    let mut back = vec![0u8; 111];
    agg.read(&mut back, 0).expect("read failed");
    assert_eq!(back, payload);

    agg.sync().expect("sync failed");
    assert!(agg.is_synced());

    // After sync.
    let mut back = vec![0u8; 111];
    agg.read(&mut back, 0).expect("read after sync failed");
    assert_eq!(back, payload);

    // The ones among the embedded LSBs must match the ones in the payload:
    // the physical bytes are a permutation of the logical bytes. Each
    // cover embeds 37 bytes into its first 296 samples; the 4 tail samples
    // stay untouched.
    let payload_ones: u32 = payload.iter().map(|b| b.count_ones()).sum();
    let mut embedded_ones = 0u32;
    let original = pixel_pattern(10, 10, 3);
    for name in ["one.png", "two.png", "three.png"] {
        let samples = raw_samples(&dir.path().join(name));
        assert_eq!(samples.len(), 300);
        embedded_ones += samples[..296].iter().map(|s| (*s & 1) as u32).sum::<u32>();
        assert_eq!(&samples[296..], &original[296..300], "tail samples changed");
        for (s, o) in samples.iter().zip(original.iter()) {
            assert_eq!(s >> 1, o >> 1, "a non-LSB bit changed in {}", name);
        }
    }
    assert_eq!(embedded_ones, payload_ones);
}

#[test]
fn different_seeds_differ_on_disk_but_not_logically() {
    let dir_a = three_png_dir();
    let dir_b = three_png_dir();
    let payload: Vec<u8> = (0u8..111).collect();

    let mut agg_a: Aggregate = Aggregate::open(dir_a.path(), b"alpha").expect("open a");
    let mut agg_b: Aggregate = Aggregate::open(dir_b.path(), b"beta").expect("open b");
    agg_a.write(&payload, 0).expect("write a");
    agg_b.write(&payload, 0).expect("write b");
    agg_a.sync().expect("sync a");
    agg_b.sync().expect("sync b");

    // At least one sample's LSB differs between the two dispersals.
    let mut any_lsb_differs = false;
    for name in ["one.png", "two.png", "three.png"] {
        let a = raw_samples(&dir_a.path().join(name));
        let b = raw_samples(&dir_b.path().join(name));
        if a.iter().zip(b.iter()).any(|(x, y)| (x & 1) != (y & 1)) {
            any_lsb_differs = true;
        }
    }
    assert!(any_lsb_differs);

    // Both logical files read the same.
    for (dir, seed) in [(&dir_a, b"alpha" as &[u8]), (&dir_b, b"beta")] {
        let mut agg: Aggregate = Aggregate::open(dir.path(), seed).expect("reopen");
        let mut back = vec![0u8; 111];
        agg.read(&mut back, 0).expect("read back");
        assert_eq!(back, payload);
    }
}

#[test]
fn four_channel_bmp_aborts_construction_without_touching_files() {
    let dir = three_png_dir();
    let bmp = make_cover(dir.path(), "bad.bmp", 6, 6, 4);
    let before: Vec<(PathBuf, Vec<u8>)> = ["one.png", "two.png", "three.png"]
        .iter()
        .map(|n| dir.path().join(n))
        .chain(std::iter::once(bmp))
        .map(|p| (p.clone(), std::fs::read(&p).unwrap()))
        .collect();

    let err = Aggregate::<stegoloop::StegoCodec>::open(dir.path(), b"seed").unwrap_err();
    assert!(
        err.to_string().contains("4-channel BMP"),
        "unexpected error: {}",
        err
    );

    for (path, bytes) in before {
        assert_eq!(std::fs::read(&path).unwrap(), bytes, "{:?} was modified", path);
    }
}

#[test]
fn interior_write_survives_remount() {
    let dir = three_png_dir();
    let payload = [0xC3u8; 50];
    {
        let mut agg: Aggregate = Aggregate::open(dir.path(), b"remount").expect("open");
        assert_eq!(agg.write(&payload, 30).expect("write"), 50);
        agg.sync().expect("sync");
    }

    let mut agg: Aggregate = Aggregate::open(dir.path(), b"remount").expect("reopen");
    let mut back = [0u8; 50];
    assert_eq!(agg.read(&mut back, 30).expect("read"), 50);
    assert_eq!(back, payload);
}

#[test]
fn swapped_cover_fails_lazily_and_locally() {
    let dir = three_png_dir();
    let mut agg: Aggregate = Aggregate::open(dir.path(), b"lazy").expect("open");

    // Between construction and the first read, replace one cover with a
    // 9x9 image of the same format.
    make_cover(dir.path(), "two.png", 9, 9, 3);

    let mut changed = 0u64;
    let mut fine = 0u64;
    for offset in 0..agg.capacity() {
        match agg.read(&mut [0u8; 1], offset) {
            Ok(n) => {
                assert_eq!(n, 1);
                fine += 1;
            }
            Err(err) => {
                assert!(err.is_changed(), "unexpected error: {}", err);
                changed += 1;
            }
        }
    }
    // Exactly the 37 bytes dispersed into the swapped cover fail; the
    // other regions keep working.
    assert_eq!(changed, 37);
    assert_eq!(fine, 74);
}

#[test]
fn empty_directory_fails_construction() {
    let dir = TempDir::new().expect("failed to create temp dir");
    let err = Aggregate::<stegoloop::StegoCodec>::open(dir.path(), b"seed").unwrap_err();
    assert!(matches!(err, Error::BackingStore(_)));
    assert!(err.to_string().contains("no regular files"));
}

#[test]
fn mixed_formats_in_one_aggregate() {
    let dir = TempDir::new().expect("failed to create temp dir");
    make_cover(dir.path(), "a.png", 10, 10, 3); // 37 bytes
    make_cover(dir.path(), "b.bmp", 8, 8, 3); // 24 bytes
    make_cover(dir.path(), "c.tga", 12, 4, 3); // 18 bytes
    make_cover(dir.path(), "d.png", 16, 8, 1); // 16 bytes

    let mut agg: Aggregate = Aggregate::open(dir.path(), b"mixed").expect("open");
    assert_eq!(agg.capacity(), 37 + 24 + 18 + 16);

    let payload: Vec<u8> = (0..agg.capacity()).map(|i| (i % 251) as u8).collect();
    agg.write(&payload, 0).expect("write");
    agg.sync().expect("sync");

    let mut agg: Aggregate = Aggregate::open(dir.path(), b"mixed").expect("reopen");
    let mut back = vec![0u8; payload.len()];
    agg.read(&mut back, 0).expect("read");
    assert_eq!(back, payload);
}

#[test]
fn sync_is_idempotent_across_the_aggregate() {
    let dir = three_png_dir();
    let mut agg: Aggregate = Aggregate::open(dir.path(), b"idem").expect("open");
    agg.write(&[0x55u8; 111], 0).expect("write");
    agg.sync().expect("first sync");

    let after_first: Vec<Vec<u8>> = ["one.png", "two.png", "three.png"]
        .iter()
        .map(|n| std::fs::read(dir.path().join(n)).unwrap())
        .collect();

    agg.sync().expect("second sync");
    let after_second: Vec<Vec<u8>> = ["one.png", "two.png", "three.png"]
        .iter()
        .map(|n| std::fs::read(dir.path().join(n)).unwrap())
        .collect();
    assert_eq!(after_first, after_second);
}
