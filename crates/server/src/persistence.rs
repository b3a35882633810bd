//! Level persistence in the `.lvl` format.
//!
//! A `.lvl` file is a gzip stream holding an 18-byte big-endian header
//! followed by `width * height * depth` block bytes in y-z-x order:
//!
//! | field | type |
//! |-------|------|
//! | version (1874) | u16 |
//! | width, height, depth | u16 ×3 |
//! | spawn x, y, z (1/32 units) | u16 ×3 |
//! | spawn yaw, pitch | u8 ×2 |
//! | visit, build permission | u8 ×2 |

use std::fs;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use bytes::{Buf, BufMut};
use classic_engine::world::position::Location;
use classic_engine::world::World;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::block;
use crate::level::Level;
use crate::net::protocol::{from_angle, to_angle};

pub const LVL_VERSION: u16 = 1874;
const HEADER_LEN: usize = 18;

pub fn level_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{}.lvl", name))
}

// ── Encoding ─────────────────────────────────────────────────────────────────

fn encode_header(level: &Level) -> [u8; HEADER_LEN] {
    let world = level.world();
    let spawn = world.spawn();
    let mut header = [0u8; HEADER_LEN];
    let mut buf = &mut header[..];
    buf.put_u16(LVL_VERSION);
    buf.put_u16(world.width() as u16);
    buf.put_u16(world.height() as u16);
    buf.put_u16(world.depth() as u16);
    buf.put_u16((spawn.x * 32.0) as u16);
    buf.put_u16((spawn.y * 32.0) as u16);
    buf.put_u16((spawn.z * 32.0) as u16);
    buf.put_u8(to_angle(spawn.yaw));
    buf.put_u8(to_angle(spawn.pitch));
    buf.put_u8(level.visit_permission());
    buf.put_u8(level.build_permission());
    header
}

/// Write `level` as a `.lvl` stream into `out`.
pub fn write_level<W: Write>(level: &Level, out: W) -> Result<()> {
    let mut encoder = GzEncoder::new(out, Compression::default());
    encoder.write_all(&encode_header(level))?;
    encoder.write_all(&level.world().snapshot(|b| b))?;
    encoder.finish()?;
    Ok(())
}

/// Read a `.lvl` stream into a new level called `name`.
pub fn read_level<R: Read>(name: &str, input: R) -> Result<Level> {
    let mut decoder = GzDecoder::new(input);
    let mut header = [0u8; HEADER_LEN];
    decoder
        .read_exact(&mut header)
        .context("reading level header")?;

    let mut buf = &header[..];
    let version = buf.get_u16();
    if version != LVL_VERSION {
        bail!("unsupported level format version {}", version);
    }
    let (width, height, depth) = (
        buf.get_u16() as usize,
        buf.get_u16() as usize,
        buf.get_u16() as usize,
    );
    let spawn = Location::new(
        buf.get_u16() as f64 / 32.0,
        buf.get_u16() as f64 / 32.0,
        buf.get_u16() as f64 / 32.0,
        from_angle(buf.get_u8()),
        from_angle(buf.get_u8()),
    );
    let (visit, build) = (buf.get_u8(), buf.get_u8());

    let mut blocks = vec![0u8; width * height * depth];
    decoder
        .read_exact(&mut blocks)
        .with_context(|| format!("reading {}x{}x{} blocks", width, height, depth))?;

    let Some(world) = World::from_blocks(name, width, height, depth, blocks) else {
        bail!("block data does not match {}x{}x{}", width, height, depth);
    };
    world.set_spawn(spawn);
    world.set_appearance(block::default_appearance(height));
    world.take_dirty();

    let level = Level::new(world);
    level.set_permissions(visit, build);
    Ok(level)
}

// ── Save ─────────────────────────────────────────────────────────────────────

/// Save one level to `<dir>/<name>.lvl`, via a temporary file so a crash
/// mid-write never truncates the previous save.
pub fn save_level(level: &Level, dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    let path = level_path(dir, level.name());
    let tmp = path.with_extension("lvl.tmp");

    let file = fs::File::create(&tmp).with_context(|| format!("creating {}", tmp.display()))?;
    let mut out = BufWriter::new(file);
    write_level(level, &mut out).with_context(|| format!("writing {}", tmp.display()))?;
    out.flush()?;
    drop(out);

    fs::rename(&tmp, &path).with_context(|| format!("replacing {}", path.display()))?;
    Ok(())
}

/// Save every level with unsaved changes. Returns how many were written.
pub fn save_dirty(levels: &[Arc<Level>], dir: &Path) -> Result<usize> {
    let start = Instant::now();
    let mut saved = 0usize;
    for level in levels {
        if !level.world().take_dirty() {
            continue;
        }
        if let Err(e) = save_level(level, dir) {
            level.world().mark_dirty();
            return Err(e.context(format!("saving level {}", level.name())));
        }
        saved += 1;
    }
    if saved > 0 {
        tracing::info!("Saved {} levels ({:.2?})", saved, start.elapsed());
    }
    Ok(saved)
}

// ── Load ─────────────────────────────────────────────────────────────────────

/// Load `<dir>/<name>.lvl`. Returns `None` if the file does not exist.
pub fn load_level(name: &str, dir: &Path) -> Result<Option<Level>> {
    let path = level_path(dir, name);
    if !path.is_file() {
        return Ok(None);
    }
    let start = Instant::now();
    let file = fs::File::open(&path).with_context(|| format!("opening {}", path.display()))?;
    let level = read_level(name, BufReader::new(file))
        .with_context(|| format!("loading {}", path.display()))?;
    tracing::info!(
        "Level {} loaded: {}x{}x{} ({:.2?})",
        name,
        level.world().width(),
        level.world().height(),
        level.world().depth(),
        start.elapsed(),
    );
    Ok(Some(level))
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use classic_engine::world::position::BlockPos;

    #[test]
    fn header_layout() {
        let level = Level::new(World::new("h", 16, 8, 32));
        level
            .world()
            .set_spawn(Location::new(1.5, 2.0, 3.0, 90.0, 0.0));
        level.set_permissions(1, 2);
        let header = encode_header(&level);
        assert_eq!(
            header,
            [
                0x07, 0x52, // 1874
                0, 16, 0, 8, 0, 32, // dimensions
                0, 48, 0, 64, 0, 96, // spawn
                64, 0, // yaw, pitch
                1, 2, // permissions
            ]
        );
    }

    #[test]
    fn rejects_unknown_version() {
        let mut raw = Vec::new();
        let mut encoder = GzEncoder::new(&mut raw, Compression::default());
        encoder.write_all(&[0x00, 0x01]).unwrap();
        encoder.write_all(&[0u8; HEADER_LEN - 2]).unwrap();
        encoder.finish().unwrap();

        let err = read_level("bad", &raw[..]).unwrap_err();
        assert!(err.to_string().contains("version"));
    }

    #[test]
    fn rejects_truncated_blocks() {
        let level = Level::new(World::new("short", 4, 4, 4));
        let mut raw = Vec::new();
        let mut encoder = GzEncoder::new(&mut raw, Compression::default());
        encoder.write_all(&encode_header(&level)).unwrap();
        encoder.write_all(&[1u8; 10]).unwrap();
        encoder.finish().unwrap();

        assert!(read_level("short", &raw[..]).is_err());
    }

    #[test]
    fn test_save_load_roundtrip() {
        let level = Level::flat("roundtrip", 16, 16, 16);
        level.set_block(BlockPos::new(3, 12, 4), block::GLASS, false);
        level.set_permissions(0, 3);

        let tmp = std::env::temp_dir().join("classic_server_test_persistence");
        let _ = fs::remove_dir_all(&tmp);
        save_level(&level, &tmp).unwrap();
        assert!(tmp.join("roundtrip.lvl").exists());

        let loaded = load_level("roundtrip", &tmp)
            .unwrap()
            .expect("level should load");
        assert_eq!(loaded.world().snapshot(|b| b), level.world().snapshot(|b| b));
        assert_eq!(loaded.get_block(BlockPos::new(3, 12, 4)), block::GLASS);
        assert_eq!(loaded.world().spawn(), level.world().spawn());
        assert_eq!(loaded.build_permission(), 3);
        assert!(!loaded.world().is_dirty());

        assert!(load_level("missing", &tmp).unwrap().is_none());
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn test_save_dirty_only_writes_changed_levels() {
        let clean = Arc::new(Level::flat("clean", 8, 8, 8));
        let edited = Arc::new(Level::flat("edited", 8, 8, 8));
        edited.set_block(BlockPos::new(0, 7, 0), block::STONE, false);

        let tmp = std::env::temp_dir().join("classic_server_test_save_dirty");
        let _ = fs::remove_dir_all(&tmp);

        let levels = vec![Arc::clone(&clean), Arc::clone(&edited)];
        assert_eq!(save_dirty(&levels, &tmp).unwrap(), 1);
        assert!(tmp.join("edited.lvl").exists());
        assert!(!tmp.join("clean.lvl").exists());

        // Nothing changed since.
        assert_eq!(save_dirty(&levels, &tmp).unwrap(), 0);
        let _ = fs::remove_dir_all(&tmp);
    }
}
