//! Bulk level transfer: gzip the block array and stream it in 1024-byte chunks.

use std::io::Write;
use std::time::Instant;

use bytes::Bytes;
use classic_engine::world::block::BlockId;
use classic_engine::world::World;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::net::protocol::{LevelDataChunk, LevelFinalize, LevelInitialize, Packet, CHUNK_LEN};
use crate::net::session::Session;
use crate::level::Level;

/// gzip of `i32 volume` (big-endian) followed by every block, each passed
/// through `convert` for the receiving client.
pub fn compress_level<F>(world: &World, convert: F) -> std::io::Result<Vec<u8>>
where
    F: Fn(BlockId) -> BlockId + Sync,
{
    let blocks = world.snapshot(convert);
    let mut encoder = GzEncoder::new(Vec::with_capacity(blocks.len() / 8), Compression::default());
    encoder.write_all(&(world.volume() as i32).to_be_bytes())?;
    encoder.write_all(&blocks)?;
    encoder.finish()
}

/// Split compressed data into chunk packets. The percentage of chunk `i` of
/// `n` is `i * 100 / n`, so the first chunk reports 0.
pub fn chunk_packets(data: &[u8]) -> Vec<LevelDataChunk> {
    let total = data.len().div_ceil(CHUNK_LEN);
    data.chunks(CHUNK_LEN)
        .enumerate()
        .map(|(i, chunk)| LevelDataChunk {
            data: Bytes::copy_from_slice(chunk),
            percent: (i * 100 / total) as u8,
        })
        .collect()
}

/// Full transfer sequence for one session: initialize, chunks, environment
/// (when negotiated), finalize.
pub fn send_level(session: &Session, level: &Level) {
    let started = Instant::now();
    let world = level.world();

    let data = match compress_level(world, |b| session.convert_block(b)) {
        Ok(data) => data,
        Err(e) => {
            tracing::error!("Compressing level {} for {} failed: {}", level.name(), session, e);
            session.kick("Level transfer failed!");
            return;
        }
    };

    session.send_packet(&LevelInitialize);
    for chunk in chunk_packets(&data) {
        session.send_packet(&chunk);
    }
    session.send_appearance(&world.appearance());
    session.send_weather(world.weather());
    session.send_packet(&LevelFinalize {
        width: world.width() as i16,
        height: world.height() as i16,
        depth: world.depth() as i16,
    });

    let elapsed = started.elapsed();
    session.server().metrics.record_transfer(data.len(), elapsed);
    tracing::debug!(
        "Sent level {} to {}: {} bytes compressed ({:.2?})",
        level.name(),
        session,
        data.len(),
        elapsed,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use classic_engine::world::position::BlockPos;
    use flate2::read::GzDecoder;
    use std::io::Read;

    #[test]
    fn compressed_payload_is_prefixed_with_volume() {
        let world = World::new("t", 4, 2, 4);
        world.set_block(BlockPos::new(1, 0, 0), BlockId(60));
        let data = compress_level(&world, |b| if b.0 > 49 { BlockId(20) } else { b }).unwrap();

        let mut raw = Vec::new();
        GzDecoder::new(&data[..]).read_to_end(&mut raw).unwrap();
        assert_eq!(&raw[..4], &32i32.to_be_bytes());
        assert_eq!(raw.len(), 4 + 32);
        assert_eq!(raw[4 + 1], 20);
    }

    #[test]
    fn chunks_cover_data_with_short_tail() {
        let data: Vec<u8> = (0..2500u32).map(|i| i as u8).collect();
        let chunks = chunk_packets(&data);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].data.len(), 1024);
        assert_eq!(chunks[2].data.len(), 452);
        let percents: Vec<u8> = chunks.iter().map(|c| c.percent).collect();
        assert_eq!(percents, vec![0, 33, 66]);
        assert_eq!(chunks[1].data[0], data[1024]);
    }

    #[test]
    fn exact_multiple_has_no_empty_chunk() {
        let chunks = chunk_packets(&[7u8; 2048]);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].percent, 50);
    }
}
