//! The on-disk binary log format: a 24-byte header followed by four map
//! sections (M1 source-path, M2 current-checkpoint-name, M3
//! snapshot-filename, M4 root-tree-node), each a list of absolute-offset
//! bucket records pointing at the serialized key/value blobs.
//!
//! Writes go to a temp file in the working directory and are renamed into
//! place once fully flushed, so a crash mid-write never leaves a partial
//! `CpLog` behind — a zeroed-magic sentinel header is rewritten once the
//! body is fully flushed, strengthened here to a full atomic rename.

use std::fs::{self, File};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::Path;

use checkpoint_core::CheckpointError;

use crate::hash_map::CheckpointMap;
use crate::log::CheckpointLog;
use crate::tree::{CheckpointTreeNode, NodeRef};

const MAGIC: u32 = 0x0CAF_E00D;
const HEADER_SIZE: usize = 24;

pub fn write_log(path: &Path, log: &CheckpointLog) -> Result<(), CheckpointError> {
    let tmp_path = path.with_extension("tmp");
    {
        let mut file = File::create(&tmp_path).map_err(|source| CheckpointError::Setup {
            path: tmp_path.display().to_string(),
            source,
        })?;

        file.write_all(&[0u8; HEADER_SIZE])?;

        let m1_size = write_string_section(&mut file, &log.source_paths)?;
        let m2_size = write_string_section(&mut file, &log.current_checkpoints)?;
        let m3_size = write_string_section(&mut file, &log.snapshot_names)?;
        let m4_size = write_tree_section(&mut file, &log.trees)?;

        let total_bytes = HEADER_SIZE as u32 + m1_size + m2_size + m3_size + m4_size;

        file.seek(SeekFrom::Start(0))?;
        let mut header = [0u8; HEADER_SIZE];
        header[0..4].copy_from_slice(&MAGIC.to_le_bytes());
        header[4..8].copy_from_slice(&total_bytes.to_le_bytes());
        header[8..12].copy_from_slice(&m1_size.to_le_bytes());
        header[12..16].copy_from_slice(&m2_size.to_le_bytes());
        header[16..20].copy_from_slice(&m3_size.to_le_bytes());
        header[20..24].copy_from_slice(&m4_size.to_le_bytes());
        file.write_all(&header)?;
        file.sync_all()?;
    }
    fs::rename(&tmp_path, path).map_err(CheckpointError::Io)?;
    Ok(())
}

pub fn read_log(path: &Path) -> Result<CheckpointLog, CheckpointError> {
    if !path.exists() {
        return Ok(CheckpointLog::new());
    }

    let bytes = fs::read(path)?;
    if bytes.len() < HEADER_SIZE {
        tracing::warn!(
            path = %path.display(),
            "log file too small to contain a header; treating repository as empty"
        );
        return Ok(CheckpointLog::new());
    }

    let magic = read_u32(&bytes, 0)?;
    if magic != MAGIC {
        tracing::warn!(
            path = %path.display(),
            "log file magic mismatch, likely a crash-interrupted write; treating repository as empty"
        );
        return Ok(CheckpointLog::new());
    }

    let size_m1 = read_u32(&bytes, 8)? as usize;
    let size_m2 = read_u32(&bytes, 12)? as usize;
    let size_m3 = read_u32(&bytes, 16)? as usize;
    let size_m4 = read_u32(&bytes, 20)? as usize;

    let mut offset = HEADER_SIZE;
    let m1 = decode_string_section(&bytes, offset, size_m1)?;
    offset += size_m1;
    let m2 = decode_string_section(&bytes, offset, size_m2)?;
    offset += size_m2;
    let m3 = decode_string_section(&bytes, offset, size_m3)?;
    offset += size_m3;
    let m4 = decode_tree_section(&bytes, offset, size_m4)?;

    Ok(CheckpointLog::from_maps(m1, m2, m3, m4))
}

// ---- string map sections (M1, M2, M3) ----

fn write_string_section<W: Write + Seek>(
    w: &mut W,
    map: &CheckpointMap<String>,
) -> io::Result<u32> {
    let section_start = w.stream_position()?;
    let entries = map.entries();

    let blobs: Vec<Vec<u8>> = entries
        .iter()
        .map(|(key, value)| {
            let mut blob = Vec::new();
            blob.extend_from_slice(&key.to_le_bytes());
            let bytes = value.as_bytes();
            blob.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
            blob.extend_from_slice(bytes);
            blob
        })
        .collect();

    write_bucket_rec_list(w, section_start, &blobs)?;

    let section_end = w.stream_position()?;
    Ok((section_end - section_start) as u32)
}

fn decode_string_section(
    bytes: &[u8],
    section_offset: usize,
    section_size: usize,
) -> Result<CheckpointMap<String>, CheckpointError> {
    let mut map = CheckpointMap::new();
    if section_size == 0 {
        return Ok(map);
    }

    let num_buckets = read_u32(bytes, section_offset)? as usize;
    let mut rec_offset = section_offset + 4;
    for _ in 0..num_buckets {
        let bucket_pos = read_u32(bytes, rec_offset + 4)? as usize;
        rec_offset += 8;

        let key = read_u64(bytes, bucket_pos)?;
        let len = read_u32(bytes, bucket_pos + 8)? as usize;
        let start = bucket_pos + 12;
        let raw = bytes
            .get(start..start + len)
            .ok_or_else(|| CheckpointError::LogRead("string bucket out of bounds".into()))?;
        let value = std::str::from_utf8(raw)
            .map_err(|_| CheckpointError::LogRead("invalid UTF-8 in string bucket".into()))?
            .to_string();
        map.insert(key, value);
    }
    Ok(map)
}

// ---- tree map section (M4) ----

fn write_tree_section<W: Write + Seek>(
    w: &mut W,
    map: &CheckpointMap<NodeRef>,
) -> io::Result<u32> {
    let section_start = w.stream_position()?;
    let entries = map.entries();

    let blobs: Vec<Vec<u8>> = entries
        .iter()
        .map(|(key, root)| {
            let mut blob = Vec::new();
            blob.extend_from_slice(&key.to_le_bytes());
            encode_tree_node(&root.borrow(), &mut blob);
            blob
        })
        .collect();

    write_bucket_rec_list(w, section_start, &blobs)?;

    let section_end = w.stream_position()?;
    Ok((section_end - section_start) as u32)
}

fn decode_tree_section(
    bytes: &[u8],
    section_offset: usize,
    section_size: usize,
) -> Result<CheckpointMap<NodeRef>, CheckpointError> {
    let mut map = CheckpointMap::new();
    if section_size == 0 {
        return Ok(map);
    }

    let num_buckets = read_u32(bytes, section_offset)? as usize;
    let mut rec_offset = section_offset + 4;
    for _ in 0..num_buckets {
        let bucket_pos = read_u32(bytes, rec_offset + 4)? as usize;
        rec_offset += 8;

        let key = read_u64(bytes, bucket_pos)?;
        let root = decode_tree_node(bytes, bucket_pos + 8)?;
        map.insert(key, root);
    }
    Ok(map)
}

/// `FileTreeHeader { name_length: u32, num_children: u32 }` followed by the
/// NUL-terminated name, a `u32 × num_children` child-offset table (each
/// offset counted from the start of that table), then the children's
/// `FileTreeNode`s in the same order, recursively.
fn encode_tree_node(node: &CheckpointTreeNode, out: &mut Vec<u8>) {
    let name_bytes = node.name.as_bytes();
    let name_length = (name_bytes.len() + 1) as u32;
    let children = node.children.to_vec();
    let num_children = children.len() as u32;

    out.extend_from_slice(&name_length.to_le_bytes());
    out.extend_from_slice(&num_children.to_le_bytes());
    out.extend_from_slice(name_bytes);
    out.push(0);

    if children.is_empty() {
        return;
    }

    let child_blobs: Vec<Vec<u8>> = children
        .iter()
        .map(|child| {
            let mut blob = Vec::new();
            encode_tree_node(&child.borrow(), &mut blob);
            blob
        })
        .collect();

    let offsets_array_size = child_blobs.len() as u32 * 4;
    let mut running_offset = offsets_array_size;
    let mut offsets = Vec::with_capacity(child_blobs.len());
    for blob in &child_blobs {
        offsets.push(running_offset);
        running_offset += blob.len() as u32;
    }

    for off in &offsets {
        out.extend_from_slice(&off.to_le_bytes());
    }
    for blob in &child_blobs {
        out.extend_from_slice(blob);
    }
}

fn decode_tree_node(bytes: &[u8], pos: usize) -> Result<NodeRef, CheckpointError> {
    let name_length = read_u32(bytes, pos)? as usize;
    let num_children = read_u32(bytes, pos + 4)? as usize;
    let name_start = pos + 8;
    let name_end = name_start + name_length;
    let raw_name = bytes
        .get(name_start..name_end)
        .ok_or_else(|| CheckpointError::LogRead("tree node name out of bounds".into()))?;
    let trimmed = &raw_name[..raw_name.len().saturating_sub(1)];
    let name = std::str::from_utf8(trimmed)
        .map_err(|_| CheckpointError::LogRead("invalid UTF-8 in tree node name".into()))?
        .to_string();

    let node = CheckpointTreeNode::create_node(name, None);

    if num_children > 0 {
        let offsets_start = name_end;
        let mut offsets = Vec::with_capacity(num_children);
        for i in 0..num_children {
            offsets.push(read_u32(bytes, offsets_start + i * 4)? as usize);
        }
        // Reversed: each insert_child prepends, so re-inserting in reverse
        // file order reproduces the original child list order.
        for off in offsets.into_iter().rev() {
            let child_pos = offsets_start + off;
            let child = decode_tree_node(bytes, child_pos)?;
            crate::tree::insert_child(&node, &child);
        }
    }

    Ok(node)
}

// ---- shared bucket-record-list plumbing ----

fn write_bucket_rec_list<W: Write + Seek>(
    w: &mut W,
    section_start: u64,
    blobs: &[Vec<u8>],
) -> io::Result<()> {
    let num_buckets = blobs.len() as u32;
    let header_bytes = 4 + (blobs.len() as u64) * 8;
    let mut pos = section_start + header_bytes;
    let mut bucket_recs = Vec::with_capacity(blobs.len());
    for blob in blobs {
        bucket_recs.push((blob.len() as u32, pos as u32));
        pos += blob.len() as u64;
    }

    w.write_all(&num_buckets.to_le_bytes())?;
    for (size, bpos) in &bucket_recs {
        w.write_all(&size.to_le_bytes())?;
        w.write_all(&bpos.to_le_bytes())?;
    }
    for blob in blobs {
        w.write_all(blob)?;
    }
    Ok(())
}

fn read_u32(bytes: &[u8], at: usize) -> Result<u32, CheckpointError> {
    let raw = bytes
        .get(at..at + 4)
        .ok_or_else(|| CheckpointError::LogRead(format!("u32 field out of bounds at {at}")))?;
    Ok(u32::from_le_bytes(raw.try_into().unwrap()))
}

fn read_u64(bytes: &[u8], at: usize) -> Result<u64, CheckpointError> {
    let raw = bytes
        .get(at..at + 8)
        .ok_or_else(|| CheckpointError::LogRead(format!("u64 field out of bounds at {at}")))?;
    Ok(u64::from_le_bytes(raw.try_into().unwrap()))
}
