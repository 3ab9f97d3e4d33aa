// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2025 1BitSquared <info@1bitsquared.com>

//! Builders for small SPIRA and heap dumps.

#![allow(dead_code)]

use std::io::Write;

use color_eyre::eyre::Result;
use hdatutil::spira::{HDIF_HEADER_SIZE, HDIF_MAGIC, HeaderVariant, NTUPLE_SIZE};
use tempfile::NamedTempFile;

/// Where the heap used to live in all of these dumps.
pub const BASE: u64 = 0x2000;
pub const HEAP_LEN: usize = 4096;

/// Slot of the `ipl-parms` n-tuple in both SPIRA and SPIRA-S.
pub const IPL_PARMS: usize = 1;
/// SPIRA slots of a few other n-tuples.
pub const SLCA: usize = 3;
pub const CPU_CTRL: usize = 16;
pub const PROC_CHIP: usize = 22;

pub fn hdif(id: &[u8; 6]) -> Vec<u8>
{
	let mut bytes = vec![0u8; HDIF_HEADER_SIZE];
	bytes[0..2].copy_from_slice(&HDIF_MAGIC.to_be_bytes());
	bytes[2..8].copy_from_slice(id);
	bytes[0x0a..0x0c].copy_from_slice(&0x20u16.to_be_bytes());
	bytes
}

pub fn ntuple(address: u64, count: u16, len: u32) -> [u8; NTUPLE_SIZE]
{
	let mut bytes = [0u8; NTUPLE_SIZE];
	bytes[0..8].copy_from_slice(&address.to_be_bytes());
	bytes[0x08..0x0a].copy_from_slice(&count.to_be_bytes());
	bytes[0x0a..0x0c].copy_from_slice(&count.to_be_bytes());
	bytes[0x0c..0x10].copy_from_slice(&len.to_be_bytes());
	bytes[0x10..0x14].copy_from_slice(&len.to_be_bytes());
	bytes
}

/// A structure with an HDIF header and an n-tuple array holding `slots` slots.
fn with_ntuples(id: &[u8; 6], len: usize, slots: u32, ntuples: &[(usize, [u8; NTUPLE_SIZE])]) -> Vec<u8>
{
	let mut dump = vec![0u8; len];
	dump[..HDIF_HEADER_SIZE].copy_from_slice(&hdif(id));
	dump[0x30..0x34].copy_from_slice(&0x10u32.to_be_bytes());
	dump[0x34..0x38].copy_from_slice(&slots.to_be_bytes());
	dump[0x38..0x3c].copy_from_slice(&(NTUPLE_SIZE as u32).to_be_bytes());
	for (slot, bytes) in ntuples {
		let offset = 0x40 + slot * NTUPLE_SIZE;
		dump[offset..offset + NTUPLE_SIZE].copy_from_slice(bytes);
	}
	dump
}

/// A SPIRA dump whose heap n-tuple points at [`BASE`], plus the given n-tuples.
pub fn spira(ntuples: &[(usize, [u8; NTUPLE_SIZE])]) -> Vec<u8>
{
	let mut all = vec![(20, ntuple(BASE, 0, 0))];
	all.extend_from_slice(ntuples);
	with_ntuples(b"SPIRA ", HeaderVariant::Spira.record_size(), 25, &all)
}

/// A SPIRA-H dump whose hs-data-area n-tuple points at [`BASE`].
pub fn spirah() -> Vec<u8>
{
	with_ntuples(b"SPIRAH", HeaderVariant::Spirah.record_size(), 7, &[(0, ntuple(BASE, 0, 0))])
}

/// A heap with a SPIRA-S at its start, itself holding the given n-tuples.
pub fn spiras_heap(ntuples: &[(usize, [u8; NTUPLE_SIZE])]) -> Vec<u8>
{
	let mut heap = with_ntuples(b"SPIRAS", 0x300, 21, ntuples);
	heap.resize(HEAP_LEN, 0);
	heap
}

/// A heap holding a 600 byte blob at offset 0x100, just over the squashing threshold.
pub fn blob_heap() -> Vec<u8>
{
	let mut heap = vec![0u8; HEAP_LEN];
	heap[0x100..0x100 + 600].fill(0x42);
	heap
}

pub fn dump_file(bytes: &[u8]) -> Result<NamedTempFile>
{
	let mut file = NamedTempFile::new()?;
	file.write_all(bytes)?;
	file.flush()?;
	Ok(file)
}

pub const FDT_MAGIC: u32 = 0xd00dfeed;

/// The `totalsize` a blob's header claims, if it has an FDT header at all.
pub fn fdt_totalsize(blob: &[u8]) -> Option<u32>
{
	let magic = u32::from_be_bytes(blob.get(0..4)?.try_into().ok()?);
	if magic != FDT_MAGIC {
		return None;
	}
	Some(u32::from_be_bytes(blob.get(4..8)?.try_into().ok()?))
}

pub fn contains(haystack: &[u8], needle: &[u8]) -> bool
{
	haystack.windows(needle.len()).any(|window| window == needle)
}
