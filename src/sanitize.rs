// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2025 1BitSquared <info@1bitsquared.com>

//! Squashing of VPD blobs and other large opaque properties.
//!
//! The contents of such blobs don't matter for comparing trees, only that they are there and
//! that they were not corrupted on the way. Each one is swapped for a sentinel carrying its
//! length and a checksum.

use log::{debug, trace};

use crate::device_tree::{Node, Property};

/// Properties longer than this many bytes count as blobs. There is nothing special about the
/// number.
pub const BLOB_THRESHOLD: usize = 512;
pub const SENTINEL_MAGIC: u32 = 0xcafebeef;
pub const SENTINEL_SIZE: usize = 12;

/// Weak checksum of a property payload.
///
/// Only good for spotting that a squashed blob differs between two runs; it protects nothing.
pub fn hash_prop(value: &[u8]) -> u32
{
	value
		.iter()
		.enumerate()
		.fold(0u32, |hash, (index, &byte)| {
			hash.wrapping_add(u32::from(byte & !0x10).wrapping_add(1).wrapping_mul(index as u32))
		})
}

/// The record a squashed property is left with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sentinel
{
	pub length: u32,
	pub checksum: u32,
}

impl Sentinel
{
	pub fn for_value(value: &[u8]) -> Self
	{
		Self {
			length: value.len() as u32,
			checksum: hash_prop(value),
		}
	}

	pub fn to_bytes(self) -> [u8; SENTINEL_SIZE]
	{
		let mut bytes = [0u8; SENTINEL_SIZE];
		bytes[0..4].copy_from_slice(&SENTINEL_MAGIC.to_be_bytes());
		bytes[4..8].copy_from_slice(&self.length.to_be_bytes());
		bytes[8..12].copy_from_slice(&self.checksum.to_be_bytes());
		bytes
	}
}

fn squash_property(property: &mut Property) -> bool
{
	if property.is_private() || property.len() <= BLOB_THRESHOLD {
		return false;
	}

	let sentinel = Sentinel::for_value(property.value());
	trace!(
		"Squashing '{}': {} bytes, checksum {:#010x}",
		property.name(),
		sentinel.length,
		sentinel.checksum
	);
	property.set_value(sentinel.to_bytes().to_vec());
	true
}

fn squash_node(node: &mut Node) -> usize
{
	let mut squashed = node.properties_mut().map(squash_property).filter(|&squashed| squashed).count();
	for child in node.children_mut() {
		squashed += squash_node(child);
	}
	squashed
}

/// Squash every oversized, non-private property in the tree, parents before children.
///
/// Returns how many properties were squashed. Running it again squashes nothing, as a sentinel
/// is well under the threshold.
pub fn squash_blobs(root: &mut Node) -> usize
{
	let squashed = squash_node(root);
	debug!("Squashed {} blob properties", squashed);
	squashed
}
