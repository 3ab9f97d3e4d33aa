// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2025 1BitSquared <info@1bitsquared.com>

use std::fs::File;
use std::path::Path;

use log::info;
use memmap2::{Mmap, MmapMut};

use crate::error::HeapError;

/// Read-only view of a heap dump, as captured on disk.
pub struct MappedRegion
{
	// None when the dump is empty; zero-length files cannot be mapped.
	map: Option<Mmap>,
}

impl MappedRegion
{
	/// Map the heap dump at `path` read-only. The region is exactly as long as the file.
	pub fn open(path: &Path) -> Result<Self, HeapError>
	{
		let file = File::open(path).map_err(|source| HeapError::Open {
			source,
			path: path.to_path_buf(),
		})?;
		let file_len = file
			.metadata()
			.map_err(|source| HeapError::Map {
				source,
				path: path.to_path_buf(),
			})?
			.len();

		let map = if file_len == 0 {
			None
		} else {
			// Safety: the map is read-only and lives no longer than this region; nothing in this
			// process writes to the dump while a conversion runs.
			let map = unsafe { Mmap::map(&file) }.map_err(|source| HeapError::Map {
				source,
				path: path.to_path_buf(),
			})?;
			Some(map)
		};

		info!("Mapped heap dump {} ({} bytes)", path.display(), file_len);
		Ok(Self {
			map,
		})
	}

	/// Build a read-only region holding a copy of `bytes`, backed by an anonymous mapping.
	pub fn from_bytes(bytes: &[u8]) -> Result<Self, HeapError>
	{
		if bytes.is_empty() {
			return Ok(Self {
				map: None,
			});
		}

		let anonymous = |source| HeapError::Anonymous {
			source,
			len: bytes.len(),
		};
		let mut map = MmapMut::map_anon(bytes.len()).map_err(anonymous)?;
		map.copy_from_slice(bytes);
		let map = map.make_read_only().map_err(anonymous)?;

		Ok(Self {
			map: Some(map),
		})
	}

	pub fn len(&self) -> usize
	{
		self.map.as_ref().map_or(0, |map| map.len())
	}

	pub fn is_empty(&self) -> bool
	{
		self.len() == 0
	}

	pub fn as_bytes(&self) -> &[u8]
	{
		match &self.map {
			Some(map) => &map[..],
			None => &[],
		}
	}

	/// The `len` bytes at `offset`, or None if any of them lie past the end of the region.
	pub fn slice(&self, offset: usize, len: usize) -> Option<&[u8]>
	{
		let end = offset.checked_add(len)?;
		self.as_bytes().get(offset..end)
	}
}
