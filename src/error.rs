// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2025 1BitSquared <info@1bitsquared.com>

//! Module for error handling code.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// A relative address that does not land inside the mapped heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ResolveError
{
	#[error("address {address:#x} precedes the heap base address {base:#x} (expected address >= {base:#x})")]
	BelowBase
	{
		address: u64,
		base: u64,
	},

	#[error("address {address:#x} lies outside the mapped heap (expected {base:#x} <= address < {end:#x})")]
	OutsideHeap
	{
		address: u64,
		base: u64,
		end: u64,
	},
}

#[derive(Debug, Error)]
pub enum HeaderError
{
	#[error("opening {}", .path.display())]
	Open
	{
		#[source]
		source: io::Error,
		path: PathBuf,
	},

	#[error("reading {}", .path.display())]
	Read
	{
		#[source]
		source: io::Error,
		path: PathBuf,
	},

	#[error("reading {} gave {read} bytes, the header needs at least {required}", .path.display())]
	Truncated
	{
		path: PathBuf,
		read: usize,
		required: usize,
	},

	/// A field was requested from the part of the record the dump never populated.
	#[error(
		"header bytes {offset:#x}..{:#x} are undefined (only {populated:#x} bytes were read)",
		.offset + .len
	)]
	Undefined
	{
		offset: usize,
		len: usize,
		populated: usize,
	},

	#[error("Invalid base addr")]
	InvalidBaseAddress,
}

#[derive(Debug, Error)]
pub enum HeapError
{
	#[error("opening {}", .path.display())]
	Open
	{
		#[source]
		source: io::Error,
		path: PathBuf,
	},

	#[error("mmaping {}", .path.display())]
	Map
	{
		#[source]
		source: io::Error,
		path: PathBuf,
	},

	#[error("building an anonymous heap mapping of {len} bytes")]
	Anonymous
	{
		#[source]
		source: io::Error,
		len: usize,
	},
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError
{
	#[error("node '{node}' already has a property named '{property}'")]
	DuplicateProperty
	{
		node: String,
		property: String,
	},

	#[error("node '{node}' already has a child named '{child}'")]
	DuplicateNode
	{
		node: String,
		child: String,
	},
}

/// Failures of the descriptor parser while walking the header tables.
#[derive(Debug, Error)]
pub enum HdatError
{
	#[error("resolving the '{ntuple}' n-tuple")]
	Resolve
	{
		#[source]
		source: ResolveError,
		ntuple: String,
	},

	#[error(transparent)]
	Header(#[from] HeaderError),

	#[error(transparent)]
	Tree(#[from] TreeError),

	#[error("{what} has bad HDIF magic {found:#06x} (expected {expected:#06x})")]
	BadMagic
	{
		what: String,
		found: u16,
		expected: u16,
	},

	#[error("'{ntuple}' elements are {actual_len:#x} bytes long but only {alloc_len:#x} bytes apart")]
	OverlappingElements
	{
		ntuple: String,
		alloc_len: u32,
		actual_len: u32,
	},

	/// Copying out `what` would take the tree past as many payload bytes as the heap holds.
	#[error("{what} would take the tree past {heap_len:#x} payload bytes, the size of the heap")]
	PayloadTooLarge
	{
		what: String,
		heap_len: usize,
	},

	#[error("{what} at heap offset {offset:#x}+{len:#x} runs past the end of the {heap_len:#x} byte heap")]
	Truncated
	{
		what: String,
		offset: usize,
		len: usize,
		heap_len: usize,
	},
}

#[derive(Debug, Error)]
pub enum FdtError
{
	#[error("node '{node}' cannot be flattened: {reason}")]
	Node
	{
		node: String,
		reason: vm_fdt::Error,
	},

	#[error("property '{property}' of node '{node}' cannot be flattened: {reason}")]
	Property
	{
		node: String,
		property: String,
		reason: vm_fdt::Error,
	},

	#[error("assembling the flattened device tree failed: {0}")]
	Blob(vm_fdt::Error),
}

/// Fatal conditions of a conversion run.
#[derive(Debug, Error)]
pub enum ConversionError
{
	#[error(transparent)]
	Header(#[from] HeaderError),

	#[error(transparent)]
	Heap(#[from] HeapError),

	#[error("FATAL ERROR parsing HDAT")]
	Parse(#[from] HdatError),

	#[error("writing the flattened device tree ({len} bytes)")]
	Output
	{
		#[source]
		source: io::Error,
		len: usize,
	},
}
