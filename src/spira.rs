// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2025 1BitSquared <info@1bitsquared.com>

//! The SPIRA family of HDAT root structures.
//!
//! Every HDAT structure starts with an HDIF common header. The SPIRA, SPIRA-H and SPIRA-S
//! structures follow it with an array of n-tuples, each of which points at further structures
//! somewhere in the firmware's address space.

use std::fmt::Display;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use bstr::ByteSlice;
use log::info;

use crate::error::HeaderError;

pub const HDIF_MAGIC: u16 = 0xd1f0;
pub const HDIF_HEADER_SIZE: usize = 0x20;
pub const IDATA_PTR_SIZE: usize = 8;
pub const NTUPLE_SIZE: usize = 0x20;
/// Where the n-tuple array header sits in SPIRA, SPIRA-H and SPIRA-S alike.
pub const NTUPLE_ARRAY_OFFSET: usize = 0x30;
pub const NTUPLE_ARRAY_HEADER_SIZE: usize = 0x10;
/// Fill pattern for the part of a header record that the dump did not cover.
pub const UNDEFINED_FILL: u8 = 0xa5;

const SPIRA_NTUPLES: &[&str] = &[
	"sp-subsys",
	"ipl-parms",
	"nt-enclosure-vpd",
	"slca",
	"backplane-vpd",
	"system-vpd",
	"chip-tod",
	"proc-init",
	"clock-vpd",
	"anchor-vpd",
	"op-panel-vpd",
	"ext-cache-fru-vpd",
	"misc-cec-fru-vpd",
	"paca",
	"ms-vpd",
	"cec-iohub-fru",
	"cpu-ctrl",
	"mdump-src",
	"mdump-dst",
	"mdump-res",
	"heap",
	"pcia",
	"proc-chip",
	"hs-data",
	"ipmi-sensor",
];

const SPIRAH_NTUPLES: &[&str] = &[
	"hs-data-area",
	"proc-init",
	"cpu-ctrl",
	"mdump-src",
	"mdump-dst",
	"mdump-res",
	"proc-dump-area",
];

/// N-tuple slots of the SPIRA-S structure found at the start of the heap in SPIRA-H dumps.
pub const SPIRAS_NTUPLES: &[&str] = &[
	"sp-subsys",
	"ipl-parms",
	"nt-enclosure-vpd",
	"slca",
	"backplane-vpd",
	"system-vpd",
	"chip-tod",
	"proc-init",
	"clock-vpd",
	"anchor-vpd",
	"op-panel-vpd",
	"misc-cec-fru-vpd",
	"ms-vpd",
	"cec-iohub-fru",
	"pcia",
	"proc-chip",
	"hs-data",
	"hbrt-data",
	"ipmi-data",
	"tpm-data",
	"phys-addr-map",
];

pub(crate) fn be_u16(bytes: &[u8], offset: usize) -> Option<u16>
{
	let field = bytes.get(offset..offset.checked_add(2)?)?;
	Some(u16::from_be_bytes(field.try_into().ok()?))
}

pub(crate) fn be_u32(bytes: &[u8], offset: usize) -> Option<u32>
{
	let field = bytes.get(offset..offset.checked_add(4)?)?;
	Some(u32::from_be_bytes(field.try_into().ok()?))
}

/// The two header layouts a dump can come in.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum HeaderVariant
{
	/// Legacy SPIRA: one header dump, the heap dump is the firmware heap.
	Spira,
	/// SPIRA-H: the header dump is the SPIRA-H, and the heap dump starts with the SPIRA-S.
	Spirah,
}

impl HeaderVariant
{
	/// Size of the whole header record, populated or not.
	pub fn record_size(self) -> usize
	{
		0x40 + self.ntuple_names().len() * NTUPLE_SIZE + match self {
			Self::Spira => 0x60,
			Self::Spirah => 0x80,
		}
	}

	pub fn ntuple_names(self) -> &'static [&'static str]
	{
		match self {
			Self::Spira => SPIRA_NTUPLES,
			Self::Spirah => SPIRAH_NTUPLES,
		}
	}

	/// Index of the n-tuple whose address is the heap's original load address.
	pub fn base_ntuple(self) -> usize
	{
		match self {
			Self::Spira => 20,
			Self::Spirah => 0,
		}
	}
}

impl Display for HeaderVariant
{
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result
	{
		match self {
			Self::Spira => write!(f, "spira")?,
			Self::Spirah => write!(f, "spirah")?,
		};

		Ok(())
	}
}

/// The common header at the start of every HDAT structure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HdifHeader
{
	pub magic: u16,
	pub id: [u8; 6],
	pub instance: u16,
	pub version: u16,
	pub total_len: u32,
	pub hdr_len: u32,
	pub idata_offset: u32,
	pub idata_count: u16,
	pub child_count: u16,
	pub child_offset: u32,
}

impl HdifHeader
{
	/// Decode the header at the start of `bytes`. None if fewer than 32 bytes are given.
	pub fn parse(bytes: &[u8]) -> Option<Self>
	{
		let bytes = bytes.get(..HDIF_HEADER_SIZE)?;
		Some(Self {
			magic: be_u16(bytes, 0x00)?,
			id: bytes[0x02..0x08].try_into().ok()?,
			instance: be_u16(bytes, 0x08)?,
			version: be_u16(bytes, 0x0a)?,
			total_len: be_u32(bytes, 0x0c)?,
			hdr_len: be_u32(bytes, 0x10)?,
			idata_offset: be_u32(bytes, 0x14)?,
			idata_count: be_u16(bytes, 0x18)?,
			child_count: be_u16(bytes, 0x1a)?,
			child_offset: be_u32(bytes, 0x1c)?,
		})
	}

	pub fn has_magic(&self) -> bool
	{
		self.magic == HDIF_MAGIC
	}

	/// The structure's eye-catcher with its space padding removed, e.g. `SPIRA` or `IPLPMS`.
	pub fn id(&self) -> String
	{
		self.id.trim().to_str_lossy().into_owned()
	}
}

/// Locates one block of internal data relative to the start of its HDIF structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdataPtr
{
	pub offset: u32,
	pub size: u32,
}

impl IdataPtr
{
	pub fn parse(bytes: &[u8]) -> Option<Self>
	{
		Some(Self {
			offset: be_u32(bytes, 0)?,
			size: be_u32(bytes, 4)?,
		})
	}
}

/// The array header that precedes a run of n-tuples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArrayHeader
{
	/// Offset of the first entry, from the start of this array header.
	pub offset: u32,
	pub entry_count: u32,
	pub entry_size: u32,
	pub actual_size: u32,
}

impl ArrayHeader
{
	pub fn parse(bytes: &[u8]) -> Option<Self>
	{
		Some(Self {
			offset: be_u32(bytes, 0x0)?,
			entry_count: be_u32(bytes, 0x4)?,
			entry_size: be_u32(bytes, 0x8)?,
			actual_size: be_u32(bytes, 0xc)?,
		})
	}
}

/// A relative reference to a run of structures in the firmware's address space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ntuple
{
	/// The address, still big-endian as stored.
	pub addr: [u8; 8],
	pub alloc_count: u16,
	pub actual_count: u16,
	pub alloc_len: u32,
	pub actual_len: u32,
	pub tce_offset: u32,
}

impl Ntuple
{
	pub fn parse(bytes: &[u8]) -> Option<Self>
	{
		let bytes = bytes.get(..NTUPLE_SIZE)?;
		Some(Self {
			addr: bytes[0x00..0x08].try_into().ok()?,
			alloc_count: be_u16(bytes, 0x08)?,
			actual_count: be_u16(bytes, 0x0a)?,
			alloc_len: be_u32(bytes, 0x0c)?,
			actual_len: be_u32(bytes, 0x10)?,
			tce_offset: be_u32(bytes, 0x14)?,
		})
	}

	pub fn address(&self) -> u64
	{
		u64::from_be_bytes(self.addr)
	}
}

/// A SPIRA or SPIRA-H header as read from its dump.
///
/// Dumps are often shorter than the structure. The bytes past what was read are filled with
/// [`UNDEFINED_FILL`] and every accessor refuses to hand them out, so nothing downstream can
/// mistake them for zeroed fields.
pub struct HeaderRecord
{
	variant: HeaderVariant,
	bytes: Box<[u8]>,
	populated: usize,
}

impl HeaderRecord
{
	/// Read the header dump at `path`.
	pub fn load(path: &Path, variant: HeaderVariant) -> Result<Self, HeaderError>
	{
		let file = File::open(path).map_err(|source| HeaderError::Open {
			source,
			path: path.to_path_buf(),
		})?;
		Self::read_from(file, variant, path)
	}

	/// Read a header record from `reader`; `path` is only used to describe failures.
	pub fn read_from<R: Read>(reader: R, variant: HeaderVariant, path: &Path) -> Result<Self, HeaderError>
	{
		let record_size = variant.record_size();
		let mut bytes = Vec::with_capacity(record_size);
		reader
			.take(record_size as u64)
			.read_to_end(&mut bytes)
			.map_err(|source| HeaderError::Read {
				source,
				path: path.to_path_buf(),
			})?;

		let populated = bytes.len();
		if populated < HDIF_HEADER_SIZE {
			return Err(HeaderError::Truncated {
				path: path.to_path_buf(),
				read: populated,
				required: HDIF_HEADER_SIZE,
			});
		}
		info!("Read {} header, {} bytes", variant, populated);

		bytes.resize(record_size, UNDEFINED_FILL);
		Ok(Self {
			variant,
			bytes: bytes.into_boxed_slice(),
			populated,
		})
	}

	pub fn variant(&self) -> HeaderVariant
	{
		self.variant
	}

	/// How many bytes of the record the dump actually covered.
	pub fn populated(&self) -> usize
	{
		self.populated
	}

	/// The whole record, including the undefined fill past [`HeaderRecord::populated`].
	pub fn raw(&self) -> &[u8]
	{
		&self.bytes
	}

	/// The `len` bytes at `offset`, provided the dump populated all of them.
	pub fn bytes(&self, offset: usize, len: usize) -> Result<&[u8], HeaderError>
	{
		match offset.checked_add(len) {
			Some(end) if end <= self.populated => Ok(&self.bytes[offset..end]),
			_ => Err(HeaderError::Undefined {
				offset,
				len,
				populated: self.populated,
			}),
		}
	}

	pub fn hdif(&self) -> Result<HdifHeader, HeaderError>
	{
		let bytes = self.bytes(0, HDIF_HEADER_SIZE)?;
		HdifHeader::parse(bytes).ok_or(HeaderError::Undefined {
			offset: 0,
			len: HDIF_HEADER_SIZE,
			populated: self.populated,
		})
	}

	pub fn ntuple_array(&self) -> Result<ArrayHeader, HeaderError>
	{
		let bytes = self.bytes(NTUPLE_ARRAY_OFFSET, NTUPLE_ARRAY_HEADER_SIZE)?;
		ArrayHeader::parse(bytes).ok_or(HeaderError::Undefined {
			offset: NTUPLE_ARRAY_OFFSET,
			len: NTUPLE_ARRAY_HEADER_SIZE,
			populated: self.populated,
		})
	}

	/// The n-tuple in slot `index` of the fixed layout.
	pub fn ntuple(&self, index: usize) -> Result<Ntuple, HeaderError>
	{
		let offset = NTUPLE_ARRAY_OFFSET + NTUPLE_ARRAY_HEADER_SIZE + index * NTUPLE_SIZE;
		let bytes = self.bytes(offset, NTUPLE_SIZE)?;
		Ntuple::parse(bytes).ok_or(HeaderError::Undefined {
			offset,
			len: NTUPLE_SIZE,
			populated: self.populated,
		})
	}

	/// How many n-tuple slots the dump covered in full.
	pub fn defined_ntuples(&self) -> usize
	{
		self.populated.saturating_sub(NTUPLE_ARRAY_OFFSET + NTUPLE_ARRAY_HEADER_SIZE) / NTUPLE_SIZE
	}

	/// The address the firmware had the heap loaded at. Zero is never a valid base.
	pub fn base_address(&self) -> Result<u64, HeaderError>
	{
		let base_address = self
			.ntuple(self.variant.base_ntuple())
			.map_err(|_| HeaderError::InvalidBaseAddress)?
			.address();
		if base_address == 0 {
			return Err(HeaderError::InvalidBaseAddress);
		}

		info!("map.base_addr = {:#x}", base_address);
		Ok(base_address)
	}
}
