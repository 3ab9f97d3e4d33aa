// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2025 1BitSquared <info@1bitsquared.com>

use crate::error::ResolveError;
use crate::heap::MappedRegion;

/// Processor version register type of a POWER7, as reported in the upper half of the PVR.
pub const PVR_TYPE_P7: u32 = 0x003f;

/// The processor the descriptor parser is told it runs on.
///
/// A dump carries no registers of its own, so these are made up to satisfy what the parser
/// expects to learn from the host CPU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessorInfo
{
	pub pvr_type: u32,
	pub pvr_major: u32,
	pub timebase_hz: u32,
}

impl ProcessorInfo
{
	/// The full PVR value, type in the upper half-word and major version in bits 8..12.
	pub fn pvr(&self) -> u32
	{
		(self.pvr_type << 16) | ((self.pvr_major & 0xf) << 8)
	}
}

impl Default for ProcessorInfo
{
	fn default() -> Self
	{
		Self {
			pvr_type: PVR_TYPE_P7,
			pvr_major: 1,
			timebase_hz: 512_000_000,
		}
	}
}

/// Everything one conversion run knows about where the heap used to live.
pub struct RunContext
{
	base_address: u64,
	heap: MappedRegion,
	processor: ProcessorInfo,
}

impl RunContext
{
	/// `base_address` is the address the firmware had the heap loaded at; it must be non-zero.
	pub fn new(base_address: u64, heap: MappedRegion) -> Self
	{
		debug_assert_ne!(base_address, 0, "base address must be validated by the caller");
		Self {
			base_address,
			heap,
			processor: ProcessorInfo::default(),
		}
	}

	#[must_use]
	pub fn with_processor(mut self, processor: ProcessorInfo) -> Self
	{
		self.processor = processor;
		self
	}

	pub fn base_address(&self) -> u64
	{
		self.base_address
	}

	pub fn heap(&self) -> &MappedRegion
	{
		&self.heap
	}

	pub fn processor(&self) -> ProcessorInfo
	{
		self.processor
	}

	/// One past the last address the captured heap covers.
	pub fn end_address(&self) -> u64
	{
		self.base_address.saturating_add(self.heap.len() as u64)
	}

	/// Translate an address field, as stored big-endian in a header, into an offset in the heap.
	///
	/// A zero address means the reference is absent and yields `Ok(None)`.
	pub fn resolve(&self, encoded: [u8; 8]) -> Result<Option<usize>, ResolveError>
	{
		self.resolve_address(u64::from_be_bytes(encoded))
	}

	/// As [`RunContext::resolve`], for an address already in host order.
	pub fn resolve_address(&self, address: u64) -> Result<Option<usize>, ResolveError>
	{
		if address == 0 {
			return Ok(None);
		}
		if address < self.base_address {
			return Err(ResolveError::BelowBase {
				address,
				base: self.base_address,
			});
		}
		let end = self.end_address();
		if address >= end {
			return Err(ResolveError::OutsideHeap {
				address,
				base: self.base_address,
				end,
			});
		}

		// Below `end`, so the difference is smaller than the heap length and fits a usize.
		Ok(Some((address - self.base_address) as usize))
	}

	/// Resolve `encoded` and return the heap bytes from there to the end of the heap.
	pub fn resolve_bytes(&self, encoded: [u8; 8]) -> Result<Option<&[u8]>, ResolveError>
	{
		Ok(self
			.resolve(encoded)?
			.map(|offset| &self.heap.as_bytes()[offset..]))
	}
}
