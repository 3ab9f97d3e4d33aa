// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2025 1BitSquared <info@1bitsquared.com>

//! Turning HDAT structures into device tree nodes.

use log::{debug, warn};

use crate::device_tree::Node;
use crate::error::{HdatError, TreeError};
use crate::resolver::RunContext;
use crate::spira::{
	ArrayHeader, HDIF_HEADER_SIZE, HDIF_MAGIC, HdifHeader, HeaderRecord, HeaderVariant, IDATA_PTR_SIZE, IdataPtr,
	NTUPLE_ARRAY_HEADER_SIZE, NTUPLE_ARRAY_OFFSET, NTUPLE_SIZE, Ntuple, SPIRAS_NTUPLES,
};

/// Something that can walk a header dump and populate a device tree from it.
pub trait HdatParser
{
	/// Populate `root` from `header` and the heap held by `ctx`.
	///
	/// Every address taken from the dump must go through `ctx` to be turned into a heap offset.
	fn parse(&self, ctx: &RunContext, header: &HeaderRecord, root: &mut Node) -> Result<(), HdatError>;
}

/// Walks the SPIRA n-tuple tables and the HDIF structures they point at.
///
/// The payloads of those structures are carried over as opaque properties, not decoded.
#[derive(Debug, Default, Clone, Copy)]
pub struct NtupleParser;

/// N-tuples that are recorded but never followed. They either describe the heap itself or
/// point into the host firmware's own image, which the heap dump does not contain.
const ADDRESS_ONLY_NTUPLES: &[&str] = &[
	"heap",
	"hs-data-area",
	"proc-init",
	"cpu-ctrl",
	"mdump-src",
	"mdump-dst",
	"mdump-res",
	"proc-dump-area",
];

/// Turn an HDIF eye-catcher into something usable as a node name.
fn node_name(id: &str) -> String
{
	let name: String = id
		.chars()
		.map(|c| c.to_ascii_lowercase())
		.map(|c| if c.is_ascii_alphanumeric() || ",._+-".contains(c) { c } else { '-' })
		.collect();
	if name.is_empty() { "hdif".into() } else { name }
}

fn add_root_properties(ctx: &RunContext, root: &mut Node) -> Result<(), TreeError>
{
	root.add_property_cells("#address-cells", &[2])?;
	root.add_property_cells("#size-cells", &[2])?;
	root.add_property_string("compatible", "ibm,powernv")?;
	root.add_property_string("lid-type", "phyp")?;

	let processor = ctx.processor();
	let cpus = root.new_child("cpus")?;
	cpus.add_property_cells("#address-cells", &[1])?;
	cpus.add_property_cells("#size-cells", &[0])?;
	cpus.add_property_cells("timebase-frequency", &[processor.timebase_hz])?;
	cpus.add_property_cells("skiboot,pvr", &[processor.pvr()])?;
	Ok(())
}

/// The node every n-tuple gets, followed or not.
fn ntuple_node<'n>(group: &'n mut Node, name: &str, ntuple: &Ntuple) -> Result<&'n mut Node, TreeError>
{
	let node = group.new_child(format!("{}@{:x}", name, ntuple.address()))?;
	node.add_property_u64("ibm,ntuple-addr", ntuple.address())?;
	node.add_property_cells("ibm,alloc-count", &[ntuple.alloc_count.into()])?;
	node.add_property_cells("ibm,actual-count", &[ntuple.actual_count.into()])?;
	node.add_property_cells("ibm,alloc-len", &[ntuple.alloc_len])?;
	node.add_property_cells("ibm,actual-len", &[ntuple.actual_len])?;
	Ok(node)
}

/// State of one walk over a dump.
///
/// Structures may point at the same heap bytes any number of times, so the payload copied into
/// the tree is capped at the size of the heap.
struct Walk<'c>
{
	ctx: &'c RunContext,
	budget: usize,
}

impl<'c> Walk<'c>
{
	fn new(ctx: &'c RunContext) -> Self
	{
		Self {
			ctx,
			budget: ctx.heap().len(),
		}
	}

	/// The `len` heap bytes at `offset`, or an error naming `what` when they run off the heap.
	fn slice(&self, what: &str, offset: usize, len: usize) -> Result<&'c [u8], HdatError>
	{
		let heap = self.ctx.heap();
		heap.slice(offset, len).ok_or_else(|| HdatError::Truncated {
			what: what.to_string(),
			offset,
			len,
			heap_len: heap.len(),
		})
	}

	fn copy(&mut self, what: &str, data: &[u8]) -> Result<Vec<u8>, HdatError>
	{
		self.budget = self
			.budget
			.checked_sub(data.len())
			.ok_or_else(|| HdatError::PayloadTooLarge {
				what: what.to_string(),
				heap_len: self.ctx.heap().len(),
			})?;
		Ok(data.to_vec())
	}

	/// Add one array element: an HDIF structure becomes a child node, anything else a raw property.
	fn add_element(&mut self, parent: &mut Node, what: &str, index: usize, start: usize, len: usize)
	-> Result<(), HdatError>
	{
		let data = self.slice(what, start, len)?;
		let hdif = match HdifHeader::parse(data).filter(HdifHeader::has_magic) {
			Some(hdif) => hdif,
			None => {
				let value = self.copy(what, data)?;
				parent.add_property(format!("ibm,raw-data-{}", index), value)?;
				return Ok(());
			},
		};

		let id = hdif.id();
		let node = parent.new_child(format!("{}@{:x}", node_name(&id), index))?;
		node.add_property_string("ibm,hdif-id", &id)?;
		node.add_property_cells("ibm,hdif-instance", &[hdif.instance.into()])?;
		node.add_property_cells("ibm,hdif-version", &[hdif.version.into()])?;

		let idata_base = start.saturating_add(hdif.idata_offset as usize);
		for slot in 0..usize::from(hdif.idata_count) {
			let pointer_offset = idata_base.saturating_add(slot * IDATA_PTR_SIZE);
			let pointer_what = format!("{} idata pointer {}", id, slot);
			let pointer = self.slice(&pointer_what, pointer_offset, IDATA_PTR_SIZE)?;
			let pointer = IdataPtr::parse(pointer).ok_or_else(|| HdatError::Truncated {
				what: pointer_what.clone(),
				offset: pointer_offset,
				len: IDATA_PTR_SIZE,
				heap_len: self.ctx.heap().len(),
			})?;

			let idata_what = format!("{} idata {}", id, slot);
			let idata = self.slice(
				&idata_what,
				start.saturating_add(pointer.offset as usize),
				pointer.size as usize,
			)?;
			let value = self.copy(&idata_what, idata)?;
			node.add_property(format!("ibm,idata-{}", slot), value)?;
		}

		Ok(())
	}

	/// Record an n-tuple without following it.
	fn add_address_only(&self, group: &mut Node, name: &str, ntuple: &Ntuple) -> Result<(), HdatError>
	{
		if let Err(e) = self.ctx.resolve(ntuple.addr) {
			warn!("{} n-tuple points outside the heap dump, recording it unresolved: {}", name, e);
		}
		ntuple_node(group, name, ntuple)?;
		Ok(())
	}

	/// Add the node for one n-tuple and its elements. Absent n-tuples are skipped.
	fn add_ntuple(&mut self, group: &mut Node, name: &str, ntuple: &Ntuple) -> Result<(), HdatError>
	{
		if ntuple.address() == 0 {
			return Ok(());
		}
		if ADDRESS_ONLY_NTUPLES.contains(&name) {
			return self.add_address_only(group, name, ntuple);
		}

		let offset = self
			.ctx
			.resolve(ntuple.addr)
			.map_err(|source| HdatError::Resolve {
				source,
				ntuple: name.to_string(),
			})?;
		let Some(offset) = offset else {
			return Ok(());
		};
		if ntuple.actual_count > 1 && ntuple.alloc_len < ntuple.actual_len {
			return Err(HdatError::OverlappingElements {
				ntuple: name.to_string(),
				alloc_len: ntuple.alloc_len,
				actual_len: ntuple.actual_len,
			});
		}

		debug!(
			"{} n-tuple at {:#x} (heap offset {:#x}): {} of {} entries, {} of {} bytes each",
			name,
			ntuple.address(),
			offset,
			ntuple.actual_count,
			ntuple.alloc_count,
			ntuple.actual_len,
			ntuple.alloc_len
		);

		let node = ntuple_node(group, name, ntuple)?;
		node.add_property_u64("skiboot,heap-offset", offset as u64)?;

		let stride = ntuple.alloc_len as usize;
		for index in 0..usize::from(ntuple.actual_count) {
			let start = index
				.checked_mul(stride)
				.and_then(|delta| offset.checked_add(delta))
				.unwrap_or(usize::MAX);
			let what = format!("{} element {}", name, index);
			self.add_element(node, &what, index, start, ntuple.actual_len as usize)?;
		}

		Ok(())
	}

	/// Walk up to `limit` n-tuple slots, as read by `ntuple`, into a new `group` node.
	fn add_ntuples<F>(
		&mut self, parent: &mut Node, group: &str, array: ArrayHeader, names: &[&str], limit: usize, mut ntuple: F
	) -> Result<(), HdatError>
	where
		F: FnMut(usize) -> Result<Ntuple, HdatError>,
	{
		let known = (array.entry_count as usize).min(names.len());
		if known < array.entry_count as usize {
			warn!("{} lists {} n-tuples, only the first {} are known", group, array.entry_count, known);
		}

		let group = parent.new_child(group)?;
		for (index, name) in names.iter().enumerate().take(known.min(limit)) {
			self.add_ntuple(group, name, &ntuple(index)?)?;
		}
		Ok(())
	}

	/// SPIRA-H dumps leave the SPIRA-S at the very start of the heap.
	fn add_spiras(&mut self, hdat: &mut Node) -> Result<(), HdatError>
	{
		let ctx = self.ctx;
		let hdif = match HdifHeader::parse(ctx.heap().as_bytes()) {
			Some(hdif) if hdif.has_magic() => hdif,
			Some(hdif) => {
				warn!("No SPIRA-S at the start of the heap (magic {:#06x}), skipping it", hdif.magic);
				return Ok(());
			},
			None => {
				warn!("Heap is shorter than an HDIF header ({} bytes), no SPIRA-S to walk", HDIF_HEADER_SIZE);
				return Ok(());
			},
		};
		debug!("Found {} v{} at the start of the heap", hdif.id(), hdif.version);

		let array = self.slice("SPIRA-S n-tuple array", NTUPLE_ARRAY_OFFSET, NTUPLE_ARRAY_HEADER_SIZE)?;
		let array = ArrayHeader::parse(array).ok_or_else(|| HdatError::Truncated {
			what: "SPIRA-S n-tuple array".into(),
			offset: NTUPLE_ARRAY_OFFSET,
			len: NTUPLE_ARRAY_HEADER_SIZE,
			heap_len: ctx.heap().len(),
		})?;

		self.add_ntuples(hdat, "spiras", array, SPIRAS_NTUPLES, usize::MAX, |index| {
			let offset = NTUPLE_ARRAY_OFFSET + NTUPLE_ARRAY_HEADER_SIZE + index * NTUPLE_SIZE;
			let bytes = ctx.heap().slice(offset, NTUPLE_SIZE);
			bytes.and_then(Ntuple::parse).ok_or_else(|| HdatError::Truncated {
				what: "SPIRA-S n-tuple".into(),
				offset,
				len: NTUPLE_SIZE,
				heap_len: ctx.heap().len(),
			})
		})
	}
}

impl HdatParser for NtupleParser
{
	fn parse(&self, ctx: &RunContext, header: &HeaderRecord, root: &mut Node) -> Result<(), HdatError>
	{
		let variant = header.variant();
		let hdif = header.hdif()?;
		if !hdif.has_magic() {
			return Err(HdatError::BadMagic {
				what: format!("{} header", variant),
				found: hdif.magic,
				expected: HDIF_MAGIC,
			});
		}
		debug!("Parsing {} v{} with {} bytes populated", hdif.id(), hdif.version, header.populated());

		add_root_properties(ctx, root)?;

		let hdat = root.new_child("ibm,hdat")?;
		hdat.add_property_string("ibm,hdat-id", &hdif.id())?;
		hdat.add_property_cells("ibm,hdat-version", &[hdif.version.into()])?;
		hdat.add_property_u64("ibm,hdat-base", ctx.base_address())?;

		let array = header.ntuple_array()?;
		let names = variant.ntuple_names();
		let defined = header.defined_ntuples();
		if defined < (array.entry_count as usize).min(names.len()) {
			warn!(
				"Only {} bytes of the {} header were dumped, n-tuples from slot {} on are left out",
				header.populated(),
				variant,
				defined
			);
		}

		let mut walk = Walk::new(ctx);
		walk.add_ntuples(hdat, &variant.to_string(), array, names, defined, |index| Ok(header.ntuple(index)?))?;

		if variant == HeaderVariant::Spirah {
			walk.add_spiras(hdat)?;
		}

		Ok(())
	}
}
