// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2025 1BitSquared <info@1bitsquared.com>

use std::io::Write;
use std::path::Path;

use log::{debug, error};

use crate::ConversionParams;
use crate::device_tree::Node;
use crate::error::ConversionError;
use crate::fdt::create_dtb;
use crate::hdat::HdatParser;
use crate::heap::MappedRegion;
use crate::resolver::RunContext;
use crate::sanitize::squash_blobs;
use crate::spira::HeaderRecord;

/// How a conversion run that did not fail ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome
{
	/// A flattened tree of this many bytes went to the output.
	Written
	{
		bytes: usize,
	},
	/// Quiet mode: the tree was built but not serialised.
	Suppressed,
	/// The tree could not be flattened, so nothing was written.
	NotFlattened,
}

/// Flatten `root` and write the blob to `out` in one go.
///
/// Failing to flatten is not fatal: it is reported and nothing is written. Failing to write is.
pub fn dump_fdt<W: Write>(root: &Node, out: &mut W) -> Result<Outcome, ConversionError>
{
	let blob = match create_dtb(root) {
		Ok(blob) => blob,
		Err(e) => {
			error!("Unable to make flattened DT, no FDT written: {}", e);
			return Ok(Outcome::NotFlattened);
		},
	};

	let len = blob.len();
	out.write_all(&blob)
		.and_then(|()| out.flush())
		.map_err(|source| ConversionError::Output {
			source,
			len,
		})?;
	debug!("Wrote {} byte flattened device tree", len);

	Ok(Outcome::Written {
		bytes: len,
	})
}

/// The inputs of one conversion run, loaded and ready to go.
pub struct Conversion
{
	header: HeaderRecord,
	ctx: RunContext,
}

impl Conversion
{
	/// Read the header dump, work out where the heap used to live, and map the heap dump.
	pub fn load<Params>(params: &Params, header_path: &Path, heap_path: &Path) -> Result<Self, ConversionError>
	where
		Params: ConversionParams,
	{
		let header = HeaderRecord::load(header_path, params.header_variant())?;
		let base_address = header.base_address()?;

		let heap = MappedRegion::open(heap_path)?;
		Ok(Self::from_parts(header, RunContext::new(base_address, heap)))
	}

	pub fn from_parts(header: HeaderRecord, ctx: RunContext) -> Self
	{
		Self {
			header,
			ctx,
		}
	}

	pub fn header(&self) -> &HeaderRecord
	{
		&self.header
	}

	pub fn context(&self) -> &RunContext
	{
		&self.ctx
	}

	/// Parse the dump into a tree, squash its blobs and write it out, as `params` ask.
	///
	/// The tree only lives for the duration of the call, whichever way it ends.
	pub fn run<Params, W>(&self, params: &Params, parser: &dyn HdatParser, out: &mut W)
	-> Result<Outcome, ConversionError>
	where
		Params: ConversionParams,
		W: Write,
	{
		let mut root = Node::new_root();
		parser.parse(&self.ctx, &self.header, &mut root)?;
		debug!("Parsed {} nodes with {} properties", root.node_count(), root.property_count());

		if !params.keep_blobs() {
			squash_blobs(&mut root);
		}

		let outcome = if params.quiet() {
			Outcome::Suppressed
		} else {
			dump_fdt(&root, out)?
		};

		debug!("Releasing device tree of {} nodes and {} properties", root.node_count(), root.property_count());
		drop(root);
		Ok(outcome)
	}
}

/// Load both dumps and run the whole conversion.
pub fn convert<Params, W>(
	params: &Params, header_path: &Path, heap_path: &Path, parser: &dyn HdatParser, out: &mut W
) -> Result<Outcome, ConversionError>
where
	Params: ConversionParams,
	W: Write,
{
	Conversion::load(params, header_path, heap_path)?.run(params, parser, out)
}
