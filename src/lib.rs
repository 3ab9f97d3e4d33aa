// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2025 1BitSquared <info@1bitsquared.com>

pub mod convert;
pub mod device_tree;
pub mod error;
pub mod fdt;
pub mod hdat;
pub mod heap;
pub mod resolver;
pub mod sanitize;
pub mod spira;

use crate::spira::HeaderVariant;

/// What a conversion run has been asked to do.
pub trait ConversionParams
{
	/// Which header layout the first dump is in.
	fn header_variant(&self) -> HeaderVariant;
	/// Keep blobs verbatim instead of squashing them.
	fn keep_blobs(&self) -> bool;
	/// Build the tree but produce no output and no diagnostics.
	fn quiet(&self) -> bool;
	fn verbose(&self) -> bool;
}

/// Plain [`ConversionParams`] for driving conversions from code.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConversionOptions
{
	pub spirah: bool,
	pub keep_blobs: bool,
	pub quiet: bool,
	pub verbose: bool,
}

impl ConversionParams for ConversionOptions
{
	fn header_variant(&self) -> HeaderVariant
	{
		if self.spirah { HeaderVariant::Spirah } else { HeaderVariant::Spira }
	}

	fn keep_blobs(&self) -> bool
	{
		self.keep_blobs
	}

	fn quiet(&self) -> bool
	{
		self.quiet
	}

	fn verbose(&self) -> bool
	{
		self.verbose
	}
}
