// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2025 1BitSquared <info@1bitsquared.com>

mod common;

#[cfg(test)]
mod tests
{
	use color_eyre::eyre::Result;
	use hdatutil::ConversionOptions;
	use hdatutil::convert::{Conversion, Outcome, convert};
	use hdatutil::error::{ConversionError, HdatError, HeaderError, ResolveError};
	use hdatutil::hdat::NtupleParser;
	use hdatutil::sanitize::{SENTINEL_MAGIC, Sentinel, hash_prop};

	use crate::common::*;

	fn run(options: &ConversionOptions, header: &[u8], heap: &[u8]) -> Result<(Result<Outcome, ConversionError>, Vec<u8>)>
	{
		let header = dump_file(header)?;
		let heap = dump_file(heap)?;
		let mut out = Vec::new();
		let outcome = convert(options, header.path(), heap.path(), &NtupleParser, &mut out);
		Ok((outcome, out))
	}

	#[test]
	fn end_to_end_squashes_the_blob() -> Result<()>
	{
		let (outcome, out) = run(
			&ConversionOptions::default(),
			&spira(&[(IPL_PARMS, ntuple(0x2100, 1, 600))]),
			&blob_heap(),
		)?;

		assert_eq!(outcome?, Outcome::Written { bytes: out.len() });
		assert_eq!(&out[0..4], &FDT_MAGIC.to_be_bytes());
		assert_eq!(fdt_totalsize(&out), Some(out.len() as u32));

		let sentinel = Sentinel {
			length: 600,
			checksum: hash_prop(&[0x42; 600]),
		};
		assert!(contains(&out, &sentinel.to_bytes()));
		assert!(!contains(&out, &[0x42; 600]));
		assert!(contains(&out, b"ipl-parms@2100\0"));
		// Private properties never reach the blob.
		assert!(!contains(&out, b"skiboot,"));
		Ok(())
	}

	#[test]
	fn keep_blobs_passes_them_through() -> Result<()>
	{
		let options = ConversionOptions {
			keep_blobs: true,
			..Default::default()
		};
		let (outcome, out) = run(&options, &spira(&[(IPL_PARMS, ntuple(0x2100, 1, 600))]), &blob_heap())?;

		assert!(matches!(outcome?, Outcome::Written { .. }));
		assert!(contains(&out, &[0x42; 600]));
		assert!(!contains(&out, &SENTINEL_MAGIC.to_be_bytes()));
		Ok(())
	}

	#[test]
	fn ntuple_past_the_heap_is_fatal() -> Result<()>
	{
		let (outcome, out) = run(
			&ConversionOptions::default(),
			&spira(&[(IPL_PARMS, ntuple(0x4100, 1, 16))]),
			&blob_heap(),
		)?;

		match outcome {
			Err(ConversionError::Parse(HdatError::Resolve {
				source, ..
			})) => assert_eq!(source, ResolveError::OutsideHeap {
				address: 0x4100,
				base: BASE,
				end: BASE + HEAP_LEN as u64,
			}),
			other => panic!("expected a resolve error, got {:?}", other),
		}
		assert!(out.is_empty());
		Ok(())
	}

	#[test]
	fn ntuple_below_the_base_is_fatal() -> Result<()>
	{
		let (outcome, out) = run(
			&ConversionOptions::default(),
			&spira(&[(IPL_PARMS, ntuple(0x1000, 1, 16))]),
			&blob_heap(),
		)?;

		assert!(matches!(
			outcome,
			Err(ConversionError::Parse(HdatError::Resolve {
				source: ResolveError::BelowBase { .. },
				..
			}))
		));
		assert!(out.is_empty());
		Ok(())
	}

	#[test]
	fn empty_heap_dump_maps_to_nothing() -> Result<()>
	{
		// The heap n-tuple now points outside the (empty) heap, which is only worth a warning.
		let (outcome, out) = run(&ConversionOptions::default(), &spira(&[]), &[])?;
		assert!(matches!(outcome?, Outcome::Written { .. }));
		assert!(contains(&out, b"heap@2000\0"));

		// Anything that has to be followed cannot be.
		let (outcome, out) = run(
			&ConversionOptions::default(),
			&spira(&[(IPL_PARMS, ntuple(0x2100, 1, 16))]),
			&[],
		)?;
		assert!(matches!(outcome, Err(ConversionError::Parse(HdatError::Resolve { .. }))));
		assert!(out.is_empty());
		Ok(())
	}

	#[test]
	fn firmware_image_ntuples_are_recorded_only() -> Result<()>
	{
		// cpu-ctrl points into the host firmware image, below the heap.
		let (outcome, out) = run(
			&ConversionOptions::default(),
			&spira(&[(CPU_CTRL, ntuple(0x1000, 1, 0x100)), (IPL_PARMS, ntuple(0x2100, 1, 600))]),
			&blob_heap(),
		)?;

		assert!(matches!(outcome?, Outcome::Written { .. }));
		assert!(contains(&out, b"cpu-ctrl@1000\0"));
		assert!(contains(&out, b"ipl-parms@2100\0"));
		Ok(())
	}

	#[test]
	fn repeated_elements_cannot_blow_up_the_tree() -> Result<()>
	{
		// 4000 elements of 0x100 bytes, all at the same address.
		let mut slca = ntuple(0x2100, 4000, 0x100);
		slca[0x0c..0x10].fill(0);
		let (outcome, out) = run(&ConversionOptions::default(), &spira(&[(SLCA, slca)]), &blob_heap())?;

		assert!(matches!(
			outcome,
			Err(ConversionError::Parse(HdatError::OverlappingElements {
				alloc_len: 0,
				actual_len: 0x100,
				..
			}))
		));
		assert!(out.is_empty());
		Ok(())
	}

	#[test]
	fn short_header_is_fatal() -> Result<()>
	{
		let (outcome, _) = run(&ConversionOptions::default(), &spira(&[])[..16], &blob_heap())?;
		assert!(matches!(
			outcome,
			Err(ConversionError::Header(HeaderError::Truncated {
				read: 16,
				..
			}))
		));
		Ok(())
	}

	#[test]
	fn zero_base_address_is_fatal() -> Result<()>
	{
		let mut header = spira(&[]);
		header[0x2c0..0x2c8].fill(0);
		let (outcome, _) = run(&ConversionOptions::default(), &header, &blob_heap())?;
		assert!(matches!(outcome, Err(ConversionError::Header(HeaderError::InvalidBaseAddress))));
		Ok(())
	}

	#[test]
	fn partial_header_dump_stops_at_the_last_read_slot() -> Result<()>
	{
		// Cut off right after the heap n-tuple, so the proc-chip slot after it was never read.
		let header = spira(&[(IPL_PARMS, ntuple(0x2100, 1, 16)), (PROC_CHIP, ntuple(0x2200, 1, 16))]);
		let (outcome, out) = run(&ConversionOptions::default(), &header[..0x2e0], &blob_heap())?;

		assert!(matches!(outcome?, Outcome::Written { .. }));
		assert!(contains(&out, b"ipl-parms@2100\0"));
		assert!(!contains(&out, b"proc-chip@2200\0"));
		Ok(())
	}

	#[test]
	fn spirah_dump_walks_the_spiras() -> Result<()>
	{
		let options = ConversionOptions {
			spirah: true,
			..Default::default()
		};
		let header = dump_file(&spirah())?;
		let heap = dump_file(&spiras_heap(&[(IPL_PARMS, ntuple(0x2400, 1, 8))]))?;

		let conversion = Conversion::load(&options, header.path(), heap.path())?;
		assert_eq!(conversion.context().base_address(), BASE);
		assert_eq!(conversion.context().heap().len(), HEAP_LEN);

		let mut out = Vec::new();
		assert!(matches!(conversion.run(&options, &NtupleParser, &mut out)?, Outcome::Written { .. }));
		assert!(contains(&out, b"spiras\0"));
		assert!(contains(&out, b"ipl-parms@2400\0"));
		Ok(())
	}

	#[test]
	fn quiet_builds_but_writes_nothing() -> Result<()>
	{
		let options = ConversionOptions {
			quiet: true,
			..Default::default()
		};
		let (outcome, out) = run(&options, &spira(&[(IPL_PARMS, ntuple(0x2100, 1, 600))]), &blob_heap())?;
		assert_eq!(outcome?, Outcome::Suppressed);
		assert!(out.is_empty());
		Ok(())
	}
}
