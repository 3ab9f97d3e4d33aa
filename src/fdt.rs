// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2025 1BitSquared <info@1bitsquared.com>

//! Flattening of a [`Node`] tree into a devicetree blob.

use vm_fdt::FdtWriter;

use crate::device_tree::Node;
use crate::error::FdtError;

fn flatten_node(fdt: &mut FdtWriter, node: &Node) -> Result<(), FdtError>
{
	let handle = fdt.begin_node(node.name()).map_err(|reason| FdtError::Node {
		node: node.name().to_string(),
		reason,
	})?;

	for property in node.properties().iter().filter(|property| !property.is_private()) {
		fdt.property(property.name(), property.value())
			.map_err(|reason| FdtError::Property {
				node: node.name().to_string(),
				property: property.name().to_string(),
				reason,
			})?;
	}

	for child in node.children() {
		flatten_node(fdt, child)?;
	}

	fdt.end_node(handle).map_err(|reason| FdtError::Node {
		node: node.name().to_string(),
		reason,
	})
}

/// Flatten the tree under `root` into a devicetree blob.
///
/// Private properties are left out. The memory reservation map is empty and the boot CPU is 0.
pub fn create_dtb(root: &Node) -> Result<Vec<u8>, FdtError>
{
	let mut fdt = FdtWriter::new().map_err(FdtError::Blob)?;
	flatten_node(&mut fdt, root)?;
	fdt.finish().map_err(FdtError::Blob)
}
