// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2025 1BitSquared <info@1bitsquared.com>

//! In-memory device tree.
//!
//! Nodes own their properties and children outright, so dropping the root releases the tree.

use crate::error::TreeError;

/// Properties whose names start with this are internal bookkeeping: they are never squashed
/// and never make it into a flattened tree.
pub const DT_PRIVATE: &str = "skiboot,";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property
{
	name: String,
	value: Vec<u8>,
}

impl Property
{
	pub fn name(&self) -> &str
	{
		&self.name
	}

	pub fn value(&self) -> &[u8]
	{
		&self.value
	}

	pub fn len(&self) -> usize
	{
		self.value.len()
	}

	pub fn is_empty(&self) -> bool
	{
		self.value.is_empty()
	}

	pub fn is_private(&self) -> bool
	{
		self.name.starts_with(DT_PRIVATE)
	}

	/// Swap out the payload; the length follows the new value.
	pub fn set_value(&mut self, value: Vec<u8>)
	{
		self.value = value;
	}

	/// Interpret the payload as big-endian cells.
	pub fn cells(&self) -> Option<Vec<u32>>
	{
		if self.value.len() % 4 != 0 {
			return None;
		}
		Some(
			self.value
				.chunks_exact(4)
				.map(|cell| u32::from_be_bytes([cell[0], cell[1], cell[2], cell[3]]))
				.collect(),
		)
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node
{
	name: String,
	properties: Vec<Property>,
	children: Vec<Node>,
}

impl Node
{
	pub fn new(name: impl Into<String>) -> Self
	{
		Self {
			name: name.into(),
			properties: Vec::new(),
			children: Vec::new(),
		}
	}

	pub fn new_root() -> Self
	{
		Self::new("")
	}

	pub fn name(&self) -> &str
	{
		&self.name
	}

	/// Properties in the order they were added.
	pub fn properties(&self) -> &[Property]
	{
		&self.properties
	}

	pub fn properties_mut(&mut self) -> impl Iterator<Item = &mut Property>
	{
		self.properties.iter_mut()
	}

	/// Children in the order they were added.
	pub fn children(&self) -> &[Node]
	{
		&self.children
	}

	pub fn children_mut(&mut self) -> impl Iterator<Item = &mut Node>
	{
		self.children.iter_mut()
	}

	pub fn property(&self, name: &str) -> Option<&Property>
	{
		self.properties.iter().find(|property| property.name == name)
	}

	pub fn child(&self, name: &str) -> Option<&Node>
	{
		self.children.iter().find(|child| child.name == name)
	}

	/// Look a node up by a `/`-separated path relative to this one.
	pub fn find(&self, path: &str) -> Option<&Node>
	{
		path.split('/')
			.filter(|component| !component.is_empty())
			.try_fold(self, |node, component| node.child(component))
	}

	pub fn add_property(&mut self, name: impl Into<String>, value: Vec<u8>) -> Result<&mut Property, TreeError>
	{
		let name = name.into();
		if self.property(&name).is_some() {
			return Err(TreeError::DuplicateProperty {
				node: self.name.clone(),
				property: name,
			});
		}

		self.properties.push(Property {
			name,
			value,
		});
		let index = self.properties.len() - 1;
		Ok(&mut self.properties[index])
	}

	pub fn add_property_cells(&mut self, name: &str, cells: &[u32]) -> Result<&mut Property, TreeError>
	{
		let value = cells.iter().flat_map(|cell| cell.to_be_bytes()).collect();
		self.add_property(name, value)
	}

	/// A 64-bit value as two cells, most significant first.
	pub fn add_property_u64(&mut self, name: &str, value: u64) -> Result<&mut Property, TreeError>
	{
		self.add_property(name, value.to_be_bytes().to_vec())
	}

	pub fn add_property_string(&mut self, name: &str, value: &str) -> Result<&mut Property, TreeError>
	{
		let mut bytes = Vec::with_capacity(value.len() + 1);
		bytes.extend_from_slice(value.as_bytes());
		bytes.push(0);
		self.add_property(name, bytes)
	}

	pub fn new_child(&mut self, name: impl Into<String>) -> Result<&mut Node, TreeError>
	{
		let name = name.into();
		if self.child(&name).is_some() {
			return Err(TreeError::DuplicateNode {
				node: self.name.clone(),
				child: name,
			});
		}

		self.children.push(Node::new(name));
		let index = self.children.len() - 1;
		Ok(&mut self.children[index])
	}

	/// Nodes in this subtree, this one included.
	pub fn node_count(&self) -> usize
	{
		1 + self.children.iter().map(Node::node_count).sum::<usize>()
	}

	/// Properties in this subtree.
	pub fn property_count(&self) -> usize
	{
		self.properties.len() + self.children.iter().map(Node::property_count).sum::<usize>()
	}
}
