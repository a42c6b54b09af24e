/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use super::{
    interface::INode,
    node_base::{NodeAttributeBase, NodeBase, NodeElementBase},
};

/// A bare `Node` element: carries only the common attributes, typically
/// used as an alias target.
#[derive(Debug, Clone)]
pub struct Node {
    pub(crate) attr_base: NodeAttributeBase,
    pub(crate) elem_base: NodeElementBase,
}

impl INode for Node {
    fn node_base(&self) -> NodeBase {
        NodeBase::new(&self.attr_base, &self.elem_base)
    }

    fn streamable(&self) -> bool {
        false
    }
}
