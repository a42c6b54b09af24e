/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Typed wrappers over feature nodes, dispatched through a
//! [`ParamsCtxt`].

use lucida_genapi::{prelude::*, store::NodeId, GenApiResult};

use super::{GenApiCtxt, GenApiDevice, ParamsCtxt};
use crate::{DeviceControl, LucidaResult};

/// An untyped node of the feature tree.
#[derive(Clone, Copy, Debug)]
pub struct Node(pub(crate) NodeId);

macro_rules! downcast {
    (
        $(#[$meta:meta])*
        $name:ident, $kind_getter:ident, $wrapper:ident
    ) => {
        $(#[$meta])*
        pub fn $name<Ctrl, Ctxt: GenApiCtxt>(
            self,
            ctxt: &ParamsCtxt<Ctrl, Ctxt>,
        ) -> Option<$wrapper> {
            let ns = ctxt.node_store();
            self.0.$kind_getter(ns).map(|_| $wrapper(self.0))
        }
    };
}

impl Node {
    pub fn name<'a, Ctrl, Ctxt: GenApiCtxt>(self, ctxt: &'a ParamsCtxt<Ctrl, Ctxt>) -> &'a str {
        self.0.name(ctxt.node_store())
    }

    downcast!(as_integer, as_iinteger_kind, IntegerNode);
    downcast!(as_float, as_ifloat_kind, FloatNode);
    downcast!(as_string, as_istring_kind, StringNode);
    downcast!(as_boolean, as_iboolean_kind, BooleanNode);
    downcast!(as_command, as_icommand_kind, CommandNode);
    downcast!(as_enumeration, as_ienumeration_kind, EnumerationNode);
    downcast!(as_category, as_icategory_kind, CategoryNode);
    downcast!(as_register, as_iregister_kind, RegisterNode);

    pub fn as_enum_entry<Ctrl, Ctxt: GenApiCtxt>(
        self,
        ctxt: &ParamsCtxt<Ctrl, Ctxt>,
    ) -> Option<EnumEntryNode> {
        self.0
            .as_enum_entry(ctxt.node_store())
            .map(|_| EnumEntryNode(self.0))
    }

    /// `pIsImplemented` of the node; absent means implemented.
    pub fn is_implemented<Ctrl: DeviceControl, Ctxt: GenApiCtxt>(
        self,
        ctxt: &mut ParamsCtxt<Ctrl, Ctxt>,
    ) -> LucidaResult<bool> {
        let gate = {
            let ns = ctxt.node_store();
            self.0
                .as_inode_kind(ns)
                .and_then(|kind| kind.node_base_precise().p_is_implemented())
        };
        match gate {
            None => Ok(true),
            Some(nid) => run(ctxt, |device, ns, cx| read_gate(nid, device, ns, cx)),
        }
    }

    /// `pIsAvailable` of the node; absent means available.
    pub fn is_available<Ctrl: DeviceControl, Ctxt: GenApiCtxt>(
        self,
        ctxt: &mut ParamsCtxt<Ctrl, Ctxt>,
    ) -> LucidaResult<bool> {
        let gate = {
            let ns = ctxt.node_store();
            self.0
                .as_inode_kind(ns)
                .and_then(|kind| kind.node_base_precise().p_is_available())
        };
        match gate {
            None => Ok(true),
            Some(nid) => run(ctxt, |device, ns, cx| read_gate(nid, device, ns, cx)),
        }
    }
}

/// Evaluates an availability gate node to a boolean.
fn read_gate<D, NS, VS, CS>(
    nid: NodeId,
    device: &mut D,
    ns: &NS,
    cx: &mut super::ValueCtxt<VS, CS>,
) -> GenApiResult<bool>
where
    D: lucida_genapi::Device,
    NS: super::NodeStore,
    VS: super::ValueStore,
    CS: super::CacheStore,
{
    if let Some(boolean) = nid.as_iboolean_kind(ns) {
        boolean.value(device, ns, cx)
    } else {
        Ok(nid.expect_iinteger_kind(ns)?.value(device, ns, cx)? != 0)
    }
}

fn run<Ctrl, Ctxt, F, R>(ctxt: &mut ParamsCtxt<Ctrl, Ctxt>, f: F) -> LucidaResult<R>
where
    Ctrl: DeviceControl,
    Ctxt: GenApiCtxt,
    F: FnOnce(
        &mut GenApiDevice<'_, Ctrl>,
        &Ctxt::NS,
        &mut super::ValueCtxt<Ctxt::VS, Ctxt::CS>,
    ) -> GenApiResult<R>,
{
    ctxt.enter2(|ctrl, ns, cx| {
        let mut device = GenApiDevice::new(ctrl);
        f(&mut device, ns, cx)
    })
    .map_err(Into::into)
}

macro_rules! node_name_getter {
    () => {
        pub fn name<'a, Ctrl, Ctxt: GenApiCtxt>(
            self,
            ctxt: &'a ParamsCtxt<Ctrl, Ctxt>,
        ) -> &'a str {
            self.0.name(ctxt.node_store())
        }

        /// Upcasts back to an untyped [`Node`].
        #[must_use]
        pub fn as_node(self) -> Node {
            Node(self.0)
        }
    };
}

#[derive(Clone, Copy, Debug)]
pub struct IntegerNode(pub(crate) NodeId);

impl IntegerNode {
    node_name_getter!();

    pub fn value<Ctrl: DeviceControl, Ctxt: GenApiCtxt>(
        self,
        ctxt: &mut ParamsCtxt<Ctrl, Ctxt>,
    ) -> LucidaResult<i64> {
        run(ctxt, |device, ns, cx| {
            self.0.expect_iinteger_kind(ns)?.value(device, ns, cx)
        })
    }

    pub fn set_value<Ctrl: DeviceControl, Ctxt: GenApiCtxt>(
        self,
        ctxt: &mut ParamsCtxt<Ctrl, Ctxt>,
        value: i64,
    ) -> LucidaResult<()> {
        run(ctxt, |device, ns, cx| {
            self.0
                .expect_iinteger_kind(ns)?
                .set_value(value, device, ns, cx)
        })
    }

    pub fn min<Ctrl: DeviceControl, Ctxt: GenApiCtxt>(
        self,
        ctxt: &mut ParamsCtxt<Ctrl, Ctxt>,
    ) -> LucidaResult<i64> {
        run(ctxt, |device, ns, cx| {
            self.0.expect_iinteger_kind(ns)?.min(device, ns, cx)
        })
    }

    pub fn max<Ctrl: DeviceControl, Ctxt: GenApiCtxt>(
        self,
        ctxt: &mut ParamsCtxt<Ctrl, Ctxt>,
    ) -> LucidaResult<i64> {
        run(ctxt, |device, ns, cx| {
            self.0.expect_iinteger_kind(ns)?.max(device, ns, cx)
        })
    }

    pub fn inc<Ctrl: DeviceControl, Ctxt: GenApiCtxt>(
        self,
        ctxt: &mut ParamsCtxt<Ctrl, Ctxt>,
    ) -> LucidaResult<Option<i64>> {
        run(ctxt, |device, ns, cx| {
            self.0.expect_iinteger_kind(ns)?.inc(device, ns, cx)
        })
    }

    pub fn is_readable<Ctrl: DeviceControl, Ctxt: GenApiCtxt>(
        self,
        ctxt: &mut ParamsCtxt<Ctrl, Ctxt>,
    ) -> LucidaResult<bool> {
        run(ctxt, |device, ns, cx| {
            self.0.expect_iinteger_kind(ns)?.is_readable(device, ns, cx)
        })
    }

    pub fn is_writable<Ctrl: DeviceControl, Ctxt: GenApiCtxt>(
        self,
        ctxt: &mut ParamsCtxt<Ctrl, Ctxt>,
    ) -> LucidaResult<bool> {
        run(ctxt, |device, ns, cx| {
            self.0.expect_iinteger_kind(ns)?.is_writable(device, ns, cx)
        })
    }
}

#[derive(Clone, Copy, Debug)]
pub struct FloatNode(pub(crate) NodeId);

impl FloatNode {
    node_name_getter!();

    pub fn value<Ctrl: DeviceControl, Ctxt: GenApiCtxt>(
        self,
        ctxt: &mut ParamsCtxt<Ctrl, Ctxt>,
    ) -> LucidaResult<f64> {
        run(ctxt, |device, ns, cx| {
            self.0.expect_ifloat_kind(ns)?.value(device, ns, cx)
        })
    }

    pub fn set_value<Ctrl: DeviceControl, Ctxt: GenApiCtxt>(
        self,
        ctxt: &mut ParamsCtxt<Ctrl, Ctxt>,
        value: f64,
    ) -> LucidaResult<()> {
        run(ctxt, |device, ns, cx| {
            self.0
                .expect_ifloat_kind(ns)?
                .set_value(value, device, ns, cx)
        })
    }

    pub fn min<Ctrl: DeviceControl, Ctxt: GenApiCtxt>(
        self,
        ctxt: &mut ParamsCtxt<Ctrl, Ctxt>,
    ) -> LucidaResult<f64> {
        run(ctxt, |device, ns, cx| {
            self.0.expect_ifloat_kind(ns)?.min(device, ns, cx)
        })
    }

    pub fn max<Ctrl: DeviceControl, Ctxt: GenApiCtxt>(
        self,
        ctxt: &mut ParamsCtxt<Ctrl, Ctxt>,
    ) -> LucidaResult<f64> {
        run(ctxt, |device, ns, cx| {
            self.0.expect_ifloat_kind(ns)?.max(device, ns, cx)
        })
    }

    pub fn is_readable<Ctrl: DeviceControl, Ctxt: GenApiCtxt>(
        self,
        ctxt: &mut ParamsCtxt<Ctrl, Ctxt>,
    ) -> LucidaResult<bool> {
        run(ctxt, |device, ns, cx| {
            self.0.expect_ifloat_kind(ns)?.is_readable(device, ns, cx)
        })
    }

    pub fn is_writable<Ctrl: DeviceControl, Ctxt: GenApiCtxt>(
        self,
        ctxt: &mut ParamsCtxt<Ctrl, Ctxt>,
    ) -> LucidaResult<bool> {
        run(ctxt, |device, ns, cx| {
            self.0.expect_ifloat_kind(ns)?.is_writable(device, ns, cx)
        })
    }
}

#[derive(Clone, Copy, Debug)]
pub struct StringNode(pub(crate) NodeId);

impl StringNode {
    node_name_getter!();

    pub fn value<Ctrl: DeviceControl, Ctxt: GenApiCtxt>(
        self,
        ctxt: &mut ParamsCtxt<Ctrl, Ctxt>,
    ) -> LucidaResult<String> {
        run(ctxt, |device, ns, cx| {
            self.0.expect_istring_kind(ns)?.value(device, ns, cx)
        })
    }

    pub fn set_value<Ctrl: DeviceControl, Ctxt: GenApiCtxt>(
        self,
        ctxt: &mut ParamsCtxt<Ctrl, Ctxt>,
        value: String,
    ) -> LucidaResult<()> {
        run(ctxt, |device, ns, cx| {
            self.0
                .expect_istring_kind(ns)?
                .set_value(value, device, ns, cx)
        })
    }

    pub fn max_length<Ctrl: DeviceControl, Ctxt: GenApiCtxt>(
        self,
        ctxt: &mut ParamsCtxt<Ctrl, Ctxt>,
    ) -> LucidaResult<i64> {
        run(ctxt, |device, ns, cx| {
            self.0.expect_istring_kind(ns)?.max_length(device, ns, cx)
        })
    }
}

#[derive(Clone, Copy, Debug)]
pub struct BooleanNode(pub(crate) NodeId);

impl BooleanNode {
    node_name_getter!();

    pub fn value<Ctrl: DeviceControl, Ctxt: GenApiCtxt>(
        self,
        ctxt: &mut ParamsCtxt<Ctrl, Ctxt>,
    ) -> LucidaResult<bool> {
        run(ctxt, |device, ns, cx| {
            self.0.expect_iboolean_kind(ns)?.value(device, ns, cx)
        })
    }

    pub fn set_value<Ctrl: DeviceControl, Ctxt: GenApiCtxt>(
        self,
        ctxt: &mut ParamsCtxt<Ctrl, Ctxt>,
        value: bool,
    ) -> LucidaResult<()> {
        run(ctxt, |device, ns, cx| {
            self.0
                .expect_iboolean_kind(ns)?
                .set_value(value, device, ns, cx)
        })
    }
}

#[derive(Clone, Copy, Debug)]
pub struct CommandNode(pub(crate) NodeId);

impl CommandNode {
    node_name_getter!();

    pub fn execute<Ctrl: DeviceControl, Ctxt: GenApiCtxt>(
        self,
        ctxt: &mut ParamsCtxt<Ctrl, Ctxt>,
    ) -> LucidaResult<()> {
        run(ctxt, |device, ns, cx| {
            self.0.expect_icommand_kind(ns)?.execute(device, ns, cx)
        })
    }

    pub fn is_done<Ctrl: DeviceControl, Ctxt: GenApiCtxt>(
        self,
        ctxt: &mut ParamsCtxt<Ctrl, Ctxt>,
    ) -> LucidaResult<bool> {
        run(ctxt, |device, ns, cx| {
            self.0.expect_icommand_kind(ns)?.is_done(device, ns, cx)
        })
    }
}

#[derive(Clone, Copy, Debug)]
pub struct EnumerationNode(pub(crate) NodeId);

impl EnumerationNode {
    node_name_getter!();

    pub fn current_value<Ctrl: DeviceControl, Ctxt: GenApiCtxt>(
        self,
        ctxt: &mut ParamsCtxt<Ctrl, Ctxt>,
    ) -> LucidaResult<i64> {
        run(ctxt, |device, ns, cx| {
            self.0
                .expect_ienumeration_kind(ns)?
                .current_value(device, ns, cx)
        })
    }

    pub fn current_entry<Ctrl: DeviceControl, Ctxt: GenApiCtxt>(
        self,
        ctxt: &mut ParamsCtxt<Ctrl, Ctxt>,
    ) -> LucidaResult<EnumEntryNode> {
        run(ctxt, |device, ns, cx| {
            self.0
                .expect_ienumeration_kind(ns)?
                .current_entry(device, ns, cx)
        })
        .map(EnumEntryNode)
    }

    pub fn entries<Ctrl, Ctxt: GenApiCtxt>(
        self,
        ctxt: &ParamsCtxt<Ctrl, Ctxt>,
    ) -> Vec<EnumEntryNode> {
        let ns = ctxt.node_store();
        match self.0.as_ienumeration_kind(ns) {
            Some(kind) => kind.entries(ns).iter().map(|nid| EnumEntryNode(*nid)).collect(),
            None => Vec::new(),
        }
    }

    pub fn set_entry_by_name<Ctrl: DeviceControl, Ctxt: GenApiCtxt>(
        self,
        ctxt: &mut ParamsCtxt<Ctrl, Ctxt>,
        name: &str,
    ) -> LucidaResult<()> {
        run(ctxt, |device, ns, cx| {
            self.0
                .expect_ienumeration_kind(ns)?
                .set_entry_by_name(name, device, ns, cx)
        })
    }

    pub fn set_entry_by_value<Ctrl: DeviceControl, Ctxt: GenApiCtxt>(
        self,
        ctxt: &mut ParamsCtxt<Ctrl, Ctxt>,
        value: i64,
    ) -> LucidaResult<()> {
        run(ctxt, |device, ns, cx| {
            self.0
                .expect_ienumeration_kind(ns)?
                .set_entry_by_value(value, device, ns, cx)
        })
    }

    pub fn is_writable<Ctrl: DeviceControl, Ctxt: GenApiCtxt>(
        self,
        ctxt: &mut ParamsCtxt<Ctrl, Ctxt>,
    ) -> LucidaResult<bool> {
        run(ctxt, |device, ns, cx| {
            self.0
                .expect_ienumeration_kind(ns)?
                .is_writable(device, ns, cx)
        })
    }
}

#[derive(Clone, Copy, Debug)]
pub struct EnumEntryNode(pub(crate) NodeId);

impl EnumEntryNode {
    node_name_getter!();

    pub fn value<Ctrl, Ctxt: GenApiCtxt>(self, ctxt: &ParamsCtxt<Ctrl, Ctxt>) -> Option<i64> {
        self.0
            .as_enum_entry(ctxt.node_store())
            .map(lucida_genapi::EnumEntryNode::value)
    }

    pub fn display_name<'a, Ctrl, Ctxt: GenApiCtxt>(
        self,
        ctxt: &'a ParamsCtxt<Ctrl, Ctxt>,
    ) -> Option<&'a str> {
        let ns = ctxt.node_store();
        let entry = self.0.as_enum_entry(ns)?;
        Some(
            entry
                .node_base()
                .display_name()
                .unwrap_or_else(|| self.0.name(ns)),
        )
    }
}

#[derive(Clone, Copy, Debug)]
pub struct CategoryNode(pub(crate) NodeId);

impl CategoryNode {
    node_name_getter!();

    pub fn nodes<Ctrl, Ctxt: GenApiCtxt>(self, ctxt: &ParamsCtxt<Ctrl, Ctxt>) -> Vec<Node> {
        let ns = ctxt.node_store();
        match self.0.as_icategory_kind(ns) {
            Some(kind) => kind.nodes(ns).iter().map(|nid| Node(*nid)).collect(),
            None => Vec::new(),
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct RegisterNode(pub(crate) NodeId);

impl RegisterNode {
    node_name_getter!();

    pub fn read<Ctrl: DeviceControl, Ctxt: GenApiCtxt>(
        self,
        ctxt: &mut ParamsCtxt<Ctrl, Ctxt>,
        buf: &mut [u8],
    ) -> LucidaResult<()> {
        run(ctxt, |device, ns, cx| {
            self.0.expect_iregister_kind(ns)?.read(buf, device, ns, cx)
        })
    }

    pub fn write<Ctrl: DeviceControl, Ctxt: GenApiCtxt>(
        self,
        ctxt: &mut ParamsCtxt<Ctrl, Ctxt>,
        buf: &[u8],
    ) -> LucidaResult<()> {
        run(ctxt, |device, ns, cx| {
            self.0.expect_iregister_kind(ns)?.write(buf, device, ns, cx)
        })
    }

    pub fn address<Ctrl: DeviceControl, Ctxt: GenApiCtxt>(
        self,
        ctxt: &mut ParamsCtxt<Ctrl, Ctxt>,
    ) -> LucidaResult<i64> {
        run(ctxt, |device, ns, cx| {
            self.0.expect_iregister_kind(ns)?.address(device, ns, cx)
        })
    }

    pub fn length<Ctrl: DeviceControl, Ctxt: GenApiCtxt>(
        self,
        ctxt: &mut ParamsCtxt<Ctrl, Ctxt>,
    ) -> LucidaResult<i64> {
        run(ctxt, |device, ns, cx| {
            self.0.expect_iregister_kind(ns)?.length(device, ns, cx)
        })
    }
}
