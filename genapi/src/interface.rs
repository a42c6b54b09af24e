/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Capability interfaces of the node variants and the kind enums that
//! dispatch them.

use ambassador::{delegatable_trait, Delegate};

use super::{
    elem_type::{DisplayNotation, FloatRepresentation, IntegerRepresentation},
    node_base::NodeBase,
    store::{CacheStore, NodeData, NodeId, NodeStore, ValueStore},
    {Device, GenApiResult, ValueCtxt},
};

#[derive(Clone, Debug)]
pub enum IncrementMode {
    FixedIncrement,
    /// NOTE: `ListIncrement` isn't supported in `GenApiSchema 1.1` yet.
    ListIncrement,
}

#[delegatable_trait]
pub trait INode {
    fn name<'s>(&self, store: &'s impl NodeStore) -> &'s str {
        store.name_by_id(self.node_base().id()).unwrap()
    }

    fn node_base(&self) -> NodeBase<'_>;
    fn streamable(&self) -> bool;
}

#[delegatable_trait]
pub trait IInteger {
    fn value<T: ValueStore, U: CacheStore>(
        &self,
        device: &mut impl Device,
        store: &impl NodeStore,
        cx: &mut ValueCtxt<T, U>,
    ) -> GenApiResult<i64>;

    fn set_value<T: ValueStore, U: CacheStore>(
        &self,
        value: i64,
        device: &mut impl Device,
        store: &impl NodeStore,
        cx: &mut ValueCtxt<T, U>,
    ) -> GenApiResult<()>;

    fn min<T: ValueStore, U: CacheStore>(
        &self,
        device: &mut impl Device,
        store: &impl NodeStore,
        cx: &mut ValueCtxt<T, U>,
    ) -> GenApiResult<i64>;

    fn max<T: ValueStore, U: CacheStore>(
        &self,
        device: &mut impl Device,
        store: &impl NodeStore,
        cx: &mut ValueCtxt<T, U>,
    ) -> GenApiResult<i64>;

    fn inc_mode(&self, store: &impl NodeStore) -> Option<IncrementMode>;

    fn inc<T: ValueStore, U: CacheStore>(
        &self,
        device: &mut impl Device,
        store: &impl NodeStore,
        cx: &mut ValueCtxt<T, U>,
    ) -> GenApiResult<Option<i64>>;

    /// NOTE: `ValidValueSet` isn't supported in `GenApiSchema 1.1` yet.
    fn valid_value_set(&self, store: &impl NodeStore) -> &[i64];

    fn representation(&self, store: &impl NodeStore) -> IntegerRepresentation;

    fn unit(&self, store: &impl NodeStore) -> Option<&str>;

    fn set_min<T: ValueStore, U: CacheStore>(
        &self,
        value: i64,
        device: &mut impl Device,
        store: &impl NodeStore,
        cx: &mut ValueCtxt<T, U>,
    ) -> GenApiResult<()>;

    fn set_max<T: ValueStore, U: CacheStore>(
        &self,
        value: i64,
        device: &mut impl Device,
        store: &impl NodeStore,
        cx: &mut ValueCtxt<T, U>,
    ) -> GenApiResult<()>;

    fn is_readable<T: ValueStore, U: CacheStore>(
        &self,
        device: &mut impl Device,
        store: &impl NodeStore,
        cx: &mut ValueCtxt<T, U>,
    ) -> GenApiResult<bool>;

    fn is_writable<T: ValueStore, U: CacheStore>(
        &self,
        device: &mut impl Device,
        store: &impl NodeStore,
        cx: &mut ValueCtxt<T, U>,
    ) -> GenApiResult<bool>;
}

#[delegatable_trait]
pub trait IFloat {
    fn value<T: ValueStore, U: CacheStore>(
        &self,
        device: &mut impl Device,
        store: &impl NodeStore,
        cx: &mut ValueCtxt<T, U>,
    ) -> GenApiResult<f64>;

    fn set_value<T: ValueStore, U: CacheStore>(
        &self,
        value: f64,
        device: &mut impl Device,
        store: &impl NodeStore,
        cx: &mut ValueCtxt<T, U>,
    ) -> GenApiResult<()>;

    fn min<T: ValueStore, U: CacheStore>(
        &self,
        device: &mut impl Device,
        store: &impl NodeStore,
        cx: &mut ValueCtxt<T, U>,
    ) -> GenApiResult<f64>;

    fn max<T: ValueStore, U: CacheStore>(
        &self,
        device: &mut impl Device,
        store: &impl NodeStore,
        cx: &mut ValueCtxt<T, U>,
    ) -> GenApiResult<f64>;

    fn inc_mode(&self, store: &impl NodeStore) -> Option<IncrementMode>;

    fn inc<T: ValueStore, U: CacheStore>(
        &self,
        device: &mut impl Device,
        store: &impl NodeStore,
        cx: &mut ValueCtxt<T, U>,
    ) -> GenApiResult<Option<f64>>;

    fn representation(&self, store: &impl NodeStore) -> FloatRepresentation;

    fn unit(&self, store: &impl NodeStore) -> Option<&str>;

    fn display_notation(&self, store: &impl NodeStore) -> DisplayNotation;

    fn display_precision(&self, store: &impl NodeStore) -> i64;

    fn set_min<T: ValueStore, U: CacheStore>(
        &self,
        value: f64,
        device: &mut impl Device,
        store: &impl NodeStore,
        cx: &mut ValueCtxt<T, U>,
    ) -> GenApiResult<()>;

    fn set_max<T: ValueStore, U: CacheStore>(
        &self,
        value: f64,
        device: &mut impl Device,
        store: &impl NodeStore,
        cx: &mut ValueCtxt<T, U>,
    ) -> GenApiResult<()>;

    fn is_readable<T: ValueStore, U: CacheStore>(
        &self,
        device: &mut impl Device,
        store: &impl NodeStore,
        cx: &mut ValueCtxt<T, U>,
    ) -> GenApiResult<bool>;

    fn is_writable<T: ValueStore, U: CacheStore>(
        &self,
        device: &mut impl Device,
        store: &impl NodeStore,
        cx: &mut ValueCtxt<T, U>,
    ) -> GenApiResult<bool>;
}

#[delegatable_trait]
pub trait IString {
    fn value<T: ValueStore, U: CacheStore>(
        &self,
        device: &mut impl Device,
        store: &impl NodeStore,
        cx: &mut ValueCtxt<T, U>,
    ) -> GenApiResult<String>;

    fn set_value<T: ValueStore, U: CacheStore>(
        &self,
        value: String,
        device: &mut impl Device,
        store: &impl NodeStore,
        cx: &mut ValueCtxt<T, U>,
    ) -> GenApiResult<()>;

    fn max_length<T: ValueStore, U: CacheStore>(
        &self,
        device: &mut impl Device,
        store: &impl NodeStore,
        cx: &mut ValueCtxt<T, U>,
    ) -> GenApiResult<i64>;

    fn is_readable<T: ValueStore, U: CacheStore>(
        &self,
        device: &mut impl Device,
        store: &impl NodeStore,
        cx: &mut ValueCtxt<T, U>,
    ) -> GenApiResult<bool>;

    fn is_writable<T: ValueStore, U: CacheStore>(
        &self,
        device: &mut impl Device,
        store: &impl NodeStore,
        cx: &mut ValueCtxt<T, U>,
    ) -> GenApiResult<bool>;
}

#[delegatable_trait]
pub trait IEnumeration {
    fn current_value<T: ValueStore, U: CacheStore>(
        &self,
        device: &mut impl Device,
        store: &impl NodeStore,
        cx: &mut ValueCtxt<T, U>,
    ) -> GenApiResult<i64>;

    fn current_entry<T: ValueStore, U: CacheStore>(
        &self,
        device: &mut impl Device,
        store: &impl NodeStore,
        cx: &mut ValueCtxt<T, U>,
    ) -> GenApiResult<NodeId>;

    fn entries(&self, store: &impl NodeStore) -> &[NodeId];

    /// Returns the entry with the given symbolic name.
    fn entry_by_name(&self, name: &str, store: &impl NodeStore) -> Option<NodeId> {
        self.entries(store)
            .iter()
            .find(|nid| nid.name(store) == name)
            .copied()
    }

    fn set_entry_by_name<T: ValueStore, U: CacheStore>(
        &self,
        name: &str,
        device: &mut impl Device,
        store: &impl NodeStore,
        cx: &mut ValueCtxt<T, U>,
    ) -> GenApiResult<()>;

    fn set_entry_by_value<T: ValueStore, U: CacheStore>(
        &self,
        value: i64,
        device: &mut impl Device,
        store: &impl NodeStore,
        cx: &mut ValueCtxt<T, U>,
    ) -> GenApiResult<()>;

    fn is_readable<T: ValueStore, U: CacheStore>(
        &self,
        device: &mut impl Device,
        store: &impl NodeStore,
        cx: &mut ValueCtxt<T, U>,
    ) -> GenApiResult<bool>;

    fn is_writable<T: ValueStore, U: CacheStore>(
        &self,
        device: &mut impl Device,
        store: &impl NodeStore,
        cx: &mut ValueCtxt<T, U>,
    ) -> GenApiResult<bool>;
}

#[delegatable_trait]
pub trait ICommand {
    fn execute<T: ValueStore, U: CacheStore>(
        &self,
        device: &mut impl Device,
        store: &impl NodeStore,
        cx: &mut ValueCtxt<T, U>,
    ) -> GenApiResult<()>;

    fn is_done<T: ValueStore, U: CacheStore>(
        &self,
        device: &mut impl Device,
        store: &impl NodeStore,
        cx: &mut ValueCtxt<T, U>,
    ) -> GenApiResult<bool>;

    fn is_writable<T: ValueStore, U: CacheStore>(
        &self,
        device: &mut impl Device,
        store: &impl NodeStore,
        cx: &mut ValueCtxt<T, U>,
    ) -> GenApiResult<bool>;
}

#[delegatable_trait]
pub trait IBoolean {
    fn value<T: ValueStore, U: CacheStore>(
        &self,
        device: &mut impl Device,
        store: &impl NodeStore,
        cx: &mut ValueCtxt<T, U>,
    ) -> GenApiResult<bool>;

    fn set_value<T: ValueStore, U: CacheStore>(
        &self,
        value: bool,
        device: &mut impl Device,
        store: &impl NodeStore,
        cx: &mut ValueCtxt<T, U>,
    ) -> GenApiResult<()>;

    fn is_readable<T: ValueStore, U: CacheStore>(
        &self,
        device: &mut impl Device,
        store: &impl NodeStore,
        cx: &mut ValueCtxt<T, U>,
    ) -> GenApiResult<bool>;

    fn is_writable<T: ValueStore, U: CacheStore>(
        &self,
        device: &mut impl Device,
        store: &impl NodeStore,
        cx: &mut ValueCtxt<T, U>,
    ) -> GenApiResult<bool>;
}

#[delegatable_trait]
pub trait IRegister {
    /// Reads bytes from the register.
    ///
    /// `buf.len()` must equal the length returned by
    /// [`IRegister::length`].
    fn read<T: ValueStore, U: CacheStore>(
        &self,
        buf: &mut [u8],
        device: &mut impl Device,
        store: &impl NodeStore,
        cx: &mut ValueCtxt<T, U>,
    ) -> GenApiResult<()>;

    /// Writes bytes to the register.
    ///
    /// `buf.len()` must equal the length returned by
    /// [`IRegister::length`].
    fn write<T: ValueStore, U: CacheStore>(
        &self,
        buf: &[u8],
        device: &mut impl Device,
        store: &impl NodeStore,
        cx: &mut ValueCtxt<T, U>,
    ) -> GenApiResult<()>;

    fn address<T: ValueStore, U: CacheStore>(
        &self,
        device: &mut impl Device,
        store: &impl NodeStore,
        cx: &mut ValueCtxt<T, U>,
    ) -> GenApiResult<i64>;

    fn length<T: ValueStore, U: CacheStore>(
        &self,
        device: &mut impl Device,
        store: &impl NodeStore,
        cx: &mut ValueCtxt<T, U>,
    ) -> GenApiResult<i64>;
}

#[delegatable_trait]
pub trait ICategory {
    /// Returns nodes in the category.
    fn nodes(&self, store: &impl NodeStore) -> &[NodeId];
}

#[delegatable_trait]
pub trait IPort {
    fn read<T: ValueStore, U: CacheStore>(
        &self,
        address: i64,
        buf: &mut [u8],
        device: &mut impl Device,
        store: &impl NodeStore,
        cx: &mut ValueCtxt<T, U>,
    ) -> GenApiResult<()>;

    fn write<T: ValueStore, U: CacheStore>(
        &self,
        address: i64,
        buf: &[u8],
        device: &mut impl Device,
        store: &impl NodeStore,
        cx: &mut ValueCtxt<T, U>,
    ) -> GenApiResult<()>;
}

#[delegatable_trait]
pub trait ISelector {
    /// Returns the nodes this node selects.
    fn selected_nodes(&self, store: &impl NodeStore) -> GenApiResult<&[NodeId]>;
}

macro_rules! declare_kind_enum {
    (
        $(#[$meta:meta])*
        $name:ident { $($variant:ident($node:ty),)* }
    ) => {
        $(#[$meta])*
        pub enum $name<'a> {
            $($variant(&'a $node),)*
        }

        impl<'a> $name<'a> {
            pub(super) fn maybe_from(id: NodeId, store: &'a impl NodeStore) -> Option<Self> {
                #[allow(unreachable_patterns)]
                match store.node_opt(id)? {
                    $(NodeData::$variant(n) => Some(Self::$variant(n)),)*
                    _ => None,
                }
            }
        }
    };
}

declare_kind_enum! {
    #[derive(Delegate, Clone, Copy, Debug)]
    #[delegate(INode)]
    INodeKind {
        Integer(super::IntegerNode),
        IntReg(super::IntRegNode),
        MaskedIntReg(super::MaskedIntRegNode),
        IntConverter(super::IntConverterNode),
        IntSwissKnife(super::IntSwissKnifeNode),
        Float(super::FloatNode),
        FloatReg(super::FloatRegNode),
        Converter(super::ConverterNode),
        SwissKnife(super::SwissKnifeNode),
        String(super::StringNode),
        StringReg(super::StringRegNode),
        Boolean(super::BooleanNode),
        Command(super::CommandNode),
        Register(super::RegisterNode),
        Category(super::CategoryNode),
        Port(super::PortNode),
        Enumeration(super::EnumerationNode),
        EnumEntry(super::EnumEntryNode),
        Node(super::Node),
    }
}

impl<'a> INodeKind<'a> {
    /// Returns [`NodeBase`] with the lifetime of the store borrow.
    #[must_use]
    pub fn node_base_precise(self) -> NodeBase<'a> {
        match self {
            Self::Integer(n) => n.node_base(),
            Self::IntReg(n) => n.node_base(),
            Self::MaskedIntReg(n) => n.node_base(),
            Self::IntConverter(n) => n.node_base(),
            Self::IntSwissKnife(n) => n.node_base(),
            Self::Float(n) => n.node_base(),
            Self::FloatReg(n) => n.node_base(),
            Self::Converter(n) => n.node_base(),
            Self::SwissKnife(n) => n.node_base(),
            Self::String(n) => n.node_base(),
            Self::StringReg(n) => n.node_base(),
            Self::Boolean(n) => n.node_base(),
            Self::Command(n) => n.node_base(),
            Self::Register(n) => n.node_base(),
            Self::Category(n) => n.node_base(),
            Self::Port(n) => n.node_base(),
            Self::Enumeration(n) => n.node_base(),
            Self::EnumEntry(n) => n.node_base(),
            Self::Node(n) => n.node_base(),
        }
    }
}

declare_kind_enum! {
    #[derive(Delegate, Clone, Copy, Debug)]
    #[delegate(IInteger)]
    IIntegerKind {
        Integer(super::IntegerNode),
        IntReg(super::IntRegNode),
        MaskedIntReg(super::MaskedIntRegNode),
        IntConverter(super::IntConverterNode),
        IntSwissKnife(super::IntSwissKnifeNode),
    }
}

declare_kind_enum! {
    #[derive(Delegate, Clone, Copy, Debug)]
    #[delegate(IFloat)]
    IFloatKind {
        Float(super::FloatNode),
        FloatReg(super::FloatRegNode),
        Converter(super::ConverterNode),
        SwissKnife(super::SwissKnifeNode),
    }
}

declare_kind_enum! {
    #[derive(Delegate, Clone, Copy, Debug)]
    #[delegate(IString)]
    IStringKind {
        String(super::StringNode),
        StringReg(super::StringRegNode),
    }
}

declare_kind_enum! {
    #[derive(Delegate, Clone, Copy, Debug)]
    #[delegate(ICommand)]
    ICommandKind {
        Command(super::CommandNode),
    }
}

declare_kind_enum! {
    #[derive(Delegate, Clone, Copy, Debug)]
    #[delegate(IEnumeration)]
    IEnumerationKind {
        Enumeration(super::EnumerationNode),
    }
}

declare_kind_enum! {
    #[derive(Delegate, Clone, Copy, Debug)]
    #[delegate(IBoolean)]
    IBooleanKind {
        Boolean(super::BooleanNode),
    }
}

declare_kind_enum! {
    #[derive(Delegate, Clone, Copy, Debug)]
    #[delegate(IRegister)]
    IRegisterKind {
        Register(super::RegisterNode),
        IntReg(super::IntRegNode),
        MaskedIntReg(super::MaskedIntRegNode),
        StringReg(super::StringRegNode),
        FloatReg(super::FloatRegNode),
    }
}

declare_kind_enum! {
    #[derive(Delegate, Clone, Copy, Debug)]
    #[delegate(ICategory)]
    ICategoryKind {
        Category(super::CategoryNode),
    }
}

declare_kind_enum! {
    #[derive(Delegate, Clone, Copy, Debug)]
    #[delegate(IPort)]
    IPortKind {
        Port(super::PortNode),
    }
}

declare_kind_enum! {
    #[derive(Delegate, Clone, Copy, Debug)]
    #[delegate(ISelector)]
    ISelectorKind {
        Integer(super::IntegerNode),
        IntReg(super::IntRegNode),
        MaskedIntReg(super::MaskedIntRegNode),
        Boolean(super::BooleanNode),
        Enumeration(super::EnumerationNode),
    }
}
