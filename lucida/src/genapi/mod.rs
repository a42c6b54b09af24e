/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Access to the `GenApi` feature tree of a camera.
//!
//! A [`GenApiCtxt`] owns the parsed node arena plus the evaluation state
//! (value store, register cache, policies). [`ParamsCtxt`] pairs a
//! context with a control handle so feature nodes can perform their
//! register I/O.

mod node_kind;

pub use node_kind::{
    BooleanNode, CategoryNode, CommandNode, EnumEntryNode, EnumerationNode, FloatNode,
    IntegerNode, Node, RegisterNode, StringNode,
};

use std::{
    convert::TryInto,
    sync::{Arc, Mutex},
};

use auto_impl::auto_impl;
use lucida_genapi::{builder::GenApiBuilder, store};

use super::{ControlError, ControlResult, DeviceControl};

pub use lucida_genapi::{
    elem_type::{AccessMode, NameSpace, Visibility},
    store::{
        CacheSink, CacheStore, DefaultCacheStore, DefaultNodeStore, DefaultValueStore, NodeId,
        NodeStore, ValueStore,
    },
    AccessCheckPolicy, GenApiError, RangeCheckPolicy, RegisterCachePolicy, RegisterDescription,
    ValueCtxt,
};

/// Pairs the device control handle with the `GenApi` context of the
/// device.
#[derive(Debug, Clone)]
pub struct ParamsCtxt<Ctrl, Ctxt> {
    /// Control handle of the device.
    pub ctrl: Ctrl,
    /// `GenApi` context of the device.
    pub ctxt: Ctxt,
}

impl<Ctrl, Ctxt> ParamsCtxt<Ctrl, Ctxt>
where
    Ctxt: GenApiCtxt,
{
    /// Returns `None` when the context has no node with the given name.
    pub fn node(&self, name: &str) -> Option<Node> {
        let ns = self.ctxt.node_store();
        ns.id_by_name(name).map(Node)
    }

    pub fn node_store(&self) -> &Ctxt::NS {
        self.ctxt.node_store()
    }
}

impl<Ctrl, Ctxt> ParamsCtxt<Ctrl, Ctxt>
where
    Ctrl: DeviceControl,
    Ctxt: GenApiCtxt,
{
    /// Enters the context.
    pub fn enter<F, R>(&mut self, f: F) -> R
    where
        F: FnOnce(&mut Ctrl, &mut Ctxt) -> R,
    {
        f(&mut self.ctrl, &mut self.ctxt)
    }

    /// Enters the context and the `GenApiCtxt` in one step.
    pub fn enter2<F, R>(&mut self, f: F) -> R
    where
        F: FnOnce(&mut Ctrl, &Ctxt::NS, &mut ValueCtxt<Ctxt::VS, Ctxt::CS>) -> R,
    {
        self.enter(|ctrl, ctxt| {
            ctxt.enter(|node_store, value_ctxt| f(ctrl, node_store, value_ctxt))
        })
    }

    pub fn set_register_cache_policy(&mut self, policy: RegisterCachePolicy) {
        self.ctxt
            .enter(|_, value_ctxt| value_ctxt.set_register_cache_policy(policy));
    }

    pub fn set_range_check_policy(&mut self, policy: RangeCheckPolicy) {
        self.ctxt
            .enter(|_, value_ctxt| value_ctxt.set_range_check_policy(policy));
    }

    pub fn set_access_check_policy(&mut self, policy: AccessCheckPolicy) {
        self.ctxt
            .enter(|_, value_ctxt| value_ctxt.set_access_check_policy(policy));
    }
}

impl<Ctrl, Ctxt> ParamsCtxt<Ctrl, Ctxt> {
    /// Converts internal types. This method works like
    /// `std::convert::From`, just a hack to avoid `E0119`.
    pub fn convert_from<Ctrl2, Ctxt2>(from: ParamsCtxt<Ctrl2, Ctxt2>) -> Self
    where
        Ctrl: From<Ctrl2>,
        Ctxt: From<Ctxt2>,
    {
        ParamsCtxt {
            ctrl: from.ctrl.into(),
            ctxt: from.ctxt.into(),
        }
    }

    /// Converts internal types. This method works like
    /// `std::convert::Into`, just a hack to avoid `E0119`.
    pub fn convert_into<Ctrl2, Ctxt2>(self) -> ParamsCtxt<Ctrl2, Ctxt2>
    where
        Ctrl: Into<Ctrl2>,
        Ctxt: Into<Ctxt2>,
    {
        ParamsCtxt {
            ctrl: self.ctrl.into(),
            ctxt: self.ctxt.into(),
        }
    }
}

/// A trait that provides access to a `GenApi` context.
#[auto_impl(&mut, Box)]
pub trait GenApiCtxt {
    /// A type that implements [`NodeStore`].
    type NS: NodeStore;
    /// A type that implements [`ValueStore`].
    type VS: ValueStore;
    /// A type that implements [`CacheStore`].
    type CS: CacheStore;

    fn enter<F, R>(&mut self, f: F) -> R
    where
        F: FnOnce(&Self::NS, &mut ValueCtxt<Self::VS, Self::CS>) -> R;

    fn node_store(&self) -> &Self::NS;

    fn clear_cache(&mut self) {
        self.enter(|_, value_ctxt| value_ctxt.clear_cache());
    }
}

/// Direct conversion from a `GenApi` string to a context.
pub trait FromXml {
    fn from_xml(xml: &impl AsRef<str>) -> ControlResult<Self>
    where
        Self: Sized + GenApiCtxt;
}

/// Default `GenApi` context: caches register values where the document
/// permits.
///
/// Use [`NoCacheGenApiCtxt`] to bypass caching entirely.
#[derive(Debug)]
pub struct DefaultGenApiCtxt {
    pub node_store: store::DefaultNodeStore,
    pub value_ctxt: ValueCtxt<store::DefaultValueStore, store::DefaultCacheStore>,
    pub reg_desc: RegisterDescription,
}

impl GenApiCtxt for DefaultGenApiCtxt {
    type NS = store::DefaultNodeStore;
    type VS = store::DefaultValueStore;
    type CS = store::DefaultCacheStore;

    fn enter<F, R>(&mut self, f: F) -> R
    where
        F: FnOnce(&Self::NS, &mut ValueCtxt<Self::VS, Self::CS>) -> R,
    {
        f(&self.node_store, &mut self.value_ctxt)
    }

    fn node_store(&self) -> &Self::NS {
        &self.node_store
    }
}

impl FromXml for DefaultGenApiCtxt {
    fn from_xml(xml: &impl AsRef<str>) -> ControlResult<Self>
    where
        Self: Sized + GenApiCtxt,
    {
        let (reg_desc, node_store, value_ctxt) = GenApiBuilder::<DefaultNodeStore>::default()
            .build(xml)
            .map_err(|e| ControlError::InvalidData(anyhow::Error::msg(e.to_string())))?;
        Ok(Self {
            node_store,
            value_ctxt,
            reg_desc,
        })
    }
}

/// A sharable version of [`DefaultGenApiCtxt`].
#[derive(Clone, Debug)]
pub struct SharedDefaultGenApiCtxt {
    pub node_store: Arc<store::DefaultNodeStore>,
    pub value_ctxt: Arc<Mutex<ValueCtxt<store::DefaultValueStore, store::DefaultCacheStore>>>,
    pub reg_desc: Arc<RegisterDescription>,
}

impl GenApiCtxt for SharedDefaultGenApiCtxt {
    type NS = store::DefaultNodeStore;
    type VS = store::DefaultValueStore;
    type CS = store::DefaultCacheStore;

    fn enter<F, R>(&mut self, f: F) -> R
    where
        F: FnOnce(&Self::NS, &mut ValueCtxt<Self::VS, Self::CS>) -> R,
    {
        f(&self.node_store, &mut self.value_ctxt.lock().unwrap())
    }

    fn node_store(&self) -> &Self::NS {
        &self.node_store
    }
}

impl FromXml for SharedDefaultGenApiCtxt {
    fn from_xml(xml: &impl AsRef<str>) -> ControlResult<Self>
    where
        Self: Sized + GenApiCtxt,
    {
        Ok(DefaultGenApiCtxt::from_xml(xml)?.into())
    }
}

impl From<DefaultGenApiCtxt> for SharedDefaultGenApiCtxt {
    fn from(ctxt: DefaultGenApiCtxt) -> Self {
        Self {
            node_store: Arc::new(ctxt.node_store),
            value_ctxt: Arc::new(Mutex::new(ctxt.value_ctxt)),
            reg_desc: Arc::new(ctxt.reg_desc),
        }
    }
}

/// A `GenApi` context that never caches register values.
#[derive(Debug)]
pub struct NoCacheGenApiCtxt {
    pub node_store: store::DefaultNodeStore,
    pub value_ctxt: ValueCtxt<store::DefaultValueStore, store::CacheSink>,
    pub reg_desc: RegisterDescription,
}

impl GenApiCtxt for NoCacheGenApiCtxt {
    type NS = store::DefaultNodeStore;
    type VS = store::DefaultValueStore;
    type CS = store::CacheSink;

    fn enter<F, R>(&mut self, f: F) -> R
    where
        F: FnOnce(&Self::NS, &mut ValueCtxt<Self::VS, Self::CS>) -> R,
    {
        f(&self.node_store, &mut self.value_ctxt)
    }

    fn node_store(&self) -> &Self::NS {
        &self.node_store
    }
}

impl FromXml for NoCacheGenApiCtxt {
    fn from_xml(xml: &impl AsRef<str>) -> ControlResult<Self>
    where
        Self: Sized + GenApiCtxt,
    {
        let (reg_desc, node_store, value_ctxt) = GenApiBuilder::<DefaultNodeStore>::default()
            .no_cache()
            .build(xml)
            .map_err(|e| ControlError::InvalidData(anyhow::Error::msg(e.to_string())))?;
        Ok(Self {
            node_store,
            value_ctxt,
            reg_desc,
        })
    }
}

impl From<DefaultGenApiCtxt> for NoCacheGenApiCtxt {
    fn from(from: DefaultGenApiCtxt) -> Self {
        let mut value_ctxt = ValueCtxt::new(from.value_ctxt.value_store, store::CacheSink::new());
        value_ctxt.set_register_cache_policy(RegisterCachePolicy::Disable);
        Self {
            node_store: from.node_store,
            value_ctxt,
            reg_desc: from.reg_desc,
        }
    }
}

/// A sharable version of [`NoCacheGenApiCtxt`].
#[derive(Clone, Debug)]
pub struct SharedNoCacheGenApiCtxt {
    pub node_store: Arc<store::DefaultNodeStore>,
    pub value_ctxt: Arc<Mutex<ValueCtxt<store::DefaultValueStore, store::CacheSink>>>,
    pub reg_desc: Arc<RegisterDescription>,
}

impl GenApiCtxt for SharedNoCacheGenApiCtxt {
    type NS = store::DefaultNodeStore;
    type VS = store::DefaultValueStore;
    type CS = store::CacheSink;

    fn enter<F, R>(&mut self, f: F) -> R
    where
        F: FnOnce(&Self::NS, &mut ValueCtxt<Self::VS, Self::CS>) -> R,
    {
        f(&self.node_store, &mut self.value_ctxt.lock().unwrap())
    }

    fn node_store(&self) -> &Self::NS {
        &self.node_store
    }
}

impl FromXml for SharedNoCacheGenApiCtxt {
    fn from_xml(xml: &impl AsRef<str>) -> ControlResult<Self>
    where
        Self: Sized + GenApiCtxt,
    {
        Ok(NoCacheGenApiCtxt::from_xml(xml)?.into())
    }
}

impl From<NoCacheGenApiCtxt> for SharedNoCacheGenApiCtxt {
    fn from(from: NoCacheGenApiCtxt) -> Self {
        Self {
            node_store: Arc::new(from.node_store),
            value_ctxt: Arc::new(Mutex::new(from.value_ctxt)),
            reg_desc: Arc::new(from.reg_desc),
        }
    }
}

impl From<DefaultGenApiCtxt> for SharedNoCacheGenApiCtxt {
    fn from(from: DefaultGenApiCtxt) -> Self {
        let ctxt: NoCacheGenApiCtxt = from.into();
        ctxt.into()
    }
}

/// Adapts a [`DeviceControl`] handle to the engine's port trait.
pub(crate) struct GenApiDevice<'a, T: ?Sized> {
    inner: &'a mut T,
}

impl<'a, T: ?Sized> GenApiDevice<'a, T> {
    pub(crate) fn new(inner: &'a mut T) -> Self {
        Self { inner }
    }
}

impl<'a, T> lucida_genapi::Device for GenApiDevice<'a, T>
where
    T: DeviceControl + ?Sized,
{
    type Error = ControlError;

    fn read_mem(&mut self, address: i64, data: &mut [u8]) -> Result<(), Self::Error> {
        let address: u64 = address.try_into().map_err(|_| {
            ControlError::InvalidData(anyhow::Error::msg("negative register address"))
        })?;
        self.inner.read(address, data)
    }

    fn write_mem(&mut self, address: i64, data: &[u8]) -> Result<(), Self::Error> {
        let address: u64 = address.try_into().map_err(|_| {
            ControlError::InvalidData(anyhow::Error::msg("negative register address"))
        })?;
        self.inner.write(address, data)
    }
}
