/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

#![allow(
    clippy::module_name_repetitions,
    clippy::similar_names,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::option_if_let_else,
    clippy::cast_sign_loss,
    clippy::cast_possible_truncation
)]

//! `lucida-genapi` parses GenApi XML documents into a flat node arena and
//! interprets feature accesses against a device port: symbolic reads and
//! writes become sequences of register I/O, with expression evaluation,
//! indirection, caching and dependency invalidation.

pub mod builder;
pub mod elem_type;
pub mod formula;
pub mod interface;
pub mod parser;
pub mod store;

mod boolean;
mod category;
mod command;
mod converter;
mod enumeration;
mod float;
mod float_reg;
mod int_converter;
mod int_reg;
mod int_swiss_knife;
mod integer;
mod ivalue;
mod masked_int_reg;
mod node;
mod node_base;
mod port;
mod register;
mod register_base;
mod register_description;
mod string;
mod string_reg;
mod swiss_knife;
mod utils;

pub use boolean::BooleanNode;
pub use category::CategoryNode;
pub use command::CommandNode;
pub use converter::ConverterNode;
pub use enumeration::{EnumEntryNode, EnumerationNode};
pub use float::FloatNode;
pub use float_reg::FloatRegNode;
pub use int_converter::IntConverterNode;
pub use int_reg::IntRegNode;
pub use int_swiss_knife::IntSwissKnifeNode;
pub use integer::IntegerNode;
pub use masked_int_reg::MaskedIntRegNode;
pub use node::Node;
pub use node_base::NodeBase;
pub use port::PortNode;
pub use register::RegisterNode;
pub use register_base::RegisterBase;
pub use register_description::RegisterDescription;
pub use store::{CacheStore, NodeId, NodeStore, ValueStore};
pub use string::StringNode;
pub use string_reg::StringRegNode;
pub use swiss_knife::SwissKnifeNode;

use std::{borrow::Cow, collections::HashMap};

use auto_impl::auto_impl;
use tracing::error;

pub mod prelude {
    pub use super::interface::{
        IBoolean, ICategory, ICommand, IEnumeration, IFloat, IInteger, INode, IPort, IRegister,
        ISelector, IString,
    };
}

/// Byte-addressable backing of register nodes. The engine never knows
/// which transport implements it.
#[auto_impl(&mut, Box)]
pub trait Device {
    type Error: std::error::Error + 'static;

    fn read_mem(&mut self, address: i64, buf: &mut [u8]) -> Result<(), Self::Error>;

    fn write_mem(&mut self, address: i64, data: &[u8]) -> Result<(), Self::Error>;
}

#[derive(Debug, thiserror::Error)]
pub enum GenApiError {
    /// The underlying port failed; the transport cause is chained.
    #[error("device I/O error: {0}")]
    Device(Box<dyn std::error::Error>),

    /// Write attempted on an effectively read-only feature.
    #[error("feature is read only: {0}")]
    ReadOnly(Cow<'static, str>),

    /// Read attempted on an effectively write-only feature.
    #[error("feature is write only: {0}")]
    WriteOnly(Cow<'static, str>),

    /// Value rejected by the feature's declared bounds.
    #[error("value out of range: {0}")]
    OutOfRange(Cow<'static, str>),

    /// A required property element is missing from the node.
    #[error("property not defined: {0}")]
    PropertyNotDefined(Cow<'static, str>),

    /// A `pValue`-style reference names a node that cannot serve it, or
    /// the indirection chain exceeded the evaluation depth limit.
    #[error("invalid pValue: {0}")]
    InvalidPValue(Cow<'static, str>),

    /// Name lookup failed.
    #[error("node not found: {0}")]
    NodeNotFound(Cow<'static, str>),

    #[error("enum entry not found: {0}")]
    EnumEntryNotFound(Cow<'static, str>),

    #[error("enumeration has no entry: {0}")]
    EmptyEnumeration(Cow<'static, str>),

    /// Buffer length doesn't match the register length.
    #[error("invalid length: {0}")]
    InvalidLength(Cow<'static, str>),

    #[error("invalid bit range: {0}")]
    InvalidBitRange(Cow<'static, str>),

    /// Malformed formula text.
    #[error("invalid syntax: {0}")]
    InvalidSyntax(Cow<'static, str>),

    /// The node exists but doesn't implement the requested interface.
    #[error("invalid node: {0}")]
    InvalidNode(Cow<'static, str>),

    /// Operation requires chunk data that the current buffer lacks.
    #[error("chunk data missing")]
    ChunkDataMissing,
}

macro_rules! error_ctor {
    ($f:ident, $variant:ident) => {
        pub(crate) fn $f(inner: Cow<'static, str>) -> Self {
            let err = GenApiError::$variant(inner);
            error!("{}", err);
            err
        }
    };
}

impl GenApiError {
    pub(crate) fn device(inner: Box<dyn std::error::Error>) -> Self {
        let err = GenApiError::Device(inner);
        error!("{}", err);
        err
    }

    error_ctor!(read_only, ReadOnly);
    error_ctor!(write_only, WriteOnly);
    error_ctor!(out_of_range, OutOfRange);
    error_ctor!(invalid_p_value, InvalidPValue);
    error_ctor!(enum_entry_not_found, EnumEntryNotFound);
    error_ctor!(empty_enumeration, EmptyEnumeration);
    error_ctor!(invalid_length, InvalidLength);
    error_ctor!(invalid_syntax, InvalidSyntax);
    error_ctor!(invalid_node, InvalidNode);
}

pub type GenApiResult<T> = std::result::Result<T, GenApiError>;

/// Register value cache behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterCachePolicy {
    /// Always hit the device.
    Disable,
    /// Serve cacheable registers from the cache.
    Enable,
    /// Serve from the device but compare against the cache and warn on
    /// mismatch.
    Debug,
}

/// Bounds enforcement on integer/float writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeCheckPolicy {
    Disable,
    Enable,
    /// Log violations without failing the write.
    Debug,
}

/// Effective-access-mode enforcement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessCheckPolicy {
    /// Let the device answer denied accesses.
    Disable,
    Enable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Policies {
    pub register_cache: RegisterCachePolicy,
    pub range_check: RangeCheckPolicy,
    pub access_check: AccessCheckPolicy,
}

impl Default for Policies {
    fn default() -> Self {
        Self {
            register_cache: RegisterCachePolicy::Enable,
            range_check: RangeCheckPolicy::Enable,
            access_check: AccessCheckPolicy::Enable,
        }
    }
}

/// Evaluation state shared by all feature operations: immediate values,
/// the register cache, the policies, per-node change counters and the
/// recursion guard that terminates pathological `pValue` chains.
#[derive(Clone, Debug)]
pub struct ValueCtxt<T, U> {
    pub value_store: T,
    pub cache_store: U,
    policies: Policies,
    change_counts: HashMap<store::NodeId, u64>,
    eval_depth: u32,
}

impl<T, U> ValueCtxt<T, U> {
    /// `pValue` chains deeper than this fail with `InvalidPValue`.
    pub const MAX_EVAL_DEPTH: u32 = 64;

    pub fn new(value_store: T, cache_store: U) -> Self {
        Self {
            value_store,
            cache_store,
            policies: Policies::default(),
            change_counts: HashMap::new(),
            eval_depth: 0,
        }
    }

    pub fn value_store(&self) -> &T {
        &self.value_store
    }

    pub fn value_store_mut(&mut self) -> &mut T {
        &mut self.value_store
    }

    pub fn cache_store_mut(&mut self) -> &mut U {
        &mut self.cache_store
    }

    #[must_use]
    pub fn policies(&self) -> Policies {
        self.policies
    }

    pub fn set_register_cache_policy(&mut self, policy: RegisterCachePolicy) {
        self.policies.register_cache = policy;
    }

    pub fn set_range_check_policy(&mut self, policy: RangeCheckPolicy) {
        self.policies.range_check = policy;
    }

    pub fn set_access_check_policy(&mut self, policy: AccessCheckPolicy) {
        self.policies.access_check = policy;
    }

    /// Monotonic per-node counter, bumped on every mutation of the node.
    #[must_use]
    pub fn change_count(&self, nid: store::NodeId) -> u64 {
        self.change_counts.get(&nid).copied().unwrap_or(0)
    }

    pub fn cache_data(&mut self, nid: store::NodeId, address: i64, length: i64, value: &[u8])
    where
        U: store::CacheStore,
    {
        if self.policies.register_cache != RegisterCachePolicy::Disable {
            self.cache_store.cache(nid, address, length, value);
        }
    }

    pub fn get_cache(&self, nid: store::NodeId, address: i64, length: i64) -> Option<&[u8]>
    where
        U: store::CacheStore,
    {
        if self.policies.register_cache == RegisterCachePolicy::Disable {
            None
        } else {
            self.cache_store.get_cache(nid, address, length)
        }
    }

    /// Invalidates every cache entry depending on `nid` and records the
    /// mutation in the node's change counter.
    pub fn invalidate_cache_by(&mut self, nid: store::NodeId)
    where
        U: store::CacheStore,
    {
        *self.change_counts.entry(nid).or_insert(0) += 1;
        self.cache_store.invalidate_by(nid);
    }

    pub fn invalidate_cache_of(&mut self, nid: store::NodeId)
    where
        U: store::CacheStore,
    {
        self.cache_store.invalidate_of(nid);
    }

    pub fn clear_cache(&mut self)
    where
        U: store::CacheStore,
    {
        self.cache_store.clear();
    }

    pub(crate) fn enter_eval(&mut self) -> GenApiResult<()> {
        if self.eval_depth >= Self::MAX_EVAL_DEPTH {
            self.eval_depth = 0;
            return Err(GenApiError::invalid_p_value(
                "pValue chain exceeds the maximum evaluation depth".into(),
            ));
        }
        self.eval_depth += 1;
        Ok(())
    }

    pub(crate) fn leave_eval(&mut self) {
        self.eval_depth = self.eval_depth.saturating_sub(1);
    }
}
