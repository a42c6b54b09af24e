/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use std::{collections::HashMap, convert::TryInto};

use tracing::warn;

use super::{
    elem_type::{Endianness, NamedValue, Sign},
    formula::Expr,
    interface::{IBoolean, IInteger},
    ivalue::IValue,
    store::{CacheStore, NodeId, NodeStore, ValueStore},
    Device, GenApiError, GenApiResult, RangeCheckPolicy, ValueCtxt,
};

pub(super) fn bool_from_id<T: ValueStore, U: CacheStore>(
    node_id: NodeId,
    device: &mut impl Device,
    store: &impl NodeStore,
    cx: &mut ValueCtxt<T, U>,
) -> GenApiResult<bool> {
    if let Some(node) = node_id.as_iboolean_kind(store) {
        node.value(device, store, cx)
    } else if let Some(node) = node_id.as_iinteger_kind(store) {
        Ok(node.value(device, store, cx)? == 1)
    } else {
        Err(GenApiError::invalid_p_value(
            "the node implements neither `IInteger` nor `IBoolean`".into(),
        ))
    }
}

pub(super) fn int_from_slice(
    slice: &[u8],
    endianness: Endianness,
    sign: Sign,
) -> GenApiResult<i64> {
    macro_rules! convert_from_slice {
        ($(($len:literal, $signed_ty:ty, $unsigned_ty:ty)),*) => {
            match (slice.len(), endianness, sign) {
                $(
                    ($len, Endianness::LE, Sign::Signed) => Ok(<$signed_ty>::from_le_bytes(slice.try_into().unwrap()) as i64),
                    ($len, Endianness::LE, Sign::Unsigned) => Ok(<$unsigned_ty>::from_le_bytes(slice.try_into().unwrap()) as i64),
                    ($len, Endianness::BE, Sign::Signed) => Ok(<$signed_ty>::from_be_bytes(slice.try_into().unwrap()) as i64),
                    ($len, Endianness::BE, Sign::Unsigned) => Ok(<$unsigned_ty>::from_be_bytes(slice.try_into().unwrap()) as i64),
                )*
                _ => Err(GenApiError::invalid_length("register length must be 1/2/4/8 to convert to an integer".into()))
            }
        }
    }

    convert_from_slice!((8, i64, u64), (4, i32, u32), (2, i16, u16), (1, i8, u8))
}

pub(super) fn bytes_from_int(
    value: i64,
    buf: &mut [u8],
    endianness: Endianness,
    sign: Sign,
) -> GenApiResult<()> {
    macro_rules! convert_to_slice {
        ($(($len:literal, $signed_ty:ty, $unsigned_ty:ty)),*) => {
            match (buf.len(), endianness, sign) {
                $(
                    ($len, Endianness::LE, Sign::Signed) => Ok(buf.copy_from_slice(&(value as $signed_ty).to_le_bytes())),
                    ($len, Endianness::LE, Sign::Unsigned) => Ok(buf.copy_from_slice(&(value as $unsigned_ty).to_le_bytes())),
                    ($len, Endianness::BE, Sign::Signed) => Ok(buf.copy_from_slice(&(value as $signed_ty).to_be_bytes())),
                    ($len, Endianness::BE, Sign::Unsigned) => Ok(buf.copy_from_slice(&(value as $unsigned_ty).to_be_bytes())),
                )*
                _ => Err(GenApiError::invalid_length("register length must be 1/2/4/8 to convert from an integer".into()))
            }
        }
    }

    convert_to_slice!((8, i64, u64), (4, i32, u32), (2, i16, u16), (1, i8, u8))
}

/// Enforces `min <= value <= max` per the context's range-check policy.
pub(super) fn verify_value_in_range<T, V, C>(
    value: T,
    min: T,
    max: T,
    cx: &ValueCtxt<V, C>,
) -> GenApiResult<()>
where
    T: PartialOrd + std::fmt::Display,
{
    match cx.policies().range_check {
        RangeCheckPolicy::Disable => Ok(()),
        policy => {
            if value < min || value > max {
                let msg = format!("value {} is outside [{}, {}]", value, min, max);
                if policy == RangeCheckPolicy::Debug {
                    warn!("range check: {}", msg);
                    Ok(())
                } else {
                    Err(GenApiError::out_of_range(msg.into()))
                }
            } else {
                Ok(())
            }
        }
    }
}

/// Collects the variable environment for formula evaluation: `pVariable`
/// bindings, `Constant`s, sub-`Expression`s and the `FROM`/`TO`
/// specials.
pub(super) struct FormulaEnvCollector<'a> {
    p_variables: &'a [NamedValue<NodeId>],
    constants: &'a [NamedValue<f64>],
    expressions: &'a [NamedValue<Expr>],
    extras: Vec<(String, Expr)>,
}

impl<'a> FormulaEnvCollector<'a> {
    pub(super) fn new(
        p_variables: &'a [NamedValue<NodeId>],
        constants: &'a [NamedValue<f64>],
        expressions: &'a [NamedValue<Expr>],
    ) -> Self {
        Self {
            p_variables,
            constants,
            expressions,
            extras: Vec::new(),
        }
    }

    /// Binds `name` to the current value of the node `nid`.
    pub(super) fn insert<T: ValueStore, U: CacheStore>(
        &mut self,
        name: impl Into<String>,
        nid: NodeId,
        device: &mut impl Device,
        store: &impl NodeStore,
        cx: &mut ValueCtxt<T, U>,
    ) -> GenApiResult<()> {
        let expr = node_expr(nid, device, store, cx)?;
        self.extras.push((name.into(), expr));
        Ok(())
    }

    pub(super) fn insert_imm(&mut self, name: impl Into<String>, value: impl Into<Expr>) {
        self.extras.push((name.into(), value.into()));
    }

    pub(super) fn collect<T: ValueStore, U: CacheStore>(
        &self,
        device: &mut impl Device,
        store: &impl NodeStore,
        cx: &mut ValueCtxt<T, U>,
    ) -> GenApiResult<HashMap<String, Expr>> {
        let mut var_env = HashMap::new();

        for variable in self.p_variables {
            let expr = node_expr(variable.value, device, store, cx)?;
            var_env.insert(variable.name.clone(), expr);
        }
        for constant in self.constants {
            var_env.insert(constant.name.clone(), Expr::from(constant.value));
        }
        for expression in self.expressions {
            var_env.insert(expression.name.clone(), expression.value.clone());
        }
        for (name, expr) in &self.extras {
            var_env.insert(name.clone(), expr.clone());
        }

        Ok(var_env)
    }
}

/// Reads `nid` as an expression operand, preserving integerness.
fn node_expr<T: ValueStore, U: CacheStore>(
    nid: NodeId,
    device: &mut impl Device,
    store: &impl NodeStore,
    cx: &mut ValueCtxt<T, U>,
) -> GenApiResult<Expr> {
    if nid.as_iinteger_kind(store).is_some() || nid.as_ienumeration_kind(store).is_some() {
        let value: i64 = IValue::<i64>::value(&nid, device, store, cx)?;
        Ok(Expr::from(value))
    } else if nid.as_ifloat_kind(store).is_some() {
        let value: f64 = IValue::<f64>::value(&nid, device, store, cx)?;
        Ok(Expr::from(value))
    } else if nid.as_iboolean_kind(store).is_some() {
        let value = bool_from_id(nid, device, store, cx)?;
        Ok(Expr::from(value))
    } else {
        Err(GenApiError::invalid_p_value(
            "a formula variable must refer to an integer, float, boolean or enumeration".into(),
        ))
    }
}
