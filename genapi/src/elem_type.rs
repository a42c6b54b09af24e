/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

#![allow(clippy::upper_case_acronyms)]

//! Element types shared by the node variants: property values that are
//! either immediate or references to other nodes, address composition
//! kinds, and the small enums of the GenApi schema.

use super::store::NodeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameSpace {
    Standard,
    Custom,
}

impl Default for NameSpace {
    fn default() -> Self {
        Self::Custom
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Beginner,
    Expert,
    Guru,
    Invisible,
}

impl Default for Visibility {
    fn default() -> Self {
        Self::Beginner
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergePriority {
    High,
    Mid,
    Low,
}

impl Default for MergePriority {
    fn default() -> Self {
        Self::Mid
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    RO,
    WO,
    RW,
}

/// A property that is either an immediate value or a reference to
/// another node providing it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ImmOrPNode<T: Clone + PartialEq> {
    Imm(T),
    PNode(NodeId),
}

impl<T> ImmOrPNode<T>
where
    T: Clone + PartialEq,
{
    pub fn imm(&self) -> Option<&T> {
        match self {
            Self::Imm(value) => Some(value),
            Self::PNode(_) => None,
        }
    }

    pub fn pnode(&self) -> Option<NodeId> {
        match self {
            Self::PNode(node) => Some(*node),
            Self::Imm(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegerRepresentation {
    Linear,
    Logarithmic,
    Boolean,
    PureNumber,
    HexNumber,
    IpV4Address,
    MacAddress,
}

impl Default for IntegerRepresentation {
    fn default() -> Self {
        Self::PureNumber
    }
}

impl IntegerRepresentation {
    /// Default `Min` when the document doesn't declare one.
    pub(super) fn deduce_min(self) -> i64 {
        match self {
            Self::Linear | Self::Logarithmic | Self::Boolean | Self::PureNumber
            | Self::HexNumber => i64::MIN,
            Self::IpV4Address | Self::MacAddress => 0,
        }
    }

    /// Default `Max` when the document doesn't declare one.
    pub(super) fn deduce_max(self) -> i64 {
        match self {
            Self::Linear | Self::Logarithmic | Self::Boolean | Self::PureNumber
            | Self::HexNumber => i64::MAX,
            Self::IpV4Address => 0xffff_ffff,
            Self::MacAddress => 0xffff_ffff_ffff,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloatRepresentation {
    Linear,
    Logarithmic,
    PureNumber,
}

impl Default for FloatRepresentation {
    fn default() -> Self {
        Self::PureNumber
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slope {
    Increasing,
    Decreasing,
    Varying,
    Automatic,
}

impl Default for Slope {
    fn default() -> Self {
        Self::Automatic
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayNotation {
    Automatic,
    Fixed,
    Scientific,
}

impl Default for DisplayNotation {
    fn default() -> Self {
        Self::Automatic
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StandardNameSpace {
    None,
    IIDC,
    GEV,
    CL,
    USB,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachingMode {
    /// Cache on write and on read.
    WriteThrough,
    /// Cache on read only.
    WriteAround,
    NoCache,
}

impl Default for CachingMode {
    fn default() -> Self {
        Self::WriteThrough
    }
}

/// A `(name, value)` pair used by formula variables and constants.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedValue<T>
where
    T: Clone + PartialEq,
{
    pub(crate) name: String,
    pub(crate) value: T,
}

impl<T> NamedValue<T>
where
    T: Clone + PartialEq,
{
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &T {
        &self.value
    }
}

/// How a value node obtains its value: an immediate, a `pValue`
/// reference, or an index-selected table.
#[derive(Debug, Clone)]
pub enum ValueKind<T>
where
    T: Clone + PartialEq,
{
    Value(T),
    PValue(PValue),
    PIndex(PIndex<T>),
}

impl<T> ValueKind<T>
where
    T: Clone + PartialEq,
{
    pub fn imm(&self) -> Option<&T> {
        match self {
            Self::Value(v) => Some(v),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PValue {
    pub(crate) p_value: NodeId,
    pub(crate) p_value_copies: Vec<NodeId>,
}

impl PValue {
    #[must_use]
    pub fn p_value(&self) -> NodeId {
        self.p_value
    }

    #[must_use]
    pub fn p_value_copies(&self) -> &[NodeId] {
        &self.p_value_copies
    }
}

#[derive(Debug, Clone)]
pub struct PIndex<T>
where
    T: Clone + PartialEq,
{
    pub(crate) p_index: NodeId,
    pub(crate) value_indexed: Vec<ValueIndexed<T>>,
    pub(crate) value_default: ImmOrPNode<T>,
}

impl<T> PIndex<T>
where
    T: Clone + PartialEq,
{
    #[must_use]
    pub fn p_index(&self) -> NodeId {
        self.p_index
    }

    #[must_use]
    pub fn value_indexed(&self) -> &[ValueIndexed<T>] {
        &self.value_indexed
    }

    #[must_use]
    pub fn value_default(&self) -> &ImmOrPNode<T> {
        &self.value_default
    }
}

#[derive(Debug, Clone)]
pub struct ValueIndexed<T>
where
    T: Clone + PartialEq,
{
    pub(crate) index: i64,
    pub(crate) indexed: ImmOrPNode<T>,
}

impl<T> ValueIndexed<T>
where
    T: Clone + PartialEq,
{
    #[must_use]
    pub fn index(&self) -> i64 {
        self.index
    }

    #[must_use]
    pub fn indexed(&self) -> &ImmOrPNode<T> {
        &self.indexed
    }
}

/// One contribution to a register address. Contributions of a node are
/// summed to form the effective address.
#[derive(Debug, Clone)]
pub enum AddressKind {
    Address(ImmOrPNode<i64>),
    IntSwissKnife(NodeId),
    PIndex(RegPIndex),
}

/// `pIndex` address contribution: `offset + index * step` where the step
/// is the register length.
#[derive(Debug, Clone)]
pub struct RegPIndex {
    pub(crate) offset: Option<ImmOrPNode<i64>>,
    pub(crate) p_index: NodeId,
}

impl RegPIndex {
    #[must_use]
    pub fn offset(&self) -> Option<&ImmOrPNode<i64>> {
        self.offset.as_ref()
    }

    #[must_use]
    pub fn p_index(&self) -> NodeId {
        self.p_index
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endianness {
    LE,
    BE,
}

impl Default for Endianness {
    fn default() -> Self {
        Self::LE
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sign {
    Signed,
    Unsigned,
}

impl Default for Sign {
    fn default() -> Self {
        Self::Unsigned
    }
}

/// Bit selection of a `MaskedIntReg`: a single bit or an `[lsb, msb]`
/// range, positions interpreted per the register's endianness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitMask {
    SingleBit(u64),
    Range { lsb: u64, msb: u64 },
}
