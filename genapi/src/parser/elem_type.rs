/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! `Parse` implementations for scalar values and the property element
//! types. Property tags opening with `p` hold a node name; everything
//! else is an immediate.

use crate::{
    builder::{CacheStoreBuilder, NodeStoreBuilder, ValueStoreBuilder},
    elem_type::{
        AccessMode, AddressKind, CachingMode, DisplayNotation, Endianness, FloatRepresentation,
        ImmOrPNode, IntegerRepresentation, MergePriority, NameSpace, NamedValue, PIndex, PValue,
        RegPIndex, Sign, Slope, StandardNameSpace, ValueIndexed, ValueKind, Visibility,
    },
    formula::Expr,
    store::{FloatId, IntegerId, NodeId, StringId},
};

use super::{
    elem_name::{
        ADDRESS, INDEX, INT_SWISS_KNIFE, NAME, OFFSET, P_ADDRESS, P_OFFSET, P_VALUE, P_VALUE_COPY,
        P_VALUE_DEFAULT, P_VALUE_INDEXED, VALUE, VALUE_DEFAULT, VALUE_INDEXED,
    },
    xml, Parse,
};

pub(super) fn convert_to_bool(value: &str) -> bool {
    matches!(value, "Yes" | "True" | "true" | "1")
}

pub(super) fn convert_to_int(value: &str) -> i64 {
    let value = value.trim();
    if let Some(hex) = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
    {
        i64::from_str_radix(hex, 16).unwrap()
    } else if let Some(hex) = value
        .strip_prefix("-0x")
        .or_else(|| value.strip_prefix("-0X"))
    {
        -i64::from_str_radix(hex, 16).unwrap()
    } else {
        value.parse().unwrap()
    }
}

pub(super) fn convert_to_uint(value: &str) -> u64 {
    let value = value.trim();
    if let Some(hex) = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
    {
        u64::from_str_radix(hex, 16).unwrap()
    } else {
        value.parse().unwrap()
    }
}

impl Parse for String {
    fn parse(
        node: &mut xml::Node,
        _: &mut impl NodeStoreBuilder,
        _: &mut impl ValueStoreBuilder,
        _: &mut impl CacheStoreBuilder,
    ) -> Self {
        node.next_text().unwrap()
    }
}

impl Parse for bool {
    fn parse(
        node: &mut xml::Node,
        _: &mut impl NodeStoreBuilder,
        _: &mut impl ValueStoreBuilder,
        _: &mut impl CacheStoreBuilder,
    ) -> Self {
        convert_to_bool(&node.next_text().unwrap())
    }
}

impl Parse for i64 {
    fn parse(
        node: &mut xml::Node,
        _: &mut impl NodeStoreBuilder,
        _: &mut impl ValueStoreBuilder,
        _: &mut impl CacheStoreBuilder,
    ) -> Self {
        convert_to_int(&node.next_text().unwrap())
    }
}

impl Parse for u64 {
    fn parse(
        node: &mut xml::Node,
        _: &mut impl NodeStoreBuilder,
        _: &mut impl ValueStoreBuilder,
        _: &mut impl CacheStoreBuilder,
    ) -> Self {
        convert_to_uint(&node.next_text().unwrap())
    }
}

impl Parse for f64 {
    fn parse(
        node: &mut xml::Node,
        _: &mut impl NodeStoreBuilder,
        _: &mut impl ValueStoreBuilder,
        _: &mut impl CacheStoreBuilder,
    ) -> Self {
        node.next_text().unwrap().trim().parse().unwrap()
    }
}

impl Parse for NodeId {
    fn parse(
        node: &mut xml::Node,
        node_builder: &mut impl NodeStoreBuilder,
        _: &mut impl ValueStoreBuilder,
        _: &mut impl CacheStoreBuilder,
    ) -> Self {
        node_builder.get_or_intern(node.next_text().unwrap().trim())
    }
}

fn is_p_tag(tag_name: &str) -> bool {
    tag_name.starts_with('p')
        && tag_name
            .chars()
            .nth(1)
            .map_or(false, char::is_uppercase)
}

macro_rules! impl_parse_imm_or_pnode_via_store {
    ($vid:ty, $convert:expr) => {
        impl Parse for ImmOrPNode<$vid> {
            fn parse(
                node: &mut xml::Node,
                node_builder: &mut impl NodeStoreBuilder,
                value_builder: &mut impl ValueStoreBuilder,
                _: &mut impl CacheStoreBuilder,
            ) -> Self {
                let is_p = is_p_tag(&node.peek().unwrap().tag_name().to_string());
                let text = node.next_text().unwrap();
                if is_p {
                    ImmOrPNode::PNode(node_builder.get_or_intern(text.trim()))
                } else {
                    let vid: $vid = value_builder.store($convert(&text));
                    ImmOrPNode::Imm(vid)
                }
            }
        }
    };
}

impl_parse_imm_or_pnode_via_store!(IntegerId, convert_to_int);
impl_parse_imm_or_pnode_via_store!(FloatId, |text: &str| text
    .trim()
    .parse::<f64>()
    .unwrap());
impl_parse_imm_or_pnode_via_store!(StringId, |text: &str| text.to_string());

macro_rules! impl_parse_imm_or_pnode_inline {
    ($ty:ty, $convert:expr) => {
        impl Parse for ImmOrPNode<$ty> {
            fn parse(
                node: &mut xml::Node,
                node_builder: &mut impl NodeStoreBuilder,
                _: &mut impl ValueStoreBuilder,
                _: &mut impl CacheStoreBuilder,
            ) -> Self {
                let is_p = is_p_tag(&node.peek().unwrap().tag_name().to_string());
                let text = node.next_text().unwrap();
                if is_p {
                    ImmOrPNode::PNode(node_builder.get_or_intern(text.trim()))
                } else {
                    ImmOrPNode::Imm($convert(&text))
                }
            }
        }
    };
}

impl_parse_imm_or_pnode_inline!(i64, |text: &str| convert_to_int(text));
impl_parse_imm_or_pnode_inline!(u64, |text: &str| u64::from_str_radix(
    text.trim().trim_start_matches("0x").trim_start_matches("0X"),
    16
)
.unwrap());
impl_parse_imm_or_pnode_inline!(f64, |text: &str| text.trim().parse::<f64>().unwrap());

macro_rules! impl_parse_value_kind {
    ($vid:ty) => {
        impl Parse for ValueKind<$vid> {
            fn parse(
                node: &mut xml::Node,
                node_builder: &mut impl NodeStoreBuilder,
                value_builder: &mut impl ValueStoreBuilder,
                cache_builder: &mut impl CacheStoreBuilder,
            ) -> Self {
                let peeked_tag = node.peek().unwrap().tag_name().to_string();
                match peeked_tag.as_str() {
                    VALUE => {
                        let imm: ImmOrPNode<$vid> =
                            node.parse(node_builder, value_builder, cache_builder);
                        ValueKind::Value(*imm.imm().unwrap())
                    }
                    P_VALUE | P_VALUE_COPY => {
                        ValueKind::PValue(node.parse(node_builder, value_builder, cache_builder))
                    }
                    _ => ValueKind::PIndex(node.parse(node_builder, value_builder, cache_builder)),
                }
            }
        }

        impl Parse for PIndex<$vid> {
            fn parse(
                node: &mut xml::Node,
                node_builder: &mut impl NodeStoreBuilder,
                value_builder: &mut impl ValueStoreBuilder,
                cache_builder: &mut impl CacheStoreBuilder,
            ) -> Self {
                let p_index = node.parse(node_builder, value_builder, cache_builder);

                let mut value_indexed = Vec::new();
                loop {
                    let peeked_tag = match node.peek() {
                        Some(peeked) => peeked.tag_name().to_string(),
                        None => break,
                    };
                    if peeked_tag != VALUE_INDEXED && peeked_tag != P_VALUE_INDEXED {
                        break;
                    }
                    let index =
                        convert_to_int(node.peek().unwrap().attribute_of(INDEX).unwrap());
                    let indexed: ImmOrPNode<$vid> =
                        node.parse(node_builder, value_builder, cache_builder);
                    value_indexed.push(ValueIndexed { index, indexed });
                }

                let value_default = node
                    .parse_if(VALUE_DEFAULT, node_builder, value_builder, cache_builder)
                    .or_else(|| {
                        node.parse_if(P_VALUE_DEFAULT, node_builder, value_builder, cache_builder)
                    })
                    .unwrap();

                Self {
                    p_index,
                    value_indexed,
                    value_default,
                }
            }
        }
    };
}

impl_parse_value_kind!(IntegerId);
impl_parse_value_kind!(FloatId);

impl Parse for PValue {
    fn parse(
        node: &mut xml::Node,
        node_builder: &mut impl NodeStoreBuilder,
        value_builder: &mut impl ValueStoreBuilder,
        cache_builder: &mut impl CacheStoreBuilder,
    ) -> Self {
        // `pValueCopy` elements may surround the single `pValue`.
        let mut p_value_copies: Vec<NodeId> =
            node.parse_while(P_VALUE_COPY, node_builder, value_builder, cache_builder);
        let p_value = node.parse(node_builder, value_builder, cache_builder);
        p_value_copies.extend(node.parse_while::<NodeId>(
            P_VALUE_COPY,
            node_builder,
            value_builder,
            cache_builder,
        ));

        Self {
            p_value,
            p_value_copies,
        }
    }
}

impl Parse for AddressKind {
    fn parse(
        node: &mut xml::Node,
        node_builder: &mut impl NodeStoreBuilder,
        value_builder: &mut impl ValueStoreBuilder,
        cache_builder: &mut impl CacheStoreBuilder,
    ) -> Self {
        let peeked = node.peek().unwrap();
        match peeked.tag_name() {
            ADDRESS | P_ADDRESS => {
                Self::Address(node.parse(node_builder, value_builder, cache_builder))
            }
            INT_SWISS_KNIFE => {
                // An inline IntSwissKnife contributing to the address; it
                // is stored as an anonymous node.
                let swiss_knife: crate::IntSwissKnifeNode =
                    node.parse(node_builder, value_builder, cache_builder);
                let id = crate::interface::INode::node_base(&swiss_knife).id();
                node_builder.store_node(
                    id,
                    crate::store::NodeData::IntSwissKnife(Box::new(swiss_knife)),
                );
                Self::IntSwissKnife(id)
            }
            _ => {
                let offset = peeked
                    .attribute_of(OFFSET)
                    .map(|text| ImmOrPNode::Imm(convert_to_int(text)))
                    .or_else(|| {
                        peeked
                            .attribute_of(P_OFFSET)
                            .map(|text| ImmOrPNode::PNode(node_builder.get_or_intern(text)))
                    });
                let p_index = node.parse(node_builder, value_builder, cache_builder);
                Self::PIndex(RegPIndex { offset, p_index })
            }
        }
    }
}

impl<T> Parse for NamedValue<T>
where
    T: Clone + PartialEq + ParseNamedText,
{
    fn parse(
        node: &mut xml::Node,
        _: &mut impl NodeStoreBuilder,
        _: &mut impl ValueStoreBuilder,
        _: &mut impl CacheStoreBuilder,
    ) -> Self {
        let peeked = node.peek().unwrap();
        let name = peeked.attribute_of(NAME).unwrap().to_string();
        let value = T::parse_named_text(&node.next_text().unwrap());
        Self { name, value }
    }
}

impl Parse for NamedValue<NodeId> {
    fn parse(
        node: &mut xml::Node,
        node_builder: &mut impl NodeStoreBuilder,
        _: &mut impl ValueStoreBuilder,
        _: &mut impl CacheStoreBuilder,
    ) -> Self {
        let peeked = node.peek().unwrap();
        let name = peeked.attribute_of(NAME).unwrap().to_string();
        let value = node_builder.get_or_intern(node.next_text().unwrap().trim());
        Self { name, value }
    }
}

/// Conversion from element text, used by `NamedValue` parsing.
pub(super) trait ParseNamedText {
    fn parse_named_text(text: &str) -> Self;
}

impl ParseNamedText for f64 {
    fn parse_named_text(text: &str) -> Self {
        text.trim().parse().unwrap()
    }
}

impl ParseNamedText for i64 {
    fn parse_named_text(text: &str) -> Self {
        convert_to_int(text)
    }
}

impl ParseNamedText for Expr {
    fn parse_named_text(text: &str) -> Self {
        crate::formula::parse(text).expect("malformed expression in GenApi XML")
    }
}

macro_rules! impl_parse_simple_enum {
    ($ty:ty { $($text:literal => $variant:expr,)* }) => {
        impl Parse for $ty {
            fn parse(
                node: &mut xml::Node,
                _: &mut impl NodeStoreBuilder,
                _: &mut impl ValueStoreBuilder,
                _: &mut impl CacheStoreBuilder,
            ) -> Self {
                match node.next_text().unwrap().trim() {
                    $($text => $variant,)*
                    other => panic!("unexpected element text `{}`", other),
                }
            }
        }
    };
}

impl_parse_simple_enum!(AccessMode {
    "RO" => Self::RO,
    "WO" => Self::WO,
    "RW" => Self::RW,
});

impl_parse_simple_enum!(Visibility {
    "Beginner" => Self::Beginner,
    "Expert" => Self::Expert,
    "Guru" => Self::Guru,
    "Invisible" => Self::Invisible,
});

impl_parse_simple_enum!(CachingMode {
    "WriteThrough" => Self::WriteThrough,
    "WriteAround" => Self::WriteAround,
    "NoCache" => Self::NoCache,
});

impl_parse_simple_enum!(IntegerRepresentation {
    "Linear" => Self::Linear,
    "Logarithmic" => Self::Logarithmic,
    "Boolean" => Self::Boolean,
    "PureNumber" => Self::PureNumber,
    "HexNumber" => Self::HexNumber,
    "IPV4Address" => Self::IpV4Address,
    "MACAddress" => Self::MacAddress,
});

impl_parse_simple_enum!(FloatRepresentation {
    "Linear" => Self::Linear,
    "Logarithmic" => Self::Logarithmic,
    "PureNumber" => Self::PureNumber,
});

impl_parse_simple_enum!(DisplayNotation {
    "Automatic" => Self::Automatic,
    "Fixed" => Self::Fixed,
    "Scientific" => Self::Scientific,
});

impl_parse_simple_enum!(Endianness {
    "LittleEndian" => Self::LE,
    "BigEndian" => Self::BE,
});

impl_parse_simple_enum!(Sign {
    "Signed" => Self::Signed,
    "Unsigned" => Self::Unsigned,
});

impl_parse_simple_enum!(Slope {
    "Increasing" => Self::Increasing,
    "Decreasing" => Self::Decreasing,
    "Varying" => Self::Varying,
    "Automatic" => Self::Automatic,
});

impl Parse for Expr {
    fn parse(
        node: &mut xml::Node,
        _: &mut impl NodeStoreBuilder,
        _: &mut impl ValueStoreBuilder,
        _: &mut impl CacheStoreBuilder,
    ) -> Self {
        crate::formula::parse(&node.next_text().unwrap()).expect("malformed formula in GenApi XML")
    }
}

pub(super) fn convert_to_name_space(text: &str) -> NameSpace {
    match text {
        "Standard" => NameSpace::Standard,
        _ => NameSpace::Custom,
    }
}

pub(super) fn convert_to_merge_priority(text: &str) -> MergePriority {
    match text {
        "1" => MergePriority::High,
        "-1" => MergePriority::Low,
        _ => MergePriority::Mid,
    }
}

pub(super) fn convert_to_standard_name_space(text: &str) -> StandardNameSpace {
    match text {
        "IIDC" => StandardNameSpace::IIDC,
        "GEV" => StandardNameSpace::GEV,
        "CL" => StandardNameSpace::CL,
        "USB" => StandardNameSpace::USB,
        _ => StandardNameSpace::None,
    }
}
