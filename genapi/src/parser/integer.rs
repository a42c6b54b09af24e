/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use tracing::debug;

use crate::{
    builder::{CacheStoreBuilder, NodeStoreBuilder, ValueStoreBuilder},
    elem_type::{BitMask, ImmOrPNode, IntegerRepresentation},
    store::NodeId,
    IntRegNode, IntegerNode, MaskedIntRegNode,
};

use super::{
    elem_name::{
        BIT, ENDIANNESS, INC, INTEGER, INT_REG, LSB, MASKED_INT_REG, MAX, MIN, MSB, P_INC, P_MAX,
        P_MIN, P_SELECTED, REPRESENTATION, SIGN, STREAMABLE, UNIT,
    },
    xml, Parse,
};

impl Parse for IntegerNode {
    #[tracing::instrument(level = "trace", skip_all)]
    fn parse(
        node: &mut xml::Node,
        node_builder: &mut impl NodeStoreBuilder,
        value_builder: &mut impl ValueStoreBuilder,
        cache_builder: &mut impl CacheStoreBuilder,
    ) -> Self {
        debug!("start parsing `Integer`");
        debug_assert_eq!(node.tag_name(), INTEGER);

        let attr_base = node.parse(node_builder, value_builder, cache_builder);
        let elem_base = node.parse(node_builder, value_builder, cache_builder);

        let streamable = node
            .parse_if(STREAMABLE, node_builder, value_builder, cache_builder)
            .unwrap_or_default();
        let value_kind = node.parse(node_builder, value_builder, cache_builder);
        let min = node
            .parse_if(MIN, node_builder, value_builder, cache_builder)
            .or_else(|| node.parse_if(P_MIN, node_builder, value_builder, cache_builder));
        let max = node
            .parse_if(MAX, node_builder, value_builder, cache_builder)
            .or_else(|| node.parse_if(P_MAX, node_builder, value_builder, cache_builder));
        let inc = node
            .parse_if(INC, node_builder, value_builder, cache_builder)
            .or_else(|| node.parse_if(P_INC, node_builder, value_builder, cache_builder))
            .unwrap_or(ImmOrPNode::Imm(1));
        let unit = node.parse_if(UNIT, node_builder, value_builder, cache_builder);
        let representation: IntegerRepresentation = node
            .parse_if(REPRESENTATION, node_builder, value_builder, cache_builder)
            .unwrap_or_default();
        let p_selected: Vec<NodeId> =
            node.parse_while(P_SELECTED, node_builder, value_builder, cache_builder);

        // Deduce min and max from the representation when not declared.
        let min = min.unwrap_or_else(|| {
            let id = value_builder.store(representation.deduce_min());
            ImmOrPNode::Imm(id)
        });
        let max = max.unwrap_or_else(|| {
            let id = value_builder.store(representation.deduce_max());
            ImmOrPNode::Imm(id)
        });

        Self {
            attr_base,
            elem_base,
            streamable,
            value_kind,
            min,
            max,
            inc,
            unit,
            representation,
            p_selected,
        }
    }
}

impl Parse for IntRegNode {
    #[tracing::instrument(level = "trace", skip_all)]
    fn parse(
        node: &mut xml::Node,
        node_builder: &mut impl NodeStoreBuilder,
        value_builder: &mut impl ValueStoreBuilder,
        cache_builder: &mut impl CacheStoreBuilder,
    ) -> Self {
        debug!("start parsing `IntReg`");
        debug_assert_eq!(node.tag_name(), INT_REG);

        let attr_base: crate::node_base::NodeAttributeBase =
            node.parse(node_builder, value_builder, cache_builder);
        let register_base: crate::RegisterBase =
            node.parse(node_builder, value_builder, cache_builder);

        let sign = node
            .parse_if(SIGN, node_builder, value_builder, cache_builder)
            .unwrap_or_default();
        let endianness = node
            .parse_if(ENDIANNESS, node_builder, value_builder, cache_builder)
            .unwrap_or_default();
        let unit = node.parse_if(UNIT, node_builder, value_builder, cache_builder);
        let representation = node
            .parse_if(REPRESENTATION, node_builder, value_builder, cache_builder)
            .unwrap_or_default();
        let p_selected = node.parse_while(P_SELECTED, node_builder, value_builder, cache_builder);

        register_base.store_invalidators(attr_base.id, cache_builder);

        Self {
            attr_base,
            register_base,
            sign,
            endianness,
            unit,
            representation,
            p_selected,
        }
    }
}

/// Parses either a `Bit` element or an `LSB`/`MSB` pair, in any order.
pub(super) fn parse_bit_mask(
    node: &mut xml::Node,
    node_builder: &mut impl NodeStoreBuilder,
    value_builder: &mut impl ValueStoreBuilder,
    cache_builder: &mut impl CacheStoreBuilder,
) -> BitMask {
    if let Some(bit) = node.parse_if::<i64>(BIT, node_builder, value_builder, cache_builder) {
        return BitMask::SingleBit(bit as u64);
    }

    let mut lsb: Option<i64> = None;
    let mut msb: Option<i64> = None;
    loop {
        if let Some(parsed) = node.parse_if(LSB, node_builder, value_builder, cache_builder) {
            lsb = Some(parsed);
        } else if let Some(parsed) = node.parse_if(MSB, node_builder, value_builder, cache_builder)
        {
            msb = Some(parsed);
        } else {
            break;
        }
    }

    BitMask::Range {
        lsb: lsb.expect("`MaskedIntReg` requires `Bit` or `LSB`") as u64,
        msb: msb.expect("`MaskedIntReg` requires `Bit` or `MSB`") as u64,
    }
}

impl Parse for MaskedIntRegNode {
    #[tracing::instrument(level = "trace", skip_all)]
    fn parse(
        node: &mut xml::Node,
        node_builder: &mut impl NodeStoreBuilder,
        value_builder: &mut impl ValueStoreBuilder,
        cache_builder: &mut impl CacheStoreBuilder,
    ) -> Self {
        debug!("start parsing `MaskedIntReg`");
        debug_assert_eq!(node.tag_name(), MASKED_INT_REG);

        let attr_base: crate::node_base::NodeAttributeBase =
            node.parse(node_builder, value_builder, cache_builder);
        let register_base: crate::RegisterBase =
            node.parse(node_builder, value_builder, cache_builder);

        let bit_mask = parse_bit_mask(node, node_builder, value_builder, cache_builder);
        let sign = node
            .parse_if(SIGN, node_builder, value_builder, cache_builder)
            .unwrap_or_default();
        let endianness = node
            .parse_if(ENDIANNESS, node_builder, value_builder, cache_builder)
            .unwrap_or_default();
        let unit = node.parse_if(UNIT, node_builder, value_builder, cache_builder);
        let representation = node
            .parse_if(REPRESENTATION, node_builder, value_builder, cache_builder)
            .unwrap_or_default();
        let p_selected = node.parse_while(P_SELECTED, node_builder, value_builder, cache_builder);

        register_base.store_invalidators(attr_base.id, cache_builder);

        Self {
            attr_base,
            register_base,
            bit_mask,
            sign,
            endianness,
            unit,
            representation,
            p_selected,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        elem_type::ValueKind,
        store::{DefaultCacheStore, DefaultNodeStore, DefaultValueStore, ValueStore},
    };

    use super::{super::utils::tests::parse_default, *};

    #[test]
    fn integer_with_immediates() {
        let xml = r#"
            <Integer Name="TestNode">
                <Streamable>Yes</Streamable>
                <Value>0x100</Value>
                <Min>0x10</Min>
                <Max>100</Max>
                <Inc>0x5</Inc>
                <Unit>dB</Unit>
                <Representation>Logarithmic</Representation>
                <pSelected>Selected0</pSelected>
                <pSelected>Selected1</pSelected>
            </Integer>
            "#;

        let (node, mut node_builder, value_builder, _): (
            IntegerNode,
            DefaultNodeStore,
            DefaultValueStore,
            DefaultCacheStore,
        ) = parse_default(xml);

        assert!(node.streamable);
        let value = value_builder
            .integer_value(*node.value_kind().imm().unwrap())
            .unwrap();
        assert_eq!(value, 0x100);
        let min = value_builder
            .integer_value(*node.min_elem().imm().unwrap())
            .unwrap();
        assert_eq!(min, 0x10);
        let max = value_builder
            .integer_value(*node.max_elem().imm().unwrap())
            .unwrap();
        assert_eq!(max, 100);
        assert_eq!(node.inc_elem(), ImmOrPNode::Imm(0x5));
        assert_eq!(node.unit_elem(), Some("dB"));
        assert_eq!(
            node.representation_elem(),
            IntegerRepresentation::Logarithmic
        );

        use crate::builder::NodeStoreBuilder;
        let p_selected = node.p_selected();
        assert_eq!(p_selected.len(), 2);
        assert_eq!(p_selected[0], node_builder.get_or_intern("Selected0"));
        assert_eq!(p_selected[1], node_builder.get_or_intern("Selected1"));
    }

    #[test]
    fn integer_with_p_value() {
        let xml = r#"
            <Integer Name="TestNode">
                <pValueCopy>Copy1</pValueCopy>
                <pValue>pValueNode</pValue>
                <pValueCopy>Copy2</pValueCopy>
                <pMin>pMinNode</pMin>
                <pMax>pMaxNode</pMax>
            </Integer>
            "#;

        let (node, mut node_builder, _, _): (
            IntegerNode,
            DefaultNodeStore,
            DefaultValueStore,
            DefaultCacheStore,
        ) = parse_default(xml);

        use crate::builder::NodeStoreBuilder;
        let p_value = match node.value_kind() {
            ValueKind::PValue(p_value) => p_value,
            other => panic!("expected PValue, got {:?}", other),
        };
        assert_eq!(p_value.p_value, node_builder.get_or_intern("pValueNode"));
        assert_eq!(p_value.p_value_copies.len(), 2);

        assert_eq!(
            node.min_elem().pnode().unwrap(),
            node_builder.get_or_intern("pMinNode")
        );
        assert_eq!(
            node.max_elem().pnode().unwrap(),
            node_builder.get_or_intern("pMaxNode")
        );
    }

    #[test]
    fn integer_with_p_index() {
        let xml = r#"
            <Integer Name="TestNode">
                <pIndex>pIndexNode</pIndex>
                <ValueIndexed Index="10">100</ValueIndexed>
                <pValueIndexed Index="20">pValueIndexNode</pValueIndexed>
                <pValueDefault>pValueDefaultNode</pValueDefault>
            </Integer>
            "#;

        let (node, mut node_builder, value_builder, _): (
            IntegerNode,
            DefaultNodeStore,
            DefaultValueStore,
            DefaultCacheStore,
        ) = parse_default(xml);

        use crate::builder::NodeStoreBuilder;
        let p_index = match node.value_kind() {
            ValueKind::PIndex(p_index) => p_index,
            other => panic!("expected PIndex, got {:?}", other),
        };
        assert_eq!(p_index.p_index, node_builder.get_or_intern("pIndexNode"));
        assert_eq!(p_index.value_indexed.len(), 2);
        assert_eq!(p_index.value_indexed[0].index, 10);
        let value0 = value_builder
            .integer_value(*p_index.value_indexed[0].indexed.imm().unwrap())
            .unwrap();
        assert_eq!(value0, 100);
        assert_eq!(p_index.value_indexed[1].index, 20);
        assert_eq!(
            p_index.value_default.pnode().unwrap(),
            node_builder.get_or_intern("pValueDefaultNode")
        );
    }

    #[test]
    fn masked_int_reg_with_bit_range() {
        let xml = r#"
            <MaskedIntReg Name="TestNode">
                <Address>0x20000</Address>
                <Length>4</Length>
                <AccessMode>RW</AccessMode>
                <pPort>Device</pPort>
                <LSB>3</LSB>
                <MSB>7</MSB>
                <Sign>Signed</Sign>
                <Endianess>BigEndian</Endianess>
            </MaskedIntReg>
            "#;

        let (node, ..): (
            MaskedIntRegNode,
            DefaultNodeStore,
            DefaultValueStore,
            DefaultCacheStore,
        ) = parse_default(xml);

        assert_eq!(node.bit_mask(), BitMask::Range { lsb: 3, msb: 7 });
        assert_eq!(node.sign(), crate::elem_type::Sign::Signed);
        assert_eq!(node.endianness(), crate::elem_type::Endianness::BE);
    }
}
