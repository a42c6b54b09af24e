/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use tracing::debug;

use crate::{
    builder::{CacheStoreBuilder, NodeStoreBuilder, ValueStoreBuilder},
    elem_type::{AccessMode, BitMask, CachingMode, Endianness, IntegerRepresentation, Sign},
    node_base::{NodeAttributeBase, NodeElementBase},
    store::{NodeData, NodeId},
    MaskedIntRegNode, RegisterBase, RegisterNode,
};

use super::{
    elem_name::{
        ACCESS_MODE, CACHEABLE, ENDIANNESS, GROUP, POLLING_TIME, P_INVALIDATOR, P_SELECTED,
        REGISTER, REPRESENTATION, SIGN, STREAMABLE, STRUCT_ENTRY, STRUCT_REG, UNIT,
    },
    integer::parse_bit_mask,
    xml, Parse,
};

impl Parse for RegisterNode {
    #[tracing::instrument(level = "trace", skip_all)]
    fn parse(
        node: &mut xml::Node,
        node_builder: &mut impl NodeStoreBuilder,
        value_builder: &mut impl ValueStoreBuilder,
        cache_builder: &mut impl CacheStoreBuilder,
    ) -> Self {
        debug!("start parsing `Register`");
        debug_assert_eq!(node.tag_name(), REGISTER);

        let attr_base: NodeAttributeBase = node.parse(node_builder, value_builder, cache_builder);
        let register_base: RegisterBase = node.parse(node_builder, value_builder, cache_builder);

        register_base.store_invalidators(attr_base.id, cache_builder);

        Self {
            attr_base,
            register_base,
        }
    }
}

/// A `StructReg` is syntax sugar: one shared register with several masked
/// entries. It expands into [`MaskedIntRegNode`]s at parse time, so the
/// arena never sees it.
pub(super) struct StructRegNode {
    register_base: RegisterBase,
    endianness: Endianness,
    entries: Vec<StructEntryNode>,
}

struct StructEntryNode {
    attr_base: NodeAttributeBase,
    elem_base: NodeElementBase,
    p_invalidators: Vec<NodeId>,
    access_mode: Option<AccessMode>,
    cacheable: Option<CachingMode>,
    polling_time: Option<u64>,
    streamable: bool,
    bit_mask: BitMask,
    sign: Sign,
    unit: Option<String>,
    representation: IntegerRepresentation,
    p_selected: Vec<NodeId>,
}

impl StructRegNode {
    pub(super) fn into_masked_int_regs(
        self,
        cache_builder: &mut impl CacheStoreBuilder,
    ) -> Vec<MaskedIntRegNode> {
        let mut result = Vec::with_capacity(self.entries.len());
        for entry in self.entries {
            let mut register_base = self.register_base.clone();
            // Entry elements override the shared register's.
            register_base.elem_base = entry.elem_base;
            register_base.streamable |= entry.streamable;
            if let Some(access_mode) = entry.access_mode {
                register_base.access_mode = access_mode;
            }
            if let Some(cacheable) = entry.cacheable {
                register_base.cacheable = cacheable;
            }
            if entry.polling_time.is_some() {
                register_base.polling_time = entry.polling_time;
            }
            register_base
                .p_invalidators
                .extend(entry.p_invalidators.iter().copied());

            register_base.store_invalidators(entry.attr_base.id, cache_builder);

            result.push(MaskedIntRegNode {
                attr_base: entry.attr_base,
                register_base,
                bit_mask: entry.bit_mask,
                sign: entry.sign,
                endianness: self.endianness,
                unit: entry.unit,
                representation: entry.representation,
                p_selected: entry.p_selected,
            });
        }
        result
    }
}

impl Parse for StructRegNode {
    #[tracing::instrument(level = "trace", skip_all)]
    fn parse(
        node: &mut xml::Node,
        node_builder: &mut impl NodeStoreBuilder,
        value_builder: &mut impl ValueStoreBuilder,
        cache_builder: &mut impl CacheStoreBuilder,
    ) -> Self {
        debug!("start parsing `StructReg`");
        debug_assert_eq!(node.tag_name(), STRUCT_REG);

        let register_base: RegisterBase = node.parse(node_builder, value_builder, cache_builder);
        let endianness = node
            .parse_if(ENDIANNESS, node_builder, value_builder, cache_builder)
            .unwrap_or_default();

        let mut entries = Vec::new();
        while let Some(entry) =
            node.parse_if(STRUCT_ENTRY, node_builder, value_builder, cache_builder)
        {
            entries.push(entry);
        }

        Self {
            register_base,
            endianness,
            entries,
        }
    }
}

impl Parse for StructEntryNode {
    fn parse(
        node: &mut xml::Node,
        node_builder: &mut impl NodeStoreBuilder,
        value_builder: &mut impl ValueStoreBuilder,
        cache_builder: &mut impl CacheStoreBuilder,
    ) -> Self {
        debug_assert_eq!(node.tag_name(), STRUCT_ENTRY);

        let attr_base = node.parse(node_builder, value_builder, cache_builder);
        let elem_base = node.parse(node_builder, value_builder, cache_builder);

        let p_invalidators =
            node.parse_while(P_INVALIDATOR, node_builder, value_builder, cache_builder);
        let access_mode = node.parse_if(ACCESS_MODE, node_builder, value_builder, cache_builder);
        let cacheable = node.parse_if(CACHEABLE, node_builder, value_builder, cache_builder);
        let polling_time = node
            .parse_if::<i64>(POLLING_TIME, node_builder, value_builder, cache_builder)
            .map(|t| t as u64);
        let streamable = node
            .parse_if(STREAMABLE, node_builder, value_builder, cache_builder)
            .unwrap_or_default();
        let bit_mask = parse_bit_mask(node, node_builder, value_builder, cache_builder);
        let sign = node
            .parse_if(SIGN, node_builder, value_builder, cache_builder)
            .unwrap_or_default();
        let unit = node.parse_if(UNIT, node_builder, value_builder, cache_builder);
        let representation = node
            .parse_if(REPRESENTATION, node_builder, value_builder, cache_builder)
            .unwrap_or_default();
        let p_selected = node.parse_while(P_SELECTED, node_builder, value_builder, cache_builder);

        Self {
            attr_base,
            elem_base,
            p_invalidators,
            access_mode,
            cacheable,
            polling_time,
            streamable,
            bit_mask,
            sign,
            unit,
            representation,
            p_selected,
        }
    }
}

/// A `Group` is a lexical container; its children join the arena
/// directly.
pub(super) struct GroupNode {
    pub(super) nodes: Vec<NodeData>,
}

impl Parse for GroupNode {
    fn parse(
        node: &mut xml::Node,
        node_builder: &mut impl NodeStoreBuilder,
        value_builder: &mut impl ValueStoreBuilder,
        cache_builder: &mut impl CacheStoreBuilder,
    ) -> Self {
        debug_assert_eq!(node.tag_name(), GROUP);

        let mut nodes = Vec::new();
        while node.peek().is_some() {
            let children: Vec<NodeData> = node.parse(node_builder, value_builder, cache_builder);
            nodes.extend(children);
        }

        Self { nodes }
    }
}

#[cfg(test)]
mod tests {
    use super::{super::utils::tests::parse_default, *};
    use crate::store::{DefaultCacheStore, DefaultNodeStore, DefaultValueStore};

    #[test]
    fn struct_reg_expands_to_masked_int_regs() {
        let xml = r#"
            <StructReg Comment="test">
                <Address>0x10000</Address>
                <Length>4</Length>
                <AccessMode>RW</AccessMode>
                <pPort>Device</pPort>
                <Endianess>BigEndian</Endianess>
                <StructEntry Name="Entry0">
                    <Bit>24</Bit>
                </StructEntry>
                <StructEntry Name="Entry1">
                    <AccessMode>RO</AccessMode>
                    <LSB>0</LSB>
                    <MSB>7</MSB>
                </StructEntry>
            </StructReg>
            "#;

        let (node, _, _, mut cache_builder): (
            StructRegNode,
            DefaultNodeStore,
            DefaultValueStore,
            DefaultCacheStore,
        ) = parse_default(xml);

        let regs = node.into_masked_int_regs(&mut cache_builder);
        assert_eq!(regs.len(), 2);
        assert_eq!(regs[0].bit_mask(), BitMask::SingleBit(24));
        assert_eq!(regs[0].endianness(), Endianness::BE);
        assert_eq!(regs[0].register_base().access_mode(), AccessMode::RW);
        assert_eq!(regs[1].bit_mask(), BitMask::Range { lsb: 0, msb: 7 });
        assert_eq!(regs[1].register_base().access_mode(), AccessMode::RO);
    }
}
