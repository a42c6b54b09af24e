/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use tracing::debug;

use crate::{
    builder::{CacheStoreBuilder, NodeStoreBuilder, ValueStoreBuilder},
    store::NodeData,
    EnumEntryNode, EnumerationNode,
};

use super::{
    elem_name::{
        ENUMERATION, ENUM_ENTRY, IS_SELF_CLEARING, NUMERIC_VALUE, POLLING_TIME, P_SELECTED,
        P_VALUE, STREAMABLE, SYMBOLIC, VALUE,
    },
    xml, Parse,
};

impl Parse for EnumerationNode {
    #[tracing::instrument(level = "trace", skip_all)]
    fn parse(
        node: &mut xml::Node,
        node_builder: &mut impl NodeStoreBuilder,
        value_builder: &mut impl ValueStoreBuilder,
        cache_builder: &mut impl CacheStoreBuilder,
    ) -> Self {
        debug!("start parsing `Enumeration`");
        debug_assert_eq!(node.tag_name(), ENUMERATION);

        let attr_base = node.parse(node_builder, value_builder, cache_builder);
        let elem_base = node.parse(node_builder, value_builder, cache_builder);

        let streamable = node
            .parse_if(STREAMABLE, node_builder, value_builder, cache_builder)
            .unwrap_or_default();

        // Entries are nodes in their own right: parse and store each,
        // keeping the ids.
        let mut entries = Vec::new();
        while let Some(entry) = node.parse_if::<EnumEntryNode>(
            ENUM_ENTRY,
            node_builder,
            value_builder,
            cache_builder,
        ) {
            let id = entry.attr_base.id;
            entries.push(id);
            node_builder.store_node(id, NodeData::EnumEntry(Box::new(entry)));
        }

        let value = node
            .parse_if(VALUE, node_builder, value_builder, cache_builder)
            .or_else(|| node.parse_if(P_VALUE, node_builder, value_builder, cache_builder))
            .expect("`Enumeration` requires `Value` or `pValue`");
        let p_selected = node.parse_while(P_SELECTED, node_builder, value_builder, cache_builder);
        let polling_time = node
            .parse_if::<i64>(POLLING_TIME, node_builder, value_builder, cache_builder)
            .map(|t| t as u64);

        Self {
            attr_base,
            elem_base,
            streamable,
            entries,
            value,
            p_selected,
            polling_time,
        }
    }
}

impl Parse for EnumEntryNode {
    fn parse(
        node: &mut xml::Node,
        node_builder: &mut impl NodeStoreBuilder,
        value_builder: &mut impl ValueStoreBuilder,
        cache_builder: &mut impl CacheStoreBuilder,
    ) -> Self {
        debug_assert_eq!(node.tag_name(), ENUM_ENTRY);

        let attr_base = node.parse(node_builder, value_builder, cache_builder);
        let elem_base = node.parse(node_builder, value_builder, cache_builder);

        let value = node
            .parse_if(VALUE, node_builder, value_builder, cache_builder)
            .expect("`EnumEntry` requires `Value`");
        let numeric_value = node.parse_if(NUMERIC_VALUE, node_builder, value_builder, cache_builder);
        let symbolic = node.parse_if(SYMBOLIC, node_builder, value_builder, cache_builder);
        let is_self_clearing = node
            .parse_if(IS_SELF_CLEARING, node_builder, value_builder, cache_builder)
            .unwrap_or_default();

        Self {
            attr_base,
            elem_base,
            value,
            numeric_value,
            symbolic,
            is_self_clearing,
        }
    }
}
