/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use tracing::debug;

use crate::{
    builder::{CacheStoreBuilder, NodeStoreBuilder, ValueStoreBuilder},
    elem_type::ImmOrPNode,
    store::StringId,
    StringNode, StringRegNode,
};

use super::{
    elem_name::{P_VALUE, STREAMABLE, STRING, STRING_REG, VALUE},
    xml, Parse,
};

impl Parse for StringNode {
    #[tracing::instrument(level = "trace", skip_all)]
    fn parse(
        node: &mut xml::Node,
        node_builder: &mut impl NodeStoreBuilder,
        value_builder: &mut impl ValueStoreBuilder,
        cache_builder: &mut impl CacheStoreBuilder,
    ) -> Self {
        debug!("start parsing `String`");
        debug_assert_eq!(node.tag_name(), STRING);

        let attr_base = node.parse(node_builder, value_builder, cache_builder);
        let elem_base = node.parse(node_builder, value_builder, cache_builder);

        let streamable = node
            .parse_if(STREAMABLE, node_builder, value_builder, cache_builder)
            .unwrap_or_default();
        let value: ImmOrPNode<StringId> = node
            .parse_if(VALUE, node_builder, value_builder, cache_builder)
            .or_else(|| node.parse_if(P_VALUE, node_builder, value_builder, cache_builder))
            .expect("`String` requires `Value` or `pValue`");

        Self {
            attr_base,
            elem_base,
            streamable,
            value,
        }
    }
}

impl Parse for StringRegNode {
    #[tracing::instrument(level = "trace", skip_all)]
    fn parse(
        node: &mut xml::Node,
        node_builder: &mut impl NodeStoreBuilder,
        value_builder: &mut impl ValueStoreBuilder,
        cache_builder: &mut impl CacheStoreBuilder,
    ) -> Self {
        debug!("start parsing `StringReg`");
        debug_assert_eq!(node.tag_name(), STRING_REG);

        let attr_base: crate::node_base::NodeAttributeBase =
            node.parse(node_builder, value_builder, cache_builder);
        let register_base: crate::RegisterBase =
            node.parse(node_builder, value_builder, cache_builder);

        register_base.store_invalidators(attr_base.id, cache_builder);

        Self {
            attr_base,
            register_base,
        }
    }
}
