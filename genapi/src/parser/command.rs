/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use tracing::debug;

use crate::{
    builder::{CacheStoreBuilder, NodeStoreBuilder, ValueStoreBuilder},
    elem_type::ImmOrPNode,
    CommandNode,
};

use super::{
    elem_name::{COMMAND, COMMAND_VALUE, POLLING_TIME, P_COMMAND_VALUE, P_VALUE, VALUE},
    xml, Parse,
};

impl Parse for CommandNode {
    #[tracing::instrument(level = "trace", skip_all)]
    fn parse(
        node: &mut xml::Node,
        node_builder: &mut impl NodeStoreBuilder,
        value_builder: &mut impl ValueStoreBuilder,
        cache_builder: &mut impl CacheStoreBuilder,
    ) -> Self {
        debug!("start parsing `Command`");
        debug_assert_eq!(node.tag_name(), COMMAND);

        let attr_base = node.parse(node_builder, value_builder, cache_builder);
        let elem_base = node.parse(node_builder, value_builder, cache_builder);

        let value = node
            .parse_if(VALUE, node_builder, value_builder, cache_builder)
            .or_else(|| node.parse_if(P_VALUE, node_builder, value_builder, cache_builder))
            .expect("`Command` requires `Value` or `pValue`");
        // Executing a command writes `CommandValue`; it defaults to 1.
        let command_value = node
            .parse_if(COMMAND_VALUE, node_builder, value_builder, cache_builder)
            .or_else(|| node.parse_if(P_COMMAND_VALUE, node_builder, value_builder, cache_builder))
            .unwrap_or_else(|| ImmOrPNode::Imm(value_builder.store(1_i64)));
        let polling_time = node
            .parse_if::<i64>(POLLING_TIME, node_builder, value_builder, cache_builder)
            .map(|t| t as u64);

        Self {
            attr_base,
            elem_base,
            value,
            command_value,
            polling_time,
        }
    }
}
