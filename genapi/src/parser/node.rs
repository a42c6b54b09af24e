/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use crate::{
    builder::{CacheStoreBuilder, NodeStoreBuilder, ValueStoreBuilder},
    CategoryNode, Node, PortNode, RegisterDescription,
};

use super::{
    elem_name::{
        CACHE_CHUNK_DATA, CHUNK_ID, MAJOR_VERSION, MINOR_VERSION, MODEL_NAME, NODE, PORT,
        PRODUCT_GUID, P_CHUNK_ID, P_FEATURE, SCHEMA_MAJOR_VERSION, SCHEMA_MINOR_VERSION,
        SCHEMA_SUB_MINOR_VERSION, STANDARD_NAME_SPACE, SUB_MINOR_VERSION, SWAP_ENDIANNESS,
        TOOL_TIP_ATTR, VENDOR_NAME, VERSION_GUID,
    },
    elem_type::{convert_to_standard_name_space, convert_to_uint},
    xml, Parse,
};

impl Parse for Node {
    fn parse(
        node: &mut xml::Node,
        node_builder: &mut impl NodeStoreBuilder,
        value_builder: &mut impl ValueStoreBuilder,
        cache_builder: &mut impl CacheStoreBuilder,
    ) -> Self {
        debug_assert_eq!(node.tag_name(), NODE);

        let attr_base = node.parse(node_builder, value_builder, cache_builder);
        let elem_base = node.parse(node_builder, value_builder, cache_builder);

        Self {
            attr_base,
            elem_base,
        }
    }
}

impl Parse for CategoryNode {
    fn parse(
        node: &mut xml::Node,
        node_builder: &mut impl NodeStoreBuilder,
        value_builder: &mut impl ValueStoreBuilder,
        cache_builder: &mut impl CacheStoreBuilder,
    ) -> Self {
        let attr_base = node.parse(node_builder, value_builder, cache_builder);
        let elem_base = node.parse(node_builder, value_builder, cache_builder);

        let p_features = node.parse_while(P_FEATURE, node_builder, value_builder, cache_builder);

        Self {
            attr_base,
            elem_base,
            p_features,
        }
    }
}

impl Parse for PortNode {
    fn parse(
        node: &mut xml::Node,
        node_builder: &mut impl NodeStoreBuilder,
        value_builder: &mut impl ValueStoreBuilder,
        cache_builder: &mut impl CacheStoreBuilder,
    ) -> Self {
        debug_assert_eq!(node.tag_name(), PORT);

        let attr_base = node.parse(node_builder, value_builder, cache_builder);
        let elem_base = node.parse(node_builder, value_builder, cache_builder);

        let chunk_id = node
            .parse_if(CHUNK_ID, node_builder, value_builder, cache_builder)
            .or_else(|| node.parse_if(P_CHUNK_ID, node_builder, value_builder, cache_builder));
        let swap_endianness = node
            .parse_if(SWAP_ENDIANNESS, node_builder, value_builder, cache_builder)
            .unwrap_or_default();
        let cache_chunk_data = node
            .parse_if(CACHE_CHUNK_DATA, node_builder, value_builder, cache_builder)
            .unwrap_or_default();

        Self {
            attr_base,
            elem_base,
            chunk_id,
            swap_endianness,
            cache_chunk_data,
        }
    }
}

impl Parse for RegisterDescription {
    fn parse(
        node: &mut xml::Node,
        _: &mut impl NodeStoreBuilder,
        _: &mut impl ValueStoreBuilder,
        _: &mut impl CacheStoreBuilder,
    ) -> Self {
        let attr_uint = |name: &str| node.attribute_of(name).map(convert_to_uint).unwrap_or(0);

        Self {
            model_name: node.attribute_of(MODEL_NAME).unwrap_or_default().into(),
            vendor_name: node.attribute_of(VENDOR_NAME).unwrap_or_default().into(),
            tool_tip: node.attribute_of(TOOL_TIP_ATTR).map(Into::into),
            standard_name_space: convert_to_standard_name_space(
                node.attribute_of(STANDARD_NAME_SPACE).unwrap_or("None"),
            ),
            schema_major_version: attr_uint(SCHEMA_MAJOR_VERSION),
            schema_minor_version: attr_uint(SCHEMA_MINOR_VERSION),
            schema_subminor_version: attr_uint(SCHEMA_SUB_MINOR_VERSION),
            major_version: attr_uint(MAJOR_VERSION),
            minor_version: attr_uint(MINOR_VERSION),
            subminor_version: attr_uint(SUB_MINOR_VERSION),
            product_guid: node.attribute_of(PRODUCT_GUID).unwrap_or_default().into(),
            version_guid: node.attribute_of(VERSION_GUID).unwrap_or_default().into(),
        }
    }
}
