/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

mod boolean;
mod command;
mod elem_name;
mod elem_type;
mod enumeration;
mod float;
mod formula_node;
mod integer;
mod node;
mod node_base;
mod register;
mod register_base;
mod string;
mod utils;
mod xml;

use register::{GroupNode, StructRegNode};
use thiserror::Error;

use crate::{
    builder::{CacheStoreBuilder, NodeStoreBuilder, ValueStoreBuilder},
    interface::INode,
    store::NodeData,
    RegisterDescription,
};

use elem_name::{
    BOOLEAN, CATEGORY, COMMAND, CONVERTER, ENUMERATION, FLOAT, FLOAT_REG, GROUP, INTEGER,
    INT_CONVERTER, INT_REG, INT_SWISS_KNIFE, MASKED_INT_REG, NODE, PORT, REGISTER, STRING,
    STRING_REG, STRUCT_REG, SWISS_KNIFE,
};

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("encoding must be UTF-8: {0}")]
    Utf8Error(#[from] std::str::Utf8Error),

    #[error("invalid XML syntax: {0}")]
    InvalidSyntax(#[from] roxmltree::Error),
}

pub type ParseResult<T> = std::result::Result<T, ParseError>;

/// Parses a GenApi document into the given builders and returns the root
/// `RegisterDescription` metadata.
pub fn parse(
    xml: &impl AsRef<str>,
    node_builder: &mut impl NodeStoreBuilder,
    value_builder: &mut impl ValueStoreBuilder,
    cache_builder: &mut impl CacheStoreBuilder,
) -> ParseResult<RegisterDescription> {
    let document = xml::Document::from_str(xml.as_ref())?;
    let mut node = document.root_node();
    let reg_desc = node.parse(node_builder, value_builder, cache_builder);
    while node.peek().is_some() {
        let children: Vec<NodeData> = node.parse(node_builder, value_builder, cache_builder);
        for child in children {
            register_selector_edges(&child, cache_builder);
            let id = child.node_base().id();
            node_builder.store_node(id, child);
        }
    }

    Ok(reg_desc)
}

/// Writing a selector must stale the caches of the features it selects.
fn register_selector_edges(data: &NodeData, cache_builder: &mut impl CacheStoreBuilder) {
    let (selector, selected) = match data {
        NodeData::Integer(n) => (n.node_base().id(), n.p_selected()),
        NodeData::IntReg(n) => (n.node_base().id(), n.p_selected()),
        NodeData::MaskedIntReg(n) => (n.node_base().id(), n.p_selected()),
        NodeData::Boolean(n) => (n.node_base().id(), n.p_selected()),
        NodeData::Enumeration(n) => (n.node_base().id(), n.p_selected()),
        _ => return,
    };
    for target in selected {
        cache_builder.store_invalidator(selector, *target);
    }
}

trait Parse {
    fn parse(
        node: &mut xml::Node,
        node_builder: &mut impl NodeStoreBuilder,
        value_builder: &mut impl ValueStoreBuilder,
        cache_builder: &mut impl CacheStoreBuilder,
    ) -> Self;
}

macro_rules! single_node {
    ($variant:ident, $node:expr, $node_builder:expr, $value_builder:expr, $cache_builder:expr) => {
        vec![NodeData::$variant(Box::new($node.parse(
            $node_builder,
            $value_builder,
            $cache_builder,
        )))]
    };
}

impl Parse for Vec<NodeData> {
    fn parse(
        node: &mut xml::Node,
        node_builder: &mut impl NodeStoreBuilder,
        value_builder: &mut impl ValueStoreBuilder,
        cache_builder: &mut impl CacheStoreBuilder,
    ) -> Self {
        let mut child = node.next().expect("no element left to parse");
        match child.tag_name() {
            NODE => single_node!(Node, child, node_builder, value_builder, cache_builder),
            CATEGORY => single_node!(Category, child, node_builder, value_builder, cache_builder),
            INTEGER => single_node!(Integer, child, node_builder, value_builder, cache_builder),
            INT_REG => single_node!(IntReg, child, node_builder, value_builder, cache_builder),
            MASKED_INT_REG => {
                single_node!(MaskedIntReg, child, node_builder, value_builder, cache_builder)
            }
            BOOLEAN => single_node!(Boolean, child, node_builder, value_builder, cache_builder),
            COMMAND => single_node!(Command, child, node_builder, value_builder, cache_builder),
            ENUMERATION => {
                single_node!(Enumeration, child, node_builder, value_builder, cache_builder)
            }
            FLOAT => single_node!(Float, child, node_builder, value_builder, cache_builder),
            FLOAT_REG => single_node!(FloatReg, child, node_builder, value_builder, cache_builder),
            STRING => single_node!(String, child, node_builder, value_builder, cache_builder),
            STRING_REG => {
                single_node!(StringReg, child, node_builder, value_builder, cache_builder)
            }
            REGISTER => single_node!(Register, child, node_builder, value_builder, cache_builder),
            CONVERTER => single_node!(Converter, child, node_builder, value_builder, cache_builder),
            INT_CONVERTER => {
                single_node!(IntConverter, child, node_builder, value_builder, cache_builder)
            }
            SWISS_KNIFE => {
                single_node!(SwissKnife, child, node_builder, value_builder, cache_builder)
            }
            INT_SWISS_KNIFE => {
                single_node!(IntSwissKnife, child, node_builder, value_builder, cache_builder)
            }
            PORT => single_node!(Port, child, node_builder, value_builder, cache_builder),
            STRUCT_REG => {
                let node: StructRegNode =
                    child.parse(node_builder, value_builder, cache_builder);
                node.into_masked_int_regs(cache_builder)
                    .into_iter()
                    .map(|node| NodeData::MaskedIntReg(node.into()))
                    .collect()
            }
            GROUP => {
                let node: GroupNode = child.parse(node_builder, value_builder, cache_builder);
                node.nodes
            }
            other => panic!("unexpected element `{}` in GenApi document", other),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        builder::GenApiBuilder,
        store::{DefaultNodeStore, NodeData, NodeStore},
    };

    #[test]
    fn parse_whole_document() {
        let xml = r#"
            <RegisterDescription
                ModelName="Synth"
                VendorName="Lucida"
                StandardNameSpace="GEV"
                SchemaMajorVersion="1"
                SchemaMinorVersion="1"
                SchemaSubMinorVersion="0"
                MajorVersion="1"
                MinorVersion="0"
                SubMinorVersion="0"
                ProductGuid="1"
                VersionGuid="1"
                xmlns="http://www.genicam.org/GenApi/Version_1_1">

                <Category Name="Root">
                    <pFeature>Width</pFeature>
                    <pFeature>Gain</pFeature>
                </Category>

                <Integer Name="Width">
                    <Value>512</Value>
                    <Min>16</Min>
                    <Max>4096</Max>
                </Integer>

                <IntReg Name="GainRaw">
                    <Address>0x1000</Address>
                    <Length>4</Length>
                    <AccessMode>RW</AccessMode>
                    <pPort>Device</pPort>
                    <Endianess>BigEndian</Endianess>
                </IntReg>

                <Converter Name="Gain">
                    <FormulaTo>FROM * 10</FormulaTo>
                    <FormulaFrom>TO / 10</FormulaFrom>
                    <pValue>GainRaw</pValue>
                </Converter>

                <Enumeration Name="TriggerSelector">
                    <EnumEntry Name="FrameStart">
                        <Value>0</Value>
                    </EnumEntry>
                    <EnumEntry Name="AcquisitionStart">
                        <Value>1</Value>
                    </EnumEntry>
                    <Value>0</Value>
                    <pSelected>GainRaw</pSelected>
                </Enumeration>

                <Port Name="Device">
                </Port>
            </RegisterDescription>
            "#;

        let (reg_desc, store, _) = GenApiBuilder::<DefaultNodeStore>::default()
            .build(&xml)
            .unwrap();

        assert_eq!(reg_desc.model_name(), "Synth");
        assert_eq!(reg_desc.vendor_name(), "Lucida");
        assert_eq!(reg_desc.schema_major_version(), 1);

        let width = store.id_by_name("Width").unwrap();
        assert!(matches!(store.node(width), NodeData::Integer(..)));
        let gain = store.id_by_name("Gain").unwrap();
        assert!(matches!(store.node(gain), NodeData::Converter(..)));
        let selector = store.id_by_name("TriggerSelector").unwrap();
        assert!(matches!(store.node(selector), NodeData::Enumeration(..)));
        let entry = store.id_by_name("AcquisitionStart").unwrap();
        assert!(matches!(store.node(entry), NodeData::EnumEntry(..)));
        assert!(store.id_by_name("Device").is_some());
    }
}
