/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Parsers of the formula-backed nodes: `SwissKnife`, `IntSwissKnife`,
//! `Converter` and `IntConverter`.

use tracing::debug;

use crate::{
    builder::{CacheStoreBuilder, NodeStoreBuilder, ValueStoreBuilder},
    formula::Formula,
    ConverterNode, IntConverterNode, IntSwissKnifeNode, SwissKnifeNode,
};

use super::{
    elem_name::{
        CONSTANT, CONVERTER, DISPLAY_NOTATION, DISPLAY_PRECISION, EXPRESSION, FORMULA,
        FORMULA_FROM, FORMULA_TO, INT_CONVERTER, INT_SWISS_KNIFE, IS_LINEAR, P_VALUE, P_VARIABLE,
        REPRESENTATION, SLOPE, STREAMABLE, SWISS_KNIFE, UNIT,
    },
    xml, Parse,
};

impl Parse for Formula {
    fn parse(
        node: &mut xml::Node,
        node_builder: &mut impl NodeStoreBuilder,
        value_builder: &mut impl ValueStoreBuilder,
        cache_builder: &mut impl CacheStoreBuilder,
    ) -> Self {
        Formula::new(node.parse(node_builder, value_builder, cache_builder))
    }
}

impl Parse for SwissKnifeNode {
    #[tracing::instrument(level = "trace", skip_all)]
    fn parse(
        node: &mut xml::Node,
        node_builder: &mut impl NodeStoreBuilder,
        value_builder: &mut impl ValueStoreBuilder,
        cache_builder: &mut impl CacheStoreBuilder,
    ) -> Self {
        debug!("start parsing `SwissKnife`");
        debug_assert_eq!(node.tag_name(), SWISS_KNIFE);

        let attr_base = node.parse(node_builder, value_builder, cache_builder);
        let elem_base = node.parse(node_builder, value_builder, cache_builder);

        let streamable = node
            .parse_if(STREAMABLE, node_builder, value_builder, cache_builder)
            .unwrap_or_default();
        let p_variables = node.parse_while(P_VARIABLE, node_builder, value_builder, cache_builder);
        let constants = node.parse_while(CONSTANT, node_builder, value_builder, cache_builder);
        let expressions = node.parse_while(EXPRESSION, node_builder, value_builder, cache_builder);
        let formula = node
            .parse_if(FORMULA, node_builder, value_builder, cache_builder)
            .expect("`SwissKnife` requires `Formula`");
        let unit = node.parse_if(UNIT, node_builder, value_builder, cache_builder);
        let representation = node
            .parse_if(REPRESENTATION, node_builder, value_builder, cache_builder)
            .unwrap_or_default();
        let display_notation = node
            .parse_if(DISPLAY_NOTATION, node_builder, value_builder, cache_builder)
            .unwrap_or_default();
        let display_precision = node
            .parse_if(DISPLAY_PRECISION, node_builder, value_builder, cache_builder)
            .unwrap_or(6);

        Self {
            attr_base,
            elem_base,
            streamable,
            p_variables,
            constants,
            expressions,
            formula,
            unit,
            representation,
            display_notation,
            display_precision,
        }
    }
}

impl Parse for IntSwissKnifeNode {
    #[tracing::instrument(level = "trace", skip_all)]
    fn parse(
        node: &mut xml::Node,
        node_builder: &mut impl NodeStoreBuilder,
        value_builder: &mut impl ValueStoreBuilder,
        cache_builder: &mut impl CacheStoreBuilder,
    ) -> Self {
        debug!("start parsing `IntSwissKnife`");
        debug_assert_eq!(node.tag_name(), INT_SWISS_KNIFE);

        let attr_base = node.parse(node_builder, value_builder, cache_builder);
        let elem_base = node.parse(node_builder, value_builder, cache_builder);

        let streamable = node
            .parse_if(STREAMABLE, node_builder, value_builder, cache_builder)
            .unwrap_or_default();
        let p_variables = node.parse_while(P_VARIABLE, node_builder, value_builder, cache_builder);
        let constants = node.parse_while(CONSTANT, node_builder, value_builder, cache_builder);
        let expressions = node.parse_while(EXPRESSION, node_builder, value_builder, cache_builder);
        let formula = node
            .parse_if(FORMULA, node_builder, value_builder, cache_builder)
            .expect("`IntSwissKnife` requires `Formula`");
        let unit = node.parse_if(UNIT, node_builder, value_builder, cache_builder);
        let representation = node
            .parse_if(REPRESENTATION, node_builder, value_builder, cache_builder)
            .unwrap_or_default();

        Self {
            attr_base,
            elem_base,
            streamable,
            p_variables,
            constants,
            expressions,
            formula,
            unit,
            representation,
        }
    }
}

impl Parse for ConverterNode {
    #[tracing::instrument(level = "trace", skip_all)]
    fn parse(
        node: &mut xml::Node,
        node_builder: &mut impl NodeStoreBuilder,
        value_builder: &mut impl ValueStoreBuilder,
        cache_builder: &mut impl CacheStoreBuilder,
    ) -> Self {
        debug!("start parsing `Converter`");
        debug_assert_eq!(node.tag_name(), CONVERTER);

        let attr_base = node.parse(node_builder, value_builder, cache_builder);
        let elem_base = node.parse(node_builder, value_builder, cache_builder);

        let streamable = node
            .parse_if(STREAMABLE, node_builder, value_builder, cache_builder)
            .unwrap_or_default();
        let p_variables = node.parse_while(P_VARIABLE, node_builder, value_builder, cache_builder);
        let constants = node.parse_while(CONSTANT, node_builder, value_builder, cache_builder);
        let expressions = node.parse_while(EXPRESSION, node_builder, value_builder, cache_builder);
        let formula_to = node
            .parse_if(FORMULA_TO, node_builder, value_builder, cache_builder)
            .expect("`Converter` requires `FormulaTo`");
        let formula_from = node
            .parse_if(FORMULA_FROM, node_builder, value_builder, cache_builder)
            .expect("`Converter` requires `FormulaFrom`");
        let p_value = node
            .parse_if(P_VALUE, node_builder, value_builder, cache_builder)
            .expect("`Converter` requires `pValue`");
        let unit = node.parse_if(UNIT, node_builder, value_builder, cache_builder);
        let representation = node
            .parse_if(REPRESENTATION, node_builder, value_builder, cache_builder)
            .unwrap_or_default();
        let display_notation = node
            .parse_if(DISPLAY_NOTATION, node_builder, value_builder, cache_builder)
            .unwrap_or_default();
        let display_precision = node
            .parse_if(DISPLAY_PRECISION, node_builder, value_builder, cache_builder)
            .unwrap_or(6);
        let slope = node
            .parse_if(SLOPE, node_builder, value_builder, cache_builder)
            .unwrap_or_default();
        let _is_linear: Option<bool> =
            node.parse_if(IS_LINEAR, node_builder, value_builder, cache_builder);

        Self {
            attr_base,
            elem_base,
            streamable,
            p_variables,
            constants,
            expressions,
            formula_to,
            formula_from,
            p_value,
            unit,
            representation,
            display_notation,
            display_precision,
            slope,
        }
    }
}

impl Parse for IntConverterNode {
    #[tracing::instrument(level = "trace", skip_all)]
    fn parse(
        node: &mut xml::Node,
        node_builder: &mut impl NodeStoreBuilder,
        value_builder: &mut impl ValueStoreBuilder,
        cache_builder: &mut impl CacheStoreBuilder,
    ) -> Self {
        debug!("start parsing `IntConverter`");
        debug_assert_eq!(node.tag_name(), INT_CONVERTER);

        let attr_base = node.parse(node_builder, value_builder, cache_builder);
        let elem_base = node.parse(node_builder, value_builder, cache_builder);

        let streamable = node
            .parse_if(STREAMABLE, node_builder, value_builder, cache_builder)
            .unwrap_or_default();
        let p_variables = node.parse_while(P_VARIABLE, node_builder, value_builder, cache_builder);
        let constants = node.parse_while(CONSTANT, node_builder, value_builder, cache_builder);
        let expressions = node.parse_while(EXPRESSION, node_builder, value_builder, cache_builder);
        let formula_to = node
            .parse_if(FORMULA_TO, node_builder, value_builder, cache_builder)
            .expect("`IntConverter` requires `FormulaTo`");
        let formula_from = node
            .parse_if(FORMULA_FROM, node_builder, value_builder, cache_builder)
            .expect("`IntConverter` requires `FormulaFrom`");
        let p_value = node
            .parse_if(P_VALUE, node_builder, value_builder, cache_builder)
            .expect("`IntConverter` requires `pValue`");
        let unit = node.parse_if(UNIT, node_builder, value_builder, cache_builder);
        let representation = node
            .parse_if(REPRESENTATION, node_builder, value_builder, cache_builder)
            .unwrap_or_default();

        Self {
            attr_base,
            elem_base,
            streamable,
            p_variables,
            constants,
            expressions,
            formula_to,
            formula_from,
            p_value,
            unit,
            representation,
        }
    }
}
