//! One `v2/{Expression}` parameter per raw expression channel.

use super::eparam::EParam;
use common::UnifiedExpressions;

pub fn expression_name(expr: UnifiedExpressions) -> String {
    format!("v2/{}", expr.name())
}

pub fn create_unified_expression_params() -> impl Iterator<Item = EParam> {
    UnifiedExpressions::iter()
        .map(|expr| EParam::expression(&expression_name(expr), move |d| d.weight(expr)))
}
