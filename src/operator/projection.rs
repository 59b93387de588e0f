use crate::error::OptResult;
use crate::expr::{ColumnId, ColumnSet, Expr};
use crate::operator::{
    check_child_index, delivered_input, relational_input, LogicalOperatorTrait,
    PhysicalOperatorTrait,
};
use crate::properties::{
    DeliveredProperties, DistributionMatching, DistributionSpec, LogicalProperty,
    RelationalProperty, RequiredProperties,
};

/// Computes each output column from an expression over the input.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct Projection {
    exprs: Vec<(ColumnId, Expr)>,
}

impl Projection {
    pub fn new(exprs: Vec<(ColumnId, Expr)>) -> Self {
        Self { exprs }
    }

    /// Projection which only keeps `columns` of its input.
    pub fn columns<I: IntoIterator<Item = ColumnId>>(columns: I) -> Self {
        Self::new(columns.into_iter().map(|c| (c, Expr::Column(c))).collect())
    }

    pub fn exprs(&self) -> &[(ColumnId, Expr)] {
        &self.exprs
    }

    pub fn output_columns(&self) -> ColumnSet {
        self.exprs.iter().map(|(c, _)| *c).collect()
    }

    /// Output columns which are plain copies of the same input column.
    fn forwarded_columns(&self) -> ColumnSet {
        self.exprs
            .iter()
            .filter(|(c, e)| matches!(e, Expr::Column(input) if input == c))
            .map(|(c, _)| *c)
            .collect()
    }

    fn used_columns(&self) -> ColumnSet {
        let mut ret = ColumnSet::new();
        for (_, e) in &self.exprs {
            ret.extend_from(&e.used_columns());
        }
        ret
    }
}

impl LogicalOperatorTrait for Projection {
    fn arity(&self) -> usize {
        1
    }

    fn derive_logical_prop(&self, inputs: &[&LogicalProperty]) -> OptResult<LogicalProperty> {
        let input = relational_input(inputs, 0)?;
        let forwarded = self.forwarded_columns();
        let keys = input
            .unique_keys()
            .iter()
            .filter(|k| k.is_subset(&forwarded))
            .cloned()
            .collect();
        Ok(LogicalProperty::Relational(
            RelationalProperty::new(self.output_columns())
                .with_max_rows(input.max_rows())
                .with_unique_keys(keys),
        ))
    }
}

impl PhysicalOperatorTrait for Projection {
    fn arity(&self) -> usize {
        1
    }

    /// Order and distribution are only pushed down on columns the projection forwards as is.
    fn required_child_props(
        &self,
        required: &RequiredProperties,
        child_index: usize,
        child_output: &ColumnSet,
    ) -> OptResult<RequiredProperties> {
        check_child_index("projection", child_index, 1)?;
        let forwarded = self.forwarded_columns().intersection(child_output);
        let order = required.order().spec.restrict_to(&forwarded);
        let distribution = required.distribution();
        let ret = required
            .clone()
            .with_columns(self.used_columns().intersection(child_output))
            .with_order(order);
        if distribution.spec.used_columns().is_subset(&forwarded) {
            Ok(ret)
        } else {
            Ok(ret.with_distribution(DistributionSpec::Any, DistributionMatching::Satisfy))
        }
    }

    fn derive_delivered(&self, inputs: &[&DeliveredProperties]) -> OptResult<DeliveredProperties> {
        let input = delivered_input(inputs, 0)?;
        let forwarded = self.forwarded_columns();
        let mut delivered = input.clone();
        delivered.order = input.order.restrict_to(&forwarded);
        if !input.distribution.used_columns().is_subset(&forwarded) {
            delivered.distribution = DistributionSpec::Random;
        }
        Ok(delivered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{col, lit_i64};
    use crate::properties::{OrderSpec, SortKey};

    #[test]
    fn test_computed_column_blocks_order() {
        let projection = Projection::new(vec![
            (ColumnId(1), col(1)),
            (ColumnId(5), col(2).gt(lit_i64(0))),
        ]);
        let required = RequiredProperties::any(projection.output_columns()).with_order(
            OrderSpec::new(vec![SortKey::asc(ColumnId(5)), SortKey::asc(ColumnId(1))]),
        );
        let child_output = [ColumnId(1), ColumnId(2)].iter().collect();
        let child = projection
            .required_child_props(&required, 0, &child_output)
            .unwrap();
        assert!(child.order().spec.is_empty());
        assert_eq!(
            &[ColumnId(1), ColumnId(2)].iter().collect::<ColumnSet>(),
            child.columns()
        );
    }

    #[test]
    fn test_keys_survive_forwarding() {
        let input = LogicalProperty::Relational(
            RelationalProperty::new([ColumnId(1), ColumnId(2)].iter().collect())
                .with_unique_keys(vec![[ColumnId(1)].iter().collect()]),
        );
        let prop = Projection::columns(vec![ColumnId(1)])
            .derive_logical_prop(&[&input])
            .unwrap();
        assert_eq!(1, prop.as_relational().unwrap().unique_keys().len());

        let prop = Projection::columns(vec![ColumnId(2)])
            .derive_logical_prop(&[&input])
            .unwrap();
        assert!(prop.as_relational().unwrap().unique_keys().is_empty());
    }
}
