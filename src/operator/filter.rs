use crate::error::OptResult;
use crate::expr::{ColumnSet, Expr};
use crate::operator::{
    check_child_index, delivered_input, pass_through, relational_input, LogicalOperatorTrait,
    PhysicalOperatorTrait,
};
use crate::properties::{DeliveredProperties, LogicalProperty, RequiredProperties};

#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct Filter {
    predicate: Expr,
}

impl Filter {
    pub fn new(predicate: Expr) -> Self {
        Self { predicate }
    }

    pub fn predicate(&self) -> &Expr {
        &self.predicate
    }
}

impl LogicalOperatorTrait for Filter {
    fn arity(&self) -> usize {
        1
    }

    fn derive_logical_prop(&self, inputs: &[&LogicalProperty]) -> OptResult<LogicalProperty> {
        Ok(LogicalProperty::Relational(
            relational_input(inputs, 0)?.clone(),
        ))
    }
}

impl PhysicalOperatorTrait for Filter {
    fn arity(&self) -> usize {
        1
    }

    fn required_child_props(
        &self,
        required: &RequiredProperties,
        child_index: usize,
        child_output: &ColumnSet,
    ) -> OptResult<RequiredProperties> {
        check_child_index("filter", child_index, 1)?;
        Ok(pass_through(
            required,
            &self.predicate.used_columns(),
            child_output,
        ))
    }

    fn derive_delivered(&self, inputs: &[&DeliveredProperties]) -> OptResult<DeliveredProperties> {
        Ok(delivered_input(inputs, 0)?.clone())
    }
}
