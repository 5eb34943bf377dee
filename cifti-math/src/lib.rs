mod binding;
mod config;
mod engine;
mod errors;
mod expression;
mod plan;
mod select;

#[cfg(test)]
mod testing;

pub use binding::VariableBinding;

pub use config::MathConfig;
pub use config::OutputVersion;
pub use config::SelectConfig;
pub use config::VarConfig;

pub use engine::CiftiMath;

pub use errors::Error;
pub use errors::Result;

pub use expression::Expression;
pub use expression::FnExpression;

pub use plan::OutputPlan;
pub use plan::PlanInput;

pub use select::Selection;
pub use select::SelectionSpec;
