//! Stored procedure templates, per-call instances and the execution boundary

mod binding;
mod execution;
mod instance;
mod parameter;
mod resolver;
mod template;

pub use binding::parameter_mapping;
pub use execution::{
    Command, CommandExecutor, CommandKind, CommandOutcome, CommandParameter, CommandResult,
    ResultSet, Row,
};
pub use instance::{InstanceState, ProcedureInstance};
pub use parameter::ParameterDefinition;
pub use resolver::NameResolver;
pub use template::{ProcedureFlags, ProcedureTemplate, MESSAGE_RESULT, RETURN_VALUE};
