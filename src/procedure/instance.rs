//! Per-call procedure instances: parameter access, execution and results

use std::sync::Arc;

use log::debug;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::catalog::CatalogSnapshot;
use crate::error::{ProcedureError, Result};
use crate::materialize::{materialize, Record};
use crate::types::{FromValue, Value};

use super::execution::{
    Command, CommandExecutor, CommandKind, CommandParameter, CommandResult, ResultSet,
};
use super::parameter::ParameterDefinition;
use super::template::{ProcedureTemplate, MESSAGE_RESULT, RETURN_VALUE};

/// Lifecycle of a procedure instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceState {
    /// Nothing bound yet
    Unbound,
    /// At least one successful bind
    Bound,
    /// Executed successfully; outputs are readable
    Executed,
    /// A bind, validation, execution or materialization step failed
    Faulted,
}

impl InstanceState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, InstanceState::Executed | InstanceState::Faulted)
    }
}

/// One call of a stored procedure.
///
/// Holds its own copy of every parameter and a shared reference to the
/// template and catalog snapshot it came from. Instances are single-use:
/// once executed (or faulted) they only serve reads.
#[derive(Debug)]
pub struct ProcedureInstance {
    template: Arc<ProcedureTemplate>,
    snapshot: Arc<CatalogSnapshot>,
    parameters: Vec<ParameterDefinition>,
    state: InstanceState,
}

impl ProcedureInstance {
    pub fn new(template: Arc<ProcedureTemplate>, snapshot: Arc<CatalogSnapshot>) -> Self {
        let parameters = template.new_parameters();
        Self {
            template,
            snapshot,
            parameters,
            state: InstanceState::Unbound,
        }
    }

    /// `[schema].[NAME]`
    pub fn name(&self) -> &str {
        self.template.name()
    }

    pub fn template(&self) -> &Arc<ProcedureTemplate> {
        &self.template
    }

    pub(crate) fn snapshot(&self) -> &Arc<CatalogSnapshot> {
        &self.snapshot
    }

    pub fn state(&self) -> InstanceState {
        self.state
    }

    pub fn parameters(&self) -> &[ParameterDefinition] {
        &self.parameters
    }

    /// Parameter by any accepted spelling
    pub fn parameter(&self, alias: &str) -> Result<&ParameterDefinition> {
        let idx = self.template.position(alias)?;
        Ok(&self.parameters[idx])
    }

    pub fn contains_parameter(&self, alias: &str) -> bool {
        self.template.contains_parameter(alias)
    }

    /// Assigns a value whose type must match the parameter type exactly
    pub fn set(&mut self, alias: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        self.bind(|instance| instance.parameter_mut(alias)?.set_value(value))
    }

    /// Assigns a dynamically typed value, converting it where possible
    pub fn set_untyped(&mut self, alias: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        self.bind(|instance| instance.parameter_mut(alias)?.set_untyped(value))
    }

    /// Reads a parameter as `T`; unset and null values read as `T::default()`
    pub fn get<T: FromValue + Default>(&self, alias: &str) -> Result<T> {
        self.parameter(alias)?.get()
    }

    /// Raw bound value; `None` while unset
    pub fn value(&self, alias: &str) -> Result<Option<&Value>> {
        Ok(self.parameter(alias)?.value())
    }

    /// The procedure's return value
    pub fn return_value<T: FromValue + Default>(&self) -> Result<T> {
        self.get(RETURN_VALUE)
    }

    /// Text of the `@MESSAGE_RESULT` output, when the procedure declares one
    pub fn message(&self) -> Option<String> {
        self.parameter(MESSAGE_RESULT)
            .ok()
            .and_then(|p| p.value())
            .filter(|v| !v.is_null())
            .and_then(|v| v.text().map(|text| text.into_owned()))
    }

    pub(crate) fn parameter_mut(&mut self, alias: &str) -> Result<&mut ParameterDefinition> {
        let idx = self.template.position(alias)?;
        Ok(&mut self.parameters[idx])
    }

    /// Runs a bind step, moving to Bound on success and Faulted on failure
    pub(crate) fn bind<T>(&mut self, step: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.ensure_usable()?;
        match step(self) {
            Ok(value) => {
                self.state = InstanceState::Bound;
                Ok(value)
            }
            Err(err) => {
                self.state = InstanceState::Faulted;
                Err(err)
            }
        }
    }

    fn ensure_usable(&self) -> Result<()> {
        if self.state.is_terminal() {
            return Err(ProcedureError::InstanceConsumed {
                procedure: self.name().to_string(),
                state: self.state,
            });
        }
        Ok(())
    }

    fn fault<T>(&mut self, result: Result<T>) -> Result<T> {
        if result.is_err() {
            self.state = InstanceState::Faulted;
        }
        result
    }

    /// Rejects a mode the procedure's flags do not allow, faulting the instance
    fn require(&mut self, mode: &'static str, supported: bool, reason: &'static str) -> Result<()> {
        self.ensure_usable()?;
        if supported {
            return Ok(());
        }
        self.state = InstanceState::Faulted;
        Err(ProcedureError::UnsupportedExecutionMode {
            procedure: self.name().to_string(),
            mode,
            reason,
        })
    }

    fn require_rows(&mut self, mode: &'static str) -> Result<()> {
        let non_query = self.template.flags().non_query;
        self.require(mode, !non_query, "non-query procedures return no rows")
    }

    fn require_list(&mut self, mode: &'static str) -> Result<()> {
        self.require_rows(mode)?;
        let single = self.template.flags().single_result;
        self.require(mode, !single, "procedure returns a single result")
    }

    fn require_single(&mut self, mode: &'static str) -> Result<()> {
        self.require_rows(mode)?;
        let single = self.template.flags().single_result;
        self.require(mode, single, "procedure does not return a single result")
    }

    /// Validates, issues the command, shapes the result with `finish` and
    /// only then writes back output parameters.
    ///
    /// Any failure faults the instance with no output applied.
    fn run<R>(
        &mut self,
        executor: &dyn CommandExecutor,
        kind: CommandKind,
        finish: impl FnOnce(&Self, CommandResult) -> Result<R>,
    ) -> Result<R> {
        self.ensure_usable()?;
        let result = self.run_inner(executor, kind, finish);
        let result = self.fault(result)?;
        self.state = InstanceState::Executed;
        Ok(result)
    }

    fn run_inner<R>(
        &mut self,
        executor: &dyn CommandExecutor,
        kind: CommandKind,
        finish: impl FnOnce(&Self, CommandResult) -> Result<R>,
    ) -> Result<R> {
        for parameter in &self.parameters {
            parameter.validate_for_execution()?;
        }

        let outcome = {
            let command = self.command(kind);
            debug!(
                "Executing {} ({:?}) with {} parameters",
                command.procedure_name,
                kind,
                command.parameters.len()
            );
            executor
                .execute(&command)
                .map_err(|source| ProcedureError::UpstreamExecutionFailure {
                    procedure: self.name().to_string(),
                    source,
                })?
        };

        let shaped = finish(self, outcome.result)?;
        self.write_back(outcome.output_values)?;
        Ok(shaped)
    }

    fn command(&self, kind: CommandKind) -> Command<'_> {
        let parameters = self
            .parameters
            .iter()
            .map(|p| CommandParameter {
                name: p.name(),
                direction: p.direction(),
                sql_db_type: p.sql_db_type(),
                size: p.max_length(),
                precision: p.precision(),
                scale: p.scale(),
                type_name: p.structured_type_name(),
                value: p.value(),
            })
            .collect();

        Command {
            procedure_name: self.template.name(),
            connection: self.template.connection(),
            kind,
            parameters,
        }
    }

    /// Applies reported outputs all-or-nothing
    fn write_back(&mut self, outputs: Vec<(String, Value)>) -> Result<()> {
        let mut prepared = Vec::with_capacity(outputs.len());
        for (name, value) in outputs {
            let idx = self.template.position(&name)?;
            let parameter = &self.parameters[idx];
            if !parameter.direction().returns_value() {
                continue;
            }
            if let Some(accepted) = parameter.prepare_output(value)? {
                prepared.push((idx, accepted));
            }
        }
        for (idx, value) in prepared {
            self.parameters[idx].store_output(value);
        }
        Ok(())
    }

    fn json_text(result: CommandResult) -> String {
        match result {
            CommandResult::Rows(rows) => rows
                .iter()
                .filter_map(|row| row.get(0).and_then(Value::text).map(|t| t.into_owned()))
                .collect(),
            CommandResult::Scalar(value) => value.text().map(|t| t.into_owned()).unwrap_or_default(),
            CommandResult::Void => String::new(),
        }
    }

    fn into_rows(result: CommandResult) -> ResultSet {
        match result {
            CommandResult::Rows(rows) => rows,
            CommandResult::Scalar(value) => ResultSet::new([""]).with_row(vec![value]),
            CommandResult::Void => ResultSet::default(),
        }
    }

    /// JSON text streamed by a JSON procedure: the first column of every row,
    /// concatenated
    pub fn execute_json(&mut self, executor: &dyn CommandExecutor) -> Result<String> {
        const MODE: &str = "execute_json";
        self.require_rows(MODE)?;
        let returns_json = self.template.flags().returns_json;
        self.require(MODE, returns_json, "procedure does not return JSON")?;

        self.run(executor, CommandKind::Reader, |_, result| Ok(Self::json_text(result)))
    }

    /// Tabular result; JSON procedures are parsed into rows and columns
    pub fn execute_result_set(&mut self, executor: &dyn CommandExecutor) -> Result<ResultSet> {
        self.require_rows("execute_result_set")?;
        self.run(executor, CommandKind::Reader, |instance, result| {
            if instance.template.flags().returns_json {
                ResultSet::from_json(&Self::json_text(result))
            } else {
                Ok(Self::into_rows(result))
            }
        })
    }

    /// Every row as a `T`
    pub fn execute_list<T>(&mut self, executor: &dyn CommandExecutor) -> Result<Vec<T>>
    where
        T: Record + DeserializeOwned,
    {
        self.require_list("execute_list")?;
        self.run(executor, CommandKind::Reader, Self::materialize_list::<T>)
    }

    /// The single row as a `T`; `None` unless exactly one row came back
    pub fn execute_single<T>(&mut self, executor: &dyn CommandExecutor) -> Result<Option<T>>
    where
        T: Record + DeserializeOwned,
    {
        self.require_single("execute_single")?;
        self.run(executor, CommandKind::Reader, Self::materialize_single::<T>)
    }

    /// Every row as a `T`, serialized as a JSON array
    pub fn execute_list_json<T>(&mut self, executor: &dyn CommandExecutor) -> Result<String>
    where
        T: Record + DeserializeOwned + Serialize,
    {
        self.require_list("execute_list_json")?;
        self.run(executor, CommandKind::Reader, |instance, result| {
            let items = instance.materialize_list::<T>(result)?;
            serde_json::to_string(&items).map_err(ProcedureError::from)
        })
    }

    /// The single row as a `T`, serialized as a JSON object (`null` when absent)
    pub fn execute_single_json<T>(&mut self, executor: &dyn CommandExecutor) -> Result<String>
    where
        T: Record + DeserializeOwned + Serialize,
    {
        self.require_single("execute_single_json")?;
        self.run(executor, CommandKind::Reader, |instance, result| {
            let item = instance.materialize_single::<T>(result)?;
            serde_json::to_string(&item).map_err(ProcedureError::from)
        })
    }

    /// Runs the procedure without reading rows
    pub fn execute_non_query(&mut self, executor: &dyn CommandExecutor) -> Result<()> {
        self.run(executor, CommandKind::NonQuery, |_, _| Ok(()))
    }

    fn materialize_list<T>(&self, result: CommandResult) -> Result<Vec<T>>
    where
        T: Record + DeserializeOwned,
    {
        if self.template.flags().returns_json {
            let text = Self::json_text(result);
            if text.trim().is_empty() {
                return Ok(Vec::new());
            }
            return serde_json::from_str::<Vec<T>>(&text).map_err(ProcedureError::from);
        }
        let rows = Self::into_rows(result);
        materialize::<T>(self.name(), &rows, self.snapshot.column_mappings())
    }

    fn materialize_single<T>(&self, result: CommandResult) -> Result<Option<T>>
    where
        T: Record + DeserializeOwned,
    {
        if self.template.flags().returns_json {
            let text = Self::json_text(result);
            if text.trim().is_empty() {
                return Ok(None);
            }
            return serde_json::from_str::<T>(&text)
                .map(Some)
                .map_err(ProcedureError::from);
        }
        let mut items = self.materialize_list::<T>(result)?;
        Ok(if items.len() == 1 { items.pop() } else { None })
    }

    /// Dry-run check of everything execution would validate
    pub fn validate(&self) -> Result<()> {
        self.parameters
            .iter()
            .try_for_each(ParameterDefinition::validate_for_execution)
    }
}
