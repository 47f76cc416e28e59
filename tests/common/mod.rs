//! Common test utilities for rust-sqlproc tests

#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::PathBuf;

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use rust_sqlproc::error::ExecutorError;
use rust_sqlproc::procedure::{Command, CommandKind, Row};
use rust_sqlproc::{
    load_catalog, Catalog, CommandExecutor, CommandOutcome, Field, LoadOptions, NativeType, Record,
    Value,
};

/// Path to a file under tests/fixtures
pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

/// Catalog loaded from the fixture catalog document and app.config
pub fn fixture_catalog() -> Catalog {
    load_catalog(&LoadOptions {
        catalog_path: fixture_path("catalog.json"),
        config_path: fixture_path("app.config"),
    })
    .expect("Failed to load fixture catalog")
}

/// What the executor saw for one command
#[derive(Debug, Clone)]
pub struct RecordedCommand {
    pub procedure: String,
    pub connection_string: String,
    pub kind: CommandKind,
    pub parameters: Vec<(String, Option<Value>)>,
}

impl RecordedCommand {
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.parameters
            .iter()
            .find(|(parameter, _)| parameter == name)
            .and_then(|(_, value)| value.as_ref())
    }
}

/// In-memory executor replaying scripted outcomes in order
#[derive(Default)]
pub struct ScriptedExecutor {
    responses: Mutex<VecDeque<Result<CommandOutcome, String>>>,
    calls: Mutex<Vec<RecordedCommand>>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful outcome
    pub fn respond(self, outcome: CommandOutcome) -> Self {
        self.responses.lock().push_back(Ok(outcome));
        self
    }

    /// Queue an upstream failure
    pub fn fail(self, message: &str) -> Self {
        self.responses.lock().push_back(Err(message.to_string()));
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn last_call(&self) -> Option<RecordedCommand> {
        self.calls.lock().last().cloned()
    }
}

impl CommandExecutor for ScriptedExecutor {
    fn execute(&self, command: &Command<'_>) -> Result<CommandOutcome, ExecutorError> {
        self.calls.lock().push(RecordedCommand {
            procedure: command.procedure_name.to_string(),
            connection_string: command.connection.connection_string.clone(),
            kind: command.kind,
            parameters: command
                .parameters
                .iter()
                .map(|p| (p.name.to_string(), p.value.cloned()))
                .collect(),
        });

        match self.responses.lock().pop_front() {
            Some(Ok(outcome)) => Ok(outcome),
            Some(Err(message)) => Err(message.into()),
            None => Ok(CommandOutcome::void()),
        }
    }
}

/// Person record matching the people procedures
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Person {
    pub person_id: i32,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
}

static PERSON_FIELDS: Lazy<Vec<Field<Person>>> = Lazy::new(|| {
    vec![
        Field::new(
            "PersonId",
            NativeType::Int32,
            |p: &Person| p.person_id.into(),
            |p: &mut Person, v: &Value| {
                p.person_id = v.to()?;
                Some(())
            },
        ),
        Field::new(
            "FirstName",
            NativeType::String,
            |p: &Person| p.first_name.clone().into(),
            |p: &mut Person, v: &Value| {
                p.first_name = v.to()?;
                Some(())
            },
        ),
        Field::new(
            "LastName",
            NativeType::String,
            |p: &Person| p.last_name.clone().into(),
            |p: &mut Person, v: &Value| {
                p.last_name = v.to()?;
                Some(())
            },
        ),
        Field::new(
            "Email",
            NativeType::String,
            |p: &Person| p.email.clone().into(),
            |p: &mut Person, v: &Value| {
                p.email = v.to()?;
                Some(())
            },
        ),
    ]
});

impl Record for Person {
    fn fields() -> &'static [Field<Self>] {
        &PERSON_FIELDS
    }
}

impl Person {
    pub fn new(person_id: i32, first_name: &str, last_name: &str) -> Self {
        Self {
            person_id,
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            email: None,
        }
    }
}

/// Record that maps the people list itself instead of by column name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PersonLabel {
    pub label: String,
}

impl Record for PersonLabel {
    fn fields() -> &'static [Field<Self>] {
        &[]
    }

    fn supports_map(procedure: &str) -> bool {
        procedure == "[open].[GET_PEOPLE]"
    }

    fn map_row(&mut self, _procedure: &str, row: &Row<'_>) -> rust_sqlproc::error::Result<()> {
        let first: String = row.get_by_name("FIRST_NAME").and_then(Value::to).unwrap_or_default();
        let last: String = row.get_by_name("LAST_NAME").and_then(Value::to).unwrap_or_default();
        self.label = format!("{}, {}", last, first);
        Ok(())
    }
}

/// Rows shaped like the GET_PEOPLE result
pub fn people_rows() -> rust_sqlproc::ResultSet {
    rust_sqlproc::ResultSet::new(["PERSON_ID", "FIRST_NAME", "LAST_NAME", "EMAIL", "ROW_VERSION"])
        .with_row(vec![
            Value::Int32(1),
            Value::from("Ada"),
            Value::from("Lovelace"),
            Value::Null,
            Value::Binary(vec![0, 1]),
        ])
        .with_row(vec![
            Value::Int32(2),
            Value::from("Grace"),
            Value::from("Hopper"),
            Value::from("grace@example.com"),
            Value::Binary(vec![0, 2]),
        ])
}

/// Rows streaming a JSON document in chunks, the way SQL Server splits FOR JSON output
pub fn json_rows(document: &str) -> rust_sqlproc::ResultSet {
    let mut rows = rust_sqlproc::ResultSet::new(["JSON_F52E2B61-18A1-11d1-B105-00805F49916B"]);
    let chars: Vec<char> = document.chars().collect();
    for chunk in chars.chunks(16) {
        rows.push_row(vec![Value::String(chunk.iter().collect())]);
    }
    rows
}
