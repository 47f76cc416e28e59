//! Integration tests for execution gating, state transitions and output write-back

use pretty_assertions::assert_eq;

use rust_sqlproc::procedure::{CommandKind, RETURN_VALUE};
use rust_sqlproc::{CommandOutcome, InstanceState, ProcedureError, ResultSet, Value};

use crate::common::{fixture_catalog, json_rows, people_rows, Person, ScriptedExecutor};

fn bound_post_person(catalog: &rust_sqlproc::Catalog) -> rust_sqlproc::ProcedureInstance {
    let mut instance = catalog.procedure("open.POST_PERSON").unwrap();
    instance
        .load_from_json(r#"{ "firstName": "Ada", "lastName": "Lovelace" }"#)
        .unwrap();
    instance
}

// ============================================================================
// Gating Tests
// ============================================================================

#[test]
fn test_list_mode_rejected_for_single_result_procedure() {
    let catalog = fixture_catalog();
    let executor = ScriptedExecutor::new();
    let mut instance = bound_post_person(&catalog);

    let err = instance.execute_list::<Person>(&executor).unwrap_err();
    assert!(matches!(
        err,
        ProcedureError::UnsupportedExecutionMode { mode: "execute_list", .. }
    ));
    assert_eq!(executor.call_count(), 0);
    assert_eq!(instance.state(), InstanceState::Faulted);
}

#[test]
fn test_single_mode_rejected_for_list_procedure() {
    let catalog = fixture_catalog();
    let executor = ScriptedExecutor::new();
    let mut instance = catalog.procedure("open.GET_PEOPLE").unwrap();

    let err = instance.execute_single::<Person>(&executor).unwrap_err();
    assert!(matches!(err, ProcedureError::UnsupportedExecutionMode { .. }));
    assert_eq!(executor.call_count(), 0);
}

#[test]
fn test_row_modes_rejected_for_non_query_procedure() {
    let catalog = fixture_catalog();
    let executor = ScriptedExecutor::new();

    let mut instance = catalog.procedure("CLEAR_DATA").unwrap();
    assert!(matches!(
        instance.execute_result_set(&executor),
        Err(ProcedureError::UnsupportedExecutionMode { .. })
    ));

    let mut instance = catalog.procedure("CLEAR_DATA").unwrap();
    assert!(matches!(
        instance.execute_list::<Person>(&executor),
        Err(ProcedureError::UnsupportedExecutionMode { .. })
    ));

    assert_eq!(executor.call_count(), 0);
}

#[test]
fn test_json_mode_rejected_for_tabular_procedure() {
    let catalog = fixture_catalog();
    let executor = ScriptedExecutor::new();
    let mut instance = catalog.procedure("open.GET_PEOPLE").unwrap();

    let err = instance.execute_json(&executor).unwrap_err();
    assert!(matches!(
        err,
        ProcedureError::UnsupportedExecutionMode { mode: "execute_json", .. }
    ));
    assert_eq!(executor.call_count(), 0);
}

#[test]
fn test_missing_required_input_is_rejected_before_execution() {
    let catalog = fixture_catalog();
    let executor = ScriptedExecutor::new().respond(CommandOutcome::rows(people_rows()));
    let mut instance = catalog.procedure("open.GET_PERSON").unwrap();

    let err = instance.execute_single::<Person>(&executor).unwrap_err();
    assert!(matches!(err, ProcedureError::NullConstraintViolation { ref name } if name == "@PERSON_ID"));
    assert_eq!(executor.call_count(), 0);
    assert_eq!(instance.state(), InstanceState::Faulted);
}

// ============================================================================
// State Tests
// ============================================================================

#[test]
fn test_instance_is_single_use() {
    let catalog = fixture_catalog();
    let executor = ScriptedExecutor::new();
    let mut instance = catalog.procedure("CLEAR_DATA").unwrap();
    assert_eq!(instance.state(), InstanceState::Unbound);

    instance.execute_non_query(&executor).unwrap();
    assert_eq!(instance.state(), InstanceState::Executed);

    let err = instance.execute_non_query(&executor).unwrap_err();
    assert!(matches!(
        err,
        ProcedureError::InstanceConsumed {
            state: InstanceState::Executed,
            ..
        }
    ));
    assert_eq!(executor.call_count(), 1);

    // Reads stay available after execution
    assert_eq!(instance.return_value::<i32>().unwrap(), 0);
}

#[test]
fn test_upstream_failure_faults_instance() {
    let catalog = fixture_catalog();
    let executor = ScriptedExecutor::new().fail("connection reset");
    let mut instance = catalog.procedure("CLEAR_DATA").unwrap();

    let err = instance.execute_non_query(&executor).unwrap_err();
    match &err {
        ProcedureError::UpstreamExecutionFailure { procedure, source } => {
            assert_eq!(procedure, "[dbo].[CLEAR_DATA]");
            assert_eq!(source.to_string(), "connection reset");
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(instance.state(), InstanceState::Faulted);
    assert_eq!(executor.call_count(), 1);
}

// ============================================================================
// Command Tests
// ============================================================================

#[test]
fn test_command_carries_every_parameter() {
    let catalog = fixture_catalog();
    let executor = ScriptedExecutor::new();
    let mut instance = catalog.procedure("open.PUT_ORDER_ITEM").unwrap();
    instance
        .load_from_query([("orderItemId", "5"), ("quantity", "2")])
        .unwrap();

    instance.execute_non_query(&executor).unwrap();

    let call = executor.last_call().unwrap();
    assert_eq!(call.procedure, "[open].[PUT_ORDER_ITEM]");
    assert_eq!(call.kind, CommandKind::NonQuery);
    assert_eq!(
        call.connection_string,
        "Server=localhost;Database=sample;User Id=open_user"
    );

    let names: Vec<&str> = call.parameters.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(
        names,
        vec![RETURN_VALUE, "@ORDER_ITEM_ID", "@QUANTITY", "@UNIT_PRICE"]
    );
    assert_eq!(call.value("@ORDER_ITEM_ID"), Some(&Value::Int32(5)));
    assert_eq!(call.value("@QUANTITY"), Some(&Value::Int32(2)));
    assert_eq!(call.value("@UNIT_PRICE"), None);
}

#[test]
fn test_always_encrypted_command_connection() {
    let catalog = fixture_catalog();
    let executor = ScriptedExecutor::new().respond(CommandOutcome::rows(ResultSet::new(["ACCOUNT_ID"])));
    let mut instance = catalog.procedure("trusted.GET_ACCOUNT").unwrap();
    instance
        .set_untyped("accountId", "0f8fad5b-d9cb-469f-a165-70867728950e")
        .unwrap();

    let result = instance.execute_result_set(&executor).unwrap();
    assert!(result.is_empty());

    let call = executor.last_call().unwrap();
    assert_eq!(call.kind, CommandKind::Reader);
    assert!(call
        .connection_string
        .ends_with(";Column Encryption Setting=enabled"));
}

// ============================================================================
// Output Write-Back Tests
// ============================================================================

#[test]
fn test_outputs_written_back_after_execution() {
    let catalog = fixture_catalog();
    let row = ResultSet::new(["PERSON_ID", "FIRST_NAME", "LAST_NAME"]).with_row(vec![
        Value::Int32(42),
        Value::from("Ada"),
        Value::from("Lovelace"),
    ]);
    let executor = ScriptedExecutor::new().respond(
        CommandOutcome::rows(row)
            .with_output("@PERSON_ID", 42)
            .with_output("@MESSAGE_RESULT", "Person created")
            .with_output(RETURN_VALUE, 1),
    );
    let mut instance = bound_post_person(&catalog);

    let person = instance.execute_single::<Person>(&executor).unwrap();
    assert_eq!(person, Some(Person::new(42, "Ada", "Lovelace")));

    assert_eq!(instance.get::<i32>("personId").unwrap(), 42);
    assert_eq!(instance.message(), Some("Person created".to_string()));
    assert_eq!(instance.return_value::<i32>().unwrap(), 1);
    assert_eq!(instance.state(), InstanceState::Executed);
}

#[test]
fn test_null_outputs_leave_parameters_unset() {
    let catalog = fixture_catalog();
    let executor = ScriptedExecutor::new().respond(
        CommandOutcome::void()
            .with_output("@ORDER_ID", Value::Null)
            .with_output(RETURN_VALUE, 0),
    );
    let mut instance = catalog.procedure("open.POST_ORDER").unwrap();
    instance.set("personId", 1).unwrap();

    instance.execute_non_query(&executor).unwrap();
    assert_eq!(instance.value("orderId").unwrap(), None);
    assert_eq!(instance.value(RETURN_VALUE).unwrap(), Some(&Value::Int32(0)));
}

#[test]
fn test_outputs_for_input_parameters_are_ignored() {
    let catalog = fixture_catalog();
    let executor = ScriptedExecutor::new().respond(
        CommandOutcome::void()
            .with_output("@PERSON_ID", 999)
            .with_output("@ORDER_ID", 7),
    );
    let mut instance = catalog.procedure("open.POST_ORDER").unwrap();
    instance.set("personId", 1).unwrap();

    instance.execute_non_query(&executor).unwrap();
    assert_eq!(instance.get::<i32>("personId").unwrap(), 1);
    assert_eq!(instance.get::<i32>("orderId").unwrap(), 7);
}

#[test]
fn test_write_back_is_all_or_nothing() {
    let catalog = fixture_catalog();
    let executor = ScriptedExecutor::new().respond(
        CommandOutcome::void()
            .with_output("@MESSAGE_RESULT", "Person created")
            .with_output("@PERSON_ID", "not a number"),
    );
    let mut instance = bound_post_person(&catalog);

    let err = instance.execute_non_query(&executor).unwrap_err();
    assert!(matches!(err, ProcedureError::TypeMismatch { ref name, .. } if name == "@PERSON_ID"));
    assert_eq!(instance.state(), InstanceState::Faulted);
    assert_eq!(instance.message(), None);
    assert_eq!(instance.value("personId").unwrap(), None);
}

#[test]
fn test_input_output_write_back_runs_full_validation() {
    let catalog = fixture_catalog();
    let executor = ScriptedExecutor::new().respond(
        CommandOutcome::void()
            .with_output("@PERSON_ID", 7)
            .with_output("@MESSAGE_RESULT", "x".repeat(201)),
    );
    let mut instance = bound_post_person(&catalog);

    let err = instance.execute_non_query(&executor).unwrap_err();
    assert!(matches!(err, ProcedureError::LengthViolation { ref name, .. } if name == "@MESSAGE_RESULT"));
    assert_eq!(instance.value("personId").unwrap(), None);
}

#[test]
fn test_outputs_not_applied_when_json_result_is_invalid() {
    let catalog = fixture_catalog();
    let executor = ScriptedExecutor::new().respond(
        CommandOutcome::rows(json_rows("{\"personId\":")).with_output(RETURN_VALUE, 3),
    );
    let mut instance = catalog.procedure("open.GET_PERSON_JSON").unwrap();
    instance.set("personId", 1).unwrap();

    let err = instance.execute_single::<Person>(&executor).unwrap_err();
    assert!(matches!(err, ProcedureError::InvalidJson { .. }));
    assert_eq!(instance.state(), InstanceState::Faulted);
    assert_eq!(instance.value(RETURN_VALUE).unwrap(), None);
}

#[test]
fn test_outputs_not_applied_when_rows_fail_to_materialize() {
    let catalog = fixture_catalog();
    let rows = ResultSet::new(["PERSON_ID"]).with_row(vec![Value::from("first")]);
    let executor = ScriptedExecutor::new().respond(
        CommandOutcome::rows(rows)
            .with_output("@PERSON_ID", 42)
            .with_output("@MESSAGE_RESULT", "Person created"),
    );
    let mut instance = bound_post_person(&catalog);

    let err = instance.execute_single_json::<Person>(&executor).unwrap_err();
    assert!(matches!(err, ProcedureError::TypeMismatch { ref name, .. } if name == "PERSON_ID"));
    assert_eq!(instance.state(), InstanceState::Faulted);
    assert_eq!(instance.value("personId").unwrap(), None);
    assert_eq!(instance.message(), None);
}

#[test]
fn test_unknown_output_name_is_an_error() {
    let catalog = fixture_catalog();
    let executor =
        ScriptedExecutor::new().respond(CommandOutcome::void().with_output("@AUDIT_ID", 3));
    let mut instance = catalog.procedure("CLEAR_DATA").unwrap();

    let err = instance.execute_non_query(&executor).unwrap_err();
    assert!(matches!(err, ProcedureError::UnknownParameter { ref name, .. } if name == "@AUDIT_ID"));
    assert_eq!(instance.state(), InstanceState::Faulted);
}

#[test]
fn test_output_values_are_converted_to_parameter_type() {
    let catalog = fixture_catalog();
    let executor = ScriptedExecutor::new().respond(
        CommandOutcome::void()
            .with_output("@PERSON_ID", "42")
            .with_output(RETURN_VALUE, 0i64),
    );
    let mut instance = bound_post_person(&catalog);

    instance.execute_non_query(&executor).unwrap();
    assert_eq!(instance.value("personId").unwrap(), Some(&Value::Int32(42)));
    assert_eq!(instance.value(RETURN_VALUE).unwrap(), Some(&Value::Int32(0)));
}

// ============================================================================
// Result Tests
// ============================================================================

#[test]
fn test_execute_json_concatenates_chunks() {
    let catalog = fixture_catalog();
    let document = r#"[{"personId":1,"firstName":"Ada","lastName":"Lovelace"},{"personId":2,"firstName":"Grace","lastName":"Hopper"}]"#;
    let executor = ScriptedExecutor::new().respond(CommandOutcome::rows(json_rows(document)));
    let mut instance = catalog.procedure("open.GET_PEOPLE_JSON").unwrap();

    let text = instance.execute_json(&executor).unwrap();
    assert_eq!(text, document);
    assert_eq!(executor.last_call().unwrap().kind, CommandKind::Reader);
}

#[test]
fn test_execute_json_with_no_rows() {
    let catalog = fixture_catalog();
    let executor = ScriptedExecutor::new().respond(CommandOutcome::rows(json_rows("")));
    let mut instance = catalog.procedure("open.GET_PEOPLE_JSON").unwrap();

    assert_eq!(instance.execute_json(&executor).unwrap(), "");
}

#[test]
fn test_execute_result_set_tabular() {
    let catalog = fixture_catalog();
    let executor = ScriptedExecutor::new().respond(CommandOutcome::rows(people_rows()));
    let mut instance = catalog.procedure("open.GET_PEOPLE").unwrap();

    let result = instance.execute_result_set(&executor).unwrap();
    assert_eq!(result, people_rows());
}

#[test]
fn test_execute_result_set_parses_json() {
    let catalog = fixture_catalog();
    let document = r#"[{"personId":1,"firstName":"Ada"},{"personId":2,"lastName":"Hopper"}]"#;
    let executor = ScriptedExecutor::new().respond(CommandOutcome::rows(json_rows(document)));
    let mut instance = catalog.procedure("open.GET_PEOPLE_JSON").unwrap();

    let result = instance.execute_result_set(&executor).unwrap();
    assert_eq!(result.columns(), &["personId", "firstName", "lastName"]);
    assert_eq!(result.len(), 2);

    let second = result.row(1).unwrap();
    assert_eq!(second.get_by_name("personId"), Some(&Value::Int64(2)));
    assert!(second.is_null(1));
    assert_eq!(second.get(2), Some(&Value::from("Hopper")));
}

#[test]
fn test_execute_result_set_invalid_json_faults() {
    let catalog = fixture_catalog();
    let executor = ScriptedExecutor::new().respond(CommandOutcome::rows(json_rows("[1, 2]")));
    let mut instance = catalog.procedure("open.GET_PEOPLE_JSON").unwrap();

    let err = instance.execute_result_set(&executor).unwrap_err();
    assert!(matches!(err, ProcedureError::InvalidJson { .. }));
    assert_eq!(instance.state(), InstanceState::Faulted);
}

#[test]
fn test_execute_result_set_from_scalar() {
    let catalog = fixture_catalog();
    let executor = ScriptedExecutor::new().respond(CommandOutcome::scalar(17));
    let mut instance = catalog.procedure("open.GET_PEOPLE").unwrap();

    let result = instance.execute_result_set(&executor).unwrap();
    assert_eq!(result.len(), 1);
    assert_eq!(result.row(0).unwrap().get(0), Some(&Value::Int32(17)));
}
