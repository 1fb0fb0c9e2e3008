//! TALLY Test Utilities
//!
//! Shared test infrastructure for the TALLY workspace:
//! - Proptest generators for filters, requests and records
//! - Fixtures for the built-in object types (leads, clients, invoices)
//! - Assertions on error kinds
//! - Tracing initialization for tests

pub use tally_core::{
    AggregateFunction, AggregationSpec, ColumnConfig, EngineConfig, ErrorKind, FieldDataType,
    FieldDefinition, FilterCondition, FilterOp, ListRequest, ObjectDefinition, ObjectSchema,
    Operator, Record, Report, SortConfig, SortDirection, TallyError, TallyResult, TenantId,
    Timestamp,
};

use serde_json::Value;
use tracing_subscriber::EnvFilter;

/// Install a test-friendly `tracing` subscriber once per process.
///
/// Honors `RUST_LOG`; defaults to debug output for the TALLY crates.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("tally_query=debug,tally_storage=debug,warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

/// Turn a JSON object literal into a [`Record`]. Panics on non-objects.
#[track_caller]
pub fn record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        other => panic!("record fixture must be a JSON object, got {other}"),
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for TALLY types.

    use super::*;
    use proptest::prelude::*;
    use serde_json::json;
    use uuid::Uuid;

    pub fn arb_tenant_id() -> impl Strategy<Value = TenantId> {
        any::<[u8; 16]>().prop_map(Uuid::from_bytes)
    }

    /// Timestamps between 2020 and 2030.
    pub fn arb_timestamp() -> impl Strategy<Value = Timestamp> {
        (1577836800i64..1893456000i64).prop_map(|secs| {
            chrono::DateTime::from_timestamp(secs, 0).unwrap_or_else(chrono::Utc::now)
        })
    }

    pub fn arb_operator() -> impl Strategy<Value = Operator> {
        proptest::sample::select(Operator::ALL.to_vec())
    }

    pub fn arb_sort_direction() -> impl Strategy<Value = SortDirection> {
        prop_oneof![Just(SortDirection::Asc), Just(SortDirection::Desc)]
    }

    pub fn arb_aggregate_function() -> impl Strategy<Value = AggregateFunction> {
        prop_oneof![
            Just(AggregateFunction::Count),
            Just(AggregateFunction::Sum),
            Just(AggregateFunction::Avg),
            Just(AggregateFunction::Min),
            Just(AggregateFunction::Max),
        ]
    }

    pub const LEAD_STATUSES: [&str; 4] = ["new", "contacted", "qualified", "lost"];

    /// A record shaped like [`fixtures::leads_schema`], with nulls mixed in.
    pub fn arb_lead_record() -> impl Strategy<Value = Record> {
        (
            "[a-z0-9]{8}",
            prop::option::of("[A-Za-z ]{1,16}"),
            prop::option::of(proptest::sample::select(LEAD_STATUSES.to_vec())),
            prop::option::of(0u32..100_000),
            arb_timestamp(),
        )
            .prop_map(|(id, name, status, value, created_at)| {
                record(json!({
                    "id": id,
                    "name": name,
                    "status": status,
                    "value": value,
                    "created_at": created_at.to_rfc3339(),
                }))
            })
    }

    /// A condition that validates against [`fixtures::leads_schema`].
    pub fn arb_lead_filter() -> impl Strategy<Value = FilterCondition> {
        let status = || proptest::sample::select(LEAD_STATUSES.to_vec());
        prop_oneof![
            status().prop_map(|s| FilterCondition::new("status", FilterOp::Equals(json!(s)))),
            status().prop_map(|s| FilterCondition::new("status", FilterOp::NotEquals(json!(s)))),
            prop::collection::vec(status(), 1..3).prop_map(|v| {
                FilterCondition::new("status", FilterOp::In(v.into_iter().map(Value::from).collect()))
            }),
            (0u32..100_000).prop_map(|n| FilterCondition::new("value", FilterOp::GreaterThan(json!(n)))),
            (0u32..50_000, 50_000u32..100_000).prop_map(|(lo, hi)| {
                FilterCondition::new("value", FilterOp::Between(json!(lo), json!(hi)))
            }),
            "[a-z]{1,3}".prop_map(|s| FilterCondition::new("name", FilterOp::Contains(s))),
            Just(FilterCondition::new("name", FilterOp::IsNull)),
            Just(FilterCondition::new("value", FilterOp::IsNotNull)),
            Just(FilterCondition::new("created_at", FilterOp::ThisQuarter)),
            (1u32..400).prop_map(|n| FilterCondition::new("created_at", FilterOp::LastNDays(n))),
        ]
    }

    /// A paginated, sorted request over the leads fixture.
    pub fn arb_lead_request() -> impl Strategy<Value = ListRequest> {
        (
            prop::collection::vec(arb_lead_filter(), 0..4),
            proptest::sample::select(vec!["name", "status", "value", "created_at"]),
            arb_sort_direction(),
            1i64..8,
            1i64..30,
        )
            .prop_map(|(filters, field, direction, page, page_size)| {
                let mut request = ListRequest::new()
                    .with_sort(SortConfig::new(field, direction))
                    .with_page(page, page_size);
                request.filters = filters;
                request
            })
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Schemas, records and reports for the built-in object types.

    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use uuid::Uuid;

    /// Sunday 2026-10-18 12:00 UTC. The week runs from Monday 2026-10-12.
    pub fn fixed_now() -> Timestamp {
        Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0)
            .single()
            .unwrap_or_else(Utc::now)
    }

    fn object(api_name: &str, label: &str, plural: &str) -> ObjectDefinition {
        ObjectDefinition {
            api_name: api_name.to_string(),
            label: label.to_string(),
            plural_label: plural.to_string(),
        }
    }

    fn system_fields(mut fields: Vec<FieldDefinition>) -> Vec<FieldDefinition> {
        fields.insert(0, FieldDefinition::new("id", "ID", FieldDataType::Text).hidden());
        fields.push(FieldDefinition::new("owner_id", "Owner", FieldDataType::Reference));
        fields.push(FieldDefinition::new("created_at", "Created", FieldDataType::Datetime));
        fields.push(FieldDefinition::new("updated_at", "Updated", FieldDataType::Datetime));
        fields
    }

    pub fn leads_schema() -> ObjectSchema {
        ObjectSchema::new(
            object("leads", "Lead", "Leads"),
            system_fields(vec![
                FieldDefinition::new("name", "Name", FieldDataType::Text),
                FieldDefinition::new("email", "Email", FieldDataType::Email),
                FieldDefinition::new("company", "Company", FieldDataType::Text),
                FieldDefinition::new("status", "Status", FieldDataType::Select),
                FieldDefinition::new("value", "Value", FieldDataType::Currency),
            ]),
        )
    }

    pub fn clients_schema() -> ObjectSchema {
        ObjectSchema::new(
            object("clients", "Client", "Clients"),
            system_fields(vec![
                FieldDefinition::new("name", "Name", FieldDataType::Text),
                FieldDefinition::new("industry", "Industry", FieldDataType::Select),
                FieldDefinition::new("website", "Website", FieldDataType::Url),
                FieldDefinition::new("phone", "Phone", FieldDataType::Phone),
                FieldDefinition::new("active", "Active", FieldDataType::Boolean),
                FieldDefinition::new("annual_revenue", "Annual Revenue", FieldDataType::Currency),
                FieldDefinition::new("notes", "Notes", FieldDataType::Textarea),
                FieldDefinition::new("since", "Client Since", FieldDataType::Date),
            ]),
        )
    }

    pub fn invoices_schema() -> ObjectSchema {
        ObjectSchema::new(
            object("invoices", "Invoice", "Invoices"),
            system_fields(vec![
                FieldDefinition::new("number", "Number", FieldDataType::Text),
                FieldDefinition::new("client_id", "Client", FieldDataType::Reference),
                FieldDefinition::new("status", "Status", FieldDataType::Select),
                FieldDefinition::new("amount", "Amount", FieldDataType::Currency),
                FieldDefinition::new("due_date", "Due", FieldDataType::Date),
            ]),
        )
    }

    /// Six leads spread across this week, this month and last quarter.
    pub fn sample_leads() -> Vec<Record> {
        vec![
            record(json!({"id": "L1", "name": "Ada Park", "email": "ada@acme.io", "company": "Acme", "status": "new", "value": 1200, "owner_id": "u1", "created_at": "2026-10-17T09:00:00Z"})),
            record(json!({"id": "L2", "name": "Ben Ortiz", "email": null, "company": "Globex", "status": "qualified", "value": 5400, "owner_id": "u2", "created_at": "2026-10-02T14:30:00Z"})),
            record(json!({"id": "L3", "name": "Cleo Tan", "email": "cleo@initech.com", "company": "Initech", "status": "contacted", "value": null, "owner_id": "u1", "created_at": "2026-09-20T08:00:00Z"})),
            record(json!({"id": "L4", "name": "Dev Acker", "email": "dev@acme.io", "company": "Acme", "status": "lost", "value": 300, "owner_id": null, "created_at": "2026-10-13T00:00:00Z"})),
            record(json!({"id": "L5", "name": "Eve Moss", "email": "eve@hooli.com", "company": "Hooli", "status": "new", "value": 800, "owner_id": "u2", "created_at": "2026-07-01T00:00:00Z"})),
            record(json!({"id": "L6", "name": "Finn Roe", "company": "Umbrella", "status": "qualified", "value": 2500, "owner_id": "u1", "created_at": "2026-10-18T11:00:00Z"})),
        ]
    }

    pub fn sample_invoices() -> Vec<Record> {
        vec![
            record(json!({"id": "I1", "number": "INV-001", "client_id": "C1", "status": "open", "amount": 1000, "owner_id": "u1", "due_date": "2026-11-01", "created_at": "2026-10-01T10:00:00Z"})),
            record(json!({"id": "I2", "number": "INV-002", "client_id": "C2", "status": "open", "amount": 250.5, "owner_id": "u2", "due_date": "2026-10-20", "created_at": "2026-10-05T10:00:00Z"})),
            record(json!({"id": "I3", "number": "INV-003", "client_id": "C1", "status": "paid", "amount": 4000, "owner_id": "u1", "due_date": "2026-09-15", "created_at": "2026-09-01T10:00:00Z"})),
            record(json!({"id": "I4", "number": "INV-004", "client_id": "C3", "status": "open", "amount": null, "owner_id": "u1", "due_date": null, "created_at": "2026-10-10T10:00:00Z"})),
            record(json!({"id": "I5", "number": "INV-005", "client_id": "C2", "status": "open", "amount": 75, "owner_id": "u1", "due_date": "2026-10-30", "created_at": "2026-10-12T10:00:00Z"})),
        ]
    }

    /// Open invoices summed per owner.
    pub fn open_invoices_by_owner() -> Report {
        let mut report = Report::new(Uuid::nil(), "Open invoices by owner", "invoices");
        report.filters = vec![FilterCondition::new("status", FilterOp::Equals(json!("open")))];
        report.groupings = vec!["owner_id".to_string()];
        report.aggregations = vec![AggregationSpec::new("amount", AggregateFunction::Sum, "Total")];
        report
    }

    /// Config with a short storage timeout for failure-path tests.
    pub fn fast_config() -> EngineConfig {
        EngineConfig {
            storage_timeout: std::time::Duration::from_millis(50),
            ..EngineConfig::default()
        }
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions on TALLY results.

    use super::*;

    /// Assert that a TallyResult failed with the given kind.
    #[track_caller]
    pub fn assert_error_kind<T: std::fmt::Debug>(result: &TallyResult<T>, kind: ErrorKind) {
        match result {
            Err(e) if e.kind() == kind => {}
            other => panic!("Expected {kind:?} error, got: {other:?}"),
        }
    }

    /// Assert a validation failure that names `field` in its message.
    #[track_caller]
    pub fn assert_rejects_field<T: std::fmt::Debug>(result: &TallyResult<T>, field: &str) {
        match result {
            Err(e) if e.is_validation() && e.to_string().contains(field) => {}
            other => panic!("Expected validation error naming {field}, got: {other:?}"),
        }
    }

    #[track_caller]
    pub fn assert_not_found<T: std::fmt::Debug>(result: &TallyResult<T>) {
        assert_error_kind(result, ErrorKind::NotFound);
    }
}
