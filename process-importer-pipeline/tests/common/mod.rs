//! Record builders and wiring shared by the pipeline scenario tests.

#![allow(dead_code)]

use chrono::DateTime;
use std::sync::Arc;

use process_importer_pipeline::{
    BatchWriter, ImportScheduler, RecordFetcher, RecordTransformer, SchedulerConfig, WriterConfig,
};
use process_importer_repository::{InMemoryIndex, InMemoryRecordSource};
use process_importer_shared::{
    ImportPair, IncidentValue, Intent, PartitionId, Position, ProcessDefinitionValue,
    ProcessInstanceValue, RawRecord, RecordPayload, RecordType, VariableValue,
};

pub const BASE_MILLIS: i64 = 1_700_000_000_000;

fn record(
    partition: u32,
    position: i64,
    key: i64,
    intent: Intent,
    payload: RecordPayload,
) -> RawRecord {
    RawRecord {
        partition_id: PartitionId(partition),
        position: Position(position),
        key,
        record_type: payload.record_type(),
        intent,
        timestamp: DateTime::from_timestamp_millis(BASE_MILLIS + position * 1000)
            .expect("valid timestamp"),
        payload,
    }
}

pub fn definition(partition: u32, position: i64, intent: Intent, key: i64) -> RawRecord {
    record(
        partition,
        position,
        key,
        intent,
        RecordPayload::ProcessDefinition(ProcessDefinitionValue {
            process_definition_key: key,
            bpmn_process_id: "order".to_string(),
            version: 1,
            resource_name: "order.bpmn".to_string(),
            tenant_id: "<default>".to_string(),
        }),
    )
}

pub fn instance(partition: u32, position: i64, intent: Intent, instance_key: i64) -> RawRecord {
    record(
        partition,
        position,
        instance_key,
        intent,
        RecordPayload::ProcessInstance(ProcessInstanceValue {
            process_instance_key: instance_key,
            process_definition_key: 400,
            bpmn_process_id: "order".to_string(),
            version: 1,
            element_id: "order".to_string(),
            bpmn_element_type: "PROCESS".to_string(),
            parent_process_instance_key: -1,
            tenant_id: "<default>".to_string(),
        }),
    )
}

pub fn incident(partition: u32, position: i64, intent: Intent, incident_key: i64) -> RawRecord {
    record(
        partition,
        position,
        incident_key,
        intent,
        RecordPayload::Incident(IncidentValue {
            process_instance_key: 500,
            process_definition_key: 400,
            bpmn_process_id: "order".to_string(),
            element_id: "charge".to_string(),
            element_instance_key: 501,
            error_type: "JOB_NO_RETRIES".to_string(),
            error_message: "payment service unavailable".to_string(),
            tenant_id: "<default>".to_string(),
        }),
    )
}

pub fn variable(partition: u32, position: i64, intent: Intent, name: &str, value: &str) -> RawRecord {
    record(
        partition,
        position,
        position,
        intent,
        RecordPayload::Variable(VariableValue {
            name: name.to_string(),
            value: value.to_string(),
            scope_key: 500,
            process_instance_key: 500,
            process_definition_key: 400,
            bpmn_process_id: "order".to_string(),
            tenant_id: "<default>".to_string(),
        }),
    )
}

pub fn source_with(records: &[RawRecord]) -> Arc<InMemoryRecordSource> {
    let source = Arc::new(InMemoryRecordSource::new());
    for record in records {
        source.push(record);
    }
    source
}

pub fn scheduler_config(batch_size: usize) -> SchedulerConfig {
    SchedulerConfig {
        batch_size,
        poll_interval_ms: 100,
        initial_backoff_ms: 100,
        max_backoff_ms: 1000,
    }
}

pub fn writer(index: Arc<InMemoryIndex>) -> BatchWriter {
    BatchWriter::with_config(
        index,
        WriterConfig {
            max_retries: 2,
            initial_retry_delay_ms: 10,
            max_retry_delay_ms: 50,
        },
    )
}

pub fn scheduler(
    pair: ImportPair,
    source: Arc<InMemoryRecordSource>,
    index: Arc<InMemoryIndex>,
    batch_size: usize,
) -> ImportScheduler {
    ImportScheduler::new(
        pair,
        Arc::new(RecordFetcher::new(source)),
        Arc::new(RecordTransformer::new()),
        Arc::new(writer(index.clone())),
        index,
        scheduler_config(batch_size),
    )
}

/// Run cycles until the pair reports an empty page.
pub async fn drain(scheduler: &ImportScheduler) {
    use process_importer_pipeline::CycleOutcome;

    for _ in 0..100 {
        match scheduler.run_cycle().await {
            Ok(CycleOutcome::Empty) => return,
            Ok(_) => continue,
            Err(e) => panic!("import cycle failed: {}", e),
        }
    }
    panic!("pair did not drain");
}
