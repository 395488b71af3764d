use std::io::Write as _;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::FutureExt;
use serde_json::{json, Value};
use tempfile::NamedTempFile;

use gwadm::batch::{self, BatchConfig, BatchOp, ResultSink, WorkUnit};
use gwadm::bind::ValueMap;
use gwadm::commands::delegates;
use gwadm::error::Error;
use gwadm::flags::{FlagValue, Verb};
use gwadm::output::{Format, OutputConfig, StreamEncoder};
use gwadm::retry::RetryConfig;

/// Writer that appends into a shared buffer so tests can inspect the stream
#[derive(Clone)]
struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl std::io::Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }
    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

fn fast_config(threads: usize) -> BatchConfig {
    BatchConfig {
        threads,
        pacing: Duration::ZERO,
        retry: RetryConfig {
            max_attempts: 3,
            initial_backoff_ms: 1,
            backoff_factor: 2.0,
            max_backoff_ms: 10,
            add_jitter: false,
        },
    }
}

/// Echoes the bound row back as the result record; rows whose delegate is
/// `denied@x` fail with a terminal 403
fn echo_op() -> BatchOp {
    Arc::new(|values: ValueMap| {
        async move {
            let user = values.str_value("userId").unwrap_or_default().to_string();
            let delegate = values
                .str_value("delegateEmail")
                .unwrap_or_default()
                .to_string();
            if delegate == "denied@x" {
                return Err(Error::Upstream {
                    status: 403,
                    message: "forbidden".to_string(),
                });
            }
            Ok(json!({ "userId": user, "delegateEmail": delegate }))
        }
        .boxed()
    })
}

fn csv_file(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

fn stream_sink() -> (ResultSink, Arc<Mutex<Vec<u8>>>) {
    let buf = Arc::new(Mutex::new(Vec::new()));
    let cfg = OutputConfig {
        format: Format::Json,
        compress: true,
        stream: true,
    };
    let encoder = StreamEncoder::to_writer(cfg, Box::new(SharedBuf(Arc::clone(&buf))));
    (ResultSink::Streaming(Arc::new(encoder)), buf)
}

fn parse_lines(buf: &Arc<Mutex<Vec<u8>>>) -> Vec<Value> {
    let bytes = buf.lock().unwrap().clone();
    String::from_utf8(bytes)
        .unwrap()
        .lines()
        .filter(|l| !l.is_empty())
        .map(|l| serde_json::from_str(l).unwrap())
        .collect()
}

#[tokio::test]
async fn two_rows_over_one_worker_produce_two_records() {
    let file = csv_file("userId,delegateEmail\nalice@x,bob@x\nalice@x,carol@x\n");
    let (sink, buf) = stream_sink();

    let count = batch::run_csv_batch(
        file.path(),
        b',',
        &delegates::CATALOG,
        Verb::Insert,
        fast_config(1),
        echo_op(),
        sink,
    )
    .await
    .unwrap();

    assert_eq!(count, 2);
    let records = parse_lines(&buf);
    let mut delegates: Vec<String> = records
        .iter()
        .map(|r| r["delegateEmail"].as_str().unwrap().to_string())
        .collect();
    delegates.sort();
    assert_eq!(delegates, vec!["bob@x", "carol@x"]);
}

#[tokio::test]
async fn terminal_error_row_is_dropped_and_processing_continues() {
    let file = csv_file(
        "userId,delegateEmail\nalice@x,bob@x\nalice@x,denied@x\nalice@x,carol@x\n",
    );
    let (sink, buf) = stream_sink();

    let count = batch::run_csv_batch(
        file.path(),
        b',',
        &delegates::CATALOG,
        Verb::Insert,
        fast_config(2),
        echo_op(),
        sink,
    )
    .await
    .unwrap();

    // Three input rows, one 403: exactly two result records.
    assert_eq!(count, 2);
    let records = parse_lines(&buf);
    assert_eq!(records.len(), 2);
    assert!(records
        .iter()
        .all(|r| r["delegateEmail"] != json!("denied@x")));
}

#[tokio::test]
async fn binder_failures_skip_rows_without_stopping_the_batch() {
    // Second row is missing the required userId column value entirely.
    let file = csv_file("userId,delegateEmail\nalice@x,bob@x\n,carol@x\ndan@x,erin@x\n");
    let (sink, _buf) = stream_sink();

    let count = batch::run_csv_batch(
        file.path(),
        b',',
        &delegates::CATALOG,
        Verb::Insert,
        fast_config(2),
        echo_op(),
        sink,
    )
    .await
    .unwrap();

    assert_eq!(count, 2);
}

#[tokio::test]
async fn alternate_delimiter_is_honored() {
    let file = csv_file("userId|delegateEmail\nalice@x|bob@x\n");
    let (sink, buf) = stream_sink();

    let count = batch::run_csv_batch(
        file.path(),
        b'|',
        &delegates::CATALOG,
        Verb::Insert,
        fast_config(1),
        echo_op(),
        sink,
    )
    .await
    .unwrap();

    assert_eq!(count, 1);
    assert_eq!(parse_lines(&buf)[0]["delegateEmail"], json!("bob@x"));
}

#[tokio::test]
async fn empty_csv_is_invalid_invocation() {
    let file = csv_file("");
    let (sink, _buf) = stream_sink();

    let err = batch::run_csv_batch(
        file.path(),
        b',',
        &delegates::CATALOG,
        Verb::Insert,
        fast_config(1),
        echo_op(),
        sink,
    )
    .await
    .unwrap_err();

    assert!(matches!(err, Error::InvalidInvocation(_)));
}

#[tokio::test]
async fn transient_failures_are_retried_within_the_worker() {
    let attempts = Arc::new(Mutex::new(0u32));
    let attempts_clone = Arc::clone(&attempts);

    let op: BatchOp = Arc::new(move |_values: ValueMap| {
        let attempts = Arc::clone(&attempts_clone);
        async move {
            let mut guard = attempts.lock().unwrap();
            *guard += 1;
            if *guard < 3 {
                Err(Error::Transient("HTTP 503".to_string()))
            } else {
                Ok(json!({ "ok": true }))
            }
        }
        .boxed()
    });

    let file = csv_file("userId,delegateEmail\nalice@x,bob@x\n");
    let (sink, buf) = stream_sink();

    let count = batch::run_csv_batch(
        file.path(),
        b',',
        &delegates::CATALOG,
        Verb::Insert,
        fast_config(1),
        op,
        sink,
    )
    .await
    .unwrap();

    assert_eq!(count, 1);
    assert_eq!(*attempts.lock().unwrap(), 3);
    assert_eq!(parse_lines(&buf)[0], json!({ "ok": true }));
}

#[tokio::test]
async fn many_workers_share_the_stream_encoder_without_interleaving() {
    // 40 rows across 8 workers, every record on its own parseable line.
    let mut content = String::from("userId,delegateEmail\n");
    for i in 0..40 {
        content.push_str(&format!("user{}@x,delegate{}@x\n", i, i));
    }
    let file = csv_file(&content);
    let (sink, buf) = stream_sink();

    let count = batch::run_csv_batch(
        file.path(),
        b',',
        &delegates::CATALOG,
        Verb::Insert,
        fast_config(8),
        echo_op(),
        sink,
    )
    .await
    .unwrap();

    assert_eq!(count, 40);
    let records = parse_lines(&buf);
    assert_eq!(records.len(), 40);

    let mut seen: Vec<String> = records
        .iter()
        .map(|r| r["delegateEmail"].as_str().unwrap().to_string())
        .collect();
    seen.sort();
    seen.dedup();
    assert_eq!(seen.len(), 40);
}

#[tokio::test]
async fn run_units_drains_a_caller_supplied_channel() {
    let (tx, rx) = batch::unit_channel(2);
    let producer = tokio::spawn(async move {
        for i in 0..5 {
            let mut values = ValueMap::new();
            values.set("userId", FlagValue::Str(format!("u{}@x", i)), true);
            values.set(
                "delegateEmail",
                FlagValue::Str(format!("d{}@x", i)),
                true,
            );
            let unit = WorkUnit {
                values,
                context: format!("u{}@x:", i),
            };
            tx.send(unit).await.unwrap();
        }
    });

    let (sink, buf) = stream_sink();
    let count = batch::run_units(rx, fast_config(2), echo_op(), sink)
        .await
        .unwrap();
    producer.await.unwrap();

    assert_eq!(count, 5);
    assert_eq!(parse_lines(&buf).len(), 5);
}
