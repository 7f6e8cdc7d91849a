//! `RetryingConnection` forwards every operation untouched and only wraps the
//! processes returned by `run`.

use std::io::Cursor;
use std::net::Ipv4Addr;
use std::time::Duration;

use garden_client::fakes::{FakeCall, FakeConnection, FakeProcess};
use garden_client::{Connection, ProcessIo, RetryingConnection, StreamInSpec, StreamOutSpec};
use garden_proto::{
    BandwidthLimits, Capacity, ContainerSpec, CpuLimits, DiskLimitScope, DiskLimits, GardenError,
    GardenResult, Limits, MemoryLimits, NetOutRule, ProcessSpec, Properties,
};
use test_case::test_case;
use tokio::io::AsyncReadExt;

const HANDLE: &str = "pass-through";
const DNS: Ipv4Addr = Ipv4Addr::new(8, 8, 8, 8);
const BANDWIDTH: BandwidthLimits = BandwidthLimits {
    rate_in_bytes_per_second: 128 * 1024,
    burst_rate_in_bytes_per_second: 256 * 1024,
};
const DISK: DiskLimits = DiskLimits {
    inode_soft: 1000,
    inode_hard: 2000,
    byte_soft: 512 * 1024 * 1024,
    byte_hard: 1024 * 1024 * 1024,
    scope: DiskLimitScope::Exclusive,
};

async fn setup() -> (FakeConnection, RetryingConnection<FakeConnection>) {
    let fake = FakeConnection::new();
    let spec = ContainerSpec::with_handle(HANDLE)
        .property("owner", "tests")
        .property("suite", "retrying")
        .limits(
            Limits::default()
                .with_bandwidth(BANDWIDTH)
                .with_disk(DISK)
                .with_cpu(CpuLimits::weight(50))
                .with_memory(MemoryLimits {
                    limit_in_bytes: 64 * 1024 * 1024,
                }),
        );
    fake.create(spec).await.expect("create");
    (fake.clone(), RetryingConnection::new(fake))
}

/// Invoke `op` on `conn` with fixed arguments and drop the value.
async fn invoke(conn: &dyn Connection, op: &str) -> GardenResult<()> {
    let handles = vec![HANDLE.to_string()];
    match op {
        "ping" => conn.ping().await,
        "capacity" => conn.capacity().await.map(drop),
        "create" => conn.create(ContainerSpec::default()).await.map(drop),
        "list" => conn.list(Properties::new()).await.map(drop),
        "destroy" => conn.destroy(HANDLE).await,
        "stop" => conn.stop(HANDLE, true).await,
        "info" => conn.info(HANDLE).await.map(drop),
        "bulk_info" => conn.bulk_info(&handles).await.map(drop),
        "bulk_metrics" => conn.bulk_metrics(&handles).await.map(drop),
        "stream_in" => {
            conn.stream_in(HANDLE, StreamInSpec::new("/tmp", Cursor::new(b"tar".to_vec())))
                .await
        }
        "stream_out" => conn.stream_out(HANDLE, StreamOutSpec::new("/tmp")).await.map(drop),
        "current_bandwidth_limits" => conn.current_bandwidth_limits(HANDLE).await.map(drop),
        "current_cpu_limits" => conn.current_cpu_limits(HANDLE).await.map(drop),
        "current_disk_limits" => conn.current_disk_limits(HANDLE).await.map(drop),
        "current_memory_limits" => conn.current_memory_limits(HANDLE).await.map(drop),
        "run" => conn
            .run(HANDLE, ProcessSpec::new("true", Vec::<String>::new()), ProcessIo::default())
            .await
            .map(drop),
        "attach" => conn.attach(HANDLE, "proc", ProcessIo::default()).await.map(drop),
        "net_in" => conn.net_in(HANDLE, 0, 8080).await.map(drop),
        "net_out" => conn.net_out(HANDLE, NetOutRule::tcp(DNS, 53)).await,
        "bulk_net_out" => conn.bulk_net_out(HANDLE, vec![NetOutRule::tcp(DNS, 53)]).await,
        "set_grace_time" => conn.set_grace_time(HANDLE, Duration::from_secs(30)).await,
        "properties" => conn.properties(HANDLE).await.map(drop),
        "property" => conn.property(HANDLE, "owner").await.map(drop),
        "set_property" => conn.set_property(HANDLE, "k", "v").await,
        "remove_property" => conn.remove_property(HANDLE, "owner").await,
        "metrics" => conn.metrics(HANDLE).await.map(drop),
        other => unreachable!("unknown operation {other}"),
    }
}

#[test_case("ping")]
#[test_case("capacity")]
#[test_case("create")]
#[test_case("list")]
#[test_case("destroy")]
#[test_case("stop")]
#[test_case("info")]
#[test_case("bulk_info")]
#[test_case("bulk_metrics")]
#[test_case("stream_in")]
#[test_case("stream_out")]
#[test_case("current_bandwidth_limits")]
#[test_case("current_cpu_limits")]
#[test_case("current_disk_limits")]
#[test_case("current_memory_limits")]
#[test_case("run")]
#[test_case("attach")]
#[test_case("net_in")]
#[test_case("net_out")]
#[test_case("bulk_net_out")]
#[test_case("set_grace_time")]
#[test_case("properties")]
#[test_case("property")]
#[test_case("set_property")]
#[test_case("remove_property")]
#[test_case("metrics")]
#[tokio::test]
async fn test_error_forwarded_once_without_retry(op: &'static str) {
    let (fake, conn) = setup().await;
    let err = GardenError::connection_reset("net: connection reset");
    fake.fail_next(op, err.clone());
    let before = fake.call_count(op);

    assert_eq!(invoke(&conn, op).await, Err(err));
    assert_eq!(fake.call_count(op), before + 1);
}

#[tokio::test]
async fn test_values_forwarded_unchanged() {
    let (fake, conn) = setup().await;

    assert_eq!(conn.list(Properties::new()).await, Ok(vec![HANDLE.to_string()]));
    assert_eq!(
        conn.current_cpu_limits(HANDLE).await,
        Ok(CpuLimits::weight(50))
    );
    assert_eq!(
        conn.current_memory_limits(HANDLE).await.map(|m| m.limit_in_bytes),
        Ok(64 * 1024 * 1024)
    );
    assert_eq!(conn.property(HANDLE, "owner").await, Ok("tests".to_string()));
    assert_eq!(conn.net_in(HANDLE, 0, 8080).await, Ok((61001, 8080)));
    assert_eq!(conn.info(HANDLE).await, fake.info(HANDLE).await);
    assert_eq!(conn.metrics(HANDLE).await, fake.metrics(HANDLE).await);
}

#[tokio::test]
async fn test_capacity_forwarded_unchanged() {
    let capacity = Capacity {
        memory_in_bytes: 16 * 1024 * 1024 * 1024,
        disk_in_bytes: 100 * 1024 * 1024 * 1024,
        schedulable_disk_in_bytes: 80 * 1024 * 1024 * 1024,
        max_containers: 250,
    };
    let fake = FakeConnection::new().with_capacity(capacity);
    let conn = RetryingConnection::new(fake.clone());

    assert_eq!(conn.capacity().await, Ok(capacity));
    assert_eq!(conn.capacity().await, fake.capacity().await);
}

#[tokio::test]
async fn test_bulk_results_forwarded_unchanged() {
    let (fake, conn) = setup().await;
    let handles = vec![HANDLE.to_string(), "missing".to_string()];

    let info = conn.bulk_info(&handles).await.expect("bulk info");
    assert_eq!(Ok(info.clone()), fake.bulk_info(&handles).await);
    assert_eq!(info.len(), 2);
    assert_eq!(info[HANDLE].err, None);
    assert_eq!(
        info["missing"].err,
        Some(GardenError::container_not_found("missing"))
    );

    let metrics = conn.bulk_metrics(&handles).await.expect("bulk metrics");
    assert_eq!(Ok(metrics.clone()), fake.bulk_metrics(&handles).await);
    assert_eq!(metrics.len(), 2);
    assert_eq!(metrics[HANDLE].err, None);
    assert_eq!(
        metrics["missing"].err,
        Some(GardenError::container_not_found("missing"))
    );
}

#[tokio::test]
async fn test_properties_and_limits_forwarded_unchanged() {
    let (fake, conn) = setup().await;

    let properties = conn.properties(HANDLE).await.expect("properties");
    assert_eq!(Ok(properties.clone()), fake.properties(HANDLE).await);
    assert_eq!(properties.get("owner").map(String::as_str), Some("tests"));
    assert_eq!(properties.get("suite").map(String::as_str), Some("retrying"));

    assert_eq!(conn.current_bandwidth_limits(HANDLE).await, Ok(BANDWIDTH));
    assert_eq!(
        conn.current_bandwidth_limits(HANDLE).await,
        fake.current_bandwidth_limits(HANDLE).await
    );
    assert_eq!(conn.current_disk_limits(HANDLE).await, Ok(DISK));
    assert_eq!(
        conn.current_disk_limits(HANDLE).await,
        fake.current_disk_limits(HANDLE).await
    );
}

#[tokio::test]
async fn test_create_returns_handle_unchanged() {
    let (fake, conn) = setup().await;

    assert_eq!(
        conn.create(ContainerSpec::with_handle("requested")).await,
        Ok("requested".to_string())
    );
    assert_eq!(
        conn.create(ContainerSpec::default()).await,
        Ok("fake-handle-1".to_string())
    );

    let mut handles = fake.handles();
    handles.sort();
    assert_eq!(handles, vec!["fake-handle-1", HANDLE, "requested"]);
}

#[tokio::test]
async fn test_stream_out_bytes_match_direct_call() {
    let (fake, conn) = setup().await;
    let archive = b"\x00tar\xffpayload".to_vec();
    fake.stream_in(HANDLE, StreamInSpec::new("/data", Cursor::new(archive.clone())))
        .await
        .expect("stream in");

    let mut wrapped = Vec::new();
    conn.stream_out(HANDLE, StreamOutSpec::new("/data"))
        .await
        .expect("stream out")
        .read_to_end(&mut wrapped)
        .await
        .expect("read");
    let mut direct = Vec::new();
    fake.stream_out(HANDLE, StreamOutSpec::new("/data"))
        .await
        .expect("stream out")
        .read_to_end(&mut direct)
        .await
        .expect("read");

    assert_eq!(wrapped, direct);
    assert_eq!(wrapped, archive);
}

#[tokio::test]
async fn test_arguments_forwarded_unchanged() {
    let (fake, conn) = setup().await;

    conn.stop(HANDLE, true).await.expect("stop");
    conn.set_grace_time(HANDLE, Duration::from_secs(42))
        .await
        .expect("set grace time");
    conn.bulk_net_out(HANDLE, vec![NetOutRule::tcp(DNS, 53), NetOutRule::tcp(DNS, 53).with_log()])
        .await
        .expect("bulk net out");

    let calls = fake.calls();
    assert!(calls.contains(&FakeCall::Stop {
        handle: HANDLE.to_string(),
        kill: true,
    }));
    assert!(calls.contains(&FakeCall::SetGraceTime {
        handle: HANDLE.to_string(),
        grace_time: Duration::from_secs(42),
    }));
    assert_eq!(fake.grace_time(HANDLE), Some(Duration::from_secs(42)));
    assert_eq!(fake.net_out_rules(HANDLE).len(), 2);
}

#[tokio::test]
async fn test_stream_round_trip_through_wrapper() {
    let (fake, conn) = setup().await;

    conn.stream_in(
        HANDLE,
        StreamInSpec::new("/home/alice", Cursor::new(b"archive".to_vec())).user("alice"),
    )
    .await
    .expect("stream in");
    assert_eq!(fake.file(HANDLE, "/home/alice"), Some(b"archive".to_vec()));

    let mut reader = conn
        .stream_out(HANDLE, StreamOutSpec::new("/home/alice"))
        .await
        .expect("stream out");
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes).await.expect("read");
    assert_eq!(bytes, b"archive");
}

#[tokio::test]
async fn test_run_process_retries_wait() {
    let (fake, conn) = setup().await;
    let inner = FakeProcess::new("proc-1").with_wait_results([
        Err(GardenError::connection_reset("net: connection reset")),
        Err(GardenError::connection_reset("net: connection reset")),
        Err(GardenError::connection_reset("net: connection reset")),
        Ok(42),
    ]);
    fake.push_process(inner.clone());

    let process = conn
        .run(HANDLE, ProcessSpec::new("sh", ["-c", "exit 42"]), ProcessIo::default())
        .await
        .expect("run");

    assert_eq!(process.id(), "proc-1");
    assert_eq!(process.wait().await, Ok(42));
    assert_eq!(inner.wait_call_count(), 4);
    assert_eq!(fake.call_count("run"), 1);
}

#[tokio::test]
async fn test_attached_process_is_not_wrapped() {
    let (fake, conn) = setup().await;
    let inner = FakeProcess::new("proc-1").with_wait_results([
        Err(GardenError::timeout("timeout")),
        Ok(0),
    ]);
    fake.push_process(inner.clone());
    fake.run(HANDLE, ProcessSpec::default(), ProcessIo::default())
        .await
        .expect("run");

    let attached = conn
        .attach(HANDLE, "proc-1", ProcessIo::default())
        .await
        .expect("attach");

    assert_eq!(attached.wait().await, Err(GardenError::timeout("timeout")));
    assert_eq!(inner.wait_call_count(), 1);
}
