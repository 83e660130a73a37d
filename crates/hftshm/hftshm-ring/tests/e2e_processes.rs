//! Cross-process tests for ring provisioning.
//!
//! Same self-spawning pattern for every test: the test binary re-executes
//! itself with `--exact <test>` and a role in the environment, and the child
//! runs the role instead of orchestrating.
//!
//! ```bash
//! cargo test -p hftshm-ring --test e2e_processes -- --nocapture
//! ```

use hftshm_mmap::{DefaultProvider, SegmentProvider};
use hftshm_ring::{Consumer, Producer, RingParams};
use std::env;
use std::io::Write;
use std::process::{Command, ExitStatus, Stdio};

/// Writes to stderr with an immediate flush so child output is not lost to
/// the test harness's capture.
macro_rules! log {
    ($($arg:tt)*) => {{
        let _ = writeln!(std::io::stderr(), $($arg)*);
        let _ = std::io::stderr().flush();
    }};
}

const ENV_ROLE: &str = "HFTSHM_E2E_ROLE";
const ENV_BASE: &str = "HFTSHM_E2E_BASE";
const ENV_PRODUCER_PID: &str = "HFTSHM_E2E_PRODUCER_PID";

const RING: &str = "e2e_bus";
const DATA_MARKER: u8 = 0xD7;
const CONSUMER_MARKER: u8 = 0xC0;

fn spawn(test: &str, role: &str, base: &std::path::Path, extra: &[(&str, String)]) -> std::process::Child {
    let exe = env::current_exe().expect("current_exe");
    let mut cmd = Command::new(exe);
    cmd.arg("--exact")
        .arg(test)
        .env(ENV_ROLE, role)
        .env(ENV_BASE, base)
        .stderr(Stdio::inherit());
    for (key, value) in extra {
        cmd.env(key, value);
    }
    cmd.spawn().expect("spawn child")
}

fn wait(child: &mut std::process::Child) -> ExitStatus {
    child.wait().expect("wait child")
}

fn child_provider() -> DefaultProvider {
    DefaultProvider::with_base(env::var(ENV_BASE).expect("HFTSHM_E2E_BASE not set"))
}

/// Consumer role: attach, check what the producer published, leave a mark.
fn run_consumer() {
    let shm = child_provider();
    let expected_pid: u32 = env::var(ENV_PRODUCER_PID)
        .expect("producer pid not set")
        .parse()
        .expect("producer pid");

    let mut consumer = Consumer::attach(&shm, RING).expect("consumer: attach");
    log!("[CONSUMER] attached, producer_pid = {}", consumer.producer_pid());

    assert_eq!(consumer.producer_pid(), expected_pid);
    assert_eq!(consumer.metadata().buffer_size, 4096);
    assert_eq!(consumer.metadata().max_consumers, 2);
    assert_eq!(consumer.data().expect("data")[123], DATA_MARKER);

    consumer.consumer_section_mut(1).expect("section")[0] = CONSUMER_MARKER;
    log!("[CONSUMER] done");
}

#[test]
fn e2e_consumer_attaches_from_another_process() {
    if let Ok(role) = env::var(ENV_ROLE) {
        match role.as_str() {
            "consumer" => run_consumer(),
            other => panic!("unknown role: {other}"),
        }
        return;
    }

    let tmp = tempfile::TempDir::new().expect("tempdir");
    let shm = DefaultProvider::with_base(tmp.path());

    let mut producer =
        Producer::create(&shm, &RingParams::new(RING, 2, 64, 4096)).expect("producer: create");
    producer.data_mut().expect("data")[123] = DATA_MARKER;
    log!("[ORCHESTRATOR] ring created in {}", tmp.path().display());

    let mut child = spawn(
        "e2e_consumer_attaches_from_another_process",
        "consumer",
        tmp.path(),
        &[(ENV_PRODUCER_PID, std::process::id().to_string())],
    );
    let status = wait(&mut child);
    assert!(status.success(), "consumer process failed: {status}");

    assert_eq!(producer.consumer_section(1).expect("section")[0], CONSUMER_MARKER);
    assert_eq!(producer.consumer_section(0).expect("section")[0], 0);
    producer.detach();
}

/// Creator role: provision the shared name with the size from the role.
fn run_creator(size: u64) {
    let shm = child_provider();
    shm.create_or_open("race.hdr", size, 0)
        .expect("creator: create_or_open");
}

#[test]
fn e2e_concurrent_create_or_open_keeps_a_requested_size() {
    if let Ok(role) = env::var(ENV_ROLE) {
        match role.as_str() {
            "create4096" => run_creator(4096),
            "create8192" => run_creator(8192),
            other => panic!("unknown role: {other}"),
        }
        return;
    }

    let tmp = tempfile::TempDir::new().expect("tempdir");
    let test = "e2e_concurrent_create_or_open_keeps_a_requested_size";

    for round in 0..8 {
        let mut small = spawn(test, "create4096", tmp.path(), &[]);
        let mut large = spawn(test, "create8192", tmp.path(), &[]);
        let small_status = wait(&mut small);
        let large_status = wait(&mut large);
        assert!(small_status.success(), "4096 creator failed: {small_status}");
        assert!(large_status.success(), "8192 creator failed: {large_status}");

        let shm = DefaultProvider::with_base(tmp.path());
        let info = shm.inspect("race.hdr");
        log!("[ORCHESTRATOR] round {round}: final size {}", info.size);
        assert!(
            info.size == 4096 || info.size == 8192,
            "round {round}: corrupted size {}",
            info.size
        );
        shm.unlink("race.hdr").expect("unlink");
    }
}
