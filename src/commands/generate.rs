//! Generate testdata command implementation.
//!
//! Generates a synthetic process table (init, kernel threads, service trees
//! with workers and unrelated single processes) as a fixture file that
//! `--test-data-file` replays.

use chrono::Utc;
use rand::Rng;
use std::fs;
use std::path::PathBuf;
use tracing::debug;
use zaggregator::process::{FixtureProcess, ProcessFixture};

const MB: u64 = 1024 * 1024;

/// Fixture format version written by this generator.
pub const FIXTURE_VERSION: &str = "1.0";

/// First pid handed to generated user-space processes.
const FIRST_USER_PID: u32 = 1000;

/// Master command line, worker command line (None for workerless daemons).
type ServiceTemplate = (&'static [&'static str], Option<&'static [&'static str]>);

const SERVICES: &[ServiceTemplate] = &[
    (
        &["/usr/sbin/nginx", "-g", "daemon off;"],
        Some(&["nginx: worker process", ""]),
    ),
    (
        &["/usr/lib/postgresql/15/bin/postgres", "-D", "/var/lib/postgresql/15/main"],
        Some(&["postgres: 15/main: background writer", ""]),
    ),
    (
        &["/usr/sbin/apache2", "-k", "start"],
        Some(&["/usr/sbin/apache2", "-k", "start"]),
    ),
    (
        &["php-fpm: master process (/etc/php/8.2/fpm/php-fpm.conf)", "", ""],
        Some(&["php-fpm: pool www", "", ""]),
    ),
    (
        &["/usr/bin/python3", "/usr/bin/gunicorn", "app:wsgi"],
        Some(&["/usr/bin/python3", "/usr/bin/gunicorn", "app:wsgi"]),
    ),
    (&["/usr/bin/redis-server", "127.0.0.1:6379"], None),
    (&["/usr/bin/java", "-jar", "/opt/app/service.jar"], None),
    (&["/usr/sbin/sshd", "-D"], Some(&["sshd: admin@pts/0", ""])),
];

const SINGLES: &[&[&str]] = &[
    &["/usr/sbin/cron", "-f"],
    &["/usr/sbin/rsyslogd", "-n"],
    &["/usr/bin/dbus-daemon", "--system", "--nofork"],
    &["/sbin/agetty", "-o", "-p", "--", "\\u", "--noclear", "tty1"],
    &["/lib/systemd/systemd-journald"],
    &["/usr/sbin/chronyd", "-F", "1"],
];

const KERNEL_THREADS: &[&str] = &["kworker/0:1", "ksoftirqd/0", "migration/0", "rcu_sched"];

fn randomize(rng: &mut impl Rng, process: FixtureProcess) -> FixtureProcess {
    // RSS: 2 MB - 512 MB, VMS: 2-8x RSS
    let rss = rng.gen_range(2 * MB..512 * MB);
    let vms = rss * rng.gen_range(2..8);
    let files = rng.gen_range(0..40);
    let sockets = rng.gen_range(0..20);
    let other = rng.gen_range(3..10);

    process
        .with_memory(rss, vms)
        .with_cpu(rng.gen_range(0.0..25.0))
        .with_ctx_switches(rng.gen_range(0..100_000), rng.gen_range(0..5_000))
        .with_fds(files + sockets + other, files, sockets)
}

/// Builds a synthetic process forest.
pub fn generate_fixture(rng: &mut impl Rng, services: usize, extra_processes: usize) -> ProcessFixture {
    let mut processes = vec![FixtureProcess::new(1, 0, 1, &["/sbin/init", "splash"])];

    processes.push(FixtureProcess::new(2, 0, 0, &[]).with_name("kthreadd"));
    for (i, name) in KERNEL_THREADS.iter().enumerate() {
        processes.push(FixtureProcess::new(3 + i as u32, 2, 0, &[]).with_name(name));
    }

    let mut pid = FIRST_USER_PID;
    for i in 0..services {
        let (master, worker) = SERVICES[i % SERVICES.len()];
        let master_pid = pid;
        pid += 1;
        processes.push(randomize(rng, FixtureProcess::new(master_pid, 1, master_pid, master)));

        if let Some(worker) = worker {
            for _ in 0..rng.gen_range(2..6) {
                processes.push(randomize(rng, FixtureProcess::new(pid, master_pid, master_pid, worker)));
                pid += 1;
            }
        }
    }

    for i in 0..extra_processes {
        let cmdline = SINGLES[i % SINGLES.len()];
        processes.push(randomize(rng, FixtureProcess::new(pid, 1, pid, cmdline)));
        pid += 1;
    }

    ProcessFixture {
        version: FIXTURE_VERSION.to_string(),
        generated_at: Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        host_idle_percent: rng.gen_range(20.0..95.0),
        processes,
    }
}

/// Generates a synthetic process table JSON file for testing purposes.
pub fn command_generate_testdata(
    output: PathBuf,
    services: usize,
    extra_processes: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    debug!(
        "Generating test data: services={}, extra_processes={}, output={}",
        services,
        extra_processes,
        output.display()
    );

    let mut rng = rand::thread_rng();
    let fixture = generate_fixture(&mut rng, services, extra_processes);

    let json_content = serde_json::to_string_pretty(&fixture)?;
    fs::write(&output, &json_content)?;

    println!(
        "✅ Generated test data: {} processes in {}",
        fixture.processes.len(),
        output.display()
    );

    Ok(())
}
