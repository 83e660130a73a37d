use hftshm_mmap::{DefaultProvider, SegmentInfo, SegmentProvider};
use hftshm_ring::{RingReport, describe};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let mut json = false;
    let mut names = Vec::new();
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--json" => json = true,
            _ => names.push(arg),
        }
    }

    let provider = DefaultProvider::default();
    if names.is_empty() {
        names = provider.list_rings()?;
    }

    info!(base = %provider.base_dir().display(), rings = names.len(), "inspecting rings");
    let reports: Vec<RingReport> = names
        .iter()
        .map(|name| {
            let report = describe(&provider, name);
            debug!(
                ring = %report.name,
                header = report.header.exists,
                data = report.data.exists,
                valid = report.metadata.is_some(),
                "described ring"
            );
            report
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
        return Ok(());
    }

    if reports.is_empty() {
        println!("no rings under {}", provider.base_dir().display());
    }
    for report in &reports {
        print_report(report);
    }
    Ok(())
}

fn print_report(report: &RingReport) {
    println!("ring {}", report.name);
    print_segment("header", &report.header);
    print_segment("data", &report.data);
    match &report.metadata {
        Some(meta) => {
            println!(
                "  layout  v{} consumers={} event_size={} buffer_size={} header_size={}",
                meta.version, meta.max_consumers, meta.event_size, meta.buffer_size, meta.header_size
            );
            let producer = match meta.producer_pid {
                0 => "none".to_string(),
                pid => pid.to_string(),
            };
            println!("  producer {producer}");
        }
        None => println!("  layout  <not a valid ring header>"),
    }
}

fn print_segment(label: &str, info: &SegmentInfo) {
    if !info.exists {
        println!("  {label:<7} {} (missing)", info.path.display());
        return;
    }
    let hugepages = match info.hugepage_size {
        0 => String::new(),
        size => format!(" hugepages={size}"),
    };
    println!(
        "  {label:<7} {} {} bytes {} {}{hugepages}",
        info.path.display(),
        info.size,
        info.permissions,
        info.last_modified().unwrap_or_default(),
    );
}
