use anyhow::Context;
use hftshm_config::{ProvisionConfig, RingConfig};
use hftshm_mmap::{DefaultProvider, SegmentError};
use hftshm_ring::{Producer, RingError, RingParams};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG: &str = "hftshm.toml";

fn main() -> anyhow::Result<()> {
    let mut remove = false;
    let mut config_path = DEFAULT_CONFIG.to_string();
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--remove" => remove = true,
            _ => config_path = arg,
        }
    }

    let config = ProvisionConfig::load(config_path.as_str())
        .with_context(|| format!("loading {config_path}"))?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let provider = match &config.base_dir {
        Some(dir) => DefaultProvider::with_base(dir),
        None => DefaultProvider::default(),
    };

    for ring in &config.rings {
        if remove {
            match hftshm_ring::remove(&provider, &ring.name) {
                Ok(()) => {}
                Err(RingError::Segment(SegmentError::NotFound { path })) => {
                    warn!(ring = %ring.name, path = %path.display(), "nothing to remove");
                }
                Err(err) => return Err(err).with_context(|| format!("removing {}", ring.name)),
            }
            continue;
        }
        provision(&provider, ring)?;
    }
    Ok(())
}

fn provision(provider: &DefaultProvider, ring: &RingConfig) -> anyhow::Result<()> {
    let params = RingParams::new(
        ring.name.clone(),
        ring.max_consumers,
        ring.event_size,
        ring.buffer_size,
    )
    .with_hugepages(ring.hugepage_size);

    let producer =
        Producer::create(provider, &params).with_context(|| format!("provisioning {}", ring.name))?;

    let meta = producer.metadata().snapshot();
    info!(
        ring = %ring.name,
        header = %producer.header_segment().path().display(),
        data = %producer.data_segment().path().display(),
        header_size = meta.header_size,
        data_size = producer.data_segment().len(),
        index_mask = meta.index_mask,
        consumer_0_offset = meta.consumer_0_offset,
        "ring ready"
    );
    producer.detach();
    Ok(())
}
