use anyhow::Result;

use crate::LinkConfig;

pub fn check_link(cfg: &LinkConfig) -> Result<()> {
    anyhow::ensure!(
        cfg.serial_dev.as_ref().map(|s| !s.trim().is_empty()).unwrap_or(false),
        "link.serial_dev missing"
    );
    anyhow::ensure!(
        cfg.baud() == heli_proto::BAUD_RATE,
        "link.baud must be {} for the bridge firmware",
        heli_proto::BAUD_RATE
    );
    let rt = cfg.read_timeout_ms.unwrap_or(100);
    anyhow::ensure!((10..=2000).contains(&rt), "link.read_timeout_ms should be 10..2000");
    if let Some(t) = cfg.ready_timeout_ms {
        anyhow::ensure!(t >= 500, "link.ready_timeout_ms too short for the bridge to boot");
    }
    Ok(())
}
