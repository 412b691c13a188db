use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};

use heli_link::{doctor as link_doctor, Controller, LinkConfig, SendOutcome};
use heli_proto::MAX_THROTTLE;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(name = "heli", version, about = "Fly an S107 helicopter through its serial bridge")]
struct Cli {
    /// TOML config; optional when --dev is given.
    #[arg(long)]
    config: Option<String>,

    /// Serial device of the bridge, overrides link.serial_dev.
    #[arg(long)]
    dev: Option<String>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Validate the configuration without touching the device.
    Doctor,
    /// Fly the ceiling-plant throttle profile, then land.
    Demo,
    /// Send one command; unset axes keep their neutral/idle value.
    Send {
        #[arg(long)]
        yaw: Option<u8>,
        #[arg(long)]
        pitch: Option<u8>,
        #[arg(long)]
        throttle: Option<u8>,
        #[arg(long)]
        trim: Option<u8>,
    },
    /// Neutral sticks, throttle cut.
    Land,
}

#[derive(Debug, Default, serde::Deserialize)]
struct Config {
    #[serde(default)]
    link: LinkConfig,
    demo: Option<DemoCfg>,
}

#[derive(Debug, Clone, serde::Deserialize)]
struct DemoCfg {
    throttle_from: u8,
    /// Exclusive.
    throttle_to: u8,
    throttle_step: u8,
    hover_s: u64,
}

impl Default for DemoCfg {
    fn default() -> Self {
        Self {
            throttle_from: 30,
            throttle_to: MAX_THROTTLE - 30,
            throttle_step: 10,
            hover_s: 3,
        }
    }
}

fn load_config(path: &str) -> Result<Config> {
    let s = std::fs::read_to_string(path).context("read config")?;
    Ok(toml::from_str(&s).context("parse config toml")?)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let mut cfg = match &cli.config {
        Some(path) => load_config(path)?,
        None => Config::default(),
    };
    if let Some(dev) = cli.dev {
        cfg.link.serial_dev = Some(dev);
    }

    match cli.cmd {
        Command::Doctor => doctor(&cfg)?,
        Command::Demo => demo(&cfg).await?,
        Command::Send { yaw, pitch, throttle, trim } => {
            with_controller(cfg.link.clone(), move |ctl| {
                if let Some(v) = yaw { ctl.set_yaw(v)?; }
                if let Some(v) = pitch { ctl.set_pitch(v)?; }
                if let Some(v) = throttle { ctl.set_throttle(v)?; }
                if let Some(v) = trim { ctl.set_trim(v)?; }
                let outcome = ctl.send()?;
                expect_sent(outcome)
            })
            .await?
        }
        Command::Land => {
            with_controller(cfg.link.clone(), |ctl| {
                info!("landing");
                expect_sent(ctl.land()?)
            })
            .await?
        }
    }
    Ok(())
}

fn doctor(cfg: &Config) -> Result<()> {
    info!("doctor: starting");
    link_doctor::check_link(&cfg.link)?;
    check_demo(&cfg.demo.clone().unwrap_or_default())?;
    info!("doctor: OK");
    Ok(())
}

fn check_demo(d: &DemoCfg) -> Result<()> {
    anyhow::ensure!(d.throttle_step > 0, "demo.throttle_step must be > 0");
    anyhow::ensure!(d.throttle_from < d.throttle_to, "demo.throttle_from must be below demo.throttle_to");
    anyhow::ensure!(d.throttle_to <= MAX_THROTTLE, "demo.throttle_to above {}", MAX_THROTTLE);
    anyhow::ensure!(d.hover_s <= 30, "demo.hover_s should be 0..30");
    Ok(())
}

fn expect_sent(outcome: SendOutcome) -> Result<()> {
    match outcome {
        SendOutcome::Sent => Ok(()),
        SendOutcome::NotReady => anyhow::bail!("bridge not ready, nothing sent"),
    }
}

/// Serial I/O blocks, so the controller lives on a blocking thread.
async fn with_controller<F>(link: LinkConfig, f: F) -> Result<()>
where
    F: FnOnce(&mut Controller) -> Result<()> + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let mut ctl = Controller::open(&link).context("open controller")?;
        let res = f(&mut ctl);
        ctl.close();
        res
    })
    .await
    .context("controller task")?
}

async fn demo(cfg: &Config) -> Result<()> {
    let profile = cfg.demo.clone().unwrap_or_default();
    check_demo(&profile)?;

    let abort = Arc::new(AtomicBool::new(false));
    let abort2 = abort.clone();
    let mut task = tokio::spawn(with_controller(cfg.link.clone(), move |ctl| {
        ceiling_plant(ctl, &profile, &abort2)
    }));

    tokio::select! {
        res = &mut task => return res.context("demo task")?,
        _ = tokio::signal::ctrl_c() => {
            warn!("demo: interrupted, landing");
            abort.store(true, Ordering::Release);
        }
    }

    // A bridge that never said READY keeps the controller blocked.
    match tokio::time::timeout(Duration::from_secs(5), task).await {
        Ok(res) => res.context("demo task")?,
        Err(_) => {
            error!("demo: controller did not stop, exiting");
            std::process::exit(130);
        }
    }
}

fn ceiling_plant(ctl: &mut Controller, d: &DemoCfg, abort: &AtomicBool) -> Result<()> {
    info!("let's do a ceiling plant!");

    let crescendo: Vec<u8> = (d.throttle_from..d.throttle_to)
        .step_by(d.throttle_step as usize)
        .collect();

    for &throttle in crescendo.iter().chain(crescendo.iter().rev()) {
        if abort.load(Ordering::Acquire) {
            break;
        }
        ctl.set_throttle(throttle)?;
        expect_sent(ctl.send()?)?;
        // on top of the settle delay inside send
        std::thread::sleep(Duration::from_millis(200));
    }

    let hover_until = std::time::Instant::now() + Duration::from_secs(d.hover_s);
    while std::time::Instant::now() < hover_until && !abort.load(Ordering::Acquire) {
        std::thread::sleep(Duration::from_millis(50));
    }

    info!("let's land this bucket!");
    expect_sent(ctl.land()?)
}
