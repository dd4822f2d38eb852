use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use ecotone::{Engine, EngineSettings, ScenarioLoader};

#[derive(Debug, Parser)]
#[command(author, version, about = "Ecotone island ecosystem runner")]
struct Cli {
    /// Path to the scenario YAML file
    #[arg(long, default_value = "scenarios/trial_island.yaml")]
    scenario: PathBuf,

    /// Override the number of years (uses scenario default when omitted)
    #[arg(long)]
    years: Option<u64>,

    /// Override snapshot interval in years
    #[arg(long)]
    snapshot_interval: Option<u64>,

    /// Directory for snapshots
    #[arg(long)]
    snapshot_dir: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let loader = ScenarioLoader::new(".");
    let scenario = loader.load(&cli.scenario)?;
    let years = scenario.years(cli.years);

    let mut settings = EngineSettings::from_scenario(&scenario);
    if let Some(interval) = cli.snapshot_interval {
        settings.snapshot_interval_years = interval;
    }
    if let Some(dir) = cli.snapshot_dir {
        settings = settings.with_snapshot_dir(dir);
    }

    let mut engine = Engine::from_scenario(&scenario, settings)?;
    engine.run(years)?;

    println!(
        "Scenario '{}' completed after {} years. Animals alive: {}",
        scenario.name,
        engine.year(),
        engine.island().num_animals()
    );
    for (species, count) in engine.island().totals_named() {
        println!("  {species}: {count}");
    }
    Ok(())
}
