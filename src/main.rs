use anyhow::Result;
use texgen::generator::StatsGenerator;
use texgen::settings;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = settings::load_config()?;
    let mut generator = StatsGenerator::new(settings);

    generator.solve()?;
    generator.writeup()
}
