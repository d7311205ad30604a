use anyhow::{bail, Result};
use clap::Parser;
use scatfield::consistency;
use scatfield::logging;
use scatfield::settings::{self, CliArgs};

fn main() -> Result<()> {
    let args = CliArgs::parse();
    logging::init(args.verbose);

    let settings = settings::load_config(&args)?;
    if !args.json {
        println!("{settings}");
    }

    let report = consistency::run(&settings)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{report}");
    }

    if !report.passed() {
        let failed: Vec<_> = report.failures().map(|check| check.name).collect();
        bail!("consistency checks failed: {}", failed.join(", "));
    }
    Ok(())
}
