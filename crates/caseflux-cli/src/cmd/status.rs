//! `caseflux status` - show the checkpoint and what the next run would load

use anyhow::Result;
use clap::Args;

use caseflux_ingest::{Checkpoint, plan};

use super::{InputArgs, print_summary};
use crate::config::Config;

#[derive(Args, Debug)]
pub struct StatusArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// List every pending file instead of the first and last
    #[arg(short, long)]
    pub all: bool,
}

pub fn run(args: StatusArgs, config: &Config) -> Result<()> {
    let pipeline = args.input.pipeline_config(config)?;
    let stored = Checkpoint::new(&pipeline.checkpoint_path).load()?;
    let plan = plan(&pipeline)?;

    let mut rows = vec![
        ("Data directory", pipeline.data_dir.display().to_string()),
        ("Strategy", pipeline.strategy.to_string()),
        (
            "Checkpoint",
            match &stored {
                Some(w) => format!("{w} ({})", pipeline.checkpoint_path.display()),
                None => format!("none ({})", pipeline.checkpoint_path.display()),
            },
        ),
        ("Resume after", plan.watermark.to_string()),
        ("Pending files", plan.files.len().to_string()),
    ];

    let names: Vec<String> = plan
        .files
        .iter()
        .map(|p| {
            p.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| p.display().to_string())
        })
        .collect();
    if args.all {
        for name in &names {
            rows.push(("", name.clone()));
        }
    } else if let (Some(first), Some(last)) = (names.first(), names.last()) {
        rows.push(("First", first.clone()));
        if names.len() > 1 {
            rows.push(("Last", last.clone()));
        }
    }

    print_summary("Status", &rows);
    Ok(())
}
