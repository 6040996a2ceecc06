//! 分阶段运行的脑肿瘤纵向分析流水线.
//!
//! 每个阶段都可以单独运行, 前一阶段的输出保存在数据目录下.

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use mri_berry::consts::DEMO_SEED;
use mri_berry::dataset::StagePaths;
use mri_berry::registration::RegistrationConfig;
use mri_berry::segment::SeedPoint;
use simple_logger::SimpleLogger;

mod cli;

mod picker;

mod stages;

use cli::{Cli, Command};
use stages::Pipeline;

fn main() -> Result<()> {
    let cli = Cli::parse();
    SimpleLogger::new().with_level(cli.log_level()).init()?;

    let threads = cli.threads.unwrap_or_else(utils::cpus);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .context("failed to build the rayon thread pool")?;

    let data_dir = match cli.data_dir.clone() {
        Some(d) => d,
        None => utils::data_dir_from_env_or_home()
            .with_context(|| format!("set --data-dir or ${}", utils::DATA_DIR_ENV))?,
    };
    info!("data directory: {}", data_dir.display());

    // 没有指定阶段时, 以演示种子点执行全部阶段.
    let (command, hardcode) = match cli.command {
        Some(c) => (c, cli.hardcode_seed),
        None => (Command::All, true),
    };
    let seed = match cli.seed {
        Some(s) => Some(s),
        None if hardcode => Some(SeedPoint::from(DEMO_SEED)),
        None => None,
    };

    let mut registration = RegistrationConfig::default();
    if let Some(n) = cli.max_iterations {
        registration.max_iterations = n;
    }
    let mut pipeline = Pipeline::new(StagePaths::new(&data_dir, &cli.fixed, &cli.moving), seed, registration);

    match command {
        Command::Register => pipeline.register()?,
        Command::Segment => {
            pipeline.segment()?;
        }
        Command::Analyze => print_report(&pipeline)?,
        Command::Snapshot => pipeline.snapshot()?,
        Command::All => {
            pipeline.register()?;
            pipeline.segment()?;
            print_report(&pipeline)?;
            pipeline.snapshot()?;
        }
    }
    Ok(())
}

fn print_report(pipeline: &Pipeline) -> Result<()> {
    let report = pipeline.analyze()?;
    utils::sep();
    println!("{report}");
    utils::sep();
    Ok(())
}
