mod args;
mod logging;
mod op;
mod ops;
mod state;

use args::Args;
use clap::{Parser, Subcommand};
use op::Op;
use ops::{Cat, CopyObject, Delete, Exists, Init, Ls, Mirror, Version};

command_enum! {
    (Init, Init),
    (Mirror, Mirror),
    (Exists, Exists),
    (Copy, CopyObject),
    (Delete, Delete),
    (Cat, Cat),
    (Ls, Ls),
    (Version, Version),
}

/// A mirror that ran to completion but left failures behind
const EXIT_INCOMPLETE: i32 = 2;

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let ctx = op::OpContext::new(args.config_path.clone());

    // Config may not exist yet (init, version); logging still comes up.
    let app_config = ctx.state().ok().map(|state| state.config);
    let level = args
        .log_level
        .as_deref()
        .or(app_config.as_ref().map(|c| c.log_level.as_str()))
        .map(logging::parse_level)
        .unwrap_or(tracing::level_filters::LevelFilter::INFO);
    let log_dir = app_config.as_ref().and_then(|c| c.log_dir.as_deref());
    let guards = logging::init_logging(level, log_dir);

    match args.command.execute(&ctx).await {
        Ok(output) => {
            println!("{}", output);
            let code = match &output {
                OpOutput::Mirror(mirror) if !mirror.report.is_clean() => EXIT_INCOMPLETE,
                _ => 0,
            };
            drop(guards);
            std::process::exit(code);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            drop(guards);
            std::process::exit(1);
        }
    }
}
